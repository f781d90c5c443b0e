//! Tree-shaped entities as the backend sends them.
//!
//! Only the fields the hierarchy needs are typed. Everything else on the
//! row is kept in `extra` for the screens that render it.

use crate::hierarchy::Hierarchical;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Ledger account (chart of accounts row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(deserialize_with = "id_from_json")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_id_from_json")]
    pub parent_id: Option<String>,
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Item category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(deserialize_with = "id_from_json")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_id_from_json")]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ids come as strings from some endpoints and as integers from others.
fn id_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    optional_id_from_json(deserializer)?.ok_or_else(|| <D::Error as DeError>::custom("id cannot be null"))
}

fn optional_id_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(id) => Ok(Some(id)),
        Value::Number(id) => Ok(Some(id.to_string())),
        other => Err(<D::Error as DeError>::custom(format!("expected string or integer id, got {other}"))),
    }
}

/// Some rows encode "no parent" as an empty string instead of null.
fn present(parent_id: &Option<String>) -> Option<String> {
    parent_id.as_ref().filter(|id| !id.trim().is_empty()).cloned()
}

impl Hierarchical for Account {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn parent_id(&self) -> Option<String> {
        present(&self.parent_id)
    }
}

impl Hierarchical for Category {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }

    fn parent_id(&self) -> Option<String> {
        present(&self.parent_id)
    }
}
