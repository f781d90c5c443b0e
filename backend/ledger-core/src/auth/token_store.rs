//! Access/refresh token storage.
//!
//! The pair is always read and written whole. Callers can never observe the
//! access token of one pair next to the refresh token of another.

use crate::error::TokenStoreError;

use common::{ErrorLocation, RedactedSecret};

use std::io::ErrorKind as IoErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const TOKEN_FILE_NAME: &str = "tokens.json";

/// Current credential pair. Replaced wholesale on login and refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: RedactedSecret,
    pub refresh_token: RedactedSecret,
}

impl TokenPair {
    pub fn new(access_token: impl Into<RedactedSecret>, refresh_token: impl Into<RedactedSecret>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Storage seam for the token pair.
///
/// Implementations must hand out consistent snapshots under concurrent
/// `set`/`clear`, and must not fail: a broken backing medium is logged and
/// the in-memory value stays authoritative.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<TokenPair>;
    fn set(&self, pair: TokenPair);
    fn clear(&self);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.pair.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, pair: TokenPair) {
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
    }

    fn clear(&self) {
        *self.pair.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// On-disk shape of `tokens.json`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedTokens<'a> {
    access_token: std::borrow::Cow<'a, str>,
    refresh_token: std::borrow::Cow<'a, str>,
}

/// Store that survives restarts by mirroring the pair into a JSON file.
///
/// Reads are served from memory. Every write replaces the file through a
/// temp file + rename, under the same lock that guards the cached pair, so
/// the file always matches the last completed `set`/`clear`.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    pair: RwLock<Option<TokenPair>>,
}

impl FileTokenStore {
    /// Open `{dir}/tokens.json`, creating `dir` when needed.
    pub fn open_in(dir: &Path) -> Result<Self, TokenStoreError> {
        std::fs::create_dir_all(dir).map_err(|e| TokenStoreError::Directory {
            location: ErrorLocation::from(Location::caller()),
            path: dir.to_path_buf(),
            source: e,
        })?;

        Self::open(dir.join(TOKEN_FILE_NAME))
    }

    /// Open a token file.
    ///
    /// A missing file is an empty store. A file that does not parse is
    /// treated the same way (with a warning); the next `set` overwrites it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TokenStoreError> {
        let path = path.into();

        let pair = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PersistedTokens>(&contents) {
                Ok(persisted) => {
                    info!("Loaded persisted session from {}", path.display());
                    Some(TokenPair::new(
                        persisted.access_token.into_owned(),
                        persisted.refresh_token.into_owned(),
                    ))
                }
                Err(e) => {
                    warn!("Ignoring unreadable token file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("No token file at {}", path.display());
                None
            }
            Err(e) => {
                return Err(TokenStoreError::Read {
                    location: ErrorLocation::from(Location::caller()),
                    path,
                    source: e,
                });
            }
        };

        Ok(Self {
            path,
            pair: RwLock::new(pair),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, pair: &TokenPair) -> std::io::Result<()> {
        let persisted = PersistedTokens {
            access_token: pair.access_token.as_str().into(),
            refresh_token: pair.refresh_token.as_str().into(),
        };
        let json = serde_json::to_vec(&persisted)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        restrict_permissions(&temp_path)?;
        std::fs::rename(&temp_path, &self.path)
    }

    fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != IoErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.pair.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, pair: TokenPair) {
        let mut guard = self.pair.write().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.persist(&pair) {
            warn!("Failed to persist tokens to {}: {}", self.path.display(), e);
        }
        *guard = Some(pair);
    }

    fn clear(&self) {
        let mut guard = self.pair.write().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.remove() {
            warn!("Failed to remove token file {}: {}", self.path.display(), e);
        }
        *guard = None;
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
