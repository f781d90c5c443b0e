mod builder;
mod traversal;

use crate::hierarchy::{Hierarchical, HierarchyNode};

/// Minimal tree entity for exercising the builder.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Row {
    pub id: &'static str,
    pub parent: Option<&'static str>,
    pub label: &'static str,
}

impl Hierarchical for Row {
    type Id = &'static str;

    fn id(&self) -> &'static str {
        self.id
    }

    fn parent_id(&self) -> Option<&'static str> {
        self.parent
    }
}

pub(super) fn row(id: &'static str, parent: Option<&'static str>) -> Row {
    Row { id, parent, label: id }
}

pub(super) fn labelled(id: &'static str, parent: Option<&'static str>, label: &'static str) -> Row {
    Row { id, parent, label }
}

pub(super) fn ids<T: Hierarchical>(nodes: &[HierarchyNode<T>]) -> Vec<T::Id> {
    nodes.iter().map(|node| node.id.clone()).collect()
}
