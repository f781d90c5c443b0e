//! Tree reconstruction for self-referencing entities.
//!
//! Ledger accounts and item categories arrive as flat lists where each row
//! names its parent. [`build`] turns such a list into a forest and never
//! fails: duplicate ids, dangling parents and cycles are absorbed, because a
//! tree view must render whatever the backend sends.

mod builder;

pub use builder::build;

use std::hash::Hash;

/// An entity that sits in a parent/child hierarchy.
pub trait Hierarchical {
    type Id: Clone + Eq + Hash;

    fn id(&self) -> Self::Id;

    fn parent_id(&self) -> Option<Self::Id>;
}

/// One entity in a built forest.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode<T: Hierarchical> {
    pub id: T::Id,
    /// The parent reference as delivered, even if it was ignored.
    pub parent_id: Option<T::Id>,
    /// 0 for roots, parent depth + 1 otherwise.
    pub depth: usize,
    pub children: Vec<HierarchyNode<T>>,
    pub item: T,
}

impl<T: Hierarchical> HierarchyNode<T> {
    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&HierarchyNode<T>> = vec![self];
        while let Some(node) = stack.pop() {
            count += node.children.len();
            stack.extend(node.children.iter());
        }
        count
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

// Unlinks children before they drop so a long chain does not recurse.
impl<T: Hierarchical> Drop for HierarchyNode<T> {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Pre-order rows of `(depth, entity)`, the order a tree table draws them.
pub fn flatten<T: Hierarchical>(forest: &[HierarchyNode<T>]) -> Vec<(usize, &T)> {
    let mut rows = Vec::new();
    let mut stack: Vec<&HierarchyNode<T>> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        rows.push((node.depth, &node.item));
        stack.extend(node.children.iter().rev());
    }

    rows
}

/// Ids of every node under `id`, pre-order. Empty when `id` is not in the forest.
///
/// Parent pickers use this to keep a node from being moved under itself.
pub fn descendant_ids<T: Hierarchical>(forest: &[HierarchyNode<T>], id: &T::Id) -> Vec<T::Id> {
    let Some(target) = find(forest, id) else {
        return Vec::new();
    };

    flatten(&target.children)
        .into_iter()
        .map(|(_, item)| item.id())
        .collect()
}

/// Locate a node anywhere in the forest.
pub fn find<'a, T: Hierarchical>(forest: &'a [HierarchyNode<T>], id: &T::Id) -> Option<&'a HierarchyNode<T>> {
    let mut stack: Vec<&HierarchyNode<T>> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        if node.id == *id {
            return Some(node);
        }
        stack.extend(node.children.iter());
    }
    None
}
