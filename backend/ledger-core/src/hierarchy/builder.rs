use crate::hierarchy::{Hierarchical, HierarchyNode};

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

/// Build a forest from a flat, parent-referencing list.
///
/// - A repeated id keeps its last occurrence, placed where that occurrence is.
/// - A missing, unknown or self-referencing parent makes the entity a root.
/// - Every member of a parent cycle becomes a root. Entities hanging off a
///   cycle stay under their parent.
/// - Siblings and roots keep input order.
///
/// The input is only read. Assembly is iterative, so chain length is not
/// bounded by the stack.
pub fn build<T>(items: &[T]) -> Vec<HierarchyNode<T>>
where
    T: Hierarchical + Clone,
{
    let ids: Vec<T::Id> = items.iter().map(Hierarchical::id).collect();

    // Last write wins.
    let mut index_of: HashMap<&T::Id, usize> = HashMap::with_capacity(items.len());
    for (index, id) in ids.iter().enumerate() {
        index_of.insert(id, index);
    }
    let survivors: Vec<usize> = (0..items.len())
        .filter(|&index| index_of.get(&ids[index]) == Some(&index))
        .collect();
    if survivors.len() < items.len() {
        warn!(
            "Hierarchy input has {} duplicate id(s); keeping the last occurrence",
            items.len() - survivors.len()
        );
    }

    let mut parent: Vec<Option<usize>> = vec![None; items.len()];
    for &index in &survivors {
        parent[index] = items[index]
            .parent_id()
            .and_then(|parent_id| index_of.get(&parent_id).copied())
            .filter(|&parent_index| parent_index != index);
    }

    let on_cycle: Vec<usize> = survivors
        .iter()
        .copied()
        .filter(|&index| returns_to_self(index, &parent, survivors.len()))
        .collect();
    if !on_cycle.is_empty() {
        debug!("Demoting {} cyclic hierarchy entries to roots", on_cycle.len());
    }
    for index in on_cycle {
        parent[index] = None;
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut roots: Vec<usize> = Vec::new();
    for &index in &survivors {
        match parent[index] {
            Some(parent_index) => children[parent_index].push(index),
            None => roots.push(index),
        }
    }

    let (depth, order) = assign_depths(&survivors, &mut roots, &children);

    // Children before parents: reverse breadth-first order.
    let mut built: Vec<Option<HierarchyNode<T>>> = (0..items.len()).map(|_| None).collect();
    for &index in order.iter().rev() {
        let node_children = children[index]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();

        built[index] = Some(HierarchyNode {
            id: ids[index].clone(),
            parent_id: items[index].parent_id(),
            depth: depth[index],
            children: node_children,
            item: items[index].clone(),
        });
    }

    roots.iter().filter_map(|&root| built[root].take()).collect()
}

/// Walk up from `start`; true when the walk comes back to `start`.
///
/// Stops at a root, at a node already seen (a cycle `start` is not part
/// of), or after `limit` steps.
fn returns_to_self(start: usize, parent: &[Option<usize>], limit: usize) -> bool {
    let mut visited = HashSet::new();
    let mut current = parent[start];

    while let Some(index) = current {
        if index == start {
            return true;
        }
        if !visited.insert(index) || visited.len() > limit {
            return false;
        }
        current = parent[index];
    }

    false
}

/// Breadth-first depth assignment from `roots`.
///
/// Any survivor the traversal cannot reach is added to `roots` at depth 0,
/// and `roots` is re-sorted into input order. Returns per-index depths and
/// the visit order.
fn assign_depths(
    survivors: &[usize],
    roots: &mut Vec<usize>,
    children: &[Vec<usize>],
) -> (Vec<usize>, Vec<usize>) {
    let mut walk = Walk {
        depth: vec![0; children.len()],
        reached: vec![false; children.len()],
        order: Vec::with_capacity(survivors.len()),
    };

    for &root in roots.iter() {
        walk.visit_from(root, children);
    }

    // Only possible if parent links still loop after demotion.
    for &index in survivors {
        if !walk.reached[index] {
            warn!("Hierarchy entry unreachable from any root; promoting it");
            walk.visit_from(index, children);
            roots.push(index);
        }
    }
    // Indices, so sorting restores input order.
    roots.sort();

    (walk.depth, walk.order)
}

struct Walk {
    depth: Vec<usize>,
    reached: Vec<bool>,
    order: Vec<usize>,
}

impl Walk {
    fn visit_from(&mut self, root: usize, children: &[Vec<usize>]) {
        let mut queue = VecDeque::from([root]);
        self.reached[root] = true;
        self.depth[root] = 0;

        while let Some(index) = queue.pop_front() {
            self.order.push(index);
            for &child in &children[index] {
                if !self.reached[child] {
                    self.reached[child] = true;
                    self.depth[child] = self.depth[index] + 1;
                    queue.push_back(child);
                }
            }
        }
    }
}
