// Unit tests for hierarchy::build
// Covers the defensive policy (duplicates, dangling parents, cycles) and the
// depth/count invariants over generated inputs.

use super::{ids, labelled, row};
use crate::hierarchy::{Hierarchical, HierarchyNode, build, flatten};

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
struct Numbered {
    id: u32,
    parent: Option<u32>,
}

impl Hierarchical for Numbered {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn parent_id(&self) -> Option<u32> {
        self.parent
    }
}

/// Deterministic linear congruential generator, so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u32) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % u64::from(bound)) as u32
    }
}

fn generated_lists() -> Vec<Vec<Numbered>> {
    let mut rng = Lcg(0x5eed);
    (0..200)
        .map(|_| {
            let len = rng.next(40) + 1;
            (0..len)
                .map(|id| Numbered {
                    id,
                    // Parents drawn from a wider range than ids: dangling refs,
                    // self refs, forward refs and cycles all show up.
                    parent: match rng.next(5) {
                        0 => None,
                        _ => Some(rng.next(len + 5)),
                    },
                })
                .collect()
        })
        .collect()
}

fn check_depths<T: Hierarchical>(nodes: &[HierarchyNode<T>], expected: usize) {
    for node in nodes {
        assert_eq!(node.depth, expected, "depth must be parent depth + 1");
        check_depths(&node.children, expected + 1);
    }
}

/// **VALUE**: Reproduces the account-chart scenario: a three-level chain.
///
/// **BUG THIS CATCHES**: Depth computed from input position instead of from
/// the parent, or grandchildren attached to the root.
#[test]
fn given_three_level_chain_when_built_then_depths_are_zero_one_two() {
    // GIVEN
    let list = vec![row("1", None), row("2", Some("1")), row("3", Some("2"))];

    // WHEN
    let forest = build(&list);

    // THEN
    assert_eq!(ids(&forest), vec!["1"]);
    let root = &forest[0];
    assert_eq!(root.depth, 0);
    assert_eq!(ids(&root.children), vec!["2"]);
    assert_eq!(root.children[0].depth, 1);
    assert_eq!(ids(&root.children[0].children), vec!["3"]);
    assert_eq!(root.children[0].children[0].depth, 2);
}

#[test]
fn given_child_listed_before_parent_when_built_then_child_is_still_attached() {
    let list = vec![row("leaf", Some("root")), row("root", None)];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["root"]);
    assert_eq!(ids(&forest[0].children), vec!["leaf"]);
    assert_eq!(forest[0].children[0].depth, 1);
}

/// **VALUE**: A parent reference to an id that is not in the list.
///
/// **WHY THIS MATTERS**: Filtered account lists (e.g. only active accounts)
/// routinely drop parents. The orphan must still be shown.
#[test]
fn given_dangling_parent_when_built_then_entity_is_root() {
    let list = vec![row("a", None), row("b", Some("missing"))];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["a", "b"]);
    assert_eq!(forest[1].depth, 0);
    assert_eq!(forest[1].parent_id, Some("missing"), "original reference is kept");
}

#[test]
fn given_self_parent_when_built_then_entity_is_root() {
    let list = vec![row("a", Some("a")), row("b", Some("a"))];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["a"]);
    assert_eq!(ids(&forest[0].children), vec!["b"]);
}

/// **VALUE**: Two entities that name each other as parent.
///
/// **BUG THIS CATCHES**: Infinite loop while walking ancestors, or both
/// entities silently dropped because neither is reachable from a root.
#[test]
fn given_two_cycle_when_built_then_both_are_roots() {
    let list = vec![row("a", Some("b")), row("b", Some("a"))];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["a", "b"]);
    assert!(forest.iter().all(|node| node.depth == 0 && node.is_leaf()));
}

#[test]
fn given_three_cycle_with_tail_when_built_then_cycle_members_are_roots_and_tail_stays_attached() {
    // a -> b -> c -> a, and d hangs off c
    let list = vec![
        row("a", Some("b")),
        row("b", Some("c")),
        row("c", Some("a")),
        row("d", Some("c")),
    ];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["a", "b", "c"]);
    assert_eq!(ids(&forest[2].children), vec!["d"]);
    assert_eq!(forest[2].children[0].depth, 1);
}

/// **VALUE**: Duplicate ids resolve to the last occurrence.
///
/// **WHY THIS MATTERS**: The backend promises unique ids, but a paging bug
/// that repeats a row must not duplicate a subtree or crash the view.
#[test]
fn given_duplicate_ids_when_built_then_last_occurrence_wins_in_its_position() {
    let list = vec![
        labelled("a", None, "first"),
        labelled("b", None, "b"),
        labelled("a", None, "second"),
        labelled("c", Some("a"), "c"),
    ];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["b", "a"]);
    assert_eq!(forest[1].item.label, "second");
    assert_eq!(ids(&forest[1].children), vec!["c"]);
}

#[test]
fn given_siblings_in_input_order_when_built_then_order_is_preserved() {
    let list = vec![
        row("root", None),
        row("z", Some("root")),
        row("m", Some("root")),
        row("a", Some("root")),
        row("other-root", None),
    ];

    let forest = build(&list);

    assert_eq!(ids(&forest), vec!["root", "other-root"]);
    assert_eq!(ids(&forest[0].children), vec!["z", "m", "a"]);
}

#[test]
fn given_empty_list_when_built_then_forest_is_empty() {
    let forest = build::<Numbered>(&[]);

    assert!(forest.is_empty());
}

#[test]
fn given_input_when_built_then_input_is_untouched() {
    let list = vec![row("a", Some("b")), row("b", Some("a")), row("c", Some("a"))];
    let snapshot = list.clone();

    let _ = build(&list);

    assert_eq!(list, snapshot);
}

/// **VALUE**: A chain far deeper than any real chart of accounts.
///
/// **BUG THIS CATCHES**: Recursive assembly or drop overflowing the stack.
#[test]
fn given_very_deep_chain_when_built_then_assembles_without_overflow() {
    let depth = 50_000u32;
    let list: Vec<Numbered> = (0..depth)
        .map(|id| Numbered {
            id,
            parent: id.checked_sub(1),
        })
        .collect();

    let forest = build(&list);

    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].descendant_count(), (depth - 1) as usize);
    let rows = flatten(&forest);
    assert_eq!(rows.last().map(|(d, item)| (*d, item.id)), Some(((depth - 1) as usize, depth - 1)));
}

/// **VALUE**: Count and depth invariants over 200 generated lists full of
/// dangling, self, forward and cyclic references.
#[test]
fn given_generated_lists_when_built_then_every_entity_appears_once_with_consistent_depth() {
    for list in generated_lists() {
        let forest = build(&list);

        let rows = flatten(&forest);
        let seen: HashSet<u32> = rows.iter().map(|(_, item)| item.id).collect();
        assert_eq!(rows.len(), list.len(), "every entity appears: {list:?}");
        assert_eq!(seen.len(), list.len(), "no entity appears twice: {list:?}");

        check_depths(&forest, 0);
    }
}

#[test]
fn given_generated_lists_when_built_then_children_only_hold_entities_naming_that_parent() {
    for list in generated_lists() {
        let forest = build(&list);
        let parent_of: HashMap<u32, Option<u32>> = list.iter().map(|n| (n.id, n.parent)).collect();

        let mut stack: Vec<&HierarchyNode<Numbered>> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            for child in &node.children {
                assert_eq!(parent_of[&child.id], Some(node.id));
            }
            stack.extend(node.children.iter());
        }
    }
}
