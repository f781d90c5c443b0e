use super::row;
use crate::hierarchy::{build, descendant_ids, find, flatten};

fn chart() -> Vec<super::Row> {
    vec![
        row("assets", None),
        row("cash", Some("assets")),
        row("petty-cash", Some("cash")),
        row("receivables", Some("assets")),
        row("liabilities", None),
        row("payables", Some("liabilities")),
    ]
}

#[test]
fn given_forest_when_flattened_then_rows_are_pre_order_with_depths() {
    let forest = build(&chart());

    let rows: Vec<(usize, &str)> = flatten(&forest)
        .into_iter()
        .map(|(depth, item)| (depth, item.id))
        .collect();

    assert_eq!(
        rows,
        vec![
            (0, "assets"),
            (1, "cash"),
            (2, "petty-cash"),
            (1, "receivables"),
            (0, "liabilities"),
            (1, "payables"),
        ]
    );
}

/// **VALUE**: Parent pickers exclude a node's own subtree.
///
/// **BUG THIS CATCHES**: Only direct children excluded, letting a user move
/// "assets" under "petty-cash" and create a cycle server-side.
#[test]
fn given_forest_when_descendants_requested_then_whole_subtree_is_returned() {
    let forest = build(&chart());

    let descendants = descendant_ids(&forest, &"assets");

    assert_eq!(descendants, vec!["cash", "petty-cash", "receivables"]);
}

#[test]
fn given_unknown_id_when_descendants_requested_then_empty() {
    let forest = build(&chart());

    assert!(descendant_ids(&forest, &"equity").is_empty());
    assert!(find(&forest, &"equity").is_none());
}

#[test]
fn given_nested_id_when_found_then_node_carries_depth_and_children() {
    let forest = build(&chart());

    let cash = find(&forest, &"cash").expect("cash is in the chart");

    assert_eq!(cash.depth, 1);
    assert_eq!(cash.descendant_count(), 1);
    assert!(!cash.is_leaf());
}
