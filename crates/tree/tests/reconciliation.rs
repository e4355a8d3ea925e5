mod common;

use std::collections::BTreeMap;

use common::{assert_invariants, key, persisted, registry, MemoryClient};
use serde_json::json;
use treeview_tree::{
    ChangeSet, FieldValue, FlushError, NodeKey, SourceItem, StructuralField, TreeSettings,
    TreeStore,
};

fn forest() -> Vec<SourceItem> {
    vec![
        persisted("a", "ungrouped", None, &["a1", "a2"], 0, 1, "/a"),
        persisted("a1", "ungrouped", Some("a"), &["a11"], 0, 2, "/a/a1"),
        persisted("a11", "ungrouped", Some("a1"), &[], 0, 3, "/a/a1/a11"),
        persisted("a2", "ungrouped", Some("a"), &["a21"], 1, 2, "/a/a2"),
        persisted("a21", "ungrouped", Some("a2"), &[], 0, 3, "/a/a2/a21"),
        persisted("b", "ungrouped", None, &[], 1, 1, "/b"),
        persisted("m", "menu", None, &["m1"], 0, 1, "/m"),
        persisted("m1", "menu", Some("m"), &[], 0, 2, "/m/m1"),
    ]
}

fn settings() -> TreeSettings {
    TreeSettings {
        primary_key: "id".into(),
        slug_field: Some("title".into()),
        collapsed: Vec::new(),
    }
}

fn build(items: &[SourceItem]) -> TreeStore {
    let mut store = TreeStore::new(settings());
    store
        .rebuild(&registry(&[("menu", 2)]), items)
        .expect("rebuild");
    assert_invariants(&store);
    store
}

fn pending_snapshot(store: &TreeStore) -> BTreeMap<NodeKey, ChangeSet> {
    store
        .nodes()
        .map(|(key, node)| (key.clone(), node.pending.clone()))
        .collect()
}

#[test]
fn consistent_records_build_a_clean_store() {
    let store = build(&forest());

    assert!(store.dirty_ledger().is_empty());
    assert!(store.invalid_items().is_empty());
    assert!(store.groups().iter().all(|state| !state.has_dirty));

    let m1 = store.get(&key("m1")).unwrap();
    assert!(!m1.allows_children, "level 2 is the last level of a max-level-2 group");
    assert!(store.get(&key("m")).unwrap().allows_children);
    assert!(store.get(&key("a11")).unwrap().allows_children);
}

#[test]
fn moving_a_subtree_dirties_it_under_its_new_group() {
    let mut store = build(&forest());

    store.move_item(&key("a2"), &key("m"), 1).unwrap();
    assert_invariants(&store);

    let ledger: Vec<(&str, &str)> = store
        .dirty_ledger()
        .iter()
        .map(|(key, group)| (key.as_str(), group.as_str()))
        .collect();
    assert_eq!(ledger, vec![("a2", "menu"), ("a21", "menu")]);

    let a2 = store.get(&key("a2")).unwrap();
    assert_eq!(a2.pending.parent(), Some(Some(&key("m"))));
    assert_eq!(a2.pending.group(), Some("menu"));
    assert_eq!(a2.pending.path(), Some("/m/a2"));
    assert!(!a2.pending.contains(StructuralField::Level));
    assert!(!a2.pending.contains(StructuralField::Sort));

    let a21 = store.get(&key("a21")).unwrap();
    assert_eq!(a21.effective_path(), "/m/a2/a21");
    assert_eq!(a21.effective_level(), 3);
    assert!(store.invalid_items().contains(&key("a21")));

    let menu = store.group("menu").unwrap();
    assert!(menu.has_dirty);
    assert!(!store.group("ungrouped").unwrap().has_dirty);
}

#[test]
fn moving_back_restores_a_clean_store() {
    let mut store = build(&forest());

    store.move_item(&key("a2"), &key("m"), 1).unwrap();
    store.move_item(&key("a2"), &key("a"), 1).unwrap();
    assert_invariants(&store);

    assert!(store.dirty_ledger().is_empty());
    assert!(store.invalid_items().is_empty());
    assert!(store.groups().iter().all(|state| !state.has_dirty));
}

#[test]
fn moving_a_leaf_does_not_cascade_into_shifted_siblings() {
    let mut store = build(&forest());

    store.move_item(&key("b"), &key("a"), 0).unwrap();
    assert_invariants(&store);

    let dirty: Vec<&str> = store.dirty_ledger().keys().map(NodeKey::as_str).collect();
    assert_eq!(dirty, vec!["a1", "a2", "b"]);

    let a1 = store.get(&key("a1")).unwrap();
    assert_eq!(a1.pending.fields().collect::<Vec<_>>(), vec![StructuralField::Sort]);
    assert!(store.get(&key("a11")).unwrap().pending.is_empty());
    assert!(store.get(&key("a21")).unwrap().pending.is_empty());

    let b = store.get(&key("b")).unwrap();
    assert_eq!(b.effective_path(), "/a/b");
    assert_eq!(b.effective_level(), 2);
    assert_eq!(b.effective_sort(), 0);
}

#[test]
fn reconciling_again_stages_nothing_new() {
    let mut store = build(&forest());
    store.move_item(&key("a2"), &key("m"), 0).unwrap();
    store.move_item(&key("b"), &key("a1"), 1).unwrap();

    let before = pending_snapshot(&store);
    let ledger = store.dirty_ledger().clone();

    store.reconcile(&key("ungrouped"), false).unwrap();
    store.reconcile(&key("menu"), false).unwrap();
    store.reconcile(&key("a1"), false).unwrap();
    assert_eq!(pending_snapshot(&store), before);

    store.reconcile(&key("ungrouped"), true).unwrap();
    store.reconcile(&key("menu"), true).unwrap();
    assert_eq!(pending_snapshot(&store), before);
    assert_eq!(store.dirty_ledger(), &ledger);
    assert_invariants(&store);
}

#[test]
fn populated_slugs_survive_every_move() {
    let mut store = build(&forest());

    for (parent, index) in [("a", 2), ("m1", 0), ("a11", 0), ("ungrouped", 1)] {
        store.move_item(&key("b"), &key(parent), index).unwrap();
        assert_invariants(&store);
        let b = store.get(&key("b")).unwrap();
        assert_eq!(b.slug.as_deref(), Some("b"));
        assert!(!b.pending.contains(StructuralField::Slug));
        assert!(b.effective_path().ends_with("/b"));
    }
    assert!(store.dirty_ledger().is_empty());
}

#[test]
fn empty_slugs_are_generated_once_from_the_source_field() {
    let mut items = forest();
    items.push(SourceItem {
        group: Some("ungrouped".into()),
        rel_item: json!({ "id": "n", "title": "  Fresh_Page! " }),
        ..SourceItem::new("n")
    });
    let mut store = build(&items);

    let n = store.get(&key("n")).unwrap();
    assert_eq!(n.pending.slug(), Some(Some("fresh-page")));
    assert_eq!(n.effective_path(), "/fresh-page");
    assert_eq!(n.effective_sort(), 2);
    assert_eq!(store.dirty_ledger().get(&key("n")).map(String::as_str), Some("ungrouped"));

    store.move_item(&key("n"), &key("a1"), 0).unwrap();
    let n = store.get(&key("n")).unwrap();
    assert_eq!(n.pending.slug(), Some(Some("fresh-page")));
    assert_eq!(n.effective_path(), "/a/a1/fresh-page");
    assert_invariants(&store);
}

#[test]
fn over_depth_items_are_tracked_and_block_flushing() {
    let mut store = build(&forest());

    store.move_item(&key("b"), &key("m1"), 0).unwrap();
    assert_invariants(&store);
    assert_eq!(
        store.invalid_items().iter().collect::<Vec<_>>(),
        vec![&key("b")]
    );
    assert!(!store.get(&key("b")).unwrap().allows_children);

    let mut client = MemoryClient::default();
    let err = store.flush(&mut client, "pages_tree").unwrap_err();
    assert!(matches!(err, FlushError::InvalidDepth(1)));
    assert!(client.batches.is_empty());

    store.move_item(&key("b"), &key("ungrouped"), 1).unwrap();
    assert!(!store.has_invalid_items());
    assert!(store.dirty_ledger().is_empty());
}

#[test]
fn moving_a_subtree_out_of_an_over_depth_position_clears_it() {
    let mut store = build(&forest());

    store.move_item(&key("a1"), &key("m1"), 0).unwrap();
    let invalid: Vec<&str> = store.invalid_items().iter().map(NodeKey::as_str).collect();
    assert_eq!(invalid, vec!["a1", "a11"]);

    store.move_item(&key("a1"), &key("m"), 0).unwrap();
    let invalid: Vec<&str> = store.invalid_items().iter().map(NodeKey::as_str).collect();
    assert_eq!(invalid, vec!["a11"], "level 3 is still too deep for menu");

    store.move_item(&key("a1"), &key("a"), 0).unwrap();
    assert!(!store.has_invalid_items());
    assert_invariants(&store);
}

#[test]
fn category_example_follows_group_depth() {
    let items = vec![
        SourceItem {
            group: Some("cat".into()),
            slug: Some("a".into()),
            rel_item: json!({ "id": "A", "title": "A" }),
            ..SourceItem::new("A")
        },
        SourceItem {
            rel_item: json!({ "id": "B", "title": "B" }),
            ..SourceItem::new("B")
        },
        SourceItem {
            rel_item: json!({ "id": "C", "title": "C" }),
            ..SourceItem::new("C")
        },
    ];

    let mut store = TreeStore::new(settings());
    store.rebuild(&registry(&[("cat", 2)]), &items).unwrap();
    store.move_item(&key("B"), &key("A"), 0).unwrap();

    let b = store.get(&key("B")).unwrap();
    assert_eq!(b.effective_level(), 2);
    assert_eq!(b.effective_path(), "/a/b");
    assert_eq!(b.effective_group(), "cat");
    assert!(!store.has_invalid_items());

    store.move_item(&key("C"), &key("B"), 0).unwrap();
    assert!(store.invalid_items().contains(&key("C")));
    assert_invariants(&store);

    let mut shallow = TreeStore::new(settings());
    shallow.rebuild(&registry(&[("cat", 1)]), &items).unwrap();
    shallow.move_item(&key("B"), &key("A"), 0).unwrap();
    assert!(shallow.invalid_items().contains(&key("B")));
}

#[test]
fn pending_updates_project_staged_columns() {
    let mut store = build(&forest());
    store.move_item(&key("b"), &key("m"), 0).unwrap();

    let updates = store.pending_updates().unwrap();
    let payloads: Vec<_> = updates.iter().map(|update| update.to_payload()).collect();
    assert_eq!(
        payloads,
        vec![
            json!({ "id": "b", "rel_parent": "m", "sort": 0, "level": 2, "group": "menu", "path": "/m/b" }),
            json!({ "id": "m1", "sort": 1 }),
        ]
    );
    assert_eq!(
        updates[1].changes.iter().collect::<Vec<_>>(),
        vec![&FieldValue::Sort(1)]
    );
}
