#![allow(dead_code)]

use serde_json::{json, Value};
use treeview_model::{
    default_definitions, ClientError, DataClient, FieldDefinition, FieldKey, Group, GroupRegistry,
    ItemQuery,
};
use treeview_tree::{NodeKey, SourceItem, TreeStore};

pub fn key(value: &str) -> NodeKey {
    NodeKey::from(value)
}

/// Registry with `ungrouped` plus the given `(key, max_level)` groups.
pub fn registry(groups: &[(&str, u32)]) -> GroupRegistry {
    let mut all = vec![Group::ungrouped()];
    all.extend(
        groups
            .iter()
            .map(|(key, max_level)| Group::new(*key, key.to_uppercase(), *max_level)),
    );
    GroupRegistry::from_groups(all).expect("valid registry")
}

/// Record whose persisted fields are already consistent with its position.
pub fn persisted(
    id: &str,
    group: &str,
    parent: Option<&str>,
    children: &[&str],
    sort: usize,
    level: u32,
    path: &str,
) -> SourceItem {
    SourceItem {
        group: Some(group.to_string()),
        level: Some(level),
        rel_parent: parent.map(NodeKey::from),
        rels_children: children.iter().copied().map(NodeKey::from).collect(),
        sort: Some(sort),
        slug: path.rsplit('/').next().map(str::to_string),
        path: Some(path.to_string()),
        rel_item: json!({ "id": id, "title": id.to_uppercase() }),
        ..SourceItem::new(id)
    }
}

/// Checks every structural invariant on all nodes reachable from a group root.
pub fn assert_invariants(store: &TreeStore) {
    let mut seen = 0;
    for root in store.roots() {
        let root_key = NodeKey::from(root.group.as_str());
        seen += check_children(store, &root_key);
    }
    assert_eq!(seen, store.item_count(), "every item is reachable from a group root");

    for (key, node) in store.nodes() {
        if node.is_group_root() {
            continue;
        }
        assert_eq!(node.is_dirty, !node.pending.is_empty(), "dirty flag of {key}");
        match store.dirty_ledger().get(key) {
            Some(group) => {
                assert!(node.is_dirty, "{key} is in the dirty ledger but clean");
                assert_eq!(group, node.effective_group(), "ledger group of {key}");
            }
            None => assert!(!node.is_dirty, "{key} is dirty but not in the ledger"),
        }
    }
    for state in store.groups() {
        let expected = store
            .dirty_ledger()
            .values()
            .any(|group| *group == state.group.key);
        assert_eq!(state.has_dirty, expected, "dirty flag of group {}", state.group.key);
    }
}

fn check_children(store: &TreeStore, parent_key: &NodeKey) -> usize {
    let parent = store.get(parent_key).expect("parent exists");
    let mut count = 0;
    for (index, child_key) in parent.children.iter().enumerate() {
        let child = store.get(child_key).expect("child exists");
        assert_eq!(child.effective_parent(), parent.id.as_ref(), "parent of {child_key}");
        assert_eq!(child.effective_sort(), index, "sort of {child_key}");
        assert_eq!(child.effective_level(), parent.effective_level() + 1, "level of {child_key}");
        assert_eq!(child.effective_group(), parent.effective_group(), "group of {child_key}");
        assert_eq!(
            child.effective_path(),
            format!(
                "{}/{}",
                parent.effective_path(),
                child.effective_slug().unwrap_or_default()
            ),
            "path of {child_key}"
        );

        let group = &store
            .group(child.effective_group())
            .expect("group is configured")
            .group;
        assert_eq!(
            child.allows_children,
            group.allows_children_at(child.effective_level()),
            "allows_children of {child_key}"
        );
        assert_eq!(
            store.invalid_items().contains(child_key),
            !parent.allows_children,
            "validity of {child_key}"
        );
        count += 1 + check_children(store, child_key);
    }
    count
}

pub const CONTENT: &str = "pages";
pub const TREE: &str = "pages_tree";

/// Tree collection definitions as the host reports them, with the given group choices.
pub fn schema(choices: Value) -> Vec<FieldDefinition> {
    let mut definitions = default_definitions(TREE, "string");
    for definition in &mut definitions {
        match definition.key() {
            Some(FieldKey::RelItem) => definition.schema["foreign_key_table"] = json!(CONTENT),
            Some(FieldKey::RelParent) => definition.schema["foreign_key_table"] = json!(TREE),
            Some(FieldKey::Group) => definition.meta["options"]["choices"] = choices.clone(),
            _ => {}
        }
    }
    definitions
}

/// In-memory stand-in for the host's data API.
///
/// Batch updates are merged into the stored records and the `rels_children` alias is
/// recomputed from `rel_parent` and `sort`, like the host does on read.
#[derive(Debug, Default)]
pub struct MemoryClient {
    pub records: Vec<Value>,
    pub batches: Vec<Vec<Value>>,
    pub reads: usize,
    pub fail_updates: bool,
    pub created: Vec<String>,
}

impl MemoryClient {
    pub fn new(items: &[SourceItem]) -> Self {
        Self {
            records: items
                .iter()
                .map(|item| serde_json::to_value(item).expect("serializable item"))
                .collect(),
            ..Self::default()
        }
    }

    fn relink_children(&mut self) {
        let mut links: Vec<(String, u64, String)> = self
            .records
            .iter()
            .filter_map(|record| {
                let parent = record["rel_parent"].as_str()?.to_string();
                let sort = record["sort"].as_u64().unwrap_or_default();
                let id = record["id"].as_str()?.to_string();
                Some((parent, sort, id))
            })
            .collect();
        links.sort();
        for record in &mut self.records {
            let id = record["id"].as_str().unwrap_or_default().to_string();
            let children: Vec<Value> = links
                .iter()
                .filter(|(parent, _, _)| *parent == id)
                .map(|(_, _, child)| json!(child))
                .collect();
            record["rels_children"] = Value::Array(children);
        }
    }
}

impl DataClient for MemoryClient {
    fn read_items(&mut self, _collection: &str, _query: &ItemQuery) -> Result<Vec<Value>, ClientError> {
        self.reads += 1;
        let mut records = self.records.clone();
        records.sort_by_key(|record| {
            (
                record["group"].as_str().unwrap_or_default().to_string(),
                record["level"].as_u64().unwrap_or_default(),
                record["sort"].as_u64().unwrap_or_default(),
            )
        });
        Ok(records)
    }

    fn update_batch(&mut self, collection: &str, updates: Vec<Value>) -> Result<(), ClientError> {
        if self.fail_updates {
            return Err(ClientError::request(collection, "connection reset"));
        }
        for update in &updates {
            let id = update["id"].clone();
            let record = self
                .records
                .iter_mut()
                .find(|record| record["id"] == id)
                .ok_or_else(|| ClientError::request(collection, format!("unknown record {id}")))?;
            if let (Some(target), Some(fields)) = (record.as_object_mut(), update.as_object()) {
                for (field, value) in fields {
                    target.insert(field.clone(), value.clone());
                }
            }
        }
        self.batches.push(updates);
        self.relink_children();
        Ok(())
    }

    fn create_collection(&mut self, payload: Value) -> Result<(), ClientError> {
        self.created.push(format!("collection:{}", payload["collection"]));
        Ok(())
    }

    fn create_field(&mut self, collection: &str, _payload: Value) -> Result<(), ClientError> {
        self.created.push(format!("field:{collection}"));
        Ok(())
    }

    fn create_relation(&mut self, payload: Value) -> Result<(), ClientError> {
        self.created.push(format!("relation:{}", payload["field"]));
        Ok(())
    }

    fn create_items(&mut self, collection: &str, items: Vec<Value>) -> Result<(), ClientError> {
        self.created.push(format!("items:{collection}:{}", items.len()));
        Ok(())
    }
}
