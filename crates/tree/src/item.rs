use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use treeview_model::{FieldKey, Group, UNGROUPED};

/// Key of a node inside the tree store: a record id, or a group key for group roots.
/// 樹狀儲存中節點的鍵值：紀錄識別碼，或群組根節點的群組鍵。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tree record as returned by the data-access client.
///
/// Freshly provisioned records only carry `rel_item`, so every structural column
/// tolerates `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: NodeKey,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub rel_parent: Option<NodeKey>,
    #[serde(default, deserialize_with = "nullable")]
    pub rels_children: Vec<NodeKey>,
    #[serde(default)]
    pub sort: Option<usize>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub slug_is_key: bool,
    #[serde(default)]
    pub path: Option<String>,
    /// Linked content record; an object when its fields were requested.
    #[serde(default)]
    pub rel_item: Value,
}

impl SourceItem {
    pub fn new(id: impl Into<NodeKey>) -> Self {
        Self {
            id: id.into(),
            group: None,
            level: None,
            rel_parent: None,
            rels_children: Vec::new(),
            sort: None,
            slug: None,
            slug_is_key: false,
            path: None,
            rel_item: Value::Null,
        }
    }

    pub fn group_key(&self) -> &str {
        self.group.as_deref().unwrap_or(UNGROUPED)
    }
}

/// The six columns the reconciliation engine may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructuralField {
    Sort,
    Parent,
    Level,
    Group,
    Slug,
    Path,
}

impl StructuralField {
    /// Fields whose change forces the children of a node to be reconciled again.
    pub const CASCADING: [StructuralField; 4] = [
        StructuralField::Parent,
        StructuralField::Level,
        StructuralField::Group,
        StructuralField::Path,
    ];

    pub fn key(self) -> FieldKey {
        match self {
            StructuralField::Sort => FieldKey::Sort,
            StructuralField::Parent => FieldKey::RelParent,
            StructuralField::Level => FieldKey::Level,
            StructuralField::Group => FieldKey::Group,
            StructuralField::Slug => FieldKey::Slug,
            StructuralField::Path => FieldKey::Path,
        }
    }
}

/// Typed value staged for a structural field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Sort(usize),
    Parent(Option<NodeKey>),
    Level(u32),
    Group(String),
    Slug(Option<String>),
    Path(String),
}

impl FieldValue {
    pub fn field(&self) -> StructuralField {
        match self {
            FieldValue::Sort(_) => StructuralField::Sort,
            FieldValue::Parent(_) => StructuralField::Parent,
            FieldValue::Level(_) => StructuralField::Level,
            FieldValue::Group(_) => StructuralField::Group,
            FieldValue::Slug(_) => StructuralField::Slug,
            FieldValue::Path(_) => StructuralField::Path,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Sort(sort) => Value::from(*sort),
            FieldValue::Parent(parent) => parent
                .as_ref()
                .map_or(Value::Null, |key| Value::from(key.as_str())),
            FieldValue::Level(level) => Value::from(*level),
            FieldValue::Group(group) => Value::from(group.as_str()),
            FieldValue::Slug(slug) => slug.as_deref().map_or(Value::Null, Value::from),
            FieldValue::Path(path) => Value::from(path.as_str()),
        }
    }
}

/// Pending changes of one node, diffed against its last persisted values.
/// 單一節點相對於上次儲存值的待寫入變更。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    values: BTreeMap<StructuralField, FieldValue>,
}

impl ChangeSet {
    pub fn stage(&mut self, value: FieldValue) {
        self.values.insert(value.field(), value);
    }

    pub fn get(&self, field: StructuralField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn contains(&self, field: StructuralField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = StructuralField> + '_ {
        self.values.keys().copied()
    }

    pub fn sort(&self) -> Option<usize> {
        match self.get(StructuralField::Sort) {
            Some(FieldValue::Sort(sort)) => Some(*sort),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<Option<&NodeKey>> {
        match self.get(StructuralField::Parent) {
            Some(FieldValue::Parent(parent)) => Some(parent.as_ref()),
            _ => None,
        }
    }

    pub fn level(&self) -> Option<u32> {
        match self.get(StructuralField::Level) {
            Some(FieldValue::Level(level)) => Some(*level),
            _ => None,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self.get(StructuralField::Group) {
            Some(FieldValue::Group(group)) => Some(group),
            _ => None,
        }
    }

    pub fn slug(&self) -> Option<Option<&str>> {
        match self.get(StructuralField::Slug) {
            Some(FieldValue::Slug(slug)) => Some(slug.as_deref()),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self.get(StructuralField::Path) {
            Some(FieldValue::Path(path)) => Some(path),
            _ => None,
        }
    }

    /// Column/value pairs ready to be merged into an update payload.
    pub fn to_json(&self) -> Map<String, Value> {
        self.values
            .values()
            .map(|value| (value.field().key().column().to_string(), value.to_json()))
            .collect()
    }
}

/// Entry of the tree store.
///
/// The structural fields (`group`, `level`, `parent`, `sort`, `slug`, `path`) hold the
/// last persisted values; what the tree currently shows is the staged value from
/// `pending` when present. `children` is always authoritative.
///
/// 樹狀儲存中的節點；結構欄位保留最後儲存的值，`pending` 內為待寫入的新值。
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// `None` for synthetic group roots.
    pub id: Option<NodeKey>,
    pub group: String,
    pub level: u32,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
    pub sort: usize,
    pub slug: Option<String>,
    pub slug_is_key: bool,
    pub path: Option<String>,
    pub linked_item: Value,
    pub is_dirty: bool,
    pub pending: ChangeSet,
    pub is_expanded: bool,
    pub allows_children: bool,
}

impl TreeNode {
    pub(crate) fn group_root(group: &Group) -> Self {
        Self {
            id: None,
            group: group.key.clone(),
            level: 0,
            parent: None,
            children: Vec::new(),
            sort: 0,
            slug: None,
            slug_is_key: false,
            path: Some(String::new()),
            linked_item: Value::Null,
            is_dirty: false,
            pending: ChangeSet::default(),
            is_expanded: true,
            allows_children: true,
        }
    }

    pub(crate) fn from_source(item: &SourceItem, collapsed: bool) -> Self {
        Self {
            id: Some(item.id.clone()),
            group: item.group_key().to_string(),
            level: item.level.unwrap_or_default(),
            parent: item.rel_parent.clone(),
            children: item.rels_children.clone(),
            sort: item.sort.unwrap_or_default(),
            slug: item.slug.clone(),
            slug_is_key: item.slug_is_key,
            path: item.path.clone(),
            linked_item: item.rel_item.clone(),
            is_dirty: false,
            pending: ChangeSet::default(),
            is_expanded: !collapsed && !item.rels_children.is_empty(),
            allows_children: false,
        }
    }

    pub fn is_group_root(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_slug(&self) -> bool {
        self.slug.as_deref().is_some_and(|slug| !slug.is_empty())
    }

    pub fn effective_sort(&self) -> usize {
        self.pending.sort().unwrap_or(self.sort)
    }

    pub fn effective_parent(&self) -> Option<&NodeKey> {
        self.pending.parent().unwrap_or(self.parent.as_ref())
    }

    pub fn effective_level(&self) -> u32 {
        self.pending.level().unwrap_or(self.level)
    }

    pub fn effective_group(&self) -> &str {
        self.pending.group().unwrap_or(self.group.as_str())
    }

    pub fn effective_slug(&self) -> Option<&str> {
        self.pending.slug().unwrap_or(self.slug.as_deref())
    }

    pub fn effective_path(&self) -> &str {
        self.pending
            .path()
            .or(self.path.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_item_accepts_null_columns() {
        let item: SourceItem = serde_json::from_value(json!({
            "id": "a",
            "group": null,
            "level": null,
            "rel_parent": null,
            "rels_children": null,
            "sort": null,
            "slug": null,
            "slug_is_key": null,
            "path": null,
            "rel_item": { "id": 4, "title": "About" },
        }))
        .unwrap();

        assert_eq!(item.group_key(), UNGROUPED);
        assert!(item.rels_children.is_empty());
        assert!(!item.slug_is_key);
        assert_eq!(item.rel_item["title"], json!("About"));
    }

    #[test]
    fn change_set_projects_column_names() {
        let mut changes = ChangeSet::default();
        changes.stage(FieldValue::Parent(None));
        changes.stage(FieldValue::Sort(2));
        changes.stage(FieldValue::Slug(Some("about".into())));

        let payload = Value::Object(changes.to_json());
        assert_eq!(
            payload,
            json!({ "rel_parent": null, "sort": 2, "slug": "about" })
        );
        assert_eq!(changes.parent(), Some(None));
        assert_eq!(changes.level(), None);
    }

    #[test]
    fn effective_values_prefer_pending_changes() {
        let mut node = TreeNode::from_source(&SourceItem::new("a"), false);
        node.path = Some("/old".into());
        node.pending.stage(FieldValue::Path("/new".into()));
        node.pending.stage(FieldValue::Level(3));

        assert_eq!(node.effective_path(), "/new");
        assert_eq!(node.effective_level(), 3);
        assert_eq!(node.effective_group(), UNGROUPED);
        assert!(!node.is_expanded);
    }
}
