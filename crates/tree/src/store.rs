use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;
use treeview_model::{Group, GroupRegistry};

use crate::item::{NodeKey, SourceItem, TreeNode};

/// Tree-store errors. Lookups of unknown keys mean the store is already inconsistent.
/// 樹狀儲存錯誤；查無節點代表儲存狀態已不一致。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} not found")]
    NodeNotFound(NodeKey),
    #[error("group \"{0}\" is not configured")]
    UnknownGroup(String),
    #[error("parent links below {0} form a cycle")]
    Cycle(NodeKey),
    #[error("node {0} is a group root and cannot be moved")]
    RootMove(NodeKey),
    #[error("node {item} is not at index {index} of {parent}")]
    StaleSource {
        item: NodeKey,
        parent: NodeKey,
        index: usize,
    },
    #[error("index {index} is out of range for children of {parent}")]
    IndexOutOfRange { parent: NodeKey, index: usize },
    #[error("node {item} cannot be moved below itself (target {target})")]
    CyclicMove { item: NodeKey, target: NodeKey },
}

/// Configured group plus whether any of its items has unsaved changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupState {
    pub group: Group,
    pub has_dirty: bool,
}

/// Inputs that shape derived node state besides the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSettings {
    /// Primary key field of the linked content record, used for key-derived slugs.
    pub primary_key: String,
    /// Linked content field that slugs are generated from.
    pub slug_field: Option<String>,
    /// Items that start collapsed.
    pub collapsed: Vec<String>,
}

/// In-memory forest of tree records, one synthetic root per group.
///
/// Every mutation goes through [`TreeStore::rebuild`] or [`TreeStore::apply_move`], each
/// of which leaves the dirty and validity ledgers consistent with the nodes.
///
/// 以群組為根的記憶體樹狀結構；僅能透過重建或移動來修改。
#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    pub(crate) nodes: HashMap<NodeKey, TreeNode>,
    pub(crate) groups: Vec<GroupState>,
    pub(crate) settings: TreeSettings,
    pub(crate) dirty: BTreeMap<NodeKey, String>,
    pub(crate) invalid: BTreeSet<NodeKey>,
}

impl TreeStore {
    pub fn new(settings: TreeSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    /// Replaces the settings; they take effect on the next rebuild.
    pub fn set_settings(&mut self, settings: TreeSettings) {
        self.settings = settings;
    }

    pub fn get(&self, key: &NodeKey) -> Result<&TreeNode, TreeError> {
        self.nodes
            .get(key)
            .ok_or_else(|| TreeError::NodeNotFound(key.clone()))
    }

    pub(crate) fn get_mut(&mut self, key: &NodeKey) -> Result<&mut TreeNode, TreeError> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| TreeError::NodeNotFound(key.clone()))
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Clears the store and repopulates it from `items`, then reconciles every group
    /// root with a forced cascade.
    ///
    /// The store is only replaced when the whole build succeeds.
    pub fn rebuild(&mut self, groups: &GroupRegistry, items: &[SourceItem]) -> Result<(), TreeError> {
        let mut next = TreeStore::new(self.settings.clone());
        next.groups = groups
            .iter()
            .map(|group| GroupState {
                group: group.clone(),
                has_dirty: false,
            })
            .collect();

        for group in groups.iter() {
            next.nodes
                .insert(NodeKey::from(group.key.as_str()), TreeNode::group_root(group));
        }

        for item in items {
            let collapsed = next.settings.collapsed.iter().any(|id| id == item.id.as_str());
            let node = TreeNode::from_source(item, collapsed);
            if item.rel_parent.is_none() {
                let root_key = NodeKey::from(item.group_key());
                next.nodes
                    .get_mut(&root_key)
                    .ok_or_else(|| TreeError::UnknownGroup(item.group_key().to_string()))?
                    .children
                    .push(item.id.clone());
            }
            next.nodes.insert(item.id.clone(), node);
        }

        let roots: Vec<NodeKey> = groups.keys().map(NodeKey::from).collect();
        for root in &roots {
            next.reconcile(root, true)?;
        }
        next.refresh_group_flags();

        tracing::info!(
            groups = next.groups.len(),
            items = items.len(),
            dirty = next.dirty.len(),
            invalid = next.invalid.len(),
            "tree store rebuilt"
        );
        let blank = next.blank_slugs();
        if !blank.is_empty() {
            tracing::warn!(count = blank.len(), "items without a slug produce empty path segments");
        }

        *self = next;
        Ok(())
    }

    /// Recomputes every group's dirty flag from the dirty ledger.
    pub(crate) fn refresh_group_flags(&mut self) {
        for state in &mut self.groups {
            state.has_dirty = self.dirty.values().any(|group| *group == state.group.key);
        }
    }

    pub fn groups(&self) -> &[GroupState] {
        &self.groups
    }

    pub fn group(&self, key: &str) -> Option<&GroupState> {
        self.groups.iter().find(|state| state.group.key == key)
    }

    /// Group roots in configuration order.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.groups
            .iter()
            .filter_map(|state| self.nodes.get(state.group.key.as_str()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &TreeNode)> {
        self.nodes.iter()
    }

    /// Number of nodes, group roots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of real records, group roots excluded.
    pub fn item_count(&self) -> usize {
        self.nodes.values().filter(|node| !node.is_group_root()).count()
    }

    /// Items with unsaved changes, mapped to the group they will belong to.
    pub fn dirty_ledger(&self) -> &BTreeMap<NodeKey, String> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Items sitting deeper than their group allows.
    pub fn invalid_items(&self) -> &BTreeSet<NodeKey> {
        &self.invalid
    }

    pub fn has_invalid_items(&self) -> bool {
        !self.invalid.is_empty()
    }

    /// Items whose effective slug is empty, sorted by key.
    pub fn blank_slugs(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .nodes
            .iter()
            .filter(|(_, node)| {
                !node.is_group_root() && node.effective_slug().map_or(true, str::is_empty)
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Flips the expansion flag of a node and returns the new value.
    pub fn toggle_expanded(&mut self, key: &NodeKey) -> Result<bool, TreeError> {
        let node = self.get_mut(key)?;
        node.is_expanded = !node.is_expanded;
        Ok(node.is_expanded)
    }

    /// Records with children that are currently collapsed, sorted by key.
    pub fn collapsed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .nodes
            .values()
            .filter(|node| !node.is_expanded && !node.children.is_empty())
            .filter_map(|node| node.id.as_ref().map(|id| id.as_str().to_string()))
            .collect();
        ids.sort();
        ids
    }
}
