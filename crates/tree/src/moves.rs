use serde::{Deserialize, Serialize};

use crate::item::NodeKey;
use crate::store::{TreeError, TreeStore};

/// Slot inside a parent's ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPosition {
    pub parent: NodeKey,
    pub index: usize,
}

impl DropPosition {
    pub fn new(parent: impl Into<NodeKey>, index: usize) -> Self {
        Self {
            parent: parent.into(),
            index,
        }
    }
}

/// Drag-and-drop edit: `item` leaves `from` and lands at `to`.
/// 拖放編輯：`item` 從 `from` 移動到 `to`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropEvent {
    #[serde(rename = "itemId")]
    pub item: NodeKey,
    pub from: DropPosition,
    pub to: DropPosition,
}

impl TreeStore {
    /// Current slot of an item, resolved through its effective parent.
    pub fn position_of(&self, item: &NodeKey) -> Result<DropPosition, TreeError> {
        let node = self.get(item)?;
        if node.is_group_root() {
            return Err(TreeError::RootMove(item.clone()));
        }
        let parent = node
            .effective_parent()
            .cloned()
            .unwrap_or_else(|| NodeKey::from(node.effective_group()));
        let index = self
            .get(&parent)?
            .children
            .iter()
            .position(|child| child == item)
            .ok_or_else(|| TreeError::NodeNotFound(item.clone()))?;
        Ok(DropPosition { parent, index })
    }

    /// Moves `item` to `index` under `to_parent`, looking up where it currently sits.
    pub fn move_item(
        &mut self,
        item: &NodeKey,
        to_parent: &NodeKey,
        index: usize,
    ) -> Result<DropEvent, TreeError> {
        let event = DropEvent {
            item: item.clone(),
            from: self.position_of(item)?,
            to: DropPosition {
                parent: to_parent.clone(),
                index,
            },
        };
        self.apply_move(&event)?;
        Ok(event)
    }

    /// Applies a drop, reconciles the touched parents and refreshes group flags.
    ///
    /// The request is validated up front; a rejected move leaves the store untouched.
    pub fn apply_move(&mut self, event: &DropEvent) -> Result<(), TreeError> {
        self.validate_move(event)?;
        let DropEvent { item, from, to } = event;

        if from.parent != to.parent {
            self.get_mut(&from.parent)?.children.remove(from.index);
            self.get_mut(&to.parent)?.children.insert(to.index, item.clone());
            self.reconcile(&to.parent, false)?;
            self.reconcile(&from.parent, false)?;
        } else {
            let children = &mut self.get_mut(&from.parent)?.children;
            children.remove(from.index);
            children.insert(to.index, item.clone());
            self.reconcile(&from.parent, false)?;
        }
        self.refresh_group_flags();

        tracing::debug!(
            item = %item,
            from = %from.parent,
            to = %to.parent,
            index = to.index,
            dirty = self.dirty.len(),
            "applied move"
        );
        Ok(())
    }

    fn validate_move(&self, event: &DropEvent) -> Result<(), TreeError> {
        let DropEvent { item, from, to } = event;
        if self.get(item)?.is_group_root() {
            return Err(TreeError::RootMove(item.clone()));
        }

        let source = &self.get(&from.parent)?.children;
        if source.get(from.index) != Some(item) {
            return Err(TreeError::StaleSource {
                item: item.clone(),
                parent: from.parent.clone(),
                index: from.index,
            });
        }

        let mut capacity = self.get(&to.parent)?.children.len();
        if from.parent == to.parent {
            capacity -= 1;
        }
        if to.index > capacity {
            return Err(TreeError::IndexOutOfRange {
                parent: to.parent.clone(),
                index: to.index,
            });
        }

        self.ensure_not_descendant(item, &to.parent)
    }

    /// Walks up from `target` and fails if `item` is on the way to the group root.
    fn ensure_not_descendant(&self, item: &NodeKey, target: &NodeKey) -> Result<(), TreeError> {
        let mut current = target.clone();
        for _ in 0..=self.nodes.len() {
            if current == *item {
                return Err(TreeError::CyclicMove {
                    item: item.clone(),
                    target: target.clone(),
                });
            }
            let node = self.get(&current)?;
            if node.is_group_root() {
                return Ok(());
            }
            current = node
                .effective_parent()
                .cloned()
                .unwrap_or_else(|| NodeKey::from(node.effective_group()));
        }
        Err(TreeError::Cycle(target.clone()))
    }
}
