//! Propagation of structural fields from a parent down to its children.
//! 由父節點向下傳遞結構欄位的調和流程。

use crate::item::{ChangeSet, FieldValue, NodeKey, StructuralField, TreeNode};
use crate::slug::derive_slug;
use crate::store::{TreeError, TreeStore};

/// Effective values of the parent, captured before its children are rewritten.
struct ParentView {
    id: Option<NodeKey>,
    level: u32,
    group: String,
    path: String,
    allows_children: bool,
    children: Vec<NodeKey>,
}

impl ParentView {
    fn of(node: &TreeNode) -> Self {
        Self {
            id: node.id.clone(),
            level: node.effective_level(),
            group: node.effective_group().to_string(),
            path: node.effective_path().to_string(),
            allows_children: node.allows_children,
            children: node.children.clone(),
        }
    }
}

impl TreeStore {
    /// Re-derives the structural fields of every child of `parent`.
    ///
    /// A child's own children are visited when one of its cascading fields (parent,
    /// level, group, path) differs from what the previous pass staged, or always when
    /// `force_cascade` is set.
    pub fn reconcile(&mut self, parent: &NodeKey, force_cascade: bool) -> Result<(), TreeError> {
        self.reconcile_at(parent, force_cascade, 0)
    }

    fn reconcile_at(
        &mut self,
        parent_key: &NodeKey,
        force_cascade: bool,
        depth: usize,
    ) -> Result<(), TreeError> {
        if depth > self.nodes.len() {
            return Err(TreeError::Cycle(parent_key.clone()));
        }
        let parent = ParentView::of(self.get(parent_key)?);
        tracing::trace!(
            parent = %parent_key,
            children = parent.children.len(),
            force_cascade,
            "reconciling children"
        );

        for (index, child_key) in parent.children.iter().enumerate() {
            let cascade = self.reconcile_child(&parent, index, child_key)?;
            if cascade || force_cascade {
                self.reconcile_at(child_key, force_cascade, depth + 1)?;
            }
        }
        Ok(())
    }

    fn reconcile_child(
        &mut self,
        parent: &ParentView,
        index: usize,
        key: &NodeKey,
    ) -> Result<bool, TreeError> {
        let level = parent.level + 1;
        let allows_children = self
            .groups
            .iter()
            .find(|state| state.group.key == parent.group)
            .ok_or_else(|| TreeError::UnknownGroup(parent.group.clone()))?
            .group
            .allows_children_at(level);

        let settings = &self.settings;
        let node = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| TreeError::NodeNotFound(key.clone()))?;

        let mut next = ChangeSet::default();
        if node.sort != index {
            next.stage(FieldValue::Sort(index));
        }
        if node.parent != parent.id {
            next.stage(FieldValue::Parent(parent.id.clone()));
        }
        if node.level != level {
            next.stage(FieldValue::Level(level));
        }
        if node.group != parent.group {
            next.stage(FieldValue::Group(parent.group.clone()));
        }

        let slug = if node.has_slug() {
            node.slug.clone()
        } else {
            let derived = derive_slug(
                &node.linked_item,
                node.slug_is_key,
                &settings.primary_key,
                settings.slug_field.as_deref(),
            );
            if derived.is_some() {
                next.stage(FieldValue::Slug(derived.clone()));
            }
            derived
        };

        let path = format!("{}/{}", parent.path, slug.as_deref().unwrap_or_default());
        if node.path.as_deref() != Some(path.as_str()) {
            next.stage(FieldValue::Path(path));
        }

        let cascade = StructuralField::CASCADING
            .iter()
            .any(|field| node.pending.get(*field) != next.get(*field));

        node.allows_children = allows_children;
        node.is_dirty = !next.is_empty();
        let owner = next.group().unwrap_or(node.group.as_str()).to_string();
        node.pending = next;
        let is_dirty = node.is_dirty;

        if is_dirty {
            self.dirty.insert(key.clone(), owner);
        } else {
            self.dirty.remove(key);
        }
        if parent.allows_children {
            self.invalid.remove(key);
        } else {
            self.invalid.insert(key.clone());
        }

        Ok(cascade)
    }
}
