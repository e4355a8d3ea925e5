//! Editing session over one tree collection: loading, moving, saving and provisioning.
//! 單一樹狀集合的編輯工作階段：載入、移動、儲存與建立模型。

use thiserror::Error;
use treeview_model::{
    provision_model, tree_item_query, validate_fields, ClientError, ConfigError, DataClient,
    FieldDefinition, FieldKey, GroupRegistry, LayoutOptions, ModelContext, PermissionAction,
    Permissions, ProvisionReport, ProvisionRequest, SchemaError,
};

use crate::flush::FlushError;
use crate::item::{NodeKey, SourceItem};
use crate::moves::DropEvent;
use crate::notice::UserNotice;
use crate::store::{TreeError, TreeSettings, TreeStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("missing {0:?} permission on the tree collection")]
    Forbidden(PermissionAction),
    #[error("only administrators can create a tree model")]
    AdminOnly,
    #[error("edit mode is off")]
    NotEditing,
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Flush(#[from] FlushError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("tree record could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Host-provided facts about the content collection and the current user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub content_collection: String,
    pub content_primary_key: String,
    pub content_primary_key_type: String,
    /// Field definitions of the tree collection as currently known to the host.
    pub schema: Vec<FieldDefinition>,
    pub permissions: Permissions,
}

/// Owns the tree store and serializes every edit against it.
///
/// Moves are only accepted in edit mode and with update permission; a save flushes the
/// dirty ledger and then reloads from the data client, which also leaves edit mode.
pub struct TreeSession<C> {
    client: C,
    context: SessionContext,
    options: LayoutOptions,
    store: TreeStore,
    editing: bool,
}

impl<C: DataClient> TreeSession<C> {
    pub fn new(client: C, context: SessionContext, mut options: LayoutOptions) -> Self {
        options.sanitize();
        Self {
            client,
            context,
            options,
            store: TreeStore::default(),
            editing: false,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn into_parts(self) -> (C, LayoutOptions) {
        (self.client, self.options)
    }

    /// Replaces the options; call [`TreeSession::refresh`] to apply them.
    pub fn set_options(&mut self, mut options: LayoutOptions) {
        options.sanitize();
        self.options = options;
    }

    /// Replaces the known definitions of the tree collection, e.g. after provisioning.
    pub fn set_schema(&mut self, schema: Vec<FieldDefinition>) {
        self.context.schema = schema;
    }

    pub fn can_read(&self) -> bool {
        self.context.permissions.allows(PermissionAction::Read)
    }

    pub fn can_update(&self) -> bool {
        self.context.permissions.allows(PermissionAction::Update)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn toggle_edit_mode(&mut self) -> bool {
        self.editing = !self.editing;
        self.editing
    }

    /// Validates options and schema, returning the configured groups.
    pub fn check_structure(&self) -> Result<GroupRegistry, SessionError> {
        let required = self.options.require()?;
        let model = ModelContext {
            content_collection: &self.context.content_collection,
            tree_collection: required.tree_collection,
            primary_key_type: &self.context.content_primary_key_type,
        };
        validate_fields(&self.context.schema, &model)?;
        let group_field = self
            .context
            .schema
            .iter()
            .find(|definition| definition.key() == Some(FieldKey::Group))
            .ok_or_else(|| SchemaError {
                missing: vec![FieldKey::Group],
                issues: Vec::new(),
            })?;
        Ok(GroupRegistry::from_field(group_field)?)
    }

    pub fn has_valid_structure(&self) -> bool {
        self.check_structure().is_ok()
    }

    /// Fetches every tree record and rebuilds the store. Leaves edit mode.
    pub fn refresh(&mut self) -> Result<usize, SessionError> {
        if !self.can_read() {
            return Err(SessionError::Forbidden(PermissionAction::Read));
        }
        let groups = self.check_structure()?;
        let required = self.options.require()?;
        let query = tree_item_query(&self.options, &self.context.content_primary_key);
        let raw = self.client.read_items(required.tree_collection, &query)?;
        let items = raw
            .into_iter()
            .map(serde_json::from_value::<SourceItem>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SessionError::Decode)?;

        self.store.set_settings(TreeSettings {
            primary_key: self.context.content_primary_key.clone(),
            slug_field: self.options.slugify_field_name.clone(),
            collapsed: self.options.collapsed.clone(),
        });
        self.store.rebuild(&groups, &items)?;
        self.editing = false;
        Ok(items.len())
    }

    pub fn apply_move(&mut self, event: &DropEvent) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.store.apply_move(event)?;
        Ok(())
    }

    pub fn move_item(
        &mut self,
        item: &NodeKey,
        to_parent: &NodeKey,
        index: usize,
    ) -> Result<DropEvent, SessionError> {
        self.ensure_editable()?;
        Ok(self.store.move_item(item, to_parent, index)?)
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if !self.can_update() {
            return Err(SessionError::Forbidden(PermissionAction::Update));
        }
        if !self.editing {
            return Err(SessionError::NotEditing);
        }
        Ok(())
    }

    /// Writes the dirty ledger in one batch, then reloads the tree.
    ///
    /// On failure the store keeps its pending edits so the save can be retried.
    pub fn save_changes(&mut self) -> Result<usize, SessionError> {
        if !self.can_update() {
            return Err(SessionError::Forbidden(PermissionAction::Update));
        }
        let collection = self.options.require()?.tree_collection.to_string();
        let written = self.store.flush(&mut self.client, &collection)?;
        if written > 0 {
            self.refresh()?;
        }
        self.editing = false;
        Ok(written)
    }

    pub fn toggle_expanded(&mut self, key: &NodeKey) -> Result<bool, SessionError> {
        Ok(self.store.toggle_expanded(key)?)
    }

    /// Stores the currently collapsed items in the layout options.
    pub fn save_collapsed(&mut self) -> &[String] {
        self.options.collapsed = self.store.collapsed_ids();
        &self.options.collapsed
    }

    /// Creates a tree collection for the content collection and points the options at it.
    ///
    /// The host is expected to reload its schema and hand it over via
    /// [`TreeSession::set_schema`] before the next refresh.
    pub fn create_model(
        &mut self,
        tree_collection: &str,
        connector_field: &str,
    ) -> Result<ProvisionReport, SessionError> {
        if !self.context.permissions.is_admin {
            return Err(SessionError::AdminOnly);
        }
        let request = ProvisionRequest {
            content_collection: &self.context.content_collection,
            content_primary_key: &self.context.content_primary_key,
            content_primary_key_type: &self.context.content_primary_key_type,
            connector_field,
            tree_collection,
        };
        let report = provision_model(&mut self.client, &request)?;
        self.options.meta_collection_name = Some(tree_collection.to_string());
        Ok(report)
    }

    /// Most important problem to show, if any.
    pub fn notice(&self, search_active: bool) -> Option<UserNotice> {
        let collection = self.options.meta_collection_name.as_deref().unwrap_or_default();
        if !self.can_read() {
            return Some(UserNotice::limited_permission(collection));
        }
        if !self.options.has_required() {
            return Some(UserNotice::incomplete_configuration());
        }
        if let Err(err) = self.check_structure() {
            tracing::debug!(error = %err, "tree collection structure rejected");
            return Some(UserNotice::invalid_structure());
        }
        if self.store.has_invalid_items() {
            return Some(UserNotice::invalid_depth());
        }
        if self.store.item_count() == 0 {
            return Some(UserNotice::empty_collection(collection));
        }
        if search_active {
            return Some(UserNotice::search_unsupported());
        }
        None
    }
}
