use serde::{Deserialize, Serialize};

use crate::fields::FieldKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Read,
    Update,
}

/// Field-level permissions the current user holds on the tree collection.
/// 目前使用者在樹狀集合上的欄位權限。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub read: Option<Vec<String>>,
    #[serde(default)]
    pub update: Option<Vec<String>>,
}

impl Permissions {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::default()
        }
    }

    pub fn with_fields(action: PermissionAction, fields: &[&str]) -> Self {
        let mut permissions = Self::default();
        let fields = Some(fields.iter().map(|field| field.to_string()).collect());
        match action {
            PermissionAction::Read => permissions.read = fields,
            PermissionAction::Update => permissions.update = fields,
        }
        permissions
    }

    fn fields(&self, action: PermissionAction) -> &[String] {
        let fields = match action {
            PermissionAction::Read => &self.read,
            PermissionAction::Update => &self.update,
        };
        fields.as_deref().unwrap_or_default()
    }

    /// True when the action covers every mandatory structural field.
    pub fn allows(&self, action: PermissionAction) -> bool {
        if self.is_admin {
            return true;
        }
        let permitted = self.fields(action);
        if permitted.iter().any(|field| field == "*") {
            return true;
        }
        FieldKey::mandatory().all(|key| permitted.iter().any(|field| field == key.column()))
    }
}
