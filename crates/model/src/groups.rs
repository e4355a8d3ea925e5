use serde::{Deserialize, Serialize};

use crate::fields::FieldDefinition;
use crate::options::ConfigError;

/// Key of the group every tree configuration must provide.
pub const UNGROUPED: &str = "ungrouped";

/// Independent tree namespace with its own depth limit.
/// 擁有獨立深度上限的樹狀命名空間。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "value")]
    pub key: String,
    #[serde(rename = "text")]
    pub label: String,
    /// `0` means unlimited depth.
    pub max_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Group {
    pub fn new(key: impl Into<String>, label: impl Into<String>, max_level: u32) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            max_level,
            icon: None,
            color: None,
        }
    }

    pub fn ungrouped() -> Self {
        Self::new(UNGROUPED, "Ungrouped", 0)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_level == 0
    }

    /// Whether a node sitting at `level` may receive children.
    pub fn allows_children_at(&self, level: u32) -> bool {
        self.is_unlimited() || level < self.max_level
    }
}

pub(crate) fn contains_ungrouped(groups: &[Group]) -> bool {
    groups
        .iter()
        .any(|group| group.key == UNGROUPED && group.max_level == 0)
}

/// Ordered set of configured groups.
/// 依設定順序排列的群組集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRegistry {
    groups: Vec<Group>,
}

impl GroupRegistry {
    /// Builds a registry, enforcing the `ungrouped` invariant and unique keys.
    pub fn from_groups(groups: Vec<Group>) -> Result<Self, ConfigError> {
        for (index, group) in groups.iter().enumerate() {
            if groups[..index].iter().any(|other| other.key == group.key) {
                return Err(ConfigError::DuplicateGroup(group.key.clone()));
            }
        }
        if !contains_ungrouped(&groups) {
            return Err(ConfigError::MissingUngrouped);
        }
        Ok(Self { groups })
    }

    /// Reads the choices declared on the `group` field definition.
    pub fn from_field(definition: &FieldDefinition) -> Result<Self, ConfigError> {
        let choices = definition
            .choices()
            .cloned()
            .ok_or_else(|| ConfigError::MalformedChoices("no choices declared".to_string()))?;
        let groups: Vec<Group> = serde_json::from_value(choices)
            .map_err(|err| ConfigError::MalformedChoices(err.to_string()))?;
        Self::from_groups(groups)
    }

    pub fn get(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self {
            groups: vec![Group::ungrouped()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{default_definition, FieldKey};
    use serde_json::json;

    #[test]
    fn registry_requires_unlimited_ungrouped() {
        let err = GroupRegistry::from_groups(vec![Group::new("cat", "Category", 1)]).unwrap_err();
        assert_eq!(err, ConfigError::MissingUngrouped);

        let err = GroupRegistry::from_groups(vec![Group::new(UNGROUPED, "Ungrouped", 3)])
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingUngrouped);
    }

    #[test]
    fn registry_rejects_duplicate_keys() {
        let err = GroupRegistry::from_groups(vec![
            Group::ungrouped(),
            Group::new("cat", "Category", 1),
            Group::new("cat", "Other", 2),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateGroup("cat".into()));
    }

    #[test]
    fn registry_reads_choices_from_group_field() {
        let mut definition = default_definition(FieldKey::Group, "pages_tree", "uuid");
        definition.meta["options"]["choices"] = json!([
            { "text": "Ungrouped", "value": "ungrouped", "max_level": 0 },
            { "text": "Menu", "value": "menu", "max_level": 2, "icon": "menu" },
        ]);

        let registry = GroupRegistry::from_field(&definition).unwrap();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["ungrouped", "menu"]);
        let menu = registry.get("menu").unwrap();
        assert_eq!(menu.icon.as_deref(), Some("menu"));
        assert!(menu.allows_children_at(1));
        assert!(!menu.allows_children_at(2));
        assert!(registry.get("ungrouped").unwrap().allows_children_at(40));
    }
}
