//! Structural field contract every tree collection has to satisfy.
//! 樹狀集合必須具備的結構欄位契約。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::groups::{contains_ungrouped, Group};

/// Structural fields owned by the tree model.
/// 樹狀模型所擁有的結構欄位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Id,
    Group,
    Level,
    Sort,
    RelItem,
    RelParent,
    RelsChildren,
    Slug,
    SlugIsKey,
    Path,
}

impl FieldKey {
    pub const ALL: [FieldKey; 10] = [
        FieldKey::Id,
        FieldKey::Group,
        FieldKey::Level,
        FieldKey::Sort,
        FieldKey::RelItem,
        FieldKey::RelParent,
        FieldKey::RelsChildren,
        FieldKey::Slug,
        FieldKey::SlugIsKey,
        FieldKey::Path,
    ];

    /// Column name used by the storage schema.
    pub fn column(self) -> &'static str {
        match self {
            FieldKey::Id => "id",
            FieldKey::Group => "group",
            FieldKey::Level => "level",
            FieldKey::Sort => "sort",
            FieldKey::RelItem => "rel_item",
            FieldKey::RelParent => "rel_parent",
            FieldKey::RelsChildren => "rels_children",
            FieldKey::Slug => "slug",
            FieldKey::SlugIsKey => "slug_is_key",
            FieldKey::Path => "path",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.column() == name)
    }

    /// Every structural field except the primary key has to be present and readable.
    pub fn is_mandatory(self) -> bool {
        self != FieldKey::Id
    }

    pub fn mandatory() -> impl Iterator<Item = FieldKey> {
        Self::ALL.into_iter().filter(|key| key.is_mandatory())
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Raw field definition as reported by the host's schema metadata.
/// 主機結構描述所回報的欄位定義。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(default)]
    pub collection: String,
    pub field: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub meta: Value,
}

impl FieldDefinition {
    pub fn key(&self) -> Option<FieldKey> {
        FieldKey::from_column(&self.field)
    }

    /// Group choices declared on the `group` field, if any.
    pub fn choices(&self) -> Option<&Value> {
        self.meta.pointer("/options/choices")
    }
}

/// Collections a definition is validated against.
#[derive(Debug, Clone, Copy)]
pub struct ModelContext<'a> {
    pub content_collection: &'a str,
    pub tree_collection: &'a str,
    pub primary_key_type: &'a str,
}

/// Single mismatch between a stored definition and the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: FieldKey,
    pub location: String,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.field, self.location, self.message)
    }
}

/// Aggregate validation failure for a tree collection.
/// 樹狀集合結構驗證失敗的彙整結果。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "invalid collection structure: {} missing field(s), {} issue(s)",
    .missing.len(),
    .issues.len()
)]
pub struct SchemaError {
    pub missing: Vec<FieldKey>,
    pub issues: Vec<FieldIssue>,
}

impl SchemaError {
    /// Human readable lines, missing fields first.
    pub fn details(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.issues.len() + 1);
        if !self.missing.is_empty() {
            let names: Vec<_> = self.missing.iter().map(|key| key.column()).collect();
            lines.push(format!("following fields are missing: {}", names.join(", ")));
        }
        lines.extend(self.issues.iter().map(ToString::to_string));
        lines
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Schema,
    Meta,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Schema => "schema",
            Section::Meta => "meta",
        }
    }
}

#[derive(Debug)]
enum Rule {
    TypeIs(&'static str),
    Equals {
        section: Section,
        pointer: &'static str,
        expected: Value,
    },
    IsString {
        section: Section,
        pointer: &'static str,
    },
    ListOf {
        section: Section,
        pointer: &'static str,
        literal: &'static str,
    },
    GroupChoices,
}

fn meta_eq(pointer: &'static str, expected: Value) -> Rule {
    Rule::Equals {
        section: Section::Meta,
        pointer,
        expected,
    }
}

fn schema_eq(pointer: &'static str, expected: Value) -> Rule {
    Rule::Equals {
        section: Section::Schema,
        pointer,
        expected,
    }
}

fn special(literal: &'static str) -> Rule {
    Rule::ListOf {
        section: Section::Meta,
        pointer: "/special",
        literal,
    }
}

fn rules_for(key: FieldKey, context: &ModelContext<'_>) -> Vec<Rule> {
    match key {
        FieldKey::Id => vec![
            Rule::TypeIs("uuid"),
            schema_eq("/is_primary_key", json!(true)),
            meta_eq("/interface", json!("input")),
            special("uuid"),
            meta_eq("/readonly", json!(true)),
        ],
        FieldKey::Group => vec![
            Rule::TypeIs("string"),
            Rule::IsString {
                section: Section::Schema,
                pointer: "/default_value",
            },
            meta_eq("/interface", json!("dcb-dropdown-group")),
            meta_eq("/readonly", json!(true)),
            Rule::GroupChoices,
        ],
        FieldKey::Level | FieldKey::Sort => vec![
            Rule::TypeIs("integer"),
            meta_eq("/interface", json!("input")),
        ],
        FieldKey::RelItem => vec![
            schema_eq("/is_unique", json!(true)),
            schema_eq("/foreign_key_table", json!(context.content_collection)),
            meta_eq("/interface", json!("select-dropdown-m2o")),
            special("m2o"),
        ],
        FieldKey::RelParent => vec![
            schema_eq("/foreign_key_table", json!(context.tree_collection)),
            meta_eq("/interface", json!("select-dropdown-m2o")),
            special("m2o"),
        ],
        FieldKey::RelsChildren => vec![
            Rule::TypeIs("alias"),
            meta_eq("/interface", json!("list-o2m")),
            special("o2m"),
        ],
        FieldKey::Slug => vec![
            Rule::TypeIs("string"),
            meta_eq("/interface", json!("input")),
            meta_eq("/options/slug", json!(true)),
        ],
        FieldKey::SlugIsKey => vec![
            Rule::TypeIs("boolean"),
            schema_eq("/default_value", json!(false)),
            meta_eq("/interface", json!("boolean")),
            special("cast-boolean"),
        ],
        FieldKey::Path => vec![
            Rule::TypeIs("string"),
            meta_eq("/interface", json!("input")),
        ],
    }
}

fn section_of(definition: &FieldDefinition, section: Section) -> &Value {
    match section {
        Section::Schema => &definition.schema,
        Section::Meta => &definition.meta,
    }
}

fn check(
    key: FieldKey,
    definition: &FieldDefinition,
    rule: &Rule,
    issues: &mut Vec<FieldIssue>,
) {
    let mut report = |location: String, message: String| {
        issues.push(FieldIssue {
            field: key,
            location,
            message,
        })
    };

    match rule {
        Rule::TypeIs(expected) => {
            if definition.field_type.as_deref() != Some(*expected) {
                report(
                    "type".to_string(),
                    format!(
                        "expected \"{expected}\", found {}",
                        describe_str(definition.field_type.as_deref())
                    ),
                );
            }
        }
        Rule::Equals {
            section,
            pointer,
            expected,
        } => {
            let found = section_of(definition, *section).pointer(pointer);
            if found != Some(expected) {
                report(
                    location(*section, pointer),
                    format!("expected {expected}, found {}", describe(found)),
                );
            }
        }
        Rule::IsString { section, pointer } => {
            let found = section_of(definition, *section).pointer(pointer);
            if !matches!(found, Some(Value::String(_))) {
                report(
                    location(*section, pointer),
                    format!("expected a string, found {}", describe(found)),
                );
            }
        }
        Rule::ListOf {
            section,
            pointer,
            literal,
        } => match section_of(definition, *section).pointer(pointer) {
            Some(Value::Array(values)) => {
                if let Some(other) = values.iter().find(|value| value.as_str() != Some(*literal)) {
                    report(
                        location(*section, pointer),
                        format!("expected only \"{literal}\" entries, found {other}"),
                    );
                }
            }
            found => report(
                location(*section, pointer),
                format!("expected a list, found {}", describe(found)),
            ),
        },
        Rule::GroupChoices => {
            let Some(found) = definition.choices() else {
                report(
                    "meta.options.choices".to_string(),
                    "expected a list of group choices, found nothing".to_string(),
                );
                return;
            };
            match serde_json::from_value::<Vec<Group>>(found.clone()) {
                Ok(choices) if contains_ungrouped(&choices) => {}
                Ok(_) => report(
                    "meta.options.choices".to_string(),
                    "must contain an item with value \"ungrouped\" and max level 0".to_string(),
                ),
                Err(err) => report("meta.options.choices".to_string(), err.to_string()),
            }
        }
    }
}

fn location(section: Section, pointer: &str) -> String {
    format!("{}{}", section.name(), pointer.replace('/', "."))
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "nothing".to_string(),
        Some(value) => value.to_string(),
    }
}

fn describe_str(value: Option<&str>) -> String {
    match value {
        None => "nothing".to_string(),
        Some(value) => format!("\"{value}\""),
    }
}

/// Validates a single definition, returning every mismatch found.
/// 驗證單一欄位定義並回傳所有不符之處。
pub fn validate_field(
    definition: &FieldDefinition,
    context: &ModelContext<'_>,
) -> Result<(), Vec<FieldIssue>> {
    let Some(key) = definition.key() else {
        return Ok(());
    };
    let mut issues = Vec::new();
    for rule in rules_for(key, context) {
        check(key, definition, &rule, &mut issues);
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Validates the mandatory structural fields of a tree collection.
///
/// Definitions that are not structural fields are ignored. All issues and all missing
/// fields are collected before failing, so a single error describes the whole mismatch.
///
/// 驗證樹狀集合的必備結構欄位；蒐集所有問題後一次回報。
pub fn validate_fields(
    definitions: &[FieldDefinition],
    context: &ModelContext<'_>,
) -> Result<(), SchemaError> {
    let mut missing: Vec<FieldKey> = FieldKey::mandatory().collect();
    let mut issues = Vec::new();

    for definition in definitions {
        let Some(key) = definition.key().filter(|key| key.is_mandatory()) else {
            continue;
        };
        if let Err(mut found) = validate_field(definition, context) {
            issues.append(&mut found);
        }
        missing.retain(|candidate| *candidate != key);
    }

    if missing.is_empty() && issues.is_empty() {
        Ok(())
    } else {
        tracing::debug!(
            collection = context.tree_collection,
            missing = missing.len(),
            issues = issues.len(),
            "tree collection failed structural validation"
        );
        Err(SchemaError { missing, issues })
    }
}

/// Definition used when provisioning a fresh tree collection.
/// 建立新樹狀集合時使用的預設欄位定義。
pub fn default_definition(
    key: FieldKey,
    tree_collection: &str,
    primary_key_type: &str,
) -> FieldDefinition {
    let (field_type, schema, meta) = match key {
        FieldKey::Id => (
            Some("uuid"),
            json!({ "is_primary_key": true }),
            json!({
                "interface": "input",
                "special": ["uuid"],
                "readonly": true,
                "hidden": true,
            }),
        ),
        FieldKey::Group => (
            Some("string"),
            json!({ "default_value": "ungrouped" }),
            json!({
                "interface": "dcb-dropdown-group",
                "options": {
                    "choices": [{ "text": "Ungrouped", "value": "ungrouped", "max_level": 0 }],
                },
                "readonly": true,
                "hidden": true,
                "sort": 8,
            }),
        ),
        FieldKey::Level => (Some("integer"), Value::Null, hidden_input(9)),
        FieldKey::Sort => (Some("integer"), Value::Null, hidden_input(10)),
        FieldKey::RelItem => (
            Some(primary_key_type),
            json!({ "is_unique": true }),
            json!({
                "interface": "select-dropdown-m2o",
                "special": ["m2o"],
                "required": true,
                "sort": 6,
            }),
        ),
        FieldKey::RelParent => (
            Some("uuid"),
            Value::Null,
            json!({
                "interface": "select-dropdown-m2o",
                "special": ["m2o"],
                "options": { "enableSelect": false, "enableCreate": false },
                "sort": 2,
            }),
        ),
        FieldKey::RelsChildren => (
            Some("alias"),
            Value::Null,
            json!({
                "interface": "list-o2m",
                "special": ["o2m"],
                "readonly": true,
                "hidden": true,
                "sort": 7,
            }),
        ),
        FieldKey::Slug => (
            Some("string"),
            Value::Null,
            json!({
                "interface": "input",
                "options": { "slug": true },
                "sort": 3,
                "width": "half",
            }),
        ),
        FieldKey::SlugIsKey => (
            Some("boolean"),
            json!({ "default_value": false }),
            json!({
                "interface": "boolean",
                "hidden": false,
                "special": ["cast-boolean"],
                "sort": 4,
                "width": "half",
            }),
        ),
        FieldKey::Path => (
            Some("string"),
            Value::Null,
            json!({ "interface": "input", "readonly": true, "sort": 5 }),
        ),
    };

    FieldDefinition {
        collection: tree_collection.to_string(),
        field: key.column().to_string(),
        field_type: field_type.map(str::to_string),
        schema,
        meta,
    }
}

fn hidden_input(sort: u32) -> Value {
    json!({ "interface": "input", "readonly": true, "hidden": true, "sort": sort })
}

/// Default definitions for every structural field, in declaration order.
pub fn default_definitions(tree_collection: &str, primary_key_type: &str) -> Vec<FieldDefinition> {
    FieldKey::ALL
        .into_iter()
        .map(|key| default_definition(key, tree_collection, primary_key_type))
        .collect()
}
