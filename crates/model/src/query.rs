use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fields::FieldKey;
use crate::options::LayoutOptions;

static TEMPLATE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid template regex"));

/// Parameters of an item listing request.
/// 讀取項目時的查詢參數。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    pub fields: Vec<String>,
    pub sort: Vec<String>,
    /// `None` requests every item.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Field names referenced by `{{ field }}` placeholders in a display template.
pub fn fields_from_template(template: &str) -> Vec<String> {
    let mut fields = Vec::new();
    for capture in TEMPLATE_FIELD.captures_iter(template) {
        push_unique(&mut fields, capture[1].to_string());
    }
    fields
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Query used to load every tree record together with the linked content fields the
/// layout needs (labels, status, slug source and the content primary key).
pub fn tree_item_query(options: &LayoutOptions, content_primary_key: &str) -> ItemQuery {
    let mut linked = Vec::new();
    for template in [&options.label_primary, &options.label_secondary]
        .into_iter()
        .flatten()
    {
        for field in fields_from_template(template) {
            push_unique(&mut linked, field);
        }
    }
    for field in [
        options.status_indicator.as_deref(),
        options.slugify_field_name.as_deref(),
        Some(content_primary_key),
    ]
    .into_iter()
    .flatten()
    {
        push_unique(&mut linked, field.to_string());
    }

    let mut fields = vec!["*".to_string()];
    fields.extend(
        linked
            .into_iter()
            .map(|field| format!("{}.{field}", FieldKey::RelItem.column())),
    );

    ItemQuery {
        fields,
        sort: [FieldKey::Group, FieldKey::Level, FieldKey::Sort]
            .into_iter()
            .map(|key| key.column().to_string())
            .collect(),
        limit: None,
    }
}
