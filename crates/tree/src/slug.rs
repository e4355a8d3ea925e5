use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid slug regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").expect("valid slug regex"));
static EDGE_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-+|-+$").expect("valid slug regex"));

/// Normalizes text into a URL-safe path segment.
///
/// Lowercases and trims, drops anything outside ASCII word characters, whitespace and
/// hyphens, then collapses separator runs into single hyphens.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let stripped = DISALLOWED.replace_all(lowered.trim(), "");
    let joined = SEPARATORS.replace_all(&stripped, "-");
    EDGE_HYPHENS.replace_all(&joined, "").into_owned()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Slug for a node whose own slug is still empty.
///
/// Key-derived slugs are taken verbatim from the linked record's primary key; others are
/// normalized from the configured source field. `None` when the source is absent or
/// normalizes to nothing.
pub(crate) fn derive_slug(
    linked_item: &Value,
    slug_is_key: bool,
    primary_key: &str,
    source_field: Option<&str>,
) -> Option<String> {
    let field = if slug_is_key {
        primary_key
    } else {
        source_field?
    };
    let raw = scalar_text(linked_item.get(field)?)?;
    let slug = if slug_is_key { raw } else { slugify(&raw) };
    (!slug.is_empty()).then_some(slug)
}
