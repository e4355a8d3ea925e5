//! JSON fixture standing in for the host's data API.
//! 以 JSON 檔案模擬主機資料 API 的測試夾具。

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use treeview_model::{
    ClientError, DataClient, FieldDefinition, ItemQuery, LayoutOptions, Permissions,
};
use treeview_tree::SessionContext;

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_primary_key_type() -> String {
    "integer".to_string()
}

/// Snapshot of a content collection, its tree collection and the session facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub content_collection: String,
    #[serde(default = "default_primary_key")]
    pub content_primary_key: String,
    #[serde(default = "default_primary_key_type")]
    pub content_primary_key_type: String,
    #[serde(default = "Permissions::admin")]
    pub permissions: Permissions,
    #[serde(default)]
    pub options: LayoutOptions,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Tree records.
    #[serde(default)]
    pub items: Vec<Value>,
    /// Content records.
    #[serde(default)]
    pub content: Vec<Value>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed to serialize fixture")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write fixture {}", path.display()))
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            content_collection: self.content_collection.clone(),
            content_primary_key: self.content_primary_key.clone(),
            content_primary_key_type: self.content_primary_key_type.clone(),
            schema: self.fields.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// [`DataClient`] over a loaded fixture.
///
/// Reads of the content collection return `content`; every other collection is treated
/// as the tree collection. Batch updates are merged into `items` and `rels_children` is
/// recomputed from `rel_parent` and `sort`.
#[derive(Debug)]
pub struct FixtureClient {
    fixture: Fixture,
}

impl FixtureClient {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    pub fn into_fixture(self) -> Fixture {
        self.fixture
    }

    fn relink_children(&mut self) {
        let mut links: Vec<(String, u64, String)> = self
            .fixture
            .items
            .iter()
            .filter_map(|item| {
                let parent = item.get("rel_parent")?.as_str()?.to_string();
                let sort = item.get("sort").and_then(Value::as_u64).unwrap_or_default();
                let id = item.get("id")?.as_str()?.to_string();
                Some((parent, sort, id))
            })
            .collect();
        links.sort();

        for item in &mut self.fixture.items {
            let Some(record) = item.as_object_mut() else {
                continue;
            };
            let id = record
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let children: Vec<Value> = links
                .iter()
                .filter(|(parent, _, _)| *parent == id)
                .map(|(_, _, child)| Value::from(child.as_str()))
                .collect();
            record.insert("rels_children".to_string(), Value::Array(children));
        }
    }
}

fn sort_key(item: &Value) -> (String, u64, u64) {
    (
        item.get("group")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        item.get("level").and_then(Value::as_u64).unwrap_or_default(),
        item.get("sort").and_then(Value::as_u64).unwrap_or_default(),
    )
}

impl DataClient for FixtureClient {
    fn read_items(&mut self, collection: &str, query: &ItemQuery) -> Result<Vec<Value>, ClientError> {
        let mut records = if collection == self.fixture.content_collection {
            self.fixture.content.clone()
        } else {
            let mut items = self.fixture.items.clone();
            items.sort_by_key(sort_key);
            items
        };
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn update_batch(&mut self, collection: &str, updates: Vec<Value>) -> Result<(), ClientError> {
        // Validate the whole batch before touching anything.
        for update in &updates {
            let id = update.get("id").cloned().unwrap_or(Value::Null);
            if !self.fixture.items.iter().any(|item| item.get("id") == Some(&id)) {
                return Err(ClientError::request(collection, format!("unknown record {id}")));
            }
        }
        for update in updates {
            let Value::Object(fields) = update else {
                continue;
            };
            let id = fields.get("id").cloned().unwrap_or(Value::Null);
            let record = self
                .fixture
                .items
                .iter_mut()
                .find(|item| item.get("id") == Some(&id))
                .and_then(Value::as_object_mut);
            if let Some(record) = record {
                record.extend(fields);
            }
        }
        self.relink_children();
        Ok(())
    }

    fn create_collection(&mut self, _payload: Value) -> Result<(), ClientError> {
        Err(unsupported(&self.fixture.content_collection))
    }

    fn create_field(&mut self, collection: &str, _payload: Value) -> Result<(), ClientError> {
        Err(unsupported(collection))
    }

    fn create_relation(&mut self, _payload: Value) -> Result<(), ClientError> {
        Err(unsupported(&self.fixture.content_collection))
    }

    fn create_items(&mut self, collection: &str, _items: Vec<Value>) -> Result<(), ClientError> {
        Err(unsupported(collection))
    }
}

fn unsupported(collection: &str) -> ClientError {
    ClientError::request(collection, "fixtures cannot create collections, fields or items")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Fixture {
        serde_json::from_value(json!({
            "contentCollection": "pages",
            "items": [
                { "id": "b", "group": "ungrouped", "level": 1, "sort": 1, "rel_parent": null },
                { "id": "a", "group": "ungrouped", "level": 1, "sort": 0, "rel_parent": null },
            ],
            "content": [{ "id": 1 }, { "id": 2 }],
        }))
        .unwrap()
    }

    fn query(limit: Option<usize>) -> ItemQuery {
        ItemQuery {
            fields: vec!["*".into()],
            sort: Vec::new(),
            limit,
        }
    }

    #[test]
    fn reads_are_sorted_and_routed_by_collection() {
        let mut client = FixtureClient::new(fixture());
        let items = client.read_items("pages_tree", &query(None)).unwrap();
        assert_eq!(items[0]["id"], json!("a"));
        assert_eq!(client.read_items("pages", &query(Some(1))).unwrap().len(), 1);
    }

    #[test]
    fn updates_merge_fields_and_relink_children() {
        let mut client = FixtureClient::new(fixture());
        client
            .update_batch(
                "pages_tree",
                vec![json!({ "id": "b", "rel_parent": "a", "sort": 0, "level": 2 })],
            )
            .unwrap();

        let fixture = client.into_fixture();
        assert_eq!(fixture.items[0]["rel_parent"], json!("a"));
        assert_eq!(fixture.items[1]["rels_children"], json!(["b"]));
    }

    #[test]
    fn unknown_records_reject_the_whole_batch() {
        let mut client = FixtureClient::new(fixture());
        let err = client
            .update_batch(
                "pages_tree",
                vec![json!({ "id": "a", "sort": 5 }), json!({ "id": "zz", "sort": 0 })],
            )
            .unwrap_err();

        assert!(matches!(err, ClientError::Request { .. }));
        assert_eq!(client.into_fixture().items[1]["sort"], json!(0));
    }
}
