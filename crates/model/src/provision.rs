//! One-time creation of the tree collection, its relations and initial records.
//! 建立樹狀集合、關聯與初始紀錄的一次性流程。

use serde_json::{json, Value};

use crate::client::{ClientError, DataClient};
use crate::fields::{default_definitions, FieldKey};
use crate::query::ItemQuery;

/// Names and types needed to provision a tree over an existing content collection.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionRequest<'a> {
    pub content_collection: &'a str,
    pub content_primary_key: &'a str,
    pub content_primary_key_type: &'a str,
    /// Alias field added to the content collection that lists its tree record.
    pub connector_field: &'a str,
    pub tree_collection: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Tree records created for content rows that already existed.
    pub linked_items: usize,
}

pub fn collection_payload(request: &ProvisionRequest<'_>) -> Value {
    let fields = default_definitions(request.tree_collection, request.content_primary_key_type);
    json!({
        "collection": request.tree_collection,
        "meta": { "hidden": false },
        "schema": {},
        "fields": fields,
    })
}

pub fn connector_payload(request: &ProvisionRequest<'_>) -> Value {
    json!({
        "collection": request.content_collection,
        "field": request.connector_field,
        "type": "alias",
        "meta": { "interface": "list-o2m", "special": ["o2m"] },
    })
}

pub fn relation_payloads(request: &ProvisionRequest<'_>) -> [Value; 2] {
    [
        json!({
            "collection": request.tree_collection,
            "field": FieldKey::RelParent.column(),
            "related_collection": request.tree_collection,
            "meta": {
                "one_field": FieldKey::RelsChildren.column(),
                "sort_field": FieldKey::Sort.column(),
            },
        }),
        json!({
            "collection": request.tree_collection,
            "field": FieldKey::RelItem.column(),
            "related_collection": request.content_collection,
            "schema": {
                "foreign_key_column": request.content_primary_key,
                "foreign_key_table": request.content_collection,
                "on_update": "NO ACTION",
                "on_delete": "CASCADE",
            },
            "meta": {
                "many_collection": request.content_collection,
                "many_field": FieldKey::RelItem.column(),
                "one_collection": request.content_collection,
                "one_field": request.connector_field,
            },
        }),
    ]
}

/// Creates the tree collection and links every existing content row to a tree record.
///
/// Requests run in order and the first failure aborts the remaining steps; whatever was
/// already created stays in place.
pub fn provision_model<C>(
    client: &mut C,
    request: &ProvisionRequest<'_>,
) -> Result<ProvisionReport, ClientError>
where
    C: DataClient + ?Sized,
{
    tracing::info!(
        content = request.content_collection,
        tree = request.tree_collection,
        "provisioning tree collection"
    );
    client.create_collection(collection_payload(request))?;
    client.create_field(request.content_collection, connector_payload(request))?;
    for relation in relation_payloads(request) {
        client.create_relation(relation)?;
    }

    let query = ItemQuery {
        fields: vec![request.content_primary_key.to_string()],
        sort: Vec::new(),
        limit: None,
    };
    let existing = client.read_items(request.content_collection, &query)?;
    let link = FieldKey::RelItem.column();
    let records: Vec<Value> = existing
        .iter()
        .filter_map(|item| item.get(request.content_primary_key))
        .map(|key| json!({ link: key }))
        .collect();

    let linked_items = records.len();
    if linked_items > 0 {
        client.create_items(request.tree_collection, records)?;
    }
    tracing::info!(linked_items, "tree collection provisioned");
    Ok(ProvisionReport { linked_items })
}
