use serde_json::Value;
use thiserror::Error;

use crate::query::ItemQuery;

/// Failure reported by the remote data-access layer.
/// 遠端資料存取層回報的錯誤。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("request against `{collection}` failed: {message}")]
    Request { collection: String, message: String },
    #[error("unexpected response from `{collection}`: {message}")]
    Response { collection: String, message: String },
}

impl ClientError {
    pub fn request(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            collection: collection.into(),
            message: message.into(),
        }
    }
}

/// Narrow view of the host's data API used by the tree engine and provisioning.
///
/// Payloads are plain JSON documents; their shape is defined by the host. Every call is
/// a boundary: the engine never holds partially applied state across one.
pub trait DataClient {
    fn read_items(&mut self, collection: &str, query: &ItemQuery)
        -> Result<Vec<Value>, ClientError>;

    /// Applies every update in one request; either all of them persist or none do.
    fn update_batch(&mut self, collection: &str, updates: Vec<Value>) -> Result<(), ClientError>;

    fn create_collection(&mut self, payload: Value) -> Result<(), ClientError>;

    fn create_field(&mut self, collection: &str, payload: Value) -> Result<(), ClientError>;

    fn create_relation(&mut self, payload: Value) -> Result<(), ClientError>;

    fn create_items(&mut self, collection: &str, items: Vec<Value>) -> Result<(), ClientError>;
}
