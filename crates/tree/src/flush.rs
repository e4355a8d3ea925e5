use serde_json::Value;
use thiserror::Error;
use treeview_model::{ClientError, DataClient, FieldKey};

use crate::item::{ChangeSet, NodeKey};
use crate::store::{TreeError, TreeStore};

/// One record's pending changes, keyed by its primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub key: NodeKey,
    pub changes: ChangeSet,
}

impl RecordUpdate {
    /// `{ id, ...changes }` as sent to the data-access client.
    pub fn to_payload(&self) -> Value {
        let mut payload = self.changes.to_json();
        payload.insert(
            FieldKey::Id.column().to_string(),
            Value::from(self.key.as_str()),
        );
        Value::Object(payload)
    }
}

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("{0} item(s) exceed the depth of their group; move them up before saving")]
    InvalidDepth(usize),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("saving changes failed: {0}")]
    Client(#[from] ClientError),
}

impl TreeStore {
    /// Projects the dirty ledger into record updates, in key order.
    pub fn pending_updates(&self) -> Result<Vec<RecordUpdate>, TreeError> {
        self.dirty
            .keys()
            .map(|key| {
                let node = self.get(key)?;
                Ok(RecordUpdate {
                    key: key.clone(),
                    changes: node.pending.clone(),
                })
            })
            .collect()
    }

    /// Submits every pending change to `collection` as a single batch.
    ///
    /// Nothing is cleared here: dirty state only goes away when the store is rebuilt
    /// from what was actually persisted. Returns the number of records written.
    pub fn flush<C>(&self, client: &mut C, collection: &str) -> Result<usize, FlushError>
    where
        C: DataClient + ?Sized,
    {
        if self.has_invalid_items() {
            return Err(FlushError::InvalidDepth(self.invalid.len()));
        }
        let updates = self.pending_updates()?;
        if updates.is_empty() {
            return Ok(0);
        }

        let payload: Vec<Value> = updates.iter().map(RecordUpdate::to_payload).collect();
        let count = payload.len();
        if let Err(err) = client.update_batch(collection, payload) {
            tracing::warn!(collection, error = %err, "batch update rejected");
            return Err(err.into());
        }
        tracing::info!(collection, count, "flushed pending changes");
        Ok(count)
    }
}
