//! Rollback state as explicit value objects.
//!
//! Every speculative edit yields a `RollbackTicket` describing how to undo
//! exactly that edit. Tickets are one-shot: confirming or rolling back
//! consumes the ticket, and a consumed ticket can never touch state again.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use uuid::Uuid;

/// Prior values of the fields one speculative edit touched.
///
/// `None` records that the field did not exist before the edit, so a restore
/// removes it rather than writing back a null.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSnapshot {
    fields: Vec<(String, Option<Value>)>,
}

impl MutationSnapshot {
    /// Capture the current values of `touched` fields from an item.
    pub fn capture<'a>(
        fields: &Map<String, Value>,
        touched: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            fields: touched
                .into_iter()
                .map(|name| (name.to_string(), fields.get(name).cloned()))
                .collect(),
        }
    }

    /// Write the snapshotted values back, removing fields that were absent.
    pub(crate) fn restore(&self, fields: &mut Map<String, Value>) {
        for (name, prior) in &self.fields {
            match prior {
                Some(value) => {
                    fields.insert(name.clone(), value.clone());
                }
                None => {
                    fields.remove(name);
                }
            }
        }
    }

    pub fn touched_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// How a ticket undoes its edit.
#[derive(Debug, Clone)]
pub enum RollbackKind {
    /// Restore the snapshotted field values. Skipped entirely once a later
    /// confirmed result supersedes the snapshot's basis.
    Restore(MutationSnapshot),
    /// Apply the exact numeric inverse of a counter adjustment. The delta is
    /// undone unconditionally so concurrent toggles never drift; only the
    /// paired flag restore is subject to supersession.
    InverseAdjust {
        field: String,
        delta: i64,
        flag: String,
        prior_flag: Option<bool>,
    },
}

/// One-shot right to undo a single speculative edit.
pub struct RollbackTicket {
    id: Uuid,
    collection: String,
    item_id: String,
    seq: u64,
    kind: RollbackKind,
    consumed: AtomicBool,
}

impl RollbackTicket {
    pub(crate) fn new(
        collection: impl Into<String>,
        item_id: impl Into<String>,
        seq: u64,
        kind: RollbackKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.into(),
            item_id: item_id.into(),
            seq,
            kind,
            consumed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn kind(&self) -> &RollbackKind {
        &self.kind
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Consume the ticket. Returns `false` if it was already consumed.
    pub(crate) fn consume(&self) -> bool {
        !self.consumed.swap(true, Ordering::SeqCst)
    }
}
