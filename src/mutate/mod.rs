//! Optimistic mutation with per-edit rollback.
//!
//! Edits are applied to the local collection immediately, ahead of remote
//! confirmation, so user actions feel instantaneous. Each edit yields a
//! [`RollbackTicket`] that undoes exactly that edit and nothing else:
//! overlapping edits to the same item carry independent tickets, and a
//! ticket whose basis has been superseded by a later confirmed result
//! resolves as a no-op instead of reintroducing stale values.

mod snapshot;

pub use snapshot::{MutationSnapshot, RollbackKind, RollbackTicket};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use metrics::counter;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use crate::collection::{Item, ItemCollections};
use crate::error::{MutationError, NetworkError};
use crate::lock::{mutex_lock, rw_write};
use crate::telemetry::METRIC_MUTATION_ROLLBACK_TOTAL;

const SOURCE: &str = "mutate";

/// Remote confirmation call: takes the speculative item, returns the
/// server-canonical one.
pub type RemoteMutation =
    Arc<dyn Fn(Item) -> BoxFuture<'static, Result<Item, NetworkError>> + Send + Sync>;

/// Result of attempting a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The edit was undone.
    Applied,
    /// A later confirmed result superseded the ticket; nothing was restored.
    Superseded,
    /// The ticket had already been consumed by a confirm or rollback.
    AlreadyConsumed,
    /// The collection or item no longer exists.
    Missing,
}

/// User-facing signal that a speculative edit had to be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationNotice {
    pub collection: String,
    pub item_id: String,
    pub message: String,
}

/// Applies speculative edits to registered collections and reconciles them
/// with remote results.
pub struct OptimisticMutator {
    collections: Arc<ItemCollections>,
    seq: AtomicU64,
    /// Highest confirmed sequence per `(collection, item_id)`; rollbacks with
    /// an older sequence are superseded.
    confirmed: Mutex<HashMap<(String, String), u64>>,
    notices: Mutex<Option<UnboundedSender<MutationNotice>>>,
}

impl OptimisticMutator {
    pub fn new(collections: Arc<ItemCollections>) -> Self {
        Self {
            collections,
            seq: AtomicU64::new(0),
            confirmed: Mutex::new(HashMap::new()),
            notices: Mutex::new(None),
        }
    }

    /// Open the failure-notice stream, replacing any previous subscriber.
    pub fn subscribe_notices(&self) -> UnboundedReceiver<MutationNotice> {
        let (tx, rx) = unbounded_channel();
        *mutex_lock(&self.notices, SOURCE, "subscribe_notices") = Some(tx);
        rx
    }

    /// Apply a partial field update speculatively.
    ///
    /// The update is visible in the collection as soon as this returns; the
    /// ticket undoes it if the remote call later fails.
    pub fn apply_speculative(
        &self,
        collection: &str,
        item_id: &str,
        update: Map<String, Value>,
    ) -> Result<RollbackTicket, MutationError> {
        if update.is_empty() {
            return Err(MutationError::validation("empty partial update"));
        }
        if update.contains_key("id") {
            return Err(MutationError::validation("item ids are immutable"));
        }

        self.with_item(collection, item_id, |item| {
            let snapshot =
                MutationSnapshot::capture(&item.fields, update.keys().map(String::as_str));
            for (name, value) in update {
                item.fields.insert(name, value);
            }
            RollbackTicket::new(
                collection,
                item_id,
                self.next_seq(),
                RollbackKind::Restore(snapshot),
            )
        })
    }

    /// Speculatively add one to a counter field and set its paired flag.
    pub fn increment(
        &self,
        collection: &str,
        item_id: &str,
        field: &str,
        flag: &str,
    ) -> Result<RollbackTicket, MutationError> {
        self.adjust(collection, item_id, field, flag, 1, true)
    }

    /// Speculatively subtract one from a counter field and clear its flag.
    /// The exact numeric inverse of [`increment`](Self::increment).
    pub fn decrement(
        &self,
        collection: &str,
        item_id: &str,
        field: &str,
        flag: &str,
    ) -> Result<RollbackTicket, MutationError> {
        self.adjust(collection, item_id, field, flag, -1, false)
    }

    fn adjust(
        &self,
        collection: &str,
        item_id: &str,
        field: &str,
        flag: &str,
        delta: i64,
        flag_value: bool,
    ) -> Result<RollbackTicket, MutationError> {
        self.with_item(collection, item_id, |item| {
            let prior = item.number(field).unwrap_or(0);
            let prior_flag = item.flag(flag);
            item.fields
                .insert(field.to_string(), Value::from(prior + delta));
            item.fields.insert(flag.to_string(), Value::from(flag_value));
            RollbackTicket::new(
                collection,
                item_id,
                self.next_seq(),
                RollbackKind::InverseAdjust {
                    field: field.to_string(),
                    delta,
                    flag: flag.to_string(),
                    prior_flag,
                },
            )
        })
    }

    /// Record a ticket's edit as remotely confirmed, consuming the ticket.
    ///
    /// For field updates a server-canonical item, when given, has its fields
    /// merged over the speculative ones. Counter confirms never merge: the
    /// local count may already include other in-flight adjustments the
    /// server has not seen.
    pub fn confirm(
        &self,
        ticket: &RollbackTicket,
        canonical: Option<&Item>,
    ) -> Result<(), MutationError> {
        if !ticket.consume() {
            return Ok(());
        }

        {
            let mut confirmed = mutex_lock(&self.confirmed, SOURCE, "confirm");
            let key = (ticket.collection().to_string(), ticket.item_id().to_string());
            let entry = confirmed.entry(key).or_insert(0);
            *entry = (*entry).max(ticket.seq());
        }

        if let (RollbackKind::Restore(_), Some(canonical)) = (ticket.kind(), canonical) {
            self.with_item(ticket.collection(), ticket.item_id(), |item| {
                for (name, value) in &canonical.fields {
                    item.fields.insert(name.clone(), value.clone());
                }
            })?;
        }

        debug!(
            collection = ticket.collection(),
            item = ticket.item_id(),
            seq = ticket.seq(),
            "Mutation confirmed"
        );
        Ok(())
    }

    /// Undo a ticket's edit.
    ///
    /// Field-update rollbacks are skipped once a later confirmed result has
    /// superseded them. Counter rollbacks always undo their numeric delta so
    /// overlapping toggles net correctly; only the flag restore is gated on
    /// supersession.
    pub fn roll_back(&self, ticket: &RollbackTicket) -> RollbackOutcome {
        if !ticket.consume() {
            return RollbackOutcome::AlreadyConsumed;
        }

        // The supersession check and the restore must be one atomic step: the
        // confirmed-sequence guard is held until the item edit is done, so a
        // concurrent confirm cannot land in between and then be overwritten
        // by this (now stale) restore. Lock order is confirmed → collection;
        // confirm acquires them one at a time, never nested the other way.
        let confirmed = mutex_lock(&self.confirmed, SOURCE, "roll_back");
        let key = (ticket.collection().to_string(), ticket.item_id().to_string());
        let superseded = confirmed.get(&key).is_some_and(|seq| *seq >= ticket.seq());

        let outcome = match ticket.kind() {
            RollbackKind::Restore(snapshot) => {
                if superseded {
                    RollbackOutcome::Superseded
                } else {
                    let restored = self.with_item(ticket.collection(), ticket.item_id(), |item| {
                        snapshot.restore(&mut item.fields);
                    });
                    match restored {
                        Ok(()) => RollbackOutcome::Applied,
                        Err(_) => RollbackOutcome::Missing,
                    }
                }
            }
            RollbackKind::InverseAdjust {
                field,
                delta,
                flag,
                prior_flag,
            } => {
                let adjusted = self.with_item(ticket.collection(), ticket.item_id(), |item| {
                    let current = item.number(field).unwrap_or(0);
                    item.fields
                        .insert(field.clone(), Value::from(current - delta));
                    if !superseded {
                        match prior_flag {
                            Some(value) => {
                                item.fields.insert(flag.clone(), Value::from(*value));
                            }
                            None => {
                                item.fields.remove(flag);
                            }
                        }
                    }
                });
                match adjusted {
                    Ok(()) => RollbackOutcome::Applied,
                    Err(_) => RollbackOutcome::Missing,
                }
            }
        };
        drop(confirmed);

        if outcome == RollbackOutcome::Applied {
            counter!(METRIC_MUTATION_ROLLBACK_TOTAL, "collection" => ticket.collection().to_string())
                .increment(1);
            warn!(
                collection = ticket.collection(),
                item = ticket.item_id(),
                seq = ticket.seq(),
                "Speculative mutation rolled back"
            );
        } else {
            debug!(
                collection = ticket.collection(),
                item = ticket.item_id(),
                seq = ticket.seq(),
                outcome = ?outcome,
                "Rollback resolved without restoring"
            );
        }
        outcome
    }

    /// Apply a partial update speculatively and reconcile it with the remote.
    ///
    /// On remote success the canonical fields are merged over the speculative
    /// ones. On failure the snapshot is restored and a failure notice is
    /// emitted before the error is returned.
    pub async fn mutate(
        &self,
        collection: &str,
        item_id: &str,
        update: Map<String, Value>,
        remote: RemoteMutation,
    ) -> Result<(), MutationError> {
        let ticket = self.apply_speculative(collection, item_id, update)?;
        self.reconcile(ticket, remote).await
    }

    /// Increment a counter speculatively and reconcile with the remote.
    pub async fn increment_remote(
        &self,
        collection: &str,
        item_id: &str,
        field: &str,
        flag: &str,
        remote: RemoteMutation,
    ) -> Result<(), MutationError> {
        let ticket = self.increment(collection, item_id, field, flag)?;
        self.reconcile(ticket, remote).await
    }

    /// Decrement a counter speculatively and reconcile with the remote.
    pub async fn decrement_remote(
        &self,
        collection: &str,
        item_id: &str,
        field: &str,
        flag: &str,
        remote: RemoteMutation,
    ) -> Result<(), MutationError> {
        let ticket = self.decrement(collection, item_id, field, flag)?;
        self.reconcile(ticket, remote).await
    }

    async fn reconcile(
        &self,
        ticket: RollbackTicket,
        remote: RemoteMutation,
    ) -> Result<(), MutationError> {
        let speculative = self
            .collections
            .find_item(ticket.collection(), ticket.item_id())
            .ok_or_else(|| {
                MutationError::item_not_found(ticket.collection(), ticket.item_id())
            })?;

        match remote(speculative).await {
            Ok(canonical) => self.confirm(&ticket, Some(&canonical)),
            Err(err) => {
                self.roll_back(&ticket);
                self.notify(MutationNotice {
                    collection: ticket.collection().to_string(),
                    item_id: ticket.item_id().to_string(),
                    message: err.to_string(),
                });
                Err(MutationError::Remote { source: err })
            }
        }
    }

    fn notify(&self, notice: MutationNotice) {
        let sender = mutex_lock(&self.notices, SOURCE, "notify").clone();
        if let Some(sender) = sender {
            // A dropped receiver just means nobody is listening anymore.
            let _ = sender.send(notice);
        }
    }

    /// Run `apply` against one item under the collection's write lock.
    fn with_item<T>(
        &self,
        collection: &str,
        item_id: &str,
        apply: impl FnOnce(&mut Item) -> T,
    ) -> Result<T, MutationError> {
        let handle = self
            .collections
            .handle(collection)
            .ok_or_else(|| MutationError::collection_not_found(collection))?;
        let mut items = rw_write(&handle, SOURCE, "with_item");
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| MutationError::item_not_found(collection, item_id))?;
        Ok(apply(item))
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}
