//! Background-sync hook.
//!
//! A deliberately thin registry: the host names a task and supplies an async
//! handler, and `flush` invokes every handler when connectivity returns.
//! There is no durable queue and no delivery guarantee here; hosts that need
//! exactly-once replay own that persistence themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::error::NetworkError;
use crate::lock::mutex_lock;

const SOURCE: &str = "cache::sync";

/// Async handler invoked on reconnect.
pub type SyncHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<(), NetworkError>> + Send + Sync>;

/// Named background-sync tasks.
#[derive(Default)]
pub struct BackgroundSync {
    tasks: Mutex<HashMap<String, SyncHandler>>,
}

impl BackgroundSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a handler under a task name.
    pub fn register(&self, task: impl Into<String>, handler: SyncHandler) {
        mutex_lock(&self.tasks, SOURCE, "register").insert(task.into(), handler);
    }

    pub fn is_registered(&self, task: &str) -> bool {
        mutex_lock(&self.tasks, SOURCE, "is_registered").contains_key(task)
    }

    /// Invoke every registered handler, returning per-task success flags.
    ///
    /// Failed tasks stay registered for the next reconnect.
    pub async fn flush(&self) -> Vec<(String, bool)> {
        let tasks: Vec<(String, SyncHandler)> = mutex_lock(&self.tasks, SOURCE, "flush")
            .iter()
            .map(|(name, handler)| (name.clone(), handler.clone()))
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (name, handler) in tasks {
            match handler().await {
                Ok(()) => {
                    info!(task = %name, "Background sync task flushed");
                    mutex_lock(&self.tasks, SOURCE, "flush.remove").remove(&name);
                    results.push((name, true));
                }
                Err(err) => {
                    warn!(task = %name, error = %err, "Background sync task failed, keeping registration");
                    results.push((name, false));
                }
            }
        }
        results
    }
}
