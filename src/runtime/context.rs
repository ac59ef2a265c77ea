//! Execution context lineage
//!
//! Every decoded reference is stamped with the generation current at the time.
//! Replacing the document advances the generation, after which older references
//! are rejected before they reach the browser.

use super::codec::ObjectRef;
use crate::cdp::CdpClient;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::debug;

/// Tracks the current context generation and the cached global object
#[derive(Debug, Default)]
pub struct ContextTracker {
    generation: AtomicU64,
    global: Mutex<Option<ObjectRef>>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Advance the generation; every existing reference becomes stale
    pub fn invalidate(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.forget_global();
        debug!("Execution context generation advanced to {}", generation);
        generation
    }

    /// Whether a reference belongs to the current generation
    pub fn is_current(&self, obj: &ObjectRef) -> bool {
        obj.generation == self.generation()
    }

    /// Fail with `StaleReference` if the reference outlived its document
    pub fn check(&self, obj: &ObjectRef) -> Result<()> {
        if self.is_current(obj) {
            Ok(())
        } else {
            Err(Error::stale(format!(
                "object {} belongs to a replaced document",
                obj.description.as_deref().unwrap_or(obj.id.as_str())
            )))
        }
    }

    /// Global object of the current generation, if already fetched
    pub fn cached_global(&self) -> Option<ObjectRef> {
        let global = self.global.lock().unwrap_or_else(|e| e.into_inner());
        global.as_ref().filter(|obj| self.is_current(obj)).cloned()
    }

    pub fn cache_global(&self, obj: ObjectRef) {
        *self.global.lock().unwrap_or_else(|e| e.into_inner()) = Some(obj);
    }

    /// Drop the cached global object without touching the generation
    pub fn forget_global(&self) {
        *self.global.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Forget the cached global object whenever the browser clears its contexts
    pub async fn watch(self: &Arc<Self>, client: &Arc<dyn CdpClient>) -> Result<JoinHandle<()>> {
        let mut events = client.subscribe_events("Runtime.executionContextsCleared").await?;
        let tracker: Weak<Self> = Arc::downgrade(self);

        Ok(tokio::spawn(async move {
            while events.recv().await.is_some() {
                match tracker.upgrade() {
                    Some(tracker) => {
                        debug!("Execution contexts cleared");
                        tracker.forget_global();
                    }
                    None => break,
                }
            }
        }))
    }
}
