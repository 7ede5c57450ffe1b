//! Request-scoped trigger-cause cache.
//!
//! The graph builder and the revision walker both walk the same trigger
//! causes. The cache makes each `(pipeline, counter)` cause a single
//! collaborator call per request; it is dropped with the request.

use std::collections::HashMap;
use std::sync::Arc;

use aspen_vsm_core::PipelineName;
use snafu::ResultExt;
use tracing::debug;

use crate::accessors::TriggerEntry;
use crate::accessors::TriggerHistory;
use crate::error::AccessorSnafu;
use crate::error::Result;

/// Trigger causes fetched during one request.
pub struct CauseCache<'a> {
    history: &'a dyn TriggerHistory,
    causes: HashMap<(PipelineName, u64), Arc<[TriggerEntry]>>,
}

impl<'a> CauseCache<'a> {
    /// Empty cache in front of `history`.
    pub fn new(history: &'a dyn TriggerHistory) -> Self {
        Self {
            history,
            causes: HashMap::new(),
        }
    }

    /// Trigger cause of one run, fetched on first use.
    pub async fn cause(&mut self, pipeline: &PipelineName, counter: u64) -> Result<Arc<[TriggerEntry]>> {
        let key = (pipeline.clone(), counter);
        if let Some(entries) = self.causes.get(&key) {
            return Ok(Arc::clone(entries));
        }

        let entries: Arc<[TriggerEntry]> = self
            .history
            .trigger_cause_for(pipeline, counter)
            .await
            .context(AccessorSnafu {
                operation: "trigger_cause_for",
            })?
            .into();
        debug!(pipeline = %pipeline, counter, entries = entries.len(), "fetched trigger cause");
        self.causes.insert(key, Arc::clone(&entries));
        Ok(entries)
    }

    /// Number of distinct causes fetched so far.
    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Whether nothing has been fetched yet.
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}
