//! Attaches the runs of downstream pipelines triggered by this map's revisions.

use aspen_vsm_core::NodeId;
use aspen_vsm_core::PipelineRevision;
use aspen_vsm_core::Revision;
use aspen_vsm_core::ValueStreamMap;
use async_trait::async_trait;
use snafu::ResultExt;
use tracing::debug;
use tracing::instrument;

use super::Populator;
use crate::accessors::TriggerHistory;
use crate::error::AccessorSnafu;
use crate::error::Result;

/// Finds the runs of each downstream pipeline that consumed a revision
/// already attached to one of its parents.
///
/// Levels are processed left to right, so runs found for one consumer feed
/// the lookup for the next. Consumers that never ran keep no revisions.
pub struct DownstreamInstancePopulator<'a> {
    history: &'a dyn TriggerHistory,
}

impl<'a> DownstreamInstancePopulator<'a> {
    /// Populator reading runs from `history`.
    pub fn new(history: &'a dyn TriggerHistory) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Populator for DownstreamInstancePopulator<'_> {
    fn name(&self) -> &'static str {
        "downstream_instances"
    }

    #[instrument(skip_all, fields(populator = self.name()))]
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let mut downstream: Vec<(i32, NodeId)> = graph
            .nodes()
            .filter(|node| node.level() > 0 && node.is_pipeline())
            .map(|node| (node.level(), node.id().clone()))
            .collect();
        downstream.sort_by_key(|(level, _)| *level);

        for (_, id) in downstream {
            let Some(pipeline) = id.pipeline_name().cloned() else {
                continue;
            };
            let upstream: Vec<Revision> = graph
                .real_parents(&id)
                .into_iter()
                .filter_map(|parent| graph.node(parent))
                .flat_map(|parent| parent.revisions().iter().cloned())
                .collect();

            let mut runs = Vec::new();
            for revision in &upstream {
                let triggered = self
                    .history
                    .runs_triggered_by(&pipeline, revision)
                    .await
                    .context(AccessorSnafu {
                        operation: "runs_triggered_by",
                    })?;
                runs.extend(triggered);
            }

            if let Some(node) = graph.node_mut(&id) {
                let mut added = 0;
                for run in runs {
                    if node.add_pipeline_revision(PipelineRevision::new(run.name, run.counter, run.label)) {
                        added += 1;
                    }
                }
                debug!(pipeline = %pipeline, added, "attached downstream runs");
            }
        }
        Ok(())
    }
}
