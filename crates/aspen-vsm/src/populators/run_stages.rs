//! Attaches stage history to every pipeline run in the map.

use aspen_vsm_core::ValueStreamMap;
use async_trait::async_trait;
use snafu::ResultExt;
use tracing::instrument;

use super::Populator;
use crate::accessors::TriggerHistory;
use crate::error::AccessorSnafu;
use crate::error::Result;

/// Fills [`PipelineRevision::stages`](aspen_vsm_core::PipelineRevision::stages)
/// from recorded stage history.
pub struct RunStagesPopulator<'a> {
    history: &'a dyn TriggerHistory,
}

impl<'a> RunStagesPopulator<'a> {
    /// Populator reading stages from `history`.
    pub fn new(history: &'a dyn TriggerHistory) -> Self {
        Self { history }
    }
}

#[async_trait]
impl Populator for RunStagesPopulator<'_> {
    fn name(&self) -> &'static str {
        "run_stages"
    }

    #[instrument(skip_all, fields(populator = self.name()))]
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let runs: Vec<_> = graph
            .nodes()
            .filter(|node| node.is_pipeline())
            .filter_map(|node| {
                let pipeline = node.id().pipeline_name()?.clone();
                let counters: Vec<u64> =
                    node.revisions().iter().filter_map(|revision| revision.as_pipeline()).map(|run| run.counter).collect();
                Some((node.id().clone(), pipeline, counters))
            })
            .filter(|(_, _, counters)| !counters.is_empty())
            .collect();

        for (id, pipeline, counters) in runs {
            let mut stages = Vec::with_capacity(counters.len());
            for counter in counters {
                let history = self
                    .history
                    .stage_history(&pipeline, counter)
                    .await
                    .context(AccessorSnafu {
                        operation: "stage_history",
                    })?;
                stages.push((counter, history));
            }

            if let Some(node) = graph.node_mut(&id) {
                for revision in node.pipeline_revisions_mut() {
                    if let Some((_, history)) = stages.iter().find(|(counter, _)| *counter == revision.counter) {
                        revision.stages = history.clone();
                    }
                }
            }
        }
        Ok(())
    }
}
