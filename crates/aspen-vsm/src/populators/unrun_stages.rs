//! Completes stage lists with configured stages that have not run.

use aspen_vsm_core::StageSummary;
use aspen_vsm_core::ValueStreamMap;
use async_trait::async_trait;
use snafu::ResultExt;
use tracing::instrument;

use super::Populator;
use crate::accessors::ConfigAccessor;
use crate::error::AccessorSnafu;
use crate::error::Result;

/// Appends every configured stage missing from a run as
/// [`StageState::Unknown`](aspen_vsm_core::StageState::Unknown) with counter 0.
///
/// Pipelines that never ran keep an empty revision list, and pipelines no
/// longer configured are left untouched.
pub struct UnrunStagesPopulator<'a> {
    config: &'a dyn ConfigAccessor,
}

impl<'a> UnrunStagesPopulator<'a> {
    /// Populator reading stage configuration from `config`.
    pub fn new(config: &'a dyn ConfigAccessor) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Populator for UnrunStagesPopulator<'_> {
    fn name(&self) -> &'static str {
        "unrun_stages"
    }

    #[instrument(skip_all, fields(populator = self.name()))]
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let pipelines: Vec<_> = graph
            .nodes()
            .filter(|node| node.is_pipeline() && !node.revisions().is_empty())
            .filter_map(|node| Some((node.id().clone(), node.id().pipeline_name()?.clone())))
            .collect();

        for (id, pipeline) in pipelines {
            let Some(config) = self
                .config
                .pipeline_config(&pipeline)
                .await
                .context(AccessorSnafu {
                    operation: "pipeline_config",
                })?
            else {
                continue;
            };

            if let Some(node) = graph.node_mut(&id) {
                for revision in node.pipeline_revisions_mut() {
                    for stage in &config.stages {
                        if !revision.stages.iter().any(|summary| summary.name == *stage) {
                            revision.stages.push(StageSummary::unrun(stage.as_str()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
