//! Revision walker: attaches the revisions that fed the root run.
//!
//! Walks the same trigger causes as the builder, in the same order, and
//! records on each node the concrete runs and modifications that contributed
//! to the root. A material reached along several paths lists each
//! modification once; pipeline runs are kept sorted by counter.

use std::collections::HashSet;
use std::sync::Arc;

use aspen_vsm_core::NodeId;
use aspen_vsm_core::PipelineName;
use aspen_vsm_core::PipelineRevision;
use aspen_vsm_core::ValueStreamMap;
use aspen_vsm_core::ViewState;
use aspen_vsm_core::verified;
use snafu::OptionExt;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::accessors::PipelineRun;
use crate::accessors::TriggerEntry;
use crate::config::ValueStreamMapConfig;
use crate::error::Result;
use crate::error::UnknownNodeSnafu;
use crate::history::CauseCache;

struct Frame {
    entries: Arc<[TriggerEntry]>,
    next: usize,
}

/// Resolves the revisions contributing to one pipeline run.
pub struct RevisionWalker<'a> {
    settings: &'a ValueStreamMapConfig,
}

impl<'a> RevisionWalker<'a> {
    /// Walker honoring `settings`.
    pub fn new(settings: &'a ValueStreamMapConfig) -> Self {
        Self { settings }
    }

    /// Attach revisions to every node upstream of `run`.
    ///
    /// Deleted pipelines receive no revisions and are not walked through.
    ///
    /// # Errors
    ///
    /// - `Accessor` if a trigger cause cannot be fetched
    /// - `UnknownNode` if history names a node the graph does not contain
    #[instrument(skip_all, fields(pipeline = %run.name, counter = run.counter))]
    pub async fn resolve_revisions(
        &self,
        graph: &mut ValueStreamMap,
        cache: &mut CauseCache<'_>,
        run: &PipelineRun,
    ) -> Result<()> {
        let root_name = PipelineName::new(run.name.as_str());
        graph.root_mut().add_pipeline_revision(PipelineRevision::new(&run.name, run.counter, &run.label));

        let mut walked: HashSet<(PipelineName, u64)> = HashSet::from([(root_name.clone(), run.counter)]);
        let mut frames = vec![Frame {
            entries: cache.cause(&root_name, run.counter).await?,
            next: 0,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(entry) = frame.entries.get(frame.next).cloned() else {
                frames.pop();
                continue;
            };
            frame.next += 1;

            match entry {
                TriggerEntry::Scm {
                    material,
                    modifications,
                } => {
                    let id = NodeId::material(material.fingerprint);
                    let node = graph.node_mut(&id).context(UnknownNodeSnafu { id: id.to_string() })?;
                    let added = node.add_material_revisions(&modifications);
                    debug!(material = %id, added, "attached modifications");
                }
                TriggerEntry::Pipeline {
                    pipeline_name,
                    counter,
                    label,
                } => {
                    let upstream = PipelineName::new(pipeline_name.as_str());
                    let id = NodeId::Pipeline(upstream.clone());
                    let node = graph.node_mut(&id).context(UnknownNodeSnafu { id: id.to_string() })?;
                    if node.view_state() == ViewState::Deleted {
                        continue;
                    }
                    node.add_pipeline_revision(PipelineRevision::new(pipeline_name, counter, label));

                    if walked.insert((upstream.clone(), counter)) {
                        let entries = cache.cause(&upstream, counter).await?;
                        frames.push(Frame { entries, next: 0 });
                    }
                }
            }
        }

        if self.settings.warn_on_incompatible_revisions {
            self.mark_incompatible_revisions(graph);
        }
        Ok(())
    }

    /// Mark the root when a material was reached at more than one head revision.
    fn mark_incompatible_revisions(&self, graph: &mut ValueStreamMap) {
        let conflicting: Vec<String> = graph
            .nodes()
            .filter(|node| node.material().is_some_and(|material| !verified::is_fan_in_compatible(material.heads())))
            .map(|node| node.display_name().to_string())
            .collect();
        if conflicting.is_empty() {
            return;
        }

        warn!(materials = ?conflicting, "root built from incompatible revisions");
        let message = format!(
            "Value Stream Map has been built from incompatible revisions of: {}.",
            conflicting.join(", ")
        );
        graph.root_mut().set_view_state(ViewState::Warning, Some(message));
    }
}
