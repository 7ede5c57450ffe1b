//! Graph builder: discovers the structure of a value-stream map.
//!
//! Upstream structure comes from trigger history. Starting at the root run,
//! every trigger-cause entry becomes an upstream node of the run it
//! triggered; pipeline entries are then expanded through their own trigger
//! cause. Discovery is depth-first pre-order over an explicit frame stack, so
//! an ancestor run is fully expanded before the next sibling entry.
//!
//! ```text
//!  frame stack                     graph
//!  ┌──────────────────────┐
//!  │ build#4   entry 0..  │        git ──> build ──┐
//!  ├──────────────────────┤                         ├──> deploy
//!  │ deploy#7  entry 1..  │        svn ─────────────┘
//!  └──────────────────────┘
//! ```
//!
//! Downstream structure comes from current configuration: consumers of the
//! root, then their consumers, breadth first.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use aspen_vsm_core::MaterialRevision;
use aspen_vsm_core::NodeId;
use aspen_vsm_core::NodeSpec;
use aspen_vsm_core::PipelineName;
use aspen_vsm_core::ValueStreamMap;
use aspen_vsm_core::ViewState;
use snafu::ResultExt;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::accessors::ConfigAccessor;
use crate::accessors::ScmMaterial;
use crate::accessors::TriggerEntry;
use crate::config::ValueStreamMapConfig;
use crate::error::AccessorSnafu;
use crate::error::GraphSnafu;
use crate::error::Result;
use crate::history::CauseCache;

/// One run whose trigger cause is being walked.
struct Frame {
    node: NodeId,
    entries: Arc<[TriggerEntry]>,
    next: usize,
}

/// Node description for a source-control material.
pub(crate) fn scm_node(material: &ScmMaterial) -> NodeSpec {
    NodeSpec::material(&material.fingerprint, &material.display_name, &material.material_type)
        .with_material_name(material.name.clone())
}

/// Builds the node structure of value-stream maps.
pub struct GraphBuilder<'a> {
    config: &'a dyn ConfigAccessor,
    settings: &'a ValueStreamMapConfig,
}

impl<'a> GraphBuilder<'a> {
    /// Builder reading current configuration from `config`.
    pub fn new(config: &'a dyn ConfigAccessor, settings: &'a ValueStreamMapConfig) -> Self {
        Self { config, settings }
    }

    /// Build the upstream graph of one pipeline run.
    ///
    /// Pipelines that ran but are no longer configured are marked deleted and
    /// not expanded further. Each run is expanded at most once.
    ///
    /// # Errors
    ///
    /// - `Accessor` if a collaborator call fails
    /// - `Graph` if the history describes a cycle
    #[instrument(skip_all, fields(pipeline = %pipeline, counter))]
    pub async fn build(
        &self,
        cache: &mut CauseCache<'_>,
        pipeline: &PipelineName,
        counter: u64,
    ) -> Result<ValueStreamMap> {
        let root_name = self.display_name(pipeline).await?;
        let mut graph = ValueStreamMap::new(NodeSpec::pipeline(root_name));
        let mut expanded: HashSet<(PipelineName, u64)> = HashSet::from([(pipeline.clone(), counter)]);
        let mut frames = vec![Frame {
            node: graph.root_id().clone(),
            entries: cache.cause(pipeline, counter).await?,
            next: 0,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(entry) = frame.entries.get(frame.next).cloned() else {
                frames.pop();
                continue;
            };
            frame.next += 1;
            let child = frame.node.clone();

            match entry {
                TriggerEntry::Scm { material, .. } => {
                    graph.add_upstream_node(scm_node(&material), &child).context(GraphSnafu)?;
                }
                TriggerEntry::Pipeline {
                    pipeline_name,
                    counter: upstream_counter,
                    ..
                } => {
                    let upstream = PipelineName::new(pipeline_name);
                    let configured = self
                        .config
                        .has_pipeline(&upstream)
                        .await
                        .context(AccessorSnafu { operation: "has_pipeline" })?;

                    if !configured {
                        warn!(pipeline = %upstream, counter = upstream_counter, "upstream pipeline no longer configured");
                        let node = graph
                            .add_upstream_node(NodeSpec::pipeline(upstream), &child)
                            .context(GraphSnafu)?;
                        node.set_view_state(ViewState::Deleted, Some(self.settings.deleted_pipeline_message.clone()));
                        continue;
                    }

                    let display = self.display_name(&upstream).await?;
                    let id = graph
                        .add_upstream_node(NodeSpec::pipeline(display), &child)
                        .context(GraphSnafu)?
                        .id()
                        .clone();
                    if expanded.insert((upstream.clone(), upstream_counter)) {
                        let entries = cache.cause(&upstream, upstream_counter).await?;
                        frames.push(Frame {
                            node: id,
                            entries,
                            next: 0,
                        });
                    }
                }
            }
        }

        debug!(nodes = graph.len(), runs = expanded.len(), "built upstream graph");
        Ok(graph)
    }

    /// Build the graph of one material revision.
    ///
    /// The material is the root and carries `modification`; every pipeline
    /// configured to consume it is added downstream, transitively.
    #[instrument(skip_all, fields(fingerprint = %material.fingerprint, revision = %modification.revision_id))]
    pub async fn build_for_material(
        &self,
        material: &ScmMaterial,
        modification: MaterialRevision,
    ) -> Result<ValueStreamMap> {
        let mut graph = ValueStreamMap::new(scm_node(material));
        graph.root_mut().add_material_revisions(&[modification]);
        self.extend_downstream(&mut graph).await?;
        Ok(graph)
    }

    /// Add configured consumers of the root, and their consumers, downstream.
    ///
    /// A consumer reached again through a longer path moves right, cascading
    /// to its own consumers. No consumers simply means no downstream levels.
    #[instrument(skip_all, fields(root = %graph.root_id()))]
    pub async fn extend_downstream(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let root = graph.root_id().clone();
        let mut expanded: HashSet<NodeId> = HashSet::from([root.clone()]);
        let mut pending = VecDeque::from([root]);

        while let Some(parent) = pending.pop_front() {
            let consumers = match &parent {
                NodeId::Pipeline(name) => self
                    .config
                    .downstream_consumers_of(name)
                    .await
                    .context(AccessorSnafu {
                        operation: "downstream_consumers_of",
                    })?,
                NodeId::Material(fingerprint) => self
                    .config
                    .consumers_of_material(fingerprint)
                    .await
                    .context(AccessorSnafu {
                        operation: "consumers_of_material",
                    })?,
                NodeId::Filler(_) => continue,
            };

            for consumer in consumers {
                let id = graph
                    .add_downstream_node(NodeSpec::pipeline(PipelineName::new(consumer.name)), &parent)
                    .context(GraphSnafu)?
                    .id()
                    .clone();
                if expanded.insert(id.clone()) {
                    pending.push_back(id);
                }
            }
        }

        debug!(nodes = graph.len(), "extended downstream");
        Ok(())
    }

    /// Configured casing of a pipeline name, falling back to the given one.
    async fn display_name(&self, pipeline: &PipelineName) -> Result<PipelineName> {
        let config = self
            .config
            .pipeline_config(pipeline)
            .await
            .context(AccessorSnafu {
                operation: "pipeline_config",
            })?;
        Ok(config.map_or_else(|| pipeline.clone(), |config| config.pipeline_name()))
    }
}
