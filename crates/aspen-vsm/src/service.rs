//! Request handling for value-stream maps.
//!
//! # Architecture
//!
//! ```text
//!  get_value_stream_map(pipeline, counter, viewer)
//!        │
//!        ├─► permission check ──────────────────────────► 401
//!        ├─► find root run ─────────────────────────────► 500
//!        ├─► GraphBuilder::build + extend_downstream
//!        ├─► RevisionWalker::resolve_revisions
//!        ├─► cycle check ───────────────────────────────► 501
//!        ├─► populators (fixed order)
//!        └─► normalize ─► ValueStreamMapModel
//! ```
//!
//! Every request builds a private graph and cause cache; nothing outlives
//! the call. Failures are logged in full and returned as a [`VsmFailure`].

use std::sync::Arc;

use aspen_vsm_core::PipelineName;
use aspen_vsm_core::ValueStreamMap;
use aspen_vsm_core::ValueStreamMapModel;
use snafu::OptionExt;
use snafu::ResultExt;
use snafu::ensure;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::accessors::ConfigAccessor;
use crate::accessors::Identity;
use crate::accessors::PermissionAccessor;
use crate::accessors::RunSelector;
use crate::accessors::TriggerHistory;
use crate::builder::GraphBuilder;
use crate::config::ValueStreamMapConfig;
use crate::error::AccessorSnafu;
use crate::error::CyclicDependencySnafu;
use crate::error::MaterialInstanceNotFoundSnafu;
use crate::error::MaterialNotFoundSnafu;
use crate::error::MaterialUnauthorizedSnafu;
use crate::error::ModificationNotFoundSnafu;
use crate::error::PipelineUnauthorizedSnafu;
use crate::error::Result;
use crate::error::RunNotFoundSnafu;
use crate::error::VsmError;
use crate::error::VsmFailure;
use crate::error::keys;
use crate::error::status;
use crate::history::CauseCache;
use crate::populators::DownstreamInstancePopulator;
use crate::populators::EditPermissionPopulator;
use crate::populators::PermissionPopulator;
use crate::populators::Populator;
use crate::populators::RunStagesPopulator;
use crate::populators::UnrunStagesPopulator;
use crate::revisions::RevisionWalker;

/// Builds value-stream maps on request.
pub struct ValueStreamMapService {
    config: Arc<dyn ConfigAccessor>,
    history: Arc<dyn TriggerHistory>,
    permissions: Arc<dyn PermissionAccessor>,
    settings: ValueStreamMapConfig,
}

impl ValueStreamMapService {
    /// Create a service over the given collaborators.
    pub fn new(
        config: Arc<dyn ConfigAccessor>,
        history: Arc<dyn TriggerHistory>,
        permissions: Arc<dyn PermissionAccessor>,
        settings: ValueStreamMapConfig,
    ) -> Self {
        Self {
            config,
            history,
            permissions,
            settings,
        }
    }

    /// Service options.
    pub fn settings(&self) -> &ValueStreamMapConfig {
        &self.settings
    }

    /// Value-stream map of run `counter` of `pipeline`, as seen by `viewer`.
    ///
    /// # Errors
    ///
    /// - 401 if `viewer` may not see `pipeline`
    /// - 500 if the run does not exist or a collaborator fails
    /// - 501 if the recorded history forms a cycle
    #[instrument(skip(self, viewer), fields(viewer = %viewer))]
    pub async fn get_value_stream_map(
        &self,
        pipeline: &str,
        counter: u64,
        viewer: &Identity,
    ) -> std::result::Result<ValueStreamMapModel, VsmFailure> {
        let name = PipelineName::new(pipeline);
        self.pipeline_map(&name, counter, viewer)
            .await
            .map_err(|err| pipeline_failure(pipeline, counter, &err))
    }

    /// Value-stream map of modification `revision` of the material with
    /// `fingerprint`, as seen by `viewer`.
    ///
    /// # Errors
    ///
    /// - 404 if the material, its recorded instance or the modification is unknown
    /// - 401 if `viewer` may not see the material
    /// - 500 if a collaborator fails
    /// - 501 if the configured consumers form a cycle
    #[instrument(skip(self, viewer), fields(viewer = %viewer))]
    pub async fn get_material_value_stream_map(
        &self,
        fingerprint: &str,
        revision: &str,
        viewer: &Identity,
    ) -> std::result::Result<ValueStreamMapModel, VsmFailure> {
        self.material_map(fingerprint, revision, viewer)
            .await
            .map_err(|err| material_failure(fingerprint, revision, &err))
    }

    async fn pipeline_map(&self, pipeline: &PipelineName, counter: u64, viewer: &Identity) -> Result<ValueStreamMapModel> {
        let allowed = self
            .permissions
            .can_view_pipeline(viewer, pipeline)
            .await
            .context(AccessorSnafu {
                operation: "can_view_pipeline",
            })?;
        ensure!(allowed, PipelineUnauthorizedSnafu {
            pipeline: pipeline.to_string(),
        });

        let run = self
            .history
            .find_run(pipeline, &RunSelector::Counter(counter))
            .await
            .context(AccessorSnafu { operation: "find_run" })?
            .context(RunNotFoundSnafu {
                pipeline: pipeline.to_string(),
                counter,
            })?;

        let mut cache = CauseCache::new(self.history.as_ref());
        let builder = GraphBuilder::new(self.config.as_ref(), &self.settings);
        let mut graph = builder.build(&mut cache, pipeline, counter).await?;
        if self.settings.include_downstream {
            builder.extend_downstream(&mut graph).await?;
        }
        RevisionWalker::new(&self.settings).resolve_revisions(&mut graph, &mut cache, &run).await?;
        debug!(causes = cache.len(), "resolved revisions");

        self.finish(graph, viewer).await
    }

    async fn material_map(&self, fingerprint: &str, revision: &str, viewer: &Identity) -> Result<ValueStreamMapModel> {
        let material = self
            .config
            .material_config(fingerprint)
            .await
            .context(AccessorSnafu {
                operation: "material_config",
            })?
            .context(MaterialNotFoundSnafu { fingerprint })?;

        let allowed = self
            .permissions
            .can_view_material(viewer, fingerprint)
            .await
            .context(AccessorSnafu {
                operation: "can_view_material",
            })?;
        ensure!(allowed, MaterialUnauthorizedSnafu { fingerprint });

        let recorded = self
            .history
            .has_material_instance(fingerprint)
            .await
            .context(AccessorSnafu {
                operation: "has_material_instance",
            })?;
        ensure!(recorded, MaterialInstanceNotFoundSnafu { fingerprint });

        let modification = self
            .history
            .find_modification(fingerprint, revision)
            .await
            .context(AccessorSnafu {
                operation: "find_modification",
            })?
            .context(ModificationNotFoundSnafu { fingerprint, revision })?;

        let builder = GraphBuilder::new(self.config.as_ref(), &self.settings);
        let graph = builder.build_for_material(&material, modification).await?;
        self.finish(graph, viewer).await
    }

    /// Reject cycles, decorate, and freeze the graph.
    async fn finish(&self, mut graph: ValueStreamMap, viewer: &Identity) -> Result<ValueStreamMapModel> {
        ensure!(!graph.has_cycle(), CyclicDependencySnafu {
            root: graph.root_id().to_string(),
        });

        for populator in self.populators(viewer) {
            debug!(populator = populator.name(), "applying populator");
            populator.apply(&mut graph).await?;
        }

        let model = graph.into_model();
        info!(
            nodes = model.node_count(),
            levels = model.nodes_at_each_level().len(),
            "rendered value stream map"
        );
        Ok(model)
    }

    fn populators<'a>(&'a self, viewer: &'a Identity) -> Vec<Box<dyn Populator + 'a>> {
        vec![
            Box::new(DownstreamInstancePopulator::new(self.history.as_ref())),
            Box::new(RunStagesPopulator::new(self.history.as_ref())),
            Box::new(UnrunStagesPopulator::new(self.config.as_ref())),
            Box::new(PermissionPopulator::new(self.permissions.as_ref(), viewer)),
            Box::new(EditPermissionPopulator::new(self.permissions.as_ref(), viewer)),
        ]
    }
}

/// Message shown when history no longer matches configuration.
const CYCLE_DETAIL: &str =
    "Changes to the configuration have introduced complex dependencies for this instance which are not supported currently.";

/// Message shown for every unexpected failure.
const SERVER_LOG_DETAIL: &str = "Please check the server log for details.";

fn pipeline_failure(pipeline: &str, counter: u64, err: &VsmError) -> VsmFailure {
    match err {
        VsmError::PipelineUnauthorized { .. } => {
            warn!(pipeline, counter, error = %err, "value stream map refused");
            VsmFailure::new(
                status::UNAUTHORIZED,
                keys::VSM_PIPELINE_UNAUTHORIZED,
                format!("You do not have view permissions for pipeline '{pipeline}'."),
            )
        }
        err if err.is_cyclic() => {
            error!(pipeline, counter, error = %err, "value stream map has a cycle");
            VsmFailure::new(
                status::NOT_IMPLEMENTED,
                keys::VSM_CYCLIC_DEPENDENCY,
                format!("Value Stream Map of Pipeline '{pipeline}' with counter '{counter}' can not be rendered. {CYCLE_DETAIL}"),
            )
        }
        err => {
            error!(pipeline, counter, error = %err, "value stream map failed");
            VsmFailure::new(
                status::INTERNAL_SERVER_ERROR,
                keys::VSM_INTERNAL_ERROR,
                format!("Value Stream Map of pipeline '{pipeline}' with counter '{counter}' can not be rendered. {SERVER_LOG_DETAIL}"),
            )
        }
    }
}

fn material_failure(fingerprint: &str, revision: &str, err: &VsmError) -> VsmFailure {
    let refused = |status, key, message: String| {
        warn!(fingerprint, revision, error = %err, "material value stream map refused");
        VsmFailure::new(status, key, message)
    };

    match err {
        VsmError::MaterialNotFound { .. } => refused(
            status::NOT_FOUND,
            keys::VSM_MATERIAL_NOT_FOUND,
            format!("Material with fingerprint '{fingerprint}' not found."),
        ),
        VsmError::MaterialUnauthorized { .. } => refused(
            status::UNAUTHORIZED,
            keys::VSM_MATERIAL_UNAUTHORIZED,
            format!("You do not have view permissions for material with fingerprint '{fingerprint}'."),
        ),
        VsmError::MaterialInstanceNotFound { .. } => refused(
            status::NOT_FOUND,
            keys::VSM_MATERIAL_NOT_FOUND,
            format!("Material Instance with fingerprint '{fingerprint}' not found."),
        ),
        VsmError::ModificationNotFound { .. } => refused(
            status::NOT_FOUND,
            keys::VSM_MODIFICATION_NOT_FOUND,
            format!("Modification '{revision}' for material with fingerprint '{fingerprint}' not found."),
        ),
        err if err.is_cyclic() => {
            error!(fingerprint, revision, error = %err, "material value stream map has a cycle");
            VsmFailure::new(
                status::NOT_IMPLEMENTED,
                keys::VSM_CYCLIC_DEPENDENCY,
                format!(
                    "Value Stream Map of material with fingerprint '{fingerprint}' with revision '{revision}' can not be rendered. {CYCLE_DETAIL}"
                ),
            )
        }
        err => {
            error!(fingerprint, revision, error = %err, "material value stream map failed");
            VsmFailure::new(
                status::INTERNAL_SERVER_ERROR,
                keys::VSM_INTERNAL_ERROR,
                format!(
                    "Value Stream Map of material with fingerprint '{fingerprint}' with revision '{revision}' can not be rendered. {SERVER_LOG_DETAIL}"
                ),
            )
        }
    }
}
