//! Read-only collaborator interfaces consumed by the value-stream map service.
//!
//! Configuration, trigger history and permissions are owned elsewhere. The
//! service only reads them, sequentially, while serving one request.
//!
//! # Architecture
//!
//! ```text
//!                      ValueStreamMapService
//!                               │
//!         ┌─────────────────────┼─────────────────────┐
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!   ConfigAccessor        TriggerHistory      PermissionAccessor
//!   (current config)   (causes, runs, stages)   (view checks)
//! ```

use std::fmt;

use aspen_vsm_core::MaterialRevision;
use aspen_vsm_core::PipelineName;
use aspen_vsm_core::Revision;
use aspen_vsm_core::StageSummary;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use snafu::Snafu;

/// Failure reported by a collaborator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AccessorError {
    /// Backing store could not answer.
    #[snafu(display("collaborator unavailable: {reason}"))]
    Unavailable {
        /// What went wrong.
        reason: String,
    },
}

/// A source-control material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmMaterial {
    /// Content fingerprint identifying the material.
    pub fingerprint: String,
    /// Human-readable name, usually the repository URL.
    pub display_name: String,
    /// Material type, for example `git`.
    pub material_type: String,
    /// Name given to the material in pipeline configuration.
    #[serde(default)]
    pub name: Option<String>,
}

/// A material declared by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialConfig {
    /// Source-control repository.
    Scm(ScmMaterial),
    /// Stage of another pipeline.
    Dependency {
        /// Upstream pipeline name.
        pipeline: String,
        /// Upstream stage name.
        stage: String,
    },
}

/// Current configuration of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name with its configured casing.
    pub name: String,
    /// Declared materials.
    #[serde(default)]
    pub materials: Vec<MaterialConfig>,
    /// Stage names in execution order.
    #[serde(default)]
    pub stages: Vec<String>,
}

impl PipelineConfig {
    /// Pipeline without materials or stages.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            materials: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Add a source-control material.
    pub fn with_scm(mut self, material: ScmMaterial) -> Self {
        self.materials.push(MaterialConfig::Scm(material));
        self
    }

    /// Add a dependency on a stage of `pipeline`.
    pub fn with_dependency(mut self, pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        self.materials.push(MaterialConfig::Dependency {
            pipeline: pipeline.into(),
            stage: stage.into(),
        });
        self
    }

    /// Add a stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Name compared without regard to case.
    pub fn pipeline_name(&self) -> PipelineName {
        PipelineName::new(self.name.clone())
    }

    /// Whether this pipeline consumes a stage of `upstream`.
    pub fn depends_on(&self, upstream: &PipelineName) -> bool {
        self.materials.iter().any(|material| match material {
            MaterialConfig::Dependency { pipeline, .. } => PipelineName::new(pipeline.as_str()) == *upstream,
            MaterialConfig::Scm(_) => false,
        })
    }

    /// The source-control material with `fingerprint`, if declared.
    pub fn scm_material(&self, fingerprint: &str) -> Option<&ScmMaterial> {
        self.materials.iter().find_map(|material| match material {
            MaterialConfig::Scm(scm) if scm.fingerprint == fingerprint => Some(scm),
            _ => None,
        })
    }
}

/// One contributing revision of a trigger cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEntry {
    /// A run of an upstream pipeline.
    Pipeline {
        /// Upstream pipeline name as recorded by the run.
        pipeline_name: String,
        /// Upstream run counter.
        counter: u64,
        /// Upstream run label.
        label: String,
    },
    /// Modifications of a source-control material, most recent first.
    Scm {
        /// The material.
        material: ScmMaterial,
        /// Modifications in provider order.
        modifications: Vec<MaterialRevision>,
    },
}

/// How to pick one run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelector {
    /// By run counter.
    Counter(u64),
    /// By run label.
    Label(String),
}

/// One concrete run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    /// Pipeline name as recorded by the run.
    pub name: String,
    /// Run counter.
    pub counter: u64,
    /// Run label.
    pub label: String,
}

/// Identity of the user asking for a value-stream map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Identity with the given user name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// User name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read access to the current pipeline configuration.
#[async_trait]
pub trait ConfigAccessor: Send + Sync {
    /// Whether a pipeline called `name` is currently configured.
    async fn has_pipeline(&self, name: &PipelineName) -> Result<bool, AccessorError>;

    /// Current configuration of `name`.
    async fn pipeline_config(&self, name: &PipelineName) -> Result<Option<PipelineConfig>, AccessorError>;

    /// Pipelines currently declaring a dependency on `name`.
    async fn downstream_consumers_of(&self, name: &PipelineName) -> Result<Vec<PipelineConfig>, AccessorError>;

    /// Source-control material with `fingerprint`, if any pipeline declares it.
    async fn material_config(&self, fingerprint: &str) -> Result<Option<ScmMaterial>, AccessorError>;

    /// Pipelines currently declaring the material with `fingerprint`.
    async fn consumers_of_material(&self, fingerprint: &str) -> Result<Vec<PipelineConfig>, AccessorError>;
}

/// Read access to recorded pipeline runs and their trigger causes.
#[async_trait]
pub trait TriggerHistory: Send + Sync {
    /// Revisions that produced one run, in provider order.
    async fn trigger_cause_for(&self, pipeline: &PipelineName, counter: u64) -> Result<Vec<TriggerEntry>, AccessorError>;

    /// Look up one run.
    async fn find_run(
        &self,
        pipeline: &PipelineName,
        selector: &RunSelector,
    ) -> Result<Option<PipelineRun>, AccessorError>;

    /// Whether any revision of the material has been recorded.
    async fn has_material_instance(&self, fingerprint: &str) -> Result<bool, AccessorError>;

    /// Look up one modification of a material.
    async fn find_modification(
        &self,
        fingerprint: &str,
        revision_id: &str,
    ) -> Result<Option<MaterialRevision>, AccessorError>;

    /// Runs of `pipeline` whose trigger cause contains `upstream`.
    async fn runs_triggered_by(
        &self,
        pipeline: &PipelineName,
        upstream: &Revision,
    ) -> Result<Vec<PipelineRun>, AccessorError>;

    /// Stage history of one run.
    async fn stage_history(&self, pipeline: &PipelineName, counter: u64) -> Result<Vec<StageSummary>, AccessorError>;
}

/// View permission checks.
#[async_trait]
pub trait PermissionAccessor: Send + Sync {
    /// Whether `viewer` may see `pipeline`.
    async fn can_view_pipeline(&self, viewer: &Identity, pipeline: &PipelineName) -> Result<bool, AccessorError>;

    /// Whether `viewer` may see the material with `fingerprint`.
    async fn can_view_material(&self, viewer: &Identity, fingerprint: &str) -> Result<bool, AccessorError>;

    /// Whether `viewer` may edit the configuration of `pipeline`.
    ///
    /// A `false` answer is a normal outcome, not a failure.
    async fn can_edit_pipeline(&self, viewer: &Identity, pipeline: &PipelineName) -> Result<bool, AccessorError>;
}
