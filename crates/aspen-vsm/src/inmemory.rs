//! In-memory collaborator implementations.
//!
//! Thread-safe, deterministic stand-ins for configuration, trigger history
//! and permissions. Used to embed the service without a CI backend and to
//! drive tests. Each can be told to fail every call, to exercise the
//! service's collaborator-failure path.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use aspen_vsm_core::MaterialRevision;
use aspen_vsm_core::PipelineName;
use aspen_vsm_core::Revision;
use aspen_vsm_core::StageSummary;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::accessors::AccessorError;
use crate::accessors::ConfigAccessor;
use crate::accessors::Identity;
use crate::accessors::PermissionAccessor;
use crate::accessors::PipelineConfig;
use crate::accessors::PipelineRun;
use crate::accessors::RunSelector;
use crate::accessors::ScmMaterial;
use crate::accessors::TriggerEntry;
use crate::accessors::TriggerHistory;

/// Error for every call while a failure is injected.
async fn injected(failure: &RwLock<Option<String>>) -> Result<(), AccessorError> {
    match failure.read().await.as_ref() {
        Some(reason) => Err(AccessorError::Unavailable { reason: reason.clone() }),
        None => Ok(()),
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration held in memory, in insertion order.
#[derive(Default)]
pub struct InMemoryPipelineConfig {
    pipelines: RwLock<Vec<PipelineConfig>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryPipelineConfig {
    /// Create an empty configuration wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a configuration holding `pipelines`.
    pub fn with_pipelines(pipelines: impl IntoIterator<Item = PipelineConfig>) -> Arc<Self> {
        Arc::new(Self {
            pipelines: RwLock::new(pipelines.into_iter().collect()),
            failure: RwLock::new(None),
        })
    }

    /// Add or replace a pipeline.
    pub async fn upsert_pipeline(&self, config: PipelineConfig) {
        let name = config.pipeline_name();
        let mut pipelines = self.pipelines.write().await;
        match pipelines.iter_mut().find(|existing| existing.pipeline_name() == name) {
            Some(existing) => *existing = config,
            None => pipelines.push(config),
        }
    }

    /// Remove a pipeline. Returns whether it existed.
    pub async fn remove_pipeline(&self, name: &str) -> bool {
        let name = PipelineName::new(name);
        let mut pipelines = self.pipelines.write().await;
        let before = pipelines.len();
        pipelines.retain(|config| config.pipeline_name() != name);
        pipelines.len() != before
    }

    /// Make every subsequent call fail with `reason`.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }
}

#[async_trait]
impl ConfigAccessor for InMemoryPipelineConfig {
    async fn has_pipeline(&self, name: &PipelineName) -> Result<bool, AccessorError> {
        injected(&self.failure).await?;
        Ok(self.pipelines.read().await.iter().any(|config| config.pipeline_name() == *name))
    }

    async fn pipeline_config(&self, name: &PipelineName) -> Result<Option<PipelineConfig>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self.pipelines.read().await.iter().find(|config| config.pipeline_name() == *name).cloned())
    }

    async fn downstream_consumers_of(&self, name: &PipelineName) -> Result<Vec<PipelineConfig>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self.pipelines.read().await.iter().filter(|config| config.depends_on(name)).cloned().collect())
    }

    async fn material_config(&self, fingerprint: &str) -> Result<Option<ScmMaterial>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self.pipelines.read().await.iter().find_map(|config| config.scm_material(fingerprint)).cloned())
    }

    async fn consumers_of_material(&self, fingerprint: &str) -> Result<Vec<PipelineConfig>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self
            .pipelines
            .read()
            .await
            .iter()
            .filter(|config| config.scm_material(fingerprint).is_some())
            .cloned()
            .collect())
    }
}

// ============================================================================
// Trigger history
// ============================================================================

/// A recorded pipeline run.
#[derive(Debug, Clone)]
struct RecordedRun {
    run: PipelineRun,
    cause: Vec<TriggerEntry>,
    stages: Vec<StageSummary>,
}

impl RecordedRun {
    fn consumed(&self, upstream: &Revision) -> bool {
        self.cause.iter().any(|entry| match (entry, upstream) {
            (
                TriggerEntry::Pipeline {
                    pipeline_name, counter, ..
                },
                Revision::Pipeline(run),
            ) => {
                *counter == run.counter
                    && PipelineName::new(pipeline_name.as_str()) == PipelineName::new(run.pipeline_name.as_str())
            }
            (
                TriggerEntry::Scm {
                    material,
                    modifications,
                },
                Revision::Material(modification),
            ) => {
                material.fingerprint == modification.fingerprint
                    && modifications.iter().any(|m| m.revision_id == modification.revision_id)
            }
            _ => false,
        })
    }
}

/// Pipeline runs and material modifications held in memory.
#[derive(Default)]
pub struct InMemoryTriggerHistory {
    /// Runs keyed by lowercased pipeline name and counter.
    runs: RwLock<BTreeMap<(String, u64), RecordedRun>>,
    /// Modifications per material fingerprint, most recent first.
    modifications: RwLock<HashMap<String, Vec<MaterialRevision>>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryTriggerHistory {
    /// Create an empty history wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a run with its trigger cause and stage history.
    ///
    /// Modifications named by the cause are recorded for their materials.
    pub async fn record_run(&self, run: PipelineRun, cause: Vec<TriggerEntry>, stages: Vec<StageSummary>) {
        for entry in &cause {
            if let TriggerEntry::Scm { modifications, .. } = entry {
                self.record_modifications(modifications.iter().cloned()).await;
            }
        }
        let key = (PipelineName::new(run.name.as_str()).canonical().to_string(), run.counter);
        self.runs.write().await.insert(key, RecordedRun { run, cause, stages });
    }

    /// Record material modifications, skipping known revision ids.
    pub async fn record_modifications(&self, modifications: impl IntoIterator<Item = MaterialRevision>) {
        let mut recorded = self.modifications.write().await;
        for modification in modifications {
            let known = recorded.entry(modification.fingerprint.clone()).or_default();
            if !known.iter().any(|m| m.revision_id == modification.revision_id) {
                known.push(modification);
            }
        }
    }

    /// Make every subsequent call fail with `reason`.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }

    fn key(pipeline: &PipelineName, counter: u64) -> (String, u64) {
        (pipeline.canonical().to_string(), counter)
    }
}

#[async_trait]
impl TriggerHistory for InMemoryTriggerHistory {
    async fn trigger_cause_for(&self, pipeline: &PipelineName, counter: u64) -> Result<Vec<TriggerEntry>, AccessorError> {
        injected(&self.failure).await?;
        match self.runs.read().await.get(&Self::key(pipeline, counter)) {
            Some(recorded) => Ok(recorded.cause.clone()),
            None => Err(AccessorError::Unavailable {
                reason: format!("no run {counter} of pipeline {pipeline}"),
            }),
        }
    }

    async fn find_run(
        &self,
        pipeline: &PipelineName,
        selector: &RunSelector,
    ) -> Result<Option<PipelineRun>, AccessorError> {
        injected(&self.failure).await?;
        let runs = self.runs.read().await;
        let found = match selector {
            RunSelector::Counter(counter) => runs.get(&Self::key(pipeline, *counter)),
            RunSelector::Label(label) => runs
                .iter()
                .find(|((name, _), recorded)| name == pipeline.canonical() && recorded.run.label == *label)
                .map(|(_, recorded)| recorded),
        };
        Ok(found.map(|recorded| recorded.run.clone()))
    }

    async fn has_material_instance(&self, fingerprint: &str) -> Result<bool, AccessorError> {
        injected(&self.failure).await?;
        Ok(self.modifications.read().await.get(fingerprint).is_some_and(|known| !known.is_empty()))
    }

    async fn find_modification(
        &self,
        fingerprint: &str,
        revision_id: &str,
    ) -> Result<Option<MaterialRevision>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self
            .modifications
            .read()
            .await
            .get(fingerprint)
            .and_then(|known| known.iter().find(|m| m.revision_id == revision_id))
            .cloned())
    }

    async fn runs_triggered_by(
        &self,
        pipeline: &PipelineName,
        upstream: &Revision,
    ) -> Result<Vec<PipelineRun>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self
            .runs
            .read()
            .await
            .iter()
            .filter(|((name, _), recorded)| name == pipeline.canonical() && recorded.consumed(upstream))
            .map(|(_, recorded)| recorded.run.clone())
            .collect())
    }

    async fn stage_history(&self, pipeline: &PipelineName, counter: u64) -> Result<Vec<StageSummary>, AccessorError> {
        injected(&self.failure).await?;
        Ok(self
            .runs
            .read()
            .await
            .get(&Self::key(pipeline, counter))
            .map(|recorded| recorded.stages.clone())
            .unwrap_or_default())
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// Permissions that allow everything except explicit denials.
#[derive(Default)]
pub struct InMemoryPermissions {
    /// Denied `(viewer, lowercased pipeline)` pairs.
    denied_pipelines: RwLock<HashSet<(String, String)>>,
    /// Denied `(viewer, fingerprint)` pairs.
    denied_materials: RwLock<HashSet<(String, String)>>,
    /// `(viewer, lowercased pipeline)` pairs without edit rights.
    read_only_pipelines: RwLock<HashSet<(String, String)>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryPermissions {
    /// Create allow-all permissions wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Forbid `viewer` from seeing `pipeline`.
    pub async fn deny_pipeline(&self, viewer: &Identity, pipeline: &str) {
        let pipeline = PipelineName::new(pipeline).canonical().to_string();
        self.denied_pipelines.write().await.insert((viewer.name().to_string(), pipeline));
    }

    /// Forbid `viewer` from seeing the material with `fingerprint`.
    pub async fn deny_material(&self, viewer: &Identity, fingerprint: &str) {
        self.denied_materials.write().await.insert((viewer.name().to_string(), fingerprint.to_string()));
    }

    /// Forbid `viewer` from editing `pipeline`, while still allowing views.
    pub async fn deny_edit(&self, viewer: &Identity, pipeline: &str) {
        let pipeline = PipelineName::new(pipeline).canonical().to_string();
        self.read_only_pipelines.write().await.insert((viewer.name().to_string(), pipeline));
    }

    /// Make every subsequent call fail with `reason`.
    pub async fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write().await = Some(reason.into());
    }
}

#[async_trait]
impl PermissionAccessor for InMemoryPermissions {
    async fn can_view_pipeline(&self, viewer: &Identity, pipeline: &PipelineName) -> Result<bool, AccessorError> {
        injected(&self.failure).await?;
        let key = (viewer.name().to_string(), pipeline.canonical().to_string());
        Ok(!self.denied_pipelines.read().await.contains(&key))
    }

    async fn can_view_material(&self, viewer: &Identity, fingerprint: &str) -> Result<bool, AccessorError> {
        injected(&self.failure).await?;
        let key = (viewer.name().to_string(), fingerprint.to_string());
        Ok(!self.denied_materials.read().await.contains(&key))
    }

    async fn can_edit_pipeline(&self, viewer: &Identity, pipeline: &PipelineName) -> Result<bool, AccessorError> {
        injected(&self.failure).await?;
        let key = (viewer.name().to_string(), pipeline.canonical().to_string());
        Ok(!self.read_only_pipelines.read().await.contains(&key))
    }
}
