//! Revisions attached to value-stream map nodes.

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

/// Outcome of a stage, as shown on a pipeline revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Stage finished successfully.
    Passed,
    /// Stage finished with a failure.
    Failed,
    /// Stage was cancelled.
    Cancelled,
    /// Stage is still running.
    Building,
    /// Stage has not run for this revision.
    Unknown,
}

/// Summary of one stage of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    /// Stage name.
    pub name: String,
    /// Stage counter, 0 when the stage never ran.
    pub counter: u32,
    /// Stage outcome.
    pub state: StageState,
}

impl StageSummary {
    /// Summary of a configured stage that has not run.
    pub fn unrun(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counter: 0,
            state: StageState::Unknown,
        }
    }
}

/// One run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRevision {
    /// Pipeline name as recorded by the run.
    pub pipeline_name: String,
    /// Run counter.
    pub counter: u64,
    /// Run label.
    pub label: String,
    /// Stage summaries, filled in by stage populators.
    pub stages: Vec<StageSummary>,
}

impl PipelineRevision {
    /// Create a revision without stage information.
    pub fn new(pipeline_name: impl Into<String>, counter: u64, label: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            counter,
            label: label.into(),
            stages: Vec::new(),
        }
    }
}

/// One modification of a source-control material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialRevision {
    /// Fingerprint of the material the modification belongs to.
    pub fingerprint: String,
    /// Revision identifier, for example a commit hash.
    pub revision_id: String,
    /// When the modification was made.
    pub timestamp: DateTime<Utc>,
    /// Who made the modification.
    pub author: String,
    /// Commit comment.
    pub comment: String,
}

/// A revision of either a pipeline or a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Revision {
    /// Pipeline run.
    Pipeline(PipelineRevision),
    /// Material modification.
    Material(MaterialRevision),
}

impl Revision {
    /// Short identifier: the counter of a run or the id of a modification.
    pub fn revision_string(&self) -> String {
        match self {
            Self::Pipeline(run) => run.counter.to_string(),
            Self::Material(modification) => modification.revision_id.clone(),
        }
    }

    /// Pipeline run, if this is one.
    pub fn as_pipeline(&self) -> Option<&PipelineRevision> {
        match self {
            Self::Pipeline(run) => Some(run),
            Self::Material(_) => None,
        }
    }

    /// Material modification, if this is one.
    pub fn as_material(&self) -> Option<&MaterialRevision> {
        match self {
            Self::Material(modification) => Some(modification),
            Self::Pipeline(_) => None,
        }
    }
}
