//! Value-stream map service for Aspen CI.
//!
//! Answers "what fed this run, and what consumes it?" by walking recorded
//! trigger history upstream of a pipeline run, adding configured consumers
//! downstream, and returning a layered, renderable graph. Material maps do
//! the same starting from one source-control revision.
//!
//! # Features
//!
//! - **Upstream discovery**: trigger causes of the root run, recursively
//! - **Downstream discovery**: configured consumers, transitively
//! - **Revision attachment**: the concrete runs and commits behind the root
//! - **Decoration**: stage history, unrun stages, permission masking, edit flags
//! - **Failure mapping**: status code, message key and a sanitized message
//!
//! # Example
//!
//! ```ignore
//! use aspen_vsm::{Identity, InMemoryPermissions, InMemoryPipelineConfig, InMemoryTriggerHistory};
//! use aspen_vsm::{ValueStreamMapConfig, ValueStreamMapService};
//!
//! let service = ValueStreamMapService::new(
//!     InMemoryPipelineConfig::new(),
//!     InMemoryTriggerHistory::new(),
//!     InMemoryPermissions::new(),
//!     ValueStreamMapConfig::default(),
//! );
//!
//! let model = service.get_value_stream_map("deploy", 7, &Identity::new("alice")).await?;
//! for (level, nodes) in model.nodes_at_each_level().iter().enumerate() {
//!     println!("{level}: {}", nodes.len());
//! }
//! ```

#![warn(missing_docs)]

pub mod accessors;
mod builder;
pub mod config;
pub mod error;
mod history;
pub mod inmemory;
pub mod populators;
mod revisions;
mod service;

pub use accessors::AccessorError;
pub use accessors::ConfigAccessor;
pub use accessors::Identity;
pub use accessors::MaterialConfig;
pub use accessors::PermissionAccessor;
pub use accessors::PipelineConfig;
pub use accessors::PipelineRun;
pub use accessors::RunSelector;
pub use accessors::ScmMaterial;
pub use accessors::TriggerEntry;
pub use accessors::TriggerHistory;
pub use aspen_vsm_core::MaterialRevision;
pub use aspen_vsm_core::Node;
pub use aspen_vsm_core::NodeId;
pub use aspen_vsm_core::PipelineName;
pub use aspen_vsm_core::PipelineRevision;
pub use aspen_vsm_core::Revision;
pub use aspen_vsm_core::StageState;
pub use aspen_vsm_core::StageSummary;
pub use aspen_vsm_core::ValueStreamMap;
pub use aspen_vsm_core::ValueStreamMapModel;
pub use aspen_vsm_core::ViewState;
pub use builder::GraphBuilder;
pub use config::ValueStreamMapConfig;
pub use error::Result;
pub use error::VsmError;
pub use error::VsmFailure;
pub use history::CauseCache;
pub use inmemory::InMemoryPermissions;
pub use inmemory::InMemoryPipelineConfig;
pub use inmemory::InMemoryTriggerHistory;
pub use revisions::RevisionWalker;
pub use service::ValueStreamMapService;
