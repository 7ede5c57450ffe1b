//! Decoration passes applied to a structurally complete value-stream map.
//!
//! Passes run in a fixed order and only touch node revisions, view state and
//! the edit flag; identity, edges and levels are left alone.
//!
//! ```text
//! DownstreamInstancePopulator ──► RunStagesPopulator ──► UnrunStagesPopulator
//!   (runs of consumers)            (stage history)        (missing stages)
//!                                                               │
//!              EditPermissionPopulator ◄── PermissionPopulator ◄┘
//!                (edit flag)               (hide unviewable)
//! ```

mod downstream_instances;
mod edit_permissions;
mod permissions;
mod run_stages;
mod unrun_stages;

use aspen_vsm_core::ValueStreamMap;
use async_trait::async_trait;
pub use downstream_instances::DownstreamInstancePopulator;
pub use edit_permissions::EditPermissionPopulator;
pub use permissions::PermissionPopulator;
pub use run_stages::RunStagesPopulator;
pub use unrun_stages::UnrunStagesPopulator;

use crate::error::Result;

/// One decoration pass.
#[async_trait]
pub trait Populator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Decorate `graph` in place.
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()>;
}
