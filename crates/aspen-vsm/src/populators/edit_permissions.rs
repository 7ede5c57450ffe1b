//! Records which pipelines the viewer may edit.

use aspen_vsm_core::ValueStreamMap;
use async_trait::async_trait;
use snafu::ResultExt;
use tracing::debug;
use tracing::instrument;

use super::Populator;
use crate::accessors::Identity;
use crate::accessors::PermissionAccessor;
use crate::error::AccessorSnafu;
use crate::error::Result;

/// Sets the edit flag on every pipeline node, the root included.
///
/// A refusal only leaves the flag unset; it never fails the request.
pub struct EditPermissionPopulator<'a> {
    permissions: &'a dyn PermissionAccessor,
    viewer: &'a Identity,
}

impl<'a> EditPermissionPopulator<'a> {
    /// Populator checking `viewer` against `permissions`.
    pub fn new(permissions: &'a dyn PermissionAccessor, viewer: &'a Identity) -> Self {
        Self { permissions, viewer }
    }
}

#[async_trait]
impl Populator for EditPermissionPopulator<'_> {
    fn name(&self) -> &'static str {
        "edit_permissions"
    }

    #[instrument(skip_all, fields(populator = self.name(), viewer = %self.viewer))]
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let pipelines: Vec<_> = graph
            .nodes()
            .filter_map(|node| Some((node.id().clone(), node.id().pipeline_name()?.clone())))
            .collect();

        let mut editable = 0;
        for (id, pipeline) in pipelines {
            let can_edit = self
                .permissions
                .can_edit_pipeline(self.viewer, &pipeline)
                .await
                .context(AccessorSnafu {
                    operation: "can_edit_pipeline",
                })?;
            if let Some(node) = graph.node_mut(&id) {
                node.set_can_edit(can_edit);
                editable += usize::from(can_edit);
            }
        }
        debug!(editable, "recorded edit permissions");
        Ok(())
    }
}
