//! Hides the history of pipelines the viewer may not see.

use aspen_vsm_core::ValueStreamMap;
use aspen_vsm_core::ViewState;
use async_trait::async_trait;
use snafu::ResultExt;
use tracing::debug;
use tracing::instrument;

use super::Populator;
use crate::accessors::Identity;
use crate::accessors::PermissionAccessor;
use crate::error::AccessorSnafu;
use crate::error::Result;
use crate::error::keys;

/// Clears revisions of unviewable pipelines and marks them unauthorized.
///
/// The root is never touched: the service refuses the whole request when the
/// viewer may not see it.
pub struct PermissionPopulator<'a> {
    permissions: &'a dyn PermissionAccessor,
    viewer: &'a Identity,
}

impl<'a> PermissionPopulator<'a> {
    /// Populator checking `viewer` against `permissions`.
    pub fn new(permissions: &'a dyn PermissionAccessor, viewer: &'a Identity) -> Self {
        Self { permissions, viewer }
    }
}

#[async_trait]
impl Populator for PermissionPopulator<'_> {
    fn name(&self) -> &'static str {
        "permissions"
    }

    #[instrument(skip_all, fields(populator = self.name(), viewer = %self.viewer))]
    async fn apply(&self, graph: &mut ValueStreamMap) -> Result<()> {
        let root = graph.root_id().clone();
        let pipelines: Vec<_> = graph
            .nodes()
            .filter(|node| node.is_pipeline() && *node.id() != root)
            .filter_map(|node| Some((node.id().clone(), node.id().pipeline_name()?.clone())))
            .collect();

        for (id, pipeline) in pipelines {
            let allowed = self
                .permissions
                .can_view_pipeline(self.viewer, &pipeline)
                .await
                .context(AccessorSnafu {
                    operation: "can_view_pipeline",
                })?;
            if allowed {
                continue;
            }
            if let Some(node) = graph.node_mut(&id) {
                debug!(pipeline = %pipeline, "hiding unviewable pipeline");
                node.clear_revisions();
                node.set_view_state(ViewState::Unauthorized, Some(keys::VSM_PIPELINE_UNAUTHORIZED.to_string()));
            }
        }
        Ok(())
    }
}
