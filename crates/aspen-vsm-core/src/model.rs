//! Owned presentation model of a finished value-stream map.

use serde::Serialize;

use crate::graph::ValueStreamMap;
use crate::name::NodeId;
use crate::node::Node;

/// Normalized, level-grouped snapshot of a value-stream map.
///
/// Produced by [`ValueStreamMap::into_model`]; every edge in it spans exactly
/// one level.
#[derive(Debug, Clone, Serialize)]
pub struct ValueStreamMapModel {
    current_pipeline: Option<NodeId>,
    current_material: Option<NodeId>,
    levels: Vec<Vec<Node>>,
}

impl ValueStreamMapModel {
    /// Root node when the map was built for a pipeline run.
    pub fn current_pipeline(&self) -> Option<&Node> {
        self.current_pipeline.as_ref().and_then(|id| self.find(id))
    }

    /// Root node when the map was built for a material revision.
    pub fn current_material(&self) -> Option<&Node> {
        self.current_material.as_ref().and_then(|id| self.find(id))
    }

    /// Levels ascending, most upstream first.
    pub fn nodes_at_each_level(&self) -> &[Vec<Node>] {
        &self.levels
    }

    /// Look up a node by id.
    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.levels.iter().flatten().find(|node| node.id() == id)
    }

    /// Total number of nodes, fillers included.
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

impl ValueStreamMap {
    /// Normalize and freeze the graph into its presentation model.
    pub fn into_model(mut self) -> ValueStreamMapModel {
        self.normalize();
        let root = self.root();
        let (current_pipeline, current_material) = if root.is_material() {
            (None, Some(root.id().clone()))
        } else {
            (Some(root.id().clone()), None)
        };
        let levels = self
            .nodes_at_each_level()
            .into_iter()
            .map(|level| level.into_iter().cloned().collect())
            .collect();

        ValueStreamMapModel {
            current_pipeline,
            current_material,
            levels,
        }
    }
}
