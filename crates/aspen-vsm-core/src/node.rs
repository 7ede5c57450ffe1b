//! Nodes of a value-stream map.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::name::NodeId;
use crate::name::PipelineName;
use crate::revision::MaterialRevision;
use crate::revision::PipelineRevision;
use crate::revision::Revision;

/// How a node should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    /// Regular node.
    #[default]
    Normal,
    /// Pipeline no longer present in configuration.
    Deleted,
    /// Viewer may not see this pipeline's history.
    Unauthorized,
    /// Node was built from revisions that do not agree with each other.
    Warning,
}

/// Material-specific node data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialDetails {
    /// Material type, for example `git`.
    pub material_type: String,
    /// Configured names the material was discovered through.
    pub material_names: BTreeSet<String>,
    /// Distinct head (most recent) revision ids seen across trigger causes.
    heads: Vec<String>,
}

impl MaterialDetails {
    /// Head revision ids in discovery order.
    pub fn heads(&self) -> &[String] {
        &self.heads
    }
}

/// Kind discriminator of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Pipeline node.
    Pipeline,
    /// Source-control material node.
    Material(MaterialDetails),
    /// Pass-through placeholder keeping every edge one level long.
    Filler,
}

/// Description of a node to add to a graph.
///
/// When a node with the same id already exists the description is merged into
/// it instead: material names are unioned, everything else keeps the values
/// from first discovery.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub(crate) id: NodeId,
    pub(crate) display_name: String,
    pub(crate) kind: NodeKind,
}

impl NodeSpec {
    /// Pipeline node, displayed with the casing of `name`.
    pub fn pipeline(name: PipelineName) -> Self {
        Self {
            display_name: name.as_str().to_string(),
            id: NodeId::Pipeline(name),
            kind: NodeKind::Pipeline,
        }
    }

    /// Material node identified by `fingerprint`.
    pub fn material(
        fingerprint: impl Into<String>,
        display_name: impl Into<String>,
        material_type: impl Into<String>,
    ) -> Self {
        Self {
            id: NodeId::Material(fingerprint.into()),
            display_name: display_name.into(),
            kind: NodeKind::Material(MaterialDetails {
                material_type: material_type.into(),
                material_names: BTreeSet::new(),
                heads: Vec::new(),
            }),
        }
    }

    /// Record the configured name the material was reached through.
    pub fn with_material_name(mut self, name: Option<String>) -> Self {
        if let (NodeKind::Material(details), Some(name)) = (&mut self.kind, name) {
            details.material_names.insert(name);
        }
        self
    }

    /// Id the node will have.
    pub fn id(&self) -> &NodeId {
        &self.id
    }
}

/// A node of a value-stream map.
///
/// Identity, edges and level are owned by the graph. Decoration passes may
/// only change revisions, view state and the edit flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    id: NodeId,
    display_name: String,
    kind: NodeKind,
    level: i32,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    revisions: Vec<Revision>,
    view_state: ViewState,
    message: Option<String>,
    can_edit: bool,
}

impl Node {
    pub(crate) fn from_spec(spec: NodeSpec, level: i32) -> Self {
        Self {
            id: spec.id,
            display_name: spec.display_name,
            kind: spec.kind,
            level,
            parents: Vec::new(),
            children: Vec::new(),
            revisions: Vec::new(),
            view_state: ViewState::Normal,
            message: None,
            can_edit: false,
        }
    }

    pub(crate) fn filler(id: NodeId, level: i32, parent: NodeId, child: NodeId) -> Self {
        Self {
            display_name: String::new(),
            id,
            kind: NodeKind::Filler,
            level,
            parents: vec![parent],
            children: vec![child],
            revisions: Vec::new(),
            view_state: ViewState::Normal,
            message: None,
            can_edit: false,
        }
    }

    pub(crate) fn merge(&mut self, spec: NodeSpec) {
        if let (NodeKind::Material(existing), NodeKind::Material(incoming)) = (&mut self.kind, spec.kind) {
            existing.material_names.extend(incoming.material_names);
        }
    }

    pub(crate) fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub(crate) fn add_parent(&mut self, parent: &NodeId) {
        if !self.parents.contains(parent) {
            self.parents.push(parent.clone());
        }
    }

    pub(crate) fn add_child(&mut self, child: &NodeId) {
        if !self.children.contains(child) {
            self.children.push(child.clone());
        }
    }

    pub(crate) fn replace_parent(&mut self, old: &NodeId, new: NodeId) {
        if let Some(slot) = self.parents.iter_mut().find(|p| *p == old) {
            *slot = new;
        }
    }

    pub(crate) fn replace_child(&mut self, old: &NodeId, new: NodeId) {
        if let Some(slot) = self.children.iter_mut().find(|c| *c == old) {
            *slot = new;
        }
    }

    /// Node id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Human-readable name; empty for fillers.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Kind of node.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Signed level; 0 is the root.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Parent ids in the order the edges were discovered.
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Child ids in the order the edges were discovered.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attached revisions.
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Presentation state.
    pub fn view_state(&self) -> ViewState {
        self.view_state
    }

    /// Explanatory message for a non-normal view state.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the viewer may edit this pipeline's configuration.
    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    /// Material details, if this is a material node.
    pub fn material(&self) -> Option<&MaterialDetails> {
        match &self.kind {
            NodeKind::Material(details) => Some(details),
            _ => None,
        }
    }

    /// Whether this is a pipeline node.
    pub fn is_pipeline(&self) -> bool {
        matches!(self.kind, NodeKind::Pipeline)
    }

    /// Whether this is a material node.
    pub fn is_material(&self) -> bool {
        matches!(self.kind, NodeKind::Material(_))
    }

    /// Whether this is a filler node.
    pub fn is_filler(&self) -> bool {
        matches!(self.kind, NodeKind::Filler)
    }

    /// Attach a pipeline run.
    ///
    /// Runs are unique by counter and kept sorted ascending by counter.
    /// Returns `false` when the run was already attached.
    pub fn add_pipeline_revision(&mut self, revision: PipelineRevision) -> bool {
        let position = self.revisions.binary_search_by_key(&revision.counter, |existing| match existing {
            Revision::Pipeline(run) => run.counter,
            Revision::Material(_) => 0,
        });
        match position {
            Ok(_) => false,
            Err(index) => {
                self.revisions.insert(index, Revision::Pipeline(revision));
                true
            }
        }
    }

    /// Attach the modifications of one trigger-cause entry.
    ///
    /// Modifications are unique by revision id and stay most recent first
    /// across entries: an unseen modification is placed before the first
    /// already-attached modification that follows it in `modifications`.
    /// The first modification of the entry is recorded as a head revision.
    /// Returns the number of newly attached modifications.
    pub fn add_material_revisions(&mut self, modifications: &[MaterialRevision]) -> usize {
        if let (NodeKind::Material(details), Some(head)) = (&mut self.kind, modifications.first()) {
            if !details.heads.contains(&head.revision_id) {
                details.heads.push(head.revision_id.clone());
            }
        }

        let mut added = 0;
        for (index, modification) in modifications.iter().enumerate() {
            if self.material_position(&modification.revision_id).is_some() {
                continue;
            }
            let before = modifications[index + 1..]
                .iter()
                .find_map(|later| self.material_position(&later.revision_id));
            let revision = Revision::Material(modification.clone());
            match before {
                Some(position) => self.revisions.insert(position, revision),
                None => self.revisions.push(revision),
            }
            added += 1;
        }
        added
    }

    fn material_position(&self, revision_id: &str) -> Option<usize> {
        self.revisions.iter().position(|existing| match existing {
            Revision::Material(m) => m.revision_id == revision_id,
            Revision::Pipeline(_) => false,
        })
    }

    /// Pipeline runs attached to this node, mutably.
    pub fn pipeline_revisions_mut(&mut self) -> impl Iterator<Item = &mut PipelineRevision> {
        self.revisions.iter_mut().filter_map(|revision| match revision {
            Revision::Pipeline(run) => Some(run),
            Revision::Material(_) => None,
        })
    }

    /// Remove every attached revision.
    pub fn clear_revisions(&mut self) {
        self.revisions.clear();
    }

    /// Record whether the viewer may edit this pipeline.
    pub fn set_can_edit(&mut self, can_edit: bool) {
        self.can_edit = can_edit;
    }

    /// Set the presentation state and its message.
    pub fn set_view_state(&mut self, view_state: ViewState, message: Option<String>) {
        self.view_state = view_state;
        self.message = message;
    }
}
