//! Arena-backed value-stream map graph.
//!
//! Nodes live in a single id-keyed table; edges are id lists on both ends.
//! Adding a node that already exists merges into it and, if the new edge
//! demands a position further from the root, relocates it with an iterative
//! worklist that cascades through its ancestors (or descendants on the
//! downstream side).

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use snafu::OptionExt;
use tracing::debug;

use crate::error::CyclicDependencySnafu;
use crate::error::NodeNotFoundSnafu;
use crate::error::Result;
use crate::name::NodeId;
use crate::node::Node;
use crate::node::NodeSpec;
use crate::verified;

/// Which side of the root a relocation moves towards.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

/// Layered dependency graph around one root node.
#[derive(Debug, Clone)]
pub struct ValueStreamMap {
    pub(crate) nodes: HashMap<NodeId, Node>,
    /// Node ids in first-discovery order.
    pub(crate) order: Vec<NodeId>,
    root: NodeId,
}

impl ValueStreamMap {
    /// Create a graph containing only `root` at level 0.
    pub fn new(root: NodeSpec) -> Self {
        let id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(id.clone(), Node::from_spec(root, 0));
        Self {
            nodes,
            order: vec![id.clone()],
            root: id,
        }
    }

    /// Id of the level-0 node.
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// The level-0 node.
    pub fn root(&self) -> &Node {
        // The root is inserted on construction and never removed.
        &self.nodes[&self.root]
    }

    /// The level-0 node, mutably.
    pub fn root_mut(&mut self) -> &mut Node {
        let root = &self.root;
        match self.nodes.get_mut(root) {
            Some(node) => node,
            None => unreachable!("root node {root} missing"),
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up a node by id, mutably.
    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Whether a node with `id` exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, fillers included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a graph holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in first-discovery order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in first-discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Add `spec` as a dependency feeding into `child`.
    ///
    /// The node is placed one level left of `child`. An existing node is merged
    /// and moved further left if needed, cascading through its parents.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if `child` is not in the graph
    /// - `CyclicDependency` if placement would move the root or never settle
    pub fn add_upstream_node(&mut self, spec: NodeSpec, child: &NodeId) -> Result<&mut Node> {
        let child_level = self.level_of(child)?;
        let required = verified::upstream_level(child_level);
        self.attach(spec, required, Direction::Upstream, child)
    }

    /// Add `spec` as a consumer of `parent`.
    ///
    /// Mirror image of [`add_upstream_node`](Self::add_upstream_node): the node
    /// is placed one level right of `parent` and relocations cascade through
    /// its children.
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if `parent` is not in the graph
    /// - `CyclicDependency` if placement would move the root or never settle
    pub fn add_downstream_node(&mut self, spec: NodeSpec, parent: &NodeId) -> Result<&mut Node> {
        let parent_level = self.level_of(parent)?;
        let required = verified::downstream_level(parent_level);
        self.attach(spec, required, Direction::Downstream, parent)
    }

    /// Nodes without parents, in discovery order.
    pub fn root_nodes(&self) -> Vec<&Node> {
        self.nodes().filter(|node| node.parents().is_empty()).collect()
    }

    /// Non-filler parents of `id`, looking through filler chains.
    pub fn real_parents(&self, id: &NodeId) -> Vec<&NodeId> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut parents = Vec::with_capacity(node.parents().len());
        for parent in node.parents() {
            let mut current = parent;
            while let Some(filler) = self.nodes.get(current).filter(|n| n.is_filler()) {
                match filler.parents().first() {
                    Some(next) => current = next,
                    None => break,
                }
            }
            if !current.is_filler() && !parents.contains(&current) {
                parents.push(current);
            }
        }
        parents
    }

    /// Check the edges for a cycle with an iterative depth-first search.
    pub fn has_cycle(&self) -> bool {
        let mut finished: HashSet<&NodeId> = HashSet::with_capacity(self.nodes.len());
        let mut on_path: HashSet<&NodeId> = HashSet::new();

        for start in &self.order {
            if finished.contains(start) {
                continue;
            }
            let mut stack: Vec<(&NodeId, usize)> = vec![(start, 0)];
            on_path.insert(start);

            while let Some(frame) = stack.last_mut() {
                let (id, next) = *frame;
                let children = self.nodes.get(id).map(|n| n.children()).unwrap_or_default();
                match children.get(next) {
                    Some(child) => {
                        frame.1 += 1;
                        if on_path.contains(child) {
                            return true;
                        }
                        if !finished.contains(child) {
                            on_path.insert(child);
                            stack.push((child, 0));
                        }
                    }
                    None => {
                        on_path.remove(id);
                        finished.insert(id);
                        stack.pop();
                    }
                }
            }
        }
        false
    }

    fn level_of(&self, id: &NodeId) -> Result<i32> {
        self.nodes
            .get(id)
            .map(Node::level)
            .context(NodeNotFoundSnafu { id: id.to_string() })
    }

    fn attach(&mut self, spec: NodeSpec, required: i32, direction: Direction, anchor: &NodeId) -> Result<&mut Node> {
        let id = spec.id.clone();
        if id == *anchor {
            return CyclicDependencySnafu { node: id.to_string() }.fail();
        }

        let current = match self.nodes.get_mut(&id) {
            Some(existing) => {
                existing.merge(spec);
                existing.level()
            }
            None => {
                debug!(node = %id, level = required, "adding node");
                self.nodes.insert(id.clone(), Node::from_spec(spec, required));
                self.order.push(id.clone());
                required
            }
        };

        match direction {
            Direction::Upstream => self.link(&id, anchor)?,
            Direction::Downstream => self.link(anchor, &id)?,
        }

        let moves = match direction {
            Direction::Upstream => verified::needs_upstream_relocation(current, required),
            Direction::Downstream => verified::needs_downstream_relocation(current, required),
        };
        if moves {
            self.relocate(id.clone(), required, direction)?;
        }

        self.nodes.get_mut(&id).context(NodeNotFoundSnafu { id: id.to_string() })
    }

    fn link(&mut self, parent: &NodeId, child: &NodeId) -> Result<()> {
        self.nodes
            .get_mut(parent)
            .context(NodeNotFoundSnafu { id: parent.to_string() })?
            .add_child(child);
        self.nodes
            .get_mut(child)
            .context(NodeNotFoundSnafu { id: child.to_string() })?
            .add_parent(parent);
        Ok(())
    }

    /// Move `start` to `level` and cascade until every edge points away from the root again.
    fn relocate(&mut self, start: NodeId, level: i32, direction: Direction) -> Result<()> {
        let bound = self.nodes.len();
        let mut pending = VecDeque::from([(start, level)]);

        while let Some((id, target)) = pending.pop_front() {
            let node = self.nodes.get_mut(&id).context(NodeNotFoundSnafu { id: id.to_string() })?;
            let needed = match direction {
                Direction::Upstream => verified::needs_upstream_relocation(node.level(), target),
                Direction::Downstream => verified::needs_downstream_relocation(node.level(), target),
            };
            if !needed {
                continue;
            }
            if id == self.root || verified::exceeds_acyclic_bound(target, bound) {
                return CyclicDependencySnafu { node: id.to_string() }.fail();
            }

            debug!(node = %id, from = node.level(), to = target, "relocating node");
            node.set_level(target);
            match direction {
                Direction::Upstream => {
                    let next = verified::upstream_level(target);
                    pending.extend(node.parents().iter().map(|parent| (parent.clone(), next)));
                }
                Direction::Downstream => {
                    let next = verified::downstream_level(target);
                    pending.extend(node.children().iter().map(|child| (child.clone(), next)));
                }
            }
        }
        Ok(())
    }
}
