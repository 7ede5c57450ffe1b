//! Level normalization and level-grouped ordering.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::graph::ValueStreamMap;
use crate::name::NodeId;
use crate::node::Node;
use crate::verified;

/// Namespace for filler ids, so they are stable for identical graphs.
const FILLER_NAMESPACE: Uuid = Uuid::from_u128(0x5d2f_8c1e_97a4_4b6e_a0f3_3c9e_71d4_b208);

/// Id of the `step`-th filler on the edge `parent -> child`.
fn filler_id(parent: &NodeId, child: &NodeId, step: u32) -> NodeId {
    let name = format!("{}->{}#{step}", parent.key(), child.key());
    NodeId::Filler(Uuid::new_v5(&FILLER_NAMESPACE, name.as_bytes()))
}

impl ValueStreamMap {
    /// Close every multi-level edge with a chain of filler nodes.
    ///
    /// Every edge spans exactly one level afterwards. Fillers are appended to
    /// the discovery order in the order their edges were discovered. Running
    /// it again is a no-op.
    ///
    /// # Returns
    ///
    /// Number of filler nodes inserted.
    pub fn normalize(&mut self) -> usize {
        let mut gaps = Vec::new();
        for parent_id in &self.order {
            let Some(parent) = self.nodes.get(parent_id) else {
                continue;
            };
            for child_id in parent.children() {
                let Some(child) = self.nodes.get(child_id) else {
                    continue;
                };
                let count = verified::filler_count(parent.level(), child.level());
                if count > 0 {
                    gaps.push((parent_id.clone(), child_id.clone(), parent.level(), count));
                }
            }
        }

        let mut inserted = 0;
        for (parent_id, child_id, parent_level, count) in gaps {
            let chain: Vec<NodeId> = (1..=count).map(|step| filler_id(&parent_id, &child_id, step)).collect();
            let (Some(first), Some(last)) = (chain.first().cloned(), chain.last().cloned()) else {
                continue;
            };

            let mut level = parent_level;
            let mut previous = parent_id.clone();
            for (index, filler) in chain.iter().enumerate() {
                level = verified::downstream_level(level);
                let next = chain.get(index + 1).cloned().unwrap_or_else(|| child_id.clone());
                self.nodes.insert(filler.clone(), Node::filler(filler.clone(), level, previous, next));
                self.order.push(filler.clone());
                previous = filler.clone();
            }

            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.replace_child(&child_id, first);
            }
            if let Some(child) = self.nodes.get_mut(&child_id) {
                child.replace_parent(&parent_id, last);
            }
            debug!(parent = %parent_id, child = %child_id, fillers = chain.len(), "closed level gap");
            inserted += chain.len();
        }
        inserted
    }

    /// Nodes grouped by level, most upstream level first.
    ///
    /// Within a level nodes keep first-discovery order. Levels without nodes
    /// are omitted; after [`normalize`](Self::normalize) there are none.
    pub fn nodes_at_each_level(&self) -> Vec<Vec<&Node>> {
        let mut levels: BTreeMap<i32, Vec<&Node>> = BTreeMap::new();
        for node in self.nodes() {
            levels.entry(node.level()).or_default().push(node);
        }
        levels.into_values().collect()
    }
}
