//! MembershipGraph - transitive group/role membership
//!
//! Nodes are keyed by a vendor-stable id. Each node lists the nodes it is a
//! direct member of. The closure of a node is every node reachable through
//! those edges, visited breadth-first with each ancestor reported once.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use gs_common::{Principal, SharedRole};
use tracing::info;

#[derive(Debug, Clone)]
struct GraphNode<K, N> {
    value: N,
    parents: Vec<K>,
}

/// Directed membership graph: an edge `member -> parent` means `member`
/// is a direct member of `parent`.
#[derive(Debug, Clone)]
pub struct MembershipGraph<K, N> {
    nodes: HashMap<K, GraphNode<K, N>>,
}

impl<K, N> Default for MembershipGraph<K, N> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }
}

impl<K, N> MembershipGraph<K, N>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns false and keeps the existing value when the id is taken.
    pub fn add_node(&mut self, id: K, value: N) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id,
            GraphNode {
                value,
                parents: Vec::new(),
            },
        );
        true
    }

    /// Record that `member` belongs to `parent`.
    ///
    /// Edges referencing an unknown node are skipped, not treated as errors.
    pub fn add_edge(&mut self, member: &K, parent: &K) -> bool {
        if !self.nodes.contains_key(parent) {
            info!(member = ?member, parent = ?parent, "Skipping membership edge to unknown parent");
            return false;
        }
        match self.nodes.get_mut(member) {
            Some(node) => {
                if !node.parents.contains(parent) {
                    node.parents.push(parent.clone());
                }
                true
            }
            None => {
                info!(member = ?member, parent = ?parent, "Skipping membership edge from unknown member");
                false
            }
        }
    }

    /// Build a graph from node and edge lists in one go.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = (K, N)>,
        edges: impl IntoIterator<Item = (K, K)>,
    ) -> Self {
        let mut graph = Self::new();
        for (id, value) in nodes {
            graph.add_node(id, value);
        }
        for (member, parent) in edges {
            graph.add_edge(&member, &parent);
        }
        graph
    }

    pub fn get(&self, id: &K) -> Option<&N> {
        self.nodes.get(id).map(|n| &n.value)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every ancestor of `id`, nearest first. The start node is excluded
    /// even when a cycle leads back to it.
    pub fn ancestor_ids(&self, id: &K) -> Vec<&K> {
        let Some((start, node)) = self.nodes.get_key_value(id) else {
            return Vec::new();
        };

        let mut visited: HashSet<&K> = HashSet::from([start]);
        let mut queue: VecDeque<&K> = VecDeque::new();
        let mut ancestors = Vec::new();

        for parent in &node.parents {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }

        while let Some(current) = queue.pop_front() {
            ancestors.push(current);
            if let Some(node) = self.nodes.get(current) {
                for parent in &node.parents {
                    if visited.insert(parent) {
                        queue.push_back(parent);
                    }
                }
            }
        }

        ancestors
    }

    /// Values of every ancestor of `id`, in [`ancestor_ids`](Self::ancestor_ids) order.
    pub fn ancestors(&self, id: &K) -> Vec<&N> {
        self.ancestor_ids(id)
            .into_iter()
            .filter_map(|k| self.get(k))
            .collect()
    }

    /// Attach the role of each ancestor of `id` to `principal`, keyed by role
    /// name. Permission maps are not merged across roles.
    ///
    /// Returns how many roles were attached.
    pub fn attach_ancestor_roles<R>(&self, principal: &mut Principal, id: &K, role_of: R) -> usize
    where
        R: Fn(&N) -> Option<SharedRole>,
    {
        let mut attached = 0;
        for value in self.ancestors(id) {
            if let Some(role) = role_of(value) {
                principal.add_role(role);
                attached += 1;
            }
        }
        attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_keeps_first_value() {
        let mut graph = MembershipGraph::new();
        assert!(graph.add_node(1, "first"));
        assert!(!graph.add_node(1, "second"));
        assert_eq!(graph.get(&1), Some(&"first"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_unknown_start_has_no_ancestors() {
        let graph: MembershipGraph<u32, ()> = MembershipGraph::from_parts([(1, ())], Vec::new());
        assert!(graph.ancestor_ids(&7).is_empty());
    }

    #[test]
    fn test_duplicate_edge_reported_once() {
        let graph = MembershipGraph::from_parts([(1, ()), (2, ())], [(1, 2), (1, 2)]);
        assert_eq!(graph.ancestor_ids(&1), vec![&2]);
    }
}
