//! Peer topology and gossip-style block propagation

use std::collections::{BTreeSet, VecDeque};

use rand::{seq::index::sample, Rng};

use crate::producer::ProducerId;

/// Unique identifier of a network node.
pub type NodeId = usize;

/// A peer node in the gossip graph.
#[derive(Debug, Clone)]
pub struct NetNode {
    pub id: NodeId,
    /// Undirected adjacency, as peer IDs.
    pub peers: BTreeSet<NodeId>,
    /// Highest block height this node has learned about.
    pub last_height: Option<u64>,
    /// Whether an eclipse attack controls this node's connections.
    pub eclipsed: bool,
    /// Attacker-supplied peer set replacing `peers` while eclipsed.
    pub forced_peers: Option<BTreeSet<NodeId>>,
}

impl NetNode {
    /// The adjacency actually in effect, accounting for eclipse.
    #[inline]
    pub fn effective_peers(&self) -> &BTreeSet<NodeId> {
        self.forced_peers.as_ref().unwrap_or(&self.peers)
    }
}

/// One node learning about a block during propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub node: NodeId,
    pub hops: u32,
    /// Seconds after publication at which the block arrives.
    pub offset: f64,
}

/// Outcome of propagating one block through the graph.
#[derive(Debug, Clone, Default)]
pub struct Propagation {
    /// Visited nodes in breadth-first order, origin first.
    pub arrivals: Vec<Arrival>,
    /// Nodes the block never reached (disconnected or eclipsed).
    pub unreachable: u64,
    pub bytes_sent: u64,
    pub io_requests: u64,
    pub total_hops: u64,
    pub max_hops: u32,
}

/// Static undirected peer graph over which blocks propagate.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<NetNode>,
}

impl Topology {
    /// Builds a random graph of `count` nodes where each picks
    /// `neighbors` distinct peers; edges are symmetrized. Any node left
    /// isolated is patched with an edge to its nearest neighbor by ID.
    pub fn build<R: Rng>(rng: &mut R, count: usize, neighbors: usize) -> Self {
        let mut nodes: Vec<NetNode> = (0..count)
            .map(|id| NetNode {
                id,
                peers: BTreeSet::new(),
                last_height: None,
                eclipsed: false,
                forced_peers: None,
            })
            .collect();

        if count > 1 {
            let picks = neighbors.min(count - 1);
            for id in 0..count {
                // Sample from the other count-1 nodes, shifting indices
                // at or above `id` up by one to skip self-edges.
                for peer in sample(rng, count - 1, picks) {
                    let peer = if peer >= id { peer + 1 } else { peer };
                    nodes[id].peers.insert(peer);
                    nodes[peer].peers.insert(id);
                }
            }

            for id in 0..count {
                if nodes[id].peers.is_empty() {
                    let nearest = if id == 0 { 1 } else { id - 1 };
                    nodes[id].peers.insert(nearest);
                    nodes[nearest].peers.insert(id);
                }
            }
        }

        Topology { nodes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn nodes(&self) -> &[NetNode] {
        &self.nodes
    }

    /// Replaces each victim's adjacency with the attacker-controlled
    /// peer set. Honest propagation will no longer traverse them.
    pub fn eclipse(&mut self, victims: &[NodeId], attacker_peers: BTreeSet<NodeId>) {
        for &victim in victims {
            let node = &mut self.nodes[victim];
            node.eclipsed = true;
            node.forced_peers = Some(attacker_peers.clone());
        }
    }

    /// The node a producer publishes from. Eclipsed nodes are skipped:
    /// honest producers do not sit behind attacker-controlled peers.
    pub fn origin_for(&self, producer: ProducerId) -> Option<NodeId> {
        let count = self.nodes.len();
        if count == 0 {
            return None;
        }

        let start = producer % count;
        (0..count)
            .map(|i| (start + i) % count)
            .find(|&id| !self.nodes[id].eclipsed)
    }

    /// Breadth-first propagation of a block from `origin`.
    ///
    /// Each hop adds `hop_delay` seconds to the arrival offset; the
    /// default of zero delivers instantaneously. Eclipsed nodes are never
    /// visited. Bandwidth accounting charges each visited node one relay
    /// to every effective peer.
    pub fn propagate(
        &self,
        origin: NodeId,
        block_bytes: u64,
        hop_delay: f64,
    ) -> Propagation {
        let mut result = Propagation::default();
        let mut visited = vec![false; self.nodes.len()];
        let mut queue: VecDeque<(NodeId, u32)> = VecDeque::new();

        if !self.nodes[origin].eclipsed {
            queue.push_back((origin, 0));
        }

        while let Some((id, hops)) = queue.pop_front() {
            if visited[id] {
                continue;
            }
            visited[id] = true;

            let node = &self.nodes[id];
            let degree = node.effective_peers().len() as u64;
            result.bytes_sent += block_bytes * degree;
            result.io_requests += degree;
            result.total_hops += u64::from(hops);
            result.max_hops = result.max_hops.max(hops);
            result.arrivals.push(Arrival {
                node: id,
                hops,
                offset: f64::from(hops) * hop_delay,
            });

            for &peer in node.effective_peers() {
                if !visited[peer] && !self.nodes[peer].eclipsed {
                    queue.push_back((peer, hops + 1));
                }
            }
        }

        result.unreachable =
            (self.nodes.len() - result.arrivals.len()) as u64;
        result
    }

    /// Records that `node` has learned about a block at `height`.
    /// Returns true if this advanced the node's tip.
    pub fn deliver(&mut self, node: NodeId, height: u64) -> bool {
        let known = &mut self.nodes[node].last_height;
        if known.map_or(true, |h| height > h) {
            *known = Some(height);
            true
        } else {
            false
        }
    }

    /// Per-node last-known heights, for checkpointing.
    pub fn last_heights(&self) -> Vec<Option<u64>> {
        self.nodes.iter().map(|n| n.last_height).collect()
    }

    /// Restores per-node last-known heights from a checkpoint.
    pub fn restore_heights(&mut self, heights: &[Option<u64>]) {
        for (node, &height) in self.nodes.iter_mut().zip(heights) {
            node.last_height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::Topology;

    fn build(count: usize, neighbors: usize) -> Topology {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        Topology::build(&mut rng, count, neighbors)
    }

    #[test]
    fn every_node_has_a_peer() {
        let topology = build(20, 3);
        for node in topology.nodes() {
            assert!(!node.peers.is_empty(), "node {} isolated", node.id);
            assert!(!node.peers.contains(&node.id), "self edge at {}", node.id);
        }
    }

    #[test]
    fn edges_are_symmetric() {
        let topology = build(15, 4);
        for node in topology.nodes() {
            for &peer in &node.peers {
                assert!(topology.nodes()[peer].peers.contains(&node.id));
            }
        }
    }

    #[test]
    fn propagation_reaches_the_connected_graph() {
        let topology = build(25, 4);
        let result = topology.propagate(0, 1024, 0.0);

        assert_eq!(
            result.arrivals.len() as u64 + result.unreachable,
            25
        );
        assert_eq!(result.arrivals[0].node, 0);
        assert_eq!(result.arrivals[0].hops, 0);
    }

    #[test]
    fn hop_delay_sets_arrival_offsets() {
        let topology = build(10, 2);
        let result = topology.propagate(0, 1024, 2.0);

        for arrival in &result.arrivals {
            assert_eq!(arrival.offset, f64::from(arrival.hops) * 2.0);
        }
    }

    #[test]
    fn eclipsed_nodes_are_not_reached() {
        let mut topology = build(12, 3);
        topology.eclipse(&[0, 1], BTreeSet::new());

        let origin = topology.origin_for(0).unwrap();
        assert!(origin > 1);

        let result = topology.propagate(origin, 1024, 0.0);
        for arrival in &result.arrivals {
            assert!(arrival.node > 1, "victim {} was reached", arrival.node);
        }
        assert!(result.unreachable >= 2);
    }

    #[test]
    fn deliver_tracks_the_best_height() {
        let mut topology = build(4, 2);
        assert!(topology.deliver(0, 5));
        assert!(!topology.deliver(0, 3));
        assert!(topology.deliver(0, 6));
        assert_eq!(topology.nodes()[0].last_height, Some(6));
    }
}
