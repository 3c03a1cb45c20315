//! Wire-format mirrors of ring state. These types borrow nothing from
//! `enginecore`'s internal indexes; they are plain owned data meant to
//! round-trip through `bincode`.

use enginecore::{
    AffinityRule, Keyspace, Node, NodeId, QuorumPolicy, Ring, Strategy, StrategyKind, VirtualNode,
    VnodeConfig,
};
use serde::{Deserialize, Serialize};

use enginecore::RebalancePlan;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StrategyState {
    Ketama(Vec<VirtualNode>),
    Jump(Vec<NodeId>),
    Rendezvous,
    Maglev(Vec<NodeId>),
    Bounded(Vec<VirtualNode>),
    /// Custom strategies manage their own state and rebuild it from
    /// `on_topology_change`; nothing to carry across the wire.
    Custom,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingSnapshot {
    pub name: String,
    pub version: u64,
    pub hash_seed: u64,
    pub vnode_config: VnodeConfig,
    pub default_quorum: QuorumPolicy,
    pub affinity_rules: Vec<AffinityRule>,
    pub strategy_kind: StrategyKind,
    pub strategy_state: StrategyState,
    pub nodes: Vec<Node>,
    pub keyspaces: Vec<Keyspace>,
    pub rebalance_plan: Option<RebalancePlan>,
}

/// Forces a dirty strategy index to rebuild, then captures its current
/// internal layout. Shared by [`RingSnapshot::capture`] and
/// [`DeltaSnapshot::apply`], since a delta must leave the target's strategy
/// state just as consistent with its node list as a freshly captured
/// snapshot would be.
fn strategy_state_of(ring: &mut Ring) -> StrategyState {
    ring.ensure_strategy_ready();
    match ring.strategy() {
        Strategy::Ketama(k) => StrategyState::Ketama(k.vnodes().to_vec()),
        Strategy::Jump(j) => StrategyState::Jump(j.buckets().to_vec()),
        Strategy::Rendezvous => StrategyState::Rendezvous,
        Strategy::Maglev(m) => StrategyState::Maglev(m.table().to_vec()),
        Strategy::Bounded(b) => StrategyState::Bounded(b.ketama().vnodes().to_vec()),
        Strategy::Custom(_) => StrategyState::Custom,
    }
}

impl RingSnapshot {
    /// Takes a full snapshot of `ring`'s current state. Forces any dirty
    /// strategy index to rebuild first so the snapshot reflects committed
    /// topology, not a stale cached index.
    pub fn capture(ring: &mut Ring) -> Self {
        let strategy_state = strategy_state_of(ring);
        Self {
            name: ring.name().to_string(),
            version: ring.version(),
            hash_seed: ring.hash_seed(),
            vnode_config: *ring.vnode_config(),
            default_quorum: ring.default_quorum().clone(),
            affinity_rules: ring.affinity_rules().to_vec(),
            strategy_kind: ring.strategy_kind(),
            strategy_state,
            nodes: ring.registry().iter().cloned().collect(),
            keyspaces: ring.keyspaces().cloned().collect(),
            rebalance_plan: ring.rebalance_plan().cloned(),
        }
    }

    /// Rehydrates a live, queryable [`Ring`] from this snapshot. Nodes and
    /// keyspaces are installed directly rather than replayed through
    /// `add_node`/`add_keyspace`, and the strategy index is rebuilt fresh
    /// from the restored nodes rather than trusting `strategy_state`
    /// verbatim — recomputation is cheap and guaranteed self-consistent.
    pub fn into_ring(self) -> enginecore::Result<Ring> {
        Ring::from_snapshot_parts(
            self.name,
            self.hash_seed,
            self.vnode_config,
            self.default_quorum,
            self.affinity_rules,
            self.strategy_kind,
            self.nodes,
            self.keyspaces,
            self.rebalance_plan,
            self.version,
        )
    }
}

/// A mutation to a single node, carried in a [`DeltaSnapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeChange {
    Added(Node),
    Removed(NodeId),
    Updated(Node),
}

/// The additions/removals/updates whose ring version is strictly greater
/// than `base_version`. Computed by diffing two full snapshots rather than
/// tracked live, since the engine itself keeps only a single ring-wide
/// version counter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeltaSnapshot {
    pub base_version: u64,
    pub new_version: u64,
    pub changes: Vec<NodeChange>,
}

impl DeltaSnapshot {
    pub fn diff(base: &RingSnapshot, current: &RingSnapshot) -> Self {
        let mut changes = Vec::new();
        let base_ids: std::collections::HashMap<NodeId, &Node> =
            base.nodes.iter().map(|n| (n.id, n)).collect();
        let mut current_ids = std::collections::HashSet::new();

        for node in &current.nodes {
            current_ids.insert(node.id);
            match base_ids.get(&node.id) {
                None => changes.push(NodeChange::Added(node.clone())),
                Some(_) if node.updated_at_version > base.version => {
                    changes.push(NodeChange::Updated(node.clone()))
                }
                Some(_) => {}
            }
        }
        for node in &base.nodes {
            if !current_ids.contains(&node.id) {
                changes.push(NodeChange::Removed(node.id));
            }
        }

        Self { base_version: base.version, new_version: current.version, changes }
    }

    /// Applies `self` onto `target`, mutating it in place. Fails if
    /// `target`'s version doesn't match this delta's base version. Also
    /// recomputes `target.strategy_state` from the updated node list, since
    /// otherwise the flat struct would go stale with respect to its own
    /// strategy index after every delta.
    pub fn apply(&self, target: &mut RingSnapshot) -> crate::error::Result<()> {
        if target.version != self.base_version {
            return Err(crate::error::CodecError::BaseVersionMismatch {
                base: self.base_version,
                local: target.version,
            });
        }
        for change in &self.changes {
            match change {
                NodeChange::Added(node) | NodeChange::Updated(node) => {
                    target.nodes.retain(|n| n.id != node.id);
                    target.nodes.push(node.clone());
                }
                NodeChange::Removed(id) => {
                    target.nodes.retain(|n| n.id != *id);
                }
            }
        }
        target.version = self.new_version;
        let mut ring = target.clone().into_ring()?;
        target.strategy_state = strategy_state_of(&mut ring);
        Ok(())
    }
}
