//! The strategy engine: a tagged union over the five built-in placement
//! algorithms plus a caller-supplied custom strategy. Dispatch goes through
//! free functions rather than methods on `&mut self` so that `Ring`'s
//! mutating methods can borrow `strategy` and `registry` independently.

pub mod bounded;
pub mod jump;
pub mod ketama;
pub mod maglev;
pub mod rendezvous;

pub use bounded::BoundedIndex;
pub use jump::JumpIndex;
pub use ketama::KetamaIndex;
pub use maglev::MaglevIndex;

use crate::node::NodeId;
use crate::registry::NodeRegistry;
use crate::vnode::VnodeConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Ketama,
    Jump,
    Rendezvous,
    Maglev,
    Bounded,
    Custom,
}

/// A caller-supplied placement algorithm. Implementors own their own index
/// and decide how to react to topology changes.
pub trait CustomStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn on_topology_change(&mut self, registry: &NodeRegistry);
    fn locate(&self, registry: &NodeRegistry, key: &[u8], seed: u64, max_replicas: usize) -> Vec<NodeId>;
    fn clone_box(&self) -> Box<dyn CustomStrategy>;
}

pub enum Strategy {
    Ketama(KetamaIndex),
    Jump(JumpIndex),
    Rendezvous,
    Maglev(MaglevIndex),
    Bounded(BoundedIndex),
    Custom(Box<dyn CustomStrategy>),
}

impl Clone for Strategy {
    fn clone(&self) -> Self {
        match self {
            Strategy::Ketama(k) => Strategy::Ketama(k.clone()),
            Strategy::Jump(j) => Strategy::Jump(j.clone()),
            Strategy::Rendezvous => Strategy::Rendezvous,
            Strategy::Maglev(m) => Strategy::Maglev(m.clone()),
            Strategy::Bounded(b) => Strategy::Bounded(b.clone()),
            Strategy::Custom(c) => Strategy::Custom(c.clone_box()),
        }
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Ketama(_) => StrategyKind::Ketama,
            Strategy::Jump(_) => StrategyKind::Jump,
            Strategy::Rendezvous => StrategyKind::Rendezvous,
            Strategy::Maglev(_) => StrategyKind::Maglev,
            Strategy::Bounded(_) => StrategyKind::Bounded,
            Strategy::Custom(_) => StrategyKind::Custom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Ketama(_) => "ketama",
            Strategy::Jump(_) => "jump",
            Strategy::Rendezvous => "rendezvous",
            Strategy::Maglev(_) => "maglev",
            Strategy::Bounded(_) => "bounded",
            Strategy::Custom(c) => c.name(),
        }
    }
}

/// Builds a fresh, empty index for `kind`. Used to materialize the strategy
/// a keyspace overrides to, lazily, the first time it's requested. `Custom`
/// cannot be synthesized from just a kind (there is no way to recover the
/// caller's trait object from an enum discriminant), so it's rejected here.
pub fn new_for_kind(kind: StrategyKind) -> crate::error::Result<Strategy> {
    match kind {
        StrategyKind::Ketama => Ok(Strategy::Ketama(KetamaIndex::new())),
        StrategyKind::Jump => Ok(Strategy::Jump(JumpIndex::new())),
        StrategyKind::Rendezvous => Ok(Strategy::Rendezvous),
        StrategyKind::Maglev => Ok(Strategy::Maglev(MaglevIndex::new())),
        StrategyKind::Bounded => Ok(Strategy::Bounded(BoundedIndex::new(0.25))),
        StrategyKind::Custom => Err(crate::error::EngineError::InvalidConfig(
            "a keyspace cannot override to a custom strategy".into(),
        )),
    }
}

/// Marks the strategy's index stale; built-ins rebuild lazily on the next
/// `ensure_ready`, a custom strategy is notified immediately since it
/// manages its own caching.
pub fn notify_topology_change(strategy: &mut Strategy, registry: &NodeRegistry) {
    match strategy {
        Strategy::Ketama(k) => k.mark_dirty(),
        Strategy::Jump(j) => j.mark_dirty(),
        Strategy::Maglev(m) => m.mark_dirty(),
        Strategy::Bounded(b) => b.ketama.mark_dirty(),
        Strategy::Rendezvous => {}
        Strategy::Custom(c) => c.on_topology_change(registry),
    }
}

/// Rebuilds a built-in strategy's index if it is dirty. No-op for
/// `Rendezvous` (stateless) and `Custom` (self-managed).
pub fn ensure_ready(strategy: &mut Strategy, registry: &NodeRegistry, seed: u64, cfg: &VnodeConfig) {
    match strategy {
        Strategy::Ketama(k) => k.rebuild(registry, seed, cfg),
        Strategy::Jump(j) => j.rebuild(registry),
        Strategy::Maglev(m) => m.rebuild(registry, seed),
        Strategy::Bounded(b) => b.ketama.rebuild(registry, seed, cfg),
        Strategy::Rendezvous | Strategy::Custom(_) => {}
    }
}

pub fn locate(
    strategy: &Strategy,
    registry: &NodeRegistry,
    key: &[u8],
    seed: u64,
    max_replicas: usize,
) -> Vec<NodeId> {
    match strategy {
        Strategy::Ketama(k) => k.locate(key, seed, max_replicas),
        Strategy::Jump(j) => j.locate(key, seed, max_replicas),
        Strategy::Rendezvous => rendezvous::locate(registry, key, seed, max_replicas),
        Strategy::Maglev(m) => m.locate(key, seed, max_replicas),
        Strategy::Bounded(b) => b.locate(registry, key, seed, max_replicas),
        Strategy::Custom(c) => c.locate(registry, key, seed, max_replicas),
    }
}

/// Forces a rebuild (regardless of the dirty flag) of a Ketama-family index
/// and returns its current vnode layout, used by the rebalance planner to
/// snapshot before/after states around a mutation.
pub fn ketama_snapshot(
    strategy: &mut Strategy,
    registry: &NodeRegistry,
    seed: u64,
    cfg: &VnodeConfig,
) -> Option<Vec<crate::vnode::VirtualNode>> {
    match strategy {
        Strategy::Ketama(k) => {
            k.mark_dirty();
            k.rebuild(registry, seed, cfg);
            Some(k.vnodes().to_vec())
        }
        Strategy::Bounded(b) => {
            b.ketama.mark_dirty();
            b.ketama.rebuild(registry, seed, cfg);
            Some(b.ketama.vnodes().to_vec())
        }
        _ => None,
    }
}
