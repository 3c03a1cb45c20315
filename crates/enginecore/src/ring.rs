//! The ring: the single owning structure that ties the registry, strategy,
//! resolver, rebalance planner, and stats together.

use crate::error::{EngineError, Result};
use crate::keyspace::{Keyspace, KeyspaceConfig};
use crate::location::AffinityRule;
use crate::node::{now_millis, HealthSample, LoadSample, Node, NodeConfig, NodeId, NodeState};
use crate::quorum::QuorumPolicy;
use crate::rebalance::{self, RebalancePlan};
use crate::registry::NodeRegistry;
use crate::resolver::{self, PlacementResult};
use crate::stats::{load_distribution, LoadDistribution, RingStats};
use crate::strategy::{self, CustomStrategy, Strategy, StrategyKind};
use crate::vnode::VnodeConfig;
use std::collections::HashMap;
use std::time::Instant;

pub type StateChangeCallback = Box<dyn FnMut(NodeId, NodeState, NodeState) + Send>;
pub type RebalanceCallback = Box<dyn FnMut(&RebalancePlan) + Send>;

pub struct RingConfig {
    pub name: String,
    pub strategy_type: StrategyKind,
    pub custom_strategy: Option<Box<dyn CustomStrategy>>,
    pub vnodes: VnodeConfig,
    pub default_quorum: QuorumPolicy,
    pub affinity_rules: Vec<AffinityRule>,
    pub hash_seed: u64,
}

impl RingConfig {
    pub fn new(name: impl Into<String>, strategy_type: StrategyKind, default_quorum: QuorumPolicy) -> Self {
        Self {
            name: name.into(),
            strategy_type,
            custom_strategy: None,
            vnodes: VnodeConfig::default(),
            default_quorum,
            affinity_rules: Vec::new(),
            hash_seed: 0,
        }
    }
}

pub struct Ring {
    name: String,
    registry: NodeRegistry,
    strategy: Strategy,
    vnode_cfg: VnodeConfig,
    default_quorum: QuorumPolicy,
    affinity_rules: Vec<AffinityRule>,
    hash_seed: u64,
    version: u64,
    last_modified: u64,
    rebalance_plan: Option<RebalancePlan>,
    /// The Ketama vnode layout as it stood just before the mutation that
    /// started the current `rebalance_plan`, kept only until the plan's
    /// first move completes or it is canceled. Lets `cancel_rebalance` roll
    /// the strategy index back when nothing has moved yet.
    pre_plan_vnodes: Option<Vec<crate::vnode::VirtualNode>>,
    keyspaces: HashMap<String, Keyspace>,
    /// Lazily materialized, one entry per distinct `StrategyKind` a keyspace
    /// has overridden to (never the ring's own default kind, which is served
    /// by `strategy` directly).
    keyspace_strategies: HashMap<StrategyKind, Strategy>,
    stats: RingStats,
    state_callback: Option<StateChangeCallback>,
    rebalance_callback: Option<RebalanceCallback>,
}

impl Clone for Ring {
    /// Deep-copies everything except the registered callbacks, which are
    /// not generally cloneable and must be re-attached by the caller. This
    /// is sufficient for `shared::SharedRing`'s read-copy-update pattern,
    /// whose copies are short-lived working copies, not long-term replacements.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            registry: self.registry.clone(),
            strategy: self.strategy.clone(),
            vnode_cfg: self.vnode_cfg,
            default_quorum: self.default_quorum.clone(),
            affinity_rules: self.affinity_rules.clone(),
            hash_seed: self.hash_seed,
            version: self.version,
            last_modified: self.last_modified,
            rebalance_plan: self.rebalance_plan.clone(),
            pre_plan_vnodes: self.pre_plan_vnodes.clone(),
            keyspaces: self.keyspaces.clone(),
            keyspace_strategies: self.keyspace_strategies.clone(),
            stats: self.stats.clone(),
            state_callback: None,
            rebalance_callback: None,
        }
    }
}

impl Ring {
    pub fn new(config: RingConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(EngineError::InvalidConfig("ring name must not be empty".into()));
        }
        let strategy = match (config.strategy_type, config.custom_strategy) {
            (StrategyKind::Ketama, _) => Strategy::Ketama(strategy::KetamaIndex::new()),
            (StrategyKind::Jump, _) => Strategy::Jump(strategy::JumpIndex::new()),
            (StrategyKind::Rendezvous, _) => Strategy::Rendezvous,
            (StrategyKind::Maglev, _) => Strategy::Maglev(strategy::MaglevIndex::new()),
            (StrategyKind::Bounded, _) => Strategy::Bounded(strategy::BoundedIndex::new(0.25)),
            (StrategyKind::Custom, Some(custom)) => Strategy::Custom(custom),
            (StrategyKind::Custom, None) => {
                return Err(EngineError::InvalidConfig("custom strategy requires custom_strategy".into()))
            }
        };
        Ok(Self {
            name: config.name,
            registry: NodeRegistry::new(),
            strategy,
            vnode_cfg: config.vnodes,
            default_quorum: config.default_quorum,
            affinity_rules: config.affinity_rules,
            hash_seed: config.hash_seed,
            version: 0,
            last_modified: now_millis(),
            rebalance_plan: None,
            pre_plan_vnodes: None,
            keyspaces: HashMap::new(),
            keyspace_strategies: HashMap::new(),
            stats: RingStats::default(),
            state_callback: None,
            rebalance_callback: None,
        })
    }

    /// Rebuilds a `Ring` directly from already-materialized parts, as when
    /// rehydrating one from a decoded snapshot. Nodes are installed via
    /// `NodeRegistry::restore` rather than replayed through `add_node`, so no
    /// version counters are bumped and no callbacks fire; the strategy index
    /// is recomputed fresh from the restored nodes rather than trusting
    /// wire-carried strategy state, since recomputation is cheap and always
    /// self-consistent with the node list.
    pub fn from_snapshot_parts(
        name: String,
        hash_seed: u64,
        vnode_cfg: VnodeConfig,
        default_quorum: QuorumPolicy,
        affinity_rules: Vec<AffinityRule>,
        strategy_kind: StrategyKind,
        nodes: Vec<Node>,
        keyspaces: Vec<Keyspace>,
        rebalance_plan: Option<RebalancePlan>,
        version: u64,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(EngineError::InvalidConfig("ring name must not be empty".into()));
        }
        let strategy = strategy::new_for_kind(strategy_kind)?;
        let mut registry = NodeRegistry::new();
        for node in nodes {
            registry.restore(node);
        }
        let mut ring = Self {
            name,
            registry,
            strategy,
            vnode_cfg,
            default_quorum,
            affinity_rules,
            hash_seed,
            version,
            last_modified: now_millis(),
            rebalance_plan,
            pre_plan_vnodes: None,
            keyspaces: keyspaces.into_iter().map(|ks| (ks.name.clone(), ks)).collect(),
            keyspace_strategies: HashMap::new(),
            stats: RingStats::default(),
            state_callback: None,
            rebalance_callback: None,
        };
        ring.ensure_strategy_ready();
        Ok(ring)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn default_quorum(&self) -> &QuorumPolicy {
        &self.default_quorum
    }

    pub fn affinity_rules(&self) -> &[AffinityRule] {
        &self.affinity_rules
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn vnode_config(&self) -> &VnodeConfig {
        &self.vnode_cfg
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn keyspaces(&self) -> impl Iterator<Item = &Keyspace> {
        self.keyspaces.values()
    }

    /// Forces the strategy's lazy index to rebuild if dirty, without
    /// performing a locate. Callers that need to inspect strategy-internal
    /// state (e.g. serializing a snapshot) should call this first.
    pub fn ensure_strategy_ready(&mut self) {
        strategy::ensure_ready(&mut self.strategy, &self.registry, self.hash_seed, &self.vnode_cfg);
    }

    fn bump_version(&mut self) {
        self.version += 1;
        self.last_modified = now_millis();
    }

    fn ketama_snapshot(&mut self) -> Option<Vec<crate::vnode::VirtualNode>> {
        strategy::ketama_snapshot(&mut self.strategy, &self.registry, self.hash_seed, &self.vnode_cfg)
    }

    fn after_topology_change(&mut self, before: Option<Vec<crate::vnode::VirtualNode>>) {
        strategy::notify_topology_change(&mut self.strategy, &self.registry);
        for strat in self.keyspace_strategies.values_mut() {
            strategy::notify_topology_change(strat, &self.registry);
        }
        let Some(before_vnodes) = before else { return };
        let Some(after_vnodes) =
            strategy::ketama_snapshot(&mut self.strategy, &self.registry, self.hash_seed, &self.vnode_cfg)
        else {
            return;
        };
        let moves = rebalance::plan_ketama_rebalance(&before_vnodes, &after_vnodes, &self.registry);
        if moves.is_empty() {
            return;
        }
        tracing::debug!(count = moves.len(), "rebalance plan updated");
        match self.rebalance_plan.as_mut() {
            Some(plan) => plan.append(moves),
            None => {
                self.pre_plan_vnodes = Some(before_vnodes);
                self.rebalance_plan = Some(RebalancePlan::new(moves));
            }
        }
        self.stats.rebalance_moves = self.rebalance_plan.as_ref().map(|p| p.moves.len()).unwrap_or(0) as u64;
        if let (Some(cb), Some(plan)) = (self.rebalance_callback.as_mut(), self.rebalance_plan.as_ref()) {
            cb(plan);
        }
    }

    // ---- Node management ----

    pub fn add_node(&mut self, cfg: NodeConfig) -> Result<()> {
        let before = self.ketama_snapshot();
        let id = cfg.id;
        self.registry.add(cfg, self.version + 1)?;
        self.after_topology_change(before);
        self.bump_version();
        tracing::info!(node = %id, "node added");
        Ok(())
    }

    pub fn add_nodes(&mut self, cfgs: Vec<NodeConfig>) -> Result<()> {
        for cfg in cfgs {
            self.add_node(cfg)?;
        }
        Ok(())
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let before = self.ketama_snapshot();
        self.registry.remove(id)?;
        self.after_topology_change(before);
        self.bump_version();
        tracing::info!(node = %id, "node removed");
        Ok(())
    }

    pub fn set_node_state(&mut self, id: NodeId, new_state: NodeState) -> Result<()> {
        let before = self.ketama_snapshot();
        let old_state = self.registry.set_state(id, new_state, self.version + 1)?;
        self.after_topology_change(before);
        self.bump_version();
        if old_state != new_state {
            tracing::info!(node = %id, ?old_state, ?new_state, "node state changed");
            if let Some(cb) = self.state_callback.as_mut() {
                cb(id, old_state, new_state);
            }
        }
        Ok(())
    }

    pub fn set_node_weight(&mut self, id: NodeId, weight: u32) -> Result<()> {
        let before = self.ketama_snapshot();
        self.registry.set_weight(id, weight, self.version + 1)?;
        self.after_topology_change(before);
        self.bump_version();
        Ok(())
    }

    pub fn update_node_health(&mut self, id: NodeId, health: HealthSample) -> Result<()> {
        self.registry.update_health(id, health)
    }

    pub fn update_node_load(&mut self, id: NodeId, load: LoadSample) -> Result<()> {
        self.registry.update_load(id, load)
    }

    /// Feeds the caller-supplied load signal the bounded-load strategy
    /// relies on to decide which candidates are over cap.
    pub fn update_bounded_load(&mut self, id: NodeId, load_units: u64) -> Result<()> {
        match &mut self.strategy {
            Strategy::Bounded(b) => {
                b.update_load(id, load_units);
                Ok(())
            }
            _ => Err(EngineError::InvalidState("ring is not using the bounded-load strategy".into())),
        }
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.registry.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn healthy_node_count(&self) -> u32 {
        self.registry.healthy_count()
    }

    // ---- Placement ----

    pub fn locate(&mut self, key: &[u8]) -> Result<PlacementResult> {
        let start = Instant::now();
        let replica_count = self.default_quorum.replica_count;
        let result = resolver::resolve_placement(
            &mut self.strategy,
            &self.registry,
            self.hash_seed,
            &self.vnode_cfg,
            key,
            replica_count,
            &self.affinity_rules,
        );
        self.stats.locate_ops += 1;
        self.stats.locate_latency.record(start.elapsed().as_nanos() as u64);
        result
    }

    pub fn locate_with_keyspace(&mut self, keyspace: &str, key: &[u8]) -> Result<PlacementResult> {
        let (replica_count, rules, strategy_kind): (usize, Vec<AffinityRule>, StrategyKind) = {
            let ks = self.keyspaces.get(keyspace).ok_or(EngineError::NotFound)?;
            (ks.quorum.replica_count, ks.affinity_rules.clone(), ks.strategy_type)
        };
        let start = Instant::now();
        let mut result = if strategy_kind == self.strategy.kind() {
            resolver::resolve_placement(
                &mut self.strategy,
                &self.registry,
                self.hash_seed,
                &self.vnode_cfg,
                key,
                replica_count,
                &rules,
            )?
        } else {
            let strat = match self.keyspace_strategies.entry(strategy_kind) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => e.insert(strategy::new_for_kind(strategy_kind)?),
            };
            resolver::resolve_placement(
                strat,
                &self.registry,
                self.hash_seed,
                &self.vnode_cfg,
                key,
                replica_count,
                &rules,
            )?
        };
        result.keyspace = Some(keyspace.to_string());
        self.stats.locate_ops += 1;
        self.stats.locate_latency.record(start.elapsed().as_nanos() as u64);
        if let Some(ks) = self.keyspaces.get_mut(keyspace) {
            ks.locate_count += 1;
        }
        Ok(result)
    }

    pub fn locate_bulk(&mut self, keys: &[&[u8]]) -> Vec<Result<PlacementResult>> {
        keys.iter().map(|k| self.locate(k)).collect()
    }

    pub fn select_read_node(&mut self, placement: &PlacementResult) -> Option<NodeId> {
        self.stats.read_ops += 1;
        resolver::select_read_node(&self.registry, placement)
    }

    pub fn record_write(&mut self) {
        self.stats.write_ops += 1;
    }

    // ---- Keyspaces ----

    pub fn add_keyspace(&mut self, cfg: KeyspaceConfig) -> Result<()> {
        if self.keyspaces.contains_key(&cfg.name) {
            return Err(EngineError::AlreadyExists);
        }
        let ks = Keyspace::from_config(cfg, &self.default_quorum, self.strategy.kind());
        self.keyspaces.insert(ks.name.clone(), ks);
        self.bump_version();
        Ok(())
    }

    pub fn remove_keyspace(&mut self, name: &str) -> Result<()> {
        self.keyspaces.remove(name).ok_or(EngineError::NotFound)?;
        self.bump_version();
        Ok(())
    }

    pub fn get_keyspace(&self, name: &str) -> Option<&Keyspace> {
        self.keyspaces.get(name)
    }

    // ---- Rebalancing ----

    pub fn rebalance_plan(&self) -> Option<&RebalancePlan> {
        self.rebalance_plan.as_ref()
    }

    pub fn complete_move(&mut self, index: usize) -> Result<()> {
        let plan = self.rebalance_plan.as_mut().ok_or(EngineError::InvalidState("no active rebalance plan".into()))?;
        plan.complete_move(index)?;
        if plan.is_terminal() {
            tracing::debug!("rebalance plan completed");
        }
        Ok(())
    }

    pub fn fail_move(&mut self, index: usize) -> Result<()> {
        let plan = self.rebalance_plan.as_mut().ok_or(EngineError::InvalidState("no active rebalance plan".into()))?;
        plan.fail_move(index)
    }

    /// Cancels the active rebalance plan: marks every still-in-flight move
    /// Failed, rolls the strategy index back to its pre-plan layout if no
    /// move had started yet, then clears the plan so the next topology
    /// change starts a fresh one instead of appending onto a dead plan.
    pub fn cancel_rebalance(&mut self) -> Result<()> {
        let plan = self.rebalance_plan.as_mut().ok_or(EngineError::InvalidState("no active rebalance plan".into()))?;
        let not_started = plan.started_at.is_none();
        plan.cancel();
        let pre_plan = self.pre_plan_vnodes.take();
        if not_started {
            if let Some(vnodes) = pre_plan {
                match &mut self.strategy {
                    Strategy::Ketama(k) => k.restore(vnodes),
                    Strategy::Bounded(b) => b.ketama.restore(vnodes),
                    _ => {}
                }
            }
        }
        self.rebalance_plan = None;
        tracing::info!("rebalance plan canceled");
        Ok(())
    }

    // ---- Stats & callbacks ----

    pub fn stats(&self) -> &RingStats {
        &self.stats
    }

    pub fn load_distribution(&self) -> LoadDistribution {
        load_distribution(&self.registry)
    }

    pub fn set_node_state_callback(&mut self, cb: impl FnMut(NodeId, NodeState, NodeState) + Send + 'static) {
        self.state_callback = Some(Box::new(cb));
    }

    pub fn set_rebalance_callback(&mut self, cb: impl FnMut(&RebalancePlan) + Send + 'static) {
        self.rebalance_callback = Some(Box::new(cb));
    }
}
