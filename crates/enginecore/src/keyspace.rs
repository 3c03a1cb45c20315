//! Keyspaces: named overrides of a ring's default quorum policy, affinity
//! rules, and strategy.

use crate::location::AffinityRule;
use crate::quorum::QuorumPolicy;
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    pub name: String,
    pub quorum: Option<QuorumPolicy>,
    pub affinity_rules: Vec<AffinityRule>,
    pub strategy_type: Option<StrategyKind>,
}

impl KeyspaceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), quorum: None, affinity_rules: Vec::new(), strategy_type: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Keyspace {
    pub name: String,
    pub quorum: QuorumPolicy,
    pub affinity_rules: Vec<AffinityRule>,
    pub strategy_type: StrategyKind,
    pub locate_count: u64,
    pub write_count: u64,
    pub read_count: u64,
}

impl Keyspace {
    pub(crate) fn from_config(
        cfg: KeyspaceConfig,
        default_quorum: &QuorumPolicy,
        default_strategy: StrategyKind,
    ) -> Self {
        Self {
            name: cfg.name,
            quorum: cfg.quorum.unwrap_or_else(|| default_quorum.clone()),
            affinity_rules: cfg.affinity_rules,
            strategy_type: cfg.strategy_type.unwrap_or(default_strategy),
            locate_count: 0,
            write_count: 0,
            read_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::ConsistencyLevel;

    #[test]
    fn keyspace_without_override_inherits_ring_defaults() {
        let default = QuorumPolicy::new(3, ConsistencyLevel::Quorum);
        let ks = Keyspace::from_config(KeyspaceConfig::new("accounts"), &default, StrategyKind::Ketama);
        assert_eq!(ks.quorum, default);
        assert_eq!(ks.strategy_type, StrategyKind::Ketama);
    }

    #[test]
    fn keyspace_override_wins() {
        let default = QuorumPolicy::new(3, ConsistencyLevel::Quorum);
        let mut cfg = KeyspaceConfig::new("sessions");
        cfg.quorum = Some(QuorumPolicy::new(1, ConsistencyLevel::One));
        let ks = Keyspace::from_config(cfg, &default, StrategyKind::Ketama);
        assert_eq!(ks.quorum.consistency, ConsistencyLevel::One);
    }
}
