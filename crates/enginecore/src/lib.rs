//! Consistent-hashing placement engine.
//!
//! A pure, in-process data structure that maps keys to an ordered list of
//! candidate nodes. No network I/O, no persistent storage, no concurrent
//! mutation safety: single-threaded by contract (see [`shared`] for the
//! opt-in read-copy-update wrapper callers can use across threads).

pub mod error;
pub mod hash;
pub mod keyspace;
pub mod location;
pub mod node;
pub mod quorum;
pub mod rebalance;
pub mod registry;
pub mod resolver;
pub mod ring;
pub mod shared;
pub mod stats;
pub mod strategy;
pub mod vnode;

pub use error::{EngineError, Result};
pub use keyspace::{Keyspace, KeyspaceConfig};
pub use location::{AffinityLevel, AffinityRule, Location};
pub use node::{HealthSample, LoadSample, Node, NodeConfig, NodeId, NodeState};
pub use quorum::{level_quorum, ConsistencyLevel, QuorumPolicy};
pub use rebalance::{MoveState, RebalanceMove, RebalancePlan};
pub use registry::NodeRegistry;
pub use resolver::{select_read_node, PlacementResult};
pub use ring::{Ring, RingConfig};
pub use shared::SharedRing;
pub use stats::{LoadDistribution, RingStats};
pub use strategy::{CustomStrategy, Strategy, StrategyKind};
pub use vnode::{VirtualNode, VnodeConfig};
