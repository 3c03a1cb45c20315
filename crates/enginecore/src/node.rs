//! Node identity, state machine, and health/load samples.

use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The node lifecycle. Transitions not present in
/// [`NodeState::can_transition_to`] are rejected with `InvalidState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Up,
    Joining,
    Leaving,
    Down,
    Suspect,
    Recovering,
    Maintenance,
}

impl NodeState {
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Joining, Up) | (Joining, Leaving) | (Joining, Down) |
            (Up, Leaving) | (Up, Down) | (Up, Suspect) | (Up, Maintenance) |
            (Suspect, Up) | (Suspect, Down) |
            (Down, Recovering) | (Down, Leaving) |
            (Recovering, Up) | (Recovering, Down) |
            (Maintenance, Up) | (Maintenance, Leaving) |
            (Leaving, Down)
        )
    }

    /// Up, Joining, Suspect, and Recovering nodes are placement candidates;
    /// Leaving, Down, and Maintenance are not.
    pub fn is_placement_eligible(self) -> bool {
        matches!(self, NodeState::Up | NodeState::Joining | NodeState::Suspect | NodeState::Recovering)
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, NodeState::Up)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct HealthSample {
    pub reachable: bool,
    pub latency_ms: u32,
    pub error_rate: f64,
    pub last_check_time: u64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LoadSample {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub active_connections: u32,
    pub request_queue_depth: u64,
}

/// Caller-supplied description of a node being added to a ring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    pub address: String,
    pub location: Location,
    pub weight: u32,
    pub capacity_bytes: u64,
    pub initial_state: NodeState,
}

impl NodeConfig {
    pub fn new(id: NodeId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: address.into(),
            location: Location::default(),
            weight: 1,
            capacity_bytes: 0,
            initial_state: NodeState::Up,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_capacity_bytes(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    pub fn with_initial_state(mut self, state: NodeState) -> Self {
        self.initial_state = state;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub address: String,
    pub location: Location,
    pub weight: u32,
    pub capacity_bytes: u64,
    pub used_bytes: u64,
    pub state: NodeState,
    pub state_changed_at: u64,
    pub failure_count: u32,
    pub health: HealthSample,
    pub load: LoadSample,
    /// Ring version at which this record was last added, removed, or had its
    /// weight/state changed. Used by the delta codec to decide inclusion.
    pub updated_at_version: u64,
}

impl Node {
    pub(crate) fn from_config(cfg: NodeConfig, version: u64) -> Self {
        Self {
            id: cfg.id,
            name: cfg.name,
            address: cfg.address,
            location: cfg.location,
            weight: cfg.weight.max(1),
            capacity_bytes: cfg.capacity_bytes,
            used_bytes: 0,
            state: cfg.initial_state,
            state_changed_at: now_millis(),
            failure_count: 0,
            health: HealthSample::default(),
            load: LoadSample::default(),
            updated_at_version: version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_allowed() {
        assert!(NodeState::Joining.can_transition_to(NodeState::Up));
        assert!(NodeState::Up.can_transition_to(NodeState::Suspect));
        assert!(NodeState::Suspect.can_transition_to(NodeState::Up));
        assert!(NodeState::Down.can_transition_to(NodeState::Recovering));
        assert!(NodeState::Recovering.can_transition_to(NodeState::Up));
        assert!(NodeState::Maintenance.can_transition_to(NodeState::Up));
        assert!(NodeState::Leaving.can_transition_to(NodeState::Down));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!NodeState::Down.can_transition_to(NodeState::Up));
        assert!(!NodeState::Leaving.can_transition_to(NodeState::Up));
        assert!(!NodeState::Joining.can_transition_to(NodeState::Suspect));
        assert!(!NodeState::Maintenance.can_transition_to(NodeState::Suspect));
    }

    #[test]
    fn eligibility_classes() {
        assert!(NodeState::Up.is_placement_eligible());
        assert!(NodeState::Suspect.is_placement_eligible());
        assert!(NodeState::Joining.is_placement_eligible());
        assert!(NodeState::Recovering.is_placement_eligible());
        assert!(!NodeState::Leaving.is_placement_eligible());
        assert!(!NodeState::Down.is_placement_eligible());
        assert!(!NodeState::Maintenance.is_placement_eligible());
    }

    #[test]
    fn weight_is_clamped_to_at_least_one() {
        let cfg = NodeConfig::new(NodeId(1), "n1", "10.0.0.1:9000").with_weight(0);
        let node = Node::from_config(cfg, 1);
        assert_eq!(node.weight, 1);
    }
}
