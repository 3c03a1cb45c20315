//! The node registry: ownership of `Node` values and their state transitions.
//! The ring owns exactly one registry and mutates it only through this type.

use crate::error::{EngineError, Result};
use crate::node::{now_millis, HealthSample, LoadSample, Node, NodeConfig, NodeId, NodeState};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
    healthy_count: u32,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cfg: NodeConfig, version: u64) -> Result<()> {
        if self.nodes.contains_key(&cfg.id) {
            return Err(EngineError::AlreadyExists);
        }
        let node = Node::from_config(cfg, version);
        if node.state.is_healthy() {
            self.healthy_count += 1;
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    pub fn remove(&mut self, id: NodeId) -> Result<Node> {
        let node = self.nodes.remove(&id).ok_or(EngineError::NotFound)?;
        if node.state.is_healthy() {
            self.healthy_count -= 1;
        }
        Ok(node)
    }

    pub fn set_state(&mut self, id: NodeId, new_state: NodeState, version: u64) -> Result<NodeState> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NotFound)?;
        if node.state == new_state {
            return Ok(node.state);
        }
        if !node.state.can_transition_to(new_state) {
            return Err(EngineError::InvalidState(format!(
                "{:?} -> {:?} is not a legal transition",
                node.state, new_state
            )));
        }
        let old = node.state;
        node.state = new_state;
        node.state_changed_at = now_millis();
        node.updated_at_version = version;
        if old.is_healthy() && !new_state.is_healthy() {
            self.healthy_count -= 1;
        } else if !old.is_healthy() && new_state.is_healthy() {
            self.healthy_count += 1;
        }
        Ok(old)
    }

    pub fn set_weight(&mut self, id: NodeId, weight: u32, version: u64) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NotFound)?;
        node.weight = weight.max(1);
        node.updated_at_version = version;
        Ok(())
    }

    pub fn update_health(&mut self, id: NodeId, health: HealthSample) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NotFound)?;
        if !health.reachable {
            node.failure_count += 1;
        } else {
            node.failure_count = 0;
        }
        node.health = health;
        Ok(())
    }

    pub fn update_load(&mut self, id: NodeId, load: LoadSample) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NotFound)?;
        node.load = load;
        Ok(())
    }

    pub fn set_used_bytes(&mut self, id: NodeId, used_bytes: u64) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NotFound)?;
        node.used_bytes = used_bytes;
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Inserts a fully-formed node as-is, overwriting any existing entry
    /// with the same id. For rehydrating a registry from a snapshot, where
    /// the node's state, health, and version stamp must survive the wire
    /// round-trip unchanged rather than being recomputed from a `NodeConfig`.
    pub fn restore(&mut self, node: Node) {
        let becomes_healthy = node.state.is_healthy();
        let previous = self.nodes.insert(node.id, node);
        match (previous.map(|p| p.state.is_healthy()), becomes_healthy) {
            (Some(true), false) => self.healthy_count -= 1,
            (Some(false) | None, true) => self.healthy_count += 1,
            _ => {}
        }
    }

    pub fn healthy_count(&self) -> u32 {
        self.healthy_count
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;

    fn cfg(id: u64) -> NodeConfig {
        NodeConfig::new(NodeId(id), format!("n{id}"), "127.0.0.1:9000").with_location(Location::default())
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let mut reg = NodeRegistry::new();
        reg.add(cfg(1), 1).unwrap();
        assert_eq!(reg.add(cfg(1), 2).unwrap_err(), EngineError::AlreadyExists);
    }

    #[test]
    fn remove_unknown_node_errors() {
        let mut reg = NodeRegistry::new();
        assert_eq!(reg.remove(NodeId(99)).unwrap_err(), EngineError::NotFound);
    }

    #[test]
    fn healthy_count_tracks_state_transitions() {
        let mut reg = NodeRegistry::new();
        reg.add(cfg(1), 1).unwrap();
        assert_eq!(reg.healthy_count(), 1);
        reg.set_state(NodeId(1), NodeState::Suspect, 2).unwrap();
        assert_eq!(reg.healthy_count(), 0);
        reg.set_state(NodeId(1), NodeState::Up, 3).unwrap();
        assert_eq!(reg.healthy_count(), 1);
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_unchanged() {
        let mut reg = NodeRegistry::new();
        reg.add(cfg(1), 1).unwrap();
        let err = reg.set_state(NodeId(1), NodeState::Recovering, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(reg.get(NodeId(1)).unwrap().state, NodeState::Up);
    }

    #[test]
    fn mutations_stamp_the_node_with_the_ring_version() {
        let mut reg = NodeRegistry::new();
        reg.add(cfg(1), 5).unwrap();
        assert_eq!(reg.get(NodeId(1)).unwrap().updated_at_version, 5);
        reg.set_weight(NodeId(1), 3, 6).unwrap();
        assert_eq!(reg.get(NodeId(1)).unwrap().updated_at_version, 6);
    }
}
