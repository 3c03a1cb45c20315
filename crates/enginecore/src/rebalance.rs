//! The rebalance planner: Ketama range-move derivation and the external,
//! completion-driven move lifecycle.

use crate::error::{EngineError, Result};
use crate::node::{now_millis, NodeId};
use crate::registry::NodeRegistry;
use crate::vnode::VirtualNode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebalanceMove {
    pub range_start: u64,
    pub range_end: u64,
    pub source: NodeId,
    pub target: NodeId,
    pub estimated_bytes: u64,
    pub state: MoveState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub moves: Vec<RebalanceMove>,
    pub completed_count: u32,
    pub failed_count: u32,
    pub total_bytes: u64,
    pub moved_bytes: u64,
    pub created_at: u64,
    pub started_at: Option<u64>,
}

impl RebalancePlan {
    pub fn new(moves: Vec<RebalanceMove>) -> Self {
        let total_bytes = moves.iter().map(|m| m.estimated_bytes).sum();
        Self {
            moves,
            completed_count: 0,
            failed_count: 0,
            total_bytes,
            moved_bytes: 0,
            created_at: now_millis(),
            started_at: None,
        }
    }

    /// Appends more moves to an active plan. Ketama and bounded-load always
    /// support incremental appends onto an in-flight plan.
    pub fn append(&mut self, moves: Vec<RebalanceMove>) {
        self.total_bytes += moves.iter().map(|m| m.estimated_bytes).sum::<u64>();
        self.moves.extend(moves);
    }

    pub fn is_terminal(&self) -> bool {
        (self.completed_count + self.failed_count) as usize == self.moves.len()
    }

    pub fn progress(&self) -> f32 {
        if self.moves.is_empty() {
            return 1.0;
        }
        (self.completed_count + self.failed_count) as f32 / self.moves.len() as f32
    }

    /// Marks a move complete. Completion is externally driven: the engine
    /// never transfers bytes itself, it only tracks state.
    pub fn complete_move(&mut self, index: usize) -> Result<()> {
        if self.started_at.is_none() {
            self.started_at = Some(now_millis());
        }
        let mv = self.moves.get_mut(index).ok_or(EngineError::NotFound)?;
        if mv.state == MoveState::Completed {
            return Ok(());
        }
        if mv.state == MoveState::Failed {
            return Err(EngineError::InvalidState("move already failed".into()));
        }
        mv.state = MoveState::Completed;
        self.moved_bytes += mv.estimated_bytes;
        self.completed_count += 1;
        Ok(())
    }

    pub fn fail_move(&mut self, index: usize) -> Result<()> {
        let mv = self.moves.get_mut(index).ok_or(EngineError::NotFound)?;
        if mv.state == MoveState::Completed {
            return Err(EngineError::InvalidState("move already completed".into()));
        }
        mv.state = MoveState::Failed;
        self.failed_count += 1;
        Ok(())
    }

    /// Cancels every move still in flight.
    pub fn cancel(&mut self) {
        for mv in self.moves.iter_mut() {
            if mv.state == MoveState::Pending || mv.state == MoveState::InProgress {
                mv.state = MoveState::Failed;
                self.failed_count += 1;
            }
        }
    }
}

/// Diffs two Ketama vnode layouts (both sorted by hash point) and derives
/// the hash-range moves needed to go from `before` to `after`.
pub fn plan_ketama_rebalance(
    before: &[VirtualNode],
    after: &[VirtualNode],
    registry: &NodeRegistry,
) -> Vec<RebalanceMove> {
    let before_set: HashSet<(u64, NodeId, u32)> = before.iter().map(VirtualNode::order_key).collect();
    let after_set: HashSet<(u64, NodeId, u32)> = after.iter().map(VirtualNode::order_key).collect();

    let owner_at = |ring: &[VirtualNode], point: u64| -> Option<NodeId> {
        if ring.is_empty() {
            return None;
        }
        let idx = ring.partition_point(|v| v.hash_point < point) % ring.len();
        Some(ring[idx].node_id)
    };

    let mut moves = Vec::new();

    for (i, v) in after.iter().enumerate() {
        if before_set.contains(&v.order_key()) {
            continue;
        }
        let pred = if i == 0 { after[after.len() - 1].hash_point } else { after[i - 1].hash_point };
        if let Some(prev_owner) = owner_at(before, pred.wrapping_add(1)) {
            if prev_owner != v.node_id {
                let bytes = estimate_bytes(registry, prev_owner, pred, v.hash_point);
                moves.push(RebalanceMove {
                    range_start: pred,
                    range_end: v.hash_point,
                    source: prev_owner,
                    target: v.node_id,
                    estimated_bytes: bytes,
                    state: MoveState::Pending,
                });
            }
        }
    }

    for (i, v) in before.iter().enumerate() {
        if after_set.contains(&v.order_key()) {
            continue;
        }
        let pred = if i == 0 { before[before.len() - 1].hash_point } else { before[i - 1].hash_point };
        if let Some(new_owner) = owner_at(after, v.hash_point) {
            if new_owner != v.node_id {
                let bytes = estimate_bytes(registry, v.node_id, pred, v.hash_point);
                moves.push(RebalanceMove {
                    range_start: pred,
                    range_end: v.hash_point,
                    source: v.node_id,
                    target: new_owner,
                    estimated_bytes: bytes,
                    state: MoveState::Pending,
                });
            }
        }
    }

    moves
}

fn estimate_bytes(registry: &NodeRegistry, source: NodeId, start: u64, end: u64) -> u64 {
    let frac = fraction_of_keyspace(start, end);
    registry.get(source).map(|n| (n.used_bytes as f64 * frac) as u64).unwrap_or(0)
}

fn fraction_of_keyspace(start: u64, end: u64) -> f64 {
    let span = end.wrapping_sub(start);
    span as f64 / (u64::MAX as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    fn registry_with(n: usize, used_bytes: u64) -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        for i in 0..n {
            let mut cfg = NodeConfig::new(NodeId(i as u64), format!("n{i}"), "addr");
            cfg.capacity_bytes = used_bytes * 2;
            reg.add(cfg, 1).unwrap();
            reg.set_used_bytes(NodeId(i as u64), used_bytes).unwrap();
        }
        reg
    }

    #[test]
    fn no_moves_when_layout_unchanged() {
        let reg = registry_with(2, 1000);
        let vnodes = vec![
            VirtualNode { hash_point: 10, node_id: NodeId(0), vnode_index: 0 },
            VirtualNode { hash_point: 20, node_id: NodeId(1), vnode_index: 0 },
        ];
        let moves = plan_ketama_rebalance(&vnodes, &vnodes, &reg);
        assert!(moves.is_empty());
    }

    #[test]
    fn adding_a_vnode_creates_a_move_from_its_predecessor() {
        let reg = registry_with(3, 1000);
        let before = vec![
            VirtualNode { hash_point: 10, node_id: NodeId(0), vnode_index: 0 },
            VirtualNode { hash_point: 20, node_id: NodeId(1), vnode_index: 0 },
        ];
        let after = vec![
            VirtualNode { hash_point: 10, node_id: NodeId(0), vnode_index: 0 },
            VirtualNode { hash_point: 15, node_id: NodeId(2), vnode_index: 0 },
            VirtualNode { hash_point: 20, node_id: NodeId(1), vnode_index: 0 },
        ];
        let moves = plan_ketama_rebalance(&before, &after, &reg);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].target, NodeId(2));
        assert_eq!(moves[0].source, NodeId(0));
    }

    #[test]
    fn plan_lifecycle_tracks_completion() {
        let mut plan = RebalancePlan::new(vec![
            RebalanceMove { range_start: 0, range_end: 1, source: NodeId(0), target: NodeId(1), estimated_bytes: 100, state: MoveState::Pending },
            RebalanceMove { range_start: 1, range_end: 2, source: NodeId(0), target: NodeId(2), estimated_bytes: 50, state: MoveState::Pending },
        ]);
        assert!(!plan.is_terminal());
        plan.complete_move(0).unwrap();
        assert_eq!(plan.moved_bytes, 100);
        plan.fail_move(1).unwrap();
        assert!(plan.is_terminal());
        assert_eq!(plan.progress(), 1.0);
    }

    #[test]
    fn cancel_fails_every_unfinished_move() {
        let mut plan = RebalancePlan::new(vec![
            RebalanceMove { range_start: 0, range_end: 1, source: NodeId(0), target: NodeId(1), estimated_bytes: 100, state: MoveState::Pending },
        ]);
        plan.cancel();
        assert_eq!(plan.moves[0].state, MoveState::Failed);
        assert!(plan.is_terminal());
    }
}
