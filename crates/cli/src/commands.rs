//! Command execution: turns a parsed [`crate::config::Command`] into a
//! human-readable result, reading (and where needed rewriting) a topology
//! file along the way.

use crate::config::{Command, TopologyFile};
use anyhow::Result;
use enginecore::{NodeConfig, NodeId, PlacementResult};
use replication::{QuorumPlanner, ReadSet, WriteSet};
use std::fmt;

pub enum CommandResult {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    Placement(PlacementResult),
    Topology(String),
    WritePlan(WriteSet),
    ReadPlan(ReadSet),
    SnapshotWritten { path: String, bytes: usize },
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::NodeAdded(id) => write!(f, "added node {id}"),
            CommandResult::NodeRemoved(id) => write!(f, "removed node {id}"),
            CommandResult::Placement(p) => {
                let replicas: Vec<String> = p.replicas.iter().map(|id| id.to_string()).collect();
                write!(
                    f,
                    "primary={} replicas=[{}] healthy={} hash={:#x}",
                    p.primary,
                    replicas.join(", "),
                    p.healthy_count,
                    p.hash_value
                )
            }
            CommandResult::Topology(s) => write!(f, "{s}"),
            CommandResult::WritePlan(ws) => {
                let sync: Vec<String> = ws.targets[..ws.sync_required].iter().map(|n| n.to_string()).collect();
                let async_: Vec<String> = ws.async_allowed.iter().map(|n| n.to_string()).collect();
                write!(
                    f,
                    "sync=[{}] async=[{}] timeout_ms={}",
                    sync.join(", "),
                    async_.join(", "),
                    ws.suggested_timeout_ms
                )
            }
            CommandResult::ReadPlan(rs) => {
                let candidates: Vec<String> = rs.candidates.iter().map(|n| n.to_string()).collect();
                write!(
                    f,
                    "candidates=[{}] required={} read_repair={}",
                    candidates.join(", "),
                    rs.required_responses,
                    rs.read_repair
                )
            }
            CommandResult::SnapshotWritten { path, bytes } => {
                write!(f, "wrote {bytes} bytes to {path}")
            }
        }
    }
}

pub fn execute(command: Command) -> Result<CommandResult> {
    match command {
        Command::AddNode { topology, id, name, address, weight, capacity_bytes } => {
            let mut file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let node_id = NodeId(id);
            ring.add_node(
                NodeConfig::new(node_id, name, address).with_weight(weight).with_capacity_bytes(capacity_bytes),
            )?;
            file.sync_from_ring(&ring);
            file.save(&topology)?;
            Ok(CommandResult::NodeAdded(node_id))
        }
        Command::RemoveNode { topology, id } => {
            let mut file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let node_id = NodeId(id);
            ring.remove_node(node_id)?;
            file.sync_from_ring(&ring);
            file.save(&topology)?;
            Ok(CommandResult::NodeRemoved(node_id))
        }
        Command::Locate { topology, key, keyspace } => {
            let file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let placement = match keyspace {
                Some(ks) => ring.locate_with_keyspace(&ks, key.as_bytes())?,
                None => ring.locate(key.as_bytes())?,
            };
            Ok(CommandResult::Placement(placement))
        }
        Command::Describe { topology } => {
            let file = TopologyFile::load(&topology)?;
            let ring = file.build_ring()?;
            let stats = ring.stats();
            let dist = ring.load_distribution();
            let summary = format!(
                "ring={} version={} strategy={:?} nodes={} healthy={} locate_ops={} avg_locate_ns={} load_variance={:.4}",
                ring.name(),
                ring.version(),
                ring.strategy_kind(),
                ring.node_count(),
                ring.healthy_node_count(),
                stats.locate_ops,
                stats.locate_latency.avg_ns(),
                dist.load_variance,
            );
            Ok(CommandResult::Topology(summary))
        }
        Command::PlanWrite { topology, key } => {
            let file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let placement = ring.locate(key.as_bytes())?;
            let write_set = QuorumPlanner::plan_write(&placement, ring.default_quorum(), ring.registry())?;
            Ok(CommandResult::WritePlan(write_set))
        }
        Command::PlanRead { topology, key } => {
            let file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let placement = ring.locate(key.as_bytes())?;
            let read_set = QuorumPlanner::plan_read(&placement, ring.default_quorum(), ring.registry())?;
            Ok(CommandResult::ReadPlan(read_set))
        }
        Command::Snapshot { topology, out } => {
            let file = TopologyFile::load(&topology)?;
            let mut ring = file.build_ring()?;
            let snapshot = streaming::RingSnapshot::capture(&mut ring);
            let bytes = streaming::encode_full(&snapshot)?;
            let len = bytes.len();
            std::fs::write(&out, bytes)?;
            Ok(CommandResult::SnapshotWritten { path: out.display().to_string(), bytes: len })
        }
        Command::Restore { snapshot, key } => {
            let bytes = std::fs::read(&snapshot)?;
            let decoded = streaming::decode_full(&bytes)?;
            let mut ring = decoded.into_ring()?;
            let placement = ring.locate(key.as_bytes())?;
            Ok(CommandResult::Placement(placement))
        }
        Command::Diff { base, current, out } => {
            let base_bytes = std::fs::read(&base)?;
            let current_bytes = std::fs::read(&current)?;
            let base_snap = streaming::decode_full(&base_bytes)?;
            let current_snap = streaming::decode_full(&current_bytes)?;
            let delta = streaming::DeltaSnapshot::diff(&base_snap, &current_snap);
            let bytes = streaming::encode_delta(&delta)?;
            let len = bytes.len();
            std::fs::write(&out, bytes)?;
            Ok(CommandResult::SnapshotWritten { path: out.display().to_string(), bytes: len })
        }
        Command::ApplyDelta { snapshot, delta, out } => {
            let snapshot_bytes = std::fs::read(&snapshot)?;
            let delta_bytes = std::fs::read(&delta)?;
            let mut base_snap = streaming::decode_full(&snapshot_bytes)?;
            let decoded_delta = streaming::decode_delta(&delta_bytes)?;
            decoded_delta.apply(&mut base_snap)?;
            let bytes = streaming::encode_full(&base_snap)?;
            let len = bytes.len();
            std::fs::write(&out, bytes)?;
            Ok(CommandResult::SnapshotWritten { path: out.display().to_string(), bytes: len })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct TempTopology(PathBuf);

    impl Drop for TempTopology {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn write_topology(nodes: usize) -> TempTopology {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("ringctl-test-{}-{id}.json", std::process::id()));
        let body = serde_json::json!({
            "name": "test-ring",
            "strategy": "Ketama",
            "replica_count": 2,
            "nodes": (0..nodes).map(|i| serde_json::json!({
                "id": i,
                "name": format!("n{i}"),
                "address": "127.0.0.1:9000",
            })).collect::<Vec<_>>(),
        });
        std::fs::write(&path, body.to_string()).unwrap();
        TempTopology(path)
    }

    #[test]
    fn locate_reports_a_valid_placement() {
        let topology = write_topology(5);
        let result =
            execute(Command::Locate { topology: topology.0.clone(), key: "order-42".into(), keyspace: None })
                .unwrap();
        assert!(matches!(result, CommandResult::Placement(_)));
    }

    #[test]
    fn add_node_persists_to_the_topology_file() {
        let topology = write_topology(2);
        execute(Command::AddNode {
            topology: topology.0.clone(),
            id: 99,
            name: "n99".into(),
            address: "127.0.0.1:9099".into(),
            weight: 1,
            capacity_bytes: 0,
        })
        .unwrap();
        let reloaded = TopologyFile::load(&topology.0).unwrap();
        assert!(reloaded.nodes.iter().any(|n| n.id == 99));
    }

    #[test]
    fn describe_reports_node_count() {
        let topology = write_topology(3);
        let result = execute(Command::Describe { topology: topology.0.clone() }).unwrap();
        let CommandResult::Topology(summary) = result else { panic!("expected topology summary") };
        assert!(summary.contains("nodes=3"));
    }

    fn temp_path(label: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("ringctl-test-{label}-{}-{id}.bin", std::process::id()));
        path
    }

    #[test]
    fn restore_locates_the_same_placement_as_the_snapshotted_ring() {
        let topology = write_topology(6);
        let snapshot_path = temp_path("snapshot");
        execute(Command::Snapshot { topology: topology.0.clone(), out: snapshot_path.clone() }).unwrap();

        let direct = execute(Command::Locate {
            topology: topology.0.clone(),
            key: "order-42".into(),
            keyspace: None,
        })
        .unwrap();
        let CommandResult::Placement(direct) = direct else { panic!("expected placement") };

        let restored =
            execute(Command::Restore { snapshot: snapshot_path.clone(), key: "order-42".into() }).unwrap();
        let CommandResult::Placement(restored) = restored else { panic!("expected placement") };

        assert_eq!(direct.replicas, restored.replicas);
        let _ = std::fs::remove_file(&snapshot_path);
    }

    #[test]
    fn diff_then_apply_delta_reproduces_the_mutated_topology() {
        let topology = write_topology(4);
        let base_path = temp_path("base");
        execute(Command::Snapshot { topology: topology.0.clone(), out: base_path.clone() }).unwrap();

        execute(Command::AddNode {
            topology: topology.0.clone(),
            id: 77,
            name: "n77".into(),
            address: "127.0.0.1:9077".into(),
            weight: 1,
            capacity_bytes: 0,
        })
        .unwrap();
        let current_path = temp_path("current");
        execute(Command::Snapshot { topology: topology.0.clone(), out: current_path.clone() }).unwrap();

        let delta_path = temp_path("delta");
        execute(Command::Diff {
            base: base_path.clone(),
            current: current_path.clone(),
            out: delta_path.clone(),
        })
        .unwrap();

        let applied_path = temp_path("applied");
        execute(Command::ApplyDelta {
            snapshot: base_path.clone(),
            delta: delta_path.clone(),
            out: applied_path.clone(),
        })
        .unwrap();

        let direct = execute(Command::Locate {
            topology: topology.0.clone(),
            key: "order-7".into(),
            keyspace: None,
        })
        .unwrap();
        let CommandResult::Placement(direct) = direct else { panic!("expected placement") };
        let restored =
            execute(Command::Restore { snapshot: applied_path.clone(), key: "order-7".into() }).unwrap();
        let CommandResult::Placement(restored) = restored else { panic!("expected placement") };
        assert_eq!(direct.replicas, restored.replicas);

        for path in [base_path, current_path, delta_path, applied_path] {
            let _ = std::fs::remove_file(&path);
        }
    }
}
