use enginecore::{ConsistencyLevel, NodeConfig, NodeId, QuorumPolicy, Ring, RingConfig, StrategyKind};
use replication::QuorumPlanner;

fn ring_with(n: u64, replica_count: usize) -> Ring {
    let cfg = RingConfig::new("r", StrategyKind::Ketama, QuorumPolicy::new(replica_count, ConsistencyLevel::Quorum));
    let mut ring = Ring::new(cfg).unwrap();
    for i in 0..n {
        ring.add_node(NodeConfig::new(NodeId(i), format!("n{i}"), "addr")).unwrap();
    }
    ring
}

#[test]
fn write_and_read_sets_derive_from_a_real_placement() {
    let mut ring = ring_with(5, 3);
    let placement = ring.locate(b"order-1").unwrap();
    let quorum = ring.default_quorum().clone();

    let write_set = QuorumPlanner::plan_write(&placement, &quorum, ring.registry()).unwrap();
    assert_eq!(write_set.targets, placement.replicas);
    assert_eq!(write_set.sync_required, 2);

    let read_set = QuorumPlanner::plan_read(&placement, &quorum, ring.registry()).unwrap();
    assert_eq!(read_set.candidates, placement.replicas);
}

#[test]
fn shrinking_below_replication_factor_can_starve_a_strong_quorum() {
    let mut ring = ring_with(2, 5);
    let placement = ring.locate(b"k").unwrap();
    let strong = enginecore::QuorumPolicy::strong(5);
    let err = QuorumPlanner::plan_write(&placement, &strong, ring.registry()).unwrap_err();
    assert!(matches!(err, replication::ReplicationError::QuorumUnreachable { .. }));
}
