//! Consistency levels and quorum policy. The planning logic that turns a
//! policy into write-sets and read-sets lives in the `replication` crate;
//! this module only defines the shared vocabulary.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    One,
    Quorum,
    All,
    LocalOne,
    LocalQuorum,
    EachQuorum,
}

/// A quorum policy for a ring or keyspace. `write_quorum`/`read_quorum`, when
/// set, override whatever `consistency` alone would compute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub replica_count: usize,
    pub consistency: ConsistencyLevel,
    pub write_quorum: Option<usize>,
    pub write_sync: bool,
    pub read_quorum: Option<usize>,
    pub read_repair_enabled: bool,
}

impl QuorumPolicy {
    pub fn new(replica_count: usize, consistency: ConsistencyLevel) -> Self {
        Self {
            replica_count,
            consistency,
            write_quorum: None,
            write_sync: true,
            read_quorum: None,
            read_repair_enabled: false,
        }
    }

    /// `CLUSTER_QUORUM_STRONG`: every replica must ack a write, one suffices
    /// for a read.
    pub fn strong(replica_count: usize) -> Self {
        Self {
            write_sync: true,
            ..Self::new(replica_count, ConsistencyLevel::All)
        }
    }

    /// `CLUSTER_QUORUM_EVENTUAL`: one replica for writes and reads, no sync
    /// wait, no read repair.
    pub fn eventual(replica_count: usize) -> Self {
        Self {
            write_sync: false,
            ..Self::new(replica_count, ConsistencyLevel::One)
        }
    }

    /// `CLUSTER_QUORUM_BALANCED`: majority for both writes and reads.
    pub fn balanced(replica_count: usize) -> Self {
        Self::new(replica_count, ConsistencyLevel::Quorum)
    }

    /// `CLUSTER_QUORUM_READ_HEAVY`: write to all, read from one, with read
    /// repair to reconcile stragglers.
    pub fn read_heavy(replica_count: usize) -> Self {
        Self {
            read_repair_enabled: true,
            write_sync: true,
            read_quorum: Some(1),
            ..Self::new(replica_count, ConsistencyLevel::All)
        }
    }

    /// `CLUSTER_QUORUM_WRITE_HEAVY`: write to one, require all for reads.
    pub fn write_heavy(replica_count: usize) -> Self {
        Self {
            write_sync: false,
            read_quorum: Some(replica_count),
            ..Self::new(replica_count, ConsistencyLevel::One)
        }
    }

    /// Number of replica acks a write must collect, honoring an explicit
    /// override before falling back to `consistency`.
    pub fn resolved_write_quorum(&self) -> usize {
        if let Some(w) = self.write_quorum {
            return w.min(self.replica_count.max(1));
        }
        level_quorum(self.consistency, self.replica_count)
    }

    /// Number of replicas a read must consult, honoring an explicit override
    /// before falling back to `consistency`.
    pub fn resolved_read_quorum(&self) -> usize {
        if let Some(r) = self.read_quorum {
            return r.min(self.replica_count.max(1));
        }
        match self.consistency {
            ConsistencyLevel::One | ConsistencyLevel::LocalOne => 1,
            _ => level_quorum(self.consistency, self.replica_count),
        }
    }
}

/// DC-agnostic fallback: a majority (or all, or one) over the full replica
/// count. `LocalOne`/`LocalQuorum`/`EachQuorum` are only meaningfully
/// DC-scoped once a caller has partitioned replicas by datacenter; lacking
/// that partition this collapses them to their DC-agnostic counterpart
/// (`One`/`Quorum`/`Quorum`). `replication::QuorumPlanner` is where the real
/// per-datacenter partitioning happens, since only it has a node registry to
/// resolve datacenters from.
pub fn level_quorum(level: ConsistencyLevel, replica_count: usize) -> usize {
    let n = replica_count.max(1);
    match level {
        ConsistencyLevel::One | ConsistencyLevel::LocalOne => 1,
        ConsistencyLevel::All => n,
        ConsistencyLevel::Quorum | ConsistencyLevel::LocalQuorum | ConsistencyLevel::EachQuorum => n / 2 + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_write_quorum_overrides_level() {
        let mut policy = QuorumPolicy::new(5, ConsistencyLevel::One);
        policy.write_quorum = Some(4);
        assert_eq!(policy.resolved_write_quorum(), 4);
    }

    #[test]
    fn quorum_level_majority() {
        let policy = QuorumPolicy::new(5, ConsistencyLevel::Quorum);
        assert_eq!(policy.resolved_write_quorum(), 3);
        assert_eq!(policy.resolved_read_quorum(), 3);
    }

    #[test]
    fn all_level_requires_every_replica() {
        let policy = QuorumPolicy::new(3, ConsistencyLevel::All);
        assert_eq!(policy.resolved_write_quorum(), 3);
    }

    #[test]
    fn presets_match_intended_tradeoffs() {
        let strong = QuorumPolicy::strong(3);
        assert_eq!(strong.resolved_write_quorum(), 3);
        let eventual = QuorumPolicy::eventual(3);
        assert_eq!(eventual.resolved_write_quorum(), 1);
    }
}
