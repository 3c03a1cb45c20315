//! Scenario-file format and top-level argument parsing. `ringctl` has no
//! daemon or persistent process: every invocation loads a JSON topology
//! file fresh, replays it into a `Ring`, performs one operation, and (for
//! mutating commands) writes the updated topology back out.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enginecore::{
    AffinityRule, ConsistencyLevel, Location, NodeConfig, NodeId, QuorumPolicy, Ring, RingConfig,
    StrategyKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: u64,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub capacity_bytes: u64,
}

fn default_weight() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyFile {
    pub name: String,
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
    #[serde(default)]
    pub replica_count: Option<usize>,
    #[serde(default)]
    pub consistency: Option<ConsistencyLevel>,
    #[serde(default)]
    pub affinity_rules: Vec<AffinityRule>,
    #[serde(default)]
    pub hash_seed: Option<u64>,
    pub nodes: Vec<NodeEntry>,
}

impl TopologyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing topology file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("writing topology file {}", path.display()))
    }

    pub fn build_ring(&self) -> Result<Ring> {
        let quorum = QuorumPolicy::new(
            self.replica_count.unwrap_or(3),
            self.consistency.unwrap_or(ConsistencyLevel::Quorum),
        );
        let mut cfg = RingConfig::new(self.name.clone(), self.strategy.unwrap_or(StrategyKind::Ketama), quorum);
        cfg.affinity_rules = self.affinity_rules.clone();
        if let Some(seed) = self.hash_seed {
            cfg.hash_seed = seed;
        }
        let mut ring = Ring::new(cfg)?;
        for entry in &self.nodes {
            let node_cfg = NodeConfig::new(NodeId(entry.id), entry.name.clone(), entry.address.clone())
                .with_location(entry.location)
                .with_weight(entry.weight)
                .with_capacity_bytes(entry.capacity_bytes);
            ring.add_node(node_cfg)?;
        }
        Ok(ring)
    }

    /// Replaces `nodes` with the ring's current membership, preserving
    /// every other field as originally configured.
    pub fn sync_from_ring(&mut self, ring: &Ring) {
        self.nodes = ring
            .registry()
            .iter()
            .map(|n| NodeEntry {
                id: n.id.0,
                name: n.name.clone(),
                address: n.address.clone(),
                location: n.location,
                weight: n.weight,
                capacity_bytes: n.capacity_bytes,
            })
            .collect();
    }
}

#[derive(Parser)]
#[command(name = "ringctl", about = "Inspect and drive a consistent-hashing placement ring")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(self) -> Result<()> {
        let message = crate::commands::execute(self.command)?;
        println!("{message}");
        Ok(())
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a node to the ring and persist the updated topology.
    AddNode {
        topology: PathBuf,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 1)]
        weight: u32,
        #[arg(long, default_value_t = 0)]
        capacity_bytes: u64,
    },
    /// Remove a node from the ring and persist the updated topology.
    RemoveNode {
        topology: PathBuf,
        #[arg(long)]
        id: u64,
    },
    /// Resolve a key to its placement.
    Locate {
        topology: PathBuf,
        key: String,
        #[arg(long)]
        keyspace: Option<String>,
    },
    /// Print a summary of ring topology and stats.
    Describe { topology: PathBuf },
    /// Derive a write-set for a key under the ring's default quorum policy.
    PlanWrite { topology: PathBuf, key: String },
    /// Derive a read-set for a key under the ring's default quorum policy.
    PlanRead { topology: PathBuf, key: String },
    /// Dump a full versioned snapshot of the ring to a file.
    Snapshot { topology: PathBuf, out: PathBuf },
    /// Rehydrate a ring from a full snapshot file and resolve a key against it.
    Restore { snapshot: PathBuf, key: String },
    /// Diff two full snapshot files and write the resulting delta to a file.
    Diff { base: PathBuf, current: PathBuf, out: PathBuf },
    /// Apply a delta file onto a full snapshot file, writing the result.
    ApplyDelta { snapshot: PathBuf, delta: PathBuf, out: PathBuf },
}
