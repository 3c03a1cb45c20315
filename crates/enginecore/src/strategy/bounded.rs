//! Bounded-load consistent hashing: a Ketama ring whose preference order is
//! filtered by a caller-supplied load signal.

use super::ketama::KetamaIndex;
use crate::node::NodeId;
use crate::registry::NodeRegistry;
use crate::vnode::VnodeConfig;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct BoundedIndex {
    pub(crate) ketama: KetamaIndex,
    pub load_factor: f64,
    pub(crate) loads: HashMap<NodeId, u64>,
}

impl BoundedIndex {
    pub fn new(load_factor: f64) -> Self {
        Self { ketama: KetamaIndex::new(), load_factor, loads: HashMap::new() }
    }

    pub fn update_load(&mut self, id: NodeId, load: u64) {
        self.loads.insert(id, load);
    }

    pub fn ketama(&self) -> &KetamaIndex {
        &self.ketama
    }

    pub fn locate(
        &self,
        registry: &NodeRegistry,
        key: &[u8],
        seed: u64,
        max_replicas: usize,
    ) -> Vec<NodeId> {
        let preference = self.ketama.locate(key, seed, usize::MAX);
        if preference.is_empty() || max_replicas == 0 {
            return Vec::new();
        }

        let total_load: u64 = preference.iter().map(|id| self.loads.get(id).copied().unwrap_or(0)).sum();
        let avg = total_load as f64 / preference.len() as f64;
        let cap = (avg * (1.0 + self.load_factor)).ceil() as u64;

        let mut out = Vec::new();
        for &id in &preference {
            let load = self.loads.get(&id).copied().unwrap_or(0);
            if cap == 0 || load < cap.max(1) {
                out.push(id);
                if out.len() >= max_replicas {
                    return out;
                }
            }
        }

        if out.len() < max_replicas {
            tracing::warn!(cap, "bounded-load cap relaxed: not enough under-cap candidates");
            let mut remaining: Vec<NodeId> =
                preference.into_iter().filter(|id| !out.contains(id)).collect();
            remaining.sort_by_key(|id| self.loads.get(id).copied().unwrap_or(0));
            for id in remaining {
                out.push(id);
                if out.len() >= max_replicas {
                    break;
                }
            }
        }

        let _ = registry;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    fn registry_with(n: usize) -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        for i in 0..n {
            reg.add(NodeConfig::new(NodeId(i as u64), format!("n{i}"), "addr"), 1).unwrap();
        }
        reg
    }

    #[test]
    fn overloaded_primary_is_skipped() {
        let reg = registry_with(4);
        let mut idx = BoundedIndex::new(0.1);
        idx.ketama.rebuild(&reg, 1, &VnodeConfig::default());

        let preference = idx.ketama.locate(b"hot-key", 1, 4);
        let primary = preference[0];
        for &id in &preference {
            idx.update_load(id, if id == primary { 1000 } else { 0 });
        }

        let out = idx.locate(&reg, b"hot-key", 1, 1);
        assert_ne!(out[0], primary);
    }

    #[test]
    fn relaxes_cap_when_all_candidates_overloaded() {
        let reg = registry_with(3);
        let mut idx = BoundedIndex::new(0.0);
        idx.ketama.rebuild(&reg, 1, &VnodeConfig::default());
        for n in reg.iter() {
            idx.update_load(n.id, 100);
        }
        let out = idx.locate(&reg, b"k", 1, 2);
        assert_eq!(out.len(), 2);
    }
}
