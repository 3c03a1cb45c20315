//! Topology model and the affinity predicate.

use serde::{Deserialize, Serialize};

/// The eight topology levels, from most specific to least.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AffinityLevel {
    Node = 0,
    Rack = 1,
    Cage = 2,
    Datacenter = 3,
    AvailabilityZone = 4,
    Region = 5,
    Country = 6,
    Continent = 7,
}

/// A node's position in the topology hierarchy. Each field is independent;
/// two nodes share a level only when the corresponding field matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub node: u64,
    pub rack: u32,
    pub cage: u32,
    pub datacenter: u32,
    pub availability_zone: u32,
    pub region: u32,
    pub country: u16,
    pub continent: u8,
}

impl Location {
    pub fn value_at(&self, level: AffinityLevel) -> u64 {
        match level {
            AffinityLevel::Node => self.node,
            AffinityLevel::Rack => self.rack as u64,
            AffinityLevel::Cage => self.cage as u64,
            AffinityLevel::Datacenter => self.datacenter as u64,
            AffinityLevel::AvailabilityZone => self.availability_zone as u64,
            AffinityLevel::Region => self.region as u64,
            AffinityLevel::Country => self.country as u64,
            AffinityLevel::Continent => self.continent as u64,
        }
    }
}

/// A spread requirement at a given topology level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityRule {
    pub level: AffinityLevel,
    pub min_spread: usize,
    pub required: bool,
}

impl AffinityRule {
    pub fn rack_spread(min_spread: usize) -> Self {
        Self { level: AffinityLevel::Rack, min_spread, required: true }
    }

    pub fn az_spread(min_spread: usize) -> Self {
        Self { level: AffinityLevel::AvailabilityZone, min_spread, required: true }
    }

    pub fn region_spread(min_spread: usize) -> Self {
        Self { level: AffinityLevel::Region, min_spread, required: true }
    }
}

/// Repairs `candidates[..window]` in place against `rules`, swapping in
/// later-preference candidates from the remaining pool to raise the distinct
/// count at a rule's level. Candidates are assumed already ordered by
/// strategy preference (best first). Soft (non-`required`) rules are applied
/// with the same repair but never block the caller; the caller decides
/// whether an unmet required rule constitutes a failure.
pub fn apply_affinity(
    candidates: &[(crate::node::NodeId, Location)],
    window: usize,
    rules: &[AffinityRule],
) -> Vec<crate::node::NodeId> {
    let window = window.min(candidates.len());
    let mut selected: Vec<usize> = (0..window).collect();

    for rule in rules {
        let mut guard = 0usize;
        loop {
            guard += 1;
            if guard > candidates.len() + 1 {
                break;
            }
            let distinct = count_distinct(&selected, candidates, rule.level);
            if distinct >= rule.min_spread {
                break;
            }

            let existing: std::collections::HashSet<u64> = selected
                .iter()
                .map(|&i| candidates[i].1.value_at(rule.level))
                .collect();

            let replacement = candidates
                .iter()
                .enumerate()
                .find(|(i, (_, loc))| !selected.contains(i) && !existing.contains(&loc.value_at(rule.level)));

            let Some((replacement_idx, _)) = replacement else {
                break;
            };

            let mut counts: std::collections::HashMap<u64, Vec<usize>> = std::collections::HashMap::new();
            for &i in &selected {
                counts.entry(candidates[i].1.value_at(rule.level)).or_default().push(i);
            }
            let victim_group = counts.values().filter(|v| v.len() > 1).max_by_key(|v| v.len());
            let Some(group) = victim_group else {
                break;
            };
            let victim = *group.iter().max().unwrap();
            let pos = selected.iter().position(|&x| x == victim).unwrap();
            selected[pos] = replacement_idx;
        }
    }

    selected.into_iter().map(|i| candidates[i].0).collect()
}

fn count_distinct(
    selected: &[usize],
    candidates: &[(crate::node::NodeId, Location)],
    level: AffinityLevel,
) -> usize {
    let set: std::collections::HashSet<u64> =
        selected.iter().map(|&i| candidates[i].1.value_at(level)).collect();
    set.len()
}
