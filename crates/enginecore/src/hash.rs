//! The single keyed hash primitive everything else in this crate builds on.
//! A 32-bit value is a truncation of the 64-bit digest, never a second
//! hash function.

use xxhash_rust::xxh3::Xxh3;

pub fn hash64(bytes: &[u8], seed: u64) -> u64 {
    let mut h = Xxh3::with_seed(seed);
    h.update(bytes);
    h.digest()
}

pub fn hash32(bytes: &[u8], seed: u64) -> u32 {
    (hash64(bytes, seed) & 0xFFFF_FFFF) as u32
}

/// Hash point for the `vnodeIndex`-th virtual node owned by `node_id`.
pub fn hash_node_vnode(node_id: u64, vnode_index: u32, seed: u64) -> u64 {
    let mut h = Xxh3::with_seed(seed);
    h.update(&node_id.to_le_bytes());
    h.update(&vnode_index.to_le_bytes());
    h.digest()
}

/// Combined key+node score used by rendezvous hashing.
pub fn hash_key_node(key: &[u8], node_id: u64, seed: u64) -> u64 {
    let mut h = Xxh3::with_seed(seed);
    h.update(key);
    h.update(&node_id.to_le_bytes());
    h.digest()
}

/// Per-node value used to derive maglev permutation offset/skip pairs.
pub fn hash_node_seed(node_id: u64, seed: u64) -> u64 {
    let mut h = Xxh3::with_seed(seed);
    h.update(&node_id.to_le_bytes());
    h.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_seed() {
        assert_eq!(hash64(b"hello", 7), hash64(b"hello", 7));
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(hash64(b"hello", 1), hash64(b"hello", 2));
    }

    #[test]
    fn hash32_is_truncation_of_hash64() {
        let h64 = hash64(b"truncate-me", 42);
        assert_eq!(hash32(b"truncate-me", 42) as u64, h64 & 0xFFFF_FFFF);
    }

    #[test]
    fn node_vnode_hash_distinguishes_index() {
        assert_ne!(hash_node_vnode(9, 0, 1), hash_node_vnode(9, 1, 1));
    }
}
