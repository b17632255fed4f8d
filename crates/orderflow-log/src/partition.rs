//! Key-based partition selection.

use sha2::{Digest, Sha256};

/// Partition for a message key.
///
/// SHA-256 of the key, first four bytes big-endian, modulo the partition
/// count. Stable across processes and releases, so a user's events always
/// land in the same partition of a topic.
#[must_use]
pub fn partition_for(key: &[u8], partition_count: u32) -> u32 {
    let digest = Sha256::digest(key);
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head % partition_count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_partition() {
        for count in [1, 3, 8, 64] {
            let p = partition_for(b"u1", count);
            assert!(p < count);
            assert_eq!(p, partition_for(b"u1", count));
        }
    }

    #[test]
    fn single_partition() {
        assert_eq!(partition_for(b"anything", 1), 0);
    }

    #[test]
    fn keys_spread_over_partitions() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            seen.insert(partition_for(format!("user-{i}").as_bytes(), 8));
        }
        assert_eq!(seen.len(), 8);
    }
}
