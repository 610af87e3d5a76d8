//! Path-to-shard assignment shared by the fan-out dispatcher (`recorder`)
//! and documented here so the writer binaries agree on the same function.

use sha1::{Digest, Sha1};

/// Reduces the SHA-1 digest of `path` modulo `num_shards` via a byte-wise
/// recurrence rather than treating the digest as one big integer, so the
/// result matches regardless of the host's integer width.
///
/// `num_shards` must be nonzero; callers own a fixed, known-nonzero writer
/// pool, so this panics rather than returning a `Result` for an
/// unreachable input.
pub fn shard(path: &str, num_shards: usize) -> usize {
    assert!(num_shards > 0, "num_shards must be nonzero");
    let digest = Sha1::digest(path.as_bytes());
    let n = num_shards as u64;
    let mut acc: u64 = 0;
    for b in digest.as_slice() {
        acc = (acc * (256 % n) % n + (*b as u64 % n)) % n;
    }
    acc as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_is_stable_across_calls() {
        for path in ["/a", "/b", "/c", "/lustre/fs1/some/deep/path"] {
            let first = shard(path, 3);
            let second = shard(path, 3);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn shard_is_always_within_range() {
        for path in ["/a", "/b", "/c"] {
            assert!(shard(path, 3) < 3);
            assert!(shard(path, 1) < 1);
        }
    }

    #[test]
    fn single_shard_pool_always_assigns_shard_zero() {
        assert_eq!(shard("/anything", 1), 0);
    }

    #[test]
    #[should_panic(expected = "num_shards must be nonzero")]
    fn zero_shards_panics() {
        shard("/a", 0);
    }
}
