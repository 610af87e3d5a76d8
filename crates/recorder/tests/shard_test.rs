//! Exercises `recorder::shard` as an external consumer, covering the
//! properties the dispatcher and writer pool both depend on: stability,
//! bounded range, and an even-ish spread across a realistic path set.

use recorder::shard;

const PATHS: &[&str] = &[
    "/lustre/fs1/home/alice/a.txt",
    "/lustre/fs1/home/alice/b.txt",
    "/lustre/fs1/home/bob/c.txt",
    "/lustre/fs1/scratch/job-001/out.bin",
    "/lustre/fs1/scratch/job-002/out.bin",
    "/lustre/fs1/projects/x/README.md",
    "/lustre/fs1/projects/y/README.md",
];

#[test]
fn every_path_maps_into_the_writer_pool_range() {
    for num_shards in 1..=8usize {
        for path in PATHS {
            assert!(shard(path, num_shards) < num_shards);
        }
    }
}

#[test]
fn the_same_path_always_lands_on_the_same_writer() {
    for path in PATHS {
        let first = shard(path, 5);
        for _ in 0..10 {
            assert_eq!(shard(path, 5), first);
        }
    }
}

#[test]
fn distinct_paths_are_not_all_funneled_onto_one_writer() {
    let shards: std::collections::HashSet<usize> = PATHS.iter().map(|p| shard(p, 3)).collect();
    assert!(shards.len() > 1, "expected the sample paths to spread across more than one shard");
}
