//! End-to-end tests driving the index through the full stack: disk
//! system, write-back buffer cache, and the index facade.

use blocktree::{BTreeIndex, BufferCache, DiskSystem, DisplayMode, Error};
use tempfile::tempdir;

const BLOCK_SIZE: usize = 256;
const KEY_SIZE: u32 = 16;
const VALUE_SIZE: u32 = 16;

fn key(i: usize) -> Vec<u8> {
    format!("key{:013}", i).into_bytes()
}

fn val(i: usize) -> Vec<u8> {
    format!("val{:013}", i).into_bytes()
}

fn new_store(path: &std::path::Path, blocks: u64, cache_frames: usize) -> BufferCache {
    let disk = DiskSystem::create(path, BLOCK_SIZE, blocks).unwrap();
    BufferCache::new(disk, cache_frames)
}

#[test]
fn bulk_load_then_look_everything_up() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("bulk.btree"), 512, 16);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 0..500 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    index.sanity_check().unwrap();

    for i in 0..500 {
        assert_eq!(index.lookup(&key(i)).unwrap(), val(i), "key {} lost", i);
    }
    assert!(matches!(index.lookup(&key(500)), Err(Error::NotFound)));
}

#[test]
fn reverse_and_interleaved_insert_orders_agree() {
    let dir = tempdir().unwrap();

    for (name, order) in [
        ("rev", (0..200).rev().collect::<Vec<_>>()),
        (
            "interleaved",
            (0..100).flat_map(|i| [i, 199 - i]).collect::<Vec<_>>(),
        ),
    ] {
        let mut cache = new_store(&dir.path().join(format!("{name}.btree")), 512, 16);
        let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

        for &i in &order {
            index.insert(&key(i), &val(i)).unwrap();
        }
        index.sanity_check().unwrap();

        let values = index.range_query(&key(0), &key(199)).unwrap();
        let expected: Vec<Vec<u8>> = (0..200).map(val).collect();
        assert_eq!(values, expected, "order {} broke the sequence", name);
    }
}

#[test]
fn mixed_workload_stays_sane_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.btree");

    {
        let mut cache = new_store(&path, 512, 8);
        let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

        for i in 0..300 {
            index.insert(&key(i), &val(i)).unwrap();
        }
        for i in (0..300).step_by(3) {
            index.delete(&key(i)).unwrap();
        }
        for i in (0..300).step_by(5) {
            if i % 3 != 0 {
                index.update(&key(i), &val(i + 1000)).unwrap();
            }
        }
        index.sanity_check().unwrap();
        index.detach().unwrap();
        cache.flush().unwrap();
    }

    let disk = DiskSystem::open(&path, BLOCK_SIZE).unwrap();
    let mut cache = BufferCache::new(disk, 8);
    let mut index = BTreeIndex::attach(&mut cache, 0).unwrap();
    index.sanity_check().unwrap();

    for i in 0..300 {
        let result = index.lookup(&key(i));
        if i % 3 == 0 {
            assert!(matches!(result, Err(Error::NotFound)), "key {} lingers", i);
        } else if i % 5 == 0 {
            assert_eq!(result.unwrap(), val(i + 1000), "key {} missed update", i);
        } else {
            assert_eq!(result.unwrap(), val(i), "key {} damaged", i);
        }
    }
}

#[test]
fn updates_are_visible_after_flush_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("update.btree");

    {
        let mut cache = new_store(&path, 64, 4);
        let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();
        index.insert(&key(1), &val(1)).unwrap();
        index.update(&key(1), &val(42)).unwrap();
        index.detach().unwrap();
        cache.flush().unwrap();
    }

    let disk = DiskSystem::open(&path, BLOCK_SIZE).unwrap();
    let mut cache = BufferCache::new(disk, 4);
    let mut index = BTreeIndex::attach(&mut cache, 0).unwrap();
    assert_eq!(index.lookup(&key(1)).unwrap(), val(42));
}

#[test]
fn tiny_cache_still_produces_a_correct_tree() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("tiny.btree"), 256, 1);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 0..150 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    index.sanity_check().unwrap();
    for i in 0..150 {
        assert_eq!(index.lookup(&key(i)).unwrap(), val(i));
    }
}

#[test]
fn cache_counters_reflect_the_work_done() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("stats.btree"), 64, 8);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 0..40 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    index.detach().unwrap();
    cache.flush().unwrap();

    let stats = *cache.stats();
    assert!(stats.reads > 0);
    assert!(stats.writes > 0);
    assert!(stats.disk_writes > 0, "flush must write dirty frames");
    assert!(stats.allocations >= 2, "create notifies the first two blocks");
    assert_eq!(stats.clock, stats.reads + stats.writes);
}

#[test]
fn deallocations_are_notified_when_blocks_merge_away() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("dealloc.btree"), 128, 8);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 0..80 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    for i in 0..80 {
        index.delete(&key(i)).unwrap();
    }
    index.sanity_check().unwrap();
    index.detach().unwrap();
    drop(index);

    assert!(cache.stats().deallocations > 0, "merges must free blocks");

    // freed blocks are reused by the next wave of inserts
    let mut index = BTreeIndex::attach(&mut cache, 0).unwrap();
    for i in 0..80 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    index.sanity_check().unwrap();
}

#[test]
fn display_modes_render_through_the_full_stack() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("display.btree"), 128, 8);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 1..=30 {
        index.insert(&key(i), &val(i)).unwrap();
    }

    let mut dot = Vec::new();
    index.display(&mut dot, DisplayMode::Dot).unwrap();
    let dot = String::from_utf8(dot).unwrap();
    assert!(dot.starts_with("digraph tree {"));

    let mut sorted = Vec::new();
    index
        .display(&mut sorted, DisplayMode::SortedKeyValue)
        .unwrap();
    assert_eq!(String::from_utf8(sorted).unwrap().lines().count(), 30);

    let mut depth = Vec::new();
    index.display(&mut depth, DisplayMode::Depth).unwrap();
    assert!(String::from_utf8(depth).unwrap().contains("root"));
}

#[test]
fn range_query_bounds_are_inclusive_through_the_stack() {
    let dir = tempdir().unwrap();
    let mut cache = new_store(&dir.path().join("range.btree"), 128, 8);
    let mut index = BTreeIndex::create(&mut cache, 0, KEY_SIZE, VALUE_SIZE).unwrap();

    for i in 1..=20 {
        index.insert(&key(i), &val(i)).unwrap();
    }

    let values = index.range_query(&key(5), &key(10)).unwrap();
    assert_eq!(values.len(), 6);
    assert_eq!(values.first().unwrap(), &val(5));
    assert_eq!(values.last().unwrap(), &val(10));
}

#[test]
fn index_can_run_directly_on_the_disk_system() {
    // the index consumes the BlockStore trait, so the raw device works
    // in place of the cache
    let dir = tempdir().unwrap();
    let mut disk = DiskSystem::create(dir.path().join("raw.btree"), BLOCK_SIZE, 64).unwrap();

    let mut index = BTreeIndex::create(&mut disk, 0, KEY_SIZE, VALUE_SIZE).unwrap();
    for i in 0..30 {
        index.insert(&key(i), &val(i)).unwrap();
    }
    index.sanity_check().unwrap();
    index.detach().unwrap();
    disk.sync().unwrap();

    let mut disk = DiskSystem::open(dir.path().join("raw.btree"), BLOCK_SIZE).unwrap();
    let mut index = BTreeIndex::attach(&mut disk, 0).unwrap();
    for i in 0..30 {
        assert_eq!(index.lookup(&key(i)).unwrap(), val(i));
    }
}
