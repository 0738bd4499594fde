//! # Write-Back Buffer Cache
//!
//! `BufferCache` keeps a bounded set of whole-block frames in memory over
//! a [`DiskSystem`]. Reads are served from memory when possible; writes
//! only dirty a frame, and dirty frames reach disk when they are evicted
//! or when `flush` is called.
//!
//! ## Eviction
//!
//! Frames carry a last-used stamp from a monotonic access clock and the
//! least recently used frame is evicted when the cache is full. The
//! allocator's LIFO free list cooperates with this policy: a freshly
//! freed block is reused first, while its frame is usually still
//! resident.
//!
//! ## Counters
//!
//! The cache tracks logical reads and writes, the subset that actually
//! touched the disk, allocation and deallocation notifications, and the
//! access clock itself. The driver binaries print these after each
//! operation.
//!
//! ## Thread Safety
//!
//! None. The cache is owned by a single thread; the index core is
//! specified single-threaded and takes the cache by `&mut`.

use std::collections::HashMap;

use tracing::trace;

use crate::config::MIN_CACHE_BLOCKS;
use crate::error::Result;
use crate::storage::{BlockStore, DiskSystem};

/// Counter snapshot maintained by the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Logical block reads served (hits and misses).
    pub reads: u64,
    /// Logical block writes accepted.
    pub writes: u64,
    /// Reads that had to go to the disk.
    pub disk_reads: u64,
    /// Writes that reached the disk (evictions and flushes).
    pub disk_writes: u64,
    /// Allocation notifications received.
    pub allocations: u64,
    /// Deallocation notifications received.
    pub deallocations: u64,
    /// Monotonic access clock; advances on every logical read or write.
    pub clock: u64,
}

#[derive(Debug)]
struct Frame {
    block_no: u64,
    data: Vec<u8>,
    dirty: bool,
    last_used: u64,
}

#[derive(Debug)]
pub struct BufferCache {
    disk: DiskSystem,
    frames: Vec<Frame>,
    index: HashMap<u64, usize>,
    capacity: usize,
    stats: CacheStats,
}

impl BufferCache {
    pub fn new(disk: DiskSystem, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CACHE_BLOCKS);
        Self {
            disk,
            frames: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn tick(&mut self) -> u64 {
        self.stats.clock += 1;
        self.stats.clock
    }

    /// Writes every dirty frame back and syncs the disk. Frames stay
    /// resident.
    pub fn flush(&mut self) -> Result<()> {
        for frame in &mut self.frames {
            if frame.dirty {
                self.disk.write_block(frame.block_no, &frame.data)?;
                frame.dirty = false;
                self.stats.disk_writes += 1;
            }
        }
        self.disk.sync()
    }

    /// Evicts the least recently used frame if the cache is at capacity,
    /// writing it back first when dirty.
    fn make_room(&mut self) -> Result<()> {
        if self.frames.len() < self.capacity {
            return Ok(());
        }

        let victim = self
            .frames
            .iter()
            .enumerate()
            .min_by_key(|(_, f)| f.last_used)
            .map(|(i, _)| i)
            .expect("cache capacity is at least one frame");

        if self.frames[victim].dirty {
            let (block_no, data) = {
                let f = &self.frames[victim];
                (f.block_no, f.data.clone())
            };
            self.disk.write_block(block_no, &data)?;
            self.stats.disk_writes += 1;
        }

        let evicted = self.frames.swap_remove(victim);
        self.index.remove(&evicted.block_no);
        if victim < self.frames.len() {
            let moved = self.frames[victim].block_no;
            self.index.insert(moved, victim);
        }

        trace!(block = evicted.block_no, "evicted cache frame");
        Ok(())
    }

    fn install(&mut self, frame: Frame) -> usize {
        let block_no = frame.block_no;
        let idx = self.frames.len();
        self.frames.push(frame);
        self.index.insert(block_no, idx);
        idx
    }
}

impl BlockStore for BufferCache {
    fn block_size(&self) -> usize {
        self.disk.block_size()
    }

    fn num_blocks(&self) -> u64 {
        self.disk.num_blocks()
    }

    fn read_block(&mut self, block_no: u64, buf: &mut [u8]) -> Result<()> {
        if block_no >= self.disk.num_blocks() {
            return Err(crate::error::Error::InvalidArgument(format!(
                "block {} out of bounds (num_blocks={})",
                block_no,
                self.disk.num_blocks()
            )));
        }
        if buf.len() != self.disk.block_size() {
            return Err(crate::error::Error::InvalidArgument(format!(
                "buffer length {} does not match block size {}",
                buf.len(),
                self.disk.block_size()
            )));
        }

        self.stats.reads += 1;
        let now = self.tick();

        if let Some(&idx) = self.index.get(&block_no) {
            let frame = &mut self.frames[idx];
            frame.last_used = now;
            buf.copy_from_slice(&frame.data);
            return Ok(());
        }

        self.make_room()?;

        let mut data = vec![0u8; self.disk.block_size()];
        self.disk.read_block(block_no, &mut data)?;
        self.stats.disk_reads += 1;

        buf.copy_from_slice(&data);
        self.install(Frame {
            block_no,
            data,
            dirty: false,
            last_used: now,
        });
        Ok(())
    }

    fn write_block(&mut self, block_no: u64, buf: &[u8]) -> Result<()> {
        if block_no >= self.disk.num_blocks() {
            return Err(crate::error::Error::InvalidArgument(format!(
                "block {} out of bounds (num_blocks={})",
                block_no,
                self.disk.num_blocks()
            )));
        }
        if buf.len() != self.disk.block_size() {
            return Err(crate::error::Error::InvalidArgument(format!(
                "buffer length {} does not match block size {}",
                buf.len(),
                self.disk.block_size()
            )));
        }

        self.stats.writes += 1;
        let now = self.tick();

        if let Some(&idx) = self.index.get(&block_no) {
            let frame = &mut self.frames[idx];
            frame.data.copy_from_slice(buf);
            frame.dirty = true;
            frame.last_used = now;
            return Ok(());
        }

        self.make_room()?;
        self.install(Frame {
            block_no,
            data: buf.to_vec(),
            dirty: true,
            last_used: now,
        });
        Ok(())
    }

    fn notify_allocate_block(&mut self, block_no: u64) {
        self.stats.allocations += 1;
        trace!(block = block_no, "allocate notification");
    }

    fn notify_deallocate_block(&mut self, block_no: u64) {
        self.stats.deallocations += 1;
        trace!(block = block_no, "deallocate notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_cache(blocks: u64, frames: usize) -> (tempfile::TempDir, BufferCache) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        let disk = DiskSystem::create(&path, 128, blocks).unwrap();
        (dir, BufferCache::new(disk, frames))
    }

    #[test]
    fn read_miss_then_hit_counts_one_disk_read() {
        let (_dir, mut cache) = create_cache(8, 4);

        let mut buf = vec![0u8; 128];
        cache.read_block(3, &mut buf).unwrap();
        cache.read_block(3, &mut buf).unwrap();

        assert_eq!(cache.stats().reads, 2);
        assert_eq!(cache.stats().disk_reads, 1);
    }

    #[test]
    fn write_is_deferred_until_flush() {
        let (dir, mut cache) = create_cache(8, 4);

        cache.write_block(2, &vec![0x11u8; 128]).unwrap();
        assert_eq!(cache.stats().disk_writes, 0);

        cache.flush().unwrap();
        assert_eq!(cache.stats().disk_writes, 1);

        // the block is on disk now
        let mut disk = DiskSystem::open(dir.path().join("test.btree"), 128).unwrap();
        let mut buf = vec![0u8; 128];
        disk.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn eviction_writes_back_dirty_frame() {
        let (_dir, mut cache) = create_cache(8, 2);

        cache.write_block(0, &vec![0xAAu8; 128]).unwrap();
        cache.write_block(1, &vec![0xBBu8; 128]).unwrap();
        // third distinct block forces out the LRU frame (block 0)
        cache.write_block(2, &vec![0xCCu8; 128]).unwrap();

        assert_eq!(cache.stats().disk_writes, 1);

        // re-reading block 0 must come back from disk with its data
        let mut buf = vec![0u8; 128];
        cache.read_block(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn lru_prefers_recently_used_frames() {
        let (_dir, mut cache) = create_cache(8, 2);
        let mut buf = vec![0u8; 128];

        cache.read_block(0, &mut buf).unwrap();
        cache.read_block(1, &mut buf).unwrap();
        // touch 0 so that 1 is the eviction victim
        cache.read_block(0, &mut buf).unwrap();
        cache.read_block(2, &mut buf).unwrap();

        let disk_reads = cache.stats().disk_reads;
        cache.read_block(0, &mut buf).unwrap();
        assert_eq!(cache.stats().disk_reads, disk_reads, "block 0 stayed hot");

        cache.read_block(1, &mut buf).unwrap();
        assert_eq!(cache.stats().disk_reads, disk_reads + 1, "block 1 was evicted");
    }

    #[test]
    fn notifications_only_touch_counters() {
        let (_dir, mut cache) = create_cache(8, 2);

        cache.write_block(5, &vec![0x55u8; 128]).unwrap();
        cache.notify_allocate_block(5);
        cache.notify_deallocate_block(5);

        assert_eq!(cache.stats().allocations, 1);
        assert_eq!(cache.stats().deallocations, 1);

        let mut buf = vec![0u8; 128];
        cache.read_block(5, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x55));
    }

    #[test]
    fn clock_advances_monotonically() {
        let (_dir, mut cache) = create_cache(8, 4);
        let mut buf = vec![0u8; 128];

        let start = cache.stats().clock;
        cache.read_block(0, &mut buf).unwrap();
        cache.write_block(1, &vec![0u8; 128]).unwrap();
        assert_eq!(cache.stats().clock, start + 2);
    }
}
