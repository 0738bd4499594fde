//! # blocktree - Disk-Backed B+Tree Index
//!
//! blocktree is a single-threaded, ordered, block-oriented index mapping
//! fixed-width keys to fixed-width values. The tree is persisted as a
//! sequence of fixed-size blocks accessed through a write-back buffer
//! cache, and supports point lookup, in-place update, insert, delete,
//! ordered range scan, and a structural self-check.
//!
//! ## Quick Start
//!
//! ```ignore
//! use blocktree::{BTreeIndex, BufferCache, DiskSystem};
//!
//! let disk = DiskSystem::create("./users.btree", 1024, 256)?;
//! let mut cache = BufferCache::new(disk, 64);
//!
//! let mut index = BTreeIndex::create(&mut cache, 0, 8, 8)?;
//! index.insert(b"key00001", b"val00001")?;
//! let value = index.lookup(b"key00001")?;
//! index.detach()?;
//! cache.flush()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------+
//! |     Index facade (BTreeIndex)       |
//! |  attach / lookup / insert / delete  |
//! +-------------------------------------+
//! |  Node codec (header + slot arrays)  |
//! +-------------------------------------+
//! |  Block allocator (on-disk freelist) |
//! +-------------------------------------+
//! |  Buffer cache (write-back LRU)      |
//! +-------------------------------------+
//! |  Disk system (fixed-size blocks)    |
//! +-------------------------------------+
//! ```
//!
//! ## On-Disk Layout
//!
//! Block 0 is the superblock: it carries the index geometry (key width,
//! value width, block size), the root block number, and the head of the
//! free list. Block 1 is the initial root. All remaining blocks start out
//! chained into a singly-linked free list threaded through the header of
//! each unallocated block. Freed blocks are pushed back onto the head of
//! the list, so recently used blocks are recycled first while they are
//! still cache-resident.
//!
//! All multi-byte on-disk integers are little-endian with fixed widths.
//!
//! ## Concurrency
//!
//! The core is deliberately single-threaded: every operation is a
//! blocking call that reads, mutates, and writes back whole blocks
//! through the cache, and no node is retained in memory across
//! operations. Callers needing concurrent access must serialize
//! externally.
//!
//! ## Module Overview
//!
//! - [`storage`]: block device, write-back buffer cache, `BlockStore` trait
//! - [`index`]: node codec, tree mutation, traversal, display
//! - [`config`]: centralized constants
//! - [`cli`]: shared plumbing for the `btree_*` driver binaries

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod storage;

pub use error::{Error, Result};
pub use index::{BTreeIndex, DisplayMode};
pub use storage::{BlockStore, BufferCache, CacheStats, DiskSystem};
