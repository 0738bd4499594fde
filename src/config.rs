//! # Configuration Constants
//!
//! Centralizes the tunable values for the block store, the buffer cache,
//! and the on-disk node format. Interdependent values are documented next
//! to each other and checked at compile time where possible.

/// On-disk width of the common node header, in bytes.
///
/// Every block begins with this header regardless of kind. The value is
/// pinned by a compile-time assertion against the `NodeHeader` struct in
/// `index::node`.
pub const NODE_HEADER_SIZE: usize = 40;

/// On-disk width of a block pointer, in bytes. Block numbers are stored
/// as little-endian `u64`.
pub const BLOCK_PTR_SIZE: usize = 8;

/// Block size used by the CLI drivers. The library accepts any block size
/// large enough to hold at least two keys per node kind.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// A store needs at least a superblock and a root block.
pub const MIN_STORE_BLOCKS: u64 = 2;

/// Frame count used by the buffer cache when the caller asks for fewer.
/// One frame is enough for correctness; it just thrashes.
pub const MIN_CACHE_BLOCKS: usize = 1;

/// Default frame count for the CLI drivers when none is given.
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Upper bound on tree height accepted during descent and traversal.
/// A well-formed tree never gets close (height is logarithmic in the
/// block count); exceeding this indicates a pointer cycle on disk.
pub const MAX_TREE_DEPTH: usize = 64;

const _: () = assert!(NODE_HEADER_SIZE + BLOCK_PTR_SIZE < DEFAULT_BLOCK_SIZE);
const _: () = assert!(MIN_CACHE_BLOCKS <= DEFAULT_CACHE_BLOCKS);
