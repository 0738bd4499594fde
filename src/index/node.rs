//! # Node Codec
//!
//! Every block starts with the 40-byte [`NodeHeader`]; the rest of the
//! block is the node body, whose layout depends on the block kind:
//!
//! ```text
//! Routing (root / interior), n = num_keys:
//! +--------+----+----+----+----+-----+--------+----+
//! | header | P0 | K0 | P1 | K1 | ... | K(n-1) | Pn |
//! +--------+----+----+----+----+-----+--------+----+
//!
//! Leaf, n = num_keys:
//! +--------+----+----+----+----+-----+--------+--------+
//! | header | K0 | V0 | K1 | V1 | ... | K(n-1) | V(n-1) |
//! +--------+----+----+----+----+-----+--------+--------+
//! ```
//!
//! All keys within a node are strictly ascending. In a routing node every
//! key in the subtree at `Pi` is `<= Ki`, and every key in the subtree at
//! `Pn` is greater than the last routing key. Keys, values, and pointers
//! are fixed-width, so slot offsets are plain arithmetic on the geometry
//! stored in the header.
//!
//! ## Capacity
//!
//! ```text
//! routing capacity = (block_size - header - ptr) / (ptr + key_size)
//! leaf capacity    = (block_size - header - ptr) / (key_size + value_size)
//! ```
//!
//! ## Contract
//!
//! `decode` accepts any well-formed block of a known kind and reports an
//! unknown kind tag or an inconsistent header as `Corrupt`. Out-of-range
//! slot access is a programmer error and is reported as `Insane`, never
//! silently clamped. The codec enforces no structural invariants beyond
//! the layout itself; ordering and occupancy are the tree's business.

use std::mem::size_of;

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{BLOCK_PTR_SIZE, NODE_HEADER_SIZE};
use crate::error::{Error, Result};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Unallocated = 0x00,
    Superblock = 0x01,
    Root = 0x02,
    Interior = 0x03,
    Leaf = 0x04,
}

impl BlockKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(BlockKind::Unallocated),
            0x01 => Some(BlockKind::Superblock),
            0x02 => Some(BlockKind::Root),
            0x03 => Some(BlockKind::Interior),
            0x04 => Some(BlockKind::Leaf),
            _ => None,
        }
    }

    /// Root and interior nodes share the routing layout.
    pub fn is_routing(self) -> bool {
        matches!(self, BlockKind::Root | BlockKind::Interior)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    kind: u8,
    reserved: [u8; 3],
    key_size: U32,
    value_size: U32,
    block_size: U32,
    root_block: U64,
    free_head: U64,
    num_keys: U64,
}

const _: () = assert!(size_of::<NodeHeader>() == NODE_HEADER_SIZE);

impl NodeHeader {
    pub fn new(kind: BlockKind, key_size: u32, value_size: u32, block_size: u32) -> Self {
        Self {
            kind: kind as u8,
            reserved: [0; 3],
            key_size: U32::new(key_size),
            value_size: U32::new(value_size),
            block_size: U32::new(block_size),
            root_block: U64::new(0),
            free_head: U64::new(0),
            num_keys: U64::new(0),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < NODE_HEADER_SIZE {
            return Err(Error::Corrupt(format!(
                "buffer too small for NodeHeader: {} < {}",
                data.len(),
                NODE_HEADER_SIZE
            )));
        }
        Self::ref_from_bytes(&data[..NODE_HEADER_SIZE])
            .map_err(|e| Error::Corrupt(format!("failed to read NodeHeader: {:?}", e)))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        if data.len() < NODE_HEADER_SIZE {
            return Err(Error::Corrupt(format!(
                "buffer too small for NodeHeader: {} < {}",
                data.len(),
                NODE_HEADER_SIZE
            )));
        }
        Self::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| Error::Corrupt(format!("failed to read NodeHeader: {:?}", e)))
    }

    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_byte(self.kind)
    }

    pub fn set_kind(&mut self, kind: BlockKind) {
        self.kind = kind as u8;
    }

    pub fn key_size(&self) -> u32 {
        self.key_size.get()
    }

    pub fn value_size(&self) -> u32 {
        self.value_size.get()
    }

    pub fn block_size(&self) -> u32 {
        self.block_size.get()
    }

    pub fn root_block(&self) -> u64 {
        self.root_block.get()
    }

    pub fn set_root_block(&mut self, block: u64) {
        self.root_block = U64::new(block);
    }

    pub fn free_head(&self) -> u64 {
        self.free_head.get()
    }

    pub fn set_free_head(&mut self, block: u64) {
        self.free_head = U64::new(block);
    }

    pub fn num_keys(&self) -> u64 {
        self.num_keys.get()
    }

    pub fn set_num_keys(&mut self, n: u64) {
        self.num_keys = U64::new(n);
    }
}

pub fn routing_capacity_for(block_size: usize, key_size: usize) -> usize {
    block_size.saturating_sub(NODE_HEADER_SIZE + BLOCK_PTR_SIZE) / (BLOCK_PTR_SIZE + key_size)
}

pub fn leaf_capacity_for(block_size: usize, key_size: usize, value_size: usize) -> usize {
    block_size.saturating_sub(NODE_HEADER_SIZE + BLOCK_PTR_SIZE) / (key_size + value_size)
}

/// Outcome of a key search within a leaf: the slot holding the key, or
/// the slot where it would be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(usize),
    NotFound(usize),
}

/// An owned, decoded block buffer with typed slot accessors.
#[derive(Debug, Clone)]
pub struct Node {
    buf: Vec<u8>,
}

impl Node {
    pub fn new(kind: BlockKind, key_size: u32, value_size: u32, block_size: u32) -> Self {
        let mut buf = vec![0u8; block_size as usize];
        let header = NodeHeader::new(kind, key_size, value_size, block_size);
        buf[..NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        Self { buf }
    }

    /// Decodes a block buffer, validating the kind tag and the header
    /// geometry against the buffer itself.
    pub fn decode(buf: Vec<u8>) -> Result<Self> {
        let header = NodeHeader::from_bytes(&buf)?;

        let Some(kind) = header.kind() else {
            return Err(Error::Corrupt(format!(
                "unknown block kind tag {:#04x}",
                buf[0]
            )));
        };

        if header.block_size() as usize != buf.len() {
            return Err(Error::Corrupt(format!(
                "header block size {} does not match block length {}",
                header.block_size(),
                buf.len()
            )));
        }

        match kind {
            BlockKind::Unallocated => {}
            BlockKind::Superblock | BlockKind::Root | BlockKind::Interior | BlockKind::Leaf => {
                if header.key_size() == 0 || header.value_size() == 0 {
                    return Err(Error::Corrupt(format!(
                        "{:?} block with zero key or value width",
                        kind
                    )));
                }
            }
        }

        let node = Self { buf };
        if kind.is_routing() || kind == BlockKind::Leaf {
            let cap = node.capacity();
            if node.num_keys() as usize > cap {
                return Err(Error::Corrupt(format!(
                    "{:?} block claims {} keys but capacity is {}",
                    kind,
                    node.num_keys(),
                    cap
                )));
            }
        }
        Ok(node)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(&self.buf).expect("node buffer holds a validated header")
    }

    pub fn header_mut(&mut self) -> &mut NodeHeader {
        NodeHeader::from_bytes_mut(&mut self.buf).expect("node buffer holds a validated header")
    }

    pub fn kind(&self) -> BlockKind {
        self.header()
            .kind()
            .expect("node kind was validated on decode")
    }

    pub fn set_kind(&mut self, kind: BlockKind) {
        self.header_mut().set_kind(kind);
    }

    pub fn key_size(&self) -> usize {
        self.header().key_size() as usize
    }

    pub fn value_size(&self) -> usize {
        self.header().value_size() as usize
    }

    pub fn num_keys(&self) -> usize {
        self.header().num_keys() as usize
    }

    pub fn set_num_keys(&mut self, n: usize) {
        self.header_mut().set_num_keys(n as u64);
    }

    /// Maximum key count for this node's kind and geometry.
    pub fn capacity(&self) -> usize {
        if self.kind() == BlockKind::Leaf {
            leaf_capacity_for(self.buf.len(), self.key_size(), self.value_size())
        } else {
            routing_capacity_for(self.buf.len(), self.key_size())
        }
    }

    /// Half-full threshold: the fewest keys a non-root node of this kind
    /// may hold at rest.
    pub fn min_keys(&self) -> usize {
        let cap = self.capacity();
        (cap + 2) / 2 - 1
    }

    fn slot_check(&self, what: &str, index: usize, limit: usize) -> Result<()> {
        if index >= limit {
            return Err(Error::Insane(format!(
                "{} slot {} out of range ({} keys in {:?} node)",
                what,
                index,
                self.num_keys(),
                self.kind()
            )));
        }
        Ok(())
    }

    fn key_offset(&self, index: usize) -> usize {
        if self.kind() == BlockKind::Leaf {
            NODE_HEADER_SIZE + index * (self.key_size() + self.value_size())
        } else {
            NODE_HEADER_SIZE + index * (BLOCK_PTR_SIZE + self.key_size()) + BLOCK_PTR_SIZE
        }
    }

    fn ptr_offset(&self, index: usize) -> usize {
        NODE_HEADER_SIZE + index * (BLOCK_PTR_SIZE + self.key_size())
    }

    fn value_offset(&self, index: usize) -> usize {
        NODE_HEADER_SIZE + index * (self.key_size() + self.value_size()) + self.key_size()
    }

    pub fn key_at(&self, index: usize) -> Result<&[u8]> {
        self.slot_check("key", index, self.num_keys())?;
        let off = self.key_offset(index);
        Ok(&self.buf[off..off + self.key_size()])
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) -> Result<()> {
        self.slot_check("key", index, self.num_keys())?;
        let width = self.key_size();
        if key.len() != width {
            return Err(Error::Insane(format!(
                "key of {} bytes written into {}-byte slot",
                key.len(),
                width
            )));
        }
        let off = self.key_offset(index);
        self.buf[off..off + width].copy_from_slice(key);
        Ok(())
    }

    pub fn ptr_at(&self, index: usize) -> Result<u64> {
        if !self.kind().is_routing() {
            return Err(Error::Insane(format!(
                "pointer access on {:?} node",
                self.kind()
            )));
        }
        self.slot_check("pointer", index, self.num_keys() + 1)?;
        let off = self.ptr_offset(index);
        let bytes: [u8; BLOCK_PTR_SIZE] = self.buf[off..off + BLOCK_PTR_SIZE]
            .try_into()
            .expect("pointer slot is exactly BLOCK_PTR_SIZE bytes");
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn set_ptr_at(&mut self, index: usize, block: u64) -> Result<()> {
        if !self.kind().is_routing() {
            return Err(Error::Insane(format!(
                "pointer access on {:?} node",
                self.kind()
            )));
        }
        self.slot_check("pointer", index, self.num_keys() + 1)?;
        let off = self.ptr_offset(index);
        self.buf[off..off + BLOCK_PTR_SIZE].copy_from_slice(&block.to_le_bytes());
        Ok(())
    }

    pub fn value_at(&self, index: usize) -> Result<&[u8]> {
        self.slot_check("value", index, self.num_keys())?;
        let off = self.value_offset(index);
        Ok(&self.buf[off..off + self.value_size()])
    }

    pub fn set_value_at(&mut self, index: usize, value: &[u8]) -> Result<()> {
        self.slot_check("value", index, self.num_keys())?;
        let width = self.value_size();
        if value.len() != width {
            return Err(Error::Insane(format!(
                "value of {} bytes written into {}-byte slot",
                value.len(),
                width
            )));
        }
        let off = self.value_offset(index);
        self.buf[off..off + width].copy_from_slice(value);
        Ok(())
    }

    pub fn entry_at(&self, index: usize) -> Result<(&[u8], &[u8])> {
        Ok((self.key_at(index)?, self.value_at(index)?))
    }

    /// Locates `key` in a leaf by linear scan; slot counts are small.
    pub fn find_key(&self, key: &[u8]) -> Result<SearchResult> {
        let n = self.num_keys();
        for i in 0..n {
            match self.key_at(i)?.cmp(key) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(SearchResult::Found(i)),
                std::cmp::Ordering::Greater => return Ok(SearchResult::NotFound(i)),
            }
        }
        Ok(SearchResult::NotFound(n))
    }

    /// Picks the child to descend into: the first slot whose routing key
    /// is `>= key`, or the last pointer. Returns `(slot, child_block)`.
    pub fn route(&self, key: &[u8]) -> Result<(usize, u64)> {
        let n = self.num_keys();
        for i in 0..n {
            if key <= self.key_at(i)? {
                return Ok((i, self.ptr_at(i)?));
            }
        }
        Ok((n, self.ptr_at(n)?))
    }

    /// Inserts a leaf entry at `index`, shifting the tail right.
    pub fn insert_entry_at(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<()> {
        let n = self.num_keys();
        if n >= self.capacity() {
            return Err(Error::Insane(format!(
                "leaf entry insert past capacity {}",
                self.capacity()
            )));
        }
        if index > n {
            return Err(Error::Insane(format!(
                "leaf insert slot {} out of range ({} keys)",
                index, n
            )));
        }

        let entry = self.key_size() + self.value_size();
        let start = NODE_HEADER_SIZE + index * entry;
        let end = NODE_HEADER_SIZE + n * entry;
        self.buf.copy_within(start..end, start + entry);

        self.set_num_keys(n + 1);
        self.set_key_at(index, key)?;
        self.set_value_at(index, value)?;
        Ok(())
    }

    /// Appends a leaf entry after the current last slot.
    pub fn push_entry(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let n = self.num_keys();
        self.insert_entry_at(n, key, value)
    }

    /// Removes the leaf entry at `index`, shifting the tail left.
    pub fn remove_entry_at(&mut self, index: usize) -> Result<()> {
        let n = self.num_keys();
        self.slot_check("entry", index, n)?;

        let entry = self.key_size() + self.value_size();
        let start = NODE_HEADER_SIZE + (index + 1) * entry;
        let end = NODE_HEADER_SIZE + n * entry;
        self.buf.copy_within(start..end, start - entry);

        self.set_num_keys(n - 1);
        Ok(())
    }

    /// Installs `(key, left_child)` at routing slot `index`: the pointer
    /// previously at `index` and everything after it shift one slot
    /// right, so the shifted old separator still bounds the old child.
    pub fn insert_routing_at(&mut self, index: usize, key: &[u8], left_child: u64) -> Result<()> {
        let n = self.num_keys();
        if n >= self.capacity() {
            return Err(Error::Insane(format!(
                "routing insert past capacity {}",
                self.capacity()
            )));
        }
        if index > n {
            return Err(Error::Insane(format!(
                "routing insert slot {} out of range ({} keys)",
                index, n
            )));
        }

        let pair = BLOCK_PTR_SIZE + self.key_size();
        let start = self.ptr_offset(index);
        let end = self.ptr_offset(n) + BLOCK_PTR_SIZE;
        self.buf.copy_within(start..end, start + pair);

        self.set_num_keys(n + 1);
        self.set_key_at(index, key)?;
        self.set_ptr_at(index, left_child)?;
        Ok(())
    }

    /// Removes routing key `index` together with the pointer to its
    /// right, shifting the tail left.
    pub fn remove_routing_at(&mut self, index: usize) -> Result<()> {
        let n = self.num_keys();
        self.slot_check("routing key", index, n)?;

        let pair = BLOCK_PTR_SIZE + self.key_size();
        let start = self.key_offset(index) + pair;
        let end = self.ptr_offset(n) + BLOCK_PTR_SIZE;
        self.buf.copy_within(start..end, start - pair);

        self.set_num_keys(n - 1);
        Ok(())
    }

    /// Removes the first routing key together with the pointer to its
    /// left. Used when a right sibling donates its leading child.
    pub fn remove_first_routing(&mut self) -> Result<()> {
        let n = self.num_keys();
        self.slot_check("routing key", 0, n)?;

        let pair = BLOCK_PTR_SIZE + self.key_size();
        let start = self.ptr_offset(1);
        let end = self.ptr_offset(n) + BLOCK_PTR_SIZE;
        self.buf.copy_within(start..end, start - pair);

        self.set_num_keys(n - 1);
        Ok(())
    }
}
