//! # Tree Core
//!
//! `BTreeIndex` ties the node codec to a [`BlockStore`]: it owns the
//! in-memory copy of the superblock header and nothing else. Every
//! operation reads the blocks it needs, mutates private copies, and
//! writes them back before returning.
//!
//! ## Insert
//!
//! Insertion descends recursively; the helper reports one of two
//! outcomes to its caller. `Clean` means the subtree absorbed the entry.
//! `Split` carries the freshly allocated block holding the lower half of
//! a split node together with the promoted key that bounds it; the
//! parent installs both in the vacated slot so the shifted old separator
//! still bounds the original (upper) block. A leaf promotes a copy of
//! the lower half's maximum; a routing node promotes its middle key,
//! which is removed from both halves. When the outcome reaches the top
//! the root itself has split and a new root block is allocated: one key,
//! two children, and the superblock's root pointer moves last. That is
//! the only way the tree grows in height.
//!
//! ## Delete
//!
//! Deletion is the mirror image: the helper reports whether the child
//! fell below the half-full threshold, and the parent restores the
//! invariant by borrowing from the left sibling, then the right, then
//! merging with a sibling, pulling separators down where the routing
//! layout demands it. Underflow propagates upward exactly like splits; a
//! routing root left with no keys collapses into its only child and the
//! tree shrinks in height.
//!
//! ## Allocator
//!
//! Free blocks form a LIFO chain threaded through their headers, rooted
//! at the superblock. `allocate_block` pops the head; `deallocate_block`
//! pushes. Freshly freed blocks are reused first, while they are still
//! resident in the cache. Both paths persist the superblock and notify
//! the store.

use tracing::{debug, trace};

use crate::config::{BLOCK_PTR_SIZE, MAX_TREE_DEPTH, MIN_STORE_BLOCKS, NODE_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::index::node::{
    leaf_capacity_for, routing_capacity_for, BlockKind, Node, NodeHeader, SearchResult,
};
use crate::storage::BlockStore;

/// Outcome of the recursive insert helper. Never visible to callers of
/// the facade; a split that reaches the top is absorbed by root growth.
#[derive(Debug)]
enum InsertOutcome {
    Clean,
    Split { new_block: u64, promoted: Vec<u8> },
}

pub struct BTreeIndex<'s, S: BlockStore> {
    store: &'s mut S,
    superblock: NodeHeader,
}

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Formats the store as a fresh index: superblock at block 0, an
    /// empty leaf root at block 1, and every remaining block chained
    /// into the free list.
    pub fn create(
        store: &'s mut S,
        init_block: u64,
        key_size: u32,
        value_size: u32,
    ) -> Result<Self> {
        if init_block != 0 {
            return Err(Error::InvalidArgument(format!(
                "superblock must reside at block 0, not {}",
                init_block
            )));
        }
        if key_size == 0 || value_size == 0 {
            return Err(Error::InvalidArgument(
                "key and value widths must be nonzero".into(),
            ));
        }

        let block_size = store.block_size();
        let num_blocks = store.num_blocks();
        if num_blocks < MIN_STORE_BLOCKS {
            return Err(Error::InvalidArgument(format!(
                "store has {} blocks but an index needs at least {}",
                num_blocks, MIN_STORE_BLOCKS
            )));
        }
        if block_size <= NODE_HEADER_SIZE + BLOCK_PTR_SIZE {
            return Err(Error::InvalidArgument(format!(
                "block size {} cannot hold a node header",
                block_size
            )));
        }

        let leaf_cap = leaf_capacity_for(block_size, key_size as usize, value_size as usize);
        let routing_cap = routing_capacity_for(block_size, key_size as usize);
        if leaf_cap < 2 || routing_cap < 2 {
            return Err(Error::InvalidArgument(format!(
                "block size {} too small for {}-byte keys and {}-byte values",
                block_size, key_size, value_size
            )));
        }

        let mut superblock =
            NodeHeader::new(BlockKind::Superblock, key_size, value_size, block_size as u32);
        superblock.set_root_block(1);
        superblock.set_free_head(if num_blocks > 2 { 2 } else { 0 });

        let mut index = Self { store, superblock };

        let root = index.new_node(BlockKind::Leaf);
        index.write_node(1, &root)?;

        for i in 2..num_blocks {
            let mut free = index.new_node(BlockKind::Unallocated);
            free.header_mut()
                .set_free_head(if i + 1 == num_blocks { 0 } else { i + 1 });
            index.write_node(i, &free)?;
        }

        index.write_superblock()?;
        index.store.notify_allocate_block(0);
        index.store.notify_allocate_block(1);

        debug!(num_blocks, key_size, value_size, block_size, "created index");
        Ok(index)
    }

    /// Mounts an existing index by reading and validating the
    /// superblock.
    pub fn attach(store: &'s mut S, init_block: u64) -> Result<Self> {
        if init_block != 0 {
            return Err(Error::InvalidArgument(format!(
                "superblock must reside at block 0, not {}",
                init_block
            )));
        }

        let block_size = store.block_size();
        let num_blocks = store.num_blocks();

        let mut buf = vec![0u8; block_size];
        store.read_block(0, &mut buf)?;
        let node = Node::decode(buf)
            .map_err(|e| Error::Corrupt(format!("superblock unreadable: {}", e)))?;

        if node.kind() != BlockKind::Superblock {
            return Err(Error::Corrupt(format!(
                "block 0 is a {:?} block, not a superblock",
                node.kind()
            )));
        }

        let superblock = *node.header();
        if superblock.root_block() == 0 || superblock.root_block() >= num_blocks {
            return Err(Error::Corrupt(format!(
                "superblock names root block {} in a {}-block store",
                superblock.root_block(),
                num_blocks
            )));
        }

        debug!(
            root = superblock.root_block(),
            free_head = superblock.free_head(),
            "attached index"
        );
        Ok(Self { store, superblock })
    }

    /// Writes the in-memory superblock back to the store.
    pub fn detach(&mut self) -> Result<()> {
        self.write_superblock()?;
        debug!(root = self.superblock.root_block(), "detached index");
        Ok(())
    }

    pub fn key_size(&self) -> usize {
        self.superblock.key_size() as usize
    }

    pub fn value_size(&self) -> usize {
        self.superblock.value_size() as usize
    }

    fn block_size(&self) -> usize {
        self.superblock.block_size() as usize
    }

    pub(crate) fn root_block(&self) -> u64 {
        self.superblock.root_block()
    }

    fn new_node(&self, kind: BlockKind) -> Node {
        Node::new(
            kind,
            self.superblock.key_size(),
            self.superblock.value_size(),
            self.superblock.block_size(),
        )
    }

    pub(crate) fn read_node(&mut self, block: u64) -> Result<Node> {
        let mut buf = vec![0u8; self.block_size()];
        self.store.read_block(block, &mut buf)?;
        Node::decode(buf).map_err(|e| match e {
            Error::Corrupt(msg) => Error::Corrupt(format!("block {}: {}", block, msg)),
            other => other,
        })
    }

    fn write_node(&mut self, block: u64, node: &Node) -> Result<()> {
        self.store.write_block(block, node.as_bytes())
    }

    fn write_superblock(&mut self) -> Result<()> {
        let mut node = self.new_node(BlockKind::Superblock);
        *node.header_mut() = self.superblock;
        self.store.write_block(0, node.as_bytes())
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_size() {
            return Err(Error::InvalidArgument(format!(
                "key length {} does not match index key width {}",
                key.len(),
                self.key_size()
            )));
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() != self.value_size() {
            return Err(Error::InvalidArgument(format!(
                "value length {} does not match index value width {}",
                value.len(),
                self.value_size()
            )));
        }
        Ok(())
    }

    // ---- allocator -------------------------------------------------

    fn allocate_block(&mut self) -> Result<u64> {
        let head = self.superblock.free_head();
        if head == 0 {
            return Err(Error::NoSpace);
        }

        let node = self.read_node(head)?;
        if node.kind() != BlockKind::Unallocated {
            return Err(Error::Corrupt(format!(
                "free list head {} is a {:?} block",
                head,
                node.kind()
            )));
        }

        self.superblock.set_free_head(node.header().free_head());
        self.write_superblock()?;
        self.store.notify_allocate_block(head);
        trace!(block = head, "allocated block");
        Ok(head)
    }

    fn deallocate_block(&mut self, block: u64) -> Result<()> {
        let mut node = self.read_node(block)?;
        if node.kind() == BlockKind::Unallocated {
            return Err(Error::Insane(format!("double free of block {}", block)));
        }

        node.set_kind(BlockKind::Unallocated);
        node.header_mut().set_free_head(self.superblock.free_head());
        node.header_mut().set_num_keys(0);
        self.write_node(block, &node)?;

        self.superblock.set_free_head(block);
        self.write_superblock()?;
        self.store.notify_deallocate_block(block);
        trace!(block, "deallocated block");
        Ok(())
    }

    // ---- lookup / update -------------------------------------------

    pub fn lookup(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;

        let mut current = self.root_block();
        for _ in 0..MAX_TREE_DEPTH {
            let node = self.read_node(current)?;
            match node.kind() {
                BlockKind::Leaf => {
                    return match node.find_key(key)? {
                        SearchResult::Found(slot) => Ok(node.value_at(slot)?.to_vec()),
                        SearchResult::NotFound(_) => Err(Error::NotFound),
                    };
                }
                kind if kind.is_routing() => {
                    if node.num_keys() == 0 {
                        return Err(Error::NotFound);
                    }
                    current = node.route(key)?.1;
                }
                other => {
                    return Err(Error::Corrupt(format!(
                        "unexpected {:?} block {} during lookup",
                        other, current
                    )));
                }
            }
        }
        Err(Error::Insane("descent exceeded maximum tree depth".into()))
    }

    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let mut current = self.root_block();
        for _ in 0..MAX_TREE_DEPTH {
            let mut node = self.read_node(current)?;
            match node.kind() {
                BlockKind::Leaf => {
                    return match node.find_key(key)? {
                        SearchResult::Found(slot) => {
                            node.set_value_at(slot, value)?;
                            self.write_node(current, &node)
                        }
                        SearchResult::NotFound(_) => Err(Error::NotFound),
                    };
                }
                kind if kind.is_routing() => {
                    if node.num_keys() == 0 {
                        return Err(Error::NotFound);
                    }
                    current = node.route(key)?.1;
                }
                other => {
                    return Err(Error::Corrupt(format!(
                        "unexpected {:?} block {} during update",
                        other, current
                    )));
                }
            }
        }
        Err(Error::Insane("descent exceeded maximum tree depth".into()))
    }

    // ---- insert ----------------------------------------------------

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        let root = self.root_block();
        match self.insert_at(root, key, value, 0)? {
            InsertOutcome::Clean => Ok(()),
            InsertOutcome::Split {
                new_block,
                promoted,
            } => self.grow_root(root, new_block, &promoted),
        }
    }

    fn insert_at(&mut self, block: u64, key: &[u8], value: &[u8], depth: usize) -> Result<InsertOutcome> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("descent exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        match node.kind() {
            BlockKind::Leaf => self.insert_into_leaf(block, node, key, value),
            kind if kind.is_routing() => {
                if node.num_keys() == 0 {
                    return Err(Error::Insane(format!("routing block {} has no keys", block)));
                }
                let (slot, child) = node.route(key)?;
                match self.insert_at(child, key, value, depth + 1)? {
                    InsertOutcome::Clean => Ok(InsertOutcome::Clean),
                    InsertOutcome::Split {
                        new_block,
                        promoted,
                    } => self.install_split(block, node, slot, new_block, &promoted),
                }
            }
            other => Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during insert",
                other, block
            ))),
        }
    }

    fn insert_into_leaf(
        &mut self,
        block: u64,
        mut node: Node,
        key: &[u8],
        value: &[u8],
    ) -> Result<InsertOutcome> {
        let slot = match node.find_key(key)? {
            SearchResult::Found(_) => return Err(Error::DuplicateKey),
            SearchResult::NotFound(slot) => slot,
        };

        if node.num_keys() < node.capacity() {
            node.insert_entry_at(slot, key, value)?;
            self.write_node(block, &node)?;
            return Ok(InsertOutcome::Clean);
        }

        self.split_leaf(block, node, slot, key, value)
    }

    /// Splits a full leaf around one incoming entry. The original block
    /// keeps the upper half; the lower half moves to a fresh block and
    /// its maximum key is promoted (copied, not removed).
    fn split_leaf(
        &mut self,
        block: u64,
        node: Node,
        slot: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<InsertOutcome> {
        let count = node.num_keys();
        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(count + 1);
        let mut values: Vec<Vec<u8>> = Vec::with_capacity(count + 1);
        for i in 0..count {
            let (k, v) = node.entry_at(i)?;
            keys.push(k.to_vec());
            values.push(v.to_vec());
        }
        keys.insert(slot, key.to_vec());
        values.insert(slot, value.to_vec());

        let total = keys.len();
        let lower_len = total - total / 2;

        let new_block = self.allocate_block()?;

        let mut lower = self.new_node(BlockKind::Leaf);
        for i in 0..lower_len {
            lower.push_entry(&keys[i], &values[i])?;
        }
        let mut upper = self.new_node(BlockKind::Leaf);
        for i in lower_len..total {
            upper.push_entry(&keys[i], &values[i])?;
        }

        self.write_node(new_block, &lower)?;
        self.write_node(block, &upper)?;

        trace!(block, new_block, "split leaf");
        Ok(InsertOutcome::Split {
            new_block,
            promoted: keys[lower_len - 1].clone(),
        })
    }

    /// Installs a child split into a routing node, splitting the routing
    /// node in turn when it is already full.
    fn install_split(
        &mut self,
        block: u64,
        mut node: Node,
        slot: usize,
        new_block: u64,
        promoted: &[u8],
    ) -> Result<InsertOutcome> {
        if node.num_keys() < node.capacity() {
            node.insert_routing_at(slot, promoted, new_block)?;
            self.write_node(block, &node)?;
            return Ok(InsertOutcome::Clean);
        }

        self.split_routing(block, node, slot, new_block, promoted)
    }

    /// Splits a full routing node. The middle key is promoted and
    /// removed from both halves; the lower keys and their pointers move
    /// to a fresh block, the upper stay in the original. Both halves are
    /// interior afterwards - if the split node was the root, the caller
    /// grows a new root above them.
    fn split_routing(
        &mut self,
        block: u64,
        node: Node,
        slot: usize,
        child_block: u64,
        promoted_in: &[u8],
    ) -> Result<InsertOutcome> {
        let count = node.num_keys();
        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(count + 1);
        let mut ptrs: Vec<u64> = Vec::with_capacity(count + 2);
        for i in 0..count {
            keys.push(node.key_at(i)?.to_vec());
        }
        for i in 0..=count {
            ptrs.push(node.ptr_at(i)?);
        }
        keys.insert(slot, promoted_in.to_vec());
        ptrs.insert(slot, child_block);

        let total = keys.len();
        let mid = total / 2;

        let new_block = self.allocate_block()?;

        let mut lower = self.new_node(BlockKind::Interior);
        lower.set_num_keys(mid);
        for i in 0..mid {
            lower.set_key_at(i, &keys[i])?;
            lower.set_ptr_at(i, ptrs[i])?;
        }
        lower.set_ptr_at(mid, ptrs[mid])?;

        let upper_len = total - mid - 1;
        let mut upper = self.new_node(BlockKind::Interior);
        upper.set_num_keys(upper_len);
        for i in 0..upper_len {
            upper.set_key_at(i, &keys[mid + 1 + i])?;
            upper.set_ptr_at(i, ptrs[mid + 1 + i])?;
        }
        upper.set_ptr_at(upper_len, ptrs[total])?;

        self.write_node(new_block, &lower)?;
        self.write_node(block, &upper)?;

        trace!(block, new_block, "split routing node");
        Ok(InsertOutcome::Split {
            new_block,
            promoted: keys[mid].clone(),
        })
    }

    /// Grows the tree by one level after a root split. This is the only
    /// mechanism by which tree height increases.
    fn grow_root(&mut self, old_root: u64, lower: u64, promoted: &[u8]) -> Result<()> {
        let new_root = self.allocate_block()?;

        let mut root = self.new_node(BlockKind::Root);
        root.set_num_keys(1);
        root.set_key_at(0, promoted)?;
        root.set_ptr_at(0, lower)?;
        root.set_ptr_at(1, old_root)?;
        self.write_node(new_root, &root)?;

        self.superblock.set_root_block(new_root);
        self.write_superblock()?;

        debug!(old_root, new_root, "tree height grew");
        Ok(())
    }

    // ---- delete ----------------------------------------------------

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;

        let root = self.root_block();
        self.delete_at(root, key, 0)?;

        // a routing root left with a single child collapses into it
        let node = self.read_node(root)?;
        if node.kind().is_routing() && node.num_keys() == 0 {
            let child_block = node.ptr_at(0)?;
            let mut child = self.read_node(child_block)?;
            if child.kind() == BlockKind::Interior {
                child.set_kind(BlockKind::Root);
                self.write_node(child_block, &child)?;
            }
            self.superblock.set_root_block(child_block);
            self.write_superblock()?;
            self.deallocate_block(root)?;
            debug!(old_root = root, new_root = child_block, "tree height shrank");
        }
        Ok(())
    }

    /// Recursive delete helper; returns whether the node at `block` is
    /// now below the half-full threshold. The caller rebalances - the
    /// top-level caller ignores the signal, since the root is exempt.
    fn delete_at(&mut self, block: u64, key: &[u8], depth: usize) -> Result<bool> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("descent exceeded maximum tree depth".into()));
        }

        let mut node = self.read_node(block)?;
        match node.kind() {
            BlockKind::Leaf => match node.find_key(key)? {
                SearchResult::NotFound(_) => Err(Error::NotFound),
                SearchResult::Found(slot) => {
                    node.remove_entry_at(slot)?;
                    self.write_node(block, &node)?;
                    Ok(node.num_keys() < node.min_keys())
                }
            },
            kind if kind.is_routing() => {
                if node.num_keys() == 0 {
                    return Err(Error::NotFound);
                }
                let (slot, child) = node.route(key)?;
                if !self.delete_at(child, key, depth + 1)? {
                    return Ok(false);
                }
                self.rebalance_child(block, slot)?;
                let node = self.read_node(block)?;
                Ok(node.num_keys() < node.min_keys())
            }
            other => Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during delete",
                other, block
            ))),
        }
    }

    /// Restores the half-full invariant for the child at `slot`: borrow
    /// from the left sibling, else from the right, else merge.
    fn rebalance_child(&mut self, parent_block: u64, slot: usize) -> Result<()> {
        let parent = self.read_node(parent_block)?;
        let separators = parent.num_keys();
        let child_block = parent.ptr_at(slot)?;
        let child = self.read_node(child_block)?;
        let min = child.min_keys();

        if slot > 0 {
            let left_block = parent.ptr_at(slot - 1)?;
            let left = self.read_node(left_block)?;
            if left.kind() != child.kind() {
                return Err(Error::Insane(format!(
                    "siblings {} and {} disagree on kind",
                    left_block, child_block
                )));
            }
            if left.num_keys() > min {
                return self.borrow_from_left(
                    parent_block,
                    parent,
                    slot,
                    left_block,
                    left,
                    child_block,
                    child,
                );
            }
        }

        if slot < separators {
            let right_block = parent.ptr_at(slot + 1)?;
            let right = self.read_node(right_block)?;
            if right.kind() != child.kind() {
                return Err(Error::Insane(format!(
                    "siblings {} and {} disagree on kind",
                    child_block, right_block
                )));
            }
            if right.num_keys() > min {
                return self.borrow_from_right(
                    parent_block,
                    parent,
                    slot,
                    child_block,
                    child,
                    right_block,
                    right,
                );
            }
        }

        if slot > 0 {
            self.merge_siblings(parent_block, parent, slot - 1)
        } else {
            self.merge_siblings(parent_block, parent, slot)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn borrow_from_left(
        &mut self,
        parent_block: u64,
        mut parent: Node,
        slot: usize,
        left_block: u64,
        mut left: Node,
        child_block: u64,
        mut child: Node,
    ) -> Result<()> {
        let donor_last = left.num_keys() - 1;

        if child.kind() == BlockKind::Leaf {
            let (k, v) = {
                let (k, v) = left.entry_at(donor_last)?;
                (k.to_vec(), v.to_vec())
            };
            left.remove_entry_at(donor_last)?;
            child.insert_entry_at(0, &k, &v)?;
            let new_separator = left.key_at(left.num_keys() - 1)?.to_vec();
            parent.set_key_at(slot - 1, &new_separator)?;
        } else {
            let separator = parent.key_at(slot - 1)?.to_vec();
            let moved_ptr = left.ptr_at(left.num_keys())?;
            let new_separator = left.key_at(donor_last)?.to_vec();
            left.set_num_keys(donor_last); // drops the last key and pointer
            child.insert_routing_at(0, &separator, moved_ptr)?;
            parent.set_key_at(slot - 1, &new_separator)?;
        }

        self.write_node(left_block, &left)?;
        self.write_node(child_block, &child)?;
        self.write_node(parent_block, &parent)?;
        trace!(child = child_block, donor = left_block, "borrowed from left sibling");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn borrow_from_right(
        &mut self,
        parent_block: u64,
        mut parent: Node,
        slot: usize,
        child_block: u64,
        mut child: Node,
        right_block: u64,
        mut right: Node,
    ) -> Result<()> {
        if child.kind() == BlockKind::Leaf {
            let (k, v) = {
                let (k, v) = right.entry_at(0)?;
                (k.to_vec(), v.to_vec())
            };
            right.remove_entry_at(0)?;
            child.push_entry(&k, &v)?;
            parent.set_key_at(slot, &k)?;
        } else {
            let separator = parent.key_at(slot)?.to_vec();
            let moved_ptr = right.ptr_at(0)?;
            let new_separator = right.key_at(0)?.to_vec();
            right.remove_first_routing()?;
            let base = child.num_keys();
            child.set_num_keys(base + 1);
            child.set_key_at(base, &separator)?;
            child.set_ptr_at(base + 1, moved_ptr)?;
            parent.set_key_at(slot, &new_separator)?;
        }

        self.write_node(right_block, &right)?;
        self.write_node(child_block, &child)?;
        self.write_node(parent_block, &parent)?;
        trace!(child = child_block, donor = right_block, "borrowed from right sibling");
        Ok(())
    }

    /// Merges the child at `separator_slot + 1` into the child at
    /// `separator_slot` and drops the separator between them. Leaf
    /// separators are copies and simply disappear; a routing merge pulls
    /// the separator down between the two pointer runs.
    fn merge_siblings(
        &mut self,
        parent_block: u64,
        mut parent: Node,
        separator_slot: usize,
    ) -> Result<()> {
        let dst_block = parent.ptr_at(separator_slot)?;
        let src_block = parent.ptr_at(separator_slot + 1)?;
        let mut dst = self.read_node(dst_block)?;
        let src = self.read_node(src_block)?;

        if dst.kind() == BlockKind::Leaf {
            for i in 0..src.num_keys() {
                let (k, v) = src.entry_at(i)?;
                dst.push_entry(k, v)?;
            }
        } else {
            let separator = parent.key_at(separator_slot)?.to_vec();
            let base = dst.num_keys();
            let moved = src.num_keys();
            dst.set_num_keys(base + 1 + moved);
            dst.set_key_at(base, &separator)?;
            for i in 0..moved {
                dst.set_key_at(base + 1 + i, src.key_at(i)?)?;
            }
            for i in 0..=moved {
                dst.set_ptr_at(base + 1 + i, src.ptr_at(i)?)?;
            }
        }

        parent.remove_routing_at(separator_slot)?;

        self.write_node(dst_block, &dst)?;
        self.write_node(parent_block, &parent)?;
        self.deallocate_block(src_block)?;

        trace!(kept = dst_block, drained = src_block, "merged siblings");
        Ok(())
    }
}
