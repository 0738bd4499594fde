//! # Traversal and Structural Self-Check
//!
//! An in-order walk underlies the range query, the sorted display mode,
//! and the ordering half of `sanity_check`. The walk prunes subtrees
//! that cannot intersect the requested closed interval, so a range query
//! touches only the blocks along its boundary paths plus the leaves in
//! range.
//!
//! `sanity_check` verifies the at-rest invariants: the in-order key
//! sequence is strictly ascending (which also implies uniqueness), every
//! leaf sits at the same depth, and every non-root node meets the
//! half-full threshold. The check applies uniformly to all non-root
//! nodes, direct children of the root included.

use crate::config::MAX_TREE_DEPTH;
use crate::error::{Error, Result};
use crate::index::node::BlockKind;
use crate::index::tree::BTreeIndex;
use crate::storage::BlockStore;

impl<S: BlockStore> BTreeIndex<'_, S> {
    /// Returns the values of all entries with `min <= key <= max`, in
    /// ascending key order. Both bounds are inclusive.
    pub fn range_query(&mut self, min: &[u8], max: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.check_key(min)?;
        self.check_key(max)?;

        let mut entries = Vec::new();
        if min <= max {
            let root = self.root_block();
            self.collect_range(root, 0, Some(min), Some(max), &mut entries)?;
        }
        Ok(entries.into_iter().map(|(_, v)| v).collect())
    }

    /// In-order walk over the subtree at `block`, restricted to the
    /// closed interval given by `min`/`max` (`None` means unbounded).
    /// Children whose key range cannot intersect the interval are
    /// skipped entirely.
    pub(crate) fn collect_range(
        &mut self,
        block: u64,
        depth: usize,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("traversal exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        match node.kind() {
            BlockKind::Leaf => {
                for i in 0..node.num_keys() {
                    let (key, value) = node.entry_at(i)?;
                    if min.is_some_and(|m| key < m) {
                        continue;
                    }
                    if max.is_some_and(|m| key > m) {
                        break;
                    }
                    out.push((key.to_vec(), value.to_vec()));
                }
                Ok(())
            }
            kind if kind.is_routing() => {
                let separators = node.num_keys();
                for i in 0..=separators {
                    // subtree i holds keys in (K[i-1], K[i]]
                    if i > 0 {
                        if let Some(m) = max {
                            if node.key_at(i - 1)? >= m {
                                break;
                            }
                        }
                    }
                    if i < separators {
                        if let Some(m) = min {
                            if node.key_at(i)? < m {
                                continue;
                            }
                        }
                    }
                    let child = node.ptr_at(i)?;
                    self.collect_range(child, depth + 1, min, max, out)?;
                }
                Ok(())
            }
            other => Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during traversal",
                other, block
            ))),
        }
    }

    /// Number of node levels from the root down to the leaves. A tree
    /// whose root is the unique leaf has height 1.
    pub fn height(&mut self) -> Result<usize> {
        let root = self.root_block();
        let (_, max_depth) = self.leaf_depth_bounds(root, 0)?;
        Ok(max_depth)
    }

    fn leaf_depth_bounds(&mut self, block: u64, depth: usize) -> Result<(usize, usize)> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("traversal exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        match node.kind() {
            BlockKind::Leaf => Ok((depth + 1, depth + 1)),
            kind if kind.is_routing() => {
                let mut min_depth = usize::MAX;
                let mut max_depth = 0;
                for i in 0..=node.num_keys() {
                    let child = node.ptr_at(i)?;
                    let (lo, hi) = self.leaf_depth_bounds(child, depth + 1)?;
                    min_depth = min_depth.min(lo);
                    max_depth = max_depth.max(hi);
                }
                Ok((min_depth, max_depth))
            }
            other => Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during traversal",
                other, block
            ))),
        }
    }

    /// Verifies the at-rest structural invariants and reports the first
    /// violation as `Insane`.
    pub fn sanity_check(&mut self) -> Result<()> {
        let root = self.root_block();

        let mut entries = Vec::new();
        self.collect_range(root, 0, None, None, &mut entries)?;
        for pair in entries.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(Error::Insane(format!(
                    "keys out of order: {:?} precedes {:?}",
                    pair[0].0, pair[1].0
                )));
            }
        }

        let (min_depth, max_depth) = self.leaf_depth_bounds(root, 0)?;
        if min_depth != max_depth {
            return Err(Error::Insane(format!(
                "leaves at unequal depths {} and {}",
                min_depth, max_depth
            )));
        }

        self.check_occupancy(root, true, 0)
    }

    fn check_occupancy(&mut self, block: u64, is_root: bool, depth: usize) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("traversal exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        match node.kind() {
            BlockKind::Leaf => {
                if !is_root && node.num_keys() < node.min_keys() {
                    return Err(Error::Insane(format!(
                        "leaf block {} holds {} keys, below the half-full minimum {}",
                        block,
                        node.num_keys(),
                        node.min_keys()
                    )));
                }
                Ok(())
            }
            kind if kind.is_routing() => {
                if is_root && kind == BlockKind::Interior {
                    return Err(Error::Insane(format!(
                        "root block {} is tagged interior",
                        block
                    )));
                }
                if !is_root && kind == BlockKind::Root {
                    return Err(Error::Insane(format!(
                        "root-tagged block {} below the root",
                        block
                    )));
                }
                if is_root && node.num_keys() == 0 {
                    return Err(Error::Insane(format!(
                        "routing root {} has fewer than two children",
                        block
                    )));
                }
                if !is_root && node.num_keys() < node.min_keys() {
                    return Err(Error::Insane(format!(
                        "interior block {} holds {} keys, below the half-full minimum {}",
                        block,
                        node.num_keys(),
                        node.min_keys()
                    )));
                }
                for i in 0..=node.num_keys() {
                    let child = node.ptr_at(i)?;
                    self.check_occupancy(child, false, depth + 1)?;
                }
                Ok(())
            }
            other => Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during sanity check",
                other, block
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::index::BTreeIndex;
    use crate::storage::{BlockStore, BufferCache, DiskSystem};
    use tempfile::{tempdir, TempDir};

    const BLOCK: usize = 112; // leaf and routing capacity 4 with K = V = 8

    fn test_index(blocks: u64) -> (TempDir, BufferCache) {
        let dir = tempdir().unwrap();
        let disk = DiskSystem::create(dir.path().join("test.btree"), BLOCK, blocks).unwrap();
        (dir, BufferCache::new(disk, 8))
    }

    fn key(i: usize) -> Vec<u8> {
        format!("key{:05}", i).into_bytes()
    }

    fn val(i: usize) -> Vec<u8> {
        format!("val{:05}", i).into_bytes()
    }

    #[test]
    fn range_query_is_inclusive_at_both_ends() {
        let (_dir, mut cache) = test_index(32);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();
        for i in 1..=20 {
            index.insert(&key(i), &val(i)).unwrap();
        }

        let values = index.range_query(&key(5), &key(10)).unwrap();
        let expected: Vec<Vec<u8>> = (5..=10).map(val).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn range_query_with_absent_bounds_still_matches_interior_keys() {
        let (_dir, mut cache) = test_index(32);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();
        for i in (2..=20).step_by(2) {
            index.insert(&key(i), &val(i)).unwrap();
        }

        // neither bound exists in the index
        let values = index.range_query(&key(5), &key(11)).unwrap();
        let expected: Vec<Vec<u8>> = [6, 8, 10].iter().map(|&i| val(i)).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn inverted_range_is_empty() {
        let (_dir, mut cache) = test_index(16);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();
        for i in 1..=5 {
            index.insert(&key(i), &val(i)).unwrap();
        }

        assert!(index.range_query(&key(4), &key(2)).unwrap().is_empty());
    }

    #[test]
    fn empty_index_has_height_one_and_passes_sanity() {
        let (_dir, mut cache) = test_index(16);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();

        assert_eq!(index.height().unwrap(), 1);
        index.sanity_check().unwrap();
        assert!(index.range_query(&key(1), &key(9)).unwrap().is_empty());
    }

    #[test]
    fn sanity_check_catches_out_of_order_keys() {
        let (_dir, mut cache) = test_index(16);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();
        for i in 1..=3 {
            index.insert(&key(i), &val(i)).unwrap();
        }

        // corrupt the root leaf behind the index's back: swap two keys
        let root = index.root_block();
        let mut node = index.read_node(root).unwrap();
        node.set_key_at(0, &key(3)).unwrap();
        node.set_key_at(2, &key(1)).unwrap();
        let bytes = node.as_bytes().to_vec();
        cache.write_block(root, &bytes).unwrap();

        let mut index = BTreeIndex::attach(&mut cache, 0).unwrap();
        assert!(matches!(index.sanity_check(), Err(Error::Insane(_))));
    }

    #[test]
    fn sanity_check_catches_underfull_nodes() {
        let (_dir, mut cache) = test_index(16);
        let mut index = BTreeIndex::create(&mut cache, 0, 8, 8).unwrap();
        for i in 1..=5 {
            index.insert(&key(i), &val(i)).unwrap();
        }

        // shrink the upper leaf below the half-full minimum directly
        let root = index.root_block();
        let root_node = index.read_node(root).unwrap();
        let upper = root_node.ptr_at(1).unwrap();
        let mut leaf = index.read_node(upper).unwrap();
        leaf.set_num_keys(1);
        let bytes = leaf.as_bytes().to_vec();
        cache.write_block(upper, &bytes).unwrap();

        let mut index = BTreeIndex::attach(&mut cache, 0).unwrap();
        assert!(matches!(index.sanity_check(), Err(Error::Insane(_))));
    }
}
