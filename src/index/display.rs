//! Diagnostic rendering of the tree: depth-first indented text, a DOT
//! graph for graphviz, or the sorted key/value listing.

use std::io::Write;

use crate::config::MAX_TREE_DEPTH;
use crate::error::{Error, Result};
use crate::index::node::{BlockKind, Node};
use crate::index::tree::BTreeIndex;
use crate::storage::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Depth-first, one node per line, indented by depth.
    Depth,
    /// DOT graph (`digraph tree { ... }`) for graphviz.
    Dot,
    /// All entries in ascending key order, one `(key,value)` per line.
    SortedKeyValue,
}

fn render(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn node_label(node: &Node) -> Result<String> {
    let mut label = String::new();
    if node.kind() == BlockKind::Leaf {
        for i in 0..node.num_keys() {
            let (key, value) = node.entry_at(i)?;
            label.push_str(&format!("({},{}) ", render(key), render(value)));
        }
    } else {
        for i in 0..node.num_keys() {
            label.push_str(&format!("*{} {} ", node.ptr_at(i)?, render(node.key_at(i)?)));
        }
        label.push_str(&format!("*{}", node.ptr_at(node.num_keys())?));
    }
    Ok(label.trim_end().to_string())
}

impl<S: BlockStore> BTreeIndex<'_, S> {
    pub fn display(&mut self, out: &mut dyn Write, mode: DisplayMode) -> Result<()> {
        let root = self.root_block();
        match mode {
            DisplayMode::Depth => self.display_depth(root, 0, out),
            DisplayMode::Dot => {
                writeln!(out, "digraph tree {{")?;
                self.display_dot(root, 0, out)?;
                writeln!(out, "}}")?;
                Ok(())
            }
            DisplayMode::SortedKeyValue => {
                let mut entries = Vec::new();
                self.collect_range(root, 0, None, None, &mut entries)?;
                for (key, value) in entries {
                    writeln!(out, "({},{})", render(&key), render(&value))?;
                }
                Ok(())
            }
        }
    }

    fn display_depth(&mut self, block: u64, depth: usize, out: &mut dyn Write) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("display exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        let name = match node.kind() {
            BlockKind::Leaf => "leaf",
            BlockKind::Root => "root",
            BlockKind::Interior => "interior",
            other => {
                return Err(Error::Corrupt(format!(
                    "unexpected {:?} block {} during display",
                    other, block
                )));
            }
        };

        writeln!(
            out,
            "{:indent$}{}: {} {}",
            "",
            block,
            name,
            node_label(&node)?,
            indent = depth * 2
        )?;

        if node.kind().is_routing() {
            for i in 0..=node.num_keys() {
                let child = node.ptr_at(i)?;
                self.display_depth(child, depth + 1, out)?;
            }
        }
        Ok(())
    }

    fn display_dot(&mut self, block: u64, depth: usize, out: &mut dyn Write) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Insane("display exceeded maximum tree depth".into()));
        }

        let node = self.read_node(block)?;
        if !node.kind().is_routing() && node.kind() != BlockKind::Leaf {
            return Err(Error::Corrupt(format!(
                "unexpected {:?} block {} during display",
                node.kind(),
                block
            )));
        }

        writeln!(out, "  {} [ label=\"{}: {}\" ];", block, block, node_label(&node)?)?;

        if node.kind().is_routing() {
            for i in 0..=node.num_keys() {
                let child = node.ptr_at(i)?;
                writeln!(out, "  {} -> {};", block, child)?;
                self.display_dot(child, depth + 1, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BufferCache, DiskSystem};
    use tempfile::tempdir;

    const BLOCK: usize = 112;

    fn filled_index(cache: &mut BufferCache, count: usize) -> BTreeIndex<'_, BufferCache> {
        let mut index = BTreeIndex::create(cache, 0, 8, 8).unwrap();
        for i in 1..=count {
            let key = format!("key{:05}", i);
            let val = format!("val{:05}", i);
            index.insert(key.as_bytes(), val.as_bytes()).unwrap();
        }
        index
    }

    #[test]
    fn sorted_mode_lists_entries_in_key_order() {
        let dir = tempdir().unwrap();
        let disk = DiskSystem::create(dir.path().join("t.btree"), BLOCK, 32).unwrap();
        let mut cache = BufferCache::new(disk, 8);
        let mut index = filled_index(&mut cache, 8);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::SortedKeyValue).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "(key00001,val00001)");
        assert_eq!(lines[7], "(key00008,val00008)");
    }

    #[test]
    fn dot_mode_emits_a_digraph_with_edges() {
        let dir = tempdir().unwrap();
        let disk = DiskSystem::create(dir.path().join("t.btree"), BLOCK, 32).unwrap();
        let mut cache = BufferCache::new(disk, 8);
        let mut index = filled_index(&mut cache, 8);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Dot).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("digraph tree {"));
        assert!(text.trim_end().ends_with('}'));
        assert!(text.contains(" -> "));
    }

    #[test]
    fn depth_mode_indents_children() {
        let dir = tempdir().unwrap();
        let disk = DiskSystem::create(dir.path().join("t.btree"), BLOCK, 32).unwrap();
        let mut cache = BufferCache::new(disk, 8);
        let mut index = filled_index(&mut cache, 8);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let first = lines.next().unwrap();
        assert!(first.contains("root"));
        assert!(lines.next().unwrap().starts_with("  "));
    }
}
