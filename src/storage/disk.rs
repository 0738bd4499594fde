//! # Disk System
//!
//! `DiskSystem` is a file-backed block device: a flat file of
//! `num_blocks * block_size` bytes addressed by block number. It performs
//! positioned whole-block reads and writes and knows nothing about node
//! formats or caching; those live above it.
//!
//! The file carries no header of its own. Geometry is recovered on open
//! from the block size the caller supplies and the file length, which
//! must divide evenly by it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct DiskSystem {
    file: File,
    block_size: usize,
    num_blocks: u64,
}

impl DiskSystem {
    /// Creates a zero-filled store of `num_blocks` blocks, truncating any
    /// existing file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize, num_blocks: u64) -> Result<Self> {
        let path = path.as_ref();

        if block_size == 0 {
            return Err(Error::InvalidArgument("block size must be nonzero".into()));
        }
        if num_blocks == 0 {
            return Err(Error::InvalidArgument(
                "store must contain at least one block".into(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.set_len(num_blocks * block_size as u64)?;

        debug!(
            path = %path.display(),
            block_size,
            num_blocks,
            "created block store"
        );

        Ok(Self {
            file,
            block_size,
            num_blocks,
        })
    }

    /// Opens an existing store. The block count is derived from the file
    /// length, which must be a nonzero multiple of `block_size`.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();

        if block_size == 0 {
            return Err(Error::InvalidArgument("block size must be nonzero".into()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_size = file.metadata()?.len();

        if file_size == 0 {
            return Err(Error::Corrupt(format!(
                "store '{}' is empty",
                path.display()
            )));
        }
        if file_size % block_size as u64 != 0 {
            return Err(Error::Corrupt(format!(
                "store '{}' length {} is not a multiple of block size {}",
                path.display(),
                file_size,
                block_size
            )));
        }

        let num_blocks = file_size / block_size as u64;

        debug!(
            path = %path.display(),
            block_size,
            num_blocks,
            "opened block store"
        );

        Ok(Self {
            file,
            block_size,
            num_blocks,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    fn check_access(&self, block_no: u64, len: usize) -> Result<()> {
        if block_no >= self.num_blocks {
            return Err(Error::InvalidArgument(format!(
                "block {} out of bounds (num_blocks={})",
                block_no, self.num_blocks
            )));
        }
        if len != self.block_size {
            return Err(Error::InvalidArgument(format!(
                "buffer length {} does not match block size {}",
                len, self.block_size
            )));
        }
        Ok(())
    }

    pub fn read_block(&mut self, block_no: u64, buf: &mut [u8]) -> Result<()> {
        self.check_access(block_no, buf.len())?;
        self.file
            .seek(SeekFrom::Start(block_no * self.block_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub fn write_block(&mut self, block_no: u64, buf: &[u8]) -> Result<()> {
        self.check_access(block_no, buf.len())?;
        self.file
            .seek(SeekFrom::Start(block_no * self.block_size as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Forces all written blocks to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl super::BlockStore for DiskSystem {
    fn block_size(&self) -> usize {
        DiskSystem::block_size(self)
    }

    fn num_blocks(&self) -> u64 {
        DiskSystem::num_blocks(self)
    }

    fn read_block(&mut self, block_no: u64, buf: &mut [u8]) -> Result<()> {
        DiskSystem::read_block(self, block_no, buf)
    }

    fn write_block(&mut self, block_no: u64, buf: &[u8]) -> Result<()> {
        DiskSystem::write_block(self, block_no, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_produces_zeroed_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        let mut disk = DiskSystem::create(&path, 128, 4).unwrap();

        let mut buf = vec![0xFFu8; 128];
        disk.read_block(3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        let mut disk = DiskSystem::create(&path, 128, 4).unwrap();

        let block = vec![0xABu8; 128];
        disk.write_block(2, &block).unwrap();

        let mut buf = vec![0u8; 128];
        disk.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, block);
    }

    #[test]
    fn blocks_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");

        {
            let mut disk = DiskSystem::create(&path, 128, 4).unwrap();
            disk.write_block(1, &vec![0x42u8; 128]).unwrap();
            disk.sync().unwrap();
        }

        let mut disk = DiskSystem::open(&path, 128).unwrap();
        assert_eq!(disk.num_blocks(), 4);

        let mut buf = vec![0u8; 128];
        disk.read_block(1, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn open_rejects_misaligned_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        let result = DiskSystem::open(&path, 128);
        assert!(matches!(result, Err(Error::Corrupt(_))));
    }

    #[test]
    fn out_of_bounds_block_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        let mut disk = DiskSystem::create(&path, 128, 4).unwrap();

        let mut buf = vec![0u8; 128];
        let result = disk.read_block(4, &mut buf);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");
        let mut disk = DiskSystem::create(&path, 128, 4).unwrap();

        let mut buf = vec![0u8; 64];
        let result = disk.read_block(0, &mut buf);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
