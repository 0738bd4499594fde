//! Shared plumbing for the `btree_*` driver binaries: argument parsing
//! helpers, store wiring, and the performance report each driver prints
//! after its operation.

use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use eyre::{Result, WrapErr};

use crate::config::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
use crate::storage::{BufferCache, DiskSystem};

/// Installs a stderr tracing subscriber filtered by `RUST_LOG`. Safe to
/// call more than once; later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

pub fn store_path(filestem: &str) -> PathBuf {
    PathBuf::from(format!("{}.btree", filestem))
}

pub fn parse_num<T>(arg: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    arg.parse()
        .map_err(|e| eyre::eyre!("invalid {} '{}': {}", what, arg, e))
}

fn effective_cache_blocks(cache_blocks: usize) -> usize {
    if cache_blocks == 0 {
        DEFAULT_CACHE_BLOCKS
    } else {
        cache_blocks
    }
}

pub fn open_store(filestem: &str, cache_blocks: usize) -> Result<BufferCache> {
    let path = store_path(filestem);
    let disk = DiskSystem::open(&path, DEFAULT_BLOCK_SIZE)
        .wrap_err_with(|| format!("failed to open index store '{}'", path.display()))?;
    Ok(BufferCache::new(disk, effective_cache_blocks(cache_blocks)))
}

pub fn create_store(filestem: &str, cache_blocks: usize, num_blocks: u64) -> Result<BufferCache> {
    let path = store_path(filestem);
    let disk = DiskSystem::create(&path, DEFAULT_BLOCK_SIZE, num_blocks)
        .wrap_err_with(|| format!("failed to create index store '{}'", path.display()))?;
    Ok(BufferCache::new(disk, effective_cache_blocks(cache_blocks)))
}

/// Pads a CLI-supplied field with zero bytes, or truncates it, to the
/// index's fixed width.
pub fn fit_width(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];
    let n = bytes.len().min(width);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

pub fn report_stats(cache: &BufferCache) {
    let stats = cache.stats();
    eprintln!("Performance statistics:");
    eprintln!("numallocs       = {}", stats.allocations);
    eprintln!("numdeallocs     = {}", stats.deallocations);
    eprintln!("numreads        = {}", stats.reads);
    eprintln!("numdiskreads    = {}", stats.disk_reads);
    eprintln!("numwrites       = {}", stats.writes);
    eprintln!("numdiskwrites   = {}", stats.disk_writes);
    eprintln!();
    eprintln!("total time      = {}", stats.clock);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_width_pads_and_truncates() {
        assert_eq!(fit_width(b"abc", 5), b"abc\0\0");
        assert_eq!(fit_width(b"abcdefgh", 4), b"abcd");
        assert_eq!(fit_width(b"", 2), b"\0\0");
    }

    #[test]
    fn parse_num_reports_the_field_name() {
        let err = parse_num::<usize>("bogus", "cache size").unwrap_err();
        assert!(err.to_string().contains("cache size"));
        let ok: usize = parse_num("64", "cache size").unwrap();
        assert_eq!(ok, 64);
    }
}
