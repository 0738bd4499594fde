//! Creates a fresh index store: superblock, empty root, free list.

use std::env;

use blocktree::{cli, BTreeIndex};
use eyre::{bail, Result};

fn usage() {
    eprintln!("usage: btree_create filestem cachesize numblocks keysize valuesize");
}

fn main() {
    cli::init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 6 {
        usage();
        bail!("expected 5 arguments, got {}", args.len() - 1);
    }

    let cache_size: usize = cli::parse_num(&args[2], "cache size")?;
    let num_blocks: u64 = cli::parse_num(&args[3], "block count")?;
    let key_size: u32 = cli::parse_num(&args[4], "key size")?;
    let value_size: u32 = cli::parse_num(&args[5], "value size")?;

    let mut cache = cli::create_store(&args[1], cache_size, num_blocks)?;
    let mut index = BTreeIndex::create(&mut cache, 0, key_size, value_size)?;
    index.detach()?;
    cache.flush()?;

    cli::report_stats(&cache);
    Ok(())
}
