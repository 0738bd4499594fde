//! Deletes one key from an existing index.

use std::env;

use blocktree::{cli, BTreeIndex};
use eyre::{bail, Result};

fn usage() {
    eprintln!("usage: btree_delete filestem cachesize key");
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
    if args.len() != 4 {
        usage();
        bail!("expected 3 arguments, got {}", args.len() - 1);
    }

    let cache_size: usize = cli::parse_num(&args[2], "cache size")?;
    let mut cache = cli::open_store(&args[1], cache_size)?;
    let mut index = BTreeIndex::attach(&mut cache, 0)?;

    let key = cli::fit_width(args[3].as_bytes(), index.key_size());
    index.delete(&key)?;

    index.detach()?;
    cache.flush()?;

    cli::report_stats(&cache);
    Ok(())
}
