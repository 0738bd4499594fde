//! Inserts one key/value pair into an existing index.

use std::env;

use blocktree::{cli, BTreeIndex};
use eyre::{bail, Result};

fn usage() {
    eprintln!("usage: btree_insert filestem cachesize key value");
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
    if args.len() != 5 {
        usage();
        bail!("expected 4 arguments, got {}", args.len() - 1);
    }

    let cache_size: usize = cli::parse_num(&args[2], "cache size")?;
    let mut cache = cli::open_store(&args[1], cache_size)?;
    let mut index = BTreeIndex::attach(&mut cache, 0)?;

    let key = cli::fit_width(args[3].as_bytes(), index.key_size());
    let value = cli::fit_width(args[4].as_bytes(), index.value_size());
    index.insert(&key, &value)?;

    index.detach()?;
    cache.flush()?;

    cli::report_stats(&cache);
    Ok(())
}
