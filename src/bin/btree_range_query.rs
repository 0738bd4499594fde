//! Prints the values for every key in a closed key interval, in
//! ascending key order.

use std::env;

use blocktree::{cli, BTreeIndex};
use eyre::{bail, Result};

fn usage() {
    eprintln!("usage: btree_range_query filestem cachesize minkey maxkey");
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

    let min = cli::fit_width(args[3].as_bytes(), index.key_size());
    let max = cli::fit_width(args[4].as_bytes(), index.key_size());
    for value in index.range_query(&min, &max)? {
        println!("{}", String::from_utf8_lossy(&value));
    }

    index.detach()?;
    cache.flush()?;

    cli::report_stats(&cache);
    Ok(())
}
