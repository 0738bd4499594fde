//! Renders the tree to stdout in one of three diagnostic modes.

use std::env;
use std::io;

use blocktree::{cli, BTreeIndex, DisplayMode};
use eyre::{bail, Result};

fn usage() {
    eprintln!("usage: btree_display filestem cachesize [depth|dot|sorted]");
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
    if args.len() != 3 && args.len() != 4 {
        usage();
        bail!("expected 2 or 3 arguments, got {}", args.len() - 1);
    }

    let mode = match args.get(3).map(String::as_str) {
        None | Some("depth") => DisplayMode::Depth,
        Some("dot") => DisplayMode::Dot,
        Some("sorted") => DisplayMode::SortedKeyValue,
        Some(other) => {
            usage();
            bail!("unknown display mode '{}'", other);
        }
    };

    let cache_size: usize = cli::parse_num(&args[2], "cache size")?;
    let mut cache = cli::open_store(&args[1], cache_size)?;
    let mut index = BTreeIndex::attach(&mut cache, 0)?;

    index.display(&mut io::stdout().lock(), mode)?;

    index.detach()?;
    cache.flush()?;

    cli::report_stats(&cache);
    Ok(())
}
