//! `sstdump`: scan an SSTable and print its entry count.
//!
//! Diagnostics go to stderr; only the count (and `--print` output) goes to
//! stdout, so the tool composes in pipelines.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sstdump::{SstReadOptions, SstReader};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "sstdump", version, about = "Scan an SSTable and print its entry count")]
struct Args {
    /// Path to the SSTable file.
    file: PathBuf,

    /// Also print every entry as `key\tvalue` (lossy UTF-8).
    #[arg(long)]
    print: bool,

    /// Decoded-block cache size in MB (0 disables caching).
    #[arg(long, default_value_t = 64)]
    block_cache_mb: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(count) => {
            println!("{count}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("scan failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> sstdump::Result<u64> {
    info!("reading sstable: {}", args.file.display());

    let options = SstReadOptions {
        block_cache_mb: args.block_cache_mb,
        ..Default::default()
    };
    let reader = Arc::new(SstReader::open_with_options(&args.file, options).await?);

    info!(
        "opened table: {} bytes, {} data blocks",
        reader.file_size(),
        reader.block_count()
    );
    if let Some(props) = reader.properties() {
        info!(
            "table properties: entry_count={} data_block_count={} raw_key_size={} raw_value_size={}",
            props.entry_count, props.data_block_count, props.raw_key_size, props.raw_value_size
        );
    }

    let mut iter = reader.clone().iter();
    let mut count = 0u64;
    while let Some((key, value)) = iter.try_next().await? {
        if args.print {
            println!(
                "{}\t{}",
                String::from_utf8_lossy(&key),
                String::from_utf8_lossy(&value)
            );
        }
        count += 1;
    }

    info!("scan complete: {count} entries");
    Ok(count)
}
