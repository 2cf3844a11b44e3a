//! SplayLSM CLI
//!
//! Command-line access to a local SplayLSM data directory.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use splaylsm::{Config, SplayStore};
use tracing_subscriber::{fmt, EnvFilter};

/// SplayLSM CLI
#[derive(Parser, Debug)]
#[command(name = "splaylsm-cli")]
#[command(about = "CLI for the SplayLSM key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./splaylsm_data")]
    data_dir: String,

    /// MemTable size limit in KB before flush
    #[arg(short = 'm', long, default_value = "128")]
    memtable_kb: usize,

    /// Read without promoting merged keys
    #[arg(long)]
    no_splay: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Flush and compact every level into the deepest one
    Compact,

    /// Print engine counters and the level layout
    Stats,

    /// Check the data checksum of every SSTable
    Verify,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,splaylsm=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> splaylsm::Result<()> {
    let config = Config::builder()
        .memtable_size_bytes(args.memtable_kb * 1024)
        .splay_enabled(!args.no_splay)
        // One-shot process: compact inline instead of racing the exit
        .background_compaction(false)
        .build();

    let store = SplayStore::open(&args.data_dir, config)?;

    match args.command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            store.insert(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Delete { key } => {
            store.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Compact => {
            let runs = store.engine().compact_all()?;
            println!("{} compactions, levels: {:?}", runs, store.engine().level_counts());
        }
        Commands::Stats => {
            let stats = store.engine().stats();
            println!("puts:           {}", stats.puts);
            println!("merges:         {}", stats.merges);
            println!("deletes:        {}", stats.deletes);
            println!("flushes:        {}", stats.flushes);
            println!("compactions:    {}", stats.compactions);
            println!("merge calls:    {}", stats.merge_calls);
            println!("merge failures: {}", stats.merge_failures);
            println!("filtered:       {}", stats.filtered);
            for (level, count) in stats.tables_per_level.iter().enumerate() {
                println!(
                    "L{}:             {} tables, {} bytes",
                    level,
                    count,
                    store.engine().storage().level_size(level)
                );
            }
        }
        Commands::Verify => {
            let checked = store.engine().verify_tables()?;
            println!("{} tables OK", checked);
        }
    }

    store.close()
}
