use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use powrace::commands::{init::InitOptions, simulate::SimulateOptions, submit::SubmitOptions};
use powrace::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "powrace")]
#[command(about = "Miners racing a proof-of-work puzzle for every transaction batch", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.powrace/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a miner config file
    Init {
        /// Miner identity in the peer set
        #[arg(long)]
        id: String,

        /// Address to listen on for peers and clients
        #[arg(long)]
        listen: Option<String>,

        /// Peer as id=host:port (repeatable)
        #[arg(long = "peer")]
        peers: Vec<String>,

        /// Leading zero hex characters required of a block hash
        #[arg(long)]
        difficulty: Option<u32>,

        /// Transactions per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only verify and adopt peer blocks, never mine
        #[arg(long)]
        verify_only: bool,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run the miner until Ctrl+C
    Run,

    /// Send generated transactions to a running miner
    Submit {
        /// Miner address (default: the configured listen address)
        #[arg(long)]
        to: Option<String>,

        /// Number of transactions to send
        #[arg(long, default_value_t = 4)]
        count: usize,

        /// First transaction id
        #[arg(long, default_value_t = 0)]
        start_id: u64,

        /// Seed for reproducible transactions
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run several miners in-process and print their chains
    Simulate {
        /// Number of miners
        #[arg(long, default_value_t = 3)]
        miners: usize,

        /// Transactions per batch
        #[arg(long, default_value_t = 4)]
        batch_size: usize,

        /// Leading zero hex characters required of a block hash
        #[arg(long, default_value_t = 4)]
        difficulty: u32,

        /// Transactions to submit
        #[arg(long, default_value_t = 12)]
        transactions: usize,

        /// Search threads per miner (0 = auto-detect)
        #[arg(long, default_value_t = 1)]
        threads: u32,

        /// Seed for reproducible transactions
        #[arg(long)]
        seed: Option<u64>,

        /// Give up waiting for the miners after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Print chains as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => PathBuf::from(path),
        None => config::default_config_path()?,
    };

    match cli.command {
        Commands::Init {
            id,
            listen,
            peers,
            difficulty,
            batch_size,
            verify_only,
            force,
        } => commands::init::run(
            &config_path,
            InitOptions {
                id,
                listen,
                peers,
                difficulty,
                batch_size,
                verify_only,
                force,
            },
        ),
        Commands::Run => commands::run::run(&config_path),
        Commands::Submit {
            to,
            count,
            start_id,
            seed,
        } => commands::submit::run(
            &config_path,
            SubmitOptions {
                to,
                count,
                start_id,
                seed,
            },
        ),
        Commands::Simulate {
            miners,
            batch_size,
            difficulty,
            transactions,
            threads,
            seed,
            timeout_secs,
            json,
        } => commands::simulate::run(SimulateOptions {
            miners,
            batch_size,
            difficulty,
            transactions,
            threads,
            seed,
            timeout: Duration::from_secs(timeout_secs),
            json,
        }),
    }
}
