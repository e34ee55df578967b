//! davatar-cli - resolve and inspect domain avatars by hand.
//!
//! CLI entry point that dispatches to subcommands.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use davatar_client::AvatarResolver;
use davatar_core::{AppConfig, AvatarCache, CacheBackend, Domain, EntryKey, Resolve, open_store};

mod args;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // clap already falls back to DAVATAR_CONFIG_FILE
    let config = AppConfig::load_from(cli.config.as_deref())?;

    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), cli.verbose, config.debug);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .compact()
        .init();

    tracing::debug!(backend = ?config.cache_backend, ttl_secs = config.ttl().as_secs(), "loaded configuration");

    match cli.command {
        Commands::Resolve(args) => {
            let domain = Domain::parse(&args.domain)?;
            let resolver = AvatarResolver::from_config(&config)?;
            println!("{}", resolver.resolve(&domain).await);
        }
        Commands::Lookup(args) => {
            let domain = Domain::parse(&args.domain)?;
            let resolver = AvatarResolver::from_config(&config)?;
            let cache = AvatarCache::new(open_store(&config).await?, Arc::new(resolver), config.ttl());
            println!("{}", cache.lookup(&domain).await?);
        }
        Commands::Key(args) => {
            let domain = Domain::parse(&args.domain)?;
            let key = EntryKey::for_domain(&domain);
            match config.cache_backend {
                CacheBackend::Fs => println!("{}", config.cache_root.join(key.relative_path()).display()),
                CacheBackend::Sqlite | CacheBackend::Memory => println!("{}", key.relative_path().display()),
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` when set and valid, otherwise a level from `-v` and the config.
fn log_filter(rust_log: Option<&str>, verbose: u8, debug: bool) -> EnvFilter {
    // 0 = warn (debug when the config asks for it), 1 = info, 2+ = debug
    let level = match verbose {
        0 if debug => "debug",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
