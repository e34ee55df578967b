//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// davatar - domain avatars
///
/// Finds the best image a domain declares for itself and caches it.
#[derive(Parser, Debug)]
#[command(name = "davatar-cli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DAVATAR_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a domain over the network, bypassing the cache
    Resolve(DomainArgs),

    /// Look a domain up through the configured cache
    Lookup(DomainArgs),

    /// Print where the cache stores a domain's entry
    Key(DomainArgs),
}

/// A single domain argument
#[derive(Parser, Debug)]
pub struct DomainArgs {
    /// Domain name, e.g. example.com
    pub domain: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lookup_with_globals() {
        let cli = Cli::try_parse_from(["davatar-cli", "lookup", "example.com", "-vv", "--config", "davatar.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("davatar.toml")));
        assert!(matches!(cli.command, Commands::Lookup(DomainArgs { ref domain }) if domain == "example.com"));
    }

    #[test]
    fn test_domain_required() {
        assert!(Cli::try_parse_from(["davatar-cli", "resolve"]).is_err());
    }
}
