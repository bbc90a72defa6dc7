mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segsync", version)]
#[command(about = "Keep routing segments in sync with a segment server, preferring deltas")]
struct Cli {
    /// Config file (defaults to ~/.config/segsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Local directory holding profiles2/ and segments4/
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh lookups and installed profiles, then update the given segments
    Sync {
        /// Segment names, e.g. E5_N45 or E5_N45.rd5
        #[arg(required = true)]
        segments: Vec<String>,
        /// Always download segments in full
        #[arg(long)]
        no_delta: bool,
    },
    /// Print the local checksum of a segment and the delta URL it maps to
    Checksum {
        /// Segment name
        segment: String,
    },
    /// Print the effective configuration
    Config,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli.config.or_else(config::config_path);
    let mut app_config = config::load_config(path.as_deref());
    if let Some(dir) = cli.base_dir {
        app_config.base_dir = Some(dir);
    }

    match cli.command {
        Command::Sync { segments, no_delta } => {
            commands::sync::run(&app_config, &segments, !no_delta).await
        }
        Command::Checksum { segment } => commands::checksum::run(&app_config, &segment),
        Command::Config => commands::config::run(&app_config, path.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_requires_segments() {
        assert!(Cli::try_parse_from(["segsync", "sync"]).is_err());

        let cli = Cli::try_parse_from(["segsync", "-vv", "sync", "E5_N45", "--no-delta"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Sync { segments, no_delta } => {
                assert_eq!(segments, vec!["E5_N45"]);
                assert!(no_delta);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["segsync", "checksum", "E5_N45", "--base-dir", "/data"]).unwrap();
        assert_eq!(cli.base_dir, Some(PathBuf::from("/data")));
    }
}
