use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "scaleval")]
#[command(about = "Psychometric validation of survey scales", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (can be repeated: -v, -vv)
    /// -v: stage progress and fit summaries
    /// -vv: debug output including per-replicate failures
    /// -vvv: trace output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Plain ASCII output without colours
    #[arg(long, global = true, env = "SCALEVAL_PLAIN")]
    pub plain: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full validation study on a survey export
    Analyze {
        /// Survey table (CSV) with one row per respondent
        survey: PathBuf,

        /// Configuration file (defaults to ./.scaleval.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (inferred from the output file extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip exploratory graph analysis and its bootstrap
        #[arg(long = "no-network")]
        no_network: bool,

        /// Number of bootstrap replicates
        #[arg(long = "bootstrap-iterations")]
        bootstrap_iterations: Option<usize>,

        /// Bootstrap worker threads
        #[arg(short = 'j', long)]
        workers: Option<usize>,

        /// Seed for the sample split, parallel analysis and bootstrap
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Aiken's V from a long table of expert judge ratings
    ContentValidity {
        /// Ratings table (CSV) with item, judge and rating columns
        ratings: PathBuf,

        /// Configuration file (defaults to ./.scaleval.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (inferred from the output file extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default .scaleval.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Log level for a `-v` count; `RUST_LOG`, when set, takes precedence.
pub fn log_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "scaleval",
            "analyze",
            "survey.csv",
            "--format",
            "json",
            "--no-network",
            "--seed",
            "11",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbosity, 2);
        match cli.command {
            Commands::Analyze {
                format,
                no_network,
                seed,
                ..
            } => {
                assert_eq!(format, Some(OutputFormat::Json));
                assert!(no_network);
                assert_eq!(seed, Some(11));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(log_level(0), LevelFilter::Warn);
        assert_eq!(log_level(1), LevelFilter::Info);
        assert_eq!(log_level(2), LevelFilter::Debug);
        assert_eq!(log_level(5), LevelFilter::Trace);
    }
}
