//! CLI argument definitions using clap
//!
//! Commands:
//! - ckplog inspect (--prefix <prefix> | --config <path>)
//! - ckplog ids (--prefix <prefix> | --config <path>)
//! - ckplog compact (--prefix <prefix> | --config <path>)
//! - ckplog append (--prefix <prefix> | --config <path>) --work-id <id> [--count <n>] [payload]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ckplog - inspect and maintain checkpoint logs
#[derive(Parser, Debug)]
#[command(name = "ckplog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Which checkpoint to operate on
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Checkpoint path prefix (the file is <prefix>.ckp)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Path to a store configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the state, header and verified extent of a checkpoint
    Inspect {
        #[command(flatten)]
        target: Target,
    },

    /// Print the completed work ids in file order
    Ids {
        #[command(flatten)]
        target: Target,
    },

    /// Rewrite the checkpoint without its unverified tail
    Compact {
        #[command(flatten)]
        target: Target,
    },

    /// Append result records, writing a default header on a fresh file
    Append {
        #[command(flatten)]
        target: Target,

        /// Work id of the first record
        #[arg(long)]
        work_id: u64,

        /// Number of records; ids run upward from --work-id
        #[arg(long, default_value_t = 1)]
        count: u64,

        /// Payload stored in every record
        #[arg(default_value = "")]
        payload: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_or_config_required() {
        assert!(Cli::try_parse_from(["ckplog", "ids"]).is_err());
        assert!(
            Cli::try_parse_from(["ckplog", "ids", "--prefix", "a", "--config", "b.json"]).is_err()
        );
    }

    #[test]
    fn test_append_defaults() {
        let cli = Cli::try_parse_from(["ckplog", "append", "--prefix", "run", "--work-id", "7"])
            .unwrap();
        match cli.command {
            Command::Append {
                target,
                work_id,
                count,
                payload,
            } => {
                assert_eq!(target.prefix.as_deref(), Some("run"));
                assert_eq!(work_id, 7);
                assert_eq!(count, 1);
                assert!(payload.is_empty());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
