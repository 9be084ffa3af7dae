use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::CheckCategory;

#[derive(Parser, Debug)]
#[command(
    name = "licenses-deny",
    about = "Check installed Python packages against license, ban, and source policy",
    version
)]
pub struct Cli {
    /// Policy config file [default: ./licenses-deny.toml, fallback ~/.config/licenses-deny/licenses-deny.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Python environment to inspect [default: $VIRTUAL_ENV, then ./.venv]
    #[arg(long, global = true, value_name = "PATH")]
    pub env: Option<PathBuf>,

    /// More output: show passing checks; repeat for debug logs
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a template licenses-deny.toml into the project root
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List installed packages with their normalized licenses
    List {
        /// Also show the raw license text each package declares
        #[arg(long)]
        show_raw_license: bool,

        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,
    },

    /// Check installed packages against the policy
    Check {
        /// Which checks to run
        #[arg(default_value = "all")]
        scope: CheckScope,

        /// Treat uncertain results as failures for the selected checks
        #[arg(long)]
        strict: bool,

        /// Only print the summary line
        #[arg(short, long)]
        quiet: bool,

        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum CheckScope {
    All,
    Licenses,
    Bans,
    Sources,
}

impl CheckScope {
    pub fn categories(self) -> Vec<CheckCategory> {
        match self {
            CheckScope::All => CheckCategory::ALL.to_vec(),
            CheckScope::Licenses => vec![CheckCategory::License],
            CheckScope::Bans => vec![CheckCategory::Ban],
            CheckScope::Sources => vec![CheckCategory::Source],
        }
    }
}
