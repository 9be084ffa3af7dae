//! `licenses-deny`: check installed Python packages against license, ban, and source policy.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Find the project root and Python environment ([`detector`]).
//! 3. Load the policy ([`config::locate_config`], [`config::load_policy`]).
//! 4. Read installed distributions ([`provider::site_packages`]).
//! 5. Normalize declared licenses ([`license::normalize`]).
//! 6. Evaluate license, ban, and source checks ([`evaluator`]).
//! 7. Render the requested report ([`report`]).
//! 8. Exit `0` (clean) or `1` (at least one [`models::Outcome::Fail`]).

mod cli;
mod config;
mod detector;
mod evaluator;
mod license;
mod models;
mod policy;
mod provider;
mod report;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{CheckScope, Cli, Command, ReportFormat};
use config::{load_policy, locate_config, write_template, ConfigError};
use detector::{detect_environment, find_project_root};
use evaluator::{evaluate_all, evaluate_category};
use models::{CheckCategory, PackageRecord};
use policy::Policy;
use provider::site_packages::SitePackagesProvider;
use provider::PackageProvider;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let project_root = find_project_root(&cwd);
    tracing::debug!(root = %project_root.display(), "resolved project root");

    match cli.command {
        Command::Init { force } => {
            let path = write_template(&project_root, force)?;
            eprintln!("  {} wrote {}", "→".cyan(), path.display());
        }
        Command::List {
            show_raw_license,
            report: format,
        } => {
            // The policy is optional here; it only contributes clarifications.
            let policy = match locate_config(&project_root, cli.config.as_deref()) {
                Ok(path) => Some(load_policy(&path)?),
                Err(ConfigError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            };
            let (env, packages) = installed_packages(cli.env.as_deref(), &project_root)?;
            let rows = report::listings(&packages, policy.as_ref());

            match format {
                ReportFormat::Terminal => {
                    report::terminal::render_packages(&rows, &env, show_raw_license)
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Command::Check {
            scope,
            strict,
            quiet,
            report: format,
        } => {
            let path = locate_config(&project_root, cli.config.as_deref())?;
            let policy = load_policy(&path)?;
            let (env, packages) = installed_packages(cli.env.as_deref(), &project_root)?;
            if !quiet {
                eprintln!(
                    "  {} checking {} packages against {}",
                    "→".cyan(),
                    packages.len(),
                    path.display()
                );
            }

            let result = run_checks(&packages, policy, scope, strict);

            match format {
                ReportFormat::Terminal => {
                    report::terminal::render(&result, &env, cli.verbose > 0, quiet)
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }

            if result.failed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Log level from `-v` count; `RUST_LOG` takes precedence when set.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn installed_packages(
    explicit_env: Option<&Path>,
    project_root: &Path,
) -> Result<(PathBuf, Vec<PackageRecord>)> {
    let env = detect_environment(explicit_env, project_root)?;
    let packages = SitePackagesProvider::for_environment(&env)?.packages()?;
    tracing::info!(env = %env.display(), count = packages.len(), "read installed packages");
    Ok((env, packages))
}

/// `--strict` forces strict mode on every selected category.
fn run_checks(
    packages: &[PackageRecord],
    policy: Policy,
    scope: CheckScope,
    strict: bool,
) -> models::Report {
    match scope.categories().as_slice() {
        [category] => evaluate_category(packages, &policy, *category, strict.then_some(true)),
        _ => {
            let policy = if strict {
                CheckCategory::ALL
                    .iter()
                    .fold(policy, |policy, category| policy.with_strict(*category, true))
            } else {
                policy
            };
            evaluate_all(packages, &policy)
        }
    }
}
