// SPDX-License-Identifier: GPL-3.0-only

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storage_contracts::{CommandRunner, StorageError, VolumeQuery};
use storage_lvm::{Plan, Reconciler};
use storage_types::DesiredVolumeSpec;
use storage_sys::{Blkid, LvmTools, SystemFilesystems, SystemRunner};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{ConfigError, VolumeConfig};

/// EX_NOPERM
const EXIT_NOT_ROOT: i32 = 77;

/// Converge declared LVM logical volumes onto the live system
#[derive(Parser)]
#[command(name = "lvm-converge", version)]
#[command(about = "Create, extend, format and mount declared LVM logical volumes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge every declared volume, stopping at the first failure
    Apply {
        /// TOML file with a [[volumes]] array
        #[arg(long, short)]
        config: PathBuf,
        /// Only converge this volume (`name` or `group/name`)
        #[arg(long)]
        volume: Option<String>,
    },
    /// Show what apply would run without changing anything
    Plan {
        #[arg(long, short)]
        config: PathBuf,
        #[arg(long)]
        volume: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the live volume groups as JSON
    Inspect {
        /// Only show this volume group
        #[arg(long)]
        group: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("lvm-converge must run as root")]
struct NotRoot;

fn main() -> ExitCode {
    // Logs go to stderr so plan/inspect output on stdout stays parseable
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lvm_converge=info,storage_lvm=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{:#}", error);
            eprintln!("lvm-converge: {:#}", error);
            ExitCode::from(exit_code(&error))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Apply { config, volume } => {
            if unsafe { libc::geteuid() } != 0 {
                return Err(NotRoot.into());
            }
            let config = VolumeConfig::load(&config)?;
            let specs = config.select(volume.as_deref())?;

            require_tools(&specs)?;
            let reconciler = reconciler();

            for spec in specs {
                let outcome = reconciler
                    .converge(spec)
                    .with_context(|| format!("failed to converge {}", spec.display_name()))?;
                println!(
                    "{}: {} ({})",
                    outcome.volume,
                    outcome.action,
                    if outcome.changed { "changed" } else { "unchanged" }
                );
            }
            Ok(())
        }
        Commands::Plan {
            config,
            volume,
            json,
        } => {
            let config = VolumeConfig::load(&config)?;
            let specs = config.select(volume.as_deref())?;

            require_tools(&specs)?;
            let reconciler = reconciler();

            let plans = specs
                .into_iter()
                .map(|spec| {
                    reconciler
                        .plan(spec)
                        .with_context(|| format!("failed to plan {}", spec.display_name()))
                })
                .collect::<Result<Vec<_>>>()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                plans.iter().for_each(print_plan);
            }
            Ok(())
        }
        Commands::Inspect { group } => {
            LvmTools::require_tools().map_err(StorageError::from)?;
            let tools = LvmTools::new(runner());

            let groups = match group {
                Some(name) => vec![
                    tools
                        .get_volume_group(&name)?
                        .ok_or(StorageError::GroupNotFound { group: name })?,
                ],
                None => tools.list_volume_groups()?,
            };
            println!("{}", serde_json::to_string_pretty(&groups)?);
            Ok(())
        }
    }
}

/// Check every tool the selected volumes will run before touching any of them
fn require_tools(specs: &[&DesiredVolumeSpec]) -> Result<(), StorageError> {
    LvmTools::require_tools()?;
    SystemFilesystems::require_tools(
        specs.iter().any(|spec| spec.filesystem.is_some()),
        specs.iter().any(|spec| spec.mount_point.is_some()),
    )?;
    Ok(())
}

fn runner() -> Arc<dyn CommandRunner> {
    Arc::new(SystemRunner::new())
}

fn reconciler() -> Reconciler {
    let runner = runner();
    Reconciler::new(
        Arc::new(LvmTools::new(runner.clone())),
        runner.clone(),
        Arc::new(Blkid::new(runner.clone())),
        Arc::new(SystemFilesystems::new(runner)),
    )
}

fn print_plan(plan: &Plan) {
    println!("{}: {}", plan.volume, plan.action);
    for command in plan.commands() {
        println!("    {}", command);
    }
    if let Some(mount) = &plan.mount {
        println!("    mount on {}", mount.location);
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    let code = if let Some(error) = error.downcast_ref::<StorageError>() {
        error.kind().exit_code()
    } else if let Some(error) = error.downcast_ref::<ConfigError>() {
        error.exit_code()
    } else if error.downcast_ref::<NotRoot>().is_some() {
        EXIT_NOT_ROOT
    } else {
        1
    };
    u8::try_from(code).unwrap_or(1)
}
