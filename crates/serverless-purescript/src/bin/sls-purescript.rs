/// Serverless PureScript hook runner CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use serverless_purescript::{HOOKS, HandlerPatch, Plugin, Service};

#[derive(Parser, Debug)]
#[command(name = "sls-purescript")]
#[command(about = "Builds PureScript Lambda entrypoints around Serverless packaging")]
#[command(version)]
struct Args {
    /// Service root directory
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    service_path: PathBuf,

    /// Resolved service configuration (`serverless print --format json`)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, compile and write the entrypoints
    Compile {
        /// Also write the service with rewritten handlers
        #[arg(long, value_name = "FILE")]
        write_service: Option<PathBuf>,
    },
    /// Remove the generated entrypoints
    Cleanup,
    /// Compile for serverless-offline, then wait for Ctrl+C or the dev server
    Offline {
        /// Dev server command, cleaned up after when it exits
        #[arg(last = true, value_name = "CMD")]
        command: Vec<String>,
    },
    /// Run the action bound to a lifecycle hook (offline hooks wait for Ctrl+C)
    Hook {
        name: String,

        #[arg(long, value_name = "FILE")]
        write_service: Option<PathBuf>,
    },
    /// List the lifecycle hooks and their actions
    Hooks,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("sls-purescript failed: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Hooks => {
            for (hook, action) in HOOKS {
                println!("{:<45} {}", hook, action.as_str());
            }
        }
        Command::Compile { write_service } => {
            let mut plugin = load_plugin(&args.service_path, args.config.as_deref())?;
            let patch = plugin.compile().await?;
            report(&plugin, &patch, write_service.as_deref())?;
        }
        Command::Cleanup => {
            let plugin = load_plugin(&args.service_path, args.config.as_deref())?;
            plugin.cleanup().await?;
        }
        Command::Offline { command } => {
            let mut plugin = load_plugin(&args.service_path, args.config.as_deref())?;
            let patch = plugin.offline_compile().await?;
            report(&plugin, &patch, None)?;
            if command.is_empty() {
                // The watcher only exists while this process does.
                plugin.wait_for_interrupt().await;
            } else {
                run_dev_server(&plugin, &command, &args.service_path).await?;
            }
        }
        Command::Hook {
            name,
            write_service,
        } => {
            let mut plugin = load_plugin(&args.service_path, args.config.as_deref())?;
            let patch = plugin.run_hook(&name).await?;
            report(&plugin, &patch, write_service.as_deref())?;
            // Offline hooks stay up until Ctrl+C; others return at once.
            plugin.wait_for_interrupt().await;
        }
    }

    Ok(())
}

/// Load the service, defaulting to `<service>/serverless.json`.
fn load_plugin(service_path: &Path, config: Option<&Path>) -> anyhow::Result<Plugin> {
    let config = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| service_path.join("serverless.json"));
    let service = Service::load(&config, service_path)?;
    Ok(Plugin::new(service)?)
}

/// Print the handler patch and optionally persist the patched service.
fn report(plugin: &Plugin, patch: &HandlerPatch, write_service: Option<&Path>) -> anyhow::Result<()> {
    if patch.is_empty() {
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&patch.to_json())?);

    if let Some(path) = write_service {
        let json = plugin.service().to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write service to {}", path.display()))?;
        info!("Wrote patched service to {}", path.display());
    }

    Ok(())
}

/// Run the dev server until it exits or the user interrupts, then clean up.
async fn run_dev_server(plugin: &Plugin, command: &[String], cwd: &Path) -> anyhow::Result<()> {
    let (program, rest) = command
        .split_first()
        .context("Missing dev server command")?;

    let mut child = tokio::process::Command::new(program)
        .args(rest)
        .current_dir(cwd)
        .spawn()
        .with_context(|| format!("Failed to start dev server '{}'", program))?;

    let cancel = plugin.cancellation();
    tokio::select! {
        status = child.wait() => {
            info!("Dev server exited: {}", status?);
        }
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop dev server '{}': {}", program, e);
            }
        }
    }

    plugin.cleanup().await?;
    Ok(())
}
