//! Messaging upgrade console
//!
//! Drives the upgrade view against the in-memory provider and prints each
//! distinct rendering.

mod config;
mod driver;
mod render;
mod session;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::ConsoleConfig;
use driver::Driver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use upgrade_core::{UpgradeController, ViewStatus};
use upgrade_port::InMemorySimulator;

fn cli() -> Command {
    Command::new("upgrade-console")
        .version(upgrade_core::VERSION)
        .about("Messaging upgrade trial console")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("run")
                .about("Load the upgrade status and act on it")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .value_parser(value_parser!(u64))
                        .help("Provider latency in milliseconds"),
                )
                .arg(
                    Arg::new("fail-fetches")
                        .long("fail-fetches")
                        .value_parser(value_parser!(u32))
                        .help("Number of leading status fetches that fail"),
                )
                .arg(
                    Arg::new("fail-activations")
                        .long("fail-activations")
                        .value_parser(value_parser!(u32))
                        .help("Number of leading activations that fail"),
                )
                .arg(
                    Arg::new("activate")
                        .long("activate")
                        .action(ArgAction::SetTrue)
                        .help("Activate the trial when none is active"),
                )
                .arg(
                    Arg::new("max-retries")
                        .long("max-retries")
                        .default_value("1")
                        .value_parser(value_parser!(u32))
                        .help("Manual retries after a failed fetch or activation"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the console configuration from the file and command-line overrides
fn resolve_config(args: &ArgMatches) -> anyhow::Result<ConsoleConfig> {
    let mut config = ConsoleConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(latency) = args.get_one::<u64>("latency-ms") {
        config.simulator = config.simulator.with_latency_ms(*latency);
    }
    if let Some(count) = args.get_one::<u32>("fail-fetches") {
        config.simulator = config.simulator.with_fail_fetches(*count);
    }
    if let Some(count) = args.get_one::<u32>("fail-activations") {
        config.simulator = config.simulator.with_fail_activations(*count);
    }
    Ok(config)
}

async fn run(args: &ArgMatches) -> anyhow::Result<ViewStatus> {
    let config = resolve_config(args)?;
    let max_retries = args.get_one::<u32>("max-retries").copied().unwrap_or(1);
    let mut driver = Driver::new(args.get_flag("activate"), max_retries);

    tracing::info!(
        key = %config.upgrade.query_key,
        latency_ms = config.simulator.latency_ms,
        fail_fetches = config.simulator.fail_fetches,
        fail_activations = config.simulator.fail_activations,
        "starting upgrade console"
    );

    let simulator = Arc::new(InMemorySimulator::new(config.simulator.clone()));
    let mut controller = UpgradeController::from_config(simulator.clone(), &config.upgrade)
        .context("creating upgrade controller")?;

    let mut stdout = std::io::stdout().lock();
    let status = session::run_session(&mut controller, &mut driver, &mut stdout).await?;

    tracing::info!(
        status = %status,
        fetch_calls = simulator.fetch_calls(),
        activate_calls = simulator.activate_calls(),
        retries = driver.retries(),
        "upgrade console finished"
    );
    Ok(status)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run", args)) => {
            let status = run(args).await?;
            std::process::exit(if status == ViewStatus::Failed { 1 } else { 0 });
        }
        _ => unreachable!("subcommand is required"),
    }
}
