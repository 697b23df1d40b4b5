//! fleet-teardown: remove every cloud resource of the IoT training fleet
//!
//! Runs in dry-run mode unless `--execute` is given, and never deletes a
//! resource it cannot positively identify as fleet-owned.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use fleet_teardown::aws::{AwsContext, AwsFleet, get_current_account_id};
use fleet_teardown::config::{AwsSettings, PacingConfig, SelectionConfig, TeardownConfig};
use fleet_teardown::orchestrator::FleetTeardown;
use fleet_teardown::report::scan_table;
use fleet_teardown_common::ResourceKind;
use fleet_teardown_common::defaults::{DEFAULT_BUDGET_FACTOR, DEFAULT_CONCURRENCY, DEFAULT_REGION};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fleet-teardown")]
#[command(about = "Tear down the cloud resources of an IoT training fleet")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// Extra device name prefix treated as fleet-owned
    #[arg(long)]
    prefix: Option<String>,

    /// Comma-separated categories to process (default: all)
    #[arg(long, value_delimiter = ',')]
    only: Vec<ResourceKind>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

/// Arguments for the cleanup command
#[derive(clap::Args, Debug)]
struct CleanupArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Actually delete resources (default is dry-run)
    #[arg(long)]
    execute: bool,

    /// Workers per category
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Fraction of each documented provider limit to use, in (0, 1)
    #[arg(long, default_value_t = DEFAULT_BUDGET_FACTOR)]
    budget_factor: f64,
}

impl From<&CommonArgs> for TeardownConfig {
    fn from(args: &CommonArgs) -> Self {
        Self {
            aws: AwsSettings {
                region: args.region.clone(),
                aws_profile: args.aws_profile.clone(),
            },
            pacing: PacingConfig::default(),
            selection: SelectionConfig {
                only: args.only.clone(),
                custom_prefix: args.prefix.clone(),
            },
            dry_run: true,
        }
    }
}

impl From<&CleanupArgs> for TeardownConfig {
    fn from(args: &CleanupArgs) -> Self {
        Self {
            pacing: PacingConfig {
                budget_factor: args.budget_factor,
                concurrency: args.concurrency,
            },
            dry_run: !args.execute,
            ..TeardownConfig::from(&args.common)
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete fleet-owned resources in dependency order
    Cleanup(CleanupArgs),

    /// List and classify resources without deleting anything
    Scan(CommonArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    // Reduce noise from the AWS SDK (show only warnings and errors)
    for target in ["aws_config", "aws_sdk_iot", "aws_smithy_runtime", "aws_runtime"] {
        if let Ok(directive) = format!("{target}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Command::Cleanup(cleanup_args) => handle_cleanup(&cleanup_args).await,
        Command::Scan(scan_args) => handle_scan(&scan_args).await,
    }
}

async fn connect(config: &TeardownConfig) -> Result<AwsFleet> {
    if let Some(profile) = &config.aws.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let ctx = AwsContext::with_profile(config.region(), config.aws.aws_profile.as_deref()).await;
    let account = get_current_account_id(&ctx).await?;
    info!(
        account_id = %account,
        region = %config.region(),
        dry_run = config.dry_run,
        "Target account"
    );
    AwsFleet::connect(&ctx).await
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            token.cancel();
        }
    });
}

/// Handle the cleanup command
async fn handle_cleanup(args: &CleanupArgs) -> Result<()> {
    let config = TeardownConfig::from(args);
    config.validate()?;

    let fleet = connect(&config).await?;
    let teardown = FleetTeardown::new(&fleet, &fleet, config)?;
    cancel_on_interrupt(teardown.cancel_token());

    let report = teardown.run().await;
    match args.common.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => {
            println!("{}", report.to_table());
            if report.dry_run {
                println!("\nDry run only. Re-run with --execute to delete.");
            }
        }
    }

    if report.interrupted {
        bail!("Teardown interrupted before all steps ran");
    }
    if !report.is_clean() {
        bail!(
            "{} resources failed to delete, {} categories could not be listed",
            report.total_failed(),
            report.unlisted.len()
        );
    }
    Ok(())
}

/// Handle the scan command
async fn handle_scan(args: &CommonArgs) -> Result<()> {
    let config = TeardownConfig::from(args);
    config.validate()?;

    let fleet = connect(&config).await?;
    let rows = FleetTeardown::new(&fleet, &fleet, config)?.scan().await;

    if rows.is_empty() {
        println!("No resources found.");
        return Ok(());
    }
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => {
            let owned = rows.iter().filter(|r| r.classification.is_fleet_owned).count();
            println!("{}", scan_table(&rows));
            println!("\n{owned} of {} resources are fleet-owned", rows.len());
        }
    }
    Ok(())
}
