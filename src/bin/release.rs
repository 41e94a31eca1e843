//! release CLI
//!
//! Publishes a set of interdependent packages in dependency order

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use release_publisher::registry;
use release_publisher::telemetry::{init_tracing, level_for_verbosity};
use release_publisher::{
    ConfigError, ConfigLoadOptions, ConfigLoader, ConfigOverrides, ReleaseConfig, ReleaseError,
    ReleaseRunner,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Dependency-ordered multi-package release publisher
#[derive(Parser)]
#[command(name = "release")]
#[command(version)]
#[command(about = "Dependency-ordered multi-package release publisher", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish every package in dependency order
    Publish {
        /// Config file (defaults to ./.release-config.yaml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Go through the whole release without touching a registry
        #[arg(long)]
        dry_run: bool,

        /// How long a package may take to become resolvable (e.g. 10m)
        #[arg(long, value_parser = humantime::parse_duration)]
        max_wait: Option<Duration>,

        /// Delay between resolvability polls (e.g. 5s)
        #[arg(long, value_parser = humantime::parse_duration)]
        poll_interval: Option<Duration>,

        /// Packages published at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Start nothing new after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Also write the JSON report to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Report format on stdout
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the publish order without publishing
    Plan {
        /// Config file (defaults to ./.release-config.yaml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate the configuration and the package graph
    Check {
        /// Config file (defaults to ./.release-config.yaml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.log_json, level_for_verbosity(cli.verbose));

    let env: HashMap<String, String> = std::env::vars().collect();

    match cli.command {
        Commands::Publish {
            config,
            dry_run,
            max_wait,
            poll_interval,
            concurrency,
            fail_fast,
            report,
            format,
        } => {
            let overrides = ConfigOverrides {
                dry_run: dry_run.then_some(true),
                max_wait,
                poll_interval,
                concurrency,
                fail_fast: fail_fast.then_some(true),
            };
            publish_command(config, overrides, env, report, format).await
        }
        Commands::Plan { config, format } => plan_command(config, env, format).await,
        Commands::Check { config } => check_command(config, env).await,
    }
}

async fn publish_command(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
    env: HashMap<String, String>,
    report_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<i32> {
    let config = match load_config(config_path, overrides, env.clone()).await {
        Ok(config) => config,
        Err(e) => return Ok(print_error(&ReleaseError::from(e))),
    };

    let registry = match registry::from_config(&config, &env) {
        Ok(registry) => registry,
        Err(e) => return Ok(print_error(&e)),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling release");
            on_signal.cancel();
        }
    });

    let report = match ReleaseRunner::run(&config, registry, cancel).await {
        Ok(report) => report,
        Err(e) => return Ok(print_error(&e)),
    };

    match format {
        OutputFormat::Text => println!("{}", report.render_lines()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    eprintln!("{}", report.render_summary());

    if let Some(path) = report_path {
        if let Err(e) = report.write_json(&path).await {
            print_error(&e);
            return Ok(1);
        }
    }

    Ok(report.exit_code())
}

async fn plan_command(
    config_path: Option<PathBuf>,
    env: HashMap<String, String>,
    format: OutputFormat,
) -> Result<i32> {
    let config = match load_config(config_path, ConfigOverrides::default(), env).await {
        Ok(config) => config,
        Err(e) => return Ok(print_error(&ReleaseError::from(e))),
    };

    let graph = match ReleaseRunner::plan(&config) {
        Ok(graph) => graph,
        Err(e) => return Ok(print_error(&ReleaseError::from(e))),
    };

    let steps: Vec<_> = graph
        .topological_indices()
        .iter()
        .enumerate()
        .map(|(step, &index)| {
            let spec = graph.spec(index);
            serde_json::json!({
                "step": step + 1,
                "level": graph.level_of(index),
                "name": spec.name(),
                "version": spec.id.version.to_string(),
                "depends_on": spec.depends_on,
            })
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        OutputFormat::Text => {
            for &index in graph.topological_indices() {
                let spec = graph.spec(index);
                println!(
                    "level={} package={} version={} depends_on={}",
                    graph.level_of(index),
                    spec.name(),
                    spec.id.version,
                    spec.depends_on.join(",")
                );
            }
        }
    }

    Ok(0)
}

async fn check_command(config_path: Option<PathBuf>, env: HashMap<String, String>) -> Result<i32> {
    println!("\n🔍 Release Check\n");

    let config = match load_config(config_path, ConfigOverrides::default(), env).await {
        Ok(config) => config,
        Err(e) => return Ok(print_error(&ReleaseError::from(e))),
    };

    let validation = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&validation));
    if !validation.valid {
        return Ok(2);
    }

    match ReleaseRunner::plan(&config) {
        Ok(graph) => {
            let order: Vec<_> = graph.topological_order().iter().map(|p| p.name()).collect();
            println!("✅ {} package(s): {}", graph.len(), order.join(" -> "));
            Ok(0)
        }
        Err(e) => Ok(print_error(&ReleaseError::from(e))),
    }
}

async fn load_config(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
    env: HashMap<String, String>,
) -> Result<ReleaseConfig, ConfigError> {
    ConfigLoader::load(ConfigLoadOptions {
        config_path,
        project_path: PathBuf::from("."),
        overrides,
        env,
    })
    .await
}

/// Print `error` with its suggested actions; returns the exit code
fn print_error(error: &ReleaseError) -> i32 {
    eprintln!("\n❌ [{}] {}", error.code(), error);

    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\n💡 Suggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }

    error.exit_code()
}
