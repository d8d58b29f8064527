//! taskflow CLI - inspect serialized flows

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;

use taskflow::config::{self, TaskflowConfig};
use taskflow::error::{FixSuggestion, FlowError};
use taskflow::Flow;

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "taskflow - inspect flow documents")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/taskflow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a flow document loads (ids, edges, acyclicity, schedule)
    Validate {
        /// Path to a .json or .yaml flow document
        file: PathBuf,
    },

    /// Print tasks in execution order
    Order {
        /// Path to a .json or .yaml flow document
        file: PathBuf,
    },

    /// Print upcoming run instants
    Schedule {
        /// Path to a .json or .yaml flow document
        file: PathBuf,

        /// Reference instant (RFC 3339), defaults to now
        #[arg(short, long, value_parser = parse_instant)]
        after: Option<DateTime<Utc>>,

        /// Number of instants to print
        #[arg(short, long, default_value = "5")]
        count: usize,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|_| match cli.command {
        Commands::Validate { file } => validate_flow(&file),
        Commands::Order { file } => print_order(&file),
        Commands::Schedule { file, after, count } => print_schedule(&file, after, count),
    });

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<(), FlowError> {
    let loaded = match path {
        Some(path) => TaskflowConfig::load_from(path)?,
        None => TaskflowConfig::load()?,
    };
    config::install(loaded.with_env());
    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

/// Read a flow document, picking the decoder from the file extension
fn read_flow(file: &Path) -> Result<Flow, FlowError> {
    let content = fs::read_to_string(file)?;
    let is_yaml = file
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yaml" | "yml"));

    if is_yaml {
        Flow::from_yaml(&content)
    } else {
        Flow::deserialize(&content)
    }
}

fn validate_flow(file: &Path) -> Result<(), FlowError> {
    let flow = read_flow(file)?;

    println!("{} Flow '{}' is valid", "✓".green(), file.display());
    println!("  Name: {}/{} (version {})", flow.namespace(), flow.name(), flow.version());
    if let Some(id) = flow.id() {
        println!("  Id: {}", id);
    }
    println!("  Tasks: {}", flow.len());
    println!("  Edges: {}", flow.edges().len());
    println!(
        "  Schedule: {}",
        flow.schedule().map_or("(none)", |schedule| schedule.type_tag())
    );

    Ok(())
}

fn print_order(file: &Path) -> Result<(), FlowError> {
    let flow = read_flow(file)?;

    println!("{} {}", "→".cyan(), flow.name().cyan().bold());
    for (position, task) in flow.topological_order()?.iter().enumerate() {
        let mut upstream: Vec<String> = flow
            .upstream_tasks(task)
            .iter()
            .map(|dep| dep.to_string())
            .collect();
        upstream.sort();
        if upstream.is_empty() {
            println!("  {:>3}. {}", position + 1, task);
        } else {
            println!(
                "  {:>3}. {} {}",
                position + 1,
                task,
                format!("(after {})", upstream.join(", ")).dimmed()
            );
        }
    }

    Ok(())
}

fn print_schedule(
    file: &Path,
    after: Option<DateTime<Utc>>,
    count: usize,
) -> Result<(), FlowError> {
    let flow = read_flow(file)?;

    let Some(schedule) = flow.schedule() else {
        println!("{} Flow '{}' has no schedule", "·".dimmed(), flow.name());
        return Ok(());
    };

    let runs = match after {
        Some(after) => schedule.next_n(after, count),
        None => schedule.next_n_from_now(count),
    };
    println!(
        "{} Next {} run(s) of '{}' ({})",
        "→".cyan(),
        runs.len(),
        flow.name().cyan().bold(),
        schedule.type_tag()
    );
    for run in runs {
        println!("  {}", run.to_rfc3339());
    }

    Ok(())
}
