//! Command line front end for climeval.
//!
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use climeval::{
    config::ComputeConfig, guess_format, load_config, open_dataset, render_table, Dataset,
    Evaluation, Format,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "climeval")]
#[command(about = "Evaluate downscaled climate model output against reference data")]
#[command(version)]
struct Cli {
    /// Log verbosity (trace, debug, info, warn, error). RUST_LOG takes precedence when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an evaluation and print its results
    Run {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Prefix of the files written to the output directory
        #[arg(long, default_value = "evaluation")]
        name: String,

        /// Print the results without writing anything
        #[arg(long)]
        no_save: bool,
    },

    /// Check a configuration file without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show the dimensions, coordinates and variables of a dataset
    Inspect {
        path: PathBuf,

        /// Guessed from the path when omitted
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Zarr,
    Netcdf,
}

impl From<FormatArg> for Format {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Zarr => Format::Zarr,
            FormatArg::Netcdf => Format::Netcdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            config,
            name,
            no_save,
        } => run(&config, &name, no_save).await,
        Command::Validate { config } => validate(&config),
        Command::Inspect { path, format } => inspect(&path, format.map(Format::from)).await,
    }
}

async fn run(config: &Path, name: &str, no_save: bool) -> Result<()> {
    let config = load_config(config)
        .with_context(|| format!("invalid configuration {}", config.display()))?;
    let mut evaluation = Evaluation::new(config)?;
    let results = evaluation.run().await.context("evaluation failed")?;
    print!("{}", render_table(&results));

    if !no_save {
        let written = evaluation
            .save(&results, name)
            .context("failed to save results")?;
        for path in written {
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

fn validate(config: &Path) -> Result<()> {
    let config = load_config(config)
        .with_context(|| format!("invalid configuration {}", config.display()))?;
    let metrics: Vec<&str> = config
        .metrics
        .all_metrics()
        .iter()
        .map(|metric| metric.name.as_str())
        .collect();
    info!(project = %config.project_name, "Configuration is valid");
    println!("{}: {} metric(s): {}", config.project_name, metrics.len(), metrics.join(", "));

    Ok(())
}

async fn inspect(path: &Path, format: Option<Format>) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => guess_format(path)?,
    };
    let dataset = open_dataset(path, format, &[], &ComputeConfig::default())
        .await
        .with_context(|| format!("can't read {}", path.display()))?;
    print!("{}", describe(path, format, &dataset));

    Ok(())
}

fn describe(path: &Path, format: Format, dataset: &Dataset) -> String {
    let mut lines = vec![format!("{} ({format})", path.display())];

    lines.push("dimensions:".to_string());
    for (dim, len) in dataset.sizes() {
        lines.push(format!("  {dim} = {len}"));
    }

    lines.push("coordinates:".to_string());
    for (name, coord) in &dataset.coords {
        let range = match (coord.values.iter().next(), coord.values.iter().last()) {
            (Some(first), Some(last)) => format!("{first} .. {last}"),
            _ => "empty".to_string(),
        };
        let units = coord
            .attrs
            .get("units")
            .and_then(|units| units.as_text())
            .map(|units| format!(" [{units}]"))
            .unwrap_or_default();
        lines.push(format!("  {name}: {range}{units}"));
    }

    lines.push("variables:".to_string());
    for (name, variable) in &dataset.variables {
        lines.push(format!("  {name}({})", variable.dims.join(", ")));
    }

    let mut text = lines.join("\n");
    text.push('\n');

    text
}
