//! Apex Trace Studio CLI
//!
//! Reconstructs execution traces from Apex debug logs.
//! Generates profiler reports, flame graphs, and source coverage views.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use apex_trace_studio::commands::{
    display_schema, display_version, execute_analyze, execute_correlate, validate_args,
    validate_correlate_args, validate_report_file, AnalyzeArgs, CorrelateArgs,
};
use apex_trace_studio::flamegraph::FlamegraphConfig;
use apex_trace_studio::utils::config::{load_config, AnalyzerConfig};

/// Apex Trace Studio - Execution profiling for Apex debug logs
#[derive(Parser, Debug)]
#[command(name = "apex-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "APEX_TRACE_CONFIG")]
    config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a debug log
    Analyze {
        /// Debug log file
        log: PathBuf,

        /// Output path for the JSON report (placed in artifacts/ by default)
        #[arg(short, long, default_value = "artifacts/report.json")]
        output: PathBuf,

        /// Output path for the SVG flame graph (placed in artifacts/ by default)
        #[arg(short, long, default_missing_value = "artifacts/flamegraph.svg", num_args = 0..=1)]
        flamegraph: Option<PathBuf>,

        /// Number of hottest spans to include
        #[arg(long, default_value = "20")]
        top_spans: usize,

        /// Flame graph title
        #[arg(long)]
        title: Option<String>,

        /// Flame graph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,

        /// Keep only spans with this metric: SOQL, SOSL, DML, Callout, Rows, Heap
        #[arg(long = "type")]
        type_filter: Option<String>,

        /// Keep only spans whose title contains this text
        #[arg(long)]
        search: Option<String>,

        /// Treat --search as a regular expression
        #[arg(long)]
        regex: bool,
    },

    /// Show a class's source with executed lines highlighted
    Correlate {
        /// Debug log file
        log: PathBuf,

        /// Class or trigger name (defaults to the first one in the log)
        #[arg(long)]
        class: Option<String>,

        /// Directory with .cls / .trigger files
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Base URL serving class bodies at {url}/{Class}
        #[arg(long)]
        source_url: Option<String>,

        /// List the spans that executed this source line
        #[arg(long)]
        line: Option<u32>,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            log,
            mut output,
            mut flamegraph,
            top_spans,
            title,
            width,
            summary,
            type_filter,
            search,
            regex,
        } => {
            // Ensure outputs go to artifacts/ if no directory is specified
            let artifacts_dir = PathBuf::from("artifacts");

            if output.parent().map(|p| p.as_os_str().is_empty()).unwrap_or(true) {
                output = artifacts_dir.join(output);
            }

            if let Some(ref mut fg) = flamegraph {
                if fg.parent().map(|p| p.as_os_str().is_empty()).unwrap_or(true) {
                    *fg = artifacts_dir.join(&fg);
                }
            }

            let fg_config = flamegraph.as_ref().map(|_| {
                let mut config = FlamegraphConfig::new().with_width(width);
                if let Some(title_str) = title {
                    config = config.with_title(title_str);
                }
                config
            });

            let args = AnalyzeArgs {
                log_file: log,
                output_json: output,
                output_svg: flamegraph,
                top_spans,
                flamegraph_config: fg_config,
                print_summary: summary,
                type_filter,
                search,
                regex,
                config,
            };

            validate_args(&args)?;
            execute_analyze(args)?;
        }

        Commands::Correlate {
            log,
            class,
            source_dir,
            source_url,
            line,
        } => {
            let args = CorrelateArgs {
                log_file: log,
                class_name: class,
                source_dir,
                source_url,
                line,
                config,
            };

            validate_correlate_args(&args)?;
            execute_correlate(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
