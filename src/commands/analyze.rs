//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Reads the debug log
//! 2. Builds the span tree and rolls up metrics
//! 3. Applies the optional type / search filter
//! 4. Flattens the tree and ranks the hottest spans
//! 5. Generates the flame graph
//! 6. Writes output files

use super::models::AnalyzeArgs;
use crate::aggregator::{flatten, hot_spans, summarize, FlattenOptions};
use crate::filter::{apply_filter, SearchPattern, SpanFilter, TypeFilter};
use crate::flamegraph::{generate_flamegraph, generate_text_summary, project};
use crate::output::{write_report, write_svg, Report};
use crate::parser::{parse_log, ParsedLog};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
pub fn execute_analyze(args: AnalyzeArgs) -> Result<Report> {
    let start_time = Instant::now();

    info!("Analyzing log: {}", args.log_file.display());

    info!("Step 1/6: Reading log...");
    let text = std::fs::read_to_string(&args.log_file)
        .with_context(|| format!("Failed to read log file {}", args.log_file.display()))?;

    info!("Step 2/6: Building span tree...");
    let mut parsed = parse_log(&text);
    debug!(
        "Parsed {} physical lines into {} spans",
        parsed.line_count,
        parsed.root.span_count()
    );

    info!("Step 3/6: Applying filters...");
    let filter = build_filter(&args)?;
    if filter.is_active() {
        let visible = apply_filter(&mut parsed.root, &filter);
        info!("{} spans match the filter", visible);
    }

    info!("Step 4/6: Flattening and ranking spans...");
    let report = build_report(&args, &parsed, &filter)?;

    let svg_content = match &args.output_svg {
        Some(_) => {
            info!("Step 5/6: Generating flame graph...");
            let svg = generate_flamegraph(&project(&parsed.root), args.flamegraph_config.as_ref())
                .context("Failed to generate flame graph")?;
            Some(svg)
        }
        None => {
            info!("Step 5/6: Skipping flame graph generation (not requested)");
            None
        }
    };

    info!("Step 6/6: Writing output files...");
    write_report(&report, &args.output_json).context("Failed to write report JSON")?;
    info!("✓ Report written to: {}", args.output_json.display());

    if let (Some(svg), Some(svg_path)) = (svg_content, &args.output_svg) {
        write_svg(&svg, svg_path).context("Failed to write flame graph SVG")?;
        info!("✓ Flame graph written to: {}", svg_path.display());
    }

    if args.print_summary {
        println!("\n{}", "=".repeat(80));
        println!("LOG SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Log:         {}", args.log_file.display());
        println!("{}", report.summary.summary());
        println!("Classes:     {}", report.classes.join(", "));
        println!("Diagnostics: {}", report.diagnostics.len());
        println!(
            "\n{}",
            generate_text_summary(&report.hot_spans, report.summary.duration_ms)
        );
        println!("{}", "=".repeat(80));
    }

    info!(
        "Analysis completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(report)
}

/// Combine the CLI filter options into one filter
pub fn build_filter(args: &AnalyzeArgs) -> Result<SpanFilter> {
    let type_filter = args
        .type_filter
        .as_deref()
        .map(str::parse::<TypeFilter>)
        .transpose()?;

    let search = match args.search.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(term) if args.regex => Some(SearchPattern::regex(term)?),
        Some(term) => Some(SearchPattern::substring(term)),
    };

    Ok(SpanFilter {
        type_filter,
        search,
    })
}

/// Assemble the report for an already parsed (and filtered) log
pub fn build_report(args: &AnalyzeArgs, parsed: &ParsedLog, filter: &SpanFilter) -> Result<Report> {
    let options = FlattenOptions {
        include_hidden: !filter.is_active(),
        ..FlattenOptions::from(&args.config)
    };
    let table = flatten(&parsed.root, &options);
    debug!(
        "Flattened {} rows (max level {})",
        table.rows.len(),
        table.max_level
    );

    Ok(Report {
        version: SCHEMA_VERSION.to_string(),
        log_file: args.log_file.display().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        summary: summarize(&parsed.root),
        hot_spans: hot_spans(&parsed.root, args.top_spans),
        rows: table.rows,
        classes: parsed.classes.iter().map(str::to_string).collect(),
        diagnostics: parsed.diagnostics.clone(),
    })
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.log_file.as_os_str().is_empty() {
        anyhow::bail!("Log file cannot be empty");
    }

    if args.top_spans == 0 {
        anyhow::bail!("top_spans must be greater than 0");
    }

    if args.top_spans > 1000 {
        anyhow::bail!("top_spans is too large (max 1000)");
    }

    if let Some(name) = &args.type_filter {
        name.parse::<TypeFilter>()?;
    }

    if args.regex && args.search.is_none() {
        anyhow::bail!("--regex requires a search term");
    }

    args.config.validate()?;

    Ok(())
}
