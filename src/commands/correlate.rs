//! Correlate command implementation.
//!
//! Prints a class's source with every line the log executed highlighted,
//! and optionally the log excerpts behind one source line.

use super::models::CorrelateArgs;
use crate::correlate::{
    ClassCorrelator, ClassSource, DirectorySourceFetcher, HttpSourceFetcher, LineState,
    SourceFetcher,
};
use crate::parser::{parse_log, ParsedLog};
use anyhow::{Context, Result};
use colored::Colorize;
use log::info;

/// Execute the correlate command
///
/// **Public** - main entry point called from main.rs
pub fn execute_correlate(args: CorrelateArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.log_file)
        .with_context(|| format!("Failed to read log file {}", args.log_file.display()))?;
    let parsed = parse_log(&text);

    let class_name = match args.class_name.as_deref().or(parsed.classes.first()) {
        Some(name) => name.to_string(),
        None => anyhow::bail!("No Apex classes found in {}", args.log_file.display()),
    };

    if let Some(dir) = &args.source_dir {
        correlate_with(DirectorySourceFetcher::new(dir), &args, &parsed, &class_name)
    } else if let Some(url) = &args.source_url {
        let fetcher = HttpSourceFetcher::with_timeout(url.as_str(), args.config.source_timeout())
            .context("Failed to create source client")?;
        correlate_with(fetcher, &args, &parsed, &class_name)
    } else {
        anyhow::bail!("Either a source directory or a source URL is required")
    }
}

fn correlate_with<F: SourceFetcher>(
    fetcher: F,
    args: &CorrelateArgs,
    parsed: &ParsedLog,
    class_name: &str,
) -> Result<()> {
    let mut correlator = ClassCorrelator::new(fetcher);
    let source = correlator
        .select(&parsed.root, class_name)
        .with_context(|| format!("Failed to load source for {}", class_name))?;

    info!(
        "{}: {} of {} lines executed",
        class_name,
        source.executed_count(),
        source.lines.len()
    );
    println!("{}", render_listing(source));

    if let Some(line) = args.line {
        let spans = correlator.spans_at_line(&parsed.root, line);
        println!();
        println!("{} span(s) at {}:{}", spans.len(), class_name, line);
        for span in spans {
            println!(
                "  #{:<6} {:<24} {:>10.2} ms  log lines {}-{}",
                span.index,
                span.kind.label(),
                span.duration,
                span.log_start_line,
                span.log_end_line
            );
        }
    }

    Ok(())
}

/// Numbered source listing; executed lines green, error lines red
pub fn render_listing(source: &ClassSource) -> String {
    let mut out = Vec::with_capacity(source.lines.len() + 1);
    out.push(format!("── {} ──", source.name).bold().to_string());

    for line in &source.lines {
        let text = format!("{:>5} │ {}", line.number, line.text);
        let rendered = match line.state {
            LineState::NotExecuted => text.dimmed(),
            LineState::Executed => text.green(),
            LineState::Error => text.red().bold(),
        };
        out.push(rendered.to_string());
    }

    out.join("\n")
}

/// Validate correlate arguments
pub fn validate_correlate_args(args: &CorrelateArgs) -> Result<()> {
    if args.log_file.as_os_str().is_empty() {
        anyhow::bail!("Log file cannot be empty");
    }

    match (&args.source_dir, &args.source_url) {
        (None, None) => anyhow::bail!("Either --source-dir or --source-url is required"),
        (Some(_), Some(_)) => anyhow::bail!("--source-dir and --source-url are mutually exclusive"),
        (None, Some(url)) if !url.starts_with("http://") && !url.starts_with("https://") => {
            anyhow::bail!("Source URL must start with http:// or https://")
        }
        _ => {}
    }

    if args.line == Some(0) {
        anyhow::bail!("Line numbers start at 1");
    }

    Ok(())
}
