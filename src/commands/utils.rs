use crate::output::read_report;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a report JSON file
pub fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Log: {}", report.log_file);
    println!("  Spans: {}", report.summary.span_count);
    println!("  Duration: {:.2} ms", report.summary.duration_ms);
    println!("  Rows: {}", report.row_count());
    println!("  Classes: {}", report.classes.len());
    println!("  Diagnostics: {}", report.diagnostics.len());

    if report.version != SCHEMA_VERSION {
        println!(
            "  ⚠ Report schema v{} differs from current v{}",
            report.version, SCHEMA_VERSION
        );
    }

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Apex Trace Studio Report Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string          - Schema version (e.g., '1.0.0')");
        println!("  log_file: string         - Path of the analysed log");
        println!("  generated_at: string     - RFC 3339 timestamp");
        println!("  summary: object          - Whole-log statistics");
        println!("    span_count: number     - Spans below the root");
        println!("    max_depth: number      - Deepest nesting");
        println!("    totals: object         - heap, rows, dml_rows, dml, soql, sosl, callouts");
        println!("    duration_ms: number    - Log duration");
        println!("    by_kind: object        - Count and self time per span kind");
        println!("  hot_spans: array         - Spans with the most self time");
        println!("  rows: array              - Flattened profiler table");
        println!("    key: string            - Dotted sibling path (e.g. '1.2.4')");
        println!("    level: number          - Tree depth, root = 1");
        println!("    metrics/totals: object - Self and rolled-up metrics");
        println!("  classes: array           - Discovered Apex classes and triggers");
        println!("  diagnostics: array       - Non-fatal parse problems ({{line, type, ...}})");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Apex Trace Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Execution trace reconstruction and profiling for Apex debug logs.");
}
