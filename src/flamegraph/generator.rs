//! SVG flame graph generation.
//!
//! Manual SVG output (no flame graph crate) so that:
//! - Frames sit on a time axis: x is the span's start, width its duration
//! - Colours follow the span category (SOQL, DML, callouts...)
//! - Root at the bottom, like a classic flame graph

use super::projector::{FlameNode, FlameType};
use crate::aggregator::HotSpan;
use crate::utils::error::FlamegraphError;
use colored::{Color, Colorize};
use log::info;

const FRAME_HEIGHT: usize = 20;
const TITLE_MARGIN: usize = 30;
const LEGEND_HEIGHT: usize = 80;
const CHAR_WIDTH: f64 = 7.0;

/// Flame graph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Apex Execution Timeline".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Horizontal scale from milliseconds to pixels
struct Axis {
    origin: f64,
    px_per_ms: f64,
}

impl Axis {
    fn x(&self, ms: f64) -> f64 {
        (ms - self.origin).max(0.0) * self.px_per_ms
    }
}

/// Render a projected tree as SVG
pub fn generate_flamegraph(
    root: &FlameNode,
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if root.children.is_empty() {
        return Err(FlamegraphError::EmptyTree);
    }

    let config = config.cloned().unwrap_or_default();
    let width = config.width;
    info!(
        "Generating flame graph for {:.2} ms of execution",
        root.duration
    );

    let axis = Axis {
        origin: root.start,
        px_per_ms: width as f64 / root.duration.max(f64::EPSILON),
    };

    let max_depth = root.depth();
    let graph_height = max_depth * FRAME_HEIGHT;
    let total_height = graph_height + TITLE_MARGIN + LEGEND_HEIGHT;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, total_height, width, total_height
    ));
    svg.push_str(
        r#"<style>.func { font: 12px sans-serif; } .func:hover { stroke: black; stroke-width: 1; cursor: pointer; opacity: 0.9; }</style>"#,
    );
    svg.push_str(&format!(
        r#"<text x="{}" y="20" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        escape_xml(&config.title)
    ));

    render_node(root, 0, &axis, graph_height, &mut svg);
    render_legend(&mut svg, graph_height + TITLE_MARGIN);

    svg.push_str("</svg>");

    info!("Flame graph generated successfully ({} bytes)", svg.len());
    Ok(svg)
}

fn node_colour(kind: FlameType) -> &'static str {
    match kind {
        FlameType::Root => "rgb(100, 149, 237)",
        FlameType::CodeUnit => "rgb(72, 61, 139)",
        FlameType::Method => "rgb(34, 139, 34)",
        FlameType::SystemMethod => "rgb(143, 188, 143)",
        FlameType::Soql => "rgb(255, 140, 0)",
        FlameType::Dml => "rgb(220, 20, 60)",
        FlameType::Callout => "rgb(70, 130, 180)",
        FlameType::Flow => "rgb(0, 139, 139)",
        FlameType::Workflow => "rgb(138, 43, 226)",
        FlameType::Validation => "rgb(218, 165, 32)",
        FlameType::Cache => "rgb(255, 165, 0)",
        FlameType::Visualforce => "rgb(199, 21, 133)",
        FlameType::Exception => "rgb(178, 34, 34)",
        FlameType::Other => "rgb(169, 169, 169)",
    }
}

fn render_node(node: &FlameNode, level: usize, axis: &Axis, graph_height: usize, out: &mut String) {
    let x = axis.x(node.start);
    let w = node.duration * axis.px_per_ms;
    if w < 0.5 {
        return;
    }

    let y = graph_height - (level + 1) * FRAME_HEIGHT + TITLE_MARGIN;
    let name = escape_xml(&node.name);

    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" class="func"><title>{} [{}] ({:.2} ms)</title></rect>"#,
        x,
        y,
        w,
        FRAME_HEIGHT,
        node_colour(node.kind),
        name,
        node.kind.label(),
        node.duration
    ));

    if w > 35.0 {
        let max_chars = (w / CHAR_WIDTH) as usize;
        let display_name = get_truncated_name(&node.name, max_chars);
        if !display_name.is_empty() {
            out.push_str(&format!(
                r#"<text x="{:.2}" y="{}" dx="4" dy="14" font-size="12" fill="white" pointer-events="none">{}</text>"#,
                x,
                y,
                escape_xml(&display_name)
            ));
        }
    }

    for child in &node.children {
        render_node(child, level + 1, axis, graph_height, out);
    }
}

fn render_legend(out: &mut String, top: usize) {
    let legend_y = top + 30;

    out.push_str(&format!(
        r#"<text x="10" y="{}" font-size="14" font-weight="bold">Legend:</text>"#,
        legend_y
    ));

    let items = [
        FlameType::CodeUnit,
        FlameType::Method,
        FlameType::Soql,
        FlameType::Dml,
        FlameType::Callout,
        FlameType::Flow,
        FlameType::Workflow,
        FlameType::Exception,
    ];

    for (i, kind) in items.iter().enumerate() {
        let x = 80 + i * 110;
        out.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}" rx="2"/>"#,
            x,
            legend_y - 12,
            node_colour(*kind)
        ));
        out.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
            x + 20,
            legend_y,
            kind.label()
        ));
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`
pub fn get_truncated_name(name: &str, max_chars: usize) -> String {
    let count = name.chars().count();
    if count <= max_chars {
        return name.to_string();
    }
    if max_chars <= 3 {
        return String::new();
    }
    let kept: String = name.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn terminal_colour(kind: &str) -> Color {
    match kind {
        "SOQL" | "SOSL" | "Query More" => Color::Yellow,
        "DML" => Color::Red,
        "Callout" | "Named Credential" => Color::Blue,
        "Exception" | "Fatal Error" => Color::BrightRed,
        "Method" | "Constructor" => Color::Green,
        "Code Unit" => Color::Magenta,
        _ => Color::BrightBlack,
    }
}

/// Terminal table of the spans with the most self time
pub fn generate_text_summary(hot: &[HotSpan], total_ms: f64) -> String {
    let mut lines = Vec::new();

    lines.push("  🚀 HOTTEST SPANS (by self time)".to_string());
    lines.push("  ┏━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━━━━┳━━━━━━━━━┓".to_string());
    lines.push(format!(
        "  ┃ {:<42} ┃ {:^18} ┃ {:^10} ┃ {:^7} ┃",
        "Span", "Kind", "Self (ms)", "%"
    ));
    lines.push("  ┣━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━━━━━━━╋━━━━━━━━━━━━╋━━━━━━━━━┫".to_string());

    for span in hot {
        let colour = terminal_colour(&span.kind);
        let title = format!("{:<42}", get_truncated_name(&span.title, 42));
        lines.push(format!(
            "  ┃ {} ┃ {:<18} ┃ {:>10.2} ┃ {:>6.1}% ┃",
            title.color(colour),
            get_truncated_name(&span.kind, 18),
            span.self_time,
            span.percentage
        ));
    }

    lines.push("  ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━━━━━━━┻━━━━━━━━━━━━┻━━━━━━━━━┛".to_string());

    lines.push(String::new());
    lines.push(format!("  🔥 TOTAL {:.2} ms", total_ms));
    for span in hot.iter().take(5) {
        let bar = "█".repeat((span.percentage / 2.0).clamp(0.0, 50.0) as usize);
        let colour = terminal_colour(&span.kind);
        lines.push(format!(
            "  └─ {} {} {:>5.1}%",
            format!("{:<24}", get_truncated_name(&span.title, 24)).color(colour),
            format!("{:<50}", bar).color(colour),
            span.percentage
        ));
    }

    lines.join("\n")
}
