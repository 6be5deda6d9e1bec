//! Output writers for reports and flame graphs.
//!
//! - JSON reports (written pretty, readable back)
//! - SVG flame graphs

pub mod json;

pub use json::{read_report, report_to_string, write_report, Report};

use crate::utils::error::OutputError;
use log::{debug, info};
use std::path::Path;

/// Write a rendered flame graph
///
/// **Public** - main entry point for SVG output
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    validate_output_path(output_path)?;

    if output_path.extension().is_some_and(|ext| ext != "svg") {
        debug!("Flame graph path has no .svg extension: {}", output_path.display());
    }

    std::fs::write(output_path, svg_content)?;
    info!(
        "Flame graph written to {} ({:.2} KB)",
        output_path.display(),
        svg_content.len() as f64 / 1024.0
    );
    Ok(())
}

/// Check that a path can be written, creating missing parent directories
pub(crate) fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}
