use crate::flamegraph::FlamegraphConfig;
use crate::utils::config::AnalyzerConfig;
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Debug log to analyse
    pub log_file: PathBuf,

    /// Output path for the JSON report
    pub output_json: PathBuf,

    /// Output path for the SVG flame graph (optional)
    pub output_svg: Option<PathBuf>,

    /// Number of hottest spans to include in the report
    pub top_spans: usize,

    /// Flame graph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print text summary to stdout
    pub print_summary: bool,

    /// Only keep spans with this rolled-up metric (SOQL, DML, ...)
    pub type_filter: Option<String>,

    /// Only keep spans whose title matches
    pub search: Option<String>,

    /// Treat `search` as a regular expression
    pub regex: bool,

    pub config: AnalyzerConfig,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            log_file: PathBuf::new(),
            output_json: PathBuf::from("report.json"),
            output_svg: None,
            top_spans: 20,
            flamegraph_config: None,
            print_summary: false,
            type_filter: None,
            search: None,
            regex: false,
            config: AnalyzerConfig::default(),
        }
    }
}

/// Arguments for the correlate command
#[derive(Debug, Clone, Default)]
pub struct CorrelateArgs {
    pub log_file: PathBuf,

    /// Class to show; defaults to the first class discovered in the log
    pub class_name: Option<String>,

    /// Directory holding `<Class>.cls` / `<Class>.trigger` files
    pub source_dir: Option<PathBuf>,

    /// Base URL serving class bodies at `{url}/{Class}`
    pub source_url: Option<String>,

    /// Also list the spans that executed this source line
    pub line: Option<u32>,

    pub config: AnalyzerConfig,
}
