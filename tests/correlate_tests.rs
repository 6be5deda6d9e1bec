use apex_trace_studio::correlate::{
    spans_at_line, ClassCorrelator, DirectorySourceFetcher, LineState, SourceFetcher,
};
use apex_trace_studio::parser::parse_log;
use apex_trace_studio::utils::error::FetchError;
use std::cell::Cell;
use std::fs;

const LOG: &str = "\
10:00:00.000 (1000000)|CODE_UNIT_STARTED|[EXTERNAL]|01p000000000001|InvoiceService.post()
10:00:00.001 (2000000)|METHOD_ENTRY|[2]|01p000000000001|InvoiceService.total()
10:00:00.002 (3000000)|STATEMENT_EXECUTE|[3]
10:00:00.003 (4000000)|METHOD_EXIT|[2]|InvoiceService
10:00:00.004 (5000000)|EXCEPTION_THROWN|[5]|System.MathException: Divide by 0
10:00:00.005 (6000000)|CODE_UNIT_FINISHED|InvoiceService.post()
";

const SOURCE: &str = "public class InvoiceService {\n\
                      \x20   public Decimal total() {\n\
                      \x20       return amount / count;\n\
                      \x20   }\n\
                      \x20   throw new MathException();\n\
                      }\n";

/// Fails until told otherwise
struct Flaky {
    fail: Cell<bool>,
    calls: Cell<usize>,
}

impl SourceFetcher for &Flaky {
    fn fetch(&self, class_name: &str) -> Result<Vec<String>, FetchError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            Err(FetchError::NotFound(class_name.to_string()))
        } else {
            Ok(SOURCE.lines().map(str::to_string).collect())
        }
    }
}

#[test]
fn test_lines_coloured_from_log() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("InvoiceService.cls"), SOURCE).unwrap();

    let parsed = parse_log(LOG);
    let mut correlator = ClassCorrelator::new(DirectorySourceFetcher::new(dir.path()));
    let source = correlator.select(&parsed.root, "InvoiceService").unwrap();

    let states: Vec<LineState> = source.lines.iter().map(|l| l.state).collect();
    assert_eq!(
        states,
        vec![
            LineState::NotExecuted,
            LineState::Executed,
            LineState::Executed,
            LineState::NotExecuted,
            LineState::Error,
            LineState::NotExecuted,
        ]
    );
    assert_eq!(source.executed_count(), 3);
    assert_eq!(correlator.selected().map(|s| s.name.as_str()), Some("InvoiceService"));
}

#[test]
fn test_line_lookup_finds_spans() {
    let parsed = parse_log(LOG);
    let at_three = spans_at_line(&parsed.root, "InvoiceService", 3);
    assert_eq!(at_three.len(), 1);
    assert_eq!(at_three[0].kind.label(), "Statement");
    assert_eq!(at_three[0].log_start_line, 3);

    assert!(spans_at_line(&parsed.root, "Other", 3).is_empty());
}

#[test]
fn test_failed_fetch_is_retried() {
    let parsed = parse_log(LOG);
    let fetcher = Flaky {
        fail: Cell::new(true),
        calls: Cell::new(0),
    };
    let mut correlator = ClassCorrelator::new(&fetcher);

    assert!(correlator.select(&parsed.root, "InvoiceService").is_err());
    assert!(!correlator.is_cached("InvoiceService"));
    assert!(correlator.selected().is_none());
    // The tree is untouched by a failed fetch
    assert_eq!(parsed.root.children.len(), 1);

    fetcher.fail.set(false);
    let source = correlator.select(&parsed.root, "InvoiceService").unwrap();
    assert_eq!(source.line(5).map(|l| l.state), Some(LineState::Error));
    assert_eq!(fetcher.calls.get(), 2);
}

#[test]
fn test_source_fetched_once() {
    let parsed = parse_log(LOG);
    let fetcher = Flaky {
        fail: Cell::new(false),
        calls: Cell::new(0),
    };
    let mut correlator = ClassCorrelator::new(&fetcher);

    correlator.select(&parsed.root, "InvoiceService").unwrap();
    correlator.select(&parsed.root, "InvoiceService").unwrap();
    assert!(correlator.is_cached("InvoiceService"));
    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(correlator.spans_at_line(&parsed.root, 5).len(), 1);
}

#[test]
fn test_directory_fetcher_rejects_bad_names() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = DirectorySourceFetcher::new(dir.path());
    assert!(matches!(
        fetcher.fetch("../secret"),
        Err(FetchError::InvalidClassName(_))
    ));
}

#[test]
fn test_failed_selection_clears_previous_class() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("InvoiceService.cls"), SOURCE).unwrap();

    let parsed = parse_log(LOG);
    let mut correlator = ClassCorrelator::new(DirectorySourceFetcher::new(dir.path()));
    correlator.select(&parsed.root, "InvoiceService").unwrap();
    assert_eq!(correlator.spans_at_line(&parsed.root, 3).len(), 1);

    assert!(correlator.select(&parsed.root, "Missing").is_err());
    assert!(correlator.selected().is_none());
    assert!(correlator.spans_at_line(&parsed.root, 3).is_empty());
    assert!(correlator.is_cached("InvoiceService"));
}
