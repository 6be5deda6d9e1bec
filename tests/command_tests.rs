use apex_trace_studio::commands::{
    execute_analyze, execute_correlate, validate_args, AnalyzeArgs, CorrelateArgs,
};
use apex_trace_studio::flamegraph::FlamegraphConfig;
use apex_trace_studio::output::read_report;
use std::fs;
use std::path::Path;

const LOG: &str = "\
46.0 APEX_CODE,FINEST;APEX_PROFILING,INFO
10:00:00.000 (1000000)|EXECUTION_STARTED
10:00:00.000 (1000000)|CODE_UNIT_STARTED|[EXTERNAL]|01q000000000001|ContactTrigger on Contact trigger event BeforeInsert|__sfdc_trigger/ContactTrigger
10:00:00.001 (2000000)|METHOD_ENTRY|[3]|01p000000000001|ContactHandler.beforeInsert(List<Contact>)
10:00:00.002 (3000000)|SOQL_EXECUTE_BEGIN|[7]|Aggregations:0|SELECT Id FROM Account
10:00:00.004 (5000000)|SOQL_EXECUTE_END|[7]|Rows:3
10:00:00.005 (6000000)|USER_DEBUG|[8]|DEBUG|found accounts
10:00:00.006 (7000000)|METHOD_EXIT|[3]|ContactHandler
10:00:00.006 (7100000)|DML_BEGIN|[5]|Op:Insert|Type:Contact|Rows:1
10:00:00.007 (7900000)|DML_END|[5]
10:00:00.007 (8000000)|CODE_UNIT_FINISHED|ContactTrigger on Contact trigger event BeforeInsert
10:00:00.008 (9000000)|EXECUTION_FINISHED
";

fn write_log(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("debug.log");
    fs::write(&path, LOG).unwrap();
    path
}

#[test]
fn test_analyze_writes_report_and_svg() {
    let dir = tempfile::tempdir().unwrap();
    let args = AnalyzeArgs {
        log_file: write_log(dir.path()),
        output_json: dir.path().join("out").join("report.json"),
        output_svg: Some(dir.path().join("out").join("flamegraph.svg")),
        flamegraph_config: Some(FlamegraphConfig::new().with_title("Contact insert")),
        ..Default::default()
    };
    validate_args(&args).unwrap();

    let report = execute_analyze(args.clone()).unwrap();
    assert_eq!(report.classes, vec!["ContactHandler", "ContactTrigger"]);
    assert_eq!(report.summary.totals.soql, 1);
    assert_eq!(report.summary.totals.rows, 3);
    assert!(report.diagnostics.is_empty());

    let from_disk = read_report(&args.output_json).unwrap();
    assert_eq!(from_disk, report);

    let svg = fs::read_to_string(args.output_svg.unwrap()).unwrap();
    assert!(svg.contains("Contact insert"));
}

#[test]
fn test_analyze_with_filter_drops_hidden_rows() {
    let dir = tempfile::tempdir().unwrap();
    let all = execute_analyze(AnalyzeArgs {
        log_file: write_log(dir.path()),
        output_json: dir.path().join("all.json"),
        ..Default::default()
    })
    .unwrap();

    let filtered = execute_analyze(AnalyzeArgs {
        log_file: write_log(dir.path()),
        output_json: dir.path().join("filtered.json"),
        search: Some("select id".to_string()),
        ..Default::default()
    })
    .unwrap();

    assert!(filtered.rows.len() < all.rows.len());
    assert!(filtered.rows.iter().any(|r| r.kind == "SOQL"));
    assert!(all.rows.iter().any(|r| r.kind == "DML"));
    assert!(!filtered.rows.iter().any(|r| r.kind == "DML"));
    // The summary always covers the whole log.
    assert_eq!(filtered.summary, all.summary);
}

#[test]
fn test_analyze_missing_log_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = execute_analyze(AnalyzeArgs {
        log_file: dir.path().join("nope.log"),
        output_json: dir.path().join("report.json"),
        ..Default::default()
    });
    assert!(result.is_err());
    assert!(!dir.path().join("report.json").exists());
}

#[test]
fn test_analyze_rejects_bad_regex() {
    let dir = tempfile::tempdir().unwrap();
    let result = execute_analyze(AnalyzeArgs {
        log_file: write_log(dir.path()),
        output_json: dir.path().join("report.json"),
        search: Some("(unclosed".to_string()),
        regex: true,
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_correlate_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let sources = dir.path().join("classes");
    fs::create_dir(&sources).unwrap();
    fs::write(
        sources.join("ContactHandler.cls"),
        "public class ContactHandler {\n}\n",
    )
    .unwrap();

    let args = CorrelateArgs {
        log_file: write_log(dir.path()),
        class_name: Some("ContactHandler".to_string()),
        source_dir: Some(sources.clone()),
        line: Some(3),
        ..Default::default()
    };
    assert!(execute_correlate(args.clone()).is_ok());

    let missing = CorrelateArgs {
        class_name: Some("Nowhere".to_string()),
        ..args
    };
    assert!(execute_correlate(missing).is_err());
}
