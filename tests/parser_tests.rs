use apex_trace_studio::parser::schema::{ValidationOutcome, WorkflowDetail};
use apex_trace_studio::parser::{parse_log, DiagnosticKind, LogParser, Span, SpanKind};
use pretty_assertions::assert_eq;

const SOQL_LOG: &str = "\
59.0 APEX_CODE,FINEST;APEX_PROFILING,INFO
10:00:00.000 (1000000)|EXECUTION_STARTED
10:00:00.001 (2000000)|CODE_UNIT_STARTED|[EXTERNAL]|01p000000000001|AccountService.run()
10:00:00.002 (3000000)|METHOD_ENTRY|[5]|01p000000000001|AccountService.load()
10:00:00.003 (4000000)|SOQL_EXECUTE_BEGIN|[12]|Aggregations:0|SELECT Id FROM Account
10:00:00.007 (8000000)|SOQL_EXECUTE_END|[12]|Rows:5
10:00:00.008 (9000000)|METHOD_EXIT|[5]|01p000000000001|AccountService.load()
10:00:00.009 (10000000)|CODE_UNIT_FINISHED|AccountService.run()
10:00:00.010 (11000000)|EXECUTION_FINISHED
";

/// Kind labels of a subtree, nested
fn shape(span: &Span) -> String {
    let children: Vec<String> = span.children.iter().map(shape).collect();
    if children.is_empty() {
        span.kind.label().to_string()
    } else {
        format!("{}({})", span.kind.label(), children.join(","))
    }
}

fn all_spans(root: &Span) -> Vec<&Span> {
    let mut spans = Vec::new();
    root.walk(&mut |s| spans.push(s));
    spans
}

#[test]
fn test_soql_rows_propagate_to_ancestors() {
    let parsed = parse_log(SOQL_LOG);
    let execution = &parsed.root.children[0];
    let code_unit = &execution.children[0];
    let method = &code_unit.children[0];
    let soql = &method.children[0];

    assert!(matches!(soql.kind, SpanKind::Soql { .. }));
    assert_eq!(soql.title, "SELECT Id FROM Account");
    assert_eq!(soql.metrics.rows, 5);
    assert_eq!(soql.metrics.soql, 1);
    assert_eq!(soql.duration, 4.0);
    assert_eq!(soql.line_number, Some(12));

    for ancestor in [&parsed.root, execution, code_unit, method] {
        assert_eq!(ancestor.totals.rows, 5);
        assert_eq!(ancestor.totals.soql, 1);
        assert_eq!(ancestor.metrics.rows, 0);
    }
    assert!(parsed.diagnostics.is_empty());
}

#[test]
fn test_header_lines_are_skipped() {
    let parsed = parse_log(SOQL_LOG);
    assert_eq!(parsed.line_count, 9);
    assert_eq!(parsed.root.log_start_line, 2);
    assert_eq!(parsed.root.children[0].log_start_line, 2);
    assert_eq!(parsed.root.children[0].log_end_line, 9);
}

#[test]
fn test_classes_are_discovered_in_order() {
    let parsed = parse_log(SOQL_LOG);
    assert_eq!(parsed.classes.first(), Some("AccountService"));
    assert_eq!(parsed.classes.len(), 1);

    let method = &parsed.root.children[0].children[0].children[0];
    assert_eq!(method.apex_class.as_deref(), Some("AccountService"));
    // Spans naming no class run inside the enclosing one
    assert_eq!(method.children[0].apex_class.as_deref(), Some("AccountService"));
}

#[test]
fn test_trigger_code_unit_resolves_trigger_name() {
    let log = "10:00:00.000 (1000000)|CODE_UNIT_STARTED|[EXTERNAL]|01q000000000001|AccountTrigger on Account trigger event BeforeInsert|__sfdc_trigger/AccountTrigger\n\
               10:00:00.002 (3000000)|CODE_UNIT_FINISHED|AccountTrigger on Account trigger event BeforeInsert|__sfdc_trigger/AccountTrigger\n";
    let parsed = parse_log(log);
    let unit = &parsed.root.children[0];
    assert_eq!(unit.title, "AccountTrigger on Account trigger event BeforeInsert");
    assert_eq!(unit.apex_class.as_deref(), Some("AccountTrigger"));
    assert!(parsed.classes.contains("AccountTrigger"));
}

#[test]
fn test_truncated_log_closes_at_last_timestamp() {
    let log = "10:00:00.000 (1000000)|CODE_UNIT_STARTED|[EXTERNAL]|execute_anonymous_apex\n\
               10:00:00.004 (5000000)|STATEMENT_EXECUTE|[1]\n\
               10:00:00.009 (10000000)|USER_DEBUG|[1]|DEBUG|hi\n";
    let parsed = parse_log(log);

    let unit = &parsed.root.children[0];
    assert_eq!(unit.title, "execute_anonymous_apex");
    assert_eq!(unit.end_nanos, Some(10_000_000));
    assert_eq!(unit.duration, 9.0);
    assert_eq!(unit.debug, vec!["hi".to_string()]);
    assert_eq!(unit.children[0].duration, 5.0);
    assert_eq!(parsed.root.duration, 9.0);
    assert!(parsed.diagnostics.is_empty());
}

#[test]
fn test_self_closing_span_borrows_next_timestamp() {
    let log = "10:00:00.000 (1000000)|METHOD_ENTRY|[1]|01p|Calc.run()\n\
               10:00:00.001 (2000000)|VARIABLE_ASSIGNMENT|[3]|total|42\n\
               10:00:00.004 (5000000)|STATEMENT_EXECUTE|[4]\n\
               10:00:00.006 (7000000)|METHOD_EXIT|[1]|Calc\n";
    let parsed = parse_log(log);

    let method = &parsed.root.children[0];
    assert_eq!(method.children.len(), 2);

    let assignment = &method.children[0];
    assert_eq!(
        assignment.kind,
        SpanKind::VariableAssignment {
            name: "total".to_string(),
            value: "42".to_string(),
        }
    );
    assert_eq!(assignment.title, "total = 42");
    assert_eq!(assignment.end_nanos, Some(5_000_000));
    assert_eq!(assignment.duration, 3.0);

    // The borrowed record was still parsed by the parent
    let statement = &method.children[1];
    assert_eq!(statement.kind, SpanKind::Statement);
    assert_eq!(statement.start_nanos, Some(5_000_000));
    assert_eq!(statement.end_nanos, Some(7_000_000));
}

#[test]
fn test_unknown_tags_do_not_change_shape() {
    let with_unknown = SOQL_LOG.replace(
        "10:00:00.003 (4000000)|SOQL",
        "10:00:00.003 (3500000)|SOME_FUTURE_TAG|[1]|whatever\n10:00:00.003 (4000000)|SOQL",
    );
    let plain = parse_log(SOQL_LOG);
    let extended = parse_log(&with_unknown);

    assert_eq!(shape(&plain.root), shape(&extended.root));
    assert_eq!(
        shape(&plain.root),
        "Root(Execution(Code Unit(Method(SOQL))))"
    );
    assert!(extended.diagnostics.is_empty());
}

#[test]
fn test_continuation_lines_join_previous_record() {
    let log = "10:00:00.000 (1000000)|METHOD_ENTRY|[1]|01p|A.run()\n\
               10:00:00.001 (2000000)|USER_DEBUG|[2]|DEBUG|first line\n\
               second line\n\
               10:00:00.002 (3000000)|METHOD_EXIT|[1]|A\n";
    let parsed = parse_log(log);
    let method = &parsed.root.children[0];
    assert_eq!(method.debug, vec!["first line\nsecond line".to_string()]);
    assert_eq!(method.log_end_line, 4);
}

#[test]
fn test_duration_is_floored() {
    let log = "10:00:00.000 (1000000)|METHOD_ENTRY|[1]|01p|A.run()\n\
               10:00:00.000 (1000100)|METHOD_EXIT|[1]|A\n";
    let parsed = parse_log(log);
    assert_eq!(parsed.root.children[0].duration, 1.0);
    for span in all_spans(&parsed.root) {
        assert!(span.duration >= 1.0);
    }
}

const MIXED_LOG: &str = "\
10:00:00.000 (1000000)|EXECUTION_STARTED
10:00:00.001 (2000000)|CODE_UNIT_STARTED|[EXTERNAL]|01p000000000001|OrderService.submit()
10:00:00.002 (3000000)|HEAP_ALLOCATE|[72]|Bytes:3
10:00:00.003 (4000000)|CONSTRUCTOR_ENTRY|[4]|01p000000000002|<init>()|OrderBuilder
10:00:00.004 (5000000)|CONSTRUCTOR_EXIT|[4]|01p000000000002|<init>()|OrderBuilder
10:00:00.005 (6000000)|DML_BEGIN|[10]|Op:Insert|Type:Order|Rows:3
10:00:00.020 (21000000)|DML_END|[10]
10:00:00.021 (22000000)|CALLOUT_REQUEST|[40]|System.HttpRequest[Endpoint=https://example.com, Method=GET]
10:00:00.061 (62000000)|CALLOUT_RESPONSE|[40]|System.HttpResponse[Status=OK, StatusCode=200]
10:00:00.062 (63000000)|SOQL_EXECUTE_BEGIN|[44]|Aggregations:0|SELECT Id FROM Order
10:00:00.063 (63500000)|SOQL_EXECUTE_EXPLAIN|[44]|Index on Order : [Id], cardinality: 1, sobjectCardinality: 10, relativeCost 0.1
10:00:00.064 (65000000)|SOQL_EXECUTE_END|[44]|Rows:1
10:00:00.065 (66000000)|EXCEPTION_THROWN|[50]|System.CalloutException: Read timed out
10:00:00.066 (67000000)|CODE_UNIT_FINISHED|OrderService.submit()
10:00:00.067 (68000000)|EXECUTION_FINISHED
";

#[test]
fn test_matched_nesting_and_rollups_hold_everywhere() {
    let parsed = parse_log(MIXED_LOG);
    assert!(parsed.diagnostics.is_empty());

    for span in all_spans(&parsed.root) {
        assert!(span.log_end_line >= span.log_start_line, "{}", span.title);
        if let (Some(start), Some(end)) = (span.start, span.end) {
            assert!(end >= start, "{}", span.title);
        }

        let mut expected = span.metrics;
        for child in &span.children {
            expected += child.totals;
        }
        assert_eq!(span.totals, expected, "{}", span.title);
    }

    let totals = parsed.root.totals;
    assert_eq!(totals.heap, 3);
    assert_eq!(totals.dml, 1);
    assert_eq!(totals.dml_rows, 3);
    assert_eq!(totals.callouts, 1);
    assert_eq!(totals.soql, 1);
    assert_eq!(totals.rows, 1);
}

#[test]
fn test_kind_payloads() {
    let parsed = parse_log(MIXED_LOG);
    let unit = &parsed.root.children[0].children[0];
    let kinds: Vec<&str> = unit.children.iter().map(|c| c.kind.label()).collect();
    assert_eq!(kinds, vec!["Constructor", "DML", "Callout", "SOQL", "Exception"]);

    assert_eq!(unit.children[0].title, "OrderBuilder()");
    assert_eq!(unit.children[0].apex_class.as_deref(), Some("OrderBuilder"));
    assert_eq!(unit.children[1].title, "DML Insert Order");
    assert_eq!(unit.children[1].duration, 15.0);

    match &unit.children[2].kind {
        SpanKind::Callout { response, .. } => {
            assert!(response.as_deref().unwrap_or_default().contains("StatusCode=200"));
        }
        other => panic!("unexpected kind {:?}", other),
    }

    match &unit.children[3].kind {
        SpanKind::Soql { explain, aggregations, .. } => {
            assert_eq!(*aggregations, Some(0));
            assert_eq!(explain.as_ref().and_then(|p| p.cardinality), Some(1));
        }
        other => panic!("unexpected kind {:?}", other),
    }

    let exception = &unit.children[4];
    assert!(exception.kind.is_error());
    assert_eq!(exception.title, "System.CalloutException: Read timed out");
    assert_eq!(exception.apex_class.as_deref(), Some("OrderService"));
    assert_eq!(exception.line_number, Some(50));
}

#[test]
fn test_span_indexes_follow_encounter_order() {
    let parsed = parse_log(MIXED_LOG);
    let indexes: Vec<usize> = all_spans(&parsed.root).iter().map(|s| s.index).collect();
    let mut sorted = indexes.clone();
    sorted.sort_unstable();
    assert_eq!(indexes, sorted);
    assert_eq!(indexes[0], 0);
}

#[test]
fn test_validation_pass_and_fail() {
    let log = "10:00:00.000 (1000000)|VALIDATION_RULE|03d000000000001|Require_Phone\n\
               10:00:00.000 (1000100)|VALIDATION_FORMULA|ISBLANK(Phone)|Phone=null\n\
               10:00:00.000 (1000200)|VALIDATION_ERROR|Phone is required\n\
               10:00:00.001 (2000000)|VALIDATION_FAIL\n\
               10:00:00.002 (3000000)|VALIDATION_RULE|03d000000000002|Require_Name\n\
               10:00:00.003 (4000000)|VALIDATION_PASS\n";
    let parsed = parse_log(log);
    assert_eq!(parsed.root.children.len(), 2);

    assert_eq!(
        parsed.root.children[0].kind,
        SpanKind::ValidationRule {
            rule: "Require_Phone".to_string(),
            formula: Some("ISBLANK(Phone)|Phone=null".to_string()),
            outcome: Some(ValidationOutcome::Fail),
            errors: vec!["Phone is required".to_string()],
        }
    );
    assert!(matches!(
        parsed.root.children[1].kind,
        SpanKind::ValidationRule {
            outcome: Some(ValidationOutcome::Pass),
            ..
        }
    ));
}

#[test]
fn test_workflow_annotations_reach_invocation() {
    let log = "10:00:00.000 (1000000)|WF_RULE_EVAL_BEGIN|Workflow\n\
               10:00:00.001 (2000000)|WF_CRITERIA_BEGIN|[Account: Acme 001]|Rule A|01Q000000000001|ON_ALL_CHANGES|0\n\
               10:00:00.001 (2100000)|WF_RULE_FILTER|[Account : Name equals Acme]\n\
               10:00:00.002 (3000000)|WF_CRITERIA_END|true\n\
               10:00:00.003 (4000000)|WF_RULE_INVOCATION|[Account: Acme 001]\n\
               10:00:00.003 (4100000)|WF_FIELD_UPDATE|[Account: Acme 001]|Field:Account: Rating|Value:Hot\n\
               10:00:00.004 (5000000)|WF_RULE_EVAL_END\n";
    let parsed = parse_log(log);
    let eval = &parsed.root.children[0];
    assert_eq!(eval.title, "Rule Evaluation: Workflow");
    assert_eq!(eval.children.len(), 2);

    match &eval.children[0].kind {
        SpanKind::WorkflowCriteria { rule, result, detail } => {
            assert_eq!(rule, "Rule A");
            assert_eq!(*result, Some(true));
            assert_eq!(detail.criteria, vec!["[Account : Name equals Acme]".to_string()]);
        }
        other => panic!("unexpected kind {:?}", other),
    }

    match &eval.children[1].kind {
        SpanKind::WorkflowRuleInvocation(detail) => {
            assert_eq!(detail.field_updates.len(), 1);
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert_eq!(eval.kind, SpanKind::WorkflowRuleEval(WorkflowDetail::default()));
}

#[test]
fn test_mismatched_terminator_is_reported_and_recovered() {
    let log = "10:00:00.000 (1000000)|CODE_UNIT_STARTED|[EXTERNAL]|01p|A.run()\n\
               10:00:00.001 (2000000)|METHOD_ENTRY|[2]|01p|A.inner()\n\
               10:00:00.003 (4000000)|CODE_UNIT_FINISHED|A.run()\n\
               10:00:00.004 (5000000)|METHOD_ENTRY|[9]|01p|B.next()\n\
               10:00:00.005 (6000000)|METHOD_EXIT|[9]|B\n";
    let parsed = parse_log(log);

    assert_eq!(shape(&parsed.root), "Root(Code Unit(Method),Method)");
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].line, 3);
    assert!(matches!(
        &parsed.diagnostics[0].kind,
        DiagnosticKind::TerminatorMismatch { expected, found }
            if expected == "METHOD_EXIT" && found == "CODE_UNIT_FINISHED"
    ));
}

#[test]
fn test_invalid_numbers_are_diagnosed() {
    let log = "10:00:00.000 (1000000)|DML_BEGIN|[10]|Op:Update|Type:Account|Rows:NaN\n\
               10:00:00.001 (2000000)|DML_END|[10]\n";
    let parsed = parse_log(log);
    assert_eq!(parsed.root.totals.dml_rows, 0);
    assert_eq!(parsed.root.totals.dml, 1);
    assert!(matches!(
        parsed.diagnostics[0].kind,
        DiagnosticKind::InvalidNumber { .. }
    ));
}

#[test]
fn test_parsers_are_independent() {
    let first = LogParser::new(SOQL_LOG).parse();
    let second = LogParser::new(MIXED_LOG).parse();
    assert_eq!(first.root.children[0].index, 1);
    assert_eq!(second.root.children[0].index, 1);
    assert!(!second.classes.contains("AccountService"));
}

#[test]
fn test_empty_log() {
    let parsed = parse_log("");
    assert!(parsed.root.children.is_empty());
    assert_eq!(parsed.root.duration, 1.0);
    assert_eq!(parsed.line_count, 0);
}

#[test]
fn test_huge_counters_saturate() {
    let log = "10:00:00.000 (1000000)|METHOD_ENTRY|[1]|01p|Cache.fill()\n\
               10:00:00.001 (2000000)|HEAP_ALLOCATE|[2]|Bytes:18446744073709551615\n\
               10:00:00.002 (3000000)|HEAP_ALLOCATE|[2]|Bytes:2\n\
               10:00:00.003 (4000000)|METHOD_ENTRY|[3]|01p|Cache.grow()\n\
               10:00:00.004 (5000000)|HEAP_ALLOCATE|[4]|Bytes:18446744073709551615\n\
               10:00:00.005 (6000000)|DML_BEGIN|[5]|Op:Insert|Type:Item__c|Rows:18446744073709551615\n\
               10:00:00.006 (7000000)|DML_END|[5]\n\
               10:00:00.007 (8000000)|METHOD_EXIT|[3]|Cache\n\
               10:00:00.008 (9000000)|METHOD_ENTRY|[6]|01p|Cache.trim()\n\
               10:00:00.009 (10000000)|HEAP_ALLOCATE|[7]|Bytes:5\n\
               10:00:00.010 (11000000)|METHOD_EXIT|[6]|Cache\n\
               10:00:00.011 (12000000)|METHOD_EXIT|[1]|Cache\n";
    let parsed = parse_log(log);
    let fill = &parsed.root.children[0];

    assert_eq!(fill.metrics.heap, u64::MAX);
    assert_eq!(fill.totals.heap, u64::MAX);
    assert_eq!(fill.children[1].totals.heap, 5);
    assert_eq!(parsed.root.totals.heap, u64::MAX);
    assert_eq!(parsed.root.totals.dml_rows, u64::MAX);
    assert!(parsed.diagnostics.is_empty());
}
