//! Tag dispatch table.
//!
//! Maps every recognized record tag to what the tree builder should do with
//! it: open a span and wait for a terminator, open a span that closes
//! itself, attach data to an open span, or close a span. Anything else is
//! ignored so newer log formats still parse.

use super::lines::LogRecord;
use super::schema::{
    keyed_number, Attachment, CacheOp, CacheScope, Metrics, SpanDraft, SpanKind, WorkflowDetail,
};

/// Builds a span draft from its opening record
pub type Opener = fn(&LogRecord) -> SpanDraft;

/// What a tag means to the builder
#[derive(Clone, Copy)]
pub enum Rule {
    /// Opens a span that stays open until one of the terminators
    Begin {
        open: Opener,
        terminators: &'static [&'static str],
    },
    /// Opens a span with no end record; it ends where the next record starts
    SelfClosing(Opener),
    /// Adds data to an already-open span
    Attach(Attachment),
    /// Closes a span
    End,
    Ignore,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin { terminators, .. } => write!(f, "Begin({})", terminators.join("/")),
            Self::SelfClosing(_) => write!(f, "SelfClosing"),
            Self::Attach(a) => write!(f, "Attach({:?})", a),
            Self::End => write!(f, "End"),
            Self::Ignore => write!(f, "Ignore"),
        }
    }
}

macro_rules! begin {
    ($open:expr, $($end:literal),+) => {
        Rule::Begin {
            open: $open,
            terminators: &[$($end),+],
        }
    };
}

/// Look up the rule for a record tag
pub fn rule_for(tag: &str) -> Rule {
    match tag {
        "EXECUTION_STARTED" => begin!(
            |_| SpanDraft::new(SpanKind::Execution, "Execution"),
            "EXECUTION_FINISHED"
        ),
        "CODE_UNIT_STARTED" => begin!(open_code_unit, "CODE_UNIT_FINISHED"),
        "METHOD_ENTRY" => begin!(open_method, "METHOD_EXIT"),
        "SYSTEM_METHOD_ENTRY" => begin!(
            |r| titled(SpanKind::SystemMethod, r),
            "SYSTEM_METHOD_EXIT"
        ),
        "CONSTRUCTOR_ENTRY" => begin!(open_constructor, "CONSTRUCTOR_EXIT"),
        "SYSTEM_CONSTRUCTOR_ENTRY" => begin!(
            |r| titled(SpanKind::SystemConstructor, r),
            "SYSTEM_CONSTRUCTOR_EXIT"
        ),
        "SOQL_EXECUTE_BEGIN" => begin!(open_soql, "SOQL_EXECUTE_END"),
        "SOSL_EXECUTE_BEGIN" => begin!(open_sosl, "SOSL_EXECUTE_END"),
        "QUERY_MORE_BEGIN" => begin!(
            |_| SpanDraft::new(SpanKind::QueryMore, "Query More"),
            "QUERY_MORE_END"
        ),
        "DML_BEGIN" => begin!(open_dml, "DML_END"),
        "CALLOUT_REQUEST" => begin!(open_callout, "CALLOUT_RESPONSE"),
        "NAMED_CREDENTIAL_REQUEST" => begin!(open_named_credential, "NAMED_CREDENTIAL_RESPONSE"),
        "CUMULATIVE_PROFILING_BEGIN" => begin!(
            |r| labelled(SpanKind::CumulativeProfiling, r),
            "CUMULATIVE_PROFILING_END"
        ),
        "CUMULATIVE_LIMIT_USAGE" => begin!(
            |r| labelled(SpanKind::CumulativeLimitUsage, r),
            "CUMULATIVE_LIMIT_USAGE_END"
        ),
        "FLOW_START_INTERVIEWS_BEGIN" => begin!(
            |r| labelled(SpanKind::FlowStartInterviews, r),
            "FLOW_START_INTERVIEWS_END"
        ),
        "FLOW_CREATE_INTERVIEW_BEGIN" => begin!(
            |r| titled(SpanKind::FlowCreateInterview, r),
            "FLOW_CREATE_INTERVIEW_END"
        ),
        "FLOW_START_INTERVIEW_BEGIN" => begin!(open_flow_interview, "FLOW_START_INTERVIEW_END"),
        "FLOW_ELEMENT_BEGIN" => begin!(open_flow_element, "FLOW_ELEMENT_END"),
        "FLOW_BULK_ELEMENT_BEGIN" => begin!(open_flow_bulk_element, "FLOW_BULK_ELEMENT_END"),
        "VALIDATION_RULE" => begin!(open_validation_rule, "VALIDATION_PASS", "VALIDATION_FAIL"),
        "WF_RULE_EVAL_BEGIN" => begin!(open_workflow_eval, "WF_RULE_EVAL_END"),
        "WF_CRITERIA_BEGIN" => begin!(open_workflow_criteria, "WF_CRITERIA_END"),
        "ORG_CACHE_PUT_BEGIN" => begin!(
            |r| cache(r, CacheScope::Org, CacheOp::Put),
            "ORG_CACHE_PUT_END"
        ),
        "ORG_CACHE_GET_BEGIN" => begin!(
            |r| cache(r, CacheScope::Org, CacheOp::Get),
            "ORG_CACHE_GET_END"
        ),
        "ORG_CACHE_REMOVE_BEGIN" => begin!(
            |r| cache(r, CacheScope::Org, CacheOp::Remove),
            "ORG_CACHE_REMOVE_END"
        ),
        "ORG_CACHE_MEMORY_USAGE_BEGIN" => begin!(
            |r| cache(r, CacheScope::Org, CacheOp::MemoryUsage),
            "ORG_CACHE_MEMORY_USAGE_END"
        ),
        "SESSION_CACHE_PUT_BEGIN" => begin!(
            |r| cache(r, CacheScope::Session, CacheOp::Put),
            "SESSION_CACHE_PUT_END"
        ),
        "SESSION_CACHE_GET_BEGIN" => begin!(
            |r| cache(r, CacheScope::Session, CacheOp::Get),
            "SESSION_CACHE_GET_END"
        ),
        "SESSION_CACHE_REMOVE_BEGIN" => begin!(
            |r| cache(r, CacheScope::Session, CacheOp::Remove),
            "SESSION_CACHE_REMOVE_END"
        ),
        "SESSION_CACHE_MEMORY_USAGE_BEGIN" => begin!(
            |r| cache(r, CacheScope::Session, CacheOp::MemoryUsage),
            "SESSION_CACHE_MEMORY_USAGE_END"
        ),
        "VF_APEX_CALL_START" => begin!(|r| titled(SpanKind::VfApexCall, r), "VF_APEX_CALL_END"),
        "VF_DESERIALIZE_VIEWSTATE_BEGIN" => begin!(
            |r| labelled(SpanKind::VfDeserializeViewstate, r),
            "VF_DESERIALIZE_VIEWSTATE_END"
        ),
        "VF_SERIALIZE_VIEWSTATE_BEGIN" => begin!(
            |r| labelled(SpanKind::VfSerializeViewstate, r),
            "VF_SERIALIZE_VIEWSTATE_END"
        ),
        "VF_EVALUATE_FORMULA_BEGIN" => begin!(
            |r| titled(SpanKind::VfEvaluateFormula, r),
            "VF_EVALUATE_FORMULA_END"
        ),
        "VF_SERIALIZE_CONTINUATION_STATE_BEGIN" => begin!(
            |r| labelled(SpanKind::VfSerializeContinuationState, r),
            "VF_SERIALIZE_CONTINUATION_STATE_END"
        ),
        "VF_DESERIALIZE_CONTINUATION_STATE_BEGIN" => begin!(
            |r| labelled(SpanKind::VfDeserializeContinuationState, r),
            "VF_DESERIALIZE_CONTINUATION_STATE_END"
        ),
        "NBA_NODE_BEGIN" => begin!(|r| titled(SpanKind::NbaNode, r), "NBA_NODE_END"),
        "NBA_STRATEGY_BEGIN" => begin!(|r| titled(SpanKind::NbaStrategy, r), "NBA_STRATEGY_END"),
        "DUPLICATE_DETECTION_BEGIN" => begin!(
            |r| labelled(SpanKind::DuplicateDetection, r),
            "DUPLICATE_DETECTION_END"
        ),
        "MATCH_ENGINE_BEGIN" => begin!(|r| labelled(SpanKind::MatchEngine, r), "MATCH_ENGINE_END"),
        "EVENT_SERVICE_PUB_BEGIN" => begin!(
            |r| titled(SpanKind::EventPublish, r),
            "EVENT_SERVICE_PUB_END"
        ),

        "VARIABLE_ASSIGNMENT" => Rule::SelfClosing(open_variable_assignment),
        "STATEMENT_EXECUTE" => Rule::SelfClosing(
            |_| SpanDraft::new(SpanKind::Statement, "Statement"),
        ),
        "EXCEPTION_THROWN" => Rule::SelfClosing(open_exception),
        "FATAL_ERROR" => Rule::SelfClosing(open_fatal_error),
        "WF_RULE_INVOCATION" => Rule::SelfClosing(
            |r| titled(SpanKind::WorkflowRuleInvocation(WorkflowDetail::default()), r),
        ),
        "NBA_OFFER_INVALID" => Rule::SelfClosing(|r| titled(SpanKind::NbaOfferInvalid, r)),

        "USER_DEBUG" => Rule::Attach(Attachment::Debug),
        "HEAP_ALLOCATE" => Rule::Attach(Attachment::Heap),
        "SOQL_EXECUTE_EXPLAIN" => Rule::Attach(Attachment::Explain),
        "VALIDATION_FORMULA" => Rule::Attach(Attachment::ValidationFormula),
        "VALIDATION_ERROR" => Rule::Attach(Attachment::ValidationError),
        "FLOW_ELEMENT_ERROR" | "FLOW_ELEMENT_FAULT" => Rule::Attach(Attachment::FlowError),
        "WF_RULE_FILTER" => Rule::Attach(Attachment::WorkflowCriteria),
        "WF_FORMULA" => Rule::Attach(Attachment::WorkflowFormula),
        "WF_FIELD_UPDATE" => Rule::Attach(Attachment::WorkflowFieldUpdate),

        "EXECUTION_FINISHED" | "CODE_UNIT_FINISHED" | "METHOD_EXIT" | "SYSTEM_METHOD_EXIT"
        | "CONSTRUCTOR_EXIT" | "SYSTEM_CONSTRUCTOR_EXIT" | "SOQL_EXECUTE_END"
        | "SOSL_EXECUTE_END" | "QUERY_MORE_END" | "DML_END" | "CALLOUT_RESPONSE"
        | "NAMED_CREDENTIAL_RESPONSE" | "CUMULATIVE_PROFILING_END"
        | "CUMULATIVE_LIMIT_USAGE_END" | "FLOW_START_INTERVIEWS_END"
        | "FLOW_CREATE_INTERVIEW_END" | "FLOW_START_INTERVIEW_END" | "FLOW_ELEMENT_END"
        | "FLOW_BULK_ELEMENT_END" | "VALIDATION_PASS" | "VALIDATION_FAIL"
        | "WF_RULE_EVAL_END" | "WF_CRITERIA_END" | "ORG_CACHE_PUT_END" | "ORG_CACHE_GET_END"
        | "ORG_CACHE_REMOVE_END" | "ORG_CACHE_MEMORY_USAGE_END" | "SESSION_CACHE_PUT_END"
        | "SESSION_CACHE_GET_END" | "SESSION_CACHE_REMOVE_END"
        | "SESSION_CACHE_MEMORY_USAGE_END" | "VF_APEX_CALL_END"
        | "VF_DESERIALIZE_VIEWSTATE_END" | "VF_SERIALIZE_VIEWSTATE_END"
        | "VF_EVALUATE_FORMULA_END" | "VF_SERIALIZE_CONTINUATION_STATE_END"
        | "VF_DESERIALIZE_CONTINUATION_STATE_END" | "NBA_NODE_END" | "NBA_STRATEGY_END"
        | "DUPLICATE_DETECTION_END" | "MATCH_ENGINE_END" | "EVENT_SERVICE_PUB_END" => Rule::End,

        _ => Rule::Ignore,
    }
}

/// Title from the last field, falling back to the kind label
fn titled(kind: SpanKind, record: &LogRecord) -> SpanDraft {
    let title = record
        .last_field()
        .map(str::to_string)
        .unwrap_or_else(|| kind.label().to_string());
    SpanDraft::new(kind, title)
}

/// Kind label, suffixed by the last field when there is one
fn labelled(kind: SpanKind, record: &LogRecord) -> SpanDraft {
    let title = match record.last_field() {
        Some(detail) => format!("{}: {}", kind.label(), detail),
        None => kind.label().to_string(),
    };
    SpanDraft::new(kind, title)
}

/// `CODE_UNIT_STARTED|[EXTERNAL]|01q..|Name on Account trigger event BeforeInsert|__sfdc_trigger/Name`
fn open_code_unit(record: &LogRecord) -> SpanDraft {
    let title = record
        .field(2)
        .filter(|f| !f.trim().is_empty())
        .or_else(|| record.last_field())
        .unwrap_or("Code Unit")
        .to_string();

    let trigger = record
        .last_field()
        .and_then(|f| f.strip_prefix("__sfdc_trigger/"))
        .map(outer_class);

    let apex_class = trigger.or_else(|| {
        title
            .contains('(')
            .then(|| class_of_signature(&title))
            .flatten()
    });

    SpanDraft::new(SpanKind::CodeUnit, title).with_class(apex_class)
}

/// `METHOD_ENTRY|[12]|01p..|Outer.Inner.doWork(Integer)`
fn open_method(record: &LogRecord) -> SpanDraft {
    let title = record.last_field().unwrap_or("Method").to_string();
    let apex_class = class_of_signature(&title);
    SpanDraft::new(SpanKind::Method, title).with_class(apex_class)
}

/// `CONSTRUCTOR_ENTRY|[1]|01p..|<init>(String)|Outer.Inner`
fn open_constructor(record: &LogRecord) -> SpanDraft {
    let signature = record.field(2).unwrap_or("<init>()");
    let class_name = record.field(3).filter(|f| !f.trim().is_empty());

    let (title, apex_class) = match class_name {
        Some(class_name) => {
            let args = signature.strip_prefix("<init>").unwrap_or(signature);
            (format!("{}{}", class_name, args), Some(outer_class(class_name)))
        }
        None => (signature.to_string(), class_of_signature(signature)),
    };
    SpanDraft::new(SpanKind::Constructor, title).with_class(apex_class)
}

/// `SOQL_EXECUTE_BEGIN|[12]|Aggregations:0|SELECT Id FROM Account`
fn open_soql(record: &LogRecord) -> SpanDraft {
    let query = record.rest_from(2).unwrap_or_default();
    let (aggregations, problem) = match keyed_number(record, "Aggregations") {
        Ok(n) => (n, None),
        Err(problem) => (None, Some(problem)),
    };

    let mut draft = SpanDraft::new(
        SpanKind::Soql {
            query: query.clone(),
            aggregations,
            explain: None,
        },
        query,
    )
    .with_metrics(Metrics {
        soql: 1,
        ..Default::default()
    });
    draft.problems.extend(problem);
    draft
}

/// `SOSL_EXECUTE_BEGIN|[3]|FIND :term IN ALL FIELDS`
fn open_sosl(record: &LogRecord) -> SpanDraft {
    let query = record.rest_from(1).unwrap_or_default();
    SpanDraft::new(SpanKind::Sosl { query: query.clone() }, query).with_metrics(Metrics {
        sosl: 1,
        ..Default::default()
    })
}

/// `DML_BEGIN|[10]|Op:Insert|Type:Account|Rows:1`
fn open_dml(record: &LogRecord) -> SpanDraft {
    let operation = record.keyed("Op").unwrap_or_default().to_string();
    let object_type = record.keyed("Type").unwrap_or_default().to_string();
    let title = format!("DML {} {}", operation, object_type).trim().to_string();

    let mut metrics = Metrics {
        dml: 1,
        ..Default::default()
    };
    let mut problems = Vec::new();
    match keyed_number(record, "Rows") {
        Ok(rows) => metrics.dml_rows = rows.unwrap_or(0),
        Err(problem) => problems.push(problem),
    }

    let mut draft = SpanDraft::new(
        SpanKind::Dml {
            operation,
            object_type,
        },
        title,
    )
    .with_metrics(metrics);
    draft.problems = problems;
    draft
}

/// `CALLOUT_REQUEST|[40]|System.HttpRequest[Endpoint=https://example.com, Method=GET]`
fn open_callout(record: &LogRecord) -> SpanDraft {
    let request = record.rest_from(1).unwrap_or_default();
    SpanDraft::new(
        SpanKind::Callout {
            request: request.clone(),
            response: None,
        },
        request,
    )
    .with_metrics(Metrics {
        callouts: 1,
        ..Default::default()
    })
}

/// `NAMED_CREDENTIAL_REQUEST|NamedCallout[Named Credential Id=0XA.., ...]`
fn open_named_credential(record: &LogRecord) -> SpanDraft {
    let request = record.rest_from(0).unwrap_or_default();
    SpanDraft::new(
        SpanKind::NamedCredential {
            request: request.clone(),
            response: None,
        },
        request,
    )
}

/// `FLOW_START_INTERVIEW_BEGIN|3000..|My Flow`
fn open_flow_interview(record: &LogRecord) -> SpanDraft {
    let interview = record.field(0).unwrap_or_default().to_string();
    let title = record.last_field().unwrap_or("Flow Interview").to_string();
    SpanDraft::new(SpanKind::FlowInterview { interview }, title)
}

/// `FLOW_ELEMENT_BEGIN|3000..|FlowDecision|Is_New`
fn open_flow_element(record: &LogRecord) -> SpanDraft {
    let element_type = record.field(1).unwrap_or_default().to_string();
    let title = record.last_field().unwrap_or("Flow Element").to_string();
    SpanDraft::new(
        SpanKind::FlowElement {
            element_type,
            errors: Vec::new(),
        },
        title,
    )
}

/// `FLOW_BULK_ELEMENT_BEGIN|FlowRecordUpdate|Update_Accounts`
fn open_flow_bulk_element(record: &LogRecord) -> SpanDraft {
    let element_type = record.field(0).unwrap_or_default().to_string();
    let title = record.last_field().unwrap_or("Flow Bulk Element").to_string();
    SpanDraft::new(
        SpanKind::FlowBulkElement {
            element_type,
            errors: Vec::new(),
        },
        title,
    )
}

/// `VALIDATION_RULE|03d..|Require_Phone`
fn open_validation_rule(record: &LogRecord) -> SpanDraft {
    let rule = record.last_field().unwrap_or("Validation Rule").to_string();
    SpanDraft::new(
        SpanKind::ValidationRule {
            rule: rule.clone(),
            formula: None,
            outcome: None,
            errors: Vec::new(),
        },
        rule,
    )
}

/// `WF_RULE_EVAL_BEGIN|Workflow`
fn open_workflow_eval(record: &LogRecord) -> SpanDraft {
    let title = match record.field(0).filter(|f| !f.trim().is_empty()) {
        Some(kind) => format!("Rule Evaluation: {}", kind),
        None => "Rule Evaluation".to_string(),
    };
    SpanDraft::new(SpanKind::WorkflowRuleEval(WorkflowDetail::default()), title)
}

/// `WF_CRITERIA_BEGIN|[Account: Acme 001..]|Rule Name|01Q..|ON_ALL_CHANGES|0`
fn open_workflow_criteria(record: &LogRecord) -> SpanDraft {
    let rule = record
        .field(1)
        .or_else(|| record.last_field())
        .unwrap_or("Workflow Criteria")
        .to_string();
    SpanDraft::new(
        SpanKind::WorkflowCriteria {
            rule: rule.clone(),
            result: None,
            detail: WorkflowDetail::default(),
        },
        rule,
    )
}

/// `ORG_CACHE_GET_BEGIN|[5]|local.Partition.key`
fn cache(record: &LogRecord, scope: CacheScope, op: CacheOp) -> SpanDraft {
    let key = record.rest_from(1).unwrap_or_default();
    let title = format!("{:?} cache {:?} {}", scope, op, key).trim().to_string();
    SpanDraft::new(SpanKind::Cache { scope, op }, title)
}

/// `VARIABLE_ASSIGNMENT|[3]|total|42`
fn open_variable_assignment(record: &LogRecord) -> SpanDraft {
    let name = record.field(1).unwrap_or_default().to_string();
    let value = record.field(2).unwrap_or_default().to_string();
    let title = format!("{} = {}", name, value);
    SpanDraft::new(SpanKind::VariableAssignment { name, value }, title)
}

/// `EXCEPTION_THROWN|[5]|System.NullPointerException: Attempt to de-reference a null object`
fn open_exception(record: &LogRecord) -> SpanDraft {
    let message = record.rest_from(1).unwrap_or_default();
    let title = first_line(&message);
    SpanDraft::new(SpanKind::Exception { message }, title)
}

/// `FATAL_ERROR|System.LimitException: Too many SOQL queries: 101` plus stack trace lines
fn open_fatal_error(record: &LogRecord) -> SpanDraft {
    let message = record.rest_from(0).unwrap_or_default();
    let title = first_line(&message);
    SpanDraft::new(SpanKind::FatalError { message }, title)
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

/// Owning class of a qualified signature: `Outer.Inner.run(Integer)` is `Outer`
///
/// Unqualified names (`run()`) resolve to nothing.
pub fn class_of_signature(signature: &str) -> Option<String> {
    let path = signature.split('(').next().unwrap_or(signature).trim();
    let mut segments = path.split('.');
    let head = segments.next()?;
    segments.next()?;
    (!head.is_empty()).then(|| head.to_string())
}

/// Outermost segment of a dotted class name
fn outer_class(name: &str) -> String {
    name.split('.').next().unwrap_or(name).trim().to_string()
}
