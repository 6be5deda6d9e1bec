//! Span tree data model.
//!
//! Every recognized begin/end (or self-closing) event becomes a [`Span`].
//! Shared data (timing, metrics, children, UI state) lives on the span
//! itself; per-kind data lives in the [`SpanKind`] payload.

use super::diagnostic::DiagnosticKind;
use super::lines::LogRecord;
use super::timestamp::{elapsed_ms, Timestamp};
use crate::utils::config::{MIN_DURATION_MS, ROOT_TITLE};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Resource counters for a span
///
/// Event counters (`dml`, `soql`, `sosl`, `callouts`) are 0 or 1 on a
/// single span; the rest are amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Heap bytes allocated
    pub heap: u64,

    /// Rows returned by SOQL/SOSL
    pub rows: u64,

    /// Rows touched by DML
    pub dml_rows: u64,

    pub dml: u64,
    pub soql: u64,
    pub sosl: u64,
    pub callouts: u64,
}

impl Add for Metrics {
    type Output = Metrics;

    fn add(mut self, rhs: Metrics) -> Metrics {
        self += rhs;
        self
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Metrics) {
        self.heap = self.heap.saturating_add(rhs.heap);
        self.rows = self.rows.saturating_add(rhs.rows);
        self.dml_rows = self.dml_rows.saturating_add(rhs.dml_rows);
        self.dml = self.dml.saturating_add(rhs.dml);
        self.soql = self.soql.saturating_add(rhs.soql);
        self.sosl = self.sosl.saturating_add(rhs.sosl);
        self.callouts = self.callouts.saturating_add(rhs.callouts);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheScope {
    Org,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheOp {
    Put,
    Get,
    Remove,
    MemoryUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationOutcome {
    Pass,
    Fail,
}

/// Query plan attached by `SOQL_EXECUTE_EXPLAIN`
///
/// e.g. `Index on Account : [Id], cardinality: 1, sobjectCardinality: 10, relativeCost 0.1`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    pub raw: String,
    pub leading_operation: Option<String>,
    pub cardinality: Option<u64>,
    pub sobject_cardinality: Option<u64>,
    pub relative_cost: Option<f64>,
}

impl QueryPlan {
    pub fn parse(text: &str) -> Self {
        let mut plan = QueryPlan {
            raw: text.to_string(),
            leading_operation: text.split_whitespace().next().map(str::to_string),
            ..Default::default()
        };

        for part in text.split(", ") {
            let part = part.trim();
            if let Some(v) = part.strip_prefix("cardinality:") {
                plan.cardinality = v.trim().parse().ok();
            } else if let Some(v) = part.strip_prefix("sobjectCardinality:") {
                plan.sobject_cardinality = v.trim().parse().ok();
            } else if let Some(v) = part.strip_prefix("relativeCost") {
                plan.relative_cost = v.trim().parse().ok();
            }
        }
        plan
    }
}

/// Annotations collected by workflow spans
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowDetail {
    pub criteria: Vec<String>,
    pub formulas: Vec<String>,
    pub field_updates: Vec<String>,
}

/// Per-kind payload of a span
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanKind {
    Root,
    Execution,
    CodeUnit,
    Method,
    SystemMethod,
    Constructor,
    SystemConstructor,
    Soql {
        query: String,
        aggregations: Option<u64>,
        explain: Option<QueryPlan>,
    },
    Sosl {
        query: String,
    },
    QueryMore,
    Dml {
        operation: String,
        object_type: String,
    },
    Callout {
        request: String,
        response: Option<String>,
    },
    NamedCredential {
        request: String,
        response: Option<String>,
    },
    CumulativeProfiling,
    CumulativeLimitUsage,
    FlowStartInterviews,
    FlowCreateInterview,
    FlowInterview {
        interview: String,
    },
    FlowElement {
        element_type: String,
        errors: Vec<String>,
    },
    FlowBulkElement {
        element_type: String,
        errors: Vec<String>,
    },
    ValidationRule {
        rule: String,
        formula: Option<String>,
        outcome: Option<ValidationOutcome>,
        errors: Vec<String>,
    },
    WorkflowRuleEval(WorkflowDetail),
    WorkflowCriteria {
        rule: String,
        result: Option<bool>,
        detail: WorkflowDetail,
    },
    WorkflowRuleInvocation(WorkflowDetail),
    Cache {
        scope: CacheScope,
        op: CacheOp,
    },
    Exception {
        message: String,
    },
    FatalError {
        message: String,
    },
    VariableAssignment {
        name: String,
        value: String,
    },
    Statement,
    VfApexCall,
    VfDeserializeViewstate,
    VfSerializeViewstate,
    VfEvaluateFormula,
    VfSerializeContinuationState,
    VfDeserializeContinuationState,
    NbaNode,
    NbaStrategy,
    NbaOfferInvalid,
    DuplicateDetection,
    MatchEngine,
    EventPublish,
}

/// Data a non-span record can attach to an open span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Debug,
    Heap,
    Explain,
    ValidationFormula,
    ValidationError,
    FlowError,
    WorkflowCriteria,
    WorkflowFormula,
    WorkflowFieldUpdate,
}

impl Attachment {
    pub fn is_workflow(self) -> bool {
        matches!(
            self,
            Self::WorkflowCriteria | Self::WorkflowFormula | Self::WorkflowFieldUpdate
        )
    }
}

impl SpanKind {
    /// Short display name of the kind
    pub fn label(&self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Execution => "Execution",
            Self::CodeUnit => "Code Unit",
            Self::Method => "Method",
            Self::SystemMethod => "System Method",
            Self::Constructor => "Constructor",
            Self::SystemConstructor => "System Constructor",
            Self::Soql { .. } => "SOQL",
            Self::Sosl { .. } => "SOSL",
            Self::QueryMore => "Query More",
            Self::Dml { .. } => "DML",
            Self::Callout { .. } => "Callout",
            Self::NamedCredential { .. } => "Named Credential",
            Self::CumulativeProfiling => "Cumulative Profiling",
            Self::CumulativeLimitUsage => "Cumulative Limit Usage",
            Self::FlowStartInterviews => "Flow Start Interviews",
            Self::FlowCreateInterview => "Flow Create Interview",
            Self::FlowInterview { .. } => "Flow Interview",
            Self::FlowElement { .. } => "Flow Element",
            Self::FlowBulkElement { .. } => "Flow Bulk Element",
            Self::ValidationRule { .. } => "Validation Rule",
            Self::WorkflowRuleEval(_) => "Workflow Rule Evaluation",
            Self::WorkflowCriteria { .. } => "Workflow Criteria",
            Self::WorkflowRuleInvocation(_) => "Workflow Rule Invocation",
            Self::Cache { .. } => "Cache",
            Self::Exception { .. } => "Exception",
            Self::FatalError { .. } => "Fatal Error",
            Self::VariableAssignment { .. } => "Variable Assignment",
            Self::Statement => "Statement",
            Self::VfApexCall => "VF Apex Call",
            Self::VfDeserializeViewstate => "VF Deserialize Viewstate",
            Self::VfSerializeViewstate => "VF Serialize Viewstate",
            Self::VfEvaluateFormula => "VF Evaluate Formula",
            Self::VfSerializeContinuationState => "VF Serialize Continuation State",
            Self::VfDeserializeContinuationState => "VF Deserialize Continuation State",
            Self::NbaNode => "NBA Node",
            Self::NbaStrategy => "NBA Strategy",
            Self::NbaOfferInvalid => "NBA Offer Invalid",
            Self::DuplicateDetection => "Duplicate Detection",
            Self::MatchEngine => "Match Engine",
            Self::EventPublish => "Event Publish",
        }
    }

    /// Kinds too fine-grained for the profiler table unless they are slow
    pub fn is_low_signal(&self) -> bool {
        matches!(
            self,
            Self::Method
                | Self::SystemMethod
                | Self::Constructor
                | Self::SystemConstructor
                | Self::VariableAssignment { .. }
                | Self::Statement
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Exception { .. } | Self::FatalError { .. })
    }

    /// Whether a span of this kind can take the given attachment
    pub fn accepts(&self, attachment: Attachment) -> bool {
        match attachment {
            Attachment::Debug | Attachment::Heap => true,
            Attachment::Explain => matches!(self, Self::Soql { .. }),
            Attachment::ValidationFormula | Attachment::ValidationError => {
                matches!(self, Self::ValidationRule { .. })
            }
            Attachment::FlowError => {
                matches!(self, Self::FlowElement { .. } | Self::FlowBulkElement { .. })
            }
            Attachment::WorkflowCriteria
            | Attachment::WorkflowFormula
            | Attachment::WorkflowFieldUpdate => matches!(
                self,
                Self::WorkflowRuleEval(_)
                    | Self::WorkflowCriteria { .. }
                    | Self::WorkflowRuleInvocation(_)
            ),
        }
    }

    fn workflow_detail_mut(&mut self) -> Option<&mut WorkflowDetail> {
        match self {
            Self::WorkflowRuleEval(detail)
            | Self::WorkflowRuleInvocation(detail)
            | Self::WorkflowCriteria { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Everything needed to construct a span, produced by a dispatch opener
#[derive(Debug, Clone, PartialEq)]
pub struct SpanDraft {
    pub kind: SpanKind,
    pub title: String,
    pub metrics: Metrics,
    pub apex_class: Option<String>,
    /// Problems found while reading the opening record
    pub problems: Vec<DiagnosticKind>,
}

impl SpanDraft {
    pub fn new(kind: SpanKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            metrics: Metrics::default(),
            apex_class: None,
            problems: Vec::new(),
        }
    }

    pub fn with_class(mut self, apex_class: Option<String>) -> Self {
        self.apex_class = apex_class;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }
}

/// One node of the execution tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    /// Construction sequence number, unique within one parse
    pub index: usize,
    pub kind: SpanKind,
    pub title: String,

    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub start_nanos: Option<u64>,
    pub end_nanos: Option<u64>,

    /// Milliseconds, never below [`MIN_DURATION_MS`]
    pub duration: f64,

    /// This span's own contributions
    pub metrics: Metrics,

    /// Own contributions plus every descendant's (see `aggregator`)
    pub totals: Metrics,

    /// Source line inside the owning class
    pub line_number: Option<u32>,
    pub apex_class: Option<String>,

    /// USER_DEBUG output emitted while this span was open
    pub debug: Vec<String>,

    pub log_start_line: usize,
    pub log_end_line: usize,

    pub hidden: bool,
    pub expanded: bool,

    pub children: Vec<Span>,
}

impl Span {
    /// A span with no timing or log position
    pub fn detached(index: usize, kind: SpanKind, title: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            title: title.into(),
            start: None,
            end: None,
            start_nanos: None,
            end_nanos: None,
            duration: MIN_DURATION_MS,
            metrics: Metrics::default(),
            totals: Metrics::default(),
            line_number: None,
            apex_class: None,
            debug: Vec::new(),
            log_start_line: 0,
            log_end_line: 0,
            hidden: false,
            expanded: true,
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self::detached(0, SpanKind::Root, ROOT_TITLE)
    }

    /// Open a span from a draft and the record that began it
    pub fn open(index: usize, draft: SpanDraft, record: &LogRecord) -> Self {
        let mut span = Self::detached(index, draft.kind, draft.title);
        span.start = record.timestamp.time;
        span.start_nanos = record.timestamp.nanos;
        span.metrics = draft.metrics;
        span.apex_class = draft.apex_class;
        span.line_number = record.line_ref();
        span.log_start_line = record.start_line;
        span.log_end_line = record.end_line;
        span
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, SpanKind::Root)
    }

    pub fn start_timestamp(&self) -> Timestamp {
        Timestamp {
            time: self.start,
            nanos: self.start_nanos,
        }
    }

    /// Set the end point and derive the duration
    ///
    /// The end is clamped so it never precedes the start.
    pub fn close(&mut self, end: Timestamp, end_line: usize) {
        self.end = match (self.start, end.time) {
            (Some(s), Some(e)) if e < s => Some(s),
            (_, e) => e,
        };
        self.end_nanos = match (self.start_nanos, end.nanos) {
            (Some(s), Some(e)) => Some(e.max(s)),
            (_, e) => e,
        };
        self.log_end_line = end_line.max(self.log_start_line);
        self.duration = elapsed_ms(&self.start_timestamp(), &end).max(MIN_DURATION_MS);
    }

    /// Apply kind-specific data carried by the closing record
    pub fn finish_with(&mut self, record: &LogRecord) -> Option<DiagnosticKind> {
        match &mut self.kind {
            SpanKind::Soql { .. } | SpanKind::Sosl { .. } => {
                match keyed_number(record, "Rows") {
                    Ok(Some(rows)) => self.metrics.rows = rows,
                    Ok(None) => {}
                    Err(problem) => return Some(problem),
                }
            }
            SpanKind::Callout { response, .. } | SpanKind::NamedCredential { response, .. } => {
                *response = record.rest_from(0).or_else(|| record.last_field().map(str::to_string));
            }
            SpanKind::ValidationRule { outcome, .. } => {
                *outcome = match record.tag.as_str() {
                    "VALIDATION_PASS" => Some(ValidationOutcome::Pass),
                    "VALIDATION_FAIL" => Some(ValidationOutcome::Fail),
                    _ => None,
                };
            }
            SpanKind::WorkflowCriteria { result, .. } => {
                *result = record.field(0).and_then(|f| f.trim().parse().ok());
            }
            _ => {}
        }
        None
    }

    /// Attach a non-span record's data to this span
    pub fn attach(&mut self, attachment: Attachment, record: &LogRecord) -> Option<DiagnosticKind> {
        let text = || record.rest_from(0).unwrap_or_default();

        match attachment {
            Attachment::Debug => {
                let message = record
                    .rest_from(2)
                    .or_else(|| record.last_field().map(str::to_string))
                    .unwrap_or_default();
                self.debug.push(message);
            }
            Attachment::Heap => match keyed_number(record, "Bytes") {
                Ok(Some(bytes)) => {
                    self.metrics.heap = self.metrics.heap.saturating_add(bytes)
                }
                Ok(None) => {}
                Err(problem) => return Some(problem),
            },
            Attachment::Explain => {
                if let SpanKind::Soql { explain, .. } = &mut self.kind {
                    let plan = record.rest_from(1).unwrap_or_default();
                    *explain = Some(QueryPlan::parse(&plan));
                }
            }
            Attachment::ValidationFormula => {
                if let SpanKind::ValidationRule { formula, .. } = &mut self.kind {
                    *formula = Some(text());
                }
            }
            Attachment::ValidationError => {
                if let SpanKind::ValidationRule { errors, .. } = &mut self.kind {
                    errors.push(text());
                }
            }
            Attachment::FlowError => {
                if let SpanKind::FlowElement { errors, .. }
                | SpanKind::FlowBulkElement { errors, .. } = &mut self.kind
                {
                    errors.push(record.field(0).unwrap_or_default().to_string());
                }
            }
            Attachment::WorkflowCriteria
            | Attachment::WorkflowFormula
            | Attachment::WorkflowFieldUpdate => {
                if let Some(detail) = self.kind.workflow_detail_mut() {
                    let target = match attachment {
                        Attachment::WorkflowCriteria => &mut detail.criteria,
                        Attachment::WorkflowFormula => &mut detail.formulas,
                        _ => &mut detail.field_updates,
                    };
                    target.push(text());
                }
            }
        }
        None
    }

    /// Visit this span and all descendants, parents first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Span)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of spans in this subtree, including this one
    pub fn span_count(&self) -> usize {
        1 + self.children.iter().map(Span::span_count).sum::<usize>()
    }

    pub fn find(&self, index: usize) -> Option<&Span> {
        if self.index == index {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(index))
    }

    pub fn find_mut(&mut self, index: usize) -> Option<&mut Span> {
        if self.index == index {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(index))
    }
}

/// Parse a `Key:N` count field
///
/// `Ok(None)` when the key is absent; an error when present but not a number.
pub fn keyed_number(record: &LogRecord, key: &str) -> Result<Option<u64>, DiagnosticKind> {
    match record.keyed(key) {
        None => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DiagnosticKind::InvalidNumber {
                field: key.to_string(),
                value: value.to_string(),
            }),
    }
}
