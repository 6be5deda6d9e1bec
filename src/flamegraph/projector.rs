//! Renderer-agnostic flame graph shape.

use crate::parser::schema::{Span, SpanKind};
use crate::parser::timestamp::wall_clock_ms;
use serde::{Deserialize, Serialize};

/// Display category of a flame node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlameType {
    Root,
    CodeUnit,
    Method,
    SystemMethod,
    Soql,
    Dml,
    Callout,
    Flow,
    Workflow,
    Validation,
    Cache,
    Visualforce,
    Exception,
    Other,
}

impl FlameType {
    pub fn from_kind(kind: &SpanKind) -> Self {
        match kind {
            SpanKind::Root => Self::Root,
            SpanKind::Execution | SpanKind::CodeUnit => Self::CodeUnit,
            SpanKind::Method | SpanKind::Constructor => Self::Method,
            SpanKind::SystemMethod | SpanKind::SystemConstructor => Self::SystemMethod,
            SpanKind::Soql { .. } | SpanKind::Sosl { .. } | SpanKind::QueryMore => Self::Soql,
            SpanKind::Dml { .. } => Self::Dml,
            SpanKind::Callout { .. } | SpanKind::NamedCredential { .. } => Self::Callout,
            SpanKind::FlowStartInterviews
            | SpanKind::FlowCreateInterview
            | SpanKind::FlowInterview { .. }
            | SpanKind::FlowElement { .. }
            | SpanKind::FlowBulkElement { .. } => Self::Flow,
            SpanKind::WorkflowRuleEval(_)
            | SpanKind::WorkflowCriteria { .. }
            | SpanKind::WorkflowRuleInvocation(_) => Self::Workflow,
            SpanKind::ValidationRule { .. } => Self::Validation,
            SpanKind::Cache { .. } => Self::Cache,
            SpanKind::VfApexCall
            | SpanKind::VfDeserializeViewstate
            | SpanKind::VfSerializeViewstate
            | SpanKind::VfEvaluateFormula
            | SpanKind::VfSerializeContinuationState
            | SpanKind::VfDeserializeContinuationState => Self::Visualforce,
            SpanKind::Exception { .. } | SpanKind::FatalError { .. } => Self::Exception,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::CodeUnit => "Code Unit",
            Self::Method => "Method",
            Self::SystemMethod => "System",
            Self::Soql => "SOQL",
            Self::Dml => "DML",
            Self::Callout => "Callout",
            Self::Flow => "Flow",
            Self::Workflow => "Workflow",
            Self::Validation => "Validation",
            Self::Cache => "Cache",
            Self::Visualforce => "Visualforce",
            Self::Exception => "Exception",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlameNode {
    pub name: String,
    /// ms; from the nanosecond counter when present, else wall clock since midnight
    pub start: f64,
    /// ms
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: FlameType,
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(FlameNode::depth).max().unwrap_or(0)
    }
}

/// Project a span tree, keeping every span regardless of visibility
///
/// **Public** - main entry point for flame graph data
pub fn project(span: &Span) -> FlameNode {
    FlameNode {
        name: span.title.clone(),
        start: start_ms(span),
        duration: span.duration,
        kind: FlameType::from_kind(&span.kind),
        children: span.children.iter().map(project).collect(),
    }
}

fn start_ms(span: &Span) -> f64 {
    match (span.start_nanos, span.start) {
        (Some(nanos), _) => nanos as f64 / 1_000_000.0,
        (None, Some(time)) => wall_clock_ms(time),
        (None, None) => 0.0,
    }
}
