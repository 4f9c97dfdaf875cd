//! Types describing how the reference query gets adapted per question.

use serde::{Deserialize, Serialize};

/// Level of date granularity kept in the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGrain {
    /// `Dates[Date]` is structurally absent from the aggregation.
    None,
    /// One output row per date.
    Daily,
}

/// Question category detected by the ordered decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionIntent {
    /// Churn/retention deep dive. Forces the daily grain.
    Churn,
    /// Explicit time-series breakdown ("by day", "trend", ...).
    TimeSeries,
    /// Aggregate usage question with no temporal axis.
    Aggregate,
    /// Unrelated to report usage; falls back to the unmodified template.
    OutOfDomain,
}

/// Outcome of the decision table for one question. Pure data: the renderer
/// and the prompt builder both consume it, so the grain/filter decisions
/// stay auditable independently of prompt wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationDecision {
    pub intent: QuestionIntent,
    pub time_grain: TimeGrain,
    /// Exact report name to filter `Reports[ReportName]` by, if the
    /// question named one.
    pub report_filter: Option<String>,
}

impl AdaptationDecision {
    /// The fallback for underspecified or out-of-domain questions: the
    /// unmodified reference template, no filters.
    pub fn fallback() -> Self {
        Self {
            intent: QuestionIntent::OutOfDomain,
            time_grain: TimeGrain::Daily,
            report_filter: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.intent == QuestionIntent::OutOfDomain
    }
}

/// A query derived from the reference template, ready for execution.
/// Generated fresh per question and discarded after execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptedQuery {
    pub dax: String,
    pub decision: AdaptationDecision,
    /// True when the DAX came from the deterministic renderer rather than
    /// the generation collaborator.
    pub deterministic: bool,
}
