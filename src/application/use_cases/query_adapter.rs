//! Query Template Adapter
//!
//! Adapts the fixed reference query to one user question. The adaptation is
//! an ordered decision table, evaluated top to bottom:
//!
//! 1. Churn/retention intent  -> keep the daily grain (wins every tie)
//! 2. Time-series intent      -> keep the daily grain
//! 3. Neither                 -> drop `Dates[Date]` from the grouping
//! 4. Named report            -> exact-match filter on `Reports[ReportName]`
//!
//! A question with no recognizable usage intent and no named report falls
//! back to the unmodified reference template with no filters. The adapter
//! is a pure function of its inputs: same question, same schema, same
//! decision, every time.

use crate::domain::adaptation::{AdaptationDecision, AdaptedQuery, QuestionIntent, TimeGrain};
use crate::domain::usage_schema::{
    UsageSchema, COL_DATE, COL_REPORT_NAME, MEASURE_COUNT_VIEWS, MEASURE_COUNT_VIEWS_EXPR,
    MEASURE_DISTINCT_USERS, MEASURE_DISTINCT_USERS_EXPR,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static QUOTED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']([^"']{1,120})["']"#).expect("quoted name pattern compiles")
});

/// Words that terminate a "the <Name> report" / "the <Name> Dashboard"
/// phrase. For "report" the name is the words before the terminator; for
/// "dashboard" the terminator is part of the name.
const PHRASE_TERMINATORS: &[(&str, bool)] = &[("report", false), ("dashboard", true)];

/// Phrases that mark a churn/retention deep dive. Checked first: churn
/// analysis needs a time axis even when the question reads as an aggregate.
const CHURN_KEYWORDS: &[&str] = &[
    "churn",
    "churning",
    "retention",
    "retain",
    "stopped using",
    "stop using",
    "stopped viewing",
    "drop-off",
    "drop off",
    "dropping off",
    "attrition",
    "deep dive",
];

/// Phrases that ask for a per-day breakdown.
const TIME_SERIES_KEYWORDS: &[&str] = &[
    "by day",
    "per day",
    "daily",
    "each day",
    "day by day",
    "over time",
    "trend",
    "trending",
    "time series",
    "timeline",
    "over the last",
    "over the past",
];

/// Vocabulary that places a question inside the reporting-usage domain at
/// all. Absent these (and absent a named report), the question is treated
/// as underspecified.
const DOMAIN_KEYWORDS: &[&str] = &[
    "report",
    "reports",
    "dashboard",
    "view",
    "views",
    "viewed",
    "viewer",
    "viewers",
    "usage",
    "used",
    "user",
    "users",
    "audience",
    "popular",
    "adoption",
    "traffic",
];

pub struct QueryTemplateAdapter {
    schema: Arc<UsageSchema>,
    /// Report names known for the selected workspace, used to resolve
    /// unquoted mentions. Optional; extraction degrades gracefully.
    known_reports: Vec<String>,
}

impl QueryTemplateAdapter {
    pub fn new(schema: Arc<UsageSchema>) -> Self {
        Self {
            schema,
            known_reports: Vec::new(),
        }
    }

    pub fn with_known_reports(mut self, reports: Vec<String>) -> Self {
        self.known_reports = reports;
        self
    }

    pub fn schema(&self) -> &UsageSchema {
        &self.schema
    }

    /// Run the decision table against one question.
    pub fn decide(&self, question: &str) -> AdaptationDecision {
        let lower = question.to_lowercase();

        let report_filter = self.extract_report_name(question, &lower);

        // Ordered: churn wins over time-series, both win over elision.
        let (intent, time_grain) = if contains_any(&lower, CHURN_KEYWORDS) {
            (QuestionIntent::Churn, TimeGrain::Daily)
        } else if contains_any(&lower, TIME_SERIES_KEYWORDS) {
            (QuestionIntent::TimeSeries, TimeGrain::Daily)
        } else if report_filter.is_some() || contains_any(&lower, DOMAIN_KEYWORDS) {
            (QuestionIntent::Aggregate, TimeGrain::None)
        } else {
            debug!(question, "no usage intent detected, falling back to reference template");
            return AdaptationDecision::fallback();
        };

        let decision = AdaptationDecision {
            intent,
            time_grain,
            report_filter,
        };
        debug!(?decision, "adaptation decision");
        decision
    }

    /// Render the DAX for a decision. Only whitelisted identifiers are ever
    /// emitted, so this output always passes the schema guard.
    pub fn render(&self, decision: &AdaptationDecision) -> String {
        if decision.is_fallback() {
            return self.schema.reference_template.clone();
        }

        let mut lines: Vec<String> = Vec::new();
        if decision.time_grain == TimeGrain::Daily {
            lines.push(format!("    {},", COL_DATE));
        }
        lines.push(format!("    {},", COL_REPORT_NAME));

        if let Some(name) = &decision.report_filter {
            lines.push(format!(
                "    FILTER(VALUES({col}), {col} = \"{name}\"),",
                col = COL_REPORT_NAME,
                name = escape_dax_string(name),
            ));
        }

        lines.push(format!(
            "    \"{}\", {},",
            MEASURE_COUNT_VIEWS, MEASURE_COUNT_VIEWS_EXPR
        ));
        lines.push(format!(
            "    \"{}\", {}",
            MEASURE_DISTINCT_USERS, MEASURE_DISTINCT_USERS_EXPR
        ));

        format!("EVALUATE\nSUMMARIZECOLUMNS(\n{}\n)", lines.join("\n"))
    }

    /// Decide and render in one step.
    pub fn adapt(&self, question: &str) -> AdaptedQuery {
        let decision = self.decide(question);
        let dax = self.render(&decision);
        AdaptedQuery {
            dax,
            decision,
            deterministic: true,
        }
    }

    /// Extract a named report from the question, if any.
    ///
    /// Quoted names are taken verbatim. Unquoted mentions are resolved
    /// against the workspace's known report names when available, else via
    /// the "the <Name> report" phrasing. No guess is ever made: failure to
    /// extract means no filter.
    fn extract_report_name(&self, question: &str, lower: &str) -> Option<String> {
        // Quoted name, single or double quotes.
        if let Some(caps) = QUOTED_NAME_RE.captures(question) {
            if let Some(m) = caps.get(1) {
                let name = m.as_str().trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }

        // Known report names from the workspace, longest match first so
        // "Sales Dashboard EU" beats "Sales Dashboard".
        let mut candidates: Vec<&String> = self
            .known_reports
            .iter()
            .filter(|r| lower.contains(&r.to_lowercase()))
            .collect();
        candidates.sort_by_key(|r| std::cmp::Reverse(r.len()));
        if let Some(name) = candidates.first() {
            return Some((*name).clone());
        }

        for &(terminator, name_includes_terminator) in PHRASE_TERMINATORS {
            if let Some(name) = phrase_before_terminator(question, terminator, name_includes_terminator)
            {
                // Generic references ("the usage report") are not names.
                if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                    return Some(name);
                }
            }
        }

        None
    }
}

/// The words between the nearest "the" and the terminator word, so
/// "did the CEO view the Finance report" yields "Finance", not everything
/// since the first "the".
fn phrase_before_terminator(
    question: &str,
    terminator: &str,
    name_includes_terminator: bool,
) -> Option<String> {
    let words: Vec<&str> = question.split_whitespace().collect();
    let term_idx = words
        .iter()
        .position(|w| strip_punctuation(w).eq_ignore_ascii_case(terminator))?;
    let the_idx = words[..term_idx]
        .iter()
        .rposition(|w| strip_punctuation(w).eq_ignore_ascii_case("the"))?;

    let end = if name_includes_terminator {
        term_idx + 1
    } else {
        term_idx
    };
    if the_idx + 1 >= end {
        return None;
    }
    let name = words[the_idx + 1..end]
        .iter()
        .map(|w| strip_punctuation(w))
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn escape_dax_string(value: &str) -> String {
    value.replace('"', "\"\"")
}
