//! Prompt assembly for the generation and explanation collaborators.
//!
//! The exact wording here is an implementation choice; the structural rules
//! embedded in the generation prompt are the contract that must survive any
//! rephrasing, and they mirror the adapter's decision table one for one.

use crate::domain::adaptation::{AdaptationDecision, TimeGrain};
use crate::domain::transcript::{ExchangeRole, TranscriptEntry};
use crate::shared::text::truncate_at_word;

/// Raw result payloads can be large; keep the explanation prompt bounded.
const MAX_RESULT_CHARS: usize = 12_000;
const MAX_HISTORY_ENTRIES: usize = 6;

pub struct PromptBuilder;

impl PromptBuilder {
    /// System prompt for both LLM calls: the static schema context.
    pub fn system_context(description: &str) -> String {
        description.to_string()
    }

    /// User prompt asking the generation collaborator for one DAX query.
    /// The decision table's outcome is spelled out so the model has no
    /// latitude over the grain/filter choices.
    pub fn generation_prompt(
        reference_template: &str,
        decision: &AdaptationDecision,
        question: &str,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str("Reference query template (the only allowed starting point):\n");
        prompt.push_str(reference_template);
        prompt.push_str("\n\nMandatory structural rules:\n");
        prompt.push_str(
            "1. Use only these columns, exactly as written: Dates[Date], \
             Reports[ReportName], 'Report views'[UserId], 'Report views'[ReportId].\n",
        );
        prompt.push_str(
            "2. Always compute both measures, with these exact aliases: \
             \"CountReportId\" and \"DistinctCountUserId\".\n",
        );
        match decision.time_grain {
            TimeGrain::None => prompt.push_str(
                "3. Remove Dates[Date] from the grouping entirely; this question \
                 needs a single aggregate, not a per-day breakdown.\n",
            ),
            TimeGrain::Daily => prompt.push_str(
                "3. Keep Dates[Date] in the grouping; this question needs a time axis.\n",
            ),
        }
        match &decision.report_filter {
            Some(name) => prompt.push_str(&format!(
                "4. Filter Reports[ReportName] to exactly \"{}\".\n",
                name
            )),
            None => prompt.push_str("4. Do not filter by report name; include all reports.\n"),
        }
        prompt.push_str(
            "5. Do not add other aggregations, joins, or tables; do not rename anything.\n",
        );

        prompt.push_str(&format!("\nUser question: {}\n", question.trim()));
        prompt.push_str("\nRemove any special formatting. Return only the DAX code.");
        prompt
    }

    /// User prompt asking the explanation collaborator to narrate a raw
    /// row-set result. Recent transcript history gives conversational
    /// context for follow-up questions.
    pub fn explanation_prompt(
        raw_result: &serde_json::Value,
        question: &str,
        history: &[TranscriptEntry],
    ) -> String {
        let mut prompt = String::new();

        let recent: Vec<&TranscriptEntry> = history
            .iter()
            .rev()
            .take(MAX_HISTORY_ENTRIES)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if !recent.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for entry in recent {
                let label = match entry.role {
                    ExchangeRole::User => "User",
                    ExchangeRole::Assistant => "Assistant",
                };
                prompt.push_str(&format!(
                    "{}: {}\n",
                    label,
                    truncate_at_word(&entry.content, 300)
                ));
            }
            prompt.push('\n');
        }

        let rendered =
            serde_json::to_string_pretty(raw_result).unwrap_or_else(|_| raw_result.to_string());
        prompt.push_str("Raw results of a DAX query over the usage metrics dataset:\n");
        prompt.push_str(&truncate_at_word(&rendered, MAX_RESULT_CHARS));
        prompt.push_str(&format!(
            "\n\nExplain these results in plain English to answer: {}\n",
            question.trim()
        ));
        prompt.push_str(
            "Mention both total views and unique users where relevant. \
             If the result is empty, say so plainly.",
        );
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::adaptation::QuestionIntent;
    use serde_json::json;

    #[test]
    fn generation_prompt_spells_out_grain_elision() {
        let decision = AdaptationDecision {
            intent: QuestionIntent::Aggregate,
            time_grain: TimeGrain::None,
            report_filter: Some("Sales Dashboard".to_string()),
        };
        let prompt = PromptBuilder::generation_prompt("EVALUATE ...", &decision, "how many views?");
        assert!(prompt.contains("Remove Dates[Date]"));
        assert!(prompt.contains("exactly \"Sales Dashboard\""));
        assert!(prompt.contains("CountReportId"));
        assert!(prompt.contains("DistinctCountUserId"));
    }

    #[test]
    fn generation_prompt_keeps_grain_for_churn() {
        let decision = AdaptationDecision {
            intent: QuestionIntent::Churn,
            time_grain: TimeGrain::Daily,
            report_filter: None,
        };
        let prompt = PromptBuilder::generation_prompt("EVALUATE ...", &decision, "why churn?");
        assert!(prompt.contains("Keep Dates[Date]"));
        assert!(prompt.contains("Do not filter by report name"));
    }

    #[test]
    fn explanation_prompt_includes_question_and_history() {
        let history = vec![
            TranscriptEntry::user("How many views yesterday?"),
            TranscriptEntry::assistant("There were 42 views.", None),
        ];
        let prompt = PromptBuilder::explanation_prompt(
            &json!({"results": []}),
            "And unique users?",
            &history,
        );
        assert!(prompt.contains("Recent conversation:"));
        assert!(prompt.contains("There were 42 views."));
        assert!(prompt.contains("And unique users?"));
    }
}
