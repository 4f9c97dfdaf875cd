//! End-to-end question answering.
//!
//! Strictly sequential: adapt, generate, guard, execute, explain. No
//! fan-out, no pipelining. Generation and execution share one bounded
//! retry budget; adaptation itself is deterministic and never retried.

use crate::application::use_cases::prompt_builder::PromptBuilder;
use crate::application::use_cases::query_adapter::QueryTemplateAdapter;
use crate::application::use_cases::schema_guard::SchemaGuard;
use crate::application::use_cases::transcript::SessionTranscript;
use crate::domain::adaptation::AdaptedQuery;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::question::UserQuestion;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::powerbi::QueryExecutor;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Final product of one request cycle.
#[derive(Debug, Clone)]
pub struct Insight {
    pub question: String,
    pub query: AdaptedQuery,
    pub raw_result: Value,
    pub answer: String,
}

pub struct InsightPipeline {
    adapter: QueryTemplateAdapter,
    guard: SchemaGuard,
    llm: Arc<dyn LLMClient + Send + Sync>,
    executor: Arc<dyn QueryExecutor + Send + Sync>,
    generation_cfg: LLMConfig,
    explanation_cfg: LLMConfig,
    max_retries: u32,
}

impl InsightPipeline {
    pub fn new(
        adapter: QueryTemplateAdapter,
        llm: Arc<dyn LLMClient + Send + Sync>,
        executor: Arc<dyn QueryExecutor + Send + Sync>,
        generation_cfg: LLMConfig,
        explanation_cfg: LLMConfig,
        max_retries: u32,
    ) -> Self {
        Self {
            adapter,
            guard: SchemaGuard::new(),
            llm,
            executor,
            generation_cfg,
            explanation_cfg,
            max_retries: max_retries.max(1),
        }
    }

    /// Answer one question, appending both sides to the transcript.
    ///
    /// The exchange is recorded only once an answer exists; a failed
    /// request leaves the transcript untouched so later explanation
    /// prompts never see an unanswered question.
    pub async fn answer(
        &self,
        transcript: &mut SessionTranscript,
        question: &str,
    ) -> Result<Insight> {
        let question = UserQuestion::new(question);
        question
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let query = self.derive_query(&question.text).await;
        info!(deterministic = query.deterministic, "adapted query ready");

        let raw_result = self.execute_with_retry(&query.dax).await?;

        let explanation_prompt =
            PromptBuilder::explanation_prompt(&raw_result, &question.text, transcript.entries());
        let answer = self
            .llm
            .generate(
                &self.explanation_cfg,
                &PromptBuilder::system_context(&self.adapter.schema().description),
                &explanation_prompt,
            )
            .await?;

        transcript.record_question(&question.text);
        transcript.record_answer(&answer, Some(query.dax.clone()));

        Ok(Insight {
            question: question.text,
            query,
            raw_result,
            answer,
        })
    }

    /// Obtain a guard-approved DAX query for the question.
    ///
    /// Out-of-domain questions skip generation: the fallback policy is the
    /// unmodified reference template. Otherwise the generation collaborator
    /// gets one attempt plus one regeneration after a schema violation;
    /// after that the deterministic rendering is used, which only emits
    /// whitelisted names.
    async fn derive_query(&self, question: &str) -> AdaptedQuery {
        let deterministic = self.adapter.adapt(question);
        if deterministic.decision.is_fallback() {
            return deterministic;
        }

        let system = PromptBuilder::system_context(&self.adapter.schema().description);
        let prompt = PromptBuilder::generation_prompt(
            &self.adapter.schema().reference_template,
            &deterministic.decision,
            question,
        );

        for attempt in 1..=2u32 {
            match self.llm.generate(&self.generation_cfg, &system, &prompt).await {
                Ok(raw) => {
                    let dax = strip_code_fences(&raw);
                    let verdict = self.guard.validate(&dax);
                    if verdict.is_valid {
                        return AdaptedQuery {
                            dax,
                            decision: deterministic.decision.clone(),
                            deterministic: false,
                        };
                    }
                    warn!(
                        attempt,
                        errors = ?verdict.errors,
                        "generated DAX rejected by schema guard"
                    );
                }
                Err(e) => {
                    warn!(attempt, error = %e, "DAX generation failed");
                }
            }
        }

        info!("falling back to deterministic rendering");
        deterministic
    }

    /// Execute with a bounded retry budget. Transient failures are retried;
    /// auth/config failures surface immediately.
    async fn execute_with_retry(&self, dax: &str) -> Result<Value> {
        let mut last_err: Option<AppError> = None;
        for attempt in 1..=self.max_retries {
            match self.executor.execute(dax).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(attempt, max = self.max_retries, error = %e, "query execution failed");
                    last_err = Some(e);
                }
            }
        }
        Err(AppError::ExecutionError(format!(
            "Could not retrieve results after {} attempts: {}",
            self.max_retries,
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

/// LLMs habitually wrap code answers in markdown fences.
fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("```dax")
        .trim_start_matches("```DAX")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage_schema::{UsageSchema, DEFAULT_REFERENCE_TEMPLATE};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedLlm {
        generation: String,
        calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(generation: &str) -> Self {
            Self {
                generation: generation.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLlm {
        async fn generate(&self, config: &LLMConfig, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if config.model.contains("mini") {
                Ok("The Sales Dashboard had 42 views from 7 users.".to_string())
            } else {
                Ok(self.generation.clone())
            }
        }
    }

    struct FlakyExecutor {
        failures_before_success: u32,
        calls: AtomicU32,
        fatal: bool,
    }

    #[async_trait]
    impl QueryExecutor for FlakyExecutor {
        async fn execute(&self, _dax: &str) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fatal {
                return Err(AppError::AuthError("bad credentials".to_string()));
            }
            if n < self.failures_before_success {
                return Err(AppError::ExecutionError("transient".to_string()));
            }
            Ok(json!({"results": [{"tables": [{"rows": [{"CountReportId": 42}]}]}]}))
        }
    }

    fn pipeline(llm: Arc<ScriptedLlm>, executor: Arc<FlakyExecutor>) -> InsightPipeline {
        let adapter = QueryTemplateAdapter::new(Arc::new(UsageSchema::default()));
        let generation = LLMConfig::default();
        let explanation = generation.with_model("gpt-4.1-mini");
        InsightPipeline::new(adapter, llm, executor, generation, explanation, 3)
    }

    fn valid_generated_dax() -> &'static str {
        "```dax\nEVALUATE\nSUMMARIZECOLUMNS(\n    Reports[ReportName],\n    FILTER(VALUES(Reports[ReportName]), Reports[ReportName] = \"Sales Dashboard\"),\n    \"CountReportId\", COUNT('Report views'[ReportId]),\n    \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId])\n)\n```"
    }

    #[tokio::test]
    async fn happy_path_uses_generated_dax_and_records_transcript() {
        let llm = Arc::new(ScriptedLlm::new(valid_generated_dax()));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
            fatal: false,
        });
        let p = pipeline(llm, executor);
        let mut transcript = SessionTranscript::new();

        let insight = p
            .answer(&mut transcript, "How many views did the Sales Dashboard report get?")
            .await
            .expect("pipeline succeeds");

        assert!(!insight.query.deterministic);
        assert!(!insight.query.dax.contains("```"));
        assert!(insight.answer.contains("42"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[1].dax.as_deref(), Some(insight.query.dax.as_str()));
    }

    #[tokio::test]
    async fn schema_violation_falls_back_to_deterministic_dax() {
        // The model keeps inventing a Users table; guard must reject it
        // both times and the deterministic rendering must run instead.
        let llm = Arc::new(ScriptedLlm::new(
            "EVALUATE SUMMARIZECOLUMNS(Users[Email], \"CountReportId\", COUNT('Report views'[ReportId]), \"DistinctCountUserId\", DISTINCTCOUNT('Report views'[UserId]))",
        ));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
            fatal: false,
        });
        let p = pipeline(llm.clone(), executor);
        let mut transcript = SessionTranscript::new();

        let insight = p
            .answer(&mut transcript, "How many views did the Sales Dashboard report get?")
            .await
            .expect("pipeline succeeds via fallback");

        assert!(insight.query.deterministic);
        assert!(!insight.query.dax.contains("Users[Email]"));
        // Two generation attempts plus one explanation call.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_execution_failures_are_retried() {
        let llm = Arc::new(ScriptedLlm::new(valid_generated_dax()));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
            fatal: false,
        });
        let p = pipeline(llm, executor.clone());
        let mut transcript = SessionTranscript::new();

        let insight = p
            .answer(&mut transcript, "total views for all reports")
            .await
            .expect("third attempt succeeds");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert!(insight.raw_result.get("results").is_some());
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let llm = Arc::new(ScriptedLlm::new(valid_generated_dax()));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
            fatal: true,
        });
        let p = pipeline(llm, executor.clone());
        let mut transcript = SessionTranscript::new();

        match p.answer(&mut transcript, "total views for all reports").await {
            Err(AppError::AuthError(_)) => {}
            other => panic!("expected AuthError, got {:?}", other.map(|_| ())),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        // No orphan question may survive a failed request.
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_user_visible_failure() {
        let llm = Arc::new(ScriptedLlm::new(valid_generated_dax()));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 99,
            calls: AtomicU32::new(0),
            fatal: false,
        });
        let p = pipeline(llm, executor.clone());
        let mut transcript = SessionTranscript::new();

        match p.answer(&mut transcript, "total views for all reports").await {
            Err(AppError::ExecutionError(msg)) => {
                assert!(msg.contains("Could not retrieve results"))
            }
            other => panic!("expected ExecutionError, got {:?}", other.map(|_| ())),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn out_of_domain_question_skips_generation_and_runs_template() {
        let llm = Arc::new(ScriptedLlm::new(valid_generated_dax()));
        let executor = Arc::new(FlakyExecutor {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
            fatal: false,
        });
        let p = pipeline(llm.clone(), executor);
        let mut transcript = SessionTranscript::new();

        let insight = p
            .answer(&mut transcript, "What's the weather today?")
            .await
            .expect("fallback still answers");

        assert!(insight.query.deterministic);
        assert_eq!(insight.query.dax, DEFAULT_REFERENCE_TEMPLATE);
        // Only the explanation call; no generation attempt.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```dax\nEVALUATE X\n```"), "EVALUATE X");
        assert_eq!(strip_code_fences("EVALUATE X"), "EVALUATE X");
    }
}
