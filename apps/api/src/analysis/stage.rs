//! Stage runner: the validate, repair, retry-once, fail policy shared by every
//! LLM-backed stage.
//!
//! A stage call gets exactly two attempts. The second attempt carries the
//! rejected output and the validator's complaint so the model can correct itself.
//! A timeout or transport error counts as a failed attempt just like invalid output.

use std::fmt;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::analysis::observer::{AnalysisEvent, AnalysisObserver};
use crate::analysis::orchestrator::AnalysisError;
use crate::analysis::schema::{excerpt, SchemaValidator, ShapeSpec, ValidationError};
use crate::llm_client::prompts::{CORRECTION_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{LlmError, LlmTransport};

/// First attempt plus one correction retry.
pub const MAX_ATTEMPTS: u32 = 2;
/// Previous output echoed back on retry is capped to keep the prompt bounded.
const MAX_ECHOED_OUTPUT_CHARS: usize = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    GapAnalysis,
    Scoring,
    Recommendation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::GapAnalysis => "gap_analysis",
            Stage::Scoring => "scoring",
            Stage::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single attempt was rejected.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transport error: {0}")]
    Transport(#[from] LlmError),
}

/// A stage call that failed both attempts. Fatal to the whole analysis.
#[derive(Debug, Error)]
#[error("{stage} stage failed ({call}) after {attempts} attempts: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    pub call: &'static str,
    pub attempts: u32,
    #[source]
    pub source: AttemptError,
    /// Bounded excerpt of the last model output, if any was received.
    pub raw_excerpt: Option<String>,
}

impl StageFailure {
    /// Message safe to show an end user: names the stage and the problem,
    /// never echoes model output.
    pub fn user_message(&self) -> String {
        let problem = match &self.source {
            AttemptError::Validation(ValidationError::MalformedOutput { detail, .. }) => {
                format!("the model response could not be read ({detail})")
            }
            AttemptError::Validation(ValidationError::ConstraintViolation {
                field, detail, ..
            }) => format!("the model response had an invalid `{field}` ({detail})"),
            AttemptError::Transport(LlmError::Timeout { .. }) => {
                "the language model did not respond in time".to_string()
            }
            AttemptError::Transport(_) => "the language model service was unavailable".to_string(),
        };
        format!(
            "The {} step failed after {} attempts: {problem}.",
            self.stage.as_str().replace('_', " "),
            self.attempts
        )
    }
}

/// One LLM-backed call within a stage.
pub struct StageRequest<'a> {
    pub stage: Stage,
    pub call: &'static str,
    pub system: &'a str,
    pub prompt: String,
    pub shape: &'a ShapeSpec,
}

/// Everything a stage needs to talk to the model. Borrowed per analysis run.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub transport: &'a dyn LlmTransport,
    pub validator: SchemaValidator,
    pub llm_timeout: Duration,
    pub observer: &'a dyn AnalysisObserver,
}

impl StageContext<'_> {
    /// Runs `request` with the retry-once policy. `finish` turns the validated value
    /// into the stage's typed output and may itself reject it.
    pub async fn run<T, F>(&self, request: StageRequest<'_>, finish: F) -> Result<T, StageFailure>
    where
        F: Fn(Value) -> Result<T, ValidationError>,
    {
        let (error, raw) = match self.attempt(&request, &request.prompt, 1, &finish).await {
            Ok(output) => return Ok(output),
            Err(rejected) => rejected,
        };

        let retry_prompt = correction_prompt(&request.prompt, raw.as_deref(), &error);
        match self.attempt(&request, &retry_prompt, 2, &finish).await {
            Ok(output) => Ok(output),
            Err((source, raw)) => Err(StageFailure {
                stage: request.stage,
                call: request.call,
                attempts: MAX_ATTEMPTS,
                source,
                raw_excerpt: raw.as_deref().map(excerpt),
            }),
        }
    }

    async fn attempt<T, F>(
        &self,
        request: &StageRequest<'_>,
        prompt: &str,
        attempt: u32,
        finish: &F,
    ) -> Result<T, (AttemptError, Option<String>)>
    where
        F: Fn(Value) -> Result<T, ValidationError>,
    {
        let system = format!("{} {}", request.system, JSON_ONLY_SYSTEM);
        let started = Instant::now();
        let completion = match tokio::time::timeout(
            self.llm_timeout,
            self.transport.complete(prompt, &system, self.llm_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                after: self.llm_timeout,
            }),
        };

        let outcome = match completion {
            Ok(completion) => {
                self.observer.on_event(&AnalysisEvent::LlmCallCompleted {
                    stage: request.stage,
                    call: request.call,
                    attempt,
                    usage: completion.usage,
                    latency_ms: started.elapsed().as_millis() as u64,
                });
                let decoded = self
                    .validator
                    .validate_and_repair(&completion.text, request.shape)
                    .and_then(finish);
                decoded.map_err(|e| (AttemptError::from(e), Some(completion.text)))
            }
            Err(e) => Err((AttemptError::from(e), None)),
        };

        if let Err((error, _)) = &outcome {
            self.observer.on_event(&AnalysisEvent::AttemptRejected {
                stage: request.stage,
                call: request.call,
                attempt,
                final_attempt: attempt >= MAX_ATTEMPTS,
                reason: error.to_string(),
            });
        }
        outcome
    }
}

/// Serializes an upstream stage result for inclusion in a prompt.
pub fn prompt_json<T: Serialize + ?Sized>(label: &str, value: &T) -> Result<String, AnalysisError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        AnalysisError::Internal(anyhow::anyhow!("Failed to serialize {label} for prompt: {e}"))
    })
}

/// Decodes a validated value into its typed form.
pub fn decode<T: DeserializeOwned>(value: Value, shape: &ShapeSpec) -> Result<T, ValidationError> {
    let rendered = value.to_string();
    serde_json::from_value(value).map_err(|e| ValidationError::MalformedOutput {
        detail: format!("value does not decode as {}: {e}", shape.name),
        raw_excerpt: excerpt(&rendered),
    })
}

fn correction_prompt(base: &str, previous_raw: Option<&str>, error: &AttemptError) -> String {
    // Nothing to correct after a transport failure; resend as is.
    let Some(raw) = previous_raw else {
        return base.to_string();
    };
    let echoed: String = raw.chars().take(MAX_ECHOED_OUTPUT_CHARS).collect();
    let correction = CORRECTION_INSTRUCTION
        .replace("{error}", &error.to_string())
        .replace("{previous_output}", &echoed);
    format!("{base}\n\n{correction}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::schema::{FieldKind, FieldSpec};
    use crate::analysis::testing::{RecordingObserver, ScriptedTransport};

    fn level_shape() -> ShapeSpec {
        ShapeSpec::object(
            "level",
            vec![FieldSpec::required("level", FieldKind::integer(0, 10))],
        )
    }

    fn request(shape: &ShapeSpec) -> StageRequest<'_> {
        StageRequest {
            stage: Stage::GapAnalysis,
            call: "test_call",
            system: "You are a test.",
            prompt: "Return a level.".to_string(),
            shape,
        }
    }

    fn read_level(value: Value) -> Result<i64, ValidationError> {
        Ok(value["level"].as_i64().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_first_valid_output_is_returned() {
        let transport = ScriptedTransport::new(vec![Ok(r#"{"level": 4}"#.to_string())]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };

        let level = ctx.run(request(&shape), read_level).await.unwrap();
        assert_eq!(level, 4);
        assert_eq!(transport.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_previous_output_and_error() {
        let transport = ScriptedTransport::new(vec![
            Ok(r#"{"level": 42}"#.to_string()),
            Ok(r#"{"level": 7}"#.to_string()),
        ]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };

        let level = ctx.run(request(&shape), read_level).await.unwrap();
        assert_eq!(level, 7);

        let prompts = transport.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("Return a level."));
        assert!(prompts[1].contains(r#"{"level": 42}"#));
        assert!(prompts[1].contains("constraint violation on `level`"));
        assert_eq!(observer.rejected_attempts(), 1);
    }

    #[tokio::test]
    async fn test_two_failures_become_stage_failure() {
        let transport = ScriptedTransport::new(vec![
            Ok("not json".to_string()),
            Ok("still not json".to_string()),
        ]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };

        let failure = ctx.run(request(&shape), read_level).await.unwrap_err();
        assert_eq!(failure.stage, Stage::GapAnalysis);
        assert_eq!(failure.call, "test_call");
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.raw_excerpt.as_deref(), Some("still not json"));
        assert!(matches!(
            failure.source,
            AttemptError::Validation(ValidationError::MalformedOutput { .. })
        ));
        assert!(failure.user_message().starts_with("The gap analysis step failed"));
    }

    #[tokio::test]
    async fn test_transport_error_is_retried_with_the_same_prompt() {
        let transport = ScriptedTransport::new(vec![
            Err(LlmError::RateLimited { retries: 3 }),
            Ok(r#"{"level": 1}"#.to_string()),
        ]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };

        let level = ctx.run(request(&shape), read_level).await.unwrap();
        assert_eq!(level, 1);
        let prompts = transport.prompts();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let transport = ScriptedTransport::new(vec![
            Ok(r#"{"level": 2}"#.to_string()),
            Ok(r#"{"level": 3}"#.to_string()),
        ])
        .with_delays(vec![Duration::from_secs(60), Duration::ZERO]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(10),
            observer: &observer,
        };

        let level = ctx.run(request(&shape), read_level).await.unwrap();
        assert_eq!(level, 3);
        assert_eq!(observer.rejected_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_timeouts_fail_with_timeout_message() {
        let transport = ScriptedTransport::new(vec![
            Ok(r#"{"level": 2}"#.to_string()),
            Ok(r#"{"level": 3}"#.to_string()),
        ])
        .with_delays(vec![Duration::from_secs(60), Duration::from_secs(60)]);
        let observer = RecordingObserver::default();
        let shape = level_shape();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(10),
            observer: &observer,
        };

        let failure = ctx.run(request(&shape), read_level).await.unwrap_err();
        assert!(failure.raw_excerpt.is_none());
        assert!(failure.user_message().contains("did not respond in time"));
    }

    #[test]
    fn test_decode_reports_shape_name() {
        let shape = level_shape();
        let err = decode::<Vec<String>>(serde_json::json!({"level": 1}), &shape).unwrap_err();
        assert!(err.to_string().contains("does not decode as level"));
    }
}
