//! Orchestrator: sequences the stages, tracks the analysis state machine and
//! assembles the final report.
//!
//! Pending → Extracting → Analyzing → Scoring → Recommending → Completed,
//! with Failed reachable from any non-terminal state. Only the two extraction
//! calls run concurrently. A failed stage aborts everything after it and no
//! partial report is returned.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::analysis::extraction::{extract_profile, extract_requirements};
use crate::analysis::gap::analyze_gaps;
use crate::analysis::models::AnalysisReport;
use crate::analysis::observer::{AnalysisEvent, AnalysisObserver};
use crate::analysis::recommendations::generate_recommendations;
use crate::analysis::schema::{SchemaValidator, DEFAULT_MAX_EDIT_DISTANCE};
use crate::analysis::scoring;
use crate::analysis::stage::{Stage, StageContext, StageFailure};
use crate::llm_client::LlmTransport;

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState {
    Pending,
    Extracting,
    Analyzing,
    Scoring,
    Recommending,
    Completed,
    Failed { stage: Stage, reason: String },
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Completed | AnalysisState::Failed { .. })
    }

    /// The stage that runs while in this state; `Pending` reports the first stage.
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisState::Pending | AnalysisState::Extracting => Stage::Extraction,
            AnalysisState::Analyzing => Stage::GapAnalysis,
            AnalysisState::Scoring => Stage::Scoring,
            AnalysisState::Recommending | AnalysisState::Completed => Stage::Recommendation,
            AnalysisState::Failed { stage, .. } => *stage,
        }
    }

    pub fn can_transition_to(&self, next: &AnalysisState) -> bool {
        use AnalysisState::*;
        match (self, next) {
            (from, Failed { .. }) => !from.is_terminal(),
            (Pending, Extracting)
            | (Extracting, Analyzing)
            | (Analyzing, Scoring)
            | (Scoring, Recommending)
            | (Recommending, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisState::Pending => f.write_str("pending"),
            AnalysisState::Extracting => f.write_str("extracting"),
            AnalysisState::Analyzing => f.write_str("analyzing"),
            AnalysisState::Scoring => f.write_str("scoring"),
            AnalysisState::Recommending => f.write_str("recommending"),
            AnalysisState::Completed => f.write_str("completed"),
            AnalysisState::Failed { stage, reason } => write!(f, "failed({stage}: {reason})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Stage(#[from] StageFailure),

    #[error("analysis cancelled before the {stage} stage")]
    Cancelled { stage: Stage },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AnalysisError {
    fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Stage(failure) => Some(failure.stage),
            AnalysisError::Cancelled { stage } => Some(*stage),
            AnalysisError::InvalidInput(_) | AnalysisError::Internal(_) => None,
        }
    }

    fn reason(&self) -> String {
        match self {
            AnalysisError::Cancelled { .. } => "cancelled".to_string(),
            other => other.to_string(),
        }
    }
}

/// Cooperative cancellation. Checked before each stage starts; in-flight LLM
/// calls are left to complete or time out.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisInput {
    pub resume_text: String,
    pub job_description_text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    pub llm_timeout: Duration,
    pub max_field_edit_distance: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            max_field_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
        }
    }
}

/// Current state of one analysis run. Every transition is reported to the observer.
struct RunState<'a> {
    state: AnalysisState,
    observer: &'a dyn AnalysisObserver,
}

impl<'a> RunState<'a> {
    fn new(observer: &'a dyn AnalysisObserver) -> Self {
        Self {
            state: AnalysisState::Pending,
            observer,
        }
    }

    fn advance(&mut self, next: AnalysisState) -> Result<(), AnalysisError> {
        if !self.state.can_transition_to(&next) {
            return Err(AnalysisError::Internal(anyhow::anyhow!(
                "illegal analysis state transition {} -> {}",
                self.state,
                next
            )));
        }
        let from = std::mem::replace(&mut self.state, next.clone());
        self.observer
            .on_event(&AnalysisEvent::StateChanged { from, to: next });
        Ok(())
    }

    fn fail(&mut self, error: &AnalysisError) {
        let stage = error.stage().unwrap_or_else(|| self.state.stage());
        let failed = AnalysisState::Failed {
            stage,
            reason: error.reason(),
        };
        // A run already in a terminal state has nothing left to fail.
        let _ = self.advance(failed);
    }
}

/// Runs one resume/job analysis end to end. Holds no per-request state, so one
/// instance serves every request.
pub struct Orchestrator {
    transport: Arc<dyn LlmTransport>,
    settings: AnalysisSettings,
    observer: Arc<dyn AnalysisObserver>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn LlmTransport>,
        settings: AnalysisSettings,
        observer: Arc<dyn AnalysisObserver>,
    ) -> Self {
        Self {
            transport,
            settings,
            observer,
        }
    }

    pub async fn analyze(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mut run = RunState::new(self.observer.as_ref());
        let ctx = StageContext {
            transport: self.transport.as_ref(),
            validator: SchemaValidator::new(self.settings.max_field_edit_distance),
            llm_timeout: self.settings.llm_timeout,
            observer: self.observer.as_ref(),
        };

        let result = self.run_stages(&mut run, &ctx, input, cancel).await;
        if let Err(error) = &result {
            run.fail(error);
        }
        result
    }

    async fn run_stages(
        &self,
        run: &mut RunState<'_>,
        ctx: &StageContext<'_>,
        input: &AnalysisInput,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisReport, AnalysisError> {
        let resume = input.resume_text.trim();
        let job_description = input.job_description_text.trim();
        if resume.is_empty() {
            return Err(AnalysisError::InvalidInput("resume text is empty".to_string()));
        }
        if job_description.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "job description text is empty".to_string(),
            ));
        }

        checkpoint(cancel, Stage::Extraction)?;
        run.advance(AnalysisState::Extracting)?;
        let (requirements, profile) = tokio::join!(
            extract_requirements(ctx, job_description),
            extract_profile(ctx, resume)
        );
        let requirements = requirements?;
        let profile = profile?;

        checkpoint(cancel, Stage::GapAnalysis)?;
        run.advance(AnalysisState::Analyzing)?;
        let gaps = analyze_gaps(ctx, &requirements, &profile).await?;

        checkpoint(cancel, Stage::Scoring)?;
        run.advance(AnalysisState::Scoring)?;
        let score = scoring::score(&profile, &requirements, &gaps);

        checkpoint(cancel, Stage::Recommendation)?;
        run.advance(AnalysisState::Recommending)?;
        let recommendations = generate_recommendations(ctx, &score, &gaps, &requirements).await?;

        run.advance(AnalysisState::Completed)?;
        Ok(AnalysisReport {
            requirements,
            profile,
            gaps,
            score,
            recommendations,
            generated_at: Utc::now(),
        })
    }
}

fn checkpoint(cancel: &CancellationFlag, next: Stage) -> Result<(), AnalysisError> {
    if cancel.is_cancelled() {
        Err(AnalysisError::Cancelled { stage: next })
    } else {
        Ok(())
    }
}
