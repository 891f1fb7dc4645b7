//! Stage observers: the injected sink for everything the orchestrator wants
//! to report. Logging and usage accounting hang off this seam instead of
//! living as ambient state inside the engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::orchestrator::AnalysisState;
use crate::analysis::stage::Stage;
use crate::llm_client::Usage;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    StateChanged {
        from: AnalysisState,
        to: AnalysisState,
    },
    LlmCallCompleted {
        stage: Stage,
        call: &'static str,
        attempt: u32,
        usage: Usage,
        latency_ms: u64,
    },
    AttemptRejected {
        stage: Stage,
        call: &'static str,
        attempt: u32,
        final_attempt: bool,
        reason: String,
    },
}

/// Receives orchestration events. Must not block: called inline on the analysis task.
pub trait AnalysisObserver: Send + Sync {
    fn on_event(&self, event: &AnalysisEvent);
}

// ────────────────────────────────────────────────────────────────────────────
// TracingObserver
// ────────────────────────────────────────────────────────────────────────────

/// Writes every event to the `tracing` subscriber.
pub struct TracingObserver;

impl AnalysisObserver for TracingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        match event {
            AnalysisEvent::StateChanged { from, to } => {
                info!("Analysis state {} -> {}", from, to);
            }
            AnalysisEvent::LlmCallCompleted {
                stage,
                call,
                attempt,
                usage,
                latency_ms,
            } => {
                info!(
                    "LLM call {stage}/{call} attempt {attempt} returned in {latency_ms}ms \
                     (input_tokens={}, output_tokens={})",
                    usage.input_tokens, usage.output_tokens
                );
            }
            AnalysisEvent::AttemptRejected {
                stage,
                call,
                attempt,
                final_attempt,
                reason,
            } => {
                if *final_attempt {
                    warn!("{stage}/{call} attempt {attempt} rejected, giving up: {reason}");
                } else {
                    warn!("{stage}/{call} attempt {attempt} rejected, retrying: {reason}");
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// UsageTracker
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageUsage {
    pub calls: u64,
    pub failed_attempts: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl StageUsage {
    fn add_call(&mut self, usage: Usage) {
        self.calls += 1;
        self.input_tokens += u64::from(usage.input_tokens);
        self.output_tokens += u64::from(usage.output_tokens);
    }
}

/// Cumulative API usage since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub analyses_completed: u64,
    pub analyses_failed: u64,
    pub total: StageUsage,
    pub per_stage: BTreeMap<String, StageUsage>,
}

/// Accumulates LLM usage across every analysis. The only state shared between requests.
#[derive(Default)]
pub struct UsageTracker {
    totals: Mutex<UsageTotals>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UsageTotals {
        self.totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AnalysisObserver for UsageTracker {
    fn on_event(&self, event: &AnalysisEvent) {
        let mut totals = self
            .totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match event {
            AnalysisEvent::StateChanged { to, .. } => match to {
                AnalysisState::Completed => totals.analyses_completed += 1,
                AnalysisState::Failed { .. } => totals.analyses_failed += 1,
                _ => {}
            },
            AnalysisEvent::LlmCallCompleted { stage, usage, .. } => {
                totals.total.add_call(*usage);
                totals
                    .per_stage
                    .entry(stage.as_str().to_string())
                    .or_default()
                    .add_call(*usage);
            }
            AnalysisEvent::AttemptRejected { stage, .. } => {
                totals.total.failed_attempts += 1;
                totals
                    .per_stage
                    .entry(stage.as_str().to_string())
                    .or_default()
                    .failed_attempts += 1;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ObserverSet
// ────────────────────────────────────────────────────────────────────────────

/// Fans one event out to several observers, in registration order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn AnalysisObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn AnalysisObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl AnalysisObserver for ObserverSet {
    fn on_event(&self, event: &AnalysisEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
