//! Axum route handlers for the Analysis API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::guardrails::validate_inputs;
use crate::analysis::interview_prep::{build_interview_prep, InterviewPrep};
use crate::analysis::models::AnalysisReport;
use crate::analysis::observer::UsageTotals;
use crate::analysis::orchestrator::{AnalysisInput, CancellationFlag};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateAnalysisRequest {
    pub resume_text: String,
    pub job_description_text: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAnalysisResponse {
    pub analysis_id: Uuid,
    pub report: AnalysisReport,
    pub interview_prep: InterviewPrep,
}

/// Cancels the run when the request future is dropped, e.g. on client disconnect.
struct CancelOnDrop(CancellationFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyses
///
/// Runs the full analysis for one resume against one job description and
/// returns the report together with interview preparation material.
pub async fn handle_create_analysis(
    State(state): State<AppState>,
    Json(request): Json<CreateAnalysisRequest>,
) -> Result<Json<CreateAnalysisResponse>, AppError> {
    if request.resume_text.trim().is_empty() || request.job_description_text.trim().is_empty() {
        return Err(AppError::Validation(
            "resume_text and job_description_text cannot be empty".to_string(),
        ));
    }

    let inputs = validate_inputs(&request.resume_text, &request.job_description_text)?;

    let analysis_id = Uuid::new_v4();
    info!("Starting analysis {analysis_id}");

    let cancel = CancellationFlag::new();
    let _guard = CancelOnDrop(cancel.clone());
    let orchestrator = state.orchestrator.clone();
    let input = AnalysisInput {
        resume_text: inputs.resume_text,
        job_description_text: inputs.job_description_text,
    };

    let report = tokio::spawn(async move { orchestrator.analyze(&input, &cancel).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Analysis task failed: {e}")))??;

    let interview_prep = build_interview_prep(&report);
    info!(
        "Analysis {analysis_id} completed with score {}",
        report.score.overall
    );

    Ok(Json(CreateAnalysisResponse {
        analysis_id,
        report,
        interview_prep,
    }))
}

/// GET /api/v1/usage
///
/// Token and call totals accumulated since the process started.
pub async fn handle_get_usage(State(state): State<AppState>) -> Json<UsageTotals> {
    Json(state.usage.snapshot())
}
