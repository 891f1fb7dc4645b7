use std::sync::Arc;

use crate::analysis::observer::UsageTracker;
use crate::analysis::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Also registered as an observer on the orchestrator; read by GET /api/v1/usage.
    pub usage: Arc<UsageTracker>,
}
