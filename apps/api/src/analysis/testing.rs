//! Test doubles and fixtures shared by the analysis tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::analysis::extraction::candidate_profile_shape;
use crate::analysis::models::{
    AnalysisReport, CandidateProfile, GapFindings, Recommendation, RequirementSet,
};
use crate::analysis::observer::{AnalysisEvent, AnalysisObserver};
use crate::analysis::orchestrator::{AnalysisInput, AnalysisState};
use crate::analysis::recommendations::order_by_priority;
use crate::analysis::schema::validate_and_repair;
use crate::analysis::scoring::score;
use crate::llm_client::{LlmCompletion, LlmError, LlmTransport, Usage};

// ────────────────────────────────────────────────────────────────────────────
// ScriptedTransport
// ────────────────────────────────────────────────────────────────────────────

/// Prompt markers that identify which stage a prompt belongs to.
pub const REQUIREMENTS_MARKER: &str = "JOB DESCRIPTION:";
pub const PROFILE_MARKER: &str = "RESUME:";
pub const GAP_MARKER: &str = "PRE-COMPUTED SKILL OVERLAP";
pub const RECOMMENDATIONS_MARKER: &str = "SCORE BREAKDOWN";

struct Reply {
    result: Result<String, LlmError>,
    delay: Duration,
}

struct Route {
    /// `None` matches every prompt.
    marker: Option<&'static str>,
    replies: Mutex<VecDeque<Reply>>,
}

/// `LlmTransport` that replays canned replies, optionally routed by a marker
/// substring in the prompt, and records every prompt it receives.
pub struct ScriptedTransport {
    routes: Vec<Route>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Replies in order regardless of the prompt.
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self::routed().add_route(None, replies)
    }

    pub fn routed() -> Self {
        Self {
            routes: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts containing `marker` get these replies. Routes are matched in the order added.
    pub fn route(self, marker: &'static str, replies: Vec<Result<String, LlmError>>) -> Self {
        self.add_route(Some(marker), replies)
    }

    /// Delays the replies of the most recently added route, in order.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        if let Some(route) = self.routes.last_mut() {
            let replies = route.replies.get_mut().unwrap();
            for (reply, delay) in replies.iter_mut().zip(delays) {
                reply.delay = delay;
            }
        }
        self
    }

    fn add_route(
        mut self,
        marker: Option<&'static str>,
        replies: Vec<Result<String, LlmError>>,
    ) -> Self {
        let replies = replies
            .into_iter()
            .map(|result| Reply {
                result,
                delay: Duration::ZERO,
            })
            .collect();
        self.routes.push(Route {
            marker,
            replies: Mutex::new(replies),
        });
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, marker: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }
}

#[async_trait]
impl LlmTransport for ScriptedTransport {
    async fn complete(
        &self,
        prompt: &str,
        _system: &str,
        _timeout: Duration,
    ) -> Result<LlmCompletion, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = self
            .routes
            .iter()
            .find(|r| r.marker.map_or(true, |m| prompt.contains(m)))
            .and_then(|r| r.replies.lock().unwrap().pop_front());

        let Some(reply) = reply else {
            return Err(LlmError::Api {
                status: 500,
                message: "scripted transport has no reply for this prompt".to_string(),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result.map(|text| LlmCompletion {
            text,
            usage: Usage {
                input_tokens: (prompt.len() / 4) as u32,
                output_tokens: 50,
            },
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RecordingObserver
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Target states of every recorded transition, in order.
    pub fn states(&self) -> Vec<AnalysisState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AnalysisEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn rejected_attempts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, AnalysisEvent::AttemptRejected { .. }))
            .count()
    }
}

impl AnalysisObserver for RecordingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub const SAMPLE_RESUME: &str = "\
A. Lindqvist
Data Scientist | Stockholm

EDUCATION
PhD in Computational Biology, Uppsala University, 2021
BSc in Biology, Lund University, 2015

EXPERIENCE
Data Scientist, Nordic Health Analytics (2021 - present)
- Built Python and SQL pipelines that cut weekly reporting time by 40%
- Trained machine learning models in PyTorch for patient risk scoring
- Presented model results to clinical and product stakeholders

Postdoctoral researcher, Uppsala University (2021)
- Authored three peer-reviewed publications on protein folding

SKILLS
Python, SQL, PyTorch, machine learning, communication
";

pub const SAMPLE_JOB_DESCRIPTION: &str = "\
Data Engineer, Machine Learning Platform

We are looking for a data engineer with 3+ years of experience building \
production data pipelines.

Requirements:
- Strong Python and SQL
- Practical machine learning experience
- Master's degree in a quantitative field

Nice to have:
- Kubernetes
- Clear communication with product stakeholders

You will build and maintain data pipelines and production ML services for the \
product analytics team.
";

pub const REQUIREMENTS_OUTPUT: &str = r#"{
  "must_have": [
    {"name": "Python", "category": "technical", "weight": 0.5},
    {"name": "SQL", "category": "technical", "weight": 0.3},
    {"name": "Machine Learning", "category": "technical", "weight": 0.2},
    {"name": "Master's degree in a quantitative field", "category": "credential", "weight": 1.0}
  ],
  "nice_to_have": [
    {"name": "Kubernetes", "category": "technical", "weight": 1.0},
    {"name": "Communication", "category": "soft", "weight": 1.0}
  ],
  "seniority_level": "mid",
  "responsibility_summary": "Build and maintain data pipelines and production ML services for the product analytics team."
}"#;

/// Fenced the way models often answer, to exercise repair on the happy path.
pub const PROFILE_OUTPUT: &str = r#"```json
{
  "skills": [
    {"name": "Python", "category": "technical", "weight": 0.9},
    {"name": "SQL", "category": "technical", "weight": 0.6},
    {"name": "machine learning", "category": "technical", "weight": 0.8},
    {"name": "PyTorch", "category": "technical", "weight": 0.7},
    {"name": "Communication", "category": "soft", "weight": 0.5}
  ],
  "education": [
    {"level": "phd", "field": "Computational Biology", "graduation_year": 2021},
    {"level": "bachelor", "field": "Biology", "graduation_year": 2015}
  ],
  "experience_years": 3.5,
  "academic_markers": ["Peer-reviewed publications", "postdoctoral research"],
  "achievements": [
    {
      "description": "Built Python and SQL pipelines that cut weekly reporting time by 40%",
      "quantified": true,
      "business_impact_hint": "faster reporting for the analytics team"
    },
    {
      "description": "Trained machine learning models for patient risk scoring",
      "quantified": false
    }
  ]
}
```"#;

pub const GAP_OUTPUT: &str = r#"{
  "strengths": [
    {"statement": "Strong Python and SQL pipeline work", "evidence": "Built Python and SQL pipelines that cut reporting time by 40%", "impact": "high"},
    {"statement": "Hands-on machine learning", "evidence": "Trained PyTorch models for patient risk scoring", "impact": "high"},
    {"statement": "Stakeholder communication", "evidence": "Presented model results to clinical and product stakeholders", "impact": "medium"}
  ],
  "weaknesses": [
    {"statement": "No Kubernetes experience", "evidence": "Kubernetes is listed as nice to have and is absent from the resume", "impact": "medium"},
    {"statement": "Limited production data engineering tenure", "evidence": "3.5 years of experience, mostly in analytics", "impact": "high"},
    {"statement": "Research-heavy framing", "evidence": "Publications and postdoc listed prominently", "impact": "low"}
  ],
  "overqualification_risk": 0.2,
  "risk_factors": ["Doctoral background for a mid-level engineering role"]
}"#;

/// Deliberately out of priority order: low, high, medium.
pub const RECOMMENDATIONS_OUTPUT: &str = r#"{
  "recommendations": [
    {"action": "Move the publications list below experience and shorten it to one line", "category": "omission", "priority": "low", "rationale": "Research framing raises overqualification concerns"},
    {"action": "Add a bullet on the pipeline orchestration you ran, naming Kubernetes if used", "category": "keyword", "priority": "high", "rationale": "Kubernetes is a preferred skill and currently missing"},
    {"action": "Rewrite the risk scoring bullet around the business decision it supported", "category": "reframing", "priority": "medium", "rationale": "Business framing reads as industry experience"}
  ]
}"#;

pub fn sample_input() -> AnalysisInput {
    AnalysisInput {
        resume_text: SAMPLE_RESUME.to_string(),
        job_description_text: SAMPLE_JOB_DESCRIPTION.to_string(),
    }
}

pub fn sample_requirements() -> RequirementSet {
    serde_json::from_str(REQUIREMENTS_OUTPUT).unwrap()
}

pub fn sample_profile() -> CandidateProfile {
    let value = validate_and_repair(PROFILE_OUTPUT, &candidate_profile_shape()).unwrap();
    let mut profile: CandidateProfile = serde_json::from_value(value).unwrap();
    profile.academic_markers = profile
        .academic_markers
        .iter()
        .map(|m| m.to_lowercase())
        .collect();
    profile
}

/// Gap findings as they leave the stage: model output raised to the 0.7 floor.
pub fn sample_gaps() -> GapFindings {
    let mut gaps: GapFindings = serde_json::from_str(GAP_OUTPUT).unwrap();
    gaps.overqualification_risk = 0.7;
    gaps
}

pub fn sample_recommendations() -> Vec<Recommendation> {
    #[derive(serde::Deserialize)]
    struct List {
        recommendations: Vec<Recommendation>,
    }
    let list: List = serde_json::from_str(RECOMMENDATIONS_OUTPUT).unwrap();
    order_by_priority(list.recommendations)
}

pub fn sample_report() -> AnalysisReport {
    let requirements = sample_requirements();
    let profile = sample_profile();
    let gaps = sample_gaps();
    let score = score(&profile, &requirements, &gaps);
    AnalysisReport {
        requirements,
        profile,
        gaps,
        score,
        recommendations: sample_recommendations(),
        generated_at: Utc::now(),
    }
}
