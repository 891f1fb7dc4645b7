// Analysis Orchestration Engine
// Implements: guardrails, requirement/profile extraction, gap analysis, scoring,
// recommendations, interview prep, and the stage state machine that drives them.
// All LLM calls go through llm_client via the stage runner in stage.rs.

pub mod extraction;
pub mod gap;
pub mod guardrails;
pub mod handlers;
pub mod interview_prep;
pub mod models;
pub mod observer;
pub mod orchestrator;
pub mod prompts;
pub mod recommendations;
pub mod schema;
pub mod scoring;
pub mod stage;

#[cfg(test)]
pub mod testing;
