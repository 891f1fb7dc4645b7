//! Scoring stage. Pure and deterministic: no LLM call, same inputs give the same breakdown.

use std::collections::BTreeMap;

use crate::analysis::gap::candidate_has;
use crate::analysis::models::{
    CandidateProfile, GapFindings, RequirementSet, ScoreBreakdown, Skill, EDUCATION_FIT,
    EXPERIENCE_ALIGNMENT, RISK_PENALTY, SKILL_MATCH,
};

const MUST_HAVE_SHARE: f64 = 0.7;
const NICE_TO_HAVE_SHARE: f64 = 0.3;
/// Skill match when the job names no must-have skills: neither a match nor a miss.
const NEUTRAL_SKILL_MATCH: f64 = 0.5;

const SKILL_WEIGHT: f64 = 0.4;
const EXPERIENCE_WEIGHT: f64 = 0.25;
const EDUCATION_WEIGHT: f64 = 0.15;
const RISK_WEIGHT: f64 = 0.2;

/// Share of a tier's weight the candidate covers. An empty tier is fully met.
fn tier_coverage(tier: &[Skill], profile: &CandidateProfile) -> f64 {
    let total: f64 = tier.iter().map(|s| s.weight).sum();
    if total <= 0.0 {
        return 1.0;
    }
    let matched: f64 = tier
        .iter()
        .filter(|s| candidate_has(profile, s))
        .map(|s| s.weight)
        .sum();
    matched / total
}

pub fn skill_match(profile: &CandidateProfile, requirements: &RequirementSet) -> f64 {
    if requirements.must_have.is_empty() {
        return NEUTRAL_SKILL_MATCH;
    }
    MUST_HAVE_SHARE * tier_coverage(&requirements.must_have, profile)
        + NICE_TO_HAVE_SHARE * tier_coverage(&requirements.nice_to_have, profile)
}

pub fn experience_alignment(profile: &CandidateProfile, requirements: &RequirementSet) -> f64 {
    let expected = requirements.seniority_level.expected_years();
    let deviation = (profile.experience_years - expected).abs() / expected;
    1.0 - deviation.min(1.0)
}

pub fn education_fit(profile: &CandidateProfile, requirements: &RequirementSet) -> f64 {
    let Some(required) = requirements.required_degree() else {
        return 1.0;
    };
    let held = profile.highest_degree().map_or(0, |d| d.rank());
    (f64::from(held) / f64::from(required.rank())).min(1.0)
}

pub fn risk_penalty(gaps: &GapFindings) -> f64 {
    1.0 - gaps.overqualification_risk.clamp(0.0, 1.0)
}

/// Combines the four dimensions into a 0-100 score with a template rationale.
pub fn score(
    profile: &CandidateProfile,
    requirements: &RequirementSet,
    gaps: &GapFindings,
) -> ScoreBreakdown {
    let skill = skill_match(profile, requirements);
    let experience = experience_alignment(profile, requirements);
    let education = education_fit(profile, requirements);
    let risk = risk_penalty(gaps);

    let weighted = SKILL_WEIGHT * skill
        + EXPERIENCE_WEIGHT * experience
        + EDUCATION_WEIGHT * education
        + RISK_WEIGHT * risk;
    let overall = (100.0 * weighted).round().clamp(0.0, 100.0) as u32;

    let component_scores = BTreeMap::from([
        (SKILL_MATCH.to_string(), skill),
        (EXPERIENCE_ALIGNMENT.to_string(), experience),
        (EDUCATION_FIT.to_string(), education),
        (RISK_PENALTY.to_string(), risk),
    ]);

    ScoreBreakdown {
        overall,
        rationale: rationale(overall, &component_scores, profile, requirements, gaps),
        component_scores,
    }
}

fn band(overall: u32) -> (&'static str, &'static str) {
    match overall {
        80.. => ("Excellent", "Strong match with most requirements met."),
        60..=79 => ("Good", "Good match with some areas for improvement."),
        40..=59 => ("Moderate", "Moderate match with several gaps to address."),
        _ => ("Low", "Significant gaps between resume and job requirements."),
    }
}

fn percent(value: f64) -> u32 {
    (value * 100.0).round() as u32
}

fn rationale(
    overall: u32,
    components: &BTreeMap<String, f64>,
    profile: &CandidateProfile,
    requirements: &RequirementSet,
    gaps: &GapFindings,
) -> String {
    let (level, summary) = band(overall);
    let component = |name: &str| components.get(name).copied().unwrap_or(0.0);

    let mut parts = vec![
        format!("{level} compatibility ({overall}%). {summary}"),
        format!(
            "Skills cover {}% of the weighted requirements.",
            percent(component(SKILL_MATCH))
        ),
        format!(
            "{:.1} years of experience against roughly {} expected for a {} role ({}% aligned).",
            profile.experience_years,
            requirements.seniority_level.expected_years(),
            requirements.seniority_level.as_str(),
            percent(component(EXPERIENCE_ALIGNMENT))
        ),
    ];

    match requirements.required_degree() {
        Some(_) => parts.push(format!(
            "Education meets {}% of the stated degree requirement.",
            percent(component(EDUCATION_FIT))
        )),
        None => parts.push("No degree requirement was stated.".to_string()),
    }

    if gaps.overqualification_risk > 0.0 {
        parts.push(format!(
            "Overqualification risk of {}% reduces the score.",
            percent(gaps.overqualification_risk)
        ));
    }

    parts.join(" ")
}
