//! Gap/Risk stage: strengths, weaknesses and overqualification risk.
//!
//! Skill overlap and a risk floor are computed deterministically before the
//! model is asked anything. Both are handed to the prompt, and the floor is
//! re-applied to whatever the model returns: the model may raise the risk but
//! can never push it below the floor.

use std::collections::HashSet;

use serde::Serialize;

use crate::analysis::models::{
    CandidateProfile, DegreeLevel, GapFindings, RequirementSet, SeniorityLevel, Skill,
    SkillCategory,
};
use crate::analysis::orchestrator::AnalysisError;
use crate::analysis::prompts::{fill_template, GAP_PROMPT_TEMPLATE, GAP_SYSTEM};
use crate::analysis::schema::{FieldKind, FieldSpec, ShapeSpec};
use crate::analysis::stage::{decode, prompt_json, Stage, StageContext, StageRequest};
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;

pub const GAP_CALL: &str = "gap_findings";

const IMPACTS: &[&str] = &["high", "medium", "low"];
const MIN_FINDINGS: usize = 3;
const MAX_FINDINGS: usize = 5;

const PHD_RISK: f64 = 0.3;
const ACADEMIC_MARKER_RISK: f64 = 0.2;
/// Responsibility wording that makes academic credentials an asset, not a risk.
const RESEARCH_TERMS: &[&str] = &[
    "research",
    "publication",
    "publish",
    "academic",
    "scientific",
    "phd",
    "experiment",
];

/// Case-insensitive comparison of requirement skills against the candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkillOverlap {
    pub matched_must_have: Vec<String>,
    pub missing_must_have: Vec<String>,
    pub matched_nice_to_have: Vec<String>,
    pub missing_nice_to_have: Vec<String>,
    pub additional_candidate_skills: Vec<String>,
}

fn skill_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether the candidate satisfies one requirement skill.
///
/// Skills match by case-insensitive name. A credential that names a degree
/// level is also met by any held degree at or above that level.
pub fn candidate_has(profile: &CandidateProfile, requirement: &Skill) -> bool {
    let key = skill_key(&requirement.name);
    if profile.skills.iter().any(|s| skill_key(&s.name) == key) {
        return true;
    }
    if requirement.category != SkillCategory::Credential {
        return false;
    }
    match (DegreeLevel::named_in(&requirement.name), profile.highest_degree()) {
        (Some(required), Some(held)) => held >= required,
        _ => false,
    }
}

impl SkillOverlap {
    pub fn compute(requirements: &RequirementSet, profile: &CandidateProfile) -> Self {
        let mut overlap = SkillOverlap::default();

        for skill in &requirements.must_have {
            if candidate_has(profile, skill) {
                overlap.matched_must_have.push(skill.name.clone());
            } else {
                overlap.missing_must_have.push(skill.name.clone());
            }
        }
        for skill in &requirements.nice_to_have {
            if candidate_has(profile, skill) {
                overlap.matched_nice_to_have.push(skill.name.clone());
            } else {
                overlap.missing_nice_to_have.push(skill.name.clone());
            }
        }

        let required: HashSet<String> = requirements
            .must_have
            .iter()
            .chain(&requirements.nice_to_have)
            .map(|s| skill_key(&s.name))
            .collect();
        overlap.additional_candidate_skills = profile
            .skills
            .iter()
            .filter(|s| !required.contains(&skill_key(&s.name)))
            .map(|s| s.name.clone())
            .collect();

        overlap
    }
}

/// Deterministic lower bound on overqualification risk, with its reasons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskFloor {
    pub value: f64,
    pub factors: Vec<String>,
}

pub fn risk_floor(profile: &CandidateProfile, requirements: &RequirementSet) -> RiskFloor {
    let mut floor = RiskFloor::default();

    let early_career_role = matches!(
        requirements.seniority_level,
        SeniorityLevel::Junior | SeniorityLevel::Mid
    );
    if profile.holds_phd() && early_career_role {
        floor.value += PHD_RISK;
        floor.factors.push(format!(
            "Holds a PhD for a {}-level role",
            requirements.seniority_level.as_str()
        ));
    }

    let summary = requirements.responsibility_summary.to_lowercase();
    let research_role = RESEARCH_TERMS.iter().any(|t| summary.contains(t));
    if !research_role && !profile.academic_markers.is_empty() {
        floor.value += ACADEMIC_MARKER_RISK * profile.academic_markers.len() as f64;
        let markers: Vec<&str> = profile.academic_markers.iter().map(String::as_str).collect();
        floor.factors.push(format!(
            "Academic background ({}) for a role without research duties",
            markers.join(", ")
        ));
    }

    floor.value = floor.value.min(1.0);
    floor
}

/// Raises the model's risk to the floor and makes sure the floor's reasons are listed.
pub fn apply_risk_floor(mut gaps: GapFindings, floor: &RiskFloor) -> GapFindings {
    gaps.overqualification_risk = gaps.overqualification_risk.max(floor.value);

    gaps.risk_factors.retain(|f| !f.trim().is_empty());
    let mut seen: HashSet<String> = gaps.risk_factors.iter().map(|f| f.to_lowercase()).collect();
    for factor in &floor.factors {
        if seen.insert(factor.to_lowercase()) {
            gaps.risk_factors.push(factor.clone());
        }
    }
    gaps
}

fn finding_kind() -> FieldKind {
    FieldKind::object(vec![
        FieldSpec::required("statement", FieldKind::non_empty_text()),
        FieldSpec::required("evidence", FieldKind::non_empty_text()),
        FieldSpec::required("impact", FieldKind::one_of(IMPACTS)),
    ])
}

pub fn gap_findings_shape() -> ShapeSpec {
    ShapeSpec::object(
        "GapFindings",
        vec![
            FieldSpec::required(
                "strengths",
                FieldKind::bounded_list(finding_kind(), MIN_FINDINGS, Some(MAX_FINDINGS)),
            ),
            FieldSpec::required(
                "weaknesses",
                FieldKind::bounded_list(finding_kind(), MIN_FINDINGS, Some(MAX_FINDINGS)),
            ),
            FieldSpec::required("overqualification_risk", FieldKind::number(0.0, 1.0)),
            FieldSpec::required("risk_factors", FieldKind::list(FieldKind::text())),
        ],
    )
}

pub async fn analyze_gaps(
    ctx: &StageContext<'_>,
    requirements: &RequirementSet,
    profile: &CandidateProfile,
) -> Result<GapFindings, AnalysisError> {
    let overlap = SkillOverlap::compute(requirements, profile);
    let floor = risk_floor(profile, requirements);

    let factors = if floor.factors.is_empty() {
        "none".to_string()
    } else {
        floor.factors.join("; ")
    };
    let overlap_json = prompt_json("skill overlap", &overlap)?;
    let requirements_json = prompt_json("requirements", requirements)?;
    let profile_json = prompt_json("profile", profile)?;
    let risk_floor = format!("{:.2}", floor.value);
    let prompt = fill_template(
        GAP_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("overlap_json", overlap_json.as_str()),
            ("requirements_json", requirements_json.as_str()),
            ("profile_json", profile_json.as_str()),
            ("risk_floor", risk_floor.as_str()),
            ("risk_floor_factors", factors.as_str()),
        ],
    );

    let shape = gap_findings_shape();
    let request = StageRequest {
        stage: Stage::GapAnalysis,
        call: GAP_CALL,
        system: GAP_SYSTEM,
        prompt,
        shape: &shape,
    };
    let gaps = ctx
        .run(request, |value| {
            decode::<GapFindings>(value, &shape).map(|gaps| apply_risk_floor(gaps, &floor))
        })
        .await?;
    Ok(gaps)
}
