//! Extraction stage: job description → `RequirementSet`, resume → `CandidateProfile`.
//!
//! The two calls are independent; the orchestrator runs them concurrently.
//! Deterministic hints (stated years of experience, academic vocabulary) are
//! computed here and injected into the prompts so the model's extraction is
//! anchored to what the text literally says.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::models::{
    CandidateProfile, RequirementSet, SeniorityLevel, Skill, SkillCategory,
};
use crate::analysis::prompts::{
    PROFILE_PROMPT_TEMPLATE, PROFILE_SYSTEM, REQUIREMENTS_PROMPT_TEMPLATE, REQUIREMENTS_SYSTEM,
};
use crate::analysis::schema::{FieldKind, FieldSpec, ShapeSpec};
use crate::analysis::stage::{decode, Stage, StageContext, StageFailure, StageRequest};
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;

pub const REQUIREMENTS_CALL: &str = "job_requirements";
pub const PROFILE_CALL: &str = "resume_profile";

const SKILL_CATEGORIES: &[&str] = &["technical", "soft", "domain", "credential"];
const SENIORITY_LEVELS: &[&str] = &["junior", "mid", "senior", "lead"];
const DEGREE_LEVELS: &[&str] = &["bachelor", "master", "phd"];

static YEARS_OF_EXPERIENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(?:\+|plus)?\s*(?:(?:-|to)\s*\d{1,2}\s*)?years?\s+(?:of\s+)?(?:[a-z/+#.-]+\s+){0,3}?experience",
    )
    .expect("years-of-experience pattern is valid")
});

static MINIMUM_YEARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:minimum|at least)\s+(?:of\s+)?(\d{1,2})\s*\+?\s*years?")
        .expect("minimum-years pattern is valid")
});

/// Keyword fallbacks when no year count is stated, most senior first.
static SENIORITY_KEYWORDS: LazyLock<Vec<(SeniorityLevel, Regex)>> = LazyLock::new(|| {
    [
        (
            SeniorityLevel::Lead,
            r"(?i)\b(?:principal|staff engineer|head of|tech(?:nical)? lead|team lead|lead (?:engineer|developer|scientist|analyst))\b",
        ),
        (SeniorityLevel::Senior, r"(?i)\b(?:senior\b|sr\.)"),
        (
            SeniorityLevel::Junior,
            r"(?i)\b(?:junior|jr\.|entry[- ]level|new grad(?:uate)?|graduate program|internship|intern)\b",
        ),
        (SeniorityLevel::Mid, r"(?i)\b(?:mid[- ]level|intermediate)\b"),
    ]
    .into_iter()
    .map(|(level, pattern)| {
        (
            level,
            Regex::new(pattern).expect("seniority keyword pattern is valid"),
        )
    })
    .collect()
});

static ACADEMIC_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ph\.?\s?d|doctorate|doctoral|dissertation|thesis|postdoc(?:toral)?|publications?|peer[- ]reviewed|professor|lecturer|teaching assistant|conference paper)\b",
    )
    .expect("academic vocabulary pattern is valid")
});

/// Seniority implied by an experience requirement stated in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct SeniorityHint {
    pub level: SeniorityLevel,
    pub years: Option<u32>,
}

pub fn level_for_years(years: u32) -> SeniorityLevel {
    match years {
        0..=1 => SeniorityLevel::Junior,
        2..=5 => SeniorityLevel::Mid,
        6..=9 => SeniorityLevel::Senior,
        _ => SeniorityLevel::Lead,
    }
}

/// Infers the seniority a job description asks for. The highest stated year
/// count wins; keywords are only consulted when no count is stated.
pub fn infer_seniority(job_description: &str) -> Option<SeniorityHint> {
    let stated_years = YEARS_OF_EXPERIENCE
        .captures_iter(job_description)
        .chain(MINIMUM_YEARS.captures_iter(job_description))
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .max();

    if let Some(years) = stated_years {
        return Some(SeniorityHint {
            level: level_for_years(years),
            years: Some(years),
        });
    }

    SENIORITY_KEYWORDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(job_description))
        .map(|(level, _)| SeniorityHint {
            level: *level,
            years: None,
        })
}

/// Distinct academic terms found in a resume, lowercased, in order of first appearance.
pub fn detect_academic_vocabulary(resume: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ACADEMIC_VOCABULARY
        .find_iter(resume)
        .map(|m| m.as_str().to_lowercase())
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

fn seniority_hint_text(hint: Option<&SeniorityHint>) -> String {
    match hint {
        Some(SeniorityHint {
            level,
            years: Some(years),
        }) => format!(
            "Experience requirement stated in the text: {years} years. \
             This implies seniority_level \"{}\".",
            level.as_str()
        ),
        Some(SeniorityHint { level, years: None }) => format!(
            "No year count stated; the title wording suggests seniority_level \"{}\".",
            level.as_str()
        ),
        None => "No explicit experience requirement detected.".to_string(),
    }
}

fn academic_hint_text(terms: &[String]) -> String {
    if terms.is_empty() {
        "No academic vocabulary detected.".to_string()
    } else {
        format!(
            "Academic vocabulary present in the resume: {}. \
             Reflect it in academic_markers.",
            terms.join(", ")
        )
    }
}

fn skill_kind() -> FieldKind {
    FieldKind::object(vec![
        FieldSpec::required("name", FieldKind::non_empty_text()),
        FieldSpec::required("category", FieldKind::one_of(SKILL_CATEGORIES)),
        FieldSpec::required("weight", FieldKind::number(0.0, 1.0)),
    ])
}

pub fn requirement_set_shape() -> ShapeSpec {
    ShapeSpec::object(
        "RequirementSet",
        vec![
            FieldSpec::required("must_have", FieldKind::list(skill_kind())),
            FieldSpec::required("nice_to_have", FieldKind::list(skill_kind())),
            FieldSpec::required("seniority_level", FieldKind::one_of(SENIORITY_LEVELS)),
            FieldSpec::required("responsibility_summary", FieldKind::non_empty_text()),
        ],
    )
}

pub fn candidate_profile_shape() -> ShapeSpec {
    ShapeSpec::object(
        "CandidateProfile",
        vec![
            FieldSpec::required("skills", FieldKind::list(skill_kind())),
            FieldSpec::required(
                "education",
                FieldKind::list(FieldKind::object(vec![
                    FieldSpec::required("level", FieldKind::one_of(DEGREE_LEVELS)),
                    FieldSpec::required("field", FieldKind::text()),
                    FieldSpec::required("graduation_year", FieldKind::integer(1900, 2100)),
                ])),
            ),
            FieldSpec::required("experience_years", FieldKind::number(0.0, 80.0)),
            FieldSpec::required("academic_markers", FieldKind::list(FieldKind::text())),
            FieldSpec::required(
                "achievements",
                FieldKind::list(FieldKind::object(vec![
                    FieldSpec::required("description", FieldKind::non_empty_text()),
                    FieldSpec::required("quantified", FieldKind::Bool),
                    FieldSpec::optional("business_impact_hint", FieldKind::text()),
                ])),
            ),
        ],
    )
}

/// Rescales weights so each category present in `skills` sums to 1.0.
/// A category whose weights sum to zero gets equal weights.
pub fn normalize_weights(skills: &mut [Skill]) {
    let mut totals: HashMap<SkillCategory, (f64, usize)> = HashMap::new();
    for skill in skills.iter() {
        let entry = totals.entry(skill.category).or_insert((0.0, 0));
        entry.0 += skill.weight;
        entry.1 += 1;
    }
    for skill in skills.iter_mut() {
        let (sum, count) = totals[&skill.category];
        skill.weight = if sum > 0.0 {
            skill.weight / sum
        } else {
            1.0 / count as f64
        };
    }
}

/// Keeps the first occurrence of each skill name, compared case-insensitively.
fn dedupe_skills(skills: Vec<Skill>) -> Vec<Skill> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter(|s| seen.insert(s.name.trim().to_lowercase()))
        .collect()
}

fn normalize_requirements(mut requirements: RequirementSet) -> RequirementSet {
    requirements.must_have = dedupe_skills(requirements.must_have);
    requirements.nice_to_have = dedupe_skills(requirements.nice_to_have);
    normalize_weights(&mut requirements.must_have);
    normalize_weights(&mut requirements.nice_to_have);
    requirements
}

fn normalize_profile(mut profile: CandidateProfile) -> CandidateProfile {
    profile.skills = dedupe_skills(profile.skills);
    normalize_weights(&mut profile.skills);
    profile.academic_markers = profile
        .academic_markers
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect::<BTreeSet<_>>();
    profile
}

pub async fn extract_requirements(
    ctx: &StageContext<'_>,
    job_description: &str,
) -> Result<RequirementSet, StageFailure> {
    let hint = infer_seniority(job_description);
    let prompt = REQUIREMENTS_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{seniority_hint}", &seniority_hint_text(hint.as_ref()))
        .replace("{job_description}", job_description);

    let shape = requirement_set_shape();
    let request = StageRequest {
        stage: Stage::Extraction,
        call: REQUIREMENTS_CALL,
        system: REQUIREMENTS_SYSTEM,
        prompt,
        shape: &shape,
    };
    ctx.run(request, |value| {
        decode::<RequirementSet>(value, &shape).map(normalize_requirements)
    })
    .await
}

pub async fn extract_profile(
    ctx: &StageContext<'_>,
    resume: &str,
) -> Result<CandidateProfile, StageFailure> {
    let academic_terms = detect_academic_vocabulary(resume);
    let prompt = PROFILE_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{academic_hint}", &academic_hint_text(&academic_terms))
        .replace("{resume}", resume);

    let shape = candidate_profile_shape();
    let request = StageRequest {
        stage: Stage::Extraction,
        call: PROFILE_CALL,
        system: PROFILE_SYSTEM,
        prompt,
        shape: &shape,
    };
    ctx.run(request, |value| {
        decode::<CandidateProfile>(value, &shape).map(normalize_profile)
    })
    .await
}
