//! Data model shared by every analysis stage.
//!
//! Every type here is produced fresh per request and never mutated after the
//! stage that built it returns.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Technical,
    Soft,
    Domain,
    Credential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    Lead,
}

impl SeniorityLevel {
    /// Years of experience a typical hire at this level brings.
    pub fn expected_years(self) -> f64 {
        match self {
            SeniorityLevel::Junior => 1.0,
            SeniorityLevel::Mid => 4.0,
            SeniorityLevel::Senior => 8.0,
            SeniorityLevel::Lead => 12.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeniorityLevel::Junior => "junior",
            SeniorityLevel::Mid => "mid",
            SeniorityLevel::Senior => "senior",
            SeniorityLevel::Lead => "lead",
        }
    }
}

/// Ordered so that `Phd > Master > Bachelor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeLevel {
    Bachelor,
    Master,
    Phd,
}

impl DegreeLevel {
    pub fn rank(self) -> u8 {
        match self {
            DegreeLevel::Bachelor => 1,
            DegreeLevel::Master => 2,
            DegreeLevel::Phd => 3,
        }
    }

    /// Degree level named in free text such as "Master's degree in Statistics".
    /// Highest level wins when several are named.
    pub fn named_in(text: &str) -> Option<DegreeLevel> {
        let lower = text.to_lowercase();
        let names_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if names_any(&["phd", "ph.d", "doctorate", "doctoral"]) {
            Some(DegreeLevel::Phd)
        } else if names_any(&["master", "msc", "m.sc", "mba"]) {
            Some(DegreeLevel::Master)
        } else if names_any(&["bachelor", "bsc", "b.sc", "undergraduate degree"]) {
            Some(DegreeLevel::Bachelor)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Keyword,
    Reframing,
    Omission,
    Quantification,
}

/// Declaration order is the presentation order: high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: SkillCategory,
    /// Relative importance within its set, normalized per category.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub must_have: Vec<Skill>,
    pub nice_to_have: Vec<Skill>,
    pub seniority_level: SeniorityLevel,
    pub responsibility_summary: String,
}

impl RequirementSet {
    /// Highest degree level named by a must-have credential, if any.
    pub fn required_degree(&self) -> Option<DegreeLevel> {
        self.must_have
            .iter()
            .filter(|s| s.category == SkillCategory::Credential)
            .filter_map(|s| DegreeLevel::named_in(&s.name))
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degree {
    pub level: DegreeLevel,
    pub field: String,
    pub graduation_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub description: String,
    pub quantified: bool,
    #[serde(default)]
    pub business_impact_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    /// Unique by case-insensitive name.
    pub skills: Vec<Skill>,
    pub education: Vec<Degree>,
    pub experience_years: f64,
    pub academic_markers: BTreeSet<String>,
    pub achievements: Vec<Achievement>,
}

impl CandidateProfile {
    pub fn highest_degree(&self) -> Option<DegreeLevel> {
        self.education.iter().map(|d| d.level).max()
    }

    pub fn holds_phd(&self) -> bool {
        self.education.iter().any(|d| d.level == DegreeLevel::Phd)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub statement: String,
    pub evidence: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFindings {
    pub strengths: Vec<Finding>,
    pub weaknesses: Vec<Finding>,
    pub overqualification_risk: f64,
    pub risk_factors: Vec<String>,
}

/// Names of the fixed scoring dimensions.
pub const SKILL_MATCH: &str = "skill_match";
pub const EXPERIENCE_ALIGNMENT: &str = "experience_alignment";
pub const EDUCATION_FIT: &str = "education_fit";
pub const RISK_PENALTY: &str = "risk_penalty";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub overall: u32,
    pub component_scores: BTreeMap<String, f64>,
    pub rationale: String,
}

impl ScoreBreakdown {
    #[cfg(test)]
    pub fn component(&self, dimension: &str) -> f64 {
        self.component_scores.get(dimension).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub rationale: String,
}

/// Root result of one analysis. Built once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub requirements: RequirementSet,
    pub profile: CandidateProfile,
    pub gaps: GapFindings,
    pub score: ScoreBreakdown,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enums_use_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&SkillCategory::Credential).unwrap(),
            r#""credential""#
        );
        assert_eq!(serde_json::to_string(&DegreeLevel::Phd).unwrap(), r#""phd""#);
        let level: SeniorityLevel = serde_json::from_str(r#""lead""#).unwrap();
        assert_eq!(level, SeniorityLevel::Lead);
    }

    #[test]
    fn test_expected_years_per_seniority() {
        assert_eq!(SeniorityLevel::Junior.expected_years(), 1.0);
        assert_eq!(SeniorityLevel::Mid.expected_years(), 4.0);
        assert_eq!(SeniorityLevel::Senior.expected_years(), 8.0);
        assert_eq!(SeniorityLevel::Lead.expected_years(), 12.0);
    }

    #[test]
    fn test_priority_orders_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_highest_degree_picks_phd_over_master() {
        let profile = CandidateProfile {
            skills: vec![],
            education: vec![
                Degree {
                    level: DegreeLevel::Master,
                    field: "Physics".to_string(),
                    graduation_year: 2015,
                },
                Degree {
                    level: DegreeLevel::Phd,
                    field: "Physics".to_string(),
                    graduation_year: 2019,
                },
            ],
            experience_years: 3.0,
            academic_markers: BTreeSet::new(),
            achievements: vec![],
        };
        assert_eq!(profile.highest_degree(), Some(DegreeLevel::Phd));
        assert!(profile.holds_phd());
    }

    #[test]
    fn test_degree_level_named_in_credential_text() {
        assert_eq!(
            DegreeLevel::named_in("Master's degree in Statistics"),
            Some(DegreeLevel::Master)
        );
        assert_eq!(DegreeLevel::named_in("PhD or equivalent"), Some(DegreeLevel::Phd));
        assert_eq!(DegreeLevel::named_in("BSc in Computer Science"), Some(DegreeLevel::Bachelor));
        assert_eq!(DegreeLevel::named_in("AWS Solutions Architect"), None);
    }

    #[test]
    fn test_required_degree_ignores_non_credential_skills() {
        let skill = |name: &str, category| Skill {
            name: name.to_string(),
            category,
            weight: 0.5,
        };
        let requirements = RequirementSet {
            must_have: vec![
                skill("Master data management", SkillCategory::Technical),
                skill("Bachelor's degree", SkillCategory::Credential),
            ],
            nice_to_have: vec![skill("PhD", SkillCategory::Credential)],
            seniority_level: SeniorityLevel::Mid,
            responsibility_summary: "Builds pipelines.".to_string(),
        };
        assert_eq!(requirements.required_degree(), Some(DegreeLevel::Bachelor));
    }

    #[test]
    fn test_achievement_missing_hint_deserializes_as_none() {
        let json = r#"{"description": "Cut latency by 40%", "quantified": true}"#;
        let achievement: Achievement = serde_json::from_str(json).unwrap();
        assert!(achievement.business_impact_hint.is_none());
    }
}
