// All LLM prompt constants for the analysis stages.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for job requirement extraction.
pub const REQUIREMENTS_SYSTEM: &str = "You are an expert technical recruiter. \
    Extract the structured hiring requirements from a job description.";

/// Requirement extraction prompt.
/// Replace: {grounding_instruction}, {seniority_hint}, {job_description}
pub const REQUIREMENTS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Extract the hiring requirements from the job description below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "must_have": [
    {"name": "Python", "category": "technical", "weight": 0.9}
  ],
  "nice_to_have": [
    {"name": "Kubernetes", "category": "technical", "weight": 0.5}
  ],
  "seniority_level": "mid",
  "responsibility_summary": "Builds and maintains data pipelines for the analytics team."
}

Rules:
- MUST HAVE: explicit requirements ("required", "must have", "you will need", minimum years).
- NICE TO HAVE: "preferred", "bonus", "a plus", "nice to have".
- CATEGORY (pick exactly one): "technical", "soft", "domain", "credential".
  Degrees and certifications are "credential" (e.g. "PhD in Computer Science", "Master's degree").
- WEIGHT: relative importance between 0.0 and 1.0 within its list.
- SENIORITY (pick exactly one): "junior", "mid", "senior", "lead".
  Map required years of experience: under 2 → junior, 2-5 → mid, 6-9 → senior, 10+ → lead.
- RESPONSIBILITY SUMMARY: one or two sentences describing what the role does day to day.
  Mention research or academic duties only if the job description does.

DETECTED SIGNALS (computed deterministically from the text; use them, do not contradict them):
{seniority_hint}

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for resume extraction.
pub const PROFILE_SYSTEM: &str = "You are an expert resume analyst. \
    Extract a factual, structured candidate profile from a resume.";

/// Resume extraction prompt.
/// Replace: {grounding_instruction}, {academic_hint}, {resume}
pub const PROFILE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Extract the candidate profile from the resume below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "skills": [
    {"name": "Python", "category": "technical", "weight": 0.8}
  ],
  "education": [
    {"level": "phd", "field": "Computational Biology", "graduation_year": 2021}
  ],
  "experience_years": 3.5,
  "academic_markers": ["peer-reviewed publications", "postdoctoral research"],
  "achievements": [
    {
      "description": "Reduced pipeline runtime by 40%",
      "quantified": true,
      "business_impact_hint": "faster reporting for the analytics team"
    }
  ]
}

Rules:
- CATEGORY (pick exactly one): "technical", "soft", "domain", "credential".
- WEIGHT: how prominently the skill features in the resume, 0.0 to 1.0.
- EDUCATION LEVEL (pick exactly one): "bachelor", "master", "phd". Omit other diplomas.
- EXPERIENCE YEARS: professional, post-graduation experience only. Never negative.
  Doctoral research counts only if the resume presents it as employment.
- ACADEMIC MARKERS: short terms that frame the candidate as academic or research-oriented
  (publications, thesis, postdoc, teaching assistantships, conference talks). Empty list if none.
- ACHIEVEMENTS: quantified = true only if the description contains a number, percentage or amount.
  business_impact_hint may be null.

DETECTED SIGNALS (computed deterministically from the text):
{academic_hint}

RESUME:
{resume}"#;

/// System prompt for gap and risk analysis.
pub const GAP_SYSTEM: &str = "You are an expert career coach who evaluates how well a candidate \
    fits a role, with particular attention to overqualification risk for candidates with \
    advanced academic backgrounds.";

/// Gap analysis prompt.
/// Replace: {grounding_instruction}, {overlap_json}, {requirements_json},
///          {profile_json}, {risk_floor}, {risk_floor_factors}
pub const GAP_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Compare the candidate profile against the job requirements.

PRE-COMPUTED SKILL OVERLAP (authoritative; do not contradict it):
{overlap_json}

JOB REQUIREMENTS:
{requirements_json}

CANDIDATE PROFILE:
{profile_json}

BASELINE OVERQUALIFICATION RISK: {risk_floor}
Baseline factors: {risk_floor_factors}
Your overqualification_risk must be at least the baseline. Raise it only with evidence.

Return a JSON object with this EXACT schema (no extra fields):
{
  "strengths": [
    {"statement": "Strong Python background", "evidence": "5 years of Python in data pipelines", "impact": "high"}
  ],
  "weaknesses": [
    {"statement": "No Kubernetes exposure", "evidence": "Kubernetes is listed as preferred", "impact": "medium"}
  ],
  "overqualification_risk": 0.4,
  "risk_factors": ["PhD for a mid-level role"]
}

Rules:
- Between 3 and 5 strengths and between 3 and 5 weaknesses.
- IMPACT (pick exactly one): "high", "medium", "low".
- overqualification_risk is a number between 0.0 and 1.0."#;

/// System prompt for recommendation generation.
pub const RECOMMENDATION_SYSTEM: &str = "You are an expert resume strategist. \
    Produce specific, actionable edits that raise a candidate's fit for one job.";

/// Recommendation prompt.
/// Replace: {score_json}, {gaps_json}, {requirements_json}
pub const RECOMMENDATION_PROMPT_TEMPLATE: &str = r#"Suggest resume changes for this candidate and job.

SCORE BREAKDOWN (each component is between 0 and 1; lower means more room to improve):
{score_json}

GAP FINDINGS:
{gaps_json}

JOB REQUIREMENTS:
{requirements_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "recommendations": [
    {
      "action": "Add 'Kubernetes' to the skills section and mention the staging cluster you maintained",
      "category": "keyword",
      "priority": "high",
      "rationale": "Kubernetes is a preferred skill and is currently missing"
    }
  ]
}

Rules:
- CATEGORY (pick exactly one):
  "keyword" (add missing job vocabulary), "reframing" (present existing experience in business terms),
  "omission" (remove or shorten content that hurts fit), "quantification" (add numbers to achievements).
- PRIORITY (pick exactly one): "high", "medium", "low". Target the weakest score components first.
- Between 3 and 8 recommendations. Every action must be a concrete edit, not generic advice."#;

/// Substitutes `{name}` placeholders in one pass over the template. Inserted values
/// are never rescanned, so a value containing `{profile_json}` stays literal.
/// Braces that do not open a known placeholder are copied through.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = values.iter().find(|(name, _)| {
            after
                .strip_prefix(name)
                .is_some_and(|tail| tail.starts_with('}'))
        });
        match known {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
