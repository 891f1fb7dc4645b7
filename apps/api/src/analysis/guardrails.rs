//! Input guardrails: sanitization and pre-flight checks on the two input texts.
//! Runs at the HTTP boundary before any LLM call is made.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

pub const MIN_RESUME_CHARS: usize = 100;
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 150;
pub const MAX_INPUT_CHARS: usize = 50_000;
/// Inputs scoring above this are rejected. One matched pattern is already enough.
const MAX_INJECTION_SCORE: f64 = 0.3;
const INJECTION_MATCHES_FOR_FULL_SCORE: f64 = 3.0;
/// Minimum share of the resume patterns a resume must match.
const MIN_RESUME_COVERAGE: f64 = 0.4;
/// Minimum share of the job description patterns a job description must match.
const MIN_JOB_DESCRIPTION_COVERAGE: f64 = 0.3;
const MAX_PLACEHOLDER_SCORE: f64 = 0.2;
const PLACEHOLDER_MATCHES_FOR_FULL_SCORE: f64 = 2.0;

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"ignore\s+(?:previous|all|above|prior)\s+(?:instructions?|prompts?|rules?)",
        r"(?:forget|disregard|bypass)\s+(?:your|the)\s+(?:instructions?|rules?|guidelines?)",
        r"(?:act|pretend|roleplay)\s+(?:as|like)\s+(?:an?\s+)?(?:different|other)",
        r"you\s+are\s+(?:now|a|an)\s+(?:different|new|other)",
        r"(?:system|admin|root|developer)\s*(?:mode|access|override)",
        r"(?:tell|show|give)\s+me\s+(?:your|the)\s+(?:prompt|instructions?|system)",
        r"what\s+(?:are|were)\s+(?:your|the)\s+(?:original|initial)\s+instructions",
        r"(?:reveal|expose|show)\s+(?:hidden|secret|internal)\s+(?:prompt|instructions?)",
        r"(?:jailbreak|exploit|hack|bypass)\s+(?:the|your)\s+(?:system|ai|model)",
        r"<script|javascript:",
    ])
});

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("guardrail pattern is valid"))
        .collect()
}

/// Sections and contact details a real resume almost always has.
static RESUME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?:name|full\s+name)[\s:]+[a-z]+\s+[a-z]+",
        r"(?:email|e-mail)[\s:]*[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}",
        r"(?:phone|mobile|tel|telephone)[\s:]*\+?[\d\s\-()]{8,}",
        r"(?:education|qualifications?|degree|university|college)",
        r"(?:experience|employment|work\s+history|career)",
        r"(?:skills?|competenc|abilit|proficient)",
        r"(?:address|location|city|country)",
    ])
});

static JOB_DESCRIPTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?:position|role|job\s+title|we\s+are\s+(?:looking|seeking|hiring))",
        r"(?:responsibilities|responsibility|duties|tasks?|what\s+you.ll\s+do)",
        r"(?:requirements?|qualifications?|ideal\s+candidate|experience)",
        r"(?:company|organization|about\s+us|our\s+(?:company|team))",
        r"(?:location|office|remote|hybrid|work\s+from)",
        r"(?:salary|compensation|package|benefits?|offer)",
    ])
});

/// Template, sample and dummy content. A single match is enough to reject.
static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?:test|testing|example|sample|demo)\s+(?:resume|cv|job)",
        r"lorem\s+ipsum",
        r"placeholder\s+text",
        r"(?:fake|dummy|mock)\s+(?:data|content|information)",
        r"(?:john|jane)\s+doe",
        r"\bexample\s*[@.]",
        r"\btest\s*[@.]",
        r"\b(?:123|456|999)[-\s]*(?:123|456|999)\b",
    ])
});

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").expect("script block pattern is valid")
});

static DANGEROUS_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)javascript:|data:[a-z]+/[a-z0-9.+-]+[;,]").expect("scheme pattern is valid")
});

static HORIZONTAL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0B\x0C]+").expect("whitespace pattern is valid"));

static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?: ?\n){2,}").expect("blank line pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Resume,
    JobDescription,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Resume => f.write_str("resume"),
            Document::JobDescription => f.write_str("job description"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardrailError {
    #[error("The {document} is too short ({length} characters, at least {minimum} required). Please provide the complete text.")]
    TooShort {
        document: Document,
        length: usize,
        minimum: usize,
    },

    #[error("The {document} contains suspicious instructions. Please provide a genuine {document}.")]
    SuspectedInjection { document: Document, matches: usize },

    #[error("This doesn't appear to be a resume. Please provide a complete CV with education, experience, and skills.")]
    NotAResume { coverage: f64 },

    #[error("This doesn't appear to be a job description. Please provide a complete job posting with role details, requirements, and company information.")]
    NotAJobDescription { coverage: f64 },

    #[error("The {document} looks like test or placeholder content. Please provide a real {document}.")]
    PlaceholderContent { document: Document, matches: usize },
}

/// Both inputs after sanitization, ready for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedInputs {
    pub resume_text: String,
    pub job_description_text: String,
}

/// Strips script blocks and dangerous URI schemes, collapses runs of
/// whitespace (line breaks survive), and caps the length.
pub fn sanitize_input(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = SCRIPT_BLOCK.replace_all(&text, "");
    let text = DANGEROUS_SCHEME.replace_all(&text, "");
    let text = HORIZONTAL_WHITESPACE.replace_all(&text, " ");
    let text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().chars().take(MAX_INPUT_CHARS).collect()
}

fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

/// Fraction of the injection patterns needed for a full score that match `text`, capped at 1.
pub fn injection_score(text: &str) -> f64 {
    let matches = count_matches(&INJECTION_PATTERNS, text);
    (matches as f64 / INJECTION_MATCHES_FOR_FULL_SCORE).min(1.0)
}

/// Share of the resume patterns found in `text`.
pub fn resume_coverage(text: &str) -> f64 {
    count_matches(&RESUME_PATTERNS, text) as f64 / RESUME_PATTERNS.len() as f64
}

/// Share of the job description patterns found in `text`.
pub fn job_description_coverage(text: &str) -> f64 {
    count_matches(&JOB_DESCRIPTION_PATTERNS, text) as f64 / JOB_DESCRIPTION_PATTERNS.len() as f64
}

pub fn placeholder_score(text: &str) -> f64 {
    let matches = count_matches(&PLACEHOLDER_PATTERNS, text);
    (matches as f64 / PLACEHOLDER_MATCHES_FOR_FULL_SCORE).min(1.0)
}

fn check_placeholder(text: &str, document: Document) -> Result<(), GuardrailError> {
    let score = placeholder_score(text);
    if score > MAX_PLACEHOLDER_SCORE {
        let matches = count_matches(&PLACEHOLDER_PATTERNS, text);
        warn!("Rejected {document}: {matches} placeholder pattern(s) matched");
        return Err(GuardrailError::PlaceholderContent { document, matches });
    }
    Ok(())
}

/// Length and prompt-injection checks shared by both documents.
fn check_common(text: &str, document: Document, minimum: usize) -> Result<(), GuardrailError> {
    let length = text.trim().chars().count();
    if length < minimum {
        return Err(GuardrailError::TooShort {
            document,
            length,
            minimum,
        });
    }

    let score = injection_score(text);
    if score > MAX_INJECTION_SCORE {
        let matches = (score * INJECTION_MATCHES_FOR_FULL_SCORE).round() as usize;
        warn!("Rejected {document}: {matches} prompt-injection pattern(s) matched");
        return Err(GuardrailError::SuspectedInjection { document, matches });
    }
    Ok(())
}

/// Length, injection, resume shape, then placeholder content.
pub fn check_resume(text: &str) -> Result<(), GuardrailError> {
    check_common(text, Document::Resume, MIN_RESUME_CHARS)?;
    let coverage = resume_coverage(text);
    if coverage < MIN_RESUME_COVERAGE {
        warn!("Rejected resume: pattern coverage {coverage:.2}");
        return Err(GuardrailError::NotAResume { coverage });
    }
    check_placeholder(text, Document::Resume)
}

/// Length, injection, job description shape, then placeholder content.
pub fn check_job_description(text: &str) -> Result<(), GuardrailError> {
    check_common(text, Document::JobDescription, MIN_JOB_DESCRIPTION_CHARS)?;
    let coverage = job_description_coverage(text);
    if coverage < MIN_JOB_DESCRIPTION_COVERAGE {
        warn!("Rejected job description: pattern coverage {coverage:.2}");
        return Err(GuardrailError::NotAJobDescription { coverage });
    }
    check_placeholder(text, Document::JobDescription)
}

/// Sanitizes both inputs, then checks the resume before the job description.
pub fn validate_inputs(
    resume_text: &str,
    job_description_text: &str,
) -> Result<SanitizedInputs, GuardrailError> {
    let resume_text = sanitize_input(resume_text);
    let job_description_text = sanitize_input(job_description_text);
    check_resume(&resume_text)?;
    check_job_description(&job_description_text)?;
    Ok(SanitizedInputs {
        resume_text,
        job_description_text,
    })
}
