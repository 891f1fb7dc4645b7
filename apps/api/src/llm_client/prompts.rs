// Shared prompt fragments used by every analysis stage.
// Each stage keeps its own templates in analysis/prompts.rs; this file holds the
// cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every stage prompt that reads resume or job description text.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every statement you produce must be supported by the resume or job \
    description text provided. Do NOT infer, interpolate, or invent details. \
    When you cite evidence, quote or closely paraphrase the source fragment.";

/// Correction preamble for the single retry after a rejected output.
/// Replace: {error}, {previous_output}
pub const CORRECTION_INSTRUCTION: &str = r#"Your previous response was rejected by the output validator.

VALIDATION ERROR:
{error}

YOUR PREVIOUS RESPONSE:
{previous_output}

Return a corrected response that follows the required JSON schema EXACTLY.
Keep every field name spelled exactly as in the schema, respect all value ranges
and allowed values, and return the JSON object only."#;
