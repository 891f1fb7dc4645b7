//! Schema validator: turns raw model text into a normalized JSON value that
//! matches an expected shape, or explains precisely why it cannot.
//!
//! Pipeline: direct parse → repair 1 (strip prose / code fences around an
//! embedded JSON block) → shape conformance with repair 2 (fuzzy coercion of
//! near-miss field names) → per-field constraints.
//!
//! Pure: no I/O, no LLM calls.

use std::collections::HashSet;

use serde_json::{Map, Value};
use strsim::levenshtein;
use thiserror::Error;
use tracing::debug;

/// Maximum edit distance for coercing a near-miss field name.
pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 2;
/// Upper bound on how much raw model output an error may carry.
const RAW_EXCERPT_CHARS: usize = 200;
/// How many embedded-block candidates repair 1 will try before giving up.
const MAX_BLOCK_CANDIDATES: usize = 4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("malformed output: {detail}")]
    MalformedOutput { detail: String, raw_excerpt: String },

    #[error("constraint violation on `{field}`: {detail} (got {value})")]
    ConstraintViolation {
        field: String,
        value: String,
        detail: String,
    },
}

impl ValidationError {
    pub fn constraint(field: impl Into<String>, value: &Value, detail: impl Into<String>) -> Self {
        ValidationError::ConstraintViolation {
            field: field.into(),
            value: excerpt(&value.to_string()),
            detail: detail.into(),
        }
    }

    #[cfg(test)]
    pub fn is_malformed(&self) -> bool {
        matches!(self, ValidationError::MalformedOutput { .. })
    }
}

/// Expected type and constraints of a single value.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text {
        non_empty: bool,
    },
    Number {
        min: f64,
        max: f64,
    },
    Integer {
        min: i64,
        max: i64,
    },
    Bool,
    /// Canonical members, lowercase snake_case.
    Enum(&'static [&'static str]),
    List {
        item: Box<FieldKind>,
        min_len: usize,
        max_len: Option<usize>,
    },
    Object(Vec<FieldSpec>),
}

impl FieldKind {
    pub fn text() -> Self {
        FieldKind::Text { non_empty: false }
    }

    pub fn non_empty_text() -> Self {
        FieldKind::Text { non_empty: true }
    }

    pub fn number(min: f64, max: f64) -> Self {
        FieldKind::Number { min, max }
    }

    pub fn integer(min: i64, max: i64) -> Self {
        FieldKind::Integer { min, max }
    }

    pub fn one_of(members: &'static [&'static str]) -> Self {
        FieldKind::Enum(members)
    }

    pub fn list(item: FieldKind) -> Self {
        FieldKind::List {
            item: Box::new(item),
            min_len: 0,
            max_len: None,
        }
    }

    pub fn bounded_list(item: FieldKind, min_len: usize, max_len: Option<usize>) -> Self {
        FieldKind::List {
            item: Box::new(item),
            min_len,
            max_len,
        }
    }

    pub fn object(fields: Vec<FieldSpec>) -> Self {
        FieldKind::Object(fields)
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } | FieldKind::Enum(_) => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::List { .. } => "array",
            FieldKind::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// The full expected shape of one stage's output.
#[derive(Debug, Clone)]
pub struct ShapeSpec {
    pub name: &'static str,
    pub root: FieldKind,
}

impl ShapeSpec {
    pub fn object(name: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name,
            root: FieldKind::Object(fields),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    max_edit_distance: usize,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self {
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
        }
    }
}

impl SchemaValidator {
    pub fn new(max_edit_distance: usize) -> Self {
        Self { max_edit_distance }
    }

    /// Parses `raw_text`, repairs what it safely can, and checks it against `shape`.
    ///
    /// The returned value carries canonical field names only, with enum members
    /// normalized and missing optional fields set to `null`.
    pub fn validate_and_repair(
        &self,
        raw_text: &str,
        shape: &ShapeSpec,
    ) -> Result<Value, ValidationError> {
        let value = parse_structured(raw_text)?;
        let conformer = Conformer {
            max_edit_distance: self.max_edit_distance,
            raw: raw_text,
        };
        conformer.conform(value, &shape.root, "")
    }
}

/// Convenience wrapper using the default edit-distance threshold.
#[cfg(test)]
pub fn validate_and_repair(raw_text: &str, shape: &ShapeSpec) -> Result<Value, ValidationError> {
    SchemaValidator::default().validate_and_repair(raw_text, shape)
}

/// Bounded, char-boundary-safe excerpt of model output for error reporting.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(RAW_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn parse_structured(raw: &str) -> Result<Value, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    // Repair 1: the model wrapped the JSON in prose or code fences.
    let unfenced = strip_json_fences(trimmed);
    let mut search_from = 0;
    for _ in 0..MAX_BLOCK_CANDIDATES {
        let start = match next_embedded_block(unfenced, search_from) {
            BlockScan::Found { start, block } => {
                if let Ok(value) = serde_json::from_str::<Value>(block) {
                    debug!(
                        "Recovered embedded JSON block ({} of {} bytes)",
                        block.len(),
                        raw.len()
                    );
                    return Ok(value);
                }
                start
            }
            BlockScan::Unbalanced { start } => start,
            BlockScan::Exhausted => break,
        };
        search_from = start + 1;
    }

    Err(ValidationError::MalformedOutput {
        detail: "output is not valid JSON and no embedded JSON block could be recovered"
            .to_string(),
        raw_excerpt: excerpt(raw),
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

enum BlockScan<'a> {
    Found { start: usize, block: &'a str },
    /// An opening bracket that never closes, e.g. a stray `[` in prose.
    Unbalanced { start: usize },
    Exhausted,
}

/// Scans for the first balanced `{...}` or `[...]` block starting at or after `from`.
/// Brackets inside JSON strings are ignored.
fn next_embedded_block(text: &str, from: usize) -> BlockScan<'_> {
    let Some(offset) = text
        .get(from..)
        .and_then(|rest| rest.find(|c: char| c == '{' || c == '['))
    else {
        return BlockScan::Exhausted;
    };
    let start = from + offset;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return BlockScan::Found {
                        start,
                        block: &text[start..end],
                    };
                }
            }
            _ => {}
        }
    }
    BlockScan::Unbalanced { start }
}

fn normalize_token(token: &str) -> String {
    token
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

struct Conformer<'a> {
    max_edit_distance: usize,
    raw: &'a str,
}

impl Conformer<'_> {
    fn malformed(&self, detail: String) -> ValidationError {
        ValidationError::MalformedOutput {
            detail,
            raw_excerpt: excerpt(self.raw),
        }
    }

    fn type_mismatch(&self, kind: &FieldKind, path: &str, found: &Value) -> ValidationError {
        let found = match found {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        let location = if path.is_empty() { "<root>" } else { path };
        self.malformed(format!(
            "expected {} at `{location}`, found {found}",
            kind.type_name()
        ))
    }

    fn conform(&self, value: Value, kind: &FieldKind, path: &str) -> Result<Value, ValidationError> {
        match kind {
            FieldKind::Text { non_empty } => match value {
                Value::String(s) => {
                    let trimmed = s.trim();
                    if *non_empty && trimmed.is_empty() {
                        return Err(ValidationError::constraint(
                            path,
                            &Value::String(s.clone()),
                            "must not be empty",
                        ));
                    }
                    Ok(Value::String(trimmed.to_string()))
                }
                other => Err(self.type_mismatch(kind, path, &other)),
            },
            FieldKind::Number { min, max } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| self.type_mismatch(kind, path, &value))?;
                if n < *min || n > *max {
                    return Err(ValidationError::constraint(
                        path,
                        &value,
                        format!("must be within [{min}, {max}]"),
                    ));
                }
                Ok(value)
            }
            FieldKind::Integer { min, max } => {
                let n = match value.as_i64() {
                    Some(n) => n,
                    None => match value.as_f64() {
                        Some(f) if f.fract() == 0.0 => f as i64,
                        _ => return Err(self.type_mismatch(kind, path, &value)),
                    },
                };
                if n < *min || n > *max {
                    return Err(ValidationError::constraint(
                        path,
                        &value,
                        format!("must be within [{min}, {max}]"),
                    ));
                }
                Ok(Value::from(n))
            }
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(value),
                other => Err(self.type_mismatch(kind, path, &other)),
            },
            FieldKind::Enum(members) => {
                let Value::String(s) = &value else {
                    return Err(self.type_mismatch(kind, path, &value));
                };
                let token = normalize_token(s);
                members
                    .iter()
                    .find(|m| **m == token)
                    .map(|m| Value::String((*m).to_string()))
                    .ok_or_else(|| {
                        ValidationError::constraint(
                            path,
                            &value,
                            format!("must be one of: {}", members.join(", ")),
                        )
                    })
            }
            FieldKind::List {
                item,
                min_len,
                max_len,
            } => {
                let Value::Array(items) = value else {
                    return Err(self.type_mismatch(kind, path, &value));
                };
                if items.len() < *min_len {
                    return Err(ValidationError::constraint(
                        path,
                        &Value::from(items.len()),
                        format!("expected at least {min_len} item(s)"),
                    ));
                }
                if let Some(max_len) = max_len {
                    if items.len() > *max_len {
                        return Err(ValidationError::constraint(
                            path,
                            &Value::from(items.len()),
                            format!("expected at most {max_len} item(s)"),
                        ));
                    }
                }
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| self.conform(v, item, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            FieldKind::Object(fields) => {
                let Value::Object(map) = value else {
                    return Err(self.type_mismatch(kind, path, &value));
                };
                self.conform_object(map, fields, path)
            }
        }
    }

    fn conform_object(
        &self,
        mut map: Map<String, Value>,
        fields: &[FieldSpec],
        path: &str,
    ) -> Result<Value, ValidationError> {
        // Keys that already name some expected field are never fuzzy-coerced into another.
        let reserved: HashSet<String> = map
            .keys()
            .filter(|k| {
                let key = normalize_token(k);
                fields.iter().any(|f| f.name == key)
            })
            .cloned()
            .collect();

        let mut out = Map::new();
        for field in fields {
            let field_path = join_path(path, field.name);
            let found = self
                .resolve_key(&map, &reserved, field.name)
                .and_then(|key| map.remove(&key));

            match found {
                Some(Value::Null) | None if field.required => {
                    return Err(self.malformed(format!("missing required field `{field_path}`")));
                }
                Some(Value::Null) | None => {
                    out.insert(field.name.to_string(), Value::Null);
                }
                Some(v) => {
                    let conformed = self.conform(v, &field.kind, &field_path)?;
                    out.insert(field.name.to_string(), conformed);
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Exact key, then case/separator-insensitive key, then the unique closest
    /// unreserved key within the edit-distance threshold.
    fn resolve_key(
        &self,
        map: &Map<String, Value>,
        reserved: &HashSet<String>,
        expected: &str,
    ) -> Option<String> {
        if map.contains_key(expected) {
            return Some(expected.to_string());
        }
        if let Some(key) = map.keys().find(|k| normalize_token(k) == expected) {
            return Some(key.clone());
        }

        let mut best: Option<(usize, &String)> = None;
        let mut tied = false;
        for key in map.keys().filter(|k| !reserved.contains(*k)) {
            let distance = levenshtein(&normalize_token(key), expected);
            if distance > self.max_edit_distance {
                continue;
            }
            match best {
                Some((d, _)) if distance > d => {}
                Some((d, _)) if distance == d => tied = true,
                _ => {
                    best = Some((distance, key));
                    tied = false;
                }
            }
        }

        match best {
            Some((distance, key)) if !tied => {
                debug!(
                    "Coerced field name `{}` to `{}` (edit distance {})",
                    key, expected, distance
                );
                Some(key.clone())
            }
            _ => None,
        }
    }
}
