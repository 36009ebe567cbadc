//! # Response Repair Module
//!
//! This module turns free text produced by a generative model into recipe fields.
//! Model output frequently wraps the JSON in prose, leaves units unquoted (`100g`),
//! forgets quotes around keys or leaves trailing commas, so recovery runs as an
//! ordered pipeline of stages:
//!
//! 1. **extract** - isolate the outermost `{ ... }` span (the only stage that fails)
//! 2. **normalize** - quote unit values, drop trailing commas, quote bare keys,
//!    convert single quotes, strip comments
//! 3. **strict parse** - standard JSON parsing of the normalized span
//! 4. **salvage** - field-by-field extraction with defaults when strict parsing fails
//!
//! ## Usage
//!
//! ```rust
//! use meal_planner::response_repair::{repair_response, RepairStage};
//!
//! let text = "Sure! {name: 'Dal', \"prep_time\": 10, \"ingredients\": [],}";
//! let raw = repair_response(text).unwrap();
//! assert_eq!(raw.stage, RepairStage::Parsed);
//! assert_eq!(raw.fields["name"], "Dal");
//! ```

use serde_json::{json, Map, Value};
use tracing::{debug, trace, warn};

use crate::json_patterns::{
    BARE_KEY_REGEX, CALORIES_REGEX, CARBS_REGEX, COMMENT_CLOSE, COMMENT_OPEN, COOK_TIME_REGEX,
    FAT_REGEX, INGREDIENTS_SECTION_REGEX, INSTRUCTIONS_SECTION_REGEX, NAME_FIELD_REGEX,
    NUTRITION_SECTION_REGEX, PREP_TIME_REGEX, PROTEIN_REGEX, SENTINEL_REGEX, SERVINGS_REGEX,
    STRING_CLOSE, STRING_LITERAL_REGEX, STRING_OPEN, TRAILING_COMMA_REGEX, UNIT_VALUE_REGEX,
};
use crate::planner_errors::RepairError;

// Defaults used by salvage for any field it cannot find
pub const DEFAULT_RECIPE_NAME: &str = "AI Generated Recipe";
pub const DEFAULT_PREP_TIME: u64 = 15;
pub const DEFAULT_COOK_TIME: u64 = 20;
pub const DEFAULT_SERVINGS: u64 = 1;
pub const DEFAULT_CALORIES: u64 = 500;
pub const DEFAULT_PROTEIN: f64 = 25.0;
pub const DEFAULT_CARBS: f64 = 45.0;
pub const DEFAULT_FAT: f64 = 20.0;

/// Which stage produced the recipe fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    /// The normalized text parsed as JSON
    Parsed,
    /// Fields were salvaged one by one, defaults fill the gaps
    Salvaged,
}

/// Recipe fields recovered from model text, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecipe {
    pub stage: RepairStage,
    pub fields: Map<String, Value>,
}

impl RawRecipe {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Run the full pipeline over generated text.
///
/// Fails only when no JSON object can be located at all.
pub fn repair_response(text: &str) -> Result<RawRecipe, RepairError> {
    let span = extract_json_span(text)?;
    debug!(span_len = span.len(), "Extracted JSON span from response");

    let normalized = normalize(span);
    trace!(normalized = %normalized, "Normalized JSON span");

    match strict_parse(&normalized) {
        Ok(fields) => {
            debug!(field_count = fields.len(), "Strict parse succeeded");
            Ok(RawRecipe {
                stage: RepairStage::Parsed,
                fields,
            })
        }
        Err(e) => {
            warn!(error = %e, "Strict parse failed, salvaging fields individually");
            Ok(RawRecipe {
                stage: RepairStage::Salvaged,
                fields: salvage_fields(&normalized),
            })
        }
    }
}

/// Locate the span from the first `{` to the last `}`
pub fn extract_json_span(text: &str) -> Result<&str, RepairError> {
    let no_object = || RepairError::ParseFailure("no JSON object found".to_string());

    let start = text.find('{').ok_or_else(no_object)?;
    let end = text.rfind('}').filter(|&end| end > start).ok_or_else(no_object)?;

    Ok(&text[start..=end])
}

/// Apply every normalization in order.
///
/// Each transform only touches structural text (never string contents), and the
/// whole sequence is idempotent.
pub fn normalize(span: &str) -> String {
    let text = quote_unit_values(span);
    let text = strip_trailing_commas(&text);
    let text = quote_bare_keys(&text);
    let text = normalize_quotes(&text);
    strip_comments(&text)
}

/// `"amount": 100g` becomes `"amount": "100g"`
pub fn quote_unit_values(text: &str) -> String {
    rewrite_structure(text, |masked| {
        UNIT_VALUE_REGEX.replace_all(masked, r#":${1}"${2}""#).into_owned()
    })
}

/// `[1, 2,]` becomes `[1, 2]`
pub fn strip_trailing_commas(text: &str) -> String {
    rewrite_structure(text, |masked| {
        TRAILING_COMMA_REGEX.replace_all(masked, "${1}").into_owned()
    })
}

/// `{name: 1}` becomes `{"name": 1}`
pub fn quote_bare_keys(text: &str) -> String {
    rewrite_structure(text, |masked| {
        BARE_KEY_REGEX.replace_all(masked, r#"${1}"${2}"${3}:"#).into_owned()
    })
}

/// `'text'` becomes `"text"`, escaping embedded double quotes.
///
/// Raw control characters inside any literal are written as `\u00XX` escapes.
pub fn normalize_quotes(text: &str) -> String {
    scan_segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Str(literal) if literal.starts_with('\'') => single_to_double(literal),
            Segment::Str(literal) => escape_control_chars(literal),
            other => other.as_str().to_string(),
        })
        .collect()
}

/// Remove `// line` and `/* block */` comments.
///
/// A block comment leaves a single space behind so the tokens around it stay apart.
pub fn strip_comments(text: &str) -> String {
    scan_segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Comment(comment) if comment.starts_with("/*") => " ",
            Segment::Comment(_) => "",
            other => other.as_str(),
        })
        .collect()
}

/// Parse normalized text; only a JSON object counts as success
pub fn strict_parse(text: &str) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(fields),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Best-effort field extraction; never fails.
///
/// Ingredient objects are parsed one at a time and silently dropped when they
/// remain malformed.
pub fn salvage_fields(text: &str) -> Map<String, Value> {
    let mut fields = default_fields();

    let ingredients_span = section_span(text, &INGREDIENTS_SECTION_REGEX);
    // Scalar fields are looked up outside the ingredient list so that an
    // ingredient's "name" is not mistaken for the recipe's
    let outside = match ingredients_span {
        Some((start, end)) => format!("{}{}", &text[..start], &text[end..]),
        None => text.to_string(),
    };

    if let Some(captures) = NAME_FIELD_REGEX.captures(&outside) {
        fields.insert("name".into(), Value::String(decode_string(&captures[1])));
    }

    for (key, regex) in [
        ("prep_time", &*PREP_TIME_REGEX),
        ("cook_time", &*COOK_TIME_REGEX),
        ("servings", &*SERVINGS_REGEX),
    ] {
        if let Some(value) = capture_number::<u64>(regex, &outside) {
            fields.insert(key.into(), json!(value));
        }
    }

    if let Some((start, end)) = ingredients_span {
        let ingredients: Vec<Value> = top_level_objects(&text[start + 1..end])
            .into_iter()
            .filter_map(|object| match strict_parse(&normalize(object)) {
                Ok(ingredient) if is_complete_ingredient(&ingredient) => {
                    Some(Value::Object(ingredient))
                }
                Ok(_) => {
                    debug!(object = %object, "Discarding incomplete ingredient object");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "Discarding malformed ingredient object");
                    None
                }
            })
            .collect();
        fields.insert("ingredients".into(), Value::Array(ingredients));
    }

    if let Some((start, end)) = section_span(&outside, &INSTRUCTIONS_SECTION_REGEX) {
        let instructions: Vec<Value> = STRING_LITERAL_REGEX
            .captures_iter(&outside[start..end])
            .map(|captures| decode_string(&captures[1]))
            .filter(|step| !step.is_empty())
            .map(Value::String)
            .collect();
        fields.insert("instructions".into(), Value::Array(instructions));
    }

    if let Some((start, end)) = section_span(&outside, &NUTRITION_SECTION_REGEX) {
        let body = &outside[start..end];
        if let Some(Value::Object(nutrition)) = fields.get_mut("nutrition") {
            if let Some(calories) = capture_number::<u64>(&CALORIES_REGEX, body) {
                nutrition.insert("calories".into(), json!(calories));
            }
            for (key, regex) in [
                ("protein", &*PROTEIN_REGEX),
                ("carbs", &*CARBS_REGEX),
                ("fat", &*FAT_REGEX),
            ] {
                if let Some(value) = capture_number::<f64>(regex, body) {
                    nutrition.insert(key.into(), json!(value));
                }
            }
        }
    }

    fields
}

fn default_fields() -> Map<String, Value> {
    let defaults = json!({
        "name": DEFAULT_RECIPE_NAME,
        "prep_time": DEFAULT_PREP_TIME,
        "cook_time": DEFAULT_COOK_TIME,
        "servings": DEFAULT_SERVINGS,
        "ingredients": [],
        "instructions": [],
        "nutrition": {
            "calories": DEFAULT_CALORIES,
            "protein": DEFAULT_PROTEIN,
            "carbs": DEFAULT_CARBS,
            "fat": DEFAULT_FAT
        }
    });

    match defaults {
        Value::Object(fields) => fields,
        _ => Map::new(),
    }
}

fn is_complete_ingredient(ingredient: &Map<String, Value>) -> bool {
    ["name", "amount", "unit"]
        .iter()
        .all(|key| ingredient.get(*key).map_or(false, |value| !value.is_null()))
}

fn capture_number<T: std::str::FromStr>(regex: &regex::Regex, text: &str) -> Option<T> {
    regex
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
}

/// Decode the escapes of a JSON string body, keeping it verbatim if invalid
fn decode_string(body: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{body}\"")).unwrap_or_else(|_| body.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A lexical piece of near-JSON text
#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment<'a> {
    Code(&'a str),
    /// A quoted literal including its delimiters (`"` or `'`)
    Str(&'a str),
    Comment(&'a str),
}

impl<'a> Segment<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Segment::Code(s) | Segment::Str(s) | Segment::Comment(s) => s,
        }
    }
}

/// Split text into code, string literals and comments.
///
/// Unterminated strings and block comments run to the end of the text.
fn scan_segments(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            quote @ (b'"' | b'\'') => Some(string_end(bytes, i, quote)),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                Some(text[i..].find('\n').map_or(text.len(), |offset| i + offset))
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                Some(text[i + 2..].find("*/").map_or(text.len(), |offset| i + 2 + offset + 2))
            }
            _ => None,
        };

        match end {
            Some(end) => {
                if code_start < i {
                    segments.push(Segment::Code(&text[code_start..i]));
                }
                let piece = &text[i..end];
                segments.push(if bytes[i] == b'/' {
                    Segment::Comment(piece)
                } else {
                    Segment::Str(piece)
                });
                i = end;
                code_start = end;
            }
            None => i += 1,
        }
    }

    if code_start < text.len() {
        segments.push(Segment::Code(&text[code_start..]));
    }

    segments
}

/// Index just past the closing quote of the literal opened at `start`
fn string_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Rewrite only the structural part of the text.
///
/// String literals and comments are swapped for numbered sentinels, `rewrite`
/// runs over the result, and the originals are put back.
fn rewrite_structure<F>(text: &str, rewrite: F) -> String
where
    F: FnOnce(&str) -> String,
{
    let mut masked = String::with_capacity(text.len());
    let mut literals: Vec<&str> = Vec::new();
    for segment in scan_segments(text) {
        match segment {
            // Sentinel characters in structural text would be read back as masks
            Segment::Code(code) => masked.extend(code.chars().filter(|c| !is_sentinel_char(*c))),
            Segment::Str(literal) => {
                masked.push(STRING_OPEN);
                masked.push_str(&literals.len().to_string());
                masked.push(STRING_CLOSE);
                literals.push(literal);
            }
            Segment::Comment(comment) => {
                masked.push(COMMENT_OPEN);
                masked.push_str(&literals.len().to_string());
                masked.push(COMMENT_CLOSE);
                literals.push(comment);
            }
        }
    }

    let rewritten = rewrite(&masked);

    SENTINEL_REGEX
        .replace_all(&rewritten, |captures: &regex::Captures| {
            captures[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| literals.get(index).copied())
                .unwrap_or_default()
                .to_string()
        })
        .into_owned()
}

fn is_sentinel_char(c: char) -> bool {
    [STRING_OPEN, STRING_CLOSE, COMMENT_OPEN, COMMENT_CLOSE].contains(&c)
}

fn push_escaped(out: &mut String, c: char) {
    if c.is_ascii_control() && c != '\u{7f}' {
        out.push_str(&format!("\\u{:04x}", u32::from(c)));
    } else {
        out.push(c);
    }
}

fn escape_control_chars(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        push_escaped(&mut escaped, c);
    }
    escaped
}

/// Convert a terminated single-quoted literal to a double-quoted one
fn single_to_double(literal: &str) -> String {
    if literal.len() < 2 || !literal.ends_with('\'') {
        return literal.to_string();
    }

    let body = &literal[1..literal.len() - 1];
    let mut converted = String::with_capacity(literal.len() + 2);
    converted.push('"');

    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => converted.push('\''),
                Some(next) => {
                    converted.push('\\');
                    converted.push(next);
                }
                None => converted.push('\\'),
            },
            '"' => converted.push_str("\\\""),
            other => push_escaped(&mut converted, other),
        }
    }

    converted.push('"');
    converted
}

/// Byte range of the bracketed section whose opening the regex match ends on.
///
/// An array that is never closed ends where its parent object resumes; any
/// other unbalanced section runs to the end of the text.
fn section_span(text: &str, opening: &regex::Regex) -> Option<(usize, usize)> {
    let found = opening.find(text)?;
    let open = found.end() - 1;
    let end = match balanced_end(text, open) {
        Some(end) => end,
        None if text.as_bytes()[open] == b'[' => unclosed_array_end(text, open),
        None => text.len(),
    };
    Some((open, end))
}

/// Index just past the bracket closing the one at `open`
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (opener, closer) = match bytes[open] {
        b'[' => (b'[', b']'),
        _ => (b'{', b'}'),
    };

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i, b'"');
                continue;
            }
            b if b == opener => depth += 1,
            b if b == closer => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Start of the first parent-object key (or closing bracket) at the array's own
/// nesting level, as in `[ {...}, "instructions": [...]`
fn unclosed_array_end(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i, b'"');
                if depth == 0 && text[end..].trim_start().starts_with(':') {
                    return i;
                }
                i = end;
                continue;
            }
            b'[' | b'{' => depth += 1,
            b']' | b'}' if depth == 0 => return i,
            b']' | b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Every balanced `{ ... }` at the top level of an array body
fn top_level_objects(body: &str) -> Vec<&str> {
    let bytes = body.as_bytes();
    let mut objects = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i, b'"'),
            b'{' => {
                let end = balanced_end(body, i).unwrap_or(body.len());
                objects.push(&body[i..end]);
                i = end;
            }
            _ => i += 1,
        }
    }

    objects
}
