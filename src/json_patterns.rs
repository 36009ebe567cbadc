//! # JSON Repair Patterns Module
//!
//! This module contains the regex patterns used to repair and salvage near-JSON
//! recipe text. Patterns marked "masked" run over text in which string literals and
//! comments have been replaced by sentinels (see `response_repair`), so they only
//! ever see structural JSON.

use lazy_static::lazy_static;
use regex::Regex;

/// Start/end of a masked string literal sentinel
pub const STRING_OPEN: char = '\u{2}';
pub const STRING_CLOSE: char = '\u{3}';
/// Start/end of a masked comment sentinel
pub const COMMENT_OPEN: char = '\u{4}';
pub const COMMENT_CLOSE: char = '\u{5}';

// Whitespace and masked comments allowed between structural tokens
const GAP: &str = r"(?:\s|\x04[0-9]+\x05)*";

// A JSON string literal body, escapes included
pub const STRING_BODY: &str = r#""((?:[^"\\]|\\.)*)""#;

lazy_static! {
    /// (masked) bare numeric value with a unit suffix: `: 100g`, `: 1.5cups`
    pub static ref UNIT_VALUE_REGEX: Regex = Regex::new(&format!(
        r":({GAP})([0-9]+(?:\.[0-9]+)?[A-Za-z]+)\b"
    ))
    .expect("Unit value pattern should be valid");

    /// (masked) commas left dangling before a closing bracket
    pub static ref TRAILING_COMMA_REGEX: Regex = Regex::new(
        r",(?:[\s,]|\x04[0-9]+\x05)*([}\]])"
    )
    .expect("Trailing comma pattern should be valid");

    /// (masked) object key written without quotes
    pub static ref BARE_KEY_REGEX: Regex = Regex::new(&format!(
        r"([{{,]{GAP})([A-Za-z_][A-Za-z0-9_]*)({GAP}):"
    ))
    .expect("Bare key pattern should be valid");

    /// Sentinel left behind by masking
    pub static ref SENTINEL_REGEX: Regex = Regex::new(
        r"[\x02\x04]([0-9]+)[\x03\x05]"
    )
    .expect("Sentinel pattern should be valid");

    /// Any JSON string literal
    pub static ref STRING_LITERAL_REGEX: Regex = Regex::new(STRING_BODY)
        .expect("String literal pattern should be valid");

    pub static ref NAME_FIELD_REGEX: Regex = Regex::new(&format!(r#""name"\s*:\s*{STRING_BODY}"#))
        .expect("Name field pattern should be valid");

    pub static ref PREP_TIME_REGEX: Regex = integer_field("prep_time");
    pub static ref COOK_TIME_REGEX: Regex = integer_field("cook_time");
    pub static ref SERVINGS_REGEX: Regex = integer_field("servings");
    pub static ref CALORIES_REGEX: Regex = integer_field("calories");

    pub static ref PROTEIN_REGEX: Regex = decimal_field("protein");
    pub static ref CARBS_REGEX: Regex = decimal_field("carbs");
    pub static ref FAT_REGEX: Regex = decimal_field("fat");

    /// Opening of each salvageable section; the match ends on the bracket
    pub static ref INGREDIENTS_SECTION_REGEX: Regex = Regex::new(r#""ingredients"\s*:\s*\["#)
        .expect("Ingredients section pattern should be valid");
    pub static ref INSTRUCTIONS_SECTION_REGEX: Regex = Regex::new(r#""instructions"\s*:\s*\["#)
        .expect("Instructions section pattern should be valid");
    pub static ref NUTRITION_SECTION_REGEX: Regex = Regex::new(r#""nutrition"\s*:\s*\{"#)
        .expect("Nutrition section pattern should be valid");
}

// Integer values may have been quoted by unit repair (`"15min"`)
fn integer_field(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*"?([0-9]+)"#)).expect("Integer field pattern should be valid")
}

fn decimal_field(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"#))
        .expect("Decimal field pattern should be valid")
}
