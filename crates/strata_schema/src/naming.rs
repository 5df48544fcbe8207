//! Column and table name generation.
//!
//! Property names are normalized segment by segment into snake_case and joined
//! with [`PATH_SEPARATOR`]. Names that would reach [`MAX_IDENTIFIER_LEN`] are
//! shortened by abbreviating segments left to right; if that is not enough the
//! name is rejected rather than truncated.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::{display_path, Result, SchemaError};

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;
pub const PATH_SEPARATOR: &str = "__";
pub const STAGING_SUFFIX: &str = "_temp";

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());
static ACRONYM_THEN_WORD_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)_([A-Z][a-z])").unwrap());
static LOWER_THEN_UPPER_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\d])_([A-Z])").unwrap());
static ACRONYM_THEN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static LOWER_THEN_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\d])([A-Z])").unwrap());
static WORD_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|_)(.)").unwrap());

/// Normalize one property name into a snake_case identifier segment.
///
/// `TestTable` becomes `test_table`; an explicit separator before an uppercase
/// word is kept visible as a double underscore (`test Table` becomes `test__table`).
pub fn inflect_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(SchemaError::InvalidPropertyName {
            path: name.to_string(),
            reason: "property names must not be empty".to_string(),
        });
    }

    let name = NON_ALPHANUMERIC.replace_all(name, "_");
    let name = ACRONYM_THEN_WORD_SPLIT.replace_all(&name, "${1}__${2}");
    let name = LOWER_THEN_UPPER_SPLIT.replace_all(&name, "${1}__${2}");

    let mut name = name.into_owned();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    Ok(underscore(&name))
}

fn underscore(word: &str) -> String {
    let word = ACRONYM_THEN_WORD.replace_all(word, "${1}_${2}");
    let word = LOWER_THEN_UPPER.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_ascii_lowercase()
}

/// Acronym of a snake_case segment (`very_long_name` becomes `vln`).
/// Falls back to the first three characters when the acronym is a single letter.
fn abbreviate(segment: &str) -> String {
    let camel = WORD_START.replace_all(segment, |caps: &Captures| caps[1].to_uppercase());
    let acronym: String = camel.chars().filter(|c| !c.is_ascii_lowercase()).collect();
    if acronym.chars().count() > 1 {
        acronym.to_ascii_lowercase()
    } else {
        segment.chars().take(3).collect::<String>().to_ascii_lowercase()
    }
}

fn joined_len(segments: &[String]) -> usize {
    let separators = segments.len().saturating_sub(1) * PATH_SEPARATOR.len();
    segments.iter().map(String::len).sum::<usize>() + separators
}

/// Generate the column name for a property path.
///
/// The result is always shorter than [`MAX_IDENTIFIER_LEN`].
pub fn column_name<S: AsRef<str>>(path: &[S]) -> Result<String> {
    if path.is_empty() {
        return Err(SchemaError::InvalidPropertyName {
            path: display_path(path),
            reason: "empty property path".to_string(),
        });
    }

    let mut segments = Vec::with_capacity(path.len());
    for segment in path {
        let inflected = inflect_name(segment.as_ref()).map_err(|_| SchemaError::InvalidPropertyName {
            path: display_path(path),
            reason: "property names must not be empty".to_string(),
        })?;
        segments.push(inflected);
    }

    let mut index = 0;
    while joined_len(&segments) >= MAX_IDENTIFIER_LEN && index < segments.len() {
        segments[index] = abbreviate(&segments[index]);
        index += 1;
    }

    check_identifier_fits(segments.join(PATH_SEPARATOR))
}

/// Target table name for a stream.
pub fn table_name(stream: &str) -> Result<String> {
    let name = inflect_name(stream)?;
    check_identifier_fits(name)
}

/// Name of the per-batch staging relation for a target table.
pub fn staging_table_name(table: &str) -> Result<String> {
    check_identifier_fits(format!("{}{}", table, STAGING_SUFFIX))
}

/// Every generated identifier must be shorter than `MAX_IDENTIFIER_LEN`.
fn check_identifier_fits(name: String) -> Result<String> {
    if name.len() >= MAX_IDENTIFIER_LEN {
        return Err(SchemaError::NameLengthExhausted {
            len: name.len(),
            name,
            limit: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(name)
}
