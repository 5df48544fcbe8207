//! Type lattice over JSON Schema primitive kinds.
//!
//! A kind `G` generalizes `T` when every value of `T` casts losslessly to `G`.
//! `string` accepts everything, `number` accepts `integer` and `boolean`,
//! `integer` accepts `boolean`, `object` accepts `array`. `null` is never a
//! concrete column kind: every column is nullable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A JSON Schema primitive kind.
///
/// Variants are declared in name order so the derived `Ord` matches sorting by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl Kind {
    pub const ALL: [Kind; 7] = [
        Kind::Array,
        Kind::Boolean,
        Kind::Integer,
        Kind::Null,
        Kind::Number,
        Kind::Object,
        Kind::String,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Array => "array",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Null => "null",
            Kind::Number => "number",
            Kind::Object => "object",
            Kind::String => "string",
        }
    }

    /// Kinds whose values cast losslessly to `self`, including `self`. Never contains `null`.
    pub fn castable_to(self) -> BTreeSet<Kind> {
        let accepts: &[Kind] = match self {
            Kind::String => &[
                Kind::Array,
                Kind::Boolean,
                Kind::Integer,
                Kind::Number,
                Kind::Object,
                Kind::String,
            ],
            Kind::Number => &[Kind::Number, Kind::Integer, Kind::Boolean],
            Kind::Integer => &[Kind::Integer, Kind::Boolean],
            Kind::Object => &[Kind::Object, Kind::Array],
            Kind::Array => &[Kind::Array],
            Kind::Boolean => &[Kind::Boolean],
            Kind::Null => &[],
        };
        accepts.iter().copied().collect()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(Kind::Array),
            "boolean" => Ok(Kind::Boolean),
            "integer" => Ok(Kind::Integer),
            "null" => Ok(Kind::Null),
            "number" => Ok(Kind::Number),
            "object" => Ok(Kind::Object),
            "string" => Ok(Kind::String),
            _ => Err(format!(
                "Invalid kind: '{}'. Expected one of: array, boolean, integer, null, number, object, string",
                s
            )),
        }
    }
}

/// Kinds that are usable as a column kind: everything except `null`.
pub fn usable_kinds(kinds: &BTreeSet<Kind>) -> BTreeSet<Kind> {
    kinds.iter().copied().filter(|k| *k != Kind::Null).collect()
}

/// The single kind every observed kind casts to.
///
/// Candidates are scanned in name order; the first kind accepting the most
/// observed kinds wins. If that kind cannot accept all of them the answer is
/// `string`. An empty (or null-only) set resolves to `string`.
pub fn most_general_type(kinds: &BTreeSet<Kind>) -> Kind {
    let observed = usable_kinds(kinds);

    let mut best: Option<(Kind, usize)> = None;
    for &candidate in &observed {
        let score = candidate.castable_to().intersection(&observed).count();
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((kind, _)) if kind.castable_to().is_superset(&observed) => kind,
        _ => Kind::String,
    }
}
