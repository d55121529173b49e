//! String collation for sorted reads.
//!
//! Collation only affects ordering; equality matching stays exact.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Vowel series of the Vietnamese alphabet: base letter, variant rank, then the
/// six tone forms (level, grave, hook, tilde, acute, dot below).
const VIETNAMESE_VOWELS: [(char, u32, &str); 12] = [
    ('a', 0, "aàảãáạ"),
    ('a', 1, "ăằẳẵắặ"),
    ('a', 2, "âầẩẫấậ"),
    ('e', 0, "eèẻẽéẹ"),
    ('e', 1, "êềểễếệ"),
    ('i', 0, "iìỉĩíị"),
    ('o', 0, "oòỏõóọ"),
    ('o', 1, "ôồổỗốộ"),
    ('o', 2, "ơờởỡớợ"),
    ('u', 0, "uùủũúụ"),
    ('u', 1, "ưừửữứự"),
    ('y', 0, "yỳỷỹýỵ"),
];

/// How strings are ordered when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collation {
    /// Plain code point order.
    #[default]
    Binary,
    /// Case-insensitive, ties broken by code point order.
    Simple,
    /// Vietnamese dictionary order: base letters (with ă, â, đ, ê, ô, ơ, ư as
    /// distinct letters), then tone marks, then case.
    #[serde(rename = "vi")]
    Vietnamese,
}

/// Error for an unrecognized collation name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown collation '{0}' (expected binary, simple or vi)")]
pub struct UnknownCollation(pub String);

impl FromStr for Collation {
    type Err = UnknownCollation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" | "" => Ok(Collation::Binary),
            "simple" => Ok(Collation::Simple),
            "vi" | "vi_vn" | "vi-vn" | "vietnamese" => Ok(Collation::Vietnamese),
            other => Err(UnknownCollation(other.to_string())),
        }
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Collation::Binary => "binary",
            Collation::Simple => "simple",
            Collation::Vietnamese => "vi",
        })
    }
}

impl Collation {
    /// Compares two strings.
    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::Simple => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)),
            Collation::Vietnamese => compare_vietnamese(a, b),
        }
    }

    /// Compares two JSON values for sorting.
    ///
    /// Types order as null, numbers, strings, objects, arrays, booleans.
    /// Missing fields are treated as null by callers.
    pub fn compare_values(&self, a: &Value, b: &Value) -> Ordering {
        let rank = type_rank(a).cmp(&type_rank(b));
        if rank != Ordering::Equal {
            return rank;
        }

        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => self.compare_str(x, y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Array(x), Value::Array(y)) => {
                for (left, right) in x.iter().zip(y) {
                    let ord = self.compare_values(left, right);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                x.len().cmp(&y.len())
            }
            (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
            _ => Ordering::Equal,
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Collation weights of one character.
#[derive(Debug, Clone, Copy)]
struct Weights {
    primary: u32,
    tone: u8,
    upper: bool,
}

fn weights(c: char) -> Weights {
    let upper = c.is_uppercase();
    let lower = c.to_lowercase().next().unwrap_or(c);

    if lower == 'đ' {
        return Weights {
            primary: ('d' as u32) * 4 + 1,
            tone: 0,
            upper,
        };
    }

    for (base, variant, forms) in VIETNAMESE_VOWELS {
        if let Some(tone) = forms.chars().position(|form| form == lower) {
            return Weights {
                primary: (base as u32) * 4 + variant,
                tone: tone as u8,
                upper,
            };
        }
    }

    Weights {
        primary: (lower as u32) * 4,
        tone: 0,
        upper,
    }
}

fn compare_vietnamese(a: &str, b: &str) -> Ordering {
    let wa: Vec<Weights> = a.chars().map(weights).collect();
    let wb: Vec<Weights> = b.chars().map(weights).collect();

    wa.iter()
        .map(|w| w.primary)
        .cmp(wb.iter().map(|w| w.primary))
        .then_with(|| wa.iter().map(|w| w.tone).cmp(wb.iter().map(|w| w.tone)))
        .then_with(|| wa.iter().map(|w| w.upper).cmp(wb.iter().map(|w| w.upper)))
        .then_with(|| a.cmp(b))
}
