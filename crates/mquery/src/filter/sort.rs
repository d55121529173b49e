//! Sort specification parser.

use std::fmt;

use super::error::{FilterError, FilterResult};
use super::parser::validate_field_path;

/// Sort direction for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Returns the backend sort value (`1` or `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker.to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(SortDirection::Ascending),
            "desc" | "descending" | "-1" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// One `(field, direction)` entry of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field path to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Creates an ascending key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Creates a descending key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.field),
            SortDirection::Descending => write!(f, "-{}", self.field),
        }
    }
}

/// An ordered list of sort keys, primary key first.
///
/// Duplicate fields are kept as written; [`SortSpec::normalized`] resolves
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Creates a sort specification from keys.
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Parses a comma-separated sort specification.
    ///
    /// Each entry is a field name, optionally prefixed with `+`/`-` or
    /// suffixed with `:asc`, `:desc`, `:1` or `:-1`.
    ///
    /// # Example
    ///
    /// ```
    /// use mquery::filter::{SortKey, SortSpec};
    ///
    /// let spec = SortSpec::parse("name,-created_time").unwrap();
    /// assert_eq!(spec.keys(), &[SortKey::asc("name"), SortKey::desc("created_time")]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidDirection` for an unknown marker and
    /// `FilterError::InvalidField` for an empty field name.
    pub fn parse(input: &str) -> FilterResult<Self> {
        if input.trim().is_empty() {
            return Err(FilterError::EmptyExpression);
        }

        let keys = input
            .split(',')
            .map(|entry| parse_entry(entry.trim()))
            .collect::<FilterResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Returns the keys in the order written.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolves duplicate fields: each field keeps the position of its
    /// first occurrence and the direction of its last.
    pub fn normalized(&self) -> Vec<SortKey> {
        let mut out: Vec<SortKey> = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            match out.iter_mut().find(|k| k.field == key.field) {
                Some(existing) => existing.direction = key.direction,
                None => out.push(key.clone()),
            }
        }
        out
    }
}

fn parse_entry(entry: &str) -> FilterResult<SortKey> {
    let (prefix, rest) = match entry.chars().next() {
        Some('-') => (Some(SortDirection::Descending), &entry[1..]),
        Some('+') => (Some(SortDirection::Ascending), &entry[1..]),
        _ => (None, entry),
    };

    let (field, suffix) = match rest.split_once(':') {
        Some((field, marker)) => {
            let field = field.trim();
            let marker = marker.trim();
            let direction =
                SortDirection::from_marker(marker).ok_or_else(|| FilterError::InvalidDirection {
                    field: field.to_string(),
                    marker: marker.to_string(),
                })?;
            (field, Some((direction, marker)))
        }
        None => (rest.trim(), None),
    };

    let field = validate_field_path(field.to_string())?;

    let direction = match (prefix, suffix) {
        (Some(_), Some((_, marker))) => {
            return Err(FilterError::InvalidDirection {
                field,
                marker: marker.to_string(),
            })
        }
        (Some(direction), None) | (None, Some((direction, _))) => direction,
        (None, None) => SortDirection::Ascending,
    };

    Ok(SortKey { field, direction })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_field_defaults_ascending() {
        let spec = SortSpec::parse("name").unwrap();
        assert_eq!(spec.keys(), &[SortKey::asc("name")]);
    }

    #[test]
    fn test_parse_prefix_markers() {
        let spec = SortSpec::parse("+name,-created_time").unwrap();
        assert_eq!(
            spec.keys(),
            &[SortKey::asc("name"), SortKey::desc("created_time")]
        );
    }

    #[test]
    fn test_parse_suffix_markers() {
        let spec = SortSpec::parse("name:DESC, email:asc, tenant:-1, id:1").unwrap();
        assert_eq!(
            spec.keys(),
            &[
                SortKey::desc("name"),
                SortKey::asc("email"),
                SortKey::desc("tenant"),
                SortKey::asc("id"),
            ]
        );
    }

    #[test]
    fn test_parse_invalid_direction() {
        let err = SortSpec::parse("name:up").unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidDirection {
                field: "name".into(),
                marker: "up".into()
            }
        );
    }

    #[test]
    fn test_parse_conflicting_markers() {
        let err = SortSpec::parse("-name:asc").unwrap_err();
        assert!(matches!(err, FilterError::InvalidDirection { .. }));
    }

    #[test]
    fn test_parse_empty_field_names() {
        assert!(matches!(
            SortSpec::parse("name,,email").unwrap_err(),
            FilterError::InvalidField { .. }
        ));
        assert!(matches!(
            SortSpec::parse("-").unwrap_err(),
            FilterError::InvalidField { .. }
        ));
        assert!(matches!(
            SortSpec::parse(":desc").unwrap_err(),
            FilterError::InvalidField { .. }
        ));
        assert_eq!(SortSpec::parse("   ").unwrap_err(), FilterError::EmptyExpression);
    }

    #[test]
    fn test_duplicates_kept_then_normalized() {
        let spec = SortSpec::parse("name,email,-name").unwrap();
        assert_eq!(spec.keys().len(), 3);
        assert_eq!(
            spec.normalized(),
            vec![SortKey::desc("name"), SortKey::asc("email")]
        );
    }

    #[test]
    fn test_display_round_trips_direction() {
        assert_eq!(SortKey::desc("name").to_string(), "-name");
        assert_eq!(SortKey::asc("name").to_string(), "name");
    }
}
