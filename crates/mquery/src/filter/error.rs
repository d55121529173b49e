//! Error types for query and sort parsing.

use std::fmt;

use thiserror::Error;

/// A specialized Result type for filter parsing and compilation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Broad category of a [`FilterError`], used to map failures to client
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed query or sort text.
    ParseSyntax,
    /// A field outside the resource allowlist.
    UnknownField,
    /// Nesting limit hit while parsing.
    MaxDepthExceeded,
    /// Unrecognized sort direction marker.
    InvalidDirection,
}

/// Errors that can occur while parsing or compiling a query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The expression is empty.
    #[error("expression is empty")]
    EmptyExpression,

    /// An unexpected token was encountered.
    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The offending token text.
        token: String,
        /// Byte offset of the token.
        position: usize,
    },

    /// The input ended while more tokens were expected.
    #[error("unexpected end of expression")]
    UnexpectedEndOfInput,

    /// An opening parenthesis was never closed.
    #[error("unclosed parenthesis opened at position {position}")]
    UnclosedParenthesis {
        /// Byte offset of the opening parenthesis.
        position: usize,
    },

    /// A quoted string was never terminated.
    #[error("unterminated string starting at position {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },

    /// A function name that is not a known combinator or operator.
    #[error("unknown operator '{name}' at position {position}")]
    UnknownOperator {
        /// The unrecognized name.
        name: String,
        /// Byte offset of the name.
        position: usize,
    },

    /// A field path or sort field is empty or has an empty segment.
    #[error("invalid field name '{field}'")]
    InvalidField {
        /// The rejected field text.
        field: String,
    },

    /// Expression nesting exceeded the parser limit.
    #[error("expression nesting exceeds the maximum depth of {limit}")]
    MaxDepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A sort direction marker was not recognized.
    #[error("invalid sort direction '{marker}' for field '{field}'")]
    InvalidDirection {
        /// The field the marker was attached to.
        field: String,
        /// The unrecognized marker.
        marker: String,
    },

    /// A field is not queryable for the target resource.
    #[error("unknown field '{field}'{}", suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
    UnknownField {
        /// The rejected field.
        field: String,
        /// The closest allowlisted field, if any.
        suggestion: Option<String>,
    },
}

impl FilterError {
    /// Creates an unexpected token error.
    pub fn unexpected_token(token: impl Into<String>, position: usize) -> Self {
        FilterError::UnexpectedToken {
            token: token.into(),
            position,
        }
    }

    /// Creates an unknown operator error.
    pub fn unknown_operator(name: impl Into<String>, position: usize) -> Self {
        FilterError::UnknownOperator {
            name: name.into(),
            position,
        }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>) -> Self {
        FilterError::InvalidField {
            field: field.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(field: impl Into<String>, suggestion: Option<String>) -> Self {
        FilterError::UnknownField {
            field: field.into(),
            suggestion,
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilterError::UnknownField { .. } => ErrorKind::UnknownField,
            FilterError::MaxDepthExceeded { .. } => ErrorKind::MaxDepthExceeded,
            FilterError::InvalidDirection { .. } => ErrorKind::InvalidDirection,
            _ => ErrorKind::ParseSyntax,
        }
    }

    /// Returns the sub-term that triggered the error, when there is one.
    pub fn offending_text(&self) -> Option<&str> {
        match self {
            FilterError::UnexpectedToken { token, .. } => Some(token),
            FilterError::UnknownOperator { name, .. } => Some(name),
            FilterError::InvalidField { field } | FilterError::UnknownField { field, .. } => {
                Some(field)
            }
            FilterError::InvalidDirection { marker, .. } => Some(marker),
            _ => None,
        }
    }
}

/// The request parameter a query error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryParam {
    /// The `query` filter expression.
    Query,
    /// The `sort` specification.
    Sort,
}

impl QueryParam {
    /// Returns the parameter name as it appears on the request.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryParam::Query => "query",
            QueryParam::Sort => "sort",
        }
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`FilterError`] tied to the request parameter and raw input that caused it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {param} '{input}': {source}")]
pub struct QueryError {
    /// Which parameter failed.
    pub param: QueryParam,
    /// The raw value supplied by the caller.
    pub input: String,
    /// The underlying failure.
    #[source]
    pub source: FilterError,
}

impl QueryError {
    /// Wraps a filter error raised while handling `input` for `param`.
    pub fn new(param: QueryParam, input: impl Into<String>, source: FilterError) -> Self {
        Self {
            param,
            input: input.into(),
            source,
        }
    }

    /// Returns the category of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(FilterError::EmptyExpression.kind(), ErrorKind::ParseSyntax);
        assert_eq!(
            FilterError::UnclosedParenthesis { position: 3 }.kind(),
            ErrorKind::ParseSyntax
        );
        assert_eq!(
            FilterError::MaxDepthExceeded { limit: 32 }.kind(),
            ErrorKind::MaxDepthExceeded
        );
        assert_eq!(
            FilterError::unknown_field("secret", None).kind(),
            ErrorKind::UnknownField
        );
        assert_eq!(
            FilterError::InvalidDirection {
                field: "name".into(),
                marker: "up".into()
            }
            .kind(),
            ErrorKind::InvalidDirection
        );
    }

    #[test]
    fn test_unknown_field_display_with_suggestion() {
        let err = FilterError::unknown_field("nmae", Some("name".to_string()));
        assert_eq!(err.to_string(), "unknown field 'nmae' (did you mean 'name'?)");

        let err = FilterError::unknown_field("secret", None);
        assert_eq!(err.to_string(), "unknown field 'secret'");
    }

    #[test]
    fn test_query_error_keeps_param_and_input_apart() {
        let err = QueryError::new(
            QueryParam::Sort,
            "name:up",
            FilterError::InvalidDirection {
                field: "name".into(),
                marker: "up".into(),
            },
        );
        assert_eq!(err.param.as_str(), "sort");
        assert_eq!(err.input, "name:up");
        assert_eq!(err.source.offending_text(), Some("up"));
        assert!(err.to_string().starts_with("invalid sort 'name:up'"));
    }
}
