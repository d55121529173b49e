//! Abstract Syntax Tree (AST) for query expressions.

use std::fmt;

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A quoted string or a bareword that is not a boolean, null or number.
    String(String),
}

impl Scalar {
    /// Infers a scalar from an unquoted word by its lexical shape.
    pub fn from_bareword(word: &str) -> Self {
        match word {
            "true" => return Scalar::Bool(true),
            "false" => return Scalar::Bool(false),
            "null" => return Scalar::Null,
            _ => {}
        }

        let unsigned = word.strip_prefix(['-', '+']).unwrap_or(word);
        let mut chars = unsigned.chars();
        // Codes like phone numbers keep their leading zeros.
        if chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
            return Scalar::String(word.to_string());
        }

        if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
            // Integers past i64 stay strings rather than losing precision.
            return match word.parse::<i64>() {
                Ok(int) => Scalar::Int(int),
                Err(_) => Scalar::String(word.to_string()),
            };
        }

        // Only plain decimal shapes count as floats; "inf" and "NaN" stay strings.
        let looks_numeric = unsigned
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '.');
        if looks_numeric {
            if let Ok(float) = word.parse::<f64>() {
                if float.is_finite() {
                    return Scalar::Float(float);
                }
            }
        }

        Scalar::String(word.to_string())
    }

    /// Converts the scalar into a JSON value for a backend predicate.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `eq(field,value)`
    Eq,
    /// `ne(field,value)`
    Ne,
}

impl ComparisonOp {
    /// Looks up an operator by its (lowercase) function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(ComparisonOp::Eq),
            "ne" => Some(ComparisonOp::Ne),
            _ => None,
        }
    }

    /// Returns the function name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
        }
    }
}

/// A single `op(field,value)` leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Dot-separated field path.
    pub field: String,
    /// The operator.
    pub op: ComparisonOp,
    /// The literal compared against.
    pub value: Scalar,
}

/// A parsed query expression.
///
/// `And` and `Or` always hold at least one child; the parser rejects empty
/// argument lists and the constructors below are only used with non-empty
/// input.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// All children must match.
    And(Vec<Filter>),

    /// At least one child must match.
    Or(Vec<Filter>),

    /// A field comparison.
    Comparison(Comparison),
}

impl Filter {
    /// Creates an equality comparison.
    ///
    /// # Example
    ///
    /// ```
    /// use mquery::filter::{Filter, Scalar};
    ///
    /// let filter = Filter::eq("is_active", true);
    /// assert!(matches!(filter, Filter::Comparison(_)));
    /// ```
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Filter::Comparison(Comparison {
            field: field.into(),
            op: ComparisonOp::Eq,
            value: value.into(),
        })
    }

    /// Creates an inequality comparison.
    pub fn ne(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Filter::Comparison(Comparison {
            field: field.into(),
            op: ComparisonOp::Ne,
            value: value.into(),
        })
    }

    /// Creates an AND node, collapsing a single child into itself.
    pub fn all(mut children: Vec<Filter>) -> Self {
        if children.len() == 1 {
            return children.remove(0);
        }
        Filter::And(children)
    }

    /// Creates an OR node, collapsing a single child into itself.
    pub fn any(mut children: Vec<Filter>) -> Self {
        if children.len() == 1 {
            return children.remove(0);
        }
        Filter::Or(children)
    }

    /// Returns the nesting depth of the tree (a lone comparison has depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Filter::Comparison(_) => 1,
            Filter::And(children) | Filter::Or(children) => {
                1 + children.iter().map(Filter::depth).max().unwrap_or(0)
            }
        }
    }

    /// Visits every comparison leaf in order.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            Filter::Comparison(c) => out.push(c),
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_comparisons(out);
                }
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Filter::Comparison(c) => {
                return write!(f, "{}({},{})", c.op.name(), c.field, c.value);
            }
            Filter::And(children) => ("and", children),
            Filter::Or(children) => ("or", children),
        };
        write!(f, "{name}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}
