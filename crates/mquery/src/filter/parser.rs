//! Recursive descent parser for query expressions.

use super::ast::{Comparison, ComparisonOp, Filter, Scalar};
use super::error::{FilterError, FilterResult};
use super::lexer::{Lexer, PositionedToken, QueryToken};

/// Default limit on expression nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Parser for query expressions.
///
/// # Grammar
///
/// ```text
/// expr       ::= and_expr | or_expr | comparison
/// and_expr   ::= "and" "(" expr_list ")"
/// or_expr    ::= "or" "(" expr_list ")"
/// expr_list  ::= expr ("," expr)*
/// comparison ::= op "(" field "," value ")"
/// op         ::= "eq" | "ne"
/// field      ::= segment ("." segment)*
/// value      ::= quoted | bareword
/// ```
///
/// Function names are matched case-insensitively. Barewords are typed by
/// shape: `true`/`false`, `null`, integers and decimals; anything else is a
/// string.
///
/// # Example
///
/// ```
/// use mquery::filter::{Filter, FilterParser};
///
/// let filter = FilterParser::parse("and(eq(is_active,true),eq(tenant,\"T1\"))").unwrap();
/// assert_eq!(
///     filter,
///     Filter::And(vec![Filter::eq("is_active", true), Filter::eq("tenant", "T1")])
/// );
/// ```
pub struct FilterParser {
    tokens: Vec<PositionedToken>,
    position: usize,
    max_depth: usize,
}

impl FilterParser {
    /// Parses an expression with the default nesting limit.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::EmptyExpression` for blank input,
    /// `FilterError::UnclosedParenthesis` or `FilterError::UnexpectedToken`
    /// for unbalanced parentheses, and `FilterError::MaxDepthExceeded` when
    /// nesting exceeds [`DEFAULT_MAX_DEPTH`].
    pub fn parse(input: &str) -> FilterResult<Filter> {
        Self::parse_with_max_depth(input, DEFAULT_MAX_DEPTH)
    }

    /// Parses an expression with a caller-chosen nesting limit.
    pub fn parse_with_max_depth(input: &str, max_depth: usize) -> FilterResult<Filter> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FilterError::EmptyExpression);
        }

        let tokens = Lexer::new(trimmed).tokenize()?;
        if tokens.is_empty() {
            return Err(FilterError::EmptyExpression);
        }
        check_balanced(&tokens)?;

        let mut parser = Self {
            tokens,
            position: 0,
            max_depth,
        };
        let filter = parser.parse_expression(1)?;

        if let Some(remaining) = parser.peek() {
            return Err(FilterError::unexpected_token(
                remaining.token.text(),
                remaining.position,
            ));
        }

        Ok(filter)
    }

    fn peek(&self) -> Option<&PositionedToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> FilterResult<PositionedToken> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(FilterError::UnexpectedEndOfInput)?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &QueryToken) -> FilterResult<PositionedToken> {
        let token = self.advance()?;
        if &token.token != expected {
            return Err(FilterError::unexpected_token(
                token.token.text(),
                token.position,
            ));
        }
        Ok(token)
    }

    /// Parses `name "(" ... ")"` at the given nesting depth.
    fn parse_expression(&mut self, depth: usize) -> FilterResult<Filter> {
        if depth > self.max_depth {
            return Err(FilterError::MaxDepthExceeded {
                limit: self.max_depth,
            });
        }

        let head = self.advance()?;
        let QueryToken::Word(name) = &head.token else {
            return Err(FilterError::unexpected_token(
                head.token.text(),
                head.position,
            ));
        };
        let name = name.to_lowercase();

        match name.as_str() {
            "and" | "or" => {
                self.expect(&QueryToken::OpenParen)?;
                let children = self.parse_expr_list(depth)?;
                self.expect(&QueryToken::CloseParen)?;
                if name == "and" {
                    Ok(Filter::And(children))
                } else {
                    Ok(Filter::Or(children))
                }
            }
            _ => {
                let op = ComparisonOp::from_name(&name)
                    .ok_or_else(|| FilterError::unknown_operator(name.clone(), head.position))?;
                self.expect(&QueryToken::OpenParen)?;
                let comparison = self.parse_comparison_args(op)?;
                self.expect(&QueryToken::CloseParen)?;
                Ok(Filter::Comparison(comparison))
            }
        }
    }

    /// Parses `expr ("," expr)*`.
    fn parse_expr_list(&mut self, depth: usize) -> FilterResult<Vec<Filter>> {
        let mut children = vec![self.parse_expression(depth + 1)?];
        while matches!(self.peek(), Some(t) if t.token == QueryToken::Comma) {
            self.advance()?;
            children.push(self.parse_expression(depth + 1)?);
        }
        Ok(children)
    }

    /// Parses `field "," value`.
    fn parse_comparison_args(&mut self, op: ComparisonOp) -> FilterResult<Comparison> {
        let field_token = self.advance()?;
        let field = match field_token.token {
            QueryToken::Word(word) => validate_field_path(word)?,
            other => {
                return Err(FilterError::unexpected_token(
                    other.text(),
                    field_token.position,
                ))
            }
        };

        self.expect(&QueryToken::Comma)?;

        let value_token = self.advance()?;
        let value = match value_token.token {
            QueryToken::Word(word) => Scalar::from_bareword(&word),
            QueryToken::Quoted(text) => Scalar::String(text),
            other => {
                return Err(FilterError::unexpected_token(
                    other.text(),
                    value_token.position,
                ))
            }
        };

        Ok(Comparison { field, op, value })
    }
}

/// Validates a dot-separated field path.
///
/// Segments must be non-empty and may not start with `$`, which would let a
/// caller smuggle backend operators in as field names.
pub(crate) fn validate_field_path(field: String) -> FilterResult<String> {
    let valid = !field.is_empty()
        && field
            .split('.')
            .all(|segment| !segment.is_empty() && !segment.starts_with('$'));
    if valid {
        Ok(field)
    } else {
        Err(FilterError::invalid_field(field))
    }
}

/// Rejects unbalanced parentheses before any structural parsing, so that
/// imbalance is always reported as a syntax error.
fn check_balanced(tokens: &[PositionedToken]) -> FilterResult<()> {
    let mut open = Vec::new();
    for token in tokens {
        match token.token {
            QueryToken::OpenParen => open.push(token.position),
            QueryToken::CloseParen => {
                if open.pop().is_none() {
                    return Err(FilterError::unexpected_token(")", token.position));
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(position) => Err(FilterError::UnclosedParenthesis { position }),
        None => Ok(()),
    }
}
