//! Lexer (tokenizer) for query expressions.

use std::iter::Peekable;
use std::str::Chars;

use super::error::{FilterError, FilterResult};

/// A token with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedToken {
    /// The token.
    pub token: QueryToken,
    /// The byte position where the token starts (0-indexed).
    pub position: usize,
}

/// A token in a query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    /// An unquoted run of characters: function names, field paths and
    /// literals such as `true`, `42` or `T1`.
    Word(String),

    /// A single- or double-quoted string with escapes resolved.
    Quoted(String),

    /// Opening parenthesis `(`.
    OpenParen,

    /// Closing parenthesis `)`.
    CloseParen,

    /// Argument separator `,`.
    Comma,
}

impl QueryToken {
    /// Returns the token as it would appear in the source.
    pub fn text(&self) -> String {
        match self {
            QueryToken::Word(w) => w.clone(),
            QueryToken::Quoted(s) => format!("\"{s}\""),
            QueryToken::OpenParen => "(".to_string(),
            QueryToken::CloseParen => ")".to_string(),
            QueryToken::Comma => ",".to_string(),
        }
    }
}

/// Lexer for tokenizing query expressions.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    /// Current byte position in the input string.
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.position += ch.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.peek() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn is_word_boundary(c: char) -> bool {
        c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"' | '\'')
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.peek() {
            if Self::is_word_boundary(c) {
                break;
            }
            word.push(c);
            self.next_char();
        }
        word
    }

    /// Reads a quoted string. The opening quote has not been consumed yet.
    fn read_quoted(&mut self, quote: char) -> FilterResult<String> {
        let start = self.position;
        self.next_char();

        let mut result = String::new();
        loop {
            match self.next_char() {
                Some(c) if c == quote => return Ok(result),
                Some('\\') => match self.next_char() {
                    Some(escaped) => result.push(escaped),
                    None => break,
                },
                Some(c) => result.push(c),
                None => break,
            }
        }
        Err(FilterError::UnterminatedString { position: start })
    }

    /// Returns the next token with its position, or None at end of input.
    pub fn next_token(&mut self) -> FilterResult<Option<PositionedToken>> {
        self.skip_whitespace();

        let Some(&c) = self.peek() else {
            return Ok(None);
        };
        let position = self.position;

        let token = match c {
            '(' => {
                self.next_char();
                QueryToken::OpenParen
            }
            ')' => {
                self.next_char();
                QueryToken::CloseParen
            }
            ',' => {
                self.next_char();
                QueryToken::Comma
            }
            '"' | '\'' => QueryToken::Quoted(self.read_quoted(c)?),
            _ => QueryToken::Word(self.read_word()),
        };

        Ok(Some(PositionedToken { token, position }))
    }

    /// Collects all tokens, failing on the first lexical error.
    pub fn tokenize(mut self) -> FilterResult<Vec<PositionedToken>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<QueryToken> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|pt| pt.token)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            tokens("eq(is_active,true)"),
            vec![
                QueryToken::Word("eq".into()),
                QueryToken::OpenParen,
                QueryToken::Word("is_active".into()),
                QueryToken::Comma,
                QueryToken::Word("true".into()),
                QueryToken::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_whitespace() {
        assert_eq!(
            tokens("  eq ( name , x )  "),
            vec![
                QueryToken::Word("eq".into()),
                QueryToken::OpenParen,
                QueryToken::Word("name".into()),
                QueryToken::Comma,
                QueryToken::Word("x".into()),
                QueryToken::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_keeps_grammar_characters() {
        assert_eq!(
            tokens(r#""a,(b)""#),
            vec![QueryToken::Quoted("a,(b)".into())]
        );
        assert_eq!(tokens("'T1'"), vec![QueryToken::Quoted("T1".into())]);
    }

    #[test]
    fn test_tokenize_quoted_escapes() {
        assert_eq!(
            tokens(r#""say \"hi\"""#),
            vec![QueryToken::Quoted("say \"hi\"".into())]
        );
    }

    #[test]
    fn test_tokenize_dotted_field_and_unicode() {
        assert_eq!(
            tokens("tenant.code,Nguyễn"),
            vec![
                QueryToken::Word("tenant.code".into()),
                QueryToken::Comma,
                QueryToken::Word("Nguyễn".into()),
            ]
        );
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let result = Lexer::new("eq(đ,x)").tokenize().unwrap();
        let positions: Vec<usize> = result.iter().map(|pt| pt.position).collect();
        // 'đ' is two bytes wide.
        assert_eq!(positions, vec![0, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new(r#"eq(name,"abc)"#).tokenize().unwrap_err();
        assert_eq!(err, FilterError::UnterminatedString { position: 8 });
    }
}
