//! Lexer for query string syntax
//!
//! Tokenizes Lucene-style query strings into a stream of tokens.

use crate::error::{LucaError, Result};

/// Token types for query string parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A term (unquoted word)
    Term(String),
    /// A quoted string (phrase)
    QuotedString(String),
    /// An unsigned integer
    Number(i64),

    /// AND operator
    And,
    /// OR operator
    Or,
    /// NOT operator
    Not,
    /// Colon separator (field:value)
    Colon,
    /// Asterisk, only meaningful in `*:*`
    Asterisk,
    /// Tilde with optional phrase slop
    Tilde(Option<u32>),

    /// Left square bracket (inclusive range start)
    LeftBracket,
    /// Right square bracket (inclusive range end)
    RightBracket,
    /// Left curly brace (exclusive range start)
    LeftBrace,
    /// Right curly brace (exclusive range end)
    RightBrace,
    /// TO keyword for ranges
    To,

    /// Left parenthesis (grouping)
    LeftParen,
    /// Right parenthesis (grouping)
    RightParen,

    /// Plus sign (required clause)
    Plus,
    /// Minus sign (excluded clause)
    Minus,

    /// End of input
    Eof,
}

/// Lexer for tokenizing query strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        if self.position >= self.input.len() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();
        let simple = match ch {
            ':' => Some(Token::Colon),
            '*' => Some(Token::Asterisk),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            _ => None,
        };
        if let Some(token) = simple {
            self.advance();
            return Ok(token);
        }

        match ch {
            '~' => {
                self.advance();
                Ok(Token::Tilde(self.read_unsigned_int()))
            }
            '"' => {
                self.advance();
                self.read_quoted_string()
            }
            _ if Self::is_term_char(ch) => Ok(self.read_term()),
            _ => Err(LucaError::InvalidQuery(format!(
                "unexpected character at position {}: '{}'",
                self.position, ch
            ))),
        }
    }

    /// Peek at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<Token> {
        let saved_position = self.position;
        let token = self.next_token()?;
        self.position = saved_position;
        Ok(token)
    }

    /// Position of the next unread character
    pub fn position(&self) -> usize {
        self.position
    }

    fn read_term(&mut self) -> Token {
        let mut term = String::new();
        while self.position < self.input.len() && Self::is_term_char(self.current_char()) {
            term.push(self.current_char());
            self.advance();
        }

        // Operators are upper case only so that "and" stays searchable
        match term.as_str() {
            "AND" | "&&" => Token::And,
            "OR" | "||" => Token::Or,
            "NOT" => Token::Not,
            "TO" => Token::To,
            _ if term.bytes().all(|b| b.is_ascii_digit()) => match term.parse() {
                Ok(n) => Token::Number(n),
                Err(_) => Token::Term(term),
            },
            _ => Token::Term(term),
        }
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let mut s = String::new();

        while self.position < self.input.len() {
            let ch = self.current_char();
            self.advance();
            match ch {
                '"' => return Ok(Token::QuotedString(s)),
                '\\' if self.position < self.input.len() => {
                    s.push(self.current_char());
                    self.advance();
                }
                _ => s.push(ch),
            }
        }

        Err(LucaError::InvalidQuery("unterminated quoted string".to_string()))
    }

    fn read_unsigned_int(&mut self) -> Option<u32> {
        let mut num_str = String::new();
        while self.position < self.input.len() && self.current_char().is_ascii_digit() {
            num_str.push(self.current_char());
            self.advance();
        }
        num_str.parse().ok()
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Check if a character can be part of a term
    fn is_term_char(ch: char) -> bool {
        ch.is_alphanumeric()
            || matches!(ch, '_' | '-' | '.' | '/' | '@' | '#' | '&' | '|' | '\'')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    fn term(s: &str) -> Token {
        Token::Term(s.to_string())
    }

    #[test]
    fn test_field_value() {
        assert_eq!(tokens("title:rust"), vec![term("title"), Token::Colon, term("rust")]);
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(
            tokens("a AND b OR c NOT d && e"),
            vec![
                term("a"),
                Token::And,
                term("b"),
                Token::Or,
                term("c"),
                Token::Not,
                term("d"),
                Token::And,
                term("e"),
            ]
        );
    }

    #[test]
    fn test_lowercase_words_are_terms() {
        assert_eq!(tokens("cats and dogs"), vec![term("cats"), term("and"), term("dogs")]);
    }

    #[test]
    fn test_quoted_string_escaped() {
        assert_eq!(
            tokens("\"hello \\\"world\\\"\"~3"),
            vec![
                Token::QuotedString("hello \"world\"".to_string()),
                Token::Tilde(Some(3))
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"unterminated");
        assert!(matches!(lexer.next_token(), Err(LucaError::InvalidQuery(_))));
    }

    #[test]
    fn test_range() {
        assert_eq!(
            tokens("modified:{10 TO 20]"),
            vec![
                term("modified"),
                Token::Colon,
                Token::LeftBrace,
                Token::Number(10),
                Token::To,
                Token::Number(20),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_minus_before_number() {
        assert_eq!(tokens("-10"), vec![Token::Minus, Token::Number(10)]);
    }

    #[test]
    fn test_path_like_term() {
        assert_eq!(
            tokens("path:docs/a-b.txt 2024-01-15"),
            vec![term("path"), Token::Colon, term("docs/a-b.txt"), term("2024-01-15")]
        );
    }

    #[test]
    fn test_match_all() {
        assert_eq!(tokens("*:*"), vec![Token::Asterisk, Token::Colon, Token::Asterisk]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("(a)");
        assert_eq!(lexer.peek_token().unwrap(), Token::LeftParen);
        assert_eq!(lexer.next_token().unwrap(), Token::LeftParen);
        assert_eq!(lexer.position(), 1);
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("a ^ b");
        lexer.next_token().unwrap();
        assert!(lexer.next_token().is_err());
    }
}
