//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr
//! or_expr     := and_expr (OR and_expr)*
//! and_expr    := clause ((AND)? clause)*
//! clause      := (NOT | '-' | '+')? primary
//! primary     := field_query | grouped | '*' (':' '*')? | value
//! field_query := TERM COLON (range | grouped | value)
//! value       := TERM | NUMBER | QUOTED (TILDE slop?)?
//! range       := ('[' | '{') bound TO bound (']' | '}')
//! bound       := '-'? NUMBER | '*'
//! grouped     := '(' or_expr ')'
//! ```
//!
//! Values are run through the field's analyzer: one token becomes a term
//! query, several tokens a phrase.

use super::lexer::{Lexer, Token};
use crate::config::DEFAULT_SEARCH_FIELD;
use crate::error::{LucaError, Result};
use crate::query::ast::Query;
use crate::tokenizer::AnalyzerRegistry;

/// How adjacent clauses without an operator combine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultOperator {
    And,
    #[default]
    Or,
}

enum Occur {
    Plain,
    Required,
    Excluded,
}

/// Parser for Lucene-style query strings
pub struct QueryStringParser<'a> {
    lexer: Lexer,
    current_token: Token,
    analyzers: &'a AnalyzerRegistry,
    /// Default field for unqualified terms
    default_field: String,
    default_operator: DefaultOperator,
}

impl<'a> QueryStringParser<'a> {
    pub fn new(input: &str, analyzers: &'a AnalyzerRegistry) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            analyzers,
            default_field: DEFAULT_SEARCH_FIELD.to_string(),
            default_operator: DefaultOperator::Or,
        })
    }

    /// Set the default field for unqualified terms
    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = field.into();
        self
    }

    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Parse the query string into a query tree
    pub fn parse(&mut self) -> Result<Query> {
        if self.current_token == Token::Eof {
            return Err(LucaError::InvalidQuery("empty query".to_string()));
        }
        let query = self.parse_or_expr()?;

        if self.current_token != Token::Eof {
            return Err(LucaError::InvalidQuery(format!(
                "unexpected {:?} at position {}",
                self.current_token,
                self.lexer.position()
            )));
        }
        Ok(query)
    }

    /// or_expr := and_expr (OR and_expr)*
    fn parse_or_expr(&mut self) -> Result<Query> {
        let mut clauses = vec![self.parse_and_expr()?];
        while self.current_token == Token::Or {
            self.advance()?;
            clauses.push(self.parse_and_expr()?);
        }
        clauses.retain(|q| !matches_nothing(q));

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Query::or(clauses),
        })
    }

    /// and_expr := clause ((AND)? clause)*
    ///
    /// Clauses next to an explicit AND are required; other plain clauses
    /// follow the default operator.
    fn parse_and_expr(&mut self) -> Result<Query> {
        let mut clauses = vec![self.parse_clause()?];
        let mut joined_by_and = vec![false];

        loop {
            if self.current_token == Token::And {
                self.advance()?;
                clauses.push(self.parse_clause()?);
                joined_by_and.push(true);
            } else if self.is_start_of_clause() {
                clauses.push(self.parse_clause()?);
                joined_by_and.push(false);
            } else {
                break;
            }
        }

        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        for (i, (occur, query)) in clauses.into_iter().enumerate() {
            if matches_nothing(&query) {
                continue;
            }
            let next_is_and = joined_by_and.get(i + 1).copied().unwrap_or(false);
            match occur {
                Occur::Excluded => must_not.push(query),
                Occur::Required => must.push(query),
                Occur::Plain
                    if joined_by_and[i]
                        || next_is_and
                        || self.default_operator == DefaultOperator::And =>
                {
                    must.push(query)
                }
                Occur::Plain => should.push(query),
            }
        }

        if must_not.is_empty() {
            if must.len() == 1 && should.is_empty() {
                return Ok(must.remove(0));
            }
            if must.is_empty() && should.len() == 1 {
                return Ok(should.remove(0));
            }
        }
        Ok(Query::Bool {
            must,
            should,
            must_not,
        })
    }

    /// clause := (NOT | '-' | '+')? primary
    fn parse_clause(&mut self) -> Result<(Occur, Query)> {
        let occur = match self.current_token {
            Token::Not | Token::Minus => {
                self.advance()?;
                Occur::Excluded
            }
            Token::Plus => {
                self.advance()?;
                Occur::Required
            }
            _ => Occur::Plain,
        };
        Ok((occur, self.parse_primary()?))
    }

    fn parse_primary(&mut self) -> Result<Query> {
        match self.current_token.clone() {
            Token::LeftParen => self.parse_group(),
            Token::Term(term) => {
                self.advance()?;
                if self.current_token == Token::Colon {
                    self.advance()?;
                    self.parse_field_value(&term)
                } else {
                    let field = self.default_field.clone();
                    self.reject_fuzzy()?;
                    Ok(self.analyzed(&field, &term, 0))
                }
            }
            Token::Asterisk => {
                self.advance()?;
                if self.current_token == Token::Colon {
                    self.advance()?;
                    self.expect(Token::Asterisk)?;
                }
                Ok(Query::MatchAll)
            }
            Token::QuotedString(_) | Token::Number(_) => {
                let field = self.default_field.clone();
                self.parse_value(&field)
            }
            other => Err(LucaError::InvalidQuery(format!(
                "unexpected {:?} at position {}",
                other,
                self.lexer.position()
            ))),
        }
    }

    fn parse_field_value(&mut self, field: &str) -> Result<Query> {
        match self.current_token {
            Token::LeftBracket | Token::LeftBrace => self.parse_range(field),
            Token::LeftParen => {
                // field:(a OR b) applies the field to every unqualified term inside
                let saved = std::mem::replace(&mut self.default_field, field.to_string());
                let inner = self.parse_group();
                self.default_field = saved;
                inner
            }
            _ => self.parse_value(field),
        }
    }

    /// value := TERM | NUMBER | QUOTED (TILDE slop?)?
    fn parse_value(&mut self, field: &str) -> Result<Query> {
        match self.current_token.clone() {
            Token::Term(text) => {
                self.advance()?;
                self.reject_fuzzy()?;
                Ok(self.analyzed(field, &text, 0))
            }
            Token::Number(n) => {
                self.advance()?;
                Ok(self.analyzed(field, &n.to_string(), 0))
            }
            Token::QuotedString(text) => {
                self.advance()?;
                let slop = match self.current_token {
                    Token::Tilde(slop) => {
                        self.advance()?;
                        slop.unwrap_or(0)
                    }
                    _ => 0,
                };
                Ok(self.analyzed(field, &text, slop))
            }
            other => Err(LucaError::InvalidQuery(format!(
                "expected a value for field {field}, found {other:?}"
            ))),
        }
    }

    /// range := ('[' | '{') bound TO bound (']' | '}')
    fn parse_range(&mut self, field: &str) -> Result<Query> {
        let include_lower = self.current_token == Token::LeftBracket;
        self.advance()?;
        let lower = self.parse_bound()?;
        self.expect(Token::To)?;
        let upper = self.parse_bound()?;

        let include_upper = match self.current_token {
            Token::RightBracket => true,
            Token::RightBrace => false,
            ref other => {
                return Err(LucaError::InvalidQuery(format!(
                    "expected ']' or '}}' to close range on {field}, found {other:?}"
                )))
            }
        };
        self.advance()?;

        Ok(Query::Range {
            field: field.to_string(),
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }

    fn parse_bound(&mut self) -> Result<Option<i64>> {
        let negative = if self.current_token == Token::Minus {
            self.advance()?;
            true
        } else {
            false
        };
        let bound = match self.current_token {
            Token::Number(n) => Some(if negative { -n } else { n }),
            // i64::MIN has no positive counterpart, so the lexer leaves it a term
            Token::Term(ref digits) if digits.bytes().all(|b| b.is_ascii_digit()) => {
                let text = if negative {
                    format!("-{digits}")
                } else {
                    digits.clone()
                };
                match text.parse::<i64>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        return Err(LucaError::InvalidQuery(format!(
                            "range bound {text} does not fit in a 64-bit integer"
                        )))
                    }
                }
            }
            Token::Asterisk if !negative => None,
            ref other => {
                return Err(LucaError::InvalidQuery(format!(
                    "range bounds must be integers or '*', found {other:?}"
                )))
            }
        };
        self.advance()?;
        Ok(bound)
    }

    fn parse_group(&mut self) -> Result<Query> {
        self.expect(Token::LeftParen)?;
        let expr = self.parse_or_expr()?;
        self.expect(Token::RightParen)?;
        Ok(expr)
    }

    /// Turn a raw value into a term or phrase query using the field's analyzer
    fn analyzed(&self, field: &str, text: &str, slop: u32) -> Query {
        let tokens: Vec<_> = self.analyzers.for_field(field).analyze(text).collect();
        match tokens.as_slice() {
            [] => nothing(),
            [single] => Query::term(field, single.text.as_str()),
            [first, .., last] => {
                // Positions removed by the analyzer (stopwords) widen the slop
                let gaps = (last.position - first.position) as usize + 1 - tokens.len();
                Query::Phrase {
                    field: field.to_string(),
                    terms: tokens.iter().map(|t| t.text.clone()).collect(),
                    slop: slop + gaps as u32,
                }
            }
        }
    }

    fn reject_fuzzy(&self) -> Result<()> {
        if matches!(self.current_token, Token::Tilde(_)) {
            return Err(LucaError::InvalidQuery(
                "fuzzy term queries are not supported".to_string(),
            ));
        }
        Ok(())
    }

    fn is_start_of_clause(&self) -> bool {
        matches!(
            self.current_token,
            Token::Term(_)
                | Token::QuotedString(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::Asterisk
                | Token::Not
                | Token::Minus
                | Token::Plus
        )
    }

    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current_token != expected {
            return Err(LucaError::InvalidQuery(format!(
                "expected {:?}, found {:?} at position {}",
                expected,
                self.current_token,
                self.lexer.position()
            )));
        }
        self.advance()
    }
}

/// A query with no clauses; matches no document
fn nothing() -> Query {
    Query::Bool {
        must: Vec::new(),
        should: Vec::new(),
        must_not: Vec::new(),
    }
}

fn matches_nothing(query: &Query) -> bool {
    matches!(query, Query::Bool { must, should, must_not }
        if must.is_empty() && should.is_empty() && must_not.is_empty())
}
