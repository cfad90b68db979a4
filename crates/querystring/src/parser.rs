//! Query parser.
//!
//! Parses a token stream into a condition tree using recursive descent.
//!
//! # Grammar
//!
//! ```text
//! query      → or_expr | ε
//! or_expr    → and_expr ("OR" and_expr)*
//! and_expr   → not_expr ("AND" not_expr)*
//! not_expr   → "NOT" not_expr | primary
//! primary    → "(" or_expr ")" | FIELD ":" value
//! value      → TERM | PHRASE | REGEX | NUMBER | range
//! range      → ("[" | "{") bound "TO" bound ("]" | "}")
//! bound      → NUMBER | PHRASE | "*"
//! ```
//!
//! # Precedence (highest to lowest)
//!
//! 1. Grouping: `(...)`
//! 2. Field value: `field: value`
//! 3. NOT
//! 4. AND
//! 5. OR
//!
//! AND and OR are left-associative.
//!
//! Every group, NOT and AND/OR link adds a level to the tree; queries deeper
//! than `MAX_DEPTH` levels are rejected with a syntax error.

use std::mem;

use log::{debug, trace};

use crate::{
    classify::classify_in_reduction,
    condition::{Condition, FieldableCondition, LeafCondition},
    error::{ParseError, QueryError},
    lexer::{Spanned, Token, tokenize},
    options::ParseOptions,
    range::{self, Bound},
};

/// Deepest condition tree a query may produce.
const MAX_DEPTH: usize = 512;

/// Recursive descent parser for query expressions.
struct Parser<'o> {
    /// Token stream to parse.
    tokens: Vec<Spanned>,
    /// Current position in token stream.
    position: usize,
    /// Byte length of the input, reported for errors at end of query.
    input_len: usize,
    /// Options for value classification.
    options: &'o ParseOptions,
    /// Tree levels open above the current token.
    depth: usize,
}

impl<'o> Parser<'o> {
    /// Creates a new parser from a token stream.
    fn new(tokens: Vec<Spanned>, input_len: usize, options: &'o ParseOptions) -> Self {
        Self {
            tokens,
            position: 0,
            input_len,
            options,
            depth: 0,
        }
    }

    /// Parses the token stream into a condition.
    fn parse(mut self) -> Result<Option<Condition>, ParseError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let condition = self.parse_or_expr()?;

        if let Some(token) = self.peek() {
            return Err(ParseError::syntax(
                format!("unexpected {}", describe(token)),
                Some(self.byte_position()),
            ));
        }

        Ok(Some(condition))
    }

    /// Parses: or_expr → and_expr ("OR" and_expr)*
    fn parse_or_expr(&mut self) -> Result<Condition, ParseError> {
        let base = self.depth;
        let mut left = self.parse_and_expr()?;

        while self.check(&Token::Or) {
            self.descend()?;
            self.advance(); // consume OR
            let right = self.parse_and_expr()?;
            trace!("reduce OR");
            left = Condition::or(left, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parses: and_expr → not_expr ("AND" not_expr)*
    fn parse_and_expr(&mut self) -> Result<Condition, ParseError> {
        let base = self.depth;
        let mut left = self.parse_not_expr()?;

        while self.check(&Token::And) {
            self.descend()?;
            self.advance(); // consume AND
            let right = self.parse_not_expr()?;
            trace!("reduce AND");
            left = Condition::and(left, right);
        }

        self.depth = base;
        Ok(left)
    }

    /// Parses: not_expr → "NOT" not_expr | primary
    fn parse_not_expr(&mut self) -> Result<Condition, ParseError> {
        if self.check(&Token::Not) {
            self.descend()?;
            self.advance(); // consume NOT
            let inner = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(Condition::not(inner));
        }

        self.parse_primary()
    }

    /// Parses: primary → "(" or_expr ")" | FIELD ":" value
    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        let position = self.byte_position();
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.descend()?;
                self.advance(); // consume (
                let inner = self.parse_or_expr()?;
                self.expect(&Token::RParen, "expected closing parenthesis")?;
                self.depth -= 1;
                Ok(inner)
            }

            Some(Token::Field(name)) => {
                self.advance();
                self.expect(&Token::Colon, "expected ':' after field name")?;
                let mut leaf = self.parse_value()?;
                leaf.set_field(name);
                trace!("reduce leaf {leaf:?}");
                Ok(leaf.into())
            }

            Some(Token::Colon) => Err(ParseError::syntax(
                "expected field name before ':'",
                Some(position),
            )),

            Some(Token::RParen) => Err(ParseError::syntax(
                "unexpected closing parenthesis",
                Some(position),
            )),

            Some(token @ (Token::And | Token::Or)) => Err(ParseError::syntax(
                format!("unexpected {} (needs expression before it)", describe(&token)),
                Some(position),
            )),

            Some(
                token @ (Token::Term(_) | Token::Phrase(_) | Token::Regex(_) | Token::Number(_)),
            ) => Err(ParseError::syntax(
                format!("missing field name for {}", describe(&token)),
                Some(position),
            )),

            Some(token) => Err(ParseError::syntax(
                format!("unexpected {}", describe(&token)),
                Some(position),
            )),

            None => Err(ParseError::syntax("unexpected end of query", Some(position))),
        }
    }

    /// Parses the value after `field:` into a field-less leaf.
    fn parse_value(&mut self) -> Result<LeafCondition, ParseError> {
        let position = self.byte_position();
        let leaf = match self.peek().cloned() {
            Some(Token::Term(text) | Token::Phrase(text)) => {
                classify_in_reduction(&text, false, self.options, position)?
            }
            Some(Token::Regex(text)) => classify_in_reduction(&text, true, self.options, position)?,
            Some(Token::Number(text)) => LeafCondition::NumberRange(
                range::number_range(Some(&text), Some(&text), true, true)
                    .map_err(|e| e.at(position))?,
            ),
            Some(Token::LBracket | Token::LBrace) => return self.parse_range(),
            Some(token) => {
                return Err(ParseError::syntax(
                    format!("expected value after ':', found {}", describe(&token)),
                    Some(position),
                ));
            }
            None => {
                return Err(ParseError::syntax(
                    "expected value after ':'",
                    Some(position),
                ));
            }
        };
        self.advance();
        Ok(leaf)
    }

    /// Parses: range → ("[" | "{") bound "TO" bound ("]" | "}")
    fn parse_range(&mut self) -> Result<LeafCondition, ParseError> {
        let position = self.byte_position();
        let include_start = self.check(&Token::LBracket);
        self.advance(); // consume [ or {

        let start = self.parse_bound()?;
        self.expect(&Token::To, "expected TO in range")?;
        let end = self.parse_bound()?;

        let include_end = match self.peek() {
            Some(Token::RBracket) => true,
            Some(Token::RBrace) => false,
            _ => {
                return Err(ParseError::syntax(
                    "expected ']' or '}' to close range",
                    Some(self.byte_position()),
                ));
            }
        };
        self.advance();

        range::build_range(&start, &end, include_start, include_end).map_err(|e| e.at(position))
    }

    /// Parses one range bound.
    fn parse_bound(&mut self) -> Result<Bound, ParseError> {
        let bound = match self.peek() {
            Some(Token::Number(text)) => Bound::Number(text.clone()),
            Some(Token::Phrase(text)) => Bound::Time(text.clone()),
            Some(Token::Term(text)) if text == "*" => Bound::Unbounded,
            Some(token) => {
                return Err(ParseError::syntax(
                    format!(
                        "invalid range bound {} (expected a number, quoted timestamp or *)",
                        describe(token)
                    ),
                    Some(self.byte_position()),
                ));
            }
            None => {
                return Err(ParseError::syntax(
                    "unexpected end of query in range",
                    Some(self.byte_position()),
                ));
            }
        };
        self.advance();
        Ok(bound)
    }

    /// Opens one tree level, failing once the query is too deep.
    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::syntax(
                format!("query nested too deeply (more than {MAX_DEPTH} levels)"),
                Some(self.byte_position()),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Consumes the expected token or fails with `message`.
    fn expect(&mut self, token: &Token, message: &str) -> Result<(), ParseError> {
        if !self.check(token) {
            return Err(ParseError::syntax(message, Some(self.byte_position())));
        }
        self.advance();
        Ok(())
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }

    /// Byte position of the current token, or the input length at the end.
    fn byte_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .map_or(self.input_len, |s| s.position)
    }

    /// Checks if the current token matches the given token.
    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|t| mem::discriminant(t) == mem::discriminant(token))
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Describes a token for error messages.
fn describe(token: &Token) -> String {
    match token {
        Token::Field(s) => format!("field '{s}'"),
        Token::Colon => "':'".to_string(),
        Token::Term(s) | Token::Number(s) => format!("value '{s}'"),
        Token::Phrase(s) => format!("value \"{s}\""),
        Token::Regex(s) => format!("regular expression /{s}/"),
        Token::And => "AND".to_string(),
        Token::Or => "OR".to_string(),
        Token::Not => "NOT".to_string(),
        Token::To => "TO".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::LBrace => "'{'".to_string(),
        Token::RBrace => "'}'".to_string(),
    }
}

/// Parses a query string with default options.
///
/// Returns `Ok(None)` for empty queries, `Ok(Some(condition))` for valid
/// queries, or `Err(QueryError)` listing every problem found.
pub fn parse(query: &str) -> Result<Option<Condition>, QueryError> {
    parse_with(query, &ParseOptions::default())
}

/// Parses a query string into a condition tree.
///
/// All working state is local to the call. Lexer errors are reported
/// together; a grammar or construction fault stops the parse and is
/// reported on its own. No partial tree is ever returned.
pub fn parse_with(query: &str, options: &ParseOptions) -> Result<Option<Condition>, QueryError> {
    if query.is_empty() {
        return Ok(None);
    }

    let tokens = tokenize(query).map_err(|errors| {
        debug!("rejected query {query:?}: {} lexical error(s)", errors.len());
        QueryError::lex(query, errors)
    })?;

    let condition = Parser::new(tokens, query.len(), options)
        .parse()
        .map_err(|error| {
            debug!("rejected query {query:?}: {error}");
            QueryError::parse(query, error)
        })?;

    debug!("parsed query {query:?}");
    Ok(condition)
}
