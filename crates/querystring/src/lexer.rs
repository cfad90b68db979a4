//! Query lexer (tokenizer).
//!
//! Converts a query string into a stream of tokens for the parser. All
//! character-level rules live here: backslash escaping, quote stripping,
//! `/…/` regex delimiters and keyword recognition.

use std::{iter::Peekable, str::Chars};

use log::trace;

use crate::error::LexError;

/// A token in the query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier directly followed by `:` (e.g. `message` in `message: x`).
    Field(String),

    /// The `:` separating a field from its value.
    Colon,

    /// A bare literal, escapes resolved.
    Term(String),

    /// A quoted literal (the quotes are stripped, content preserved).
    Phrase(String),

    /// A `/…/` delimited literal, delimiters stripped. Always a regex.
    Regex(String),

    /// An unquoted base-10 integer literal.
    Number(String),

    /// The AND keyword.
    And,

    /// The OR keyword.
    Or,

    /// The NOT keyword.
    Not,

    /// The TO keyword inside ranges.
    To,

    /// Left parenthesis.
    LParen,

    /// Right parenthesis.
    RParen,

    /// `[`, inclusive range start.
    LBracket,

    /// `]`, inclusive range end.
    RBracket,

    /// `{`, exclusive range start.
    LBrace,

    /// `}`, exclusive range end.
    RBrace,
}

/// A token with the byte position where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte position in input.
    pub position: usize,
}

/// Tokenizes a query string.
struct Lexer<'a> {
    /// Character iterator with one-character lookahead.
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input.
    position: usize,
    /// Errors collected so far; lexing continues past them.
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            errors: Vec::new(),
        }
    }

    /// Records an error at a specific position.
    fn error_at(&mut self, message: impl Into<String>, position: usize) {
        self.errors.push(LexError::new(message, position));
    }

    /// Tokenizes the entire input, returning all tokens or every error found.
    fn tokenize(mut self) -> Result<Vec<Spanned>, Vec<LexError>> {
        let mut tokens = Vec::new();

        while let Some(spanned) = self.next_token() {
            trace!("token {:?} at {}", spanned.token, spanned.position);
            tokens.push(spanned);
        }

        if self.errors.is_empty() {
            Ok(tokens)
        } else {
            Err(self.errors)
        }
    }

    /// Returns the next token, or None if at end of input.
    fn next_token(&mut self) -> Option<Spanned> {
        loop {
            self.skip_whitespace();

            let &ch = self.chars.peek()?;
            let position = self.position;

            let token = match ch {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                ':' => self.single(Token::Colon),
                '"' => self.read_quoted(),
                '/' => self.read_regex(),
                c if c.is_control() => {
                    self.advance();
                    self.error_at(format!("unexpected character {c:?}"), position);
                    None
                }
                _ => self.read_word(),
            };

            if let Some(token) = token {
                return Some(Spanned { token, position });
            }
        }
    }

    /// Consumes one character and returns the given token.
    fn single(&mut self, token: Token) -> Option<Token> {
        self.advance();
        Some(token)
    }

    /// Reads a quoted literal.
    ///
    /// Escapes are resolved first; if the result is wrapped in slashes the
    /// literal is a regex, so `"/.*/"`, `"\/.*/"` and `/.*/` are equivalent.
    /// A literal backslash before the slash (`"\\/…/"`) keeps it a phrase.
    fn read_quoted(&mut self) -> Option<Token> {
        let start_pos = self.position;
        self.advance(); // consume opening quote

        let mut content = String::new();

        loop {
            match self.chars.peek() {
                Some(&'"') => {
                    self.advance(); // consume closing quote
                    break;
                }
                Some(&'\\') => {
                    self.advance();
                    let Some(&escaped) = self.chars.peek() else {
                        self.error_at("unclosed quote", start_pos);
                        return None;
                    };
                    content.push(escaped);
                    self.advance();
                }
                Some(&ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => {
                    self.error_at("unclosed quote", start_pos);
                    return None;
                }
            }
        }

        let is_regex = content.len() >= 2 && content.starts_with('/') && content.ends_with('/');

        if is_regex {
            Some(Token::Regex(content[1..content.len() - 1].to_string()))
        } else {
            Some(Token::Phrase(content))
        }
    }

    /// Reads an unquoted `/…/` regex literal.
    ///
    /// Inside the delimiters only `\/` is unescaped; every other backslash
    /// sequence is passed through for the regex engine.
    fn read_regex(&mut self) -> Option<Token> {
        let start_pos = self.position;
        self.advance(); // consume opening slash

        let mut body = String::new();

        loop {
            match self.chars.peek() {
                Some(&'/') => {
                    self.advance(); // consume closing slash
                    return Some(Token::Regex(body));
                }
                Some(&'\\') => {
                    self.advance();
                    match self.chars.peek() {
                        Some(&'/') => body.push('/'),
                        Some(&ch) => {
                            body.push('\\');
                            body.push(ch);
                        }
                        None => continue,
                    }
                    self.advance();
                }
                Some(&ch) => {
                    body.push(ch);
                    self.advance();
                }
                None => {
                    self.error_at("unterminated regular expression", start_pos);
                    return None;
                }
            }
        }
    }

    /// Reads a field name, keyword, number or bare literal.
    fn read_word(&mut self) -> Option<Token> {
        let start_pos = self.position;
        let mut word = String::new();
        let mut escaped = false;
        // Open `[` classes inside the word, so `a[!b]` stays one literal.
        let mut class_depth = 0usize;

        while let Some(&ch) = self.chars.peek() {
            match ch {
                '\\' => {
                    self.advance();
                    let Some(&next) = self.chars.peek() else {
                        self.error_at("escape at end of input", start_pos);
                        return None;
                    };
                    word.push(next);
                    escaped = true;
                    self.advance();
                    continue;
                }
                '[' => class_depth += 1,
                ']' if class_depth > 0 => class_depth -= 1,
                c if c.is_whitespace() || c.is_control() => break,
                '(' | ')' | ']' | '{' | '}' | ':' | '"' => break,
                _ => {}
            }
            word.push(ch);
            self.advance();
        }

        if word.is_empty() {
            return None;
        }

        if self.chars.peek() == Some(&':') {
            return Some(Token::Field(word));
        }

        if escaped {
            return Some(Token::Term(word));
        }

        if word.eq_ignore_ascii_case("AND") {
            return Some(Token::And);
        }
        if word.eq_ignore_ascii_case("OR") {
            return Some(Token::Or);
        }
        if word.eq_ignore_ascii_case("NOT") {
            return Some(Token::Not);
        }
        if word == "TO" {
            return Some(Token::To);
        }
        if is_integer(&word) {
            return Some(Token::Number(word));
        }

        Some(Token::Term(word))
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Advances to the next character.
    fn advance(&mut self) {
        if let Some(ch) = self.chars.next() {
            self.position += ch.len_utf8();
        }
    }
}

/// Returns true for an optionally signed run of ASCII digits.
fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Tokenizes a query string.
///
/// Lexing continues past errors so that every problem in the input is
/// reported at once.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, Vec<LexError>> {
    Lexer::new(input).tokenize()
}
