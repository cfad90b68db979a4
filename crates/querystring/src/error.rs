//! Error types for query lexing, parsing and option loading.
//!
//! Every layer reports its own error type; [`QueryError`] is the single
//! aggregated value returned from [`parse`](crate::parse).

use std::{error::Error as StdError, fmt, io, path::PathBuf};

use thiserror::Error;
use toml::de;

/// The category of a problem found in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Tokenization failed (unterminated quote, unknown character).
    Lexical,
    /// The token stream does not form a valid query.
    Syntax,
    /// A regular expression or wildcard pattern failed to compile.
    PatternCompile,
    /// A range bound is not a valid base-10 64-bit integer.
    NumericFormat,
}

impl QueryErrorKind {
    /// Short label used when rendering messages.
    fn label(self) -> &'static str {
        match self {
            Self::Lexical => "lexical error",
            Self::Syntax => "syntax error",
            Self::PatternCompile => "pattern error",
            Self::NumericFormat => "numeric format error",
        }
    }
}

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct LexError {
    /// Error message.
    pub message: String,
    /// Byte position in input where error occurred.
    pub position: usize,
}

impl LexError {
    /// Creates a new lexer error.
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A pattern that could not be compiled by the value classifier.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The regular expression is invalid.
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        /// The rejected pattern.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },

    /// The wildcard glob is invalid.
    #[error("invalid wildcard pattern '{pattern}': {source}")]
    InvalidWildcard {
        /// The rejected pattern.
        pattern: String,
        /// Underlying glob error.
        source: globset::Error,
    },
}

/// A fault raised while reducing the token stream.
///
/// Construction helpers return this from deep inside the grammar; it is
/// propagated unchanged to [`parse`](crate::parse), which turns it into a
/// [`QueryError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// What went wrong.
    pub kind: QueryErrorKind,
    /// Error message.
    pub message: String,
    /// Byte position in input of the offending token (if known).
    pub position: Option<usize>,
}

impl ParseError {
    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>, position: Option<usize>) -> Self {
        Self {
            kind: QueryErrorKind::Syntax,
            message: message.into(),
            position,
        }
    }

    /// Creates a numeric format error for a range bound literal.
    pub fn number(literal: &str, reason: impl fmt::Display) -> Self {
        Self {
            kind: QueryErrorKind::NumericFormat,
            message: format!("invalid integer '{literal}': {reason}"),
            position: None,
        }
    }

    /// Attaches a position if none is set yet.
    pub fn at(mut self, position: usize) -> Self {
        self.position.get_or_insert(position);
        self
    }
}

impl From<ClassifyError> for ParseError {
    fn from(err: ClassifyError) -> Self {
        Self {
            kind: QueryErrorKind::PatternCompile,
            message: err.to_string(),
            position: None,
        }
    }
}

/// One problem found in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIssue {
    /// The category of the problem.
    pub kind: QueryErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Byte position in the query (if known).
    pub position: Option<usize>,
}

impl fmt::Display for QueryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        if let Some(pos) = self.position {
            write!(f, " at position {pos}")?;
        }
        Ok(())
    }
}

impl From<LexError> for QueryIssue {
    fn from(err: LexError) -> Self {
        Self {
            kind: QueryErrorKind::Lexical,
            message: err.message,
            position: Some(err.position),
        }
    }
}

impl From<ParseError> for QueryIssue {
    fn from(err: ParseError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            position: err.position,
        }
    }
}

/// The aggregated failure of a single parse call.
///
/// Holds the original query and every problem that was collected. The
/// `Display` form lists one issue per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// The original query string.
    query: String,
    /// Collected issues, never empty.
    issues: Vec<QueryIssue>,
}

impl QueryError {
    /// Creates an error from a list of issues.
    pub(crate) fn new(query: &str, issues: Vec<QueryIssue>) -> Self {
        debug_assert!(!issues.is_empty());
        Self {
            query: query.to_string(),
            issues,
        }
    }

    /// Creates an error from lexer errors.
    pub(crate) fn lex(query: &str, errors: Vec<LexError>) -> Self {
        Self::new(query, errors.into_iter().map(QueryIssue::from).collect())
    }

    /// Creates an error from a grammar fault.
    pub(crate) fn parse(query: &str, error: ParseError) -> Self {
        Self::new(query, vec![QueryIssue::from(error)])
    }

    /// The query that failed to parse.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Every collected issue, in the order found.
    pub fn issues(&self) -> &[QueryIssue] {
        &self.issues
    }

    /// The kind of the first issue.
    pub fn kind(&self) -> QueryErrorKind {
        self.issues
            .first()
            .map_or(QueryErrorKind::Syntax, |issue| issue.kind)
    }

    /// Returns the first message without context.
    pub fn message(&self) -> &str {
        self.issues.first().map_or("", |issue| issue.message.as_str())
    }

    /// Formats the error with the query and a position indicator under the
    /// first positioned issue.
    pub fn format_with_context(&self) -> String {
        let mut result = self.to_string();
        result.push_str(&format!("\n  {}", self.query));
        if let Some(pos) = self.issues.iter().find_map(|issue| issue.position) {
            let clamped = pos.min(self.query.len());
            result.push_str(&format!("\n  {}^", " ".repeat(clamped)));
        }
        if let Some(hint) = self.suggestion() {
            result.push_str(&format!("\nhint: {hint}"));
        }
        result
    }

    /// Returns a suggestion for common errors.
    pub fn suggestion(&self) -> Option<&'static str> {
        let issue = self.issues.first()?;
        match issue.kind {
            QueryErrorKind::Lexical if issue.message.contains("unclosed quote") => {
                Some("Add a closing quote (\") to complete the value")
            }
            QueryErrorKind::Syntax if issue.message.contains("closing parenthesis") => {
                Some("Add a closing parenthesis ) to match the opening one")
            }
            QueryErrorKind::Syntax if issue.message.contains("expected TO") => {
                Some("Ranges are written as field: [start TO end]")
            }
            QueryErrorKind::Syntax if issue.message.contains("field name") => {
                Some("Values need a field, e.g. 'message: error'")
            }
            QueryErrorKind::PatternCompile => {
                Some("Escape special characters with a backslash or quote the value")
            }
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl StdError for QueryError {}

/// Errors that can occur when loading parse options.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to read an options file.
    #[error("failed to read options file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML options.
    #[error("failed to parse options: {source}")]
    ParseToml {
        /// Underlying TOML parse error.
        source: de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_issue_display() {
        let err = QueryError::lex("a: \"hello", vec![LexError::new("unclosed quote", 3)]);
        assert_eq!(err.to_string(), "lexical error: unclosed quote at position 3");
        assert_eq!(err.kind(), QueryErrorKind::Lexical);
    }

    #[test]
    fn issues_joined_by_newline() {
        let err = QueryError::lex(
            "a\u{1} b\u{2}",
            vec![
                LexError::new("unexpected character '\\u{1}'", 1),
                LexError::new("unexpected character '\\u{2}'", 4),
            ],
        );
        let display = err.to_string();
        assert_eq!(display.lines().count(), 2);
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn context_has_caret() {
        let err = QueryError::parse(
            "(a: b",
            ParseError::syntax("expected closing parenthesis", Some(5)),
        );
        let display = err.format_with_context();
        assert!(display.contains("expected closing parenthesis"));
        assert!(display.contains("  (a: b"));
        assert!(display.contains("     ^"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn caret_clamped_to_query() {
        let err = QueryError::parse("a", ParseError::syntax("boom", Some(40)));
        assert!(err.format_with_context().ends_with("  ^"));
    }

    #[test]
    fn at_keeps_first_position() {
        let err = ParseError::syntax("x", Some(2)).at(7);
        assert_eq!(err.position, Some(2));
        let err = ParseError::syntax("x", None).at(7);
        assert_eq!(err.position, Some(7));
    }

    #[test]
    fn number_error_names_literal() {
        let err = ParseError::number("99999999999999999999", "number too large");
        assert_eq!(err.kind, QueryErrorKind::NumericFormat);
        assert!(err.message.contains("99999999999999999999"));
    }

    #[test]
    fn message_extraction() {
        let err = QueryError::parse("q", ParseError::syntax("test message", None));
        assert_eq!(err.message(), "test message");
        assert_eq!(err.query(), "q");
        assert!(err.suggestion().is_none());
    }
}
