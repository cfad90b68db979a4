//! Lucene-style query string parsing.
//!
//! Turns a boolean search expression into a [`Condition`] tree for a
//! matching engine to evaluate:
//!
//! - **Match**: `message: error` or `message: "disk full"`
//! - **Wildcards**: `host: web-*` or `code: E[0-9]?`
//! - **Regular expressions**: `path: /api\/v[12]/`
//! - **Ranges**: `status: [400 TO 500}`, `ts: ["2020-01-01T00:00:00Z" TO *]`
//! - **Numbers**: `status: 404` (an inclusive single-value range)
//! - **Boolean logic**: `AND`, `OR`, `NOT` (any case) and parentheses
//!
//! A backslash escapes the next character.
//!
//! # Example
//!
//! ```
//! use querystring::{Condition, parse};
//!
//! let cond = parse("level: error AND NOT (host: web-* OR status: [500 TO 599])").unwrap();
//! assert!(matches!(cond, Some(Condition::And { .. })));
//! ```

#![warn(missing_docs)]

mod classify;
mod condition;
mod error;
mod lexer;
mod options;
mod parser;
mod range;

pub use classify::{classify, new_string_condition};
pub use condition::{
    Condition, FieldableCondition, LeafCondition, MatchCondition, NumberRangeCondition,
    RegexPattern, RegexpCondition, TimeRangeCondition, WildcardCondition, WildcardPattern,
};
pub use error::{
    ClassifyError, LexError, OptionsError, ParseError, QueryError, QueryErrorKind, QueryIssue,
};
pub use lexer::{Spanned, Token, tokenize};
pub use options::ParseOptions;
pub use parser::{parse, parse_with};
pub use range::{Bound, build_range, number_range, time_range};
