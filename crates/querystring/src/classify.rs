//! Value classification.
//!
//! Decides whether a literal is an exact match, a wildcard glob or a regular
//! expression, and builds the field-less leaf for it. The field is never
//! consulted here.

use log::trace;

use crate::{
    condition::{
        LeafCondition, MatchCondition, RegexPattern, RegexpCondition, WildcardCondition,
        WildcardPattern,
    },
    error::{ClassifyError, ParseError},
    options::ParseOptions,
};

/// Classifies a literal and builds its leaf condition.
///
/// First match wins:
///
/// 1. `forced_regex` (the literal was `/…/` delimited) compiles a regex.
/// 2. `*`, `?` or a `[...]` class compiles a wildcard, lower-cased first if
///    the options ask for it.
/// 3. Anything else is an exact match.
pub fn classify(
    literal: &str,
    forced_regex: bool,
    options: &ParseOptions,
) -> Result<LeafCondition, ClassifyError> {
    if forced_regex {
        trace!("classify {literal:?} as regexp");
        let pattern = RegexPattern::new(literal).map_err(|source| ClassifyError::InvalidRegex {
            pattern: literal.to_string(),
            source,
        })?;
        return Ok(LeafCondition::Regexp(RegexpCondition::new(pattern)));
    }

    if has_wildcard(literal) {
        trace!("classify {literal:?} as wildcard");
        let folded;
        let source = if options.lower_case_wildcard {
            folded = literal.to_lowercase();
            folded.as_str()
        } else {
            literal
        };
        let pattern =
            WildcardPattern::new(source).map_err(|source_err| ClassifyError::InvalidWildcard {
                pattern: source.to_string(),
                source: source_err,
            })?;
        return Ok(LeafCondition::Wildcard(WildcardCondition::new(pattern)));
    }

    Ok(LeafCondition::Match(MatchCondition::new(literal)))
}

/// Builds a leaf from a literal outside of a parse.
///
/// A literal wrapped in slashes (`/…/`) is taken as a regex with the
/// slashes removed; otherwise this behaves like [`classify`].
pub fn new_string_condition(
    literal: &str,
    options: &ParseOptions,
) -> Result<LeafCondition, ClassifyError> {
    match strip_slashes(literal) {
        Some(inner) => classify(inner, true, options),
        None => classify(literal, false, options),
    }
}

/// Grammar-side entry: a failed compile becomes a fault for the parse call.
pub(crate) fn classify_in_reduction(
    literal: &str,
    forced_regex: bool,
    options: &ParseOptions,
    position: usize,
) -> Result<LeafCondition, ParseError> {
    classify(literal, forced_regex, options).map_err(|e| ParseError::from(e).at(position))
}

/// Returns the body of a `/…/` literal.
fn strip_slashes(literal: &str) -> Option<&str> {
    if literal.len() < 2 {
        return None;
    }
    literal.strip_prefix('/')?.strip_suffix('/')
}

/// Returns true if the literal contains `*`, `?` or a bracket class such as
/// `[a-z]` or `[!0-9]`.
fn has_wildcard(literal: &str) -> bool {
    if literal.contains(['*', '?']) {
        return true;
    }

    let bytes = literal.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let class_len = bytes[i + 1..]
                .iter()
                .take_while(|&&b| b == b'-' || b == b'!' || b == b'_' || b.is_ascii_alphanumeric())
                .count();
            let close = i + 1 + class_len;
            if class_len > 0 && bytes.get(close) == Some(&b']') {
                return true;
            }
        }
        i += 1;
    }
    false
}
