//! Range construction.
//!
//! Numeric bounds are parsed as base-10 `i64` when the range is built.
//! Temporal bounds are kept as written.

use crate::{
    condition::{LeafCondition, NumberRangeCondition, TimeRangeCondition},
    error::ParseError,
};

/// One side of a range as it appeared in the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    /// `*`: no limit on this side.
    Unbounded,
    /// An unquoted integer literal.
    Number(String),
    /// A quoted timestamp literal.
    Time(String),
}

/// Builds a numeric range from optional integer literals.
pub fn number_range(
    start: Option<&str>,
    end: Option<&str>,
    include_start: bool,
    include_end: bool,
) -> Result<NumberRangeCondition, ParseError> {
    Ok(NumberRangeCondition::new(
        start.map(parse_int).transpose()?,
        end.map(parse_int).transpose()?,
        include_start,
        include_end,
    ))
}

/// Builds a temporal range. The bounds are not validated.
pub fn time_range(
    start: Option<&str>,
    end: Option<&str>,
    include_start: bool,
    include_end: bool,
) -> TimeRangeCondition {
    TimeRangeCondition::new(
        start.map(str::to_string),
        end.map(str::to_string),
        include_start,
        include_end,
    )
}

/// Builds the range leaf for a pair of bounds.
///
/// Two numbers (or `*`) make a numeric range; a timestamp on either side
/// makes a temporal one. `[* TO *]` is numeric. Mixing a number with a
/// timestamp is an error.
pub fn build_range(
    start: &Bound,
    end: &Bound,
    include_start: bool,
    include_end: bool,
) -> Result<LeafCondition, ParseError> {
    match (start, end) {
        (Bound::Number(_), Bound::Time(_)) | (Bound::Time(_), Bound::Number(_)) => {
            Err(ParseError::syntax(
                "range bounds mix a number and a timestamp",
                None,
            ))
        }
        (Bound::Time(_), _) | (_, Bound::Time(_)) => Ok(LeafCondition::TimeRange(time_range(
            start.as_time(),
            end.as_time(),
            include_start,
            include_end,
        ))),
        _ => Ok(LeafCondition::NumberRange(number_range(
            start.as_number(),
            end.as_number(),
            include_start,
            include_end,
        )?)),
    }
}

impl Bound {
    /// The literal if this is a number bound.
    fn as_number(&self) -> Option<&str> {
        match self {
            Self::Number(s) => Some(s),
            _ => None,
        }
    }

    /// The literal if this is a timestamp bound.
    fn as_time(&self) -> Option<&str> {
        match self {
            Self::Time(s) => Some(s),
            _ => None,
        }
    }
}

/// Parses a base-10 `i64`.
fn parse_int(literal: &str) -> Result<i64, ParseError> {
    literal
        .parse::<i64>()
        .map_err(|e| ParseError::number(literal, e))
}
