//! Query condition tree.
//!
//! The AST handed to a matching engine. Leaf conditions are built without a
//! field and have it attached afterwards through [`FieldableCondition`].

use std::fmt;

use chrono::{DateTime, FixedOffset};
use globset::{Glob, GlobBuilder, GlobMatcher};
use regex::Regex;

/// A node of the query AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Both operands must match.
    And {
        /// Left operand.
        left: Box<Self>,
        /// Right operand.
        right: Box<Self>,
    },

    /// At least one operand must match.
    Or {
        /// Left operand.
        left: Box<Self>,
        /// Right operand.
        right: Box<Self>,
    },

    /// The inner condition must NOT match.
    Not(Box<Self>),

    /// Exact string equality.
    Match(MatchCondition),

    /// Regular expression match.
    Regexp(RegexpCondition),

    /// Wildcard glob match.
    Wildcard(WildcardCondition),

    /// Integer range.
    NumberRange(NumberRangeCondition),

    /// Timestamp range.
    TimeRange(TimeRangeCondition),
}

/// Access to the field a leaf condition applies to.
pub trait FieldableCondition {
    /// Returns the field name (empty until attached).
    fn field(&self) -> &str;

    /// Sets the field name.
    fn set_field(&mut self, field: String);

    /// Builder form of [`set_field`](Self::set_field).
    fn with_field(mut self, field: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.set_field(field.into());
        self
    }
}

/// Implements [`FieldableCondition`] for a leaf struct with a `field` member.
macro_rules! fieldable {
    ($($ty:ty),*) => {
        $(
            impl FieldableCondition for $ty {
                fn field(&self) -> &str {
                    &self.field
                }

                fn set_field(&mut self, field: String) {
                    self.field = field;
                }
            }
        )*
    };
}

fieldable!(
    MatchCondition,
    RegexpCondition,
    WildcardCondition,
    NumberRangeCondition,
    TimeRangeCondition
);

/// A compiled regular expression. Compares equal by source pattern.
#[derive(Clone)]
pub struct RegexPattern(Regex);

impl RegexPattern {
    /// Compiles a regular expression.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if the pattern matches anywhere in `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RegexPattern {}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexPattern").field(&self.as_str()).finish()
    }
}

/// A compiled wildcard glob. Compares equal by source pattern.
///
/// `*` and `?` cross `/`; a backslash escapes the next character. Escapes
/// of characters with no glob meaning are dropped from the stored source,
/// so `\/a*` and `/a*` are the same pattern.
#[derive(Clone)]
pub struct WildcardPattern {
    /// The parsed glob.
    glob: Glob,
    /// Matcher compiled from `glob`.
    matcher: GlobMatcher,
}

impl WildcardPattern {
    /// Compiles a wildcard glob.
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let glob = GlobBuilder::new(&normalize_glob(pattern))
            .literal_separator(false)
            .backslash_escape(true)
            .build()?;
        let matcher = glob.compile_matcher();
        Ok(Self { glob, matcher })
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.glob.glob()
    }

    /// Returns true if the whole of `candidate` matches the glob.
    pub fn matches(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for WildcardPattern {}

impl fmt::Debug for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WildcardPattern").field(&self.as_str()).finish()
    }
}

/// Drops backslashes in front of characters that mean nothing to a glob.
fn normalize_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(next @ ('*' | '?' | '[' | ']' | '{' | '}' | ',' | '!' | '-' | '\\')) => {
                out.push('\\');
                out.push(next);
            }
            Some(next) => out.push(next),
            None => out.push('\\'),
        }
    }
    out
}

/// Exact string equality on a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCondition {
    /// Field name.
    pub field: String,
    /// Expected value.
    pub value: String,
}

impl MatchCondition {
    /// Creates a match condition without a field.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            field: String::new(),
            value: value.into(),
        }
    }
}

/// Regular expression match on a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexpCondition {
    /// Field name.
    pub field: String,
    /// Compiled expression.
    pub pattern: RegexPattern,
}

impl RegexpCondition {
    /// Creates a regexp condition without a field.
    pub fn new(pattern: RegexPattern) -> Self {
        Self {
            field: String::new(),
            pattern,
        }
    }
}

/// Wildcard glob match on a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardCondition {
    /// Field name.
    pub field: String,
    /// Compiled glob.
    pub pattern: WildcardPattern,
}

impl WildcardCondition {
    /// Creates a wildcard condition without a field.
    pub fn new(pattern: WildcardPattern) -> Self {
        Self {
            field: String::new(),
            pattern,
        }
    }
}

/// Integer range on a field. A missing bound is unbounded.
///
/// `start <= end` is not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberRangeCondition {
    /// Field name.
    pub field: String,
    /// Lower bound.
    pub start: Option<i64>,
    /// Upper bound.
    pub end: Option<i64>,
    /// Whether `start` itself is in range.
    pub include_start: bool,
    /// Whether `end` itself is in range.
    pub include_end: bool,
}

impl NumberRangeCondition {
    /// Creates a range without a field.
    pub fn new(start: Option<i64>, end: Option<i64>, include_start: bool, include_end: bool) -> Self {
        Self {
            field: String::new(),
            start,
            end,
            include_start,
            include_end,
        }
    }
}

/// Timestamp range on a field.
///
/// Bounds are kept as written; use [`start_time`](Self::start_time) and
/// [`end_time`](Self::end_time) to read them as RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRangeCondition {
    /// Field name.
    pub field: String,
    /// Lower bound literal.
    pub start: Option<String>,
    /// Upper bound literal.
    pub end: Option<String>,
    /// Whether `start` itself is in range.
    pub include_start: bool,
    /// Whether `end` itself is in range.
    pub include_end: bool,
}

impl TimeRangeCondition {
    /// Creates a range without a field.
    pub fn new(
        start: Option<String>,
        end: Option<String>,
        include_start: bool,
        include_end: bool,
    ) -> Self {
        Self {
            field: String::new(),
            start,
            end,
            include_start,
            include_end,
        }
    }

    /// Parses the lower bound as an RFC 3339 timestamp.
    pub fn start_time(&self) -> Result<Option<DateTime<FixedOffset>>, chrono::ParseError> {
        parse_time(self.start.as_deref())
    }

    /// Parses the upper bound as an RFC 3339 timestamp.
    pub fn end_time(&self) -> Result<Option<DateTime<FixedOffset>>, chrono::ParseError> {
        parse_time(self.end.as_deref())
    }
}

/// Parses an optional RFC 3339 literal.
fn parse_time(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, chrono::ParseError> {
    value.map(DateTime::parse_from_rfc3339).transpose()
}

/// A leaf condition, before or after its field is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafCondition {
    /// See [`MatchCondition`].
    Match(MatchCondition),
    /// See [`RegexpCondition`].
    Regexp(RegexpCondition),
    /// See [`WildcardCondition`].
    Wildcard(WildcardCondition),
    /// See [`NumberRangeCondition`].
    NumberRange(NumberRangeCondition),
    /// See [`TimeRangeCondition`].
    TimeRange(TimeRangeCondition),
}

impl LeafCondition {
    /// The inner condition as a trait object.
    fn as_fieldable(&self) -> &dyn FieldableCondition {
        match self {
            Self::Match(c) => c,
            Self::Regexp(c) => c,
            Self::Wildcard(c) => c,
            Self::NumberRange(c) => c,
            Self::TimeRange(c) => c,
        }
    }
}

impl FieldableCondition for LeafCondition {
    fn field(&self) -> &str {
        self.as_fieldable().field()
    }

    fn set_field(&mut self, field: String) {
        match self {
            Self::Match(c) => c.set_field(field),
            Self::Regexp(c) => c.set_field(field),
            Self::Wildcard(c) => c.set_field(field),
            Self::NumberRange(c) => c.set_field(field),
            Self::TimeRange(c) => c.set_field(field),
        }
    }
}

impl From<LeafCondition> for Condition {
    fn from(leaf: LeafCondition) -> Self {
        match leaf {
            LeafCondition::Match(c) => Self::Match(c),
            LeafCondition::Regexp(c) => Self::Regexp(c),
            LeafCondition::Wildcard(c) => Self::Wildcard(c),
            LeafCondition::NumberRange(c) => Self::NumberRange(c),
            LeafCondition::TimeRange(c) => Self::TimeRange(c),
        }
    }
}

impl Condition {
    /// Creates an And condition.
    pub fn and(left: Self, right: Self) -> Self {
        Self::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an Or condition.
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a Not condition.
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Returns the leaf's field capability, or None for composites.
    pub fn as_fieldable(&self) -> Option<&dyn FieldableCondition> {
        match self {
            Self::And { .. } | Self::Or { .. } | Self::Not(_) => None,
            Self::Match(c) => Some(c),
            Self::Regexp(c) => Some(c),
            Self::Wildcard(c) => Some(c),
            Self::NumberRange(c) => Some(c),
            Self::TimeRange(c) => Some(c),
        }
    }

    /// Every field referenced by the tree, left to right.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    /// Helper for [`fields`](Self::fields).
    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::And { left, right } | Self::Or { left, right } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Self::Not(inner) => inner.collect_fields(out),
            leaf => {
                if let Some(c) = leaf.as_fieldable() {
                    out.push(c.field());
                }
            }
        }
    }

    /// Formats the condition as canonical query text.
    ///
    /// Composites are always parenthesized, so parsing the output yields an
    /// equal tree. Match values containing glob characters are the
    /// exception: they re-parse as wildcards.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::And { left, right } => {
                format!("({} AND {})", left.to_query_string(), right.to_query_string())
            }
            Self::Or { left, right } => {
                format!("({} OR {})", left.to_query_string(), right.to_query_string())
            }
            Self::Not(inner) => format!("NOT {}", inner.to_query_string()),
            Self::Match(c) => format!("{}:{}", escape_field(&c.field), literal(&c.value)),
            Self::Regexp(c) => format!(
                "{}:/{}/",
                escape_field(&c.field),
                escape_regex(c.pattern.as_str())
            ),
            Self::Wildcard(c) => format!(
                "{}:{}",
                escape_field(&c.field),
                literal(c.pattern.as_str())
            ),
            Self::NumberRange(c) => {
                let field = escape_field(&c.field);
                match (c.start, c.end) {
                    (Some(s), Some(e)) if s == e && c.include_start && c.include_end => {
                        format!("{field}:{s}")
                    }
                    (start, end) => {
                        let start = start.map_or_else(|| "*".to_string(), |v| v.to_string());
                        let end = end.map_or_else(|| "*".to_string(), |v| v.to_string());
                        format_range(&field, &start, &end, c.include_start, c.include_end)
                    }
                }
            }
            Self::TimeRange(c) => {
                let start = c.start.as_deref().map_or_else(|| "*".to_string(), quote);
                let end = c.end.as_deref().map_or_else(|| "*".to_string(), quote);
                format_range(
                    &escape_field(&c.field),
                    &start,
                    &end,
                    c.include_start,
                    c.include_end,
                )
            }
        }
    }

    /// Formats the condition as a tree structure with the given indentation level.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::And { left, right } => {
                writeln!(f, "{prefix}And")?;
                left.fmt_tree(f, indent + 1)?;
                right.fmt_tree(f, indent + 1)
            }
            Self::Or { left, right } => {
                writeln!(f, "{prefix}Or")?;
                left.fmt_tree(f, indent + 1)?;
                right.fmt_tree(f, indent + 1)
            }
            Self::Not(inner) => {
                writeln!(f, "{prefix}Not")?;
                inner.fmt_tree(f, indent + 1)
            }
            Self::Match(c) => writeln!(f, "{prefix}Match({:?}, {:?})", c.field, c.value),
            Self::Regexp(c) => {
                writeln!(f, "{prefix}Regexp({:?}, /{}/)", c.field, c.pattern.as_str())
            }
            Self::Wildcard(c) => {
                writeln!(f, "{prefix}Wildcard({:?}, {:?})", c.field, c.pattern.as_str())
            }
            Self::NumberRange(c) => writeln!(
                f,
                "{prefix}NumberRange({:?}, {:?}, {:?}, {}, {})",
                c.field, c.start, c.end, c.include_start, c.include_end
            ),
            Self::TimeRange(c) => writeln!(
                f,
                "{prefix}TimeRange({:?}, {:?}, {:?}, {}, {})",
                c.field, c.start, c.end, c.include_start, c.include_end
            ),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Renders `field:[start TO end]` with the right delimiters.
fn format_range(field: &str, start: &str, end: &str, include_start: bool, include_end: bool) -> String {
    let open = if include_start { '[' } else { '{' };
    let close = if include_end { ']' } else { '}' };
    format!("{field}:{open}{start} TO {end}{close}")
}

/// Escapes a field name so it lexes back as a single field token.
fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for (i, ch) in field.chars().enumerate() {
        let special = matches!(ch, '\\' | '(' | ')' | '[' | ']' | '{' | '}' | ':' | '"')
            || ch.is_whitespace()
            || (i == 0 && ch == '/');
        if special {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Renders a match or wildcard value.
///
/// Quoted text wrapped in slashes reads back as a regex, so such values are
/// written as an escaped bare word instead.
fn literal(value: &str) -> String {
    let slash_wrapped = value.len() >= 2 && value.starts_with('/') && value.ends_with('/');
    if !slash_wrapped {
        return quote(value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    for (i, ch) in value.chars().enumerate() {
        let special = matches!(ch, '\\' | '(' | ')' | '[' | ']' | '{' | '}' | ':' | '"')
            || ch.is_whitespace()
            || ch.is_control()
            || i == 0;
        if special {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Quotes a literal, escaping quotes and backslashes.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Escapes unescaped slashes in a regex body.
fn escape_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '/' => out.push_str("\\/"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(field: &str, start: i64, end: i64) -> Condition {
        Condition::NumberRange(NumberRangeCondition::new(Some(start), Some(end), true, true).with_field(field))
    }

    #[test]
    fn field_attached_after_construction() {
        let mut leaf = LeafCondition::Match(MatchCondition::new("value"));
        assert_eq!(leaf.field(), "");
        leaf.set_field("message".into());
        assert_eq!(leaf.field(), "message");
        assert_eq!(
            Condition::from(leaf),
            Condition::Match(MatchCondition {
                field: "message".into(),
                value: "value".into()
            })
        );
    }

    #[test]
    fn patterns_compare_by_source() {
        assert_eq!(RegexPattern::new("a.*").unwrap(), RegexPattern::new("a.*").unwrap());
        assert_ne!(RegexPattern::new("a.*").unwrap(), RegexPattern::new("b.*").unwrap());
        assert_eq!(
            WildcardPattern::new("*abc*").unwrap(),
            WildcardPattern::new("*abc*").unwrap()
        );
    }

    #[test]
    fn glob_source_drops_needless_escapes() {
        let escaped = WildcardPattern::new(r"\/*/abc/").unwrap();
        assert_eq!(escaped, WildcardPattern::new("/*/abc/").unwrap());
        assert_eq!(escaped.as_str(), "/*/abc/");
        assert!(escaped.matches("/x/abc/"));

        let meta = WildcardPattern::new(r"a\*b").unwrap();
        assert_eq!(meta.as_str(), r"a\*b");
        assert!(meta.matches("a*b"));
        assert!(!meta.matches("axb"));
    }

    #[test]
    fn patterns_debug_as_source() {
        assert_eq!(format!("{:?}", RegexPattern::new("a+").unwrap()), r#"RegexPattern("a+")"#);
        assert_eq!(
            format!("{:?}", WildcardPattern::new("web-*").unwrap()),
            r#"WildcardPattern("web-*")"#
        );
    }

    #[test]
    fn wildcard_matching() {
        let pattern = WildcardPattern::new("/abc/[!a-z]/*").unwrap();
        assert!(pattern.matches("/abc/1/deep/path"));
        assert!(!pattern.matches("/abc/x/deep"));
        assert!(WildcardPattern::new("a?c").unwrap().matches("abc"));
        assert!(!WildcardPattern::new("a?c").unwrap().matches("abbc"));
    }

    #[test]
    fn regex_matching() {
        let pattern = RegexPattern::new(r"^\d+$").unwrap();
        assert!(pattern.matches("123"));
        assert!(!pattern.matches("12a"));
    }

    #[test]
    fn time_bounds_parse_on_demand() {
        let range = TimeRangeCondition::new(
            Some("2020-01-01T00:00:00Z".into()),
            Some("2020-01-01T00:00:00".into()),
            true,
            true,
        );
        assert!(range.start_time().unwrap().is_some());
        assert!(range.end_time().is_err());
        let open = TimeRangeCondition::new(None, None, true, true);
        assert_eq!(open.start_time().unwrap(), None);
    }

    #[test]
    fn fields_in_order() {
        let cond = Condition::or(
            number("a", 1, 1),
            Condition::and(
                number("b", 2, 2),
                Condition::not(Condition::Match(MatchCondition::new("x").with_field("c"))),
            ),
        );
        assert_eq!(cond.fields(), vec!["a", "b", "c"]);
        assert!(cond.as_fieldable().is_none());
    }

    #[test]
    fn query_string_forms() {
        assert_eq!(number("a", 5, 5).to_query_string(), "a:5");
        let range = Condition::NumberRange(
            NumberRangeCondition::new(Some(1), None, true, false).with_field("n"),
        );
        assert_eq!(range.to_query_string(), "n:[1 TO *}");
        let m = Condition::Match(MatchCondition::new("a \"b\"").with_field("my field"));
        assert_eq!(m.to_query_string(), r#"my\ field:"a \"b\"""#);
        let slashy = Condition::Match(MatchCondition::new("/x/").with_field("p"));
        assert_eq!(slashy.to_query_string(), r"p:\/x/");
        let glob = Condition::Wildcard(
            WildcardCondition::new(WildcardPattern::new("/a b/*/").unwrap()).with_field("w"),
        );
        assert_eq!(glob.to_query_string(), r"w:\/a\ b/*/");
        let re = Condition::Regexp(RegexpCondition::new(RegexPattern::new(r"a/\d").unwrap()).with_field("r"));
        assert_eq!(re.to_query_string(), r"r:/a\/\d/");
    }

    #[test]
    fn tree_display() {
        let cond = Condition::and(number("a", 1, 1), Condition::not(number("b", 2, 3)));
        let display = cond.to_string();
        assert_eq!(
            display,
            "And\n  NumberRange(\"a\", Some(1), Some(1), true, true)\n  Not\n    NumberRange(\"b\", Some(2), Some(3), true, true)\n"
        );
    }
}
