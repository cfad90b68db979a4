//! Integration tests for querystring.
//!
//! Exercises the public parse API end to end: the reference query corpus,
//! canonical round-trips and concurrent use.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::thread;

use querystring::{
    Condition, FieldableCondition, LeafCondition, MatchCondition, NumberRangeCondition,
    ParseOptions, QueryErrorKind, RegexPattern, RegexpCondition, TimeRangeCondition,
    WildcardCondition, WildcardPattern, new_string_condition, parse, parse_with,
};

fn number(field: &str, value: i64) -> Condition {
    Condition::NumberRange(
        NumberRangeCondition::new(Some(value), Some(value), true, true).with_field(field),
    )
}

fn wildcard(field: &str, glob: &str) -> Condition {
    Condition::Wildcard(
        WildcardCondition::new(WildcardPattern::new(glob).unwrap()).with_field(field),
    )
}

#[test]
fn reference_corpus() {
    let lower = ParseOptions::new().lower_case_wildcard(true);
    let cases = [
        (
            "message: test\\ value AND datetime: [\"2020-01-01T00:00:00\" TO \"2020-12-31T00:00:00\"]",
            ParseOptions::default(),
            Condition::and(
                Condition::Match(MatchCondition::new("test value").with_field("message")),
                Condition::TimeRange(
                    TimeRangeCondition::new(
                        Some("2020-01-01T00:00:00".into()),
                        Some("2020-12-31T00:00:00".into()),
                        true,
                        true,
                    )
                    .with_field("datetime"),
                ),
            ),
        ),
        (
            "a: \"\\\\/*/abc/\"",
            ParseOptions::default(),
            wildcard("a", "/*/abc/"),
        ),
        (
            "b: \"\\\\/abc/?/\"",
            ParseOptions::default(),
            wildcard("b", "/abc/?/"),
        ),
        (
            "c: \"\\\\/abc/[!a-z]/[!1-5]\"",
            ParseOptions::default(),
            wildcard("c", "/abc/[!a-z]/[!1-5]"),
        ),
        (
            "a: \"*/AbC/CrAzY/CaSE/*\"",
            lower,
            wildcard("a", "*/abc/crazy/case/*"),
        ),
        (
            "a: \"/.*/\"",
            ParseOptions::default(),
            Condition::Regexp(
                RegexpCondition::new(RegexPattern::new(".*").unwrap()).with_field("a"),
            ),
        ),
        (
            "a: 1 OR (b: 2 and c: 4)",
            ParseOptions::default(),
            Condition::or(
                number("a", 1),
                Condition::and(number("b", 2), number("c", 4)),
            ),
        ),
    ];

    for (query, options, expected) in cases {
        let cond = parse_with(query, &options)
            .unwrap_or_else(|e| panic!("{query:?} failed: {e}"))
            .unwrap();
        assert_eq!(cond, expected, "parse of {query:?}");
    }
}

#[test]
fn literal_backslash_before_slash_makes_wildcard() {
    assert_eq!(
        parse(r#"a: "\\/*/abc/""#).unwrap().unwrap(),
        wildcard("a", "/*/abc/")
    );
    assert_eq!(
        parse(r#"b: "\\/abc/?/""#).unwrap().unwrap(),
        wildcard("b", "/abc/?/")
    );
    assert_eq!(
        parse(r#"c: "\\/abc/[!a-z]/[!1-5]""#).unwrap().unwrap(),
        wildcard("c", "/abc/[!a-z]/[!1-5]")
    );
}

#[test]
fn escaped_slash_in_quotes_stays_regex() {
    let regexp = |pattern: &str| {
        Condition::Regexp(RegexpCondition::new(RegexPattern::new(pattern).unwrap()).with_field("a"))
    };
    assert_eq!(parse(r#"a: "\/.*/""#).unwrap().unwrap(), regexp(".*"));
    assert_eq!(parse(r#"a: "\/pattern/""#).unwrap().unwrap(), regexp("pattern"));
    assert_eq!(parse(r#"a: "/.*/""#).unwrap(), parse("a: /.*/").unwrap());
}

#[test]
fn lower_case_wildcard_phrase() {
    let options = ParseOptions::new().lower_case_wildcard(true);
    let cond = parse_with(r#"a: "*/AbC/CrAzY/CaSE/*""#, &options)
        .unwrap()
        .unwrap();
    assert_eq!(cond, wildcard("a", "*/abc/crazy/case/*"));

    let Condition::Wildcard(leaf) = cond else {
        panic!("expected wildcard");
    };
    assert!(leaf.pattern.matches("x/abc/crazy/case/y"));
}

#[test]
fn invalid_regex_returns_no_tree() {
    let err = parse("field: /[/").unwrap_err();
    assert_eq!(err.kind(), QueryErrorKind::PatternCompile);
    assert_eq!(err.query(), "field: /[/");
}

#[test]
fn library_entry_matches_parse() {
    let options = ParseOptions::default();
    for (literal, query) in [
        ("plain", "f: plain"),
        ("*glob?", "f: *glob?"),
        ("/re+/", "f: /re+/"),
    ] {
        let mut leaf = new_string_condition(literal, &options).unwrap();
        leaf.set_field("f".into());
        assert_eq!(Condition::from(leaf), parse(query).unwrap().unwrap());
    }
    assert!(matches!(
        new_string_condition("x", &options).unwrap(),
        LeafCondition::Match(_)
    ));
}

#[test]
fn round_trip() {
    let queries = [
        "a: 1 OR (b: 2 AND c: 4)",
        "message: \"disk full\" AND NOT level: debug",
        "n: [1 TO 10} OR m: {* TO -5]",
        "path: *api/handlers* OR name: /h[a-z]+\\/x/",
        "ts: [\"2020-01-01T00:00:00Z\" TO *}",
        "my\\ field: \"say \\\"hi\\\"\"",
        "p: \\/x/",
        "p: \"\\\\/x/\"",
        "w: \"\\\\/*/abc/\"",
        "NOT NOT a: b",
        "c: \"/abc/[!a-z]\"",
    ];

    for query in queries {
        let cond = parse(query).unwrap().unwrap();
        let text = cond.to_query_string();
        let reparsed = parse(&text)
            .unwrap_or_else(|e| panic!("{text:?} from {query:?} failed: {e}"))
            .unwrap();
        assert_eq!(reparsed, cond, "round trip of {query:?} via {text:?}");
    }
}

#[test]
fn fields_listed() {
    let cond = parse("a: 1 OR (b: x AND NOT c: [1 TO 2])").unwrap().unwrap();
    assert_eq!(cond.fields(), vec!["a", "b", "c"]);
}

#[test]
fn concurrent_parses_match_sequential() {
    let queries: Vec<String> = (0..64)
        .map(|i| format!("f{i}: {i} OR (g{i}: *x{i}* AND NOT h: [{i} TO {}])", i + 10))
        .collect();
    let sequential: Vec<_> = queries.iter().map(|q| parse(q).unwrap()).collect();

    let concurrent: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = queries
            .chunks(8)
            .map(|chunk| scope.spawn(move || chunk.iter().map(|q| parse(q).unwrap()).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(concurrent, sequential);
}

#[test]
fn error_context_rendering() {
    let err = parse("a: \"open").unwrap_err();
    let rendered = err.format_with_context();
    assert!(rendered.contains("unclosed quote"));
    assert!(rendered.contains("hint:"));
}
