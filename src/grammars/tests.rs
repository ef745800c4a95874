use std::io::BufReader;

use crate::grammars::{arithmetic, statements};
use crate::schema::{Grammar, SlotSpec};
use crate::value::parsed;
use crate::{ConfigError, ParseError, Record, TokenGrammar, Value};

fn statement_parser(root: &str) -> TokenGrammar {
    TokenGrammar::new(statements::grammar().unwrap(), root).unwrap()
}

fn record(value: Value) -> Record {
    match value {
        Value::Record(record) => record,
        other => panic!("expected a record, got {other}"),
    }
}

#[test]
fn statement_captures_after_marker() {
    let value = statement_parser("Statement").parse_str(":test", &mut ()).unwrap();
    assert_eq!(record(value).get_as::<String>("command").unwrap(), "test");
}

#[test]
fn second_statement_is_trailing_input() {
    let err = statement_parser("Statement").parse_str(":test; :another;", &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::TrailingInput { ref tail, .. } if tail == "; :another;"));
}

#[test]
fn junction_picks_the_matching_candidate() {
    let cases: Vec<(&str, &str, Option<&str>)> = vec![
        ("// comment", "Comment", Some(" comment")),
        ("// comment\n", "Comment", Some(" comment")),
        ("/* comment */", "MultilineComment", Some(" comment ")),
        (":run", "Statement", None),
        (" ; ", "Separator", None),
    ];
    let parser = statement_parser("Junction");
    for (input, expected, comment) in cases {
        let result = record(parser.parse_str(input, &mut ()).unwrap());
        assert!(result.is(expected), "{input:?} parsed as {result}");
        if let Some(comment) = comment {
            assert_eq!(result.get_as::<String>("comment").unwrap(), comment, "{input:?}");
        }
    }
}

#[test]
fn script_collects_tokens_across_lines() {
    let input = ":hello; // comment\n/* multiline\ncomment */";
    let value = statement_parser("Script").parse(BufReader::new(input.as_bytes()), &mut ()).unwrap();
    assert_eq!(value.to_source(), input);

    let tokens: Vec<Record> = record(value).get_as("tokens").unwrap();
    let kinds: Vec<&str> = tokens.iter().map(|t| t.type_name.as_str()).collect();
    assert_eq!(kinds, ["Statement", "Separator", "Comment", "MultilineComment"]);
    assert_eq!(tokens[0].get_as::<String>("command").unwrap(), "hello");
    assert_eq!(tokens[2].get_as::<String>("comment").unwrap(), " comment");
    assert_eq!(tokens[3].get_as::<String>("comment").unwrap(), " multiline\ncomment ");
}

#[test]
fn script_enforces_capture_limits() {
    let parser = statement_parser("Script");
    assert!(matches!(parser.parse_str(":test", &mut ()), Err(ParseError::Syntax(_))));
    assert!(matches!(parser.parse_str(":a;:b;:c;:d;:e;:f;:g", &mut ()), Err(ParseError::TrailingInput { .. })));

    let outcome = parser.parse_verbose(":a;:b\n\n".as_bytes(), &mut ()).unwrap();
    assert_eq!(outcome.consumed, 5);
}

#[test]
fn nested_rule_is_populated() {
    let value = statement_parser("Bang").parse_str("!:test", &mut ()).unwrap();
    let command: Record = record(value).get_as("command").unwrap();
    assert_eq!(command.get_as::<String>("command").unwrap(), "test");
}

#[test]
fn optional_last_slot_is_skipped() {
    let value = statement_parser("Padded").parse_str(": ", &mut ()).unwrap();
    let test: Record = record(value).get_as("test").unwrap();
    assert_eq!(test.get("command"), Some(&Value::Text(String::new())));
}

#[test]
fn hooks_update_variables() {
    let parser = TokenGrammar::new(statements::with_variables().unwrap(), "Evaluatable").unwrap();
    let mut vars = statements::Variables::from([("test".to_string(), "100".to_string())]);
    parser.parse_str("$test", &mut vars).unwrap();
    assert_eq!(vars["test"], "100test");

    parser.parse_str("$other", &mut vars).unwrap();
    assert_eq!(vars["other"], "nulltest");
}

#[test]
fn closing_tag_must_repeat_the_opening_one() {
    let parser = statement_parser("Tagged");
    let tagged = record(parser.parse_str("<b>bold</b>", &mut ()).unwrap());
    assert_eq!(tagged.get_as::<String>("body").unwrap(), "bold");
    assert_eq!(tagged.get_as::<String>("close_tag").unwrap(), "b");

    let err = parser.parse_str("<b>bold</i>", &mut ()).unwrap_err();
    let ParseError::Syntax(err) = err else {
        panic!("expected a syntax error, got {err:?}");
    };
    assert_eq!(err.location.column, 10);
    assert_eq!(err.expected, "the same text as `tag` for `Tagged.close_tag`");
}

#[test]
fn setting_value_is_required_after_equals() {
    let cases: Vec<(&str, Option<&str>)> = vec![
        ("set level = 5", Some("Setting(verb: set, name: \"level\", eq: \"=\", value: 5)")),
        ("SET level=5", Some("Setting(verb: set, name: \"level\", eq: \"=\", value: 5)")),
        ("unset level", Some("Setting(verb: unset, name: \"level\", eq: null, value: null)")),
        ("set level =", None),
        ("reset level", None),
    ];
    let parser = statement_parser("Setting");
    for (input, expected) in cases {
        let result = parser.parse_str(input, &mut ());
        match expected {
            Some(expected) => assert_eq!(result.unwrap().to_string(), expected, "{input:?}"),
            None => assert!(result.is_err(), "{input:?} should not parse"),
        }
    }
}

#[test]
fn arithmetic_associativity_and_priority() {
    let cases: Vec<(&str, &str)> = vec![
        ("1", "1"),
        ("1+2", "(+ 1 2)"),
        ("1-2-3", "(- (- 1 2) 3)"),
        ("1+2*3", "(+ 1 (* 2 3))"),
        ("1*2+3", "(+ (* 1 2) 3)"),
        ("1+2*3*4", "(+ 1 (* (* 2 3) 4))"),
        ("1*2+3*4", "(+ (* 1 2) (* 3 4))"),
        ("1-2+3", "(+ (- 1 2) 3)"),
        ("1+2-3", "(- (+ 1 2) 3)"),
        ("1-2*3-4", "(- (- 1 (* 2 3)) 4)"),
        ("(1+2)*3", "(* (+ 1 2) 3)"),
        (" 8 / 4 / 2 ", "(/ (/ 8 4) 2)"),
    ];
    let parser = TokenGrammar::new(arithmetic::grammar().unwrap(), arithmetic::ROOT).unwrap();
    for (input, expected) in cases {
        let value = parser.parse_str(input, &mut ()).unwrap_or_else(|err| panic!("{input:?}: {err}"));
        assert_eq!(arithmetic::render(&value), expected, "{input:?}");
        assert_eq!(value.to_source(), input.replace(' ', ""), "{input:?}");
    }
}

#[test]
fn expression_root_rotates_without_an_end_marker() {
    let cases: Vec<(&str, &str)> = vec![
        ("1+2", "(+ 1 2)"),
        ("1-2-3", "(- (- 1 2) 3)"),
        ("1+2*3", "(+ 1 (* 2 3))"),
        ("1*2+3", "(+ (* 1 2) 3)"),
    ];
    let parser = TokenGrammar::new(arithmetic::grammar().unwrap(), "Expr").unwrap();
    for (input, expected) in cases {
        let value = parser.parse_str(input, &mut ()).unwrap_or_else(|err| panic!("{input:?}: {err}"));
        assert_eq!(arithmetic::render(&value), expected, "{input:?}");
        assert_eq!(value.to_source(), input, "{input:?}");
    }

    let err = parser.parse_str("1+2)", &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::TrailingInput { ref tail, .. } if tail == ")"), "{err:?}");
}

#[test]
fn arithmetic_evaluates() {
    let parser = TokenGrammar::new(arithmetic::grammar().unwrap(), arithmetic::ROOT).unwrap();
    let cases: Vec<(&str, f64)> = vec![("1-2-3", -4.0), ("2+3*4", 14.0), ("(2+3)*4", 20.0), ("8/4/2", 1.0), ("1.5*2\n", 3.0)];
    for (input, expected) in cases {
        let value = parser.parse_str(input, &mut ()).unwrap();
        assert_eq!(arithmetic::evaluate(&value), Some(expected), "{input:?}");
    }
}

#[test]
fn arithmetic_error_points_at_the_bad_operand() {
    let parser = TokenGrammar::new(arithmetic::grammar().unwrap(), arithmetic::ROOT).unwrap();
    let ParseError::Syntax(err) = parser.parse_str("1+*2", &mut ()).unwrap_err() else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.location.column, 3);
    assert_eq!(err.found, "\"*2\"");
}

#[test]
fn left_recursive_rule_without_rotation_terminates() {
    let grammar = Grammar::builder()
        .rule("Path", |r| r.record("expr", "E").pattern("end", r"\z"))
        .variant("E", ["Chain", "Leaf"])
        .rule("Chain", |r| r.record("first", "E").literal("dot", ".").pattern("name", "[a-z]+"))
        .rule("Leaf", |r| r.pattern("name", "[a-z]+"))
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "Path").unwrap();
    let value = parser.parse_str("a.b", &mut ()).unwrap();
    assert_eq!(value.to_string(), "Path(expr: Chain(first: Leaf(name: \"a\"), dot: \".\", name: \"b\"), end: \"\")");
}

#[test]
fn optional_when_followed_by_looks_ahead() {
    let grammar = Grammar::builder()
        .rule("Call", |r| {
            r.pattern("name", "[a-z]+")
                .slot(SlotSpec::literal("args", "()").optional_if_followed_by(";"))
                .slot(SlotSpec::literal("semi", ";").optional())
        })
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "Call").unwrap();
    assert!(parser.parse_str("f();", &mut ()).is_ok());
    assert_eq!(parser.parse_str("f;", &mut ()).unwrap().to_source(), "f;");
    assert!(parser.parse_str("f", &mut ()).is_err());
}

#[test]
fn unbounded_collection_stops_at_end_of_input() {
    let grammar = Grammar::builder()
        .rule("Words", |r| r.slot(SlotSpec::collection("items", "Word", 1, None)))
        .rule("Word", |r| r.pattern("text", "[a-z]+").ignore_characters(" ", false))
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "Words").unwrap();
    let words: Vec<Record> = record(parser.parse_str("alpha beta  gamma", &mut ()).unwrap()).get_as("items").unwrap();
    let texts: Vec<String> = words.iter().map(|w| w.get_as("text").unwrap()).collect();
    assert_eq!(texts, ["alpha", "beta", "gamma"]);
}

#[test]
fn context_equals_needs_a_text_sibling() {
    let grammar = Grammar::builder()
        .rule("Pair", |r| {
            r.slot(SlotSpec::integer("count")).literal("eq", "=").slot(SlotSpec::context_equals("echo", "count"))
        })
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "Pair").unwrap();
    let err = parser.parse_str("3=3", &mut ()).unwrap_err();
    assert!(
        matches!(err, ParseError::Config(ConfigError::ContextNotText { ref slot, found: "integer", .. }) if slot == "echo"),
        "{err:?}"
    );
}

#[test]
fn failing_converter_is_a_config_error() {
    let grammar = Grammar::builder()
        .rule("Port", |r| r.literal("colon", ":").slot(SlotSpec::pattern("port", r"\w+").convert(parsed::<i64>)))
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "Port").unwrap();
    assert_eq!(parser.parse_str(":80", &mut ()).unwrap().to_string(), "Port(colon: \":\", port: 80)");

    let err = parser.parse_str(":8o", &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::Config(ConfigError::Conversion { ref text, .. }) if text == "8o"), "{err:?}");
}

#[test]
fn invalid_utf8_is_an_io_error() {
    let parser = TokenGrammar::new(arithmetic::grammar().unwrap(), arithmetic::ROOT).unwrap();
    let err = parser.parse(&b"1\xff\xfe"[..], &mut ()).unwrap_err();
    assert!(matches!(err, ParseError::Io(ref io) if io.kind() == std::io::ErrorKind::InvalidData), "{err:?}");
}

#[test]
fn optional_when_present_follows_the_sibling() {
    let grammar = Grammar::builder()
        .rule("W", |r| {
            r.slot(SlotSpec::literal("a", "a").optional())
                .slot(SlotSpec::literal("b", "b").optional_when_present("a"))
                .literal("c", "c")
        })
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "W").unwrap();
    assert_eq!(parser.parse_str("ac", &mut ()).unwrap().to_string(), "W(a: \"a\", b: null, c: \"c\")");
    assert_eq!(parser.parse_str("abc", &mut ()).unwrap().to_source(), "abc");
    assert_eq!(parser.parse_str("bc", &mut ()).unwrap().to_string(), "W(a: null, b: \"b\", c: \"c\")");
    assert!(parser.parse_str("c", &mut ()).is_err());
}

#[test]
fn skipped_pattern_reads_as_null_to_guards_and_empty_in_the_record() {
    let grammar = Grammar::builder()
        .rule("N", |r| {
            r.slot(SlotSpec::pattern("a", "[a-z]+").optional())
                .slot(SlotSpec::literal("b", "?").optional_when_null("a"))
                .literal("c", "!")
        })
        .build()
        .unwrap();
    let parser = TokenGrammar::new(grammar, "N").unwrap();
    assert_eq!(parser.parse_str("!", &mut ()).unwrap().to_string(), "N(a: \"\", b: null, c: \"!\")");
    assert!(parser.parse_str("x!", &mut ()).is_err());
}
