//! Unit tests for filter parsing edge cases and the JSON form of filters
//!
//! Malformed input must come back as an error, never a panic.

#[cfg(test)]
mod filter_parser_tests {
    use featurechain::filter::{
        parse_expression, parse_filter, ComparisonOp, Expr, Filter, FilterParseError, Literal,
    };
    use test_case::test_case;

    /// Malformed filters don't panic
    #[test]
    fn test_malformed_filters_no_panic() {
        let malformed = vec![
            "",
            "(",
            ")",
            "st:name =",
            "= 'x'",
            "st:name = 'unterminated",
            "st:name BETWEEN 1",
            "st:name IS",
            "NOT",
            "IN (",
            "INTERSECTS(geom, POINT (1 2)",
            "st:a/st:b[ = 1",
            "st:name = 'x' AND",
            "((st:name = 'x')",
        ];

        for input in malformed {
            assert!(parse_filter(input).is_err(), "Should reject: {:?}", input);
        }
    }

    #[test_case("   " ; "whitespace only")]
    #[test_case("" ; "empty")]
    fn test_empty_input(input: &str) {
        assert_eq!(parse_filter(input), Err(FilterParseError::Empty));
    }

    #[test]
    fn test_trailing_input_is_reported() {
        assert!(matches!(
            parse_filter("st:name = 'x' st:elevation"),
            Err(FilterParseError::TrailingInput(_))
        ));
    }

    #[test_case("st:name = 'x'", ComparisonOp::Equal ; "equal")]
    #[test_case("st:name <> 'x'", ComparisonOp::NotEqual ; "not equal")]
    #[test_case("st:name < 'x'", ComparisonOp::Less ; "less")]
    #[test_case("st:name <= 'x'", ComparisonOp::LessOrEqual ; "less or equal")]
    #[test_case("st:name > 'x'", ComparisonOp::Greater ; "greater")]
    #[test_case("st:name >= 'x'", ComparisonOp::GreaterOrEqual ; "greater or equal")]
    fn test_comparison_operators(input: &str, expected: ComparisonOp) {
        match parse_filter(input).unwrap() {
            Filter::Comparison { op, .. } => assert_eq!(op, expected),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            parse_filter("st:name = 'a' and not st:elevation is null").unwrap(),
            parse_filter("st:name = 'a' AND NOT st:elevation IS NULL").unwrap()
        );
    }

    #[test]
    fn test_source_expressions() {
        assert_eq!(parse_expression("name").unwrap(), Expr::property("name"));
        assert_eq!(
            parse_expression("strConcat(first, last)").unwrap(),
            Expr::function(
                "strConcat",
                vec![Expr::property("first"), Expr::property("last")]
            )
        );
        assert_eq!(
            parse_expression("'fixed'").unwrap(),
            Expr::Literal(Literal::String("fixed".to_string()))
        );
    }

    #[test]
    fn test_filter_json_round_trip() {
        let filter = parse_filter(
            "st:sensors/st:Sensor/st:name = 'X' OR st:elevation BETWEEN 10 AND 20",
        )
        .unwrap();
        let json = serde_json::to_string(&filter).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_display_reparses() {
        let filter = parse_filter("NOT (st:name LIKE 'Ho%' OR st:elevation > 3)").unwrap();
        assert_eq!(parse_filter(&filter.to_string()).unwrap(), filter);
    }
}
