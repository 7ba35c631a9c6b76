/// Filter text parser (an ECQL subset)
///
/// Supports:
/// - Comparisons: `=`, `!=`, `<>`, `<`, `>`, `<=`, `>=`
/// - Boolean operators: `AND`, `OR`, `NOT`, parentheses
/// - Special predicates: `BETWEEN`, `LIKE`/`ILIKE`, `IS [NOT] NULL`
/// - Spatial operators: `INTERSECTS(geom, POINT (1 2))` and friends
/// - Identifier filters: `IN ('station.1', 'station.2')`
/// - Math and function calls: `depth * 2 > 10`, `strToLowerCase(st:name) = 'x'`
///
/// Property names are XPaths and may contain `/`, `:`, `@` and predicates such as
/// `st:measurements[1]/st:Sensor/st:name`. Because of that, division and subtraction
/// need surrounding whitespace (`a / 2`, not `a/2`). Names that clash with the
/// grammar can be double quoted.
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{map, not, opt, recognize, value},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

use super::errors::FilterParseError;
use super::{ComparisonOp, Expr, Filter, Literal, MathOp, SpatialOp};

const RESERVED_WORDS: [&str; 13] = [
    "AND", "OR", "NOT", "BETWEEN", "LIKE", "ILIKE", "IS", "NULL", "IN", "INCLUDE", "EXCLUDE",
    "TRUE", "FALSE",
];

const GEOMETRY_KEYWORDS: [&str; 7] = [
    "GEOMETRYCOLLECTION",
    "MULTIPOLYGON",
    "MULTILINESTRING",
    "MULTIPOINT",
    "POLYGON",
    "LINESTRING",
    "POINT",
];

/// Parse a complete filter; trailing content is an error.
pub fn parse_filter(input: &str) -> Result<Filter, FilterParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FilterParseError::Empty);
    }

    match parse_or(trimmed) {
        Ok((remaining, filter)) => {
            let remaining = remaining.trim();
            if !remaining.is_empty() {
                return Err(FilterParseError::TrailingInput(remaining.to_string()));
            }
            log::trace!("Parsed filter '{}' as {:?}", trimmed, filter);
            Ok(filter)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FilterParseError::Syntax {
            near: e.input.chars().take(30).collect(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(FilterParseError::Syntax {
            near: trimmed.chars().take(30).collect(),
        }),
    }
}

/// Parse a standalone expression, as used for mapping source expressions
/// (`name`, `strConcat(first, last)`, `'fixed'`).
pub fn parse_expression(input: &str) -> Result<Expr, FilterParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FilterParseError::Empty);
    }

    match parse_expr(trimmed) {
        Ok((remaining, expr)) => {
            let remaining = remaining.trim();
            if !remaining.is_empty() {
                return Err(FilterParseError::TrailingInput(remaining.to_string()));
            }
            Ok(expr)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FilterParseError::Syntax {
            near: e.input.chars().take(30).collect(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(FilterParseError::Syntax {
            near: trimmed.chars().take(30).collect(),
        }),
    }
}

fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that must not run into a longer word
fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag_no_case(kw), not(satisfy(is_word_char)))
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

// ===== Filters =====

fn parse_or(input: &str) -> IResult<&str, Filter> {
    let (input, first) = parse_and(input)?;
    let (input, rest) = many0(preceded(ws(keyword("OR")), parse_and)).parse(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut members = vec![first];
    members.extend(rest);
    Ok((input, Filter::Or(members)))
}

fn parse_and(input: &str) -> IResult<&str, Filter> {
    let (input, first) = parse_not(input)?;
    let (input, rest) = many0(preceded(ws(keyword("AND")), parse_not)).parse(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut members = vec![first];
    members.extend(rest);
    Ok((input, Filter::And(members)))
}

fn parse_not(input: &str) -> IResult<&str, Filter> {
    let (input, _) = multispace0(input)?;
    alt((
        map(preceded(terminated(keyword("NOT"), multispace0), parse_not), |f| {
            Filter::Not(Box::new(f))
        }),
        parse_filter_primary,
    ))
    .parse(input)
}

fn parse_filter_primary(input: &str) -> IResult<&str, Filter> {
    alt((
        delimited(
            pair(char('('), multispace0),
            parse_or,
            pair(multispace0, char(')')),
        ),
        value(Filter::Include, keyword("INCLUDE")),
        value(Filter::Exclude, keyword("EXCLUDE")),
        parse_id_filter,
        parse_spatial_filter,
        parse_predicate,
    ))
    .parse(input)
}

/// `IN ('id1', 'id2')`
fn parse_id_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = keyword("IN").parse(input)?;
    let (input, ids) = delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), parse_string_literal),
        preceded(multispace0, char(')')),
    )
    .parse(input)?;
    Ok((input, Filter::Id(ids)))
}

/// `INTERSECTS(left, right)`
fn parse_spatial_filter(input: &str) -> IResult<&str, Filter> {
    let (rest, name) = parse_identifier(input)?;
    let Some(op) = SpatialOp::from_name(name) else {
        return fail(input, ErrorKind::Tag);
    };
    let (rest, _) = ws(char('(')).parse(rest)?;
    let (rest, left) = parse_expr(rest)?;
    let (rest, _) = ws(char(',')).parse(rest)?;
    let (rest, right) = parse_expr(rest)?;
    let (rest, _) = preceded(multispace0, char(')')).parse(rest)?;
    Ok((rest, Filter::Spatial { op, left, right }))
}

fn parse_comparison_op(input: &str) -> IResult<&str, ComparisonOp> {
    alt((
        value(ComparisonOp::LessOrEqual, tag("<=")),
        value(ComparisonOp::GreaterOrEqual, tag(">=")),
        value(ComparisonOp::NotEqual, tag("<>")),
        value(ComparisonOp::NotEqual, tag("!=")),
        value(ComparisonOp::Less, tag("<")),
        value(ComparisonOp::Greater, tag(">")),
        value(ComparisonOp::Equal, tag("=")),
    ))
    .parse(input)
}

fn negate(filter: Filter, negated: bool) -> Filter {
    if negated {
        Filter::Not(Box::new(filter))
    } else {
        filter
    }
}

/// `<expr> <op> <expr>`, `<expr> [NOT] BETWEEN`, `<expr> [NOT] LIKE`, `<expr> IS [NOT] NULL`
fn parse_predicate(input: &str) -> IResult<&str, Filter> {
    let (input, left) = parse_expr(input)?;
    let (input, _) = multispace0(input)?;

    if let Ok((rest, op)) = parse_comparison_op(input) {
        let (rest, right) = parse_expr(rest)?;
        return Ok((rest, Filter::compare(op, left, right)));
    }

    let (after_not, negated) = match terminated(keyword("NOT"), multispace1).parse(input) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (input, false),
    };

    if let Ok((rest, _)) = keyword("BETWEEN").parse(after_not) {
        let (rest, lower) = parse_expr(rest)?;
        let (rest, _) = ws(keyword("AND")).parse(rest)?;
        let (rest, upper) = parse_expr(rest)?;
        return Ok((
            rest,
            negate(
                Filter::Between {
                    expr: left,
                    lower,
                    upper,
                },
                negated,
            ),
        ));
    }

    if let Ok((rest, kw)) = alt((keyword("LIKE"), keyword("ILIKE"))).parse(after_not) {
        let (rest, pattern) = preceded(multispace0, parse_string_literal).parse(rest)?;
        return Ok((
            rest,
            negate(
                Filter::Like {
                    expr: left,
                    pattern,
                    match_case: kw.eq_ignore_ascii_case("LIKE"),
                },
                negated,
            ),
        ));
    }

    if !negated {
        if let Ok((rest, _)) = keyword("IS").parse(input) {
            let (rest, not_null) = opt(ws(keyword("NOT"))).parse(rest)?;
            let (rest, _) = preceded(multispace0, keyword("NULL")).parse(rest)?;
            return Ok((rest, negate(Filter::IsNull(left), not_null.is_some())));
        }
    }

    fail(input, ErrorKind::Alt)
}

// ===== Expressions =====

fn parse_expr(input: &str) -> IResult<&str, Expr> {
    parse_additive_expr(input)
}

fn parse_additive_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = parse_multiplicative_expr(input)?;
    loop {
        let attempt = pair(
            ws(alt((
                value(MathOp::Add, char('+')),
                value(MathOp::Subtract, char('-')),
            ))),
            parse_multiplicative_expr,
        )
        .parse(input);
        match attempt {
            Ok((rest, (op, right))) => {
                left = Expr::math(op, left, right);
                input = rest;
            }
            Err(_) => return Ok((input, left)),
        }
    }
}

fn parse_multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = parse_primary_expr(input)?;
    loop {
        let attempt = pair(
            ws(alt((
                value(MathOp::Multiply, char('*')),
                value(MathOp::Divide, char('/')),
            ))),
            parse_primary_expr,
        )
        .parse(input);
        match attempt {
            Ok((rest, (op, right))) => {
                left = Expr::math(op, left, right);
                input = rest;
            }
            Err(_) => return Ok((input, left)),
        }
    }
}

fn parse_primary_expr(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    alt((
        delimited(
            pair(char('('), multispace0),
            parse_expr,
            pair(multispace0, char(')')),
        ),
        map(parse_string_literal, |s| Expr::Literal(Literal::String(s))),
        parse_number,
        value(Expr::Literal(Literal::Boolean(true)), keyword("TRUE")),
        value(Expr::Literal(Literal::Boolean(false)), keyword("FALSE")),
        value(Expr::Literal(Literal::Null), keyword("NULL")),
        parse_geometry_literal,
        parse_function_call,
        parse_property,
    ))
    .parse(input)
}

/// `'text'` with `''` as the escaped quote
fn parse_string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut value = String::new();
    loop {
        let Some(pos) = rest.find('\'') else {
            return fail(input, ErrorKind::Char);
        };
        value.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        if let Some(after) = rest.strip_prefix('\'') {
            value.push('\'');
            rest = after;
        } else {
            return Ok((rest, value));
        }
    }
}

fn parse_number(input: &str) -> IResult<&str, Expr> {
    let (rest, text) =
        recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    if rest.starts_with(is_word_char) {
        return fail(input, ErrorKind::Digit);
    }
    let literal = if text.contains('.') {
        match text.parse::<f64>() {
            Ok(v) => Literal::Float(v),
            Err(_) => return fail(input, ErrorKind::Float),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => Literal::Integer(v),
            Err(_) => return fail(input, ErrorKind::Digit),
        }
    };
    Ok((rest, Expr::Literal(literal)))
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_word_char),
    ))
    .parse(input)
}

/// Text between a matching pair of parentheses, parentheses included
fn balanced_parens(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('(') {
        return fail(input, ErrorKind::Char);
    }
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..=i]));
                }
            }
            _ => {}
        }
    }
    fail(input, ErrorKind::Char)
}

/// `POINT (1 2)`, `POLYGON ((...))`, kept as well-known text
fn parse_geometry_literal(input: &str) -> IResult<&str, Expr> {
    let (rest, word) = parse_identifier(input)?;
    if !GEOMETRY_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
        return fail(input, ErrorKind::Tag);
    }
    let (rest, _) = multispace0(rest)?;
    let (rest, body) = balanced_parens(rest)?;
    Ok((rest, Expr::geometry(format!("{} {}", word.to_uppercase(), body))))
}

fn parse_function_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = parse_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, args) = separated_list0(ws(char(',')), parse_expr).parse(input)?;
    let (input, _) = preceded(multispace0, char(')')).parse(input)?;
    Ok((input, Expr::function(name, args)))
}

/// XPath property name, or any text in double quotes
fn parse_property(input: &str) -> IResult<&str, Expr> {
    if let Ok((rest, quoted)) =
        delimited(char::<&str, nom::error::Error<&str>>('"'), take_while1(|c: char| c != '"'), char('"')).parse(input)
    {
        return Ok((rest, Expr::property(quoted)));
    }

    let mut end = 0;
    let mut in_predicate = false;
    for (i, c) in input.char_indices() {
        let accepted = if in_predicate {
            if c == ']' {
                in_predicate = false;
            }
            true
        } else if i == 0 {
            c.is_alphabetic() || c == '_' || c == '@' || c == '.'
        } else if c == '[' {
            in_predicate = true;
            true
        } else {
            c.is_alphanumeric() || matches!(c, '_' | ':' | '/' | '@' | '.' | '-')
        };
        if !accepted {
            break;
        }
        end = i + c.len_utf8();
    }

    if end == 0 || in_predicate {
        return fail(input, ErrorKind::AlphaNumeric);
    }
    let token = &input[..end];
    if RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(token)) {
        return fail(input, ErrorKind::Tag);
    }
    Ok((&input[end..], Expr::property(token)))
}
