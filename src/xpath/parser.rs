/// Step-level XPath grammar used for attribute targets and filter property names.
///
/// Recognised forms:
/// - Element steps: `name`, `prefix:name`
/// - XML attribute steps: `@gml:id`, `@xlink:href`
/// - Predicates: `name[2]`, `name[@codeSpace='x']`
/// - Context steps: `.` (dropped by the caller)
///
/// Does NOT support axes (`child::`), wildcards or functions; mapping targets
/// never use them.
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// A step as written, before namespace resolution
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawStep<'a> {
    /// `.`
    Context,
    Named {
        is_attribute: bool,
        prefix: Option<&'a str>,
        local_name: &'a str,
        predicates: Vec<&'a str>,
    },
}

/// Parse a complete path; trailing garbage is an error.
pub(crate) fn parse_path(input: &str) -> IResult<&str, Vec<RawStep<'_>>> {
    all_consuming(preceded(opt(char('/')), separated_list1(char('/'), parse_step))).parse(input)
}

fn parse_step(input: &str) -> IResult<&str, RawStep<'_>> {
    alt((parse_named_step, map(tag("."), |_| RawStep::Context))).parse(input)
}

fn parse_named_step(input: &str) -> IResult<&str, RawStep<'_>> {
    let (input, at) = opt(char('@')).parse(input)?;
    let (input, (prefix, local_name)) = parse_qname(input)?;
    let (input, predicates) = many0(parse_predicate).parse(input)?;

    Ok((
        input,
        RawStep::Named {
            is_attribute: at.is_some(),
            prefix,
            local_name,
            predicates,
        },
    ))
}

/// `prefix:local` or `local`
fn parse_qname(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    let (input, first) = parse_ncname(input)?;
    match preceded(char::<_, nom::error::Error<_>>(':'), parse_ncname).parse(input) {
        Ok((input, local)) => Ok((input, (Some(first), local))),
        Err(_) => Ok((input, (None, first))),
    }
}

fn parse_ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

/// `[ ... ]`, content is kept verbatim (trimmed) and classified by the caller
fn parse_predicate(input: &str) -> IResult<&str, &str> {
    map(
        delimited(char('['), take_while1(|c: char| c != ']' && c != '['), char(']')),
        |s: &str| s.trim(),
    )
    .parse(input)
}
