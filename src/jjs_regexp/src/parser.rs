//! Pattern grammar, built from `nom` combinators in the style
//! `bsharp_parser` uses for its own grammar — the one place this crate
//! reaches for `nom` instead of the hand-rolled recursive-descent style
//! the rest of the pack uses for its main grammar.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, none_of};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use crate::ast::{Alternative, Assertion, ClassAtom, ClassEscape, Node, Quantifier, QuantifierKind, RegexAst};
use crate::error::{RegexpError, RegexpResult};

/// Parses a full pattern body (without the surrounding `/.../flags`
/// delimiters, which the lexer already stripped off).
pub fn parse_pattern(source: &str) -> RegexpResult<RegexAst> {
    match pattern(source) {
        Ok((rest, ast)) if rest.is_empty() => Ok(ast),
        Ok((rest, _)) => Err(RegexpError::TrailingInput(source.len() - rest.len())),
        Err(_) => Err(RegexpError::Malformed),
    }
}

fn pattern(input: &str) -> IResult<&str, RegexAst> {
    map(many1_sep(alternative, '|'), |alternatives| RegexAst { alternatives })(input)
}

fn many1_sep<'a, O>(
    mut item: impl FnMut(&'a str) -> IResult<&'a str, O>,
    sep: char,
) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>> {
    move |input| {
        let (mut rest, first) = item(input)?;
        let mut out = vec![first];
        loop {
            match char::<&str, nom::error::Error<&str>>(sep)(rest) {
                Ok((after_sep, _)) => {
                    let (after_item, next) = item(after_sep)?;
                    out.push(next);
                    rest = after_item;
                }
                Err(_) => break,
            }
        }
        Ok((rest, out))
    }
}

fn alternative(input: &str) -> IResult<&str, Alternative> {
    map(many0(term), Alternative)(input)
}

fn term(input: &str) -> IResult<&str, Node> {
    let (rest, atom) = atom(input)?;
    match opt(quantifier)(rest)? {
        (rest, Some(quantifier)) => Ok((rest, Node::Quantified { node: Box::new(atom), quantifier })),
        (rest, None) => Ok((rest, atom)),
    }
}

fn atom(input: &str) -> IResult<&str, Node> {
    alt((assertion_node, group, backreference, class, class_escape_atom, period, char_escape, literal_char))(input)
}

fn assertion_node(input: &str) -> IResult<&str, Node> {
    alt((
        value(Node::Assertion(Assertion::StartOfInput), char('^')),
        value(Node::Assertion(Assertion::EndOfInput), char('$')),
        value(Node::Assertion(Assertion::WordBoundary), tag("\\b")),
        value(Node::Assertion(Assertion::NotWordBoundary), tag("\\B")),
        map(
            preceded(tag("(?="), terminated_group_body),
            |body| Node::Assertion(Assertion::Lookahead { negative: false, body: Box::new(body) }),
        ),
        map(
            preceded(tag("(?!"), terminated_group_body),
            |body| Node::Assertion(Assertion::Lookahead { negative: true, body: Box::new(body) }),
        ),
    ))(input)
}

fn terminated_group_body(input: &str) -> IResult<&str, RegexAst> {
    let (rest, ast) = pattern(input)?;
    let (rest, _) = char(')')(rest)?;
    Ok((rest, ast))
}

fn group(input: &str) -> IResult<&str, Node> {
    alt((named_group, non_capturing_group, capturing_group))(input)
}

fn capturing_group(input: &str) -> IResult<&str, Node> {
    map(delimited(char('('), pattern, char(')')), |body| Node::Group {
        capturing: true,
        index: None,
        name: None,
        body: Box::new(body),
    })(input)
}

fn non_capturing_group(input: &str) -> IResult<&str, Node> {
    map(delimited(tag("(?:"), pattern, char(')')), |body| Node::Group {
        capturing: false,
        index: None,
        name: None,
        body: Box::new(body),
    })(input)
}

fn named_group(input: &str) -> IResult<&str, Node> {
    let (input, _) = tag("(?<")(input)?;
    let (input, name) = group_name(input)?;
    let (input, _) = char('>')(input)?;
    let (input, body) = pattern(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, Node::Group { capturing: true, index: None, name: Some(name), body: Box::new(body) }))
}

fn group_name(input: &str) -> IResult<&str, String> {
    map(many1(none_of(">")), |chars| chars.into_iter().collect())(input)
}

fn backreference(input: &str) -> IResult<&str, Node> {
    map(preceded(char('\\'), map_res(digit1, |s: &str| s.parse::<u32>())), Node::Backreference)(input)
}

fn period(input: &str) -> IResult<&str, Node> {
    value(Node::Period, char('.'))(input)
}

fn class_escape_kind(input: &str) -> IResult<&str, ClassEscape> {
    alt((
        value(ClassEscape::Digit, tag("\\d")),
        value(ClassEscape::NotDigit, tag("\\D")),
        value(ClassEscape::Word, tag("\\w")),
        value(ClassEscape::NotWord, tag("\\W")),
        value(ClassEscape::Space, tag("\\s")),
        value(ClassEscape::NotSpace, tag("\\S")),
    ))(input)
}

fn class_escape_atom(input: &str) -> IResult<&str, Node> {
    map(class_escape_kind, Node::ClassEscape)(input)
}

fn char_escape(input: &str) -> IResult<&str, Node> {
    map(preceded(char('\\'), nom::character::complete::anychar), Node::Char)(input)
}

fn literal_char(input: &str) -> IResult<&str, Node> {
    map(none_of("|)"), Node::Char)(input)
}

fn class(input: &str) -> IResult<&str, Node> {
    let (input, _) = char('[')(input)?;
    let (input, negated) = map(opt(char('^')), |c| c.is_some())(input)?;
    let (input, atoms) = many0(class_atom)(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, Node::Class { negated, atoms }))
}

fn class_atom(input: &str) -> IResult<&str, ClassAtom> {
    alt((class_range, map(class_escape_kind, ClassAtom::Escape), class_single))(input)
}

fn class_single(input: &str) -> IResult<&str, ClassAtom> {
    alt((
        map(preceded(char('\\'), nom::character::complete::anychar), ClassAtom::Char),
        map(none_of("]"), ClassAtom::Char),
    ))(input)
}

fn class_range(input: &str) -> IResult<&str, ClassAtom> {
    let (input, (lo, _, hi)) = tuple((class_range_endpoint, char('-'), class_range_endpoint))(input)?;
    Ok((input, ClassAtom::Range(lo, hi)))
}

fn class_range_endpoint(input: &str) -> IResult<&str, char> {
    alt((preceded(char('\\'), nom::character::complete::anychar), none_of("]-")))(input)
}

fn quantifier(input: &str) -> IResult<&str, Quantifier> {
    let (input, kind) = alt((
        value(QuantifierKind::ZeroOrMore, char('*')),
        value(QuantifierKind::OneOrMore, char('+')),
        value(QuantifierKind::ZeroOrOne, char('?')),
        bounded_quantifier,
    ))(input)?;
    let (input, lazy) = map(opt(char('?')), |c| c.is_some())(input)?;
    Ok((input, Quantifier { kind, lazy }))
}

fn bounded_quantifier(input: &str) -> IResult<&str, QuantifierKind> {
    let (input, _) = char('{')(input)?;
    let (input, min) = map_res(digit1, |s: &str| s.parse::<u32>())(input)?;
    let (input, max) = opt(preceded(char(','), opt(map_res(digit1, |s: &str| s.parse::<u32>()))))(input)?;
    let (input, _) = char('}')(input)?;
    let max = match max {
        None => Some(min),
        Some(explicit) => explicit,
    };
    Ok((input, QuantifierKind::Range { min, max }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternation_parses_two_branches() {
        let ast = parse_pattern("ab|cd").unwrap();
        assert_eq!(ast.alternatives.len(), 2);
    }

    #[test]
    fn slash_inside_class_is_literal() {
        let ast = parse_pattern("[/]").unwrap();
        assert_eq!(ast.alternatives.len(), 1);
        match &ast.alternatives[0].0[0] {
            Node::Class { atoms, .. } => assert_eq!(atoms.len(), 1),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn quantifier_applies_to_preceding_atom() {
        let ast = parse_pattern("a+").unwrap();
        match &ast.alternatives[0].0[0] {
            Node::Quantified { quantifier, .. } => {
                assert_eq!(quantifier.kind, QuantifierKind::OneOrMore);
                assert!(!quantifier.lazy);
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn lazy_bounded_quantifier_parses() {
        let ast = parse_pattern("a{2,4}?").unwrap();
        match &ast.alternatives[0].0[0] {
            Node::Quantified { quantifier, .. } => {
                assert!(quantifier.lazy);
                assert_eq!(quantifier.kind, QuantifierKind::Range { min: 2, max: Some(4) });
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn trailing_unmatched_paren_is_an_error() {
        assert!(parse_pattern("(a").is_err());
    }
}
