//! Primitive parsers: whitespace, identifiers, sigils, literals.

use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;
use nom::combinator::map_res;
use nom::error::{Error, ErrorKind};
use nom::sequence::preceded;
use nom::IResult;

use crate::parser::PRef;

/// Skip whitespace and `//` line comments.
pub(crate) fn sp(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        match trimmed.strip_prefix("//") {
            Some(comment) => {
                rest = match comment.split_once('\n') {
                    Some((_, after)) => after,
                    None => "",
                };
            }
            None => return Ok((trimmed, ())),
        }
    }
}

fn err(input: &str, kind: ErrorKind) -> nom::Err<Error<&str>> {
    nom::Err::Error(Error::new(input, kind))
}

/// A raw identifier: `[A-Za-z_][A-Za-z0-9_.]*`, no leading whitespace skip.
pub(crate) fn identifier_raw(input: &str) -> IResult<&str, &str> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return Err(err(input, ErrorKind::Alpha)),
    }
    let end = input
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    Ok((&input[end..], &input[..end]))
}

/// An identifier preceded by insignificant whitespace.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    let (input, ()) = sp(input)?;
    identifier_raw(input)
}

/// Expect a specific keyword (an identifier, compared whole).
pub(crate) fn keyword(word: &'static str) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input| {
        let (rest, ident) = identifier(input)?;
        if ident == word {
            Ok((rest, ()))
        } else {
            Err(err(input, ErrorKind::Tag))
        }
    }
}

/// Expect a punctuation token, skipping leading whitespace.
pub(crate) fn token(t: &'static str) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input| {
        let (input, ()) = sp(input)?;
        let (rest, _) = tag(t)(input)?;
        Ok((rest, ()))
    }
}

/// An unsigned decimal integer.
pub(crate) fn integer(input: &str) -> IResult<&str, usize> {
    let (input, ()) = sp(input)?;
    map_res(take_while1(|c: char| c.is_ascii_digit()), |s: &str| {
        s.parse::<usize>()
    })(input)
}

/// A quoted string with `\"`, `\\`, `\n`, `\t`, `\r` escapes.
pub(crate) fn quoted_string(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (after_quote, _) = char('"')(input)?;
    let mut escaped = false;
    for (i, c) in after_quote.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => {
                let contents = &after_quote[..i];
                return Ok((&after_quote[i + 1..], crate::ident::unescape(contents)));
            }
            _ => {}
        }
    }
    Err(err(input, ErrorKind::Char))
}

/// A `%`-sigiled value reference: named, or positional `<block>.<index>`.
pub(crate) fn value_ref(input: &str) -> IResult<&str, PRef> {
    let (input, ()) = sp(input)?;
    let (rest, _) = char('%')(input)?;
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        let (rest, block) = map_res(take_while1(|c: char| c.is_ascii_digit()), |s: &str| {
            s.parse::<usize>()
        })(rest)?;
        let (rest, _) = char('.')(rest)?;
        let (rest, index) = map_res(take_while1(|c: char| c.is_ascii_digit()), |s: &str| {
            s.parse::<usize>()
        })(rest)?;
        Ok((rest, PRef::Positional(block, index)))
    } else {
        let (rest, name) = identifier_raw(rest)?;
        Ok((rest, PRef::Value(name.to_string())))
    }
}

/// A `@`-sigiled global reference.
pub(crate) fn global_ref(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (rest, name) = preceded(char('@'), identifier_raw)(input)?;
    Ok((rest, name.to_string()))
}

/// A `'`-sigiled block name.
pub(crate) fn block_name(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (rest, name) = preceded(char('\''), identifier_raw)(input)?;
    Ok((rest, name.to_string()))
}

/// A `$`-sigiled type name.
pub(crate) fn type_name(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (rest, name) = preceded(char('$'), identifier_raw)(input)?;
    Ok((rest, name.to_string()))
}

/// A `#`-sigiled field name.
pub(crate) fn field_name(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (rest, name) = preceded(char('#'), identifier_raw)(input)?;
    Ok((rest, name.to_string()))
}

/// A `?`-sigiled enum case name.
pub(crate) fn case_name(input: &str) -> IResult<&str, String> {
    let (input, ()) = sp(input)?;
    let (rest, name) = preceded(char('?'), identifier_raw)(input)?;
    Ok((rest, name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sp_skips_comments() {
        let (rest, ()) = sp("  // a comment\n  // another\n token").unwrap();
        assert_eq!(rest, "token");
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier(" foo rest"), Ok((" rest", "foo")));
        assert_eq!(identifier("then_join.1("), Ok(("(", "then_join.1")));
        assert!(identifier(" 0abc").is_err());
    }

    #[test]
    fn test_keyword_must_match_whole() {
        assert!(keyword("and")(" and x").is_ok());
        assert!(keyword("and")(" android").is_err());
    }

    #[test]
    fn test_quoted_string_escapes() {
        let (rest, s) = quoted_string(" \"a\\\"b\\n\" tail").unwrap();
        assert_eq!(s, "a\"b\n");
        assert_eq!(rest, " tail");
    }

    #[test]
    fn test_value_refs() {
        assert_eq!(
            value_ref(" %foo,"),
            Ok((",", PRef::Value("foo".to_string())))
        );
        assert_eq!(value_ref("%0.12 "), Ok((" ", PRef::Positional(0, 12))));
        assert!(value_ref("foo").is_err());
    }

    #[test]
    fn test_sigils() {
        assert_eq!(global_ref(" @g:"), Ok((":", "g".to_string())));
        assert_eq!(block_name(" 'entry("), Ok(("(", "entry".to_string())));
        assert_eq!(type_name(" $T "), Ok((" ", "T".to_string())));
        assert_eq!(field_name("#foo ="), Ok((" =", "foo".to_string())));
        assert_eq!(case_name("?some("), Ok(("(", "some".to_string())));
    }
}
