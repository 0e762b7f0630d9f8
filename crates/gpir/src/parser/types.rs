//! Type syntax: `bool`, `(T, …)`, `*T`, `(A, …) -> R`, `$Name`.

use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::IResult;

use crate::parser::primitives::{identifier, sp, token, type_name};
use crate::parser::PType;

pub(crate) fn ptype(input: &str) -> IResult<&str, PType> {
    let (input, ()) = sp(input)?;
    if let Ok((rest, ())) = token("*")(input) {
        let (rest, pointee) = ptype(rest)?;
        return Ok((rest, PType::Pointer(Box::new(pointee))));
    }
    if let Ok((rest, name)) = type_name(input) {
        return Ok((rest, PType::Named(name)));
    }
    if let Ok((rest, ())) = token("(")(input) {
        let (rest, elems) = separated_list0(token(","), ptype)(rest)?;
        let (rest, ()) = token(")")(rest)?;
        let (rest, arrow) = opt(token("->"))(rest)?;
        return if arrow.is_some() {
            let (rest, ret) = ptype(rest)?;
            Ok((rest, PType::Function(elems, Box::new(ret))))
        } else {
            Ok((rest, PType::Tuple(elems)))
        };
    }
    let (rest, word) = identifier(input)?;
    match word {
        "bool" => Ok((rest, PType::Bool)),
        "invalid" => Ok((rest, PType::Invalid)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_types() {
        assert_eq!(ptype(" bool,"), Ok((",", PType::Bool)));
        assert_eq!(ptype("()"), Ok(("", PType::Tuple(vec![]))));
        assert_eq!(
            ptype("$Thing "),
            Ok((" ", PType::Named("Thing".to_string())))
        );
    }

    #[test]
    fn test_compound_types() {
        assert_eq!(
            ptype("*bool"),
            Ok(("", PType::Pointer(Box::new(PType::Bool))))
        );
        assert_eq!(
            ptype("(bool, bool)"),
            Ok(("", PType::Tuple(vec![PType::Bool, PType::Bool])))
        );
        assert_eq!(
            ptype("(bool) -> bool"),
            Ok((
                "",
                PType::Function(vec![PType::Bool], Box::new(PType::Bool))
            ))
        );
        assert_eq!(
            ptype("() -> ()"),
            Ok(("", PType::Function(vec![], Box::new(PType::Tuple(vec![])))))
        );
    }

    #[test]
    fn test_nested_pointer_to_function() {
        assert_eq!(
            ptype("*(bool) -> bool"),
            Ok((
                "",
                PType::Pointer(Box::new(PType::Function(
                    vec![PType::Bool],
                    Box::new(PType::Bool)
                )))
            ))
        );
    }

    #[test]
    fn test_unknown_word_rejected() {
        assert!(ptype("word").is_err());
    }
}
