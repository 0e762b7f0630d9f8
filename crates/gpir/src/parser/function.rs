//! Function and block syntax.

use nom::combinator::opt;
use nom::multi::{many0, separated_list0};
use nom::IResult;

use crate::parser::instructions::pinst;
use crate::parser::primitives::{
    block_name, global_ref, identifier, keyword, sp, token, value_ref,
};
use crate::parser::types::ptype;
use crate::parser::{PBlock, PFunc, PRef};

fn block_param(input: &str) -> IResult<&str, (String, crate::parser::PType)> {
    let (input, reference) = value_ref(input)?;
    let PRef::Value(name) = reference else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    };
    let (input, ()) = token(":")(input)?;
    let (input, ty) = ptype(input)?;
    Ok((input, (name, ty)))
}

pub(crate) fn pblock(input: &str) -> IResult<&str, PBlock> {
    let (input, name) = block_name(input)?;
    let (input, ()) = token("(")(input)?;
    let (input, params) = separated_list0(token(","), block_param)(input)?;
    let (input, ()) = token(")")(input)?;
    let (input, ()) = token(":")(input)?;
    let (input, insts) = many0(pinst)(input)?;
    Ok((
        input,
        PBlock {
            name,
            params,
            insts,
        },
    ))
}

pub(crate) fn pfunc(input: &str) -> IResult<&str, PFunc> {
    let attribute = |i| -> IResult<&str, String> {
        let (i, ()) = token("[")(i)?;
        let (i, name) = identifier(i)?;
        let (i, ()) = token("]")(i)?;
        Ok((i, name.to_string()))
    };
    let (input, attributes) = many0(attribute)(input)?;
    let (input, external) = opt(keyword("external"))(input)?;
    let (input, ()) = keyword("func")(input)?;
    let (input, name) = global_ref(input)?;
    let (input, ()) = token(":")(input)?;
    let (input, ()) = token("(")(input)?;
    let (input, params) = separated_list0(token(","), ptype)(input)?;
    let (input, ()) = token(")")(input)?;
    let (input, ()) = token("->")(input)?;
    let (input, ret) = ptype(input)?;

    let external = external.is_some();
    if external {
        return Ok((
            input,
            PFunc {
                attributes,
                external,
                name,
                params,
                ret,
                blocks: Vec::new(),
            },
        ));
    }

    let (input, ()) = token("{")(input)?;
    let (input, blocks) = many0(pblock)(input)?;
    let (input, ()) = token("}")(input)?;
    let (input, ()) = sp(input)?;
    Ok((
        input,
        PFunc {
            attributes,
            external,
            name,
            params,
            ret,
            blocks,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PKind, PType};

    #[test]
    fn test_parse_block() {
        let text = "'entry(%x: bool):\n    %r = not %x: bool\n    return %r: bool\n";
        let (rest, block) = pblock(text).unwrap();
        assert_eq!(rest.trim(), "");
        assert_eq!(block.name, "entry");
        assert_eq!(block.params, vec![("x".to_string(), PType::Bool)]);
        assert_eq!(block.insts.len(), 2);
    }

    #[test]
    fn test_parse_function_with_blocks() {
        let text = "\
func @id: (bool) -> bool {
'entry(%x: bool):
    return %x: bool
}";
        let (rest, func) = pfunc(text).unwrap();
        assert_eq!(rest, "");
        assert_eq!(func.name, "id");
        assert_eq!(func.params, vec![PType::Bool]);
        assert!(!func.external);
        assert_eq!(func.blocks.len(), 1);
        assert!(matches!(func.blocks[0].insts[0].kind, PKind::Return(Some(_))));
    }

    #[test]
    fn test_parse_external_function() {
        let (rest, func) = pfunc("[inline] external func @e: (bool) -> ()\n").unwrap();
        assert_eq!(rest.trim(), "");
        assert!(func.external);
        assert_eq!(func.attributes, vec!["inline".to_string()]);
        assert!(func.blocks.is_empty());
    }

    #[test]
    fn test_parse_multi_block_function() {
        let text = "\
func @f: () -> () {
'entry():
    branch 'next()
'next():
    return
}";
        let (rest, func) = pfunc(text).unwrap();
        assert_eq!(rest, "");
        assert_eq!(func.blocks.len(), 2);
        assert_eq!(func.blocks[1].name, "next");
    }
}
