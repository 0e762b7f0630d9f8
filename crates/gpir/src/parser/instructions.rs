//! Literal, use, key, and instruction syntax.

use nom::branch::alt;
use nom::combinator::{map, opt};
use nom::multi::{many0, separated_list0};
use nom::IResult;

use crate::inst::BooleanOp;
use crate::parser::primitives::{
    block_name, case_name, field_name, global_ref, identifier, integer, keyword, quoted_string,
    sp, token, value_ref,
};
use crate::parser::types::ptype;
use crate::parser::{PInst, PKey, PKind, PLiteral, PRef, PUse};

fn fail(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

pub(crate) fn pliteral(input: &str) -> IResult<&str, PLiteral> {
    let (input, ()) = sp(input)?;
    if let Ok((rest, case)) = case_name(input) {
        let (rest, ()) = token("(")(rest)?;
        let (rest, assoc) = separated_list0(token(","), puse)(rest)?;
        let (rest, ()) = token(")")(rest)?;
        return Ok((rest, PLiteral::EnumCase(case, assoc)));
    }
    if let Ok((rest, ())) = token("{")(input) {
        let field = |i| -> IResult<&str, (String, PUse)> {
            let (i, name) = field_name(i)?;
            let (i, ()) = token("=")(i)?;
            let (i, value) = puse(i)?;
            Ok((i, (name, value)))
        };
        let (rest, fields) = separated_list0(token(","), field)(rest)?;
        let (rest, ()) = token("}")(rest)?;
        return Ok((rest, PLiteral::Struct(fields)));
    }
    if let Ok((rest, ())) = token("(")(input) {
        let (rest, elems) = separated_list0(token(","), puse)(rest)?;
        let (rest, ()) = token(")")(rest)?;
        return Ok((rest, PLiteral::Tuple(elems)));
    }
    let (rest, word) = identifier(input)?;
    let literal = match word {
        "true" => PLiteral::Bool(true),
        "false" => PLiteral::Bool(false),
        "zero" => PLiteral::Zero,
        "undefined" => PLiteral::Undefined,
        "null" => PLiteral::Null,
        _ => return Err(fail(input)),
    };
    Ok((rest, literal))
}

/// A use: `<ref>: <type>` or `<literal>: <type>`.
pub(crate) fn puse(input: &str) -> IResult<&str, PUse> {
    let (input, ()) = sp(input)?;
    if let Ok((rest, reference)) = value_ref(input) {
        let (rest, ()) = token(":")(rest)?;
        let (rest, ty) = ptype(rest)?;
        return Ok((rest, PUse::Ref(reference, ty)));
    }
    if let Ok((rest, name)) = global_ref(input) {
        let (rest, ()) = token(":")(rest)?;
        let (rest, ty) = ptype(rest)?;
        return Ok((rest, PUse::Ref(PRef::Global(name), ty)));
    }
    let (rest, literal) = pliteral(input)?;
    let (rest, ()) = token(":")(rest)?;
    let (rest, ty) = ptype(rest)?;
    Ok((rest, PUse::Literal(literal, ty)))
}

fn pkey(input: &str) -> IResult<&str, PKey> {
    let (input, ()) = sp(input)?;
    if let Ok((rest, name)) = field_name(input) {
        return Ok((rest, PKey::Name(name)));
    }
    if let Ok((rest, value)) = puse(input) {
        return Ok((rest, PKey::Value(value)));
    }
    map(integer, PKey::Index)(input)
}

fn key_path(input: &str) -> IResult<&str, Vec<PKey>> {
    let (input, ()) = token("[")(input)?;
    let (input, keys) = separated_list0(token(","), pkey)(input)?;
    let (input, ()) = token("]")(input)?;
    Ok((input, keys))
}

fn branch_target(input: &str) -> IResult<&str, (String, Vec<PUse>)> {
    let (input, target) = block_name(input)?;
    let (input, ()) = token("(")(input)?;
    let (input, args) = separated_list0(token(","), puse)(input)?;
    let (input, ()) = token(")")(input)?;
    Ok((input, (target, args)))
}

fn callee_ref(input: &str) -> IResult<&str, PRef> {
    alt((value_ref, map(global_ref, PRef::Global)))(input)
}

pub(crate) fn pkind(input: &str) -> IResult<&str, PKind> {
    let (after_word, word) = identifier(input)?;
    match word {
        "and" | "or" => {
            let op = if word == "and" {
                BooleanOp::And
            } else {
                BooleanOp::Or
            };
            let (rest, lhs) = puse(after_word)?;
            let (rest, ()) = token(",")(rest)?;
            let (rest, rhs) = puse(rest)?;
            Ok((rest, PKind::BooleanBinary(op, lhs, rhs)))
        }
        "not" => {
            let (rest, operand) = puse(after_word)?;
            Ok((rest, PKind::Not(operand)))
        }
        "literal" => {
            let (rest, literal) = pliteral(after_word)?;
            let (rest, ()) = token(":")(rest)?;
            let (rest, ty) = ptype(rest)?;
            Ok((rest, PKind::Literal(literal, ty)))
        }
        "apply" => {
            let (rest, callee) = callee_ref(after_word)?;
            let (rest, ()) = token("(")(rest)?;
            let (rest, args) = separated_list0(token(","), puse)(rest)?;
            let (rest, ()) = token(")")(rest)?;
            let (rest, ()) = token("->")(rest)?;
            let (rest, ret) = ptype(rest)?;
            Ok((rest, PKind::Apply(callee, args, ret)))
        }
        "extract" => {
            let (rest, keys) = key_path(after_word)?;
            let (rest, ()) = keyword("from")(rest)?;
            let (rest, from) = puse(rest)?;
            Ok((rest, PKind::Extract(from, keys)))
        }
        "insert" => {
            let (rest, source) = puse(after_word)?;
            let (rest, ()) = keyword("to")(rest)?;
            let (rest, dest) = puse(rest)?;
            let (rest, ()) = keyword("at")(rest)?;
            let (rest, keys) = key_path(rest)?;
            Ok((rest, PKind::Insert { source, dest, keys }))
        }
        "branch" => {
            let (rest, (target, args)) = branch_target(after_word)?;
            Ok((rest, PKind::Branch(target, args)))
        }
        "conditional" => {
            let (rest, condition) = puse(after_word)?;
            let (rest, ()) = keyword("then")(rest)?;
            let (rest, (then_target, then_args)) = branch_target(rest)?;
            let (rest, ()) = keyword("else")(rest)?;
            let (rest, (else_target, else_args)) = branch_target(rest)?;
            Ok((
                rest,
                PKind::Conditional {
                    condition,
                    then_target,
                    then_args,
                    else_target,
                    else_args,
                },
            ))
        }
        "branchEnum" => {
            let (rest, subject) = puse(after_word)?;
            let case = |i| -> IResult<&str, (String, String)> {
                let (i, ()) = keyword("case")(i)?;
                let (i, case) = case_name(i)?;
                let (i, target) = block_name(i)?;
                Ok((i, (case, target)))
            };
            let (rest, cases) = many0(case)(rest)?;
            Ok((rest, PKind::BranchEnum(subject, cases)))
        }
        "load" => {
            let (rest, pointer) = puse(after_word)?;
            Ok((rest, PKind::Load(pointer)))
        }
        "store" => {
            let (rest, value) = puse(after_word)?;
            let (rest, ()) = keyword("to")(rest)?;
            let (rest, pointer) = puse(rest)?;
            Ok((rest, PKind::Store { value, pointer }))
        }
        "elementPointer" => {
            let (rest, pointer) = puse(after_word)?;
            let (rest, ()) = keyword("at")(rest)?;
            let (rest, keys) = key_path(rest)?;
            Ok((rest, PKind::ElementPointer(pointer, keys)))
        }
        "builtin" => {
            let (rest, intrinsic) = quoted_string(after_word)?;
            let (rest, ()) = token("(")(rest)?;
            let (rest, operands) = separated_list0(token(","), puse)(rest)?;
            let (rest, ()) = token(")")(rest)?;
            Ok((rest, PKind::Builtin(intrinsic, operands)))
        }
        "return" => {
            let (rest, value) = opt(puse)(after_word)?;
            Ok((rest, PKind::Return(value)))
        }
        "trap" => Ok((after_word, PKind::Trap)),
        _ => Err(fail(input)),
    }
}

/// An instruction: optional `%<id> =` prefix, then a kind. A positional id
/// (`%0.1`) records no name.
pub(crate) fn pinst(input: &str) -> IResult<&str, PInst> {
    let prefix = |i| -> IResult<&str, PRef> {
        let (i, reference) = value_ref(i)?;
        let (i, ()) = token("=")(i)?;
        Ok((i, reference))
    };
    let (input, prefix) = opt(prefix)(input)?;
    let name = match prefix {
        Some(PRef::Value(name)) => Some(name),
        _ => None,
    };
    let (input, kind) = pkind(input)?;
    Ok((input, PInst { name, kind }))
}
