//! Parser for the textual IR form.
//!
//! Parsing happens in two stages: nom combinators produce a loose syntax
//! tree (the `P*` types below) in which types and definitions are still
//! names, then `resolve` turns that tree into a real [`Module`], minting
//! entities and re-inferring instruction result types. Whitespace between
//! tokens is insignificant and `//` starts a line comment.

mod function;
mod instructions;
mod module;
mod primitives;
mod resolve;
mod types;

use thiserror::Error;

use crate::intrinsics::IntrinsicRegistry;
use crate::module::Module;

/// A parse or resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    /// Build an error pointing at `remaining`, a suffix of `input`.
    fn at(input: &str, remaining: &str, message: impl Into<String>) -> Self {
        let consumed = input.len().saturating_sub(remaining.len());
        let line = input[..consumed].chars().filter(|&c| c == '\n').count() + 1;
        Self {
            line,
            message: message.into(),
        }
    }

    /// An error without a useful position.
    fn whole_input(message: impl Into<String>) -> Self {
        Self {
            line: 1,
            message: message.into(),
        }
    }
}

/// Parse a complete module from IR text.
pub fn parse_module(
    input: &str,
    intrinsics: &IntrinsicRegistry,
) -> Result<Module, ParseError> {
    let parsed = match module::parse_module_syntax(input) {
        Ok(("", parsed)) => parsed,
        Ok((remaining, parsed)) => {
            let (rest, ()) = primitives::sp(remaining)
                .map_err(|_| ParseError::whole_input("unreadable trailing input"))?;
            if !rest.is_empty() {
                return Err(ParseError::at(input, rest, "unexpected trailing input"));
            }
            parsed
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::at(input, e.input, "malformed module"));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ParseError::whole_input("incomplete input"));
        }
    };
    resolve::resolve_module(parsed, intrinsics)
}

// ============================================================================
// Loose syntax tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PType {
    Bool,
    Tuple(Vec<PType>),
    Pointer(Box<PType>),
    Function(Vec<PType>, Box<PType>),
    Named(String),
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PLiteral {
    Undefined,
    Null,
    Zero,
    Bool(bool),
    Tuple(Vec<PUse>),
    Struct(Vec<(String, PUse)>),
    EnumCase(String, Vec<PUse>),
}

/// A sigil-stripped reference to a definition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PRef {
    /// `%name`: an argument or named instruction.
    Value(String),
    /// `%<block>.<index>`: an unnamed instruction by position.
    Positional(usize, usize),
    /// `@name`: a global variable or function.
    Global(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PUse {
    Ref(PRef, PType),
    Literal(PLiteral, PType),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PKey {
    Index(usize),
    Name(String),
    Value(PUse),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PKind {
    Builtin(String, Vec<PUse>),
    Branch(String, Vec<PUse>),
    Conditional {
        condition: PUse,
        then_target: String,
        then_args: Vec<PUse>,
        else_target: String,
        else_args: Vec<PUse>,
    },
    BranchEnum(PUse, Vec<(String, String)>),
    Return(Option<PUse>),
    Literal(PLiteral, PType),
    BooleanBinary(crate::inst::BooleanOp, PUse, PUse),
    Not(PUse),
    Extract(PUse, Vec<PKey>),
    Insert {
        source: PUse,
        dest: PUse,
        keys: Vec<PKey>,
    },
    Apply(PRef, Vec<PUse>, PType),
    Load(PUse),
    Store {
        value: PUse,
        pointer: PUse,
    },
    ElementPointer(PUse, Vec<PKey>),
    Trap,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PInst {
    pub name: Option<String>,
    pub kind: PKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PBlock {
    pub name: String,
    pub params: Vec<(String, PType)>,
    pub insts: Vec<PInst>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PFunc {
    pub attributes: Vec<String>,
    pub external: bool,
    pub name: String,
    pub params: Vec<PType>,
    pub ret: PType,
    pub blocks: Vec<PBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PModule {
    pub name: String,
    pub stage: String,
    pub enums: Vec<(String, Vec<(String, Vec<PType>)>)>,
    pub structs: Vec<(String, Vec<(String, PType)>)>,
    pub aliases: Vec<(String, Option<PType>)>,
    pub variables: Vec<(String, PType)>,
    pub functions: Vec<PFunc>,
}
