//! Literals, uses, and definitions.
//!
//! A `Use` is the operand form of the IR: either an immediate literal with an
//! explicit type, or a reference to a definition. Definitions are the four
//! value-producing entities. Because uses store entity IDs, the operand graph
//! never aliases the ownership graph.

use crate::entity::{Arg, FuncId, Inst, VarId};
use crate::types::Type;

/// A constant form.
///
/// Equality is structural. Composite literals carry uses, so a literal can
/// embed references to definitions; the verifier restricts where such nested
/// literals may appear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// An unspecified value of the annotated type.
    Undefined,
    /// The null pointer.
    Null,
    /// The zero-initialized value of the annotated type.
    Zero,
    /// A boolean constant.
    Bool(bool),
    /// A tuple of element uses.
    Tuple(Vec<Use>),
    /// A struct value as ordered (field name, use) pairs.
    Struct(Vec<(String, Use)>),
    /// An enum case with its associated uses.
    EnumCase(String, Vec<Use>),
}

impl Literal {
    /// Whether this literal may appear as an operand outside a `Literal`
    /// instruction. Only booleans may.
    pub fn is_operand_safe(&self) -> bool {
        matches!(self, Literal::Bool(_))
    }

    /// Visit every use embedded in this literal, recursively.
    pub fn for_each_use<'a>(&'a self, f: &mut impl FnMut(&'a Use)) {
        match self {
            Literal::Undefined | Literal::Null | Literal::Zero | Literal::Bool(_) => {}
            Literal::Tuple(elems) => {
                for elem in elems {
                    f(elem);
                    elem.for_each_nested_use(f);
                }
            }
            Literal::Struct(fields) => {
                for (_, field) in fields {
                    f(field);
                    field.for_each_nested_use(f);
                }
            }
            Literal::EnumCase(_, assoc) => {
                for elem in assoc {
                    f(elem);
                    elem.for_each_nested_use(f);
                }
            }
        }
    }

    /// Visit every use embedded in this literal mutably, recursively.
    pub fn for_each_use_mut(&mut self, f: &mut impl FnMut(&mut Use)) {
        match self {
            Literal::Undefined | Literal::Null | Literal::Zero | Literal::Bool(_) => {}
            Literal::Tuple(elems) => {
                for elem in elems {
                    f(elem);
                    elem.for_each_nested_use_mut(f);
                }
            }
            Literal::Struct(fields) => {
                for (_, field) in fields {
                    f(field);
                    field.for_each_nested_use_mut(f);
                }
            }
            Literal::EnumCase(_, assoc) => {
                for elem in assoc {
                    f(elem);
                    elem.for_each_nested_use_mut(f);
                }
            }
        }
    }
}

/// A value-producing entity: argument, instruction, module global, or
/// function. Function references may cross function boundaries; the other
/// three are local to their owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Definition {
    Arg(Arg),
    Inst(Inst),
    Var(VarId),
    Func(FuncId),
}

/// An operand: a typed literal or a reference to a definition.
///
/// Literals carry their type explicitly; a definition reference takes its
/// type from the referent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Use {
    Literal { ty: Type, literal: Literal },
    Def(Definition),
}

impl Use {
    /// A boolean literal use.
    pub fn bool(value: bool) -> Use {
        Use::Literal {
            ty: Type::Bool,
            literal: Literal::Bool(value),
        }
    }

    /// The void tuple use, `(): ()`.
    pub fn void_tuple() -> Use {
        Use::Literal {
            ty: Type::void(),
            literal: Literal::Tuple(Vec::new()),
        }
    }

    /// A reference to an instruction's value.
    pub fn inst(inst: Inst) -> Use {
        Use::Def(Definition::Inst(inst))
    }

    /// A reference to a block parameter.
    pub fn arg(arg: Arg) -> Use {
        Use::Def(Definition::Arg(arg))
    }

    /// The referenced definition, if this use is a reference.
    pub fn definition(&self) -> Option<Definition> {
        match self {
            Use::Def(def) => Some(*def),
            Use::Literal { .. } => None,
        }
    }

    fn for_each_nested_use<'a>(&'a self, f: &mut impl FnMut(&'a Use)) {
        if let Use::Literal { literal, .. } = self {
            literal.for_each_use(f);
        }
    }

    fn for_each_nested_use_mut(&mut self, f: &mut impl FnMut(&mut Use)) {
        if let Use::Literal { literal, .. } = self {
            literal.for_each_use_mut(f);
        }
    }
}

/// A key in an element access path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKey {
    /// Positional access (tuples; pointer offsets).
    Index(usize),
    /// Named access (struct fields).
    Name(String),
    /// Dynamic access by value (pointer offsets).
    Value(Use),
}
