//! Instruction kinds, operand access, and type inference.
//!
//! An instruction is a kind payload plus bookkeeping (optional name, cached
//! result type, parent block). The kind set is closed; every embedded operand
//! is reachable through the uniform [`InstKind::for_each_use`] /
//! [`InstKind::for_each_use_mut`] walkers, which is what makes substitution a
//! single pass instead of a per-variant case analysis.

use std::fmt;

use crate::entity::{Block, EntityRef};
use crate::function::Function;
use crate::intrinsics::IntrinsicRegistry;
use crate::literal::{Definition, ElementKey, Literal, Use};
use crate::module::Module;
use crate::types::Type;

/// Binary boolean operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BooleanOp {
    And,
    Or,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanOp::And => write!(f, "and"),
            BooleanOp::Or => write!(f, "or"),
        }
    }
}

/// The closed set of instruction kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Intrinsic invocation by opcode string.
    Builtin {
        intrinsic: String,
        operands: Vec<Use>,
    },
    /// Unconditional branch with block arguments.
    Branch { target: Block, args: Vec<Use> },
    /// Two-way branch on a boolean condition.
    Conditional {
        condition: Use,
        then_target: Block,
        then_args: Vec<Use>,
        else_target: Block,
        else_args: Vec<Use>,
    },
    /// Multi-way branch on an enum subject. Each target block receives the
    /// case's associated values as parameters.
    BranchEnum {
        subject: Use,
        cases: Vec<(String, Block)>,
    },
    /// Function return.
    Return(Option<Use>),
    /// Literal constructor with its declared type.
    Literal { literal: Literal, ty: Type },
    /// Binary boolean operation.
    BooleanBinary { op: BooleanOp, lhs: Use, rhs: Use },
    /// Boolean negation.
    Not(Use),
    /// Element extraction along a key path.
    Extract { from: Use, keys: Vec<ElementKey> },
    /// Functional element replacement along a key path.
    Insert {
        source: Use,
        dest: Use,
        keys: Vec<ElementKey>,
    },
    /// Function application.
    Apply { callee: Use, args: Vec<Use> },
    /// Load through a pointer.
    Load(Use),
    /// Store through a pointer.
    Store { value: Use, pointer: Use },
    /// Pointer arithmetic along a key path.
    ElementPointer { pointer: Use, keys: Vec<ElementKey> },
    /// Abort execution.
    Trap,
}

impl InstKind {
    /// Is this kind a block terminator?
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. }
                | InstKind::Conditional { .. }
                | InstKind::BranchEnum { .. }
                | InstKind::Return(_)
                | InstKind::Trap
        )
    }

    /// Does this instruction have observable effects?
    ///
    /// Loads are treated as effectful: the address may be sensitive.
    /// `apply` is effectful unless the callee is a function marked pure;
    /// `builtin` follows the registry's purity policy.
    pub fn has_side_effects(
        &self,
        intrinsics: &IntrinsicRegistry,
        pure_callees: &[bool],
    ) -> bool {
        match self {
            InstKind::Literal { .. }
            | InstKind::BooleanBinary { .. }
            | InstKind::Not(_)
            | InstKind::Extract { .. }
            | InstKind::Insert { .. }
            | InstKind::ElementPointer { .. } => false,
            InstKind::Apply { callee, .. } => match callee.definition() {
                Some(Definition::Func(func)) => {
                    !pure_callees.get(func.index()).copied().unwrap_or(false)
                }
                _ => true,
            },
            InstKind::Builtin { intrinsic, .. } => intrinsics
                .get(intrinsic)
                .map(|i| !i.pure)
                .unwrap_or(true),
            InstKind::Branch { .. }
            | InstKind::Conditional { .. }
            | InstKind::BranchEnum { .. }
            | InstKind::Return(_)
            | InstKind::Load(_)
            | InstKind::Store { .. }
            | InstKind::Trap => true,
        }
    }

    /// Branch targets with their explicit argument lists. `branchEnum`
    /// targets receive case payloads implicitly and report no arguments.
    pub fn branch_targets(&self) -> Vec<(Block, &[Use])> {
        match self {
            InstKind::Branch { target, args } => vec![(*target, args.as_slice())],
            InstKind::Conditional {
                then_target,
                then_args,
                else_target,
                else_args,
                ..
            } => vec![
                (*then_target, then_args.as_slice()),
                (*else_target, else_args.as_slice()),
            ],
            InstKind::BranchEnum { cases, .. } => {
                cases.iter().map(|(_, target)| (*target, &[][..])).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Rewrite every embedded branch target.
    pub fn rewrite_branch_targets(&mut self, mut f: impl FnMut(&mut Block)) {
        match self {
            InstKind::Branch { target, .. } => f(target),
            InstKind::Conditional {
                then_target,
                else_target,
                ..
            } => {
                f(then_target);
                f(else_target);
            }
            InstKind::BranchEnum { cases, .. } => {
                for (_, target) in cases {
                    f(target);
                }
            }
            _ => {}
        }
    }

    /// Visit every use embedded in this kind, including uses nested inside
    /// literal operands and inside `Value` element keys.
    pub fn for_each_use<'a>(&'a self, mut f: impl FnMut(&'a Use)) {
        self.for_each_use_inner(&mut f);
    }

    fn for_each_use_inner<'a>(&'a self, f: &mut impl FnMut(&'a Use)) {
        fn visit<'a>(u: &'a Use, f: &mut impl FnMut(&'a Use)) {
            f(u);
            if let Use::Literal { literal, .. } = u {
                literal.for_each_use(f);
            }
        }
        fn visit_keys<'a>(keys: &'a [ElementKey], f: &mut impl FnMut(&'a Use)) {
            for key in keys {
                if let ElementKey::Value(u) = key {
                    visit(u, f);
                }
            }
        }
        match self {
            InstKind::Builtin { operands, .. } => {
                for u in operands {
                    visit(u, f);
                }
            }
            InstKind::Branch { args, .. } => {
                for u in args {
                    visit(u, f);
                }
            }
            InstKind::Conditional {
                condition,
                then_args,
                else_args,
                ..
            } => {
                visit(condition, f);
                for u in then_args {
                    visit(u, f);
                }
                for u in else_args {
                    visit(u, f);
                }
            }
            InstKind::BranchEnum { subject, .. } => visit(subject, f),
            InstKind::Return(value) => {
                if let Some(value) = value {
                    visit(value, f);
                }
            }
            InstKind::Literal { literal, .. } => literal.for_each_use(f),
            InstKind::BooleanBinary { lhs, rhs, .. } => {
                visit(lhs, f);
                visit(rhs, f);
            }
            InstKind::Not(operand) => visit(operand, f),
            InstKind::Extract { from, keys } => {
                visit(from, f);
                visit_keys(keys, f);
            }
            InstKind::Insert { source, dest, keys } => {
                visit(source, f);
                visit(dest, f);
                visit_keys(keys, f);
            }
            InstKind::Apply { callee, args } => {
                visit(callee, f);
                for u in args {
                    visit(u, f);
                }
            }
            InstKind::Load(pointer) => visit(pointer, f),
            InstKind::Store { value, pointer } => {
                visit(value, f);
                visit(pointer, f);
            }
            InstKind::ElementPointer { pointer, keys } => {
                visit(pointer, f);
                visit_keys(keys, f);
            }
            InstKind::Trap => {}
        }
    }

    /// Visit every embedded use mutably.
    pub fn for_each_use_mut(&mut self, mut f: impl FnMut(&mut Use)) {
        self.for_each_use_mut_inner(&mut f);
    }

    fn for_each_use_mut_inner(&mut self, f: &mut impl FnMut(&mut Use)) {
        fn visit(u: &mut Use, f: &mut impl FnMut(&mut Use)) {
            f(u);
            if let Use::Literal { literal, .. } = u {
                literal.for_each_use_mut(f);
            }
        }
        fn visit_keys(keys: &mut [ElementKey], f: &mut impl FnMut(&mut Use)) {
            for key in keys {
                if let ElementKey::Value(u) = key {
                    visit(u, f);
                }
            }
        }
        match self {
            InstKind::Builtin { operands, .. } => {
                for u in operands {
                    visit(u, f);
                }
            }
            InstKind::Branch { args, .. } => {
                for u in args {
                    visit(u, f);
                }
            }
            InstKind::Conditional {
                condition,
                then_args,
                else_args,
                ..
            } => {
                visit(condition, f);
                for u in then_args {
                    visit(u, f);
                }
                for u in else_args {
                    visit(u, f);
                }
            }
            InstKind::BranchEnum { subject, .. } => visit(subject, f),
            InstKind::Return(value) => {
                if let Some(value) = value {
                    visit(value, f);
                }
            }
            InstKind::Literal { literal, .. } => literal.for_each_use_mut(f),
            InstKind::BooleanBinary { lhs, rhs, .. } => {
                visit(lhs, f);
                visit(rhs, f);
            }
            InstKind::Not(operand) => visit(operand, f),
            InstKind::Extract { from, keys } => {
                visit(from, f);
                visit_keys(keys, f);
            }
            InstKind::Insert { source, dest, keys } => {
                visit(source, f);
                visit(dest, f);
                visit_keys(keys, f);
            }
            InstKind::Apply { callee, args } => {
                visit(callee, f);
                for u in args {
                    visit(u, f);
                }
            }
            InstKind::Load(pointer) => visit(pointer, f),
            InstKind::Store { value, pointer } => {
                visit(value, f);
                visit(pointer, f);
            }
            InstKind::ElementPointer { pointer, keys } => {
                visit(pointer, f);
                visit_keys(keys, f);
            }
            InstKind::Trap => {}
        }
    }

    /// Infer the result type of this kind from its operand types.
    ///
    /// Ill-typed combinations yield `Type::Invalid`; the verifier turns that
    /// into a diagnostic. Terminators, `store`, and `trap` are void.
    pub fn result_type(
        &self,
        func: &Function,
        module: &Module,
        intrinsics: &IntrinsicRegistry,
    ) -> Type {
        match self {
            InstKind::Literal { ty, .. } => ty.clone(),
            InstKind::BooleanBinary { .. } | InstKind::Not(_) => Type::Bool,
            InstKind::Apply { callee, args } => {
                let callee_ty = module.canonical(&module.use_type(func, callee));
                let Type::Function(params, ret) = callee_ty else {
                    return Type::Invalid;
                };
                if params.len() != args.len() {
                    return Type::Invalid;
                }
                for (param, arg) in params.iter().zip(args) {
                    if !module.type_eq(param, &module.use_type(func, arg)) {
                        return Type::Invalid;
                    }
                }
                *ret
            }
            InstKind::Extract { from, keys } => {
                let from_ty = module.use_type(func, from);
                module
                    .element_type(&from_ty, keys)
                    .unwrap_or(Type::Invalid)
            }
            InstKind::Insert { source, dest, keys } => {
                let dest_ty = module.use_type(func, dest);
                let source_ty = module.use_type(func, source);
                match module.element_type(&dest_ty, keys) {
                    Some(elem) if module.type_eq(&elem, &source_ty) => dest_ty,
                    _ => Type::Invalid,
                }
            }
            InstKind::Load(pointer) => {
                match module.canonical(&module.use_type(func, pointer)) {
                    Type::Pointer(pointee) => *pointee,
                    _ => Type::Invalid,
                }
            }
            InstKind::ElementPointer { pointer, keys } => {
                match module.canonical(&module.use_type(func, pointer)) {
                    Type::Pointer(pointee) => module
                        .element_type(&pointee, keys)
                        .map(Type::pointer)
                        .unwrap_or(Type::Invalid),
                    _ => Type::Invalid,
                }
            }
            InstKind::Builtin { intrinsic, .. } => intrinsics
                .get(intrinsic)
                .map(|i| i.result.clone())
                .unwrap_or(Type::Invalid),
            InstKind::Branch { .. }
            | InstKind::Conditional { .. }
            | InstKind::BranchEnum { .. }
            | InstKind::Return(_)
            | InstKind::Store { .. }
            | InstKind::Trap => Type::void(),
        }
    }
}

/// An instruction: kind payload plus bookkeeping.
///
/// `ty` caches the inferred result type; it is established at creation and
/// preserved by type-safe substitution. `block` is the parent back-reference;
/// `None` means detached from the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstData {
    pub name: Option<String>,
    pub kind: InstKind,
    pub ty: Type,
    pub block: Option<Block>,
}
