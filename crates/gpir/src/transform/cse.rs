//! Common subexpression elimination.
//!
//! Blocks are processed in dominator-tree pre-order with a scoped value
//! numbering table, so a representative found in an ancestor block is in
//! scope (and dominates) every redundant copy in descendants. Only pure
//! data-flow kinds are keyed; everything else is opaque. Operand order
//! matters except for `and`/`or`, whose operand keys are sorted.

use std::collections::HashMap;

use crate::analysis::DominanceAnalysis;
use crate::entity::{Arg, Block, FuncId, Inst, VarId};
use crate::function::Function;
use crate::inst::{BooleanOp, InstKind};
use crate::literal::{Definition, ElementKey, Literal, Use};
use crate::pass::{Transform, TransformContext};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum OperandKey {
    Inst(Inst),
    Arg(Arg),
    Var(VarId),
    Func(FuncId),
    Literal(Type, Literal),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathKey {
    Index(usize),
    Name(String),
    Value(OperandKey),
}

/// Canonical key of a pure expression: opcode plus operand key sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExprKey {
    Boolean(BooleanOp, OperandKey, OperandKey),
    Not(OperandKey),
    Extract(OperandKey, Vec<PathKey>),
    Literal(Type, Literal),
    ElementPointer(OperandKey, Vec<PathKey>),
}

fn operand_key(u: &Use) -> OperandKey {
    match u {
        Use::Literal { ty, literal } => OperandKey::Literal(ty.clone(), literal.clone()),
        Use::Def(def) => match def {
            Definition::Inst(inst) => OperandKey::Inst(*inst),
            Definition::Arg(arg) => OperandKey::Arg(*arg),
            Definition::Var(var) => OperandKey::Var(*var),
            Definition::Func(func) => OperandKey::Func(*func),
        },
    }
}

fn path_keys(keys: &[ElementKey]) -> Vec<PathKey> {
    keys.iter()
        .map(|key| match key {
            ElementKey::Index(i) => PathKey::Index(*i),
            ElementKey::Name(name) => PathKey::Name(name.clone()),
            ElementKey::Value(u) => PathKey::Value(operand_key(u)),
        })
        .collect()
}

/// Key a keyable instruction; `None` for opaque kinds.
fn expr_key(kind: &InstKind) -> Option<ExprKey> {
    match kind {
        InstKind::BooleanBinary { op, lhs, rhs } => {
            // Both boolean ops are commutative; sorted keys make the two
            // operand orders collide.
            let mut keys = [operand_key(lhs), operand_key(rhs)];
            keys.sort();
            let [a, b] = keys;
            Some(ExprKey::Boolean(*op, a, b))
        }
        InstKind::Not(operand) => Some(ExprKey::Not(operand_key(operand))),
        InstKind::Extract { from, keys } => {
            Some(ExprKey::Extract(operand_key(from), path_keys(keys)))
        }
        InstKind::Literal { literal, ty } => {
            Some(ExprKey::Literal(ty.clone(), literal.clone()))
        }
        InstKind::ElementPointer { pointer, keys } => {
            Some(ExprKey::ElementPointer(operand_key(pointer), path_keys(keys)))
        }
        _ => None,
    }
}

pub struct CommonSubexpressionElimination;

impl Transform<Function> for CommonSubexpressionElimination {
    fn name(&self) -> &'static str {
        "CommonSubexpressionElimination"
    }

    fn run(&self, _cx: &TransformContext<'_>, func: &mut Function) -> bool {
        // CSE never touches the CFG, so the tree stays valid across the
        // rewrites below even though the cache gets invalidated.
        let tree = func.analysis(&DominanceAnalysis);
        let Some(entry) = func.entry_block() else {
            return false;
        };
        if !tree.contains(entry) {
            return false;
        }

        let mut scopes: Vec<HashMap<ExprKey, Inst>> = Vec::new();
        let mut changed = false;
        process_block(func, entry, &tree, &mut scopes, &mut changed);
        changed
    }
}

fn process_block(
    func: &mut Function,
    block: Block,
    tree: &crate::analysis::DominatorTree,
    scopes: &mut Vec<HashMap<ExprKey, Inst>>,
    changed: &mut bool,
) {
    scopes.push(HashMap::new());

    let insts = func.block(block).insts.clone();
    for inst in insts {
        // Rewrites below can detach instructions we have already snapshot.
        if func.inst(inst).block != Some(block) {
            continue;
        }
        let Some(key) = expr_key(&func.inst(inst).kind) else {
            continue;
        };
        let representative = scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&key).copied());
        match representative {
            Some(rep) => {
                func.replace_all_uses(Definition::Inst(inst), &Use::inst(rep));
                func.remove_inst(inst);
                *changed = true;
            }
            None => {
                scopes
                    .last_mut()
                    .expect("scope pushed on block entry")
                    .insert(key, inst);
            }
        }
    }

    for child in tree.children(block) {
        process_block(func, child, tree, scopes, changed);
    }

    scopes.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::IntrinsicRegistry;
    use crate::signature::Signature;

    fn cx(intrinsics: &IntrinsicRegistry) -> TransformContext<'_> {
        TransformContext {
            intrinsics,
            pure_callees: Vec::new(),
        }
    }

    fn place(func: &mut Function, block: Block, kind: InstKind, ty: Type) -> Inst {
        let inst = func.create_inst(crate::inst::InstData {
            name: None,
            kind,
            ty,
            block: None,
        });
        func.append_inst(inst, block);
        inst
    }

    fn and(lhs: Use, rhs: Use) -> InstKind {
        InstKind::BooleanBinary {
            op: BooleanOp::And,
            lhs,
            rhs,
        }
    }

    fn or(lhs: Use, rhs: Use) -> InstKind {
        InstKind::BooleanBinary {
            op: BooleanOp::Or,
            lhs,
            rhs,
        }
    }

    #[test]
    fn test_duplicates_collapse_within_block() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);
        let y = func.add_block_param(entry, "y".into(), Type::Bool);

        let first = place(&mut func, entry, or(Use::arg(x), Use::arg(y)), Type::Bool);
        let second = place(&mut func, entry, or(Use::arg(x), Use::arg(y)), Type::Bool);
        let user = place(
            &mut func,
            entry,
            and(Use::inst(first), Use::inst(second)),
            Type::Bool,
        );
        place(
            &mut func,
            entry,
            InstKind::Return(Some(Use::inst(user))),
            Type::void(),
        );

        assert!(CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert_eq!(func.inst(second).block, None);
        match &func.inst(user).kind {
            InstKind::BooleanBinary { lhs, rhs, .. } => {
                assert_eq!(*lhs, Use::inst(first));
                assert_eq!(*rhs, Use::inst(first));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_commutative_operands_collapse() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);
        let y = func.add_block_param(entry, "y".into(), Type::Bool);

        let first = place(&mut func, entry, and(Use::arg(x), Use::arg(y)), Type::Bool);
        let flipped = place(&mut func, entry, and(Use::arg(y), Use::arg(x)), Type::Bool);
        place(
            &mut func,
            entry,
            InstKind::Return(Some(Use::inst(flipped))),
            Type::void(),
        );

        assert!(CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert_eq!(func.inst(flipped).block, None);
        match &func.inst(func.block(entry).insts[1]).kind {
            InstKind::Return(Some(value)) => assert_eq!(*value, Use::inst(first)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dominating_expression_reused_across_blocks() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let next = func.create_block("next".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);

        let rep = place(&mut func, entry, or(Use::arg(x), Use::bool(false)), Type::Bool);
        place(
            &mut func,
            entry,
            InstKind::Branch {
                target: next,
                args: vec![],
            },
            Type::void(),
        );
        let dup = place(&mut func, next, or(Use::arg(x), Use::bool(false)), Type::Bool);
        place(
            &mut func,
            next,
            InstKind::Return(Some(Use::inst(dup))),
            Type::void(),
        );

        assert!(CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert_eq!(func.inst(dup).block, None);
        match &func.inst(func.block(next).insts[0]).kind {
            InstKind::Return(Some(value)) => assert_eq!(*value, Use::inst(rep)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sibling_blocks_do_not_share_scope() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let left = func.create_block("left".into());
        let right = func.create_block("right".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);

        place(
            &mut func,
            entry,
            InstKind::Conditional {
                condition: Use::arg(x),
                then_target: left,
                then_args: vec![],
                else_target: right,
                else_args: vec![],
            },
            Type::void(),
        );
        let in_left = place(&mut func, left, InstKind::Not(Use::arg(x)), Type::Bool);
        place(
            &mut func,
            left,
            InstKind::Return(Some(Use::inst(in_left))),
            Type::void(),
        );
        let in_right = place(&mut func, right, InstKind::Not(Use::arg(x)), Type::Bool);
        place(
            &mut func,
            right,
            InstKind::Return(Some(Use::inst(in_right))),
            Type::void(),
        );

        // Neither sibling dominates the other: both copies stay.
        assert!(!CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert!(func.inst(in_left).block.is_some());
        assert!(func.inst(in_right).block.is_some());
    }

    #[test]
    fn test_idempotent() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);

        let a = place(&mut func, entry, and(Use::arg(x), Use::bool(true)), Type::Bool);
        let b = place(&mut func, entry, and(Use::arg(x), Use::bool(true)), Type::Bool);
        let sum = place(&mut func, entry, or(Use::inst(a), Use::inst(b)), Type::Bool);
        place(
            &mut func,
            entry,
            InstKind::Return(Some(Use::inst(sum))),
            Type::void(),
        );

        assert!(CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert!(!CommonSubexpressionElimination.run(&cx(&registry), &mut func));
    }

    #[test]
    fn test_applies_are_opaque() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());

        let callee = Use::Def(Definition::Func(FuncId::new(0)));
        place(
            &mut func,
            entry,
            InstKind::Apply {
                callee: callee.clone(),
                args: vec![],
            },
            Type::Bool,
        );
        place(
            &mut func,
            entry,
            InstKind::Apply {
                callee,
                args: vec![],
            },
            Type::Bool,
        );
        place(&mut func, entry, InstKind::Return(None), Type::void());

        assert!(!CommonSubexpressionElimination.run(&cx(&registry), &mut func));
        assert_eq!(func.block(entry).insts.len(), 3);
    }
}
