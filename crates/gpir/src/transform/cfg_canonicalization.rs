//! CFG canonicalization: single-exit rewriting with join blocks.
//!
//! Every `return` site is rewritten to branch to one shared `exit` block
//! whose parameter carries the return value. Conditionals whose two arms
//! both flow straight to `exit` (through `branch`-only chains) get a join
//! block merging the arms' values before the final hop. Printed block order
//! is deterministic: entry, original blocks, joins in creation order, exit
//! last.

use std::collections::BTreeSet;

use crate::entity::{Arg, Block, EntityRef, Inst};
use crate::function::Function;
use crate::inst::{InstData, InstKind};
use crate::literal::Use;
use crate::pass::{Transform, TransformContext};
use crate::types::Type;

pub struct CfgCanonicalization;

impl Transform<Function> for CfgCanonicalization {
    fn name(&self) -> &'static str {
        "CFGCanonicalization"
    }

    fn run(&self, _cx: &TransformContext<'_>, func: &mut Function) -> bool {
        let exit_blocks: Vec<Block> = func
            .blocks()
            .filter(|&block| {
                func.block(block)
                    .terminator()
                    .is_some_and(|term| matches!(func.inst(term).kind, InstKind::Return(_)))
            })
            .collect();
        if exit_blocks.len() <= 1 {
            return false;
        }

        let ret_ty = func.signature.ret.clone();
        // A void function gets a parameterless exit block: a named value may
        // not have void type.
        let returns_value = !ret_ty.is_void_literal();

        let exit = func.create_block(unique_block_name(func, "exit"));
        let exit_param = returns_value.then(|| {
            let name = unique_value_name(func, "exit_value");
            func.add_block_param(exit, name, ret_ty.clone())
        });

        // Rewrite every return site into a branch carrying its value.
        for block in exit_blocks {
            let term = func
                .block(block)
                .terminator()
                .expect("exit block has a terminator");
            let value = match &func.inst(term).kind {
                InstKind::Return(value) => value.clone(),
                _ => unreachable!("exit blocks end in return"),
            };
            func.remove_inst(term);
            let args = match (exit_param, value) {
                (Some(_), Some(value)) => vec![value],
                _ => Vec::new(),
            };
            append(func, block, InstKind::Branch { target: exit, args });
        }
        append(
            func,
            exit,
            InstKind::Return(exit_param.map(Use::arg)),
        );

        insert_join_blocks(func, exit, exit_param.is_some(), &ret_ty);

        func.move_block_to_end(exit);
        true
    }
}

fn append(func: &mut Function, block: Block, kind: InstKind) -> Inst {
    let inst = func.create_inst(InstData {
        name: None,
        kind,
        ty: Type::void(),
        block: None,
    });
    func.append_inst(inst, block);
    inst
}

/// For each conditional whose two arms both reach `exit` through chains of
/// plain branches, merge the arms' final hops through a parameterized join.
fn insert_join_blocks(func: &mut Function, exit: Block, returns_value: bool, ret_ty: &Type) {
    let conditionals: Vec<(Block, Inst)> = func
        .blocks()
        .filter_map(|block| {
            let term = func.block(block).terminator()?;
            matches!(func.inst(term).kind, InstKind::Conditional { .. })
                .then_some((block, term))
        })
        .collect();

    for (_, cond) in conditionals {
        let InstKind::Conditional {
            then_target,
            else_target,
            ..
        } = func.inst(cond).kind
        else {
            continue;
        };
        let Some(then_tail) = arm_tail(func, then_target, exit) else {
            continue;
        };
        let Some(else_tail) = arm_tail(func, else_target, exit) else {
            continue;
        };
        if then_tail == else_tail {
            continue;
        }

        let join_name =
            unique_block_name(func, &format!("{}_join", func.block(then_target).name));
        let join = func.create_block(join_name);
        let join_param: Option<Arg> = returns_value.then(|| {
            // Synthetic parameter name; `^` marks it compiler-generated.
            func.add_block_param(join, format!("{}^0", join.index()), ret_ty.clone())
        });

        for tail in [then_tail, else_tail] {
            let term = func
                .block(tail)
                .terminator()
                .expect("arm tail has a terminator");
            if let InstKind::Branch { target, .. } = &mut func.inst_mut(term).kind {
                *target = join;
            }
        }
        append(
            func,
            join,
            InstKind::Branch {
                target: exit,
                args: join_param.map(Use::arg).into_iter().collect(),
            },
        );
    }
}

/// Follow plain branches from `from` until `exit`; the block whose branch
/// lands on `exit` is the arm's tail. Any other terminator (or a cycle)
/// means the arm does not flow straight to exit.
fn arm_tail(func: &Function, from: Block, exit: Block) -> Option<Block> {
    let mut visited = BTreeSet::new();
    let mut current = from;
    loop {
        if current == exit || !visited.insert(current) {
            return None;
        }
        let term = func.block(current).terminator()?;
        let InstKind::Branch { target, .. } = func.inst(term).kind else {
            return None;
        };
        if target == exit {
            return Some(current);
        }
        current = target;
    }
}

fn unique_block_name(func: &Function, base: &str) -> String {
    if func.find_block(base).is_none() {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}.{}", base, n);
        if func.find_block(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

fn unique_value_name(func: &Function, base: &str) -> String {
    let taken = |name: &str| {
        func.args().any(|(_, a)| a.name == name)
            || func
                .insts()
                .any(|(_, i)| i.name.as_deref() == Some(name))
    };
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}.{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::IntrinsicRegistry;
    use crate::signature::Signature;
    use crate::verifier::verify_single_exit;

    fn cx(intrinsics: &IntrinsicRegistry) -> TransformContext<'_> {
        TransformContext {
            intrinsics,
            pure_callees: Vec::new(),
        }
    }

    fn place(func: &mut Function, block: Block, kind: InstKind, ty: Type) -> Inst {
        let inst = func.create_inst(InstData {
            name: None,
            kind,
            ty,
            block: None,
        });
        func.append_inst(inst, block);
        inst
    }

    /// entry: conditional -> then / else, both returning a bool.
    fn two_exit_func() -> (Function, Block, Block, Block) {
        let mut func = Function::new(
            "f".into(),
            Signature::new(vec![Type::Bool], Type::Bool),
        );
        let entry = func.create_block("entry".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);
        let then_bb = func.create_block("then".into());
        let else_bb = func.create_block("else".into());

        place(
            &mut func,
            entry,
            InstKind::Conditional {
                condition: Use::arg(x),
                then_target: then_bb,
                then_args: vec![],
                else_target: else_bb,
                else_args: vec![],
            },
            Type::void(),
        );
        place(
            &mut func,
            then_bb,
            InstKind::Return(Some(Use::bool(true))),
            Type::void(),
        );
        place(
            &mut func,
            else_bb,
            InstKind::Return(Some(Use::arg(x))),
            Type::void(),
        );
        (func, entry, then_bb, else_bb)
    }

    #[test]
    fn test_single_exit_is_untouched() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        place(&mut func, entry, InstKind::Return(None), Type::void());

        assert!(!CfgCanonicalization.run(&cx(&registry), &mut func));
    }

    #[test]
    fn test_two_exits_merge_into_one() {
        let registry = IntrinsicRegistry::standard();
        let (mut func, _, then_bb, else_bb) = two_exit_func();

        assert!(CfgCanonicalization.run(&cx(&registry), &mut func));
        assert!(verify_single_exit(&func).is_ok());

        // Exit is last, carries one parameter of the return type, and
        // returns it.
        let exit = func.blocks().last().unwrap();
        assert_eq!(func.block(exit).name, "exit");
        let params = &func.block(exit).params;
        assert_eq!(params.len(), 1);
        assert_eq!(func.arg(params[0]).ty, Type::Bool);
        let term = func.block(exit).terminator().unwrap();
        assert_eq!(
            func.inst(term).kind,
            InstKind::Return(Some(Use::arg(params[0])))
        );

        // Both return sites branch to a join, which branches to exit.
        let join = func.find_block("then_join").expect("join block inserted");
        for arm in [then_bb, else_bb] {
            let term = func.block(arm).terminator().unwrap();
            match &func.inst(term).kind {
                InstKind::Branch { target, args } => {
                    assert_eq!(*target, join);
                    assert_eq!(args.len(), 1);
                }
                other => panic!("expected a branch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_postcondition_and_idempotence() {
        let registry = IntrinsicRegistry::standard();
        let (mut func, ..) = two_exit_func();

        assert!(CfgCanonicalization.run(&cx(&registry), &mut func));
        assert!(!CfgCanonicalization.run(&cx(&registry), &mut func));
        assert!(verify_single_exit(&func).is_ok());
    }

    #[test]
    fn test_void_function_gets_parameterless_exit() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let a = func.create_block("a".into());
        let b = func.create_block("b".into());
        place(
            &mut func,
            entry,
            InstKind::Conditional {
                condition: Use::bool(true),
                then_target: a,
                then_args: vec![],
                else_target: b,
                else_args: vec![],
            },
            Type::void(),
        );
        place(&mut func, a, InstKind::Return(None), Type::void());
        place(&mut func, b, InstKind::Return(None), Type::void());

        assert!(CfgCanonicalization.run(&cx(&registry), &mut func));
        let exit = func.blocks().last().unwrap();
        assert!(func.block(exit).params.is_empty());
        let term = func.block(exit).terminator().unwrap();
        assert_eq!(func.inst(term).kind, InstKind::Return(None));
    }

    #[test]
    fn test_block_order_entry_originals_joins_exit() {
        let registry = IntrinsicRegistry::standard();
        let (mut func, ..) = two_exit_func();
        assert!(CfgCanonicalization.run(&cx(&registry), &mut func));

        let names: Vec<_> = func
            .blocks()
            .map(|b| func.block(b).name.clone())
            .collect();
        assert_eq!(names, vec!["entry", "then", "else", "then_join", "exit"]);
    }
}
