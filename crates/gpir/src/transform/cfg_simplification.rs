//! CFG simplification: drop unreachable blocks, merge trivial branch chains.

use std::collections::BTreeSet;

use crate::analysis::cfg::ControlFlowGraph;
use crate::entity::Block;
use crate::function::Function;
use crate::inst::InstKind;
use crate::pass::{Transform, TransformContext};

pub struct CfgSimplification;

impl Transform<Function> for CfgSimplification {
    fn name(&self) -> &'static str {
        "CFGSimplification"
    }

    fn run(&self, _cx: &TransformContext<'_>, func: &mut Function) -> bool {
        let mut changed = false;
        changed |= remove_unreachable_blocks(func);
        while merge_one_branch_chain(func) {
            changed = true;
        }
        changed
    }
}

fn remove_unreachable_blocks(func: &mut Function) -> bool {
    let cfg = ControlFlowGraph::compute(func);
    let reachable: BTreeSet<Block> = cfg.reverse_post_order().into_iter().collect();
    let dead: Vec<Block> = func
        .blocks()
        .filter(|block| !reachable.contains(block))
        .collect();
    for block in &dead {
        let insts = func.block(*block).insts.clone();
        for inst in insts {
            func.remove_inst(inst);
        }
        func.remove_block(*block);
    }
    !dead.is_empty()
}

/// Merge one `A -> branch -> B` edge where `B` has no parameters and `A` is
/// its only predecessor. Returns false once no such edge remains.
fn merge_one_branch_chain(func: &mut Function) -> bool {
    let cfg = ControlFlowGraph::compute(func);
    let entry = func.entry_block();

    for block in func.blocks().collect::<Vec<_>>() {
        let Some(term) = func.block(block).terminator() else {
            continue;
        };
        let InstKind::Branch { target, .. } = func.inst(term).kind else {
            continue;
        };
        if Some(target) == entry
            || target == block
            || cfg.pred_count(target) != 1
            || !func.block(target).params.is_empty()
        {
            continue;
        }

        // Splice the successor's instructions onto the end of `block`.
        func.remove_inst(term);
        let moved = func.block(target).insts.clone();
        for inst in moved {
            func.remove_inst(inst);
            func.append_inst(inst, block);
        }
        func.remove_block(target);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Inst;
    use crate::inst::InstData;
    use crate::intrinsics::IntrinsicRegistry;
    use crate::literal::Use;
    use crate::pass::TransformContext;
    use crate::signature::Signature;
    use crate::types::Type;

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

    #[test]
    fn test_unreachable_block_removed() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let island = func.create_block("island".into());
        place(&mut func, entry, InstKind::Return(None), Type::void());
        place(&mut func, island, InstKind::Return(None), Type::void());

        assert!(CfgSimplification.run(&cx(&registry), &mut func));
        assert_eq!(func.block_count(), 1);
        assert!(func.find_block("island").is_none());
    }

    #[test]
    fn test_branch_chain_merged() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let mid = func.create_block("mid".into());
        let last = func.create_block("last".into());
        place(
            &mut func,
            entry,
            InstKind::Branch {
                target: mid,
                args: vec![],
            },
            Type::void(),
        );
        place(
            &mut func,
            mid,
            InstKind::Branch {
                target: last,
                args: vec![],
            },
            Type::void(),
        );
        let not = place(&mut func, last, InstKind::Not(Use::bool(true)), Type::Bool);
        place(&mut func, last, InstKind::Return(None), Type::void());

        assert!(CfgSimplification.run(&cx(&registry), &mut func));
        assert_eq!(func.block_count(), 1);
        // The chain collapsed into entry, keeping instruction order.
        assert_eq!(func.inst(not).block, Some(entry));
        let term = func.block(entry).terminator().unwrap();
        assert_eq!(func.inst(term).kind, InstKind::Return(None));
    }

    #[test]
    fn test_merge_blocked_by_second_predecessor() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let shared = func.create_block("shared".into());
        place(
            &mut func,
            entry,
            InstKind::Conditional {
                condition: Use::bool(true),
                then_target: shared,
                then_args: vec![],
                else_target: shared,
                else_args: vec![],
            },
            Type::void(),
        );
        place(&mut func, shared, InstKind::Return(None), Type::void());

        assert!(!CfgSimplification.run(&cx(&registry), &mut func));
        assert_eq!(func.block_count(), 2);
    }

    #[test]
    fn test_idempotent() {
        let registry = IntrinsicRegistry::standard();
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let mid = func.create_block("mid".into());
        place(
            &mut func,
            entry,
            InstKind::Branch {
                target: mid,
                args: vec![],
            },
            Type::void(),
        );
        place(&mut func, mid, InstKind::Return(None), Type::void());

        assert!(CfgSimplification.run(&cx(&registry), &mut func));
        assert!(!CfgSimplification.run(&cx(&registry), &mut func));
    }
}
