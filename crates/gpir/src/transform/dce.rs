//! Dead code elimination.
//!
//! Worklist-driven: every pure non-terminator instruction is potentially
//! dead; an instruction is dropped iff it has zero users. Removing an
//! instruction releases its operands, which may become removable in turn.
//! Side-effecting kinds are never touched, so a second run on unchanged IR
//! reports no change.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::DefUseAnalysis;
use crate::entity::Inst;
use crate::function::Function;
use crate::literal::Definition;
use crate::pass::{Transform, TransformContext};

pub struct DeadCodeElimination;

impl Transform<Function> for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "DeadCodeElimination"
    }

    fn run(&self, cx: &TransformContext<'_>, func: &mut Function) -> bool {
        let def_use = func.analysis(&DefUseAnalysis);

        // Candidates: placed, pure, not a terminator.
        let mut candidates: BTreeSet<Inst> = BTreeSet::new();
        for (inst, data) in func.insts() {
            if data.block.is_some()
                && !data.kind.is_terminator()
                && !data.kind.has_side_effects(cx.intrinsics, &cx.pure_callees)
            {
                candidates.insert(inst);
            }
        }

        // Live user sets, maintained as instructions are dropped.
        let mut users: BTreeMap<Inst, BTreeSet<Inst>> = candidates
            .iter()
            .map(|&inst| (inst, def_use.users(Definition::Inst(inst)).collect()))
            .collect();

        let mut worklist: Vec<Inst> = candidates.iter().copied().collect();
        let mut removed: BTreeSet<Inst> = BTreeSet::new();

        while let Some(inst) = worklist.pop() {
            if removed.contains(&inst) {
                continue;
            }
            if users.get(&inst).is_some_and(|set| !set.is_empty()) {
                continue;
            }

            let mut operands = Vec::new();
            func.inst(inst).kind.for_each_use(|u| {
                if let Some(Definition::Inst(def)) = u.definition() {
                    operands.push(def);
                }
            });

            func.remove_inst(inst);
            removed.insert(inst);

            for def in operands {
                if let Some(set) = users.get_mut(&def) {
                    set.remove(&inst);
                    if set.is_empty() && candidates.contains(&def) {
                        worklist.push(def);
                    }
                }
            }
        }

        !removed.is_empty()
    }
}
