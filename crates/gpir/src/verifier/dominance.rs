//! Dominance verification: every operand definition properly dominates its
//! user. Entry arguments dominate every reachable user; literals, globals,
//! and function references are always in scope.

use crate::analysis::DominanceAnalysis;
use crate::function::Function;
use crate::module::Module;
use crate::verifier::VerifierError;

/// Verify the use-before-def invariant across a function.
pub fn verify_function_dominance(
    _module: &Module,
    func: &Function,
) -> Result<(), VerifierError> {
    let tree = func.analysis(&DominanceAnalysis);

    for block in func.blocks() {
        // Instructions in unreachable blocks have no dominance obligations;
        // they can never execute.
        if !tree.contains(block) {
            continue;
        }
        for &inst in &func.block(block).insts {
            let mut defs = Vec::new();
            func.inst(inst).kind.for_each_use(|u| {
                if let Some(def) = u.definition() {
                    defs.push(def);
                }
            });
            for def in defs {
                if !tree.properly_dominates(func, def, inst) {
                    return Err(VerifierError::UseBeforeDef {
                        function: func.name.clone(),
                        inst: match &func.inst(inst).name {
                            Some(name) => format!("%{}", name),
                            None => format!("{}", inst),
                        },
                    });
                }
            }
        }
    }
    Ok(())
}
