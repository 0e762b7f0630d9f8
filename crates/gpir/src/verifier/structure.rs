//! Per-function structural checks: layout consistency, naming, terminators.

use indexmap::IndexSet;

use crate::function::Function;
use crate::inst::InstKind;
use crate::module::Module;
use crate::verifier::VerifierError;

/// Verify block layout, naming, entry parameters, and terminator placement.
pub fn verify_function_structure(
    module: &Module,
    func: &Function,
) -> Result<(), VerifierError> {
    let Some(entry) = func.entry_block() else {
        return Err(VerifierError::NoEntry {
            function: func.name.clone(),
        });
    };

    // Entry parameters carry the function's arguments.
    let entry_params = &func.block(entry).params;
    let matches = entry_params.len() == func.signature.params.len()
        && entry_params
            .iter()
            .zip(&func.signature.params)
            .all(|(arg, ty)| module.type_eq(&func.arg(*arg).ty, ty));
    if !matches {
        return Err(VerifierError::FunctionEntryArgumentMismatch {
            function: func.name.clone(),
        });
    }

    // Block names are unique within the function.
    let mut block_names = IndexSet::new();
    for block in func.blocks() {
        let name = &func.block(block).name;
        if !crate::ident::is_identifier(name) && !is_synthetic_name(name) {
            return Err(VerifierError::IllegalName { name: name.clone() });
        }
        if !block_names.insert(name.clone()) {
            return Err(VerifierError::Redeclared {
                name: name.clone(),
                namespace: "block",
            });
        }
    }

    // Value names (arguments and named instructions) are unique and non-void.
    let mut value_names = IndexSet::new();
    for block in func.blocks() {
        for &arg in &func.block(block).params {
            let data = func.arg(arg);
            if data.block != block {
                return Err(VerifierError::BasicBlockParentMismatch {
                    function: func.name.clone(),
                    block: func.block(block).name.clone(),
                });
            }
            if !crate::ident::is_identifier(&data.name) && !is_synthetic_name(&data.name) {
                return Err(VerifierError::IllegalName {
                    name: data.name.clone(),
                });
            }
            if !value_names.insert(data.name.clone()) {
                return Err(VerifierError::Redeclared {
                    name: data.name.clone(),
                    namespace: "value",
                });
            }
            if module.is_void(&data.ty) {
                return Err(VerifierError::NamedVoidValue {
                    function: func.name.clone(),
                    name: data.name.clone(),
                });
            }
        }
    }
    for block in func.blocks() {
        for &inst in &func.block(block).insts {
            if let Some(name) = &func.inst(inst).name {
                if !crate::ident::is_identifier(name) {
                    return Err(VerifierError::IllegalName { name: name.clone() });
                }
                if !value_names.insert(name.clone()) {
                    return Err(VerifierError::Redeclared {
                        name: name.clone(),
                        namespace: "value",
                    });
                }
                if module.is_void(&func.inst(inst).ty) {
                    return Err(VerifierError::NamedVoidValue {
                        function: func.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
    }

    // Parent links agree with the layout, and each placed instruction
    // appears exactly once.
    let mut seen_insts = IndexSet::new();
    for block in func.blocks() {
        for &inst in &func.block(block).insts {
            if func.inst(inst).block != Some(block) || !seen_insts.insert(inst) {
                return Err(VerifierError::InstructionParentMismatch {
                    function: func.name.clone(),
                    inst: format!("{}", inst),
                });
            }
        }
    }

    // Exactly one terminator per block, in last position.
    for block in func.blocks() {
        let data = func.block(block);
        let Some(last) = data.terminator() else {
            return Err(VerifierError::MissingTerminator {
                function: func.name.clone(),
                block: data.name.clone(),
            });
        };
        if !func.inst(last).kind.is_terminator() {
            return Err(VerifierError::MissingTerminator {
                function: func.name.clone(),
                block: data.name.clone(),
            });
        }
        for &inst in &data.insts[..data.insts.len() - 1] {
            if func.inst(inst).kind.is_terminator() {
                return Err(VerifierError::TerminatorNotLast {
                    function: func.name.clone(),
                    block: data.name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Compiler-generated value names use `^`, which the identifier regex
/// rejects on purpose.
fn is_synthetic_name(name: &str) -> bool {
    name.contains('^')
}

/// Check the single-exit postcondition of CFG canonicalization: exactly one
/// block terminated by `return`.
pub fn verify_single_exit(func: &Function) -> Result<(), VerifierError> {
    let mut exits = 0usize;
    for block in func.blocks() {
        if let Some(term) = func.block(block).terminator() {
            if matches!(func.inst(term).kind, InstKind::Return(_)) {
                exits += 1;
            }
        }
    }
    match exits {
        0 => Err(VerifierError::NoExit {
            function: func.name.clone(),
        }),
        1 => Ok(()),
        _ => Err(VerifierError::MultipleExits {
            function: func.name.clone(),
        }),
    }
}
