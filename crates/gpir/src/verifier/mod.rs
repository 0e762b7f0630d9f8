//! IR verifier.
//!
//! Runs top-down over a module and fails fast on the first violated
//! invariant, reporting a typed error naming the offending node. The checks
//! are split by concern: module-level naming and declarations here,
//! per-function structure in `structure`, per-instruction typing in `insts`,
//! and operand dominance in `dominance`.

use thiserror::Error;

use crate::intrinsics::IntrinsicRegistry;
use crate::module::Module;
use crate::types::Type;

mod dominance;
mod insts;
mod structure;

pub use structure::verify_single_exit;

/// A verification failure, naming the failing node and condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifierError {
    // Structural
    #[error("block '{block}' in @{function} has no terminator")]
    MissingTerminator { function: String, block: String },
    #[error("terminator is not the last instruction of block '{block}' in @{function}")]
    TerminatorNotLast { function: String, block: String },
    #[error("function @{function} has a body but no entry block")]
    NoEntry { function: String },
    #[error("function @{function} has no exit block")]
    NoExit { function: String },
    #[error("function @{function} has multiple exit blocks")]
    MultipleExits { function: String },
    #[error("'{name}' is declared more than once in {namespace} namespace")]
    Redeclared { name: String, namespace: &'static str },
    #[error("'{name}' is not a legal identifier")]
    IllegalName { name: String },
    #[error("declaration @{function} cannot have a body")]
    DeclarationCannotHaveBody { function: String },
    #[error("instruction {inst} in @{function} is not where its parent link says")]
    InstructionParentMismatch { function: String, inst: String },
    #[error("block '{block}' in @{function} has an inconsistent parent link")]
    BasicBlockParentMismatch { function: String, block: String },
    #[error("named value '{name}' in @{function} has void type")]
    NamedVoidValue { function: String, name: String },

    // Typing
    #[error("invalid type at {context}")]
    InvalidType { context: String },
    #[error("type mismatch at {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: Type,
        found: Type,
    },
    #[error("unexpected type {found} at {context}")]
    UnexpectedType { context: String, found: Type },
    #[error("operand type mismatch at {context}")]
    UseTypeMismatch { context: String },
    #[error("expected bool at {context}, found {found}")]
    NotBool { context: String, found: Type },
    #[error("expected a pointer at {context}, found {found}")]
    NotPointer { context: String, found: Type },
    #[error("expected an enum at {context}, found {found}")]
    NotEnum { context: String, found: Type },
    #[error("expected a function at {context}, found {found}")]
    NotFunction { context: String, found: Type },
    #[error("expected a tuple at {context}, found {found}")]
    NotTuple { context: String, found: Type },

    // Linking
    #[error("operand of {inst} in @{function} does not dominate its use")]
    UseBeforeDef { function: String, inst: String },
    #[error("operand of {inst} in @{function} comes from outside the function")]
    UseInvalidParent { function: String, inst: String },
    #[error("call argument mismatch at {context}")]
    FunctionArgumentMismatch { context: String },
    #[error("entry block parameters of @{function} do not match its argument types")]
    FunctionEntryArgumentMismatch { function: String },
    #[error("branch to '{target}' at {context} does not match its parameters")]
    BasicBlockArgumentMismatch { context: String, target: String },
    #[error("return in @{function} does not match return type: expected {expected}, found {found}")]
    ReturnTypeMismatch {
        function: String,
        expected: Type,
        found: Type,
    },

    // Kind-specific
    #[error("invalid element keys at {context}")]
    InvalidIndices { context: String },
    #[error("missing element keys at {context}")]
    MissingIndices { context: String },
    #[error("invalid pointer offset at {context}")]
    InvalidOffset { context: String },
    #[error("enum case '{case}' does not exist at {context}")]
    InvalidEnumCase { case: String, context: String },
    #[error("branch for enum case '{case}' at {context} does not match its payload")]
    InvalidEnumCaseBranch { case: String, context: String },
    #[error("unknown intrinsic \"{name}\"")]
    InvalidIntrinsic { name: String },
    #[error("literal does not conform to its declared type at {context}")]
    InvalidLiteral { context: String },
    #[error("struct ${decl} declares field #{field} twice")]
    DuplicateStructField { decl: String, field: String },
    #[error("enum ${decl} declares case ?{case} twice")]
    DuplicateEnumCase { decl: String, case: String },
    #[error("nested literal outside a literal instruction at {inst} in @{function}")]
    NestedLiteralNotInLiteralInstruction { function: String, inst: String },
}

/// Verify a whole module. Types and values occupy two disjoint namespaces;
/// each must be internally unique. Every function with a body is then
/// verified in isolation.
pub fn verify_module(
    module: &Module,
    intrinsics: &IntrinsicRegistry,
) -> Result<(), VerifierError> {
    verify_identifier(&module.name)?;

    // Type namespace: aliases, structs, enums.
    let mut type_names = indexmap::IndexSet::new();
    for name in module
        .aliases
        .values()
        .map(|a| &a.name)
        .chain(module.structs.values().map(|s| &s.name))
        .chain(module.enums.values().map(|e| &e.name))
    {
        verify_identifier(name)?;
        if !type_names.insert(name.clone()) {
            return Err(VerifierError::Redeclared {
                name: name.clone(),
                namespace: "type",
            });
        }
    }

    for decl in module.structs.values() {
        let mut fields = indexmap::IndexSet::new();
        for (field, ty) in &decl.fields {
            verify_identifier(field)?;
            if !fields.insert(field.clone()) {
                return Err(VerifierError::DuplicateStructField {
                    decl: decl.name.clone(),
                    field: field.clone(),
                });
            }
            verify_valid_type(module, ty, || format!("field #{} of ${}", field, decl.name))?;
        }
    }
    for decl in module.enums.values() {
        let mut cases = indexmap::IndexSet::new();
        for case in &decl.cases {
            verify_identifier(&case.name)?;
            if !cases.insert(case.name.clone()) {
                return Err(VerifierError::DuplicateEnumCase {
                    decl: decl.name.clone(),
                    case: case.name.clone(),
                });
            }
            for ty in &case.associated_types {
                verify_valid_type(module, ty, || {
                    format!("case ?{} of ${}", case.name, decl.name)
                })?;
            }
        }
    }
    for alias in module.aliases.values() {
        if let Some(ty) = &alias.ty {
            verify_valid_type(module, ty, || format!("alias ${}", alias.name))?;
        }
    }

    // Value namespace: globals and functions.
    let mut value_names = indexmap::IndexSet::new();
    for name in module
        .variables
        .values()
        .map(|v| &v.name)
        .chain(module.functions.values().map(|f| &f.name))
    {
        verify_identifier(name)?;
        if !value_names.insert(name.clone()) {
            return Err(VerifierError::Redeclared {
                name: name.clone(),
                namespace: "value",
            });
        }
    }
    for var in module.variables.values() {
        verify_valid_type(module, &var.value_type, || format!("variable @{}", var.name))?;
    }

    for func in module.functions.values() {
        for ty in func.signature.params.iter().chain([&func.signature.ret]) {
            verify_valid_type(module, ty, || format!("signature of @{}", func.name))?;
        }
        if func.is_declaration() {
            if func.block_count() != 0 {
                return Err(VerifierError::DeclarationCannotHaveBody {
                    function: func.name.clone(),
                });
            }
            continue;
        }
        structure::verify_function_structure(module, func)?;
        insts::verify_function_insts(module, func, intrinsics)?;
        dominance::verify_function_dominance(module, func)?;
    }

    Ok(())
}

fn verify_identifier(name: &str) -> Result<(), VerifierError> {
    if crate::ident::is_identifier(name) {
        Ok(())
    } else {
        Err(VerifierError::IllegalName {
            name: name.to_string(),
        })
    }
}

fn verify_valid_type(
    module: &Module,
    ty: &Type,
    context: impl Fn() -> String,
) -> Result<(), VerifierError> {
    if module.type_is_valid(ty) {
        Ok(())
    } else {
        Err(VerifierError::InvalidType { context: context() })
    }
}
