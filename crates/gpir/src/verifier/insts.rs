//! Per-instruction checks: operand linkage, nested literals, kind typing.

use crate::entity::{Block, Inst};
use crate::function::Function;
use crate::inst::InstKind;
use crate::intrinsics::IntrinsicRegistry;
use crate::literal::{Definition, Literal, Use};
use crate::module::Module;
use crate::types::Type;
use crate::verifier::VerifierError;

/// Verify every placed instruction of a function.
pub fn verify_function_insts(
    module: &Module,
    func: &Function,
    intrinsics: &IntrinsicRegistry,
) -> Result<(), VerifierError> {
    for block in func.blocks() {
        for &inst in &func.block(block).insts {
            verify_inst(module, func, intrinsics, inst)?;
        }
    }
    Ok(())
}

fn inst_label(func: &Function, inst: Inst) -> String {
    match &func.inst(inst).name {
        Some(name) => format!("%{}", name),
        None => format!("{}", inst),
    }
}

fn verify_inst(
    module: &Module,
    func: &Function,
    intrinsics: &IntrinsicRegistry,
    inst: Inst,
) -> Result<(), VerifierError> {
    let data = func.inst(inst);
    let context = || format!("{} in @{}", inst_label(func, inst), func.name);

    // Operand linkage and the nested-literal rule.
    let mut uses = Vec::new();
    data.kind.for_each_use(|u| uses.push(u));
    let is_literal_inst = matches!(data.kind, InstKind::Literal { .. });
    for u in &uses {
        match u {
            Use::Literal { literal, .. } => {
                if !is_literal_inst && !literal.is_operand_safe() {
                    return Err(VerifierError::NestedLiteralNotInLiteralInstruction {
                        function: func.name.clone(),
                        inst: inst_label(func, inst),
                    });
                }
            }
            Use::Def(def) => verify_operand_parent(module, func, inst, *def)?,
        }
    }

    // Branch targets must be blocks of this function's layout.
    for (target, _) in data.kind.branch_targets() {
        if !func.blocks().any(|b| b == target) {
            return Err(VerifierError::BasicBlockParentMismatch {
                function: func.name.clone(),
                block: format!("{}", target),
            });
        }
    }

    verify_kind(module, func, intrinsics, inst, &context)?;

    // The cached result type must agree with inference from operand types.
    let inferred = data.kind.result_type(func, module, intrinsics);
    if !module.type_eq(&data.ty, &inferred) {
        return Err(VerifierError::UnexpectedType {
            context: context(),
            found: data.ty.clone(),
        });
    }

    Ok(())
}

/// Arguments and instruction operands must come from this function;
/// variables and functions must exist in the module. Function references may
/// cross function boundaries, other definitions may not.
fn verify_operand_parent(
    module: &Module,
    func: &Function,
    inst: Inst,
    def: Definition,
) -> Result<(), VerifierError> {
    let invalid_parent = || VerifierError::UseInvalidParent {
        function: func.name.clone(),
        inst: inst_label(func, inst),
    };
    match def {
        Definition::Arg(arg) => {
            if func.args().all(|(a, _)| a != arg) {
                return Err(invalid_parent());
            }
            let home = func.arg(arg).block;
            if !func.block(home).params.contains(&arg) {
                return Err(invalid_parent());
            }
        }
        Definition::Inst(operand) => {
            if func.insts().all(|(i, _)| i != operand) || func.inst(operand).block.is_none() {
                return Err(invalid_parent());
            }
        }
        Definition::Var(var) => {
            if module.variables.get(var).is_none() {
                return Err(invalid_parent());
            }
        }
        Definition::Func(f) => {
            if module.functions.get(f).is_none() {
                return Err(invalid_parent());
            }
        }
    }
    Ok(())
}

fn verify_bool_operand(
    module: &Module,
    func: &Function,
    u: &Use,
    context: &impl Fn() -> String,
) -> Result<(), VerifierError> {
    let ty = module.canonical(&module.use_type(func, u));
    if ty != Type::Bool {
        return Err(VerifierError::NotBool {
            context: context(),
            found: ty,
        });
    }
    Ok(())
}

fn verify_block_args(
    module: &Module,
    func: &Function,
    target: Block,
    args: &[Use],
    context: &impl Fn() -> String,
) -> Result<(), VerifierError> {
    let params = &func.block(target).params;
    let mismatch = || VerifierError::BasicBlockArgumentMismatch {
        context: context(),
        target: func.block(target).name.clone(),
    };
    if params.len() != args.len() {
        return Err(mismatch());
    }
    for (param, arg) in params.iter().zip(args) {
        if !module.type_eq(&func.arg(*param).ty, &module.use_type(func, arg)) {
            return Err(mismatch());
        }
    }
    Ok(())
}

fn verify_kind(
    module: &Module,
    func: &Function,
    intrinsics: &IntrinsicRegistry,
    inst: Inst,
    context: &impl Fn() -> String,
) -> Result<(), VerifierError> {
    match &func.inst(inst).kind {
        InstKind::BooleanBinary { lhs, rhs, .. } => {
            verify_bool_operand(module, func, lhs, context)?;
            verify_bool_operand(module, func, rhs, context)?;
        }
        InstKind::Not(operand) => {
            verify_bool_operand(module, func, operand, context)?;
        }
        InstKind::Branch { target, args } => {
            verify_block_args(module, func, *target, args, context)?;
        }
        InstKind::Conditional {
            condition,
            then_target,
            then_args,
            else_target,
            else_args,
        } => {
            verify_bool_operand(module, func, condition, context)?;
            verify_block_args(module, func, *then_target, then_args, context)?;
            verify_block_args(module, func, *else_target, else_args, context)?;
        }
        InstKind::BranchEnum { subject, cases } => {
            let subject_ty = module.canonical(&module.use_type(func, subject));
            let Type::Enum(enum_id) = subject_ty else {
                return Err(VerifierError::NotEnum {
                    context: context(),
                    found: subject_ty,
                });
            };
            let decl = &module.enums[enum_id];
            for (case_name, target) in cases {
                let Some(case) = decl.case(case_name) else {
                    return Err(VerifierError::InvalidEnumCase {
                        case: case_name.clone(),
                        context: context(),
                    });
                };
                let params = &func.block(*target).params;
                let matches = params.len() == case.associated_types.len()
                    && params
                        .iter()
                        .zip(&case.associated_types)
                        .all(|(param, ty)| module.type_eq(&func.arg(*param).ty, ty));
                if !matches {
                    return Err(VerifierError::InvalidEnumCaseBranch {
                        case: case_name.clone(),
                        context: context(),
                    });
                }
            }
        }
        InstKind::Return(value) => {
            let expected = &func.signature.ret;
            match value {
                Some(value) => {
                    let found = module.use_type(func, value);
                    if !module.type_eq(&found, expected) {
                        return Err(VerifierError::ReturnTypeMismatch {
                            function: func.name.clone(),
                            expected: expected.clone(),
                            found,
                        });
                    }
                }
                None => {
                    if !module.is_void(expected) {
                        return Err(VerifierError::ReturnTypeMismatch {
                            function: func.name.clone(),
                            expected: expected.clone(),
                            found: Type::void(),
                        });
                    }
                }
            }
        }
        InstKind::Literal { literal, ty } => {
            verify_literal(module, func, literal, ty, context)?;
        }
        InstKind::Extract { from, keys } => {
            if keys.is_empty() {
                return Err(VerifierError::MissingIndices { context: context() });
            }
            let from_ty = module.use_type(func, from);
            if module.element_type(&from_ty, keys).is_none() {
                return Err(VerifierError::InvalidIndices { context: context() });
            }
        }
        InstKind::Insert { source, dest, keys } => {
            if keys.is_empty() {
                return Err(VerifierError::MissingIndices { context: context() });
            }
            let dest_ty = module.use_type(func, dest);
            let Some(element) = module.element_type(&dest_ty, keys) else {
                return Err(VerifierError::InvalidIndices { context: context() });
            };
            let source_ty = module.use_type(func, source);
            if !module.type_eq(&element, &source_ty) {
                return Err(VerifierError::TypeMismatch {
                    context: context(),
                    expected: element,
                    found: source_ty,
                });
            }
        }
        InstKind::Apply { callee, args } => {
            let callee_ty = module.canonical(&module.use_type(func, callee));
            let Type::Function(params, _) = callee_ty else {
                return Err(VerifierError::NotFunction {
                    context: context(),
                    found: callee_ty,
                });
            };
            let conforms = params.len() == args.len()
                && params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| module.type_eq(param, &module.use_type(func, arg)));
            if !conforms {
                return Err(VerifierError::FunctionArgumentMismatch { context: context() });
            }
        }
        InstKind::Load(pointer) => {
            let ty = module.canonical(&module.use_type(func, pointer));
            if !matches!(ty, Type::Pointer(_)) {
                return Err(VerifierError::NotPointer {
                    context: context(),
                    found: ty,
                });
            }
        }
        InstKind::Store { value, pointer } => {
            let ty = module.canonical(&module.use_type(func, pointer));
            let Type::Pointer(pointee) = ty else {
                return Err(VerifierError::NotPointer {
                    context: context(),
                    found: ty,
                });
            };
            let value_ty = module.use_type(func, value);
            if !module.type_eq(&pointee, &value_ty) {
                return Err(VerifierError::TypeMismatch {
                    context: context(),
                    expected: *pointee,
                    found: value_ty,
                });
            }
        }
        InstKind::ElementPointer { pointer, keys } => {
            let ty = module.canonical(&module.use_type(func, pointer));
            let Type::Pointer(pointee) = ty else {
                return Err(VerifierError::NotPointer {
                    context: context(),
                    found: ty,
                });
            };
            if module.element_type(&pointee, keys).is_none() {
                return Err(VerifierError::InvalidOffset { context: context() });
            }
        }
        InstKind::Builtin {
            intrinsic,
            operands,
        } => {
            let Some(decl) = intrinsics.get(intrinsic) else {
                return Err(VerifierError::InvalidIntrinsic {
                    name: intrinsic.clone(),
                });
            };
            let conforms = decl.params.len() == operands.len()
                && decl
                    .params
                    .iter()
                    .zip(operands)
                    .all(|(param, arg)| module.type_eq(param, &module.use_type(func, arg)));
            if !conforms {
                return Err(VerifierError::FunctionArgumentMismatch { context: context() });
            }
        }
        InstKind::Trap => {}
    }
    Ok(())
}

/// A literal must conform to its declared type, recursively.
fn verify_literal(
    module: &Module,
    func: &Function,
    literal: &Literal,
    ty: &Type,
    context: &impl Fn() -> String,
) -> Result<(), VerifierError> {
    let canonical = module.canonical(ty);
    match literal {
        // Undefined and zero values exist at every valid type.
        Literal::Undefined | Literal::Zero => Ok(()),
        Literal::Null => match canonical {
            Type::Pointer(_) => Ok(()),
            _ => Err(VerifierError::InvalidLiteral { context: context() }),
        },
        Literal::Bool(_) => match canonical {
            Type::Bool => Ok(()),
            _ => Err(VerifierError::InvalidLiteral { context: context() }),
        },
        Literal::Tuple(elems) => {
            let Type::Tuple(elem_types) = canonical else {
                return Err(VerifierError::NotTuple {
                    context: context(),
                    found: canonical,
                });
            };
            if elems.len() != elem_types.len() {
                return Err(VerifierError::InvalidLiteral { context: context() });
            }
            for (elem, elem_ty) in elems.iter().zip(&elem_types) {
                verify_literal_use(module, func, elem, elem_ty, context)?;
            }
            Ok(())
        }
        Literal::Struct(fields) => {
            let Type::Struct(struct_id) = canonical else {
                return Err(VerifierError::InvalidLiteral { context: context() });
            };
            let decl = &module.structs[struct_id];
            for (field_name, field_use) in fields {
                let Some(field_ty) = decl.field_type(field_name) else {
                    return Err(VerifierError::InvalidLiteral { context: context() });
                };
                verify_literal_use(module, func, field_use, field_ty, context)?;
            }
            Ok(())
        }
        Literal::EnumCase(case_name, assoc) => {
            let Type::Enum(enum_id) = canonical else {
                return Err(VerifierError::InvalidLiteral { context: context() });
            };
            let Some(case) = module.enums[enum_id].case(case_name) else {
                return Err(VerifierError::InvalidEnumCase {
                    case: case_name.clone(),
                    context: context(),
                });
            };
            if assoc.len() != case.associated_types.len() {
                return Err(VerifierError::InvalidLiteral { context: context() });
            }
            for (elem, elem_ty) in assoc.iter().zip(&case.associated_types) {
                verify_literal_use(module, func, elem, elem_ty, context)?;
            }
            Ok(())
        }
    }
}

fn verify_literal_use(
    module: &Module,
    func: &Function,
    u: &Use,
    expected: &Type,
    context: &impl Fn() -> String,
) -> Result<(), VerifierError> {
    let found = module.use_type(func, u);
    if !module.type_eq(&found, expected) {
        return Err(VerifierError::UseTypeMismatch { context: context() });
    }
    if let Use::Literal { literal, ty } = u {
        verify_literal(module, func, literal, ty, context)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::{BooleanOp, InstData};
    use crate::signature::Signature;
    use crate::types::StructDecl;

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

    fn bool_func() -> (Module, Function, Block) {
        let module = Module::new("m".into());
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        (module, func, entry)
    }

    #[test]
    fn test_boolean_operands_must_be_bool() {
        let (module, mut func, entry) = bool_func();
        // A bool literal annotated with a non-bool type: operand-safe, but
        // ill-typed for a boolean operation.
        let ill_typed = Use::Literal {
            ty: Type::Tuple(vec![Type::Bool]),
            literal: Literal::Bool(true),
        };
        let and = place(
            &mut func,
            entry,
            InstKind::BooleanBinary {
                op: BooleanOp::And,
                lhs: Use::bool(true),
                rhs: ill_typed,
            },
            Type::Bool,
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), and);
        assert!(matches!(result, Err(VerifierError::NotBool { .. })));
    }

    #[test]
    fn test_nested_literal_outside_literal_inst() {
        let (module, mut func, entry) = bool_func();
        let ret = place(
            &mut func,
            entry,
            InstKind::Return(Some(Use::Literal {
                ty: Type::Tuple(vec![Type::Bool]),
                literal: Literal::Tuple(vec![Use::bool(true)]),
            })),
            Type::void(),
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), ret);
        assert!(matches!(
            result,
            Err(VerifierError::NestedLiteralNotInLiteralInstruction { .. })
        ));
    }

    #[test]
    fn test_bool_literal_operand_is_fine() {
        let (module, mut func, entry) = bool_func();
        let not = place(
            &mut func,
            entry,
            InstKind::Not(Use::bool(true)),
            Type::Bool,
        );
        assert!(verify_inst(&module, &func, &IntrinsicRegistry::standard(), not).is_ok());
    }

    #[test]
    fn test_detached_operand_rejected() {
        let (module, mut func, entry) = bool_func();
        let ghost = func.create_inst(InstData {
            name: None,
            kind: InstKind::Not(Use::bool(true)),
            ty: Type::Bool,
            block: None,
        });
        let user = place(
            &mut func,
            entry,
            InstKind::Not(Use::inst(ghost)),
            Type::Bool,
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), user);
        assert!(matches!(result, Err(VerifierError::UseInvalidParent { .. })));
    }

    #[test]
    fn test_struct_literal_unknown_field() {
        let mut module = Module::new("m".into());
        let s = module.declare_struct(StructDecl {
            name: "s".into(),
            fields: vec![("foo".into(), Type::Bool)],
        });
        let mut func = Function::new("f".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let lit = place(
            &mut func,
            entry,
            InstKind::Literal {
                literal: Literal::Struct(vec![("bar".into(), Use::bool(false))]),
                ty: Type::Struct(s),
            },
            Type::Struct(s),
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), lit);
        assert!(matches!(result, Err(VerifierError::InvalidLiteral { .. })));
    }

    #[test]
    fn test_unknown_intrinsic() {
        let (module, mut func, entry) = bool_func();
        let call = place(
            &mut func,
            entry,
            InstKind::Builtin {
                intrinsic: "bogus".into(),
                operands: vec![],
            },
            Type::Invalid,
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), call);
        assert!(matches!(result, Err(VerifierError::InvalidIntrinsic { .. })));
    }

    #[test]
    fn test_extract_requires_keys() {
        let (module, mut func, entry) = bool_func();
        let extract = place(
            &mut func,
            entry,
            InstKind::Extract {
                from: Use::bool(true),
                keys: vec![],
            },
            Type::Invalid,
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), extract);
        assert!(matches!(result, Err(VerifierError::MissingIndices { .. })));
    }

    #[test]
    fn test_load_requires_pointer() {
        let (module, mut func, entry) = bool_func();
        let load = place(
            &mut func,
            entry,
            InstKind::Load(Use::bool(true)),
            Type::Invalid,
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), load);
        assert!(matches!(result, Err(VerifierError::NotPointer { .. })));
    }

    #[test]
    fn test_stale_cached_type_detected() {
        let (module, mut func, entry) = bool_func();
        // `not` infers bool; the cached type says tuple.
        let bad = place(
            &mut func,
            entry,
            InstKind::Not(Use::bool(true)),
            Type::void(),
        );
        let result = verify_inst(&module, &func, &IntrinsicRegistry::standard(), bad);
        assert!(matches!(result, Err(VerifierError::UnexpectedType { .. })));
    }
}
