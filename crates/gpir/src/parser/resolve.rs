//! Resolution: loose syntax tree to real IR.
//!
//! Declarations land first (names before bodies, so declarations may
//! reference each other in any order), then function shells (so `apply` can
//! reference any function, including the one being built), then bodies.
//! Instruction result types are re-inferred to a fixpoint because the text
//! may reference an instruction that appears later in the layout.

use std::collections::HashMap;

use crate::entity::{AliasId, Block, EntityRef, EnumId, FuncId, Inst, StructId};
use crate::function::{DeclarationKind, Function, FunctionAttribute};
use crate::inst::{InstData, InstKind};
use crate::intrinsics::IntrinsicRegistry;
use crate::literal::{Definition, ElementKey, Literal, Use};
use crate::module::{Module, Variable};
use crate::parser::{
    ParseError, PFunc, PKey, PKind, PLiteral, PModule, PRef, PType, PUse,
};
use crate::signature::Signature;
use crate::types::{EnumCase, EnumDecl, StructDecl, Type, TypeAlias};

fn err(message: impl Into<String>) -> ParseError {
    ParseError::whole_input(message)
}

pub(crate) fn resolve_module(
    parsed: PModule,
    intrinsics: &IntrinsicRegistry,
) -> Result<Module, ParseError> {
    let mut module = Module::new(parsed.name.clone());
    module.stage = parsed
        .stage
        .parse()
        .map_err(|()| err(format!("unknown stage '{}'", parsed.stage)))?;

    // Declaration names first, bodies second: declarations may reference
    // each other (and themselves) in any order.
    for (name, _) in &parsed.enums {
        module.declare_enum(EnumDecl {
            name: name.clone(),
            cases: Vec::new(),
        });
    }
    for (name, _) in &parsed.structs {
        module.declare_struct(StructDecl {
            name: name.clone(),
            fields: Vec::new(),
        });
    }
    for (name, _) in &parsed.aliases {
        module.declare_alias(TypeAlias {
            name: name.clone(),
            ty: None,
        });
    }

    for (index, (_, cases)) in parsed.enums.iter().enumerate() {
        let mut resolved = Vec::new();
        for (case_name, assoc) in cases {
            let mut associated_types = Vec::new();
            for ty in assoc {
                associated_types.push(resolve_type(&module, ty)?);
            }
            resolved.push(EnumCase {
                name: case_name.clone(),
                associated_types,
            });
        }
        module.enums[EnumId::from_index(index)].cases = resolved;
    }
    for (index, (_, fields)) in parsed.structs.iter().enumerate() {
        let mut resolved = Vec::new();
        for (field_name, ty) in fields {
            resolved.push((field_name.clone(), resolve_type(&module, ty)?));
        }
        module.structs[StructId::from_index(index)].fields = resolved;
    }
    for (index, (_, ty)) in parsed.aliases.iter().enumerate() {
        let resolved = match ty {
            Some(ty) => Some(resolve_type(&module, ty)?),
            None => None,
        };
        module.aliases[AliasId::from_index(index)].ty = resolved;
    }

    for (name, ty) in &parsed.variables {
        let value_type = resolve_type(&module, ty)?;
        module.add_variable(Variable {
            name: name.clone(),
            value_type,
        });
    }

    // Function shells, so any body can reference any signature.
    for pfunc in &parsed.functions {
        let mut params = Vec::new();
        for ty in &pfunc.params {
            params.push(resolve_type(&module, ty)?);
        }
        let ret = resolve_type(&module, &pfunc.ret)?;
        let mut func = Function::new(pfunc.name.clone(), Signature::new(params, ret));
        for attr in &pfunc.attributes {
            let attr = match attr.as_str() {
                "inline" => FunctionAttribute::Inline,
                "pure" => FunctionAttribute::Pure,
                other => return Err(err(format!("unknown attribute '{}'", other))),
            };
            func.attributes.insert(attr);
        }
        if pfunc.external {
            func.declaration_kind = Some(DeclarationKind::External);
        }
        module.add_function(func);
    }

    for (index, pfunc) in parsed.functions.iter().enumerate() {
        if pfunc.external {
            continue;
        }
        let id = FuncId::from_index(index);
        let built = build_body(&module, id, pfunc, intrinsics)?;
        module.functions[id] = built;
    }

    Ok(module)
}

fn resolve_type(module: &Module, ty: &PType) -> Result<Type, ParseError> {
    Ok(match ty {
        PType::Bool => Type::Bool,
        PType::Invalid => Type::Invalid,
        PType::Named(name) => module
            .type_by_name(name)
            .ok_or_else(|| err(format!("unknown type ${}", name)))?,
        PType::Tuple(elems) => {
            let mut resolved = Vec::new();
            for elem in elems {
                resolved.push(resolve_type(module, elem)?);
            }
            Type::Tuple(resolved)
        }
        PType::Pointer(pointee) => resolve_type(module, pointee)?.pointer(),
        PType::Function(params, ret) => {
            let mut resolved = Vec::new();
            for param in params {
                resolved.push(resolve_type(module, param)?);
            }
            Type::Function(resolved, Box::new(resolve_type(module, ret)?))
        }
    })
}

struct Names {
    values: HashMap<String, Definition>,
    positional: HashMap<(usize, usize), Inst>,
    blocks: HashMap<String, Block>,
}

fn build_body(
    module: &Module,
    id: FuncId,
    pfunc: &PFunc,
    intrinsics: &IntrinsicRegistry,
) -> Result<Function, ParseError> {
    let mut func = module.functions[id].clone();
    let mut names = Names {
        values: HashMap::new(),
        positional: HashMap::new(),
        blocks: HashMap::new(),
    };

    // Blocks and parameters.
    let mut block_order = Vec::new();
    for pblock in &pfunc.blocks {
        let block = func.create_block(pblock.name.clone());
        if names.blocks.insert(pblock.name.clone(), block).is_some() {
            return Err(err(format!("duplicate block '{}'", pblock.name)));
        }
        for (param_name, ty) in &pblock.params {
            let ty = resolve_type(module, ty)?;
            let arg = func.add_block_param(block, param_name.clone(), ty);
            if names
                .values
                .insert(param_name.clone(), Definition::Arg(arg))
                .is_some()
            {
                return Err(err(format!("duplicate value %{}", param_name)));
            }
        }
        block_order.push(block);
    }

    // Pre-assign instruction entities so forward references resolve.
    let mut next_index = 0usize;
    for (block_index, pblock) in pfunc.blocks.iter().enumerate() {
        for (inst_index, pinst) in pblock.insts.iter().enumerate() {
            let inst = Inst::from_index(next_index);
            next_index += 1;
            names.positional.insert((block_index, inst_index), inst);
            if let Some(name) = &pinst.name {
                if names
                    .values
                    .insert(name.clone(), Definition::Inst(inst))
                    .is_some()
                {
                    return Err(err(format!("duplicate value %{}", name)));
                }
            }
        }
    }

    for (block_index, pblock) in pfunc.blocks.iter().enumerate() {
        for pinst in &pblock.insts {
            let kind = resolve_kind(module, &pinst.kind, &names)?;
            let inst = func.create_inst(InstData {
                name: pinst.name.clone(),
                kind,
                ty: Type::Invalid,
                block: None,
            });
            func.append_inst(inst, block_order[block_index]);
        }
    }

    // Result types form a DAG through operand references, but the layout may
    // list a user before its definition; iterate to a fixpoint.
    let placed: Vec<Inst> = func
        .blocks()
        .flat_map(|block| func.block(block).insts.clone())
        .collect();
    for _ in 0..=placed.len() {
        let mut changed = false;
        for &inst in &placed {
            let inferred = func.inst(inst).kind.result_type(&func, module, intrinsics);
            if inferred != func.inst(inst).ty {
                func.inst_mut(inst).ty = inferred;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    Ok(func)
}

fn resolve_ref(module: &Module, reference: &PRef, names: &Names) -> Result<Definition, ParseError> {
    match reference {
        PRef::Value(name) => names
            .values
            .get(name)
            .copied()
            .ok_or_else(|| err(format!("unknown value %{}", name))),
        PRef::Positional(block, index) => names
            .positional
            .get(&(*block, *index))
            .copied()
            .map(Definition::Inst)
            .ok_or_else(|| err(format!("unknown value %{}.{}", block, index))),
        PRef::Global(name) => module
            .global_by_name(name)
            .ok_or_else(|| err(format!("unknown global @{}", name))),
    }
}

fn resolve_use(module: &Module, pu: &PUse, names: &Names) -> Result<Use, ParseError> {
    match pu {
        PUse::Ref(reference, _annotated) => {
            Ok(Use::Def(resolve_ref(module, reference, names)?))
        }
        PUse::Literal(literal, ty) => Ok(Use::Literal {
            ty: resolve_type(module, ty)?,
            literal: resolve_literal(module, literal, names)?,
        }),
    }
}

fn resolve_uses(module: &Module, uses: &[PUse], names: &Names) -> Result<Vec<Use>, ParseError> {
    uses.iter().map(|u| resolve_use(module, u, names)).collect()
}

fn resolve_literal(
    module: &Module,
    literal: &PLiteral,
    names: &Names,
) -> Result<Literal, ParseError> {
    Ok(match literal {
        PLiteral::Undefined => Literal::Undefined,
        PLiteral::Null => Literal::Null,
        PLiteral::Zero => Literal::Zero,
        PLiteral::Bool(value) => Literal::Bool(*value),
        PLiteral::Tuple(elems) => Literal::Tuple(resolve_uses(module, elems, names)?),
        PLiteral::Struct(fields) => {
            let mut resolved = Vec::new();
            for (field_name, value) in fields {
                resolved.push((field_name.clone(), resolve_use(module, value, names)?));
            }
            Literal::Struct(resolved)
        }
        PLiteral::EnumCase(case, assoc) => {
            Literal::EnumCase(case.clone(), resolve_uses(module, assoc, names)?)
        }
    })
}

fn resolve_block(names: &Names, name: &str) -> Result<Block, ParseError> {
    names
        .blocks
        .get(name)
        .copied()
        .ok_or_else(|| err(format!("unknown block '{}'", name)))
}

fn resolve_keys(module: &Module, keys: &[PKey], names: &Names) -> Result<Vec<ElementKey>, ParseError> {
    keys.iter()
        .map(|key| {
            Ok(match key {
                PKey::Index(index) => ElementKey::Index(*index),
                PKey::Name(name) => ElementKey::Name(name.clone()),
                PKey::Value(value) => ElementKey::Value(resolve_use(module, value, names)?),
            })
        })
        .collect()
}

fn resolve_kind(module: &Module, kind: &PKind, names: &Names) -> Result<InstKind, ParseError> {
    Ok(match kind {
        PKind::Builtin(intrinsic, operands) => InstKind::Builtin {
            intrinsic: intrinsic.clone(),
            operands: resolve_uses(module, operands, names)?,
        },
        PKind::Branch(target, args) => InstKind::Branch {
            target: resolve_block(names, target)?,
            args: resolve_uses(module, args, names)?,
        },
        PKind::Conditional {
            condition,
            then_target,
            then_args,
            else_target,
            else_args,
        } => InstKind::Conditional {
            condition: resolve_use(module, condition, names)?,
            then_target: resolve_block(names, then_target)?,
            then_args: resolve_uses(module, then_args, names)?,
            else_target: resolve_block(names, else_target)?,
            else_args: resolve_uses(module, else_args, names)?,
        },
        PKind::BranchEnum(subject, cases) => InstKind::BranchEnum {
            subject: resolve_use(module, subject, names)?,
            cases: cases
                .iter()
                .map(|(case, target)| Ok((case.clone(), resolve_block(names, target)?)))
                .collect::<Result<_, ParseError>>()?,
        },
        PKind::Return(value) => InstKind::Return(match value {
            Some(value) => Some(resolve_use(module, value, names)?),
            None => None,
        }),
        PKind::Literal(literal, ty) => InstKind::Literal {
            literal: resolve_literal(module, literal, names)?,
            ty: resolve_type(module, ty)?,
        },
        PKind::BooleanBinary(op, lhs, rhs) => InstKind::BooleanBinary {
            op: *op,
            lhs: resolve_use(module, lhs, names)?,
            rhs: resolve_use(module, rhs, names)?,
        },
        PKind::Not(operand) => InstKind::Not(resolve_use(module, operand, names)?),
        PKind::Extract(from, keys) => InstKind::Extract {
            from: resolve_use(module, from, names)?,
            keys: resolve_keys(module, keys, names)?,
        },
        PKind::Insert { source, dest, keys } => InstKind::Insert {
            source: resolve_use(module, source, names)?,
            dest: resolve_use(module, dest, names)?,
            keys: resolve_keys(module, keys, names)?,
        },
        PKind::Apply(callee, args, _ret) => InstKind::Apply {
            callee: Use::Def(resolve_ref(module, callee, names)?),
            args: resolve_uses(module, args, names)?,
        },
        PKind::Load(pointer) => InstKind::Load(resolve_use(module, pointer, names)?),
        PKind::Store { value, pointer } => InstKind::Store {
            value: resolve_use(module, value, names)?,
            pointer: resolve_use(module, pointer, names)?,
        },
        PKind::ElementPointer(pointer, keys) => InstKind::ElementPointer {
            pointer: resolve_use(module, pointer, names)?,
            keys: resolve_keys(module, keys, names)?,
        },
        PKind::Trap => InstKind::Trap,
    })
}
