//! Textual form of the IR.
//!
//! The printed form is deterministic and round-trips through the parser.
//! Definition identifiers use sigils: `%name` for instructions and
//! arguments, `@name` for variables and functions, `'name` for blocks.
//! Instructions without a name print as `%<blockIndex>.<instIndex>`.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write;

use crate::entity::Inst;
use crate::function::{Function, FunctionAttribute};
use crate::ident;
use crate::inst::{InstKind, InstData};
use crate::literal::{Definition, ElementKey, Literal, Use};
use crate::module::Module;
use crate::types::Type;

/// Print a module in its canonical textual form.
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = write!(out, "module {}\nstage {}\n", ident::quote(&module.name), module.stage);

    for decl in module.enums.values() {
        let _ = write!(out, "\nenum ${} {{\n", decl.name);
        for case in &decl.cases {
            let _ = write!(out, "    {}(", case.name);
            for (i, ty) in case.associated_types.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_type(&mut out, module, ty);
            }
            let _ = writeln!(out, ")");
        }
        let _ = writeln!(out, "}}");
    }

    for decl in module.structs.values() {
        let _ = write!(out, "\nstruct ${} {{\n", decl.name);
        for (field, ty) in &decl.fields {
            let _ = write!(out, "    #{}: ", field);
            write_type(&mut out, module, ty);
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "}}");
    }

    for decl in module.aliases.values() {
        let _ = write!(out, "\nalias ${} = ", decl.name);
        match &decl.ty {
            Some(ty) => write_type(&mut out, module, ty),
            None => {
                let _ = write!(out, "opaque");
            }
        }
        let _ = writeln!(out);
    }

    for var in module.variables.values() {
        let _ = write!(out, "\nvar @{}: ", var.name);
        write_type(&mut out, module, &var.value_type);
        let _ = writeln!(out);
    }

    for func in module.functions.values() {
        let _ = writeln!(out);
        write_function(&mut out, module, func);
    }

    out
}

/// Print a single function in its canonical textual form.
pub fn print_function(module: &Module, func: &Function) -> String {
    let mut out = String::new();
    write_function(&mut out, module, func);
    out
}

fn write_function(out: &mut String, module: &Module, func: &Function) {
    for attr in &func.attributes {
        let name = match attr {
            FunctionAttribute::Inline => "inline",
            FunctionAttribute::Pure => "pure",
        };
        let _ = write!(out, "[{}] ", name);
    }
    if func.is_declaration() {
        let _ = write!(out, "external ");
    }
    let _ = write!(out, "func @{}: (", func.name);
    for (i, ty) in func.signature.params.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, ", ");
        }
        write_type(out, module, ty);
    }
    let _ = write!(out, ") -> ");
    write_type(out, module, &func.signature.ret);

    if func.is_declaration() {
        let _ = writeln!(out);
        return;
    }

    let ids = value_ids(func);
    let _ = writeln!(out, " {{");
    for block in func.blocks() {
        let data = func.block(block);
        let _ = write!(out, "'{}(", data.name);
        for (i, &arg) in data.params.iter().enumerate() {
            if i > 0 {
                let _ = write!(out, ", ");
            }
            let _ = write!(out, "%{}: ", func.arg(arg).name);
            write_type(out, module, &func.arg(arg).ty);
        }
        let _ = writeln!(out, "):");
        for &inst in &data.insts {
            let _ = write!(out, "    ");
            write_inst(out, module, func, &ids, inst);
            let _ = writeln!(out);
        }
    }
    let _ = writeln!(out, "}}");
}

/// Identifier of every placed instruction: its name, or its position as
/// `<blockIndex>.<instIndex>`.
fn value_ids(func: &Function) -> BTreeMap<Inst, String> {
    let mut ids = BTreeMap::new();
    for (block_index, block) in func.blocks().enumerate() {
        for (inst_index, &inst) in func.block(block).insts.iter().enumerate() {
            let id = match &func.inst(inst).name {
                Some(name) => name.clone(),
                None => format!("{}.{}", block_index, inst_index),
            };
            ids.insert(inst, id);
        }
    }
    ids
}

fn write_type(out: &mut String, module: &Module, ty: &Type) {
    match ty {
        Type::Bool => {
            let _ = write!(out, "bool");
        }
        Type::Tuple(elems) => {
            let _ = write!(out, "(");
            for (i, elem) in elems.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_type(out, module, elem);
            }
            let _ = write!(out, ")");
        }
        Type::Struct(id) => {
            let _ = write!(out, "${}", module.structs[*id].name);
        }
        Type::Enum(id) => {
            let _ = write!(out, "${}", module.enums[*id].name);
        }
        Type::Pointer(pointee) => {
            let _ = write!(out, "*");
            write_type(out, module, pointee);
        }
        Type::Function(params, ret) => {
            let _ = write!(out, "(");
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_type(out, module, param);
            }
            let _ = write!(out, ") -> ");
            write_type(out, module, ret);
        }
        Type::Alias(id) => {
            let _ = write!(out, "${}", module.aliases[*id].name);
        }
        Type::Invalid => {
            let _ = write!(out, "invalid");
        }
    }
}

fn write_literal(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    literal: &Literal,
) {
    match literal {
        Literal::Undefined => {
            let _ = write!(out, "undefined");
        }
        Literal::Null => {
            let _ = write!(out, "null");
        }
        Literal::Zero => {
            let _ = write!(out, "zero");
        }
        Literal::Bool(value) => {
            let _ = write!(out, "{}", value);
        }
        Literal::Tuple(elems) => {
            let _ = write!(out, "(");
            for (i, elem) in elems.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_use(out, module, func, ids, elem);
            }
            let _ = write!(out, ")");
        }
        Literal::Struct(fields) => {
            let _ = write!(out, "{{");
            for (i, (field, value)) in fields.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                let _ = write!(out, "#{} = ", field);
                write_use(out, module, func, ids, value);
            }
            let _ = write!(out, "}}");
        }
        Literal::EnumCase(case, assoc) => {
            let _ = write!(out, "?{}(", case);
            for (i, elem) in assoc.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_use(out, module, func, ids, elem);
            }
            let _ = write!(out, ")");
        }
    }
}

fn write_def_id(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    def: Definition,
) {
    match def {
        Definition::Arg(arg) => {
            let _ = write!(out, "%{}", func.arg(arg).name);
        }
        Definition::Inst(inst) => match ids.get(&inst) {
            Some(id) => {
                let _ = write!(out, "%{}", id);
            }
            None => {
                // Detached instruction; cannot happen in verified IR.
                let _ = write!(out, "%{}", inst);
            }
        },
        Definition::Var(var) => {
            let _ = write!(out, "@{}", module.variables[var].name);
        }
        Definition::Func(f) => {
            let _ = write!(out, "@{}", module.functions[f].name);
        }
    }
}

fn write_use(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    u: &Use,
) {
    match u {
        Use::Literal { ty, literal } => {
            write_literal(out, module, func, ids, literal);
            let _ = write!(out, ": ");
            write_type(out, module, ty);
        }
        Use::Def(def) => {
            write_def_id(out, module, func, ids, *def);
            let _ = write!(out, ": ");
            let ty = module.use_type(func, u);
            write_type(out, module, &ty);
        }
    }
}

fn write_keys(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    keys: &[ElementKey],
) {
    let _ = write!(out, "[");
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, ", ");
        }
        match key {
            ElementKey::Index(index) => {
                let _ = write!(out, "{}", index);
            }
            ElementKey::Name(name) => {
                let _ = write!(out, "#{}", name);
            }
            ElementKey::Value(value) => {
                write_use(out, module, func, ids, value);
            }
        }
    }
    let _ = write!(out, "]");
}

fn write_block_args(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    target: crate::entity::Block,
    args: &[Use],
) {
    let _ = write!(out, "'{}(", func.block(target).name);
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, ", ");
        }
        write_use(out, module, func, ids, arg);
    }
    let _ = write!(out, ")");
}

fn write_inst(
    out: &mut String,
    module: &Module,
    func: &Function,
    ids: &BTreeMap<Inst, String>,
    inst: Inst,
) {
    let data: &InstData = func.inst(inst);
    if !module.is_void(&data.ty) {
        let _ = write!(out, "%{} = ", ids[&inst]);
    }
    match &data.kind {
        InstKind::BooleanBinary { op, lhs, rhs } => {
            let _ = write!(out, "{} ", op);
            write_use(out, module, func, ids, lhs);
            let _ = write!(out, ", ");
            write_use(out, module, func, ids, rhs);
        }
        InstKind::Not(operand) => {
            let _ = write!(out, "not ");
            write_use(out, module, func, ids, operand);
        }
        InstKind::Literal { literal, ty } => {
            let _ = write!(out, "literal ");
            write_literal(out, module, func, ids, literal);
            let _ = write!(out, ": ");
            write_type(out, module, ty);
        }
        InstKind::Apply { callee, args } => {
            let _ = write!(out, "apply ");
            match callee.definition() {
                Some(def) => write_def_id(out, module, func, ids, def),
                None => write_use(out, module, func, ids, callee),
            }
            let _ = write!(out, "(");
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_use(out, module, func, ids, arg);
            }
            let _ = write!(out, ") -> ");
            write_type(out, module, &data.ty);
        }
        InstKind::Extract { from, keys } => {
            let _ = write!(out, "extract ");
            write_keys(out, module, func, ids, keys);
            let _ = write!(out, " from ");
            write_use(out, module, func, ids, from);
        }
        InstKind::Insert { source, dest, keys } => {
            let _ = write!(out, "insert ");
            write_use(out, module, func, ids, source);
            let _ = write!(out, " to ");
            write_use(out, module, func, ids, dest);
            let _ = write!(out, " at ");
            write_keys(out, module, func, ids, keys);
        }
        InstKind::Branch { target, args } => {
            let _ = write!(out, "branch ");
            write_block_args(out, module, func, ids, *target, args);
        }
        InstKind::Conditional {
            condition,
            then_target,
            then_args,
            else_target,
            else_args,
        } => {
            let _ = write!(out, "conditional ");
            write_use(out, module, func, ids, condition);
            let _ = write!(out, " then ");
            write_block_args(out, module, func, ids, *then_target, then_args);
            let _ = write!(out, " else ");
            write_block_args(out, module, func, ids, *else_target, else_args);
        }
        InstKind::BranchEnum { subject, cases } => {
            let _ = write!(out, "branchEnum ");
            write_use(out, module, func, ids, subject);
            for (case, target) in cases {
                let _ = write!(out, " case ?{} '{}", case, func.block(*target).name);
            }
        }
        InstKind::Load(pointer) => {
            let _ = write!(out, "load ");
            write_use(out, module, func, ids, pointer);
        }
        InstKind::Store { value, pointer } => {
            let _ = write!(out, "store ");
            write_use(out, module, func, ids, value);
            let _ = write!(out, " to ");
            write_use(out, module, func, ids, pointer);
        }
        InstKind::ElementPointer { pointer, keys } => {
            let _ = write!(out, "elementPointer ");
            write_use(out, module, func, ids, pointer);
            let _ = write!(out, " at ");
            write_keys(out, module, func, ids, keys);
        }
        InstKind::Builtin {
            intrinsic,
            operands,
        } => {
            let _ = write!(out, "builtin \"{}\"(", intrinsic);
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, ", ");
                }
                write_use(out, module, func, ids, operand);
            }
            let _ = write!(out, ")");
        }
        InstKind::Return(value) => {
            let _ = write!(out, "return");
            if let Some(value) = value {
                let _ = write!(out, " ");
                write_use(out, module, func, ids, value);
            }
        }
        InstKind::Trap => {
            let _ = write!(out, "trap");
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_module(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::inst::BooleanOp;
    use crate::intrinsics::IntrinsicRegistry;

    #[test]
    fn test_print_types() {
        let mut module = Module::new("m".into());
        let registry = IntrinsicRegistry::standard();
        let mut builder = Builder::new(&mut module, &registry);
        let s = builder.create_struct("S", vec![("f".into(), Type::Bool)]);

        let mut out = String::new();
        write_type(&mut out, &module, &Type::Bool);
        assert_eq!(out, "bool");

        let mut out = String::new();
        write_type(&mut out, &module, &Type::void());
        assert_eq!(out, "()");

        let mut out = String::new();
        write_type(
            &mut out,
            &module,
            &Type::Function(vec![Type::Bool, s.clone()], Box::new(Type::Bool)),
        );
        assert_eq!(out, "(bool, $S) -> bool");

        let mut out = String::new();
        write_type(&mut out, &module, &s.pointer());
        assert_eq!(out, "*$S");
    }

    #[test]
    fn test_print_simple_function() {
        let mut module = Module::new("m".into());
        let registry = IntrinsicRegistry::standard();
        let mut builder = Builder::new(&mut module, &registry);
        let f = builder.create_function(
            "conjunction",
            vec![("x".into(), Type::Bool), ("y".into(), Type::Bool)],
            Type::Bool,
        );
        let entry = builder.module().functions[f].entry_block().unwrap();
        let x = builder.arg_use(f, entry, 0);
        let y = builder.arg_use(f, entry, 1);
        let both = builder.boolean(BooleanOp::And, x, y);
        builder.ret(Some(Use::inst(both)));

        let printed = print_function(&module, &module.functions[f]);
        let expected = "\
func @conjunction: (bool, bool) -> bool {
'entry(%x: bool, %y: bool):
    %0.0 = and %x: bool, %y: bool
    return %0.0: bool
}
";
        assert_eq!(printed, expected);
    }

    #[test]
    fn test_module_header() {
        let module = Module::new("my \"module\"".into());
        let printed = print_module(&module);
        assert!(printed.starts_with("module \"my \\\"module\\\"\"\nstage raw\n"));
    }

    #[test]
    fn test_named_instructions_use_their_names() {
        let mut module = Module::new("m".into());
        let registry = IntrinsicRegistry::standard();
        let mut builder = Builder::new(&mut module, &registry);
        let f = builder.create_function("f", vec![("x".into(), Type::Bool)], Type::Bool);
        let entry = builder.module().functions[f].entry_block().unwrap();
        let x = builder.arg_use(f, entry, 0);
        builder.build_named_inst("negated", InstKind::Not(x));
        let negated = module.functions[f].find_named_def("negated").unwrap();
        let mut builder = Builder::new(&mut module, &registry);
        builder.move_to_end(f, entry);
        match negated {
            Definition::Inst(inst) => {
                builder.ret(Some(Use::inst(inst)));
            }
            _ => unreachable!(),
        }

        let printed = print_function(&module, &module.functions[f]);
        assert!(printed.contains("%negated = not %x: bool"));
        assert!(printed.contains("return %negated: bool"));
    }
}
