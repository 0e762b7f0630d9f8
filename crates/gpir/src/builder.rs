//! IR builder.
//!
//! A mutable cursor over a module. The builder keeps an insertion point (a
//! function, block, and position within the block); `build_inst` inserts
//! there and advances. Construction does not verify: staged, not-yet-valid
//! IR is allowed and caught by the verifier. Every mutation invalidates the
//! affected function's pass cache (via the function's own mutation APIs).

use crate::entity::{Block, FuncId, VarId};
use crate::function::{DeclarationKind, Function};
use crate::inst::{BooleanOp, InstData, InstKind};
use crate::intrinsics::IntrinsicRegistry;
use crate::literal::{ElementKey, Literal, Use};
use crate::module::{Module, Variable};
use crate::signature::Signature;
use crate::types::{EnumDecl, StructDecl, Type, TypeAlias};

#[derive(Debug, Clone, Copy)]
struct Position {
    func: FuncId,
    block: Block,
    index: usize,
}

/// Factory for well-formed IR construction.
pub struct Builder<'a> {
    module: &'a mut Module,
    intrinsics: &'a IntrinsicRegistry,
    position: Option<Position>,
}

impl<'a> Builder<'a> {
    /// Create a builder over a module.
    pub fn new(module: &'a mut Module, intrinsics: &'a IntrinsicRegistry) -> Self {
        Self {
            module,
            intrinsics,
            position: None,
        }
    }

    /// The module under construction.
    pub fn module(&self) -> &Module {
        self.module
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declare a struct and return its type.
    pub fn create_struct(&mut self, name: &str, fields: Vec<(String, Type)>) -> Type {
        Type::Struct(self.module.declare_struct(StructDecl {
            name: name.to_string(),
            fields,
        }))
    }

    /// Declare an enum and return its type.
    pub fn create_enum(&mut self, decl: EnumDecl) -> Type {
        Type::Enum(self.module.declare_enum(decl))
    }

    /// Declare a type alias and return its type.
    pub fn create_alias(&mut self, name: &str, ty: Option<Type>) -> Type {
        Type::Alias(self.module.declare_alias(TypeAlias {
            name: name.to_string(),
            ty,
        }))
    }

    /// Add a global variable.
    pub fn create_variable(&mut self, name: &str, value_type: Type) -> VarId {
        self.module.add_variable(Variable {
            name: name.to_string(),
            value_type,
        })
    }

    /// Create a function with a named entry block parameter per argument and
    /// move the insertion point to its entry.
    pub fn create_function(
        &mut self,
        name: &str,
        params: Vec<(String, Type)>,
        ret: Type,
    ) -> FuncId {
        let signature = Signature::new(params.iter().map(|(_, ty)| ty.clone()).collect(), ret);
        let mut func = Function::new(name.to_string(), signature);
        let entry = func.create_block("entry".to_string());
        for (param_name, ty) in params {
            func.add_block_param(entry, param_name, ty);
        }
        let id = self.module.add_function(func);
        self.position = Some(Position {
            func: id,
            block: entry,
            index: 0,
        });
        id
    }

    /// Declare an external function: a signature with no body.
    pub fn declare_function(&mut self, name: &str, params: Vec<Type>, ret: Type) -> FuncId {
        let mut func = Function::new(name.to_string(), Signature::new(params, ret));
        func.declaration_kind = Some(DeclarationKind::External);
        self.module.add_function(func)
    }

    /// Append a block with the given parameters to a function.
    pub fn append_block(
        &mut self,
        func: FuncId,
        name: &str,
        params: Vec<(String, Type)>,
    ) -> Block {
        let function = &mut self.module.functions[func];
        let block = function.create_block(name.to_string());
        for (param_name, ty) in params {
            function.add_block_param(block, param_name, ty);
        }
        block
    }

    // ========================================================================
    // Insertion point
    // ========================================================================

    /// Move the insertion point to the end of a block.
    pub fn move_to_end(&mut self, func: FuncId, block: Block) {
        let index = self.module.functions[func].block(block).insts.len();
        self.position = Some(Position { func, block, index });
    }

    /// Move the insertion point to a position within a block.
    pub fn move_to(&mut self, func: FuncId, block: Block, index: usize) {
        self.position = Some(Position { func, block, index });
    }

    /// A use of a block parameter, by position.
    pub fn arg_use(&self, func: FuncId, block: Block, index: usize) -> Use {
        Use::arg(self.module.functions[func].block(block).params[index])
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// Build an unnamed instruction at the insertion point.
    pub fn build_inst(&mut self, kind: InstKind) -> crate::entity::Inst {
        self.build(None, kind)
    }

    /// Build a named instruction at the insertion point.
    pub fn build_named_inst(&mut self, name: &str, kind: InstKind) -> crate::entity::Inst {
        self.build(Some(name.to_string()), kind)
    }

    fn build(&mut self, name: Option<String>, kind: InstKind) -> crate::entity::Inst {
        let position = self
            .position
            .as_mut()
            .expect("builder requires an insertion point");
        let ty = self
            .module
            .infer_inst_type(position.func, &kind, self.intrinsics);
        let function = &mut self.module.functions[position.func];
        let inst = function.create_inst(InstData {
            name,
            kind,
            ty,
            block: None,
        });
        function.insert_inst(inst, position.block, position.index);
        position.index += 1;
        inst
    }

    /// `and`/`or`.
    pub fn boolean(&mut self, op: BooleanOp, lhs: Use, rhs: Use) -> crate::entity::Inst {
        self.build_inst(InstKind::BooleanBinary { op, lhs, rhs })
    }

    /// Boolean negation.
    pub fn not(&mut self, operand: Use) -> crate::entity::Inst {
        self.build_inst(InstKind::Not(operand))
    }

    /// Unconditional branch.
    pub fn branch(&mut self, target: Block, args: Vec<Use>) -> crate::entity::Inst {
        self.build_inst(InstKind::Branch { target, args })
    }

    /// Two-way conditional branch.
    pub fn conditional(
        &mut self,
        condition: Use,
        then_target: Block,
        then_args: Vec<Use>,
        else_target: Block,
        else_args: Vec<Use>,
    ) -> crate::entity::Inst {
        self.build_inst(InstKind::Conditional {
            condition,
            then_target,
            then_args,
            else_target,
            else_args,
        })
    }

    /// Multi-way branch over enum cases.
    pub fn branch_enum(&mut self, subject: Use, cases: Vec<(String, Block)>) -> crate::entity::Inst {
        self.build_inst(InstKind::BranchEnum { subject, cases })
    }

    /// Function return.
    pub fn ret(&mut self, value: Option<Use>) -> crate::entity::Inst {
        self.build_inst(InstKind::Return(value))
    }

    /// Literal constructor.
    pub fn literal(&mut self, literal: Literal, ty: Type) -> crate::entity::Inst {
        self.build_inst(InstKind::Literal { literal, ty })
    }

    /// Element extraction.
    pub fn extract(&mut self, from: Use, keys: Vec<ElementKey>) -> crate::entity::Inst {
        self.build_inst(InstKind::Extract { from, keys })
    }

    /// Element replacement.
    pub fn insert(&mut self, source: Use, dest: Use, keys: Vec<ElementKey>) -> crate::entity::Inst {
        self.build_inst(InstKind::Insert { source, dest, keys })
    }

    /// Function application.
    pub fn apply(&mut self, callee: Use, args: Vec<Use>) -> crate::entity::Inst {
        self.build_inst(InstKind::Apply { callee, args })
    }

    /// Load through a pointer.
    pub fn load(&mut self, pointer: Use) -> crate::entity::Inst {
        self.build_inst(InstKind::Load(pointer))
    }

    /// Store through a pointer.
    pub fn store(&mut self, value: Use, pointer: Use) -> crate::entity::Inst {
        self.build_inst(InstKind::Store { value, pointer })
    }

    /// Pointer arithmetic.
    pub fn element_pointer(&mut self, pointer: Use, keys: Vec<ElementKey>) -> crate::entity::Inst {
        self.build_inst(InstKind::ElementPointer { pointer, keys })
    }

    /// Intrinsic invocation.
    pub fn builtin(&mut self, intrinsic: &str, operands: Vec<Use>) -> crate::entity::Inst {
        self.build_inst(InstKind::Builtin {
            intrinsic: intrinsic.to_string(),
            operands,
        })
    }

    /// Abort.
    pub fn trap(&mut self) -> crate::entity::Inst {
        self.build_inst(InstKind::Trap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::verify_module;

    #[test]
    fn test_build_simple_function() {
        let registry = IntrinsicRegistry::standard();
        let mut module = Module::new("m".into());
        let mut builder = Builder::new(&mut module, &registry);

        let f = builder.create_function(
            "f",
            vec![("x".into(), Type::Bool), ("y".into(), Type::Bool)],
            Type::Bool,
        );
        let entry = module_entry(&builder, f);
        let x = builder.arg_use(f, entry, 0);
        let y = builder.arg_use(f, entry, 1);
        let both = builder.boolean(BooleanOp::And, x, y);
        builder.ret(Some(Use::inst(both)));

        assert!(verify_module(&module, &registry).is_ok());
    }

    fn module_entry(builder: &Builder<'_>, func: FuncId) -> Block {
        builder.module().functions[func].entry_block().unwrap()
    }

    #[test]
    fn test_builder_infers_types() {
        let registry = IntrinsicRegistry::standard();
        let mut module = Module::new("m".into());
        let mut builder = Builder::new(&mut module, &registry);

        let f = builder.create_function("f", vec![("x".into(), Type::Bool)], Type::void());
        let entry = module_entry(&builder, f);
        let x = builder.arg_use(f, entry, 0);
        let not = builder.not(x);
        builder.ret(None);

        assert_eq!(module.functions[f].inst(not).ty, Type::Bool);
    }

    #[test]
    fn test_builder_insertion_position() {
        let registry = IntrinsicRegistry::standard();
        let mut module = Module::new("m".into());
        let mut builder = Builder::new(&mut module, &registry);

        let f = builder.create_function("f", vec![], Type::void());
        let entry = module_entry(&builder, f);
        let last = builder.not(Use::bool(true));
        builder.ret(None);

        // Insert before the existing instructions.
        builder.move_to(f, entry, 0);
        let first = builder.not(Use::bool(false));

        assert_eq!(
            module.functions[f].block(entry).insts,
            vec![first, last, module.functions[f].block(entry).insts[2]]
        );
    }

    #[test]
    fn test_builder_invalidates_pass_cache() {
        use crate::analysis::DefUseAnalysis;

        let registry = IntrinsicRegistry::standard();
        let mut module = Module::new("m".into());
        let mut builder = Builder::new(&mut module, &registry);

        let f = builder.create_function("f", vec![], Type::void());
        let before = builder.module().functions[f].analysis(&DefUseAnalysis);
        builder.ret(None);
        let after = module.functions[f].analysis(&DefUseAnalysis);
        assert!(!std::rc::Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_external_declaration_has_no_body() {
        let registry = IntrinsicRegistry::standard();
        let mut module = Module::new("m".into());
        let mut builder = Builder::new(&mut module, &registry);
        let f = builder.declare_function("ext", vec![Type::Bool], Type::Bool);

        assert!(module.functions[f].is_declaration());
        assert_eq!(module.functions[f].block_count(), 0);
        assert!(verify_module(&module, &registry).is_ok());
    }
}
