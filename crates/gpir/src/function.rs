//! Functions.
//!
//! A function owns its blocks, block parameters, and instructions in primary
//! maps, plus the layout ordering (`block_order` and each block's `insts`).
//! Entities are never deallocated; removal detaches them from the layout.
//! Every mutation invalidates the function's cached analysis results.

use std::collections::BTreeSet;

use crate::block::{ArgData, BlockData};
use crate::entity::{Arg, Block, Inst};
use crate::inst::InstData;
use crate::literal::{Definition, Use};
use crate::pass::PassManager;
use crate::signature::Signature;
use crate::types::Type;
use crate::PrimaryMap;

/// Function attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunctionAttribute {
    /// Inlining hint.
    Inline,
    /// The function has no observable side effects; its applications are
    /// eligible for dead-code elimination.
    Pure,
}

/// Declaration kinds. A declared function has no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    External,
}

/// A function in the IR.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub attributes: BTreeSet<FunctionAttribute>,
    pub declaration_kind: Option<DeclarationKind>,
    blocks: PrimaryMap<Block, BlockData>,
    args: PrimaryMap<Arg, ArgData>,
    insts: PrimaryMap<Inst, InstData>,
    block_order: Vec<Block>,
    passes: PassManager<Function>,
}

impl Function {
    /// Create a new function with an empty body.
    pub fn new(name: String, signature: Signature) -> Self {
        Self {
            name,
            signature,
            attributes: BTreeSet::new(),
            declaration_kind: None,
            blocks: PrimaryMap::new(),
            args: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            block_order: Vec::new(),
            passes: PassManager::new(),
        }
    }

    /// Is this a bodiless declaration?
    pub fn is_declaration(&self) -> bool {
        self.declaration_kind.is_some()
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Create a block and append it to the layout.
    pub fn create_block(&mut self, name: String) -> Block {
        let block = self.blocks.push(BlockData::new(name));
        self.block_order.push(block);
        self.invalidate_pass_results();
        block
    }

    /// Append a parameter to a block.
    pub fn add_block_param(&mut self, block: Block, name: String, ty: Type) -> Arg {
        let arg = self.args.push(ArgData { name, ty, block });
        self.blocks[block].params.push(arg);
        self.invalidate_pass_results();
        arg
    }

    /// Create an instruction without inserting it into any block.
    pub fn create_inst(&mut self, data: InstData) -> Inst {
        self.insts.push(data)
    }

    /// Append an instruction to the end of a block.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(self.insts[inst].block.is_none(), "instruction already placed");
        self.insts[inst].block = Some(block);
        self.blocks[block].insts.push(inst);
        self.invalidate_pass_results();
    }

    /// Insert an instruction into a block at the given position.
    pub fn insert_inst(&mut self, inst: Inst, block: Block, index: usize) {
        debug_assert!(self.insts[inst].block.is_none(), "instruction already placed");
        self.insts[inst].block = Some(block);
        self.blocks[block].insts.insert(index, inst);
        self.invalidate_pass_results();
    }

    /// Detach an instruction from its block. Its slot stays allocated so
    /// outstanding entity IDs remain valid, but it no longer prints, executes,
    /// or verifies.
    pub fn remove_inst(&mut self, inst: Inst) {
        if let Some(block) = self.insts[inst].block.take() {
            self.blocks[block].insts.retain(|i| *i != inst);
        }
        self.invalidate_pass_results();
    }

    /// Detach a block from the layout.
    pub fn remove_block(&mut self, block: Block) {
        self.block_order.retain(|b| *b != block);
        self.invalidate_pass_results();
    }

    /// Move a block to the end of the layout.
    pub fn move_block_to_end(&mut self, block: Block) {
        self.block_order.retain(|b| *b != block);
        self.block_order.push(block);
        self.invalidate_pass_results();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The entry block, i.e. the first block in layout order.
    pub fn entry_block(&self) -> Option<Block> {
        self.block_order.first().copied()
    }

    /// Blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    /// Number of blocks in the layout.
    pub fn block_count(&self) -> usize {
        self.block_order.len()
    }

    /// Block data.
    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    /// Mutable block data. For layout changes prefer the dedicated methods,
    /// which keep parent links consistent.
    pub fn block_mut(&mut self, block: Block) -> &mut BlockData {
        self.invalidate_pass_results();
        &mut self.blocks[block]
    }

    /// Instruction data.
    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    /// Mutable instruction data.
    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstData {
        self.invalidate_pass_results();
        &mut self.insts[inst]
    }

    /// Argument data.
    pub fn arg(&self, arg: Arg) -> &ArgData {
        &self.args[arg]
    }

    /// Rename a block parameter.
    pub fn rename_arg(&mut self, arg: Arg, name: String) {
        self.args[arg].name = name;
        self.invalidate_pass_results();
    }

    /// All allocated arguments, placed or not.
    pub fn args(&self) -> impl Iterator<Item = (Arg, &ArgData)> {
        self.args.iter()
    }

    /// All allocated instructions, placed or not.
    pub fn insts(&self) -> impl Iterator<Item = (Inst, &InstData)> {
        self.insts.iter()
    }

    /// Position of an instruction within its block.
    pub fn inst_position(&self, inst: Inst) -> Option<(Block, usize)> {
        let block = self.insts.get(inst)?.block?;
        let index = self.blocks[block].insts.iter().position(|i| *i == inst)?;
        Some((block, index))
    }

    /// The type of a definition local to this function. `None` for module
    /// globals and functions, which need module context.
    pub fn local_def_type(&self, def: Definition) -> Option<Type> {
        match def {
            Definition::Arg(arg) => Some(self.args[arg].ty.clone()),
            Definition::Inst(inst) => Some(self.insts[inst].ty.clone()),
            Definition::Var(_) | Definition::Func(_) => None,
        }
    }

    /// Find a placed definition by name.
    pub fn find_named_def(&self, name: &str) -> Option<Definition> {
        for (arg, data) in self.args.iter() {
            if data.name == name {
                return Some(Definition::Arg(arg));
            }
        }
        for (inst, data) in self.insts.iter() {
            if data.block.is_some() && data.name.as_deref() == Some(name) {
                return Some(Definition::Inst(inst));
            }
        }
        None
    }

    /// Find a block by name.
    pub fn find_block(&self, name: &str) -> Option<Block> {
        self.blocks().find(|b| self.blocks[*b].name == name)
    }

    // ========================================================================
    // Substitution
    // ========================================================================

    /// Rewrite every use of `old` to `with`, across all instructions
    /// (including uses nested in literal operands and element keys).
    /// Returns the number of rewritten uses.
    pub fn replace_all_uses(&mut self, old: Definition, with: &Use) -> usize {
        let mut rewritten = 0;
        for data in self.insts.values_mut() {
            data.kind.for_each_use_mut(|u| {
                if u.definition() == Some(old) {
                    *u = with.clone();
                    rewritten += 1;
                }
            });
        }
        if rewritten > 0 {
            self.invalidate_pass_results();
        }
        rewritten
    }

    // ========================================================================
    // Pass cache
    // ========================================================================

    /// Fetch or compute a cached analysis result.
    pub fn analysis<A: crate::pass::Analysis<Function>>(
        &self,
        pass: &A,
    ) -> std::rc::Rc<A::Result> {
        self.passes.analysis(pass, self)
    }

    /// Drop all cached analysis results. Called by every mutation entry
    /// point; cheap when the cache is already empty.
    pub fn invalidate_pass_results(&self) {
        self.passes.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::{BooleanOp, InstKind};
    use crate::literal::Use;

    fn boolean(op: BooleanOp, lhs: Use, rhs: Use) -> InstData {
        InstData {
            name: None,
            kind: InstKind::BooleanBinary { op, lhs, rhs },
            ty: Type::Bool,
            block: None,
        }
    }

    #[test]
    fn test_function_layout() {
        let mut func = Function::new("test".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let other = func.create_block("next".into());

        assert_eq!(func.entry_block(), Some(entry));
        let order: Vec<_> = func.blocks().collect();
        assert_eq!(order, vec![entry, other]);
    }

    #[test]
    fn test_block_params() {
        let mut func = Function::new("test".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let x = func.add_block_param(entry, "x".into(), Type::Bool);

        assert_eq!(func.block(entry).params, vec![x]);
        assert_eq!(func.arg(x).ty, Type::Bool);
        assert_eq!(func.arg(x).block, entry);
    }

    #[test]
    fn test_inst_insert_remove() {
        let mut func = Function::new("test".into(), Signature::empty());
        let entry = func.create_block("entry".into());

        let a = func.create_inst(boolean(BooleanOp::And, Use::bool(true), Use::bool(true)));
        let b = func.create_inst(boolean(BooleanOp::Or, Use::bool(true), Use::bool(false)));
        func.append_inst(a, entry);
        func.insert_inst(b, entry, 0);

        assert_eq!(func.block(entry).insts, vec![b, a]);
        assert_eq!(func.inst_position(a), Some((entry, 1)));

        func.remove_inst(b);
        assert_eq!(func.block(entry).insts, vec![a]);
        assert_eq!(func.inst(b).block, None);
        assert_eq!(func.inst_position(b), None);
    }

    #[test]
    fn test_replace_all_uses() {
        let mut func = Function::new("test".into(), Signature::empty());
        let entry = func.create_block("entry".into());

        let a = func.create_inst(boolean(BooleanOp::And, Use::bool(true), Use::bool(true)));
        func.append_inst(a, entry);
        let b = func.create_inst(boolean(BooleanOp::Or, Use::inst(a), Use::inst(a)));
        func.append_inst(b, entry);

        let replaced = func.replace_all_uses(Definition::Inst(a), &Use::bool(false));
        assert_eq!(replaced, 2);
        match &func.inst(b).kind {
            InstKind::BooleanBinary { lhs, rhs, .. } => {
                assert_eq!(*lhs, Use::bool(false));
                assert_eq!(*rhs, Use::bool(false));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_find_named_def_skips_detached() {
        let mut func = Function::new("test".into(), Signature::empty());
        let entry = func.create_block("entry".into());
        let a = func.create_inst(InstData {
            name: Some("a".into()),
            kind: InstKind::Not(Use::bool(true)),
            ty: Type::Bool,
            block: None,
        });
        assert_eq!(func.find_named_def("a"), None);
        func.append_inst(a, entry);
        assert_eq!(func.find_named_def("a"), Some(Definition::Inst(a)));
    }

    #[test]
    fn test_move_block_to_end() {
        let mut func = Function::new("test".into(), Signature::empty());
        let a = func.create_block("a".into());
        let b = func.create_block("b".into());
        let c = func.create_block("c".into());

        func.move_block_to_end(a);
        let order: Vec<_> = func.blocks().collect();
        assert_eq!(order, vec![b, c, a]);
    }
}
