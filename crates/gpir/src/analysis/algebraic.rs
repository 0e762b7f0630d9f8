//! Algebraic expression views.
//!
//! Per block, this analysis groups pure data-flow instructions into
//! expression trees: a root is a pure instruction whose value escapes its
//! expression (multiple users, a non-expression user, or a user in another
//! block); an operand folds into its user's tree when it is a pure
//! instruction in the same block with exactly that one user. Everything else
//! is an atom leaf.

use std::collections::VecDeque;

use crate::analysis::def_use::DefUseAnalysis;
use crate::entity::{Block, Inst};
use crate::function::Function;
use crate::inst::InstKind;
use crate::literal::{Definition, Use};
use crate::pass::Analysis;

/// A node in an expression tree.
#[derive(Debug, Clone)]
pub enum ExprNode {
    /// A leaf operand: argument, literal, or a value that escapes its
    /// defining expression.
    Atom(Use),
    /// A non-atomic node rooted at an instruction.
    Expr { inst: Inst, children: Vec<ExprNode> },
}

/// Traversal orders accepted by [`ExprNode::transpose_traversed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    BreadthFirst,
}

impl ExprNode {
    /// Is this node a leaf?
    pub fn is_atom(&self) -> bool {
        matches!(self, ExprNode::Atom(_))
    }

    /// Lazily traverse the subexpressions of this tree in the given order.
    pub fn transpose_traversed(&self, order: TraversalOrder) -> Traversal<'_> {
        let TraversalOrder::BreadthFirst = order;
        let mut queue = VecDeque::new();
        queue.push_back(self);
        Traversal { queue }
    }
}

/// Lazy breadth-first walk over expression nodes.
pub struct Traversal<'a> {
    queue: VecDeque<&'a ExprNode>,
}

impl<'a> Iterator for Traversal<'a> {
    type Item = &'a ExprNode;

    fn next(&mut self) -> Option<&'a ExprNode> {
        let node = self.queue.pop_front()?;
        if let ExprNode::Expr { children, .. } = node {
            self.queue.extend(children.iter());
        }
        Some(node)
    }
}

/// The per-block expression trees of a function.
#[derive(Debug, Clone, Default)]
pub struct AlgebraicExpressions {
    /// (block, root expressions in instruction order) pairs in layout order.
    pub blocks: Vec<(Block, Vec<ExprNode>)>,
}

impl AlgebraicExpressions {
    /// Root expressions of one block.
    pub fn roots(&self, block: Block) -> &[ExprNode] {
        self.blocks
            .iter()
            .find(|(b, _)| *b == block)
            .map(|(_, roots)| roots.as_slice())
            .unwrap_or(&[])
    }
}

fn is_expression_kind(kind: &InstKind) -> bool {
    matches!(
        kind,
        InstKind::BooleanBinary { .. }
            | InstKind::Not(_)
            | InstKind::Extract { .. }
            | InstKind::Insert { .. }
            | InstKind::Literal { .. }
    )
}

/// Analysis producing the algebraic expression views of a function.
pub struct AlgebraicExpressionAnalysis;

impl Analysis<Function> for AlgebraicExpressionAnalysis {
    type Result = AlgebraicExpressions;

    fn name(&self) -> &'static str {
        "algebraic-expressions"
    }

    fn run(&self, func: &Function) -> AlgebraicExpressions {
        let def_use = func.analysis(&DefUseAnalysis);

        let folds_into_user = |inst: Inst, block: Block| -> bool {
            if !is_expression_kind(&func.inst(inst).kind) {
                return false;
            }
            let users: Vec<_> = def_use.users(Definition::Inst(inst)).collect();
            let &[user] = &users[..] else {
                return false;
            };
            func.inst(user).block == Some(block) && is_expression_kind(&func.inst(user).kind)
        };

        fn build(
            func: &Function,
            block: Block,
            inst: Inst,
            folds: &dyn Fn(Inst, Block) -> bool,
        ) -> ExprNode {
            let mut children = Vec::new();
            func.inst(inst).kind.for_each_use(|u| {
                match u.definition() {
                    Some(Definition::Inst(operand)) if folds(operand, block) => {
                        children.push(build(func, block, operand, folds));
                    }
                    _ => children.push(ExprNode::Atom(u.clone())),
                }
            });
            ExprNode::Expr { inst, children }
        }

        let mut blocks = Vec::new();
        for block in func.blocks() {
            let mut roots = Vec::new();
            for &inst in &func.block(block).insts {
                if is_expression_kind(&func.inst(inst).kind) && !folds_into_user(inst, block) {
                    roots.push(build(func, block, inst, &folds_into_user));
                }
            }
            blocks.push((block, roots));
        }
        AlgebraicExpressions { blocks }
    }
}
