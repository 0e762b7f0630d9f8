//! Algebra simplification.
//!
//! Declared but not implemented: the pass walks the algebraic expression
//! views and applies no rewrite. It exists so pipelines naming it run
//! end-to-end.

use crate::analysis::{AlgebraicExpressionAnalysis, TraversalOrder};
use crate::function::Function;
use crate::pass::{Transform, TransformContext};

pub struct AlgebraSimplification;

impl Transform<Function> for AlgebraSimplification {
    fn name(&self) -> &'static str {
        "AlgebraSimplification"
    }

    fn run(&self, _cx: &TransformContext<'_>, func: &mut Function) -> bool {
        let expressions = func.analysis(&AlgebraicExpressionAnalysis);
        for (_, roots) in &expressions.blocks {
            for root in roots {
                for _expr in root.transpose_traversed(TraversalOrder::BreadthFirst) {
                    // No rewrite rules yet.
                }
            }
        }
        false
    }
}
