//! Function analyses: control flow, dominance, def-use, algebraic views.

pub mod algebraic;
pub mod cfg;
pub mod def_use;
pub mod dominance;

pub use algebraic::{AlgebraicExpressionAnalysis, AlgebraicExpressions, ExprNode, TraversalOrder};
pub use cfg::{CfgAnalysis, ControlFlowGraph};
pub use def_use::{DefUse, DefUseAnalysis};
pub use dominance::{DominanceAnalysis, DominatorTree};
