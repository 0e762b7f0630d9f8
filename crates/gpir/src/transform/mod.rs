//! Transform passes.

pub mod algebra_simplification;
pub mod cfg_canonicalization;
pub mod cfg_simplification;
pub mod cse;
pub mod dce;

pub use algebra_simplification::AlgebraSimplification;
pub use cfg_canonicalization::CfgCanonicalization;
pub use cfg_simplification::CfgSimplification;
pub use cse::CommonSubexpressionElimination;
pub use dce::DeadCodeElimination;

/// The passes the driver knows by name or abbreviation. Some are recognized
/// but have no implementation; the driver reports those instead of silently
/// skipping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    AlgebraSimplification,
    CfgCanonicalization,
    CfgSimplification,
    CommonSubexpressionElimination,
    DeadCodeElimination,
    LiteralBroadcastingPromotion,
    StackPromotion,
    ValuePromotion,
}

impl PassKind {
    /// Parse an abbreviation or a full pass name.
    pub fn parse(name: &str) -> Option<PassKind> {
        match name {
            "AS" | "AlgebraSimplification" => Some(PassKind::AlgebraSimplification),
            "CFGCan" | "CFGCanonicalization" => Some(PassKind::CfgCanonicalization),
            "CFGSimp" | "CFGSimplification" => Some(PassKind::CfgSimplification),
            "CSE" | "CommonSubexpressionElimination" => {
                Some(PassKind::CommonSubexpressionElimination)
            }
            "DCE" | "DeadCodeElimination" => Some(PassKind::DeadCodeElimination),
            "LBP" | "LiteralBroadcastingPromotion" => {
                Some(PassKind::LiteralBroadcastingPromotion)
            }
            "SP" | "StackPromotion" => Some(PassKind::StackPromotion),
            "VP" | "ValuePromotion" => Some(PassKind::ValuePromotion),
            _ => None,
        }
    }

    /// The full pass name.
    pub fn full_name(&self) -> &'static str {
        match self {
            PassKind::AlgebraSimplification => "AlgebraSimplification",
            PassKind::CfgCanonicalization => "CFGCanonicalization",
            PassKind::CfgSimplification => "CFGSimplification",
            PassKind::CommonSubexpressionElimination => "CommonSubexpressionElimination",
            PassKind::DeadCodeElimination => "DeadCodeElimination",
            PassKind::LiteralBroadcastingPromotion => "LiteralBroadcastingPromotion",
            PassKind::StackPromotion => "StackPromotion",
            PassKind::ValuePromotion => "ValuePromotion",
        }
    }

    /// Whether an implementation exists behind the name.
    pub fn is_implemented(&self) -> bool {
        !matches!(
            self,
            PassKind::LiteralBroadcastingPromotion
                | PassKind::StackPromotion
                | PassKind::ValuePromotion
        )
    }
}
