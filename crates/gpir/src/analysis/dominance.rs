//! Dominance analysis using Cooper's "Simple, Fast Dominator Algorithm".

use std::collections::BTreeMap;

use crate::analysis::cfg::{CfgAnalysis, ControlFlowGraph};
use crate::entity::{Block, Inst};
use crate::function::Function;
use crate::literal::Definition;
use crate::pass::Analysis;

/// Dominator tree over a function's basic blocks, rooted at entry.
///
/// Unreachable blocks are excluded: they have no RPO number, dominate
/// nothing, and are dominated by nothing.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// Immediate dominator of each reachable non-entry block.
    idom: BTreeMap<Block, Block>,
    /// 1-based reverse post-order numbers; absence means unreachable.
    rpo_number: BTreeMap<Block, u32>,
    entry: Option<Block>,
}

impl DominatorTree {
    /// Compute the dominator tree from a CFG.
    pub fn compute(cfg: &ControlFlowGraph) -> Self {
        let rpo = cfg.reverse_post_order();
        let mut rpo_number = BTreeMap::new();
        for (i, &block) in rpo.iter().enumerate() {
            rpo_number.insert(block, (i + 1) as u32);
        }

        let entry = cfg.entry();
        let mut idom: BTreeMap<Block, Block> = BTreeMap::new();

        // Iterate to a fixed point over the reachable blocks in RPO,
        // intersecting the dominator sets of processed predecessors.
        let mut changed = true;
        while changed {
            changed = false;
            for &block in &rpo {
                if Some(block) == entry {
                    continue;
                }
                let mut candidate: Option<Block> = None;
                for pred in cfg.predecessors(block) {
                    if !rpo_number.contains_key(&pred) {
                        continue;
                    }
                    // Only predecessors whose idom is already set (or entry)
                    // participate in the intersection.
                    if Some(pred) != entry && !idom.contains_key(&pred) {
                        continue;
                    }
                    candidate = Some(match candidate {
                        None => pred,
                        Some(current) => {
                            Self::intersect(current, pred, &idom, &rpo_number)
                        }
                    });
                }
                if let Some(candidate) = candidate {
                    if idom.get(&block) != Some(&candidate) {
                        idom.insert(block, candidate);
                        changed = true;
                    }
                }
            }
        }

        Self {
            idom,
            rpo_number,
            entry,
        }
    }

    fn intersect(
        a: Block,
        b: Block,
        idom: &BTreeMap<Block, Block>,
        rpo_number: &BTreeMap<Block, u32>,
    ) -> Block {
        let mut finger1 = a;
        let mut finger2 = b;
        while finger1 != finger2 {
            while rpo_number[&finger1] > rpo_number[&finger2] {
                match idom.get(&finger1) {
                    Some(&next) => finger1 = next,
                    None => return finger2,
                }
            }
            while rpo_number[&finger2] > rpo_number[&finger1] {
                match idom.get(&finger2) {
                    Some(&next) => finger2 = next,
                    None => return finger1,
                }
            }
        }
        finger1
    }

    /// Is the block reachable from entry?
    pub fn contains(&self, block: Block) -> bool {
        self.rpo_number.contains_key(&block)
    }

    /// Does `a` dominate `b`? Reflexive; false for unreachable blocks.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if a == b {
            return true;
        }
        // Walk up from b; dominators always have smaller RPO numbers.
        let target = self.rpo_number[&a];
        let mut current = b;
        while self.rpo_number[&current] > target {
            match self.idom.get(&current) {
                Some(&next) => current = next,
                None => return false,
            }
        }
        current == a
    }

    /// Does `a` strictly dominate `b`?
    pub fn properly_dominates_block(&self, a: Block, b: Block) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Does the definition properly dominate the user instruction?
    ///
    /// Same-block cases compare linear positions: block parameters are
    /// defined at block entry, instructions at their index. Globals and
    /// function references are always in scope.
    pub fn properly_dominates(&self, func: &Function, def: Definition, user: Inst) -> bool {
        let Some((user_block, user_index)) = func.inst_position(user) else {
            return false;
        };
        match def {
            Definition::Var(_) | Definition::Func(_) => true,
            Definition::Arg(arg) => {
                let def_block = func.arg(arg).block;
                self.dominates(def_block, user_block)
            }
            Definition::Inst(def_inst) => {
                let Some((def_block, def_index)) = func.inst_position(def_inst) else {
                    return false;
                };
                if def_block == user_block {
                    def_index < user_index
                } else {
                    self.properly_dominates_block(def_block, user_block)
                }
            }
        }
    }

    /// Immediate dominator, if any.
    pub fn immediate_dominator(&self, block: Block) -> Option<Block> {
        self.idom.get(&block).copied()
    }

    /// Children in the dominator tree, in block order.
    pub fn children(&self, block: Block) -> Vec<Block> {
        self.idom
            .iter()
            .filter(|(_, &parent)| parent == block)
            .map(|(&child, _)| child)
            .collect()
    }

    /// Reachable blocks in dominator-tree pre-order.
    pub fn pre_order(&self) -> Vec<Block> {
        let mut order = Vec::new();
        if let Some(entry) = self.entry {
            if self.contains(entry) {
                self.pre_order_from(entry, &mut order);
            }
        }
        order
    }

    fn pre_order_from(&self, block: Block, order: &mut Vec<Block>) {
        order.push(block);
        for child in self.children(block) {
            self.pre_order_from(child, order);
        }
    }
}

/// Analysis wrapper producing the cached dominator tree of a function.
pub struct DominanceAnalysis;

impl Analysis<Function> for DominanceAnalysis {
    type Result = DominatorTree;

    fn name(&self) -> &'static str {
        "dominance"
    }

    fn run(&self, unit: &Function) -> DominatorTree {
        let cfg = unit.analysis(&CfgAnalysis);
        DominatorTree::compute(&cfg)
    }
}
