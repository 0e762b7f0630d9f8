//! Control flow graph construction.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::Block;
use crate::function::Function;
use crate::pass::Analysis;

/// Control flow graph of a function's blocks.
///
/// Edges come from the terminator of each block in the layout. Blocks with no
/// terminator (unfinished IR) simply contribute no edges.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    predecessors: BTreeMap<Block, BTreeSet<Block>>,
    successors: BTreeMap<Block, BTreeSet<Block>>,
    entry: Option<Block>,
}

impl ControlFlowGraph {
    /// Build the CFG from a function's layout.
    pub fn compute(func: &Function) -> Self {
        let mut predecessors: BTreeMap<Block, BTreeSet<Block>> = BTreeMap::new();
        let mut successors: BTreeMap<Block, BTreeSet<Block>> = BTreeMap::new();

        for block in func.blocks() {
            predecessors.entry(block).or_default();
            successors.entry(block).or_default();
        }

        for block in func.blocks() {
            let Some(terminator) = func.block(block).terminator() else {
                continue;
            };
            for (target, _) in func.inst(terminator).kind.branch_targets() {
                successors.entry(block).or_default().insert(target);
                predecessors.entry(target).or_default().insert(block);
            }
        }

        Self {
            predecessors,
            successors,
            entry: func.entry_block(),
        }
    }

    /// The entry block.
    pub fn entry(&self) -> Option<Block> {
        self.entry
    }

    /// Predecessors of a block.
    pub fn predecessors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.predecessors
            .get(&block)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Successors of a block.
    pub fn successors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.successors
            .get(&block)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of predecessors of a block.
    pub fn pred_count(&self, block: Block) -> usize {
        self.predecessors.get(&block).map(BTreeSet::len).unwrap_or(0)
    }

    /// Blocks reachable from entry, in reverse post-order.
    pub fn reverse_post_order(&self) -> Vec<Block> {
        let mut visited = BTreeSet::new();
        let mut post_order = Vec::new();
        let Some(entry) = self.entry else {
            return post_order;
        };
        self.dfs(entry, &mut visited, &mut post_order);
        post_order.reverse();
        post_order
    }

    fn dfs(&self, block: Block, visited: &mut BTreeSet<Block>, post_order: &mut Vec<Block>) {
        if !visited.insert(block) {
            return;
        }
        for succ in self.successors(block) {
            self.dfs(succ, visited, post_order);
        }
        post_order.push(block);
    }
}

/// Analysis wrapper so the CFG participates in per-function caching.
pub struct CfgAnalysis;

impl Analysis<Function> for CfgAnalysis {
    type Result = ControlFlowGraph;

    fn name(&self) -> &'static str {
        "cfg"
    }

    fn run(&self, unit: &Function) -> ControlFlowGraph {
        ControlFlowGraph::compute(unit)
    }
}
