//! Def-use analysis: which instructions reference each definition.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::Inst;
use crate::function::Function;
use crate::literal::Definition;
use crate::pass::Analysis;

/// Reverse map from definitions to the placed instructions that use them.
///
/// Uses nested inside literal operands and element keys count. Detached
/// instructions neither use nor get used.
#[derive(Debug, Clone, Default)]
pub struct DefUse {
    users: BTreeMap<Definition, BTreeSet<Inst>>,
}

impl DefUse {
    /// Compute the map for a function.
    pub fn compute(func: &Function) -> Self {
        let mut users: BTreeMap<Definition, BTreeSet<Inst>> = BTreeMap::new();
        for block in func.blocks() {
            for &inst in &func.block(block).insts {
                func.inst(inst).kind.for_each_use(|u| {
                    if let Some(def) = u.definition() {
                        users.entry(def).or_default().insert(inst);
                    }
                });
            }
        }
        Self { users }
    }

    /// The set of instructions using a definition.
    pub fn users(&self, def: Definition) -> impl Iterator<Item = Inst> + '_ {
        self.users
            .get(&def)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether a definition has no users.
    pub fn is_unused(&self, def: Definition) -> bool {
        self.users.get(&def).map(BTreeSet::is_empty).unwrap_or(true)
    }

    /// Number of distinct using instructions.
    pub fn user_count(&self, def: Definition) -> usize {
        self.users.get(&def).map(BTreeSet::len).unwrap_or(0)
    }
}

/// Analysis wrapper producing the cached def-use map of a function.
pub struct DefUseAnalysis;

impl Analysis<Function> for DefUseAnalysis {
    type Result = DefUse;

    fn name(&self) -> &'static str {
        "def-use"
    }

    fn run(&self, unit: &Function) -> DefUse {
        DefUse::compute(unit)
    }
}
