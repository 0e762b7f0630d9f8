//! Pass framework: analyses, transforms, and per-unit result caching.
//!
//! An `Analysis` reads a unit and produces a result that the unit's
//! `PassManager` memoizes by pass identity. A `Transform` mutates a unit and
//! reports whether anything changed. Mutation entry points call
//! `invalidate_pass_results()` on the innermost unit they touch, so repeated
//! `analysis()` calls return the same shared result until the IR changes.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::function::{Function, FunctionAttribute};
use crate::intrinsics::IntrinsicRegistry;
use crate::module::Module;
use crate::verifier::{self, VerifierError};

/// A pure computation over a unit, cached per unit by pass identity.
pub trait Analysis<U>: 'static {
    /// The cached result type.
    type Result: 'static;

    /// Pass name for diagnostics.
    fn name(&self) -> &'static str;

    /// Compute the result. Must not mutate the unit.
    fn run(&self, unit: &U) -> Self::Result;
}

/// A mutation of a unit. Transforms assume verified input and either succeed
/// with valid output or leave the unit untouched; a partially applied
/// mutation that fails verification is a bug surfaced to the caller, not a
/// recoverable condition.
pub trait Transform<U> {
    /// Pass name for diagnostics.
    fn name(&self) -> &'static str;

    /// Apply the transform. Returns true iff the unit was changed.
    fn run(&self, cx: &TransformContext<'_>, unit: &mut U) -> bool;
}

/// Read-only facts a function transform may need from outside its function.
pub struct TransformContext<'a> {
    /// The process-wide intrinsic table.
    pub intrinsics: &'a IntrinsicRegistry,
    /// Purity of each module function, indexed by `FuncId`.
    pub pure_callees: Vec<bool>,
}

/// Per-unit cache of analysis results.
///
/// Results are shared (`Rc`) so a caller may hold one across unrelated
/// mutations; it simply goes stale and the next `analysis()` recomputes.
pub struct PassManager<U> {
    cache: RefCell<BTreeMap<TypeId, Rc<dyn Any>>>,
    _unit: PhantomData<fn(&U)>,
}

impl<U> PassManager<U> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: RefCell::new(BTreeMap::new()),
            _unit: PhantomData,
        }
    }

    /// Fetch the cached result for `pass`, computing it on a miss.
    pub fn analysis<A: Analysis<U>>(&self, pass: &A, unit: &U) -> Rc<A::Result> {
        let key = TypeId::of::<A>();
        if let Some(cached) = self.cache.borrow().get(&key) {
            return cached
                .clone()
                .downcast::<A::Result>()
                .ok()
                .expect("cached analysis result has the pass result type");
        }
        // Not held across `run`: analyses may consult other analyses.
        let result = Rc::new(pass.run(unit));
        self.cache
            .borrow_mut()
            .insert(key, result.clone() as Rc<dyn Any>);
        result
    }

    /// Drop every cached result.
    pub fn invalidate(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Number of live cached results.
    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<U> Default for PassManager<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Clone for PassManager<U> {
    /// Cloning a unit starts with a cold cache; results are cheap to
    /// recompute and must not outlive divergent copies.
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<U> fmt::Debug for PassManager<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassManager")
            .field("cached", &self.cached_count())
            .finish()
    }
}

impl Module {
    /// Run a function transform over every function with a body.
    ///
    /// Changed flags are ORed. The whole module's caches are invalidated and
    /// the verifier runs afterwards unless `verify_after` is false.
    pub fn map_transform<T: Transform<Function>>(
        &mut self,
        pass: &T,
        intrinsics: &IntrinsicRegistry,
        verify_after: bool,
    ) -> Result<bool, VerifierError> {
        let cx = TransformContext {
            intrinsics,
            pure_callees: self
                .functions
                .values()
                .map(|f| f.attributes.contains(&FunctionAttribute::Pure))
                .collect(),
        };

        let mut changed = false;
        for func in self.functions.values_mut() {
            if func.is_declaration() {
                continue;
            }
            let func_changed = pass.run(&cx, func);
            if func_changed {
                debug!(pass = pass.name(), function = %func.name, "transform changed function");
                func.invalidate_pass_results();
            }
            changed |= func_changed;
        }
        self.invalidate_pass_results();

        if verify_after {
            verifier::verify_module(self, intrinsics)?;
        }
        Ok(changed)
    }
}
