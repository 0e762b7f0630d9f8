//! Modules: the top-level IR unit.
//!
//! A module owns type declarations, global variables, and functions, all in
//! primary maps. Declarations give nominal types their identity: two struct
//! types are equal iff they reference the same declaration. The module also
//! hosts the type queries that need the declaration tables: canonicalization,
//! canonical equality, element access, and validity.

use std::fmt;
use std::str::FromStr;

use crate::entity::{AliasId, EnumId, FuncId, StructId, VarId};
use crate::function::Function;
use crate::intrinsics::IntrinsicRegistry;
use crate::literal::{Definition, ElementKey, Use};
use crate::pass::PassManager;
use crate::types::{EnumDecl, StructDecl, Type, TypeAlias};
use crate::PrimaryMap;

/// Compilation stage tag, printed on the module header's second line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// As constructed or parsed.
    Raw,
    /// Single-exit canonical form.
    Canonical,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Raw => write!(f, "raw"),
            Stage::Canonical => write!(f, "canonical"),
        }
    }
}

impl FromStr for Stage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "raw" => Ok(Stage::Raw),
            "canonical" => Ok(Stage::Canonical),
            _ => Err(()),
        }
    }
}

/// A module-global variable. Its value lives in storage, so the variable's
/// type as a definition is a pointer to the value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value_type: Type,
}

impl Variable {
    /// The type of a reference to this variable.
    pub fn ty(&self) -> Type {
        self.value_type.clone().pointer()
    }
}

/// A module: named declarations plus functions.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub stage: Stage,
    pub aliases: PrimaryMap<AliasId, TypeAlias>,
    pub structs: PrimaryMap<StructId, StructDecl>,
    pub enums: PrimaryMap<EnumId, EnumDecl>,
    pub variables: PrimaryMap<VarId, Variable>,
    pub functions: PrimaryMap<FuncId, Function>,
    passes: PassManager<Module>,
}

/// Key for cycle detection while walking declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKey {
    Struct(StructId),
    Enum(EnumId),
    Alias(AliasId),
}

impl Module {
    /// Create an empty module.
    pub fn new(name: String) -> Self {
        Self {
            name,
            stage: Stage::Raw,
            aliases: PrimaryMap::new(),
            structs: PrimaryMap::new(),
            enums: PrimaryMap::new(),
            variables: PrimaryMap::new(),
            functions: PrimaryMap::new(),
            passes: PassManager::new(),
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declare a struct type.
    pub fn declare_struct(&mut self, decl: StructDecl) -> StructId {
        self.invalidate_pass_results();
        self.structs.push(decl)
    }

    /// Declare an enum type.
    pub fn declare_enum(&mut self, decl: EnumDecl) -> EnumId {
        self.invalidate_pass_results();
        self.enums.push(decl)
    }

    /// Declare a type alias.
    pub fn declare_alias(&mut self, decl: TypeAlias) -> AliasId {
        self.invalidate_pass_results();
        self.aliases.push(decl)
    }

    /// Add a global variable.
    pub fn add_variable(&mut self, var: Variable) -> VarId {
        self.invalidate_pass_results();
        self.variables.push(var)
    }

    /// Add a function.
    pub fn add_function(&mut self, func: Function) -> FuncId {
        self.invalidate_pass_results();
        self.functions.push(func)
    }

    /// Resolve a nominal or alias type by declaration name.
    pub fn type_by_name(&self, name: &str) -> Option<Type> {
        if let Some((id, _)) = self.structs.iter().find(|(_, d)| d.name == name) {
            return Some(Type::Struct(id));
        }
        if let Some((id, _)) = self.enums.iter().find(|(_, d)| d.name == name) {
            return Some(Type::Enum(id));
        }
        if let Some((id, _)) = self.aliases.iter().find(|(_, d)| d.name == name) {
            return Some(Type::Alias(id));
        }
        None
    }

    /// Resolve a global value (variable or function) by name.
    pub fn global_by_name(&self, name: &str) -> Option<Definition> {
        if let Some((id, _)) = self.variables.iter().find(|(_, v)| v.name == name) {
            return Some(Definition::Var(id));
        }
        if let Some((id, _)) = self.functions.iter().find(|(_, f)| f.name == name) {
            return Some(Definition::Func(id));
        }
        None
    }

    /// Find a function by name.
    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(id, _)| id)
    }

    // ========================================================================
    // Type queries
    // ========================================================================

    /// Canonicalize a type: unfold aliases recursively and canonicalize
    /// components. Opaque aliases are kept as-is (they compare by name);
    /// alias cycles canonicalize to `Invalid`.
    pub fn canonical(&self, ty: &Type) -> Type {
        self.canonical_guarded(ty, &mut Vec::new())
    }

    fn canonical_guarded(&self, ty: &Type, visiting: &mut Vec<AliasId>) -> Type {
        match ty {
            Type::Alias(id) => match self.aliases.get(*id) {
                None => Type::Invalid,
                Some(alias) => match &alias.ty {
                    None => Type::Alias(*id),
                    Some(underlying) => {
                        if visiting.contains(id) {
                            return Type::Invalid;
                        }
                        visiting.push(*id);
                        let result = self.canonical_guarded(underlying, visiting);
                        visiting.pop();
                        result
                    }
                },
            },
            Type::Tuple(elems) => Type::Tuple(
                elems
                    .iter()
                    .map(|t| self.canonical_guarded(t, visiting))
                    .collect(),
            ),
            Type::Pointer(pointee) => {
                Type::Pointer(Box::new(self.canonical_guarded(pointee, visiting)))
            }
            Type::Function(params, ret) => Type::Function(
                params
                    .iter()
                    .map(|t| self.canonical_guarded(t, visiting))
                    .collect(),
                Box::new(self.canonical_guarded(ret, visiting)),
            ),
            Type::Bool | Type::Struct(_) | Type::Enum(_) | Type::Invalid => ty.clone(),
        }
    }

    /// Canonical type equality: structural over canonical forms, except that
    /// nominals compare by declaration identity and opaque aliases by name.
    pub fn type_eq(&self, a: &Type, b: &Type) -> bool {
        self.canonical_eq(&self.canonical(a), &self.canonical(b))
    }

    fn canonical_eq(&self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            (Type::Alias(x), Type::Alias(y)) => {
                x == y
                    || match (self.aliases.get(*x), self.aliases.get(*y)) {
                        (Some(x), Some(y)) => x.name == y.name,
                        _ => false,
                    }
            }
            (Type::Tuple(xs), Type::Tuple(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|(x, y)| self.canonical_eq(x, y))
            }
            (Type::Pointer(x), Type::Pointer(y)) => self.canonical_eq(x, y),
            (Type::Function(xp, xr), Type::Function(yp, yr)) => {
                xp.len() == yp.len()
                    && xp.iter().zip(yp).all(|(x, y)| self.canonical_eq(x, y))
                    && self.canonical_eq(xr, yr)
            }
            _ => a == b,
        }
    }

    /// Whether a type is void, i.e. canonically the empty tuple.
    pub fn is_void(&self, ty: &Type) -> bool {
        self.canonical(ty).is_void_literal()
    }

    /// Element access along a key path: tuples by index, structs by name,
    /// pointers by any index or value key (yielding the pointee).
    pub fn element_type(&self, ty: &Type, keys: &[ElementKey]) -> Option<Type> {
        let mut current = self.canonical(ty);
        for key in keys {
            current = match (&current, key) {
                (Type::Tuple(elems), ElementKey::Index(i)) => elems.get(*i)?.clone(),
                (Type::Struct(id), ElementKey::Name(name)) => {
                    self.structs.get(*id)?.field_type(name)?.clone()
                }
                (Type::Pointer(pointee), ElementKey::Index(_) | ElementKey::Value(_)) => {
                    (**pointee).clone()
                }
                _ => return None,
            };
            current = self.canonical(&current);
        }
        Some(current)
    }

    /// A type is valid when every transitively referenced component is valid.
    /// Nominal recursion (an enum case referencing its own enum) is allowed;
    /// alias cycles are not.
    pub fn type_is_valid(&self, ty: &Type) -> bool {
        self.valid_guarded(ty, &mut Vec::new())
    }

    fn valid_guarded(&self, ty: &Type, visiting: &mut Vec<DeclKey>) -> bool {
        match ty {
            Type::Invalid => false,
            Type::Bool => true,
            Type::Tuple(elems) => elems.iter().all(|t| self.valid_guarded(t, visiting)),
            Type::Pointer(pointee) => self.valid_guarded(pointee, visiting),
            Type::Function(params, ret) => {
                params.iter().all(|t| self.valid_guarded(t, visiting))
                    && self.valid_guarded(ret, visiting)
            }
            Type::Struct(id) => {
                let Some(decl) = self.structs.get(*id) else {
                    return false;
                };
                let key = DeclKey::Struct(*id);
                if visiting.contains(&key) {
                    return true;
                }
                visiting.push(key);
                let ok = decl
                    .fields
                    .iter()
                    .all(|(_, t)| self.valid_guarded(t, visiting));
                visiting.pop();
                ok
            }
            Type::Enum(id) => {
                let Some(decl) = self.enums.get(*id) else {
                    return false;
                };
                let key = DeclKey::Enum(*id);
                if visiting.contains(&key) {
                    return true;
                }
                visiting.push(key);
                let ok = decl.cases.iter().all(|case| {
                    case.associated_types
                        .iter()
                        .all(|t| self.valid_guarded(t, visiting))
                });
                visiting.pop();
                ok
            }
            Type::Alias(id) => {
                let Some(alias) = self.aliases.get(*id) else {
                    return false;
                };
                match &alias.ty {
                    None => true,
                    Some(underlying) => {
                        let key = DeclKey::Alias(*id);
                        if visiting.contains(&key) {
                            return false;
                        }
                        visiting.push(key);
                        let ok = self.valid_guarded(underlying, visiting);
                        visiting.pop();
                        ok
                    }
                }
            }
        }
    }

    /// The type of a use within a function of this module.
    pub fn use_type(&self, func: &Function, u: &Use) -> Type {
        match u {
            Use::Literal { ty, .. } => ty.clone(),
            Use::Def(def) => match def {
                Definition::Arg(arg) => func.arg(*arg).ty.clone(),
                Definition::Inst(inst) => func.inst(*inst).ty.clone(),
                Definition::Var(var) => self
                    .variables
                    .get(*var)
                    .map(Variable::ty)
                    .unwrap_or(Type::Invalid),
                Definition::Func(f) => self
                    .functions
                    .get(*f)
                    .map(|func| func.signature.function_type())
                    .unwrap_or(Type::Invalid),
            },
        }
    }

    /// Infer an instruction result type in the context of a module function.
    pub fn infer_inst_type(
        &self,
        func: FuncId,
        kind: &crate::inst::InstKind,
        intrinsics: &IntrinsicRegistry,
    ) -> Type {
        kind.result_type(&self.functions[func], self, intrinsics)
    }

    // ========================================================================
    // Pass cache
    // ========================================================================

    /// Fetch or compute a cached module-level analysis result.
    pub fn analysis<A: crate::pass::Analysis<Module>>(
        &self,
        pass: &A,
    ) -> std::rc::Rc<A::Result> {
        self.passes.analysis(pass, self)
    }

    /// Drop all cached module-level analysis results.
    pub fn invalidate_pass_results(&self) {
        self.passes.invalidate();
    }
}
