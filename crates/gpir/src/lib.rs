//! GPIR: a strongly-typed SSA intermediate representation and optimizer.
//!
//! This crate defines the core IR types for the compiler:
//! - Types (bool, tuples, nominal structs/enums, pointers, functions)
//! - Literals and uses (operands referencing definitions by entity ID)
//! - Instructions (a closed kind set with uniform operand access)
//! - Blocks and functions (arena-owned, layout-ordered)
//! - Modules (declarations, globals, functions)
//!
//! On top of the data model sit the builder, printer, parser, verifier, the
//! analysis/transform pass framework with per-unit result caching, and the
//! concrete transforms (DCE, CSE, CFG canonicalization and simplification).

mod block;
mod builder;
mod entity;
mod entity_map;
mod function;
mod ident;
mod inst;
mod intrinsics;
mod literal;
mod module;
mod parser;
mod pass;
mod printer;
mod signature;
mod types;
mod verifier;

pub mod analysis;
pub mod transform;

pub use block::{ArgData, BlockData};
pub use builder::Builder;
pub use entity::{AliasId, Arg, Block, EntityRef, EnumId, FuncId, Inst, StructId, VarId};
pub use entity_map::PrimaryMap;
pub use function::{DeclarationKind, Function, FunctionAttribute};
pub use ident::is_identifier;
pub use inst::{BooleanOp, InstData, InstKind};
pub use intrinsics::{Intrinsic, IntrinsicRegistry};
pub use literal::{Definition, ElementKey, Literal, Use};
pub use module::{Module, Stage, Variable};
pub use parser::{parse_module, ParseError};
pub use pass::{Analysis, PassManager, Transform, TransformContext};
pub use printer::{print_function, print_module};
pub use signature::Signature;
pub use types::{EnumCase, EnumDecl, StructDecl, Type, TypeAlias};
pub use verifier::{verify_module, verify_single_exit, VerifierError};
