//! Entity reference system for type-safe entity IDs.
//!
//! Every IR object that participates in the arena-and-index ownership model
//! is addressed through a small copyable reference type. Entities keep the
//! in-memory graph acyclic: a `Use` stores an entity ID, never a pointer.

use std::fmt;

/// Base trait for entity references.
///
/// Entities are type-safe identifiers for IR elements. They provide O(1)
/// conversion to/from indices while preventing one kind of entity being used
/// where another is expected.
pub trait EntityRef: Copy + Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug {
    /// Get the index of this entity.
    fn index(self) -> usize;

    /// Create an entity from an index.
    fn from_index(index: usize) -> Self;
}

macro_rules! entity_ref {
    ($(#[$doc:meta])* $name:ident, $display:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create a new entity with the given index.
            pub fn new(index: u32) -> Self {
                $name(index)
            }
        }

        impl EntityRef for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display, self.0)
            }
        }
    };
}

entity_ref! {
    /// A basic block within a function.
    Block, "bb"
}

entity_ref! {
    /// An instruction within a function.
    Inst, "inst"
}

entity_ref! {
    /// A block parameter within a function.
    Arg, "arg"
}

entity_ref! {
    /// A function within a module.
    FuncId, "func"
}

entity_ref! {
    /// A global variable within a module.
    VarId, "var"
}

entity_ref! {
    /// A struct declaration within a module.
    StructId, "struct"
}

entity_ref! {
    /// An enum declaration within a module.
    EnumId, "enum"
}

entity_ref! {
    /// A type alias declaration within a module.
    AliasId, "alias"
}
