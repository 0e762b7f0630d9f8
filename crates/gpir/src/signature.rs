//! Function signatures.

use crate::types::Type;

/// A function signature: ordered argument types and a return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    /// Create a new signature.
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret }
    }

    /// A signature with no arguments returning void.
    pub fn empty() -> Self {
        Self {
            params: Vec::new(),
            ret: Type::void(),
        }
    }

    /// The signature viewed as a function type.
    pub fn function_type(&self) -> Type {
        Type::Function(self.params.clone(), Box::new(self.ret.clone()))
    }
}
