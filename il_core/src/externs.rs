//! Extern declarations: callees provided by the runtime, with a fixed C
//! ABI signature.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Extern {
    pub name: String,
    pub ret_ty: Type,
    pub param_tys: Vec<Type>,
}

impl Extern {
    pub fn new(name: impl Into<String>, ret_ty: Type, param_tys: Vec<Type>) -> Self {
        Self { name: name.into(), ret_ty, param_tys }
    }
}

impl fmt::Display for Extern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extern @{}(", self.name)?;
        for (i, ty) in self.param_tys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.ret_ty)
    }
}
