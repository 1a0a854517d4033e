//! Module-level globals.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Global {
    pub name: String,
    pub ty: Type,
    /// Serialized initializer, opaque to the core (e.g. a string literal
    /// body); `None` for zero-initialized globals.
    pub initializer: Option<String>,
}

impl Global {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, initializer: None }
    }

    pub fn with_initializer(mut self, init: impl Into<String>) -> Self {
        self.initializer = Some(init.into());
        self
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global @{}:{}", self.name, self.ty)?;
        if let Some(init) = &self.initializer {
            write!(f, " = {init}")?;
        }
        Ok(())
    }
}
