//! The primitive `Type` lattice of the IL. Types are small value objects:
//! copyable, equality-comparable, and cheap to pass around by value.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    Void,
    I1,
    I16,
    I32,
    I64,
    F64,
    Ptr,
    Str,
    Error,
    ResumeTok,
}

impl Type {
    /// The canonical lowercase mnemonic used in the textual IL.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
            Type::Str => "str",
            Type::Error => "error",
            Type::ResumeTok => "resumeTok",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Type> {
        Some(match s {
            "void" => Type::Void,
            "i1" => Type::I1,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "f64" => Type::F64,
            "ptr" => Type::Ptr,
            "str" => Type::Str,
            "error" => Type::Error,
            "resumeTok" => Type::ResumeTok,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Type::F64)
    }

    /// Bit width of an integer type, used by ConstFold's modulo-2^w wrap.
    pub fn int_bits(self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I16 => Some(16),
            Type::I32 => Some(32),
            Type::I64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip() {
        for ty in [
            Type::Void,
            Type::I1,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::F64,
            Type::Ptr,
            Type::Str,
            Type::Error,
            Type::ResumeTok,
        ] {
            assert_eq!(Type::from_mnemonic(ty.mnemonic()), Some(ty));
        }
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert_eq!(Type::from_mnemonic("bogus"), None);
    }
}
