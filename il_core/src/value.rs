//! SSA values: temporaries, literals, and global references.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Type;

/// An SSA value. `Temp` is the only variant with an identity distinct from
/// its contents; the rest are structural literals compared by value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// `%tN` — an SSA temporary, unique within its defining function.
    Temp(u32, Type),
    ConstInt(i64, Type),
    ConstFloat(f64),
    ConstStr(String),
    /// A pointer-valued reference to a module-level global.
    GlobalRef(String),
    NullPtr,
}

impl Value {
    pub fn temp(id: u32, ty: Type) -> Self {
        Value::Temp(id, ty)
    }

    pub fn const_int(v: i64, ty: Type) -> Self {
        debug_assert!(ty.is_integer(), "ConstInt requires an integer type, got {ty}");
        Value::ConstInt(v, ty)
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Temp(_, ty) => *ty,
            Value::ConstInt(_, ty) => *ty,
            Value::ConstFloat(_) => Type::F64,
            Value::ConstStr(_) => Type::Str,
            Value::GlobalRef(_) => Type::Ptr,
            Value::NullPtr => Type::Ptr,
        }
    }

    /// The SSA id this value names, if it is a temporary.
    pub fn as_temp_id(&self) -> Option<u32> {
        match self {
            Value::Temp(id, _) => Some(*id),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Value::ConstInt(..) | Value::ConstFloat(_) | Value::ConstStr(_) | Value::NullPtr
        )
    }

    /// Bitwise-exact constant equality (used by peephole/SCCP lattice
    /// meets); `NaN` floats are compared by bit pattern, not IEEE equality.
    pub fn const_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::ConstInt(a, ta), Value::ConstInt(b, tb)) => a == b && ta == tb,
            (Value::ConstFloat(a), Value::ConstFloat(b)) => a.to_bits() == b.to_bits(),
            (Value::ConstStr(a), Value::ConstStr(b)) => a == b,
            (Value::NullPtr, Value::NullPtr) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id, ty) => write!(f, "%t{id}:{ty}"),
            Value::ConstInt(v, ty) => write!(f, "{ty} {v}"),
            Value::ConstFloat(v) => write!(f, "f64 {}", format_f64_roundtrip(*v)),
            Value::ConstStr(s) => write!(f, "str {:?}", s),
            Value::GlobalRef(name) => write!(f, "@{name}"),
            Value::NullPtr => write!(f, "null"),
        }
    }
}

/// Renders `v` using the shortest decimal form that parses back to the
/// same `f64` bit pattern, matching the serializer's edge-case policy.
pub fn format_f64_roundtrip(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let mut shortest = format!("{v}");
    // `{v}` already uses Rust's shortest round-trip algorithm (Grisu/Ryu);
    // ensure a `.0` suffix so integral floats remain distinguishable from
    // integer literals in the text form.
    if !shortest.contains('.') && !shortest.contains('e') && !shortest.contains('E') {
        shortest.push_str(".0");
    }
    shortest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_formatting_round_trips() {
        for v in [0.0_f64, 1.0, -1.0, 0.1, 1e300, 1e-300, 123456789.125] {
            let s = format_f64_roundtrip(v);
            let parsed: f64 = s.parse().expect("formatted float must parse");
            assert_eq!(parsed.to_bits(), v.to_bits(), "round-trip failed for {v} -> {s}");
        }
    }

    #[test]
    fn const_eq_distinguishes_types() {
        let a = Value::ConstInt(1, Type::I32);
        let b = Value::ConstInt(1, Type::I64);
        assert!(!a.const_eq(&b));
    }

    #[test]
    fn temp_type_is_its_declared_type() {
        assert_eq!(Value::Temp(3, Type::Ptr).ty(), Type::Ptr);
    }
}
