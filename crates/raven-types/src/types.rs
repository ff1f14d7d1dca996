//! Core `Type` definitions for Raven.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PrimType {
    Int,
    F32,
    F64,
    Bool,
    Str,
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Type {
    /// Primitive types.
    Prim(PrimType),

    /// Fixed-length array; the length is part of the type.
    Array { elem: Box<Type>, len: u32 },

    /// User-defined struct, compared by name.
    Struct(String),

    /// User-defined enum, compared by name.
    Enum(String),

    /// Type of an expression that already produced a diagnostic. Compatible
    /// with everything so one mistake is reported once.
    Error,
}

impl Type {
    pub fn int() -> Self {
        Type::Prim(PrimType::Int)
    }
    pub fn f32() -> Self {
        Type::Prim(PrimType::F32)
    }
    pub fn f64() -> Self {
        Type::Prim(PrimType::F64)
    }
    pub fn bool() -> Self {
        Type::Prim(PrimType::Bool)
    }
    pub fn str_() -> Self {
        Type::Prim(PrimType::Str)
    }
    pub fn void() -> Self {
        Type::Prim(PrimType::Void)
    }
    pub fn array(elem: Type, len: u32) -> Self {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Prim(PrimType::Int))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Prim(PrimType::Bool))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Prim(PrimType::Void))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Prim(PrimType::F32 | PrimType::F64))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Arrays and structs: values that live in memory rather than a register.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Array { .. } | Type::Struct(_))
    }

    /// Types `==`/`!=` and `switch` can compare.
    pub fn is_equatable(&self) -> bool {
        self.is_numeric() || self.is_bool() || matches!(self, Type::Enum(_))
    }

    /// Equality that lets `Error` through, so a failed sub-expression does not
    /// cascade into further mismatches.
    pub fn compatible(&self, other: &Type) -> bool {
        self.is_error() || other.is_error() || self == other
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => {
                let s = match p {
                    PrimType::Int => "int",
                    PrimType::F32 => "f32",
                    PrimType::F64 => "f64",
                    PrimType::Bool => "bool",
                    PrimType::Str => "string",
                    PrimType::Void => "void",
                };
                f.write_str(s)
            }
            Type::Array { elem, len } => write!(f, "[{}]{}", len, elem),
            Type::Struct(name) | Type::Enum(name) => f.write_str(name),
            Type::Error => f.write_str("<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_array() {
        let t = Type::array(Type::array(Type::int(), 3), 2);
        assert_eq!(t.to_string(), "[2][3]int");
    }

    #[test]
    fn array_equality_is_structural() {
        assert_eq!(Type::array(Type::int(), 3), Type::array(Type::int(), 3));
        assert_ne!(Type::array(Type::int(), 3), Type::array(Type::int(), 4));
        assert_ne!(Type::array(Type::int(), 3), Type::array(Type::f32(), 3));
    }

    #[test]
    fn nominal_types_compare_by_name() {
        assert_eq!(Type::Struct("P".into()), Type::Struct("P".into()));
        assert_ne!(Type::Struct("P".into()), Type::Enum("P".into()));
    }

    #[test]
    fn error_is_compatible_with_anything() {
        assert!(Type::Error.compatible(&Type::int()));
        assert!(Type::str_().compatible(&Type::Error));
        assert!(!Type::str_().compatible(&Type::int()));
    }
}
