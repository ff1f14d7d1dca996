//! Memory layout of Raven values on the 32-bit target.
//!
//! Scalars take 4 bytes except `f64` (8). Arrays are contiguous and
//! row-major; struct fields are laid out in declaration order with no
//! padding, since every size is a multiple of 4.

use raven_types::{PrimType, Registry, Type};

/// Size in bytes, or `None` if it does not fit in a `u32`.
pub fn size_of(ty: &Type, reg: &Registry) -> Option<u32> {
    match ty {
        Type::Prim(PrimType::Void) => Some(0),
        Type::Prim(PrimType::F64) => Some(8),
        Type::Prim(_) | Type::Enum(_) | Type::Error => Some(4),
        Type::Array { elem, len } => size_of(elem, reg)?.checked_mul(*len),
        Type::Struct(name) => {
            let def = reg.struct_def(name)?;
            def.fields
                .iter()
                .try_fold(0u32, |acc, f| acc.checked_add(size_of(&f.ty, reg)?))
        }
    }
}

/// Byte offset and type of `field` inside struct `name`.
pub fn field_offset(name: &str, field: &str, reg: &Registry) -> Option<(u32, Type)> {
    let def = reg.struct_def(name)?;
    let mut offset = 0u32;
    for f in &def.fields {
        if f.name == field {
            return Some((offset, f.ty.clone()));
        }
        offset = offset.checked_add(size_of(&f.ty, reg)?)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_ast::diag::Diagnostics;

    fn registry(src: &str) -> Registry {
        let module = raven_parse::parse_str("<layout>", src).expect("parse failed");
        let mut diags = Diagnostics::new();
        let reg = Registry::build(&module, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        reg
    }

    #[test]
    fn scalar_sizes() {
        let reg = Registry::new();
        assert_eq!(size_of(&Type::int(), &reg), Some(4));
        assert_eq!(size_of(&Type::bool(), &reg), Some(4));
        assert_eq!(size_of(&Type::str_(), &reg), Some(4));
        assert_eq!(size_of(&Type::f32(), &reg), Some(4));
        assert_eq!(size_of(&Type::f64(), &reg), Some(8));
    }

    #[test]
    fn nested_arrays_are_row_major() {
        let reg = Registry::new();
        let m = Type::array(Type::array(Type::int(), 3), 2);
        assert_eq!(size_of(&m, &reg), Some(24));
    }

    #[test]
    fn struct_fields_follow_declaration_order() {
        let reg = registry("struct S { int a\n f64 b\n [3]int c\n bool d }");
        assert_eq!(size_of(&Type::Struct("S".into()), &reg), Some(4 + 8 + 12 + 4));
        assert_eq!(field_offset("S", "b", &reg).map(|(o, _)| o), Some(4));
        assert_eq!(field_offset("S", "c", &reg).map(|(o, _)| o), Some(12));
        assert_eq!(field_offset("S", "d", &reg).map(|(o, _)| o), Some(24));
        assert_eq!(field_offset("S", "e", &reg), None);
    }

    #[test]
    fn oversized_array_has_no_size() {
        let reg = Registry::new();
        let huge = Type::array(Type::array(Type::int(), 65536), 65536);
        assert_eq!(size_of(&huge, &reg), None);
    }
}
