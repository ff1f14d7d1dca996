//! Global definitions: structs, enums and function signatures.
//!
//! The registry is filled by the declaration pass before any function body is
//! checked, so bodies may refer to items declared later in the file.

use crate::types::Type;
use raven_ast::ast::{EnumDecl, FnDecl, Item, Module, StructDecl, TypeExpr};
use raven_ast::diag::{Diagnostic, Diagnostics};
use raven_ast::span::Span;
use std::collections::{HashMap, HashSet};

/// Names that resolve to primitive types and cannot be declared.
pub const PRIMITIVE_NAMES: &[&str] = &["int", "f32", "f64", "bool", "string", "void"];

/// Field definition in a struct
#[derive(Clone, Debug)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Resolved field type
    pub ty: Type,
}

/// Struct definition; fields keep declaration order.
#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub span: Span,
}

impl StructDef {
    /// Position and definition of a field.
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDef)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// Enum definition; variant `i` has value `i`.
#[derive(Clone, Debug)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<String>,
    pub span: Span,
}

impl EnumDef {
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == name)
    }
}

/// Function signature
#[derive(Clone, Debug)]
pub struct FnSig {
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<(String, Type)>,
    /// `Type::void()` when the declaration has no `-> T`
    pub ret: Type,
    pub span: Span,
}

/// Lookup tables for every global name in a module.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    structs: HashMap<String, StructDef>,
    enums: HashMap<String, EnumDef>,
    fns: HashMap<String, FnSig>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaration pass. Problems are pushed onto `diags`; the registry
    /// returned is always usable, with unresolved types set to `Type::Error`.
    pub fn build(module: &Module, diags: &mut Diagnostics) -> Registry {
        let mut reg = Registry::new();

        // Names first, so struct fields and signatures can refer to any type.
        let mut seen: HashMap<&str, Span> = HashMap::new();
        let mut accepted = Vec::new();
        for item in &module.items {
            let name = item.name();
            if PRIMITIVE_NAMES.contains(&name.text.as_str()) {
                diags.push(Diagnostic::name(
                    name.span,
                    format!("'{}' is a built-in type name", name.text),
                ));
                continue;
            }
            if seen.insert(&name.text, name.span).is_some() {
                diags.push(Diagnostic::name(
                    name.span,
                    format!("'{}' is already declared", name.text),
                ));
                continue;
            }
            accepted.push(item);
            match item {
                Item::Struct(d) => {
                    reg.structs.insert(
                        d.name.text.clone(),
                        StructDef {
                            name: d.name.text.clone(),
                            fields: Vec::new(),
                            span: d.span,
                        },
                    );
                }
                Item::Enum(d) => reg.declare_enum(d, diags),
                Item::Fn(_) => {}
            }
        }

        for item in &accepted {
            match item {
                Item::Struct(d) => reg.fill_struct(d, diags),
                Item::Fn(d) => reg.declare_fn(d, diags),
                Item::Enum(_) => {}
            }
        }

        reg.check_recursive_structs(diags);
        reg
    }

    fn declare_enum(&mut self, decl: &EnumDecl, diags: &mut Diagnostics) {
        let mut variants: Vec<String> = Vec::new();
        for v in &decl.variants {
            if variants.contains(&v.text) {
                diags.push(Diagnostic::name(
                    v.span,
                    format!("duplicate variant '{}' in enum '{}'", v.text, decl.name.text),
                ));
                continue;
            }
            variants.push(v.text.clone());
        }
        self.enums.insert(
            decl.name.text.clone(),
            EnumDef {
                name: decl.name.text.clone(),
                variants,
                span: decl.span,
            },
        );
    }

    fn fill_struct(&mut self, decl: &StructDecl, diags: &mut Diagnostics) {
        let mut fields: Vec<FieldDef> = Vec::new();
        for f in &decl.fields {
            let ty = self.resolve_or_report(&f.ty, diags);
            if ty.is_void() {
                diags.push(Diagnostic::type_(
                    f.ty.span(),
                    format!("field '{}' cannot have type void", f.name.text),
                ));
            }
            if fields.iter().any(|existing| existing.name == f.name.text) {
                diags.push(Diagnostic::name(
                    f.name.span,
                    format!(
                        "duplicate field '{}' in struct '{}'",
                        f.name.text, decl.name.text
                    ),
                ));
                continue;
            }
            fields.push(FieldDef {
                name: f.name.text.clone(),
                ty,
            });
        }
        if let Some(def) = self.structs.get_mut(&decl.name.text) {
            def.fields = fields;
        }
    }

    fn declare_fn(&mut self, decl: &FnDecl, diags: &mut Diagnostics) {
        let mut params: Vec<(String, Type)> = Vec::new();
        for p in &decl.params {
            let ty = self.resolve_or_report(&p.ty, diags);
            if ty.is_void() {
                diags.push(Diagnostic::type_(
                    p.ty.span(),
                    format!("parameter '{}' cannot have type void", p.name.text),
                ));
            }
            if params.iter().any(|(n, _)| *n == p.name.text) {
                diags.push(Diagnostic::name(
                    p.name.span,
                    format!("duplicate parameter '{}'", p.name.text),
                ));
            }
            params.push((p.name.text.clone(), ty));
        }

        let ret = match &decl.ret_ty {
            Some(te) => {
                let ty = self.resolve_or_report(te, diags);
                if ty.is_aggregate() {
                    diags.push(Diagnostic::type_(
                        te.span(),
                        format!(
                            "function '{}' cannot return aggregate type {}",
                            decl.name.text, ty
                        ),
                    ));
                }
                ty
            }
            None => Type::void(),
        };

        self.fns.insert(
            decl.name.text.clone(),
            FnSig {
                name: decl.name.text.clone(),
                params,
                ret,
                span: decl.span,
            },
        );
    }

    /// Struct values are stored inline, so a struct that contains itself
    /// (directly, through arrays, or through other structs) has no size.
    fn check_recursive_structs(&self, diags: &mut Diagnostics) {
        let mut names: Vec<&String> = self.structs.keys().collect();
        names.sort();
        for name in names {
            let mut visiting = HashSet::new();
            if self.contains_struct(name, name, &mut visiting) {
                let span = self.structs[name].span;
                diags.push(Diagnostic::type_(
                    span,
                    format!("recursive struct '{}' has infinite size", name),
                ));
            }
        }
    }

    fn contains_struct<'a>(
        &'a self,
        current: &'a str,
        target: &str,
        visiting: &mut HashSet<&'a str>,
    ) -> bool {
        if !visiting.insert(current) {
            return false;
        }
        let Some(def) = self.structs.get(current) else {
            return false;
        };
        def.fields.iter().any(|f| {
            let mut ty = &f.ty;
            while let Type::Array { elem, .. } = ty {
                ty = elem;
            }
            match ty {
                Type::Struct(inner) if inner == target => true,
                Type::Struct(inner) => self.contains_struct(inner, target, visiting),
                _ => false,
            }
        })
    }

    fn resolve_or_report(&self, te: &TypeExpr, diags: &mut Diagnostics) -> Type {
        self.resolve(te).unwrap_or_else(|d| {
            diags.push(d);
            Type::Error
        })
    }

    /// Turn a written type into a `Type`.
    pub fn resolve(&self, te: &TypeExpr) -> Result<Type, Diagnostic> {
        match te {
            TypeExpr::Named(id) => match id.text.as_str() {
                "int" => Ok(Type::int()),
                "f32" => Ok(Type::f32()),
                "f64" => Ok(Type::f64()),
                "bool" => Ok(Type::bool()),
                "string" => Ok(Type::str_()),
                "void" => Ok(Type::void()),
                name if self.structs.contains_key(name) => Ok(Type::Struct(name.to_string())),
                name if self.enums.contains_key(name) => Ok(Type::Enum(name.to_string())),
                name => Err(Diagnostic::name(
                    id.span,
                    format!("unknown type '{}'", name),
                )),
            },
            TypeExpr::Array { len, elem, span } => {
                let elem = self.resolve(elem)?;
                if elem.is_void() {
                    return Err(Diagnostic::type_(*span, "array of void is not allowed"));
                }
                Ok(Type::array(elem, *len))
            }
        }
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn fn_sig(&self, name: &str) -> Option<&FnSig> {
        self.fns.get(name)
    }

    pub fn is_type_name(&self, name: &str) -> bool {
        PRIMITIVE_NAMES.contains(&name)
            || self.structs.contains_key(name)
            || self.enums.contains_key(name)
    }
}
