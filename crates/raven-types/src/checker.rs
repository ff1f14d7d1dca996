// crates/raven-types/src/checker.rs
// Semantic analysis for Raven: name resolution, type checking, static bounds

use crate::fold::{self, ConstEnv, ConstValue};
use crate::registry::Registry;
use crate::scope::{ScopeStack, Symbol};
use crate::types::Type;
use raven_ast::ast::{
    BinOp, Block, Case, Expr, ExprId, ExprKind, FieldInit, FnDecl, Ident, Item, Lit, Module,
    Stmt, TypeExpr, UnOp,
};
use raven_ast::diag::{Diagnostic, Diagnostics};
use raven_ast::span::Span;
use std::collections::HashMap;

/// Result of a successful check, handed read-only to code generation.
#[derive(Debug)]
pub struct CheckedModule {
    pub registry: Registry,
    types: HashMap<ExprId, Type>,
    consts: HashMap<ExprId, ConstValue>,
}

impl CheckedModule {
    /// Resolved type of an expression.
    pub fn type_of(&self, id: ExprId) -> Option<&Type> {
        self.types.get(&id)
    }

    /// Folded value recorded for an expression.
    ///
    /// Present for array indices proven in bounds, `switch` case values and
    /// `Enum.Variant` accesses.
    pub fn const_of(&self, id: ExprId) -> Option<ConstValue> {
        self.consts.get(&id).copied()
    }
}

/// Folding view over the checker's current scopes.
struct FoldEnv<'a> {
    scopes: &'a ScopeStack,
    registry: &'a Registry,
}

impl ConstEnv for FoldEnv<'_> {
    fn constant(&self, name: &str) -> Option<i32> {
        self.scopes.lookup(name)?.constant
    }

    fn enum_variant(&self, enum_name: &str, variant: &str) -> Option<i32> {
        // A local named like the enum hides it.
        if self.scopes.lookup(enum_name).is_some() {
            return None;
        }
        let idx = self.registry.enum_def(enum_name)?.variant_index(variant)?;
        i32::try_from(idx).ok()
    }
}

/// Type checker for one module.
///
/// Runs the declaration pass (see [`Registry::build`]) and then checks every
/// function body, collecting all diagnostics before reporting.
pub struct TypeChecker {
    registry: Registry,
    scopes: ScopeStack,
    diags: Diagnostics,
    types: HashMap<ExprId, Type>,
    consts: HashMap<ExprId, ConstValue>,
    /// Return type of the function being checked
    ret_ty: Type,
    loop_depth: u32,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            scopes: ScopeStack::new(),
            diags: Diagnostics::new(),
            types: HashMap::new(),
            consts: HashMap::new(),
            ret_ty: Type::void(),
            loop_depth: 0,
        }
    }

    /// Type check an entire module.
    ///
    /// Pass 1: register structs, enums and function signatures.
    /// Pass 2: check each function body against the registry.
    pub fn check_module(&mut self, module: &Module) -> Result<CheckedModule, Diagnostics> {
        let mut diags = Diagnostics::new();
        self.registry = Registry::build(module, &mut diags);
        self.diags = diags;
        self.check_main(module);

        let mut checked = 0usize;
        for item in &module.items {
            if let Item::Fn(decl) = item {
                self.check_fn(decl);
                checked += 1;
            }
        }
        log::debug!(
            "checked {} function(s), {} diagnostic(s)",
            checked,
            self.diags.len()
        );

        let diags = std::mem::take(&mut self.diags);
        if !diags.is_empty() {
            return Err(diags);
        }
        Ok(CheckedModule {
            registry: std::mem::take(&mut self.registry),
            types: std::mem::take(&mut self.types),
            consts: std::mem::take(&mut self.consts),
        })
    }

    fn check_main(&mut self, module: &Module) {
        let Some(sig) = self.registry.fn_sig("main") else {
            let at = Span::new(module.span.start, module.span.start);
            self.error(Diagnostic::name(at, "program has no 'main' function"));
            return;
        };
        let span = sig.span;
        let has_params = !sig.params.is_empty();
        let ret = sig.ret.clone();
        if has_params {
            self.error(Diagnostic::type_(span, "'main' must not take parameters"));
        }
        if !(ret.is_void() || ret.is_int() || ret.is_error()) {
            self.error(Diagnostic::type_(
                span,
                format!("'main' must return void or int, not {}", ret),
            ));
        }
    }

    fn check_fn(&mut self, decl: &FnDecl) {
        // Redeclared functions were reported by the declaration pass.
        let Some(sig) = self
            .registry
            .fn_sig(&decl.name.text)
            .filter(|s| s.span == decl.span)
            .cloned()
        else {
            return;
        };

        self.scopes.push();
        for (param, (name, ty)) in decl.params.iter().zip(sig.params) {
            let _ = self.scopes.declare(Symbol {
                name,
                ty,
                mutable: true,
                constant: None,
                span: param.name.span,
            });
        }
        self.ret_ty = sig.ret;
        self.loop_depth = 0;
        for stmt in &decl.body.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_block(&mut self, block: &Block) {
        self.scopes.push();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    /// Check a statement that gets a scope of its own (case bodies).
    fn check_scoped(&mut self, stmt: &Stmt) {
        self.scopes.push();
        self.check_stmt(stmt);
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                ty, name, value, ..
            } => self.check_var_decl(ty, name, value),
            Stmt::Assign { target, value, .. } => {
                let target_ty = self.check_place(target);
                let value_ty = self.check_expr(value, Some(&target_ty));
                self.require(&target_ty, &value_ty, value.span);
                self.invalidate_target(target);
            }
            Stmt::CompoundAssign {
                target, op, value, ..
            } => {
                let target_ty = self.check_place(target);
                let value_ty = self.check_expr(value, Some(&target_ty));
                if !target_ty.is_error() && !target_ty.is_numeric() {
                    self.error(Diagnostic::type_(
                        target.span,
                        format!(
                            "operator '{}=' requires a numeric target, found {}",
                            op.symbol(),
                            target_ty
                        ),
                    ));
                } else {
                    self.require(&target_ty, &value_ty, value.span);
                    if *op == BinOp::Div && target_ty.is_int() {
                        self.check_divisor(value);
                    }
                }
                self.invalidate_target(target);
            }
            Stmt::IncDec { target, .. } => {
                let ty = self.check_place(target);
                if !ty.is_error() && !ty.is_numeric() {
                    self.error(Diagnostic::type_(
                        target.span,
                        format!("cannot increment or decrement value of type {}", ty),
                    ));
                }
                self.invalidate_target(target);
            }
            Stmt::If {
                cond, then_, else_, ..
            } => {
                self.check_cond(cond);
                self.check_block(then_);
                if let Some(else_) = else_ {
                    self.check_stmt(else_);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.invalidate_assigned(&body.stmts);
                self.check_cond(cond);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            Stmt::ForIn {
                var, iter, body, ..
            } => {
                let iter_ty = self.check_expr(iter, None);
                let elem = match iter_ty {
                    Type::Array { elem, .. } => *elem,
                    Type::Error => Type::Error,
                    other => {
                        self.error(Diagnostic::type_(
                            iter.span,
                            format!("cannot iterate over value of type {}", other),
                        ));
                        Type::Error
                    }
                };
                self.invalidate_assigned(&body.stmts);
                self.scopes.push();
                self.declare_var(var, elem, false, None);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                ..
            } => self.check_switch(scrutinee, cases, default.as_deref()),
            Stmt::Return { value, span } => self.check_return(value.as_ref(), *span),
            Stmt::Break { span } => self.check_in_loop("break", *span),
            Stmt::Continue { span } => self.check_in_loop("continue", *span),
            Stmt::Expr { expr, .. } => {
                self.check_expr(expr, None);
            }
            Stmt::Block(block) => self.check_block(block),
        }
    }

    fn check_var_decl(&mut self, ty: &TypeExpr, name: &Ident, value: &Expr) {
        let mut declared = self.resolve_type(ty);
        if declared.is_void() {
            self.error(Diagnostic::type_(
                ty.span(),
                format!("variable '{}' cannot have type void", name.text),
            ));
            declared = Type::Error;
        }
        let actual = self.check_expr(value, Some(&declared));
        self.require(&declared, &actual, value.span);

        let constant = if declared.is_int() && actual.is_int() {
            self.fold(value).and_then(ConstValue::as_int)
        } else {
            None
        };
        self.declare_var(name, declared, true, constant);
    }

    fn check_switch(&mut self, scrutinee: &Expr, cases: &[Case], default: Option<&Stmt>) {
        let st = self.check_expr(scrutinee, None);
        let switchable =
            st.is_error() || st.is_int() || st.is_bool() || matches!(st, Type::Enum(_));
        if !switchable {
            self.error(Diagnostic::type_(
                scrutinee.span,
                format!("cannot switch on value of type {}", st),
            ));
        }

        let mut seen: Vec<ConstValue> = Vec::new();
        for case in cases {
            let ct = self.check_expr(&case.value, Some(&st));
            if switchable {
                self.require(&st, &ct, case.value.span);
            }
            match self.fold(&case.value) {
                Some(v) => {
                    if seen.contains(&v) {
                        self.error(Diagnostic::type_(case.value.span, "duplicate case value"));
                    } else {
                        seen.push(v);
                    }
                    self.consts.insert(case.value.id, v);
                }
                None if ct.is_error() => {}
                None => self.error(Diagnostic::type_(
                    case.value.span,
                    "case value must be a constant expression",
                )),
            }
            self.check_scoped(&case.body);
        }
        if let Some(default) = default {
            self.check_scoped(default);
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) {
        let ret = self.ret_ty.clone();
        match value {
            None if ret.is_void() || ret.is_error() => {}
            None => self.error(Diagnostic::type_(
                span,
                format!("missing return value in function returning {}", ret),
            )),
            Some(v) if ret.is_void() => {
                self.check_expr(v, None);
                self.error(Diagnostic::type_(
                    v.span,
                    "cannot return a value from a void function",
                ));
            }
            Some(v) => {
                let t = self.check_expr(v, Some(&ret));
                self.require(&ret, &t, v.span);
            }
        }
    }

    fn check_in_loop(&mut self, keyword: &str, span: Span) {
        if self.loop_depth == 0 {
            self.error(Diagnostic::type_(
                span,
                format!("'{}' outside of a loop", keyword),
            ));
        }
    }

    fn check_cond(&mut self, cond: &Expr) {
        let t = self.check_expr(cond, Some(&Type::bool()));
        if !t.compatible(&Type::bool()) {
            self.error(Diagnostic::type_(
                cond.span,
                format!("condition must be bool, found {}", t),
            ));
        }
    }

    /// Check an assignment target and return its type.
    fn check_place(&mut self, target: &Expr) -> Type {
        let ty = self.check_expr(target, None);
        let root = place_root(target).and_then(|id| self.scopes.lookup(&id.text));
        match root {
            Some(sym) if !sym.mutable => {
                let msg = format!("cannot assign to loop variable '{}'", sym.name);
                self.error(Diagnostic::type_(target.span, msg));
            }
            Some(_) => {}
            None if ty.is_error() => {}
            None => self.error(Diagnostic::type_(target.span, "invalid assignment target")),
        }
        ty
    }

    fn check_expr(&mut self, expr: &Expr, hint: Option<&Type>) -> Type {
        let ty = self.infer_expr(expr, hint);
        self.types.insert(expr.id, ty.clone());
        ty
    }

    /// `hint` is the type the context expects; it only decides the width of
    /// float literals and the lengths reported for array literals.
    fn infer_expr(&mut self, expr: &Expr, hint: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::Lit(Lit::Int(v)) => {
                if *v > i64::from(u32::MAX) {
                    self.error(Diagnostic::type_(
                        expr.span,
                        format!("integer literal {} does not fit in 32 bits", v),
                    ));
                    return Type::Error;
                }
                Type::int()
            }
            ExprKind::Lit(Lit::Float(_)) => match hint {
                Some(t) if *t == Type::f32() => Type::f32(),
                _ => Type::f64(),
            },
            ExprKind::Lit(Lit::Str(_)) => Type::str_(),
            ExprKind::Lit(Lit::Bool(_)) => Type::bool(),
            ExprKind::Var(id) => self.check_var(id),
            ExprKind::Array(elems) => self.check_array_lit(expr, elems, hint),
            ExprKind::StructLit { name, fields } => self.check_struct_lit(expr, name, fields),
            ExprKind::Unary { op, expr: inner } => match op {
                UnOp::Neg => {
                    let t = self.check_expr(inner, hint);
                    if t.is_error() || t.is_numeric() {
                        t
                    } else {
                        self.error(Diagnostic::type_(
                            expr.span,
                            format!("cannot negate value of type {}", t),
                        ));
                        Type::Error
                    }
                }
                UnOp::Not => {
                    let t = self.check_expr(inner, Some(&Type::bool()));
                    if !t.compatible(&Type::bool()) {
                        self.error(Diagnostic::type_(
                            expr.span,
                            format!("operator '!' requires bool, found {}", t),
                        ));
                        return Type::Error;
                    }
                    Type::bool()
                }
            },
            ExprKind::Binary { lhs, op, rhs } => self.check_binary(expr, lhs, *op, rhs, hint),
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
            ExprKind::Index { base, index } => self.check_index(expr, base, index),
            ExprKind::Field { base, field } => self.check_field(expr, base, field),
            ExprKind::Syscall(args) => {
                for arg in args {
                    let t = self.check_expr(arg, Some(&Type::int()));
                    if !t.compatible(&Type::int()) {
                        self.error(Diagnostic::type_(
                            arg.span,
                            format!("syscall arguments must be int, found {}", t),
                        ));
                    }
                }
                Type::void()
            }
            ExprKind::Paren(inner) => self.check_expr(inner, hint),
        }
    }

    fn check_var(&mut self, id: &Ident) -> Type {
        if let Some(sym) = self.scopes.lookup(&id.text) {
            return sym.ty.clone();
        }
        let d = if self.registry.fn_sig(&id.text).is_some() {
            Diagnostic::type_(
                id.span,
                format!("function '{}' cannot be used as a value", id.text),
            )
        } else if self.registry.is_type_name(&id.text) {
            Diagnostic::type_(
                id.span,
                format!("'{}' is a type, not a value", id.text),
            )
        } else {
            Diagnostic::name(id.span, format!("undeclared identifier '{}'", id.text))
        };
        self.error(d);
        Type::Error
    }

    fn check_array_lit(&mut self, expr: &Expr, elems: &[Expr], hint: Option<&Type>) -> Type {
        if let Some(Type::Array { elem, len }) = hint {
            let (elem_ty, len) = (elem.as_ref().clone(), *len);
            let mut reported = false;
            for e in elems {
                let t = self.check_expr(e, Some(&elem_ty));
                if !reported && !t.compatible(&elem_ty) {
                    self.error(Diagnostic::type_(
                        e.span,
                        format!("array element has type {}, expected {}", t, elem_ty),
                    ));
                    reported = true;
                }
            }
            if elems.len() != len as usize {
                self.error(Diagnostic::array_size(
                    expr.span,
                    format!(
                        "array size mismatch: expected {} elements, found {}",
                        len,
                        elems.len()
                    ),
                ));
                return Type::Error;
            }
            return Type::array(elem_ty, len);
        }

        let Some((first, rest)) = elems.split_first() else {
            self.error(Diagnostic::type_(
                expr.span,
                "cannot infer the type of an empty array literal",
            ));
            return Type::Error;
        };
        let elem_ty = self.check_expr(first, None);
        for e in rest {
            let t = self.check_expr(e, Some(&elem_ty));
            if !t.compatible(&elem_ty) {
                self.error(Diagnostic::type_(
                    e.span,
                    format!("array element has type {}, expected {}", t, elem_ty),
                ));
                return Type::Error;
            }
        }
        if elem_ty.is_void() {
            self.error(Diagnostic::type_(first.span, "array element cannot be void"));
            return Type::Error;
        }
        if elem_ty.is_error() {
            return Type::Error;
        }
        match u32::try_from(elems.len()) {
            Ok(len) => Type::array(elem_ty, len),
            Err(_) => Type::Error,
        }
    }

    fn check_struct_lit(&mut self, expr: &Expr, name: &Ident, fields: &[FieldInit]) -> Type {
        let Some(def) = self.registry.struct_def(&name.text).cloned() else {
            for f in fields {
                self.check_expr(&f.value, None);
            }
            self.error(Diagnostic::name(
                name.span,
                format!("unknown struct '{}'", name.text),
            ));
            return Type::Error;
        };

        let mut seen: Vec<&str> = Vec::new();
        for init in fields {
            match def.field(&init.name.text) {
                Some((_, fd)) => {
                    let t = self.check_expr(&init.value, Some(&fd.ty));
                    self.require(&fd.ty, &t, init.value.span);
                    if seen.contains(&init.name.text.as_str()) {
                        self.error(Diagnostic::type_(
                            init.name.span,
                            format!("field '{}' is initialized more than once", init.name.text),
                        ));
                    }
                    seen.push(&init.name.text);
                }
                None => {
                    self.check_expr(&init.value, None);
                    self.error(Diagnostic::name(
                        init.name.span,
                        format!("struct '{}' has no field '{}'", def.name, init.name.text),
                    ));
                }
            }
        }

        let missing: Vec<&str> = def
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|n| !seen.contains(n))
            .collect();
        if !missing.is_empty() {
            self.error(Diagnostic::type_(
                expr.span,
                format!(
                    "missing field(s) {} in literal of struct '{}'",
                    missing.join(", "),
                    def.name
                ),
            ));
        }
        Type::Struct(def.name)
    }

    fn check_binary(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        op: BinOp,
        rhs: &Expr,
        hint: Option<&Type>,
    ) -> Type {
        let logical = matches!(op, BinOp::And | BinOp::Or);
        let operand_hint = if op.is_comparison() || logical {
            None
        } else {
            hint.filter(|t| t.is_numeric()).cloned()
        };

        // `1.5 < x`: let the non-literal side pick the float width.
        let (lt, rt) = if operand_hint.is_none() && is_float_literal(lhs) && !is_float_literal(rhs)
        {
            let rt = self.check_expr(rhs, None);
            let lt = self.check_expr(lhs, Some(&rt));
            (lt, rt)
        } else {
            let lt = self.check_expr(lhs, operand_hint.as_ref());
            let rt = self.check_expr(rhs, operand_hint.as_ref().or(Some(&lt)));
            (lt, rt)
        };

        if lt.is_error() || rt.is_error() {
            return Type::Error;
        }

        let result = match op {
            BinOp::And | BinOp::Or => (lt.is_bool() && rt.is_bool()).then(Type::bool),
            BinOp::Eq | BinOp::Ne => (lt == rt && lt.is_equatable()).then(Type::bool),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                (lt == rt && lt.is_numeric()).then(Type::bool)
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                (lt == rt && lt.is_numeric()).then(|| lt.clone())
            }
            BinOp::Rem | BinOp::Xor => (lt.is_int() && rt.is_int()).then(Type::int),
        };

        match result {
            Some(ty) => {
                if matches!(op, BinOp::Div | BinOp::Rem) && ty.is_int() {
                    self.check_divisor(rhs);
                }
                ty
            }
            None => {
                self.error(Diagnostic::type_(
                    expr.span,
                    format!(
                        "operator '{}' cannot be applied to {} and {}",
                        op.symbol(),
                        lt,
                        rt
                    ),
                ));
                Type::Error
            }
        }
    }

    fn check_divisor(&mut self, divisor: &Expr) {
        if self.fold(divisor) == Some(ConstValue::Int(0)) {
            self.error(Diagnostic::type_(divisor.span, "division by zero"));
        }
    }

    fn check_call(&mut self, expr: &Expr, callee: &Ident, args: &[Expr]) -> Type {
        let Some(sig) = self.registry.fn_sig(&callee.text).cloned() else {
            for arg in args {
                self.check_expr(arg, None);
            }
            let d = if self.scopes.lookup(&callee.text).is_some() {
                Diagnostic::type_(callee.span, format!("'{}' is not a function", callee.text))
            } else {
                Diagnostic::name(
                    callee.span,
                    format!("undefined function '{}'", callee.text),
                )
            };
            self.error(d);
            return Type::Error;
        };

        if args.len() != sig.params.len() {
            self.error(Diagnostic::type_(
                expr.span,
                format!(
                    "function '{}' expects {} argument(s), found {}",
                    sig.name,
                    sig.params.len(),
                    args.len()
                ),
            ));
        }
        for (i, arg) in args.iter().enumerate() {
            match sig.params.get(i) {
                Some((_, pty)) => {
                    let t = self.check_expr(arg, Some(pty));
                    if !t.compatible(pty) {
                        self.error(Diagnostic::type_(
                            arg.span,
                            format!(
                                "argument {} of '{}' has type {}, expected {}",
                                i + 1,
                                sig.name,
                                t,
                                pty
                            ),
                        ));
                    }
                }
                None => {
                    self.check_expr(arg, None);
                }
            }
        }
        sig.ret
    }

    fn check_index(&mut self, expr: &Expr, base: &Expr, index: &Expr) -> Type {
        let bt = self.check_expr(base, None);
        let it = self.check_expr(index, Some(&Type::int()));
        if !it.compatible(&Type::int()) {
            self.error(Diagnostic::type_(
                index.span,
                format!("array index must be int, found {}", it),
            ));
        }

        let (elem, len) = match bt {
            Type::Array { elem, len } => (*elem, len),
            Type::Error => return Type::Error,
            other => {
                self.error(Diagnostic::type_(
                    base.span,
                    format!("cannot index into value of type {}", other),
                ));
                return Type::Error;
            }
        };

        if it.is_int() {
            if let Some(ConstValue::Int(v)) = self.fold(index) {
                if u32::try_from(v).map_or(true, |v| v >= len) {
                    self.error(Diagnostic::array_size(
                        expr.span,
                        format!(
                            "index {} is out of bounds for array of length {}",
                            v, len
                        ),
                    ));
                    return Type::Error;
                }
                self.consts.insert(index.id, ConstValue::Int(v));
            }
        }
        elem
    }

    fn check_field(&mut self, expr: &Expr, base: &Expr, field: &Ident) -> Type {
        if let ExprKind::Var(id) = &base.kind {
            let enum_info = if self.scopes.lookup(&id.text).is_none() {
                self.registry
                    .enum_def(&id.text)
                    .map(|def| (def.name.clone(), def.variant_index(&field.text)))
            } else {
                None
            };
            if let Some((enum_name, variant)) = enum_info {
                let ty = Type::Enum(enum_name.clone());
                self.types.insert(base.id, ty.clone());
                let Some(idx) = variant.and_then(|i| i32::try_from(i).ok()) else {
                    self.error(Diagnostic::name(
                        field.span,
                        format!("enum '{}' has no variant '{}'", enum_name, field.text),
                    ));
                    return Type::Error;
                };
                self.consts.insert(expr.id, ConstValue::Int(idx));
                return ty;
            }
        }

        let bt = self.check_expr(base, None);
        match &bt {
            Type::Struct(name) => {
                let fty = self
                    .registry
                    .struct_def(name)
                    .and_then(|def| def.field(&field.text))
                    .map(|(_, f)| f.ty.clone());
                match fty {
                    Some(t) => t,
                    None => {
                        self.error(Diagnostic::name(
                            field.span,
                            format!("struct '{}' has no field '{}'", name, field.text),
                        ));
                        Type::Error
                    }
                }
            }
            Type::Error => Type::Error,
            other => {
                self.error(Diagnostic::type_(
                    field.span,
                    format!("type {} has no field '{}'", other, field.text),
                ));
                Type::Error
            }
        }
    }

    fn declare_var(&mut self, name: &Ident, ty: Type, mutable: bool, constant: Option<i32>) {
        let sym = Symbol {
            name: name.text.clone(),
            ty,
            mutable,
            constant,
            span: name.span,
        };
        if self.scopes.declare(sym).is_err() {
            self.error(Diagnostic::name(
                name.span,
                format!("'{}' is already declared in this scope", name.text),
            ));
        }
    }

    fn resolve_type(&mut self, te: &TypeExpr) -> Type {
        match self.registry.resolve(te) {
            Ok(t) => t,
            Err(d) => {
                self.error(d);
                Type::Error
            }
        }
    }

    fn require(&mut self, expected: &Type, found: &Type, span: Span) {
        if !expected.compatible(found) {
            self.error(Diagnostic::type_(
                span,
                format!("mismatched types: expected {}, found {}", expected, found),
            ));
        }
    }

    fn fold(&self, expr: &Expr) -> Option<ConstValue> {
        let env = FoldEnv {
            scopes: &self.scopes,
            registry: &self.registry,
        };
        fold::fold(expr, &env)
    }

    fn invalidate_target(&mut self, target: &Expr) {
        if let Some(root) = place_root(target) {
            self.scopes.invalidate(&root.text);
        }
    }

    /// Forget every constant a loop body may change, before the body (or
    /// the loop condition) is checked.
    fn invalidate_assigned(&mut self, body: &[Stmt]) {
        let mut names = Vec::new();
        collect_assigned(body, &mut names);
        for name in names {
            self.scopes.invalidate(name);
        }
    }

    fn error(&mut self, d: Diagnostic) {
        log::trace!("diagnostic: {}", d);
        self.diags.push(d);
    }
}

/// The variable an lvalue ultimately writes to: `a` for `a`, `a[i].f`, ...
fn place_root(expr: &Expr) -> Option<&Ident> {
    match &expr.kind {
        ExprKind::Var(id) => Some(id),
        ExprKind::Index { base, .. } | ExprKind::Field { base, .. } => place_root(base),
        _ => None,
    }
}

fn is_float_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Lit(Lit::Float(_)) => true,
        ExprKind::Paren(inner)
        | ExprKind::Unary {
            op: UnOp::Neg,
            expr: inner,
        } => is_float_literal(inner),
        _ => false,
    }
}

fn collect_assigned<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a str>) {
    for stmt in stmts {
        collect_assigned_stmt(stmt, out);
    }
}

fn collect_assigned_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a str>) {
    match stmt {
        Stmt::Assign { target, .. }
        | Stmt::CompoundAssign { target, .. }
        | Stmt::IncDec { target, .. } => {
            if let Some(root) = place_root(target) {
                out.push(&root.text);
            }
        }
        Stmt::If { then_, else_, .. } => {
            collect_assigned(&then_.stmts, out);
            if let Some(else_) = else_ {
                collect_assigned_stmt(else_, out);
            }
        }
        Stmt::While { body, .. } | Stmt::ForIn { body, .. } => collect_assigned(&body.stmts, out),
        Stmt::Switch { cases, default, .. } => {
            for case in cases {
                collect_assigned_stmt(&case.body, out);
            }
            if let Some(default) = default {
                collect_assigned_stmt(default, out);
            }
        }
        Stmt::Block(block) => collect_assigned(&block.stmts, out),
        Stmt::VarDecl { .. }
        | Stmt::Return { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::Expr { .. } => {}
    }
}
