//! Compile-time evaluation of expressions.
//!
//! Folding is used for static bounds checks, `switch` case values and
//! division-by-zero detection. It never rewrites the AST.

use raven_ast::ast::{BinOp, Expr, ExprKind, Lit, UnOp};

/// A value known at compile time. `Int` carries the 32-bit value the
/// target computes, so arithmetic wraps the way `addl`/`imull` do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn as_int(self) -> Option<i32> {
        match self {
            ConstValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

/// What the folder may know about names.
pub trait ConstEnv {
    /// Known value of an `int` variable.
    fn constant(&self, name: &str) -> Option<i32>;
    /// Index of `variant` in enum `enum_name`, if `enum_name` names an enum.
    fn enum_variant(&self, enum_name: &str, variant: &str) -> Option<i32>;
}

/// An environment where no name has a known value.
pub struct NoEnv;

impl ConstEnv for NoEnv {
    fn constant(&self, _name: &str) -> Option<i32> {
        None
    }
    fn enum_variant(&self, _enum_name: &str, _variant: &str) -> Option<i32> {
        None
    }
}

/// Evaluate `expr` if it depends only on literals and known constants.
///
/// Returns `None` for anything else, including division by zero; callers
/// that care about it report it separately.
pub fn fold(expr: &Expr, env: &dyn ConstEnv) -> Option<ConstValue> {
    match &expr.kind {
        // Literals above `i32::MAX` name the same bit pattern as a negative int.
        ExprKind::Lit(Lit::Int(v)) => u32::try_from(*v).ok().map(|u| ConstValue::Int(u as i32)),
        ExprKind::Lit(Lit::Float(v)) => Some(ConstValue::Float(*v)),
        ExprKind::Lit(Lit::Bool(b)) => Some(ConstValue::Bool(*b)),
        ExprKind::Lit(Lit::Str(_)) => None,
        ExprKind::Var(id) => env.constant(&id.text).map(ConstValue::Int),
        ExprKind::Paren(inner) => fold(inner, env),
        ExprKind::Field { base, field } => match &base.kind {
            ExprKind::Var(id) => env.enum_variant(&id.text, &field.text).map(ConstValue::Int),
            _ => None,
        },
        ExprKind::Unary { op, expr } => match (op, fold(expr, env)?) {
            (UnOp::Neg, ConstValue::Int(v)) => Some(ConstValue::Int(v.wrapping_neg())),
            (UnOp::Neg, ConstValue::Float(v)) => Some(ConstValue::Float(-v)),
            (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
            _ => None,
        },
        ExprKind::Binary { lhs, op, rhs } => {
            let l = fold(lhs, env)?;
            // `&&`/`||` only need the right side when the left does not decide.
            match (op, l) {
                (BinOp::And, ConstValue::Bool(false)) => return Some(ConstValue::Bool(false)),
                (BinOp::Or, ConstValue::Bool(true)) => return Some(ConstValue::Bool(true)),
                _ => {}
            }
            let r = fold(rhs, env)?;
            fold_binary(*op, l, r)
        }
        ExprKind::Array(_)
        | ExprKind::StructLit { .. }
        | ExprKind::Call { .. }
        | ExprKind::Index { .. }
        | ExprKind::Syscall(_) => None,
    }
}

fn fold_binary(op: BinOp, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
    use ConstValue::{Bool, Float, Int};
    let v = match (l, r) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => Int(a.wrapping_add(b)),
            BinOp::Sub => Int(a.wrapping_sub(b)),
            BinOp::Mul => Int(a.wrapping_mul(b)),
            // `i32::MIN / -1` faults in `idivl`; leave it to run time.
            BinOp::Div => Int(a.checked_div(b)?),
            BinOp::Rem => Int(a.checked_rem(b)?),
            BinOp::Xor => Int(a ^ b),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            BinOp::And | BinOp::Or => return None,
        },
        (Float(a), Float(b)) => match op {
            BinOp::Add => Float(a + b),
            BinOp::Sub => Float(a - b),
            BinOp::Mul => Float(a * b),
            BinOp::Div if b != 0.0 => Float(a / b),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            BinOp::Lt => Bool(a < b),
            BinOp::Le => Bool(a <= b),
            BinOp::Gt => Bool(a > b),
            BinOp::Ge => Bool(a >= b),
            _ => return None,
        },
        (Bool(a), Bool(b)) => match op {
            BinOp::And => Bool(a && b),
            BinOp::Or => Bool(a || b),
            BinOp::Eq => Bool(a == b),
            BinOp::Ne => Bool(a != b),
            _ => return None,
        },
        _ => return None,
    };
    Some(v)
}
