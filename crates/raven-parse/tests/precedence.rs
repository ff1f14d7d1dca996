use raven_ast::ast::{BinOp, Expr, ExprKind, Item, Stmt, UnOp};
use raven_parse::parse_str;

/// Parse `int v = <m>` inside `main` and return the initializer.
fn val(m: &str) -> Expr {
    let module = parse_str("<mem>", &format!("func main() {{\n int v = {m}\n}}")).unwrap();
    let Item::Fn(f) = &module.items[0] else {
        panic!("expected function");
    };
    let Stmt::VarDecl { value, .. } = &f.body.stmts[0] else {
        panic!("expected VarDecl");
    };
    value.clone()
}

fn binop(e: &Expr) -> BinOp {
    match &e.kind {
        ExprKind::Binary { op, .. } => *op,
        other => panic!("expected binary, found {:?}", other),
    }
}

#[test]
fn parenthesised_arithmetic() {
    // (5+3)*2-4  ==>  ((5+3)*2)-4
    let e = val("(5 + 3) * 2 - 4");
    let ExprKind::Binary { lhs, op, rhs } = &e.kind else {
        panic!("top should be binary");
    };
    assert_eq!(*op, BinOp::Sub);
    assert_eq!(binop(lhs), BinOp::Mul);
    assert!(matches!(rhs.kind, ExprKind::Lit(_)));
    let ExprKind::Binary { lhs: inner, .. } = &lhs.kind else {
        unreachable!()
    };
    assert!(matches!(inner.kind, ExprKind::Paren(_)));
}

#[test]
fn logical_layers() {
    // 5 > 3 && 10 < 20 || 1 == 1  ==>  ((5>3) && (10<20)) || (1==1)
    let e = val("5 > 3 && 10 < 20 || 1 == 1");
    let ExprKind::Binary { lhs, op, rhs } = &e.kind else {
        panic!("top should be binary");
    };
    assert_eq!(*op, BinOp::Or);
    assert_eq!(binop(lhs), BinOp::And);
    assert_eq!(binop(rhs), BinOp::Eq);
}

#[test]
fn xor_binds_looser_than_equality() {
    let e = val("1 ^ 2 == 3");
    let ExprKind::Binary { op, rhs, .. } = &e.kind else {
        panic!()
    };
    assert_eq!(*op, BinOp::Xor);
    assert_eq!(binop(rhs), BinOp::Eq);
}

#[test]
fn subtraction_is_left_associative() {
    let e = val("10 - 4 - 3");
    let ExprKind::Binary { lhs, op, .. } = &e.kind else {
        panic!()
    };
    assert_eq!(*op, BinOp::Sub);
    assert_eq!(binop(lhs), BinOp::Sub);
}

#[test]
fn unary_binds_tighter_than_binary_but_looser_than_index() {
    let e = val("-a[0] * 2");
    let ExprKind::Binary { lhs, op, .. } = &e.kind else {
        panic!()
    };
    assert_eq!(*op, BinOp::Mul);
    let ExprKind::Unary { op: UnOp::Neg, expr } = &lhs.kind else {
        panic!("expected negation");
    };
    assert!(matches!(expr.kind, ExprKind::Index { .. }));
}

#[test]
fn expression_continues_inside_parentheses_across_lines() {
    let e = val("(1 +\n 2\n + 3)");
    assert!(matches!(e.kind, ExprKind::Paren(_)));
}
