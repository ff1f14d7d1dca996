//! Operators, literals and constant folding as seen by the checker

use raven_ast::ast::{Item, Stmt};
use raven_ast::diag::{DiagKind, Diagnostics};
use raven_parse::parse_str;
use raven_types::{CheckedModule, ConstValue, Type, TypeChecker};

fn check(src: &str) -> Result<CheckedModule, Diagnostics> {
    let module = parse_str("<test>", src).expect("parse failed");
    TypeChecker::new().check_module(&module)
}

fn kinds(src: &str) -> Vec<DiagKind> {
    match check(src) {
        Ok(_) => Vec::new(),
        Err(diags) => diags.iter().map(|d| d.kind).collect(),
    }
}

fn in_main(body: &str) -> String {
    format!("func main() {{\n{}\n}}", body)
}

#[test]
fn arithmetic_on_each_numeric_type() {
    let src = in_main(
        r#"
    int a = (5 + 3) * 2 - 4
    f32 b = 1.5 * 2.0
    f64 c = 1.5 / 3.0
    int d = 10 % 3
    int e = 6 ^ 3
"#,
    );
    assert!(check(&src).is_ok());
}

#[test]
fn f32_variables_mix_with_float_literals() {
    let src = in_main(
        r#"
    f32 x = 3.5
    f32 y = x + 1.5
    bool lt = 1.0 < x
    bool gt = x > 0.5
"#,
    );
    assert!(check(&src).is_ok());
}

#[test]
fn no_implicit_numeric_conversion() {
    assert_eq!(kinds(&in_main("f32 x = 1")), vec![DiagKind::TypeError]);
    assert_eq!(kinds(&in_main("int x = 1.5")), vec![DiagKind::TypeError]);
    assert_eq!(
        kinds(&in_main("f32 a = 1.5\n f64 b = 2.5\n f64 c = a + b")),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn remainder_requires_int() {
    assert_eq!(kinds(&in_main("f64 x = 1.5 % 2.5")), vec![DiagKind::TypeError]);
}

#[test]
fn logical_operators_require_bool() {
    assert!(check(&in_main("bool b = 5 > 3 && 10 < 20 || 1 == 1")).is_ok());
    assert_eq!(kinds(&in_main("bool b = 1 && true")), vec![DiagKind::TypeError]);
    assert_eq!(kinds(&in_main("bool b = !3")), vec![DiagKind::TypeError]);
}

#[test]
fn strings_are_not_comparable() {
    assert_eq!(
        kinds(&in_main(r#"bool b = "a" == "b""#)),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn erroneous_subexpression_does_not_cascade() {
    // one undeclared name, reported once, even though it feeds two operators
    assert_eq!(
        kinds(&in_main("int x = (missing + 1) * 2")),
        vec![DiagKind::NameError]
    );
}

#[test]
fn division_by_constant_zero() {
    assert_eq!(kinds(&in_main("int x = 10 / 0")), vec![DiagKind::TypeError]);
    assert_eq!(
        kinds(&in_main("int z = 0\n int x = 10 % z")),
        vec![DiagKind::TypeError]
    );
    assert_eq!(
        kinds(&in_main("int x = 10\n x /= 0")),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn integer_literal_wider_than_32_bits() {
    assert_eq!(
        kinds(&in_main("int x = 5000000000")),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn undeclared_and_redeclared_names() {
    assert_eq!(kinds(&in_main("x = 1")), vec![DiagKind::NameError]);
    assert_eq!(
        kinds(&in_main("int x = 1\n int x = 2")),
        vec![DiagKind::NameError]
    );
}

#[test]
fn shadowing_in_nested_block_is_allowed() {
    let src = in_main("int x = 1\n { string x = \"s\" }\n x = 2");
    assert!(check(&src).is_ok());
}

#[test]
fn block_scoped_names_do_not_leak() {
    assert_eq!(
        kinds(&in_main("{ int inner = 1 }\n inner = 2")),
        vec![DiagKind::NameError]
    );
}

#[test]
fn void_variable_is_rejected() {
    assert_eq!(kinds(&in_main("void v = 1")), vec![DiagKind::TypeError]);
}

#[test]
fn unknown_type_name() {
    assert_eq!(kinds(&in_main("Widget w = 1")), vec![DiagKind::NameError]);
}

#[test]
fn compound_assignment_requires_numeric_target() {
    assert_eq!(
        kinds(&in_main("string s = \"a\"\n s += \"b\"")),
        vec![DiagKind::TypeError]
    );
    assert_eq!(
        kinds(&in_main("bool b = true\n b++")),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn assignment_to_non_place() {
    assert_eq!(kinds(&in_main("int x = 1\n (x) = 2")), vec![DiagKind::TypeError]);
}

#[test]
fn every_expression_gets_a_type() {
    let src = in_main("int a = 1\n bool b = a + 2 > 3");
    let module = parse_str("<test>", &src).unwrap();
    let checked = TypeChecker::new().check_module(&module).unwrap();

    let Item::Fn(main) = &module.items[0] else {
        panic!("expected main");
    };
    let Stmt::VarDecl { value, .. } = &main.body.stmts[1] else {
        panic!("expected declaration");
    };
    assert_eq!(checked.type_of(value.id), Some(&Type::bool()));
    let max_id = value.id.0;
    for id in 0..=max_id {
        assert!(
            checked.type_of(raven_ast::ast::ExprId(id)).is_some(),
            "expression {} has no type",
            id
        );
    }
}

#[test]
fn enum_variant_access_folds_to_index() {
    let src = r#"
enum Color { Red
  Green
  Blue }
func main() { Color c = Color.Blue }
"#;
    let module = parse_str("<test>", src).unwrap();
    let checked = TypeChecker::new().check_module(&module).unwrap();
    let Item::Fn(main) = &module.items[1] else {
        panic!("expected main");
    };
    let Stmt::VarDecl { value, .. } = &main.body.stmts[0] else {
        panic!("expected declaration");
    };
    assert_eq!(checked.const_of(value.id), Some(ConstValue::Int(2)));
    assert_eq!(checked.type_of(value.id), Some(&Type::Enum("Color".into())));
}

#[test]
fn chained_assignment() {
    let src = in_main("    int a = 0\n    int b = 0\n    a = b = 5");
    assert!(check(&src).is_ok());
}

#[test]
fn chained_assignment_checks_each_store() {
    let src = in_main("    int n = 0\n    f32 f = 1.0\n    n = f = 2.0");
    assert_eq!(kinds(&src), vec![DiagKind::TypeError]);
}

#[test]
fn chained_assignment_forgets_known_values() {
    let src = in_main("    int i = 9\n    int j = 9\n    [3]int a = [1, 2, 3]\n    i = j = 1\n    int x = a[i] + a[j]");
    assert!(check(&src).is_ok());
}
