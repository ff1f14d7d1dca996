//! Array literal sizes and static bounds checks

use raven_ast::ast::{ExprKind, Item, Stmt};
use raven_ast::diag::{DiagKind, Diagnostics};
use raven_parse::parse_str;
use raven_types::{CheckedModule, ConstValue, TypeChecker};

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

#[test]
fn matching_array_literal() {
    let src = r#"
func main() {
    [3]int arr = [1, 2, 3]
    int x = arr[0] + arr[2]
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn literal_longer_than_declared_is_one_error() {
    let src = r#"
func main() {
    [3]int test = [1, 2, 3, 4, 5]
}
"#;
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn literal_shorter_than_declared_is_one_error() {
    let src = "func main() { [4]int a = [1, 2] }";
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn size_message_names_both_lengths() {
    let err = check("func main() { [3]int a = [1, 2, 3, 4, 5] }").unwrap_err();
    let msg = &err.iter().next().unwrap().message;
    assert!(msg.contains('3') && msg.contains('5'), "{}", msg);
}

#[test]
fn two_dimensional_literal() {
    let src = r#"
func main() {
    [2][3]int m = [[1, 2, 3], [4, 5, 6]]
    int x = m[1][2]
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn inner_dimension_mismatch() {
    let src = "func main() { [2][3]int m = [[1, 2, 3], [4, 5]] }";
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn element_type_mismatch() {
    let src = r#"func main() { [2]int a = [1, "two"] }"#;
    assert_eq!(kinds(src), vec![DiagKind::TypeError]);
}

#[test]
fn float_array_elements_follow_declared_width() {
    let src = r#"
func main() {
    [2]f32 a = [1.5, 2.5]
    [2]f64 b = [1.5, 2.5]
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn literal_constant_index_out_of_bounds() {
    let src = "func main() { [3]int a = [1, 2, 3]\n int x = a[3] }";
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn negative_constant_index_through_variable() {
    let src = r#"
func main() {
    [3]int arr = [1, 2, 3]
    int idx = -1
    int x = arr[idx]
}
"#;
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn valid_constant_index_through_variable() {
    let src = r#"
func main() {
    [3]int arr = [1, 2, 3]
    int idx = 1
    int x = arr[idx]
}
"#;
    let checked = check(src).expect("should check");
    // the folded index is recorded so codegen can skip the guard
    let recorded = (0..64)
        .map(raven_ast::ast::ExprId)
        .filter_map(|id| checked.const_of(id))
        .count();
    assert!(recorded >= 1);
}

#[test]
fn folded_arithmetic_index() {
    let src = r#"
func main() {
    [4]int arr = [1, 2, 3, 4]
    int i = 2
    int j = i * 2
    int x = arr[j]
}
"#;
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn reassigned_variable_is_no_longer_constant() {
    let src = r#"
func f(int n) -> int { return n }

func main() {
    [3]int arr = [1, 2, 3]
    int idx = -1
    idx = f(1)
    int x = arr[idx]
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn loop_body_assignment_clears_constant_before_body() {
    let src = r#"
func main() {
    [3]int arr = [1, 2, 3]
    int i = 5
    while true {
        int x = arr[i]
        i = 0
    }
}
"#;
    // `i` is 5 only on the first iteration; the access gets a runtime guard
    assert!(check(src).is_ok());
}

#[test]
fn parameter_index_is_deferred_to_runtime() {
    let src = r#"
func get([3]int a, int i) -> int { return a[i] }
func main() {
    [3]int a = [1, 2, 3]
    int x = get(a, 7)
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn indexing_a_non_array() {
    let src = "func main() { int x = 3\n int y = x[0] }";
    assert_eq!(kinds(src), vec![DiagKind::TypeError]);
}

#[test]
fn index_must_be_int() {
    let src = "func main() { [2]int a = [1, 2]\n int y = a[true] }";
    assert_eq!(kinds(src), vec![DiagKind::TypeError]);
}

#[test]
fn for_in_binds_element_type() {
    let src = r#"
func main() {
    [2][3]int m = [[1, 2, 3], [4, 5, 6]]
    int total = 0
    for row in m {
        for v in row {
            total += v
        }
    }
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn for_in_over_non_array() {
    let src = "func main() { int n = 3\n for x in n { } }";
    assert_eq!(kinds(src), vec![DiagKind::TypeError]);
}

#[test]
fn loop_variable_is_immutable() {
    let src = "func main() { [2]int a = [1, 2]\n for x in a { x = 3 } }";
    assert_eq!(kinds(src), vec![DiagKind::TypeError]);
}

#[test]
fn element_assignment() {
    let src = r#"
func main() {
    [3]int a = [1, 2, 3]
    a[0] = 10
    a[1] += 2
    a[2]++
}
"#;
    assert!(check(src).is_ok());
}

#[test]
fn wrapped_constant_index_is_out_of_bounds() {
    let src = r#"
func main() -> int {
    [3]int arr = [11, 22, 33]
    int i = (2147483647 + 1) / 1073741824 - 2
    return arr[i]
}
"#;
    assert_eq!(kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn constant_index_wraps_back_into_bounds() {
    let src = r#"
func main() -> int {
    [3]int arr = [11, 22, 33]
    int i = 65536 * 65536 + 2
    return arr[i]
}
"#;
    let module = parse_str("<test>", src).expect("parse failed");
    let checked = TypeChecker::new()
        .check_module(&module)
        .expect("index 2 is in bounds");
    let Item::Fn(main) = &module.items[0] else {
        panic!("expected main");
    };
    let Some(Stmt::Return { value: Some(value), .. }) = main.body.stmts.last() else {
        panic!("expected return");
    };
    let ExprKind::Index { index, .. } = &value.kind else {
        panic!("expected index expression");
    };
    assert_eq!(checked.const_of(index.id), Some(ConstValue::Int(2)));
}
