//! Whole-pipeline acceptance tests over `compile`.

use raven_ast::diag::DiagKind;
use raven_cli::{compile, Mode};

fn assert_compiles(name: &str, src: &str) {
    match compile(src, Mode::Assembly) {
        Ok(out) => {
            let asm = out.assembly.expect("assembly mode keeps the text");
            assert!(!asm.is_empty(), "{}: empty assembly", name);
        }
        Err(diags) => panic!("{}: unexpected diagnostics:\n{}", name, diags.render(name, src)),
    }
}

fn error_kinds(src: &str) -> Vec<DiagKind> {
    match compile(src, Mode::Check) {
        Ok(_) => Vec::new(),
        Err(diags) => diags.iter().map(|d| d.kind).collect(),
    }
}

#[test]
fn variables_and_literals() {
    let cases = [
        ("int", "func main() {\n    int x = 10\n    __builtin_syscall(1, 0)\n}"),
        ("f32", "func main() {\n    f32 x = 3.14\n    __builtin_syscall(1, 0)\n}"),
        ("f64", "func main() {\n    f64 x = 3.14159265\n    __builtin_syscall(1, 0)\n}"),
        ("bool", "func main() {\n    bool x = false\n    __builtin_syscall(1, 0)\n}"),
        (
            "string",
            "func main() {\n    string s = \"Hello, C²!\"\n    __builtin_syscall(1, 0)\n}",
        ),
    ];
    for (name, src) in cases {
        assert_compiles(name, src);
    }
}

#[test]
fn operators() {
    let cases = [
        ("arith", "func main() { int a = (5 + 3) * 2 - 4 }"),
        ("logical and", "func main() { bool x = true && true }"),
        ("logical or", "func main() { bool x = false || true }"),
        ("not", "func main() { bool x = !true }"),
        ("complex", "func main() { bool r = (5 > 3) && (10 < 20) || (1 == 1) }"),
        ("xor", "func main() { int x = 5 ^ 3 }"),
    ];
    for (name, src) in cases {
        assert_compiles(name, src);
    }
}

#[test]
fn arrays() {
    assert_compiles(
        "assignment",
        r#"
func main() {
    [3]int arr = [10, 20, 30]
    arr[0] = 100
    arr[1] = 200
    arr[2] = 300
    __builtin_syscall(1, 0)
}
"#,
    );
    assert_compiles(
        "2d",
        "func main() { [2][3]int matrix = [[1, 2, 3], [4, 5, 6]] }",
    );
    assert_compiles(
        "for in",
        r#"
func main() {
    [3]int arr = [1, 2, 3]
    for x in arr {
        int y = x
    }
}
"#,
    );
}

#[test]
fn array_overflow_is_one_size_error() {
    let src = "func main() {\n    [3]int test = [1, 2, 3, 4, 5]\n}";
    assert_eq!(error_kinds(src), vec![DiagKind::ArraySizeError]);
}

#[test]
fn negative_constant_index_is_rejected() {
    let src = r#"
func main() {
    [3]int arr = [5, 10, 15]
    int idx = -1
    int x = arr[idx]
}
"#;
    assert_eq!(error_kinds(src), vec![DiagKind::ArraySizeError]);
    assert_compiles("idx = 1", &src.replace("-1", "1"));
}

#[test]
fn functions_and_control_flow() {
    assert_compiles(
        "chained calls",
        r#"
func add(int a, int b) -> int {
    return a + b
}

func multiply(int a, int b) -> int {
    return a * b
}

func main() {
    int result = multiply(add(2, 3), 4)
    __builtin_syscall(1, 0)
}
"#,
    );
    assert_compiles(
        "early return",
        r#"
func check(int x) -> bool {
    if x < 0 {
        return false
    }
    return true
}

func main() {
    bool result = check(10)
}
"#,
    );
    assert_compiles(
        "while",
        "func main() {\n    int x = 0\n    while x < 10 {\n        x = x + 1\n    }\n}",
    );
    assert_compiles(
        "switch",
        r#"
func main() {
    int x = 2
    switch x {
        case 1: int y = 10
        case 2: int z = 20
        default: int w = 30
    }
}
"#,
    );
}

#[test]
fn unmatched_switch_without_default_is_accepted() {
    assert_compiles(
        "no default",
        "func main() {\n    switch 7 {\n        case 1: int a = 1\n    }\n}",
    );
}

#[test]
fn structs_and_enums() {
    assert_compiles(
        "declarations",
        r#"
struct Point {
    int x
    int y
}

enum Color {
    Red
    Green
    Blue
}

func main() {
    Point p = Point { x: 1, y: 2 }
    Color c = Color.Blue
    __builtin_syscall(1, 0)
}
"#,
    );
}

#[test]
fn bad_calls_produce_no_assembly() {
    let src = r#"
func add(int a, int b) -> int { return a + b }
func main() { int r = add(1, "two") }
"#;
    assert_eq!(error_kinds(src), vec![DiagKind::TypeError]);
    assert_eq!(
        error_kinds("func add(int a, int b) -> int { return a + b }\nfunc main() { int r = add(1) }"),
        vec![DiagKind::TypeError]
    );
}

#[test]
fn syntax_errors_stop_the_pipeline() {
    assert_eq!(error_kinds("func main( {"), vec![DiagKind::SyntaxError]);
}

#[test]
fn reserved_entry_symbol_is_a_name_error() {
    assert_eq!(
        error_kinds("func _start() { }\nfunc main() { }"),
        vec![DiagKind::NameError]
    );
}

#[test]
fn check_mode_drops_assembly() {
    let out = compile("func main() { }", Mode::Check).expect("should compile");
    assert!(out.assembly.is_none());
    assert_eq!(out.module.items.len(), 1);
}

#[test]
fn compiling_twice_is_byte_identical() {
    let src = r#"
func fib(int n) -> int {
    if n < 2 {
        return n
    }
    return fib(n - 1) + fib(n - 2)
}

func main() -> int {
    [5]int xs = [1, 2, 3, 4, 5]
    int s = 0
    for x in xs {
        s += fib(x)
    }
    return s
}
"#;
    let a = compile(src, Mode::Assembly).expect("first").assembly;
    let b = compile(src, Mode::Assembly).expect("second").assembly;
    assert!(a.is_some());
    assert_eq!(a, b);
}

#[test]
fn diagnostics_are_byte_identical_across_runs() {
    let src = r#"
struct Zeta {
    int z
}

struct Alpha {
    Missing m
}

struct Mid {
    int a
    int a
}

enum Shade {
    Light
    Light
}

struct Ring {
    Link next
}

struct Link {
    Ring back
}

func main() {
    [2]int xs = [1, 2, 3]
    int n = "text"
    bool b = undefined
    Zeta z = Zeta { z: 1.5 }
}
"#;
    let render = || match compile(src, Mode::Check) {
        Ok(_) => panic!("source has errors"),
        Err(diags) => (diags.len(), diags.render("<input>", src)),
    };
    let (count, first) = render();
    assert!(count >= 8, "expected every error reported:\n{}", first);
    for _ in 0..5 {
        assert_eq!(render().1, first);
    }
}

#[test]
fn chained_assignment_compiles() {
    assert_compiles(
        "chain",
        "func main() -> int {\n    int a = 0\n    int b = 0\n    a = b = 5\n    return a + b\n}",
    );
}
