//! End-to-end checks on the emitted assembly text

use raven_codegen::{generate, CodegenError};
use raven_parse::parse_str;
use raven_types::TypeChecker;

fn try_compile(src: &str) -> Result<String, CodegenError> {
    let module = parse_str("<test>", src).expect("parse failed");
    let checked = TypeChecker::new()
        .check_module(&module)
        .expect("check failed");
    generate(&module, &checked)
}

fn compile(src: &str) -> String {
    try_compile(src).expect("codegen failed")
}

/// Lines of function `name`, from its label up to the next global symbol.
fn body(asm: &str, name: &str) -> String {
    let header = format!("\n{}:\n", name);
    let start = asm.find(&header).expect("function not emitted") + header.len();
    asm[start..]
        .lines()
        .take_while(|l| l.starts_with("    ") || l.starts_with(".L"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn empty_main_has_entry_stub() {
    let asm = compile("func main() { }");
    assert!(asm.contains("    .text\n"));
    assert!(asm.contains("    .globl main\n"));
    assert!(asm.contains("    .globl _start\n"));
    assert!(asm.contains("_start:\n    call main\n    movl %eax, %ebx\n    movl $1, %eax\n    int $0x80\n"));
    assert!(!asm.contains(".rodata"));
}

#[test]
fn void_main_exits_with_zero() {
    let asm = compile("func main() { }");
    let main = body(&asm, "main");
    assert!(main.starts_with("    pushl %ebp\n    movl %esp, %ebp"), "{}", main);
    assert!(main.contains("movl $0, "));
    assert!(main.contains("movl %ebp, %esp\n    popl %ebp\n    ret"));
}

#[test]
fn syscall_places_arguments_in_order() {
    let asm = compile("func main() { __builtin_syscall(4, 1, 2, 3) }");
    let main = body(&asm, "main");
    let ebx = main.find(", %ebx").expect("no %ebx");
    let ecx = main.find(", %ecx").expect("no %ecx");
    let edx = main.find(", %edx").expect("no %edx");
    let trap = main.find("int $0x80").expect("no trap");
    assert!(ebx < ecx && ecx < edx && edx < trap);
    assert!(main[..trap].trim_end().ends_with(", %eax"));
}

#[test]
fn minimal_syscall_program_compiles() {
    let asm = compile("func main(){ __builtin_syscall(1,0) }");
    assert!(body(&asm, "main").contains("int $0x80"));
}

#[test]
fn strings_go_to_rodata_once() {
    let src = r#"
func main() {
    string a = "hi\n"
    string b = "hi\n"
}
"#;
    let asm = compile(src);
    assert!(asm.contains("    .section .rodata\n.str0:\n    .string \"hi\\n\"\n"));
    assert!(!asm.contains(".str1"));
    assert!(body(&asm, "main").contains("movl $.str0, "));
}

#[test]
fn non_constant_index_is_guarded() {
    let src = r#"
func get([3]int a, int i) -> int {
    return a[i]
}

func main() -> int {
    [3]int a = [1, 2, 3]
    return get(a, 1)
}
"#;
    let asm = compile(src);
    let get = body(&asm, "get");
    assert!(get.contains("cmpl $3, %eax\n    jae .Lget_bounds"), "{}", get);
    assert!(get.contains(".Lget_bounds:\n    movl $1, %eax\n    movl $134, %ebx\n    int $0x80"));
    assert!(!asm.contains(".Lmain_bounds"));
}

#[test]
fn constant_index_is_not_guarded() {
    let src = r#"
func main() -> int {
    [3]int a = [1, 2, 3]
    int i = 2
    return a[0] + a[i]
}
"#;
    let asm = compile(src);
    assert!(!body(&asm, "main").contains("jae"));
}

#[test]
fn for_in_needs_no_guard() {
    let src = r#"
func main() -> int {
    [4]int a = [1, 2, 3, 4]
    int s = 0
    for v in a {
        s += v
    }
    return s
}
"#;
    let main = body(&compile(src), "main");
    assert!(!main.contains("jae"));
    assert!(main.contains("setl %al"));
}

#[test]
fn f32_uses_single_precision() {
    let src = r#"
func main() {
    f32 x = 3.5
    f32 y = x + 1.5
}
"#;
    let asm = compile(src);
    assert!(asm.contains(".long 0x40600000"));
    let main = body(&asm, "main");
    assert!(main.contains("movss .LF0, %xmm0"));
    assert!(main.contains("addss "));
    assert!(!main.contains("sd "));
}

#[test]
fn f64_uses_double_precision() {
    let src = r#"
func half(f64 x) -> f64 {
    return x / 2.0
}

func main() {
    f64 y = half(1.5)
}
"#;
    let asm = compile(src);
    assert!(asm.contains(".quad 0x3ff8000000000000"));
    let half = body(&asm, "half");
    assert!(half.contains("divsd "));
    assert!(half.contains(", %xmm0\n    jmp .Lhalf_0"), "{}", half);
    let main = body(&asm, "main");
    assert!(main.contains("call half\n    addl $8, %esp\n    movsd %xmm0, "), "{}", main);
}

#[test]
fn integer_division_and_remainder() {
    let src = r#"
func f(int a, int b) -> int {
    return a / b + a % b
}

func main() -> int { return f(7, 2) }
"#;
    let f = body(&compile(src), "f");
    assert_eq!(f.matches("cltd\n    idivl").count(), 2);
    assert!(f.contains("movl %edx, %eax"));
}

#[test]
fn calls_are_cleaned_up_by_caller() {
    let src = r#"
func add(int a, int b) -> int { return a + b }
func main() -> int { return add(1, 2) }
"#;
    let asm = compile(src);
    assert!(body(&asm, "main").contains("call add\n    addl $8, %esp\n    movl %eax, "));
    let add = body(&asm, "add");
    assert!(add.contains("movl 8(%ebp), %eax"));
    assert!(add.contains("movl 12(%ebp), %eax"));
}

#[test]
fn structs_are_passed_by_value() {
    let src = r#"
struct Point {
    int x
    int y
}

func sum(Point p) -> int {
    return p.x + p.y
}

func main() -> int {
    Point p = Point { x: 1, y: 2 }
    return sum(p)
}
"#;
    let asm = compile(src);
    let main = body(&asm, "main");
    assert!(main.contains("subl $8, %esp"));
    assert!(main.contains("rep movsl"));
    assert!(main.contains("call sum\n    addl $8, %esp"));
    assert!(body(&asm, "sum").contains("movl 12(%ebp), %eax"));
}

#[test]
fn switch_compares_each_case() {
    let src = r#"
func pick(int x) -> int {
    int r = 0
    switch x {
        case 1: r = 10
        case 2: r = 20
        default: r = 30
    }
    return r
}

func main() -> int { return pick(2) }
"#;
    let pick = body(&compile(src), "pick");
    assert_eq!(pick.matches("sete %al").count(), 2);
    assert!(pick.contains("movl $20, "));
}

#[test]
fn output_is_deterministic() {
    let src = r#"
enum Color { Red, Green }

func main() -> int {
    string s = "a"
    f64 d = 2.5
    Color c = Color.Green
    [2][2]int m = [[1, 2], [3, 4]]
    int t = 0
    for row in m {
        for v in row {
            t += v
        }
    }
    if c == Color.Green && t > 3 {
        return 1
    }
    return 0
}
"#;
    assert_eq!(compile(src), compile(src));
}

#[test]
fn entry_symbol_cannot_be_redefined() {
    let err = try_compile("func _start() { }\nfunc main() { }").unwrap_err();
    assert_eq!(err, CodegenError::ReservedSymbol("_start".into()));
}
