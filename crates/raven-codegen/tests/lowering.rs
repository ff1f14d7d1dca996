//! Shape of the lowered instruction stream

use raven_codegen::ir::{Arg, Function, Inst, Program};
use raven_codegen::lower_module;
use raven_parse::parse_str;
use raven_types::TypeChecker;

fn lower(src: &str) -> Program {
    let module = parse_str("<test>", src).expect("parse failed");
    let checked = TypeChecker::new()
        .check_module(&module)
        .expect("check failed");
    lower_module(&module, &checked).expect("lowering failed")
}

fn func<'p>(program: &'p Program, name: &str) -> &'p Function {
    program
        .functions
        .iter()
        .find(|f| f.name == name)
        .expect("no such function")
}

fn count(f: &Function, pred: impl Fn(&Inst) -> bool) -> usize {
    f.body.iter().filter(|i| pred(i)).count()
}

#[test]
fn every_function_is_framed() {
    let program = lower("func helper() { }\nfunc main() { helper() }");
    for f in &program.functions {
        assert_eq!(f.body.first(), Some(&Inst::FrameSetup));
        assert_eq!(f.body.last(), Some(&Inst::FrameTeardown));
        assert!(f.body.contains(&Inst::Label(f.exit)));
    }
}

#[test]
fn nested_dynamic_index_carries_one_guard_per_dimension() {
    let src = r#"
func at([2][3]int m, int i, int j) -> int {
    return m[i][j]
}

func main() -> int {
    [2][3]int m = [[1, 2, 3], [4, 5, 6]]
    return at(m, 1, 2)
}
"#;
    let program = lower(src);
    let at = func(&program, "at");
    let lens: Vec<u32> = at
        .body
        .iter()
        .flat_map(|i| i.guards().iter().map(|g| g.len))
        .collect();
    assert_eq!(lens, vec![2, 3]);
    assert!(!func(&program, "main").has_guards());
}

#[test]
fn mixed_constant_and_dynamic_index() {
    let src = r#"
func at([2][3]int m, int j) -> int {
    return m[1][j]
}

func main() -> int {
    [2][3]int m = [[1, 2, 3], [4, 5, 6]]
    return at(m, 0)
}
"#;
    let program = lower(src);
    let at = func(&program, "at");
    let guarded: Vec<&Inst> = at.body.iter().filter(|i| !i.guards().is_empty()).collect();
    assert_eq!(guarded.len(), 1);
    match guarded[0] {
        Inst::LoadElem { addr, guards, .. } => {
            // row 1 of [3]int starts 12 bytes in
            assert_eq!(addr.offset, 12);
            assert!(addr.index.is_some());
            assert_eq!(guards[0].len, 3);
        }
        other => panic!("expected an element load, got {:?}", other),
    }
}

#[test]
fn logical_operators_short_circuit() {
    let src = r#"
func main() -> int {
    int x = 2
    bool b = x > 1 && x < 5
    bool c = x < 0 || x == 2
    return 0
}
"#;
    let main = func(&lower(src), "main").clone();
    assert_eq!(count(&main, |i| matches!(i, Inst::Branch { .. })), 2);
}

#[test]
fn switch_without_default_jumps_to_end() {
    let src = r#"
func main() {
    int x = 5
    switch x {
        case 1: x = 2
        case 2: x = 3
    }
}
"#;
    let program = lower(src);
    let main = func(&program, "main");
    assert_eq!(count(main, |i| matches!(i, Inst::Compare { .. })), 2);
    assert_eq!(count(main, |i| matches!(i, Inst::Branch { .. })), 2);
}

#[test]
fn syscall_is_a_single_trap() {
    let program = lower("func main() { __builtin_syscall(1, 0) }");
    let main = func(&program, "main");
    let traps: Vec<&Inst> = main
        .body
        .iter()
        .filter(|i| matches!(i, Inst::Trap { .. }))
        .collect();
    assert_eq!(traps.len(), 1);
    if let Inst::Trap { args, .. } = traps[0] {
        assert_eq!(args.len(), 1);
    }
}

#[test]
fn aggregate_arguments_are_blocks() {
    let src = r#"
struct Pair { int a
 f64 b }

func first(Pair p) -> int { return p.a }

func main() -> int {
    Pair p = Pair { a: 1, b: 2.5 }
    return first(p)
}
"#;
    let program = lower(src);
    let call = func(&program, "main")
        .body
        .iter()
        .find_map(|i| match i {
            Inst::Call { args, .. } => Some(args.clone()),
            _ => None,
        })
        .expect("no call");
    assert!(matches!(call.as_slice(), [Arg::Block { size: 12, .. }]));
}

#[test]
fn strings_and_floats_are_pooled() {
    let src = r#"
func main() {
    string a = "x"
    string b = "y"
    string c = "x"
    f32 f = 1.5
    f64 d = 1.5
}
"#;
    let program = lower(src);
    assert_eq!(program.strings, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(program.floats.len(), 2);
}
