//! AT&T syntax serialization of a lowered [`Program`].
//!
//! Frame layout: stack locals sit below `%ebp` in `LocalId` order, followed
//! by one slot per virtual register; the total is rounded up to 16 bytes.
//! Parameters are read in place above the return address. Every instruction
//! goes through memory, with `%eax`/`%xmm0` as the working register, `%ecx`
//! for a runtime byte offset and `%edx` for a pointer base.

use crate::ir::{
    Addr, Arg, Base, BinKind, Class, Cond, Const, FloatConst, Function, Guard, Inst, Label,
    LocalId, LocalKind, Program, UnKind, VReg,
};
use crate::lower::ENTRY_SYMBOL;

/// Exit status of a program that fails a bounds guard.
pub const BOUNDS_EXIT_STATUS: u32 = 134;

/// Render `program` as a complete assembly file.
pub fn emit_program(program: &Program) -> String {
    let mut out = String::new();

    if !program.strings.is_empty() || !program.floats.is_empty() {
        out.push_str("    .section .rodata\n");
        for (i, s) in program.strings.iter().enumerate() {
            out.push_str(&format!(".str{}:\n    .string \"{}\"\n", i, escape(s)));
        }
        for (i, f) in program.floats.iter().enumerate() {
            match f {
                FloatConst::F32(v) => {
                    out.push_str(&format!("    .align 4\n.LF{}:\n    .long 0x{:08x}\n", i, v.to_bits()))
                }
                FloatConst::F64(v) => {
                    out.push_str(&format!("    .align 8\n.LF{}:\n    .quad 0x{:016x}\n", i, v.to_bits()))
                }
            }
        }
    }

    out.push_str("    .text\n");
    for func in &program.functions {
        out.push_str(&format!("    .globl {}\n", func.name));
    }
    out.push_str(&format!("    .globl {}\n", ENTRY_SYMBOL));

    for func in &program.functions {
        FnEmitter::new(func, &mut out).emit();
    }

    out.push_str(&format!("{}:\n", ENTRY_SYMBOL));
    out.push_str("    call main\n");
    out.push_str("    movl %eax, %ebx\n");
    out.push_str("    movl $1, %eax\n");
    out.push_str("    int $0x80\n");
    out
}

/// Escape a string for a `.string` directive.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b' '..=b'~' => out.push(char::from(b)),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Move mnemonic and working register for a class.
fn mov(class: Class) -> (&'static str, &'static str) {
    match class {
        Class::I32 => ("movl", "%eax"),
        Class::F32 => ("movss", "%xmm0"),
        Class::F64 => ("movsd", "%xmm0"),
    }
}

struct FnEmitter<'a> {
    func: &'a Function,
    out: &'a mut String,
    local_offsets: Vec<i64>,
    vreg_offsets: Vec<i64>,
    frame_size: u64,
}

impl<'a> FnEmitter<'a> {
    fn new(func: &'a Function, out: &'a mut String) -> Self {
        let mut depth: u64 = 0;
        let local_offsets = func
            .locals
            .iter()
            .map(|slot| match slot.kind {
                LocalKind::Param { offset } => i64::from(offset),
                LocalKind::Stack => {
                    depth += u64::from(slot.size);
                    -(depth as i64)
                }
            })
            .collect();
        let vreg_offsets = func
            .vregs
            .iter()
            .map(|class| {
                depth += u64::from(class.size());
                -(depth as i64)
            })
            .collect();
        FnEmitter {
            func,
            out,
            local_offsets,
            vreg_offsets,
            frame_size: (depth + 15) & !15,
        }
    }

    fn ins(&mut self, text: String) {
        self.out.push_str("    ");
        self.out.push_str(&text);
        self.out.push('\n');
    }

    fn label_name(&self, label: Label) -> String {
        format!(".L{}_{}", self.func.name, label.0)
    }

    fn bounds_label(&self) -> String {
        format!(".L{}_bounds", self.func.name)
    }

    fn slot(&self, v: VReg) -> String {
        format!("{}(%ebp)", self.vreg_offsets[v.0 as usize])
    }

    /// Slot of the high word of an 8-byte register.
    fn slot_hi(&self, v: VReg) -> String {
        format!("{}(%ebp)", self.vreg_offsets[v.0 as usize] + 4)
    }

    fn class(&self, v: VReg) -> Class {
        self.func.vregs[v.0 as usize]
    }

    fn local(&self, l: LocalId) -> String {
        format!("{}(%ebp)", self.local_offsets[l.0 as usize])
    }

    fn emit(mut self) {
        let func = self.func;
        self.out.push_str(&format!("{}:\n", func.name));
        for inst in &func.body {
            self.emit_inst(inst);
        }
        if self.func.has_guards() {
            let label = self.bounds_label();
            self.out.push_str(&format!("{}:\n", label));
            self.ins("movl $1, %eax".into());
            self.ins(format!("movl ${}, %ebx", BOUNDS_EXIT_STATUS));
            self.ins("int $0x80".into());
        }
    }

    fn guards(&mut self, guards: &[Guard]) {
        for g in guards {
            let idx = self.slot(g.index);
            let fail = self.bounds_label();
            self.ins(format!("movl {}, %eax", idx));
            self.ins(format!("cmpl ${}, %eax", g.len));
            self.ins(format!("jae {}", fail));
        }
    }

    /// Load the address registers for `addr` and return the memory operand.
    fn operand(&mut self, addr: &Addr) -> String {
        if let Some(index) = addr.index {
            let slot = self.slot(index);
            self.ins(format!("movl {}, %ecx", slot));
        }
        let (disp, base) = match addr.base {
            Base::Local(l) => (self.local_offsets[l.0 as usize] + i64::from(addr.offset), "%ebp"),
            Base::Ptr(p) => {
                let slot = self.slot(p);
                self.ins(format!("movl {}, %edx", slot));
                (i64::from(addr.offset), "%edx")
            }
        };
        match addr.index {
            Some(_) => format!("{}({},%ecx)", disp, base),
            None => format!("{}({})", disp, base),
        }
    }

    fn emit_inst(&mut self, inst: &Inst) {
        match inst {
            Inst::FrameSetup => {
                self.ins("pushl %ebp".into());
                self.ins("movl %esp, %ebp".into());
                if self.frame_size > 0 {
                    self.ins(format!("subl ${}, %esp", self.frame_size));
                }
            }
            Inst::FrameTeardown => {
                self.ins("movl %ebp, %esp".into());
                self.ins("popl %ebp".into());
                self.ins("ret".into());
            }
            Inst::LoadConst { dst, value } => {
                let d = self.slot(*dst);
                match value {
                    Const::Int(v) => self.ins(format!("movl ${}, {}", v, d)),
                    Const::Str(i) => self.ins(format!("movl $.str{}, {}", i, d)),
                    Const::Float(i) => {
                        let (m, r) = mov(self.class(*dst));
                        self.ins(format!("{} .LF{}, {}", m, i, r));
                        self.ins(format!("{} {}, {}", m, r, d));
                    }
                }
            }
            Inst::LoadLocal { dst, local } => {
                let (m, r) = mov(self.class(*dst));
                let src = self.local(*local);
                let d = self.slot(*dst);
                self.ins(format!("{} {}, {}", m, src, r));
                self.ins(format!("{} {}, {}", m, r, d));
            }
            Inst::StoreLocal { local, src } => {
                let (m, r) = mov(self.class(*src));
                let s = self.slot(*src);
                let d = self.local(*local);
                self.ins(format!("{} {}, {}", m, s, r));
                self.ins(format!("{} {}, {}", m, r, d));
            }
            Inst::LoadElem { dst, addr, guards } => {
                self.guards(guards);
                let (m, r) = mov(self.class(*dst));
                let op = self.operand(addr);
                let d = self.slot(*dst);
                self.ins(format!("{} {}, {}", m, op, r));
                self.ins(format!("{} {}, {}", m, r, d));
            }
            Inst::StoreElem { addr, src, guards } => {
                self.guards(guards);
                let (m, r) = mov(self.class(*src));
                let s = self.slot(*src);
                self.ins(format!("{} {}, {}", m, s, r));
                let op = self.operand(addr);
                self.ins(format!("{} {}, {}", m, r, op));
            }
            Inst::AddrOf { dst, addr, guards } => {
                self.guards(guards);
                let op = self.operand(addr);
                let d = self.slot(*dst);
                self.ins(format!("leal {}, %eax", op));
                self.ins(format!("movl %eax, {}", d));
            }
            Inst::Copy { dst, src, size } => {
                let s = self.slot(*src);
                let d = self.slot(*dst);
                self.ins(format!("movl {}, %esi", s));
                self.ins(format!("movl {}, %edi", d));
                self.ins(format!("movl ${}, %ecx", size / 4));
                self.ins("rep movsl".into());
            }
            Inst::Binary { op, dst, lhs, rhs } => self.binary(*op, *dst, *lhs, *rhs),
            Inst::Unary { op, dst, src } => self.unary(*op, *dst, *src),
            Inst::Compare {
                cond,
                dst,
                lhs,
                rhs,
            } => self.compare(*cond, *dst, *lhs, *rhs),
            Inst::Branch {
                cond,
                if_true,
                if_false,
            } => {
                let c = self.slot(*cond);
                let t = self.label_name(*if_true);
                let f = self.label_name(*if_false);
                self.ins(format!("cmpl $0, {}", c));
                self.ins(format!("jne {}", t));
                self.ins(format!("jmp {}", f));
            }
            Inst::Jump(label) => {
                let l = self.label_name(*label);
                self.ins(format!("jmp {}", l));
            }
            Inst::Label(label) => {
                let l = self.label_name(*label);
                self.out.push_str(&format!("{}:\n", l));
            }
            Inst::Call { dst, func, args } => self.call(*dst, func, args),
            Inst::Return { value } => {
                if let Some(v) = value {
                    let (m, r) = mov(self.class(*v));
                    let s = self.slot(*v);
                    self.ins(format!("{} {}, {}", m, s, r));
                }
                let exit = self.label_name(self.func.exit);
                self.ins(format!("jmp {}", exit));
            }
            Inst::Trap { num, args } => {
                const REGS: [&str; 5] = ["%ebx", "%ecx", "%edx", "%esi", "%edi"];
                for (arg, reg) in args.iter().zip(REGS) {
                    let s = self.slot(*arg);
                    self.ins(format!("movl {}, {}", s, reg));
                }
                let n = self.slot(*num);
                self.ins(format!("movl {}, %eax", n));
                self.ins("int $0x80".into());
            }
        }
    }

    fn binary(&mut self, op: BinKind, dst: VReg, lhs: VReg, rhs: VReg) {
        let class = self.class(dst);
        let (l, r, d) = (self.slot(lhs), self.slot(rhs), self.slot(dst));
        if class.is_float() {
            let (m, reg) = mov(class);
            let sfx = if class == Class::F32 { "ss" } else { "sd" };
            let name = match op {
                BinKind::Add => "add",
                BinKind::Sub => "sub",
                BinKind::Mul => "mul",
                // Rem and Xor are rejected for floats before lowering.
                BinKind::Div | BinKind::Rem | BinKind::Xor => "div",
            };
            self.ins(format!("{} {}, {}", m, l, reg));
            self.ins(format!("{}{} {}, {}", name, sfx, r, reg));
            self.ins(format!("{} {}, {}", m, reg, d));
            return;
        }

        self.ins(format!("movl {}, %eax", l));
        match op {
            BinKind::Add => self.ins(format!("addl {}, %eax", r)),
            BinKind::Sub => self.ins(format!("subl {}, %eax", r)),
            BinKind::Mul => self.ins(format!("imull {}, %eax", r)),
            BinKind::Xor => self.ins(format!("xorl {}, %eax", r)),
            BinKind::Div | BinKind::Rem => {
                self.ins("cltd".into());
                self.ins(format!("idivl {}", r));
                if op == BinKind::Rem {
                    self.ins("movl %edx, %eax".into());
                }
            }
        }
        self.ins(format!("movl %eax, {}", d));
    }

    fn unary(&mut self, op: UnKind, dst: VReg, src: VReg) {
        let class = self.class(dst);
        let (s, d) = (self.slot(src), self.slot(dst));
        match (op, class) {
            (UnKind::Neg, Class::F32) => {
                self.ins("xorps %xmm0, %xmm0".into());
                self.ins(format!("subss {}, %xmm0", s));
                self.ins(format!("movss %xmm0, {}", d));
            }
            (UnKind::Neg, Class::F64) => {
                self.ins("xorpd %xmm0, %xmm0".into());
                self.ins(format!("subsd {}, %xmm0", s));
                self.ins(format!("movsd %xmm0, {}", d));
            }
            (UnKind::Neg, _) => {
                self.ins(format!("movl {}, %eax", s));
                self.ins("negl %eax".into());
                self.ins(format!("movl %eax, {}", d));
            }
            (UnKind::Not, _) => {
                self.ins(format!("movl {}, %eax", s));
                self.ins("xorl $1, %eax".into());
                self.ins(format!("movl %eax, {}", d));
            }
        }
    }

    fn compare(&mut self, cond: Cond, dst: VReg, lhs: VReg, rhs: VReg) {
        let class = self.class(lhs);
        let (l, r, d) = (self.slot(lhs), self.slot(rhs), self.slot(dst));
        let set = match class {
            Class::I32 => {
                self.ins(format!("movl {}, %eax", l));
                self.ins(format!("cmpl {}, %eax", r));
                match cond {
                    Cond::Eq => "sete",
                    Cond::Ne => "setne",
                    Cond::Lt => "setl",
                    Cond::Le => "setle",
                    Cond::Gt => "setg",
                    Cond::Ge => "setge",
                }
            }
            Class::F32 | Class::F64 => {
                let (m, ucom) = if class == Class::F32 {
                    ("movss", "ucomiss")
                } else {
                    ("movsd", "ucomisd")
                };
                self.ins(format!("{} {}, %xmm0", m, l));
                self.ins(format!("{} {}, %xmm0", ucom, r));
                match cond {
                    Cond::Eq => "sete",
                    Cond::Ne => "setne",
                    Cond::Lt => "setb",
                    Cond::Le => "setbe",
                    Cond::Gt => "seta",
                    Cond::Ge => "setae",
                }
            }
        };
        self.ins(format!("{} %al", set));
        self.ins("movzbl %al, %eax".into());
        self.ins(format!("movl %eax, {}", d));
    }

    fn call(&mut self, dst: Option<VReg>, func: &str, args: &[Arg]) {
        let mut pushed: u64 = 0;
        for arg in args.iter().rev() {
            match *arg {
                Arg::Value(v) => {
                    if self.class(v) == Class::F64 {
                        let hi = self.slot_hi(v);
                        self.ins(format!("pushl {}", hi));
                        pushed += 4;
                    }
                    let lo = self.slot(v);
                    self.ins(format!("pushl {}", lo));
                    pushed += 4;
                }
                Arg::Block { ptr, size } => {
                    let p = self.slot(ptr);
                    self.ins(format!("subl ${}, %esp", size));
                    self.ins(format!("movl {}, %esi", p));
                    self.ins("movl %esp, %edi".into());
                    self.ins(format!("movl ${}, %ecx", size / 4));
                    self.ins("rep movsl".into());
                    pushed += u64::from(size);
                }
            }
        }
        self.ins(format!("call {}", func));
        if pushed > 0 {
            self.ins(format!("addl ${}, %esp", pushed));
        }
        if let Some(d) = dst {
            let class = self.class(d);
            let (m, r) = mov(class);
            let s = self.slot(d);
            self.ins(format!("{} {}, {}", m, r, s));
        }
    }
}
