//! Abstract instruction model produced by lowering.
//!
//! Each function is a flat list of [`Inst`] over an unbounded set of virtual
//! registers. Every virtual register gets a private frame slot at emission
//! time, so values survive across labels and calls without allocation.

/// Virtual register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(pub u32);

/// Jump target, unique within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

/// Frame-resident storage: a variable, parameter or aggregate temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// Register class of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// `int`, `bool`, `string` (pointer), enum values and addresses
    I32,
    F32,
    F64,
}

impl Class {
    pub fn size(self) -> u32 {
        match self {
            Class::I32 | Class::F32 => 4,
            Class::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        !matches!(self, Class::I32)
    }
}

/// Where a local lives in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    /// Below `%ebp`, allocated by `FrameSetup`.
    Stack,
    /// Incoming argument at `offset(%ebp)`.
    Param { offset: u32 },
}

#[derive(Debug, Clone)]
pub struct LocalSlot {
    pub size: u32,
    pub kind: LocalKind,
}

/// Base of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Local(LocalId),
    /// Absolute address held in a register (from `AddrOf`).
    Ptr(VReg),
}

/// `base + offset + index`, where `index` is a byte offset computed at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub base: Base,
    pub offset: u32,
    pub index: Option<VReg>,
}

impl Addr {
    pub fn local(local: LocalId) -> Self {
        Addr {
            base: Base::Local(local),
            offset: 0,
            index: None,
        }
    }

    pub fn ptr(ptr: VReg) -> Self {
        Addr {
            base: Base::Ptr(ptr),
            offset: 0,
            index: None,
        }
    }
}

/// Runtime bounds check: `0 <= index < len`, compared unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub index: VReg,
    pub len: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i32),
    /// Index into [`Program::floats`]; the width follows the destination.
    Float(usize),
    /// Index into [`Program::strings`].
    Str(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnKind {
    Neg,
    /// Logical not of a 0/1 value.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Outgoing call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Value(VReg),
    /// Aggregate passed by value: `size` bytes copied from the address in `ptr`.
    Block { ptr: VReg, size: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    FrameSetup,
    /// Restores the caller's frame and returns; the return value is already
    /// in place.
    FrameTeardown,
    LoadConst {
        dst: VReg,
        value: Const,
    },
    LoadLocal {
        dst: VReg,
        local: LocalId,
    },
    StoreLocal {
        local: LocalId,
        src: VReg,
    },
    LoadElem {
        dst: VReg,
        addr: Addr,
        guards: Vec<Guard>,
    },
    StoreElem {
        addr: Addr,
        src: VReg,
        guards: Vec<Guard>,
    },
    AddrOf {
        dst: VReg,
        addr: Addr,
        guards: Vec<Guard>,
    },
    /// Copy `size` bytes between two addresses held in registers.
    Copy {
        dst: VReg,
        src: VReg,
        size: u32,
    },
    Binary {
        op: BinKind,
        dst: VReg,
        lhs: VReg,
        rhs: VReg,
    },
    Unary {
        op: UnKind,
        dst: VReg,
        src: VReg,
    },
    /// `dst` (always `I32`) is 1 if the comparison holds, else 0.
    Compare {
        cond: Cond,
        dst: VReg,
        lhs: VReg,
        rhs: VReg,
    },
    Branch {
        cond: VReg,
        if_true: Label,
        if_false: Label,
    },
    Jump(Label),
    Label(Label),
    Call {
        dst: Option<VReg>,
        func: String,
        args: Vec<Arg>,
    },
    /// Place the value in the return register and jump to the exit label.
    Return {
        value: Option<VReg>,
    },
    /// Raw system call: `num` in `%eax`, arguments in `%ebx`, `%ecx`, ...
    Trap {
        num: VReg,
        args: Vec<VReg>,
    },
}

impl Inst {
    pub fn guards(&self) -> &[Guard] {
        match self {
            Inst::LoadElem { guards, .. }
            | Inst::StoreElem { guards, .. }
            | Inst::AddrOf { guards, .. } => guards,
            _ => &[],
        }
    }
}

/// One lowered function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub locals: Vec<LocalSlot>,
    pub vregs: Vec<Class>,
    pub body: Vec<Inst>,
    /// Target of every `Return`; placed right before `FrameTeardown`.
    pub exit: Label,
}

impl Function {
    pub fn has_guards(&self) -> bool {
        self.body.iter().any(|i| !i.guards().is_empty())
    }
}

/// A lowered module plus its read-only data.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    pub strings: Vec<String>,
    /// Float literals in first-use order; referenced by position.
    pub floats: Vec<FloatConst>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatConst {
    F32(f32),
    F64(f64),
}
