//! Lowering of a checked module into the abstract instruction model.
//!
//! Scalars (`int`, `bool`, `string`, enums, floats) travel in virtual
//! registers. Arrays and structs stay in frame locals and are handled as
//! places: a base, a constant offset and an optional runtime byte offset,
//! plus the bounds guards that must pass before the place is touched.

use crate::ir::{
    Addr, Arg, Base, BinKind, Class, Cond, Const, FloatConst, Function, Guard, Inst, Label,
    LocalId, LocalKind, LocalSlot, Program, UnKind, VReg,
};
use crate::layout;
use crate::CodegenError;
use raven_ast::ast::{BinOp, Block, Case, Expr, ExprKind, FnDecl, IncDec, Item, Lit, Module, Stmt, UnOp};
use raven_types::{CheckedModule, ConstValue, PrimType, Type};
use std::collections::HashMap;

type LResult<T> = Result<T, CodegenError>;

/// Symbol the program entry stub is emitted under.
pub const ENTRY_SYMBOL: &str = "_start";

/// Upper bound on the bytes one frame may hold.
const MAX_FRAME_BYTES: u64 = 1 << 30;

/// Lower every function of `module`.
pub fn lower_module(module: &Module, checked: &CheckedModule) -> LResult<Program> {
    let mut pool = Pool::default();
    let mut functions = Vec::new();
    for item in &module.items {
        let Item::Fn(decl) = item else { continue };
        if decl.name.text == ENTRY_SYMBOL {
            return Err(CodegenError::ReservedSymbol(decl.name.text.clone()));
        }
        let func = FnLowerer::new(checked, &mut pool, decl)?.lower(decl)?;
        log::debug!(
            "lowered '{}': {} instruction(s), {} vreg(s), {} local(s)",
            func.name,
            func.body.len(),
            func.vregs.len(),
            func.locals.len()
        );
        functions.push(func);
    }
    Ok(Program {
        functions,
        strings: pool.strings,
        floats: pool.floats,
    })
}

/// Register class of a scalar type; `None` for aggregates and `void`.
pub fn class_of(ty: &Type) -> Option<Class> {
    match ty {
        Type::Prim(PrimType::F32) => Some(Class::F32),
        Type::Prim(PrimType::F64) => Some(Class::F64),
        Type::Prim(PrimType::Void) => None,
        Type::Prim(_) | Type::Enum(_) => Some(Class::I32),
        Type::Array { .. } | Type::Struct(_) | Type::Error => None,
    }
}

/// Read-only data shared by all functions.
#[derive(Default)]
struct Pool {
    strings: Vec<String>,
    floats: Vec<FloatConst>,
}

impl Pool {
    fn string(&mut self, s: &str) -> usize {
        if let Some(i) = self.strings.iter().position(|x| x == s) {
            return i;
        }
        self.strings.push(s.to_string());
        self.strings.len() - 1
    }

    fn float(&mut self, c: FloatConst) -> usize {
        let same = |a: &FloatConst| match (a, &c) {
            (FloatConst::F32(x), FloatConst::F32(y)) => x.to_bits() == y.to_bits(),
            (FloatConst::F64(x), FloatConst::F64(y)) => x.to_bits() == y.to_bits(),
            _ => false,
        };
        if let Some(i) = self.floats.iter().position(same) {
            return i;
        }
        self.floats.push(c);
        self.floats.len() - 1
    }
}

/// An addressable location and the guards protecting it.
#[derive(Debug, Clone)]
struct Place {
    addr: Addr,
    guards: Vec<Guard>,
}

impl Place {
    fn local(local: LocalId) -> Self {
        Place {
            addr: Addr::local(local),
            guards: Vec::new(),
        }
    }

    fn is_whole_local(&self) -> Option<LocalId> {
        match self.addr {
            Addr {
                base: Base::Local(l),
                offset: 0,
                index: None,
            } if self.guards.is_empty() => Some(l),
            _ => None,
        }
    }
}

struct LoopTargets {
    cont: Label,
    brk: Label,
}

struct FnLowerer<'a> {
    checked: &'a CheckedModule,
    pool: &'a mut Pool,
    name: String,
    ret: Type,
    is_main: bool,
    locals: Vec<LocalSlot>,
    vregs: Vec<Class>,
    body: Vec<Inst>,
    next_label: u32,
    scopes: Vec<HashMap<String, LocalId>>,
    loops: Vec<LoopTargets>,
    exit: Label,
    frame_bytes: u64,
}

impl<'a> FnLowerer<'a> {
    fn new(checked: &'a CheckedModule, pool: &'a mut Pool, decl: &FnDecl) -> LResult<Self> {
        let sig = checked
            .registry
            .fn_sig(&decl.name.text)
            .ok_or_else(|| CodegenError::UnknownFunction(decl.name.text.clone()))?;
        let mut this = FnLowerer {
            checked,
            pool,
            name: decl.name.text.clone(),
            ret: sig.ret.clone(),
            is_main: decl.name.text == "main",
            locals: Vec::new(),
            vregs: Vec::new(),
            body: Vec::new(),
            next_label: 0,
            scopes: vec![HashMap::new()],
            loops: Vec::new(),
            exit: Label(0),
            frame_bytes: 0,
        };
        this.exit = this.new_label();

        // cdecl: the first argument sits just above the saved %ebp and
        // return address.
        let mut offset = 8u32;
        for (name, ty) in &sig.params {
            let size = this.size_of(ty)?;
            let local = this.add_local(size, LocalKind::Param { offset })?;
            offset = offset
                .checked_add(size)
                .ok_or_else(|| CodegenError::FrameTooLarge(this.name.clone()))?;
            this.bind(name, local);
        }
        Ok(this)
    }

    fn lower(mut self, decl: &FnDecl) -> LResult<Function> {
        self.push(Inst::FrameSetup);
        for stmt in &decl.body.stmts {
            self.lower_stmt(stmt)?;
        }

        // Falling off the end returns 0 from value-returning functions.
        let value = match class_of(&self.ret) {
            Some(class) => Some(self.zero(class)?),
            None if self.is_main => Some(self.const_int(0)?),
            None => None,
        };
        self.push(Inst::Return { value });
        self.push(Inst::Label(self.exit));
        self.push(Inst::FrameTeardown);

        Ok(Function {
            name: self.name,
            locals: self.locals,
            vregs: self.vregs,
            body: self.body,
            exit: self.exit,
        })
    }

    // ----- bookkeeping -------------------------------------------------

    fn push(&mut self, inst: Inst) {
        self.body.push(inst);
    }

    fn new_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn grow_frame(&mut self, bytes: u32) -> LResult<()> {
        self.frame_bytes += u64::from(bytes);
        if self.frame_bytes > MAX_FRAME_BYTES {
            return Err(CodegenError::FrameTooLarge(self.name.clone()));
        }
        Ok(())
    }

    fn new_vreg(&mut self, class: Class) -> LResult<VReg> {
        self.grow_frame(class.size())?;
        let id = u32::try_from(self.vregs.len())
            .map_err(|_| CodegenError::FrameTooLarge(self.name.clone()))?;
        self.vregs.push(class);
        Ok(VReg(id))
    }

    fn add_local(&mut self, size: u32, kind: LocalKind) -> LResult<LocalId> {
        if kind == LocalKind::Stack {
            self.grow_frame(size)?;
        }
        let id = u32::try_from(self.locals.len())
            .map_err(|_| CodegenError::FrameTooLarge(self.name.clone()))?;
        self.locals.push(LocalSlot { size, kind });
        Ok(LocalId(id))
    }

    fn bind(&mut self, name: &str, local: LocalId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), local);
        }
    }

    fn lookup(&self, name: &str) -> LResult<LocalId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .copied()
            .ok_or_else(|| CodegenError::UnknownVariable(name.to_string()))
    }

    fn ty(&self, expr: &Expr) -> LResult<Type> {
        self.checked
            .type_of(expr.id)
            .cloned()
            .ok_or(CodegenError::MissingType(expr.id.0))
    }

    fn size_of(&self, ty: &Type) -> LResult<u32> {
        layout::size_of(ty, &self.checked.registry)
            .ok_or_else(|| CodegenError::FrameTooLarge(self.name.clone()))
    }

    fn scalar_class(&self, ty: &Type) -> LResult<Class> {
        class_of(ty).ok_or_else(|| internal(format!("expected a scalar value, found {}", ty)))
    }

    fn const_int(&mut self, v: i32) -> LResult<VReg> {
        let dst = self.new_vreg(Class::I32)?;
        self.push(Inst::LoadConst {
            dst,
            value: Const::Int(v),
        });
        Ok(dst)
    }

    fn const_float(&mut self, class: Class, v: f64) -> LResult<VReg> {
        let idx = match class {
            Class::F32 => self.pool.float(FloatConst::F32(v as f32)),
            _ => self.pool.float(FloatConst::F64(v)),
        };
        let dst = self.new_vreg(class)?;
        self.push(Inst::LoadConst {
            dst,
            value: Const::Float(idx),
        });
        Ok(dst)
    }

    fn zero(&mut self, class: Class) -> LResult<VReg> {
        match class {
            Class::I32 => self.const_int(0),
            _ => self.const_float(class, 0.0),
        }
    }

    fn one(&mut self, class: Class) -> LResult<VReg> {
        match class {
            Class::I32 => self.const_int(1),
            _ => self.const_float(class, 1.0),
        }
    }

    fn binary(&mut self, op: BinKind, class: Class, lhs: VReg, rhs: VReg) -> LResult<VReg> {
        let dst = self.new_vreg(class)?;
        self.push(Inst::Binary { op, dst, lhs, rhs });
        Ok(dst)
    }

    /// Byte offset of element `index` for elements of `stride` bytes.
    fn scale(&mut self, index: VReg, stride: u32) -> LResult<VReg> {
        if stride == 1 {
            return Ok(index);
        }
        let stride = i32::try_from(stride).map_err(|_| internal("element too large"))?;
        let k = self.const_int(stride)?;
        self.binary(BinKind::Mul, Class::I32, index, k)
    }

    fn load(&mut self, place: &Place, class: Class) -> LResult<VReg> {
        let dst = self.new_vreg(class)?;
        match place.is_whole_local() {
            Some(local) => self.push(Inst::LoadLocal { dst, local }),
            None => self.push(Inst::LoadElem {
                dst,
                addr: place.addr,
                guards: place.guards.clone(),
            }),
        }
        Ok(dst)
    }

    fn store(&mut self, place: Place, src: VReg) {
        match place.is_whole_local() {
            Some(local) => self.push(Inst::StoreLocal { local, src }),
            None => self.push(Inst::StoreElem {
                addr: place.addr,
                src,
                guards: place.guards,
            }),
        }
    }

    fn addr_of(&mut self, place: Place) -> LResult<VReg> {
        let dst = self.new_vreg(Class::I32)?;
        self.push(Inst::AddrOf {
            dst,
            addr: place.addr,
            guards: place.guards,
        });
        Ok(dst)
    }

    /// Evaluate `value` into `place`, copying aggregates byte-wise.
    fn assign(&mut self, place: Place, ty: &Type, value: &Expr) -> LResult<()> {
        if class_of(ty).is_some() {
            let v = self.lower_expr(value)?;
            self.store(place, v);
            return Ok(());
        }
        let size = self.size_of(ty)?;
        let src_place = self.lower_place(value)?;
        let src = self.addr_of(src_place)?;
        let dst = self.addr_of(place)?;
        self.push(Inst::Copy { dst, src, size });
        Ok(())
    }

    // ----- statements --------------------------------------------------

    fn lower_block(&mut self, block: &Block) -> LResult<()> {
        self.scopes.push(HashMap::new());
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn lower_scoped(&mut self, stmt: &Stmt) -> LResult<()> {
        self.scopes.push(HashMap::new());
        self.lower_stmt(stmt)?;
        self.scopes.pop();
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> LResult<()> {
        match stmt {
            Stmt::VarDecl {
                ty, name, value, ..
            } => {
                let vty = self
                    .checked
                    .registry
                    .resolve(ty)
                    .map_err(|d| internal(d.message))?;
                let size = self.size_of(&vty)?;
                let local = self.add_local(size, LocalKind::Stack)?;
                // The new name is visible only after its initializer.
                self.assign(Place::local(local), &vty, value)?;
                self.bind(&name.text, local);
            }
            Stmt::Assign { target, value, .. } => {
                let ty = self.ty(target)?;
                let place = self.lower_place(target)?;
                self.assign(place, &ty, value)?;
            }
            Stmt::CompoundAssign {
                target, op, value, ..
            } => {
                let class = self.scalar_class(&self.ty(target)?)?;
                let place = self.lower_place(target)?;
                let cur = self.load(&place, class)?;
                let rhs = self.lower_expr(value)?;
                let result = self.binary(bin_kind(*op)?, class, cur, rhs)?;
                self.store_checked(place, result);
            }
            Stmt::IncDec { target, op, .. } => {
                let class = self.scalar_class(&self.ty(target)?)?;
                let place = self.lower_place(target)?;
                let cur = self.load(&place, class)?;
                let one = self.one(class)?;
                let kind = match op {
                    IncDec::Inc => BinKind::Add,
                    IncDec::Dec => BinKind::Sub,
                };
                let result = self.binary(kind, class, cur, one)?;
                self.store_checked(place, result);
            }
            Stmt::If {
                cond, then_, else_, ..
            } => {
                let c = self.lower_expr(cond)?;
                let then_l = self.new_label();
                let else_l = self.new_label();
                let end = self.new_label();
                self.push(Inst::Branch {
                    cond: c,
                    if_true: then_l,
                    if_false: else_l,
                });
                self.push(Inst::Label(then_l));
                self.lower_block(then_)?;
                self.push(Inst::Jump(end));
                self.push(Inst::Label(else_l));
                if let Some(else_) = else_ {
                    self.lower_stmt(else_)?;
                }
                self.push(Inst::Label(end));
            }
            Stmt::While { cond, body, .. } => {
                let head = self.new_label();
                let body_l = self.new_label();
                let end = self.new_label();
                self.push(Inst::Label(head));
                let c = self.lower_expr(cond)?;
                self.push(Inst::Branch {
                    cond: c,
                    if_true: body_l,
                    if_false: end,
                });
                self.push(Inst::Label(body_l));
                self.loops.push(LoopTargets {
                    cont: head,
                    brk: end,
                });
                self.lower_block(body)?;
                self.loops.pop();
                self.push(Inst::Jump(head));
                self.push(Inst::Label(end));
            }
            Stmt::ForIn {
                var, iter, body, ..
            } => self.lower_for_in(&var.text, iter, body)?,
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                ..
            } => self.lower_switch(scrutinee, cases, default.as_deref())?,
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(e) => Some(self.lower_expr(e)?),
                    None if self.is_main => Some(self.const_int(0)?),
                    None => None,
                };
                self.push(Inst::Return { value });
            }
            Stmt::Break { .. } => {
                let target = self.loops.last().map(|l| l.brk);
                let target = target.ok_or_else(|| internal("'break' outside of a loop"))?;
                self.push(Inst::Jump(target));
            }
            Stmt::Continue { .. } => {
                let target = self.loops.last().map(|l| l.cont);
                let target = target.ok_or_else(|| internal("'continue' outside of a loop"))?;
                self.push(Inst::Jump(target));
            }
            Stmt::Expr { expr, .. } => self.lower_effect(expr)?,
            Stmt::Block(block) => self.lower_block(block)?,
        }
        Ok(())
    }

    /// Store back into a place whose guards already ran on the load.
    fn store_checked(&mut self, place: Place, src: VReg) {
        self.store(
            Place {
                addr: place.addr,
                guards: Vec::new(),
            },
            src,
        );
    }

    fn lower_for_in(&mut self, var: &str, iter: &Expr, body: &Block) -> LResult<()> {
        let (elem, len) = match self.ty(iter)? {
            Type::Array { elem, len } => (*elem, len),
            other => return Err(internal(format!("cannot iterate over {}", other))),
        };
        let len = i32::try_from(len).map_err(|_| internal("array too long to iterate"))?;
        let stride = self.size_of(&elem)?;

        // The iterable is located (and its own guards checked) once.
        let place = self.lower_place(iter)?;
        let base = self.addr_of(place)?;
        let counter = self.add_local(4, LocalKind::Stack)?;
        let zero = self.const_int(0)?;
        self.push(Inst::StoreLocal {
            local: counter,
            src: zero,
        });

        let head = self.new_label();
        let body_l = self.new_label();
        let step = self.new_label();
        let end = self.new_label();

        self.push(Inst::Label(head));
        let i = self.new_vreg(Class::I32)?;
        self.push(Inst::LoadLocal {
            dst: i,
            local: counter,
        });
        let n = self.const_int(len)?;
        let more = self.new_vreg(Class::I32)?;
        self.push(Inst::Compare {
            cond: Cond::Lt,
            dst: more,
            lhs: i,
            rhs: n,
        });
        self.push(Inst::Branch {
            cond: more,
            if_true: body_l,
            if_false: end,
        });
        self.push(Inst::Label(body_l));

        self.scopes.push(HashMap::new());
        let var_local = self.add_local(stride, LocalKind::Stack)?;
        let offset = self.scale(i, stride)?;
        let elem_addr = Addr {
            base: Base::Ptr(base),
            offset: 0,
            index: Some(offset),
        };
        match class_of(&elem) {
            Some(class) => {
                let v = self.new_vreg(class)?;
                self.push(Inst::LoadElem {
                    dst: v,
                    addr: elem_addr,
                    guards: Vec::new(),
                });
                self.push(Inst::StoreLocal {
                    local: var_local,
                    src: v,
                });
            }
            None => {
                let src = self.new_vreg(Class::I32)?;
                self.push(Inst::AddrOf {
                    dst: src,
                    addr: elem_addr,
                    guards: Vec::new(),
                });
                let dst = self.addr_of(Place::local(var_local))?;
                self.push(Inst::Copy {
                    dst,
                    src,
                    size: stride,
                });
            }
        }
        self.bind(var, var_local);

        self.loops.push(LoopTargets {
            cont: step,
            brk: end,
        });
        self.lower_block(body)?;
        self.loops.pop();
        self.scopes.pop();

        self.push(Inst::Label(step));
        let cur = self.new_vreg(Class::I32)?;
        self.push(Inst::LoadLocal {
            dst: cur,
            local: counter,
        });
        let one = self.const_int(1)?;
        let next = self.binary(BinKind::Add, Class::I32, cur, one)?;
        self.push(Inst::StoreLocal {
            local: counter,
            src: next,
        });
        self.push(Inst::Jump(head));
        self.push(Inst::Label(end));
        Ok(())
    }

    fn lower_switch(
        &mut self,
        scrutinee: &Expr,
        cases: &[Case],
        default: Option<&Stmt>,
    ) -> LResult<()> {
        let value = self.lower_expr(scrutinee)?;
        let end = self.new_label();

        let mut targets = Vec::with_capacity(cases.len());
        for case in cases {
            let k = match self.checked.const_of(case.value.id) {
                Some(ConstValue::Int(v)) => v,
                Some(ConstValue::Bool(b)) => i32::from(b),
                _ => return Err(internal("case value was not folded to an integer")),
            };
            let kv = self.const_int(k)?;
            let hit = self.new_vreg(Class::I32)?;
            self.push(Inst::Compare {
                cond: Cond::Eq,
                dst: hit,
                lhs: value,
                rhs: kv,
            });
            let target = self.new_label();
            let next = self.new_label();
            self.push(Inst::Branch {
                cond: hit,
                if_true: target,
                if_false: next,
            });
            self.push(Inst::Label(next));
            targets.push(target);
        }

        let default_l = match default {
            Some(_) => self.new_label(),
            None => end,
        };
        self.push(Inst::Jump(default_l));

        for (case, target) in cases.iter().zip(targets) {
            self.push(Inst::Label(target));
            self.lower_scoped(&case.body)?;
            self.push(Inst::Jump(end));
        }
        if let Some(default) = default {
            self.push(Inst::Label(default_l));
            self.lower_scoped(default)?;
        }
        self.push(Inst::Label(end));
        Ok(())
    }

    // ----- expressions -------------------------------------------------

    /// Evaluate an expression statement for its side effects.
    fn lower_effect(&mut self, expr: &Expr) -> LResult<()> {
        match &expr.kind {
            ExprKind::Syscall(args) => {
                let mut regs = Vec::with_capacity(args.len());
                for arg in args {
                    regs.push(self.lower_expr(arg)?);
                }
                if regs.is_empty() {
                    return Err(internal("syscall without a number"));
                }
                let num = regs.remove(0);
                self.push(Inst::Trap { num, args: regs });
            }
            ExprKind::Call { callee, args } => {
                self.lower_call(&callee.text, args)?;
            }
            ExprKind::Paren(inner) => self.lower_effect(inner)?,
            _ => {
                if class_of(&self.ty(expr)?).is_some() {
                    self.lower_expr(expr)?;
                } else {
                    // still evaluate any index guards
                    let place = self.lower_place(expr)?;
                    if !place.guards.is_empty() {
                        self.addr_of(place)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_expr(&mut self, expr: &Expr) -> LResult<VReg> {
        if let ExprKind::Field { .. } = expr.kind {
            if let Some(ConstValue::Int(v)) = self.checked.const_of(expr.id) {
                return self.const_int(v);
            }
        }

        let ty = self.ty(expr)?;
        let class = self.scalar_class(&ty)?;
        match &expr.kind {
            ExprKind::Lit(Lit::Int(v)) => self.const_int(*v as i32),
            ExprKind::Lit(Lit::Float(v)) => self.const_float(class, *v),
            ExprKind::Lit(Lit::Str(s)) => {
                let idx = self.pool.string(s);
                let dst = self.new_vreg(Class::I32)?;
                self.push(Inst::LoadConst {
                    dst,
                    value: Const::Str(idx),
                });
                Ok(dst)
            }
            ExprKind::Lit(Lit::Bool(b)) => self.const_int(i32::from(*b)),
            ExprKind::Var(id) => {
                let local = self.lookup(&id.text)?;
                self.load(&Place::local(local), class)
            }
            ExprKind::Paren(inner) => self.lower_expr(inner),
            ExprKind::Unary { op, expr: inner } => {
                let src = self.lower_expr(inner)?;
                let dst = self.new_vreg(class)?;
                let op = match op {
                    UnOp::Neg => UnKind::Neg,
                    UnOp::Not => UnKind::Not,
                };
                self.push(Inst::Unary { op, dst, src });
                Ok(dst)
            }
            ExprKind::Binary { lhs, op, rhs } => match op {
                BinOp::And | BinOp::Or => self.lower_logical(*op, lhs, rhs),
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    let l = self.lower_expr(lhs)?;
                    let r = self.lower_expr(rhs)?;
                    let dst = self.new_vreg(Class::I32)?;
                    self.push(Inst::Compare {
                        cond: cond_of(*op)?,
                        dst,
                        lhs: l,
                        rhs: r,
                    });
                    Ok(dst)
                }
                _ => {
                    let l = self.lower_expr(lhs)?;
                    let r = self.lower_expr(rhs)?;
                    self.binary(bin_kind(*op)?, class, l, r)
                }
            },
            ExprKind::Call { callee, args } => self
                .lower_call(&callee.text, args)?
                .ok_or_else(|| internal(format!("'{}' returns no value", callee.text))),
            ExprKind::Index { .. } | ExprKind::Field { .. } => {
                let place = self.lower_place(expr)?;
                self.load(&place, class)
            }
            ExprKind::Syscall(_) | ExprKind::Array(_) | ExprKind::StructLit { .. } => {
                Err(internal("expression has no scalar value"))
            }
        }
    }

    /// `&&` / `||` with short-circuit evaluation.
    fn lower_logical(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> LResult<VReg> {
        let result = self.add_local(4, LocalKind::Stack)?;
        let l = self.lower_expr(lhs)?;
        self.push(Inst::StoreLocal {
            local: result,
            src: l,
        });
        let rhs_l = self.new_label();
        let end = self.new_label();
        let (if_true, if_false) = match op {
            BinOp::And => (rhs_l, end),
            _ => (end, rhs_l),
        };
        self.push(Inst::Branch {
            cond: l,
            if_true,
            if_false,
        });
        self.push(Inst::Label(rhs_l));
        let r = self.lower_expr(rhs)?;
        self.push(Inst::StoreLocal {
            local: result,
            src: r,
        });
        self.push(Inst::Label(end));
        let dst = self.new_vreg(Class::I32)?;
        self.push(Inst::LoadLocal { dst, local: result });
        Ok(dst)
    }

    fn lower_call(&mut self, name: &str, args: &[Expr]) -> LResult<Option<VReg>> {
        let checked = self.checked;
        let sig = checked
            .registry
            .fn_sig(name)
            .ok_or_else(|| CodegenError::UnknownFunction(name.to_string()))?;

        let mut lowered = Vec::with_capacity(args.len());
        for (arg, (_, pty)) in args.iter().zip(&sig.params) {
            if class_of(pty).is_some() {
                lowered.push(Arg::Value(self.lower_expr(arg)?));
            } else {
                let size = self.size_of(pty)?;
                let place = self.lower_place(arg)?;
                let ptr = self.addr_of(place)?;
                lowered.push(Arg::Block { ptr, size });
            }
        }

        let dst = match class_of(&sig.ret) {
            Some(class) => Some(self.new_vreg(class)?),
            None => None,
        };
        self.push(Inst::Call {
            dst,
            func: name.to_string(),
            args: lowered,
        });
        Ok(dst)
    }

    fn lower_place(&mut self, expr: &Expr) -> LResult<Place> {
        match &expr.kind {
            ExprKind::Var(id) => Ok(Place::local(self.lookup(&id.text)?)),
            ExprKind::Paren(inner) => self.lower_place(inner),
            ExprKind::Index { base, index } => {
                let (elem, len) = match self.ty(base)? {
                    Type::Array { elem, len } => (*elem, len),
                    other => return Err(internal(format!("cannot index into {}", other))),
                };
                let stride = self.size_of(&elem)?;
                let mut place = self.lower_place(base)?;
                match self.checked.const_of(index.id).and_then(ConstValue::as_int) {
                    Some(i) => {
                        let offset = u32::try_from(i)
                            .ok()
                            .and_then(|i| i.checked_mul(stride))
                            .and_then(|o| o.checked_add(place.addr.offset))
                            .ok_or_else(|| internal("constant index out of range"))?;
                        place.addr.offset = offset;
                    }
                    None => {
                        let iv = self.lower_expr(index)?;
                        place.guards.push(Guard { index: iv, len });
                        let scaled = self.scale(iv, stride)?;
                        place.addr.index = Some(match place.addr.index {
                            None => scaled,
                            Some(prev) => self.binary(BinKind::Add, Class::I32, prev, scaled)?,
                        });
                    }
                }
                Ok(place)
            }
            ExprKind::Field { base, field } => {
                let Type::Struct(name) = self.ty(base)? else {
                    return Err(internal(format!("no field '{}' to address", field.text)));
                };
                let (offset, _) = layout::field_offset(&name, &field.text, &self.checked.registry)
                    .ok_or_else(|| internal(format!("unknown field '{}.{}'", name, field.text)))?;
                let mut place = self.lower_place(base)?;
                place.addr.offset = place
                    .addr
                    .offset
                    .checked_add(offset)
                    .ok_or_else(|| CodegenError::FrameTooLarge(self.name.clone()))?;
                Ok(place)
            }
            ExprKind::Array(elems) => {
                let ty = self.ty(expr)?;
                let Type::Array { elem, .. } = &ty else {
                    return Err(internal("array literal without array type"));
                };
                let stride = self.size_of(elem)?;
                let tmp = self.add_local(self.size_of(&ty)?, LocalKind::Stack)?;
                let mut offset = 0u32;
                for e in elems {
                    let place = Place {
                        addr: Addr {
                            base: Base::Local(tmp),
                            offset,
                            index: None,
                        },
                        guards: Vec::new(),
                    };
                    self.assign(place, elem, e)?;
                    offset = offset.saturating_add(stride);
                }
                Ok(Place::local(tmp))
            }
            ExprKind::StructLit { name, fields } => {
                let ty = Type::Struct(name.text.clone());
                let tmp = self.add_local(self.size_of(&ty)?, LocalKind::Stack)?;
                for init in fields {
                    let (offset, fty) =
                        layout::field_offset(&name.text, &init.name.text, &self.checked.registry)
                            .ok_or_else(|| {
                                internal(format!("unknown field '{}.{}'", name.text, init.name.text))
                            })?;
                    let place = Place {
                        addr: Addr {
                            base: Base::Local(tmp),
                            offset,
                            index: None,
                        },
                        guards: Vec::new(),
                    };
                    self.assign(place, &fty, &init.value)?;
                }
                Ok(Place::local(tmp))
            }
            ExprKind::Lit(_)
            | ExprKind::Unary { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Call { .. }
            | ExprKind::Syscall(_) => Err(internal("expression is not addressable")),
        }
    }
}

fn internal(msg: impl Into<String>) -> CodegenError {
    CodegenError::Internal(msg.into())
}

fn bin_kind(op: BinOp) -> LResult<BinKind> {
    Ok(match op {
        BinOp::Add => BinKind::Add,
        BinOp::Sub => BinKind::Sub,
        BinOp::Mul => BinKind::Mul,
        BinOp::Div => BinKind::Div,
        BinOp::Rem => BinKind::Rem,
        BinOp::Xor => BinKind::Xor,
        other => return Err(internal(format!("'{}' is not arithmetic", other.symbol()))),
    })
}

fn cond_of(op: BinOp) -> LResult<Cond> {
    Ok(match op {
        BinOp::Eq => Cond::Eq,
        BinOp::Ne => Cond::Ne,
        BinOp::Lt => Cond::Lt,
        BinOp::Le => Cond::Le,
        BinOp::Gt => Cond::Gt,
        BinOp::Ge => Cond::Ge,
        other => return Err(internal(format!("'{}' is not a comparison", other.symbol()))),
    })
}
