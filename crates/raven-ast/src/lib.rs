pub mod diag;

pub mod span {
    use serde::Serialize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct Span {
        pub start: u32,
        pub end: u32,
    }

    impl Span {
        pub fn new(start: u32, end: u32) -> Self {
            Self { start, end }
        }

        /// Smallest span covering both `self` and `other`.
        pub fn to(self, other: Span) -> Span {
            Span {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        }
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;

    /// One translation unit.
    #[derive(Debug, Serialize)]
    pub struct Module {
        pub items: Vec<Item>,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub enum Item {
        Fn(FnDecl),
        Struct(StructDecl),
        Enum(EnumDecl),
    }

    impl Item {
        pub fn name(&self) -> &Ident {
            match self {
                Item::Fn(d) => &d.name,
                Item::Struct(d) => &d.name,
                Item::Enum(d) => &d.name,
            }
        }
    }

    #[derive(Debug, Serialize)]
    pub struct FnDecl {
        pub name: Ident,
        pub params: Vec<Param>,
        pub ret_ty: Option<TypeExpr>,
        pub body: Block,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub struct Param {
        pub name: Ident,
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub struct StructDecl {
        pub name: Ident,
        pub fields: Vec<FieldDecl>,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub struct FieldDecl {
        pub name: Ident,
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub struct EnumDecl {
        pub name: Ident,
        pub variants: Vec<Ident>,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum TypeExpr {
        /// `int`, `f32`, `Point`, ...
        Named(Ident),
        /// `[len]elem`
        Array {
            len: u32,
            elem: Box<TypeExpr>,
            span: Span,
        },
    }

    impl TypeExpr {
        pub fn span(&self) -> Span {
            match self {
                TypeExpr::Named(id) => id.span,
                TypeExpr::Array { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Serialize)]
    pub struct Block {
        pub stmts: Vec<Stmt>,
        pub span: Span,
    }

    #[derive(Debug, Serialize)]
    pub enum Stmt {
        VarDecl {
            ty: TypeExpr,
            name: Ident,
            value: Expr,
            span: Span,
        },
        Assign {
            target: Expr,
            value: Expr,
            span: Span,
        },
        /// `target op= value`; `op` is one of Add, Sub, Mul, Div.
        CompoundAssign {
            target: Expr,
            op: BinOp,
            value: Expr,
            span: Span,
        },
        IncDec {
            target: Expr,
            op: IncDec,
            span: Span,
        },
        If {
            cond: Expr,
            then_: Block,
            /// Either a `Stmt::Block` or a nested `Stmt::If` (else-if chain).
            else_: Option<Box<Stmt>>,
            span: Span,
        },
        While {
            cond: Expr,
            body: Block,
            span: Span,
        },
        ForIn {
            var: Ident,
            iter: Expr,
            body: Block,
            span: Span,
        },
        Switch {
            scrutinee: Expr,
            cases: Vec<Case>,
            default: Option<Box<Stmt>>,
            span: Span,
        },
        Return {
            value: Option<Expr>,
            span: Span,
        },
        Break {
            span: Span,
        },
        Continue {
            span: Span,
        },
        Expr {
            expr: Expr,
            span: Span,
        },
        Block(Block),
    }

    impl Stmt {
        pub fn span(&self) -> Span {
            match self {
                Stmt::VarDecl { span, .. }
                | Stmt::Assign { span, .. }
                | Stmt::CompoundAssign { span, .. }
                | Stmt::IncDec { span, .. }
                | Stmt::If { span, .. }
                | Stmt::While { span, .. }
                | Stmt::ForIn { span, .. }
                | Stmt::Switch { span, .. }
                | Stmt::Return { span, .. }
                | Stmt::Break { span }
                | Stmt::Continue { span }
                | Stmt::Expr { span, .. } => *span,
                Stmt::Block(block) => block.span,
            }
        }
    }

    #[derive(Debug, Serialize)]
    pub struct Case {
        pub value: Expr,
        pub body: Stmt,
        pub span: Span,
    }

    /// Identity of an expression node, unique within a module.
    ///
    /// The checker keys its per-expression results (resolved types, folded
    /// constants) by this id.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct ExprId(pub u32);

    #[derive(Debug, Clone, Serialize)]
    pub struct Expr {
        pub id: ExprId,
        pub kind: ExprKind,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum ExprKind {
        Lit(Lit),
        Var(Ident),
        /// `[a, b, c]`; nested for multi-dimensional arrays.
        Array(Vec<Expr>),
        /// `Point { x: 1, y: 2 }`
        StructLit {
            name: Ident,
            fields: Vec<FieldInit>,
        },
        Unary {
            op: UnOp,
            expr: Box<Expr>,
        },
        Binary {
            lhs: Box<Expr>,
            op: BinOp,
            rhs: Box<Expr>,
        },
        Call {
            callee: Ident,
            args: Vec<Expr>,
        },
        Index {
            base: Box<Expr>,
            index: Box<Expr>,
        },
        /// `s.field`, or `Enum.Variant` when `base` names an enum.
        Field {
            base: Box<Expr>,
            field: Ident,
        },
        /// `__builtin_syscall(num, args...)`
        Syscall(Vec<Expr>),
        Paren(Box<Expr>),
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct FieldInit {
        pub name: Ident,
        pub value: Expr,
        pub span: Span,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Not,
        Neg,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum IncDec {
        Inc,
        Dec,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Lit {
        Int(i64),
        Float(f64),
        Str(String),
        Bool(bool),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // logical
        Or,
        And,
        // bitwise
        Xor,
        // equality
        Eq,
        Ne,
        // relational
        Lt,
        Le,
        Gt,
        Ge,
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
        Rem,
    }

    impl BinOp {
        pub fn symbol(self) -> &'static str {
            match self {
                BinOp::Or => "||",
                BinOp::And => "&&",
                BinOp::Xor => "^",
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Rem => "%",
            }
        }

        pub fn is_comparison(self) -> bool {
            matches!(
                self,
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
            )
        }
    }
}
