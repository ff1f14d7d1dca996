use crate::lexer::tokenize;
use crate::token::{Tok, TokKind};
use raven_ast::ast::{
    BinOp, Block, Case, EnumDecl, Expr, ExprId, ExprKind, FieldDecl, FieldInit, FnDecl, Ident,
    IncDec, Item, Lit, Module, Param, Stmt, StructDecl, TypeExpr, UnOp,
};
use raven_ast::diag::Diagnostic;
use raven_ast::span::Span;

/// Maximum nesting of blocks and expressions before the parser gives up.
pub const MAX_NESTING_DEPTH: u32 = 128;

/// Name of the direct system-call intrinsic.
pub const SYSCALL_INTRINSIC: &str = "__builtin_syscall";

/// Maximum argument count of the system-call intrinsic (number + 5 args).
pub const SYSCALL_MAX_ARGS: usize = 6;

type PResult<T> = Result<T, Diagnostic>;

pub fn parse_str(file: &str, src: &str) -> PResult<Module> {
    let toks = tokenize(src)?;
    let mut p = Parser::new(toks);
    let module = p.parse_module()?;
    log::debug!("{}: parsed {} top-level items", file, module.items.len());
    Ok(module)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    /// End offset of the last consumed token.
    prev_end: u32,
    next_id: u32,
    depth: u32,
    /// Open `(` / `[` / struct-literal braces; line breaks are insignificant
    /// while this is non-zero.
    nesting: u32,
    /// Set while parsing `if`/`while`/`for`/`switch` heads, where `Name {`
    /// starts the body rather than a struct literal.
    no_struct_lit: bool,
}

impl Parser {
    fn new(toks: Vec<Tok>) -> Self {
        Self {
            toks,
            pos: 0,
            prev_end: 0,
            next_id: 0,
            depth: 0,
            nesting: 0,
            no_struct_lit: false,
        }
    }

    fn cur(&self) -> &Tok {
        // `tokenize` always ends the stream with Eof and `bump` never moves past it.
        &self.toks[self.pos]
    }

    fn nxt(&self) -> &Tok {
        let i = (self.pos + 1).min(self.toks.len() - 1);
        &self.toks[i]
    }

    fn bump(&mut self) {
        self.prev_end = self.cur().span.end;
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur().kind) == std::mem::discriminant(k)
    }

    fn expect(&mut self, k: TokKind) -> PResult<Tok> {
        if self.at(&k) {
            let t = self.cur().clone();
            self.bump();
            Ok(t)
        } else {
            Err(self.unexpected(&k.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        Diagnostic::syntax(
            self.cur().span,
            format!("expected {}, found {}", expected, self.cur().kind.describe()),
        )
    }

    fn span_from(&self, start: u32) -> Span {
        Span {
            start,
            end: self.prev_end.max(start),
        }
    }

    fn mk_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr { id, kind, span }
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Diagnostic::syntax(
                self.cur().span,
                format!("nesting depth exceeds limit of {}", MAX_NESTING_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// A line break ends the current statement unless we are inside a group.
    fn at_line_break(&self) -> bool {
        self.nesting == 0 && self.cur().nl_before
    }

    // ======= module / items =======

    fn parse_module(&mut self) -> PResult<Module> {
        let start = self.cur().span.start;
        let mut items = Vec::new();
        while !matches!(self.cur().kind, TokKind::Eof) {
            items.push(self.parse_item()?);
        }
        Ok(Module {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_item(&mut self) -> PResult<Item> {
        match self.cur().kind {
            TokKind::KwFunc => Ok(Item::Fn(self.parse_fn_decl()?)),
            TokKind::KwStruct => Ok(Item::Struct(self.parse_struct_decl()?)),
            TokKind::KwEnum => Ok(Item::Enum(self.parse_enum_decl()?)),
            _ => Err(Diagnostic::syntax(
                self.cur().span,
                format!(
                    "expected 'func', 'struct' or 'enum' at top level, found {}",
                    self.cur().kind.describe()
                ),
            )),
        }
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        match &self.cur().kind {
            TokKind::Ident(s) => {
                let id = Ident {
                    text: s.clone(),
                    span: self.cur().span,
                };
                self.bump();
                Ok(id)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_fn_decl(&mut self) -> PResult<FnDecl> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwFunc)?;
        let name = self.parse_ident()?;

        self.expect(TokKind::LParen)?;
        self.nesting += 1;
        let params = self.parse_params()?;
        self.nesting -= 1;
        self.expect(TokKind::RParen)?;

        let ret_ty = if matches!(self.cur().kind, TokKind::Arrow) {
            self.bump();
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(FnDecl {
            name,
            params,
            ret_ty,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if matches!(self.cur().kind, TokKind::RParen) {
            return Ok(params);
        }
        loop {
            let start = self.cur().span.start;
            let ty = self.parse_type()?;
            let name = self.parse_ident()?;
            params.push(Param {
                name,
                ty,
                span: self.span_from(start),
            });
            if matches!(self.cur().kind, TokKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(params)
    }

    fn parse_struct_decl(&mut self) -> PResult<StructDecl> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwStruct)?;
        let name = self.parse_ident()?;
        self.expect(TokKind::LBrace)?;

        let mut fields = Vec::new();
        while !matches!(self.cur().kind, TokKind::RBrace) {
            let field_start = self.cur().span.start;
            let ty = self.parse_type()?;
            let field_name = self.parse_ident()?;
            fields.push(FieldDecl {
                name: field_name,
                ty,
                span: self.span_from(field_start),
            });
            self.member_separator()?;
        }
        self.expect(TokKind::RBrace)?;

        Ok(StructDecl {
            name,
            fields,
            span: self.span_from(start),
        })
    }

    fn parse_enum_decl(&mut self) -> PResult<EnumDecl> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwEnum)?;
        let name = self.parse_ident()?;
        self.expect(TokKind::LBrace)?;

        let mut variants = Vec::new();
        while !matches!(self.cur().kind, TokKind::RBrace) {
            variants.push(self.parse_ident()?);
            self.member_separator()?;
        }
        self.expect(TokKind::RBrace)?;

        Ok(EnumDecl {
            name,
            variants,
            span: self.span_from(start),
        })
    }

    /// Struct fields and enum variants are separated by `,`, `;` or a line break.
    fn member_separator(&mut self) -> PResult<()> {
        match self.cur().kind {
            TokKind::Comma | TokKind::Semicolon => {
                self.bump();
                Ok(())
            }
            TokKind::RBrace => Ok(()),
            _ if self.cur().nl_before => Ok(()),
            _ => Err(self.unexpected("',' or a new line")),
        }
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let start = self.cur().span.start;
        if matches!(self.cur().kind, TokKind::LBracket) {
            self.bump();
            let len = match self.cur().kind {
                TokKind::Int(n) => match u32::try_from(n) {
                    Ok(len) => len,
                    Err(_) => {
                        return Err(Diagnostic::syntax(
                            self.cur().span,
                            format!("array length {} is out of range", n),
                        ))
                    }
                },
                _ => return Err(self.unexpected("array length")),
            };
            self.bump();
            self.expect(TokKind::RBracket)?;
            self.enter()?;
            let elem = self.parse_type()?;
            self.leave();
            return Ok(TypeExpr::Array {
                len,
                elem: Box::new(elem),
                span: self.span_from(start),
            });
        }
        match self.cur().kind {
            TokKind::Ident(_) => Ok(TypeExpr::Named(self.parse_ident()?)),
            _ => Err(self.unexpected("type")),
        }
    }

    // ======= blocks and statements =======

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.cur().span.start;
        self.expect(TokKind::LBrace)?;
        self.enter()?;
        // A block resets grouping: line breaks end statements again.
        let saved_nesting = std::mem::replace(&mut self.nesting, 0);
        let saved_restriction = std::mem::replace(&mut self.no_struct_lit, false);

        let mut stmts = Vec::new();
        while !matches!(self.cur().kind, TokKind::RBrace | TokKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }

        self.nesting = saved_nesting;
        self.no_struct_lit = saved_restriction;
        self.leave();
        self.expect(TokKind::RBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let stmt = match self.cur().kind {
            TokKind::LBrace => Stmt::Block(self.parse_block()?),
            TokKind::KwIf => self.parse_if()?,
            TokKind::KwWhile => self.parse_while()?,
            TokKind::KwFor => self.parse_for()?,
            TokKind::KwSwitch => self.parse_switch()?,
            TokKind::KwReturn => {
                let stmt = self.parse_return()?;
                self.end_stmt()?;
                stmt
            }
            TokKind::KwBreak => {
                let span = self.expect(TokKind::KwBreak)?.span;
                self.end_stmt()?;
                Stmt::Break { span }
            }
            TokKind::KwContinue => {
                let span = self.expect(TokKind::KwContinue)?.span;
                self.end_stmt()?;
                Stmt::Continue { span }
            }
            TokKind::LBracket => {
                let stmt = self.parse_var_decl()?;
                self.end_stmt()?;
                stmt
            }
            TokKind::Ident(_) if matches!(self.nxt().kind, TokKind::Ident(_)) => {
                let stmt = self.parse_var_decl()?;
                self.end_stmt()?;
                stmt
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.end_stmt()?;
                stmt
            }
        };
        if matches!(self.cur().kind, TokKind::Semicolon) {
            self.bump();
        }
        Ok(stmt)
    }

    /// Statements end at `;`, `}`, end of input or a line break.
    fn end_stmt(&mut self) -> PResult<()> {
        match self.cur().kind {
            TokKind::Semicolon | TokKind::RBrace | TokKind::Eof => Ok(()),
            _ if self.cur().nl_before => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    /// `type name = expr`
    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        self.expect(TokKind::Eq)?;
        let value = self.parse_expr()?;
        Ok(Stmt::VarDecl {
            ty,
            name,
            value,
            span: self.span_from(start),
        })
    }

    /// Expression statement, assignment, compound assignment or `++`/`--`.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        let expr = self.parse_expr()?;

        let compound = match self.cur().kind {
            TokKind::PlusEq => Some(BinOp::Add),
            TokKind::MinusEq => Some(BinOp::Sub),
            TokKind::StarEq => Some(BinOp::Mul),
            TokKind::SlashEq => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = compound {
            self.bump();
            let value = self.parse_expr()?;
            return Ok(Stmt::CompoundAssign {
                target: expr,
                op,
                value,
                span: self.span_from(start),
            });
        }

        match self.cur().kind {
            TokKind::Eq if !self.cur().nl_before => {
                self.bump();
                self.parse_assign_chain(start, expr)
            }
            TokKind::PlusPlus | TokKind::MinusMinus if !self.cur().nl_before => {
                let op = if matches!(self.cur().kind, TokKind::PlusPlus) {
                    IncDec::Inc
                } else {
                    IncDec::Dec
                };
                self.bump();
                Ok(Stmt::IncDec {
                    target: expr,
                    op,
                    span: self.span_from(start),
                })
            }
            _ => Ok(Stmt::Expr {
                expr,
                span: self.span_from(start),
            }),
        }
    }

    /// Rest of `target = value`, where `value` may itself be assigned to.
    ///
    /// `a = b = v` becomes the block `{ b = v; a = b }`: the innermost
    /// target is stored first and each outer target reads it back.
    fn parse_assign_chain(&mut self, start: u32, target: Expr) -> PResult<Stmt> {
        let mut targets = vec![target];
        let mut value = self.parse_expr()?;
        while matches!(self.cur().kind, TokKind::Eq) && !self.cur().nl_before {
            self.bump();
            targets.push(value);
            value = self.parse_expr()?;
        }
        let span = self.span_from(start);

        let mut stmts = Vec::with_capacity(targets.len());
        while let Some(target) = targets.pop() {
            if targets.is_empty() {
                stmts.push(Stmt::Assign { target, value, span });
                break;
            }
            let read_back = self.fresh_copy(&target);
            stmts.push(Stmt::Assign { target, value, span });
            value = read_back;
        }
        if stmts.len() == 1 {
            if let Some(stmt) = stmts.pop() {
                return Ok(stmt);
            }
        }
        Ok(Stmt::Block(Block { stmts, span }))
    }

    /// Copy of `expr` with new ids, so both uses get their own type entries.
    fn fresh_copy(&mut self, expr: &Expr) -> Expr {
        let mut copy = expr.clone();
        self.renumber(&mut copy);
        copy
    }

    fn renumber(&mut self, expr: &mut Expr) {
        expr.id = ExprId(self.next_id);
        self.next_id += 1;
        match &mut expr.kind {
            ExprKind::Lit(_) | ExprKind::Var(_) => {}
            ExprKind::Array(elems)
            | ExprKind::Syscall(elems)
            | ExprKind::Call { args: elems, .. } => {
                for e in elems {
                    self.renumber(e);
                }
            }
            ExprKind::StructLit { fields, .. } => {
                for f in fields {
                    self.renumber(&mut f.value);
                }
            }
            ExprKind::Unary { expr: inner, .. }
            | ExprKind::Paren(inner)
            | ExprKind::Field { base: inner, .. } => self.renumber(inner),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Index {
                base: lhs,
                index: rhs,
            } => {
                self.renumber(lhs);
                self.renumber(rhs);
            }
        }
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwReturn)?;

        let bare = matches!(
            self.cur().kind,
            TokKind::Semicolon | TokKind::RBrace | TokKind::Eof
        ) || self.cur().nl_before;
        let value = if bare { None } else { Some(self.parse_expr()?) };

        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    /// Parse an expression in a statement head, where `{` opens the body.
    fn parse_head_expr(&mut self) -> PResult<Expr> {
        let saved = std::mem::replace(&mut self.no_struct_lit, true);
        let expr = self.parse_expr();
        self.no_struct_lit = saved;
        expr
    }

    /// `if cond { } [else { }]` or `if cond { } else if cond2 { } else { }`
    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwIf)?;

        let cond = self.parse_head_expr()?;
        let then_ = self.parse_block()?;

        let else_ = if matches!(self.cur().kind, TokKind::KwElse) {
            self.bump();
            if matches!(self.cur().kind, TokKind::KwIf) {
                self.enter()?;
                let nested = self.parse_if()?;
                self.leave();
                Some(Box::new(nested))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block()?)))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_,
            else_,
            span: self.span_from(start),
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwWhile)?;
        let cond = self.parse_head_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While {
            cond,
            body,
            span: self.span_from(start),
        })
    }

    /// `for x in arr { body }`
    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwFor)?;
        let var = self.parse_ident()?;
        self.expect(TokKind::KwIn)?;
        let iter = self.parse_head_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::ForIn {
            var,
            iter,
            body,
            span: self.span_from(start),
        })
    }

    /// `switch expr { case c: stmt ... default: stmt }`
    fn parse_switch(&mut self) -> PResult<Stmt> {
        let start = self.cur().span.start;
        self.expect(TokKind::KwSwitch)?;
        let scrutinee = self.parse_head_expr()?;
        self.expect(TokKind::LBrace)?;
        self.enter()?;
        let saved_nesting = std::mem::replace(&mut self.nesting, 0);

        let mut cases = Vec::new();
        let mut default: Option<Box<Stmt>> = None;
        loop {
            match self.cur().kind {
                TokKind::KwCase => {
                    let case_start = self.cur().span.start;
                    self.bump();
                    let value = self.parse_expr()?;
                    self.expect(TokKind::Colon)?;
                    let body = self.parse_stmt()?;
                    cases.push(Case {
                        value,
                        body,
                        span: self.span_from(case_start),
                    });
                }
                TokKind::KwDefault => {
                    let default_span = self.cur().span;
                    if default.is_some() {
                        return Err(Diagnostic::syntax(
                            default_span,
                            "switch has more than one 'default'",
                        ));
                    }
                    self.bump();
                    self.expect(TokKind::Colon)?;
                    default = Some(Box::new(self.parse_stmt()?));
                }
                TokKind::RBrace => break,
                _ => return Err(self.unexpected("'case', 'default' or '}'")),
            }
        }

        self.nesting = saved_nesting;
        self.leave();
        self.expect(TokKind::RBrace)?;
        Ok(Stmt::Switch {
            scrutinee,
            cases,
            default,
            span: self.span_from(start),
        })
    }

    // ======= expressions (precedence climbing) =======
    //
    // Precedence (low -> high):
    //   1:  ||
    //   3:  &&
    //   5:  ^
    //   7:  == !=
    //   9:  < <= > >=
    //   11: + -
    //   13: * / %
    // prefix (unary) binds tighter than all infix; we give it rbp = 100.
    // Postfix (call, index, field) binds tighter still.

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<Expr> {
        self.enter()?;
        let mut lhs = self.parse_prefix()?;

        loop {
            if self.at_line_break() {
                break;
            }
            let (op, lbp, rbp) = match self.cur().kind {
                TokKind::OrOr => (BinOp::Or, 1, 2),
                TokKind::AndAnd => (BinOp::And, 3, 4),
                TokKind::Caret => (BinOp::Xor, 5, 6),
                TokKind::EqEq => (BinOp::Eq, 7, 8),
                TokKind::BangEq => (BinOp::Ne, 7, 8),
                TokKind::Lt => (BinOp::Lt, 9, 10),
                TokKind::Le => (BinOp::Le, 9, 10),
                TokKind::Gt => (BinOp::Gt, 9, 10),
                TokKind::Ge => (BinOp::Ge, 9, 10),
                TokKind::Plus => (BinOp::Add, 11, 12),
                TokKind::Minus => (BinOp::Sub, 11, 12),
                TokKind::Star => (BinOp::Mul, 13, 14),
                TokKind::Slash => (BinOp::Div, 13, 14),
                TokKind::Percent => (BinOp::Rem, 13, 14),
                _ => break,
            };

            if lbp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr_bp(rbp)?;
            let span = lhs.span.to(rhs.span);
            lhs = self.mk_expr(
                ExprKind::Binary {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        self.leave();
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let tok_kind = self.cur().kind.clone();
        let tok_span = self.cur().span;

        let op = match tok_kind {
            TokKind::Bang => Some(UnOp::Not),
            TokKind::Minus => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let inner = self.parse_expr_bp(100)?;
            let span = tok_span.to(inner.span);
            return Ok(self.mk_expr(
                ExprKind::Unary {
                    op,
                    expr: Box::new(inner),
                },
                span,
            ));
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok_kind = self.cur().kind.clone();
        let tok_span = self.cur().span;

        match tok_kind {
            TokKind::Int(v) => {
                self.bump();
                Ok(self.mk_expr(ExprKind::Lit(Lit::Int(v)), tok_span))
            }
            TokKind::Float(v) => {
                self.bump();
                Ok(self.mk_expr(ExprKind::Lit(Lit::Float(v)), tok_span))
            }
            TokKind::Str(s) => {
                self.bump();
                Ok(self.mk_expr(ExprKind::Lit(Lit::Str(s)), tok_span))
            }
            TokKind::KwTrue => {
                self.bump();
                Ok(self.mk_expr(ExprKind::Lit(Lit::Bool(true)), tok_span))
            }
            TokKind::KwFalse => {
                self.bump();
                Ok(self.mk_expr(ExprKind::Lit(Lit::Bool(false)), tok_span))
            }

            TokKind::Ident(_) => {
                let id = self.parse_ident()?;
                let same_line = !self.cur().nl_before || self.nesting > 0;
                match self.cur().kind {
                    TokKind::LParen if same_line => self.parse_call(id),
                    TokKind::LBrace if same_line && !self.no_struct_lit => {
                        self.parse_struct_lit(id)
                    }
                    _ => {
                        let span = id.span;
                        Ok(self.mk_expr(ExprKind::Var(id), span))
                    }
                }
            }

            TokKind::LParen => {
                self.bump();
                self.nesting += 1;
                let saved = std::mem::replace(&mut self.no_struct_lit, false);
                let inner = self.parse_expr()?;
                self.no_struct_lit = saved;
                self.nesting -= 1;
                self.expect(TokKind::RParen)?;
                let span = self.span_from(tok_span.start);
                Ok(self.mk_expr(ExprKind::Paren(Box::new(inner)), span))
            }

            TokKind::LBracket => {
                self.bump();
                self.nesting += 1;
                let saved = std::mem::replace(&mut self.no_struct_lit, false);
                let elems = self.parse_comma_list(TokKind::RBracket)?;
                self.no_struct_lit = saved;
                self.nesting -= 1;
                self.expect(TokKind::RBracket)?;
                let span = self.span_from(tok_span.start);
                Ok(self.mk_expr(ExprKind::Array(elems), span))
            }

            _ => Err(self.unexpected("expression")),
        }
    }

    /// Postfix index and field access.
    fn parse_postfix(&mut self, mut lhs: Expr) -> PResult<Expr> {
        loop {
            if self.at_line_break() {
                break;
            }
            match self.cur().kind {
                TokKind::LBracket => {
                    self.bump();
                    self.nesting += 1;
                    let saved = std::mem::replace(&mut self.no_struct_lit, false);
                    let index = self.parse_expr()?;
                    self.no_struct_lit = saved;
                    self.nesting -= 1;
                    self.expect(TokKind::RBracket)?;
                    let span = self.span_from(lhs.span.start);
                    lhs = self.mk_expr(
                        ExprKind::Index {
                            base: Box::new(lhs),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokKind::Dot => {
                    self.bump();
                    let field = self.parse_ident()?;
                    let span = lhs.span.to(field.span);
                    lhs = self.mk_expr(
                        ExprKind::Field {
                            base: Box::new(lhs),
                            field,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_call(&mut self, callee: Ident) -> PResult<Expr> {
        self.expect(TokKind::LParen)?;
        self.nesting += 1;
        let saved = std::mem::replace(&mut self.no_struct_lit, false);
        let args = self.parse_comma_list(TokKind::RParen)?;
        self.no_struct_lit = saved;
        self.nesting -= 1;
        self.expect(TokKind::RParen)?;
        let span = self.span_from(callee.span.start);

        if callee.text == SYSCALL_INTRINSIC {
            if args.is_empty() || args.len() > SYSCALL_MAX_ARGS {
                return Err(Diagnostic::syntax(
                    span,
                    format!(
                        "{} takes between 1 and {} arguments, found {}",
                        SYSCALL_INTRINSIC,
                        SYSCALL_MAX_ARGS,
                        args.len()
                    ),
                ));
            }
            return Ok(self.mk_expr(ExprKind::Syscall(args), span));
        }
        Ok(self.mk_expr(ExprKind::Call { callee, args }, span))
    }

    /// `Name { field: expr, ... }`
    fn parse_struct_lit(&mut self, name: Ident) -> PResult<Expr> {
        self.expect(TokKind::LBrace)?;
        self.nesting += 1;
        let mut fields = Vec::new();
        while !matches!(self.cur().kind, TokKind::RBrace) {
            let start = self.cur().span.start;
            let field = self.parse_ident()?;
            self.expect(TokKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push(FieldInit {
                name: field,
                value,
                span: self.span_from(start),
            });
            if matches!(self.cur().kind, TokKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.nesting -= 1;
        self.expect(TokKind::RBrace)?;
        let span = self.span_from(name.span.start);
        Ok(self.mk_expr(ExprKind::StructLit { name, fields }, span))
    }

    /// Comma-separated expressions up to (not including) `close`; allows a
    /// trailing comma.
    fn parse_comma_list(&mut self, close: TokKind) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.at(&close) {
            items.push(self.parse_expr()?);
            if matches!(self.cur().kind, TokKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(items)
    }
}
