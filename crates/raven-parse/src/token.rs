use raven_ast::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Eof,
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow, // -> for function return types
    // assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PlusPlus,
    MinusMinus,
    // arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // bitwise
    Caret,
    // equality
    EqEq,
    BangEq,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    // logical
    AndAnd,
    OrOr,
    Bang,
    // idents / keywords
    Ident(String),
    KwFunc,
    KwStruct,
    KwEnum,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwIn,
    KwSwitch,
    KwCase,
    KwDefault,
    KwReturn,
    KwBreak,
    KwContinue,
    KwTrue,
    KwFalse,
    // literals
    Int(i64),
    Float(f64),
    Str(String),
}

impl TokKind {
    pub fn keyword(word: &str) -> Option<TokKind> {
        let kind = match word {
            "func" => TokKind::KwFunc,
            "struct" => TokKind::KwStruct,
            "enum" => TokKind::KwEnum,
            "if" => TokKind::KwIf,
            "else" => TokKind::KwElse,
            "while" => TokKind::KwWhile,
            "for" => TokKind::KwFor,
            "in" => TokKind::KwIn,
            "switch" => TokKind::KwSwitch,
            "case" => TokKind::KwCase,
            "default" => TokKind::KwDefault,
            "return" => TokKind::KwReturn,
            "break" => TokKind::KwBreak,
            "continue" => TokKind::KwContinue,
            "true" => TokKind::KwTrue,
            "false" => TokKind::KwFalse,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable form used in syntax errors.
    pub fn describe(&self) -> String {
        let s = match self {
            TokKind::Eof => "end of file",
            TokKind::LParen => "'('",
            TokKind::RParen => "')'",
            TokKind::LBrace => "'{'",
            TokKind::RBrace => "'}'",
            TokKind::LBracket => "'['",
            TokKind::RBracket => "']'",
            TokKind::Comma => "','",
            TokKind::Colon => "':'",
            TokKind::Semicolon => "';'",
            TokKind::Dot => "'.'",
            TokKind::Arrow => "'->'",
            TokKind::Eq => "'='",
            TokKind::PlusEq => "'+='",
            TokKind::MinusEq => "'-='",
            TokKind::StarEq => "'*='",
            TokKind::SlashEq => "'/='",
            TokKind::PlusPlus => "'++'",
            TokKind::MinusMinus => "'--'",
            TokKind::Plus => "'+'",
            TokKind::Minus => "'-'",
            TokKind::Star => "'*'",
            TokKind::Slash => "'/'",
            TokKind::Percent => "'%'",
            TokKind::Caret => "'^'",
            TokKind::EqEq => "'=='",
            TokKind::BangEq => "'!='",
            TokKind::Lt => "'<'",
            TokKind::Le => "'<='",
            TokKind::Gt => "'>'",
            TokKind::Ge => "'>='",
            TokKind::AndAnd => "'&&'",
            TokKind::OrOr => "'||'",
            TokKind::Bang => "'!'",
            TokKind::Ident(name) => return format!("identifier '{}'", name),
            TokKind::KwFunc => "'func'",
            TokKind::KwStruct => "'struct'",
            TokKind::KwEnum => "'enum'",
            TokKind::KwIf => "'if'",
            TokKind::KwElse => "'else'",
            TokKind::KwWhile => "'while'",
            TokKind::KwFor => "'for'",
            TokKind::KwIn => "'in'",
            TokKind::KwSwitch => "'switch'",
            TokKind::KwCase => "'case'",
            TokKind::KwDefault => "'default'",
            TokKind::KwReturn => "'return'",
            TokKind::KwBreak => "'break'",
            TokKind::KwContinue => "'continue'",
            TokKind::KwTrue => "'true'",
            TokKind::KwFalse => "'false'",
            TokKind::Int(v) => return format!("integer {}", v),
            TokKind::Float(v) => return format!("float {}", v),
            TokKind::Str(_) => "string literal",
        };
        s.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
    /// A line break separates this token from the previous one.
    pub nl_before: bool,
}
