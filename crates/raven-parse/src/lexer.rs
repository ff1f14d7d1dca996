use crate::token::{Tok, TokKind};
use raven_ast::diag::Diagnostic;
use raven_ast::span::Span;

/// Run the lexer to completion. The returned stream always ends with `Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Tok>, Diagnostic> {
    let mut lex = Lexer::new(src);
    let mut toks = Vec::new();
    loop {
        let tok = lex.next_tok()?;
        let done = tok.kind == TokKind::Eof;
        toks.push(tok);
        if done {
            break;
        }
    }
    log::trace!("lexed {} tokens", toks.len());
    Ok(toks)
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        if self.pos >= self.src.len() {
            None
        } else {
            let b = self.src[self.pos];
            self.pos += 1;
            Some(b)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: start as u32,
            end: self.pos as u32,
        }
    }

    /// Skips whitespace and comments; reports whether a newline was crossed.
    fn skip_ws_and_comments(&mut self) -> Result<bool, Diagnostic> {
        let mut newline = false;
        loop {
            while let Some(b) = self.peek() {
                if !(b as char).is_ascii_whitespace() {
                    break;
                }
                newline |= b == b'\n';
                self.bump();
            }
            // line comment: //
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            // block comment: /* ... */
            if self.peek() == Some(b'/') && self.peek2() == Some(b'*') {
                let start = self.pos;
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some(b'*') if self.peek() == Some(b'/') => {
                            self.bump();
                            break;
                        }
                        Some(b'\n') => newline = true,
                        Some(_) => {}
                        None => {
                            return Err(Diagnostic::lex(
                                self.span(start),
                                "unterminated block comment",
                            ))
                        }
                    }
                }
                continue;
            }
            break;
        }
        Ok(newline)
    }

    pub fn next_tok(&mut self) -> Result<Tok, Diagnostic> {
        let nl_before = self.skip_ws_and_comments()?;
        let start = self.pos;
        let tok = |kind, span| Tok {
            kind,
            span,
            nl_before,
        };
        let Some(b) = self.bump() else {
            return Ok(tok(TokKind::Eof, self.span(start)));
        };
        let c = b as char;

        // 2-char operators first
        let double = match (c, self.peek().map(|p| p as char)) {
            ('&', Some('&')) => Some(TokKind::AndAnd),
            ('|', Some('|')) => Some(TokKind::OrOr),
            ('=', Some('=')) => Some(TokKind::EqEq),
            ('!', Some('=')) => Some(TokKind::BangEq),
            ('<', Some('=')) => Some(TokKind::Le),
            ('>', Some('=')) => Some(TokKind::Ge),
            ('-', Some('>')) => Some(TokKind::Arrow),
            ('+', Some('=')) => Some(TokKind::PlusEq),
            ('-', Some('=')) => Some(TokKind::MinusEq),
            ('*', Some('=')) => Some(TokKind::StarEq),
            ('/', Some('=')) => Some(TokKind::SlashEq),
            ('+', Some('+')) => Some(TokKind::PlusPlus),
            ('-', Some('-')) => Some(TokKind::MinusMinus),
            _ => None,
        };
        if let Some(k) = double {
            self.bump();
            return Ok(tok(k, self.span(start)));
        }

        // 1-char punctuation/operators
        let single = match c {
            '(' => Some(TokKind::LParen),
            ')' => Some(TokKind::RParen),
            '{' => Some(TokKind::LBrace),
            '}' => Some(TokKind::RBrace),
            '[' => Some(TokKind::LBracket),
            ']' => Some(TokKind::RBracket),
            ',' => Some(TokKind::Comma),
            ':' => Some(TokKind::Colon),
            ';' => Some(TokKind::Semicolon),
            '.' => Some(TokKind::Dot),
            '+' => Some(TokKind::Plus),
            '-' => Some(TokKind::Minus),
            '*' => Some(TokKind::Star),
            '/' => Some(TokKind::Slash),
            '%' => Some(TokKind::Percent),
            '^' => Some(TokKind::Caret),
            '=' => Some(TokKind::Eq),
            '<' => Some(TokKind::Lt),
            '>' => Some(TokKind::Gt),
            '!' => Some(TokKind::Bang),
            _ => None,
        };
        if let Some(k) = single {
            return Ok(tok(k, self.span(start)));
        }

        if c == '"' {
            let s = self.string_body(start)?;
            return Ok(tok(TokKind::Str(s), self.span(start)));
        }

        // number (int/float)
        if c.is_ascii_digit() {
            let mut s = String::from(c);
            let mut dot = false;
            while let Some(p) = self.peek() {
                let ch = p as char;
                if ch.is_ascii_digit() {
                    s.push(ch);
                    self.bump();
                } else if ch == '.' && !dot && matches!(self.peek2(), Some(d) if d.is_ascii_digit())
                {
                    dot = true;
                    s.push('.');
                    self.bump();
                } else {
                    break;
                }
            }
            if matches!(self.peek(), Some(p) if (p as char).is_ascii_alphabetic() || p == b'_') {
                self.bump();
                return Err(Diagnostic::lex(
                    self.span(start),
                    format!("malformed number '{}{}'", s, self.src[self.pos - 1] as char),
                ));
            }
            let kind = if dot {
                s.parse().map(TokKind::Float).ok()
            } else {
                s.parse().map(TokKind::Int).ok()
            };
            return match kind {
                Some(kind) => Ok(tok(kind, self.span(start))),
                None => Err(Diagnostic::lex(
                    self.span(start),
                    format!("number literal '{}' is out of range", s),
                )),
            };
        }

        // ident / keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let mut s = String::from(c);
            while let Some(p) = self.peek() {
                let ch = p as char;
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    s.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            let kind = TokKind::keyword(&s).unwrap_or(TokKind::Ident(s));
            return Ok(tok(kind, self.span(start)));
        }

        // Report the whole UTF-8 character, not just its first byte.
        let rest = std::str::from_utf8(&self.src[start..]).unwrap_or("");
        let ch = rest.chars().next().unwrap_or(c);
        self.pos = start + ch.len_utf8().max(1);
        Err(Diagnostic::lex(
            self.span(start),
            format!("invalid character '{}'", ch.escape_default()),
        ))
    }

    /// Lex the body of a string literal after its opening quote.
    fn string_body(&mut self, start: usize) -> Result<String, Diagnostic> {
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return Err(Diagnostic::lex(
                    self.span(start),
                    "unterminated string literal",
                ));
            };
            match b {
                b'"' => break,
                b'\n' => {
                    return Err(Diagnostic::lex(
                        self.span(start),
                        "unterminated string literal",
                    ))
                }
                b'\\' => {
                    let esc_start = self.pos - 1;
                    let real = match self.bump() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => 0,
                        Some(b'"') => b'"',
                        Some(b'\\') => b'\\',
                        Some(other) => {
                            return Err(Diagnostic::lex(
                                self.span(esc_start),
                                format!("invalid escape sequence '\\{}'", other as char),
                            ))
                        }
                        None => {
                            return Err(Diagnostic::lex(
                                self.span(start),
                                "unterminated string literal",
                            ))
                        }
                    };
                    bytes.push(real);
                }
                other => bytes.push(other),
            }
        }
        // Input is a &str and escapes only produce ASCII, so this cannot fail.
        String::from_utf8(bytes)
            .map_err(|_| Diagnostic::lex(self.span(start), "string literal is not valid UTF-8"))
    }
}
