//! Lexical scopes for the body pass.

use crate::types::Type;
use raven_ast::span::Span;
use std::collections::HashMap;

/// A local variable, parameter or loop variable.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    /// `false` only for `for … in` loop variables
    pub mutable: bool,
    /// Value of an `int` variable while it is still known at compile time
    pub constant: Option<i32>,
    pub span: Span,
}

/// Stack of name → symbol maps, innermost last.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Add a symbol to the innermost scope. On a clash in that scope the
    /// earlier declaration's span is returned and nothing is inserted.
    pub fn declare(&mut self, sym: Symbol) -> Result<(), Span> {
        let Some(top) = self.scopes.last_mut() else {
            self.scopes.push(HashMap::new());
            return self.declare(sym);
        };
        if let Some(prev) = top.get(&sym.name) {
            return Err(prev.span);
        }
        top.insert(sym.name.clone(), sym);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Forget the known value of the visible binding of `name`.
    pub fn invalidate(&mut self, name: &str) {
        if let Some(sym) = self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name)) {
            if sym.constant.take().is_some() {
                log::trace!("constant '{}' invalidated", name);
            }
        }
    }
}
