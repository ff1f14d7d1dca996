#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

//! Code generation for checked Raven modules.
//!
//! [`generate`] lowers a module into the [`ir`] instruction model and then
//! serializes it as 32-bit x86 assembly in AT&T syntax.

pub mod emit;
pub mod ir;
pub mod layout;
mod lower;

pub use lower::{class_of, lower_module, ENTRY_SYMBOL};

use raven_ast::ast::Module;
use raven_types::CheckedModule;
use thiserror::Error;

/// Inconsistency between the AST and the checker's results.
///
/// A module accepted by the checker never produces one of these except for
/// [`CodegenError::FrameTooLarge`] and [`CodegenError::ReservedSymbol`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("no type recorded for expression #{0}")]
    MissingType(u32),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("stack frame of '{0}' is too large")]
    FrameTooLarge(String),
    #[error("'{0}' is reserved for the program entry point")]
    ReservedSymbol(String),
    #[error("internal codegen error: {0}")]
    Internal(String),
}

/// Compile a checked module to assembly text.
///
/// The output depends only on `module` and `checked`, so compiling the same
/// source twice yields identical text.
pub fn generate(module: &Module, checked: &CheckedModule) -> Result<String, CodegenError> {
    let program = lower_module(module, checked)?;
    let asm = emit::emit_program(&program);
    log::debug!(
        "emitted {} function(s), {} string(s), {} float(s), {} bytes of assembly",
        program.functions.len(),
        program.strings.len(),
        program.floats.len(),
        asm.len()
    );
    Ok(asm)
}
