#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod lexer;
mod parser;
mod token;

pub use lexer::tokenize;
pub use parser::{parse_str, MAX_NESTING_DEPTH, SYSCALL_INTRINSIC, SYSCALL_MAX_ARGS};
pub use token::{Tok, TokKind};
