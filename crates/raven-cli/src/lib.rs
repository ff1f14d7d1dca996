#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

//! Library side of the `raven` compiler driver.

pub mod pipeline;

pub use pipeline::{compile, compile_module, compile_named, Mode, Output};
