#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

mod checker;
pub mod fold;
pub mod registry;
pub mod scope;
mod types;

pub use checker::{CheckedModule, TypeChecker};
pub use fold::{ConstEnv, ConstValue};
pub use registry::{EnumDef, FieldDef, FnSig, Registry, StructDef};
pub use types::{PrimType, Type};
