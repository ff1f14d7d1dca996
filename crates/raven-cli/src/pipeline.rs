//! Source text to assembly, one translation unit at a time.
//!
//! `Lexing → Parsing → Analyzing → CodeGen`. Parsing stops at the first
//! error; analysis reports every error it finds and code generation only
//! runs on a unit with no diagnostics.

use raven_ast::ast::Module;
use raven_ast::diag::{Diagnostic, Diagnostics};
use raven_codegen::CodegenError;
use raven_parse::parse_str;
use raven_types::TypeChecker;

/// What the caller wants back from [`compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Keep the generated assembly text.
    #[default]
    Assembly,
    /// Run every stage but drop the assembly.
    Check,
}

/// Result of a successful compilation.
#[derive(Debug)]
pub struct Output {
    /// The parsed translation unit.
    pub module: Module,
    /// Assembly text; `None` in [`Mode::Check`].
    pub assembly: Option<String>,
}

/// Compile `source` to 32-bit x86 assembly.
pub fn compile(source: &str, mode: Mode) -> Result<Output, Diagnostics> {
    compile_named("<input>", source, mode)
}

/// Like [`compile`], with `path` used for log messages.
pub fn compile_named(path: &str, source: &str, mode: Mode) -> Result<Output, Diagnostics> {
    let module = parse_str(path, source)?;
    compile_module(path, module, mode)
}

/// Analyze and generate code for an already parsed unit.
pub fn compile_module(path: &str, module: Module, mode: Mode) -> Result<Output, Diagnostics> {
    let checked = TypeChecker::new().check_module(&module).map_err(|diags| {
        log::debug!("{}: rejected with {} diagnostic(s)", path, diags.len());
        diags
    })?;

    let assembly =
        raven_codegen::generate(&module, &checked).map_err(|e| codegen_diagnostic(&module, e))?;
    log::debug!("{}: generated {} bytes of assembly", path, assembly.len());

    let assembly = match mode {
        Mode::Assembly => Some(assembly),
        Mode::Check => None,
    };
    Ok(Output { module, assembly })
}

/// Report a code generation failure as a diagnostic on the unit.
fn codegen_diagnostic(module: &Module, err: CodegenError) -> Diagnostics {
    let message = err.to_string();
    let diag = match &err {
        CodegenError::ReservedSymbol(name) => {
            let span = module
                .items
                .iter()
                .map(|item| item.name())
                .find(|id| id.text == *name)
                .map_or(module.span, |id| id.span);
            Diagnostic::name(span, message)
        }
        CodegenError::FrameTooLarge(_) => Diagnostic::array_size(module.span, message),
        _ => {
            log::error!("code generation failed on a checked module: {}", err);
            Diagnostic::type_(module.span, message)
        }
    };
    diag.into()
}
