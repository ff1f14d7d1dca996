use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use raven_cli::{compile_module, Mode};
use std::path::PathBuf;
use std::process::ExitCode;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "raven")]
#[command(about = "Raven: C² compiler emitting 32-bit x86 assembly")]
struct Cli {
    /// Path to the source file
    file: PathBuf,

    /// Write assembly next to the source, with a .s extension
    #[arg(short = 'S')]
    assembly: bool,

    /// Write assembly to this path instead
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Dump the parsed AST to stdout, even if analysis later fails
    #[arg(long, value_enum, value_name = "FORMAT")]
    emit_ast: Option<Format>,

    /// Log compiler stages at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Compile one file. `Ok(false)` means the source was rejected with
/// diagnostics, which have already been printed.
fn run(cli: &Cli) -> Result<bool> {
    let path = cli.file.display().to_string();
    let src = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read '{}'", path))?;

    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }

    let mode = if cli.assembly || cli.output.is_some() {
        Mode::Assembly
    } else {
        Mode::Check
    };

    let module = match raven_parse::parse_str(&path, &src) {
        Ok(module) => module,
        Err(diag) => {
            eprintln!("{}", diag.render(&path, &src));
            return Ok(false);
        }
    };

    match cli.emit_ast {
        Some(Format::Pretty) => println!("{:#?}", module),
        Some(Format::Json) => println!("{}", serde_json::to_string_pretty(&module)?),
        None => {}
    }

    let output = match compile_module(&path, module, mode) {
        Ok(output) => output,
        Err(diags) => {
            eprint!("{}", diags.render(&path, &src));
            return Ok(false);
        }
    };

    if let Some(asm) = &output.assembly {
        let out_path = cli
            .output
            .clone()
            .unwrap_or_else(|| cli.file.with_extension("s"));
        if out_path == cli.file {
            bail!("refusing to overwrite the input file '{}'", path);
        }
        std::fs::write(&out_path, asm)
            .with_context(|| format!("failed to write '{}'", out_path.display()))?;
        log::info!("wrote {}", out_path.display());
    }

    Ok(true)
}
