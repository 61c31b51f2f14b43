//! btrc CLI — a thin argument parser around the pipeline entry point.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;

use btrc::pipeline::{self, CompileError, DumpStage};
use btrc::GrammarInfo;

/// Exit codes: 0 success, 1 user error, 2 compile error, 3 internal
/// compiler error.
const EXIT_USER: i32 = 1;
const EXIT_COMPILE: i32 = 2;
const EXIT_INTERNAL: i32 = 3;

#[derive(ClapParser)]
#[command(name = "btrc", about = "Transpile btrc source to C")]
struct Cli {
    /// Input .btrc file
    input: PathBuf,

    /// Output .c file (default: <input>.c)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Dump the token stream (one per line) and stop
    #[arg(long)]
    emit_tokens: bool,

    /// Dump the canonical AST and stop
    #[arg(long)]
    emit_ast: bool,

    /// Dump the IR after generation, before optimization, and stop
    #[arg(long)]
    emit_ir: bool,

    /// Dump the IR after optimization and stop
    #[arg(long)]
    emit_optimized_ir: bool,

    /// Override the bundled grammar file
    #[arg(long)]
    grammar: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap's own help/version paths exit 0; bad flags are a user
            // error.
            if e.use_stderr() {
                eprintln!("{}", e);
                process::exit(EXIT_USER);
            }
            print!("{}", e);
            process::exit(0);
        }
    };

    // Any panic past argument parsing is an internal compiler error.
    let result = std::panic::catch_unwind(|| run(&cli));
    match result {
        Ok(code) => process::exit(code),
        Err(_) => {
            eprintln!("btrc: internal compiler error (this is a bug)");
            process::exit(EXIT_INTERNAL);
        }
    }
}

fn run(cli: &Cli) -> i32 {
    let grammar = match &cli.grammar {
        Some(path) => GrammarInfo::load(path),
        None => GrammarInfo::bundled(),
    };
    let grammar = match grammar {
        Ok(g) => g,
        Err(e) => {
            eprintln!("btrc: {}", e);
            return EXIT_USER;
        }
    };

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("btrc: cannot read {}: {}", cli.input.display(), e);
            return EXIT_USER;
        }
    };

    // Textual include resolution, once per file.
    let mut included = HashSet::new();
    let source = match pipeline::resolve_includes(&source, &cli.input, &mut included) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("btrc: {}", e);
            return EXIT_USER;
        }
    };

    let filename = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| cli.input.display().to_string());

    let dump = if cli.emit_tokens {
        Some(DumpStage::Tokens)
    } else if cli.emit_ast {
        Some(DumpStage::Ast)
    } else if cli.emit_ir {
        Some(DumpStage::Ir)
    } else if cli.emit_optimized_ir {
        Some(DumpStage::OptimizedIr)
    } else {
        None
    };

    if let Some(stage) = dump {
        return match pipeline::dump_stage(&source, &filename, &grammar, stage) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => report(e),
        };
    }

    match pipeline::compile_source(&source, &filename, &grammar) {
        Ok(output) => {
            for w in &output.warnings {
                eprintln!("{}", w);
            }
            let out_path = cli
                .output
                .clone()
                .unwrap_or_else(|| cli.input.with_extension("c"));
            if let Err(e) = fs::write(&out_path, output.code) {
                eprintln!("btrc: cannot write {}: {}", out_path.display(), e);
                return EXIT_USER;
            }
            0
        }
        Err(e) => report(e),
    }
}

fn report(e: CompileError) -> i32 {
    match e {
        CompileError::Compile { rendered } => {
            eprintln!("{}", rendered);
            EXIT_COMPILE
        }
        other => {
            eprintln!("btrc: {}", other);
            EXIT_USER
        }
    }
}
