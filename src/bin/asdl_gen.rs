//! Offline generator: ASDL → Rust node definitions.
//!
//! ```text
//! cargo run --bin asdl-gen -- spec/ast.asdl | rustfmt > src/ast/nodes.rs
//! ```

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use btrc::asdl;

#[derive(Parser)]
#[command(name = "asdl-gen", about = "Generate Rust AST node definitions from an ASDL file")]
struct Cli {
    /// Path to the ASDL specification
    input: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("asdl-gen: cannot read {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };
    match asdl::parse(&source) {
        Ok(module) => print!("{}", asdl::generate_rust(&module)),
        Err(e) => {
            eprintln!("asdl-gen: {}", e);
            process::exit(1);
        }
    }
}
