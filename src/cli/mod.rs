pub mod build;
pub mod check;
pub mod emit;
pub mod prototype;

use std::path::{Path, PathBuf};
use std::process;

use kernelgen::{CodegenOptions, Statement};

/// Read and decode a statement JSON file, exiting on failure.
pub fn load_statement(input: &Path) -> Statement {
    let text = match std::fs::read_to_string(input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(stmt) => stmt,
        Err(e) => {
            eprintln!("error: invalid statement in '{}': {}", input.display(), e);
            process::exit(1);
        }
    }
}

/// Resolve codegen options for an input file.
///
/// An explicit `--config` wins; otherwise `kernelgen.toml` is searched for
/// from the input's directory upward. Without either, defaults apply.
pub fn resolve_options(input: &Path, config: Option<&PathBuf>) -> CodegenOptions {
    let path = match config {
        Some(path) => Some(path.clone()),
        None => CodegenOptions::find(input.parent().unwrap_or(Path::new("."))),
    };
    let Some(path) = path else {
        return CodegenOptions::default();
    };
    match CodegenOptions::load(&path) {
        Ok(options) => {
            log::info!("using options from {}", path.display());
            options
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Print a codegen error and exit.
pub fn fail(input: &Path, error: kernelgen::CodegenError) -> ! {
    eprintln!("error: {}: {}", input.display(), error);
    process::exit(1);
}
