use std::path::PathBuf;

use clap::Args;

use super::{fail, load_statement, resolve_options};

#[derive(Args)]
pub struct CheckArgs {
    /// Input statement (.json)
    pub input: PathBuf,
    /// Options file (default: nearest kernelgen.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Validate a statement and run both passes without writing output.
pub fn cmd_check(args: CheckArgs) {
    let statement = load_statement(&args.input);
    let options = resolve_options(&args.input, args.config.as_ref());
    match kernelgen::generate_kernel(&statement, &options) {
        Ok(kernel) => eprintln!(
            "OK: {} ({} nodes, {} arguments)",
            args.input.display(),
            statement.len(),
            kernel.arguments.len()
        ),
        Err(e) => fail(&args.input, e),
    }
}
