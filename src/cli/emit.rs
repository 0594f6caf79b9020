use std::path::PathBuf;

use clap::Args;

use super::{fail, load_statement};

#[derive(Args)]
pub struct EmitArgs {
    /// Input statement (.json)
    pub input: PathBuf,
    /// Index expression substituted into element accesses
    #[arg(long, default_value = "i")]
    pub index: String,
}

/// Print the statement's body expression at the given index.
pub fn cmd_emit(args: EmitArgs) {
    let statement = load_statement(&args.input);
    match kernelgen::compile_expression(&statement, &args.index) {
        Ok((_, body)) => println!("{};", body),
        Err(e) => fail(&args.input, e),
    }
}
