use std::path::PathBuf;

use clap::Args;

use super::{fail, load_statement};

#[derive(Args)]
pub struct PrototypeArgs {
    /// Input statement (.json)
    pub input: PathBuf,
}

/// Print the kernel argument declarations, one per line.
pub fn cmd_prototype(args: PrototypeArgs) {
    let statement = load_statement(&args.input);
    if let Err(e) = statement.validate() {
        fail(&args.input, e);
    }
    let prototype = match kernelgen::build_prototype(&statement, statement.root_key()) {
        Ok(p) => p,
        Err(e) => fail(&args.input, e),
    };
    for declaration in prototype.declarations() {
        println!("{}", declaration);
    }
}
