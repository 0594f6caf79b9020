use std::path::PathBuf;
use std::process;

use clap::Args;
use kernelgen::bundle::KernelBundle;

use super::{fail, load_statement, resolve_options};

#[derive(Args)]
pub struct BuildArgs {
    /// Input statement (.json)
    pub input: PathBuf,
    /// Output file (default: <input>.cl, or <input>.kernel.json with --bundle)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Kernel function name
    #[arg(long)]
    pub name: Option<String>,
    /// Loop index variable
    #[arg(long)]
    pub index: Option<String>,
    /// Options file (default: nearest kernelgen.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Write a JSON bundle with argument bindings instead of bare source
    #[arg(long)]
    pub bundle: bool,
}

pub fn cmd_build(args: BuildArgs) {
    let BuildArgs {
        input,
        output,
        name,
        index,
        config,
        bundle,
    } = args;

    let statement = load_statement(&input);
    let mut options = resolve_options(&input, config.as_ref());
    if let Some(name) = name {
        options.kernel_name = name;
    }
    if let Some(index) = index {
        options.index_variable = index;
    }

    let kernel = match kernelgen::generate_kernel(&statement, &options) {
        Ok(k) => k,
        Err(e) => fail(&input, e),
    };

    let (text, default_output) = if bundle {
        let encoded = KernelBundle::new(&statement, kernel, &options.size_argument)
            .and_then(|b| b.to_json());
        match encoded {
            Ok(json) => (json, input.with_extension("kernel.json")),
            Err(e) => {
                eprintln!("error: cannot encode bundle: {}", e);
                process::exit(1);
            }
        }
    } else {
        (kernel.source, input.with_extension("cl"))
    };

    let out_path = output.unwrap_or(default_output);
    if let Err(e) = std::fs::write(&out_path, &text) {
        eprintln!("error: cannot write '{}': {}", out_path.display(), e);
        process::exit(1);
    }
    eprintln!("Compiled -> {}", out_path.display());
}
