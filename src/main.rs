mod cli;

use clap::{Parser, Subcommand};

use cli::build::BuildArgs;
use cli::check::CheckArgs;
use cli::emit::EmitArgs;
use cli::prototype::PrototypeArgs;

#[derive(Parser)]
#[command(
    name = "kernelgen",
    version,
    about = "Compile statement trees into OpenCL kernel source"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a complete kernel from a statement
    Build(BuildArgs),
    /// Print the kernel argument declarations
    Prototype(PrototypeArgs),
    /// Print the body expression at an index
    Emit(EmitArgs),
    /// Validate a statement without writing output
    Check(CheckArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => cli::build::cmd_build(args),
        Command::Prototype(args) => cli::prototype::cmd_prototype(args),
        Command::Emit(args) => cli::emit::cmd_emit(args),
        Command::Check(args) => cli::check::cmd_check(args),
    }
}
