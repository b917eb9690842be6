use clap::{Parser, ValueEnum};

use tsw::compiler::program::Target;

/// The TypeScript-subset to WebAssembly compiler
#[derive(Parser)]
#[command(name = "tswc")]
#[command(version)]
#[command(about = "The TypeScript-subset to WebAssembly compiler...in Rust!", long_about = None)]
pub struct Cli {
    /// Input files to compile
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Compilation target, deciding pointer width.
    #[arg(short = 't', long = "target", value_enum, default_value_t = TargetArg::Wasm32)]
    pub target: TargetArg,

    /// Print the bound element directory.
    #[arg(long = "printElements")]
    pub print_elements: bool,

    /// Print the per-file export directory.
    #[arg(long = "printExports")]
    pub print_exports: bool,

    /// Enable color and formatting in the compiler's output to make errors easier to read.
    #[arg(long = "pretty", default_value_t = true)]
    pub pretty: bool,

    /// Do not print diagnostics.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    #[value(name = "wasm32")]
    Wasm32,
    #[value(name = "wasm64")]
    Wasm64,
}

impl TargetArg {
    pub fn to_target(self) -> Target {
        match self {
            TargetArg::Wasm32 => Target::Wasm32,
            TargetArg::Wasm64 => Target::Wasm64,
        }
    }
}
