mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use tsw::compile;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.files.is_empty() {
        eprintln!("tswc: no input files");
        std::process::exit(1);
    }

    let program = compile::compile_files(&cli.files, cli.target.to_target(), cli.pretty)?;

    if cli.print_elements {
        let mut names: Vec<&String> = program.elements.keys().collect();
        names.sort();
        for name in names {
            if let Some(element) = program.element_by_name(name) {
                println!("{name}: {}", element.kind().token());
            }
        }
    }
    if cli.print_exports {
        let mut names: Vec<&String> = program.exports.keys().collect();
        names.sort();
        for name in names {
            let element = &program[program.exports[name]];
            println!("{name}: {} ({})", element.kind().token(), element.internal_name());
        }
    }

    let error_count = if cli.quiet {
        program.error_count()
    } else {
        compile::report_diagnostics(&program, cli.pretty)
    };
    if error_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}
