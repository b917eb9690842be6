//! Source loading and diagnostic reporting for the CLI driver.

use anyhow::{Context, Result};

use crate::compiler::diagnostics::Diagnostic;
use crate::compiler::program::{Program, Target};
use crate::parse;

/// Derives a file's internal path: separators normalized, leading `./` and
/// the `.ts` extension stripped.
pub fn internal_path_of(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.strip_prefix("./").unwrap_or(&normalized);
    let trimmed = trimmed.strip_suffix(".ts").unwrap_or(trimmed);
    trimmed.to_string()
}

/// Reads, parses and binds the given files into a program. Parse errors are
/// printed immediately and the offending file is skipped; binding proceeds
/// over the files that parsed.
pub fn compile_files(paths: &[String], target: Target, pretty: bool) -> Result<Program> {
    let mut program = Program::new();
    for path in paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{path}'"))?;
        let internal_path = internal_path_of(path);
        match parse::parse_source(&internal_path, &text) {
            Ok(source) => program.add_source(source),
            Err(errors) => {
                for error in errors {
                    print_parse_error(path, &text, &error, pretty);
                }
            }
        }
    }
    program.initialize(target);
    Ok(program)
}

// Line start positions for error reporting
pub fn compute_line_map(text: &str) -> Vec<usize> {
    let mut positions = vec![0];
    for (i, c) in text.char_indices() {
        if c == '\n' {
            positions.push(i + 1);
        }
    }
    positions
}

/// One-based line and character of a byte offset.
fn line_and_character(line_map: &[usize], offset: usize) -> (usize, usize) {
    let line = line_map.partition_point(|&start| start <= offset);
    let start = line_map[line.saturating_sub(1)];
    (line, offset - start + 1)
}

fn print_parse_error(path: &str, text: &str, error: &chumsky::error::Rich<'_, char>, pretty: bool) {
    let line_map = compute_line_map(text);
    let (line, character) = line_and_character(&line_map, error.span().start);
    let color_start = if pretty { "\x1b[31m" } else { "" };
    let color_end = if pretty { "\x1b[0m" } else { "" };
    println!("{color_start}{path}({line},{character}): error: {error}{color_end}");
}

/// Prints every diagnostic and returns the error count.
pub fn report_diagnostics(program: &Program, pretty: bool) -> usize {
    let mut error_count = 0;
    for diagnostic in &program.diagnostics {
        if diagnostic.is_error() {
            error_count += 1;
        }
        print_diagnostic(program, diagnostic, pretty);
    }
    if error_count == 0 {
        println!("Compilation completed successfully.");
    } else {
        println!("Found {error_count} error(s).");
    }
    error_count
}

pub fn print_diagnostic(program: &Program, diagnostic: &Diagnostic, pretty: bool) {
    let color_start = if pretty { "\x1b[31m" } else { "" };
    let color_end = if pretty { "\x1b[0m" } else { "" };
    let location = program
        .sources
        .iter()
        .find(|source| source.internal_path.as_ref() == diagnostic.file.as_ref())
        .map(|source| {
            let line_map = compute_line_map(&source.text);
            line_and_character(&line_map, diagnostic.start as usize)
        });
    match location {
        Some((line, character)) => println!(
            "{color_start}{}({line},{character}): error TS{}: {}{color_end}",
            diagnostic.file,
            diagnostic.code.code(),
            diagnostic.message
        ),
        None => println!(
            "{color_start}error TS{}: {}{color_end}",
            diagnostic.code.code(),
            diagnostic.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_path_of() {
        assert_eq!(internal_path_of("./src/main.ts"), "src/main");
        assert_eq!(internal_path_of("main.ts"), "main");
        assert_eq!(internal_path_of("lib\\util.ts"), "lib/util");
    }

    #[test]
    fn test_line_and_character() {
        let map = compute_line_map("ab\ncd\n");
        assert_eq!(line_and_character(&map, 0), (1, 1));
        assert_eq!(line_and_character(&map, 1), (1, 2));
        assert_eq!(line_and_character(&map, 3), (2, 1));
        assert_eq!(line_and_character(&map, 4), (2, 2));
    }
}
