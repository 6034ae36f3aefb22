use anyhow::{Context, Result};
use orbview_asm::{Direction, FIB_PROGRAM, Program, program_sections};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Assembles `file` (or the built-in Fibonacci program) and prints the
/// listing, the redstone shape and the `/fill` commands.
pub fn run(file: Option<&Path>, echo: bool, direction: Direction) -> Result<()> {
    let source = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => FIB_PROGRAM.to_owned(),
    };
    let program = Program::assemble(&source).context("assembly failed")?;
    log::info!("assembled {} instructions", program.len());
    print!("{}", report(&program, echo, direction));
    Ok(())
}

fn report(program: &Program, echo: bool, direction: Direction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# program ({} bytes)", program.len());
    out.push_str(&program.listing(echo));

    let _ = writeln!(out, "\n# redstone shape");
    out.push_str(&program.redstone_shape());

    let sections = program_sections(&program.bytes(), direction);
    for (idx, section) in sections.iter().enumerate() {
        let _ = writeln!(out, "\n# section {}/{}", idx + 1, sections.len());
        for fill in section {
            let _ = writeln!(out, "{fill}");
        }
    }
    out
}
