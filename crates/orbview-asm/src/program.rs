use crate::instruction::Instruction;
use anyhow::{Context, Result};
use std::fmt::Write;

/// Bytes shown side by side in one block of [`Program::redstone_shape`].
pub const SHAPE_COLUMNS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub source: String,
    pub instruction: Instruction,
    pub byte: u8,
}

/// An assembled program: one byte per instruction, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    lines: Vec<AssembledLine>,
}

impl Program {
    pub fn assemble(source: &str) -> Result<Self> {
        let mut lines = Vec::new();
        for (idx, text) in source.lines().enumerate() {
            let parsed = Instruction::parse(text)
                .with_context(|| format!("line {}: `{}`", idx + 1, text.trim()))?;
            if let Some(instruction) = parsed {
                lines.push(AssembledLine {
                    line: idx + 1,
                    source: text.trim().to_owned(),
                    instruction,
                    byte: instruction.encode(),
                });
            }
        }
        Ok(Self { lines })
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lines.iter().map(|l| l.byte).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// One `bbbbbbbb` row per instruction, optionally followed by its source.
    pub fn listing(&self, echo_source: bool) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if echo_source {
                let _ = writeln!(out, "{:08b}  {}", line.byte, line.source);
            } else {
                let _ = writeln!(out, "{:08b}", line.byte);
            }
        }
        out
    }

    /// Bits as they are laid out in the world: each instruction is a column,
    /// most significant bit on top, `X` for a set bit and `_` for a clear
    /// one. Columns come in blocks of [`SHAPE_COLUMNS`] separated by a blank
    /// line.
    pub fn redstone_shape(&self) -> String {
        let bytes = self.bytes();
        let mut blocks = Vec::new();
        for chunk in bytes.chunks(SHAPE_COLUMNS) {
            let mut block = String::new();
            for bit in (0..8u32).rev() {
                for &byte in chunk {
                    block.push_str(if byte >> bit & 1 == 1 { "X " } else { "_ " });
                }
                block.push('\n');
            }
            blocks.push(block);
        }
        blocks.join("\n")
    }
}
