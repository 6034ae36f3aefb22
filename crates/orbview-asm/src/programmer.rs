//! Turns an assembled program into `/fill` commands that lay it out as
//! redstone blocks in the world.
//!
//! Each byte is a vertical column of eight cells two blocks apart, most
//! significant bit on top at `y = 1`. Consecutive bytes sit two blocks apart
//! along the build direction. A section holds [`SECTION_BYTES`] bytes and
//! starts with a command that clears the whole area.

use anyhow::{Result, bail};
use glam::IVec3;
use std::fmt;
use std::str::FromStr;

pub const SECTION_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Air,
    Redstone,
}

impl Block {
    fn id(self) -> &'static str {
        match self {
            Block::Air => "air",
            Block::Redstone => "redstone_block",
        }
    }

    fn other(self) -> Self {
        match self {
            Block::Air => Block::Redstone,
            Block::Redstone => Block::Air,
        }
    }
}

/// A `/fill` between two positions relative to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub from: IVec3,
    pub to: IVec3,
    pub block: Block,
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = (self.from, self.to);
        write!(
            f,
            "/fill ~{}~{}~{} ~{}~{}~{} {} [] replace {}",
            a.x,
            a.y,
            a.z,
            b.x,
            b.y,
            b.z,
            self.block.id(),
            self.block.other().id()
        )
    }
}

/// Horizontal build direction, parsed from `x`, `z`, `-x`, `-z` (or both
/// axes, e.g. `xz`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub dx: i32,
    pub dz: i32,
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let sign = if s.contains('-') { -1 } else { 1 };
        let dx = i32::from(s.contains('x')) * sign;
        let dz = i32::from(s.contains('z')) * sign;
        if dx == 0 && dz == 0 {
            bail!("direction `{s}` names neither x nor z");
        }
        Ok(Self { dx, dz })
    }
}

/// Commands for one section: a clear, then one fill per run of set bits.
pub fn section_commands(section: &[u8], dir: Direction) -> Vec<Fill> {
    let (dx, dz) = (dir.dx, dir.dz);
    let mut out = vec![Fill {
        from: IVec3::new(dx, 1, dz),
        to: IVec3::new(dx * 33, -13, dz * 33),
        block: Block::Air,
    }];
    for (idx, &byte) in section.iter().enumerate() {
        let idx = idx as i32;
        let base = IVec3::new(dx + idx * 2 * dx, 1, dz + idx * 2 * dz);
        byte_commands(byte, base, &mut out);
    }
    out
}

fn byte_commands(byte: u8, top: IVec3, out: &mut Vec<Fill>) {
    let cell = |bit: i32| top - IVec3::new(0, 2 * bit, 0);
    let mut run: Option<(i32, i32)> = None;
    for bit in 0..8 {
        let set = byte >> (7 - bit) & 1 == 1;
        run = match (run, set) {
            (Some((start, _)), true) => Some((start, bit)),
            (None, true) => Some((bit, bit)),
            (Some((start, end)), false) => {
                out.push(Fill {
                    from: cell(start),
                    to: cell(end),
                    block: Block::Redstone,
                });
                None
            }
            (None, false) => None,
        };
    }
    if let Some((start, end)) = run {
        out.push(Fill {
            from: cell(start),
            to: cell(end),
            block: Block::Redstone,
        });
    }
}

/// Splits `bytes` into sections of [`SECTION_BYTES`] and builds each one.
pub fn program_sections(bytes: &[u8], dir: Direction) -> Vec<Vec<Fill>> {
    bytes
        .chunks(SECTION_BYTES)
        .map(|section| section_commands(section, dir))
        .collect()
}
