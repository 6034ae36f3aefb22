use anyhow::{Context, Result, anyhow, bail, ensure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0,
    R1,
}

impl Register {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "$0" => Ok(Register::R0),
            "$1" => Ok(Register::R1),
            _ => bail!("invalid register `{token}`, expected $0 or $1"),
        }
    }

    fn bit(self) -> u8 {
        match self {
            Register::R0 => 0,
            Register::R1 => 1,
        }
    }
}

/// Two-register ALU operations, `op $d $s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Subb,
    And,
    Or,
    Xor,
    Not,
    Cmp,
}

impl AluOp {
    fn opcode(self) -> u8 {
        match self {
            AluOp::Add => 0b001000,
            AluOp::Adc => 0b001001,
            AluOp::Sub => 0b001010,
            AluOp::Subb => 0b001011,
            AluOp::And => 0b001100,
            AluOp::Or => 0b001101,
            AluOp::Xor => 0b001110,
            AluOp::Not => 0b001111,
            AluOp::Cmp => 0b000010,
        }
    }
}

/// Single-register operations, `op $d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Asr,
    Asl,
    Ror,
    Rol,
    Inc,
    Dec,
    Cmd,
}

impl UnaryOp {
    fn opcode(self) -> u8 {
        match self {
            UnaryOp::Asr => 0b0001000,
            UnaryOp::Asl => 0b0001001,
            UnaryOp::Ror => 0b0001010,
            UnaryOp::Rol => 0b0001011,
            UnaryOp::Inc => 0b0001100,
            UnaryOp::Dec => 0b0001101,
            UnaryOp::Cmd => 0b0000010,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Sec,
    Clc,
    Call,
    Ret,
    Wait,
    Hlt,
}

/// Skip condition: carry set/clear, zero set/clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipIf {
    CarrySet,
    CarryClear,
    ZeroSet,
    ZeroClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Alu { op: AluOp, dst: Register, src: Register },
    Unary { op: UnaryOp, reg: Register },
    Control(Control),
    /// Branch back `1..=16` bytes.
    BranchBack(u8),
    Skip { when: SkipIf, count: u8 },
    LoadImmediate { reg: Register, value: u8 },
    Jump(u8),
    Load { reg: Register, addr: u8 },
    Store { reg: Register, addr: u8 },
}

impl Instruction {
    /// Parses one source line. Blank lines and comment-only lines give `None`.
    ///
    /// Everything after `#` is a comment. Mnemonics are case-insensitive.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let code = line.split('#').next().unwrap_or_default();
        let mut tokens = code.split_whitespace();
        let Some(mnemonic) = tokens.next() else {
            return Ok(None);
        };
        let operands: Vec<&str> = tokens.collect();
        let mnemonic = mnemonic.to_ascii_lowercase();

        let alu = |op| -> Result<Self> {
            let [dst, src] = expect_operands::<2>(&operands)?;
            Ok(Instruction::Alu {
                op,
                dst: Register::parse(dst)?,
                src: Register::parse(src)?,
            })
        };
        let unary = |op| -> Result<Self> {
            let [reg] = expect_operands::<1>(&operands)?;
            Ok(Instruction::Unary {
                op,
                reg: Register::parse(reg)?,
            })
        };
        let control = |c| -> Result<Self> {
            expect_operands::<0>(&operands)?;
            Ok(Instruction::Control(c))
        };
        let skip = |when| -> Result<Self> {
            let [count] = expect_operands::<1>(&operands)?;
            let count = parse_int(count)?;
            ensure!((0..4).contains(&count), "skip amount must be 0 <= x < 4, got {count}");
            Ok(Instruction::Skip {
                when,
                count: count as u8,
            })
        };
        let reg_addr = |bits| -> Result<(Register, u8)> {
            let [reg, value] = expect_operands::<2>(&operands)?;
            Ok((Register::parse(reg)?, unsigned(value, bits)?))
        };

        let instruction = match mnemonic.as_str() {
            "add" => alu(AluOp::Add)?,
            "adc" => alu(AluOp::Adc)?,
            "sub" => alu(AluOp::Sub)?,
            "subb" => alu(AluOp::Subb)?,
            "and" => alu(AluOp::And)?,
            "or" => alu(AluOp::Or)?,
            "xor" => alu(AluOp::Xor)?,
            "not" => alu(AluOp::Not)?,
            "cmp" => alu(AluOp::Cmp)?,
            "asr" => unary(UnaryOp::Asr)?,
            "asl" => unary(UnaryOp::Asl)?,
            "ror" => unary(UnaryOp::Ror)?,
            "rol" => unary(UnaryOp::Rol)?,
            "inc" => unary(UnaryOp::Inc)?,
            "dec" => unary(UnaryOp::Dec)?,
            "cmd" => unary(UnaryOp::Cmd)?,
            "sec" => control(Control::Sec)?,
            "clc" => control(Control::Clc)?,
            "call" => control(Control::Call)?,
            "ret" => control(Control::Ret)?,
            "wait" => control(Control::Wait)?,
            "hlt" => control(Control::Hlt)?,
            "brn" => {
                let [amount] = expect_operands::<1>(&operands)?;
                let amount = parse_int(amount)?;
                ensure!(
                    (-16..0).contains(&amount),
                    "branch amount must be -16 <= x < 0, got {amount}"
                );
                Instruction::BranchBack(amount.unsigned_abs() as u8)
            }
            "scs" => skip(SkipIf::CarrySet)?,
            "scc" => skip(SkipIf::CarryClear)?,
            "szs" => skip(SkipIf::ZeroSet)?,
            "szc" => skip(SkipIf::ZeroClear)?,
            "li" => {
                let (reg, value) = reg_addr(4)?;
                Instruction::LoadImmediate { reg, value }
            }
            "jmp" => {
                let [addr] = expect_operands::<1>(&operands)?;
                Instruction::Jump(unsigned(addr, 6)?)
            }
            "ldr" => {
                let (reg, addr) = reg_addr(4)?;
                Instruction::Load { reg, addr }
            }
            "str" => {
                let (reg, addr) = reg_addr(4)?;
                Instruction::Store { reg, addr }
            }
            "inp" | "out" | "mul" => bail!("`{mnemonic}` is not supported by the hardware yet"),
            _ => bail!("unknown instruction `{mnemonic}`"),
        };
        Ok(Some(instruction))
    }

    pub fn encode(self) -> u8 {
        match self {
            Instruction::Alu { op, dst, src } => op.opcode() << 2 | src.bit() << 1 | dst.bit(),
            Instruction::Unary { op, reg } => op.opcode() << 1 | reg.bit(),
            Instruction::Control(c) => match c {
                Control::Sec => 0b0000_0111,
                Control::Clc => 0b0000_0110,
                Control::Call => 0b0000_0011,
                Control::Ret => 0b0000_0010,
                Control::Wait => 0b0000_0001,
                Control::Hlt => 0b0000_0000,
            },
            Instruction::BranchBack(n) => 0b0111_0000 | (16 - n),
            Instruction::Skip { when, count } => {
                let cond = match when {
                    SkipIf::CarrySet => 0b00,
                    SkipIf::CarryClear => 0b01,
                    SkipIf::ZeroSet => 0b10,
                    SkipIf::ZeroClear => 0b11,
                };
                0b0110_0000 | cond << 2 | count
            }
            Instruction::LoadImmediate { reg, value } => 0b010 << 5 | value << 1 | reg.bit(),
            Instruction::Jump(addr) => 0b10 << 6 | addr,
            Instruction::Load { reg, addr } => 0b110 << 5 | addr << 1 | reg.bit(),
            Instruction::Store { reg, addr } => 0b111 << 5 | addr << 1 | reg.bit(),
        }
    }
}

fn expect_operands<'a, const N: usize>(operands: &[&'a str]) -> Result<[&'a str; N]> {
    <[&'a str; N]>::try_from(operands)
        .map_err(|_| anyhow!("expected {N} operand(s), got {}", operands.len()))
}

fn parse_int(token: &str) -> Result<i32> {
    token
        .parse()
        .with_context(|| format!("`{token}` is not a number"))
}

fn unsigned(token: &str, bits: u32) -> Result<u8> {
    let value = parse_int(token)?;
    let limit = 1i32 << bits;
    ensure!(
        (0..limit).contains(&value),
        "value must be 0 <= x < {limit}, got {value}"
    );
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(line: &str) -> u8 {
        Instruction::parse(line).unwrap().unwrap().encode()
    }

    #[test]
    fn register_forms() {
        assert_eq!(encode("add $0 $1"), 0b0010_0010);
        assert_eq!(encode("sub $1 $0"), 0b0010_1001);
        assert_eq!(encode("cmp $1 $1"), 0b0000_1011);
        assert_eq!(encode("dec $0"), 0b0001_1010);
        assert_eq!(encode("ROL $1"), 0b0001_0111);
        assert_eq!(encode("cmd $1"), 0b0000_0101);
    }

    #[test]
    fn control_forms() {
        assert_eq!(encode("sec"), 0b0000_0111);
        assert_eq!(encode("clc"), 0b0000_0110);
        assert_eq!(encode("call"), 0b0000_0011);
        assert_eq!(encode("hlt"), 0);
    }

    #[test]
    fn immediate_forms() {
        assert_eq!(encode("li $0 3"), 0b0100_0110);
        assert_eq!(encode("li $1 15"), 0b0101_1111);
        assert_eq!(encode("jmp 63"), 0b1011_1111);
        assert_eq!(encode("ldr $1 8"), 0b1101_0001);
        assert_eq!(encode("str $0 10"), 0b1111_0100);
    }

    #[test]
    fn branch_and_skip() {
        assert_eq!(encode("brn -9"), 0b0111_0111);
        assert_eq!(encode("brn -16"), 0b0111_0000);
        assert_eq!(encode("brn -1"), 0b0111_1111);
        assert_eq!(encode("szs 2"), 0b0110_1010);
        assert_eq!(encode("scs 1"), 0b0110_0001);
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(Instruction::parse("").unwrap(), None);
        assert_eq!(Instruction::parse("    # just a note").unwrap(), None);
        assert_eq!(encode("inc $1   # bump"), 0b0001_1001);
    }

    #[test]
    fn operand_ranges_are_checked() {
        for bad in [
            "brn 0", "brn -17", "brn 3", "szs 4", "szs -1", "li $0 16", "li $0 -1", "jmp 64",
            "ldr $0 16", "str $1 99",
        ] {
            assert!(Instruction::parse(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for bad in ["frob $0", "add $0", "add $0 $2", "hlt $0", "li $0 three", "mul $0 $1"] {
            assert!(Instruction::parse(bad).is_err(), "{bad} should fail");
        }
    }
}
