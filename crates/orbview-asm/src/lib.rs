//! Assembler for the two-register 8-bit CPU built in redstone, and the
//! programmer that writes an assembled program into the world.
//!
//! ```text
//! 00 oooo s d   register ops        0111 nnnn    branch back 16 - n
//! 011 0 bb ii   skip ii if bb       010 nnnn d   load immediate
//! 10 aaaaaa     jump                11 x aaaa d  load (x=0) / store (x=1)
//! ```

pub mod instruction;
pub mod program;
pub mod programmer;

pub use instruction::{AluOp, Control, Instruction, Register, SkipIf, UnaryOp};
pub use program::{AssembledLine, Program};
pub use programmer::{Block, Direction, Fill, SECTION_BYTES, program_sections};

/// Fibonacci loop over RAM cells 8 and 9, counter in cell 10.
pub const FIB_PROGRAM: &str = "
li $0 3     #
str $0 10   #
li $0 1     #
str $0 8    #
str $0 9    #
ldr $0 9    # add two prev
ldr $1 8    #
add $0 $1   #
str $0 8    #
str $1 9    #
ldr $0 10   # check if this is the n-th
dec $0      #
szs 2       #
str $0 10   #
brn -9      # jmp 5 or brn -9
ldr $0 8    #
ldr $1 8    #
hlt         #
";
