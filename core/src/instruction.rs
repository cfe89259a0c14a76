use crate::opcode::Opcode;
use crate::operations::*;
use crate::state::{Keypad, State};

/// Executes a single instruction, producing the next State
pub type Instruction = fn(op: &dyn Opcode, state: &State, keys: &Keypad) -> State;

/// Selects the correct Instruction for a given Opcode
///
/// Dispatch is on the family nibble first; families 0x0, 0x8, 0xE and 0xF then pick
/// an operation from their low byte or low nibble. Anything unrecognised is a `nop`.
pub fn from_op(op: &dyn Opcode) -> Instruction {
    let (family, _, y, n) = op.nibbles();
    match family {
        0x0 => match op.addr() {
            0x0E0 => clr,
            0x0EE => rts,
            _ => sys,
        },
        0x1 => jump,
        0x2 => call,
        0x3 => ske,
        0x4 => skne,
        0x5 if n == 0x0 => skre,
        0x6 => load,
        0x7 => add,
        0x8 => alu(n),
        0x9 if n == 0x0 => skrne,
        0xA => loadi,
        0xB => jumpi,
        0xC => rand,
        0xD => draw,
        0xE => match (y, n) {
            (0x9, 0xE) => skpr,
            (0xA, 0x1) => skup,
            _ => nop,
        },
        0xF => match op.kk() {
            0x07 => moved,
            0x0A => keyd,
            0x15 => loads,
            0x18 => ld,
            0x1E => addi,
            0x29 => ldspr,
            0x33 => bcd,
            0x55 => stor,
            0x65 => read,
            _ => nop,
        },
        _ => nop,
    }
}

/// The 8xyn register-to-register group
fn alu(n: u8) -> Instruction {
    match n {
        0x0 => mv,
        0x1 => or,
        0x2 => and,
        0x3 => xor,
        0x4 => addr,
        0x5 => sub,
        0x6 => shr,
        0x7 => subn,
        0xE => shl,
        _ => nop,
    }
}
