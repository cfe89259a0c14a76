use log::{debug, warn};

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FLAG, FONT_ADDRESS, FONT_GLYPH_SIZE, STACK_SIZE,
};
use crate::opcode::Opcode;
use crate::state::{Keypad, State};

/// Advances past the current instruction, skipping the next one if `condition` holds
fn skip_if(state: &State, condition: bool) -> State {
    let pc = if condition {
        state.pc.wrapping_add(0x4)
    } else {
        state.pc.wrapping_add(0x2)
    };
    State { pc, ..*state }
}

/// Writes `result` to Vx and then `flag` to VF, so VF wins when x == F
fn with_flag(op: &dyn Opcode, state: &State, result: u8, flag: bool) -> State {
    let mut v = state.v;
    v[op.x()] = result;
    v[FLAG] = flag as u8;
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Anything the decoder doesn't recognise
pub fn nop(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    debug!("ignoring unknown opcode {:X?} at {:03X}", op.nibbles(), state.pc);
    State {
        pc: state.pc.wrapping_add(0x2),
        ..*state
    }
}

/// 0nnn: call a machine code routine; not supported by interpreters
pub fn sys(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    debug!("ignoring machine code call to {:03X}", op.addr());
    State {
        pc: state.pc.wrapping_add(0x2),
        ..*state
    }
}

/// clear
pub fn clr(_op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
        draw_flag: true,
        ..*state
    }
}

/// PC = STACK.pop()
/// Returning with an empty stack does nothing
pub fn rts(_op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    if state.sp == 0 {
        warn!("return with empty stack at {:03X}", state.pc);
        return *state;
    }
    let sp = state.sp - 1;
    State {
        pc: state.stack[sp as usize],
        sp,
        ..*state
    }
}

/// PC = addr
pub fn jump(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: op.addr(),
        ..*state
    }
}

/// STACK.push(PC + 2); PC = addr
/// Calling with a full stack does nothing
pub fn call(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    if state.sp as usize == STACK_SIZE {
        warn!("stack overflow calling {:03X} from {:03X}", op.addr(), state.pc);
        return *state;
    }
    let mut stack = state.stack;
    stack[state.sp as usize] = state.pc.wrapping_add(0x2);
    State {
        pc: op.addr(),
        sp: state.sp + 1,
        stack,
        ..*state
    }
}

/// if Vx == kk then pc += 2
pub fn ske(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    skip_if(state, state.v[op.x()] == op.kk())
}

/// if Vx != kk then pc += 2
pub fn skne(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    skip_if(state, state.v[op.x()] != op.kk())
}

/// if Vx == Vy then pc += 2
pub fn skre(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    skip_if(state, state.v[op.x()] == state.v[op.y()])
}

/// Vx = kk
pub fn load(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] = op.kk();
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx += kk
/// Overflow wraps and VF is left alone
pub fn add(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] = v[op.x()].wrapping_add(op.kk());
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx = Vy
pub fn mv(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] = v[op.y()];
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx |= Vy
pub fn or(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] |= v[op.y()];
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx &= Vy
pub fn and(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] &= v[op.y()];
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx ^= Vy
pub fn xor(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] ^= v[op.y()];
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx += Vy; VF = carry
pub fn addr(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let (res, carry) = state.v[op.x()].overflowing_add(state.v[op.y()]);
    with_flag(op, state, res, carry)
}

/// Vx -= Vy; VF = !borrow
pub fn sub(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let (res, borrow) = state.v[op.x()].overflowing_sub(state.v[op.y()]);
    with_flag(op, state, res, !borrow)
}

/// Vx >>= 1; VF = the bit shifted out
pub fn shr(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let vx = state.v[op.x()];
    with_flag(op, state, vx >> 1, vx & 0x1 == 0x1)
}

/// Vx = Vy - Vx; VF = !borrow
pub fn subn(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let (res, borrow) = state.v[op.y()].overflowing_sub(state.v[op.x()]);
    with_flag(op, state, res, !borrow)
}

/// Vx <<= 1; VF = the bit shifted out
pub fn shl(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let vx = state.v[op.x()];
    with_flag(op, state, vx << 1, vx & 0x80 == 0x80)
}

/// if Vx != Vy then pc += 2
pub fn skrne(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    skip_if(state, state.v[op.x()] != state.v[op.y()])
}

/// I = addr
pub fn loadi(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        i: op.addr(),
        ..*state
    }
}

/// PC = addr + V0
pub fn jumpi(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: op.addr() + u16::from(state.v[0x0]),
        ..*state
    }
}

/// Vx = rand_byte & kk
pub fn rand(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let rand_byte: u8 = rand::random();
    let mut v = state.v;
    v[op.x()] = rand_byte & op.kk();
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs a sprite from memory i..i+n at position x, y on the FrameBuffer with wrapping.
/// VF is set if any lit pixel gets erased.
pub fn draw(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut frame_buffer = state.frame_buffer;
    let mut collision = false;
    let origin_x = state.v[op.x()] as usize;
    let origin_y = state.v[op.y()] as usize;

    for row in 0..op.n() {
        let sprite_byte = state.read(state.i.wrapping_add(u16::from(row)));
        let y = (origin_y + row as usize) % DISPLAY_HEIGHT;
        for bit in 0..8 {
            if (sprite_byte >> (7 - bit)) & 0x1 == 0 {
                continue;
            }
            let x = (origin_x + bit) % DISPLAY_WIDTH;
            collision |= frame_buffer[y][x];
            frame_buffer[y][x] ^= true;
        }
    }

    let mut v = state.v;
    v[FLAG] = collision as u8;
    State {
        pc: state.pc.wrapping_add(0x2),
        draw_flag: true,
        v,
        frame_buffer,
        ..*state
    }
}

/// if key[Vx] is pressed then pc += 2
pub fn skpr(op: &dyn Opcode, state: &State, keys: &Keypad) -> State {
    skip_if(state, keys[(state.v[op.x()] & 0xF) as usize])
}

/// if key[Vx] is not pressed then pc += 2
pub fn skup(op: &dyn Opcode, state: &State, keys: &Keypad) -> State {
    skip_if(state, !keys[(state.v[op.x()] & 0xF) as usize])
}

/// Vx = DT
pub fn moved(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    v[op.x()] = state.delay_timer;
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}

/// Vx = await_key()
/// Until a key press has been latched the pc stays put and the register is marked as waiting.
pub fn keyd(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    match (state.register_needing_key, state.latched_key) {
        (Some(_), Some(key)) => {
            let mut v = state.v;
            v[op.x()] = key;
            State {
                pc: state.pc.wrapping_add(0x2),
                v,
                register_needing_key: None,
                latched_key: None,
                ..*state
            }
        }
        _ => State {
            register_needing_key: Some(op.x() as u8),
            latched_key: None,
            ..*state
        },
    }
}

/// DT = Vx
pub fn loads(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        delay_timer: state.v[op.x()],
        ..*state
    }
}

/// ST = Vx
pub fn ld(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        sound_timer: state.v[op.x()],
        ..*state
    }
}

/// I += Vx
pub fn addi(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        i: state.i.wrapping_add(u16::from(state.v[op.x()])),
        ..*state
    }
}

/// I = FONT_ADDRESS + Vx * 5
/// Point I at the font glyph for the digit in Vx
pub fn ldspr(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    State {
        pc: state.pc.wrapping_add(0x2),
        i: FONT_ADDRESS + u16::from(state.v[op.x()]) * FONT_GLYPH_SIZE,
        ..*state
    }
}

/// mem[I..I+3] = bcd(Vx)
pub fn bcd(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let vx = state.v[op.x()];
    let mut next = State {
        pc: state.pc.wrapping_add(0x2),
        ..*state
    };
    next.write(state.i, vx / 100);
    next.write(state.i.wrapping_add(1), vx / 10 % 10);
    next.write(state.i.wrapping_add(2), vx % 10);
    next
}

/// mem[I..=I+x] = V0..=Vx
pub fn stor(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut next = State {
        pc: state.pc.wrapping_add(0x2),
        ..*state
    };
    for r in 0..=op.x() {
        next.write(state.i.wrapping_add(r as u16), state.v[r]);
    }
    next
}

/// V0..=Vx = mem[I..=I+x]
pub fn read(op: &dyn Opcode, state: &State, _keys: &Keypad) -> State {
    let mut v = state.v;
    for (r, reg) in v.iter_mut().enumerate().take(op.x() + 1) {
        *reg = state.read(state.i.wrapping_add(r as u16));
    }
    State {
        pc: state.pc.wrapping_add(0x2),
        v,
        ..*state
    }
}
