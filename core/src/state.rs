use crate::constants::{
    ADDRESS_MASK, DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_ADDRESS, KEY_COUNT, MEMORY_SIZE,
    PROGRAM_START, SPRITE_SHEET, STACK_SIZE,
};

/// A snapshot of the Chip8 internal state
///
/// ## CPU
/// Registers
/// - (v) 16 primary 8-bit registers (V0..VF)
///     - the first 15 (V0..VE) are general purpose registers
///     - the 16th (VF) is the carry/borrow/collision flag
/// - (i) a 16-bit memory address register
///
/// Counter
/// - (pc) a 16-bit program counter
///
/// Stack
/// - (stack) return addresses for up to `STACK_SIZE` nested calls
/// - (sp) how many of those slots are in use
///
/// Timers
/// - 2 8-bit timers (delay & sound), decremented by the host at 60Hz
///
/// ## Memory
/// - 4096 bytes of addressable memory; all accesses wrap at 0xFFF
/// - 64x32 frame buffer
///     - stores the contents of the next frame to be drawn
///
/// ## Input
/// - Emulation halts on FX0A until a key press is latched for the waiting register
///
/// The State is `Copy` so that past snapshots can be kept for rewinding.
#[derive(Copy, Clone)]
pub struct State {
    pub v: [u8; 16],
    pub i: u16,
    pub pc: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub stack: [u16; STACK_SIZE],
    pub memory: [u8; MEMORY_SIZE],
    pub frame_buffer: FrameBuffer,
    pub draw_flag: bool,
    /// First address past the loaded program
    pub program_end: u16,
    /// Register that FX0A is waiting to fill
    pub register_needing_key: Option<u8>,
    /// Key pressed while a register was waiting
    pub latched_key: Option<u8>,
}

impl State {
    pub fn new() -> Self {
        let mut memory = [0; MEMORY_SIZE];
        let font = FONT_ADDRESS as usize;
        memory[font..font + SPRITE_SHEET.len()].copy_from_slice(&SPRITE_SHEET);

        State {
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            stack: [0; STACK_SIZE],
            memory,
            frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
            draw_flag: false,
            program_end: PROGRAM_START,
            register_needing_key: None,
            latched_key: None,
        }
    }

    /// Reads a byte, wrapping the address into 12 bits
    pub fn read(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDRESS_MASK) as usize]
    }

    /// Writes a byte, wrapping the address into 12 bits
    pub fn write(&mut self, addr: u16, byte: u8) {
        self.memory[(addr & ADDRESS_MASK) as usize] = byte;
    }

    /// The big-endian instruction word at `pc`
    pub fn fetch(&self) -> u16 {
        u16::from(self.read(self.pc)) << 8 | u16::from(self.read(self.pc.wrapping_add(1)))
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// The FrameBuffer is indexed as [y][x]
pub type FrameBuffer = [[bool; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

/// Pressed status of keys 0..F
pub type Keypad = [bool; KEY_COUNT];
