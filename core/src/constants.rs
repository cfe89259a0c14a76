/// Bytes of addressable memory
pub const MEMORY_SIZE: usize = 4096;

/// Every memory access is wrapped into the 12-bit address space
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// ROMs are loaded (and execution starts) here; everything below belongs to the interpreter
pub const PROGRAM_START: u16 = 0x200;

/// The largest ROM that fits between `PROGRAM_START` and the top of memory
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Maximum number of nested subroutine calls
pub const STACK_SIZE: usize = 16;

/// Number of keys on the hexadecimal keypad
pub const KEY_COUNT: usize = 16;

/// The flag register VF
pub const FLAG: usize = 0xF;

/// Target instructions per second for a host that doesn't specify one
pub const CLOCK_SPEED: u32 = 500;

/// Rate at which the host should call `tick_timers`
pub const TIMER_HZ: u32 = 60;

/// How many past states are kept around for rewinding
pub const MAX_SAVED_STATES: usize = 1000;

/// Where the font sprites live in interpreter memory
pub const FONT_ADDRESS: u16 = 0x000;

/// Each font glyph is 5 rows tall
pub const FONT_GLYPH_SIZE: u16 = 5;

/// # Sprite sheet
/// The hexadecimal digits 0..F, each a 4x5 sprite stored as 5 bytes.
/// Only the high nibble of each byte is lit.
/// ```text
/// 0xF0  ####
/// 0x90  #  #
/// 0x90  #  #
/// 0x90  #  #
/// 0xF0  ####
/// ```
#[rustfmt::skip]
pub const SPRITE_SHEET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
