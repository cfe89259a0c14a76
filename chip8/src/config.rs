use std::path::PathBuf;

use clap::Parser;

use emu8_core::CLOCK_SPEED;

/// Runs a Chip-8 ROM in an SDL2 window.
///
/// Keys: the 4x4 block from 1 to V is the keypad, hold Space to fast forward,
/// hold Backspace to rewind, Escape quits.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Config {
    /// Path to the ROM to run
    pub rom: PathBuf,

    /// Instructions executed per second
    #[arg(short, long, default_value_t = CLOCK_SPEED, value_parser = clap::value_parser!(u32).range(1..))]
    pub clock_speed: u32,

    /// Window pixels per Chip-8 pixel
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub scale: u32,
}
