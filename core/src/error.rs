use std::io;

use thiserror::Error;

use crate::constants::MAX_PROGRAM_SIZE;

/// Failure to get a program into memory. Nothing is written when this is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("program is {size} bytes but at most {} fit in memory", MAX_PROGRAM_SIZE)]
    TooLarge { size: usize },

    #[error("unable to read program: {0}")]
    Unreadable(#[from] io::Error),
}

/// A keypad code outside 0x0..=0xF
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("key {0:#04X} is not on the keypad (expected 0x00..=0x0F)")]
pub struct InvalidKey(pub u8);
