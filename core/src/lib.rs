pub use chip8::{Chip8, StepResult};
pub use constants::{CLOCK_SPEED, TIMER_HZ};
pub use error::{InvalidKey, LoadError};
pub use state::FrameBuffer;

mod chip8;
pub mod constants;
mod error;
mod instruction;
mod opcode;
mod operations;
pub mod state;
