use std::collections::VecDeque;
use std::io::Read;

use log::{info, trace};

use crate::constants::{KEY_COUNT, MAX_PROGRAM_SIZE, MAX_SAVED_STATES, PROGRAM_START};
use crate::error::{InvalidKey, LoadError};
use crate::instruction;
use crate::opcode::Opcode;
use crate::state::{FrameBuffer, Keypad, State};

/// What happened during a call to `Chip8::step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// An instruction ran and there's more program to go
    Continued,
    /// FX0A is waiting on a key press; the pc hasn't moved
    AwaitingKey,
    /// The pc has left the loaded program
    ProgramEnded,
}

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// Tracks:
///  - current `state`
///  - `previous_states` for rewinding
///  - `pressed_keys` with public interfaces for manipulating them
///
/// Supplies interfaces for:
/// - loading roms
/// - pressing and releasing keys
/// - stepping and rewinding the CPU
/// - ticking its timers
/// - inspecting its frame buffer for rendering by some display
///
/// Everything is synchronous; a host that shares a Chip8 between threads has to
/// serialize calls itself.
pub struct Chip8 {
    state: State,
    previous_states: VecDeque<State>,
    pressed_keys: Keypad,
}

// TODO keep history as diffs against the current state; a full snapshot is ~4KB per step
impl Chip8 {
    pub fn new() -> Self {
        Chip8 {
            state: State::new(),
            previous_states: VecDeque::with_capacity(MAX_SAVED_STATES),
            pressed_keys: [false; KEY_COUNT],
        }
    }

    /// Resets the machine and copies a program into memory at 0x200
    ///
    /// Programs too big to fit below the top of memory are rejected outright,
    /// leaving the current machine untouched.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), LoadError> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(LoadError::TooLarge {
                size: program.len(),
            });
        }

        let start = PROGRAM_START as usize;
        self.state = State::new();
        self.state.memory[start..start + program.len()].copy_from_slice(program);
        self.state.program_end = PROGRAM_START + program.len() as u16;
        self.previous_states.clear();

        info!("loaded {} byte program", program.len());
        for (row, chunk) in program.chunks(16).enumerate() {
            trace!("{:03X}: {:02X?}", start + row * 16, chunk);
        }
        Ok(())
    }

    /// Load a rom from a source file
    ///
    /// # Arguments
    /// * `reader` a file reader that contains a ROM
    /// Reads at most one byte past what fits, so oversized sources are rejected
    /// without being buffered in full.
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> Result<(), LoadError> {
        let mut program = Vec::with_capacity(MAX_PROGRAM_SIZE);
        reader
            .take(MAX_PROGRAM_SIZE as u64 + 1)
            .read_to_end(&mut program)?;
        self.load_program(&program)
    }

    /// The current frame, regardless of whether it changed
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.state.frame_buffer
    }

    /// Whether something has drawn to the frame since `clear_redraw`
    pub fn should_redraw(&self) -> bool {
        self.state.draw_flag
    }

    /// Called by the host once it has rendered the frame
    pub fn clear_redraw(&mut self) {
        self.state.draw_flag = false;
    }

    /// Returns the FrameBuffer if the display should be redrawn, marking it as drawn
    pub fn take_frame(&mut self) -> Option<FrameBuffer> {
        if self.should_redraw() {
            self.clear_redraw();
            Some(self.state.frame_buffer)
        } else {
            None
        }
    }

    pub fn sound_timer(&self) -> u8 {
        self.state.sound_timer
    }

    pub fn delay_timer(&self) -> u8 {
        self.state.delay_timer
    }

    pub fn pc(&self) -> u16 {
        self.state.pc
    }

    /// V0..VF
    pub fn registers(&self) -> &[u8; 16] {
        &self.state.v
    }

    /// The I register
    pub fn index(&self) -> u16 {
        self.state.i
    }

    /// Set the pressed status of key
    ///
    /// A press while FX0A is waiting is latched for it to pick up on the next step.
    ///
    /// # Arguments
    /// * `key` the keypad code (0x0..=0xF) of the key that was pressed
    pub fn key_down(&mut self, key: u8) -> Result<(), InvalidKey> {
        let index = Self::key_index(key)?;
        self.pressed_keys[index] = true;
        if self.state.register_needing_key.is_some() && self.state.latched_key.is_none() {
            self.state.latched_key = Some(key);
        }
        Ok(())
    }

    /// Unset the pressed status of key
    ///
    /// # Arguments
    /// * `key` the keypad code (0x0..=0xF) of the key that was released
    pub fn key_up(&mut self, key: u8) -> Result<(), InvalidKey> {
        let index = Self::key_index(key)?;
        self.pressed_keys[index] = false;
        Ok(())
    }

    fn key_index(key: u8) -> Result<usize, InvalidKey> {
        if (key as usize) < KEY_COUNT {
            Ok(key as usize)
        } else {
            Err(InvalidKey(key))
        }
    }

    fn ended(&self) -> bool {
        self.state.pc >= self.state.program_end
    }

    /// Advances the CPU by a single instruction
    /// - does nothing once the pc has run off the end of the program
    /// - gets and executes the next opcode
    /// - reports a pending FX0A instead of blocking on it
    pub fn step(&mut self) -> StepResult {
        if self.ended() {
            return StepResult::ProgramEnded;
        }

        let op: u16 = self.state.fetch();
        trace!(
            "{:04X} v{:02X?} i{:04X} pc{:04X}",
            op,
            self.state.v,
            self.state.i,
            self.state.pc
        );
        let next = instruction::from_op(&op)(&op, &self.state, &self.pressed_keys);

        if next.register_needing_key.is_some() {
            if self.state.register_needing_key.is_none() {
                trace!("waiting for a key to store in v{:X}", op.x());
            }
            self.state = next;
            return StepResult::AwaitingKey;
        }

        // A jump to itself or a refused CALL/RET changes nothing worth rewinding to
        if next.pc != self.state.pc || next.sp != self.state.sp {
            self.save_state();
        }
        self.state = next;
        if self.ended() {
            StepResult::ProgramEnded
        } else {
            StepResult::Continued
        }
    }

    /// Reverses the CPU by a single instruction if possible
    /// - if there are previous_states, pops the last one and restores it
    /// - marks the restored frame for redrawing
    pub fn rewind(&mut self) -> bool {
        match self.previous_states.pop_front() {
            Some(state) => {
                self.state = state;
                self.state.draw_flag = true;
                true
            }
            None => false,
        }
    }

    /// Puts the current state in previous_states
    /// - if there are already MAX_SAVED_STATES saved then the oldest is dropped
    fn save_state(&mut self) {
        if self.previous_states.len() == MAX_SAVED_STATES {
            self.previous_states.pop_back();
        }
        self.previous_states.push_front(self.state);
    }

    /// Decrements both timers, stopping at 0
    /// The host calls this at `TIMER_HZ` regardless of how fast it steps the CPU.
    pub fn tick_timers(&mut self) {
        self.state.delay_timer = self.state.delay_timer.saturating_sub(1);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(1);
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STACK_SIZE;

    fn with_program(program: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::new();
        chip8.load_program(program).unwrap();
        chip8
    }

    #[test]
    fn test_load_program_copies_to_0x200() {
        let chip8 = with_program(&[0x00, 0xE0, 0x12, 0x00]);
        assert_eq!(chip8.state.memory[0x200..0x204], [0x00, 0xE0, 0x12, 0x00]);
        assert_eq!(chip8.state.program_end, 0x204);
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn test_load_program_fills_memory() {
        let chip8 = with_program(&[0xAB; MAX_PROGRAM_SIZE]);
        assert_eq!(chip8.state.memory[0xFFF], 0xAB);
        assert_eq!(chip8.state.program_end, 0x1000);
    }

    #[test]
    fn test_load_program_too_large_leaves_memory_alone() {
        let mut chip8 = Chip8::new();
        let result = chip8.load_program(&[0xAB; MAX_PROGRAM_SIZE + 1]);
        assert!(matches!(result, Err(LoadError::TooLarge { size }) if size == 3585));
        assert!(chip8.state.memory[0x200..].iter().all(|&b| b == 0));
        assert_eq!(chip8.state.program_end, 0x200);
    }

    #[test]
    fn test_reload_resets_machine() {
        let mut chip8 = with_program(&[0x60, 0x05, 0x00, 0xE0, 0x22, 0x00, 0x00, 0xE0]);
        chip8.state.frame_buffer[3][3] = true;
        chip8.step();
        chip8.step();
        chip8.step();
        chip8.load_program(&[0x61, 0x07]).unwrap();
        assert_eq!(chip8.pc(), 0x200);
        assert_eq!(chip8.registers(), &[0; 16]);
        assert_eq!(chip8.state.sp, 0);
        assert!(!chip8.framebuffer()[3][3]);
        assert!(chip8.state.memory[0x202..0x208].iter().all(|&b| b == 0));
        assert_eq!(chip8.state.program_end, 0x202);
        assert!(!chip8.rewind());
        assert_eq!(chip8.step(), StepResult::ProgramEnded);
        assert_eq!(chip8.registers()[0x1], 0x7);
    }

    #[test]
    fn test_load_rom_stops_reading_past_max_size() {
        let mut chip8 = Chip8::new();
        let mut source = std::io::repeat(0xAB);
        let result = chip8.load_rom(&mut source);
        assert!(matches!(result, Err(LoadError::TooLarge { size }) if size == MAX_PROGRAM_SIZE + 1));
        assert!(chip8.state.memory[0x200..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_refused_calls_and_returns_arent_saved() {
        // RET with an empty stack
        let mut chip8 = with_program(&[0x00, 0xEE, 0x00, 0xE0]);
        for _ in 0..10 {
            assert_eq!(chip8.step(), StepResult::Continued);
        }
        assert_eq!(chip8.pc(), 0x200);
        assert!(chip8.previous_states.is_empty());

        // CALL with a full stack
        let mut chip8 = with_program(&[0x22, 0x00, 0x00, 0xE0]);
        for _ in 0..STACK_SIZE {
            chip8.step();
        }
        assert_eq!(chip8.previous_states.len(), STACK_SIZE);
        for _ in 0..10 {
            chip8.step();
        }
        assert_eq!(chip8.state.sp as usize, STACK_SIZE);
        assert_eq!(chip8.previous_states.len(), STACK_SIZE);
    }

    #[test]
    fn test_load_rom_reads_everything() {
        let mut chip8 = Chip8::new();
        let mut rom: &[u8] = &[0x60, 0x01, 0x61, 0x02];
        chip8.load_rom(&mut rom).unwrap();
        assert_eq!(chip8.state.memory[0x200..0x204], [0x60, 0x01, 0x61, 0x02]);
    }

    #[test]
    fn test_step_advances_pc() {
        let mut chip8 = with_program(&[0x00, 0xE0, 0x00, 0xE0]);
        assert_eq!(chip8.step(), StepResult::Continued);
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn test_step_without_program_has_ended() {
        let mut chip8 = Chip8::new();
        assert_eq!(chip8.step(), StepResult::ProgramEnded);
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn test_doesnt_step_while_register_needs_key() {
        let mut chip8 = with_program(&[0xF1, 0x0A, 0x00, 0xE0]);
        assert_eq!(chip8.step(), StepResult::AwaitingKey);
        assert_eq!(chip8.step(), StepResult::AwaitingKey);
        assert_eq!(chip8.pc(), 0x200);
        assert!(chip8.previous_states.is_empty());
    }

    #[test]
    fn test_captures_key_presses() {
        let mut chip8 = with_program(&[0xF1, 0x0A, 0x00, 0xE0]);
        chip8.step();
        chip8.key_down(0xE).unwrap();
        assert_eq!(chip8.step(), StepResult::Continued);
        assert_eq!(chip8.registers()[0x1], 0xE);
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn test_keys_held_before_waiting_dont_count() {
        let mut chip8 = with_program(&[0xF1, 0x0A, 0x00, 0xE0]);
        chip8.key_down(0x3).unwrap();
        assert_eq!(chip8.step(), StepResult::AwaitingKey);
        assert_eq!(chip8.step(), StepResult::AwaitingKey);
        chip8.key_down(0x5).unwrap();
        assert_eq!(chip8.step(), StepResult::Continued);
        assert_eq!(chip8.registers()[0x1], 0x5);
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        let mut chip8 = Chip8::new();
        assert_eq!(chip8.key_down(0x10), Err(InvalidKey(0x10)));
        assert_eq!(chip8.key_up(0xFF), Err(InvalidKey(0xFF)));
        assert_eq!(chip8.pressed_keys, [false; KEY_COUNT]);
    }

    #[test]
    fn test_key_release() {
        let mut chip8 = Chip8::new();
        chip8.key_down(0x7).unwrap();
        assert!(chip8.pressed_keys[0x7]);
        chip8.key_up(0x7).unwrap();
        assert!(!chip8.pressed_keys[0x7]);
    }

    #[test]
    fn test_tick_timers_stops_at_zero() {
        let mut chip8 = Chip8::new();
        chip8.state.delay_timer = 2;
        chip8.state.sound_timer = 1;
        chip8.tick_timers();
        assert_eq!((chip8.delay_timer(), chip8.sound_timer()), (1, 0));
        chip8.tick_timers();
        chip8.tick_timers();
        assert_eq!((chip8.delay_timer(), chip8.sound_timer()), (0, 0));
    }

    #[test]
    fn test_redraw_flag_is_cleared_by_host() {
        let mut chip8 = with_program(&[0x00, 0xE0, 0x00, 0xE0]);
        assert!(!chip8.should_redraw());
        chip8.step();
        assert!(chip8.should_redraw());
        chip8.clear_redraw();
        assert!(!chip8.should_redraw());
    }

    #[test]
    fn test_take_frame() {
        let mut chip8 = with_program(&[0x00, 0xE0, 0x00, 0xE0]);
        assert!(chip8.take_frame().is_none());
        chip8.step();
        assert!(chip8.take_frame().is_some());
        assert!(chip8.take_frame().is_none());
    }

    #[test]
    fn test_chip8_saves_state() {
        let mut chip8 = Chip8::new();
        chip8.save_state();
        assert_eq!(chip8.previous_states.len(), 1);
    }

    #[test]
    fn test_chip8_drops_old_saved_states() {
        let mut chip8 = Chip8::new();
        for _ in 0..MAX_SAVED_STATES {
            chip8.save_state();
        }
        assert_eq!(MAX_SAVED_STATES, chip8.previous_states.len());
        chip8.save_state();
        assert_eq!(MAX_SAVED_STATES, chip8.previous_states.len());
    }

    #[test]
    fn test_rewind_restores_previous_state() {
        let mut chip8 = with_program(&[0x60, 0x01, 0x60, 0x02]);
        chip8.step();
        chip8.step();
        assert_eq!(chip8.registers()[0x0], 0x2);
        assert!(chip8.rewind());
        assert_eq!(chip8.registers()[0x0], 0x1);
        assert_eq!(chip8.pc(), 0x202);
        assert!(chip8.should_redraw());
        assert!(chip8.rewind());
        assert!(!chip8.rewind());
        assert_eq!(chip8.pc(), 0x200);
    }
}
