use std::fs::File;
use std::io::BufReader;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use log::{debug, info};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

use emu8_core::{Chip8, StepResult, TIMER_HZ};
use emu8_display::Display;

use crate::config::Config;
use crate::keymap::keymap;

pub fn run(config: &Config) -> anyhow::Result<()> {
    let mut chip8: Chip8 = Chip8::new();

    // Load ROM
    let file = File::open(&config.rom)
        .with_context(|| format!("unable to open {}", config.rom.display()))?;
    let mut reader = BufReader::new(file);
    chip8
        .load_rom(&mut reader)
        .with_context(|| format!("unable to load {}", config.rom.display()))?;

    // Get SDL2 context
    let sdl: sdl2::Sdl = sdl2::init().map_err(|e| anyhow!(e))?;
    let rom_name = config
        .rom
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut display = Display::new(&sdl, &format!("Emu-8: {}", rom_name), config.scale)
        .map_err(|e| anyhow!(e))?;
    let mut events = sdl.event_pump().map_err(|e| anyhow!(e))?;

    // Set initial timing
    let cycle_time = Duration::from_secs(1) / config.clock_speed;
    let timer_period = Duration::from_secs(1) / TIMER_HZ;
    let mut last_cycle = Instant::now();
    let mut last_tick = Instant::now();

    // Whether or not the default clock speed should be respected
    let mut fast_forward = false;
    // Whether the game's state should be cycled forwards or backwards
    let mut rewind = false;
    // Set once the program runs off its end; rewinding can bring it back
    let mut ended = false;
    let mut tone = false;

    'event: loop {
        // If the draw flag is set, unset it and render the current frame
        if let Some(frame) = chip8.take_frame() {
            display.render(&frame).map_err(|e| anyhow!(e))?;
        }

        // Handle input
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(key),
                    repeat: false,
                    ..
                } => match (key, keymap(key)) {
                    (_, Some(kc)) => chip8.key_down(kc)?,
                    (Keycode::Space, _) => fast_forward = true,
                    (Keycode::Backspace, _) => rewind = true,
                    _ => continue,
                },
                Event::KeyUp {
                    keycode: Some(key), ..
                } => match (key, keymap(key)) {
                    (_, Some(kc)) => chip8.key_up(kc)?,
                    (Keycode::Space, _) => fast_forward = false,
                    (Keycode::Backspace, _) => rewind = false,
                    _ => continue,
                },
                _ => continue,
            };
        }

        // Update state
        if rewind {
            if chip8.rewind() {
                ended = false;
            }
            last_tick = Instant::now();
        } else {
            if !ended && chip8.step() == StepResult::ProgramEnded {
                info!("program ended at {:03X}", chip8.pc());
                ended = true;
            }

            while last_tick.elapsed() >= timer_period {
                chip8.tick_timers();
                last_tick += timer_period;
            }
        }

        if tone != (chip8.sound_timer() > 0) {
            tone = !tone;
            debug!("tone {}", if tone { "on" } else { "off" });
        }

        // Handle timing
        let current_time = Instant::now();
        let elapsed_cycle_time = current_time - last_cycle;
        if !fast_forward && cycle_time > elapsed_cycle_time {
            std::thread::sleep(cycle_time - elapsed_cycle_time);
        }
        last_cycle = Instant::now();
    }

    Ok(())
}
