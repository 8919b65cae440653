// CHIP-8 virtual machine:
//
// 16 8-bit data registers V0-VF, a 16-bit index register, a call stack,
// 4K of memory with the ROM loaded at 0x200, a 64x32 monochrome display,
// and two 8-bit timers counting down at 60 Hz. 35 two-byte big-endian
// opcodes. Instruction cadence and timer cadence run off separate clocks.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use crate::display::{Screen, WindowScreen};
use crate::emulator::{Emulator, Quirks};
use crate::keyboard::Input;
use crate::sound::{Audio, Sound};

mod decode;
mod display;
mod emulator;
mod keyboard;
mod memory;
mod registers;
mod sound;
mod timer;

const DEFAULT_IPS: u64 = 500;

// A stalled host (debugger, laptop sleep) resyncs the clocks instead of
// bursting through the backlog.
const MAX_CLOCK_LAG: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(version, about = "CHIP-8 virtual machine", long_about = None)]
struct Args {
    /// Path to the ROM file to run
    rom: PathBuf,

    /// Instructions per second
    #[arg(long, default_value_t = DEFAULT_IPS)]
    ips: u64,

    /// Zero VF before the 8XY1/8XY2/8XY3 logic ops
    #[arg(long)]
    quirk_reset_vf: bool,

    /// Leave I past the copied range after FX55/FX65
    #[arg(long)]
    quirk_increment_index: bool,

    /// Wrap sprite pixels around the screen edge instead of clipping
    #[arg(long)]
    wrap_sprites: bool,

    /// 8XY6/8XYE read their source from VY, as the original interpreter did
    #[arg(long)]
    legacy_shift: bool,

    /// BNNN jumps to NNN + VX instead of NNN + V0
    #[arg(long)]
    quirk_jump_vx: bool,
}

impl Args {
    fn quirks(&self) -> Quirks {
        Quirks {
            reset_vf_on_logic_op: self.quirk_reset_vf,
            increment_index_on_store_load: self.quirk_increment_index,
            clip_sprites_at_edge: !self.wrap_sprites,
            shift_uses_vx_only: !self.legacy_shift,
            jump_with_offset_uses_vx: self.quirk_jump_vx,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom)
        .with_context(|| format!("reading ROM {}", args.rom.display()))?;
    let screen = WindowScreen::new("chipcade - ESC to exit")?;
    let audio = Sound::new()?;

    let mut emu = Emulator::new(screen, audio, args.quirks());
    emu.load_rom(&rom)?;

    run(&mut emu, args.ips);
    Ok(())
}

/// Interleaves the two cadences on one thread: instructions at `ips`,
/// timers at a fixed 60 Hz, each tracked by its own elapsed-time
/// accumulator. Events are polled every iteration so the blocking key wait
/// and quit requests stay live regardless of what the engine is doing.
fn run<F: Screen + Input, A: Audio>(emu: &mut Emulator<F, A>, ips: u64) {
    let instruction_period = Duration::from_secs_f64(1.0 / ips.max(1) as f64);
    let timer_period = Duration::from_secs_f64(1.0 / timer::TICK_RATE_HZ as f64);
    let mut next_instruction = Instant::now();
    let mut next_timer = Instant::now();

    while emu.is_running() {
        emu.poll_events();

        let now = Instant::now();
        if now.duration_since(next_instruction) > MAX_CLOCK_LAG {
            next_instruction = now;
        }
        if now.duration_since(next_timer) > MAX_CLOCK_LAG {
            next_timer = now;
        }

        while next_instruction <= now && emu.is_running() {
            emu.step();
            next_instruction += instruction_period;
        }
        while next_timer <= now {
            emu.tick_timers();
            next_timer += timer_period;
        }

        // also refreshes minifb's input state and paces the loop
        emu.present();
    }
}
