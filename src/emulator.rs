use log::{debug, error, trace, warn};
use rand::Rng;

use crate::decode::{Instruction, Opcode};
use crate::display::{FrameBuffer, Screen};
use crate::keyboard::Input;
use crate::memory::{Addr, Memory, RomError, FONT_START, MEM_SIZE};
use crate::registers::Registers;
use crate::sound::Audio;
use crate::timer::Timers;

/// Behavioral variant toggles distinguishing historical interpreters. The
/// defaults reproduce the documented instruction semantics: shifts operate
/// on VX alone and sprites clip at the screen edge after the origin wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// Zero VF before 8XY1/8XY2/8XY3.
    pub reset_vf_on_logic_op: bool,
    /// Leave I pointing past the copied range after FX55/FX65.
    pub increment_index_on_store_load: bool,
    /// Clip sprite pixels at the edge instead of wrapping them around.
    pub clip_sprites_at_edge: bool,
    /// 8XY6/8XYE shift VX in place; when off, VY is the shift source.
    pub shift_uses_vx_only: bool,
    /// BNNN adds VX (X = high nibble of NNN) instead of V0.
    pub jump_with_offset_uses_vx: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            reset_vf_on_logic_op: false,
            increment_index_on_store_load: false,
            clip_sprites_at_edge: true,
            shift_uses_vx_only: true,
            jump_with_offset_uses_vx: false,
        }
    }
}

/// Engine execution state. `AwaitingKey` parks the program counter on the
/// FX0A instruction until the driver's event poll observes a key going down
/// and back up; `Halted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecState {
    Running,
    AwaitingKey { target: u8, pressed: Option<u8> },
    Halted,
}

pub struct Emulator<F: Screen + Input, A: Audio> {
    mem: Memory,
    regs: Registers,
    timers: Timers,
    fb: FrameBuffer,
    frontend: F,
    audio: A,
    quirks: Quirks,
    state: ExecState,
    skip_next: bool,
}

impl<F: Screen + Input, A: Audio> Emulator<F, A> {
    pub fn new(frontend: F, audio: A, quirks: Quirks) -> Self {
        Self {
            mem: Memory::new(),
            regs: Registers::new(),
            timers: Timers::new(),
            fb: FrameBuffer::new(),
            frontend,
            audio,
            quirks,
            state: ExecState::Running,
            skip_next: false,
        }
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), RomError> {
        self.mem.load_rom(rom)
    }

    pub fn is_running(&self) -> bool {
        self.state != ExecState::Halted
    }

    /// Services host events once per driver iteration: a quit request halts
    /// immediately (even mid-wait), and a pending key wait advances through
    /// its down-then-up handshake.
    pub fn poll_events(&mut self) {
        if self.frontend.quit_requested() {
            debug!("quit requested, halting");
            self.state = ExecState::Halted;
            return;
        }
        if let ExecState::AwaitingKey { target, mut pressed } = self.state {
            if let Some(&code) = self.frontend.keys_down().last() {
                pressed = Some(code);
            }
            match pressed {
                Some(code) if !self.frontend.keys_up().is_empty() => {
                    self.regs.set(target, code);
                    self.state = ExecState::Running;
                    self.advance_pc();
                }
                _ => self.state = ExecState::AwaitingKey { target, pressed },
            }
        }
    }

    /// One instruction step: fetch at PC, decode, execute. The PC advances
    /// by 2 unless the instruction set it, then once more when the previous
    /// instruction requested a skip. No-op while halted or awaiting a key.
    pub fn step(&mut self) {
        if self.state != ExecState::Running {
            return;
        }
        if self.regs.pc as usize + 1 >= MEM_SIZE {
            self.state = ExecState::Halted;
            return;
        }
        let op = Opcode(self.mem.read_word(self.regs.pc));
        trace!("{:04X}: {op}", self.regs.pc);
        let pc_set = self.execute(Instruction::decode(op));
        if !pc_set {
            self.advance_pc();
        }
        if self.skip_next {
            self.skip_next = false;
            if self.state == ExecState::Running {
                self.advance_pc();
            }
        }
    }

    /// One 60 Hz scheduler tick, independent of instruction throughput. The
    /// timer level is re-asserted to the (idempotent) beeper every tick.
    pub fn tick_timers(&mut self) {
        if self.timers.tick() {
            self.audio.play_loop();
        } else {
            self.audio.stop();
        }
    }

    pub fn present(&mut self) {
        self.frontend.present();
    }

    fn advance_pc(&mut self) {
        self.regs.pc += 2;
        if self.regs.pc as usize >= MEM_SIZE || self.regs.pc >= self.mem.rom_end() {
            debug!("PC {:04X} past program end, halting", self.regs.pc);
            self.state = ExecState::Halted;
        }
    }

    /// Applies one instruction. Returns true when the instruction wrote the
    /// PC itself and the ordinary advance must be suppressed.
    fn execute(&mut self, ins: Instruction) -> bool {
        match ins {
            Instruction::ClearScreen => {
                self.fb.clear(&mut self.frontend);
            }
            Instruction::Return => match self.regs.pop() {
                Some(addr) => {
                    self.regs.pc = addr;
                    return true;
                }
                None => {
                    error!("return with empty call stack at {:04X}", self.regs.pc);
                    self.state = ExecState::Halted;
                    return true;
                }
            },
            Instruction::MachineRoutine(addr) => {
                warn!("ignoring machine code routine {addr:03X}");
            }
            Instruction::Jump(addr) => {
                self.regs.pc = addr;
                return true;
            }
            Instruction::Call(addr) => {
                self.regs.push(self.regs.pc + 2);
                self.regs.pc = addr;
                return true;
            }
            Instruction::SkipEqImm { x, nn } => {
                if self.regs.get(x) == nn {
                    self.skip_next = true;
                }
            }
            Instruction::SkipNeImm { x, nn } => {
                if self.regs.get(x) != nn {
                    self.skip_next = true;
                }
            }
            Instruction::SkipEqReg { x, y } => {
                if self.regs.get(x) == self.regs.get(y) {
                    self.skip_next = true;
                }
            }
            Instruction::SkipNeReg { x, y } => {
                if self.regs.get(x) != self.regs.get(y) {
                    self.skip_next = true;
                }
            }
            Instruction::LoadImm { x, nn } => {
                self.regs.set(x, nn);
            }
            Instruction::AddImm { x, nn } => {
                self.regs.set(x, self.regs.get(x).wrapping_add(nn));
            }
            Instruction::Move { x, y } => {
                self.regs.set(x, self.regs.get(y));
            }
            Instruction::Or { x, y } => {
                if self.quirks.reset_vf_on_logic_op {
                    self.regs.set_flag(0);
                }
                self.regs.set(x, self.regs.get(x) | self.regs.get(y));
            }
            Instruction::And { x, y } => {
                if self.quirks.reset_vf_on_logic_op {
                    self.regs.set_flag(0);
                }
                self.regs.set(x, self.regs.get(x) & self.regs.get(y));
            }
            Instruction::Xor { x, y } => {
                if self.quirks.reset_vf_on_logic_op {
                    self.regs.set_flag(0);
                }
                self.regs.set(x, self.regs.get(x) ^ self.regs.get(y));
            }
            Instruction::AddReg { x, y } => {
                let (sum, carry) = self.regs.get(x).overflowing_add(self.regs.get(y));
                self.regs.set(x, sum);
                self.regs.set_flag(carry as u8);
            }
            Instruction::SubReg { x, y } => {
                let (diff, borrow) = self.regs.get(x).overflowing_sub(self.regs.get(y));
                self.regs.set(x, diff);
                self.regs.set_flag(!borrow as u8);
            }
            Instruction::SubFrom { x, y } => {
                let (diff, borrow) = self.regs.get(y).overflowing_sub(self.regs.get(x));
                self.regs.set(x, diff);
                self.regs.set_flag(!borrow as u8);
            }
            Instruction::ShiftRight { x, y } => {
                let src = if self.quirks.shift_uses_vx_only {
                    self.regs.get(x)
                } else {
                    self.regs.get(y)
                };
                self.regs.set(x, src >> 1);
                self.regs.set_flag(src & 1);
            }
            Instruction::ShiftLeft { x, y } => {
                let src = if self.quirks.shift_uses_vx_only {
                    self.regs.get(x)
                } else {
                    self.regs.get(y)
                };
                self.regs.set(x, src << 1);
                self.regs.set_flag(src >> 7);
            }
            Instruction::LoadIndex(addr) => {
                self.regs.i = addr;
            }
            Instruction::JumpOffset(addr) => {
                let offset = if self.quirks.jump_with_offset_uses_vx {
                    self.regs.get(((addr >> 8) & 0xF) as u8)
                } else {
                    self.regs.get(0)
                };
                self.regs.pc = addr + offset as Addr;
                return true;
            }
            Instruction::Random { x, nn } => {
                let sample: u8 = rand::thread_rng().gen();
                self.regs.set(x, sample & nn);
            }
            Instruction::Draw { x, y, n } => {
                let rows: Vec<u8> = (0..n as Addr)
                    .map(|row| self.mem.get(self.regs.i + row))
                    .collect();
                let collision = self.fb.draw_sprite(
                    self.regs.get(x),
                    self.regs.get(y),
                    &rows,
                    self.quirks.clip_sprites_at_edge,
                    &mut self.frontend,
                );
                self.regs.set_flag(collision as u8);
            }
            Instruction::SkipKeyPressed { x } => {
                if self.frontend.pressed_keys().contains(&self.regs.get(x)) {
                    self.skip_next = true;
                }
            }
            Instruction::SkipKeyNotPressed { x } => {
                if !self.frontend.pressed_keys().contains(&self.regs.get(x)) {
                    self.skip_next = true;
                }
            }
            Instruction::ReadDelay { x } => {
                self.regs.set(x, self.timers.delay);
            }
            Instruction::WaitKey { x } => {
                debug!("waiting for key press");
                self.state = ExecState::AwaitingKey {
                    target: x,
                    pressed: None,
                };
                // the PC stays parked here until the wait resolves
                return true;
            }
            Instruction::SetDelay { x } => {
                self.timers.delay = self.regs.get(x);
            }
            Instruction::SetSound { x } => {
                self.timers.sound = self.regs.get(x);
            }
            Instruction::AddIndex { x } => {
                self.regs.i = self.regs.i.wrapping_add(self.regs.get(x) as Addr);
            }
            Instruction::FontChar { x } => {
                self.regs.i = FONT_START as Addr + self.regs.get(x) as Addr * 5;
            }
            Instruction::StoreBcd { x } => {
                let value = self.regs.get(x);
                self.mem.set(self.regs.i, value / 100);
                self.mem.set(self.regs.i + 1, (value / 10) % 10);
                self.mem.set(self.regs.i + 2, value % 10);
            }
            Instruction::StoreRegs { x } => {
                for reg in 0..=x {
                    self.mem.set(self.regs.i + reg as Addr, self.regs.get(reg));
                }
                if self.quirks.increment_index_on_store_load {
                    self.regs.i += x as Addr + 1;
                }
            }
            Instruction::LoadRegs { x } => {
                for reg in 0..=x {
                    self.regs.set(reg, self.mem.get(self.regs.i + reg as Addr));
                }
                if self.quirks.increment_index_on_store_load {
                    self.regs.i += x as Addr + 1;
                }
            }
            Instruction::Unknown(word) => {
                warn!("unknown opcode {word:04X} at {:04X}", self.regs.pc);
            }
        }
        false
    }
}
