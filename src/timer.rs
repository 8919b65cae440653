/// Fixed decrement rate for both timers, independent of instruction cadence.
pub const TICK_RATE_HZ: u64 = 60;

pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    pub fn new() -> Self {
        Self { delay: 0, sound: 0 }
    }

    /// One 60 Hz tick: decrement both counters toward zero and report
    /// whether the beeper should currently be audible. The level is sampled
    /// before the decrement, so a sound timer of 1 beeps for exactly one
    /// tick and the stop lands on the first tick that observes zero.
    pub fn tick(&mut self) -> bool {
        let audible = self.sound > 0;
        if self.delay > 0 {
            self.delay -= 1;
        }
        if self.sound > 0 {
            self.sound -= 1;
        }
        audible
    }
}
