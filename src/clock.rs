use std::time::Duration;

pub const TIMER_HZ: u64 = 60;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Upper bound on cycles handed out by a single call, so a host that stalled
/// for a long time does not replay the whole backlog at once.
pub const MAX_CYCLES_PER_BATCH: u64 = 10_000;

/// Converts elapsed wall-clock time into a number of owed cycles at a fixed
/// rate. Leftover fractions carry into the next call.
pub struct Rate {
    hz: u64,
    remainder_nanos: u128,
}

impl Rate {
    pub fn new(hz: u64) -> Self {
        Rate {
            hz,
            remainder_nanos: 0,
        }
    }

    pub fn due(&mut self, elapsed: Duration) -> u64 {
        let scaled = elapsed.as_nanos() * u128::from(self.hz) + self.remainder_nanos;
        self.remainder_nanos = scaled % NANOS_PER_SEC;
        (scaled / NANOS_PER_SEC) as u64
    }
}

/// Paces the instruction clock and the 60 Hz timer clock independently.
pub struct Pacer {
    cycles: Rate,
    ticks: Rate,
}

impl Pacer {
    pub fn new(clock_hz: u64) -> Self {
        Pacer {
            cycles: Rate::new(clock_hz),
            ticks: Rate::new(TIMER_HZ),
        }
    }

    /// Instruction cycles and timer ticks owed for `elapsed` time.
    pub fn advance(&mut self, elapsed: Duration) -> (u64, u64) {
        let cycles = self.cycles.due(elapsed).min(MAX_CYCLES_PER_BATCH);
        let ticks = self.ticks.due(elapsed);
        (cycles, ticks)
    }
}
