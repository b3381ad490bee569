use crate::timer::Timer;

/// Per-trial monotonic clock. `start` pins the trial's zero point; `elapsed`
/// is sampled once per refresh tick and is the only time the trial logic
/// ever sees. There is no independent timer thread behind this.
#[derive(Debug, Clone, Copy)]
pub struct TrialClock {
    start_ns: u64,
}

impl TrialClock {
    pub fn start(timer: &impl Timer) -> Self {
        Self {
            start_ns: timer.now_ns(),
        }
    }

    pub fn restart(&mut self, timer: &impl Timer) {
        self.start_ns = timer.now_ns();
    }

    /// Seconds since `start`, monotonically non-decreasing.
    pub fn elapsed(&self, timer: &impl Timer) -> f64 {
        timer.seconds_since(self.start_ns)
    }
}
