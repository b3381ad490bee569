use std::time::{Duration, Instant};

/// Monotonic time source for the session. `now_ns` is nanoseconds since an
/// arbitrary origin and never decreases; frame recording feeds the measured
/// refresh statistics the session logs at startup.
pub trait Timer: Clone + Send + Sync {
    fn now_ns(&self) -> u64;
    fn elapsed_since(&self, ts_ns: u64) -> Duration;
    fn seconds_since(&self, ts_ns: u64) -> f64 {
        self.elapsed_since(ts_ns).as_secs_f64()
    }
    /// Bounded wait used between tasks and trials, never inside a timed phase.
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn refresh_stats(&self) -> RefreshStats;
}

/// Measured display refresh behavior over the recorded frame samples.
#[derive(Debug, Clone)]
pub struct RefreshStats {
    pub average_frame_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_ns: f64,
    pub max_frame_ns: f64,
    pub effective_hz: f64,
}

impl RefreshStats {
    /// Frame period in seconds, falling back to 60 Hz when nothing was
    /// measured (the same fallback the display layer assumes).
    pub fn frame_period(&self) -> f64 {
        if self.average_frame_ns > 0.0 {
            self.average_frame_ns / 1e9
        } else {
            1.0 / 60.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
    frame_times: Vec<Duration>,
    max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn elapsed_since(&self, ts_ns: u64) -> Duration {
        Duration::from_nanos(self.now_ns().saturating_sub(ts_ns))
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }

    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }

    fn refresh_stats(&self) -> RefreshStats {
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return RefreshStats {
                average_frame_ns: 0.0,
                jitter_ns: 0.0,
                min_frame_ns: 0.0,
                max_frame_ns: 0.0,
                effective_hz: 0.0,
            };
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        RefreshStats {
            average_frame_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_ns: min,
            max_frame_ns: max,
            effective_hz: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "windows")]
        self.windows_sleep(duration);
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(target_os = "macos")]
        self.macos_sleep(duration);
        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "windows")]
    fn windows_sleep(&self, duration: Duration) {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{
            CreateWaitableTimerW, SetWaitableTimer, WaitForSingleObject,
        };

        unsafe {
            let Ok(timer) = CreateWaitableTimerW(None, true, None) else {
                std::thread::sleep(duration);
                return;
            };

            // Negative due time = relative wait, in 100 ns intervals.
            let due_time = -(duration.as_nanos() as i64 / 100);

            if SetWaitableTimer(timer, &due_time, 0, None, None, false).is_ok() {
                WaitForSingleObject(timer, u32::MAX);
            }

            let _ = CloseHandle(timer);
        }
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};
        use std::thread;

        if duration.as_nanos() < 100_000 {
            unsafe {
                let start = mach_absolute_time();
                let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
                mach_timebase_info(&mut timebase);

                let target_ticks =
                    duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;

                while mach_absolute_time() - start < target_ticks {
                    std::hint::spin_loop();
                }
            }
        } else {
            thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}
