/// What the display shows while a phase is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseDisplay {
    Blank,
    Fixation,
    /// The trial's own stimulus (image, text, movie frame).
    Stimulus,
    /// The trial's prompt text (e.g. the encoding question).
    Prompt,
}

/// A named sub-interval of a trial, `[start, end)` seconds from trial start.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    pub name: &'static str,
    pub start: f64,
    pub end: f64,
    pub display: PhaseDisplay,
}

/// Contiguous, non-overlapping phases covering one trial.
///
/// Built from durations so contiguity holds by construction: the end of
/// phase `i` is the start of phase `i + 1`. Elapsed-time comparisons use
/// `<` on the end offset, so a boundary sample belongs to the next phase
/// and no tick is ever claimed by two phases.
#[derive(Debug, Clone, Default)]
pub struct PhaseSchedule {
    phases: Vec<PhaseSpec>,
}

impl PhaseSchedule {
    pub fn from_durations(parts: &[(&'static str, f64, PhaseDisplay)]) -> Self {
        let mut phases = Vec::with_capacity(parts.len());
        let mut offset = 0.0;
        for &(name, secs, display) in parts {
            debug_assert!(secs > 0.0, "phase {name} must have positive duration");
            phases.push(PhaseSpec {
                name,
                start: offset,
                end: offset + secs,
                display,
            });
            offset += secs;
        }
        Self { phases }
    }

    pub fn single(name: &'static str, secs: f64, display: PhaseDisplay) -> Self {
        Self::from_durations(&[(name, secs, display)])
    }

    /// Index of the phase active at `elapsed`, or `None` past the end.
    pub fn phase_at(&self, elapsed: f64) -> Option<usize> {
        self.phases
            .iter()
            .position(|p| p.start <= elapsed && elapsed < p.end)
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Start offset of phase `idx`; this is the transition its trigger is bound to.
    pub fn start_of(&self, idx: usize) -> f64 {
        self.phases[idx].start
    }

    pub fn total(&self) -> f64 {
        self.phases.last().map_or(0.0, |p| p.end)
    }

    /// Inflate the trial by extending the final phase. Called once at trial
    /// start with the session jitter, never per phase.
    pub fn extend_last(&mut self, extra: f64) {
        if let Some(last) = self.phases.last_mut() {
            last.end += extra;
        }
    }
}
