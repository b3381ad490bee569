use serde::{Deserialize, Serialize};

use crate::stimulus::{SoundSpec, StimulusKind};

/// Trial state machine. `Running(i)` carries the active phase index; the
/// `Running(i) -> Running(i + 1)` transition is where phase `i + 1`'s
/// trigger becomes due. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Armed,
    Running(usize),
    Completed,
}

/// Which phase accepts key input and which keys qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// Index of the response-eligible phase.
    pub phase: usize,
    /// Qualifying keys; empty means any key qualifies.
    pub keys: Vec<String>,
    /// Expected answer, when the task scores correctness.
    pub correct: Option<String>,
    /// Whether a captured response ends the trial early (motor tasks).
    pub ends_trial: bool,
}

impl ResponseSpec {
    pub fn any_key(phase: usize) -> Self {
        Self {
            phase,
            keys: Vec::new(),
            correct: None,
            ends_trial: false,
        }
    }

    pub fn qualifies(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.iter().any(|k| k == key)
    }
}

/// A sound repeated at a fixed period while a trial runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MetronomeSpec {
    pub sound: SoundSpec,
    /// Seconds between beats.
    pub period: f64,
}

/// Everything needed to execute one timed stimulus-response unit.
/// Constructed from a stimulus-table row immediately before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSpec {
    /// Stimulus identifier as recorded (file stem, condition text).
    pub id: String,
    pub condition: String,
    /// Presentation block this trial belongs to, for blocked tasks.
    pub block: Option<usize>,
    pub stimulus: StimulusKind,
    /// Text shown during a `Prompt` phase.
    pub prompt: Option<String>,
    /// Sound scheduled for the flip that opens the trial.
    pub sound: Option<SoundSpec>,
    /// Repeating sound inside the trial (the motor metronome).
    pub metronome: Option<MetronomeSpec>,
    /// One optional trigger code per phase, bound to that phase's start.
    pub phase_triggers: Vec<Option<u8>>,
    /// Trigger bound to trial completion.
    pub end_trigger: Option<u8>,
    pub response: Option<ResponseSpec>,
}

impl TrialSpec {
    /// A trial with no triggers, no sound and no response window.
    pub fn silent(id: impl Into<String>, condition: impl Into<String>, stimulus: StimulusKind) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
            block: None,
            stimulus,
            prompt: None,
            sound: None,
            metronome: None,
            phase_triggers: Vec::new(),
            end_trigger: None,
            response: None,
        }
    }
}

/// Persisted outcome of one trial. Append-only: never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub block: Option<usize>,
    pub condition: String,
    pub stimulus: String,
    /// Trigger codes dispatched for this trial, in transmission order.
    pub triggers: String,
    /// Captured key, `None` when the window expired without a response.
    pub response: Option<String>,
    /// Seconds from response-window start; `None` when no response.
    pub reaction_time: Option<f64>,
    pub correct: Option<bool>,
}
