use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use onac_timing::{HighPrecisionTimer, TrialClock};
use onac_trigger::TriggerChannel;
use serde::Serialize;

use crate::config::ExperimentConfig;
use crate::error::TaskError;

/// Metadata written alongside the result CSVs.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub experiment: String,
    pub participant: String,
    pub start_time_unix: u64,
    pub trigger_port_open: bool,
    pub frame_rate_hz: Option<f64>,
}

/// Process-wide session state. Exclusively owns the trigger channel for the
/// whole run; each trial borrows it for its own duration and never retains
/// it past completion.
pub struct SessionContext {
    pub participant: String,
    pub config: ExperimentConfig,
    pub trigger: TriggerChannel,
    /// Monotonic session time source; the display loop samples it once per
    /// refresh and it feeds the measured frame statistics.
    pub timer: HighPrecisionTimer,
    /// Session clock, zeroed at setup.
    pub clock: TrialClock,
    pub info: SessionInfo,
}

impl SessionContext {
    pub fn new(
        participant: impl Into<String>,
        port: Option<&str>,
        config: ExperimentConfig,
    ) -> Result<Self, TaskError> {
        let participant = participant.into();
        println!("Setting up experiment...");
        fs::create_dir_all(&config.data_dir)?;
        let trigger = TriggerChannel::open(port, config.baud);
        let timer = HighPrecisionTimer::new();
        let clock = TrialClock::start(&timer);
        let start_time_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let info = SessionInfo {
            experiment: config.experiment_name.clone(),
            participant: participant.clone(),
            start_time_unix,
            trigger_port_open: trigger.is_enabled(),
            frame_rate_hz: None,
        };
        Ok(Self {
            participant,
            config,
            trigger,
            timer,
            clock,
            info,
        })
    }

    /// Records the measured refresh rate once the display has been sampled.
    pub fn set_frame_rate(&mut self, hz: f64) {
        self.info.frame_rate_hz = Some(hz);
    }

    /// Result CSV path for one task, e.g. `data/P3_object_recognition_task.csv`.
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("P{}_{stem}.csv", self.participant))
    }

    /// A task asset under the stimulus root.
    pub fn stimulus_path(&self, rel: &str) -> PathBuf {
        self.config.stimuli_dir.join(rel)
    }

    /// Per-participant stimulus table, e.g.
    /// `stimuli/object_recognition_task/stimuli/P3_object_recognition_task_stimuli.csv`.
    pub fn participant_table(&self, dir: &str, suffix: &str) -> PathBuf {
        self.config
            .stimuli_dir
            .join(dir)
            .join(format!("P{}_{suffix}.csv", self.participant))
    }

    pub fn write_manifest(&self) -> Result<PathBuf, TaskError> {
        let path = self
            .config
            .data_dir
            .join(format!("P{}_session.json", self.participant));
        let body = serde_json::to_string_pretty(&self.info)?;
        fs::write(&path, body)?;
        Ok(path)
    }
}
