use std::path::PathBuf;

/// Session-wide settings plus the per-task timing tables. Values mirror the
/// study protocol; tests override individual fields.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    /// Root of the stimulus sets and instruction images.
    pub stimuli_dir: PathBuf,
    /// Where per-task result CSVs and the session manifest land.
    pub data_dir: PathBuf,
    pub baud: u32,
    /// Upper bound of the uniform duration jitter, seconds. Applied once per
    /// jittered trial so the imaging device never locks onto a fixed rate.
    pub jitter_max: f64,
    pub object_recognition: ObjectRecognitionConfig,
    pub mismatched_negativity: MismatchedNegativityConfig,
    pub visual_stimulation: VisualStimulationConfig,
    pub memory_encoding: MemoryEncodingConfig,
    pub resting_state: RestingStateConfig,
    pub simple_motor: SimpleMotorConfig,
    pub naturalistic_motor: NaturalisticMotorConfig,
    pub breath_holding: BreathHoldingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_name: "Optical Neuroimaging and Cognition (ONAC)".to_owned(),
            stimuli_dir: PathBuf::from("stimuli"),
            data_dir: PathBuf::from("data"),
            baud: 9600,
            jitter_max: 0.1,
            object_recognition: ObjectRecognitionConfig::default(),
            mismatched_negativity: MismatchedNegativityConfig::default(),
            visual_stimulation: VisualStimulationConfig::default(),
            memory_encoding: MemoryEncodingConfig::default(),
            resting_state: RestingStateConfig::default(),
            simple_motor: SimpleMotorConfig::default(),
            naturalistic_motor: NaturalisticMotorConfig::default(),
            breath_holding: BreathHoldingConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectRecognitionConfig {
    pub practice_trials: usize,
    pub stimuli_per_block: usize,
    pub blocks: usize,
    pub stimulus_secs: f64,
    pub blank_secs: f64,
    pub block_baseline_secs: f64,
    pub post_block_baseline_secs: f64,
}

impl Default for ObjectRecognitionConfig {
    fn default() -> Self {
        Self {
            practice_trials: 2,
            stimuli_per_block: 12,
            blocks: 4,
            stimulus_secs: 2.0,
            blank_secs: 0.5,
            block_baseline_secs: 15.0,
            post_block_baseline_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MismatchedNegativityConfig {
    pub blocks: usize,
    pub tone_secs: f64,
    pub baseline_secs: f64,
}

impl Default for MismatchedNegativityConfig {
    fn default() -> Self {
        Self {
            blocks: 6,
            tone_secs: 1.0,
            baseline_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisualStimulationConfig {
    pub repetitions: usize,
    pub flicker_secs: f64,
    pub initial_baseline_secs: f64,
    pub surround_baseline_secs: f64,
    pub grating: PathBuf,
}

impl Default for VisualStimulationConfig {
    fn default() -> Self {
        Self {
            repetitions: 3,
            flicker_secs: 10.0,
            initial_baseline_secs: 30.0,
            surround_baseline_secs: 15.0,
            grating: PathBuf::from("visual_stimulation/grating.png"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryEncodingConfig {
    pub trials: usize,
    pub question_secs: f64,
    pub image_secs: f64,
    pub question: String,
    pub answer_keys: Vec<String>,
}

impl Default for MemoryEncodingConfig {
    fn default() -> Self {
        Self {
            trials: 75,
            question_secs: 2.0,
            image_secs: 3.0,
            question: "Indoor or outdoor?".to_owned(),
            answer_keys: vec!["left".to_owned(), "right".to_owned()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestingStateConfig {
    pub minutes: f64,
    pub tail_secs: f64,
}

impl Default for RestingStateConfig {
    fn default() -> Self {
        Self {
            minutes: 5.0,
            tail_secs: 3.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimpleMotorConfig {
    pub trial_secs: f64,
    pub pre_baseline_secs: f64,
    pub post_baseline_secs: f64,
    /// Metronome beats per minute.
    pub metronome_bpm: f64,
    pub metronome_clip: PathBuf,
}

impl Default for SimpleMotorConfig {
    fn default() -> Self {
        Self {
            trial_secs: 10.0,
            pre_baseline_secs: 10.0,
            post_baseline_secs: 2.0,
            metronome_bpm: 50.0,
            metronome_clip: PathBuf::from("simple_motor_task/temp.wav"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NaturalisticMotorConfig {
    pub trial_secs: f64,
    pub pre_baseline_secs: f64,
    pub inter_trial_secs: f64,
}

impl Default for NaturalisticMotorConfig {
    fn default() -> Self {
        Self {
            trial_secs: 10.0,
            pre_baseline_secs: 5.0,
            inter_trial_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreathHoldingConfig {
    pub trial_secs: f64,
    pub baseline_secs: f64,
    /// Planned-trial indices after which a self-paced break screen shows.
    pub breaks_after: Vec<usize>,
}

impl Default for BreathHoldingConfig {
    fn default() -> Self {
        Self {
            trial_secs: 20.0,
            baseline_secs: 20.0,
            breaks_after: vec![4, 8],
        }
    }
}
