pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::{PhaseDisplay, PhaseSchedule, PhaseSpec};
pub use stimulus::{AudioSink, NullAudio, SoundSpec, StimulusKind};
pub use trial::{MetronomeSpec, ResponseSpec, TrialRecord, TrialSpec, TrialState};
