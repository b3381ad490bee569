use std::path::PathBuf;

/// What a trial presents when its schedule calls for the stimulus.
#[derive(Debug, Clone, PartialEq)]
pub enum StimulusKind {
    /// Nothing beyond the phase background.
    None,
    /// An image file from the task's stimulus set.
    Image(PathBuf),
    /// A text stimulus (condition labels, motor prompts).
    Text(String),
    /// A silent movie placeholder (oddball blocks).
    Movie(PathBuf),
}

/// A sound dispatched through the presentation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSpec {
    File(PathBuf),
    /// A plain tone by note name, e.g. the resting-state end chime.
    Tone { note: char, secs: f64 },
}

/// Audio side of the presentation boundary. The runner schedules sounds for
/// the next flip; whatever sits behind this trait owns actual playback.
pub trait AudioSink {
    fn play(&mut self, sound: &SoundSpec);
}

/// Audio sink for headless runs and tests. Drops every request.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _sound: &SoundSpec) {}
}
