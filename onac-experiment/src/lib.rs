pub mod config;
pub mod driver;
pub mod error;
pub mod recorder;
pub mod response;
pub mod runner;
pub mod session;
pub mod stimuli;
pub mod task;

pub use config::ExperimentConfig;
pub use driver::{Directive, ExperimentDriver, TaskDriver, TaskKind, TaskTick};
pub use error::TaskError;
pub use recorder::TrialRecorder;
pub use response::{CapturedResponse, ResponseCapture};
pub use runner::{FrameContent, TickOutput, TrialRunner};
pub use session::{SessionContext, SessionInfo};
pub use task::{PlannedTrial, TaskPlan};
