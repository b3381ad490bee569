use std::path::PathBuf;

use onac_trigger::TriggerError;
use thiserror::Error;

/// Task-level failures. A missing asset is fatal for the task it belongs
/// to; records already flushed by earlier tasks are untouched. No-response
/// trials are not errors and never appear here.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("missing stimulus asset: {}", .0.display())]
    MissingStimulusAsset(PathBuf),
    #[error("malformed stimulus table {}: {source}", .path.display())]
    MalformedStimulusTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not write trial records: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("could not write session manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
