use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::error::TaskError;

/// One row of a per-task stimulus table. Tasks use different subsets of the
/// columns; anything a task does not need stays `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StimulusRow {
    #[serde(default, alias = "Link")]
    pub stimulus: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub end_trigger: Option<String>,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub block: Option<usize>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub correct: Option<String>,
}

/// Reads a stimulus table, read once per task before any trial runs.
pub fn load_stimulus_table(path: &Path) -> Result<Vec<StimulusRow>, TaskError> {
    if !path.exists() {
        return Err(TaskError::MissingStimulusAsset(path.to_owned()));
    }
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| TaskError::MalformedStimulusTable {
            path: path.to_owned(),
            source,
        })?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<StimulusRow>() {
        rows.push(row.map_err(|source| TaskError::MalformedStimulusTable {
            path: path.to_owned(),
            source,
        })?);
    }
    Ok(rows)
}

/// Reads an instruction-screen table (one image path per row).
pub fn load_instruction_paths(path: &Path) -> Result<Vec<PathBuf>, TaskError> {
    #[derive(Deserialize)]
    struct InstructionRow {
        path: PathBuf,
    }
    if !path.exists() {
        return Err(TaskError::MissingStimulusAsset(path.to_owned()));
    }
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| TaskError::MalformedStimulusTable {
            path: path.to_owned(),
            source,
        })?;
    let mut paths = Vec::new();
    for row in reader.deserialize::<InstructionRow>() {
        paths.push(
            row.map_err(|source| TaskError::MalformedStimulusTable {
                path: path.to_owned(),
                source,
            })?
            .path,
        );
    }
    Ok(paths)
}

/// First byte of a trigger column as the wire code.
pub fn trigger_code(field: Option<&str>) -> Option<u8> {
    field.and_then(|s| s.bytes().next())
}

/// Splits stimuli into presentation blocks. Every item lands in exactly one
/// block; a short tail becomes a final smaller block rather than being
/// dropped.
pub fn chunk_blocks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    items.chunks(size).map(<[T]>::to_vec).collect()
}
