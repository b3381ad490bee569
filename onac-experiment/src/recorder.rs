use std::fs;
use std::path::Path;

use csv::WriterBuilder;
use onac_core::TrialRecord;

use crate::error::TaskError;

/// Sentinel written for undefined responses, reaction times and scores.
const NA: &str = "NA";

/// Accumulates one task's trial records in order. Append is the only
/// mutation; records are never edited after creation.
#[derive(Debug, Default)]
pub struct TrialRecorder {
    records: Vec<TrialRecord>,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the full sequence to `path`, one row per trial. The file is
    /// truncated first, so re-flushing the same sequence produces
    /// byte-identical output.
    pub fn flush(&self, path: &Path) -> Result<(), TaskError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        let mut writer = WriterBuilder::new().from_writer(file);
        writer.write_record([
            "trial",
            "block",
            "condition",
            "stimulus",
            "triggers",
            "response",
            "reaction_time",
            "correct",
        ])?;
        for record in &self.records {
            writer.write_record([
                record.trial.to_string(),
                record
                    .block
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| NA.to_owned()),
                record.condition.clone(),
                record.stimulus.clone(),
                record.triggers.clone(),
                record.response.clone().unwrap_or_else(|| NA.to_owned()),
                record
                    .reaction_time
                    .map(|rt| format!("{rt:.4}"))
                    .unwrap_or_else(|| NA.to_owned()),
                record
                    .correct
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| NA.to_owned()),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(trial: usize, response: Option<&str>, rt: Option<f64>) -> TrialRecord {
        TrialRecord {
            trial,
            block: Some(1),
            condition: "test".into(),
            stimulus: "house.png".into(),
            triggers: "EF".into(),
            response: response.map(str::to_owned),
            reaction_time: rt,
            correct: None,
        }
    }

    #[test]
    fn flush_is_idempotent() {
        let dir = std::env::temp_dir().join("onac-recorder-test");
        let path = dir.join("task.csv");
        let mut recorder = TrialRecorder::new();
        recorder.record(sample(0, Some("left"), Some(1.1)));
        recorder.record(sample(1, None, None));

        recorder.flush(&path).unwrap();
        let first = fs::read(&path).unwrap();
        recorder.flush(&path).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn no_response_serializes_as_na_not_zero() {
        let dir = std::env::temp_dir().join("onac-recorder-na");
        let path = dir.join("task.csv");
        let mut recorder = TrialRecorder::new();
        recorder.record(sample(0, None, None));
        recorder.flush(&path).unwrap();
        let body = fs::read_to_string(&path).unwrap();
        let row = body.lines().nth(1).unwrap();
        assert!(row.contains(",NA,NA,"), "row was {row}");
        assert!(!row.contains(",0,"), "row was {row}");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn rows_keep_append_order() {
        let mut recorder = TrialRecorder::new();
        for i in 0..5 {
            recorder.record(sample(i, None, None));
        }
        let trials: Vec<usize> = recorder.records().iter().map(|r| r.trial).collect();
        assert_eq!(trials, vec![0, 1, 2, 3, 4]);
    }
}
