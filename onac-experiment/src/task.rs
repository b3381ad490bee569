use std::path::{Path, PathBuf};

use onac_core::{
    MetronomeSpec, PhaseDisplay, PhaseSchedule, ResponseSpec, SoundSpec, StimulusKind, TrialSpec,
};

use crate::config::{
    BreathHoldingConfig, MemoryEncodingConfig, MismatchedNegativityConfig, NaturalisticMotorConfig,
    ObjectRecognitionConfig, RestingStateConfig, SimpleMotorConfig, VisualStimulationConfig,
};
use crate::stimuli::{chunk_blocks, trigger_code, StimulusRow};

/// One scheduled unit of a task: a trial plus how the driver treats it.
/// Baselines, pauses and practice items are trials too; they just are not
/// recorded.
#[derive(Debug, Clone)]
pub struct PlannedTrial {
    pub schedule: PhaseSchedule,
    pub spec: TrialSpec,
    /// Whether the session jitter stretches this trial's final phase.
    pub jitter: bool,
    pub recorded: bool,
}

/// A whole task expressed as data: the same runner executes every task, so
/// the per-task differences live entirely in this table.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub name: &'static str,
    /// Result CSV stem; `None` for tasks that record nothing.
    pub output_stem: Option<&'static str>,
    /// Instruction-screen table shown before the trials, when the task has one.
    pub instructions: Option<PathBuf>,
    pub trials: Vec<PlannedTrial>,
    /// Planned-trial indices after which a self-paced break screen shows.
    pub breaks_after: Vec<usize>,
}

/// Fixation-cross rest between blocks or trials. Jittered so the imaging
/// device never sees a perfectly periodic trial rate.
fn fixation_baseline(secs: f64, start_trigger: Option<u8>, end_trigger: Option<u8>) -> PlannedTrial {
    let mut spec = TrialSpec::silent("baseline", "baseline", StimulusKind::None);
    spec.phase_triggers = vec![start_trigger];
    spec.end_trigger = end_trigger;
    PlannedTrial {
        schedule: PhaseSchedule::single("baseline", secs, PhaseDisplay::Fixation),
        spec,
        jitter: true,
        recorded: false,
    }
}

/// Blank settling pause, the between-trials wait.
fn blank_pause(secs: f64) -> PlannedTrial {
    PlannedTrial {
        schedule: PhaseSchedule::single("pause", secs, PhaseDisplay::Blank),
        spec: TrialSpec::silent("pause", "pause", StimulusKind::None),
        jitter: true,
        recorded: false,
    }
}

/// Object recognition: blocked picture naming. `C` marks block start on the
/// flip that ends the pre-block baseline, `E`/`F` bracket each stimulus, and
/// `D` marks block end at the head of the post-block rest.
pub fn object_recognition(
    cfg: &ObjectRecognitionConfig,
    rows: &[StimulusRow],
    stim_dir: &Path,
    instructions: Option<PathBuf>,
) -> TaskPlan {
    let image_dir = stim_dir.join("object_recognition_task/test_stimuli");
    let split = cfg.practice_trials.min(rows.len());
    let (practice, main) = rows.split_at(split);
    let take = (cfg.stimuli_per_block * cfg.blocks).min(main.len());
    let blocks = chunk_blocks(&main[..take], cfg.stimuli_per_block);

    let mut trials = Vec::new();
    for row in practice {
        let Some(stim) = row.stimulus.as_deref() else {
            continue;
        };
        trials.push(PlannedTrial {
            schedule: PhaseSchedule::from_durations(&[
                ("stimulus", cfg.stimulus_secs, PhaseDisplay::Stimulus),
                ("blank", cfg.blank_secs, PhaseDisplay::Blank),
            ]),
            spec: TrialSpec::silent(stim, "practice", StimulusKind::Image(image_dir.join(stim))),
            jitter: true,
            recorded: false,
        });
    }

    for (block_idx, block) in blocks.iter().enumerate() {
        trials.push(fixation_baseline(
            cfg.block_baseline_secs,
            None,
            Some(b'C'),
        ));
        for row in block {
            let Some(stim) = row.stimulus.as_deref() else {
                continue;
            };
            let mut spec =
                TrialSpec::silent(stim, "object", StimulusKind::Image(image_dir.join(stim)));
            spec.block = Some(block_idx);
            spec.phase_triggers = vec![Some(b'E'), None];
            spec.end_trigger = Some(b'F');
            trials.push(PlannedTrial {
                schedule: PhaseSchedule::from_durations(&[
                    ("stimulus", cfg.stimulus_secs, PhaseDisplay::Stimulus),
                    ("blank", cfg.blank_secs, PhaseDisplay::Blank),
                ]),
                spec,
                jitter: false,
                recorded: true,
            });
        }
        trials.push(fixation_baseline(
            cfg.post_block_baseline_secs,
            Some(b'D'),
            None,
        ));
    }

    TaskPlan {
        name: "object recognition",
        output_stem: Some("object_recognition_task"),
        instructions,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Mismatched negativity: auditory oddball under a silent movie. One tone
/// per second, per-tone trigger codes from the stimulus table, one record
/// per tone.
pub fn mismatched_negativity(
    cfg: &MismatchedNegativityConfig,
    movie_rows: &[StimulusRow],
    tone_rows: &[StimulusRow],
    stim_dir: &Path,
) -> TaskPlan {
    let sound_dir = stim_dir.join("mismatched_negativity_task/auditory_stimuli");
    let mut trials = vec![fixation_baseline(cfg.baseline_secs, None, None)];

    for block_idx in 0..cfg.blocks {
        let movie = movie_rows
            .get(block_idx)
            .and_then(|r| r.stimulus.as_deref())
            .map(|m| stim_dir.join(m));
        for row in tone_rows.iter().filter(|r| r.block == Some(block_idx)) {
            let Some(sound) = row.sound.as_deref() else {
                continue;
            };
            let mut spec = TrialSpec::silent(
                sound,
                row.condition.clone().unwrap_or_default(),
                movie
                    .clone()
                    .map_or(StimulusKind::None, StimulusKind::Movie),
            );
            spec.block = Some(block_idx);
            spec.sound = Some(SoundSpec::File(sound_dir.join(format!("{sound}.wav"))));
            spec.phase_triggers = vec![trigger_code(row.trigger.as_deref())];
            trials.push(PlannedTrial {
                schedule: PhaseSchedule::single("tone", cfg.tone_secs, PhaseDisplay::Stimulus),
                spec,
                jitter: false,
                recorded: true,
            });
        }
    }

    TaskPlan {
        name: "mismatched negativity",
        output_stem: Some("mismatched_negativity_task"),
        instructions: None,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Visual flicker stimulation: repeated 10s gratings bracketed by rest.
/// Flicker frequency must stay below the imaging device's sampling rate;
/// it is recorded per trial so runs are reconstructable.
pub fn visual_stimulation(
    cfg: &VisualStimulationConfig,
    rows: &[StimulusRow],
    stim_dir: &Path,
) -> TaskPlan {
    let grating = stim_dir.join(&cfg.grating);
    let mut trials = vec![fixation_baseline(cfg.initial_baseline_secs, None, None)];

    for _ in 0..cfg.repetitions {
        for row in rows {
            let Some(frequency) = row.frequency else {
                continue;
            };
            trials.push(fixation_baseline(cfg.surround_baseline_secs, None, None));
            let mut spec = TrialSpec::silent(
                "grating",
                format!("{frequency}Hz"),
                StimulusKind::Image(grating.clone()),
            );
            spec.phase_triggers = vec![trigger_code(row.trigger.as_deref())];
            trials.push(PlannedTrial {
                schedule: PhaseSchedule::single(
                    "flicker",
                    cfg.flicker_secs,
                    PhaseDisplay::Stimulus,
                ),
                spec,
                jitter: false,
                recorded: true,
            });
        }
    }
    trials.push(fixation_baseline(cfg.surround_baseline_secs, None, None));

    TaskPlan {
        name: "visual stimulation",
        output_stem: Some("visual_stimulation_task"),
        instructions: None,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Implicit memory encoding: question then image, with the image phase open
/// for the indoor/outdoor judgment.
pub fn memory_encoding(
    cfg: &MemoryEncodingConfig,
    rows: &[StimulusRow],
    stim_dir: &Path,
) -> TaskPlan {
    let image_dir = stim_dir.join("memory_task/encoding_stimuli");
    let mut trials = Vec::new();
    for row in rows.iter().take(cfg.trials) {
        let Some(stim) = row.stimulus.as_deref() else {
            continue;
        };
        let mut spec = TrialSpec::silent(
            stim,
            row.condition.clone().unwrap_or_else(|| "encoding".into()),
            StimulusKind::Image(image_dir.join(stim)),
        );
        spec.prompt = Some(cfg.question.clone());
        spec.phase_triggers = vec![None, Some(b'E')];
        spec.end_trigger = Some(b'F');
        spec.response = Some(ResponseSpec {
            phase: 1,
            keys: cfg.answer_keys.clone(),
            correct: row.correct.clone(),
            ends_trial: false,
        });
        trials.push(PlannedTrial {
            schedule: PhaseSchedule::from_durations(&[
                ("question", cfg.question_secs, PhaseDisplay::Prompt),
                ("image", cfg.image_secs, PhaseDisplay::Stimulus),
            ]),
            spec,
            jitter: false,
            recorded: true,
        });
    }

    TaskPlan {
        name: "memory encoding",
        output_stem: Some("memory_task"),
        instructions: None,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Resting state: one long blank window bracketed by `G`/`H`, with a short
/// settling pause before it and an end tone after.
pub fn resting_state(cfg: &RestingStateConfig, instructions: Option<PathBuf>) -> TaskPlan {
    let mut spec = TrialSpec::silent("resting_state", "rest", StimulusKind::None);
    spec.phase_triggers = vec![Some(b'G'), Some(b'H')];
    let rest = PlannedTrial {
        schedule: PhaseSchedule::from_durations(&[
            ("rest", cfg.minutes * 60.0, PhaseDisplay::Blank),
            ("tail", cfg.tail_secs, PhaseDisplay::Blank),
        ]),
        spec,
        jitter: false,
        recorded: false,
    };

    let mut tone = TrialSpec::silent("end_tone", "rest", StimulusKind::None);
    tone.sound = Some(SoundSpec::Tone {
        note: 'C',
        secs: 0.1,
    });
    let tone = PlannedTrial {
        schedule: PhaseSchedule::single("tone", 0.5, PhaseDisplay::Blank),
        spec: tone,
        jitter: false,
        recorded: false,
    };

    TaskPlan {
        name: "resting state",
        output_stem: None,
        instructions,
        trials: vec![blank_pause(2.0), rest, tone],
        breaks_after: Vec::new(),
    }
}

/// Simple motor: paced movement to a metronome, trigger codes from the
/// stimulus table.
pub fn simple_motor(cfg: &SimpleMotorConfig, rows: &[StimulusRow], stim_dir: &Path) -> TaskPlan {
    let metronome = MetronomeSpec {
        sound: SoundSpec::File(stim_dir.join(&cfg.metronome_clip)),
        period: 60.0 / cfg.metronome_bpm,
    };
    let mut trials = Vec::new();
    for row in rows {
        let Some(stim) = row.stimulus.as_deref() else {
            continue;
        };
        trials.push(fixation_baseline(cfg.pre_baseline_secs, None, None));
        let mut spec = TrialSpec::silent(stim, "motor", StimulusKind::Text(stim.to_owned()));
        spec.phase_triggers = vec![trigger_code(row.trigger.as_deref())];
        spec.end_trigger = trigger_code(row.end_trigger.as_deref());
        spec.metronome = Some(metronome.clone());
        trials.push(PlannedTrial {
            schedule: PhaseSchedule::single("movement", cfg.trial_secs, PhaseDisplay::Stimulus),
            spec,
            jitter: false,
            recorded: true,
        });
        trials.push(fixation_baseline(cfg.post_baseline_secs, None, None));
    }

    TaskPlan {
        name: "simple motor",
        output_stem: Some("simple_motor_task"),
        instructions: None,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Naturalistic motor: spoken instruction plus text prompt; any key ends the
/// action early and the end trigger goes out either way. The recorded
/// reaction time is the action duration.
pub fn naturalistic_motor(
    cfg: &NaturalisticMotorConfig,
    rows: &[StimulusRow],
    stim_dir: &Path,
) -> TaskPlan {
    let mut trials = Vec::new();
    for row in rows {
        let Some(stim) = row.stimulus.as_deref() else {
            continue;
        };
        trials.push(fixation_baseline(cfg.pre_baseline_secs, None, None));
        let mut spec = TrialSpec::silent(stim, "motor", StimulusKind::Text(stim.to_owned()));
        spec.sound = row
            .instruction
            .as_deref()
            .map(|clip| SoundSpec::File(stim_dir.join(clip)));
        spec.phase_triggers = vec![trigger_code(row.trigger.as_deref())];
        spec.end_trigger = trigger_code(row.end_trigger.as_deref());
        spec.response = Some(ResponseSpec {
            phase: 0,
            keys: Vec::new(),
            correct: None,
            ends_trial: true,
        });
        trials.push(PlannedTrial {
            schedule: PhaseSchedule::single("action", cfg.trial_secs, PhaseDisplay::Stimulus),
            spec,
            jitter: false,
            recorded: true,
        });
        trials.push(blank_pause(cfg.inter_trial_secs));
    }

    TaskPlan {
        name: "naturalistic motor",
        output_stem: Some("naturalistic_motor_task"),
        instructions: None,
        trials,
        breaks_after: Vec::new(),
    }
}

/// Breath holding: condition text for 20s per trial with mid-task breaks.
pub fn breath_holding(
    cfg: &BreathHoldingConfig,
    rows: &[StimulusRow],
    instructions: Option<PathBuf>,
) -> TaskPlan {
    let mut trials = Vec::new();
    let mut breaks_after = Vec::new();
    let mut main_idx = 0;
    for row in rows {
        let Some(condition) = row.condition.as_deref() else {
            continue;
        };
        trials.push(fixation_baseline(cfg.baseline_secs, None, None));
        let mut spec = TrialSpec::silent(
            condition,
            condition,
            StimulusKind::Text(condition.to_owned()),
        );
        spec.phase_triggers = vec![trigger_code(row.trigger.as_deref())];
        trials.push(PlannedTrial {
            schedule: PhaseSchedule::single("hold", cfg.trial_secs, PhaseDisplay::Stimulus),
            spec,
            jitter: false,
            recorded: true,
        });
        if cfg.breaks_after.contains(&main_idx) {
            breaks_after.push(trials.len() - 1);
        }
        main_idx += 1;
    }

    TaskPlan {
        name: "breath holding",
        output_stem: Some("breath_holding"),
        instructions,
        trials,
        breaks_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_rows(n: usize) -> Vec<StimulusRow> {
        (0..n)
            .map(|i| StimulusRow {
                stimulus: Some(format!("img_{i:02}.png")),
                ..StimulusRow::default()
            })
            .collect()
    }

    #[test]
    fn object_recognition_blocks_cover_every_stimulus_once() {
        let cfg = ObjectRecognitionConfig::default();
        let rows = image_rows(cfg.practice_trials + cfg.stimuli_per_block * cfg.blocks);
        let plan = object_recognition(&cfg, &rows, Path::new("stimuli"), None);

        let recorded: Vec<&str> = plan
            .trials
            .iter()
            .filter(|t| t.recorded)
            .map(|t| t.spec.id.as_str())
            .collect();
        assert_eq!(recorded.len(), cfg.stimuli_per_block * cfg.blocks);
        // No drop, no duplicate: the recorded ids are exactly the main rows.
        let expected: Vec<String> = rows[cfg.practice_trials..]
            .iter()
            .map(|r| r.stimulus.clone().unwrap())
            .collect();
        assert_eq!(recorded, expected.iter().map(String::as_str).collect::<Vec<_>>());
        // Each block is bracketed by a C-bearing baseline and a D-bearing one.
        let c_count = plan
            .trials
            .iter()
            .filter(|t| t.spec.end_trigger == Some(b'C'))
            .count();
        let d_count = plan
            .trials
            .iter()
            .filter(|t| t.spec.phase_triggers.first() == Some(&Some(b'D')))
            .count();
        assert_eq!(c_count, cfg.blocks);
        assert_eq!(d_count, cfg.blocks);
    }

    #[test]
    fn object_trials_carry_stimulus_markers() {
        let cfg = ObjectRecognitionConfig::default();
        let rows = image_rows(10);
        let plan = object_recognition(&cfg, &rows, Path::new("stimuli"), None);
        let trial = plan.trials.iter().find(|t| t.recorded).unwrap();
        assert_eq!(trial.spec.phase_triggers, vec![Some(b'E'), None]);
        assert_eq!(trial.spec.end_trigger, Some(b'F'));
        assert!((trial.schedule.total() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn mismatched_negativity_records_one_row_per_tone() {
        let cfg = MismatchedNegativityConfig::default();
        let movies = image_rows(cfg.blocks);
        let tones: Vec<StimulusRow> = (0..cfg.blocks)
            .flat_map(|b| {
                (0..4).map(move |i| StimulusRow {
                    sound: Some(format!("tone_{b}_{i}")),
                    condition: Some(if i == 3 { "deviant" } else { "standard" }.into()),
                    trigger: Some("S".into()),
                    block: Some(b),
                    ..StimulusRow::default()
                })
            })
            .collect();
        let plan = mismatched_negativity(&cfg, &movies, &tones, Path::new("stimuli"));
        let recorded = plan.trials.iter().filter(|t| t.recorded).count();
        assert_eq!(recorded, cfg.blocks * 4);
        let tone = plan.trials.iter().find(|t| t.recorded).unwrap();
        assert!(matches!(tone.spec.sound, Some(SoundSpec::File(_))));
        assert_eq!(tone.spec.phase_triggers, vec![Some(b'S')]);
    }

    #[test]
    fn resting_state_brackets_the_window_with_g_and_h() {
        let cfg = RestingStateConfig::default();
        let plan = resting_state(&cfg, None);
        let rest = &plan.trials[1];
        assert_eq!(rest.spec.phase_triggers, vec![Some(b'G'), Some(b'H')]);
        assert!((rest.schedule.total() - (5.0 * 60.0 + 3.0)).abs() < 1e-9);
        // H goes out at the start of the tail, 3s before the trial ends.
        assert!((rest.schedule.start_of(1) - 300.0).abs() < 1e-9);
        let tone = plan.trials.last().unwrap();
        assert!(matches!(
            tone.spec.sound,
            Some(SoundSpec::Tone { note: 'C', .. })
        ));
    }

    #[test]
    fn visual_stimulation_repeats_every_frequency() {
        let cfg = VisualStimulationConfig::default();
        let rows: Vec<StimulusRow> = [4.0, 6.0, 8.0]
            .into_iter()
            .map(|f| StimulusRow {
                frequency: Some(f),
                trigger: Some("V".into()),
                ..StimulusRow::default()
            })
            .collect();
        let plan = visual_stimulation(&cfg, &rows, Path::new("stimuli"));
        let flickers: Vec<&PlannedTrial> =
            plan.trials.iter().filter(|t| t.recorded).collect();
        assert_eq!(flickers.len(), cfg.repetitions * rows.len());
        assert_eq!(flickers[0].spec.condition, "4Hz");
        assert!((flickers[0].schedule.total() - cfg.flicker_secs).abs() < 1e-9);
        // Each flicker is preceded by a rest baseline.
        let baselines = plan.trials.iter().filter(|t| !t.recorded).count();
        assert_eq!(baselines, flickers.len() + 2);
    }

    #[test]
    fn breath_holding_breaks_after_the_configured_trials() {
        let cfg = BreathHoldingConfig::default();
        let rows: Vec<StimulusRow> = (0..10)
            .map(|i| StimulusRow {
                condition: Some(format!("hold_{i}")),
                trigger: Some("B".into()),
                ..StimulusRow::default()
            })
            .collect();
        let plan = breath_holding(&cfg, &rows, None);
        assert_eq!(plan.breaks_after.len(), 2);
        for &idx in &plan.breaks_after {
            assert!(plan.trials[idx].recorded, "break must follow a main trial");
        }
    }

    #[test]
    fn naturalistic_motor_lets_any_key_end_the_action() {
        let cfg = NaturalisticMotorConfig::default();
        let rows = vec![StimulusRow {
            stimulus: Some("Pour a glass of water".into()),
            trigger: Some("M".into()),
            end_trigger: Some("N".into()),
            instruction: Some("naturalistic_motor_task/pour.wav".into()),
            ..StimulusRow::default()
        }];
        let plan = naturalistic_motor(&cfg, &rows, Path::new("stimuli"));
        let action = plan.trials.iter().find(|t| t.recorded).unwrap();
        let response = action.spec.response.as_ref().unwrap();
        assert!(response.ends_trial);
        assert!(response.keys.is_empty());
        assert_eq!(action.spec.end_trigger, Some(b'N'));
    }

    #[test]
    fn simple_motor_paces_with_the_metronome() {
        let cfg = SimpleMotorConfig::default();
        let rows = vec![StimulusRow {
            stimulus: Some("Tap your right hand".into()),
            trigger: Some("M".into()),
            end_trigger: Some("N".into()),
            ..StimulusRow::default()
        }];
        let plan = simple_motor(&cfg, &rows, Path::new("stimuli"));
        let movement = plan.trials.iter().find(|t| t.recorded).unwrap();
        let metronome = movement.spec.metronome.as_ref().unwrap();
        assert!((metronome.period - 1.2).abs() < 1e-9);
    }

    #[test]
    fn memory_encoding_opens_the_window_on_the_image_phase() {
        let cfg = MemoryEncodingConfig::default();
        let rows: Vec<StimulusRow> = (0..80)
            .map(|i| StimulusRow {
                stimulus: Some(format!("scene_{i:02}.png")),
                condition: Some(if i % 2 == 0 { "indoor" } else { "outdoor" }.into()),
                correct: Some(if i % 2 == 0 { "left" } else { "right" }.into()),
                ..StimulusRow::default()
            })
            .collect();
        let plan = memory_encoding(&cfg, &rows, Path::new("stimuli"));
        assert_eq!(plan.trials.len(), cfg.trials);
        let trial = &plan.trials[0];
        let response = trial.spec.response.as_ref().unwrap();
        assert_eq!(response.phase, 1);
        assert_eq!(trial.schedule.phases()[1].display, PhaseDisplay::Stimulus);
        assert_eq!(trial.spec.prompt.as_deref(), Some("Indoor or outdoor?"));
    }
}
