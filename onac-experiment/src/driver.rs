use std::collections::VecDeque;
use std::path::PathBuf;

use onac_core::SoundSpec;
use onac_trigger::{TriggerError, TriggerSink};
use rand::Rng;

use crate::error::TaskError;
use crate::recorder::TrialRecorder;
use crate::runner::{FrameContent, TickOutput, TrialRunner};
use crate::session::SessionContext;
use crate::stimuli::{load_instruction_paths, load_stimulus_table};
use crate::task::{self, TaskPlan};

/// How long the closing screen stays up before the process may exit.
const END_SCREEN_SECS: f64 = 3.0;

/// Result of advancing one task by one refresh tick.
#[derive(Debug)]
pub enum TaskTick {
    Frame(TickOutput),
    /// A self-paced break is due; the caller resumes on the next key.
    Break,
    Finished,
}

/// Executes one `TaskPlan`: starts each planned trial, feeds it ticks,
/// collects records, and reports breaks. The same driver runs every task;
/// the differences live in the plan.
pub struct TaskDriver<R: Rng> {
    plan: TaskPlan,
    rng: R,
    jitter_max: f64,
    next: usize,
    runner: Option<TrialRunner>,
    trial_start: f64,
    recorder: TrialRecorder,
    recorded_count: usize,
}

impl<R: Rng> TaskDriver<R> {
    pub fn new(plan: TaskPlan, jitter_max: f64, rng: R) -> Self {
        Self {
            plan,
            rng,
            jitter_max,
            next: 0,
            runner: None,
            trial_start: 0.0,
            recorder: TrialRecorder::new(),
            recorded_count: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.plan.name
    }

    pub fn output_stem(&self) -> Option<&'static str> {
        self.plan.output_stem
    }

    pub fn recorder(&self) -> &TrialRecorder {
        &self.recorder
    }

    pub fn finished(&self) -> bool {
        self.runner.is_none() && self.next >= self.plan.trials.len()
    }

    /// Advances the task to session time `now` with this tick's key events.
    pub fn tick(
        &mut self,
        now: f64,
        keys: &[String],
        sink: &mut impl TriggerSink,
    ) -> Result<TaskTick, TriggerError> {
        if self.runner.is_none() {
            let Some(planned) = self.plan.trials.get(self.next) else {
                return Ok(TaskTick::Finished);
            };
            let mut schedule = planned.schedule.clone();
            if planned.jitter && self.jitter_max > 0.0 {
                schedule.extend_last(self.rng.random_range(0.0..self.jitter_max));
            }
            self.runner = Some(TrialRunner::new(schedule, planned.spec.clone())?);
            self.trial_start = now;
            if planned.recorded {
                println!("Trial {} started at {now:.3}s", self.recorded_count);
            }
        }
        let Some(runner) = self.runner.as_mut() else {
            return Ok(TaskTick::Finished);
        };

        let elapsed = now - self.trial_start;
        let out = runner.tick(elapsed, keys, sink);
        if out.completed {
            if let Some(done) = self.runner.take() {
                let planned = &self.plan.trials[self.next];
                if planned.recorded {
                    self.recorder.record(done.into_record(self.recorded_count));
                    self.recorded_count += 1;
                }
            }
            let finished_idx = self.next;
            self.next += 1;
            if self.plan.breaks_after.contains(&finished_idx) {
                return Ok(TaskTick::Break);
            }
        }
        Ok(TaskTick::Frame(out))
    }
}

/// The fixed task sequence of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Introduction,
    RestingState,
    ObjectRecognition,
    MismatchedNegativity,
    VisualStimulation,
    MemoryEncoding,
    SimpleMotor,
    NaturalisticMotor,
    BreathHolding,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Introduction => "introduction",
            Self::RestingState => "resting state",
            Self::ObjectRecognition => "object recognition",
            Self::MismatchedNegativity => "mismatched negativity",
            Self::VisualStimulation => "visual stimulation",
            Self::MemoryEncoding => "memory encoding",
            Self::SimpleMotor => "simple motor",
            Self::NaturalisticMotor => "naturalistic motor",
            Self::BreathHolding => "breath holding",
        }
    }

    /// The default full protocol.
    pub fn standard_sequence() -> Vec<TaskKind> {
        vec![
            Self::Introduction,
            Self::RestingState,
            Self::ObjectRecognition,
            Self::MismatchedNegativity,
            Self::VisualStimulation,
            Self::MemoryEncoding,
            Self::SimpleMotor,
            Self::NaturalisticMotor,
            Self::BreathHolding,
        ]
    }

    /// Loads this task's stimulus tables and expands it into a plan. Read
    /// once, immediately before the task runs, so an asset missing for a
    /// later task can never disturb records already flushed.
    pub fn build(&self, session: &SessionContext) -> Result<TaskPlan, TaskError> {
        let cfg = &session.config;
        let stim_dir = cfg.stimuli_dir.clone();
        match self {
            Self::Introduction => Ok(TaskPlan {
                name: "introduction",
                output_stem: None,
                instructions: Some(session.stimulus_path("Instructions/overall_instructions.csv")),
                trials: Vec::new(),
                breaks_after: Vec::new(),
            }),
            Self::RestingState => Ok(task::resting_state(
                &cfg.resting_state,
                Some(session.stimulus_path("resting_state/resting_state_instructions.csv")),
            )),
            Self::ObjectRecognition => {
                let table = session.participant_table(
                    "object_recognition_task/stimuli",
                    "object_recognition_task_stimuli",
                );
                let rows = load_stimulus_table(&table)?;
                Ok(task::object_recognition(
                    &cfg.object_recognition,
                    &rows,
                    &stim_dir,
                    Some(session.stimulus_path(
                        "object_recognition_task/object_recognition_instructions.csv",
                    )),
                ))
            }
            Self::MismatchedNegativity => {
                let movies = load_stimulus_table(
                    &session.stimulus_path("mismatched_negativity_task/MMN_movie_stimuli.csv"),
                )?;
                let tones = load_stimulus_table(
                    &session.stimulus_path("mismatched_negativity_task/auditory_stimuli.csv"),
                )?;
                Ok(task::mismatched_negativity(
                    &cfg.mismatched_negativity,
                    &movies,
                    &tones,
                    &stim_dir,
                ))
            }
            Self::VisualStimulation => {
                let table = session
                    .participant_table("visual_stimulation_task", "visual_stimulation_stimuli");
                let rows = load_stimulus_table(&table)?;
                Ok(task::visual_stimulation(&cfg.visual_stimulation, &rows, &stim_dir))
            }
            Self::MemoryEncoding => {
                let table = session.participant_table("memory_task", "encoding_stimuli");
                let rows = load_stimulus_table(&table)?;
                Ok(task::memory_encoding(&cfg.memory_encoding, &rows, &stim_dir))
            }
            Self::SimpleMotor => {
                let table = session
                    .participant_table("simple_motor_task/stimuli", "simple_motor_task_stimuli");
                let rows = load_stimulus_table(&table)?;
                Ok(task::simple_motor(&cfg.simple_motor, &rows, &stim_dir))
            }
            Self::NaturalisticMotor => {
                let rows = load_stimulus_table(&session.stimulus_path(
                    "naturalistic_motor_task/naturalistic_motor_task_stimuli.csv",
                ))?;
                Ok(task::naturalistic_motor(&cfg.naturalistic_motor, &rows, &stim_dir))
            }
            Self::BreathHolding => {
                let rows = load_stimulus_table(
                    &session.stimulus_path("breath_holding/breath_holding_stimuli.csv"),
                )?;
                Ok(task::breath_holding(
                    &cfg.breath_holding,
                    &rows,
                    Some(session.stimulus_path("breath_holding/instructions.csv")),
                ))
            }
        }
    }
}

/// What the shell should do with the tick it just gave the driver.
#[derive(Debug)]
pub enum Directive {
    Frame {
        frame: FrameContent,
        sound: Option<SoundSpec>,
    },
    /// Show the image and hold until any key. Bounded waits like this only
    /// ever occur between trials, never inside a timed phase.
    WaitKey { image: PathBuf },
    Finished,
}

enum Stage<R: Rng> {
    Between,
    Screens {
        images: Vec<PathBuf>,
        idx: usize,
        then: Option<TaskDriver<R>>,
    },
    Running {
        driver: TaskDriver<R>,
        paused: bool,
    },
    TaskDone,
    Ending {
        until: Option<f64>,
    },
    Done,
}

/// Sequences the whole session: instruction screens, tasks, breaks, the
/// closing screen. Driven one refresh tick at a time; the escape key is
/// honored between tasks only, matching the protocol's scope.
pub struct ExperimentDriver<R: Rng + Clone> {
    session: SessionContext,
    tasks: VecDeque<TaskKind>,
    rng: R,
    stage: Stage<R>,
}

impl<R: Rng + Clone> ExperimentDriver<R> {
    pub fn new(session: SessionContext, tasks: Vec<TaskKind>, rng: R) -> Self {
        Self {
            session,
            tasks: tasks.into(),
            rng,
            stage: Stage::Between,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Advances the session to time `now` with this tick's key events and
    /// returns what the shell should present.
    pub fn tick(&mut self, now: f64, keys: &[String]) -> Result<Directive, TaskError> {
        let Self {
            session,
            tasks,
            rng,
            stage,
        } = self;
        let mut keys = keys;
        loop {
            match stage {
                Stage::Between => {
                    if keys.iter().any(|k| k == "escape") {
                        println!("Ending experiment...");
                        *stage = Stage::Ending { until: None };
                        continue;
                    }
                    let Some(kind) = tasks.pop_front() else {
                        println!("Ending experiment...");
                        *stage = Stage::Ending { until: None };
                        continue;
                    };
                    println!("Running {} task...", kind.name());
                    let plan = kind.build(session)?;
                    let images = match &plan.instructions {
                        Some(csv) => load_instruction_paths(csv)?,
                        None => Vec::new(),
                    };
                    let driver = (!plan.trials.is_empty())
                        .then(|| TaskDriver::new(plan, session.config.jitter_max, rng.clone()));
                    *stage = if images.is_empty() {
                        match driver {
                            Some(driver) => Stage::Running {
                                driver,
                                paused: false,
                            },
                            None => Stage::Between,
                        }
                    } else {
                        Stage::Screens {
                            images,
                            idx: 0,
                            then: driver,
                        }
                    };
                }
                Stage::Screens { images, idx, then } => {
                    if !keys.is_empty() && *idx < images.len() {
                        *idx += 1;
                        keys = &[];
                    }
                    if *idx >= images.len() {
                        *stage = match then.take() {
                            Some(driver) => Stage::Running {
                                driver,
                                paused: false,
                            },
                            None => Stage::Between,
                        };
                        continue;
                    }
                    return Ok(Directive::WaitKey {
                        image: images[*idx].clone(),
                    });
                }
                Stage::Running { driver, paused } => {
                    if *paused {
                        if keys.is_empty() {
                            return Ok(Directive::WaitKey {
                                image: session.stimulus_path("Instructions/break.png"),
                            });
                        }
                        *paused = false;
                        keys = &[];
                    }
                    match driver.tick(now, keys, &mut session.trigger)? {
                        TaskTick::Frame(out) => {
                            return Ok(Directive::Frame {
                                frame: out.frame,
                                sound: out.sound,
                            });
                        }
                        TaskTick::Break => {
                            println!("Break time!");
                            *paused = true;
                            return Ok(Directive::WaitKey {
                                image: session.stimulus_path("Instructions/break.png"),
                            });
                        }
                        TaskTick::Finished => {
                            if let Some(stem) = driver.output_stem() {
                                println!("Saving data...");
                                driver.recorder().flush(&session.output_path(stem))?;
                            }
                            *stage = Stage::TaskDone;
                        }
                    }
                }
                Stage::TaskDone => {
                    if keys.is_empty() {
                        return Ok(Directive::WaitKey {
                            image: session.stimulus_path("Instructions/task_finished.png"),
                        });
                    }
                    *stage = Stage::Between;
                    keys = &[];
                }
                Stage::Ending { until } => {
                    let deadline = *until.get_or_insert(now + END_SCREEN_SECS);
                    if now >= deadline {
                        *stage = Stage::Done;
                        continue;
                    }
                    return Ok(Directive::Frame {
                        frame: FrameContent::Image(
                            session.stimulus_path("Instructions/study_finished.png"),
                        ),
                        sound: None,
                    });
                }
                Stage::Done => return Ok(Directive::Finished),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExperimentConfig, RestingStateConfig};
    use onac_core::{PhaseDisplay, PhaseSchedule, StimulusKind, TrialSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;

    const TICK: f64 = 1.0 / 60.0;

    struct NullSink;
    impl TriggerSink for NullSink {
        fn send(&mut self, _code: u8) -> bool {
            false
        }
    }

    fn short_plan() -> TaskPlan {
        let baseline = crate::task::PlannedTrial {
            schedule: PhaseSchedule::single("baseline", 0.5, PhaseDisplay::Fixation),
            spec: TrialSpec::silent("baseline", "baseline", StimulusKind::None),
            jitter: true,
            recorded: false,
        };
        let mut trigger_spec = TrialSpec::silent("go", "test", StimulusKind::Text("go".into()));
        trigger_spec.phase_triggers = vec![Some(b'E')];
        let main = crate::task::PlannedTrial {
            schedule: PhaseSchedule::single("go", 1.0, PhaseDisplay::Stimulus),
            spec: trigger_spec,
            jitter: false,
            recorded: true,
        };
        TaskPlan {
            name: "test task",
            output_stem: None,
            instructions: None,
            trials: vec![baseline, main],
            breaks_after: Vec::new(),
        }
    }

    #[test]
    fn task_driver_runs_trials_in_order_and_records_only_main_ones() {
        let mut driver = TaskDriver::new(short_plan(), 0.1, StdRng::seed_from_u64(7));
        let mut sink = NullSink;
        let mut t = 0.0;
        loop {
            match driver.tick(t, &[], &mut sink).unwrap() {
                TaskTick::Finished => break,
                _ => t += TICK,
            }
            assert!(t < 10.0, "task never finished");
        }
        assert!(driver.finished());
        assert_eq!(driver.recorder().len(), 1);
        let record = &driver.recorder().records()[0];
        assert_eq!(record.stimulus, "go");
        assert_eq!(record.triggers, "E");
    }

    #[test]
    fn jittered_trials_stay_within_the_jitter_bound() {
        // The 0.5s baseline must complete no earlier than 0.5s and no later
        // than 0.6s plus one refresh period.
        let plan = TaskPlan {
            trials: vec![short_plan().trials[0].clone()],
            ..short_plan()
        };
        let mut driver = TaskDriver::new(plan, 0.1, StdRng::seed_from_u64(11));
        let mut sink = NullSink;
        let mut t = 0.0;
        let mut completed_at = None;
        while completed_at.is_none() {
            match driver.tick(t, &[], &mut sink).unwrap() {
                TaskTick::Frame(out) if out.completed => completed_at = Some(t),
                TaskTick::Finished => break,
                _ => {}
            }
            t += TICK;
            assert!(t < 2.0, "baseline never completed");
        }
        let done = completed_at.unwrap();
        assert!(done >= 0.5 - 1e-9, "completed early at {done}");
        assert!(done <= 0.6 + TICK + 1e-9, "completed late at {done}");
    }

    fn scaffold(tag: &str) -> ExperimentConfig {
        let root = std::env::temp_dir().join(format!("onac-driver-{tag}"));
        fs::remove_dir_all(&root).ok();
        let stimuli = root.join("stimuli");
        fs::create_dir_all(stimuli.join("resting_state")).unwrap();
        fs::write(
            stimuli.join("resting_state/resting_state_instructions.csv"),
            "path\nresting_state/instructions_1.png\n",
        )
        .unwrap();
        ExperimentConfig {
            data_dir: root.join("data"),
            stimuli_dir: stimuli,
            resting_state: RestingStateConfig {
                minutes: 0.005,
                tail_secs: 0.2,
            },
            ..ExperimentConfig::default()
        }
    }

    fn drive_until<F>(driver: &mut ExperimentDriver<StdRng>, t: &mut f64, mut pred: F) -> Directive
    where
        F: FnMut(&Directive) -> bool,
    {
        loop {
            let directive = driver.tick(*t, &[]).unwrap();
            if pred(&directive) {
                return directive;
            }
            *t += TICK;
            assert!(*t < 30.0, "predicate never satisfied");
        }
    }

    #[test]
    fn full_resting_state_session_reaches_the_end_screen() {
        let session =
            SessionContext::new("42", None, scaffold("resting")).unwrap();
        let mut driver =
            ExperimentDriver::new(session, vec![TaskKind::RestingState], StdRng::seed_from_u64(3));
        let mut t = 0.0;

        // Instruction screen holds until a key arrives.
        let first = driver.tick(t, &[]).unwrap();
        assert!(matches!(first, Directive::WaitKey { .. }));
        t += TICK;
        let again = driver.tick(t, &[]).unwrap();
        assert!(matches!(again, Directive::WaitKey { .. }));
        t += TICK;
        driver.tick(t, &["space".into()]).unwrap();
        t += TICK;

        // Trials run, the task finishes, the task-finished screen waits.
        drive_until(&mut driver, &mut t, |d| {
            matches!(d, Directive::WaitKey { image } if image.ends_with("Instructions/task_finished.png"))
        });
        driver.tick(t, &["space".into()]).unwrap();
        t += TICK;

        // No tasks left: closing screen, then finished.
        drive_until(&mut driver, &mut t, |d| {
            matches!(d, Directive::Finished)
        });
    }

    #[test]
    fn escape_between_tasks_ends_the_session() {
        let session = SessionContext::new("43", None, scaffold("escape")).unwrap();
        let mut driver = ExperimentDriver::new(
            session,
            vec![TaskKind::RestingState],
            StdRng::seed_from_u64(5),
        );
        // Escape is honored before the pending task ever builds.
        let directive = driver.tick(0.0, &["escape".into()]).unwrap();
        assert!(matches!(directive, Directive::Frame { .. }));
        let end = driver.tick(END_SCREEN_SECS + 0.1, &[]).unwrap();
        assert!(matches!(end, Directive::Finished));
    }

    #[test]
    fn missing_stimulus_table_fails_the_task_before_any_trial() {
        let session = SessionContext::new("44", None, scaffold("missing")).unwrap();
        let mut driver = ExperimentDriver::new(
            session,
            vec![TaskKind::ObjectRecognition],
            StdRng::seed_from_u64(9),
        );
        let err = driver.tick(0.0, &[]).unwrap_err();
        assert!(matches!(err, TaskError::MissingStimulusAsset(_)));
    }

    #[test]
    fn standard_sequence_covers_every_task() {
        let seq = TaskKind::standard_sequence();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq.first(), Some(&TaskKind::Introduction));
    }
}
