//! Sequences the trials of one run and threads puzzle state between them.

use tracing::{error, info};

use crate::error::{Result, TaskError};
use crate::grid::{Coord, PuzzleState};
use crate::keymap::KeyMap;
use crate::present::Devices;
use crate::prng::Prng;
use crate::puzzles::PuzzleSet;
use crate::record::TrialRecord;
use crate::recorder::Recorder;
use crate::schedule::{Schedule, TrialDescriptor};
use crate::stats::SessionStats;
use crate::trial::{run_trial, StopReason, TrialEnv, TrialFlow, TrialInput};

#[derive(Debug)]
pub struct SessionOutcome {
    pub log: Vec<TrialRecord>,
    /// False when the quit key or an interrupt ended the run early.
    pub completed: bool,
    pub stop: Option<StopReason>,
    pub stats: SessionStats,
    pub seed: u64,
    pub puzzles_started: u32,
}

/// Carry-over between trials of the current puzzle.
#[derive(Debug)]
struct Progress {
    state: PuzzleState,
    cursor: Coord,
    highlight: Option<Coord>,
    counter: u32,
    started: u32,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: PuzzleState::blank(),
            cursor: Coord::ORIGIN,
            highlight: None,
            counter: 0,
            started: 0,
        }
    }

    fn input(&self) -> TrialInput<'_> {
        TrialInput {
            state: &self.state,
            cursor: self.cursor,
            highlight: self.highlight,
        }
    }

    fn adopt(&mut self, rec: &TrialRecord) {
        if let Some(choice) = rec.choice() {
            self.state = choice.state.clone();
            self.cursor = choice.cursor;
            self.highlight = choice.example.map(|_| choice.cursor);
        }
    }
}

pub struct Session<'a> {
    schedule: &'a Schedule,
    puzzles: &'a PuzzleSet,
    keymap: &'a KeyMap,
    corners: Vec<Coord>,
    seed: u64,
}

impl<'a> Session<'a> {
    /// Shuffles the starting corners once; the same seed gives the same order.
    pub fn new(
        schedule: &'a Schedule,
        puzzles: &'a PuzzleSet,
        keymap: &'a KeyMap,
        seed: u64,
    ) -> Self {
        let mut corners = Coord::CORNERS.to_vec();
        Prng::new(seed).shuffle(&mut corners);
        Self {
            schedule,
            puzzles,
            keymap,
            corners,
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn run(
        mut self,
        devices: &mut Devices<'_>,
        mut recorder: Recorder,
    ) -> Result<SessionOutcome> {
        let mut progress = Progress::new();
        let mut stats = SessionStats::new();
        let mut stop = None;

        info!(
            trials = self.schedule.len(),
            puzzles = self.puzzles.len(),
            variant = self.puzzles.variant(),
            keys = %self.keymap.preset(),
            seed = self.seed,
            "session start"
        );

        let schedule = self.schedule;
        for trial in schedule.trials() {
            // Late trials draw no frames and never poll the flag themselves.
            if devices.interrupt.is_raised() {
                stop = Some(StopReason::Interrupted);
                break;
            }
            if let Err(e) = self.enter(trial, &mut progress) {
                return Err(abandon(recorder, e));
            }

            let mut env = TrialEnv {
                keymap: self.keymap,
                puzzles: self.puzzles,
                devices: &mut *devices,
            };
            let flow = match run_trial(trial, progress.input(), &mut env) {
                Ok(flow) => flow,
                Err(e) => return Err(abandon(recorder, e)),
            };

            match flow {
                TrialFlow::Continue(rec) => {
                    progress.adopt(&rec);
                    stats.record(&rec);
                    recorder.append(rec);
                    recorder.persist()?;
                }
                TrialFlow::Stop(reason) => {
                    stop = Some(reason);
                    break;
                }
            }
        }

        if let Some(reason) = stop {
            info!(
                reason = reason.as_str(),
                saved = recorder.len(),
                "session stopped early"
            );
        }
        recorder.persist()?;
        info!(
            trials = stats.trials,
            selections = stats.selections,
            misses = stats.misses,
            "session finished"
        );

        Ok(SessionOutcome {
            log: recorder.into_records(),
            completed: stop.is_none(),
            stop,
            stats,
            seed: self.seed,
            puzzles_started: progress.started,
        })
    }

    /// Applies puzzle boundaries before `trial` runs.
    fn enter(&mut self, trial: &TrialDescriptor, progress: &mut Progress) -> Result<()> {
        match trial.problem_idx {
            Some(idx) if idx > progress.counter => {
                self.open_puzzle(progress, trial)?;
                progress.counter = idx;
            }
            _ if trial.kind.needs_puzzle() && progress.started == 0 => {
                self.open_puzzle(progress, trial)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn open_puzzle(&mut self, progress: &mut Progress, trial: &TrialDescriptor) -> Result<()> {
        let puzzle = progress.started + 1;
        let corner = self
            .corners
            .pop()
            .ok_or(TaskError::ExhaustedCorners { puzzle })?;
        progress.state = PuzzleState::blank();
        progress.cursor = corner;
        progress.started = puzzle;
        info!(
            puzzle,
            problem = trial.problem,
            start = %corner,
            kind = trial.kind.name(),
            "new puzzle"
        );
        Ok(())
    }
}

/// Save what has been recorded before surfacing a fatal error.
fn abandon(mut recorder: Recorder, e: TaskError) -> TaskError {
    error!(error = %e, saved = recorder.len(), "session failed");
    if let Err(save) = recorder.persist() {
        error!(error = %save, "could not save data after failure");
    }
    e
}
