//! Timing schedules: the ordered trial list for one run.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TaskError};
use crate::puzzles::PuzzleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialKind {
    Pause,
    Study,
    Choose,
    Pre,
    Show,
    Rate,
}

impl TrialKind {
    pub fn name(self) -> &'static str {
        match self {
            TrialKind::Pause => "pause",
            TrialKind::Study => "study",
            TrialKind::Choose => "choose",
            TrialKind::Pre => "pre",
            TrialKind::Show => "show",
            TrialKind::Rate => "rate",
        }
    }

    /// Kinds that draw a puzzle and therefore need a `problem` reference.
    pub fn needs_puzzle(self) -> bool {
        matches!(self, TrialKind::Study | TrialKind::Choose | TrialKind::Show)
    }
}

/// One scheduled trial. Fields the task does not interpret are kept in
/// `extra` and written back out with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDescriptor {
    #[serde(rename = "type")]
    pub kind: TrialKind,
    /// Scheduled onset, seconds on the session clock.
    pub ons: f64,
    /// Scheduled duration in seconds.
    pub dur: f64,
    /// Index into the puzzle set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<usize>,
    /// Ordinal of the puzzle within this run; an increase starts a new puzzle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_idx: Option<u32>,
    /// Display order of the hypotheses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrialDescriptor {
    pub fn new(kind: TrialKind, ons: f64, dur: f64) -> Self {
        Self {
            kind,
            ons,
            dur,
            problem: None,
            problem_idx: None,
            order: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_problem(mut self, problem: usize, problem_idx: u32) -> Self {
        self.problem = Some(problem);
        self.problem_idx = Some(problem_idx);
        self
    }

    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Session-clock time at which the trial ends.
    pub fn deadline(&self) -> f64 {
        self.ons + self.dur
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    trials: Vec<TrialDescriptor>,
}

impl Schedule {
    pub fn new(trials: Vec<TrialDescriptor>) -> Self {
        Self { trials }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TaskError::MissingSchedule {
                path: path.to_path_buf(),
            },
            _ => TaskError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let trials: Vec<TrialDescriptor> = serde_json::from_str(&text)
            .map_err(|e| TaskError::MalformedSchedule(format!("{}: {e}", path.display())))?;
        Ok(Self { trials })
    }

    pub fn trials(&self) -> &[TrialDescriptor] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// End of the last trial, in seconds.
    pub fn run_length(&self) -> f64 {
        self.trials.last().map(TrialDescriptor::deadline).unwrap_or(0.0)
    }

    /// Scanner volumes needed to cover the run at repetition time `tr`.
    pub fn volumes(&self, tr: f64) -> u32 {
        if tr <= 0.0 {
            return 0;
        }
        (self.run_length() / tr).ceil() as u32
    }

    /// Number of distinct puzzles the run steps through.
    pub fn puzzle_count(&self) -> usize {
        let mut seen: Vec<u32> = self.trials.iter().filter_map(|t| t.problem_idx).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Structural checks against the puzzle set, run once before the session.
    pub fn validate(&self, puzzles: &PuzzleSet) -> Result<()> {
        if self.trials.is_empty() {
            return Err(TaskError::MalformedSchedule("schedule has no trials".into()));
        }
        let mut prev_ons = f64::NEG_INFINITY;
        for (i, t) in self.trials.iter().enumerate() {
            if !t.ons.is_finite() || !t.dur.is_finite() || t.dur < 0.0 {
                return Err(TaskError::MalformedSchedule(format!(
                    "trial {i} ({}) has invalid timing ons={} dur={}",
                    t.kind.name(),
                    t.ons,
                    t.dur
                )));
            }
            if t.ons < prev_ons {
                return Err(TaskError::MalformedSchedule(format!(
                    "trial {i} starts at {} before the previous trial ({prev_ons})",
                    t.ons
                )));
            }
            prev_ons = t.ons;

            if !t.kind.needs_puzzle() {
                continue;
            }
            let Some(problem) = t.problem else {
                return Err(TaskError::MalformedSchedule(format!(
                    "{} trial {i} has no problem reference",
                    t.kind.name()
                )));
            };
            let puzzle = puzzles.get(problem).ok_or_else(|| {
                TaskError::MalformedSchedule(format!(
                    "trial {i} references problem {problem} but only {} are loaded",
                    puzzles.len()
                ))
            })?;
            puzzle.check_order(&t.order)?;
        }
        Ok(())
    }
}

impl From<Vec<TrialDescriptor>> for Schedule {
    fn from(trials: Vec<TrialDescriptor>) -> Self {
        Self::new(trials)
    }
}
