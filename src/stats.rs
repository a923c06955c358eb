use core::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};
use crate::record::{Response, TrialRecord};
use crate::schedule::TrialKind;

/// Running tallies over a session's trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub trials: u32,
    pub choose_trials: u32,
    pub selections: u32,
    /// `choose` trials that timed out without a selection.
    pub misses: u32,
    /// Count per rating option, in key-table order.
    pub ratings: [u32; 5],
    pub unrated: u32,
    choice_rt_sum: f64,
    max_onset_lag: f64,
}

/// The fields of a saved record that statistics need. Everything else in the
/// file is ignored, so older or hand-edited files still load.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordView {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub ons: f64,
    #[serde(default)]
    pub true_ons: f64,
    #[serde(default)]
    pub example: Option<serde_json::Value>,
    #[serde(default)]
    pub rt: Option<f64>,
    #[serde(default)]
    pub rating: Option<usize>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, rec: &TrialRecord) {
        self.count_trial(rec.onset_lag());
        match &rec.response {
            Response::Choice(c) => self.count_choice(c.example.is_some(), c.rt),
            Response::Rating(r) => self.count_rating(r.rating),
            Response::Passive {} => {}
        }
    }

    pub fn record_view(&mut self, view: &RecordView) {
        self.count_trial(view.true_ons - view.ons);
        if view.kind == TrialKind::Choose.name() {
            let selected = view.example.as_ref().is_some_and(|v| !v.is_null());
            self.count_choice(selected, view.rt);
        } else if view.kind == TrialKind::Rate.name() {
            self.count_rating(view.rating);
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TrialRecord>) -> Self {
        let mut stats = Self::new();
        for rec in records {
            stats.record(rec);
        }
        stats
    }

    /// Tally a behavioral data file written by a previous session.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| TaskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let views: Vec<RecordView> = serde_json::from_str(&text)?;
        let mut stats = Self::new();
        for v in &views {
            stats.record_view(v);
        }
        Ok(stats)
    }

    fn count_trial(&mut self, lag: f64) {
        self.trials += 1;
        if lag > self.max_onset_lag {
            self.max_onset_lag = lag;
        }
    }

    fn count_choice(&mut self, selected: bool, rt: Option<f64>) {
        self.choose_trials += 1;
        match (selected, rt) {
            (true, Some(rt)) => {
                self.selections += 1;
                self.choice_rt_sum += rt;
            }
            (true, None) => self.selections += 1,
            (false, _) => self.misses += 1,
        }
    }

    fn count_rating(&mut self, rating: Option<usize>) {
        match rating.and_then(|i| self.ratings.get_mut(i)) {
            Some(slot) => *slot += 1,
            None => self.unrated += 1,
        }
    }

    pub fn selection_rate(&self) -> f32 {
        if self.choose_trials == 0 {
            0.0
        } else {
            self.selections as f32 / self.choose_trials as f32
        }
    }

    pub fn mean_choice_rt(&self) -> Option<f64> {
        (self.selections > 0).then(|| self.choice_rt_sum / self.selections as f64)
    }

    /// Mean of the given ratings on the 0..=4 scale.
    pub fn mean_rating(&self) -> Option<f64> {
        let n: u32 = self.ratings.iter().sum();
        if n == 0 {
            return None;
        }
        let weighted: u32 = self
            .ratings
            .iter()
            .enumerate()
            .map(|(i, c)| i as u32 * c)
            .sum();
        Some(weighted as f64 / n as f64)
    }

    /// Worst lateness of a trial start against its schedule, in seconds.
    pub fn max_onset_lag(&self) -> f64 {
        self.max_onset_lag
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trials:          {}", self.trials)?;
        writeln!(
            f,
            "choose trials:   {} ({} selected, {} missed, {:.0}%)",
            self.choose_trials,
            self.selections,
            self.misses,
            self.selection_rate() * 100.0
        )?;
        match self.mean_choice_rt() {
            Some(rt) => writeln!(f, "mean choice rt:  {rt:.3}s")?,
            None => writeln!(f, "mean choice rt:  -")?,
        }
        writeln!(
            f,
            "ratings:         {:?} ({} unrated)",
            self.ratings, self.unrated
        )?;
        match self.mean_rating() {
            Some(m) => writeln!(f, "mean rating:     {m:.2}")?,
            None => writeln!(f, "mean rating:     -")?,
        }
        write!(f, "max onset lag:   {:.3}s", self.max_onset_lag)
    }
}
