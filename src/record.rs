//! Behavioral data records, one per completed trial.
//!
//! A record serializes as the scheduled trial with the measured fields merged
//! into the same JSON object, so downstream analysis reads one flat map per
//! trial.

use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;

use crate::grid::{Coord, PuzzleState};
use crate::schedule::{TrialDescriptor, TrialKind};

/// Cursor position after a key press, with seconds since the trial started.
/// Written as `[[row, col], t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub at: Coord,
    pub t: f64,
}

impl Serialize for Movement {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut tup = s.serialize_tuple(2)?;
        tup.serialize_element(&self.at)?;
        tup.serialize_element(&self.t)?;
        tup.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceData {
    /// Selected cell, or null when time ran out first.
    pub example: Option<Coord>,
    /// Seconds from trial start to the selecting key press.
    pub rt: Option<f64>,
    pub movements: Vec<Movement>,
    /// Marks after the trial; the incoming marks plus the selection, if any.
    pub state: PuzzleState,
    pub cursor: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingData {
    pub rating: Option<usize>,
    pub rt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Presentation-only trials record timing alone.
    Passive {},
    Choice(ChoiceData),
    Rating(RatingData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    #[serde(flatten)]
    pub trial: TrialDescriptor,
    /// Measured onset on the session clock.
    pub true_ons: f64,
    /// Measured duration, including any overrun of the final frame.
    pub true_dur: f64,
    #[serde(flatten)]
    pub response: Response,
}

impl TrialRecord {
    pub fn kind(&self) -> TrialKind {
        self.trial.kind
    }

    pub fn choice(&self) -> Option<&ChoiceData> {
        match &self.response {
            Response::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub fn rating(&self) -> Option<&RatingData> {
        match &self.response {
            Response::Rating(r) => Some(r),
            _ => None,
        }
    }

    /// Late start relative to the scheduled onset, in seconds.
    pub fn onset_lag(&self) -> f64 {
        self.true_ons - self.trial.ons
    }
}
