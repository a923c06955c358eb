//! # teachmaze
//!
//! Grid navigation and trial sequencing for a timed teaching experiment.
//!
//! Participants move a cursor over a 6x6 board with a five-button box. In the
//! maze variant they steer to a goal; in the teaching variant they pick cells
//! of a hidden hypothesis to reveal to a learner. A timing schedule drives a
//! sequence of trials, and every completed trial is written to disk at once.
//!
//! ## Quick Start
//!
//! ```
//! use teachmaze::prelude::*;
//!
//! let maze = MazeLayout::new(
//!     Grid::filled(MazeCell::Open),
//!     Coord::new(5, 5).unwrap(),
//!     Coord::ORIGIN,
//! );
//! let keys = KeyMap::new(KeyPreset::Laptop);
//!
//! let mut at = maze.start;
//! for key in ["semicolon"; 5].into_iter().chain(["l"; 5]) {
//!     at = step(&MazeBoard::new(&maze), &keys, at, key).unwrap().to;
//! }
//! let last = step(&MazeBoard::new(&maze), &keys, at, "space").unwrap();
//! assert!(last.terminal);
//! ```
//!
//! ## Modules
//!
//! - [`board`]: the move rule and win check
//! - [`trial`]: the per-trial frame loop
//! - [`session`]: puzzle boundaries, corners and carry-over state
//! - [`recorder`]: the behavioral data file
//! - [`present`]: display, keyboard and interrupt seams
//! - [`startup`]: scanner trigger and practice start/end screens

pub mod board;
pub mod error;
pub mod grid;
pub mod keymap;
pub mod maze;
pub mod present;
pub mod prng;
pub mod problem;
pub mod puzzles;
pub mod record;
pub mod recorder;
pub mod schedule;
pub mod session;
pub mod startup;
pub mod stats;
pub mod time;
pub mod trial;

/// Prelude module for convenient imports.
///
/// ```
/// use teachmaze::prelude::*;
/// ```
pub mod prelude {
    pub use crate::board::{step, Board, MazeBoard, MoveEvent, Step, TeachingBoard};
    pub use crate::error::{Result, TaskError};
    pub use crate::grid::{Coord, Grid, PuzzleState, GRID_SIZE};
    pub use crate::keymap::{KeyCommand, KeyEffect, KeyMap, KeyPreset};
    pub use crate::maze::{
        run_button_drill, run_practice, DrillReport, MazeCell, MazeLayout, PracticeReport,
    };
    pub use crate::present::{
        CursorTint, Devices, Display, Frame, Interrupt, KeyEvent, Keyboard, Perspective,
        PuzzleView, ScriptedKeyboard,
    };
    pub use crate::problem::Problem;
    pub use crate::puzzles::{PuzzleRef, PuzzleSet};
    pub use crate::record::{Response, TrialRecord};
    pub use crate::recorder::Recorder;
    pub use crate::schedule::{Schedule, TrialDescriptor, TrialKind};
    pub use crate::session::{Session, SessionOutcome};
    pub use crate::startup::{hold_still, practice_end, practice_start, wait_for_trigger};
    pub use crate::stats::SessionStats;
    pub use crate::time::{Clock, MonotonicClock, SimulatedClock};
    pub use crate::trial::{run_trial, StopReason, TrialEnv, TrialFlow, TrialInput};
}
