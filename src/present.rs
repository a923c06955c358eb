//! Seams to the presentation hardware.
//!
//! The trial loop never draws or reads devices itself. It describes each frame
//! as a [`Frame`] and hands it to a [`Display`], and it pulls key presses from a
//! [`Keyboard`]. The runner binary and the tests provide the implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::grid::{Coord, PuzzleState};
use crate::maze::MazeLayout;
use crate::puzzles::PuzzleRef;
use crate::time::Clock;

/// A key press stamped with session-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    pub t: f64,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, t: f64) -> Self {
        Self { key: key.into(), t }
    }
}

pub trait Keyboard {
    /// Oldest pending press among `accept`, if any arrived by `now`.
    /// Pending presses of other keys are discarded.
    fn next_event(&mut self, now: f64, accept: &[&str]) -> Option<KeyEvent>;

    /// Drop everything that arrived by `now`.
    fn clear(&mut self, now: f64);

    /// True once no press can ever arrive again.
    fn exhausted(&self) -> bool {
        false
    }
}

pub trait Display {
    /// Draw `frame` and return at the next refresh.
    fn present(&mut self, frame: &Frame<'_>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// Full true hypothesis visible, highlighted among the options.
    Teacher,
    /// Only revealed cells visible.
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorTint {
    /// Combined board value under the cursor (feedback while moving).
    Cell(u8),
    Selected,
}

#[derive(Debug, Clone, Copy)]
pub struct PuzzleView<'a> {
    pub puzzle: PuzzleRef<'a>,
    pub state: &'a PuzzleState,
    pub order: &'a [String],
    pub perspective: Perspective,
    pub cursor: Option<(Coord, CursorTint)>,
    pub caption: Option<&'a str>,
    pub countdown: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Fixation,
    Message(&'a str),
    Puzzle(PuzzleView<'a>),
    RatingScale { marked: Option<usize> },
    Maze {
        layout: &'a MazeLayout,
        cursor: Coord,
        solved: bool,
    },
}

impl Frame<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Fixation => "fixation",
            Frame::Message(_) => "message",
            Frame::Puzzle(_) => "puzzle",
            Frame::RatingScale { .. } => "rating_scale",
            Frame::Maze { .. } => "maze",
        }
    }
}

/// Shared stop flag raised by signal handlers and checked every frame.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a trial needs from the outside world for one session.
pub struct Devices<'a> {
    pub clock: &'a dyn Clock,
    pub display: &'a mut dyn Display,
    pub keyboard: &'a mut dyn Keyboard,
    pub interrupt: Interrupt,
}

/// Replays a fixed list of key presses, each released once the clock reaches
/// its timestamp.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeyboard {
    events: VecDeque<KeyEvent>,
}

impl ScriptedKeyboard {
    pub fn new(mut events: Vec<KeyEvent>) -> Self {
        events.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self {
            events: events.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl Keyboard for ScriptedKeyboard {
    fn next_event(&mut self, now: f64, accept: &[&str]) -> Option<KeyEvent> {
        while self.events.front().is_some_and(|e| e.t <= now) {
            let ev = self.events.pop_front()?;
            if accept.contains(&ev.key.as_str()) {
                return Some(ev);
            }
        }
        None
    }

    fn clear(&mut self, now: f64) {
        while self.events.front().is_some_and(|e| e.t <= now) {
            self.events.pop_front();
        }
    }

    fn exhausted(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Headless devices for trial and session tests.

    use super::*;
    use crate::time::SimulatedClock;

    pub const FRAME: f64 = 1.0 / 60.0;

    /// Advances a simulated clock by one refresh per frame and remembers
    /// what kind of frame was shown.
    pub struct FakeDisplay {
        clock: SimulatedClock,
        pub frames: Vec<&'static str>,
        pub last_tint: Option<CursorTint>,
        pub last_marked: Option<usize>,
        pub last_highlight: Option<Coord>,
        pub countdowns: Vec<u32>,
        /// Message screens, once per change.
        pub messages: Vec<String>,
    }

    impl FakeDisplay {
        pub fn new(clock: SimulatedClock) -> Self {
            Self {
                clock,
                frames: Vec::new(),
                last_tint: None,
                last_marked: None,
                last_highlight: None,
                countdowns: Vec::new(),
                messages: Vec::new(),
            }
        }
    }

    impl Display for FakeDisplay {
        fn present(&mut self, frame: &Frame<'_>) {
            self.frames.push(frame.kind());
            match frame {
                Frame::Puzzle(view) => {
                    self.last_tint = view.cursor.map(|(_, t)| t);
                    if view.perspective == Perspective::Student {
                        self.last_highlight = view.cursor.map(|(at, _)| at);
                    }
                    if let Some(n) = view.countdown {
                        if self.countdowns.last() != Some(&n) {
                            self.countdowns.push(n);
                        }
                    }
                }
                Frame::RatingScale { marked } => self.last_marked = *marked,
                Frame::Message(text) => {
                    if self.messages.last().map(String::as_str) != Some(*text) {
                        self.messages.push((*text).to_string());
                    }
                }
                _ => {}
            }
            self.clock.advance(FRAME);
        }
    }
}
