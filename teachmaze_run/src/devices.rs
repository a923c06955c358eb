//! Terminal stand-ins for the screen and the button box.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use teachmaze::grid::{Coord, GRID_SIZE};
use teachmaze::maze::{MazeCell, MazeLayout};
use teachmaze::present::{
    CursorTint, Display, Frame, KeyEvent, Keyboard, Perspective, PuzzleView,
};
use teachmaze::problem::{Problem, UNREVEALED};
use teachmaze::puzzles::PuzzleRef;
use teachmaze::time::{Clock, SimulatedClock};
use tracing::debug;

const RATING_PROMPT: &str =
    "Suppose students saw just these hints.\nHow likely are they to get it right?";
const SLOT_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

pub enum Pacing {
    /// Sleep one refresh interval per frame.
    RealTime(Duration),
    /// Advance a simulated clock instead of sleeping.
    Simulated { clock: SimulatedClock, frame: f64 },
}

/// Draws frames as text, printing only when the picture changes.
pub struct TextDisplay {
    pacing: Pacing,
    echo: bool,
    last: String,
    frames: u64,
}

impl TextDisplay {
    pub fn new(pacing: Pacing, echo: bool) -> Self {
        Self {
            pacing,
            echo,
            last: String::new(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Display for TextDisplay {
    fn present(&mut self, frame: &Frame<'_>) {
        let text = render(frame);
        if text != self.last {
            debug!(kind = frame.kind(), frame = self.frames, "frame change");
            if self.echo {
                println!("{text}\n");
            }
            self.last = text;
        }
        self.frames += 1;

        match &self.pacing {
            Pacing::RealTime(d) => thread::sleep(*d),
            Pacing::Simulated { clock, frame } => clock.advance(*frame),
        }
    }
}

pub fn render(frame: &Frame<'_>) -> String {
    match frame {
        Frame::Fixation => "+".to_string(),
        Frame::Message(text) => (*text).to_string(),
        Frame::Puzzle(view) => render_puzzle(view),
        Frame::RatingScale { marked } => render_scale(*marked),
        Frame::Maze {
            layout,
            cursor,
            solved,
        } => {
            let mut out = render_maze(layout, *cursor);
            if *solved {
                out.push_str("\nGoal reached!");
            }
            out
        }
    }
}

fn render_puzzle(view: &PuzzleView<'_>) -> String {
    let mut out = String::new();
    for r in 0..GRID_SIZE {
        for c in 0..GRID_SIZE {
            let Ok(at) = Coord::new(r, c) else { continue };
            let glyph = match view.cursor {
                Some((cur, CursorTint::Selected)) if cur == at => '*',
                Some((cur, CursorTint::Cell(_))) if cur == at => '@',
                _ => cell_glyph(view, at),
            };
            out.push(glyph);
            out.push(' ');
        }
        out.pop();
        out.push('\n');
    }

    if !view.order.is_empty() {
        out.push_str("hypotheses:");
        let truth = Problem::true_slot(view.order);
        for (slot, _) in view.order.iter().enumerate() {
            let letter = SLOT_LETTERS.get(slot).copied().unwrap_or('?');
            if view.perspective == Perspective::Teacher && truth == Some(slot) {
                let _ = write!(out, " [{letter}]");
            } else {
                let _ = write!(out, " {letter}");
            }
        }
        out.push('\n');
    }
    if let Some(caption) = view.caption {
        out.push_str(caption);
        out.push('\n');
    }
    if let Some(n) = view.countdown {
        let _ = writeln!(out, "{n}");
    }
    out.trim_end().to_string()
}

fn cell_glyph(view: &PuzzleView<'_>, at: Coord) -> char {
    let v = view.puzzle.cell_value(view.state, at);
    match view.puzzle {
        PuzzleRef::Maze(_) => match v {
            0 => '#',
            2 => 'G',
            _ => '.',
        },
        PuzzleRef::Teaching(_) => match (view.perspective, v) {
            (_, 0) => '.',
            (Perspective::Student, v) if v <= UNREVEALED => '.',
            (_, v) if v == UNREVEALED => 'o',
            _ => '#',
        },
    }
}

fn render_maze(layout: &MazeLayout, cursor: Coord) -> String {
    let mut out = String::new();
    for r in 0..GRID_SIZE {
        for c in 0..GRID_SIZE {
            let Ok(at) = Coord::new(r, c) else { continue };
            let glyph = if at == cursor {
                '@'
            } else {
                match layout.cell(at) {
                    MazeCell::Blocked => '#',
                    MazeCell::Open => '.',
                    MazeCell::Goal => 'G',
                }
            };
            out.push(glyph);
            out.push(' ');
        }
        out.pop();
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render_scale(marked: Option<usize>) -> String {
    let mut out = String::from(RATING_PROMPT);
    out.push_str("\n\n");
    for i in 0..5 {
        if marked == Some(i) {
            let _ = write!(out, "[{}] ", i + 1);
        } else {
            let _ = write!(out, " {}  ", i + 1);
        }
    }
    out.push_str("\nNo chance         Certainly");
    out
}

/// Reads whitespace-separated key names from stdin on a background thread.
/// Every key on a line gets the arrival time of that line.
pub struct StdinKeyboard {
    rx: Receiver<KeyEvent>,
    pending: VecDeque<KeyEvent>,
    /// Stdin reached end of file.
    closed: bool,
}

impl StdinKeyboard {
    pub fn spawn<C: Clock + Send + 'static>(clock: C) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let t = clock.now();
                for key in line.split_whitespace() {
                    if tx.send(KeyEvent::new(key, t)).is_err() {
                        return;
                    }
                }
            }
        });
        Self {
            rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(ev) => self.pending.push_back(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl Keyboard for StdinKeyboard {
    fn next_event(&mut self, now: f64, accept: &[&str]) -> Option<KeyEvent> {
        self.drain();
        while self.pending.front().is_some_and(|e| e.t <= now) {
            let ev = self.pending.pop_front()?;
            if accept.contains(&ev.key.as_str()) {
                return Some(ev);
            }
            debug!(key = %ev.key, "ignored key");
        }
        None
    }

    fn clear(&mut self, now: f64) {
        self.drain();
        while self.pending.front().is_some_and(|e| e.t <= now) {
            self.pending.pop_front();
        }
    }

    fn exhausted(&self) -> bool {
        self.closed && self.pending.is_empty()
    }
}
