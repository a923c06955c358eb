use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::{self, MazeBoard, MoveEvent};
use crate::error::{Result, TaskError};
use crate::grid::{Coord, Grid, GRID_SIZE};
use crate::keymap::KeyMap;
use crate::present::{Devices, Frame, KeyEvent};
use crate::prng::Prng;
use crate::trial::StopReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum MazeCell {
    Blocked = 0,
    Open = 1,
    Goal = 2,
}

impl TryFrom<u8> for MazeCell {
    type Error = String;

    fn try_from(v: u8) -> core::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(MazeCell::Blocked),
            1 => Ok(MazeCell::Open),
            2 => Ok(MazeCell::Goal),
            other => Err(format!("maze cell value {other} (expected 0, 1 or 2)")),
        }
    }
}

impl From<MazeCell> for u8 {
    fn from(c: MazeCell) -> Self {
        c as u8
    }
}

/// One practice maze as stored in `mazes.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeLayout {
    #[serde(rename = "maze")]
    pub cells: Grid<MazeCell>,
    pub goal: Coord,
    pub start: Coord,
}

impl MazeLayout {
    pub fn new(cells: Grid<MazeCell>, goal: Coord, start: Coord) -> Self {
        Self { cells, goal, start }
    }

    pub fn cell(&self, at: Coord) -> MazeCell {
        if at == self.goal {
            return MazeCell::Goal;
        }
        self.cells.get(at)
    }

    pub fn manhattan_to_goal(&self, from: Coord) -> usize {
        from.row().abs_diff(self.goal.row()) + from.col().abs_diff(self.goal.col())
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        if self.cells.get(self.start) == MazeCell::Blocked {
            return Err(TaskError::MalformedPuzzle(format!(
                "maze {index} starts on a blocked cell {}",
                self.start
            )));
        }
        if self.cells.get(self.goal) == MazeCell::Blocked {
            return Err(TaskError::MalformedPuzzle(format!(
                "maze {index} goal {} is blocked",
                self.goal
            )));
        }
        Ok(())
    }

    /// Read and check every maze in a `mazes.json` file.
    pub fn load_all(path: &Path) -> Result<Vec<Self>> {
        let mazes: Vec<Self> = crate::puzzles::read_definitions(path)?;
        for (i, m) in mazes.iter().enumerate() {
            m.validate(i)?;
        }
        Ok(mazes)
    }

    /// Carve a random maze on the 3x3 lattice of even cells.
    ///
    /// Rooms sit at even coordinates and passages are opened between them with
    /// a depth-first walk, so every room is reachable from the start corner.
    /// The last row and column stay blocked; the goal is the far room.
    pub fn carve(seed: u64) -> Self {
        const ROOMS: usize = GRID_SIZE / 2;

        let mut cells = Grid::filled(MazeCell::Blocked);
        let mut rng = Prng::new(seed ^ 0xA5A5_5A5A);
        let mut visited = [[false; ROOMS]; ROOMS];

        let room = |r: usize, c: usize| Coord::new(2 * r, 2 * c).unwrap_or(Coord::ORIGIN);

        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        visited[0][0] = true;
        cells.set(room(0, 0), MazeCell::Open);

        while let Some(&(r, c)) = stack.last() {
            let mut neighbors: [(usize, usize); 4] = [(r, c); 4];
            let mut n = 0usize;

            if r > 0 && !visited[r - 1][c] {
                neighbors[n] = (r - 1, c);
                n += 1;
            }
            if c + 1 < ROOMS && !visited[r][c + 1] {
                neighbors[n] = (r, c + 1);
                n += 1;
            }
            if r + 1 < ROOMS && !visited[r + 1][c] {
                neighbors[n] = (r + 1, c);
                n += 1;
            }
            if c > 0 && !visited[r][c - 1] {
                neighbors[n] = (r, c - 1);
                n += 1;
            }

            if n == 0 {
                stack.pop();
                continue;
            }

            let (nr, nc) = neighbors[rng.gen_range_usize(0, n)];
            // Passage cell halfway between the two rooms.
            if let Ok(door) = Coord::new(r + nr, c + nc) {
                cells.set(door, MazeCell::Open);
            }
            cells.set(room(nr, nc), MazeCell::Open);
            visited[nr][nc] = true;
            stack.push((nr, nc));
        }

        let goal = room(ROOMS - 1, ROOMS - 1);
        Self::new(cells, goal, Coord::ORIGIN)
    }

    /// A short built-in practice sequence for when no maze file is supplied.
    pub fn builtin_practice(seed: u64) -> Vec<Self> {
        (0..3)
            .map(|i| Self::carve(seed.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(i))))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MazeAttempt {
    pub maze: usize,
    pub presses: u32,
    pub bumps: u32,
    pub solved: bool,
    pub cursor: Coord,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeReport {
    pub attempts: Vec<MazeAttempt>,
    /// False when practice ended before the last goal.
    pub completed: bool,
    pub stop: Option<StopReason>,
}

/// Names of the five response commands, in key-table order.
pub const COMMAND_NAMES: [&str; 5] = ["ACTION", "LEFT", "UP", "DOWN", "RIGHT"];

/// Screens shown before the button drill; any response key continues.
pub const KEY_INTRO: [&str; 2] = [
    "In this task, you'll use a button box to move a cursor.\n\
     Each button moves the cursor in a different direction.\n\
     First, we're going to practice using the buttons!\n\n\
     Press any button to continue.",
    "To begin, make sure that each of your fingers is resting on a different button.\n\n\
     Press any button to continue.",
];

/// Screens shown before the first maze; ACTION continues.
pub const MAZE_INTRO: [&str; 2] = [
    "Let's apply what you've learned! In the next slides, you'll see mazes like this one.\n\n\
     Press ACTION to continue",
    "Move your cursor towards the gold square, then press ACTION to pick up the treasure\n\n\
     Press ACTION to start",
];

#[derive(Debug, Clone, Serialize)]
pub struct DrillReport {
    pub prompts: u32,
    /// Response keys pressed that did not match the prompt.
    pub wrong_presses: u32,
    pub completed: bool,
    pub stop: Option<StopReason>,
}

enum Poll {
    Press(KeyEvent),
    Idle,
    End(StopReason),
}

/// One self-paced read: a press, nothing yet, or a reason to give up.
fn poll(devices: &mut Devices<'_>, keymap: &KeyMap) -> Poll {
    if devices.interrupt.is_raised() {
        return Poll::End(StopReason::Interrupted);
    }
    let now = devices.clock.now();
    match devices.keyboard.next_event(now, keymap.keys()) {
        Some(ev) if keymap.is_quit(&ev.key) => Poll::End(StopReason::QuitKey),
        Some(ev) => Poll::Press(ev),
        None if devices.keyboard.exhausted() => Poll::End(StopReason::InputExhausted),
        None => Poll::Idle,
    }
}

/// Button drill run before the mazes: prompt every command once in table
/// order, then twice more in shuffled order. Each prompt waits for its key.
pub fn run_button_drill(
    keymap: &KeyMap,
    devices: &mut Devices<'_>,
    rng: &mut Prng,
) -> Result<DrillReport> {
    let mut sequence: Vec<usize> = (0..COMMAND_NAMES.len()).collect();
    for _ in 0..2 {
        let mut round: Vec<usize> = (0..COMMAND_NAMES.len()).collect();
        rng.shuffle(&mut round);
        sequence.extend(round);
    }

    let mut report = DrillReport {
        prompts: 0,
        wrong_presses: 0,
        completed: false,
        stop: None,
    };
    for idx in sequence {
        let prompt = format!("Please press the following key\n\n{}", COMMAND_NAMES[idx]);
        let wanted = keymap.response_keys()[idx];
        loop {
            devices.display.present(&Frame::Message(&prompt));
            let ev = match poll(devices, keymap) {
                Poll::Press(ev) => ev,
                Poll::Idle => continue,
                Poll::End(reason) => {
                    info!(
                        prompts = report.prompts,
                        reason = reason.as_str(),
                        "button drill ended early"
                    );
                    report.stop = Some(reason);
                    return Ok(report);
                }
            };
            if ev.key == wanted {
                break;
            }
            report.wrong_presses += 1;
            debug!(key = %ev.key, wanted, "wrong button");
        }
        report.prompts += 1;
    }
    report.completed = true;
    Ok(report)
}

/// Self-paced maze practice: each maze runs until the participant selects the
/// goal, with no time limit. The quit key ends the whole practice.
pub fn run_practice(
    mazes: &[MazeLayout],
    keymap: &KeyMap,
    devices: &mut Devices<'_>,
) -> Result<PracticeReport> {
    let mut attempts = Vec::with_capacity(mazes.len());

    for (i, layout) in mazes.iter().enumerate() {
        let board = MazeBoard::new(layout);
        let started = devices.clock.now();
        let mut cursor = layout.start;
        let mut attempt = MazeAttempt {
            maze: i,
            presses: 0,
            bumps: 0,
            solved: false,
            cursor,
            duration: 0.0,
        };
        info!(maze = i, start = %cursor, goal = %layout.goal, "maze practice");

        while !attempt.solved {
            devices.display.present(&Frame::Maze {
                layout,
                cursor,
                solved: false,
            });

            let ev = match poll(devices, keymap) {
                Poll::Press(ev) => ev,
                Poll::Idle => continue,
                Poll::End(reason) => {
                    info!(maze = i, reason = reason.as_str(), "maze practice ended early");
                    attempt.cursor = cursor;
                    attempt.duration = devices.clock.now() - started;
                    attempts.push(attempt);
                    return Ok(PracticeReport {
                        attempts,
                        completed: false,
                        stop: Some(reason),
                    });
                }
            };

            let step = board::step(&board, keymap, cursor, &ev.key)?;
            attempt.presses += 1;
            if step.event == MoveEvent::Bump {
                attempt.bumps += 1;
            }
            cursor = step.to;
            attempt.solved = step.terminal;
            debug!(
                maze = i,
                %cursor,
                dist = layout.manhattan_to_goal(cursor),
                "maze step"
            );
        }

        devices.display.present(&Frame::Maze {
            layout,
            cursor,
            solved: true,
        });
        attempt.cursor = cursor;
        attempt.duration = devices.clock.now() - started;
        info!(maze = i, presses = attempt.presses, "maze solved");
        attempts.push(attempt);
    }

    Ok(PracticeReport {
        attempts,
        completed: true,
        stop: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::KeyPreset;
    use crate::present::testing::FakeDisplay;
    use crate::present::{Interrupt, KeyEvent, ScriptedKeyboard};
    use crate::time::SimulatedClock;

    fn c(r: usize, col: usize) -> Coord {
        Coord::new(r, col).unwrap()
    }

    #[test]
    fn parses_maze_definition() {
        let row_open = "[1,1,1,1,1,1]";
        let row_wall = "[0,0,0,0,0,1]";
        let json = format!(
            r#"{{"maze": [{row_open},{row_wall},{row_open},{row_open},{row_open},{row_open}], "goal": [5,5], "start": [0,0]}}"#
        );
        let m: MazeLayout = serde_json::from_str(&json).unwrap();
        m.validate(0).unwrap();
        assert_eq!(m.cell(c(1, 0)), MazeCell::Blocked);
        assert_eq!(m.cell(c(5, 5)), MazeCell::Goal);
        assert_eq!(m.manhattan_to_goal(c(0, 0)), 10);
    }

    #[test]
    fn rejects_blocked_start() {
        let m = MazeLayout::new(Grid::filled(MazeCell::Blocked), c(5, 5), c(0, 0));
        assert!(m.validate(2).is_err());
    }

    #[test]
    fn carved_mazes_are_deterministic_and_solvable() {
        let a = MazeLayout::carve(123);
        let b = MazeLayout::carve(123);
        assert_eq!(a, b);
        a.validate(0).unwrap();

        // Flood fill from the start must reach the goal.
        let board = MazeBoard::new(&a);
        let keys = KeyMap::default();
        let mut seen = vec![a.start];
        let mut frontier = vec![a.start];
        while let Some(at) = frontier.pop() {
            for key in ["1", "2", "3", "4"] {
                let s = board::step(&board, &keys, at, key).unwrap();
                if !seen.contains(&s.to) {
                    seen.push(s.to);
                    frontier.push(s.to);
                }
            }
        }
        assert!(seen.contains(&a.goal));
        // 9 rooms + 8 passages in a spanning tree.
        assert_eq!(seen.len(), 17);
    }

    #[test]
    fn drill_waits_for_each_prompted_key() {
        let clock = SimulatedClock::new();
        let mut display = FakeDisplay::new(clock.clone());
        let keys = KeyMap::default();

        let mut rng = Prng::new(3);
        let mut order: Vec<usize> = (0..5).collect();
        let mut events = Vec::new();
        let mut t = 0.05;
        for round in 0..3 {
            if round > 0 {
                order = (0..5).collect();
                rng.shuffle(&mut order);
            }
            for &i in &order {
                if round == 0 && i == 2 {
                    // One wrong press before the right one.
                    events.push(KeyEvent::new("4", t));
                    t += 0.05;
                }
                events.push(KeyEvent::new(keys.response_keys()[i], t));
                t += 0.05;
            }
        }
        let mut kb = ScriptedKeyboard::new(events);
        let mut devices = Devices {
            clock: &clock,
            display: &mut display,
            keyboard: &mut kb,
            interrupt: Interrupt::new(),
        };

        let report = run_button_drill(&keys, &mut devices, &mut Prng::new(3)).unwrap();
        assert!(report.completed);
        assert_eq!(report.prompts, 15);
        assert_eq!(report.wrong_presses, 1);
    }

    #[test]
    fn exhausted_script_ends_practice_instead_of_waiting() {
        let open = MazeLayout::new(Grid::filled(MazeCell::Open), c(0, 2), c(0, 0));
        let clock = SimulatedClock::new();
        let mut display = FakeDisplay::new(clock.clone());
        let keys = KeyMap::new(KeyPreset::Laptop);
        let mut kb = ScriptedKeyboard::new(vec![KeyEvent::new("semicolon", 0.1)]);
        let mut devices = Devices {
            clock: &clock,
            display: &mut display,
            keyboard: &mut kb,
            interrupt: Interrupt::new(),
        };

        let report = run_practice(&[open], &keys, &mut devices).unwrap();
        assert!(!report.completed);
        assert_eq!(report.stop, Some(StopReason::InputExhausted));
        assert_eq!(report.attempts[0].cursor, c(0, 1));

        let drill = run_button_drill(&keys, &mut devices, &mut Prng::new(1)).unwrap();
        assert!(!drill.completed);
        assert_eq!(drill.prompts, 0);
        assert_eq!(drill.stop, Some(StopReason::InputExhausted));
    }

    #[test]
    fn practice_runs_until_goal_then_next_maze() {
        let open = MazeLayout::new(Grid::filled(MazeCell::Open), c(0, 2), c(0, 0));
        let clock = SimulatedClock::new();
        let mut display = FakeDisplay::new(clock.clone());
        let keys = KeyMap::new(KeyPreset::Laptop);
        let mut kb = ScriptedKeyboard::new(vec![
            KeyEvent::new("k", 0.1),
            KeyEvent::new("semicolon", 0.2),
            KeyEvent::new("semicolon", 0.3),
            KeyEvent::new("space", 0.4),
            KeyEvent::new("space", 0.6),
            KeyEvent::new("q", 0.7),
        ]);
        let mut devices = Devices {
            clock: &clock,
            display: &mut display,
            keyboard: &mut kb,
            interrupt: Interrupt::new(),
        };

        let report = run_practice(&[open.clone(), open], &keys, &mut devices).unwrap();
        assert!(!report.completed);
        assert_eq!(report.stop, Some(StopReason::QuitKey));
        assert_eq!(report.attempts.len(), 2);

        let first = &report.attempts[0];
        assert!(first.solved);
        assert_eq!(first.presses, 4);
        assert_eq!(first.bumps, 1);
        assert_eq!(first.cursor, c(0, 2));

        // Action away from the goal does nothing; quit ends practice.
        let second = &report.attempts[1];
        assert!(!second.solved);
        assert_eq!(second.presses, 1);
    }
}
