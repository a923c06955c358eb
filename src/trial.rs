//! The per-trial state machine.
//!
//! Each trial runs a frame loop until the session clock passes its scheduled
//! end. Only `choose` trials read directional input and produce new puzzle
//! state; every other kind draws a fixed frame and records timing.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, TaskError};
use crate::grid::{Coord, PuzzleState};
use crate::keymap::KeyMap;
use crate::present::{CursorTint, Devices, Frame, Perspective, PuzzleView};
use crate::puzzles::{PuzzleRef, PuzzleSet};
use crate::record::{ChoiceData, Movement, RatingData, Response, TrialRecord};
use crate::schedule::{TrialDescriptor, TrialKind};

pub const PRE_MESSAGE: &str = "Here's what students would see:";
pub const STUDY_CAPTION: &str = "Study problem";

/// The study countdown is shown while fewer than this many whole seconds remain.
const COUNTDOWN_BELOW: f64 = 4.0;

/// What a trial starts from. The caller keeps ownership of the state.
#[derive(Debug, Clone, Copy)]
pub struct TrialInput<'s> {
    pub state: &'s PuzzleState,
    pub cursor: Coord,
    /// Cell revealed by the latest `choose`, drawn on `show` trials.
    pub highlight: Option<Coord>,
}

pub struct TrialEnv<'a, 'd> {
    pub keymap: &'a KeyMap,
    pub puzzles: &'a PuzzleSet,
    pub devices: &'a mut Devices<'d>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    QuitKey,
    Interrupted,
    /// The key source ran out while waiting for a press.
    InputExhausted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::QuitKey => "quit_key",
            StopReason::Interrupted => "interrupted",
            StopReason::InputExhausted => "input_exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialFlow {
    Continue(TrialRecord),
    /// The session must end; the trial in progress is dropped.
    Stop(StopReason),
}

pub fn run_trial(
    trial: &TrialDescriptor,
    input: TrialInput<'_>,
    env: &mut TrialEnv<'_, '_>,
) -> Result<TrialFlow> {
    let true_ons = env.devices.clock.now();
    debug!(
        kind = trial.kind.name(),
        ons = trial.ons,
        late = true_ons - trial.ons,
        "trial start"
    );

    let response = match trial.kind {
        TrialKind::Pause => passive(trial, env, |_| Frame::Fixation),
        TrialKind::Pre => passive(trial, env, |_| Frame::Message(PRE_MESSAGE)),
        TrialKind::Study => {
            let puzzle = puzzle_for(env.puzzles, trial)?;
            let deadline = trial.deadline();
            passive(trial, env, |now| {
                Frame::Puzzle(PuzzleView {
                    puzzle,
                    state: input.state,
                    order: &trial.order,
                    perspective: Perspective::Teacher,
                    cursor: None,
                    caption: Some(STUDY_CAPTION),
                    countdown: countdown(deadline - now),
                })
            })
        }
        TrialKind::Show => {
            let puzzle = puzzle_for(env.puzzles, trial)?;
            passive(trial, env, |_| {
                Frame::Puzzle(PuzzleView {
                    puzzle,
                    state: input.state,
                    order: &trial.order,
                    perspective: Perspective::Student,
                    cursor: input.highlight.map(|at| (at, CursorTint::Selected)),
                    caption: None,
                    countdown: None,
                })
            })
        }
        TrialKind::Choose => choose(trial, input, env, true_ons)?,
        TrialKind::Rate => rate(trial, env, true_ons),
    };

    let response = match response {
        Ok(r) => r,
        Err(reason) => {
            warn!(
                kind = trial.kind.name(),
                reason = reason.as_str(),
                "trial aborted"
            );
            return Ok(TrialFlow::Stop(reason));
        }
    };

    let true_dur = env.devices.clock.now() - true_ons;
    Ok(TrialFlow::Continue(TrialRecord {
        trial: trial.clone(),
        true_ons,
        true_dur,
        response,
    }))
}

/// Inner loop result: the response, or why the session has to stop.
type Presented = std::result::Result<Response, StopReason>;

fn puzzle_for<'p>(puzzles: &'p PuzzleSet, trial: &TrialDescriptor) -> Result<PuzzleRef<'p>> {
    let index = trial.problem.ok_or_else(|| {
        TaskError::MalformedSchedule(format!(
            "{} trial at {}s has no problem reference",
            trial.kind.name(),
            trial.ons
        ))
    })?;
    puzzles.get(index).ok_or_else(|| {
        TaskError::MalformedSchedule(format!(
            "problem {index} is not in the loaded set of {}",
            puzzles.len()
        ))
    })
}

fn countdown(remaining: f64) -> Option<u32> {
    let whole = remaining.ceil();
    (whole > 0.0 && whole < COUNTDOWN_BELOW).then_some(whole as u32)
}

/// Checks the interrupt flag and drains a pending quit press.
fn should_stop(devices: &mut Devices<'_>, keymap: &KeyMap, now: f64) -> Option<StopReason> {
    if devices.interrupt.is_raised() {
        return Some(StopReason::Interrupted);
    }
    devices
        .keyboard
        .next_event(now, &[keymap.quit_key()])
        .map(|_| StopReason::QuitKey)
}

fn passive<'f>(
    trial: &TrialDescriptor,
    env: &mut TrialEnv<'_, '_>,
    frame: impl Fn(f64) -> Frame<'f>,
) -> Presented {
    let deadline = trial.deadline();
    let mut now = env.devices.clock.now();
    while now < deadline {
        if let Some(reason) = should_stop(env.devices, env.keymap, now) {
            return Err(reason);
        }
        env.devices.display.present(&frame(now));
        now = env.devices.clock.now();
    }
    Ok(Response::Passive {})
}

fn choose(
    trial: &TrialDescriptor,
    input: TrialInput<'_>,
    env: &mut TrialEnv<'_, '_>,
    true_ons: f64,
) -> Result<Presented> {
    let puzzle = puzzle_for(env.puzzles, trial)?;
    let keymap = env.keymap;
    let deadline = trial.deadline();

    let mut cursor = input.cursor;
    let mut movements = Vec::new();
    let mut rt = None;

    let mut now = env.devices.clock.now();
    while now < deadline {
        if rt.is_none() {
            if env.devices.interrupt.is_raised() {
                return Ok(Err(StopReason::Interrupted));
            }
            if let Some(ev) = env.devices.keyboard.next_event(now, keymap.keys()) {
                if keymap.is_quit(&ev.key) {
                    return Ok(Err(StopReason::QuitKey));
                }
                let step = puzzle.step(input.state, keymap, cursor, &ev.key)?;
                cursor = step.to;
                let t = ev.t - true_ons;
                movements.push(Movement { at: cursor, t });
                if step.terminal {
                    rt = Some(t);
                    debug!(%cursor, rt = t, "example selected");
                }
            }
        } else if let Some(reason) = should_stop(env.devices, keymap, now) {
            return Ok(Err(reason));
        }

        let tint = if rt.is_some() {
            CursorTint::Selected
        } else {
            CursorTint::Cell(puzzle.cell_value(input.state, cursor))
        };
        env.devices.display.present(&Frame::Puzzle(PuzzleView {
            puzzle,
            state: input.state,
            order: &trial.order,
            perspective: Perspective::Teacher,
            cursor: Some((cursor, tint)),
            caption: None,
            countdown: None,
        }));
        now = env.devices.clock.now();
    }

    let example = rt.map(|_| cursor);
    let state = match example {
        Some(at) => input.state.with_mark(at),
        None => input.state.clone(),
    };
    Ok(Ok(Response::Choice(ChoiceData {
        example,
        rt,
        movements,
        state,
        cursor,
    })))
}

fn rate(trial: &TrialDescriptor, env: &mut TrialEnv<'_, '_>, true_ons: f64) -> Presented {
    let keymap = env.keymap;
    let deadline = trial.deadline();

    let mut now = env.devices.clock.now();
    env.devices.keyboard.clear(now);

    let mut answer: Option<(usize, f64)> = None;
    while now < deadline {
        if answer.is_none() {
            if env.devices.interrupt.is_raised() {
                return Err(StopReason::Interrupted);
            }
            if let Some(ev) = env.devices.keyboard.next_event(now, keymap.keys()) {
                if keymap.is_quit(&ev.key) {
                    return Err(StopReason::QuitKey);
                }
                answer = keymap.rating_index(&ev.key).map(|i| (i, ev.t - true_ons));
            }
        } else if let Some(reason) = should_stop(env.devices, keymap, now) {
            return Err(reason);
        }

        env.devices.display.present(&Frame::RatingScale {
            marked: answer.map(|(i, _)| i),
        });
        now = env.devices.clock.now();
    }

    Ok(Response::Rating(RatingData {
        rating: answer.map(|(i, _)| i),
        rt: answer.map(|(_, t)| t),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::present::testing::{FakeDisplay, FRAME};
    use crate::present::{Interrupt, KeyEvent, ScriptedKeyboard};
    use crate::problem::Problem;
    use crate::time::{Clock, SimulatedClock};

    fn c(r: usize, col: usize) -> Coord {
        Coord::new(r, col).unwrap()
    }

    fn teaching_set() -> PuzzleSet {
        let mut a = Grid::filled(0u8);
        a.set(c(1, 1), 1);
        a.set(c(4, 4), 1);
        let mut b = Grid::filled(0u8);
        b.set(c(2, 2), 1);
        PuzzleSet::Teaching(vec![Problem::from_hypotheses([("A", a), ("B", b)])])
    }

    struct Rig {
        clock: SimulatedClock,
        display: FakeDisplay,
        keyboard: ScriptedKeyboard,
        interrupt: Interrupt,
        puzzles: PuzzleSet,
        keymap: KeyMap,
    }

    impl Rig {
        fn new(events: Vec<KeyEvent>) -> Self {
            let clock = SimulatedClock::new();
            Self {
                display: FakeDisplay::new(clock.clone()),
                clock,
                keyboard: ScriptedKeyboard::new(events),
                interrupt: Interrupt::new(),
                puzzles: teaching_set(),
                keymap: KeyMap::default(),
            }
        }

        fn run(&mut self, trial: &TrialDescriptor, input: TrialInput<'_>) -> TrialFlow {
            let mut devices = Devices {
                clock: &self.clock,
                display: &mut self.display,
                keyboard: &mut self.keyboard,
                interrupt: self.interrupt.clone(),
            };
            let mut env = TrialEnv {
                keymap: &self.keymap,
                puzzles: &self.puzzles,
                devices: &mut devices,
            };
            run_trial(trial, input, &mut env).unwrap()
        }
    }

    fn record(flow: TrialFlow) -> TrialRecord {
        match flow {
            TrialFlow::Continue(r) => r,
            TrialFlow::Stop(reason) => panic!("trial stopped: {reason:?}"),
        }
    }

    fn input(state: &PuzzleState) -> TrialInput<'_> {
        TrialInput {
            state,
            cursor: Coord::ORIGIN,
            highlight: None,
        }
    }

    fn choose_trial(dur: f64) -> TrialDescriptor {
        TrialDescriptor::new(TrialKind::Choose, 0.0, dur)
            .with_problem(0, 1)
            .with_order(["B", "A"])
    }

    #[test]
    fn pause_runs_to_deadline_and_records_overrun() {
        let mut rig = Rig::new(vec![]);
        let state = PuzzleState::blank();
        let rec = record(rig.run(&TrialDescriptor::new(TrialKind::Pause, 0.0, 0.5), input(&state)));

        assert_eq!(rec.response, Response::Passive {});
        assert!(rec.true_dur >= 0.5);
        assert!(rec.true_dur < 0.5 + 2.0 * FRAME);
        assert!(rig.display.frames.iter().all(|k| *k == "fixation"));
    }

    #[test]
    fn late_start_presents_nothing() {
        let mut rig = Rig::new(vec![]);
        rig.clock.advance(3.0);
        let state = PuzzleState::blank();
        let rec = record(rig.run(&TrialDescriptor::new(TrialKind::Pre, 1.0, 1.0), input(&state)));
        assert!(rig.display.frames.is_empty());
        assert_eq!(rec.true_dur, 0.0);
        assert_eq!(rec.onset_lag(), 2.0);
    }

    #[test]
    fn choose_moves_selects_then_freezes() {
        let mut rig = Rig::new(vec![
            KeyEvent::new("3", 0.1),
            KeyEvent::new("4", 0.2),
            KeyEvent::new("0", 0.3),
            KeyEvent::new("4", 0.5),
        ]);
        let state = PuzzleState::blank();
        let rec = record(rig.run(&choose_trial(1.0), input(&state)));
        let choice = rec.choice().unwrap();

        assert_eq!(choice.example, Some(c(1, 1)));
        assert_eq!(choice.cursor, c(1, 1));
        assert_eq!(choice.movements.len(), 3);
        assert_eq!(choice.movements[0].at, c(1, 0));
        assert!((choice.rt.unwrap() - 0.3).abs() < 1e-9);
        assert!(choice.state.is_marked(c(1, 1)));
        assert!(choice.state.revision() > state.revision());
        // The incoming snapshot is untouched.
        assert!(state.is_blank());
        assert_eq!(rig.display.last_tint, Some(CursorTint::Selected));
    }

    #[test]
    fn choose_without_selection_keeps_state() {
        let mut rig = Rig::new(vec![KeyEvent::new("4", 0.1), KeyEvent::new("0", 0.2)]);
        let state = PuzzleState::blank().with_mark(c(1, 1));
        let rec = record(rig.run(&choose_trial(0.5), input(&state)));
        let choice = rec.choice().unwrap();

        assert_eq!(choice.example, None);
        assert_eq!(choice.rt, None);
        assert_eq!(choice.cursor, c(0, 1));
        assert_eq!(choice.state, state);
        assert_eq!(rig.display.last_tint, Some(CursorTint::Cell(0)));
    }

    #[test]
    fn revealed_cell_cannot_be_selected_again() {
        let mut rig = Rig::new(vec![
            KeyEvent::new("3", 0.1),
            KeyEvent::new("4", 0.15),
            KeyEvent::new("0", 0.2),
        ]);
        let state = PuzzleState::blank().with_mark(c(1, 1));
        let rec = record(rig.run(&choose_trial(0.5), input(&state)));
        assert_eq!(rec.choice().unwrap().example, None);
        assert_eq!(rig.display.last_tint, Some(CursorTint::Cell(2)));
    }

    #[test]
    fn rate_ignores_stale_presses_and_takes_first_answer() {
        let mut rig = Rig::new(vec![
            KeyEvent::new("2", 0.5),
            KeyEvent::new("3", 1.2),
            KeyEvent::new("1", 1.4),
        ]);
        rig.clock.advance(1.0);
        let state = PuzzleState::blank();
        let trial = TrialDescriptor::new(TrialKind::Rate, 1.0, 1.0);
        let rec = record(rig.run(&trial, input(&state)));
        let rating = rec.rating().unwrap();

        assert_eq!(rating.rating, Some(3));
        assert!((rating.rt.unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(rig.display.last_marked, Some(3));
    }

    #[test]
    fn rate_without_answer_is_null() {
        let mut rig = Rig::new(vec![]);
        let state = PuzzleState::blank();
        let rec = record(rig.run(&TrialDescriptor::new(TrialKind::Rate, 0.0, 0.3), input(&state)));
        assert_eq!(
            rec.rating(),
            Some(&RatingData {
                rating: None,
                rt: None
            })
        );
    }

    #[test]
    fn study_counts_down_the_last_seconds() {
        let mut rig = Rig::new(vec![]);
        let state = PuzzleState::blank();
        let trial = TrialDescriptor::new(TrialKind::Study, 0.0, 5.0)
            .with_problem(0, 1)
            .with_order(["A", "B"]);
        record(rig.run(&trial, input(&state)));
        assert_eq!(rig.display.countdowns, vec![3, 2, 1]);
    }

    #[test]
    fn show_draws_the_highlight_in_student_view() {
        let mut rig = Rig::new(vec![]);
        let state = PuzzleState::blank().with_mark(c(4, 4));
        let trial = TrialDescriptor::new(TrialKind::Show, 0.0, 0.2).with_problem(0, 1);
        let flow = rig.run(
            &trial,
            TrialInput {
                state: &state,
                cursor: c(0, 0),
                highlight: Some(c(4, 4)),
            },
        );
        record(flow);
        assert_eq!(rig.display.last_highlight, Some(c(4, 4)));
    }

    #[test]
    fn quit_key_stops_passive_and_choose_trials() {
        let mut rig = Rig::new(vec![KeyEvent::new("q", 0.2)]);
        let state = PuzzleState::blank();
        let flow = rig.run(&TrialDescriptor::new(TrialKind::Pause, 0.0, 1.0), input(&state));
        assert_eq!(flow, TrialFlow::Stop(StopReason::QuitKey));
        assert!(rig.clock.now() < 0.3);

        let mut rig = Rig::new(vec![KeyEvent::new("4", 0.1), KeyEvent::new("q", 0.2)]);
        let flow = rig.run(&choose_trial(1.0), input(&state));
        assert_eq!(flow, TrialFlow::Stop(StopReason::QuitKey));
    }

    #[test]
    fn interrupt_stops_the_frame_loop() {
        let mut rig = Rig::new(vec![]);
        rig.interrupt.raise();
        let state = PuzzleState::blank();
        let flow = rig.run(&choose_trial(1.0), input(&state));
        assert_eq!(flow, TrialFlow::Stop(StopReason::Interrupted));
        assert!(rig.display.frames.is_empty());
    }
}
