//! Teaching problems: named 6x6 hypothesis overlays, one of them true.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};
use crate::grid::{Coord, Grid, GRID_SIZE};

/// Name of the true hypothesis in every problem definition.
pub const TRUE_HYPOTHESIS: &str = "A";

/// Combined value of a true-hypothesis cell that has not been shown yet.
/// Cells outside the hypothesis read 0; revealed cells read 2.
pub const UNREVEALED: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Problem {
    hypotheses: HashMap<String, Grid<u8>>,
}

impl Problem {
    pub fn from_hypotheses<'a>(items: impl IntoIterator<Item = (&'a str, Grid<u8>)>) -> Self {
        Self {
            hypotheses: items
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn hypothesis(&self, name: &str) -> Option<&Grid<u8>> {
        self.hypotheses.get(name)
    }

    pub fn hypothesis_names(&self) -> impl Iterator<Item = &str> {
        self.hypotheses.keys().map(String::as_str)
    }

    /// The true hypothesis. Presence is checked by [`Problem::validate`].
    pub fn truth(&self) -> &Grid<u8> {
        static EMPTY: Grid<u8> = Grid::from_rows([[0; GRID_SIZE]; GRID_SIZE]);
        self.hypotheses.get(TRUE_HYPOTHESIS).unwrap_or(&EMPTY)
    }

    /// True hypothesis plus participant marks, cell by cell.
    pub fn combined(&self, marks: &Grid<u8>) -> Grid<u8> {
        self.truth().add(marks)
    }

    /// What a student sees: only revealed cells, everything else blank.
    pub fn student_view(&self, marks: &Grid<u8>) -> Grid<u8> {
        self.combined(marks).map(|v| if v > UNREVEALED { v } else { 0 })
    }

    /// Cells a teacher can still select.
    pub fn remaining_examples(&self, marks: &Grid<u8>) -> usize {
        self.combined(marks)
            .cells()
            .filter(|&(_, v)| v == UNREVEALED)
            .count()
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        let truth = self.hypotheses.get(TRUE_HYPOTHESIS).ok_or_else(|| {
            TaskError::MalformedPuzzle(format!(
                "problem {index} has no true hypothesis {TRUE_HYPOTHESIS:?}"
            ))
        })?;
        for (name, grid) in &self.hypotheses {
            if let Some((at, v)) = grid.cells().find(|&(_, v)| v > 1) {
                return Err(TaskError::MalformedPuzzle(format!(
                    "problem {index} hypothesis {name:?} has value {v} at {at}; expected 0 or 1"
                )));
            }
        }
        if truth.cells().all(|(_, v)| v == 0) {
            return Err(TaskError::MalformedPuzzle(format!(
                "problem {index} true hypothesis is empty"
            )));
        }
        Ok(())
    }

    /// Every name in `order` must refer to a hypothesis of this problem.
    pub fn check_order(&self, order: &[String]) -> Result<()> {
        match order.iter().find(|n| !self.hypotheses.contains_key(n.as_str())) {
            Some(missing) => Err(TaskError::MalformedPuzzle(format!(
                "hypothesis {missing:?} is not defined"
            ))),
            None => Ok(()),
        }
    }

    /// Position of the true hypothesis in a display order.
    pub fn true_slot(order: &[String]) -> Option<usize> {
        order.iter().position(|n| n == TRUE_HYPOTHESIS)
    }

    pub fn is_true_cell(&self, at: Coord) -> bool {
        self.truth().get(at) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(r: usize, col: usize) -> Coord {
        Coord::new(r, col).unwrap()
    }

    fn sample() -> Problem {
        let mut a = Grid::filled(0u8);
        a.set(c(0, 0), 1);
        a.set(c(0, 1), 1);
        let mut b = Grid::filled(0u8);
        b.set(c(3, 3), 1);
        Problem::from_hypotheses([("A", a), ("B", b)])
    }

    #[test]
    fn student_view_hides_unrevealed_cells() {
        let p = sample();
        let mut marks = Grid::filled(0u8);
        marks.set(c(0, 0), 1);

        let view = p.student_view(&marks);
        assert_eq!(view.get(c(0, 0)), 2);
        assert_eq!(view.get(c(0, 1)), 0);
        assert_eq!(p.remaining_examples(&marks), 1);
    }

    #[test]
    fn parses_problem_file_entry() {
        let json = r#"{
            "A": [[1,1,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0]],
            "B": [[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,0],[0,0,0,0,0,1]]
        }"#;
        let p: Problem = serde_json::from_str(json).unwrap();
        p.validate(0).unwrap();
        assert!(p.is_true_cell(c(0, 1)));
        assert_eq!(Problem::true_slot(&["B".into(), "A".into()]), Some(1));
    }

    #[test]
    fn rejects_missing_truth_and_unknown_order() {
        let only_b = Problem::from_hypotheses([("B", Grid::filled(0u8))]);
        assert!(only_b.validate(3).is_err());

        let p = sample();
        assert!(p.check_order(&["A".into(), "B".into()]).is_ok());
        assert!(p.check_order(&["A".into(), "C".into()]).is_err());
    }
}
