//! Input and output file locations for a run.

use std::path::PathBuf;

use crate::config::RunnerConfig;

/// Per-user config file under the OS config directory.
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("teachmaze").join("config.json"))
}

/// Subject label as it appears in file names: two digits, or `debug`.
pub fn subject_label(sub: Option<u32>) -> String {
    match sub {
        Some(n) => format!("{n:02}"),
        None => "debug".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub timing: PathBuf,
    pub problems: PathBuf,
    pub output: PathBuf,
}

impl SessionPaths {
    /// Practice runs replay the debug schedule on the practice problems and
    /// are saved as `run-practice`.
    pub fn resolve(
        cfg: &RunnerConfig,
        sub: Option<u32>,
        run: u32,
        practice: bool,
        stamp: u64,
    ) -> Self {
        let timing_dir = cfg.inputs_dir.join("timing");
        if practice {
            let label = subject_label(Some(sub.unwrap_or(0)));
            return Self {
                timing: timing_dir.join("sub-debug_task-teaching_run-01_timing.json"),
                problems: cfg.inputs_dir.join("practice_problems.json"),
                output: cfg.data_dir.join(format!(
                    "sub-{label}_task-teaching_run-practice_behavioral_{stamp}.json"
                )),
            };
        }

        let stem = format!("sub-{}_task-teaching_run-{run:02}", subject_label(sub));
        Self {
            timing: timing_dir.join(format!("{stem}_timing.json")),
            problems: cfg.inputs_dir.join("problems.json"),
            output: cfg
                .data_dir
                .join(format!("{stem}_behavioral_{stamp}.json")),
        }
    }
}

pub fn mazes_file(cfg: &RunnerConfig) -> PathBuf {
    cfg.inputs_dir.join("mazes.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn scanner_run_paths() {
        let cfg = RunnerConfig::default();
        let p = SessionPaths::resolve(&cfg, Some(7), 2, false, 1_700_000_000);
        assert_eq!(
            p.timing,
            Path::new("inputs/timing/sub-07_task-teaching_run-02_timing.json")
        );
        assert_eq!(p.problems, Path::new("inputs/problems.json"));
        assert_eq!(
            p.output,
            Path::new("data/sub-07_task-teaching_run-02_behavioral_1700000000.json")
        );
    }

    #[test]
    fn no_subject_is_debug() {
        let p = SessionPaths::resolve(&RunnerConfig::default(), None, 1, false, 5);
        assert_eq!(
            p.timing,
            Path::new("inputs/timing/sub-debug_task-teaching_run-01_timing.json")
        );
    }

    #[test]
    fn practice_uses_debug_schedule_and_practice_problems() {
        let p = SessionPaths::resolve(&RunnerConfig::default(), Some(3), 4, true, 9);
        assert_eq!(
            p.timing,
            Path::new("inputs/timing/sub-debug_task-teaching_run-01_timing.json")
        );
        assert_eq!(p.problems, Path::new("inputs/practice_problems.json"));
        assert_eq!(
            p.output,
            Path::new("data/sub-03_task-teaching_run-practice_behavioral_9.json")
        );
    }
}
