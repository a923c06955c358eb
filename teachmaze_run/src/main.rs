//! `teachmaze`: run the timed teaching task and maze practice from a terminal.
//!
//! Keys are typed on stdin (whitespace-separated key names, one line at a
//! time) or replayed from a script file. Frames are drawn as text.

mod config;
mod devices;
mod paths;

use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use teachmaze::error::TaskError;
use teachmaze::keymap::{KeyMap, KeyPreset};
use teachmaze::maze::{self, MazeLayout};
use teachmaze::present::{Devices, Frame, Interrupt, KeyEvent, Keyboard, ScriptedKeyboard};
use teachmaze::prng::Prng;
use teachmaze::puzzles::PuzzleSet;
use teachmaze::recorder::Recorder;
use teachmaze::schedule::Schedule;
use teachmaze::session::{Session, SessionOutcome};
use teachmaze::startup;
use teachmaze::stats::SessionStats;
use teachmaze::time::{Clock, MonotonicClock, SimulatedClock};
use teachmaze::trial::StopReason;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;
use crate::devices::{Pacing, StdinKeyboard, TextDisplay};
use crate::paths::{mazes_file, subject_label, SessionPaths};

const END_MESSAGE: &str = "Great job!\nYour next task will begin shortly.";
const END_MESSAGE_SECS: f64 = 5.0;

#[derive(Parser)]
#[command(name = "teachmaze")]
#[command(about = "Timed grid teaching task and button-box maze practice")]
struct Cli {
    /// Config file (default: <config dir>/teachmaze/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one timed teaching session
    Run {
        /// Subject number; omitted means a debug run
        #[arg(long)]
        sub: Option<u32>,
        /// Run number
        #[arg(long, default_value_t = 1)]
        run: u32,
        /// Practice run on the practice problems
        #[arg(long)]
        practice: bool,
        /// Seed for the starting-corner order
        #[arg(long)]
        seed: Option<u64>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Self-paced button drill and maze practice
    Maze {
        /// Maze definitions (default: <inputs>/mazes.json, else built-in mazes)
        #[arg(long)]
        mazes: Option<PathBuf>,
        /// Go straight to the mazes
        #[arg(long)]
        skip_drill: bool,
        /// Seed for drill order and built-in mazes
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Validate a run's schedule and puzzles and print its length
    Check {
        #[arg(long)]
        sub: Option<u32>,
        #[arg(long, default_value_t = 1)]
        run: u32,
        #[arg(long)]
        practice: bool,
    },
    /// Print statistics for a behavioral data file
    Summary {
        /// Behavioral data file
        file: PathBuf,
    },
}

#[derive(Args, Clone)]
struct InputArgs {
    /// Key table: scanner or laptop
    #[arg(long)]
    keys: Option<KeyPreset>,
    /// JSON list of {"key", "t"} presses to replay instead of reading stdin.
    /// Session times count from the trigger or start key, so put that first.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Advance a simulated clock one refresh per frame instead of sleeping
    #[arg(long)]
    simulate: bool,
    /// Do not print frames
    #[arg(long, short)]
    quiet: bool,
}

impl InputArgs {
    fn unattended(&self) -> bool {
        self.script.is_some() || self.simulate
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let (cfg, cfg_path) = RunnerConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cfg_path {
        info!(path = %path.display(), "config loaded");
    }

    match cli.command {
        Commands::Run {
            sub,
            run,
            practice,
            seed,
            yes,
            input,
        } => run_teaching(cfg, sub, run, practice, seed, yes, input).await,
        Commands::Maze {
            mazes,
            skip_drill,
            seed,
            input,
        } => run_mazes(cfg, mazes, skip_drill, seed, input).await,
        Commands::Check { sub, run, practice } => check(&cfg, sub, run, practice),
        Commands::Summary { file } => {
            let stats = SessionStats::from_file(&file)?;
            println!("{}\n{stats}", file.display());
            Ok(())
        }
    }
}

/// Raise `interrupt` on Ctrl-C or SIGTERM so the frame loop can save and stop.
fn watch_signals(interrupt: Interrupt) {
    tokio::spawn(async move {
        if stop_signal().await {
            warn!("Task interrupted! Saving data...");
            interrupt.raise();
        }
    });
}

#[cfg(unix)]
async fn stop_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut term) = signal(SignalKind::terminate()) else {
        return tokio::signal::ctrl_c().await.is_ok();
    };
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.is_ok(),
        _ = term.recv() => true,
    }
}

#[cfg(not(unix))]
async fn stop_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}

fn unix_stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn load_run(
    cfg: &RunnerConfig,
    sub: Option<u32>,
    run: u32,
    practice: bool,
) -> Result<(SessionPaths, Schedule, PuzzleSet), TaskError> {
    let paths = SessionPaths::resolve(cfg, sub, run, practice, unix_stamp());
    info!(path = %paths.timing.display(), "loading timing info");
    let schedule = Schedule::load(&paths.timing)?;
    let puzzles = PuzzleSet::load_teaching(&paths.problems)?;
    schedule.validate(&puzzles)?;
    Ok((paths, schedule, puzzles))
}

fn print_run_length(schedule: &Schedule, tr: f64) {
    let volumes = schedule.volumes(tr);
    let secs = (volumes as f64 * tr).round() as u64;
    println!("# images: {volumes}");
    println!("Run length: {:02}:{:02}", secs / 60, secs % 60);
}

fn check(
    cfg: &RunnerConfig,
    sub: Option<u32>,
    run: u32,
    practice: bool,
) -> Result<(), Box<dyn Error>> {
    let (paths, schedule, puzzles) = load_run(cfg, sub, run, practice)?;
    println!("timing:   {}", paths.timing.display());
    println!("problems: {} ({} loaded)", paths.problems.display(), puzzles.len());
    println!(
        "trials:   {} across {} puzzles",
        schedule.len(),
        schedule.puzzle_count()
    );
    print_run_length(&schedule, cfg.tr_seconds);
    Ok(())
}

fn confirm() -> io::Result<()> {
    print!("Press Enter to confirm");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn load_script(path: &Path) -> Result<ScriptedKeyboard, TaskError> {
    let text = fs::read_to_string(path).map_err(|source| TaskError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let events: Vec<KeyEvent> = serde_json::from_str(&text)?;
    Ok(ScriptedKeyboard::new(events))
}

/// Clock, screen and keyboard for one blocking run.
struct Rig {
    simulated: Option<SimulatedClock>,
    monotonic: MonotonicClock,
    display: TextDisplay,
    keyboard: Box<dyn Keyboard>,
}

impl Rig {
    fn open(input: &InputArgs, cfg: &RunnerConfig) -> Result<Self, TaskError> {
        let simulated = input.simulate.then(SimulatedClock::new);
        let monotonic = MonotonicClock::start();

        let pacing = match &simulated {
            Some(clock) => Pacing::Simulated {
                clock: clock.clone(),
                frame: cfg.frame_seconds(),
            },
            None => Pacing::RealTime(Duration::from_secs_f64(cfg.frame_seconds())),
        };
        let keyboard: Box<dyn Keyboard> = match (&input.script, &simulated) {
            (Some(path), _) => Box::new(load_script(path)?),
            (None, Some(clock)) => Box::new(StdinKeyboard::spawn(clock.clone())),
            (None, None) => Box::new(StdinKeyboard::spawn(monotonic.clone())),
        };

        Ok(Self {
            simulated,
            monotonic,
            display: TextDisplay::new(pacing, !input.quiet),
            keyboard,
        })
    }

    fn devices(&mut self, interrupt: Interrupt) -> Devices<'_> {
        let clock: &dyn Clock = match &self.simulated {
            Some(clock) => clock,
            None => &self.monotonic,
        };
        Devices {
            clock,
            display: &mut self.display,
            keyboard: self.keyboard.as_mut(),
            interrupt,
        }
    }
}

async fn run_teaching(
    cfg: RunnerConfig,
    sub: Option<u32>,
    run: u32,
    practice: bool,
    seed: Option<u64>,
    yes: bool,
    input: InputArgs,
) -> Result<(), Box<dyn Error>> {
    let (paths, schedule, puzzles) = load_run(&cfg, sub, run, practice)?;
    let run_label = if practice {
        "PRACTICE".to_string()
    } else {
        run.to_string()
    };
    println!("SUBJECT: {} | RUN: {run_label}", subject_label(sub));
    print_run_length(&schedule, cfg.tr_seconds);
    println!("Saving data to: {}", paths.output.display());

    if !(yes || input.unattended()) {
        confirm()?;
    }

    let seed = seed.unwrap_or_else(|| Prng::from_entropy().1);
    let keymap = KeyMap::new(input.keys.unwrap_or(cfg.keys));
    let interrupt = Interrupt::new();
    watch_signals(interrupt.clone());

    let outcome = tokio::task::spawn_blocking(move || -> Result<Option<SessionOutcome>, TaskError> {
        let mut rig = Rig::open(&input, &cfg)?;
        let mut devices = rig.devices(interrupt);

        let started = if practice {
            startup::practice_start(&mut devices, &keymap)
        } else {
            startup::hold_still(&mut devices, startup::HOLD_STILL_SECS)
                .and_then(|()| startup::wait_for_trigger(&mut devices, &keymap))
        };
        if let Err(reason) = started {
            warn!(reason = reason.as_str(), "run did not start");
            return Ok(None);
        }

        let outcome = Session::new(&schedule, &puzzles, &keymap, seed)
            .run(&mut devices, Recorder::to_file(&paths.output))?;
        if practice && outcome.completed {
            if let Err(reason) = startup::practice_end(&mut devices, &keymap) {
                info!(reason = reason.as_str(), "end screen closed");
            }
        }
        Ok(Some(outcome))
    })
    .await??;
    let Some(outcome) = outcome else {
        return Ok(());
    };

    if outcome.completed {
        info!(seed = outcome.seed, "All done!");
    } else {
        warn!(
            seed = outcome.seed,
            reason = outcome.stop.map(|r| r.as_str()),
            "run ended early"
        );
    }
    println!("{}", outcome.stats);
    Ok(())
}

async fn run_mazes(
    cfg: RunnerConfig,
    explicit: Option<PathBuf>,
    skip_drill: bool,
    seed: Option<u64>,
    input: InputArgs,
) -> Result<(), Box<dyn Error>> {
    let seed = seed.unwrap_or_else(|| Prng::from_entropy().1);
    let default_file = mazes_file(&cfg);
    let layouts = match explicit {
        Some(path) => MazeLayout::load_all(&path)?,
        None if default_file.exists() => MazeLayout::load_all(&default_file)?,
        None => {
            info!(seed, "no maze file, carving built-in mazes");
            MazeLayout::builtin_practice(seed)
        }
    };
    let keymap = KeyMap::new(input.keys.unwrap_or(cfg.keys));
    info!(mazes = layouts.len(), keys = %keymap.preset(), "maze practice");

    let interrupt = Interrupt::new();
    watch_signals(interrupt.clone());

    tokio::task::spawn_blocking(move || -> Result<(), TaskError> {
        let mut rig = Rig::open(&input, &cfg)?;
        let mut devices = rig.devices(interrupt);

        if let Err(reason) = maze_start(&mut devices, &keymap) {
            ended_early("start screen", reason);
            return Ok(());
        }

        if !skip_drill {
            if let Err(reason) =
                show_screens(&mut devices, &keymap, &maze::KEY_INTRO, keymap.response_keys())
            {
                ended_early("instructions", reason);
                return Ok(());
            }
            let drill = maze::run_button_drill(&keymap, &mut devices, &mut Prng::new(seed))?;
            info!(
                prompts = drill.prompts,
                wrong = drill.wrong_presses,
                "button drill done"
            );
            if let Some(reason) = drill.stop {
                ended_early("button drill", reason);
                return Ok(());
            }
        }

        let action = [keymap.action_key()];
        if let Err(reason) = show_screens(&mut devices, &keymap, &maze::MAZE_INTRO, &action) {
            ended_early("instructions", reason);
            return Ok(());
        }

        let report = maze::run_practice(&layouts, &keymap, &mut devices)?;
        for a in &report.attempts {
            info!(
                maze = a.maze,
                presses = a.presses,
                bumps = a.bumps,
                solved = a.solved,
                secs = a.duration,
                "maze result"
            );
        }
        match report.stop {
            Some(reason) => ended_early("maze practice", reason),
            None => hold_message(&mut devices, END_MESSAGE, END_MESSAGE_SECS),
        }
        Ok(())
    })
    .await??;
    Ok(())
}

fn ended_early(stage: &str, reason: StopReason) {
    warn!(stage, reason = reason.as_str(), "maze task ended early");
}

/// Scanner sessions get the hold-still countdown before the start prompt.
fn maze_start(devices: &mut Devices<'_>, keymap: &KeyMap) -> Result<(), StopReason> {
    if keymap.preset() == KeyPreset::Scanner {
        startup::hold_still(devices, startup::HOLD_STILL_SECS)?;
    }
    let (prompt, keys) = startup::start_prompt(keymap);
    startup::wait_for_key(devices, keymap, prompt, &keys)?;
    Ok(())
}

fn show_screens(
    devices: &mut Devices<'_>,
    keymap: &KeyMap,
    screens: &[&str],
    accept: &[&str],
) -> Result<(), StopReason> {
    for text in screens {
        startup::wait_for_key(devices, keymap, text, accept)?;
    }
    Ok(())
}

fn hold_message(devices: &mut Devices<'_>, text: &str, secs: f64) {
    let until = devices.clock.now() + secs;
    while devices.clock.now() < until && !devices.interrupt.is_raised() {
        devices.display.present(&Frame::Message(text));
    }
}
