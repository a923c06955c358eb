//! Screens around a run: the hold-still countdown, the scanner trigger and
//! the start and end prompts of practice runs.
//!
//! Schedule onsets count from the first scanner volume (or, for practice, the
//! start key), so each entry point restarts the session clock on that press.

use tracing::info;

use crate::keymap::{KeyMap, KeyPreset};
use crate::present::{Devices, Frame, KeyEvent};
use crate::trial::StopReason;

/// Key name the scanner sends at every volume.
pub const TRIGGER_KEY: &str = "equal";
pub const HOLD_STILL_SECS: u32 = 5;
pub const WAITING_FOR_SCANNER: &str = "Waiting for scanner";
pub const PRACTICE_INTRO: &str = "Next, we'll do a practice run of the task.\n\
                                  Please do your best to provide a response in time!\n\n";

/// Shows `text` until a key in `accept` arrives. The quit key, an interrupt
/// or an exhausted key script end the wait instead.
pub fn wait_for_key(
    devices: &mut Devices<'_>,
    keymap: &KeyMap,
    text: &str,
    accept: &[&str],
) -> Result<KeyEvent, StopReason> {
    let mut listen = accept.to_vec();
    listen.push(keymap.quit_key());

    loop {
        if devices.interrupt.is_raised() {
            return Err(StopReason::Interrupted);
        }
        devices.display.present(&Frame::Message(text));
        let now = devices.clock.now();
        match devices.keyboard.next_event(now, &listen) {
            Some(ev) if accept.contains(&ev.key.as_str()) => return Ok(ev),
            Some(_) => return Err(StopReason::QuitKey),
            None if devices.keyboard.exhausted() => return Err(StopReason::InputExhausted),
            None => {}
        }
    }
}

/// One screen per second counting down from `secs`. Keys are left queued.
pub fn hold_still(devices: &mut Devices<'_>, secs: u32) -> Result<(), StopReason> {
    let start = devices.clock.now();
    for left in (1..=secs).rev() {
        let text = format!("Please lie very still!\nWe will begin in:\n\n{left}");
        let until = start + f64::from(secs - left + 1);
        while devices.clock.now() < until {
            if devices.interrupt.is_raised() {
                return Err(StopReason::Interrupted);
            }
            devices.display.present(&Frame::Message(&text));
        }
    }
    Ok(())
}

/// Waits for the first scanner volume and restarts the session clock on it.
pub fn wait_for_trigger(devices: &mut Devices<'_>, keymap: &KeyMap) -> Result<(), StopReason> {
    let ev = wait_for_key(devices, keymap, WAITING_FOR_SCANNER, &[TRIGGER_KEY])?;
    devices.clock.restart();
    info!(key_time = ev.t, "scanner trigger, session clock restarted");
    Ok(())
}

/// Start prompt and the keys that answer it. In the scanner any button or
/// the trigger starts; at a laptop only `=` does.
pub fn start_prompt(keymap: &KeyMap) -> (&'static str, Vec<&'static str>) {
    match keymap.preset() {
        KeyPreset::Scanner => {
            let mut keys = keymap.response_keys().to_vec();
            keys.push(TRIGGER_KEY);
            ("Press any key to start", keys)
        }
        KeyPreset::Laptop => ("Press = to start", vec![TRIGGER_KEY]),
    }
}

/// Practice run start screen. The session clock restarts on the key press.
pub fn practice_start(devices: &mut Devices<'_>, keymap: &KeyMap) -> Result<(), StopReason> {
    let (prompt, keys) = start_prompt(keymap);
    let text = format!("{PRACTICE_INTRO}{prompt}");
    wait_for_key(devices, keymap, &text, &keys)?;
    devices.clock.restart();
    info!("practice run started");
    Ok(())
}

pub fn practice_end_message(preset: KeyPreset) -> &'static str {
    match preset {
        KeyPreset::Scanner => {
            "Great job!\nPlease stay still until the end of the scan. \
             Feel free to rest your eyes for a while."
        }
        KeyPreset::Laptop => {
            "Great job!\nPlease see the experimenter to proceed to your scan.\n\n\
             Press = to close."
        }
    }
}

/// Closing practice screen, held until `=`.
pub fn practice_end(devices: &mut Devices<'_>, keymap: &KeyMap) -> Result<(), StopReason> {
    let text = practice_end_message(keymap.preset());
    wait_for_key(devices, keymap, text, &[TRIGGER_KEY]).map(|_| ())
}
