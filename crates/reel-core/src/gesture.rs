//! Input and gesture interpretation
//!
//! Turns raw pointer, touch and keyboard input into playback commands.
//! The interpreter only tracks the gesture in progress; timing against the
//! opening of the modal is checked with the `opened_at` the caller passes.

use crate::config::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Engine command produced by input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    OpenStory { story: usize, item: usize },
    NextItem,
    PrevItem,
    NextStory,
    PrevStory { jump_to_last: bool },
    Pause,
    Resume,
    Close,
    ToggleMute,
    ToggleComments,
    /// Close and hand focus to the page's purchase button
    LearnMore,
}

/// Direction of an explicit navigation button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavDirection {
    Prev,
    Next,
}

/// Keys the modal reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Tab { shift: bool },
    Other,
}

/// Raw input delivered by the host
///
/// Coordinates are relative to the media surface; `width` is the surface
/// width at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerUp { x: f64, y: f64, width: f64 },
    /// Pointer left the surface or the platform cancelled it
    PointerCancel,
    /// A hold timer armed by [`Step::ArmHold`] expired
    HoldElapsed { token: u64 },
    Key { key: Key },
    NavButton { direction: NavDirection },
    CloseButton,
    /// Click on the dimmed area around the modal
    Backdrop,
}

/// What the host should do in response to input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Dispatch(Command),
    ArmHold { token: u64, delay: Duration },
    CancelHold,
    AfterFrames { frames: u8, commands: Vec<Command> },
    TrapFocus { backwards: bool },
}

#[derive(Debug, Clone, Copy)]
struct Press {
    x: f64,
    y: f64,
}

/// Stateful gesture recognizer
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    hold_delay: Duration,
    open_guard: Duration,
    swipe_threshold: f64,
    nav_frames: u8,
    press: Option<Press>,
    hold_token: u64,
    holding: bool,
}

impl GestureInterpreter {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            hold_delay: config.hold_delay(),
            open_guard: config.open_pause_guard(),
            swipe_threshold: config.swipe_threshold_px,
            nav_frames: config.nav_resume_frames,
            press: None,
            hold_token: 0,
            holding: false,
        }
    }

    /// A hold-pause is active
    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Forget any gesture in progress, e.g. when the modal closes
    pub fn reset(&mut self) {
        self.press = None;
        self.holding = false;
        self.hold_token += 1;
    }

    fn within_guard(&self, now: Duration, opened_at: Option<Duration>) -> bool {
        opened_at.is_some_and(|at| now.saturating_sub(at) < self.open_guard)
    }

    /// Interpret one input event
    pub fn interpret(
        &mut self,
        event: InputEvent,
        now: Duration,
        opened_at: Option<Duration>,
    ) -> Vec<Step> {
        trace!(?event, "Input");
        match event {
            InputEvent::PointerDown { x, y } => {
                self.press = Some(Press { x, y });
                self.holding = false;
                self.hold_token += 1;
                if self.within_guard(now, opened_at) {
                    return Vec::new();
                }
                vec![Step::ArmHold {
                    token: self.hold_token,
                    delay: self.hold_delay,
                }]
            }
            InputEvent::HoldElapsed { token } => {
                if token != self.hold_token || self.press.is_none() {
                    return Vec::new();
                }
                self.holding = true;
                vec![Step::Dispatch(Command::Pause)]
            }
            InputEvent::PointerUp { x, y, width } => {
                let Some(press) = self.press.take() else {
                    return Vec::new();
                };
                self.hold_token += 1;
                let mut steps = vec![Step::CancelHold];

                // Releasing a hold resumes; it is never also a tap
                if std::mem::take(&mut self.holding) {
                    steps.push(Step::Dispatch(Command::Resume));
                    return steps;
                }

                let dx = x - press.x;
                let dy = y - press.y;
                if dx.abs() > self.swipe_threshold && dx.abs() > dy.abs() {
                    let cmd = if dx > 0.0 { Command::PrevItem } else { Command::NextItem };
                    steps.push(Step::Dispatch(cmd));
                } else if dx.abs().max(dy.abs()) <= self.swipe_threshold {
                    let cmd = if x < width / 2.0 { Command::PrevItem } else { Command::NextItem };
                    steps.push(Step::Dispatch(cmd));
                }
                steps
            }
            InputEvent::PointerCancel => {
                let had_press = self.press.take().is_some();
                self.hold_token += 1;
                let mut steps = Vec::new();
                if had_press {
                    steps.push(Step::CancelHold);
                }
                if std::mem::take(&mut self.holding) {
                    steps.push(Step::Dispatch(Command::Resume));
                }
                steps
            }
            InputEvent::Key { key: Key::Escape } => vec![Step::Dispatch(Command::Close)],
            InputEvent::Key { key: Key::Tab { shift } } => vec![Step::TrapFocus { backwards: shift }],
            InputEvent::Key { key: Key::Other } => Vec::new(),
            InputEvent::NavButton { direction } => {
                let nav = match direction {
                    NavDirection::Prev => Command::PrevItem,
                    NavDirection::Next => Command::NextItem,
                };
                vec![
                    Step::Dispatch(Command::Pause),
                    Step::AfterFrames {
                        frames: self.nav_frames,
                        commands: vec![nav, Command::Resume],
                    },
                ]
            }
            InputEvent::CloseButton | InputEvent::Backdrop => vec![Step::Dispatch(Command::Close)],
        }
    }
}

/// Focus index to force when Tab would leave the modal
///
/// Returns `None` when the browser's default focus move stays inside.
pub fn focus_trap(active: Option<usize>, count: usize, backwards: bool) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let last = count - 1;
    match (active, backwards) {
        (Some(0), true) => Some(last),
        (Some(i), false) if i == last => Some(0),
        // Focus is outside the modal
        (None, true) => Some(last),
        (None, false) => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENED: Option<Duration> = Some(Duration::from_millis(0));

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn gestures() -> GestureInterpreter {
        GestureInterpreter::new(&PlaybackConfig::default())
    }

    fn dispatched(steps: &[Step]) -> Vec<Command> {
        steps
            .iter()
            .filter_map(|s| match s {
                Step::Dispatch(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_tap_halves() {
        let mut g = gestures();
        g.interpret(InputEvent::PointerDown { x: 10.0, y: 10.0 }, ms(1000), OPENED);
        let steps = g.interpret(InputEvent::PointerUp { x: 10.0, y: 10.0, width: 400.0 }, ms(1050), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::PrevItem]);

        g.interpret(InputEvent::PointerDown { x: 300.0, y: 10.0 }, ms(2000), OPENED);
        let steps = g.interpret(InputEvent::PointerUp { x: 300.0, y: 10.0, width: 400.0 }, ms(2050), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::NextItem]);
    }

    #[test]
    fn test_swipe_direction() {
        let mut g = gestures();
        g.interpret(InputEvent::PointerDown { x: 300.0, y: 100.0 }, ms(1000), OPENED);
        let steps = g.interpret(InputEvent::PointerUp { x: 200.0, y: 110.0, width: 400.0 }, ms(1100), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::NextItem]);

        g.interpret(InputEvent::PointerDown { x: 100.0, y: 100.0 }, ms(2000), OPENED);
        let steps = g.interpret(InputEvent::PointerUp { x: 150.0, y: 100.0, width: 400.0 }, ms(2100), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::PrevItem]);
    }

    #[test]
    fn test_vertical_drag_is_ignored() {
        let mut g = gestures();
        g.interpret(InputEvent::PointerDown { x: 100.0, y: 100.0 }, ms(1000), OPENED);
        let steps = g.interpret(InputEvent::PointerUp { x: 150.0, y: 300.0, width: 400.0 }, ms(1100), OPENED);
        assert!(dispatched(&steps).is_empty());
    }

    #[test]
    fn test_hold_pauses_and_release_resumes() {
        let mut g = gestures();
        let steps = g.interpret(InputEvent::PointerDown { x: 300.0, y: 10.0 }, ms(1000), OPENED);
        let Step::ArmHold { token, delay } = steps[0] else {
            panic!("expected hold timer");
        };
        assert_eq!(delay, ms(120));

        let steps = g.interpret(InputEvent::HoldElapsed { token }, ms(1120), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::Pause]);
        assert!(g.is_holding());

        // The release is not also a tap on the right half
        let steps = g.interpret(InputEvent::PointerUp { x: 300.0, y: 10.0, width: 400.0 }, ms(2000), OPENED);
        assert_eq!(dispatched(&steps), vec![Command::Resume]);
        assert!(!g.is_holding());
    }

    #[test]
    fn test_no_hold_right_after_open() {
        let mut g = gestures();
        let steps = g.interpret(InputEvent::PointerDown { x: 300.0, y: 10.0 }, ms(300), OPENED);
        assert!(steps.is_empty());
    }

    #[test]
    fn test_stale_hold_timer_ignored() {
        let mut g = gestures();
        let steps = g.interpret(InputEvent::PointerDown { x: 1.0, y: 1.0 }, ms(1000), OPENED);
        let Step::ArmHold { token, .. } = steps[0] else {
            panic!("expected hold timer");
        };
        g.interpret(InputEvent::PointerUp { x: 1.0, y: 1.0, width: 400.0 }, ms(1050), OPENED);
        assert!(g.interpret(InputEvent::HoldElapsed { token }, ms(1120), OPENED).is_empty());
    }

    #[test]
    fn test_nav_button_pauses_then_navigates_after_frames() {
        let mut g = gestures();
        let steps = g.interpret(InputEvent::NavButton { direction: NavDirection::Next }, ms(5000), OPENED);
        assert_eq!(
            steps,
            vec![
                Step::Dispatch(Command::Pause),
                Step::AfterFrames {
                    frames: 2,
                    commands: vec![Command::NextItem, Command::Resume],
                },
            ]
        );
    }

    #[test]
    fn test_keys_and_close() {
        let mut g = gestures();
        assert_eq!(
            dispatched(&g.interpret(InputEvent::Key { key: Key::Escape }, ms(0), OPENED)),
            vec![Command::Close]
        );
        assert_eq!(
            g.interpret(InputEvent::Key { key: Key::Tab { shift: true } }, ms(0), OPENED),
            vec![Step::TrapFocus { backwards: true }]
        );
        assert_eq!(
            dispatched(&g.interpret(InputEvent::Backdrop, ms(0), OPENED)),
            vec![Command::Close]
        );
    }

    #[test]
    fn test_focus_trap_wraps() {
        assert_eq!(focus_trap(Some(4), 5, false), Some(0));
        assert_eq!(focus_trap(Some(0), 5, true), Some(4));
        assert_eq!(focus_trap(Some(2), 5, false), None);
        assert_eq!(focus_trap(None, 0, false), None);
    }
}
