//! Instructions the engine hands to its host
//!
//! The engine never sleeps, touches a DOM or opens a socket. Every side
//! effect is queued as an [`Effect`] and the host drains the queue after
//! each call. Effects that come back later (timers, loads) carry the token
//! that was current when they were issued.

use crate::{
    gesture::Command,
    playback::{LoadToken, TimerToken},
    presentation::ViewEvent,
    types::MediaKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a background load was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum PreloadPurpose {
    /// High-quality variant of the current image; report with `upgrade_ready`
    Upgrade { token: LoadToken },
    /// Warm the browser cache for the item after the current one
    NextItem,
    /// Avatar thumbnail; report with `preload_finished`
    Thumbnail,
}

/// A side effect requested by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Call `timer_fired(token)` after `delay`
    ArmTimer { token: TimerToken, delay: Duration },
    /// Drop any pending item timer
    CancelTimer,
    /// Call `loading_grace_elapsed(token)` after `delay`
    ScheduleLoadingIndicator { token: LoadToken, delay: Duration },
    /// Feed `InputEvent::HoldElapsed { token }` back after `delay`
    ArmHoldTimer { token: u64, delay: Duration },
    CancelHoldTimer,
    /// Run `commands` after `frames` animation frames
    AfterFrames { frames: u8, commands: Vec<Command> },
    /// Fire-and-forget fetches; failures are ignored
    Warmup { urls: Vec<String> },
    /// Load a media URL in the background
    Preload {
        url: String,
        kind: MediaKind,
        purpose: PreloadPurpose,
    },
    /// Keep keyboard focus inside the modal
    TrapFocus { backwards: bool },
    /// Rendering instruction for the presentation adapter
    View(ViewEvent),
}

impl From<ViewEvent> for Effect {
    fn from(event: ViewEvent) -> Self {
        Effect::View(event)
    }
}

/// Queue of effects drained by the host after every call
#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<Effect>,
}

impl Outbox {
    pub fn push(&mut self, effect: impl Into<Effect>) {
        self.effects.push(effect.into());
    }

    pub fn extend(&mut self, effects: impl IntoIterator<Item = Effect>) {
        self.effects.extend(effects);
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }
}
