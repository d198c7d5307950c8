//! Reel Core - Stories Engine for Reel
//!
//! This crate provides the core of a full-screen "stories" viewer:
//! - Device and connection profiling
//! - Adaptive source selection with streaming fallback
//! - Bounded media cache with batched eviction
//! - Playback state machine with pause-preserving timers
//! - Tap, hold, swipe and keyboard interpretation
//! - Locally persisted seen-set and engagement state
//!
//! The engine is synchronous and clock-agnostic. Every call takes the
//! host's monotonic time and queues [`Effect`]s that the host executes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Reel Core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Device     │  │    Media     │  │   Source     │          │
//! │  │   Profile    │  │    Cache     │  │   Resolver   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐           │
//! │  │   Gesture    │──│    Story    │──│  Engagement  │           │
//! │  │  Interpreter │  │   Player    │  │    Store     │           │
//! │  └──────────────┘  └──────┬──────┘  └──────────────┘           │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Effects   │──▶ Presenter / Session       │
//! │                    └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod profile;
pub mod cache;
pub mod resolver;
pub mod storage;
pub mod engagement;
pub mod share;
pub mod preload;
pub mod effects;
pub mod presentation;
pub mod gesture;
pub mod playback;
pub mod controller;
#[cfg(feature = "runtime")]
pub mod prefetch;
#[cfg(feature = "runtime")]
pub mod loader;
#[cfg(feature = "runtime")]
pub mod session;

pub use error::{Error, Result};
pub use types::*;
pub use config::{demo_stories, StoriesConfig};
pub use profile::{DeviceClass, DeviceProfile, DeviceSignals, MediaTier};
pub use cache::{CacheStats, CachedMedia, MediaCache};
pub use resolver::{SourceResolver, StreamingPlan, StreamingSupport};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SeenSet};
pub use engagement::{Comment, EngagementStore, VisitorProfile};
pub use effects::Effect;
pub use presentation::{Presenter, ViewEvent, ViewModel};
pub use gesture::{Command, InputEvent};
pub use playback::{MediaReport, Phase, PlaybackState, StoryPlayer};
pub use controller::StoriesController;
#[cfg(feature = "runtime")]
pub use session::StorySession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Reel Core initialized");
}
