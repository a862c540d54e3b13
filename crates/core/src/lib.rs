//! Core library for the Five Finger Fillet rhythm game.
//!
//! The crate holds everything except presentation: beatmap data, the rhythm
//! conductor that judges presses against the playback clock, input
//! classification, scoring, and the session loop that wires them together.
//! Rendering and audio playback live in the host and talk to the core through
//! [`PlaybackClock`], [`InputSource`] and event subscriptions.

pub mod analysis;
pub mod beatmap;
pub mod conductor;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod input;
pub mod score;
pub mod timeline;

pub use analysis::{generate_beatmap, read_wav_mono, DecodedAudio, OnsetDetector};
pub use beatmap::{Beatmap, Note, ZONE_COUNT};
pub use conductor::{ConductorEvent, RhythmConductor, TIMING_WINDOW_MS};
pub use config::{AppConfig, AudioConfig, GeneratorConfig, InputConfig};
pub use error::{FilletError, Result};
pub use events::{Listeners, SubscriptionId};
pub use game::{Game, GameEvent, PressOutcome};
pub use input::{InputClassifier, InputEvent, InputSource, KeyMap, KeyPress, ScriptedInput};
pub use score::{GameState, ScoreEvent, Scoreboard, SessionSummary};
pub use timeline::{ManualClock, PlaybackClock, WallClock};
