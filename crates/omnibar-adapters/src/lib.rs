#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Source Adapters: normalize chat/subs/follows/redemptions, IronMON-style
//! game telemetry, music now-playing, and audio transcription into the
//! canonical event envelopes the rest of the platform consumes.

mod backoff;
mod channel_transport;
mod dedupe;
mod error;
mod game_telemetry;
mod music;
mod push;
mod transcription;
mod twitch;

pub use backoff::{ReconnectBackoff, BASE_DELAY, LONG_PAUSE, MAX_ATTEMPTS_BEFORE_PAUSE, MAX_DELAY};
pub use channel_transport::ChannelTransport;
pub use dedupe::DuplicateFilter;
pub use error::{AdapterError, AdapterResult};
pub use game_telemetry::{spawn_game_telemetry, FrameDecoder, GameFrame, GameTelemetryHandle};
pub use music::{spawn_music_adapter, MusicAdapterHandle, MusicSource, NowPlaying, MIN_POLL_INTERVAL};
pub use push::{spawn_push_adapter, AdapterHandle, ConnectionState, PushTransport, Translator, DEFAULT_DEDUPE_CAPACITY};
pub use transcription::{
    parse_frame, AudioFrame, FrameHeader, TranscribedText, TranscriptionAdapter, TranscriptionBackend, HEADER_LEN,
    MAX_BIT_DEPTH, MAX_CHANNELS, MAX_SAMPLE_RATE,
};
pub use twitch::{ChatTranslator, TwitchMessage};
