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

//! In-process pub/sub event bus for the stream orchestrator.
//!
//! Source adapters normalize external activity into a canonical typed
//! event, wrap it in an envelope carrying a sequential id and an optional
//! correlation id, and publish it on a shared bus. Internally it uses
//! `tokio::broadcast` with a bounded buffer; subscribers filter by topic
//! pattern, and a subscriber that falls behind drops the oldest envelopes
//! it missed rather than stalling the publisher.

mod error;
mod payloads;
mod routing;
mod topics;

pub use error::{EventBusError, EventBusResult};
pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream, TopicStream};
pub use topics::Topic;
