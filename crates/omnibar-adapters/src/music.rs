//! Music adapter: polls a now-playing source and de-duplicates by track
//! identity plus start time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::AdapterResult;

/// Minimum poll interval, matching the source's own floor.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// One now-playing reading from a music source.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    /// Stable track identifier used for de-duplication.
    pub track_id: String,
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// Timestamp the track started playing.
    pub start_time: DateTime<Utc>,
}

/// A pollable now-playing source (e.g. a streaming service's "currently
/// playing" endpoint). The concrete provider is external to this crate;
/// only this boundary matters here.
#[async_trait]
pub trait MusicSource: Send {
    /// Fetch the currently playing track, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the source could not be reached.
    async fn poll(&mut self) -> AdapterResult<Option<NowPlaying>>;
}

/// Remembers the last track identity seen, so repeated polls of an
/// unchanged "now playing" reading are suppressed.
#[derive(Debug, Default)]
struct MusicDeduper {
    last_seen: Option<(String, DateTime<Utc>)>,
}

impl MusicDeduper {
    fn accept(&mut self, track: &NowPlaying) -> bool {
        let key = (track.track_id.clone(), track.start_time);
        if self.last_seen.as_ref() == Some(&key) {
            return false;
        }
        self.last_seen = Some(key);
        true
    }
}

/// Handle to a running music poll loop.
pub struct MusicAdapterHandle {
    cancel: CancellationToken,
}

impl MusicAdapterHandle {
    /// Stop the poll loop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Poll `source` at `interval` (clamped to [`MIN_POLL_INTERVAL`]), emitting
/// `music.now_playing` events for tracks not already seen.
pub fn spawn_music_adapter<S>(source: S, interval: Duration, bus: EventBus, metrics: Metrics) -> MusicAdapterHandle
where
    S: MusicSource + 'static,
{
    spawn_music_loop(source, interval.max(MIN_POLL_INTERVAL), bus, metrics)
}

/// Like [`spawn_music_adapter`] but without enforcing [`MIN_POLL_INTERVAL`],
/// so tests can drive the loop on a fast, deterministic cadence.
fn spawn_music_loop<S>(mut source: S, interval: Duration, bus: EventBus, metrics: Metrics) -> MusicAdapterHandle
where
    S: MusicSource + 'static,
{
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut deduper = MusicDeduper::default();

        loop {
            tokio::select! {
                () = task_cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match source.poll().await {
                Ok(Some(track)) => {
                    if !deduper.accept(&track) {
                        continue;
                    }
                    let event = Event::MusicNowPlaying {
                        track_id: track.track_id,
                        title: track.title,
                        artist: track.artist,
                        start_time: track.start_time,
                    };
                    metrics.inc_event(event.type_tag());
                    if let Err(err) = bus.emit(event) {
                        warn!(error = %err, "failed to publish now-playing event");
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "music source poll failed"),
            }
        }
    });

    MusicAdapterHandle { cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    struct FixedSource {
        track: NowPlaying,
    }

    #[async_trait]
    impl MusicSource for FixedSource {
        async fn poll(&mut self) -> AdapterResult<Option<NowPlaying>> {
            Ok(Some(self.track.clone()))
        }
    }

    fn sample_track() -> NowPlaying {
        NowPlaying { track_id: "t1".into(), title: "Song".into(), artist: "Artist".into(), start_time: Utc::now() }
    }

    #[test]
    fn deduper_accepts_a_new_track_once() {
        let mut deduper = MusicDeduper::default();
        let track = sample_track();
        assert!(deduper.accept(&track));
        assert!(!deduper.accept(&track));
    }

    #[test]
    fn deduper_accepts_a_restart_of_the_same_track_as_new() {
        let mut deduper = MusicDeduper::default();
        let track = sample_track();
        assert!(deduper.accept(&track));

        let mut replayed = track.clone();
        replayed.start_time = track.start_time + chrono::Duration::seconds(1);
        assert!(deduper.accept(&replayed));
    }

    #[tokio::test]
    async fn repeated_polls_of_the_same_track_emit_once() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(None);
        let metrics = Metrics::new().expect("metrics");

        let source = FixedSource { track: sample_track() };
        let handle = spawn_music_loop(source, Duration::from_millis(5), bus, metrics);

        let first = subscriber.next().await.expect("envelope").expect("ok");
        assert!(matches!(first.event, Event::MusicNowPlaying { .. }));

        handle.cancel();
    }

    #[test]
    fn public_entry_point_enforces_the_minimum_interval() {
        assert_eq!(Duration::from_secs(1).max(MIN_POLL_INTERVAL), MIN_POLL_INTERVAL);
        assert_eq!(Duration::from_secs(60).max(MIN_POLL_INTERVAL), Duration::from_secs(60));
    }
}
