//! Audio transcription ingest: a fixed 28-byte binary header followed by
//! two declared-length UTF-8 strings, then raw PCM.
//!
//! Speech-to-text itself is an external collaborator — only the event
//! contract (a transcribed [`Event::TranscriptionFrame`]) is this crate's
//! concern, so the actual transcription is delegated to a pluggable
//! [`TranscriptionBackend`].

use async_trait::async_trait;
use bytes::Bytes;
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};

/// Size of the fixed binary header in bytes.
pub const HEADER_LEN: usize = 28;
/// Frames declaring a sample rate above this are dropped.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Frames declaring more channels than this are dropped.
pub const MAX_CHANNELS: u32 = 8;
/// Frames declaring a bit depth above this are dropped.
pub const MAX_BIT_DEPTH: u32 = 32;

/// Header fields preceding a transcription frame's raw PCM payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    /// Capture timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u32,
    /// Bits per sample.
    pub bit_depth: u32,
    /// Identifier for the audio source.
    pub source_id: String,
    /// Human-readable name of the audio source.
    pub source_name: String,
}

/// One decoded binary transcription frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Frame header.
    pub header: FrameHeader,
    /// Raw PCM payload.
    pub pcm: Bytes,
}

/// Parse one binary transcription frame.
///
/// Returns `Ok(None)` when the header is well-formed but declares an
/// out-of-range sample rate, channel count, or bit depth — such frames
/// are dropped, not treated as an error. Returns
/// `Err` only when the frame is too short to contain its declared fields.
///
/// # Errors
///
/// Returns [`AdapterError::InvalidFrame`] if the frame is shorter than the
/// fixed header, shorter than its declared string lengths, or its id/name
/// fields are not valid UTF-8.
///
/// # Panics
///
/// Never panics: the length check above guarantees every fixed-width
/// header slice has the exact size its conversion expects.
pub fn parse_frame(bytes: &[u8]) -> AdapterResult<Option<AudioFrame>> {
    if bytes.len() < HEADER_LEN {
        return Err(AdapterError::InvalidFrame { detail: "frame shorter than the fixed header".into() });
    }

    let timestamp_ns = u64::from_le_bytes(bytes[0..8].try_into().expect("8-byte slice"));
    let sample_rate = u32::from_le_bytes(bytes[8..12].try_into().expect("4-byte slice"));
    let channels = u32::from_le_bytes(bytes[12..16].try_into().expect("4-byte slice"));
    let bit_depth = u32::from_le_bytes(bytes[16..20].try_into().expect("4-byte slice"));
    let source_id_len = u32::from_le_bytes(bytes[20..24].try_into().expect("4-byte slice")) as usize;
    let source_name_len = u32::from_le_bytes(bytes[24..28].try_into().expect("4-byte slice")) as usize;

    if sample_rate > MAX_SAMPLE_RATE || channels > MAX_CHANNELS || bit_depth > MAX_BIT_DEPTH {
        debug!(sample_rate, channels, bit_depth, "dropping transcription frame with an out-of-range header");
        return Ok(None);
    }

    let strings_end = HEADER_LEN
        .checked_add(source_id_len)
        .and_then(|sum| sum.checked_add(source_name_len))
        .ok_or_else(|| AdapterError::InvalidFrame { detail: "declared string lengths overflow".into() })?;
    if bytes.len() < strings_end {
        return Err(AdapterError::InvalidFrame { detail: "frame truncated before its declared strings".into() });
    }

    let source_id = String::from_utf8(bytes[HEADER_LEN..HEADER_LEN + source_id_len].to_vec())
        .map_err(|_| AdapterError::InvalidFrame { detail: "source id is not valid utf-8".into() })?;
    let source_name = String::from_utf8(bytes[HEADER_LEN + source_id_len..strings_end].to_vec())
        .map_err(|_| AdapterError::InvalidFrame { detail: "source name is not valid utf-8".into() })?;
    let pcm = Bytes::copy_from_slice(&bytes[strings_end..]);

    Ok(Some(AudioFrame {
        header: FrameHeader { timestamp_ns, sample_rate, channels, bit_depth, source_id, source_name },
        pcm,
    }))
}

/// Text produced by transcribing one [`AudioFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribedText {
    /// Transcribed text for this frame.
    pub text: String,
    /// Whether the backend considers this frame final.
    pub is_final: bool,
}

/// Pluggable speech-to-text backend. The production implementation talks
/// to whatever external transcription service is configured; this crate
/// only needs the boundary.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe one audio frame, returning `None` if the backend has
    /// nothing to report yet (e.g. it buffers frames internally).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not process the frame.
    async fn transcribe(&self, frame: &AudioFrame) -> AdapterResult<Option<TranscribedText>>;
}

/// Glues the binary frame decoder to a [`TranscriptionBackend`] and
/// publishes results on the event bus.
pub struct TranscriptionAdapter<B> {
    backend: B,
    bus: EventBus,
    metrics: Metrics,
}

impl<B: TranscriptionBackend> TranscriptionAdapter<B> {
    /// Construct an adapter over the given backend.
    #[must_use]
    pub fn new(backend: B, bus: EventBus, metrics: Metrics) -> Self {
        Self { backend, bus, metrics }
    }

    /// Decode, transcribe, and publish one raw binary WebSocket frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed or the backend fails;
    /// callers should log and continue rather than close the connection.
    pub async fn ingest(&self, raw: &[u8]) -> AdapterResult<()> {
        let Some(frame) = parse_frame(raw)? else {
            return Ok(());
        };
        let Some(text) = self.backend.transcribe(&frame).await? else {
            return Ok(());
        };
        let event = Event::TranscriptionFrame { text: text.text, is_final: text.is_final };
        self.metrics.inc_event(event.type_tag());
        self.bus.emit(event).map_err(|err| AdapterError::ConnectionLost { detail: err.to_string() })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(source_id: &str, source_name: &str, sample_rate: u32, channels: u32, bit_depth: u32, pcm: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&42u64.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&bit_depth.to_le_bytes());
        bytes.extend_from_slice(&(source_id.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(source_name.len() as u32).to_le_bytes());
        bytes.extend_from_slice(source_id.as_bytes());
        bytes.extend_from_slice(source_name.as_bytes());
        bytes.extend_from_slice(pcm);
        bytes
    }

    #[test]
    fn decodes_a_well_formed_frame() {
        let wire = build_frame("mic-1", "Desk Mic", 48_000, 2, 16, &[1, 2, 3, 4]);
        let frame = parse_frame(&wire).expect("parse ok").expect("not dropped");
        assert_eq!(frame.header.source_id, "mic-1");
        assert_eq!(frame.header.source_name, "Desk Mic");
        assert_eq!(frame.pcm.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn drops_frames_with_an_out_of_range_sample_rate() {
        let wire = build_frame("mic-1", "Desk Mic", 200_000, 2, 16, &[]);
        assert!(parse_frame(&wire).expect("parse ok").is_none());
    }

    #[test]
    fn drops_frames_with_too_many_channels() {
        let wire = build_frame("mic-1", "Desk Mic", 48_000, 9, 16, &[]);
        assert!(parse_frame(&wire).expect("parse ok").is_none());
    }

    #[test]
    fn errors_on_a_frame_shorter_than_the_header() {
        let err = parse_frame(&[0u8; 10]).expect_err("too short");
        assert!(matches!(err, AdapterError::InvalidFrame { .. }));
    }

    #[test]
    fn errors_when_declared_strings_exceed_the_frame() {
        let mut wire = build_frame("mic-1", "Desk Mic", 48_000, 2, 16, &[]);
        wire.truncate(HEADER_LEN + 2);
        let err = parse_frame(&wire).expect_err("truncated");
        assert!(matches!(err, AdapterError::InvalidFrame { .. }));
    }

    struct EchoBackend;

    #[async_trait]
    impl TranscriptionBackend for EchoBackend {
        async fn transcribe(&self, _frame: &AudioFrame) -> AdapterResult<Option<TranscribedText>> {
            Ok(Some(TranscribedText { text: "hello".into(), is_final: true }))
        }
    }

    #[tokio::test]
    async fn ingest_publishes_the_backend_transcript() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe(None);
        let metrics = Metrics::new().expect("metrics");
        let adapter = TranscriptionAdapter::new(EchoBackend, bus, metrics);

        let wire = build_frame("mic-1", "Desk Mic", 48_000, 2, 16, &[0, 0]);
        adapter.ingest(&wire).await.expect("ingest ok");

        use tokio_stream::StreamExt;
        let received = subscriber.next().await.expect("envelope").expect("ok");
        assert!(matches!(received.event, Event::TranscriptionFrame { .. }));
    }
}
