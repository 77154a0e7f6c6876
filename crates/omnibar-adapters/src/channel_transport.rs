//! Transport wrapping an already-open channel of parsed provider messages.
//!
//! This is the boundary a push adapter owns: whatever talks to the actual
//! third-party service (chat IRC, EventSub, webhooks, ...) is external to
//! this crate and feeds parsed messages into the sender half; everything
//! downstream of that — reconnect bookkeeping, translation, duplicate
//! suppression, publishing on the bus — is this crate's job.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AdapterResult;
use crate::push::PushTransport;

/// A [`PushTransport`] over an `mpsc` channel of already-parsed messages.
///
/// "Connecting" is a no-op: the channel is assumed open for the adapter's
/// lifetime, and the channel closing is reported as a clean `recv` end
/// (`Ok(None)`) rather than a connection loss, since there is no separate
/// handshake to repeat.
pub struct ChannelTransport<M> {
    receiver: mpsc::Receiver<M>,
}

impl<M> ChannelTransport<M> {
    /// Wrap the receiving half of a channel whose sender is owned by
    /// whatever talks to the upstream provider.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<M>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl<M: Send> PushTransport for ChannelTransport<M> {
    type Message = M;

    async fn connect(&mut self) -> AdapterResult<()> {
        Ok(())
    }

    async fn recv(&mut self) -> AdapterResult<Option<Self::Message>> {
        Ok(self.receiver.recv().await)
    }

    async fn disconnect(&mut self) {
        self.receiver.close();
    }
}
