//! TCP channel: length-prefixed JSON envelopes over a reconnecting socket.
//!
//! The pump runs as a tokio task and forwards [`ChannelEvent`]s over an
//! unbounded channel to whoever owns the [`Session`](crate::session::Session).
//! Each event is tagged with the epoch of the `open` that spawned its task, so
//! frames still queued from an aborted task can be told apart from the new
//! connection's. Dropping the receiver stops the pump at its next send.

use std::time::Duration;

use arena_proto::{decode_frame_body, encode_frame, frame_len, FrameError, RawEnvelope};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::session::{Channel, Credential};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Dialing { attempt: u64 },
    Envelope(RawEnvelope),
    Closed { reason: String },
}

/// A [`TransportEvent`] tagged with the connection epoch it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub epoch: u64,
    pub event: TransportEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub max_frame_len: usize,
}

pub async fn read_envelope<R>(reader: &mut R, max_len: usize) -> Result<RawEnvelope, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = frame_len(len_buf, max_len)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    decode_frame_body(&payload)
}

pub async fn write_envelope<W>(writer: &mut W, envelope: &RawEnvelope) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(envelope)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Forwards envelopes until the stream fails or the receiver is dropped.
///
/// Returns `Ok(())` only when the receiver is gone.
pub async fn pump_envelopes<R>(
    reader: &mut R,
    sender: &UnboundedSender<ChannelEvent>,
    epoch: u64,
    max_len: usize,
) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let envelope = read_envelope(reader, max_len).await?;
        trace!(target: "arena_mirror::transport", event = %envelope.event, "frame.received");
        let event = ChannelEvent {
            epoch,
            event: TransportEvent::Envelope(envelope),
        };
        if sender.send(event).is_err() {
            return Ok(());
        }
    }
}

/// Dials `settings.endpoint` forever, authenticating each connection with
/// `credential` and waiting `reconnect_delay` between attempts.
pub async fn run_transport(
    settings: TransportSettings,
    credential: Credential,
    epoch: u64,
    sender: UnboundedSender<ChannelEvent>,
) {
    let emit = |event: TransportEvent| sender.send(ChannelEvent { epoch, event }).is_ok();
    let mut attempt = 0u64;
    loop {
        attempt += 1;
        if !emit(TransportEvent::Dialing { attempt }) {
            break;
        }
        let reason = match TcpStream::connect(&settings.endpoint).await {
            Ok(mut stream) => {
                info!(
                    target: "arena_mirror::transport",
                    endpoint = %settings.endpoint,
                    epoch,
                    attempt,
                    "transport.connected"
                );
                if let Err(err) = stream.set_nodelay(true) {
                    warn!(target: "arena_mirror::transport", error = %err, "transport.nodelay_failed");
                }
                let session = async {
                    write_envelope(&mut stream, &RawEnvelope::auth(credential.as_str())).await?;
                    pump_envelopes(&mut stream, &sender, epoch, settings.max_frame_len).await
                };
                match session.await {
                    Ok(()) => break,
                    Err(err) => {
                        warn!(target: "arena_mirror::transport", error = %err, "transport.connection_lost");
                        err.to_string()
                    }
                }
            }
            Err(err) => {
                warn!(
                    target: "arena_mirror::transport",
                    endpoint = %settings.endpoint,
                    error = %err,
                    "transport.connect_failed"
                );
                err.to_string()
            }
        };
        if !emit(TransportEvent::Closed { reason }) {
            break;
        }
        tokio::time::sleep(settings.reconnect_delay).await;
    }
    trace!(target: "arena_mirror::transport", "transport.stopped");
}

/// [`Channel`] backed by [`run_transport`] on a tokio runtime.
pub struct TcpChannel {
    runtime: Handle,
    settings: TransportSettings,
    sender: UnboundedSender<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

impl TcpChannel {
    pub fn new(
        runtime: Handle,
        settings: TransportSettings,
    ) -> (Self, UnboundedReceiver<ChannelEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                runtime,
                settings,
                sender,
                task: None,
            },
            receiver,
        )
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Channel for TcpChannel {
    fn open(&mut self, epoch: u64, credential: &Credential) {
        self.close();
        let pump = run_transport(
            self.settings.clone(),
            credential.clone(),
            epoch,
            self.sender.clone(),
        );
        self.task = Some(self.runtime.spawn(pump));
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_proto::event;

    #[tokio::test]
    async fn envelopes_survive_the_frame_codec() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_envelope(&mut client, &RawEnvelope::snapshot(&[1, 2, 3]))
            .await
            .expect("write");
        let envelope = read_envelope(&mut server, 1024).await.expect("read");
        assert_eq!(envelope.event, event::SNAPSHOT);
        assert_eq!(envelope.data, serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_envelope(&mut client, &RawEnvelope::snapshot(&[0; 64]))
            .await
            .expect("write");
        let err = read_envelope(&mut server, 16).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { max: 16, .. }));
    }

    #[tokio::test]
    async fn pump_reports_stream_end_as_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let (sender, mut receiver) = unbounded_channel();
        write_envelope(&mut client, &RawEnvelope::connect())
            .await
            .expect("write");
        drop(client);

        let result = pump_envelopes(&mut server, &sender, 7, 1024).await;
        assert!(matches!(result, Err(FrameError::Io(_))));
        assert_eq!(
            receiver.recv().await,
            Some(ChannelEvent {
                epoch: 7,
                event: TransportEvent::Envelope(RawEnvelope::connect()),
            })
        );
    }
}
