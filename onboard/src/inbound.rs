use crate::session::LinkStatus;
use bytes::{Buf, BytesMut};
use mavlink_codec::{Frame, MavlinkCodec};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch},
};
use tokio_util::{codec::Decoder, sync::CancellationToken};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_507;

/// Bounds on bytes waiting in the inbound buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BufferPolicy {
    Unbounded,
    /// Warn past `high`, drop the oldest `high` bytes past `limit`.
    Watermark { high: usize, limit: usize },
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self::Watermark {
            high: 50 * 1024,
            limit: 100 * 1024,
        }
    }
}

/// Accumulates datagrams and cuts them into frames.
///
/// A frame split over several datagrams stays buffered until it is
/// complete. A parse error discards whatever is left of the buffer.
#[derive(Debug)]
pub struct InboundBuffer {
    buffer: BytesMut,
    codec: MavlinkCodec,
    policy: BufferPolicy,
}

impl InboundBuffer {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            buffer: BytesMut::new(),
            codec: MavlinkCodec,
            policy,
        }
    }

    pub fn push(&mut self, datagram: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(datagram);
        self.enforce_policy();

        let mut frames = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "MAVLink parser error: {e}, discarding {} buffered bytes",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    break;
                }
            }
        }
        frames
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    fn enforce_policy(&mut self) {
        let BufferPolicy::Watermark { high, limit } = self.policy else {
            return;
        };
        let len = self.buffer.len();
        if len > limit {
            tracing::warn!("Buffer limit reached, dropping {high} oldest bytes of {len}");
            self.buffer.advance(high.min(len));
        } else if len > high {
            tracing::warn!("Buffer watermark hit, buffer size: {len}");
        }
    }
}

/// Receiving side of a session: learns the peer, decodes and enqueues.
pub struct Inbound {
    buffer: InboundBuffer,
    peer: watch::Sender<Option<SocketAddr>>,
    link: watch::Sender<LinkStatus>,
    queue: mpsc::UnboundedSender<Frame>,
}

impl Inbound {
    pub fn new(
        buffer: InboundBuffer,
        peer: watch::Sender<Option<SocketAddr>>,
        link: watch::Sender<LinkStatus>,
        queue: mpsc::UnboundedSender<Frame>,
    ) -> Self {
        Self {
            buffer,
            peer,
            link,
            queue,
        }
    }

    pub fn on_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
        self.peer.send_if_modified(|peer| {
            if *peer == Some(from) {
                return false;
            }
            tracing::info!("New remote address: {from}");
            *peer = Some(from);
            true
        });

        for frame in self.buffer.push(datagram) {
            self.link.send_if_modified(|status| {
                let changed = *status != LinkStatus::DataReceived;
                *status = LinkStatus::DataReceived;
                changed
            });
            if self.queue.send(frame).is_err() {
                tracing::debug!("Message queue closed, dropping frame");
            }
        }
    }

    pub async fn run(mut self, socket: Arc<UdpSocket>, token: CancellationToken) {
        tracing::info!("Start receive task");
        let mut datagram = vec![0u8; MAX_DATAGRAM];
        loop {
            let received = tokio::select! {
                biased;
                () = token.cancelled() => break,
                received = socket.recv_from(&mut datagram) => received,
            };
            match received {
                Ok((len, from)) => {
                    tracing::trace!("Received {len} bytes from {from}");
                    self.on_datagram(&datagram[..len], from);
                }
                Err(e) => tracing::error!("Error receiving datagram: {e}"),
            }
        }
        tracing::info!("Exit from receive task");
    }
}
