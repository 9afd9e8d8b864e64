use crate::session::Identity;
use anyhow::anyhow;
use bytes::{Bytes, BytesMut};
use mavlink_codec::{Frame, MavlinkCodec, Message};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};
use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch},
};
use tokio_util::{codec::Encoder, sync::CancellationToken};

/// Sending side of a session, shared by the heartbeat and the dispatcher.
///
/// Clones share one sequence counter, so frames from both senders carry
/// consecutive sequence numbers.
#[derive(Clone, Debug)]
pub struct Outbound {
    identity: Identity,
    sequence: Arc<AtomicU8>,
    peer: watch::Receiver<Option<SocketAddr>>,
    datagrams: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
}

impl Outbound {
    pub fn new(
        identity: Identity,
        peer: watch::Receiver<Option<SocketAddr>>,
        datagrams: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    ) -> Self {
        Self {
            identity,
            sequence: Arc::new(AtomicU8::new(0)),
            peer,
            datagrams,
        }
    }

    /// Encodes `message` and queues it for the last known peer.
    ///
    /// Returns `Ok(false)` and drops the message while no peer is known.
    pub fn send(&self, message: Message) -> anyhow::Result<bool> {
        let peer = *self.peer.borrow();
        let Some(peer) = peer else {
            tracing::trace!("No peer yet, dropping message {}", message.id());
            return Ok(false);
        };

        let frame = Frame {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            system_id: self.identity.system_id,
            component_id: self.identity.component_id,
            message,
        };
        let mut buffer = BytesMut::new();
        MavlinkCodec.encode(frame, &mut buffer)?;
        self.datagrams
            .send((buffer.freeze(), peer))
            .map_err(|_| anyhow!("Outbound channel closed"))?;
        Ok(true)
    }
}

pub async fn write(
    socket: Arc<UdpSocket>,
    mut datagrams: mpsc::UnboundedReceiver<(Bytes, SocketAddr)>,
    token: CancellationToken,
) {
    tracing::info!("Start send task");
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            Some((datagram, peer)) = datagrams.recv() => {
                if let Err(e) = socket.send_to(&datagram, peer).await {
                    tracing::error!("Failed to send {} bytes to {peer}: {e}", datagram.len());
                }
            }
            else => break,
        }
    }
    tracing::info!("Exit from send task");
}
