use crate::{
    camera::Camera,
    dispatcher::{self, DispatchSettings, Dispatcher},
    heartbeat,
    inbound::{BufferPolicy, Inbound, InboundBuffer},
    outbound::{self, Outbound},
    telemetry::Telemetry,
};
use anyhow::Context;
use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::UdpSocket,
    runtime::Handle,
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// MAVLink address of this service.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub system_id: u8,
    pub component_id: u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LinkStatus {
    #[default]
    WaitingForData,
    DataReceived,
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub buffer: BufferPolicy,
    pub dispatch: DispatchSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            buffer: BufferPolicy::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

/// One MAVLink conversation with the ground station over UDP.
///
/// The ground station address is learned from the first datagram received;
/// nothing is sent before that.
pub struct Session<C> {
    identity: Identity,
    endpoint: SocketAddr,
    settings: SessionSettings,
    camera: Arc<Mutex<C>>,
    runtime: Handle,
    state: RunState,
    token: CancellationToken,
    failed: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    link: watch::Receiver<LinkStatus>,
    peer: watch::Receiver<Option<SocketAddr>>,
    local_addr: Option<SocketAddr>,
}

impl<C: Camera + 'static> Session<C> {
    pub fn new(
        identity: Identity,
        endpoint: SocketAddr,
        settings: SessionSettings,
        camera: Arc<Mutex<C>>,
        runtime: Handle,
    ) -> Self {
        let (_, link) = watch::channel(LinkStatus::WaitingForData);
        let (_, peer) = watch::channel(None);
        Self {
            identity,
            endpoint,
            settings,
            camera,
            runtime,
            state: RunState::Stopped,
            token: CancellationToken::new(),
            failed: CancellationToken::new(),
            tasks: Vec::new(),
            link,
            peer,
            local_addr: None,
        }
    }

    /// Binds the endpoint and launches the background tasks.
    ///
    /// Returns the bound address. Calling this on a running session launches
    /// a second set of tasks.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        tracing::info!("Starting {self}, udp endpoint: {}", self.endpoint);
        let socket = UdpSocket::bind(self.endpoint)
            .await
            .with_context(|| format!("Failed to bind {}", self.endpoint))?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let (peer_tx, peer_rx) = watch::channel(None);
        let (link_tx, link_rx) = watch::channel(LinkStatus::WaitingForData);
        let (datagram_tx, datagram_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let outbound = Outbound::new(self.identity, peer_rx.clone(), datagram_tx);

        let dispatcher = Dispatcher::new(
            outbound.clone(),
            self.camera.clone(),
            Telemetry::new(Instant::now()),
            self.settings.dispatch.clone(),
        );
        self.failed = CancellationToken::new();
        self.spawn(dispatcher::consume(
            dispatcher,
            queue_rx,
            self.token.clone(),
            self.failed.clone(),
        ));
        self.spawn(heartbeat::heartbeat(
            self.settings.heartbeat_interval,
            outbound,
            self.token.clone(),
        ));
        self.spawn(outbound::write(
            socket.clone(),
            datagram_rx,
            self.token.clone(),
        ));
        let inbound = Inbound::new(
            InboundBuffer::new(self.settings.buffer),
            peer_tx,
            link_tx,
            queue_tx,
        );
        self.spawn(inbound.run(socket, self.token.clone()));

        self.link = link_rx;
        self.peer = peer_rx;
        self.local_addr = Some(local_addr);
        self.state = RunState::Running;
        tracing::info!("Started {self} on {local_addr}");
        Ok(local_addr)
    }

    /// Signals every task to finish and waits until they have.
    ///
    /// The socket is closed once the last task holding it is gone.
    pub async fn stop(&mut self) {
        tracing::info!("Stopping {self}");
        self.state = RunState::Stopping;
        self.token.cancel();
        for result in futures::future::join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                tracing::error!("Session task failed: {e}");
            }
        }
        self.token = CancellationToken::new();
        self.local_addr = None;
        self.state = RunState::Stopped;
        tracing::info!("Stopped {self}");
    }

    /// Resolves once the camera is gone for good. The session keeps
    /// answering heartbeats but no longer acts on triggers.
    pub async fn failed(&self) {
        self.failed.cancelled().await;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn link_status(&self) -> LinkStatus {
        *self.link.borrow()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        *self.peer.borrow()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(self.runtime.spawn(task));
    }
}

impl<C> fmt::Display for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session({},{})",
            self.identity.system_id, self.identity.component_id
        )
    }
}
