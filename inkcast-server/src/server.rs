//! Display server core logic.
//!
//! Accepts TCP connections from display clients and wires each one
//! into the sink registry: a writer task drains the sink's outbound
//! channel into the socket, and a reader task routes inbound traffic —
//! readiness lines to the streamer's gate, acknowledgements to the
//! log, everything else ignored.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use inkcast_core::{
    CastError, FrameStreamer, Inbound, Packet, PacketBody, PacketSink, ReadyGate, SinkId,
    SinkRegistry, StreamerConfig, WireCodec,
};

use crate::config::ServerConfig;
use crate::pattern;

/// Outbound queue depth per connection. A full queue applies
/// backpressure to the streamer rather than buffering frames for a
/// client that has stopped reading.
const SINK_QUEUE_DEPTH: usize = 16;

// ── ConnectionSink ───────────────────────────────────────────────

/// Registry handle over one client connection's outbound channel.
struct ConnectionSink {
    id: SinkId,
    tx: mpsc::Sender<Packet>,
}

#[async_trait]
impl PacketSink for ConnectionSink {
    fn id(&self) -> SinkId {
        self.id
    }

    async fn send(&self, packet: Packet) -> Result<(), CastError> {
        self.tx.send(packet).await?;
        Ok(())
    }
}

// ── DisplayServer ────────────────────────────────────────────────

/// The top-level display server.
///
/// Owns the sink registry and the frame streamer. Callers drive
/// updates through [`streamer`](Self::streamer); the accept loop only
/// manages connection lifecycle.
pub struct DisplayServer {
    config: ServerConfig,
    registry: Arc<SinkRegistry>,
    streamer: Arc<Mutex<FrameStreamer>>,
    gate: Arc<ReadyGate>,
    running: Arc<AtomicBool>,
}

impl DisplayServer {
    /// Create a server from a validated configuration.
    pub fn new(config: ServerConfig) -> Result<Self, CastError> {
        let geometry = config.geometry()?;
        let registry = Arc::new(SinkRegistry::new());

        let streamer_config =
            StreamerConfig::new(geometry).with_ready_timeout(config.ready_timeout());
        let streamer = FrameStreamer::new(Arc::clone(&registry), streamer_config);
        let gate = streamer.ready_gate();

        Ok(Self {
            config,
            registry,
            streamer: Arc::new(Mutex::new(streamer)),
            gate,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The registry of connected clients.
    pub fn registry(&self) -> Arc<SinkRegistry> {
        Arc::clone(&self.registry)
    }

    /// Shared handle to the streamer, for whoever produces frames.
    pub fn streamer(&self) -> Arc<Mutex<FrameStreamer>> {
        Arc::clone(&self.streamer)
    }

    /// A handle that stops the accept loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the accept loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, CastError> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        Ok(listener)
    }

    /// Bind and serve until stopped.
    pub async fn run(&self) -> Result<(), CastError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve an already-bound listener until stopped.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), CastError> {
        self.running.store(true, Ordering::SeqCst);
        info!(addr = %listener.local_addr()?, "display server listening");

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            match accept {
                Ok((stream, peer)) => self.attach(stream, peer),
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            }
        }

        info!("display server stopping");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Wire one accepted connection into the registry.
    fn attach(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, "set_nodelay failed: {e}");
        }

        let framed = Framed::new(stream, WireCodec::default());
        let (mut writer, mut reader) = framed.split();

        let (tx, mut rx) = mpsc::channel::<Packet>(SINK_QUEUE_DEPTH);
        let id = self.registry.allocate_id();
        info!(sink = id, %peer, "client connected");

        // Writer: sink channel → socket.
        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                if let Err(e) = writer.send(packet).await {
                    warn!(sink = id, "write error: {e}");
                    break;
                }
            }
        });

        // Reader: socket → gate / observability. Unregisters the sink
        // when the client goes away.
        let registry = Arc::clone(&self.registry);
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move {
            loop {
                match reader.next().await {
                    Some(Ok(item)) => route_inbound(id, item, &gate),
                    Some(Err(e)) => {
                        warn!(sink = id, "read error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            registry.unregister(id);
        });

        self.registry.register(Arc::new(ConnectionSink { id, tx }));

        if self.config.stream.pattern_on_connect {
            let streamer = Arc::clone(&self.streamer);
            tokio::spawn(async move {
                let mut streamer = streamer.lock().await;
                let frame = pattern::checkerboard(streamer.geometry(), 8);
                if let Err(e) = streamer.send_tiled_update(&frame).await {
                    warn!("pattern broadcast failed: {e}");
                }
            });
        }
    }

    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Route one inbound item from a client.
///
/// Acknowledgements are observational only — they are logged keyed by
/// sequence ID and never gate the state machine. The readiness line
/// is the sole trigger for the gate.
fn route_inbound(sink: SinkId, item: Inbound, gate: &ReadyGate) {
    match item {
        item if item.is_ready_signal() => {
            debug!(sink, "client ready");
            gate.signal();
        }
        Inbound::Text(line) => {
            debug!(sink, line = %line, "ignoring text message");
        }
        Inbound::Packet(packet) => match packet.body() {
            Ok(PacketBody::Ack { status }) => {
                debug!(sink, seq = packet.seq_id(), status, "ack received");
            }
            Ok(PacketBody::Nak { status }) => {
                warn!(sink, seq = packet.seq_id(), status, "nak received");
            }
            Ok(_) => {
                debug!(sink, seq = packet.seq_id(), "ignoring unexpected packet");
            }
            Err(e) => {
                warn!(sink, "undecodable packet: {e}");
            }
        },
    }
}
