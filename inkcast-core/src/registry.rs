//! The set of connected display sinks.
//!
//! Connection lifecycle events mutate the registry concurrently with
//! broadcasts, so the registry never exposes its live collection:
//! senders iterate a point-in-time [`snapshot`](SinkRegistry::snapshot)
//! instead. A sink that connects or disconnects mid-broadcast is
//! picked up on the next tile, never half-way through one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::error::CastError;
use crate::protocol::Packet;

/// Opaque identifier for one connected sink.
pub type SinkId = u64;

// ── PacketSink ───────────────────────────────────────────────────

/// One endpoint capable of receiving protocol packets.
///
/// Implementations are handles over a connection's outbound channel;
/// `send` resolving does not imply the client has rendered anything,
/// only that the packet was accepted for transmission.
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Registry identity of this sink.
    fn id(&self) -> SinkId;

    /// Queue one packet for transmission.
    async fn send(&self, packet: Packet) -> Result<(), CastError>;
}

// ── SinkRegistry ─────────────────────────────────────────────────

/// Registry of currently connected sinks.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: Mutex<HashMap<SinkId, Arc<dyn PacketSink>>>,
    next_id: AtomicU64,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh sink identifier.
    pub fn allocate_id(&self) -> SinkId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a sink. Called from the connection-accept path.
    pub fn register(&self, sink: Arc<dyn PacketSink>) {
        let id = sink.id();
        let count = {
            let mut sinks = self.sinks.lock().expect("sink registry poisoned");
            sinks.insert(id, sink);
            sinks.len()
        };
        info!(sink = id, connected = count, "sink registered");
    }

    /// Remove a sink. Called when its connection closes. Returns
    /// whether the sink was present.
    pub fn unregister(&self, id: SinkId) -> bool {
        let (removed, count) = {
            let mut sinks = self.sinks.lock().expect("sink registry poisoned");
            let removed = sinks.remove(&id).is_some();
            (removed, sinks.len())
        };
        if removed {
            info!(sink = id, connected = count, "sink unregistered");
        }
        removed
    }

    /// An immutable point-in-time copy of the current membership.
    pub fn snapshot(&self) -> Vec<Arc<dyn PacketSink>> {
        self.sinks
            .lock()
            .expect("sink registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Number of currently connected sinks.
    pub fn len(&self) -> usize {
        self.sinks.lock().expect("sink registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ────────────────────────────────────────────────────────
