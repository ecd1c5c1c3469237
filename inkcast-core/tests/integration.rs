//! Integration tests — tiled streaming, readiness pacing, and
//! acknowledgement routing over a real TCP connection on localhost.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_test::assert_ok;
use tokio_util::codec::Framed;

use inkcast_core::{
    CastError, DisplayGeometry, FrameStreamer, HEADER_SIZE, Inbound, Packet, PacketBody,
    PacketHeader, PacketSink, PacketType, ReadyGate, SinkId, SinkRegistry, StreamerConfig,
    WireCodec,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Spin up a listener on an OS-assigned port.
async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Sink handle over a connection's outbound channel, the shape the
/// server wraps around each accepted client.
struct TcpSink {
    id: SinkId,
    tx: mpsc::Sender<Packet>,
}

#[async_trait]
impl PacketSink for TcpSink {
    fn id(&self) -> SinkId {
        self.id
    }

    async fn send(&self, packet: Packet) -> Result<(), CastError> {
        self.tx.send(packet).await?;
        Ok(())
    }
}

/// Wire one accepted connection into the registry: a writer task
/// draining the sink channel, and a reader task routing readiness
/// lines to the gate and inbound packets to `inbound_tx`.
fn attach_connection(
    stream: TcpStream,
    registry: &Arc<SinkRegistry>,
    gate: Arc<ReadyGate>,
    inbound_tx: mpsc::UnboundedSender<Packet>,
) -> SinkId {
    let framed = Framed::new(stream, WireCodec::default());
    let (mut writer, mut reader) = framed.split();

    let (tx, mut rx) = mpsc::channel::<Packet>(16);
    tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if writer.send(packet).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(Ok(item)) = reader.next().await {
            match item {
                item if item.is_ready_signal() => gate.signal(),
                Inbound::Packet(packet) => {
                    let _ = inbound_tx.send(packet);
                }
                Inbound::Text(_) => {} // logged and ignored in the server
            }
        }
    });

    let id = registry.allocate_id();
    registry.register(Arc::new(TcpSink { id, tx }));
    id
}

/// Read one complete packet off a raw client socket, the way the
/// firmware does: fixed header first, then exactly `payload_len`.
async fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    let parsed = PacketHeader::decode(&header).unwrap();

    let mut bytes = header.to_vec();
    bytes.resize(HEADER_SIZE + parsed.payload_len as usize, 0);
    stream.read_exact(&mut bytes[HEADER_SIZE..]).await.unwrap();
    Packet::from_bytes(&bytes).unwrap()
}

/// 16×6 display in 2-row bands: 3 tiles of 4 bytes each.
fn three_tile_geometry() -> DisplayGeometry {
    DisplayGeometry::new(16, 6, 2).unwrap()
}

// ── Tiled streaming ──────────────────────────────────────────────

#[tokio::test]
async fn tiled_update_paced_by_ready_signals() {
    let (listener, addr) = ephemeral_listener().await;
    let registry = Arc::new(SinkRegistry::new());

    let config = StreamerConfig::new(three_tile_geometry())
        .with_ready_timeout(Duration::from_secs(5));
    let mut streamer = FrameStreamer::new(Arc::clone(&registry), config);

    // Client: render each band, then report readiness.
    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut received = Vec::new();
        for _ in 0..3 {
            let packet = read_packet(&mut stream).await;
            received.push(packet);
            stream.write_all(b"READY\n").await.unwrap();
        }
        received
    });

    let (stream, _) = listener.accept().await.unwrap();
    let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
    attach_connection(stream, &registry, streamer.ready_gate(), inbound_tx);

    let frame: Vec<u8> = (0u8..12).collect();
    let report = tokio::time::timeout(Duration::from_secs(10), streamer.send_tiled_update(&frame))
        .await
        .expect("update stalled")
        .unwrap();

    assert_eq!(report.packets, 3);
    assert_eq!(report.ready_timeouts, 0);

    let received = client.await.unwrap();
    let seqs: Vec<u16> = received.iter().map(|p| p.seq_id()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    for (i, packet) in received.iter().enumerate() {
        assert_eq!(packet.packet_type(), PacketType::Tile);
        match packet.body().unwrap() {
            PacketBody::Tile { index, data } => {
                assert_eq!(index as usize, i);
                assert_eq!(data, frame[i * 4..(i + 1) * 4].to_vec());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}

#[tokio::test]
async fn silent_client_times_out_but_all_tiles_arrive() {
    let (listener, addr) = ephemeral_listener().await;
    let registry = Arc::new(SinkRegistry::new());

    let config = StreamerConfig::new(three_tile_geometry())
        .with_ready_timeout(Duration::from_millis(50));
    let mut streamer = FrameStreamer::new(Arc::clone(&registry), config);

    // Client that never reports readiness.
    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(read_packet(&mut stream).await);
        }
        received
    });

    let (stream, _) = listener.accept().await.unwrap();
    let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
    attach_connection(stream, &registry, streamer.ready_gate(), inbound_tx);

    let frame = vec![0xA5; 12];
    let report = assert_ok!(streamer.send_tiled_update(&frame).await);

    // Every wait timed out, and tile i+1 still went out after tile i.
    assert_eq!(report.ready_timeouts, 3);
    let received = client.await.unwrap();
    assert_eq!(received.len(), 3);
    assert_eq!(received[2].seq_id(), 3);
}

// ── Acknowledgements ─────────────────────────────────────────────

#[tokio::test]
async fn inbound_acks_are_surfaced_not_gating() {
    let (listener, addr) = ephemeral_listener().await;
    let registry = Arc::new(SinkRegistry::new());

    let config = StreamerConfig::new(three_tile_geometry())
        .with_ready_timeout(Duration::from_secs(5));
    let mut streamer = FrameStreamer::new(Arc::clone(&registry), config);

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let packet = read_packet(&mut stream).await;

        // Acknowledge receipt, then confirm the render separately.
        let ack = Packet::ack(packet.seq_id(), 1);
        stream.write_all(&ack.to_bytes()).await.unwrap();
        stream.write_all(b"READY\n").await.unwrap();

        // Unrelated chatter must be ignored by the server.
        stream.write_all(b"battery: 87%\n").await.unwrap();
        packet.seq_id()
    });

    let (stream, _) = listener.accept().await.unwrap();
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    attach_connection(stream, &registry, streamer.ready_gate(), inbound_tx);

    let frame = vec![0xFF; 12];
    let report = streamer.send_full_update(&frame).await.unwrap();
    assert_eq!(report.packets, 1);

    let acked_seq = client.await.unwrap();
    let ack = tokio::time::timeout(Duration::from_secs(5), inbound_rx.recv())
        .await
        .expect("no ack arrived")
        .unwrap();
    assert_eq!(ack.packet_type(), PacketType::Ack);
    assert_eq!(ack.seq_id(), acked_seq);
    assert_eq!(ack.body().unwrap(), PacketBody::Ack { status: 1 });
}

// ── Registry churn during a stream ───────────────────────────────

#[tokio::test]
async fn late_sink_joins_on_next_tile() {
    let (listener, addr) = ephemeral_listener().await;
    let registry = Arc::new(SinkRegistry::new());

    let config = StreamerConfig::new(three_tile_geometry())
        .with_ready_timeout(Duration::from_millis(100));
    let mut streamer = FrameStreamer::new(Arc::clone(&registry), config);
    let gate = streamer.ready_gate();

    // First client present from the start; never signals (we rely on
    // the short timeout to pace the update).
    let first = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut count = 0;
        while tokio::time::timeout(Duration::from_secs(2), read_packet(&mut stream))
            .await
            .is_ok()
        {
            count += 1;
            if count == 3 {
                break;
            }
        }
        count
    });

    let (stream, _) = listener.accept().await.unwrap();
    let (inbound_tx, _rx) = mpsc::unbounded_channel();
    attach_connection(stream, &registry, Arc::clone(&gate), inbound_tx);

    // Second client connects while the update is in flight; the
    // snapshot rule means it starts receiving at a tile boundary.
    let late_registry = Arc::clone(&registry);
    let late_gate = Arc::clone(&gate);
    let (late_listener, late_addr) = ephemeral_listener().await;
    let late_client = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        let mut stream = TcpStream::connect(late_addr).await.unwrap();
        let packet = read_packet(&mut stream).await;
        packet.body().unwrap()
    });
    let late_attach = tokio::spawn(async move {
        let (stream, _) = late_listener.accept().await.unwrap();
        let (inbound_tx, _rx) = mpsc::unbounded_channel();
        attach_connection(stream, &late_registry, late_gate, inbound_tx);
    });

    let frame: Vec<u8> = (0u8..12).collect();
    let report = streamer.send_tiled_update(&frame).await.unwrap();
    assert_eq!(report.packets, 3);

    assert_eq!(first.await.unwrap(), 3);
    late_attach.await.unwrap();

    // The late client missed tile 0 but received a complete later
    // band, never a torn one.
    match late_client.await.unwrap() {
        PacketBody::Tile { index, data } => {
            assert!(index >= 1);
            assert_eq!(data.len(), 4);
        }
        other => panic!("unexpected body: {other:?}"),
    }
}
