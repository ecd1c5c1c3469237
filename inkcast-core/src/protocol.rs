//! Binary packet format shared with the display firmware.
//!
//! ## Wire format
//!
//! **Packet header** (8 bytes, big-endian):
//! ```text
//! magic:        u8   (1)  always 0xA5
//! type:         u8   (1)
//! seq_id:       u16  (2)
//! payload_len:  i32  (4)
//! ```
//!
//! **Payload shapes** by packet type:
//! ```text
//! FullUpdate:  compressed or raw frame bytes
//! DeltaUpdate: packed diff list  [count:u32][(index:u32, value:u8)]*
//!              or region list    [x:u16][y:u16][w:u16][h:u16][len:i32][data]*
//! Tile:        [index:u8][band data]
//! Command:     [command:u8][param:u8]
//! Ack / Nak:   [status:u8]
//! ```

use std::fmt;

use crate::codec::ByteChange;
use crate::codec::hybrid;
use crate::error::CastError;

// ── Constants ────────────────────────────────────────────────────

/// Fixed sentinel byte opening every packet.
pub const MAGIC: u8 = 0xA5;

/// Encoded header size on the wire.
pub const HEADER_SIZE: usize = 8;

/// Upper bound on a single packet payload. Large enough for an
/// uncompressed frame of any supported panel, small enough that a
/// corrupt length field cannot balloon the receive buffer.
pub const MAX_PAYLOAD_SIZE: usize = 512 * 1024;

// ── PacketType ───────────────────────────────────────────────────

/// Closed packet taxonomy. Data kinds occupy `0x0_`, acknowledgement
/// kinds `0x1_`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Whole-frame update, payload run-length encoded.
    FullUpdate = 0x01,
    /// Differences against the previously sent frame.
    DeltaUpdate = 0x02,
    /// Control command for the display.
    Command = 0x03,
    /// One horizontal band of a tiled update, payload raw.
    Tile = 0x04,
    /// Client acknowledgement of a received packet.
    Ack = 0x10,
    /// Client negative acknowledgement.
    Nak = 0x11,
}

impl TryFrom<u8> for PacketType {
    type Error = CastError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PacketType::FullUpdate),
            0x02 => Ok(PacketType::DeltaUpdate),
            0x03 => Ok(PacketType::Command),
            0x04 => Ok(PacketType::Tile),
            0x10 => Ok(PacketType::Ack),
            0x11 => Ok(PacketType::Nak),
            _ => Err(CastError::UnknownVariant {
                type_name: "PacketType",
                value,
            }),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PacketType {
    /// Whether this packet originates from the client as an
    /// acknowledgement (observational only — never gates the stream).
    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, PacketType::Ack | PacketType::Nak)
    }
}

// ── DisplayCommand ───────────────────────────────────────────────

/// Control commands understood by the display firmware.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayCommand {
    /// Blank the panel.
    ClearScreen = 0x10,
    /// Enter deep sleep.
    Sleep = 0x11,
    /// Wake from deep sleep.
    Wake = 0x12,
    /// Switch to partial-refresh mode.
    PartialMode = 0x13,
    /// Switch to full-refresh mode.
    FullMode = 0x14,
}

impl TryFrom<u8> for DisplayCommand {
    type Error = CastError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(DisplayCommand::ClearScreen),
            0x11 => Ok(DisplayCommand::Sleep),
            0x12 => Ok(DisplayCommand::Wake),
            0x13 => Ok(DisplayCommand::PartialMode),
            0x14 => Ok(DisplayCommand::FullMode),
            _ => Err(CastError::UnknownVariant {
                type_name: "DisplayCommand",
                value,
            }),
        }
    }
}

impl fmt::Display for DisplayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── PacketHeader ─────────────────────────────────────────────────

/// Decoded fixed header of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub seq_id: u16,
    pub payload_len: i32,
}

impl PacketHeader {
    /// Serialize to bytes (big-endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = MAGIC;
        buf[1] = self.packet_type as u8;
        buf[2..4].copy_from_slice(&self.seq_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    /// Deserialize from bytes.
    ///
    /// Fails with [`CastError::ShortBuffer`] on fewer than
    /// [`HEADER_SIZE`] bytes; magic, type, and length are validated.
    pub fn decode(data: &[u8]) -> Result<Self, CastError> {
        if data.len() < HEADER_SIZE {
            return Err(CastError::ShortBuffer {
                needed: HEADER_SIZE,
                got: data.len(),
            });
        }
        if data[0] != MAGIC {
            return Err(CastError::MagicMismatch(data[0]));
        }
        let packet_type = PacketType::try_from(data[1])?;
        let seq_id = u16::from_be_bytes(data[2..4].try_into().unwrap());
        let payload_len = i32::from_be_bytes(data[4..8].try_into().unwrap());
        if payload_len < 0 {
            return Err(CastError::NegativeLength(payload_len));
        }
        Ok(Self {
            packet_type,
            seq_id,
            payload_len,
        })
    }
}

/// Cheap validity check for a prospective packet buffer: long enough
/// for a header, correct magic, non-negative length.
///
/// Decode failures are absorbed into `false` rather than propagated —
/// this is the triage path for data that may be partial or garbage.
/// An unknown packet type does not make the header invalid here; the
/// full decode is where the closed taxonomy is enforced.
pub fn validate_header(data: &[u8]) -> bool {
    if data.len() < HEADER_SIZE {
        return false;
    }
    data[0] == MAGIC && i32::from_be_bytes(data[4..8].try_into().unwrap()) >= 0
}

// ── DeltaRegion ──────────────────────────────────────────────────

/// A rectangular partial update, encoded as
/// `[x:u16][y:u16][w:u16][h:u16][len:i32][data]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRegion {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl DeltaRegion {
    /// Encoded header size preceding each region's data.
    const HEADER: usize = 12;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.x.to_be_bytes());
        out.extend_from_slice(&self.y.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&(self.data.len() as i32).to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Parse a concatenated region list, consuming the whole payload.
    pub fn parse_list(mut payload: &[u8]) -> Result<Vec<Self>, CastError> {
        let mut regions = Vec::new();
        while !payload.is_empty() {
            if payload.len() < Self::HEADER {
                return Err(CastError::MalformedPayload("truncated region header"));
            }
            let len = i32::from_be_bytes(payload[8..12].try_into().unwrap());
            if len < 0 {
                return Err(CastError::NegativeLength(len));
            }
            let end = Self::HEADER + len as usize;
            if payload.len() < end {
                return Err(CastError::MalformedPayload("truncated region data"));
            }
            regions.push(Self {
                x: u16::from_be_bytes(payload[0..2].try_into().unwrap()),
                y: u16::from_be_bytes(payload[2..4].try_into().unwrap()),
                width: u16::from_be_bytes(payload[4..6].try_into().unwrap()),
                height: u16::from_be_bytes(payload[6..8].try_into().unwrap()),
                data: payload[Self::HEADER..end].to_vec(),
            });
            payload = &payload[end..];
        }
        Ok(regions)
    }
}

// ── Packet ───────────────────────────────────────────────────────

/// One framed protocol packet: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    fn with_payload(
        packet_type: PacketType,
        seq_id: u16,
        payload: Vec<u8>,
    ) -> Result<Self, CastError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CastError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            header: PacketHeader {
                packet_type,
                seq_id,
                payload_len: payload.len() as i32,
            },
            payload,
        })
    }

    /// A whole-frame update carrying an already-encoded payload.
    pub fn full_update(seq_id: u16, payload: Vec<u8>) -> Result<Self, CastError> {
        Self::with_payload(PacketType::FullUpdate, seq_id, payload)
    }

    /// A delta update carrying a packed diff list
    /// (see [`hybrid::pack_changes`]).
    pub fn delta_update(seq_id: u16, packed: Vec<u8>) -> Result<Self, CastError> {
        Self::with_payload(PacketType::DeltaUpdate, seq_id, packed)
    }

    /// A delta update carrying rectangular regions.
    pub fn delta_regions(seq_id: u16, regions: &[DeltaRegion]) -> Result<Self, CastError> {
        let total: usize = regions
            .iter()
            .map(|r| DeltaRegion::HEADER + r.data.len())
            .sum();
        let mut payload = Vec::with_capacity(total);
        for region in regions {
            region.encode_into(&mut payload);
        }
        Self::with_payload(PacketType::DeltaUpdate, seq_id, payload)
    }

    /// One horizontal band of a tiled update. The band data is raw.
    pub fn tile(seq_id: u16, index: u8, data: &[u8]) -> Result<Self, CastError> {
        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(index);
        payload.extend_from_slice(data);
        Self::with_payload(PacketType::Tile, seq_id, payload)
    }

    /// A display control command with an optional parameter byte.
    pub fn command(seq_id: u16, command: DisplayCommand, param: u8) -> Self {
        Self {
            header: PacketHeader {
                packet_type: PacketType::Command,
                seq_id,
                payload_len: 2,
            },
            payload: vec![command as u8, param],
        }
    }

    /// A positive acknowledgement (`status` 1 = success).
    pub fn ack(seq_id: u16, status: u8) -> Self {
        Self {
            header: PacketHeader {
                packet_type: PacketType::Ack,
                seq_id,
                payload_len: 1,
            },
            payload: vec![status],
        }
    }

    /// A negative acknowledgement.
    pub fn nak(seq_id: u16) -> Self {
        Self {
            header: PacketHeader {
                packet_type: PacketType::Nak,
                seq_id,
                payload_len: 1,
            },
            payload: vec![0],
        }
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    pub fn seq_id(&self) -> u16 {
        self.header.seq_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total encoded length: header plus payload.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the whole packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Deserialize a packet from an exact buffer.
    ///
    /// The buffer must contain the header plus exactly `payload_len`
    /// bytes — short buffers fail with [`CastError::ShortBuffer`],
    /// trailing bytes with [`CastError::MalformedPayload`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CastError> {
        let header = PacketHeader::decode(bytes)?;
        let expected = HEADER_SIZE + header.payload_len as usize;
        if bytes.len() < expected {
            return Err(CastError::ShortBuffer {
                needed: expected,
                got: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(CastError::MalformedPayload("trailing bytes after payload"));
        }
        Ok(Self {
            header,
            payload: bytes[HEADER_SIZE..].to_vec(),
        })
    }

    /// Decode the payload into its strongly-typed shape.
    ///
    /// A `DeltaUpdate` payload is tried as a packed diff list first
    /// (the shape the streamer emits) and as a region list otherwise.
    pub fn body(&self) -> Result<PacketBody, CastError> {
        match self.header.packet_type {
            PacketType::FullUpdate => Ok(PacketBody::FullUpdate {
                data: self.payload.clone(),
            }),
            PacketType::DeltaUpdate => {
                if let Ok(changes) = hybrid::unpack_changes(&self.payload) {
                    return Ok(PacketBody::DeltaDiffs { changes });
                }
                let regions = DeltaRegion::parse_list(&self.payload)?;
                Ok(PacketBody::DeltaRegions { regions })
            }
            PacketType::Tile => {
                let (index, data) = self
                    .payload
                    .split_first()
                    .ok_or(CastError::MalformedPayload("tile payload missing index"))?;
                Ok(PacketBody::Tile {
                    index: *index,
                    data: data.to_vec(),
                })
            }
            PacketType::Command => {
                if self.payload.len() != 2 {
                    return Err(CastError::MalformedPayload("command payload must be 2 bytes"));
                }
                Ok(PacketBody::Command {
                    command: DisplayCommand::try_from(self.payload[0])?,
                    param: self.payload[1],
                })
            }
            PacketType::Ack => Ok(PacketBody::Ack {
                status: *self
                    .payload
                    .first()
                    .ok_or(CastError::MalformedPayload("empty ack payload"))?,
            }),
            PacketType::Nak => Ok(PacketBody::Nak {
                status: *self
                    .payload
                    .first()
                    .ok_or(CastError::MalformedPayload("empty nak payload"))?,
            }),
        }
    }
}

// ── PacketBody ───────────────────────────────────────────────────

/// Strongly-typed view of a packet payload, one case per packet kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    FullUpdate { data: Vec<u8> },
    DeltaDiffs { changes: Vec<ByteChange> },
    DeltaRegions { regions: Vec<DeltaRegion> },
    Tile { index: u8, data: Vec<u8> },
    Command { command: DisplayCommand, param: u8 },
    Ack { status: u8 },
    Nak { status: u8 },
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let payload = vec![1u8, 2, 3, 4, 5];
        let packet = Packet::full_update(7, payload.clone()).unwrap();
        let bytes = packet.to_bytes();

        let header = PacketHeader::decode(&bytes).unwrap();
        assert_eq!(header.packet_type, PacketType::FullUpdate);
        assert_eq!(header.seq_id, 7);
        assert_eq!(header.payload_len, payload.len() as i32);
        assert_eq!(bytes[0], MAGIC);
    }

    #[test]
    fn decode_short_buffer() {
        let err = PacketHeader::decode(&[MAGIC, 0x01, 0, 1]).unwrap_err();
        assert!(matches!(err, CastError::ShortBuffer { needed: 8, got: 4 }));
    }

    #[test]
    fn decode_rejects_bad_magic_and_negative_length() {
        let mut bytes = Packet::ack(1, 1).to_bytes();
        bytes[0] = 0x5A;
        assert!(matches!(
            PacketHeader::decode(&bytes),
            Err(CastError::MagicMismatch(0x5A))
        ));

        let mut bytes = Packet::ack(1, 1).to_bytes();
        bytes[4..8].copy_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            PacketHeader::decode(&bytes),
            Err(CastError::NegativeLength(-1))
        ));
    }

    #[test]
    fn validate_header_triage() {
        assert!(!validate_header(&[]));
        assert!(!validate_header(&[0u8; 3]));

        let good = Packet::command(3, DisplayCommand::ClearScreen, 0).to_bytes();
        assert!(validate_header(&good));

        let mut bad_magic = good.clone();
        bad_magic[0] = 0x00;
        assert!(!validate_header(&bad_magic));

        let mut negative = good.clone();
        negative[4..8].copy_from_slice(&(-5i32).to_be_bytes());
        assert!(!validate_header(&negative));

        // Unknown type is still a valid header at triage level.
        let mut unknown_type = good;
        unknown_type[1] = 0x7F;
        assert!(validate_header(&unknown_type));
    }

    #[test]
    fn packet_round_trip_with_exact_length() {
        let packet = Packet::tile(9, 2, &[0xAA; 64]).unwrap();
        let bytes = packet.to_bytes();
        let restored = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(restored, packet);

        // Truncated and padded buffers are rejected.
        assert!(Packet::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        let mut padded = bytes;
        padded.push(0);
        assert!(Packet::from_bytes(&padded).is_err());
    }

    #[test]
    fn tile_body_decodes_index_and_data() {
        let packet = Packet::tile(1, 2, &[9, 8, 7]).unwrap();
        match packet.body().unwrap() {
            PacketBody::Tile { index, data } => {
                assert_eq!(index, 2);
                assert_eq!(data, vec![9, 8, 7]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn command_body_round_trip() {
        let packet = Packet::command(4, DisplayCommand::Sleep, 0x2A);
        assert_eq!(packet.payload(), &[0x11, 0x2A]);
        match packet.body().unwrap() {
            PacketBody::Command { command, param } => {
                assert_eq!(command, DisplayCommand::Sleep);
                assert_eq!(param, 0x2A);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn delta_regions_round_trip() {
        let regions = vec![
            DeltaRegion {
                x: 10,
                y: 20,
                width: 100,
                height: 50,
                data: vec![0x00; 50],
            },
            DeltaRegion {
                x: 200,
                y: 100,
                width: 80,
                height: 60,
                data: vec![0xFF; 40],
            },
        ];
        let packet = Packet::delta_regions(5, &regions).unwrap();
        match packet.body().unwrap() {
            PacketBody::DeltaRegions { regions: parsed } => assert_eq!(parsed, regions),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn delta_diff_body_preferred_over_regions() {
        let changes = vec![
            ByteChange { index: 3, value: 1 },
            ByteChange {
                index: 900,
                value: 0xFE,
            },
        ];
        let packet = Packet::delta_update(6, hybrid::pack_changes(&changes)).unwrap();
        match packet.body().unwrap() {
            PacketBody::DeltaDiffs { changes: parsed } => assert_eq!(parsed, changes),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn ack_nak_round_trip() {
        let ack = Packet::ack(12, 1);
        assert_eq!(ack.body().unwrap(), PacketBody::Ack { status: 1 });
        assert!(ack.packet_type().is_acknowledgement());

        let nak = Packet::nak(12);
        assert_eq!(nak.body().unwrap(), PacketBody::Nak { status: 0 });
    }

    #[test]
    fn unknown_packet_type_is_closed_out() {
        let mut bytes = Packet::ack(1, 1).to_bytes();
        bytes[1] = 0x7F;
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(CastError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let err = Packet::full_update(1, vec![0u8; MAX_PAYLOAD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, CastError::FrameTooLarge { .. }));
    }
}
