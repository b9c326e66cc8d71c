/// Wire contracts for the CSMA/CA protocol core
///
/// Frame layouts are fixed-width and little-endian, byte-exact with
/// the reference protocol, with a trailing 32-bit CRC (FCS) computed
/// over every byte that precedes it.
use crc::Crc;

use crate::errors::{Result, SimError};

/// CRC-32C (Castagnoli), the reduction of the protocol's 0x11EDC6F41
/// generator to its 32-bit form.
pub const FRAME_CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// A station name: 1-6 printable bytes, zero-padded to 6 for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationName(pub [u8; 6]);

impl StationName {
    /// Build a `StationName` from a short ASCII identifier.
    ///
    /// Returns `SimError::InvalidStationName` if `name` is empty or
    /// longer than 6 bytes, rather than panicking: a malformed name
    /// handed in by the excluded parser is the parser's mistake to
    /// report to its operator, not one that should tear down the
    /// calling task.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.len() > 6 {
            return Err(SimError::InvalidStationName(name.to_string()));
        }
        let mut buf = [0u8; 6];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self(buf))
    }

    /// The zero-padded 6-byte address field as it appears on the wire.
    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    /// The name with trailing zero padding stripped, as a display form.
    pub fn trimmed(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(6);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl std::fmt::Display for StationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.trimmed())
    }
}

/// The subtype carried in a frame's FC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubtype {
    Rts,
    Cts,
    Ack,
}

impl FrameSubtype {
    fn code(self) -> u16 {
        match self {
            FrameSubtype::Rts => crate::RTS_SUBTYPE,
            FrameSubtype::Cts => crate::CTS_SUBTYPE,
            FrameSubtype::Ack => crate::ACK_SUBTYPE,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            c if c == crate::RTS_SUBTYPE => Some(FrameSubtype::Rts),
            c if c == crate::CTS_SUBTYPE => Some(FrameSubtype::Cts),
            c if c == crate::ACK_SUBTYPE => Some(FrameSubtype::Ack),
            _ => None,
        }
    }
}

/// Request-To-Send: 20 bytes on the wire (16 header bytes + 4 FCS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtsFrame {
    /// Length, in bytes, of the DATA payload the sender intends to
    /// transmit next.
    pub payload_len: u16,
    /// The sending station.
    pub addr1: StationName,
    /// The final destination station.
    pub addr2: StationName,
}

impl RtsFrame {
    pub const WIRE_LEN: usize = 20;

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&FrameSubtype::Rts.code().to_le_bytes());
        buf[2..4].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[4..10].copy_from_slice(&self.addr1.as_bytes());
        buf[10..16].copy_from_slice(&self.addr2.as_bytes());
        let fcs = FRAME_CRC.checksum(&buf[0..16]);
        buf[16..20].copy_from_slice(&fcs.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::WIRE_LEN {
            return Err(SimError::ChecksumMismatch);
        }
        let fc = u16::from_le_bytes([buf[0], buf[1]]);
        if FrameSubtype::from_code(fc) != Some(FrameSubtype::Rts) {
            return Err(SimError::ChecksumMismatch);
        }
        let expected = FRAME_CRC.checksum(&buf[0..16]);
        let actual = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        if expected != actual {
            return Err(SimError::ChecksumMismatch);
        }
        let payload_len = u16::from_le_bytes([buf[2], buf[3]]);
        let mut addr1 = [0u8; 6];
        addr1.copy_from_slice(&buf[4..10]);
        let mut addr2 = [0u8; 6];
        addr2.copy_from_slice(&buf[10..16]);
        Ok(Self {
            payload_len,
            addr1: StationName(addr1),
            addr2: StationName(addr2),
        })
    }
}

/// CTS or ACK: 14 bytes on the wire (10 header bytes + 4 FCS). The two
/// frame kinds share this layout and differ only in the FC subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtsAckFrame {
    pub subtype: FrameSubtype,
    /// Station being granted transmission (CTS) or whose DATA is
    /// acknowledged (ACK).
    pub addr1: StationName,
}

impl CtsAckFrame {
    pub const WIRE_LEN: usize = 14;

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&self.subtype.code().to_le_bytes());
        // D is unused for CTS/ACK; zeroed.
        buf[4..10].copy_from_slice(&self.addr1.as_bytes());
        let fcs = FRAME_CRC.checksum(&buf[0..10]);
        buf[10..14].copy_from_slice(&fcs.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8], expected: FrameSubtype) -> Result<Self> {
        if buf.len() != Self::WIRE_LEN {
            return Err(SimError::ChecksumMismatch);
        }
        let fc = u16::from_le_bytes([buf[0], buf[1]]);
        let subtype = FrameSubtype::from_code(fc).ok_or(SimError::ChecksumMismatch)?;
        if subtype != expected {
            return Err(SimError::ChecksumMismatch);
        }
        let expected_fcs = FRAME_CRC.checksum(&buf[0..10]);
        let actual_fcs = u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]);
        if expected_fcs != actual_fcs {
            return Err(SimError::ChecksumMismatch);
        }
        let mut addr1 = [0u8; 6];
        addr1.copy_from_slice(&buf[4..10]);
        Ok(Self { subtype, addr1: StationName(addr1) })
    }
}

/// One outstanding transmission request: everything a station sender
/// needs to run the RTS/CTS/DATA/ACK exchange for a single payload.
#[derive(Debug, Clone)]
pub struct SendJob {
    pub src: StationName,
    pub dst: StationName,
    pub payload: Vec<u8>,
    /// Seconds between consecutive attempts when `repeat` is set.
    pub period: std::time::Duration,
    pub repeat: bool,
}

/// DATA: payload bytes followed by a 4-byte FCS over the payload.
pub struct DataFrame;

impl DataFrame {
    pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > crate::MAX_PAYLOAD_SIZE {
            return Err(SimError::PayloadTooLarge(payload.len(), crate::MAX_PAYLOAD_SIZE));
        }
        let mut buf = Vec::with_capacity(payload.len() + 4);
        buf.extend_from_slice(payload);
        let fcs = FRAME_CRC.checksum(payload);
        buf.extend_from_slice(&fcs.to_le_bytes());
        Ok(buf)
    }

    /// Validate a DATA block of `payload_len + 4` bytes (the length
    /// declared by the preceding RTS) and return the payload on success.
    pub fn decode(buf: &[u8], payload_len: usize) -> Result<Vec<u8>> {
        if buf.len() != payload_len + 4 {
            return Err(SimError::ChecksumMismatch);
        }
        let (payload, fcs_bytes) = buf.split_at(payload_len);
        let expected = FRAME_CRC.checksum(payload);
        let actual = u32::from_le_bytes([fcs_bytes[0], fcs_bytes[1], fcs_bytes[2], fcs_bytes[3]]);
        if expected != actual {
            return Err(SimError::ChecksumMismatch);
        }
        Ok(payload.to_vec())
    }
}
