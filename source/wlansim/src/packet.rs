//! Packets exchanged over the TX and RX rings.
//!
//! On the wire a packet is a little-endian `u32` sequence number followed by
//! a fixed 64-byte, NUL-padded text payload.

use core::fmt::{self, Write};

pub const PAYLOAD_LEN: usize = 64;
pub const WIRE_LEN: usize = 4 + PAYLOAD_LEN;

/// The descriptor length recorded for every packet pushed into a ring.
pub const DESC_LEN: u32 = WIRE_LEN as u32;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    sequence: u32,
    payload: heapless::String<PAYLOAD_LEN>,
}

#[derive(Debug, Eq, PartialEq)]
pub enum PacketError {
    /// The payload bytes before the first NUL are not UTF-8.
    Utf8,
}

impl Packet {
    /// Builds a packet, truncating the formatted payload to 64 bytes.
    pub fn new(sequence: u32, payload: fmt::Arguments<'_>) -> Self {
        let mut text = heapless::String::new();
        // `Truncate` never reports an error
        let _ = Truncate(&mut text).write_fmt(payload);
        Self {
            sequence,
            payload: text,
        }
    }

    /// A driver-to-firmware data packet.
    pub fn tx(sequence: u32) -> Self {
        Self::new(sequence, format_args!("TX Packet #{sequence}"))
    }

    /// The firmware's acknowledgement of TX packet `sequence`.
    pub fn ack(sequence: u32) -> Self {
        Self::new(sequence, format_args!("ACK #{sequence}"))
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    pub fn to_wire(&self) -> [u8; WIRE_LEN] {
        let mut out = [0u8; WIRE_LEN];
        out[..4].copy_from_slice(&self.sequence.to_le_bytes());
        let text = self.payload.as_bytes();
        out[4..4 + text.len()].copy_from_slice(text);
        out
    }

    pub fn from_wire(wire: &[u8; WIRE_LEN]) -> Result<Self, PacketError> {
        let (seq, text) = wire.split_at(4);
        let mut seq_bytes = [0u8; 4];
        seq_bytes.copy_from_slice(seq);

        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let text = core::str::from_utf8(&text[..end]).map_err(|_| PacketError::Utf8)?;
        let mut payload = heapless::String::new();
        payload.push_str(text).map_err(|_| PacketError::Utf8)?;

        Ok(Self {
            sequence: u32::from_le_bytes(seq_bytes),
            payload,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload())
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => f.write_str("packet payload is not valid UTF-8"),
        }
    }
}

impl std::error::Error for PacketError {}

/// Writes as much as fits, stopping at the first character that doesn't.
struct Truncate<'a, const N: usize>(&'a mut heapless::String<N>);

impl<const N: usize> Write for Truncate<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}
