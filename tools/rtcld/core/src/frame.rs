//! Request/response frames spoken with the cartridge programmer.
//!
//! ```text
//! u16 length | u8 opcode | u32 address | payload.. | u16 trailer (0)
//! ```
//!
//! Everything is little-endian. `length` counts the whole frame, itself
//! included, because the firmware starts executing a command once the number
//! of bytes received equals it. Writes are answered with a single [`ACK`];
//! reads with a two byte header followed by the requested bytes.

use crate::error::ProtocolError;

/// The byte the programmer sends back after every write.
pub const ACK: u8 = 0xAA;

/// Bytes in front of the payload of a read response.
pub const RESPONSE_HEADER_LEN: usize = 2;

const LENGTH_LEN: usize = 2;
const OPCODE_LEN: usize = 1;
const ADDRESS_LEN: usize = 4;
const TRAILER: [u8; 2] = [0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// 16-bit writes into cartridge ROM space. Address is a word address.
    RomWrite = 0xF5,
    /// Reads from cartridge ROM space. Address is a byte address.
    RomRead = 0xF6,
    /// 8-bit writes into cartridge RAM space.
    RamWrite = 0xF7,
    RamRead = 0xF8,
}

impl Opcode {
    pub const fn is_read(self) -> bool {
        matches!(self, Opcode::RomRead | Opcode::RamRead)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xF5 => Ok(Opcode::RomWrite),
            0xF6 => Ok(Opcode::RomRead),
            0xF7 => Ok(Opcode::RamWrite),
            0xF8 => Ok(Opcode::RamRead),
            op => Err(ProtocolError::UnknownOpcode(op)),
        }
    }
}

/// One request to the programmer, before it hits the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub address: u32,
    /// Write data, or the requested length (u16, LE) for reads.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, address: u32, payload: Vec<u8>) -> Self {
        Self { opcode, address, payload }
    }

    /// A read request for `len` bytes.
    pub fn read(opcode: Opcode, address: u32, len: u16) -> Self {
        debug_assert!(opcode.is_read());
        Self::new(opcode, address, len.to_le_bytes().to_vec())
    }

    /// Byte count of opcode, address, payload and trailer.
    pub fn body_len(&self) -> usize {
        OPCODE_LEN + ADDRESS_LEN + self.payload.len() + TRAILER.len()
    }

    /// Byte count of the whole encoded frame; this is what goes in the length field.
    pub fn wire_len(&self) -> usize {
        LENGTH_LEN + self.body_len()
    }

    /// Bytes requested by a read frame.
    pub fn requested_len(&self) -> Option<usize> {
        match (self.opcode.is_read(), self.payload.as_slice()) {
            (true, [lo, hi]) => Some(u16::from_le_bytes([*lo, *hi]) as usize),
            _ => None,
        }
    }

    /// How many bytes the programmer answers this frame with.
    pub fn response_len(&self) -> usize {
        match self.requested_len() {
            Some(n) => RESPONSE_HEADER_LEN + n,
            None => 1,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let wire_len = self.wire_len();
        assert!(wire_len <= u16::MAX as usize, "frame of {} bytes does not fit the length field", wire_len);

        let mut out = Vec::with_capacity(wire_len);
        out.extend_from_slice(&(wire_len as u16).to_le_bytes());
        out.push(self.opcode as u8);
        out.extend_from_slice(&self.address.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&TRAILER);
        out
    }

    /// Parse an encoded request, as the programmer does.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        const MIN: usize = LENGTH_LEN + OPCODE_LEN + ADDRESS_LEN + 2;

        if bytes.len() < MIN {
            return Err(ProtocolError::MalformedFrame("shorter than an empty frame"));
        }

        let length = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
        if length != bytes.len() {
            return Err(ProtocolError::UnexpectedLength { expected: length, got: bytes.len() });
        }

        let opcode = Opcode::try_from(bytes[2])?;
        let address = u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        let (payload, trailer) = bytes[7..].split_at(bytes.len() - 7 - TRAILER.len());
        if trailer != TRAILER {
            return Err(ProtocolError::MalformedFrame("non-zero trailer"));
        }

        let frame = Self::new(opcode, address, payload.to_vec());
        if opcode.is_read() && frame.requested_len().is_none() {
            return Err(ProtocolError::MalformedFrame("read without a length"));
        }

        Ok(frame)
    }
}

pub fn encode(opcode: Opcode, address: u32, payload: &[u8]) -> Vec<u8> {
    Frame::new(opcode, address, payload.to_vec()).encode()
}

/// Strip the response header of a read, checking it carries `expected_len` bytes.
pub fn decode_response(raw: &[u8], expected_len: usize) -> Result<&[u8], ProtocolError> {
    if raw.len() != expected_len + RESPONSE_HEADER_LEN {
        return Err(ProtocolError::UnexpectedLength {
            expected: expected_len + RESPONSE_HEADER_LEN,
            got: raw.len(),
        });
    }
    Ok(&raw[RESPONSE_HEADER_LEN..])
}

/// Check the single byte a write is answered with.
pub fn decode_ack(raw: &[u8]) -> Result<(), ProtocolError> {
    match raw {
        [ACK] => Ok(()),
        [other] => Err(ProtocolError::BadAck(*other)),
        _ => Err(ProtocolError::UnexpectedLength { expected: 1, got: raw.len() }),
    }
}
