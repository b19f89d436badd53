//! Byte-stream transport to the cartridge programmer, and the four
//! pass-through commands built on it.

use std::io::{ErrorKind, Read, Write};

use log::trace;

use crate::error::{Result, TransportError};
use crate::frame::{self, Frame, Opcode};

/// Sends one frame and blocks for its complete answer.
///
/// Exactly one response per request. The returned bytes are the raw
/// answer: the ack byte for writes, header plus payload for reads.
pub trait Transport {
    fn transact(&mut self, frame: &Frame) -> core::result::Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transact(&mut self, frame: &Frame) -> core::result::Result<Vec<u8>, TransportError> {
        (**self).transact(frame)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transact(&mut self, frame: &Frame) -> core::result::Result<Vec<u8>, TransportError> {
        (**self).transact(frame)
    }
}

/// [`Transport`] over anything readable and writable, usually a serial port.
///
/// Timeouts are whatever the stream is configured with; an elapsed timeout
/// surfaces as [`TransportError::Timeout`].
pub struct SerialLink<S> {
    stream: S,
}

impl<S: Read + Write> SerialLink<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for SerialLink<S> {
    fn transact(&mut self, frame: &Frame) -> core::result::Result<Vec<u8>, TransportError> {
        let bytes = frame.encode();
        trace!("-> {:02X?}", bytes);
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;

        let expected = frame.response_len();
        let mut response = vec![0u8; expected];
        let mut got = 0;

        while got < expected {
            match self.stream.read(&mut response[got..]) {
                Ok(0) if got == 0 => return Err(TransportError::Closed),
                Ok(0) => return Err(TransportError::ShortRead { expected, got }),
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if got > 0 && e.kind() == ErrorKind::TimedOut => {
                    return Err(TransportError::ShortRead { expected, got });
                }
                Err(e) => return Err(e.into()),
            }
        }

        trace!("<- {:02X?}", response);
        Ok(response)
    }
}

/// A value written through the programmer.
///
/// ROM space is 16 bits wide, cartridge RAM 8 bits; the two pack differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Half(u16),
    Byte(u8),
}

impl Value {
    pub fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Value::Half(v) => v.to_le_bytes().to_vec(),
            Value::Byte(v) => vec![v],
        }
    }
}

/// The programmer's pass-through commands into cartridge address space.
pub struct Programmer<T> {
    transport: T,
}

impl<T: Transport> Programmer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write into ROM space at a word address.
    pub fn write_rom(&mut self, word_address: u32, value: Value) -> Result<()> {
        self.write(Opcode::RomWrite, word_address, value)
    }

    /// Read `len` bytes of ROM space starting at a word address.
    pub fn read_rom(&mut self, word_address: u32, len: u16) -> Result<Vec<u8>> {
        // the firmware halves read addresses itself
        self.read(Opcode::RomRead, word_address << 1, len)
    }

    pub fn write_ram(&mut self, address: u32, value: Value) -> Result<()> {
        self.write(Opcode::RamWrite, address, value)
    }

    pub fn read_ram(&mut self, address: u32, len: u16) -> Result<Vec<u8>> {
        self.read(Opcode::RamRead, address, len)
    }

    fn write(&mut self, opcode: Opcode, address: u32, value: Value) -> Result<()> {
        let request = Frame::new(opcode, address, value.to_le_bytes());
        let raw = self.transport.transact(&request)?;
        frame::decode_ack(&raw)?;
        Ok(())
    }

    fn read(&mut self, opcode: Opcode, address: u32, len: u16) -> Result<Vec<u8>> {
        let request = Frame::read(opcode, address, len);
        let raw = self.transport.transact(&request)?;
        Ok(frame::decode_response(&raw, len as usize)?.to_vec())
    }
}
