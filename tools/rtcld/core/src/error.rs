use core::fmt;
use std::io;

use crate::datetime::Field;

/// Failures of the byte stream underneath the programmer protocol.
#[derive(Debug)]
pub enum TransportError {
    /// The configured read timeout elapsed before the response was complete.
    Timeout,
    /// The stream ended while a response was still outstanding.
    Closed,
    /// Fewer bytes arrived than the request called for.
    ShortRead { expected: usize, got: usize },
    Io(io::Error),
}

/// The programmer answered, but not with what the request called for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    UnexpectedLength { expected: usize, got: usize },
    /// A write was answered with something other than the ack byte.
    BadAck(u8),
    /// A request frame could not be parsed.
    MalformedFrame(&'static str),
    UnknownOpcode(u8),
}

/// Register contents that cannot be turned into calendar fields, or vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// One of the nibbles of a packed BCD byte is above 9.
    BcdNibble { field: Field, raw: u8 },
    OutOfRange { field: Field, value: u32 },
    /// A value above 99 was handed to the BCD encoder.
    Unencodable(u8),
    SnapshotLength(usize),
}

#[derive(Debug)]
pub enum RtcError {
    Transport(TransportError),
    Protocol(ProtocolError),
    Data(DataError),
}

pub type Result<T> = core::result::Result<T, RtcError>;

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "timed out waiting for the programmer"),
            TransportError::Closed => write!(f, "serial stream closed"),
            TransportError::ShortRead { expected, got } => {
                write!(f, "short read: expected {} bytes, got {}", expected, got)
            }
            TransportError::Io(e) => write!(f, "serial I/O failed: {}", e),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedLength { expected, got } => {
                write!(f, "unexpected response length: expected {} bytes, got {}", expected, got)
            }
            ProtocolError::BadAck(b) => write!(f, "expected ack 0xAA, got 0x{:02X}", b),
            ProtocolError::MalformedFrame(why) => write!(f, "malformed frame: {}", why),
            ProtocolError::UnknownOpcode(op) => write!(f, "unknown opcode 0x{:02X}", op),
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::BcdNibble { field, raw } => {
                write!(f, "{} register holds invalid BCD 0x{:02X}", field, raw)
            }
            DataError::OutOfRange { field, value } => {
                write!(f, "{} value {} is out of range", field, value)
            }
            DataError::Unencodable(v) => write!(f, "{} does not fit in two BCD digits", v),
            DataError::SnapshotLength(len) => {
                write!(f, "snapshot must be 16 bytes, got {}", len)
            }
        }
    }
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtcError::Transport(e) => write!(f, "transport error: {}", e),
            RtcError::Protocol(e) => write!(f, "protocol error: {}", e),
            RtcError::Data(e) => write!(f, "data error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}
impl std::error::Error for DataError {}

impl std::error::Error for RtcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RtcError::Transport(e) => Some(e),
            RtcError::Protocol(e) => Some(e),
            RtcError::Data(e) => Some(e),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Io(e),
        }
    }
}

impl From<TransportError> for RtcError {
    fn from(e: TransportError) -> Self {
        RtcError::Transport(e)
    }
}

impl From<ProtocolError> for RtcError {
    fn from(e: ProtocolError) -> Self {
        RtcError::Protocol(e)
    }
}

impl From<DataError> for RtcError {
    fn from(e: DataError) -> Self {
        RtcError::Data(e)
    }
}

impl From<io::Error> for RtcError {
    fn from(e: io::Error) -> Self {
        RtcError::Transport(e.into())
    }
}
