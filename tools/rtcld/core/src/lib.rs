//! Driver for the real-time clock on GBA cartridges, reached through a
//! serial cartridge programmer.
//!
//! Layers, bottom up: [`frame`] and [`transport`] talk to the programmer,
//! [`gpio`] drives the cartridge I/O port through it, [`bitbang`] clocks
//! bytes over the port's three lines, and [`rtc`] runs the chip's commands.

pub mod bcd;
pub mod bitbang;
pub mod config;
pub mod datetime;
pub mod error;
pub mod frame;
pub mod gpio;
pub mod rtc;
pub mod snapshot;
pub mod transport;

pub use config::{HourFlagSource, Pacing, RtcConfig};
pub use datetime::{Alarm, DateTime, Field, PartialDateTime, TimeOfDay};
pub use error::{DataError, ProtocolError, Result, RtcError, TransportError};
pub use rtc::{Command, DetectionResult, Rtc, Status};
pub use snapshot::Snapshot;
pub use transport::{SerialLink, Transport};
