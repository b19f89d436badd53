//! Cartridge GPIO port, reached through ROM-space pass-through.
//!
//! The GPIO block sits in ROM address space. While read-enable is clear,
//! reads of these addresses return plain ROM contents; while it is set they
//! return the live port state.

use bitflags::bitflags;
use log::trace;

use crate::config::Pacing;
use crate::error::Result;
use crate::transport::{Programmer, Transport, Value};

/// I/O port data (byte address).
pub const GPIO_DATA: u32 = 0xC4;
/// I/O port direction: a set bit drives the line, a clear bit reads it.
pub const GPIO_CONTROL: u32 = 0xC6;
/// Maps the port over ROM when set to 1.
pub const GPIO_READ_ENABLE: u32 = 0xC8;

bitflags! {
    /// Lines of the GPIO port wired to the RTC.
    ///
    /// Used both for the data register and for the direction register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Lines: u16 {
        /// Serial clock.
        const SCK = 0b0000_0001;
        /// Serial data in/out.
        const SIO = 0b0000_0010;
        /// Chip select, active high.
        const CS  = 0b0000_0100;
    }
}

impl Lines {
    /// Direction with every line driven by the host.
    pub const ALL_OUTPUT: Lines = Lines::all();
    /// Direction with SIO released so the chip can drive it.
    pub const SIO_INPUT: Lines = Lines::SCK.union(Lines::CS);
}

/// Reads and writes the three port registers.
///
/// Addresses are byte addresses; they are halved here before going out as
/// ROM-space word addresses. Register writes are always full 16-bit values.
pub struct GpioPort<T> {
    programmer: Programmer<T>,
    pacing: Pacing,
}

impl<T: Transport> GpioPort<T> {
    pub fn new(transport: T, pacing: Pacing) -> Self {
        Self { programmer: Programmer::new(transport), pacing }
    }

    pub fn into_inner(self) -> T {
        self.programmer.into_inner()
    }

    /// Read a 16-bit register.
    pub fn read(&mut self, byte_address: u32) -> Result<u16> {
        let bytes = self.programmer.read_rom(byte_address >> 1, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read `len` raw bytes starting at `byte_address`.
    pub fn read_bytes(&mut self, byte_address: u32, len: u16) -> Result<Vec<u8>> {
        self.programmer.read_rom(byte_address >> 1, len)
    }

    pub fn write(&mut self, byte_address: u32, value: u16) -> Result<()> {
        trace!("gpio ${:02X} <- {:03b}", byte_address, value);
        self.programmer.write_rom(byte_address >> 1, Value::Half(value))?;
        self.pacing.pause();
        Ok(())
    }

    /// Write a sequence of `(byte_address, value)` pairs in order.
    pub fn write_all(&mut self, writes: &[(u32, u16)]) -> Result<()> {
        for &(address, value) in writes {
            self.write(address, value)?;
        }
        Ok(())
    }

    pub fn write_data(&mut self, lines: Lines) -> Result<()> {
        self.write(GPIO_DATA, lines.bits())
    }

    pub fn read_data(&mut self) -> Result<Lines> {
        Ok(Lines::from_bits_truncate(self.read(GPIO_DATA)?))
    }

    pub fn set_direction(&mut self, direction: Lines) -> Result<()> {
        self.write(GPIO_CONTROL, direction.bits())
    }

    pub fn set_mapping(&mut self, enabled: bool) -> Result<()> {
        self.write(GPIO_READ_ENABLE, enabled as u16)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::TransportError;
    use crate::frame::{ACK, Frame, Opcode};

    #[derive(Default)]
    struct Log {
        frames: Vec<Frame>,
    }

    impl Transport for Log {
        fn transact(&mut self, frame: &Frame) -> core::result::Result<Vec<u8>, TransportError> {
            self.frames.push(frame.clone());
            Ok(match frame.requested_len() {
                Some(n) => {
                    let mut r = vec![0, 0];
                    r.extend((0..n).map(|i| 0x10 + i as u8));
                    r
                }
                None => vec![ACK],
            })
        }
    }

    #[test]
    fn direction_presets() {
        assert_eq!(Lines::ALL_OUTPUT.bits(), 7);
        assert_eq!(Lines::SIO_INPUT.bits(), 5);
    }

    #[test]
    fn writes_halve_the_address() {
        let mut port = GpioPort::new(Log::default(), Pacing::None);
        port.write_all(&[(GPIO_READ_ENABLE, 1), (GPIO_DATA, 5), (GPIO_CONTROL, 7)]).unwrap();

        let frames = port.into_inner().frames;
        let addresses: Vec<_> = frames.iter().map(|f| f.address).collect();
        assert_eq!(addresses, [0x64, 0x62, 0x63]);
        assert!(frames.iter().all(|f| f.opcode == Opcode::RomWrite && f.payload.len() == 2));
        assert_eq!(frames[1].payload, [5, 0]);
    }

    #[test]
    fn register_reads_are_little_endian() {
        let mut port = GpioPort::new(Log::default(), Pacing::None);
        assert_eq!(port.read(GPIO_DATA).unwrap(), 0x1110);
        assert_eq!(port.read_bytes(GPIO_DATA, 6).unwrap(), [0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);

        let frames = port.into_inner().frames;
        assert!(frames.iter().all(|f| f.opcode == Opcode::RomRead && f.address == GPIO_DATA));
    }

    static PAUSES: AtomicUsize = AtomicUsize::new(0);

    fn count_pause() {
        PAUSES.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn hook_runs_after_every_write() {
        let mut port = GpioPort::new(Log::default(), Pacing::Hook(count_pause));
        port.write_all(&[(GPIO_READ_ENABLE, 1), (GPIO_DATA, 5), (GPIO_CONTROL, 7)]).unwrap();
        port.read(GPIO_DATA).unwrap();

        assert_eq!(PAUSES.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn fixed_pacing_sleeps_after_every_write() {
        let mut port = GpioPort::new(Log::default(), Pacing::Fixed(Duration::from_millis(5)));
        let start = Instant::now();
        port.write_all(&[(GPIO_DATA, 1), (GPIO_DATA, 5), (GPIO_DATA, 1)]).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(port.into_inner().frames.len(), 3);
    }

    #[test]
    fn data_reads_keep_only_port_lines() {
        let mut port = GpioPort::new(Log::default(), Pacing::None);
        // 0x1110: SCK clear, SIO clear, CS clear in the low bits, junk above
        assert_eq!(port.read_data().unwrap(), Lines::empty());
    }
}
