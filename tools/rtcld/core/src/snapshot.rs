//! The 16-byte capture of the clock kept in backup files.
//!
//! Layout: the seven date-time registers as read, the status register, and
//! the host UNIX time of the capture as a little-endian `u64`.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::HourFlagSource;
use crate::datetime::{DateTime, PartialDateTime, REGISTER_LEN, Registers};
use crate::error::DataError;
use crate::rtc::Status;

pub const SNAPSHOT_LEN: usize = REGISTER_LEN + 1 + 8;

const STATUS_OFFSET: usize = REGISTER_LEN;
const TIMESTAMP_OFFSET: usize = REGISTER_LEN + 1;

/// Status byte written by older tools to mean "24-hour mode".
const LEGACY_24_HOUR: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub registers: Registers,
    pub status: u8,
    /// Seconds since the UNIX epoch, host clock.
    pub timestamp: u64,
}

impl Snapshot {
    pub fn new(registers: Registers, status: u8, timestamp: u64) -> Self {
        Self { registers, status, timestamp }
    }

    pub fn to_bytes(&self) -> [u8; SNAPSHOT_LEN] {
        let mut bytes = [0u8; SNAPSHOT_LEN];
        bytes[..REGISTER_LEN].copy_from_slice(&self.registers);
        bytes[STATUS_OFFSET] = self.status;
        bytes[TIMESTAMP_OFFSET..].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DataError> {
        let bytes: &[u8; SNAPSHOT_LEN] =
            bytes.try_into().map_err(|_| DataError::SnapshotLength(bytes.len()))?;

        let mut registers = [0u8; REGISTER_LEN];
        registers.copy_from_slice(&bytes[..REGISTER_LEN]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[TIMESTAMP_OFFSET..]);

        Ok(Self {
            registers,
            status: bytes[STATUS_OFFSET],
            timestamp: u64::from_le_bytes(timestamp),
        })
    }

    /// Erased save memory reads back as all ones.
    pub fn is_blank(&self) -> bool {
        self.to_bytes().iter().all(|&b| b == 0xFF)
    }

    pub fn date_time(&self) -> PartialDateTime {
        PartialDateTime::decode(&self.registers)
    }

    /// Date-time and status to write back to the chip.
    ///
    /// A blank snapshot restores the reset date in 24-hour mode with the
    /// power-lost flag raised, so the next detection reports it.
    pub fn restore_values(&self) -> Result<(DateTime, Status), DataError> {
        if self.is_blank() {
            return Ok((DateTime::RESET, Status::POWER_LOST | Status::HOUR_24));
        }

        let date_time = DateTime::from_registers(&self.registers)?;
        let status = match self.status {
            LEGACY_24_HOUR => Status::HOUR_24,
            raw => Status::from_bits_retain(raw),
        };
        Ok((date_time, status))
    }

    /// Re-derive the 24-hour flag (bit 6) from the stored bytes.
    pub fn is_24_hour(&self, source: HourFlagSource) -> bool {
        let index = match source {
            HourFlagSource::Status => STATUS_OFFSET,
            HourFlagSource::Leading => 0,
        };
        Status::from_bits_retain(self.to_bytes()[index]).contains(Status::HOUR_24)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }

    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::new([0x24, 0x03, 0x15, 0x05, 0x94, 0x30, 0x45], 0x40, 1_710_513_045)
    }

    #[test]
    fn layout_is_registers_status_timestamp() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..7], [0x24, 0x03, 0x15, 0x05, 0x94, 0x30, 0x45]);
        assert_eq!(bytes[7], 0x40);
        assert_eq!(&bytes[8..], 1_710_513_045u64.to_le_bytes());
        assert_eq!(Snapshot::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(Snapshot::from_bytes(&[0; 15]), Err(DataError::SnapshotLength(15)));
        assert_eq!(Snapshot::from_bytes(&[0; 17]), Err(DataError::SnapshotLength(17)));
    }

    #[test]
    fn blank_snapshot_restores_reset_values() {
        let blank = Snapshot::from_bytes(&[0xFF; 16]).unwrap();
        assert!(blank.is_blank());

        let (date_time, status) = blank.restore_values().unwrap();
        assert_eq!(date_time, DateTime { year: 0, month: 1, day: 1, weekday: 0, hour: 0, minute: 0, second: 0 });
        assert_eq!(status.bits(), 0xC0);
    }

    #[test]
    fn legacy_status_is_upgraded() {
        let old = Snapshot { status: 0x01, ..sample() };
        let (date_time, status) = old.restore_values().unwrap();
        assert_eq!(date_time.hour, 14);
        assert_eq!(status, Status::HOUR_24);
    }

    #[test]
    fn corrupt_registers_refuse_to_restore() {
        let bad = Snapshot { registers: [0x24, 0x13, 0x15, 0x05, 0x94, 0x30, 0x45], ..sample() };
        assert!(bad.restore_values().is_err());
        assert_eq!(bad.date_time().errors.len(), 1);
    }

    #[test]
    fn hour_flag_from_status_byte() {
        assert!(sample().is_24_hour(HourFlagSource::Status));
        let twelve_hour = Snapshot { status: 0x00, ..sample() };
        assert!(!twelve_hour.is_24_hour(HourFlagSource::Status));
    }

    #[test]
    fn hour_flag_from_leading_byte() {
        // year 0x24 has bit 6 clear
        assert!(!sample().is_24_hour(HourFlagSource::Leading));

        let mut leading = sample();
        leading.registers[0] = 0x40;
        leading.status = 0x00;
        assert!(leading.is_24_hour(HourFlagSource::Leading));
        assert!(!leading.is_24_hour(HourFlagSource::Status));
    }

    #[test]
    fn survives_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clock.rtc");

        sample().save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 16);
        assert_eq!(Snapshot::load(&path).unwrap(), sample());

        std::fs::write(&path, [0u8; 3]).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
