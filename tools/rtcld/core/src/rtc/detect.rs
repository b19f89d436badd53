use core::fmt;

use log::{debug, warn};

use super::{Rtc, Status};
use crate::error::Result;
use crate::gpio::GPIO_DATA;
use crate::snapshot::Snapshot;
use crate::transport::Transport;

/// Bytes compared with and without the port mapped over ROM.
const SAMPLE_LEN: u16 = 6;

/// What a check of the cartridge found.
///
/// Everything but `Absent` means a chip answered; only `Present` means its
/// time can be used as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionResult {
    Present,
    /// The backup supply failed; the chip answers but its time is meaningless.
    PowerLost,
    /// The chip is not in 24-hour mode.
    UnexpectedFormat,
    /// Reads back exactly what a previous capture held.
    Unchanged,
    /// Nothing intercepts the port addresses; they read as ROM.
    Absent,
}

impl DetectionResult {
    pub fn is_present(self) -> bool {
        self != DetectionResult::Absent
    }

    pub fn is_trustworthy(self) -> bool {
        self == DetectionResult::Present
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectionResult::Present => "present",
            DetectionResult::PowerLost => "present, power lost",
            DetectionResult::UnexpectedFormat => "present, not in 24-hour mode",
            DetectionResult::Unchanged => "present, unchanged since capture",
            DetectionResult::Absent => "absent",
        })
    }
}

impl<T: Transport> Rtc<T> {
    /// Check for a working clock chip.
    pub fn detect(&mut self) -> Result<DetectionResult> {
        let status = self.read_status()?;
        if let Some(result) = self.classify_status(status) {
            return Ok(result);
        }

        let unmapped = self.port.read_bytes(GPIO_DATA, SAMPLE_LEN)?;
        let mapped = self.read_mapped_sample()?;
        Ok(compare(&unmapped, &mapped, DetectionResult::Absent))
    }

    /// Like [`detect`](Rtc::detect), but judged against an earlier capture
    /// instead of a live status read and mapped sample.
    pub fn detect_against(&mut self, snapshot: &Snapshot) -> Result<DetectionResult> {
        if let Some(result) = self.classify_status(Status::from_bits_retain(snapshot.status)) {
            return Ok(result);
        }

        let unmapped = self.port.read_bytes(GPIO_DATA, SAMPLE_LEN)?;
        Ok(compare(&unmapped, &snapshot.registers[..SAMPLE_LEN as usize], DetectionResult::Unchanged))
    }

    fn classify_status(&self, status: Status) -> Option<DetectionResult> {
        if status.power_lost() {
            return Some(DetectionResult::PowerLost);
        }
        if !status.is_24_hour() {
            warn!("unexpected format: status {:02X} is not in 24-hour mode", status.bits());
            if self.config.strict_hour_mode {
                return Some(DetectionResult::UnexpectedFormat);
            }
        }
        None
    }

    fn read_mapped_sample(&mut self) -> Result<Vec<u8>> {
        self.port.set_mapping(true)?;
        let sample = self.port.read_bytes(GPIO_DATA, SAMPLE_LEN);
        let unmap = self.port.set_mapping(false);
        match (sample, unmap) {
            (Ok(sample), unmap) => unmap.map(|()| sample),
            (Err(e), unmap) => {
                if let Err(unmap) = unmap {
                    warn!("unmapping port after failed read: {}", unmap);
                }
                Err(e)
            }
        }
    }
}

fn compare(a: &[u8], b: &[u8], same: DetectionResult) -> DetectionResult {
    debug!("sample {:02X?} vs {:02X?}", a, b);
    if a == b { same } else { DetectionResult::Present }
}
