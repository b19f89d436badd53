//! The clock chip's command set, one bit-banged transaction per command.

mod detect;
mod status;

pub use detect::DetectionResult;
pub use status::Status;

use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::bitbang::BitBang;
use crate::config::RtcConfig;
use crate::datetime::{Alarm, DateTime, PartialDateTime, REGISTER_LEN, Registers, TimeOfDay};
use crate::error::Result;
use crate::gpio::{GPIO_CONTROL, GPIO_DATA, GPIO_READ_ENABLE, GpioPort, Lines};
use crate::snapshot::Snapshot;
use crate::transport::Transport;

/// Command bytes. Reads have the low bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Reset = 0x60,
    WriteStatus = 0x62,
    ReadStatus = 0x63,
    WriteDate = 0x64,
    ReadDate = 0x65,
    WriteTime = 0x66,
    ReadTime = 0x67,
    WriteAlarm = 0x68,
    ReadAlarm = 0x69,
}

impl Command {
    /// Data bytes clocked after the command byte, either way.
    pub const fn payload_len(self) -> usize {
        match self {
            Command::Reset => 0,
            Command::WriteStatus | Command::ReadStatus => 1,
            Command::WriteDate | Command::ReadDate => REGISTER_LEN,
            Command::WriteTime | Command::ReadTime => 3,
            Command::WriteAlarm | Command::ReadAlarm => 2,
        }
    }

    pub const fn is_read(self) -> bool {
        self as u8 & 1 == 1
    }
}

/// Driver for the clock chip behind a programmer.
///
/// Owns the transport for its whole life, so transactions never interleave.
/// The last registers read are cached until the next write.
pub struct Rtc<T> {
    port: GpioPort<T>,
    config: RtcConfig,
    registers: Option<Registers>,
    snapshot: Option<Snapshot>,
}

impl<T: Transport> Rtc<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RtcConfig::default())
    }

    pub fn with_config(transport: T, config: RtcConfig) -> Self {
        Self {
            port: GpioPort::new(transport, config.pacing),
            config,
            registers: None,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &RtcConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.port.into_inner()
    }

    /// Raw date-time registers from the last read, if nothing was written since.
    pub fn cached_registers(&self) -> Option<&Registers> {
        self.registers.as_ref()
    }

    /// The last [`capture`](Rtc::capture), if nothing was written since.
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// 24-hour flag of the last capture, taken from the byte
    /// [`RtcConfig::hour_flag_source`] names.
    pub fn cached_is_24_hour(&self) -> Option<bool> {
        self.snapshot.as_ref().map(|s| s.is_24_hour(self.config.hour_flag_source))
    }

    /// Zero every register, status included.
    pub fn reset(&mut self) -> Result<()> {
        self.invalidate();
        self.transaction(Command::Reset, &[])?;
        Ok(())
    }

    pub fn read_status(&mut self) -> Result<Status> {
        let data = self.transaction(Command::ReadStatus, &[])?;
        Ok(Status::from_bits_retain(data[0]))
    }

    pub fn write_status(&mut self, status: Status) -> Result<()> {
        self.invalidate();
        self.transaction(Command::WriteStatus, &[status.bits()])?;
        Ok(())
    }

    /// Read the seven date-time registers undecoded.
    pub fn read_registers(&mut self) -> Result<Registers> {
        let data = self.transaction(Command::ReadDate, &[])?;
        let mut registers = [0u8; REGISTER_LEN];
        registers.copy_from_slice(&data);
        self.registers = Some(registers);
        Ok(registers)
    }

    /// Read date and time. Fields that fail to decode are logged and left
    /// out rather than failing the read.
    pub fn read_date_time(&mut self) -> Result<PartialDateTime> {
        let registers = self.read_registers()?;
        let date_time = PartialDateTime::decode(&registers);
        for e in &date_time.errors {
            warn!("skipping field: {}", e);
        }
        Ok(date_time)
    }

    /// Write date and time. Every field is checked before the chip is touched.
    pub fn write_date_time(&mut self, date_time: &DateTime) -> Result<()> {
        let registers = date_time.to_registers()?;
        self.invalidate();
        self.transaction(Command::WriteDate, &registers)?;
        Ok(())
    }

    pub fn read_time(&mut self) -> Result<TimeOfDay> {
        let data = self.transaction(Command::ReadTime, &[])?;
        Ok(TimeOfDay::from_registers(&[data[0], data[1], data[2]])?)
    }

    pub fn write_time(&mut self, time: &TimeOfDay) -> Result<()> {
        let registers = time.to_registers()?;
        self.invalidate();
        self.transaction(Command::WriteTime, &registers)?;
        Ok(())
    }

    pub fn read_alarm(&mut self) -> Result<Alarm> {
        let data = self.transaction(Command::ReadAlarm, &[])?;
        Ok(Alarm::from_registers(&[data[0], data[1]])?)
    }

    pub fn write_alarm(&mut self, alarm: &Alarm) -> Result<()> {
        let registers = alarm.to_registers()?;
        self.transaction(Command::WriteAlarm, &registers)?;
        Ok(())
    }

    /// Read registers and status, stamped with the host clock.
    pub fn capture(&mut self) -> Result<Snapshot> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.capture_at(now)
    }

    pub fn capture_at(&mut self, timestamp: u64) -> Result<Snapshot> {
        let registers = self.read_registers()?;
        let status = self.read_status()?;
        let snapshot = Snapshot::new(registers, status.bits(), timestamp);
        self.snapshot = Some(snapshot);
        Ok(snapshot)
    }

    /// Write a snapshot back: date-time first, then status.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        let (date_time, status) = snapshot.restore_values()?;
        debug!("restoring {} with status {:02X}", date_time, status.bits());
        self.write_date_time(&date_time)?;
        self.write_status(status)
    }

    /// Reset a chip whose backup supply failed and put it in 24-hour mode.
    ///
    /// Returns the status as found.
    pub fn recover_power_loss(&mut self) -> Result<Status> {
        let status = self.read_status()?;
        if status.power_lost() {
            warn!("clock lost power, resetting");
            self.reset()?;
            self.write_status(Status::HOUR_24)?;
        }
        Ok(status)
    }

    /// Set the clock from a UNIX time. Status is left alone.
    pub fn sync_to(&mut self, unix_secs: u64) -> Result<DateTime> {
        let date_time = DateTime::from_unix(unix_secs)?;
        self.write_date_time(&date_time)?;
        Ok(date_time)
    }

    fn invalidate(&mut self) {
        self.registers = None;
        self.snapshot = None;
    }

    /// Run one command inside the open/close envelope.
    ///
    /// Reads return the bytes clocked in; writes return nothing. If anything
    /// fails after opening, closing is still attempted and the first error wins.
    fn transaction(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>> {
        debug_assert!(command.is_read() || payload.len() == command.payload_len());
        debug!("rtc {:?} {:02X?}", command, payload);

        let result = self.open().and_then(|()| self.exchange(command, payload));
        match result {
            Ok(data) => {
                self.close()?;
                if command.is_read() {
                    debug!("rtc {:?} -> {:02X?}", command, data);
                }
                Ok(data)
            }
            Err(e) => {
                if let Err(close) = self.close() {
                    warn!("closing after failed {:?}: {}", command, close);
                }
                Err(e)
            }
        }
    }

    fn open(&mut self) -> Result<()> {
        self.port.write_all(&[
            (GPIO_READ_ENABLE, 1),
            // CS low then high starts a session
            (GPIO_DATA, Lines::SCK.bits()),
            (GPIO_DATA, (Lines::SCK | Lines::CS).bits()),
            (GPIO_CONTROL, Lines::ALL_OUTPUT.bits()),
        ])
    }

    fn exchange(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>> {
        BitBang::new(&mut self.port).send_command(command as u8)?;

        if command.is_read() {
            self.port.set_direction(Lines::SIO_INPUT)?;
            let mut bus = BitBang::new(&mut self.port);
            (0..command.payload_len()).map(|_| bus.read_byte()).collect()
        } else {
            let mut bus = BitBang::new(&mut self.port);
            for &byte in payload {
                bus.write_byte(byte)?;
            }
            Ok(Vec::new())
        }
    }

    fn close(&mut self) -> Result<()> {
        self.port.write_all(&[
            (GPIO_DATA, Lines::SCK.bits()),
            (GPIO_DATA, Lines::SCK.bits()),
            (GPIO_READ_ENABLE, 0),
        ])
    }
}
