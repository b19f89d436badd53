//! Serial transfers to the RTC, one GPIO register access per line change.
//!
//! Commands go out MSB first; data bytes go both ways LSB first. Every data
//! register write keeps CS high, since dropping it mid-transfer resets the
//! chip's shift register.

use bit_field::BitField;

use crate::error::Result;
use crate::gpio::{GpioPort, Lines};
use crate::transport::Transport;

/// Writes with SCK low before the rising edge, per bit sent.
const SETTLE_WRITES: usize = 3;
/// Writes with SCK low before the rising edge, per bit read. The chip needs
/// longer to put SIO on the line than to latch it.
const READ_SETTLE_WRITES: usize = 5;

pub struct BitBang<'a, T> {
    port: &'a mut GpioPort<T>,
}

impl<'a, T: Transport> BitBang<'a, T> {
    pub fn new(port: &'a mut GpioPort<T>) -> Self {
        Self { port }
    }

    /// Shift out a command byte, MSB first.
    pub fn send_command(&mut self, command: u8) -> Result<()> {
        for i in 0..8 {
            self.clock_out(command.get_bit(7 - i))?;
        }
        Ok(())
    }

    /// Shift in a data byte, LSB first.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = 0u8;
        for _ in 0..8 {
            for _ in 0..READ_SETTLE_WRITES {
                self.port.write_data(Lines::CS)?;
            }
            self.port.write_data(Lines::CS | Lines::SCK)?;

            let sio = self.port.read_data()?.contains(Lines::SIO);
            byte = (byte >> 1) | ((sio as u8) << 7);
        }
        Ok(byte)
    }

    /// Shift out a data byte, LSB first.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        for i in 0..8 {
            self.clock_out(byte.get_bit(i))?;
        }
        Ok(())
    }

    fn clock_out(&mut self, bit: bool) -> Result<()> {
        let sio = if bit { Lines::SIO } else { Lines::empty() };
        for _ in 0..SETTLE_WRITES {
            self.port.write_data(Lines::CS | sio)?;
        }
        self.port.write_data(Lines::CS | Lines::SCK | sio)
    }
}
