//! A programmer with a cartridge plugged in, simulated down to the clock
//! chip's serial lines.
#![allow(dead_code)]

use rtcld_core::Transport;
use rtcld_core::error::TransportError;
use rtcld_core::frame::{ACK, Frame, Opcode};
use rtcld_core::gpio::{GPIO_CONTROL, GPIO_DATA, GPIO_READ_ENABLE};

const SCK: u16 = 0b001;
const SIO: u16 = 0b010;
const CS: u16 = 0b100;

const ROM_SIZE: usize = 0x200;

pub const RESET_REGISTERS: [u8; 7] = [0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00];

/// Events on the data lines, as seen by the chip.
#[derive(Debug, PartialEq)]
enum LineEvent {
    SelectRisingEdge,
    SelectFallingEdge,
    ClockRisingEdge,
    None,
}

fn line_event(before: u16, after: u16) -> LineEvent {
    let changed = before ^ after;

    if changed & CS != 0 {
        if after & CS != 0 { LineEvent::SelectRisingEdge } else { LineEvent::SelectFallingEdge }
    } else if after & CS != 0 && after & SCK != 0 && changed & SCK != 0 {
        LineEvent::ClockRisingEdge
    } else {
        LineEvent::None
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Command { shift: u8, bits: u8 },
    Write { command: u8, buf: Vec<u8>, byte: u8, bits: u8 },
    Read { out: Vec<u8>, bit: usize },
    Done,
}

/// S-3511 style clock chip.
#[derive(Debug, Clone)]
pub struct S3511 {
    pub registers: [u8; 7],
    pub status: u8,
    pub alarm: [u8; 2],
    /// Every command byte the chip latched, in order.
    pub commands: Vec<u8>,
    /// Every byte written to the status register, before masking.
    pub status_writes: Vec<u8>,
    phase: Phase,
    sio_out: bool,
}

impl S3511 {
    pub fn new(registers: [u8; 7], status: u8) -> Self {
        Self {
            registers,
            status,
            alarm: [0, 0],
            commands: Vec::new(),
            status_writes: Vec::new(),
            phase: Phase::Idle,
            sio_out: false,
        }
    }

    fn reset(&mut self) {
        self.registers = RESET_REGISTERS;
        self.status = 0;
        self.alarm = [0, 0];
    }

    fn on_lines(&mut self, before: u16, after: u16) {
        match line_event(before, after) {
            LineEvent::SelectRisingEdge => self.phase = Phase::Command { shift: 0, bits: 0 },
            LineEvent::SelectFallingEdge => {
                self.phase = Phase::Idle;
                self.sio_out = false;
            }
            LineEvent::ClockRisingEdge => self.clock(after & SIO != 0),
            LineEvent::None => {}
        }
    }

    fn clock(&mut self, sio_in: bool) {
        match &mut self.phase {
            Phase::Command { shift, bits } => {
                // commands arrive MSB first
                *shift = (*shift << 1) | sio_in as u8;
                *bits += 1;
                if *bits == 8 {
                    let command = *shift;
                    self.start(command);
                }
            }
            Phase::Write { byte, bits, buf, .. } => {
                // data arrives LSB first
                *byte |= (sio_in as u8) << *bits;
                *bits += 1;
                if *bits == 8 {
                    buf.push(*byte);
                    *byte = 0;
                    *bits = 0;
                }
                self.maybe_commit();
            }
            Phase::Read { out, bit } => {
                self.sio_out = out.get(*bit / 8).is_some_and(|&b| b >> (*bit % 8) & 1 == 1);
                *bit += 1;
            }
            Phase::Idle | Phase::Done => {}
        }
    }

    fn start(&mut self, command: u8) {
        self.commands.push(command);
        self.phase = match command {
            0x60 => {
                self.reset();
                Phase::Done
            }
            0x62 | 0x64 | 0x66 | 0x68 => Phase::Write { command, buf: Vec::new(), byte: 0, bits: 0 },
            0x63 => Phase::Read { out: vec![self.status], bit: 0 },
            0x65 => Phase::Read { out: self.registers.to_vec(), bit: 0 },
            0x67 => Phase::Read { out: self.registers[4..].to_vec(), bit: 0 },
            0x69 => Phase::Read { out: self.alarm.to_vec(), bit: 0 },
            _ => Phase::Done,
        };
    }

    fn maybe_commit(&mut self) {
        let Phase::Write { command, buf, .. } = &self.phase else { return };
        let needed = match command {
            0x62 => 1,
            0x64 => 7,
            0x66 => 3,
            _ => 2,
        };
        if buf.len() < needed {
            return;
        }

        let (command, buf) = (*command, buf.clone());
        match command {
            0x62 => {
                self.status_writes.push(buf[0]);
                // the power flag is read-only
                self.status = (self.status & 0x80) | (buf[0] & 0x7F);
            }
            0x64 => self.registers.copy_from_slice(&buf),
            0x66 => self.registers[4..].copy_from_slice(&buf),
            _ => self.alarm.copy_from_slice(&buf),
        }
        self.phase = Phase::Done;
    }
}

/// Programmer plus cartridge: ROM, the GPIO port and maybe a clock chip.
#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
    pub chip: Option<S3511>,
    data: u16,
    direction: u16,
    read_enable: u16,
    /// Every frame received, as decoded off the wire.
    pub frames: Vec<Frame>,
}

impl Cartridge {
    pub fn with_rtc(chip: S3511) -> Self {
        Self {
            rom: (0..ROM_SIZE).map(|i| i as u8).collect(),
            chip: Some(chip),
            data: 0,
            direction: 0,
            read_enable: 0,
            frames: Vec::new(),
        }
    }

    /// A working chip in 24-hour mode, just reset.
    pub fn healthy() -> Self {
        Self::with_rtc(S3511::new(RESET_REGISTERS, 0x40))
    }

    pub fn without_rtc() -> Self {
        Self { chip: None, ..Self::healthy() }
    }

    pub fn with_rom(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.rom[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn chip(&self) -> &S3511 {
        self.chip.as_ref().expect("cartridge has no clock")
    }

    pub fn chip_mut(&mut self) -> &mut S3511 {
        self.chip.as_mut().expect("cartridge has no clock")
    }

    pub fn read_enable(&self) -> u16 {
        self.read_enable
    }

    /// ROM-space writes as `(byte address, value)`.
    pub fn port_writes(&self) -> Vec<(u32, u16)> {
        self.frames
            .iter()
            .filter(|f| f.opcode == Opcode::RomWrite)
            .map(|f| (f.address << 1, u16::from_le_bytes([f.payload[0], f.payload[1]])))
            .collect()
    }

    fn data_readback(&self) -> u16 {
        match &self.chip {
            Some(chip) if self.direction & SIO == 0 => (self.data & !SIO) | ((chip.sio_out as u16) << 1),
            _ => self.data,
        }
    }

    fn read_byte(&self, address: usize) -> u8 {
        let mapped = self.read_enable & 1 == 1 && self.chip.is_some();
        let port = GPIO_DATA as usize..GPIO_READ_ENABLE as usize + 2;
        if mapped && port.contains(&address) {
            let register = match (address - GPIO_DATA as usize) / 2 {
                0 => self.data_readback(),
                1 => self.direction,
                _ => self.read_enable,
            };
            register.to_le_bytes()[address & 1]
        } else {
            self.rom.get(address).copied().unwrap_or(0xFF)
        }
    }

    fn write_word(&mut self, word_address: u32, value: u16) {
        match word_address << 1 {
            GPIO_DATA => {
                let before = self.data;
                self.data = value;
                if let Some(chip) = &mut self.chip {
                    chip.on_lines(before, value);
                }
            }
            GPIO_CONTROL => self.direction = value,
            GPIO_READ_ENABLE => self.read_enable = value,
            _ => {}
        }
    }
}

impl Transport for Cartridge {
    fn transact(&mut self, frame: &Frame) -> Result<Vec<u8>, TransportError> {
        // go through the wire format so the codec is exercised both ways
        let frame = Frame::decode(&frame.encode()).expect("programmer received a malformed frame");
        self.frames.push(frame.clone());

        match frame.opcode {
            Opcode::RomWrite => {
                self.write_word(frame.address, u16::from_le_bytes([frame.payload[0], frame.payload[1]]));
                Ok(vec![ACK])
            }
            Opcode::RomRead => {
                let len = frame.requested_len().unwrap_or_default();
                // the firmware halves the address, so odd bytes are dropped
                let start = (frame.address & !1) as usize;
                let mut response = vec![0, 0];
                response.extend((start..start + len).map(|a| self.read_byte(a)));
                Ok(response)
            }
            Opcode::RamWrite => Ok(vec![ACK]),
            Opcode::RamRead => {
                let len = frame.requested_len().unwrap_or_default();
                Ok(vec![0; len + 2])
            }
        }
    }
}

/// Passes frames through until the `fail_at`th (zero-based), which times out.
/// With `sticky`, every later frame times out too.
pub struct Flaky<T> {
    pub inner: T,
    fail_at: usize,
    sticky: bool,
    seen: usize,
}

impl<T> Flaky<T> {
    pub fn once(inner: T, fail_at: usize) -> Self {
        Self { inner, fail_at, sticky: false, seen: 0 }
    }

    pub fn always_from(inner: T, fail_at: usize) -> Self {
        Self { inner, fail_at, sticky: true, seen: 0 }
    }
}

impl<T: Transport> Transport for Flaky<T> {
    fn transact(&mut self, frame: &Frame) -> Result<Vec<u8>, TransportError> {
        let n = self.seen;
        self.seen += 1;
        if n == self.fail_at || (self.sticky && n > self.fail_at) {
            return Err(TransportError::Timeout);
        }
        self.inner.transact(frame)
    }
}
