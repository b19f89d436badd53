//! Calendar view of the seven date-time registers.

use core::fmt;

use crate::bcd;
use crate::error::DataError;

/// Number of date-time registers, year first.
pub const REGISTER_LEN: usize = 7;

pub type Registers = [u8; REGISTER_LEN];

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Year,
    Month,
    Day,
    Weekday,
    Hour,
    Minute,
    Second,
}

impl Field {
    /// Register order on the wire.
    pub const ALL: [Field; REGISTER_LEN] = [
        Field::Year,
        Field::Month,
        Field::Day,
        Field::Weekday,
        Field::Hour,
        Field::Minute,
        Field::Second,
    ];

    pub const fn min(self) -> u8 {
        match self {
            Field::Month | Field::Day => 1,
            _ => 0,
        }
    }

    pub const fn max(self) -> u8 {
        match self {
            Field::Year => 99,
            Field::Month => 12,
            Field::Day => 31,
            Field::Weekday => 6,
            Field::Hour => 23,
            Field::Minute | Field::Second => 59,
        }
    }

    /// Bits of the register that hold the value; the rest are chip flags
    /// (PM on the hour, test mode on the second) or unused.
    const fn mask(self) -> u8 {
        match self {
            Field::Year => 0xFF,
            Field::Month => 0x1F,
            Field::Day => 0x3F,
            Field::Weekday => 0x07,
            Field::Hour | Field::Minute | Field::Second => 0x7F,
        }
    }

    fn check(self, value: u8) -> Result<u8, DataError> {
        if (self.min()..=self.max()).contains(&value) {
            Ok(value)
        } else {
            Err(DataError::OutOfRange { field: self, value: value as u32 })
        }
    }

    pub fn decode(self, raw: u8) -> Result<u8, DataError> {
        let value = bcd::decode(raw & self.mask())
            .ok_or(DataError::BcdNibble { field: self, raw })?;
        self.check(value)
    }

    pub fn encode(self, value: u8) -> Result<u8, DataError> {
        let value = self.check(value)?;
        match self {
            Field::Hour => bcd::encode_hour(value),
            _ => bcd::encode(value),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Weekday => "weekday",
            Field::Hour => "hour",
            Field::Minute => "minute",
            Field::Second => "second",
        })
    }
}

/// Date and time as kept by the chip: years since 2000, weekday 0 = Sunday,
/// 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// What the chip holds after a reset.
    pub const RESET: DateTime = DateTime {
        year: 0,
        month: 1,
        day: 1,
        weekday: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn get(&self, field: Field) -> u8 {
        match field {
            Field::Year => self.year,
            Field::Month => self.month,
            Field::Day => self.day,
            Field::Weekday => self.weekday,
            Field::Hour => self.hour,
            Field::Minute => self.minute,
            Field::Second => self.second,
        }
    }

    /// Checks every field range, and the day against the length of the month.
    pub fn validate(&self) -> Result<(), DataError> {
        for field in Field::ALL {
            field.check(self.get(field))?;
        }
        if self.day > days_in_month(2000 + self.year as u32, self.month) {
            return Err(DataError::OutOfRange { field: Field::Day, value: self.day as u32 });
        }
        Ok(())
    }

    /// Encode for the write-date command. Nothing is produced unless every field is valid.
    pub fn to_registers(&self) -> Result<Registers, DataError> {
        self.validate()?;
        let mut raw = [0u8; REGISTER_LEN];
        for (slot, field) in raw.iter_mut().zip(Field::ALL) {
            *slot = field.encode(self.get(field))?;
        }
        Ok(raw)
    }

    /// Strict decode: the first bad field fails the whole value.
    pub fn from_registers(raw: &Registers) -> Result<DateTime, DataError> {
        let partial = PartialDateTime::decode(raw);
        match partial.errors.first() {
            Some(e) => Err(e.clone()),
            None => Ok(partial.complete_unchecked()),
        }
    }

    /// Civil date of a UNIX timestamp (UTC). Only 2000-2099 fit the registers.
    pub fn from_unix(secs: u64) -> Result<DateTime, DataError> {
        let days = secs / SECONDS_PER_DAY;
        let time = secs % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(days);

        if !(2000..=2099).contains(&year) {
            return Err(DataError::OutOfRange { field: Field::Year, value: year as u32 });
        }

        Ok(DateTime {
            year: (year - 2000) as u8,
            month,
            day,
            // 1970-01-01 was a Thursday
            weekday: ((days + 4) % 7) as u8,
            hour: (time / 3600) as u8,
            minute: (time / 60 % 60) as u8,
            second: (time % 60) as u8,
        })
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::RESET
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Result of decoding registers that may hold garbage.
///
/// Fields that decoded are kept; every one that did not has an entry in `errors`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDateTime {
    pub fields: [Option<u8>; REGISTER_LEN],
    pub errors: Vec<DataError>,
}

impl PartialDateTime {
    pub fn decode(raw: &Registers) -> Self {
        let mut fields = [None; REGISTER_LEN];
        let mut errors = Vec::new();

        for ((slot, field), byte) in fields.iter_mut().zip(Field::ALL).zip(raw) {
            match field.decode(*byte) {
                Ok(value) => *slot = Some(value),
                Err(e) => errors.push(e),
            }
        }

        Self { fields, errors }
    }

    pub fn get(&self, field: Field) -> Option<u8> {
        self.fields[field as usize]
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn complete(&self) -> Option<DateTime> {
        self.is_complete().then(|| self.complete_unchecked())
    }

    fn complete_unchecked(&self) -> DateTime {
        let get = |field| self.get(field).unwrap_or_default();
        DateTime {
            year: get(Field::Year),
            month: get(Field::Month),
            day: get(Field::Day),
            weekday: get(Field::Weekday),
            hour: get(Field::Hour),
            minute: get(Field::Minute),
            second: get(Field::Second),
        }
    }
}

/// The time registers alone, as carried by the time command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn to_registers(&self) -> Result<[u8; 3], DataError> {
        Ok([
            Field::Hour.encode(self.hour)?,
            Field::Minute.encode(self.minute)?,
            Field::Second.encode(self.second)?,
        ])
    }

    pub fn from_registers(raw: &[u8; 3]) -> Result<TimeOfDay, DataError> {
        Ok(TimeOfDay {
            hour: Field::Hour.decode(raw[0])?,
            minute: Field::Minute.decode(raw[1])?,
            second: Field::Second.decode(raw[2])?,
        })
    }
}

impl From<DateTime> for TimeOfDay {
    fn from(dt: DateTime) -> Self {
        TimeOfDay { hour: dt.hour, minute: dt.minute, second: dt.second }
    }
}

/// Alarm registers: hour then minute, encoded like the time registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alarm {
    pub hour: u8,
    pub minute: u8,
}

impl Alarm {
    pub fn to_registers(&self) -> Result<[u8; 2], DataError> {
        Ok([Field::Hour.encode(self.hour)?, Field::Minute.encode(self.minute)?])
    }

    pub fn from_registers(raw: &[u8; 2]) -> Result<Alarm, DataError> {
        Ok(Alarm {
            hour: Field::Hour.decode(raw[0])?,
            minute: Field::Minute.decode(raw[1])?,
        })
    }
}

fn is_leap(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: u8) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// (year, month, day) for a count of days since 1970-01-01.
fn civil_from_days(days: u64) -> (u64, u8, u8) {
    // eras of 400 years starting on March 1st, 0000
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + (month <= 2) as u64;
    (year, month, day)
}
