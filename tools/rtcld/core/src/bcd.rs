//! Packed binary-coded decimal, two digits per byte.

use crate::error::DataError;

/// PM flag of the hour register.
pub const PM_FLAG: u8 = 0x80;

pub fn encode(value: u8) -> Result<u8, DataError> {
    if value > 99 {
        return Err(DataError::Unencodable(value));
    }
    Ok((value / 10) << 4 | value % 10)
}

/// `None` if either nibble is not a decimal digit.
pub fn decode(raw: u8) -> Option<u8> {
    let (tens, units) = (raw >> 4 & 0x0F, raw & 0x0F);
    if tens > 9 || units > 9 {
        return None;
    }
    Some(tens * 10 + units)
}

/// Encode an hour, setting the PM flag from noon on.
pub fn encode_hour(hour: u8) -> Result<u8, DataError> {
    let raw = encode(hour)?;
    Ok(if hour >= 12 { raw | PM_FLAG } else { raw })
}

pub fn decode_hour(raw: u8) -> Option<u8> {
    decode(raw & !PM_FLAG)
}
