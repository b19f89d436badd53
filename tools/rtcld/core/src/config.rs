use std::thread::sleep;
use std::time::Duration;

/// How long to wait after each GPIO register write.
///
/// The programmer is slow enough that no delay is needed in practice; slower
/// adapters can ask for a fixed pause, or supply their own delay.
#[derive(Debug, Clone, Copy, Default)]
pub enum Pacing {
    #[default]
    None,
    Fixed(Duration),
    /// Called after every write in place of sleeping.
    Hook(fn()),
}

impl Pacing {
    pub fn pause(&self) {
        match self {
            Pacing::None => {}
            Pacing::Fixed(d) => sleep(*d),
            Pacing::Hook(delay) => delay(),
        }
    }
}

/// Where the 24-hour flag is read from when it is re-derived from a cached buffer.
///
/// `Status` is byte 7 of the snapshot, the status register. `Leading` reads
/// byte 0 instead, which is where older dumps that put the status byte first
/// keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HourFlagSource {
    #[default]
    Status,
    Leading,
}

#[derive(Debug, Clone, Default)]
pub struct RtcConfig {
    pub pacing: Pacing,
    pub hour_flag_source: HourFlagSource,
    /// Treat a chip that is not in 24-hour mode as untrustworthy during detection.
    pub strict_hour_mode: bool,
}
