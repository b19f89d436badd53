use bitflags::bitflags;

bitflags! {
    /// Status register of the clock chip.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Supply dropped below the backup threshold; the time is not to be trusted.
        /// Cleared by a reset.
        const POWER_LOST = 0b1000_0000;
        /// Hours count 0-23 instead of 1-12 with a PM flag.
        const HOUR_24    = 0b0100_0000;
        /// Alarm interrupt enable.
        const INTAE      = 0b0010_0000;
        /// Per-minute interrupt enable.
        const INTME      = 0b0000_1000;
        /// Frequency interrupt enable.
        const INTFE      = 0b0000_0010;
    }
}

impl Status {
    pub fn power_lost(self) -> bool {
        self.contains(Status::POWER_LOST)
    }

    pub fn is_24_hour(self) -> bool {
        self.contains(Status::HOUR_24)
    }
}
