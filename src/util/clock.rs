use time::{Date, OffsetDateTime, UtcOffset};

/// Source of the local calendar date used by date-scoped cache keys.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}

/// Wall clock shifted into a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> Date {
        localized_date(OffsetDateTime::now_utc(), self.offset)
    }
}

/// Clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}

pub fn localized_date(time: OffsetDateTime, offset: UtcOffset) -> Date {
    time.to_offset(offset).date()
}
