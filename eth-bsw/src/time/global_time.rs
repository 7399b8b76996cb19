use core::fmt::Display;

use super::{Duration, TimeError};
use crate::datastructures::common::WireTimestamp;

/// Status bits of a time base, as maintained by the time-base manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TimeBaseStatus(u8);

impl TimeBaseStatus {
    pub const TIMEOUT: Self = Self(0x01);
    pub const SYNC_TO_GATEWAY: Self = Self(0x04);
    pub const GLOBAL_TIME_BASE: Self = Self(0x08);
    pub const TIMELEAP_FUTURE: Self = Self(0x10);
    pub const TIMELEAP_PAST: Self = Self(0x20);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A point on a synchronized time base together with its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct GlobalTime {
    pub status: TimeBaseStatus,
    pub timestamp: WireTimestamp,
}

impl GlobalTime {
    pub fn new(status: TimeBaseStatus, timestamp: WireTimestamp) -> Self {
        Self { status, timestamp }
    }

    /// Shift the time by a (possibly negative) duration, keeping the status.
    pub fn checked_add(self, duration: Duration) -> Result<Self, TimeError> {
        let nanos = self.timestamp.total_nanos() + i128::from(duration.nanos());
        Ok(Self {
            status: self.status,
            timestamp: WireTimestamp::from_total_nanos(nanos).ok_or(TimeError::Overflow)?,
        })
    }
}

impl Display for GlobalTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (status {:#04x})", self.timestamp, self.status.0)
    }
}
