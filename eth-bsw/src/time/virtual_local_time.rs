use core::{fmt::Display, ops::Sub};

use super::{Duration, TimeError};
use crate::datastructures::common::WireTimestamp;

/// A reading of the local monotonic clock of the time-base manager, in
/// nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct VirtualLocalTime(u64);

impl VirtualLocalTime {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn nanos(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let nanos = i128::from(self.0) + i128::from(duration.nanos());
        u64::try_from(nanos).ok().map(Self)
    }

    /// Signed difference `self - earlier`, saturating at the bounds of
    /// [`Duration`].
    pub fn duration_since(self, earlier: Self) -> Duration {
        let nanos = i128::from(self.0) - i128::from(earlier.0);
        Duration::from_nanos(nanos.clamp(i64::MIN.into(), i64::MAX.into()) as i64)
    }
}

impl Sub for VirtualLocalTime {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl From<VirtualLocalTime> for WireTimestamp {
    fn from(time: VirtualLocalTime) -> Self {
        WireTimestamp {
            seconds: time.0 / 1_000_000_000,
            nanos: (time.0 % 1_000_000_000) as u32,
        }
    }
}

impl TryFrom<WireTimestamp> for VirtualLocalTime {
    type Error = TimeError;

    /// Interprets a hardware timestamp, which counts on the local clock, as
    /// a virtual local time.
    fn try_from(ts: WireTimestamp) -> Result<Self, Self::Error> {
        if !ts.is_valid() {
            return Err(TimeError::InvalidTimestamp);
        }
        ts.seconds
            .checked_mul(1_000_000_000)
            .and_then(|n| n.checked_add(u64::from(ts.nanos)))
            .map(Self)
            .ok_or(TimeError::Overflow)
    }
}

impl Display for VirtualLocalTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", WireTimestamp::from(*self))
    }
}
