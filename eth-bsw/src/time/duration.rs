//! Implementation of the [Duration] type

use core::{
    fmt::Display,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

use crate::datastructures::common::TimeInterval;

/// A signed span of time with nanosecond resolution.
///
/// The difference between two timestamps is a duration, and a timestamp
/// plus a duration is another timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration { nanos: 0 };

    /// Create an instance with the given amount of seconds
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs.saturating_mul(1_000_000_000),
        }
    }

    /// Create an instance with the given amount of milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    /// Create an instance with the given amount of nanoseconds
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Get the total amount of nanoseconds
    pub const fn nanos(&self) -> i64 {
        self.nanos
    }

    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    pub fn abs(self) -> Duration {
        Duration {
            nanos: self.nanos.saturating_abs(),
        }
    }

    /// Checked conversion from a wide nanosecond count.
    pub fn try_from_nanos_i128(nanos: i128) -> Option<Self> {
        i64::try_from(nanos).ok().map(Self::from_nanos)
    }
}

impl From<TimeInterval> for Duration {
    fn from(interval: TimeInterval) -> Self {
        Self::from_nanos(interval.nanos())
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_neg(),
        }
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_add(rhs.nanos),
        }
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_sub(rhs.nanos),
        }
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Self::Output {
        Duration {
            nanos: self.nanos.saturating_mul(rhs),
        }
    }
}

impl Div<i64> for Duration {
    type Output = Duration;

    fn div(self, rhs: i64) -> Self::Output {
        Duration {
            nanos: self.nanos / rhs,
        }
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ns", self.nanos)
    }
}
