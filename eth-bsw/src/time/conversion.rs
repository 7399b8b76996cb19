use super::{Duration, GlobalTime, VirtualLocalTime};
use crate::datastructures::common::WireTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("timestamp is out of the representable range")]
    Overflow,
    #[error("timestamp has a nanosecond field of one second or more")]
    InvalidTimestamp,
}

/// A simultaneous reading of a time base and of the virtual local time.
///
/// Any later local time can be expressed on the time base by adding the
/// local time elapsed since the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ReferencePair {
    pub global: GlobalTime,
    pub local: VirtualLocalTime,
}

impl ReferencePair {
    pub fn new(global: GlobalTime, local: VirtualLocalTime) -> Self {
        Self { global, local }
    }

    /// The global time corresponding to `local`.
    pub fn global_at(&self, local: VirtualLocalTime) -> Result<GlobalTime, TimeError> {
        self.global.checked_add(local - self.local)
    }
}

/// Difference `a - b` of two wire timestamps.
pub(crate) fn timestamp_difference(a: WireTimestamp, b: WireTimestamp) -> Option<Duration> {
    Duration::try_from_nanos_i128(a.total_nanos() - b.total_nanos())
}
