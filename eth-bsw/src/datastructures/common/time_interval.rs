use core::ops::{Deref, DerefMut};

use fixed::types::I48F16;

use crate::{
    datastructures::{WireFormat, WireFormatError},
    time::Duration,
};

/// Represents time intervals in nanoseconds, with 16 bits of sub-nanosecond
/// resolution. This is the format of the correction field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TimeInterval(pub I48F16);

impl TimeInterval {
    pub fn from_nanos(nanos: i64) -> Self {
        Self(I48F16::saturating_from_num(nanos))
    }

    /// Whole nanoseconds, truncated toward negative infinity.
    pub fn nanos(&self) -> i64 {
        self.0.to_bits() >> 16
    }
}

impl Deref for TimeInterval {
    type Target = I48F16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TimeInterval {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl WireFormat for TimeInterval {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer
            .get_mut(0..8)
            .ok_or(WireFormatError::BufferTooShort)?
            .copy_from_slice(&self.0.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let mut bits = [0; 8];
        bits.copy_from_slice(buffer.get(0..8).ok_or(WireFormatError::BufferTooShort)?);
        Ok(Self(I48F16::from_bits(i64::from_be_bytes(bits))))
    }
}

impl From<Duration> for TimeInterval {
    fn from(duration: Duration) -> Self {
        Self::from_nanos(duration.nanos())
    }
}
