use core::fmt::Display;

use crate::datastructures::{read_u32, WireFormat, WireFormatError};

/// The PTP representation of a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct WireTimestamp {
    /// The seconds field of the timestamp.
    /// 48-bit, must be less than 281474976710656
    pub seconds: u64,
    /// The nanoseconds field of the timestamp.
    /// Must be less than 10^9
    pub nanos: u32,
}

impl WireTimestamp {
    pub const MAX_SECONDS: u64 = (1 << 48) - 1;

    pub fn is_valid(&self) -> bool {
        self.seconds <= Self::MAX_SECONDS && self.nanos < 1_000_000_000
    }

    pub(crate) fn total_nanos(&self) -> i128 {
        i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanos)
    }

    /// Inverse of `total_nanos`. Fails for negative values and values past
    /// the 48-bit seconds range.
    pub(crate) fn from_total_nanos(nanos: i128) -> Option<Self> {
        if nanos < 0 {
            return None;
        }
        let seconds = u64::try_from(nanos / 1_000_000_000).ok()?;
        let ts = Self {
            seconds,
            nanos: (nanos % 1_000_000_000) as u32,
        };
        (seconds <= Self::MAX_SECONDS).then_some(ts)
    }
}

impl Display for WireTimestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        if self.seconds > Self::MAX_SECONDS {
            return Err(WireFormatError::Invalid);
        }
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        let mut seconds_buffer = [0; 8];
        seconds_buffer[2..8].copy_from_slice(&buffer[0..6]);

        Ok(Self {
            seconds: u64::from_be_bytes(seconds_buffer),
            nanos: read_u32(&buffer[6..10]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_wireformat() {
        let bytes = [0x10, 0x00, 0x00, 0x00, 0x00, 0x02, 0x10, 0x00, 0x00, 0x01u8];
        let ts = WireTimestamp {
            seconds: 0x1000_0000_0002,
            nanos: 0x1000_0001,
        };

        let mut buffer = [0; 10];
        ts.serialize(&mut buffer).unwrap();
        assert_eq!(buffer, bytes);
        assert_eq!(WireTimestamp::deserialize(&bytes).unwrap(), ts);
    }

    #[test]
    fn seconds_beyond_48_bits_are_rejected() {
        let ts = WireTimestamp {
            seconds: 1 << 48,
            nanos: 0,
        };
        assert!(!ts.is_valid());
        assert_eq!(ts.serialize(&mut [0; 10]), Err(WireFormatError::Invalid));
        assert_eq!(WireTimestamp::from_total_nanos(ts.total_nanos()), None);
    }

    #[test]
    fn total_nanos_inverse() {
        let ts = WireTimestamp {
            seconds: 1_700_000_000,
            nanos: 123_456_789,
        };
        assert_eq!(WireTimestamp::from_total_nanos(ts.total_nanos()), Some(ts));
        assert_eq!(WireTimestamp::from_total_nanos(-1), None);
    }
}
