use crate::datastructures::{read_u16, WireFormat, WireFormatError};

/// A description of the accuracy and type of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockQuality {
    pub clock_class: u8,
    pub clock_accuracy: u8,
    pub offset_scaled_log_variance: u16,
}

impl Default for ClockQuality {
    /// The quality a time-aware system announces when it cannot name a
    /// better one: class 248, accuracy unknown.
    fn default() -> Self {
        Self {
            clock_class: 248,
            clock_accuracy: 0xfe,
            offset_scaled_log_variance: 0x4e5d,
        }
    }
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = self.clock_class;
        buffer[1] = self.clock_accuracy;
        buffer[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            clock_class: buffer[0],
            clock_accuracy: buffer[1],
            offset_scaled_log_variance: read_u16(&buffer[2..4]),
        })
    }
}
