use core::fmt::Display;

use crate::datastructures::{WireFormat, WireFormatError};

/// The identity of a PTP node.
///
/// Time-aware systems derive it from the MAC address of the controller the
/// port is attached to, see [`ClockIdentity::from_mac_address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Build an EUI-64 from an EUI-48 by inserting `FF FE` between the
    /// organizationally unique identifier and the extension identifier.
    ///
    /// The universal/local bit is left untouched.
    pub fn from_mac_address(mac: [u8; 6]) -> Self {
        Self([mac[0], mac[1], mac[2], 0xff, 0xfe, mac[3], mac[4], mac[5]])
    }

    /// The identity as a big-endian 64-bit value.
    pub fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        buffer
            .get_mut(0..8)
            .ok_or(WireFormatError::BufferTooShort)?
            .copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let mut identity = [0; 8];
        identity.copy_from_slice(buffer.get(0..8).ok_or(WireFormatError::BufferTooShort)?);
        Ok(Self(identity))
    }
}
