use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::ClockIdentity;
use crate::datastructures::{read_u16, read_u32, WireFormat, WireFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum TlvType {
    OrganizationExtension = 0x0003,
    PathTrace = 0x0008,
}

const IEEE_802_1_ORGANIZATION_ID: [u8; 3] = [0x00, 0x80, 0xc2];
const FOLLOW_UP_INFORMATION_SUBTYPE: [u8; 3] = [0x00, 0x00, 0x01];

/// Carried by every Follow_Up of a time-aware system.
///
/// Rate and phase change information is only meaningful for a grandmaster
/// that tracks an external source. An end station acting as master sends
/// all fields zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FollowUpInformationTlv {
    pub cumulative_scaled_rate_offset: i32,
    pub gm_time_base_indicator: u16,
    /// Scaled nanoseconds, 96 bits on the wire. The upper 32 bits are sent
    /// as sign extension.
    pub last_gm_phase_change: i64,
    pub scaled_last_gm_freq_change: i32,
}

impl FollowUpInformationTlv {
    const LENGTH_FIELD: u16 = 28;
}

impl WireFormat for FollowUpInformationTlv {
    fn wire_size(&self) -> usize {
        4 + Self::LENGTH_FIELD as usize
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.wire_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&u16::from(TlvType::OrganizationExtension).to_be_bytes());
        buffer[2..4].copy_from_slice(&Self::LENGTH_FIELD.to_be_bytes());
        buffer[4..7].copy_from_slice(&IEEE_802_1_ORGANIZATION_ID);
        buffer[7..10].copy_from_slice(&FOLLOW_UP_INFORMATION_SUBTYPE);
        buffer[10..14].copy_from_slice(&self.cumulative_scaled_rate_offset.to_be_bytes());
        buffer[14..16].copy_from_slice(&self.gm_time_base_indicator.to_be_bytes());
        let sign = if self.last_gm_phase_change < 0 { 0xff } else { 0x00 };
        buffer[16..20].fill(sign);
        buffer[20..28].copy_from_slice(&self.last_gm_phase_change.to_be_bytes());
        buffer[28..32].copy_from_slice(&self.scaled_last_gm_freq_change.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 32 {
            return Err(WireFormatError::BufferTooShort);
        }
        let tlv_type = TlvType::try_from(read_u16(&buffer[0..2]))?;
        if tlv_type != TlvType::OrganizationExtension
            || read_u16(&buffer[2..4]) != Self::LENGTH_FIELD
            || buffer[4..7] != IEEE_802_1_ORGANIZATION_ID
            || buffer[7..10] != FOLLOW_UP_INFORMATION_SUBTYPE
        {
            return Err(WireFormatError::Invalid);
        }
        let mut phase_change = [0; 8];
        phase_change.copy_from_slice(&buffer[20..28]);
        Ok(Self {
            cumulative_scaled_rate_offset: read_u32(&buffer[10..14]) as i32,
            gm_time_base_indicator: read_u16(&buffer[14..16]),
            last_gm_phase_change: i64::from_be_bytes(phase_change),
            scaled_last_gm_freq_change: read_u32(&buffer[28..32]) as i32,
        })
    }
}

/// Path trace with a single entry: the grandmaster itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PathTraceTlv {
    pub path_sequence: ClockIdentity,
}

impl WireFormat for PathTraceTlv {
    fn wire_size(&self) -> usize {
        12
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 12 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..2].copy_from_slice(&u16::from(TlvType::PathTrace).to_be_bytes());
        buffer[2..4].copy_from_slice(&8u16.to_be_bytes());
        self.path_sequence.serialize(&mut buffer[4..12])
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 12 {
            return Err(WireFormatError::BufferTooShort);
        }
        if TlvType::try_from(read_u16(&buffer[0..2]))? != TlvType::PathTrace {
            return Err(WireFormatError::Invalid);
        }
        // Only the first entry is of interest, it names the grandmaster.
        if read_u16(&buffer[2..4]) < 8 {
            return Err(WireFormatError::Invalid);
        }
        Ok(Self {
            path_sequence: ClockIdentity::deserialize(&buffer[4..12])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_up_information_layout() {
        let tlv = FollowUpInformationTlv {
            cumulative_scaled_rate_offset: -2,
            gm_time_base_indicator: 7,
            last_gm_phase_change: -1,
            scaled_last_gm_freq_change: 3,
        };
        let mut buffer = [0; 32];
        tlv.serialize(&mut buffer).unwrap();

        assert_eq!(buffer[0..10], [0x00, 0x03, 0x00, 0x1c, 0x00, 0x80, 0xc2, 0x00, 0x00, 0x01]);
        assert_eq!(buffer[10..14], [0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(buffer[14..16], [0x00, 0x07]);
        assert_eq!(buffer[16..28], [0xff; 12]);
        assert_eq!(buffer[28..32], [0x00, 0x00, 0x00, 0x03]);

        assert_eq!(FollowUpInformationTlv::deserialize(&buffer).unwrap(), tlv);
    }

    #[test]
    fn foreign_organization_extension_is_rejected() {
        let mut buffer = [0; 32];
        FollowUpInformationTlv::default()
            .serialize(&mut buffer)
            .unwrap();
        buffer[4] = 0x01;
        assert_eq!(
            FollowUpInformationTlv::deserialize(&buffer),
            Err(WireFormatError::Invalid)
        );
    }

    #[test]
    fn path_trace_layout() {
        let tlv = PathTraceTlv {
            path_sequence: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
        };
        let mut buffer = [0; 12];
        tlv.serialize(&mut buffer).unwrap();
        assert_eq!(buffer, [0x00, 0x08, 0x00, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(PathTraceTlv::deserialize(&buffer).unwrap(), tlv);
    }
}
