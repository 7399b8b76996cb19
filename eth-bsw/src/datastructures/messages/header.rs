use getset::CopyGetters;

use super::MessageType;
use crate::datastructures::{
    common::{PortIdentity, TimeInterval},
    read_u16, WireFormat, WireFormatError,
};

/// Length of the common message header.
pub const HEADER_LENGTH: usize = 34;

/// `majorSdoId` (formerly `transportSpecific`) of gPTP messages.
pub(crate) const GPTP_TRANSPORT_SPECIFIC: u8 = 0x1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Header {
    pub(crate) transport_specific: u8,
    pub(crate) version: PtpVersion,
    pub(crate) domain_number: u8,
    pub(crate) two_step_flag: bool,
    pub(crate) leap61: bool,
    pub(crate) leap59: bool,
    pub(crate) current_utc_offset_valid: bool,
    pub(crate) ptp_timescale: bool,
    pub(crate) time_traceable: bool,
    pub(crate) frequency_traceable: bool,
    pub(crate) correction_field: TimeInterval,
    pub(crate) source_port_identity: PortIdentity,
    pub(crate) sequence_id: u16,
    pub(crate) log_message_interval: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializedHeader {
    pub header: Header,
    pub message_type: MessageType,
    pub message_length: u16,
}

impl Header {
    pub(super) fn new() -> Self {
        Self {
            transport_specific: GPTP_TRANSPORT_SPECIFIC,
            version: PtpVersion { major: 2, minor: 0 },
            domain_number: 0,
            two_step_flag: false,
            leap61: false,
            leap59: false,
            current_utc_offset_valid: false,
            ptp_timescale: false,
            time_traceable: false,
            frequency_traceable: false,
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            log_message_interval: 0,
        }
    }

    pub fn wire_size(&self) -> usize {
        HEADER_LENGTH
    }

    pub fn serialize_header(
        &self,
        content_type: MessageType,
        content_length: usize,
        buffer: &mut [u8],
    ) -> Result<(), WireFormatError> {
        if buffer.len() < HEADER_LENGTH {
            return Err(WireFormatError::BufferTooShort);
        }
        let length =
            u16::try_from(content_length + HEADER_LENGTH).map_err(|_| WireFormatError::Invalid)?;

        buffer[0] = (self.transport_specific << 4) | (u8::from(content_type) & 0x0f);
        buffer[1] = self.version.as_byte();
        buffer[2..4].copy_from_slice(&length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = 0;
        buffer[6] = (self.two_step_flag as u8) << 1;
        buffer[7] = 0;
        buffer[7] |= self.leap61 as u8;
        buffer[7] |= (self.leap59 as u8) << 1;
        buffer[7] |= (self.current_utc_offset_valid as u8) << 2;
        buffer[7] |= (self.ptp_timescale as u8) << 3;
        buffer[7] |= (self.time_traceable as u8) << 4;
        buffer[7] |= (self.frequency_traceable as u8) << 5;
        self.correction_field.serialize(&mut buffer[8..16])?;
        buffer[16..20].fill(0);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        buffer[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        buffer[32] = control_field(content_type);
        buffer[33] = self.log_message_interval as u8;

        Ok(())
    }

    pub fn deserialize_header(buffer: &[u8]) -> Result<DeserializedHeader, WireFormatError> {
        if buffer.len() < HEADER_LENGTH {
            return Err(WireFormatError::BufferTooShort);
        }

        Ok(DeserializedHeader {
            header: Self {
                transport_specific: buffer[0] >> 4,
                version: PtpVersion::from_byte(buffer[1]),
                domain_number: buffer[4],
                two_step_flag: (buffer[6] & (1 << 1)) > 0,
                leap61: (buffer[7] & (1 << 0)) > 0,
                leap59: (buffer[7] & (1 << 1)) > 0,
                current_utc_offset_valid: (buffer[7] & (1 << 2)) > 0,
                ptp_timescale: (buffer[7] & (1 << 3)) > 0,
                time_traceable: (buffer[7] & (1 << 4)) > 0,
                frequency_traceable: (buffer[7] & (1 << 5)) > 0,
                correction_field: TimeInterval::deserialize(&buffer[8..16])?,
                source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
                sequence_id: read_u16(&buffer[30..32]),
                log_message_interval: buffer[33] as i8,
            },
            message_type: MessageType::try_from(buffer[0] & 0x0f)?,
            message_length: read_u16(&buffer[2..4]),
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Obsolete control field, still filled in for compatibility with
/// IEEE 1588-2008 implementations.
fn control_field(message_type: MessageType) -> u8 {
    match message_type {
        MessageType::Sync => 0x00,
        MessageType::FollowUp => 0x02,
        _ => 0x05,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpVersion {
    major: u8,
    minor: u8,
}

impl PtpVersion {
    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    fn as_byte(&self) -> u8 {
        self.minor << 4 | self.major
    }

    fn from_byte(byte: u8) -> Self {
        Self {
            major: byte & 0x0f,
            minor: byte >> 4,
        }
    }
}
