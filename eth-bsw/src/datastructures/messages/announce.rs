use super::Header;
use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PathTraceTlv, WireTimestamp},
    read_u16, WireFormat, WireFormatError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: WireTimestamp,
    pub(crate) current_utc_offset: i16,
    pub(crate) grandmaster_priority_1: u8,
    pub(crate) grandmaster_clock_quality: ClockQuality,
    pub(crate) grandmaster_priority_2: u8,
    pub(crate) grandmaster_identity: ClockIdentity,
    pub(crate) steps_removed: u16,
    pub(crate) time_source: u8,
    pub(crate) path_trace: Option<PathTraceTlv>,
}

impl AnnounceMessage {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn grandmaster_identity(&self) -> ClockIdentity {
        self.grandmaster_identity
    }

    pub fn steps_removed(&self) -> u16 {
        self.steps_removed
    }

    pub fn grandmaster_priority_1(&self) -> u8 {
        self.grandmaster_priority_1
    }

    pub(crate) fn content_size(&self) -> usize {
        30 + self.path_trace.map_or(0, |tlv| tlv.wire_size())
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.content_size() {
            return Err(WireFormatError::BufferTooShort);
        }

        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority_1;
        self.grandmaster_clock_quality
            .serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority_2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source;
        if let Some(tlv) = &self.path_trace {
            tlv.serialize(&mut buffer[30..])?;
        }

        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            header,
            origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            current_utc_offset: read_u16(&buffer[10..12]) as i16,
            grandmaster_priority_1: buffer[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&buffer[14..18])?,
            grandmaster_priority_2: buffer[18],
            grandmaster_identity: ClockIdentity::deserialize(&buffer[19..27])?,
            steps_removed: read_u16(&buffer[27..29]),
            time_source: buffer[29],
            path_trace: PathTraceTlv::deserialize(&buffer[30..]).ok(),
        })
    }
}
