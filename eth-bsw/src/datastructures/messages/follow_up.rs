use super::Header;
use crate::datastructures::{
    common::{FollowUpInformationTlv, WireTimestamp},
    WireFormat, WireFormatError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpMessage {
    pub(crate) header: Header,
    pub(crate) precise_origin_timestamp: WireTimestamp,
    pub(crate) information: Option<FollowUpInformationTlv>,
}

impl FollowUpMessage {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn precise_origin_timestamp(&self) -> WireTimestamp {
        self.precise_origin_timestamp
    }

    pub fn information(&self) -> Option<FollowUpInformationTlv> {
        self.information
    }

    pub(crate) fn content_size(&self) -> usize {
        10 + self.information.map_or(0, |tlv| tlv.wire_size())
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.content_size() {
            return Err(WireFormatError::BufferTooShort);
        }
        self.precise_origin_timestamp.serialize(&mut buffer[0..10])?;
        if let Some(tlv) = &self.information {
            tlv.serialize(&mut buffer[10..])?;
        }
        Ok(())
    }

    /// A missing or foreign TLV is not an error; the Follow_Up is still
    /// usable for synchronization.
    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            header,
            precise_origin_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            information: FollowUpInformationTlv::deserialize(&buffer[10..]).ok(),
        })
    }
}
