use super::Header;
use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// A two-step Sync. The origin timestamp is reserved and sent as zero, the
/// precise origin travels in the Follow_Up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: WireTimestamp,
}

impl SyncMessage {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn content_size(&self) -> usize {
        10
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.serialize(buffer)
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        Ok(Self {
            header,
            origin_timestamp: WireTimestamp::deserialize(buffer)?,
        })
    }
}
