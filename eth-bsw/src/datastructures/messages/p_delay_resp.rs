use super::Header;
use crate::datastructures::{
    common::{PortIdentity, WireTimestamp},
    WireFormat, WireFormatError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespMessage {
    pub(crate) header: Header,
    pub(crate) request_receipt_timestamp: WireTimestamp,
    pub(crate) requesting_port_identity: PortIdentity,
}

impl PDelayRespMessage {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn request_receipt_timestamp(&self) -> WireTimestamp {
        self.request_receipt_timestamp
    }

    pub fn requesting_port_identity(&self) -> PortIdentity {
        self.requesting_port_identity
    }

    pub(crate) fn content_size(&self) -> usize {
        20
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        self.request_receipt_timestamp
            .serialize(&mut buffer[0..10])?;
        self.requesting_port_identity
            .serialize(&mut buffer[10..20])?;
        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }
        Ok(Self {
            header,
            request_receipt_timestamp: WireTimestamp::deserialize(&buffer[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&buffer[10..20])?,
        })
    }
}
