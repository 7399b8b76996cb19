//! gPTP messages carried over Ethernet

use arrayvec::ArrayVec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

mod announce;
mod follow_up;
mod header;
mod message_builder;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod sync;

pub use announce::*;
pub use follow_up::*;
pub use header::*;
pub use message_builder::*;
pub use p_delay_req::*;
pub use p_delay_resp::*;
pub use p_delay_resp_follow_up::*;
pub use sync::*;

use super::WireFormatError;

/// EtherType of PTP over IEEE 802.3.
pub const PTP_ETHERTYPE: u16 = 0x88f7;

/// Destination of all peer-to-peer gPTP messages. Frames sent to it are not
/// forwarded by bridges.
pub const PTP_MULTICAST_ADDRESS: [u8; 6] = [0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e];

/// Room for the largest message this crate emits or accepts.
pub const MAX_DATA_LEN: usize = 128;

/// An encoded message, ready for transmission.
pub type Frame = ArrayVec<u8, MAX_DATA_LEN>;

#[derive(Debug, Clone, Copy, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
}

impl MessageType {
    /// Minimum length of a well-formed message of this type, TLVs excluded.
    pub fn minimum_length(self) -> usize {
        HEADER_LENGTH
            + match self {
                MessageType::Sync | MessageType::FollowUp => 10,
                MessageType::PDelayReq
                | MessageType::PDelayResp
                | MessageType::PDelayRespFollowUp => 20,
                MessageType::Announce => 30,
            }
    }

    /// Event messages are timestamped on ingress and egress.
    pub fn is_event(self) -> bool {
        matches!(
            self,
            MessageType::Sync | MessageType::PDelayReq | MessageType::PDelayResp
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Sync(SyncMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    pub fn header(&self) -> &Header {
        match self {
            Message::Sync(m) => &m.header,
            Message::PDelayReq(m) => &m.header,
            Message::PDelayResp(m) => &m.header,
            Message::FollowUp(m) => &m.header,
            Message::PDelayRespFollowUp(m) => &m.header,
            Message::Announce(m) => &m.header,
        }
    }

    /// The byte size on the wire of this message
    pub fn wire_size(&self) -> usize {
        self.header().wire_size() + self.content_size()
    }

    fn content_size(&self) -> usize {
        match self {
            Message::Sync(m) => m.content_size(),
            Message::PDelayReq(m) => m.content_size(),
            Message::PDelayResp(m) => m.content_size(),
            Message::FollowUp(m) => m.content_size(),
            Message::PDelayRespFollowUp(m) => m.content_size(),
            Message::Announce(m) => m.content_size(),
        }
    }

    pub fn content_type(&self) -> MessageType {
        match self {
            Message::Sync(_) => MessageType::Sync,
            Message::PDelayReq(_) => MessageType::PDelayReq,
            Message::PDelayResp(_) => MessageType::PDelayResp,
            Message::FollowUp(_) => MessageType::FollowUp,
            Message::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            Message::Announce(_) => MessageType::Announce,
        }
    }

    /// Serializes the object into the PTP wire format.
    ///
    /// Returns the used buffer size that contains the message or an error.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let size = self.wire_size();
        if buffer.len() < size {
            return Err(WireFormatError::BufferTooShort);
        }
        let (header, content) = buffer.split_at_mut(HEADER_LENGTH);
        self.header()
            .serialize_header(self.content_type(), self.content_size(), header)?;
        match self {
            Message::Sync(m) => m.serialize_content(content)?,
            Message::PDelayReq(m) => m.serialize_content(content)?,
            Message::PDelayResp(m) => m.serialize_content(content)?,
            Message::FollowUp(m) => m.serialize_content(content)?,
            Message::PDelayRespFollowUp(m) => m.serialize_content(content)?,
            Message::Announce(m) => m.serialize_content(content)?,
        }
        Ok(size)
    }

    /// Serializes the message into a transmit frame.
    pub fn serialize_frame(&self) -> Result<Frame, WireFormatError> {
        let mut buffer = [0; MAX_DATA_LEN];
        let size = self.serialize(&mut buffer)?;
        Frame::try_from(&buffer[..size]).map_err(|_| WireFormatError::BufferTooShort)
    }

    /// Deserializes a message from the PTP wire format.
    ///
    /// Only the bytes covered by the length field of the header are taken
    /// into account, trailing padding is ignored.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header_data = Header::deserialize_header(buffer)?;

        let length = usize::from(header_data.message_length);
        if length < header_data.message_type.minimum_length() {
            return Err(WireFormatError::Invalid);
        }
        let content_buffer = buffer
            .get(HEADER_LENGTH..length)
            .ok_or(WireFormatError::BufferTooShort)?;
        let header = header_data.header;

        Ok(match header_data.message_type {
            MessageType::Sync => Message::Sync(SyncMessage::deserialize_content(
                header,
                content_buffer,
            )?),
            MessageType::PDelayReq => Message::PDelayReq(PDelayReqMessage::deserialize_content(
                header,
                content_buffer,
            )?),
            MessageType::PDelayResp => Message::PDelayResp(
                PDelayRespMessage::deserialize_content(header, content_buffer)?,
            ),
            MessageType::FollowUp => Message::FollowUp(FollowUpMessage::deserialize_content(
                header,
                content_buffer,
            )?),
            MessageType::PDelayRespFollowUp => Message::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(header, content_buffer)?,
            ),
            MessageType::Announce => Message::Announce(AnnounceMessage::deserialize_content(
                header,
                content_buffer,
            )?),
        })
    }
}
