use super::{
    AnnounceMessage, FollowUpMessage, Header, Message, PDelayReqMessage,
    PDelayRespFollowUpMessage, PDelayRespMessage, SyncMessage,
};
use crate::datastructures::common::{
    ClockIdentity, ClockQuality, FollowUpInformationTlv, PathTraceTlv, PortIdentity,
    TimeInterval, WireTimestamp,
};

/// `timeSource` of a free-running internal oscillator.
const INTERNAL_OSCILLATOR: u8 = 0xa0;

/// `priority1` of a time-aware system that is grandmaster capable.
const DEFAULT_PRIORITY_1: u8 = 246;
const DEFAULT_PRIORITY_2: u8 = 248;

/// A builder to build messages with.
///
/// The length field in the header has to match the length of the message
/// and the message type field has to match the content type. Building
/// through this type and then treating messages as immutable keeps both
/// consistent.
pub struct MessageBuilder {
    header: Header,
}

impl MessageBuilder {
    /// Start the process of building a new message
    pub fn new() -> MessageBuilder {
        MessageBuilder {
            header: Header::new(),
        }
    }

    pub fn domain_number(mut self, domain_number: u8) -> Self {
        self.header.domain_number = domain_number;
        self
    }

    pub fn two_step_flag(mut self, two_step_flag: bool) -> Self {
        self.header.two_step_flag = two_step_flag;
        self
    }

    pub fn ptp_timescale(mut self, ptp_timescale: bool) -> Self {
        self.header.ptp_timescale = ptp_timescale;
        self
    }

    pub fn correction_field(mut self, correction_field: TimeInterval) -> Self {
        self.header.correction_field = correction_field;
        self
    }

    pub fn source_port_identity(mut self, source_port_identity: PortIdentity) -> Self {
        self.header.source_port_identity = source_port_identity;
        self
    }

    pub fn sequence_id(mut self, sequence_id: u16) -> Self {
        self.header.sequence_id = sequence_id;
        self
    }

    pub fn log_message_interval(mut self, log_message_interval: i8) -> Self {
        self.header.log_message_interval = log_message_interval;
        self
    }

    pub fn sync_message(self, origin_timestamp: WireTimestamp) -> Message {
        Message::Sync(SyncMessage {
            header: self.header,
            origin_timestamp,
        })
    }

    pub fn follow_up_message(
        self,
        precise_origin_timestamp: WireTimestamp,
        information: FollowUpInformationTlv,
    ) -> Message {
        Message::FollowUp(FollowUpMessage {
            header: self.header,
            precise_origin_timestamp,
            information: Some(information),
        })
    }

    /// An Announce naming `grandmaster_identity` as grandmaster, with the
    /// default priorities and quality of an end station.
    pub fn announce_message(self, grandmaster_identity: ClockIdentity) -> Message {
        Message::Announce(AnnounceMessage {
            header: self.header,
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: 0,
            grandmaster_priority_1: DEFAULT_PRIORITY_1,
            grandmaster_clock_quality: ClockQuality::default(),
            grandmaster_priority_2: DEFAULT_PRIORITY_2,
            grandmaster_identity,
            steps_removed: 0,
            time_source: INTERNAL_OSCILLATOR,
            path_trace: Some(PathTraceTlv {
                path_sequence: grandmaster_identity,
            }),
        })
    }

    pub fn pdelay_req_message(self) -> Message {
        Message::PDelayReq(PDelayReqMessage {
            header: self.header,
            origin_timestamp: WireTimestamp::default(),
        })
    }

    pub fn pdelay_resp_message(
        self,
        request_receipt_timestamp: WireTimestamp,
        requesting_port_identity: PortIdentity,
    ) -> Message {
        Message::PDelayResp(PDelayRespMessage {
            header: self.header,
            request_receipt_timestamp,
            requesting_port_identity,
        })
    }

    pub fn pdelay_resp_follow_up_message(
        self,
        response_origin_timestamp: WireTimestamp,
        requesting_port_identity: PortIdentity,
    ) -> Message {
        Message::PDelayRespFollowUp(PDelayRespFollowUpMessage {
            header: self.header,
            response_origin_timestamp,
            requesting_port_identity,
        })
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
