//! Validation and dispatch of received PTP frames.

use tracing::{debug, trace};

use super::{
    actions::PortActionIterator,
    com_ctrl::ComCtrl,
    error::service,
    port::Port,
    state::{PortContext, PortMachines},
    EthTSyn, EthTSynError, StatCounter,
};
use crate::{
    datastructures::{
        common::WireTimestamp,
        messages::{Message, MessageType, HEADER_LENGTH, PTP_ETHERTYPE},
        read_u16,
    },
    ethif::EthIfCtrlIdx,
    time::VirtualLocalTime,
};

const PTP_VERSION: u8 = 2;
const GPTP_TRANSPORT_SPECIFIC: u8 = 1;

impl EthTSyn {
    /// Reception of a frame by an end station controller. `hw_ingress` is
    /// the hardware timestamp, if the controller takes them.
    pub fn rx_indication(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_type: u16,
        data: &[u8],
        hw_ingress: Option<WireTimestamp>,
    ) -> Result<(), EthTSynError> {
        let result = self.rx(ethif_ctrl, frame_type, data, hw_ingress);
        self.checked(service::RX_INDICATION, result)
    }

    fn rx(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_type: u16,
        data: &[u8],
        hw_ingress: Option<WireTimestamp>,
    ) -> Result<(), EthTSynError> {
        let ctrl = self.ctrl(ethif_ctrl)?;
        if ctrl.config.switch_management {
            return Err(EthTSynError::InvalidParam("switch managed controller"));
        }
        // as close to the reception as possible
        let ingress = self.capture_time(ctrl, ctrl.time_base, hw_ingress);
        if frame_type != PTP_ETHERTYPE {
            return Err(EthTSynError::InvalidParam("frame type"));
        }

        self.receive(ctrl, data, ingress)
    }

    /// Validate a complete frame of `ctrl` and hand it to the state machines
    /// of the port of its time domain.
    pub(crate) fn receive(
        &self,
        ctrl: &ComCtrl,
        data: &[u8],
        ingress: Option<VirtualLocalTime>,
    ) -> Result<(), EthTSynError> {
        let received = data.len();
        if received < HEADER_LENGTH {
            return Err(EthTSynError::MessageLength {
                received,
                declared: data.get(2..4).map(read_u16),
            });
        }
        let declared = read_u16(&data[2..4]);
        let Ok(message_type) = MessageType::try_from(data[0] & 0x0f) else {
            trace!(ctrl = %ctrl.config.ethif_ctrl, message_type = data[0] & 0x0f, "unknown message type");
            return Ok(());
        };
        if usize::from(declared) > received || usize::from(declared) < message_type.minimum_length() {
            return Err(EthTSynError::MessageLength {
                received,
                declared: Some(declared),
            });
        }
        if data[1] & 0x0f != PTP_VERSION || data[0] >> 4 != GPTP_TRANSPORT_SPECIFIC {
            trace!(ctrl = %ctrl.config.ethif_ctrl, "unsupported version, frame dropped");
            return Ok(());
        }

        let domain_number = data[4];
        let Some(port) = ctrl
            .ports
            .iter()
            .map(|idx| &self.ports[idx.index()])
            .find(|port| port.domain_number == domain_number)
        else {
            trace!(ctrl = %ctrl.config.ethif_ctrl, domain_number, "no port in time domain");
            return Ok(());
        };
        let link = ctrl.link.get();
        if !link.active {
            trace!(port = %port.idx, "link down, frame dropped");
            return Ok(());
        }

        let message = match Message::deserialize(data) {
            Ok(message) => message,
            Err(error) => {
                debug!(port = %port.idx, %error, "malformed message");
                port.stats
                    .with(|stats| stats.increment(StatCounter::RxPtpPacketDiscard));
                return Ok(());
            }
        };
        let header = *message.header();
        if header.source_port_identity().clock_identity == link.clock_identity {
            trace!(port = %port.idx, "own message, dropped");
            port.stats
                .with(|stats| stats.increment(StatCounter::RxPtpPacketDiscard));
            return Ok(());
        }

        self.dispatch(port, message, ingress)
    }

    fn dispatch(
        &self,
        port: &Port,
        message: Message,
        ingress: Option<VirtualLocalTime>,
    ) -> Result<(), EthTSynError> {
        port.stats.with(|stats| stats.increment(rx_counter(&message)));
        trace!(
            port = %port.idx,
            message_type = ?message.content_type(),
            sequence_id = message.header().sequence_id(),
            "received"
        );

        match message {
            Message::Sync(_) | Message::FollowUp(_) if port.is_master => {
                port.stats
                    .with(|stats| stats.increment(StatCounter::RxPtpPacketDiscard));
                return Err(EthTSynError::TimeSyncConflict);
            }
            Message::Sync(sync) => self.deliver(port, |machines, ctx| {
                machines.slave_rx.as_mut().map(|sm| {
                    sm.proc_rcvd_sync(ctx, &sync.header, ingress);
                    PortActionIterator::empty()
                })
            }),
            Message::FollowUp(follow_up) => self.deliver(port, |machines, ctx| {
                machines
                    .slave_rx
                    .as_mut()
                    .map(|sm| sm.proc_rcvd_follow_up(ctx, &follow_up))
            }),
            Message::Announce(announce) => self.deliver(port, |machines, ctx| {
                machines.slave_rx.as_mut().map(|sm| {
                    sm.proc_rcvd_announce(ctx, &announce);
                    PortActionIterator::empty()
                })
            }),
            Message::PDelayReq(request) => self.deliver(port, |machines, _| {
                machines.pdelay_responder.as_mut().map(|sm| {
                    sm.proc_rcvd_pd_req(&request.header, ingress);
                    PortActionIterator::empty()
                })
            }),
            Message::PDelayResp(response) => self.deliver(port, |machines, ctx| {
                machines.pdelay_initiator.as_mut().map(|sm| {
                    sm.proc_rcvd_pd_resp(ctx, &response, ingress);
                    PortActionIterator::empty()
                })
            }),
            Message::PDelayRespFollowUp(follow_up) => self.deliver(port, |machines, ctx| {
                machines.pdelay_initiator.as_mut().map(|sm| {
                    sm.proc_rcvd_pd_resp_fup(ctx, &follow_up);
                    PortActionIterator::empty()
                })
            }),
        }
        Ok(())
    }

    /// Hand a message to one state machine of `port`. `None` from `input`
    /// means the port has no machine for the message.
    fn deliver(
        &self,
        port: &Port,
        input: impl FnOnce(&mut PortMachines, &PortContext) -> Option<PortActionIterator>,
    ) {
        let ctx = self.port_context(port, false);
        match port.machines.with(|machines| input(machines, &ctx)) {
            Some(actions) => self.execute(port, actions),
            None => {
                trace!(port = %port.idx, "no state machine for message");
                port.stats
                    .with(|stats| stats.increment(StatCounter::RxPtpPacketDiscard));
            }
        }
    }
}

fn rx_counter(message: &Message) -> StatCounter {
    match message {
        Message::Sync(_) => StatCounter::RxSync,
        Message::FollowUp(_) => StatCounter::RxFollowUp,
        Message::Announce(_) => StatCounter::RxAnnounce,
        Message::PDelayReq(_) => StatCounter::RxPdelayRequest,
        Message::PDelayResp(_) => StatCounter::RxPdelayResponse,
        Message::PDelayRespFollowUp(_) => StatCounter::RxPdelayResponseFollowUp,
    }
}
