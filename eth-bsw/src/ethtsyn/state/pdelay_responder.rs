use tracing::debug;

use super::{encode, PortContext, ResetLatch, LOG_INTERVAL_UNSPECIFIED};
use crate::{
    datastructures::{
        common::{PortIdentity, TimeInterval, WireTimestamp},
        messages::{Header, Message},
    },
    drivers::ValidationData,
    ethtsyn::actions::{actions, ActionList, PortAction, PortActionIterator, TxKind},
    time::{ReferencePair, VirtualLocalTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdelayResponderState {
    Initializing,
    WaitRxPdReq,
    TxPdResp,
    WaitPdRespEgrTs,
    TxPdRespFup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRequest {
    sequence_id: u16,
    requesting_port_identity: PortIdentity,
    correction: TimeInterval,
    ingress: VirtualLocalTime,
    request_receipt: Option<WireTimestamp>,
    egress: Option<VirtualLocalTime>,
    /// Time base reading of the response cycle. Request receipt and
    /// response origin are both converted with it.
    reference: Option<ReferencePair>,
}

/// Answers peer delay requests of the neighbor with a Pdelay_Resp and a
/// Pdelay_Resp_Follow_Up carrying the response egress time.
#[derive(Debug)]
pub(crate) struct PdelayResponder {
    state: PdelayResponderState,
    reset: ResetLatch,
    request: Option<PendingRequest>,
}

impl PdelayResponder {
    pub(crate) fn new() -> Self {
        Self {
            state: PdelayResponderState::Initializing,
            reset: ResetLatch::default(),
            request: None,
        }
    }

    pub(crate) fn state(&self) -> PdelayResponderState {
        if self.reset.pending() {
            PdelayResponderState::Initializing
        } else {
            self.state
        }
    }

    pub(crate) fn request_reset(&mut self) {
        self.reset.request();
    }

    pub(crate) fn process(&mut self, ctx: &PortContext) -> PortActionIterator {
        if self.reset.take() {
            debug!(port = %ctx.port, "pdelay responder reset");
            *self = Self::new();
        }

        match self.state {
            PdelayResponderState::Initializing => {
                if ctx.link_active {
                    self.state = PdelayResponderState::WaitRxPdReq;
                }
                actions![]
            }
            PdelayResponderState::WaitRxPdReq | PdelayResponderState::WaitPdRespEgrTs => {
                actions![]
            }
            PdelayResponderState::TxPdResp => self.send_response(ctx),
            PdelayResponderState::TxPdRespFup => self.send_follow_up(ctx),
        }
    }

    /// Returns whether the request starts a new exchange.
    ///
    /// A request is taken while waiting for one, or while an exchange is in
    /// progress if it carries a different sequence id. The newer request
    /// replaces the pending exchange.
    pub(crate) fn proc_rcvd_pd_req(
        &mut self,
        header: &Header,
        ingress: Option<VirtualLocalTime>,
    ) -> bool {
        let sequence_id = header.sequence_id();
        let accepted = match self.state() {
            PdelayResponderState::Initializing => false,
            PdelayResponderState::WaitRxPdReq => true,
            PdelayResponderState::TxPdResp
            | PdelayResponderState::WaitPdRespEgrTs
            | PdelayResponderState::TxPdRespFup => self
                .request
                .map_or(true, |request| request.sequence_id != sequence_id),
        };
        if !accepted {
            debug!(sequence_id, state = ?self.state(), "pdelay request ignored");
            return false;
        }
        let Some(ingress) = ingress else {
            debug!(sequence_id, "pdelay request without ingress timestamp");
            return false;
        };

        self.request = Some(PendingRequest {
            sequence_id,
            requesting_port_identity: header.source_port_identity(),
            correction: header.correction_field(),
            ingress,
            request_receipt: None,
            egress: None,
            reference: None,
        });
        self.state = PdelayResponderState::TxPdResp;
        true
    }

    pub(crate) fn tx_failed(&mut self, sequence_id: u16) {
        if self.state() == PdelayResponderState::WaitPdRespEgrTs
            && self.in_flight(sequence_id)
        {
            debug!(sequence_id, "pdelay response not sent, retrying");
            self.state = PdelayResponderState::TxPdResp;
        }
    }

    pub(crate) fn egress_timestamp(&mut self, sequence_id: u16, egress: Option<VirtualLocalTime>) {
        if self.state() != PdelayResponderState::WaitPdRespEgrTs || !self.in_flight(sequence_id) {
            return;
        }

        match (&mut self.request, egress) {
            (Some(request), Some(egress)) => {
                request.egress = Some(egress);
                self.state = PdelayResponderState::TxPdRespFup;
            }
            _ => {
                debug!(sequence_id, "no egress timestamp for pdelay response");
                self.state = PdelayResponderState::WaitRxPdReq;
            }
        }
    }

    fn in_flight(&self, sequence_id: u16) -> bool {
        self.request
            .is_some_and(|request| request.sequence_id == sequence_id)
    }

    fn send_response(&mut self, ctx: &PortContext) -> PortActionIterator {
        let Some(mut request) = self.request else {
            self.state = PdelayResponderState::WaitRxPdReq;
            return actions![];
        };
        let reference = ctx.reference;
        let Some(request_receipt) = ctx.pdelay_timestamp_with(request.ingress, reference) else {
            debug!(port = %ctx.port, "time base unavailable, pdelay request dropped");
            self.state = PdelayResponderState::WaitRxPdReq;
            return actions![];
        };

        let message = Message::builder()
            .domain_number(ctx.domain_number)
            .two_step_flag(true)
            .source_port_identity(ctx.port_identity)
            .sequence_id(request.sequence_id)
            .log_message_interval(LOG_INTERVAL_UNSPECIFIED)
            .pdelay_resp_message(request_receipt, request.requesting_port_identity);
        let Some(data) = encode(&message) else {
            self.state = PdelayResponderState::WaitRxPdReq;
            return actions![];
        };

        request.request_receipt = Some(request_receipt);
        request.reference = reference;
        self.request = Some(request);
        // Optimistic: a rejected transmission moves back to TxPdResp.
        self.state = PdelayResponderState::WaitPdRespEgrTs;
        actions![PortAction::SendEvent {
            context: ctx.tx_context(TxKind::PdelayResp, request.sequence_id),
            data,
        }]
    }

    fn send_follow_up(&mut self, ctx: &PortContext) -> PortActionIterator {
        self.state = PdelayResponderState::WaitRxPdReq;
        let Some(PendingRequest {
            sequence_id,
            requesting_port_identity,
            correction,
            request_receipt: Some(request_receipt),
            egress: Some(egress),
            reference,
            ..
        }) = self.request
        else {
            return actions![];
        };
        let Some(response_origin) = ctx.pdelay_timestamp_with(egress, reference) else {
            debug!(port = %ctx.port, "time base unavailable, pdelay follow up dropped");
            return actions![];
        };

        let message = Message::builder()
            .domain_number(ctx.domain_number)
            .correction_field(correction)
            .source_port_identity(ctx.port_identity)
            .sequence_id(sequence_id)
            .log_message_interval(LOG_INTERVAL_UNSPECIFIED)
            .pdelay_resp_follow_up_message(response_origin, requesting_port_identity);
        let Some(data) = encode(&message) else {
            return actions![];
        };

        let mut actions = ActionList::new();
        actions.push(PortAction::SendGeneral {
            context: ctx.tx_context(TxKind::PdelayRespFollowUp, sequence_id),
            data,
        });
        if ctx.time_validation {
            actions.push(PortAction::ReportTimeValidation(
                ValidationData::PdelayResponder {
                    sequence_id,
                    requesting_port_identity,
                    responding_port_identity: ctx.port_identity,
                    request_receipt,
                    response_origin,
                    reference,
                },
            ));
        }
        PortActionIterator::from(actions)
    }
}
