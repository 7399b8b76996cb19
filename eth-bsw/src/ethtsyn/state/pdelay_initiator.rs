use tracing::debug;

use super::{encode, PortContext, ResetLatch, SequenceIdGenerator};
use crate::{
    config::PdelayInitiatorConfig,
    datastructures::{
        common::{PortIdentity, WireTimestamp},
        messages::{Message, PDelayRespFollowUpMessage, PDelayRespMessage},
    },
    drivers::ValidationData,
    ethtsyn::{
        actions::{actions, ActionList, PortAction, PortActionIterator, TxKind},
        stats::StatCounter,
    },
    time::{timestamp_difference, Duration, VirtualLocalTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdelayInitiatorState {
    Initializing,
    /// Waiting for the next request interval.
    WaitTxPdReq,
    /// A request is out, collecting its timestamps and responses.
    WaitPdResp,
}

/// Timestamps of one request/response exchange.
///
/// t1: request egress, t2: request receipt at the responder,
/// t3: response origin at the responder, t4: response ingress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Exchange {
    sequence_id: u16,
    responder: Option<PortIdentity>,
    t1: Option<VirtualLocalTime>,
    t2: Option<WireTimestamp>,
    t3: Option<WireTimestamp>,
    t4: Option<VirtualLocalTime>,
    response_correction: Duration,
    follow_up_correction: Duration,
}

impl Exchange {
    fn is_complete(&self) -> bool {
        self.t1.is_some() && self.t2.is_some() && self.t3.is_some() && self.t4.is_some()
    }

    /// `((t4 - t1) - (t3 - t2)) / 2`, with the corrections of the responder
    /// added to its turnaround time.
    fn mean_link_delay(&self) -> Option<Duration> {
        let turnaround = timestamp_difference(self.t3?, self.t2?)?
            + self.response_correction
            + self.follow_up_correction;
        Some(((self.t4? - self.t1?) - turnaround) / 2)
    }
}

/// Measures the link delay to the neighbor and decides whether the port is
/// capable of carrying time.
#[derive(Debug)]
pub(crate) struct PdelayInitiator {
    config: PdelayInitiatorConfig,
    state: PdelayInitiatorState,
    reset: ResetLatch,
    sequence_ids: SequenceIdGenerator,
    timer: u32,
    exchange: Exchange,
    lost_responses: u16,
    average: Option<Duration>,
}

impl PdelayInitiator {
    pub(crate) fn new(config: &PdelayInitiatorConfig) -> Self {
        Self {
            config: config.clone(),
            state: PdelayInitiatorState::Initializing,
            reset: ResetLatch::default(),
            sequence_ids: SequenceIdGenerator::new(),
            timer: 0,
            exchange: Exchange::default(),
            lost_responses: 0,
            average: None,
        }
    }

    pub(crate) fn state(&self) -> PdelayInitiatorState {
        if self.reset.pending() {
            PdelayInitiatorState::Initializing
        } else {
            self.state
        }
    }

    pub(crate) fn request_reset(&mut self) {
        self.reset.request();
    }

    pub(crate) fn process(&mut self, ctx: &PortContext) -> PortActionIterator {
        if self.reset.take() {
            debug!(port = %ctx.port, "pdelay initiator reset");
            let config = self.config.clone();
            *self = Self::new(&config);
        }

        if self.state == PdelayInitiatorState::Initializing {
            if ctx.link_active {
                self.state = PdelayInitiatorState::WaitTxPdReq;
                self.timer = 0;
            }
            return actions![];
        }

        let mut actions = ActionList::new();
        if self.state == PdelayInitiatorState::WaitPdResp && self.exchange.is_complete() {
            self.finish_exchange(ctx, &mut actions);
            self.state = PdelayInitiatorState::WaitTxPdReq;
        }

        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            if self.state == PdelayInitiatorState::WaitPdResp {
                self.response_lost(ctx, &mut actions);
                self.state = PdelayInitiatorState::WaitTxPdReq;
            }
            if ctx.link_active {
                if let Some(action) = self.send_request(ctx) {
                    actions.push(action);
                }
            }
        }

        PortActionIterator::from(actions)
    }

    pub(crate) fn proc_rcvd_pd_resp(
        &mut self,
        ctx: &PortContext,
        message: &PDelayRespMessage,
        ingress: Option<VirtualLocalTime>,
    ) -> bool {
        let header = message.header();
        if !self.expects(ctx, header.sequence_id(), message.requesting_port_identity()) {
            return false;
        }
        if self.exchange.responder.is_some() {
            debug!(
                sequence_id = header.sequence_id(),
                responder = %header.source_port_identity(),
                "additional pdelay response ignored"
            );
            return false;
        }
        let Some(ingress) = ingress else {
            debug!(sequence_id = header.sequence_id(), "pdelay response without ingress timestamp");
            return false;
        };

        self.exchange.responder = Some(header.source_port_identity());
        self.exchange.t2 = Some(message.request_receipt_timestamp());
        self.exchange.t4 = Some(ingress);
        self.exchange.response_correction = Duration::from(header.correction_field());
        true
    }

    pub(crate) fn proc_rcvd_pd_resp_fup(
        &mut self,
        ctx: &PortContext,
        message: &PDelayRespFollowUpMessage,
    ) -> bool {
        let header = message.header();
        if !self.expects(ctx, header.sequence_id(), message.requesting_port_identity()) {
            return false;
        }
        if self.exchange.responder != Some(header.source_port_identity())
            || self.exchange.t3.is_some()
        {
            debug!(
                sequence_id = header.sequence_id(),
                "pdelay response follow up without matching response"
            );
            return false;
        }

        self.exchange.t3 = Some(message.response_origin_timestamp());
        self.exchange.follow_up_correction = Duration::from(header.correction_field());
        true
    }

    pub(crate) fn tx_failed(&mut self, sequence_id: u16) {
        if self.state() == PdelayInitiatorState::WaitPdResp
            && self.exchange.sequence_id == sequence_id
        {
            debug!(sequence_id, "pdelay request not sent, retrying");
            self.state = PdelayInitiatorState::WaitTxPdReq;
            self.timer = 0;
        }
    }

    pub(crate) fn egress_timestamp(&mut self, sequence_id: u16, egress: Option<VirtualLocalTime>) {
        if self.state() != PdelayInitiatorState::WaitPdResp
            || self.exchange.sequence_id != sequence_id
        {
            return;
        }
        if egress.is_none() {
            debug!(sequence_id, "no egress timestamp for pdelay request");
        }
        self.exchange.t1 = egress;
    }

    fn expects(&self, ctx: &PortContext, sequence_id: u16, requester: PortIdentity) -> bool {
        let expected = self.state() == PdelayInitiatorState::WaitPdResp
            && self.exchange.sequence_id == sequence_id
            && requester == ctx.port_identity;
        if !expected {
            debug!(sequence_id, %requester, "unexpected pdelay response");
        }
        expected
    }

    fn send_request(&mut self, ctx: &PortContext) -> Option<PortAction> {
        let sequence_id = self.sequence_ids.generate();
        let message = Message::builder()
            .domain_number(ctx.domain_number)
            .source_port_identity(ctx.port_identity)
            .sequence_id(sequence_id)
            .log_message_interval(self.config.log_interval)
            .pdelay_req_message();
        let data = encode(&message)?;

        self.exchange = Exchange {
            sequence_id,
            ..Default::default()
        };
        self.state = PdelayInitiatorState::WaitPdResp;
        self.timer = self.config.interval_ticks;
        Some(PortAction::SendEvent {
            context: ctx.tx_context(TxKind::PdelayReq, sequence_id),
            data,
        })
    }

    fn finish_exchange(&mut self, ctx: &PortContext, actions: &mut ActionList) {
        let Some(delay) = self.exchange.mean_link_delay() else {
            return;
        };
        if delay.is_negative() {
            debug!(port = %ctx.port, %delay, "negative link delay discarded");
            return;
        }
        self.lost_responses = 0;

        let weight = i64::from(self.config.average_weight);
        let average = match self.average {
            Some(previous) if weight > 1 => previous + (delay - previous) / weight,
            _ => delay,
        };
        self.average = Some(average);

        let threshold = Duration::from_nanos(self.config.neighbor_prop_delay_threshold_ns.into());
        let as_capable = average <= threshold;
        if !as_capable {
            debug!(port = %ctx.port, %average, %threshold, "link delay above threshold");
        }
        actions.push(PortAction::UpdateLinkDelay {
            as_capable,
            propagation_delay: self.config.use_computed_delay.then_some(average),
        });

        if ctx.time_validation {
            if let Exchange {
                sequence_id,
                responder: Some(responding_port_identity),
                t1: Some(request_origin),
                t2: Some(request_receipt),
                t3: Some(response_origin),
                t4: Some(response_receipt),
                ..
            } = self.exchange
            {
                actions.push(PortAction::ReportTimeValidation(
                    ValidationData::PdelayInitiator {
                        sequence_id,
                        requesting_port_identity: ctx.port_identity,
                        responding_port_identity,
                        request_origin,
                        request_receipt,
                        response_origin,
                        response_receipt,
                        pdelay: delay,
                    },
                ));
            }
        }
    }

    fn response_lost(&mut self, ctx: &PortContext, actions: &mut ActionList) {
        self.lost_responses = self.lost_responses.saturating_add(1);
        debug!(
            port = %ctx.port,
            sequence_id = self.exchange.sequence_id,
            lost = self.lost_responses,
            "pdelay exchange incomplete"
        );
        if self.lost_responses > self.config.allowed_lost_responses {
            actions.push(PortAction::UpdateLinkDelay {
                as_capable: false,
                propagation_delay: None,
            });
            if self.lost_responses == self.config.allowed_lost_responses.saturating_add(1) {
                actions.push(PortAction::Count(
                    StatCounter::PdelayAllowedLostResponsesExceeded,
                ));
            }
        }
    }
}
