//! Per-port protocol state machines.
//!
//! Every machine is driven by two kinds of input: the periodic
//! [`process`](PdelayResponder::process) call from the main function and
//! events (a received message, a transmit confirmation). Inputs are handed
//! a [`PortContext`], a snapshot of the port taken just before the machine
//! was entered, and return the [`PortAction`](super::actions::PortAction)s
//! the runtime has to perform.
//!
//! Reset requests are latched and take effect at the start of the next
//! processing cycle of each machine. Until then the machine reports its
//! initial state and ignores all events.

use tracing::error;

use super::{actions::PortActionIterator, actions::TxKind, PortIdx, TxContext};
use crate::{
    config::{PdelayTimestampFormat, PortConfig, PortRole},
    datastructures::{
        common::{PortIdentity, WireTimestamp},
        messages::{Frame, Message},
    },
    time::{Duration, ReferencePair, VirtualLocalTime},
};

mod announce_send;
mod pdelay_initiator;
mod pdelay_responder;
mod sequence_id;
mod slave_rx;
mod sync_send;

pub use announce_send::AnnounceSendState;
pub use pdelay_initiator::PdelayInitiatorState;
pub use pdelay_responder::PdelayResponderState;
pub use slave_rx::SlaveRxState;
pub use sync_send::SyncSendState;

pub(crate) use announce_send::AnnounceSend;
pub(crate) use pdelay_initiator::PdelayInitiator;
pub(crate) use pdelay_responder::PdelayResponder;
pub(crate) use sequence_id::SequenceIdGenerator;
pub(crate) use slave_rx::SlaveRx;
pub(crate) use sync_send::SyncSend;

/// Snapshot of a port handed to its state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PortContext {
    pub port: PortIdx,
    pub port_identity: PortIdentity,
    pub domain_number: u8,
    pub link_active: bool,
    /// Time transmission (Sync, Announce) is allowed: the link is active,
    /// transmission is switched on and the debounce time has elapsed.
    pub tx_allowed: bool,
    pub as_capable: bool,
    pub propagation_delay: Duration,
    pub pdelay_format: PdelayTimestampFormat,
    /// Reading of the domain's time base, sampled before entering the
    /// machine. Only present when the machine needs it.
    pub reference: Option<ReferencePair>,
    pub time_validation: bool,
}

impl PortContext {
    pub(crate) fn tx_context(&self, kind: TxKind, sequence_id: u16) -> TxContext {
        TxContext::new(self.port, kind, sequence_id)
    }

    /// A pdelay timestamp in the representation configured for the domain.
    pub(crate) fn pdelay_timestamp(&self, local: VirtualLocalTime) -> Option<WireTimestamp> {
        self.pdelay_timestamp_with(local, self.reference)
    }

    /// As [`pdelay_timestamp`](Self::pdelay_timestamp), converting with a
    /// reference taken earlier.
    pub(crate) fn pdelay_timestamp_with(
        &self,
        local: VirtualLocalTime,
        reference: Option<ReferencePair>,
    ) -> Option<WireTimestamp> {
        match self.pdelay_format {
            PdelayTimestampFormat::VirtualLocalTime => Some(local.into()),
            PdelayTimestampFormat::GlobalTime => reference?
                .global_at(local)
                .ok()
                .map(|global| global.timestamp),
        }
    }
}

/// Latched reset request of one state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResetLatch(bool);

impl ResetLatch {
    pub(crate) fn request(&mut self) {
        self.0 = true;
    }

    pub(crate) fn pending(&self) -> bool {
        self.0
    }

    /// Consume the request, returns whether one was pending.
    pub(crate) fn take(&mut self) -> bool {
        core::mem::take(&mut self.0)
    }
}

/// The state machines configured for one port.
#[derive(Debug)]
pub(crate) struct PortMachines {
    pub pdelay_responder: Option<PdelayResponder>,
    pub pdelay_initiator: Option<PdelayInitiator>,
    pub sync_send: Option<SyncSend>,
    pub announce_send: Option<AnnounceSend>,
    pub slave_rx: Option<SlaveRx>,
}

impl PortMachines {
    pub(crate) fn new(config: &PortConfig) -> Self {
        let (sync_send, announce_send, slave_rx) = match &config.role {
            PortRole::Master(master) => (
                Some(SyncSend::new(master)),
                master
                    .announce_interval_ticks
                    .map(|interval| AnnounceSend::new(interval, master.log_announce_interval)),
                None,
            ),
            PortRole::Slave(slave) => (None, None, Some(SlaveRx::new(slave))),
        };

        Self {
            pdelay_responder: config.pdelay_responder.then(PdelayResponder::new),
            pdelay_initiator: config.pdelay_initiator.as_ref().map(PdelayInitiator::new),
            sync_send,
            announce_send,
            slave_rx,
        }
    }

    pub(crate) fn request_reset(&mut self) {
        if let Some(sm) = &mut self.pdelay_responder {
            sm.request_reset();
        }
        if let Some(sm) = &mut self.pdelay_initiator {
            sm.request_reset();
        }
        if let Some(sm) = &mut self.sync_send {
            sm.request_reset();
        }
        if let Some(sm) = &mut self.announce_send {
            sm.request_reset();
        }
        if let Some(sm) = &mut self.slave_rx {
            sm.request_reset();
        }
    }

    /// The transmission of `context` was rejected.
    pub(crate) fn tx_failed(&mut self, context: TxContext) {
        match context.kind {
            TxKind::PdelayResp => {
                if let Some(sm) = &mut self.pdelay_responder {
                    sm.tx_failed(context.sequence_id);
                }
            }
            TxKind::PdelayReq => {
                if let Some(sm) = &mut self.pdelay_initiator {
                    sm.tx_failed(context.sequence_id);
                }
            }
            TxKind::Sync => {
                if let Some(sm) = &mut self.sync_send {
                    sm.tx_failed(context.sequence_id);
                }
            }
            TxKind::FollowUp | TxKind::Announce | TxKind::PdelayRespFollowUp => {}
        }
    }

    /// Confirmation of an event message, `None` if no egress timestamp
    /// could be obtained.
    pub(crate) fn egress_timestamp(
        &mut self,
        context: TxContext,
        egress: Option<VirtualLocalTime>,
    ) {
        match context.kind {
            TxKind::PdelayResp => {
                if let Some(sm) = &mut self.pdelay_responder {
                    sm.egress_timestamp(context.sequence_id, egress);
                }
            }
            TxKind::PdelayReq => {
                if let Some(sm) = &mut self.pdelay_initiator {
                    sm.egress_timestamp(context.sequence_id, egress);
                }
            }
            TxKind::Sync => {
                if let Some(sm) = &mut self.sync_send {
                    sm.egress_timestamp(context.sequence_id, egress);
                }
            }
            TxKind::FollowUp | TxKind::Announce | TxKind::PdelayRespFollowUp => {}
        }
    }
}

/// `logMessageInterval` of messages that are not sent periodically.
pub(crate) const LOG_INTERVAL_UNSPECIFIED: i8 = 0x7f;

pub(crate) fn encode(message: &Message) -> Option<Frame> {
    message
        .serialize_frame()
        .map_err(|error| error!(?error, "could not serialize message"))
        .ok()
}

/// Runs `process` of one optional machine.
pub(crate) fn process_optional<T>(
    machine: &mut Option<T>,
    process: impl FnOnce(&mut T) -> PortActionIterator,
) -> PortActionIterator {
    match machine {
        Some(machine) => process(machine),
        None => PortActionIterator::empty(),
    }
}
