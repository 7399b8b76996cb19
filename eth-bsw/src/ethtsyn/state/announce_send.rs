use tracing::debug;

use super::{encode, PortContext, ResetLatch, SequenceIdGenerator};
use crate::{
    datastructures::messages::Message,
    ethtsyn::actions::{actions, PortAction, PortActionIterator, TxKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceSendState {
    Initializing,
    WaitTxAnnounce,
}

/// Periodic Announce transmission of a master port. The port announces
/// itself as grandmaster; there is no best master selection.
#[derive(Debug)]
pub(crate) struct AnnounceSend {
    interval_ticks: u32,
    log_interval: i8,
    state: AnnounceSendState,
    reset: ResetLatch,
    sequence_ids: SequenceIdGenerator,
    timer: u32,
}

impl AnnounceSend {
    pub(crate) fn new(interval_ticks: u32, log_interval: i8) -> Self {
        Self {
            interval_ticks,
            log_interval,
            state: AnnounceSendState::Initializing,
            reset: ResetLatch::default(),
            sequence_ids: SequenceIdGenerator::new(),
            timer: 0,
        }
    }

    pub(crate) fn state(&self) -> AnnounceSendState {
        if self.reset.pending() {
            AnnounceSendState::Initializing
        } else {
            self.state
        }
    }

    pub(crate) fn request_reset(&mut self) {
        self.reset.request();
    }

    pub(crate) fn process(&mut self, ctx: &PortContext) -> PortActionIterator {
        if self.reset.take() {
            debug!(port = %ctx.port, "announce transmission reset");
            *self = Self::new(self.interval_ticks, self.log_interval);
        }

        match self.state {
            AnnounceSendState::Initializing => {
                if ctx.link_active {
                    self.state = AnnounceSendState::WaitTxAnnounce;
                    self.timer = 0;
                }
                actions![]
            }
            AnnounceSendState::WaitTxAnnounce => {
                self.timer = self.timer.saturating_sub(1);
                if self.timer > 0 || !ctx.tx_allowed || !ctx.as_capable {
                    return actions![];
                }

                let sequence_id = self.sequence_ids.generate();
                let message = Message::builder()
                    .domain_number(ctx.domain_number)
                    .ptp_timescale(true)
                    .source_port_identity(ctx.port_identity)
                    .sequence_id(sequence_id)
                    .log_message_interval(self.log_interval)
                    .announce_message(ctx.port_identity.clock_identity);
                let Some(data) = encode(&message) else {
                    return actions![];
                };
                self.timer = self.interval_ticks;
                actions![PortAction::SendGeneral {
                    context: ctx.tx_context(TxKind::Announce, sequence_id),
                    data,
                }]
            }
        }
    }
}
