use tracing::debug;

use super::{encode, PortContext, ResetLatch, SequenceIdGenerator};
use crate::{
    config::MasterConfig,
    datastructures::{
        common::{FollowUpInformationTlv, WireTimestamp},
        messages::Message,
    },
    drivers::ValidationData,
    ethtsyn::actions::{actions, ActionList, PortAction, PortActionIterator, TxKind},
    time::VirtualLocalTime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncSendState {
    Initializing,
    WaitTxSync,
    WaitSyncEgrTs,
    TxFollowUp,
}

/// Periodic two-step Sync transmission of a master port.
#[derive(Debug)]
pub(crate) struct SyncSend {
    interval_ticks: u32,
    log_interval: i8,
    state: SyncSendState,
    reset: ResetLatch,
    sequence_ids: SequenceIdGenerator,
    timer: u32,
    sequence_id: u16,
    egress: Option<VirtualLocalTime>,
}

impl SyncSend {
    pub(crate) fn new(config: &MasterConfig) -> Self {
        Self {
            interval_ticks: config.sync_interval_ticks,
            log_interval: config.log_sync_interval,
            state: SyncSendState::Initializing,
            reset: ResetLatch::default(),
            sequence_ids: SequenceIdGenerator::new(),
            timer: 0,
            sequence_id: 0,
            egress: None,
        }
    }

    pub(crate) fn state(&self) -> SyncSendState {
        if self.reset.pending() {
            SyncSendState::Initializing
        } else {
            self.state
        }
    }

    pub(crate) fn request_reset(&mut self) {
        self.reset.request();
    }

    pub(crate) fn process(&mut self, ctx: &PortContext) -> PortActionIterator {
        if self.reset.take() {
            debug!(port = %ctx.port, "sync transmission reset");
            *self = Self {
                interval_ticks: self.interval_ticks,
                log_interval: self.log_interval,
                state: SyncSendState::Initializing,
                reset: ResetLatch::default(),
                sequence_ids: SequenceIdGenerator::new(),
                timer: 0,
                sequence_id: 0,
                egress: None,
            };
        }

        if self.state == SyncSendState::Initializing {
            if ctx.link_active {
                self.state = SyncSendState::WaitTxSync;
                self.timer = 0;
            }
            return actions![];
        }

        self.timer = self.timer.saturating_sub(1);
        match self.state {
            SyncSendState::Initializing => actions![],
            SyncSendState::WaitTxSync => {
                if self.timer == 0 && ctx.tx_allowed && ctx.as_capable {
                    self.send_sync(ctx)
                } else {
                    actions![]
                }
            }
            SyncSendState::WaitSyncEgrTs => {
                if self.timer == 0 {
                    debug!(
                        port = %ctx.port,
                        sequence_id = self.sequence_id,
                        "no sync egress timestamp within the sync interval"
                    );
                    self.state = SyncSendState::WaitTxSync;
                }
                actions![]
            }
            SyncSendState::TxFollowUp => self.send_follow_up(ctx),
        }
    }

    pub(crate) fn tx_failed(&mut self, sequence_id: u16) {
        if self.state() == SyncSendState::WaitSyncEgrTs && self.sequence_id == sequence_id {
            debug!(sequence_id, "sync not sent, retrying");
            self.state = SyncSendState::WaitTxSync;
            self.timer = 0;
        }
    }

    pub(crate) fn egress_timestamp(&mut self, sequence_id: u16, egress: Option<VirtualLocalTime>) {
        if self.state() != SyncSendState::WaitSyncEgrTs || self.sequence_id != sequence_id {
            return;
        }
        match egress {
            Some(egress) => {
                self.egress = Some(egress);
                self.state = SyncSendState::TxFollowUp;
            }
            None => {
                debug!(sequence_id, "no egress timestamp for sync");
                self.state = SyncSendState::WaitTxSync;
            }
        }
    }

    fn send_sync(&mut self, ctx: &PortContext) -> PortActionIterator {
        let sequence_id = self.sequence_ids.generate();
        let message = Message::builder()
            .domain_number(ctx.domain_number)
            .two_step_flag(true)
            .source_port_identity(ctx.port_identity)
            .sequence_id(sequence_id)
            .log_message_interval(self.log_interval)
            .sync_message(WireTimestamp::default());
        let Some(data) = encode(&message) else {
            return actions![];
        };

        self.sequence_id = sequence_id;
        self.egress = None;
        self.timer = self.interval_ticks;
        self.state = SyncSendState::WaitSyncEgrTs;
        actions![PortAction::SendEvent {
            context: ctx.tx_context(TxKind::Sync, sequence_id),
            data,
        }]
    }

    fn send_follow_up(&mut self, ctx: &PortContext) -> PortActionIterator {
        self.state = SyncSendState::WaitTxSync;
        let Some(egress) = self.egress.take() else {
            return actions![];
        };
        let Some(reference) = ctx.reference else {
            debug!(port = %ctx.port, "time base unavailable, follow up dropped");
            return actions![];
        };
        let precise_origin = match reference.global_at(egress) {
            Ok(global) => global.timestamp,
            Err(error) => {
                debug!(port = %ctx.port, %error, "sync egress not representable as global time");
                return actions![];
            }
        };

        let message = Message::builder()
            .domain_number(ctx.domain_number)
            .source_port_identity(ctx.port_identity)
            .sequence_id(self.sequence_id)
            .log_message_interval(self.log_interval)
            .follow_up_message(precise_origin, FollowUpInformationTlv::default());
        let Some(data) = encode(&message) else {
            return actions![];
        };

        let mut actions = ActionList::new();
        actions.push(PortAction::SendGeneral {
            context: ctx.tx_context(TxKind::FollowUp, self.sequence_id),
            data,
        });
        if ctx.time_validation {
            actions.push(PortAction::ReportTimeValidation(ValidationData::SyncMaster {
                sequence_id: self.sequence_id,
                source_port_identity: ctx.port_identity,
                sync_egress: egress,
                precise_origin,
            }));
        }
        PortActionIterator::from(actions)
    }
}
