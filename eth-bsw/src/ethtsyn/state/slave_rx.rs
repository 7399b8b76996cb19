use tracing::{debug, info, warn};

use super::{PortContext, ResetLatch};
use crate::{
    config::SlaveConfig,
    datastructures::{
        common::{ClockIdentity, PortIdentity},
        messages::{AnnounceMessage, FollowUpMessage, Header},
    },
    drivers::ValidationData,
    ethtsyn::{
        actions::{actions, ActionList, PortAction, PortActionIterator},
        stats::StatCounter,
    },
    time::{Duration, GlobalTime, TimeBaseStatus, VirtualLocalTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaveRxState {
    Initializing,
    WaitSync,
    WaitFollowUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReceivedSync {
    sequence_id: u16,
    source: PortIdentity,
    ingress: VirtualLocalTime,
    correction: Duration,
}

/// Reception of Sync and Follow_Up on a slave port. Every matched pair
/// yields one global time for the time base of the domain.
#[derive(Debug)]
pub(crate) struct SlaveRx {
    follow_up_timeout_ticks: u32,
    state: SlaveRxState,
    reset: ResetLatch,
    timer: u32,
    sync: Option<ReceivedSync>,
    grandmaster: Option<ClockIdentity>,
}

impl SlaveRx {
    pub(crate) fn new(config: &SlaveConfig) -> Self {
        Self::with_timeout(config.follow_up_timeout_ticks)
    }

    fn with_timeout(follow_up_timeout_ticks: u32) -> Self {
        Self {
            follow_up_timeout_ticks,
            state: SlaveRxState::Initializing,
            reset: ResetLatch::default(),
            timer: 0,
            sync: None,
            grandmaster: None,
        }
    }

    pub(crate) fn state(&self) -> SlaveRxState {
        if self.reset.pending() {
            SlaveRxState::Initializing
        } else {
            self.state
        }
    }

    pub(crate) fn grandmaster(&self) -> Option<ClockIdentity> {
        self.grandmaster
    }

    pub(crate) fn request_reset(&mut self) {
        self.reset.request();
    }

    pub(crate) fn process(&mut self, ctx: &PortContext) -> PortActionIterator {
        if self.reset.take() {
            debug!(port = %ctx.port, "sync reception reset");
            *self = Self::with_timeout(self.follow_up_timeout_ticks);
        }

        match self.state {
            SlaveRxState::Initializing => {
                if ctx.link_active {
                    self.state = SlaveRxState::WaitSync;
                }
                actions![]
            }
            SlaveRxState::WaitSync => actions![],
            SlaveRxState::WaitFollowUp => {
                self.timer = self.timer.saturating_sub(1);
                if self.timer > 0 {
                    return actions![];
                }
                debug!(
                    port = %ctx.port,
                    sequence_id = self.sync.map(|sync| sync.sequence_id),
                    "follow up timeout"
                );
                self.state = SlaveRxState::WaitSync;
                self.sync = None;
                actions![PortAction::Count(StatCounter::SyncReceiptTimeout)]
            }
        }
    }

    /// Returns whether the Sync was taken. A newer Sync replaces one still
    /// waiting for its Follow_Up.
    pub(crate) fn proc_rcvd_sync(
        &mut self,
        ctx: &PortContext,
        header: &Header,
        ingress: Option<VirtualLocalTime>,
    ) -> bool {
        let sequence_id = header.sequence_id();
        if self.state() == SlaveRxState::Initializing {
            return false;
        }
        if !ctx.as_capable {
            debug!(port = %ctx.port, sequence_id, "sync ignored, port not as capable");
            return false;
        }
        if !header.two_step_flag() {
            debug!(port = %ctx.port, sequence_id, "one-step sync ignored");
            return false;
        }
        let Some(ingress) = ingress else {
            debug!(port = %ctx.port, sequence_id, "sync without ingress timestamp");
            return false;
        };

        self.sync = Some(ReceivedSync {
            sequence_id,
            source: header.source_port_identity(),
            ingress,
            correction: Duration::from(header.correction_field()),
        });
        self.timer = self.follow_up_timeout_ticks;
        self.state = SlaveRxState::WaitFollowUp;
        true
    }

    pub(crate) fn proc_rcvd_follow_up(
        &mut self,
        ctx: &PortContext,
        message: &FollowUpMessage,
    ) -> PortActionIterator {
        let header = message.header();
        let Some(sync) = self.sync.filter(|sync| {
            self.state() == SlaveRxState::WaitFollowUp
                && sync.sequence_id == header.sequence_id()
                && sync.source == header.source_port_identity()
        }) else {
            debug!(
                port = %ctx.port,
                sequence_id = header.sequence_id(),
                "follow up without matching sync"
            );
            return actions![];
        };
        self.state = SlaveRxState::WaitSync;
        self.sync = None;

        let precise_origin = message.precise_origin_timestamp();
        let correction = sync.correction + Duration::from(header.correction_field());
        let global = match GlobalTime::new(TimeBaseStatus::GLOBAL_TIME_BASE, precise_origin)
            .checked_add(correction + ctx.propagation_delay)
        {
            Ok(global) => global,
            Err(error) => {
                warn!(port = %ctx.port, %error, "received time not representable");
                return actions![];
            }
        };

        let mut actions = ActionList::new();
        actions.push(PortAction::SetGlobalTime {
            global,
            local: sync.ingress,
            path_delay: ctx.propagation_delay,
        });
        if ctx.time_validation {
            actions.push(PortAction::ReportTimeValidation(ValidationData::SyncSlave {
                sequence_id: sync.sequence_id,
                source_port_identity: sync.source,
                sync_ingress: sync.ingress,
                precise_origin,
                correction,
                pdelay: ctx.propagation_delay,
            }));
        }
        PortActionIterator::from(actions)
    }

    pub(crate) fn proc_rcvd_announce(&mut self, ctx: &PortContext, message: &AnnounceMessage) {
        let grandmaster = message.grandmaster_identity();
        if self.grandmaster != Some(grandmaster) {
            info!(
                port = %ctx.port,
                %grandmaster,
                steps_removed = message.steps_removed(),
                "new grandmaster"
            );
            self.grandmaster = Some(grandmaster);
        }
    }
}
