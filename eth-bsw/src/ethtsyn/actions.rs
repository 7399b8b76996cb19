//! Side effects requested by the port state machines.
//!
//! State machines never call out to drivers. Each transition returns the
//! actions it wants performed; the runtime executes them after leaving the
//! exclusive area and feeds the outcome (transmit failure, egress
//! timestamp) back into the state machine.

use arrayvec::ArrayVec;

use super::{stats::StatCounter, PortIdx};
use crate::{
    datastructures::messages::{Frame, MessageType},
    drivers::ValidationData,
    time::{Duration, GlobalTime, VirtualLocalTime},
};

/// Kind of a transmitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Sync,
    FollowUp,
    Announce,
    PdelayReq,
    PdelayResp,
    PdelayRespFollowUp,
}

impl TxKind {
    pub fn message_type(self) -> MessageType {
        match self {
            TxKind::Sync => MessageType::Sync,
            TxKind::FollowUp => MessageType::FollowUp,
            TxKind::Announce => MessageType::Announce,
            TxKind::PdelayReq => MessageType::PDelayReq,
            TxKind::PdelayResp => MessageType::PDelayResp,
            TxKind::PdelayRespFollowUp => MessageType::PDelayRespFollowUp,
        }
    }

    pub(crate) fn tx_counter(self) -> StatCounter {
        match self {
            TxKind::Sync => StatCounter::TxSync,
            TxKind::FollowUp => StatCounter::TxFollowUp,
            TxKind::Announce => StatCounter::TxAnnounce,
            TxKind::PdelayReq => StatCounter::TxPdelayRequest,
            TxKind::PdelayResp => StatCounter::TxPdelayResponse,
            TxKind::PdelayRespFollowUp => StatCounter::TxPdelayResponseFollowUp,
        }
    }
}

/// Token handed to the transmitter with every frame and returned with its
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxContext {
    pub port: PortIdx,
    pub kind: TxKind,
    pub sequence_id: u16,
}

impl TxContext {
    pub fn new(port: PortIdx, kind: TxKind, sequence_id: u16) -> Self {
        Self {
            port,
            kind,
            sequence_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PortAction {
    /// Transmit an event message; an egress timestamp is required.
    SendEvent { context: TxContext, data: Frame },
    /// Transmit a general message.
    SendGeneral { context: TxContext, data: Frame },
    /// Hand a synchronization result to the time-base manager.
    SetGlobalTime {
        global: GlobalTime,
        local: VirtualLocalTime,
        path_delay: Duration,
    },
    /// New peer delay outcome. `None` keeps the current delay.
    UpdateLinkDelay {
        as_capable: bool,
        propagation_delay: Option<Duration>,
    },
    Count(StatCounter),
    ReportTimeValidation(ValidationData),
}

const MAX_ACTIONS: usize = 4;

/// An Iterator over [`PortAction`]s
///
/// These are returned by the state machines and must be handled by the
/// runtime.
#[derive(Debug)]
#[must_use]
pub(crate) struct PortActionIterator {
    internal: <ArrayVec<PortAction, MAX_ACTIONS> as IntoIterator>::IntoIter,
}

impl PortActionIterator {
    pub(crate) fn empty() -> Self {
        Self {
            internal: ArrayVec::new().into_iter(),
        }
    }

    pub(crate) fn from(list: ArrayVec<PortAction, MAX_ACTIONS>) -> Self {
        Self {
            internal: list.into_iter(),
        }
    }
}

impl Iterator for PortActionIterator {
    type Item = PortAction;

    fn next(&mut self) -> Option<Self::Item> {
        self.internal.next()
    }
}

/// Collects actions for one transition.
pub(crate) type ActionList = ArrayVec<PortAction, MAX_ACTIONS>;

macro_rules! actions {
    [] => {
        $crate::ethtsyn::actions::PortActionIterator::empty()
    };
    [$($action:expr),+ $(,)?] => {
        {
            let mut list = $crate::ethtsyn::actions::ActionList::new();
            $(list.push($action);)+
            $crate::ethtsyn::actions::PortActionIterator::from(list)
        }
    };
}

pub(crate) use actions;
