//! Execution of state machine actions and transmit confirmations.

use tracing::{debug, trace, warn};

use super::{
    actions::{PortAction, PortActionIterator, TxKind},
    com_ctrl::ComCtrl,
    error::service,
    port::Port,
    EthTSyn, EthTSynError, TimeBaseId, TxContext,
};
use crate::{
    datastructures::common::WireTimestamp, ethif::EthIfCtrlIdx, time::VirtualLocalTime,
};

impl EthTSyn {
    /// Perform the actions of one state machine input. Runs outside of any
    /// exclusive area.
    pub(crate) fn execute(&self, port: &Port, actions: PortActionIterator) {
        for action in actions {
            match action {
                PortAction::SendEvent { context, data } => self.transmit(port, context, &data, true),
                PortAction::SendGeneral { context, data } => {
                    self.transmit(port, context, &data, false)
                }
                PortAction::SetGlobalTime {
                    global,
                    local,
                    path_delay,
                } => {
                    debug!(port = %port.idx, %global, %local, "global time received");
                    if let Err(error) = self.drivers.time_base_manager.bus_set_global_time(
                        port.time_base,
                        &global,
                        local,
                        path_delay,
                    ) {
                        warn!(port = %port.idx, %error, "time base rejected global time");
                    }
                }
                PortAction::UpdateLinkDelay {
                    as_capable,
                    propagation_delay,
                } => port.physical.with(|physical| {
                    physical.as_capable = as_capable;
                    if let Some(delay) = propagation_delay {
                        physical.propagation_delay = delay;
                    }
                }),
                PortAction::Count(counter) => port.stats.with(|stats| stats.increment(counter)),
                PortAction::ReportTimeValidation(data) => self
                    .drivers
                    .time_base_manager
                    .report_time_validation(port.time_base, &data),
            }
        }
    }

    fn transmit(&self, port: &Port, context: TxContext, data: &[u8], event: bool) {
        let ctrl = &self.ctrls[port.ctrl.index()];
        match self.drivers.transmitter.transmit(
            ctrl.config.ethif_ctrl,
            data,
            ctrl.config.frame_priority,
            context,
            event,
        ) {
            Ok(()) => {
                trace!(port = %port.idx, kind = ?context.kind, sequence_id = context.sequence_id, "sent");
                port.stats.with(|stats| stats.increment(context.kind.tx_counter()));
                if context.kind == TxKind::Sync {
                    port.physical
                        .with(|physical| physical.debounce_timer = ctrl.config.debounce_ticks);
                }
            }
            Err(error) => {
                debug!(port = %port.idx, kind = ?context.kind, %error, "transmission rejected");
                port.machines.with(|machines| machines.tx_failed(context));
            }
        }
    }

    /// Read the time of a reception or transmission: the hardware timestamp
    /// if the controller provides them, otherwise the current virtual local
    /// time.
    pub(crate) fn capture_time(
        &self,
        ctrl: &ComCtrl,
        time_base: Option<TimeBaseId>,
        hardware: Option<WireTimestamp>,
    ) -> Option<VirtualLocalTime> {
        if ctrl.config.hardware_timestamping {
            let timestamp = hardware?;
            VirtualLocalTime::try_from(timestamp)
                .map_err(|error| debug!(%timestamp, %error, "invalid hardware timestamp"))
                .ok()
        } else {
            self.drivers
                .time_base_manager
                .virtual_local_time(time_base?)
                .map_err(|error| debug!(%error, "virtual local time unavailable"))
                .ok()
        }
    }

    /// Confirmation of a frame handed to the transmitter, with its egress
    /// timestamp if the hardware took one.
    pub fn tx_confirmation(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        context: TxContext,
        egress: Option<WireTimestamp>,
    ) -> Result<(), EthTSynError> {
        let result = self.tx_confirmation_inner(ethif_ctrl, context, egress);
        self.checked(service::TX_CONFIRMATION, result)
    }

    fn tx_confirmation_inner(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        context: TxContext,
        egress: Option<WireTimestamp>,
    ) -> Result<(), EthTSynError> {
        let ctrl = self.ctrl(ethif_ctrl)?;
        let port = self.port(context.port)?;
        if port.ctrl != ctrl.idx {
            return Err(EthTSynError::InvalidParam("port not on controller"));
        }
        if !context.kind.message_type().is_event() {
            return Ok(());
        }

        let egress = self.capture_time(ctrl, Some(port.time_base), egress);
        trace!(port = %port.idx, kind = ?context.kind, ?egress, "transmit confirmed");
        port.machines
            .with(|machines| machines.egress_timestamp(context, egress));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        drivers::TrcvLinkState,
        ethtsyn::{
            test::{ethtsyn, master_config, FakeNetwork},
            PortIdx, SyncSendState,
        },
    };

    const CTRL: EthIfCtrlIdx = EthIfCtrlIdx(2);

    #[test]
    fn sync_confirmation_triggers_follow_up() {
        let net = Rc::new(FakeNetwork::default());
        net.global_secs.set(1_000);
        let (ethtsyn, _) = ethtsyn(master_config(), &net);
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        ethtsyn.main_function();
        ethtsyn.main_function();

        let context = net.sent.borrow()[0].2;
        net.local_time.set(250);
        ethtsyn.tx_confirmation(CTRL, context, None).unwrap();
        assert_eq!(
            ethtsyn.sync_send_state(PortIdx(0)),
            Ok(Some(SyncSendState::TxFollowUp))
        );

        ethtsyn.main_function();
        let sent = net.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].2.kind, TxKind::FollowUp);
        let stats = ethtsyn.port_statistics(PortIdx(0)).unwrap();
        assert_eq!(stats.tx_sync_count, 1);
        assert_eq!(stats.tx_follow_up_count, 1);
    }

    #[test]
    fn rejected_transmission_is_not_counted() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(master_config(), &net);
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        net.reject_transmit.set(true);
        ethtsyn.main_function();
        ethtsyn.main_function();

        assert_eq!(ethtsyn.port_statistics(PortIdx(0)).unwrap().tx_sync_count, 0);
        assert_eq!(
            ethtsyn.sync_send_state(PortIdx(0)),
            Ok(Some(SyncSendState::WaitTxSync))
        );

        net.reject_transmit.set(false);
        ethtsyn.main_function();
        assert_eq!(ethtsyn.port_statistics(PortIdx(0)).unwrap().tx_sync_count, 1);
    }

    #[test]
    fn confirmation_for_unknown_port() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, tracer) = ethtsyn(master_config(), &net);
        let context = TxContext::new(PortIdx(7), TxKind::Sync, 0);
        assert_eq!(
            ethtsyn.tx_confirmation(CTRL, context, None),
            Err(EthTSynError::InvalidPort(7))
        );
        assert_eq!(tracer.errors.borrow().len(), 1);
    }
}
