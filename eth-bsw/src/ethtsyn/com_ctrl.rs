//! Per-controller setup and teardown on link changes.

use tracing::{debug, info, warn};

use super::{
    error::service, port::Port, swt_mgmt::SwtMgmtPool, ComCtrlIdx, EthTSyn, EthTSynError,
    PortIdx, TimeBaseId,
};
use crate::{
    config::ComCtrlConfig,
    critical::{ExclusiveArea, Region},
    datastructures::{common::ClockIdentity, messages::PTP_MULTICAST_ADDRESS},
    drivers::{EthIfUser, FilterAction, TrcvLinkState},
    ethif::EthIfCtrlIdx,
};

/// Whether time information (Sync, Announce) may be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransmissionMode {
    Off,
    #[default]
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct CtrlLink {
    pub active: bool,
    pub clock_identity: ClockIdentity,
    pub transmission: TransmissionMode,
}

#[derive(Debug)]
pub(crate) struct ComCtrl {
    pub idx: ComCtrlIdx,
    pub config: ComCtrlConfig,
    pub ports: Vec<PortIdx>,
    /// Time base used to timestamp receptions before the port is known.
    pub time_base: Option<TimeBaseId>,
    pub link: ExclusiveArea<CtrlLink>,
    pub swt_mgmt: ExclusiveArea<SwtMgmtPool>,
}

impl ComCtrl {
    pub(crate) fn new(idx: ComCtrlIdx, config: ComCtrlConfig, ports: &[Port]) -> Self {
        let own_ports: Vec<&Port> = ports.iter().filter(|port| port.ctrl == idx).collect();
        Self {
            idx,
            config,
            ports: own_ports.iter().map(|port| port.idx).collect(),
            time_base: own_ports.first().map(|port| port.time_base),
            link: ExclusiveArea::new(Region::LinkState, CtrlLink::default()),
            swt_mgmt: ExclusiveArea::new(Region::Tx, SwtMgmtPool::default()),
        }
    }
}

impl EthTSyn {
    /// Indication of the Ethernet interface that the link of `ethif_ctrl`
    /// changed.
    pub fn trcv_link_state_chg(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        state: TrcvLinkState,
    ) -> Result<(), EthTSynError> {
        let result = self.ctrl(ethif_ctrl).and_then(|ctrl| match state {
            TrcvLinkState::Active => self.link_up(ctrl),
            TrcvLinkState::Down => {
                self.link_down(ctrl);
                Ok(())
            }
        });
        self.checked(service::TRCV_LINK_STATE_CHG, result)
    }

    /// Clock identity and multicast filter are set up before the link is
    /// marked active. A failing driver leaves the link inactive; the next
    /// indication retries.
    fn link_up(&self, ctrl: &ComCtrl) -> Result<(), EthTSynError> {
        if ctrl.link.get().active {
            debug!(ctrl = %ctrl.config.ethif_ctrl, "link already active");
            return Ok(());
        }
        let ethif_ctrl = ctrl.config.ethif_ctrl;

        let mac = self.drivers.transmitter.phys_addr(ethif_ctrl).map_err(|e| {
            warn!(ctrl = %ethif_ctrl, error = %e, "could not read physical address");
            e
        })?;
        self.drivers
            .transmitter
            .update_phys_addr_filter(ethif_ctrl, PTP_MULTICAST_ADDRESS, FilterAction::Add)
            .map_err(|e| {
                warn!(ctrl = %ethif_ctrl, error = %e, "could not add multicast filter");
                e
            })?;
        let clock_identity = ClockIdentity::from_mac_address(mac);

        for port in &ctrl.ports {
            self.ports[port.index()].reset_physical(ctrl.config.debounce_ticks);
        }
        ctrl.link.with(|link| {
            link.clock_identity = clock_identity;
            link.active = true;
        });

        info!(ctrl = %ethif_ctrl, %clock_identity, "time synchronization link up");
        Ok(())
    }

    fn link_down(&self, ctrl: &ComCtrl) {
        let was_active = ctrl
            .link
            .with(|link| core::mem::replace(&mut link.active, false));
        if !was_active {
            debug!(ctrl = %ctrl.config.ethif_ctrl, "link already down");
            return;
        }
        let ethif_ctrl = ctrl.config.ethif_ctrl;

        if let Err(error) = self.drivers.transmitter.update_phys_addr_filter(
            ethif_ctrl,
            PTP_MULTICAST_ADDRESS,
            FilterAction::Remove,
        ) {
            warn!(ctrl = %ethif_ctrl, %error, "could not remove multicast filter");
        }

        for port in &ctrl.ports {
            let port = &self.ports[port.index()];
            port.machines.with(|machines| machines.request_reset());
            port.reset_physical(0);
        }
        let released = ctrl.swt_mgmt.with(|pool| pool.release_all());
        if released > 0 {
            debug!(ctrl = %ethif_ctrl, released, "parked frames released");
        }

        info!(ctrl = %ethif_ctrl, "time synchronization link down");
    }

    pub fn set_transmission_mode(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        mode: TransmissionMode,
    ) -> Result<(), EthTSynError> {
        let result = self.ctrl(ethif_ctrl).map(|ctrl| {
            ctrl.link.with(|link| link.transmission = mode);
            debug!(ctrl = %ethif_ctrl, ?mode, "transmission mode set");
        });
        self.checked(service::SET_TRANSMISSION_MODE, result)
    }

    pub fn link_active(&self, ethif_ctrl: EthIfCtrlIdx) -> Result<bool, EthTSynError> {
        let result = self.ctrl(ethif_ctrl).map(|ctrl| ctrl.link.get().active);
        self.checked(service::GET_PORT_STATE, result)
    }

    /// Identity derived at the last link-up, zero before the first one.
    pub fn clock_identity(&self, ethif_ctrl: EthIfCtrlIdx) -> Result<ClockIdentity, EthTSynError> {
        let result = self
            .ctrl(ethif_ctrl)
            .map(|ctrl| ctrl.link.get().clock_identity);
        self.checked(service::GET_PORT_STATE, result)
    }
}

/// Link changes of the Ethernet interface drive the controllers with the
/// same index. Controllers without time synchronization are skipped.
impl EthIfUser for EthTSyn {
    fn ctrl_link_state_changed(&self, ctrl: EthIfCtrlIdx, state: TrcvLinkState) {
        if self.ctrl(ctrl).is_err() {
            return;
        }
        if let Err(error) = self.trcv_link_state_chg(ctrl, state) {
            debug!(%ctrl, %error, "link state change not applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        ethtsyn::{
            test::{ethtsyn, master_config, FakeNetwork, MAC},
            PdelayResponderState, SyncSendState,
        },
        time::Duration,
    };

    const CTRL: EthIfCtrlIdx = EthIfCtrlIdx(2);

    #[test]
    fn link_up_sets_identity_and_filter() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(master_config(), &net);

        assert_eq!(ethtsyn.link_active(CTRL), Ok(false));
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        assert_eq!(ethtsyn.link_active(CTRL), Ok(true));
        assert_eq!(
            ethtsyn.clock_identity(CTRL),
            Ok(ClockIdentity::from_mac_address(MAC))
        );
        assert_eq!(
            *net.filters.borrow(),
            vec![(PTP_MULTICAST_ADDRESS, FilterAction::Add)]
        );

        // repeated indication changes nothing
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        assert_eq!(net.filters.borrow().len(), 1);
    }

    #[test]
    fn link_down_resets_machines() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(master_config(), &net);
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        ethtsyn.main_function();
        ethtsyn.main_function();
        assert_eq!(
            ethtsyn.sync_send_state(PortIdx(0)),
            Ok(Some(SyncSendState::WaitSyncEgrTs))
        );

        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Down).unwrap();
        assert_eq!(ethtsyn.link_active(CTRL), Ok(false));
        assert_eq!(
            ethtsyn.sync_send_state(PortIdx(0)),
            Ok(Some(SyncSendState::Initializing))
        );
        assert_eq!(
            ethtsyn.pdelay_responder_state(PortIdx(0)),
            Ok(Some(PdelayResponderState::Initializing))
        );
        assert_eq!(
            net.filters.borrow().last(),
            Some(&(PTP_MULTICAST_ADDRESS, FilterAction::Remove))
        );

        ethtsyn.main_function();
        assert_eq!(
            ethtsyn.sync_send_state(PortIdx(0)),
            Ok(Some(SyncSendState::Initializing))
        );
        assert_eq!(ethtsyn.propagation_delay(PortIdx(0)), Ok(Duration::ZERO));
    }

    #[test]
    fn debounce_delays_time_transmission() {
        let mut config = master_config();
        config.controllers[0].debounce_ticks = 3;
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(config, &net);
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();

        ethtsyn.main_function();
        ethtsyn.main_function();
        assert!(net.sent.borrow().is_empty());
        ethtsyn.main_function();
        assert_eq!(net.sent.borrow().len(), 1);
    }

    #[test]
    fn transmission_mode_off_silences_sync() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(master_config(), &net);
        ethtsyn.set_transmission_mode(CTRL, TransmissionMode::Off).unwrap();
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();

        for _ in 0..5 {
            ethtsyn.main_function();
        }
        assert!(net.sent.borrow().is_empty());

        ethtsyn.set_transmission_mode(CTRL, TransmissionMode::On).unwrap();
        ethtsyn.main_function();
        assert_eq!(net.sent.borrow().len(), 1);
    }
}
