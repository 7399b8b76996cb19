//! MACsec support: secure channel state of link elements and forwarding of
//! secure association management to the controller's MACsec driver.

use tracing::debug;

use super::{error::service, EthIf, EthIfCtrlIdx, EthIfError, PhysLinkState, SwitchPortIdx, TrcvIdx};
use crate::drivers::{MacsecOps, SaDirection, SecYUpdate, SecureAssociation};

/// A physical element that can carry a MACsec secured link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkElement {
    Transceiver(TrcvIdx),
    SwitchPort(SwitchPortIdx),
}

impl EthIf {
    /// Key agreement reports the secure channel of an element up or down.
    ///
    /// The stored state moves between `PhyActive` and `Active`; the change
    /// is picked up by the next link state detection.
    pub fn mac_sec_operational(
        &self,
        element: LinkElement,
        operational: bool,
    ) -> Result<(), EthIfError> {
        let result = self.mac_sec_operational_inner(element, operational);
        self.checked(service::MACSEC_OPERATIONAL, result)
    }

    fn mac_sec_operational_inner(
        &self,
        element: LinkElement,
        operational: bool,
    ) -> Result<(), EthIfError> {
        let macsec = match element {
            LinkElement::Transceiver(trcv) => self
                .config
                .transceivers
                .get(trcv.index())
                .ok_or(EthIfError::InvalidTrcvIdx(trcv.0))?
                .macsec,
            LinkElement::SwitchPort(port) => self
                .config
                .switch_ports
                .get(port.index())
                .ok_or(EthIfError::InvalidSwitchPortIdx(port.0))?
                .macsec,
        };
        if !macsec {
            return Err(EthIfError::InvalidParam("element is not MACsec secured"));
        }

        self.state.with(|s| {
            let state = match element {
                LinkElement::Transceiver(trcv) => &mut s.trcvs[trcv.index()],
                LinkElement::SwitchPort(port) => &mut s.ports[port.index()],
            };
            state.secure = operational;
            state.link = match (state.link, operational) {
                (PhysLinkState::PhyActive, true) => PhysLinkState::Active,
                (PhysLinkState::Active, false) => PhysLinkState::PhyActive,
                (link, _) => link,
            };
        });
        debug!(?element, operational, "secure channel state changed");
        Ok(())
    }

    fn macsec_driver(&self, ctrl: EthIfCtrlIdx) -> Result<(u8, &dyn MacsecOps), EthIfError> {
        self.check_ctrl(ctrl)?;
        let config = &self.config.controllers[ctrl.index()];
        if !config.macsec {
            return Err(EthIfError::InvalidParam("controller is not MACsec secured"));
        }
        let driver = self
            .drivers
            .macsec
            .as_deref()
            .ok_or(EthIfError::NoDriver("MACsec"))?;
        Ok((config.eth_ctrl, driver))
    }

    pub fn mac_sec_update_secy(
        &self,
        ctrl: EthIfCtrlIdx,
        update: &SecYUpdate,
    ) -> Result<(), EthIfError> {
        let result = self
            .macsec_driver(ctrl)
            .and_then(|(eth_ctrl, driver)| Ok(driver.update_secy(eth_ctrl, update)?));
        self.checked(service::MACSEC_UPDATE_SECY, result)
    }

    pub fn mac_sec_add_rx_sa(
        &self,
        ctrl: EthIfCtrlIdx,
        sa: &SecureAssociation,
    ) -> Result<(), EthIfError> {
        let result = self
            .macsec_driver(ctrl)
            .and_then(|(eth_ctrl, driver)| Ok(driver.add_sa(eth_ctrl, SaDirection::Rx, sa)?));
        self.checked(service::MACSEC_ADD_RX_SA, result)
    }

    pub fn mac_sec_add_tx_sa(
        &self,
        ctrl: EthIfCtrlIdx,
        sa: &SecureAssociation,
    ) -> Result<(), EthIfError> {
        let result = self
            .macsec_driver(ctrl)
            .and_then(|(eth_ctrl, driver)| Ok(driver.add_sa(eth_ctrl, SaDirection::Tx, sa)?));
        self.checked(service::MACSEC_ADD_TX_SA, result)
    }

    pub fn mac_sec_delete_sa(
        &self,
        ctrl: EthIfCtrlIdx,
        direction: SaDirection,
        association_number: u8,
    ) -> Result<(), EthIfError> {
        let result = self.macsec_driver(ctrl).and_then(|(eth_ctrl, driver)| {
            Ok(driver.delete_sa(eth_ctrl, direction, association_number)?)
        });
        self.checked(service::MACSEC_DELETE_SA, result)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        config::{ControllerConfig, EthIfConfig, TransceiverConfig},
        drivers::{DriverError, EthMode, TrcvLinkState},
        error::test::RecordingTracer,
        ethif::{
            test::{Fake, FakeHardware},
            EthIfDrivers, LinkFsmState,
        },
    };

    #[derive(Default)]
    struct FakeMacsec {
        calls: RefCell<Vec<(u8, SaDirection, u8)>>,
    }

    impl MacsecOps for Rc<FakeMacsec> {
        fn update_secy(&self, _eth_ctrl: u8, _update: &SecYUpdate) -> Result<(), DriverError> {
            Ok(())
        }

        fn add_sa(
            &self,
            eth_ctrl: u8,
            direction: SaDirection,
            sa: &SecureAssociation,
        ) -> Result<(), DriverError> {
            self.calls
                .borrow_mut()
                .push((eth_ctrl, direction, sa.association_number));
            Ok(())
        }

        fn delete_sa(
            &self,
            _eth_ctrl: u8,
            _direction: SaDirection,
            _association_number: u8,
        ) -> Result<(), DriverError> {
            Err(DriverError::NotOk)
        }
    }

    fn secured_config() -> EthIfConfig {
        EthIfConfig {
            controllers: vec![ControllerConfig {
                eth_ctrl: 2,
                link_aggr_threshold: 1,
                macsec: true,
            }],
            transceivers: vec![TransceiverConfig {
                trcv: 0,
                controllers: vec![EthIfCtrlIdx(0)],
                macsec: true,
                pae: Some(9),
            }],
            switch_ports: vec![],
            port_groups: vec![],
        }
    }

    fn secured_ethif(hw: &Rc<FakeHardware>, macsec: Option<Rc<FakeMacsec>>) -> EthIf {
        EthIf::new(
            secured_config(),
            EthIfDrivers {
                controller: Box::new(Fake(hw.clone())),
                transceiver: Some(Box::new(Fake(hw.clone()))),
                switch: None,
                macsec: macsec.map(|m| Box::new(m) as Box<dyn MacsecOps>),
                key_agreement: Some(Box::new(Fake(hw.clone()))),
            },
            vec![Box::new(Fake(hw.clone()))],
            Box::new(RecordingTracer::default()),
        )
        .unwrap()
    }

    #[test]
    fn link_counts_only_once_secured() {
        let hw = Rc::new(FakeHardware::default());
        *hw.trcv_links.borrow_mut() = vec![TrcvLinkState::Active];
        let ethif = secured_ethif(&hw, None);
        let ctrl = EthIfCtrlIdx(0);
        ethif.set_controller_mode(ctrl, EthMode::Active).unwrap();

        ethif.main_function_state();
        assert_eq!(
            ethif.trcv_link_state(TrcvIdx(0)),
            Ok(PhysLinkState::PhyActive)
        );
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::NoLink));
        assert_eq!(
            *hw.key_agreement.borrow(),
            vec![(9, TrcvLinkState::Active)]
        );

        ethif
            .mac_sec_operational(LinkElement::Transceiver(TrcvIdx(0)), true)
            .unwrap();
        assert_eq!(ethif.trcv_link_state(TrcvIdx(0)), Ok(PhysLinkState::Active));
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::Link));

        // key agreement is only told about physical changes
        assert_eq!(hw.key_agreement.borrow().len(), 1);

        ethif
            .mac_sec_operational(LinkElement::Transceiver(TrcvIdx(0)), false)
            .unwrap();
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::NoLink));
    }

    #[test]
    fn reconnected_link_waits_for_new_secure_channel() {
        let hw = Rc::new(FakeHardware::default());
        *hw.trcv_links.borrow_mut() = vec![TrcvLinkState::Active];
        let ethif = secured_ethif(&hw, None);
        let ctrl = EthIfCtrlIdx(0);
        ethif.set_controller_mode(ctrl, EthMode::Active).unwrap();
        ethif.main_function_state();
        ethif
            .mac_sec_operational(LinkElement::Transceiver(TrcvIdx(0)), true)
            .unwrap();
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::Link));

        hw.trcv_links.borrow_mut()[0] = TrcvLinkState::Down;
        ethif.main_function_state();
        assert_eq!(ethif.trcv_link_state(TrcvIdx(0)), Ok(PhysLinkState::Down));
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::NoLink));

        hw.trcv_links.borrow_mut()[0] = TrcvLinkState::Active;
        ethif.main_function_state();
        assert_eq!(
            ethif.trcv_link_state(TrcvIdx(0)),
            Ok(PhysLinkState::PhyActive)
        );
        assert_eq!(ethif.ctrl_link_fsm_state(ctrl), Ok(LinkFsmState::NoLink));
        assert_eq!(
            *hw.key_agreement.borrow(),
            vec![
                (9, TrcvLinkState::Active),
                (9, TrcvLinkState::Down),
                (9, TrcvLinkState::Active)
            ]
        );
    }

    #[test]
    fn secure_associations_are_forwarded() {
        let hw = Rc::new(FakeHardware::default());
        let macsec = Rc::new(FakeMacsec::default());
        let ethif = secured_ethif(&hw, Some(macsec.clone()));
        let sa = SecureAssociation {
            association_number: 1,
            next_packet_number: 1,
            secure_channel_identifier: 0x0011_2233_4455_0001,
            key: vec![0; 16],
        };

        ethif.mac_sec_add_rx_sa(EthIfCtrlIdx(0), &sa).unwrap();
        ethif.mac_sec_add_tx_sa(EthIfCtrlIdx(0), &sa).unwrap();
        assert_eq!(
            *macsec.calls.borrow(),
            vec![(2, SaDirection::Rx, 1), (2, SaDirection::Tx, 1)]
        );
        assert_eq!(
            ethif.mac_sec_delete_sa(EthIfCtrlIdx(0), SaDirection::Rx, 1),
            Err(EthIfError::Driver(DriverError::NotOk))
        );
    }

    #[test]
    fn missing_macsec_driver() {
        let hw = Rc::new(FakeHardware::default());
        let ethif = secured_ethif(&hw, None);
        let update = SecYUpdate {
            replay_protect: true,
            replay_window: 0,
            protect_frames: true,
        };
        assert_eq!(
            ethif.mac_sec_update_secy(EthIfCtrlIdx(0), &update),
            Err(EthIfError::NoDriver("MACsec"))
        );
    }
}
