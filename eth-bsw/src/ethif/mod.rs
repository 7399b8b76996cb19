//! The Ethernet interface: link state aggregation and mode control across
//! controllers, transceivers and switch ports.

use tracing::{debug, info, warn};

use crate::{
    config::{EthIfConfig, PortGroupSemantic},
    critical::{ExclusiveArea, Region},
    drivers::{
        ControllerDriver, EthIfUser, EthMode, KeyAgreement, MacsecOps, SwitchDriver,
        TransceiverDriver, TrcvLinkState,
    },
    error::{report, ErrorTracer, ModuleId},
};

mod error;
mod link;
mod macsec;

pub use error::EthIfError;
pub use link::{port_group_link_active, LinkFsmState, PhysLinkState, PortGroupCounters};
pub use macsec::LinkElement;

use error::service;
use link::{collect_snapshot, element_state, port_groups_link_up};

index_type!(
    /// Index of a logical controller of the Ethernet interface.
    EthIfCtrlIdx(u8)
);
index_type!(TrcvIdx(u8));
index_type!(SwitchPortIdx(u8));
index_type!(PortGroupIdx(u8));

/// The drivers the Ethernet interface calls into.
pub struct EthIfDrivers {
    pub controller: Box<dyn ControllerDriver>,
    pub transceiver: Option<Box<dyn TransceiverDriver>>,
    pub switch: Option<Box<dyn SwitchDriver>>,
    pub macsec: Option<Box<dyn MacsecOps>>,
    pub key_agreement: Option<Box<dyn KeyAgreement>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CtrlState {
    mode: EthMode,
    link: LinkFsmState,
    link_count: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct ElementState {
    /// Number of controllers and port groups that requested the element
    /// active. The element is polled while this is non-zero.
    active_requests: u8,
    link: PhysLinkState,
    secure: bool,
}

impl ElementState {
    fn is_active(&self) -> bool {
        self.active_requests > 0
    }

    /// A secure channel does not survive the loss of the physical link.
    fn set_link(&mut self, link: PhysLinkState) {
        if link == PhysLinkState::Down {
            self.secure = false;
        }
        self.link = link;
    }

    /// Account for one more or one less requester. Returns the new mode if
    /// the element has to be switched.
    fn request(&mut self, mode: EthMode) -> Option<EthMode> {
        match mode {
            EthMode::Active => {
                self.active_requests = self.active_requests.saturating_add(1);
                (self.active_requests == 1).then_some(EthMode::Active)
            }
            EthMode::Down => {
                let was_active = self.is_active();
                self.active_requests = self.active_requests.saturating_sub(1);
                if was_active && !self.is_active() {
                    self.set_link(PhysLinkState::Down);
                    Some(EthMode::Down)
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupState {
    mode: EthMode,
    link: LinkFsmState,
    counters: PortGroupCounters,
}

#[derive(Debug, Default)]
struct LinkData {
    ctrls: Vec<CtrlState>,
    trcvs: Vec<ElementState>,
    ports: Vec<ElementState>,
    groups: Vec<GroupState>,
}

/// Elements whose mode has to be changed after a mode request.
#[derive(Debug, Default)]
struct ModeChanges {
    trcvs: Vec<(TrcvIdx, EthMode)>,
    ports: Vec<(SwitchPortIdx, EthMode)>,
}

pub struct EthIf {
    config: EthIfConfig,
    drivers: EthIfDrivers,
    users: Vec<Box<dyn EthIfUser>>,
    tracer: Box<dyn ErrorTracer>,
    state: ExclusiveArea<LinkData>,
}

impl EthIf {
    pub fn new(
        config: EthIfConfig,
        drivers: EthIfDrivers,
        users: Vec<Box<dyn EthIfUser>>,
        tracer: Box<dyn ErrorTracer>,
    ) -> Result<Self, EthIfError> {
        let result = Self::check_init(&config, &drivers);
        if let Err(e) = &result {
            report(tracer.as_ref(), ModuleId::EthIf, service::INIT, e.report());
        }
        result?;

        let state = LinkData {
            ctrls: vec![CtrlState::default(); config.controllers.len()],
            trcvs: vec![ElementState::default(); config.transceivers.len()],
            ports: vec![ElementState::default(); config.switch_ports.len()],
            groups: vec![GroupState::default(); config.port_groups.len()],
        };

        info!(
            controllers = config.controllers.len(),
            transceivers = config.transceivers.len(),
            switch_ports = config.switch_ports.len(),
            port_groups = config.port_groups.len(),
            "ethernet interface initialized"
        );

        Ok(Self {
            config,
            drivers,
            users,
            tracer,
            state: ExclusiveArea::new(Region::LinkState, state),
        })
    }

    fn check_init(config: &EthIfConfig, drivers: &EthIfDrivers) -> Result<(), EthIfError> {
        config.validate()?;
        if !config.transceivers.is_empty() && drivers.transceiver.is_none() {
            return Err(EthIfError::NoDriver("transceiver"));
        }
        if !config.switch_ports.is_empty() && drivers.switch.is_none() {
            return Err(EthIfError::NoDriver("switch"));
        }
        Ok(())
    }

    pub fn config(&self) -> &EthIfConfig {
        &self.config
    }

    /// Report an error returned by a public operation and pass it on.
    fn checked<T>(&self, service: u8, result: Result<T, EthIfError>) -> Result<T, EthIfError> {
        if let Err(e) = &result {
            report(self.tracer.as_ref(), ModuleId::EthIf, service, e.report());
        }
        result
    }

    fn check_ctrl(&self, ctrl: EthIfCtrlIdx) -> Result<(), EthIfError> {
        if ctrl.index() < self.config.controllers.len() {
            Ok(())
        } else {
            Err(EthIfError::InvalidCtrlIdx(ctrl.0))
        }
    }

    fn check_port_group(&self, group: PortGroupIdx) -> Result<(), EthIfError> {
        if group.index() < self.config.port_groups.len() {
            Ok(())
        } else {
            Err(EthIfError::InvalidPortGroupIdx(group.0))
        }
    }

    /// Switch a controller and every transceiver and switch port mapped to
    /// it. Elements shared with other active controllers stay active.
    pub fn set_controller_mode(&self, ctrl: EthIfCtrlIdx, mode: EthMode) -> Result<(), EthIfError> {
        let result = self.set_controller_mode_inner(ctrl, mode);
        self.checked(service::SET_CONTROLLER_MODE, result)
    }

    fn set_controller_mode_inner(&self, ctrl: EthIfCtrlIdx, mode: EthMode) -> Result<(), EthIfError> {
        self.check_ctrl(ctrl)?;
        let eth_ctrl = self.config.controllers[ctrl.index()].eth_ctrl;

        if self.state.with(|s| s.ctrls[ctrl.index()].mode) == mode {
            debug!(%ctrl, ?mode, "controller already in requested mode");
            return Ok(());
        }

        self.drivers.controller.set_mode(eth_ctrl, mode)?;

        let changes = self.state.with(|s| {
            let mut changes = ModeChanges::default();
            if s.ctrls[ctrl.index()].mode == mode {
                return changes;
            }
            s.ctrls[ctrl.index()].mode = mode;
            for (index, trcv) in self.config.transceivers.iter().enumerate() {
                if trcv.controllers.contains(&ctrl) {
                    if let Some(change) = s.trcvs[index].request(mode) {
                        changes.trcvs.push((TrcvIdx(index as u8), change));
                    }
                }
            }
            for (index, port) in self.config.switch_ports.iter().enumerate() {
                if port.controllers.contains(&ctrl) {
                    if let Some(change) = s.ports[index].request(mode) {
                        changes.ports.push((SwitchPortIdx(index as u8), change));
                    }
                }
            }
            changes
        });

        info!(%ctrl, ?mode, "controller mode changed");
        self.apply_mode_changes(changes);
        Ok(())
    }

    fn apply_mode_changes(&self, changes: ModeChanges) {
        if let Some(driver) = &self.drivers.transceiver {
            for (trcv, mode) in changes.trcvs {
                let hw = self.config.transceivers[trcv.index()].trcv;
                if let Err(e) = driver.set_mode(hw, mode) {
                    warn!(%trcv, ?mode, error = %e, "could not switch transceiver mode");
                }
            }
        }
        if let Some(driver) = &self.drivers.switch {
            for (port, mode) in changes.ports {
                let config = &self.config.switch_ports[port.index()];
                if let Err(e) = driver.set_port_mode(config.switch, config.port, mode) {
                    warn!(%port, ?mode, error = %e, "could not switch port mode");
                }
            }
        }
    }

    pub fn controller_mode(&self, ctrl: EthIfCtrlIdx) -> Result<EthMode, EthIfError> {
        let result = self
            .check_ctrl(ctrl)
            .map(|()| self.state.with(|s| s.ctrls[ctrl.index()].mode));
        self.checked(service::GET_CONTROLLER_MODE, result)
    }

    /// Mode confirmation of an Ethernet controller driver, forwarded to the
    /// users of every logical controller on top of it.
    pub fn ctrl_mode_indication(&self, eth_ctrl: u8, mode: EthMode) -> Result<(), EthIfError> {
        let ctrls: Vec<_> = self
            .config
            .controllers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.eth_ctrl == eth_ctrl)
            .map(|(index, _)| EthIfCtrlIdx(index as u8))
            .collect();
        if ctrls.is_empty() {
            return self.checked(
                service::CTRL_MODE_INDICATION,
                Err(EthIfError::InvalidCtrlIdx(eth_ctrl)),
            );
        }
        for ctrl in ctrls {
            for user in &self.users {
                user.ctrl_mode_changed(ctrl, mode);
            }
        }
        Ok(())
    }

    /// Apply a mode to every port of a port group with control semantic.
    pub fn set_switch_port_group_mode(
        &self,
        group: PortGroupIdx,
        mode: EthMode,
    ) -> Result<(), EthIfError> {
        let result = self.set_switch_port_group_mode_inner(group, mode);
        self.checked(service::SET_SWITCH_PORT_GROUP_MODE, result)
    }

    fn set_switch_port_group_mode_inner(
        &self,
        group: PortGroupIdx,
        mode: EthMode,
    ) -> Result<(), EthIfError> {
        self.check_port_group(group)?;
        if self.config.port_groups[group.index()].semantic != PortGroupSemantic::Control {
            return Err(EthIfError::InvalidParam(
                "port group does not have control semantic",
            ));
        }
        if self.drivers.switch.is_none() {
            return Err(EthIfError::NoDriver("switch"));
        }

        let changes = self.state.with(|s| {
            let mut changes = ModeChanges::default();
            if s.groups[group.index()].mode == mode {
                return changes;
            }
            s.groups[group.index()].mode = mode;
            for (index, port) in self.config.switch_ports.iter().enumerate() {
                if port.port_groups.contains(&group) {
                    if let Some(change) = s.ports[index].request(mode) {
                        changes.ports.push((SwitchPortIdx(index as u8), change));
                    }
                }
            }
            changes
        });

        debug!(%group, ?mode, ports = changes.ports.len(), "port group mode requested");
        self.apply_mode_changes(changes);
        Ok(())
    }

    /// Periodic link handling: detection followed by processing.
    pub fn main_function_state(&self) {
        self.detect_link_state_change();
        self.process_link_state_changes();
    }

    /// Poll every active element and move the logical link state machines
    /// into pending transitions where the aggregated outcome changed.
    pub fn detect_link_state_change(&self) {
        let (trcv_active, port_active) = self.state.with(|s| {
            (
                s.trcvs.iter().map(ElementState::is_active).collect::<Vec<_>>(),
                s.ports.iter().map(ElementState::is_active).collect::<Vec<_>>(),
            )
        });

        // Driver failures leave the stored state untouched until the next
        // cycle.
        let trcv_polls: Vec<Option<TrcvLinkState>> = match &self.drivers.transceiver {
            Some(driver) => self
                .config
                .transceivers
                .iter()
                .zip(trcv_active)
                .enumerate()
                .map(|(index, (trcv, active))| {
                    active
                        .then(|| driver.link_state(trcv.trcv))
                        .and_then(|polled| {
                            polled
                                .map_err(|e| debug!(trcv = index, error = %e, "link state poll failed"))
                                .ok()
                        })
                })
                .collect(),
            None => Vec::new(),
        };
        let port_polls: Vec<Option<TrcvLinkState>> = match &self.drivers.switch {
            Some(driver) => self
                .config
                .switch_ports
                .iter()
                .zip(port_active)
                .enumerate()
                .map(|(index, (port, active))| {
                    active
                        .then(|| driver.port_link_state(port.switch, port.port))
                        .and_then(|polled| {
                            polled
                                .map_err(|e| debug!(port = index, error = %e, "link state poll failed"))
                                .ok()
                        })
                })
                .collect(),
            None => Vec::new(),
        };

        let key_agreement = self.state.with(|s| {
            let mut key_agreement = Vec::new();

            for ((config, state), polled) in self
                .config
                .transceivers
                .iter()
                .zip(s.trcvs.iter_mut())
                .zip(&trcv_polls)
            {
                let Some(polled) = *polled else { continue };
                let new = element_state(polled, config.macsec, state.secure);
                if let Some(pae) = config.pae.filter(|_| config.macsec) {
                    if new.is_up() != state.link.is_up() {
                        key_agreement.push((pae, polled));
                    }
                }
                state.set_link(new);
            }
            for ((config, state), polled) in self
                .config
                .switch_ports
                .iter()
                .zip(s.ports.iter_mut())
                .zip(&port_polls)
            {
                let Some(polled) = *polled else { continue };
                let new = element_state(polled, config.macsec, state.secure);
                if let Some(pae) = config.pae.filter(|_| config.macsec) {
                    if new.is_up() != state.link.is_up() {
                        key_agreement.push((pae, polled));
                    }
                }
                state.set_link(new);
            }

            self.detect_locked(s);
            key_agreement
        });

        if let Some(ka) = &self.drivers.key_agreement {
            for (pae, state) in key_agreement {
                ka.link_state_changed(pae, state);
            }
        }
    }

    /// Recount and update pending transitions. Called with the link state
    /// region held.
    fn detect_locked(&self, s: &mut LinkData) {
        let trcvs: Vec<_> = s.trcvs.iter().map(|t| t.link).collect();
        let ports: Vec<_> = s.ports.iter().map(|p| p.link).collect();
        let snapshot = collect_snapshot(&self.config, &trcvs, &ports);

        for ((config, ctrl), links) in self
            .config
            .controllers
            .iter()
            .zip(s.ctrls.iter_mut())
            .zip(&snapshot.ctrl_links)
        {
            ctrl.link_count = *links;
            let link_up = ctrl.mode == EthMode::Active && *links >= config.link_aggr_threshold;
            ctrl.link = ctrl.link.detect(link_up);
        }

        for ((group, counters), link_up) in s
            .groups
            .iter_mut()
            .zip(&snapshot.group_counters)
            .zip(port_groups_link_up(&self.config, &snapshot))
        {
            group.counters = *counters;
            group.link = group.link.detect(link_up);
        }
    }

    /// Commit pending transitions and notify users.
    pub fn process_link_state_changes(&self) {
        let (ctrl_events, group_events) = self.state.with(|s| {
            let mut ctrl_events = Vec::new();
            for (index, ctrl) in s.ctrls.iter_mut().enumerate() {
                let (committed, event) = ctrl.link.commit();
                ctrl.link = committed;
                if let Some(event) = event {
                    ctrl_events.push((EthIfCtrlIdx(index as u8), event));
                }
            }
            let mut group_events = Vec::new();
            for (index, group) in s.groups.iter_mut().enumerate() {
                let (committed, event) = group.link.commit();
                group.link = committed;
                if let Some(event) = event {
                    group_events.push((PortGroupIdx(index as u8), event));
                }
            }
            (ctrl_events, group_events)
        });

        for (ctrl, state) in ctrl_events {
            info!(%ctrl, ?state, "controller link state changed");
            for user in &self.users {
                user.ctrl_link_state_changed(ctrl, state);
            }
        }
        for (group, state) in group_events {
            info!(%group, ?state, "port group link state changed");
            for user in &self.users {
                user.port_group_link_state_changed(group, state);
            }
        }
    }

    /// Link state last reported to users.
    pub fn ctrl_link_state(&self, ctrl: EthIfCtrlIdx) -> Result<TrcvLinkState, EthIfError> {
        let result = self
            .check_ctrl(ctrl)
            .map(|()| self.state.with(|s| s.ctrls[ctrl.index()].link.reported()));
        self.checked(service::GET_CTRL_LINK_STATE, result)
    }

    pub fn ctrl_link_fsm_state(&self, ctrl: EthIfCtrlIdx) -> Result<LinkFsmState, EthIfError> {
        let result = self
            .check_ctrl(ctrl)
            .map(|()| self.state.with(|s| s.ctrls[ctrl.index()].link));
        self.checked(service::GET_CTRL_LINK_STATE, result)
    }

    /// Number of usable links counted for a controller in the last cycle.
    pub fn ctrl_link_count(&self, ctrl: EthIfCtrlIdx) -> Result<u8, EthIfError> {
        let result = self
            .check_ctrl(ctrl)
            .map(|()| self.state.with(|s| s.ctrls[ctrl.index()].link_count));
        self.checked(service::GET_CTRL_LINK_STATE, result)
    }

    pub fn port_group_link_state(&self, group: PortGroupIdx) -> Result<TrcvLinkState, EthIfError> {
        let result = self
            .check_port_group(group)
            .map(|()| self.state.with(|s| s.groups[group.index()].link.reported()));
        self.checked(service::GET_PORT_GROUP_LINK_STATE, result)
    }

    pub fn port_group_counters(&self, group: PortGroupIdx) -> Result<PortGroupCounters, EthIfError> {
        let result = self
            .check_port_group(group)
            .map(|()| self.state.with(|s| s.groups[group.index()].counters));
        self.checked(service::GET_PORT_GROUP_LINK_STATE, result)
    }

    pub fn trcv_link_state(&self, trcv: TrcvIdx) -> Result<PhysLinkState, EthIfError> {
        let result = self
            .state
            .with(|s| s.trcvs.get(trcv.index()).map(|t| t.link))
            .ok_or(EthIfError::InvalidTrcvIdx(trcv.0));
        self.checked(service::GET_TRCV_LINK_STATE, result)
    }

    pub fn switch_port_link_state(&self, port: SwitchPortIdx) -> Result<PhysLinkState, EthIfError> {
        let result = self
            .state
            .with(|s| s.ports.get(port.index()).map(|p| p.link))
            .ok_or(EthIfError::InvalidSwitchPortIdx(port.0));
        self.checked(service::GET_SWITCH_PORT_LINK_STATE, result)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;
    use crate::{
        config::{ControllerConfig, TransceiverConfig},
        drivers::DriverError,
        error::test::RecordingTracer,
    };

    #[derive(Default)]
    pub struct FakeHardware {
        pub trcv_links: RefCell<Vec<TrcvLinkState>>,
        pub trcv_fails: Cell<bool>,
        pub trcv_modes: RefCell<Vec<(u8, EthMode)>>,
        pub ctrl_modes: RefCell<Vec<(u8, EthMode)>>,
        pub events: RefCell<Vec<(EthIfCtrlIdx, TrcvLinkState)>>,
        pub mode_events: RefCell<Vec<(EthIfCtrlIdx, EthMode)>>,
        pub key_agreement: RefCell<Vec<(u8, TrcvLinkState)>>,
    }

    pub struct Fake(pub Rc<FakeHardware>);

    impl ControllerDriver for Fake {
        fn set_mode(&self, eth_ctrl: u8, mode: EthMode) -> Result<(), DriverError> {
            self.0.ctrl_modes.borrow_mut().push((eth_ctrl, mode));
            Ok(())
        }
    }

    impl TransceiverDriver for Fake {
        fn link_state(&self, trcv: u8) -> Result<TrcvLinkState, DriverError> {
            if self.0.trcv_fails.get() {
                return Err(DriverError::NotOk);
            }
            Ok(self.0.trcv_links.borrow()[usize::from(trcv)])
        }

        fn set_mode(&self, trcv: u8, mode: EthMode) -> Result<(), DriverError> {
            self.0.trcv_modes.borrow_mut().push((trcv, mode));
            Ok(())
        }
    }

    impl KeyAgreement for Fake {
        fn link_state_changed(&self, pae: u8, state: TrcvLinkState) {
            self.0.key_agreement.borrow_mut().push((pae, state));
        }
    }

    impl EthIfUser for Fake {
        fn ctrl_link_state_changed(&self, ctrl: EthIfCtrlIdx, state: TrcvLinkState) {
            self.0.events.borrow_mut().push((ctrl, state));
        }

        fn ctrl_mode_changed(&self, ctrl: EthIfCtrlIdx, mode: EthMode) {
            self.0.mode_events.borrow_mut().push((ctrl, mode));
        }
    }

    pub fn ethif(config: EthIfConfig, hw: &Rc<FakeHardware>) -> EthIf {
        EthIf::new(
            config,
            EthIfDrivers {
                controller: Box::new(Fake(hw.clone())),
                transceiver: Some(Box::new(Fake(hw.clone()))),
                switch: None,
                macsec: None,
                key_agreement: Some(Box::new(Fake(hw.clone()))),
            },
            vec![Box::new(Fake(hw.clone()))],
            Box::new(RecordingTracer::default()),
        )
        .unwrap()
    }

    pub fn two_trcv_config(threshold: u8) -> EthIfConfig {
        EthIfConfig {
            controllers: vec![ControllerConfig {
                eth_ctrl: 4,
                link_aggr_threshold: threshold,
                macsec: false,
            }],
            transceivers: vec![
                TransceiverConfig {
                    trcv: 0,
                    controllers: vec![EthIfCtrlIdx(0)],
                    macsec: false,
                    pae: None,
                },
                TransceiverConfig {
                    trcv: 1,
                    controllers: vec![EthIfCtrlIdx(0)],
                    macsec: false,
                    pae: None,
                },
            ],
            switch_ports: vec![],
            port_groups: vec![],
        }
    }

    #[test]
    fn controller_mode_switches_mapped_transceivers() {
        let hw = Rc::new(FakeHardware::default());
        let ethif = ethif(two_trcv_config(1), &hw);

        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Active).unwrap();
        assert_eq!(*hw.ctrl_modes.borrow(), vec![(4, EthMode::Active)]);
        assert_eq!(
            *hw.trcv_modes.borrow(),
            vec![(0, EthMode::Active), (1, EthMode::Active)]
        );
        assert_eq!(ethif.controller_mode(EthIfCtrlIdx(0)), Ok(EthMode::Active));

        // repeated request is a no-op
        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Active).unwrap();
        assert_eq!(hw.ctrl_modes.borrow().len(), 1);
    }

    #[test]
    fn threshold_two_needs_both_links() {
        let hw = Rc::new(FakeHardware::default());
        *hw.trcv_links.borrow_mut() = vec![TrcvLinkState::Active, TrcvLinkState::Down];
        let ethif = ethif(two_trcv_config(2), &hw);
        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Active).unwrap();

        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_count(EthIfCtrlIdx(0)), Ok(1));
        assert_eq!(ethif.ctrl_link_fsm_state(EthIfCtrlIdx(0)), Ok(LinkFsmState::NoLink));
        assert!(hw.events.borrow().is_empty());

        hw.trcv_links.borrow_mut()[1] = TrcvLinkState::Active;
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_fsm_state(EthIfCtrlIdx(0)), Ok(LinkFsmState::Link));
        assert_eq!(
            *hw.events.borrow(),
            vec![(EthIfCtrlIdx(0), TrcvLinkState::Active)]
        );

        hw.trcv_links.borrow_mut()[0] = TrcvLinkState::Down;
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_state(EthIfCtrlIdx(0)), Ok(TrcvLinkState::Down));
        assert_eq!(hw.events.borrow().len(), 2);
    }

    #[test]
    fn failed_poll_keeps_previous_state() {
        let hw = Rc::new(FakeHardware::default());
        *hw.trcv_links.borrow_mut() = vec![TrcvLinkState::Active, TrcvLinkState::Active];
        let ethif = ethif(two_trcv_config(1), &hw);
        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Active).unwrap();
        ethif.main_function_state();

        hw.trcv_fails.set(true);
        ethif.main_function_state();
        assert_eq!(ethif.trcv_link_state(TrcvIdx(0)), Ok(PhysLinkState::Active));
        assert_eq!(ethif.ctrl_link_fsm_state(EthIfCtrlIdx(0)), Ok(LinkFsmState::Link));
        assert_eq!(hw.events.borrow().len(), 1);
    }

    #[test]
    fn inactive_transceivers_are_not_polled() {
        let hw = Rc::new(FakeHardware::default());
        // an empty link table would panic on any poll
        let ethif = ethif(two_trcv_config(1), &hw);
        ethif.main_function_state();
        assert_eq!(ethif.ctrl_link_state(EthIfCtrlIdx(0)), Ok(TrcvLinkState::Down));
    }

    #[test]
    fn controller_down_takes_the_link_down() {
        let hw = Rc::new(FakeHardware::default());
        *hw.trcv_links.borrow_mut() = vec![TrcvLinkState::Active, TrcvLinkState::Active];
        let ethif = ethif(two_trcv_config(1), &hw);
        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Active).unwrap();
        ethif.main_function_state();

        ethif.set_controller_mode(EthIfCtrlIdx(0), EthMode::Down).unwrap();
        assert_eq!(ethif.trcv_link_state(TrcvIdx(1)), Ok(PhysLinkState::Down));
        ethif.main_function_state();
        assert_eq!(
            *hw.events.borrow(),
            vec![
                (EthIfCtrlIdx(0), TrcvLinkState::Active),
                (EthIfCtrlIdx(0), TrcvLinkState::Down)
            ]
        );
    }

    #[test]
    fn invalid_indices_are_reported() {
        let hw = Rc::new(FakeHardware::default());
        let ethif = ethif(two_trcv_config(1), &hw);
        assert_eq!(
            ethif.set_controller_mode(EthIfCtrlIdx(7), EthMode::Active),
            Err(EthIfError::InvalidCtrlIdx(7))
        );
        assert_eq!(
            ethif.trcv_link_state(TrcvIdx(2)),
            Err(EthIfError::InvalidTrcvIdx(2))
        );
        assert_eq!(
            ethif.set_switch_port_group_mode(PortGroupIdx(0), EthMode::Active),
            Err(EthIfError::InvalidPortGroupIdx(0))
        );
        assert_eq!(
            ethif.switch_port_link_state(SwitchPortIdx(0)),
            Err(EthIfError::InvalidSwitchPortIdx(0))
        );
        assert!(hw.ctrl_modes.borrow().is_empty());
    }

    #[test]
    fn mode_indication_reaches_users() {
        let hw = Rc::new(FakeHardware::default());
        let ethif = ethif(two_trcv_config(1), &hw);

        ethif.ctrl_mode_indication(4, EthMode::Active).unwrap();
        assert_eq!(
            *hw.mode_events.borrow(),
            vec![(EthIfCtrlIdx(0), EthMode::Active)]
        );

        assert_eq!(
            ethif.ctrl_mode_indication(9, EthMode::Down),
            Err(EthIfError::InvalidCtrlIdx(9))
        );
        assert_eq!(hw.mode_events.borrow().len(), 1);
    }

    #[test]
    fn missing_transceiver_driver() {
        let hw = Rc::new(FakeHardware::default());
        let result = EthIf::new(
            two_trcv_config(1),
            EthIfDrivers {
                controller: Box::new(Fake(hw)),
                transceiver: None,
                switch: None,
                macsec: None,
                key_agreement: None,
            },
            vec![],
            Box::new(RecordingTracer::default()),
        );
        assert!(matches!(result, Err(EthIfError::NoDriver("transceiver"))));
    }
}
