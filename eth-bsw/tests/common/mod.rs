#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use eth_bsw::{
    config::{EthIfConfig, EthTSynConfig},
    datastructures::messages::PTP_ETHERTYPE,
    drivers::{
        ControllerDriver, DriverError, EthIfUser, EthMode, FilterAction, FrameTransmitter,
        SwitchDriver, TimeBaseManager, TransceiverDriver, TrcvLinkState,
    },
    ethif::{EthIfCtrlIdx, PortGroupIdx},
    ethtsyn::{TimeBaseId, TxContext},
    EthIf, EthIfDrivers, EthTSyn, EthTSynDrivers, ErrorTracer, GlobalTime, ModuleId,
    ReferencePair, TimeBaseStatus, VirtualLocalTime, WireTimestamp,
};

pub const MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0xab, 0xcd, 0xef];

#[derive(Debug, Default)]
pub struct Tracer {
    pub errors: RefCell<Vec<(ModuleId, u8, u8)>>,
    pub runtime_errors: RefCell<Vec<(ModuleId, u8, u8)>>,
}

impl ErrorTracer for Tracer {
    fn report_error(&self, module: ModuleId, _instance: u8, service: u8, error: u8) {
        self.errors.borrow_mut().push((module, service, error));
    }

    fn report_runtime_error(&self, module: ModuleId, _instance: u8, service: u8, error: u8) {
        self.runtime_errors.borrow_mut().push((module, service, error));
    }
}

/// Transceivers, switch ports and a recording link subscriber.
#[derive(Debug, Default)]
pub struct Hardware {
    pub trcv_links: RefCell<Vec<TrcvLinkState>>,
    pub port_links: RefCell<Vec<TrcvLinkState>>,
    pub ctrl_events: RefCell<Vec<(EthIfCtrlIdx, TrcvLinkState)>>,
    pub group_events: RefCell<Vec<(PortGroupIdx, TrcvLinkState)>>,
}

pub struct HardwareHandle(pub Rc<Hardware>);

impl ControllerDriver for HardwareHandle {
    fn set_mode(&self, _eth_ctrl: u8, _mode: EthMode) -> Result<(), DriverError> {
        Ok(())
    }
}

impl TransceiverDriver for HardwareHandle {
    fn link_state(&self, trcv: u8) -> Result<TrcvLinkState, DriverError> {
        self.0
            .trcv_links
            .borrow()
            .get(usize::from(trcv))
            .copied()
            .ok_or(DriverError::NotOk)
    }

    fn set_mode(&self, _trcv: u8, _mode: EthMode) -> Result<(), DriverError> {
        Ok(())
    }
}

impl SwitchDriver for HardwareHandle {
    fn port_link_state(&self, _switch: u8, port: u8) -> Result<TrcvLinkState, DriverError> {
        self.0
            .port_links
            .borrow()
            .get(usize::from(port))
            .copied()
            .ok_or(DriverError::NotOk)
    }

    fn set_port_mode(&self, _switch: u8, _port: u8, _mode: EthMode) -> Result<(), DriverError> {
        Ok(())
    }
}

impl EthIfUser for HardwareHandle {
    fn ctrl_link_state_changed(&self, ctrl: EthIfCtrlIdx, state: TrcvLinkState) {
        self.0.ctrl_events.borrow_mut().push((ctrl, state));
    }

    fn port_group_link_state_changed(&self, port_group: PortGroupIdx, state: TrcvLinkState) {
        self.0.group_events.borrow_mut().push((port_group, state));
    }
}

pub fn ethif(
    config: EthIfConfig,
    hw: &Rc<Hardware>,
    mut users: Vec<Box<dyn EthIfUser>>,
) -> (EthIf, Rc<Tracer>) {
    let tracer = Rc::new(Tracer::default());
    users.push(Box::new(HardwareHandle(hw.clone())));
    let ethif = EthIf::new(
        config,
        EthIfDrivers {
            controller: Box::new(HardwareHandle(hw.clone())),
            transceiver: Some(Box::new(HardwareHandle(hw.clone()))),
            switch: Some(Box::new(HardwareHandle(hw.clone()))),
            macsec: None,
            key_agreement: None,
        },
        users,
        Box::new(tracer.clone()),
    )
    .unwrap();
    (ethif, tracer)
}

/// Frame transmission and time base of one node.
#[derive(Debug, Default)]
pub struct Network {
    pub mac: [u8; 6],
    pub sent: RefCell<Vec<(Vec<u8>, TxContext)>>,
    pub filters: RefCell<Vec<([u8; 6], FilterAction)>>,
    pub local_nanos: Cell<u64>,
    pub global_times: RefCell<Vec<(TimeBaseId, GlobalTime, VirtualLocalTime)>>,
}

impl Network {
    pub fn new(mac: [u8; 6]) -> Rc<Self> {
        Rc::new(Self {
            mac,
            ..Default::default()
        })
    }

    /// Confirm every frame sent so far, with egress timestamps read from this
    /// node's clock, and hand them to `receiver`.
    pub fn deliver(&self, sender: &EthTSyn, receiver: &EthTSyn) {
        let frames: Vec<_> = self.sent.borrow_mut().drain(..).collect();
        for (frame, context) in frames {
            sender
                .tx_confirmation(EthIfCtrlIdx(0), context, None)
                .unwrap();
            receiver
                .rx_indication(EthIfCtrlIdx(0), PTP_ETHERTYPE, &frame, None)
                .unwrap();
        }
    }
}

pub struct NetworkHandle(pub Rc<Network>);

impl FrameTransmitter for NetworkHandle {
    fn phys_addr(&self, _ctrl: EthIfCtrlIdx) -> Result<[u8; 6], DriverError> {
        Ok(self.0.mac)
    }

    fn update_phys_addr_filter(
        &self,
        _ctrl: EthIfCtrlIdx,
        addr: [u8; 6],
        action: FilterAction,
    ) -> Result<(), DriverError> {
        self.0.filters.borrow_mut().push((addr, action));
        Ok(())
    }

    fn transmit(
        &self,
        _ctrl: EthIfCtrlIdx,
        frame: &[u8],
        _priority: u8,
        context: TxContext,
        _egress_timestamp: bool,
    ) -> Result<(), DriverError> {
        self.0.sent.borrow_mut().push((frame.to_vec(), context));
        Ok(())
    }
}

impl TimeBaseManager for NetworkHandle {
    fn virtual_local_time(&self, _time_base: TimeBaseId) -> Result<VirtualLocalTime, DriverError> {
        Ok(VirtualLocalTime::from_nanos(self.0.local_nanos.get()))
    }

    fn current_time(&self, _time_base: TimeBaseId) -> Result<ReferencePair, DriverError> {
        let local = VirtualLocalTime::from_nanos(self.0.local_nanos.get());
        Ok(ReferencePair::new(
            GlobalTime::new(TimeBaseStatus::GLOBAL_TIME_BASE, WireTimestamp::from(local)),
            local,
        ))
    }

    fn bus_set_global_time(
        &self,
        time_base: TimeBaseId,
        global: &GlobalTime,
        local: VirtualLocalTime,
        _path_delay: eth_bsw::Duration,
    ) -> Result<(), DriverError> {
        self.0
            .global_times
            .borrow_mut()
            .push((time_base, *global, local));
        Ok(())
    }
}

pub fn ethtsyn(config: EthTSynConfig, net: &Rc<Network>) -> (Rc<EthTSyn>, Rc<Tracer>) {
    let tracer = Rc::new(Tracer::default());
    let ethtsyn = EthTSyn::new(
        config,
        EthTSynDrivers {
            transmitter: Box::new(NetworkHandle(net.clone())),
            time_base_manager: Box::new(NetworkHandle(net.clone())),
        },
        Box::new(tracer.clone()),
    )
    .unwrap();
    (Rc::new(ethtsyn), tracer)
}
