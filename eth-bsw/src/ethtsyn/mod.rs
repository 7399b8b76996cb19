//! IEEE 802.1AS time synchronization over Ethernet.
//!
//! Every configured port belongs to one controller and one time domain and
//! runs up to five state machines (see [`state`]). They are advanced by
//! [`EthTSyn::main_function`] and by the indications of the Ethernet
//! interface: link changes, received frames and transmit confirmations.

use tracing::{debug, info};

use crate::{
    config::{EthTSynConfig, PdelayTimestampFormat},
    datastructures::common::{ClockIdentity, PortIdentity},
    drivers::{FrameTransmitter, TimeBaseManager},
    error::{report, ErrorTracer, ModuleId},
    ethif::EthIfCtrlIdx,
    time::Duration,
};

mod actions;
mod com_ctrl;
mod error;
mod port;
mod rx;
pub mod state;
mod stats;
mod swt_mgmt;
mod tx;

pub use actions::{TxContext, TxKind};
pub use com_ctrl::TransmissionMode;
pub use error::{error_id, EthTSynError};
pub use state::{
    AnnounceSendState, PdelayInitiatorState, PdelayResponderState, SlaveRxState, SyncSendState,
};
pub use stats::{PortStatistics, StatCounter};
pub use swt_mgmt::{SwtMgmtInfo, SWT_MGMT_POOL_SIZE};

use com_ctrl::ComCtrl;
use error::service;
use port::Port;
use state::{PortContext, PortMachines};

index_type!(
    /// Index of a controller in the time synchronization configuration.
    ComCtrlIdx(u8)
);
index_type!(
    /// Index of a port, counted over all time domains in configuration
    /// order.
    PortIdx(u16)
);
index_type!(
    /// Identifier of a synchronized time base of the time-base manager.
    TimeBaseId(u16)
);

/// The collaborators the time synchronization module calls into.
pub struct EthTSynDrivers {
    pub transmitter: Box<dyn FrameTransmitter>,
    pub time_base_manager: Box<dyn TimeBaseManager>,
}

pub struct EthTSyn {
    config: EthTSynConfig,
    drivers: EthTSynDrivers,
    tracer: Box<dyn ErrorTracer>,
    ctrls: Vec<ComCtrl>,
    ports: Vec<Port>,
}

impl EthTSyn {
    pub fn new(
        config: EthTSynConfig,
        drivers: EthTSynDrivers,
        tracer: Box<dyn ErrorTracer>,
    ) -> Result<Self, EthTSynError> {
        if let Err(e) = config.validate() {
            let e = EthTSynError::from(e);
            report(tracer.as_ref(), ModuleId::EthTSyn, service::INIT, e.report());
            return Err(e);
        }

        let ports: Vec<Port> = config
            .ports()
            .map(|(idx, domain, port)| Port::new(idx, domain, port))
            .collect();
        let ctrls = config
            .controllers
            .iter()
            .enumerate()
            .map(|(index, ctrl)| ComCtrl::new(ComCtrlIdx(index as u8), ctrl.clone(), &ports))
            .collect();

        info!(
            controllers = config.controllers.len(),
            time_domains = config.time_domains.len(),
            ports = ports.len(),
            "time synchronization initialized"
        );

        Ok(Self {
            config,
            drivers,
            tracer,
            ctrls,
            ports,
        })
    }

    pub fn config(&self) -> &EthTSynConfig {
        &self.config
    }

    /// Report an error returned by a public operation and pass it on.
    fn checked<T>(&self, service: u8, result: Result<T, EthTSynError>) -> Result<T, EthTSynError> {
        if let Err(e) = &result {
            report(self.tracer.as_ref(), ModuleId::EthTSyn, service, e.report());
        }
        result
    }

    fn ctrl(&self, ethif_ctrl: EthIfCtrlIdx) -> Result<&ComCtrl, EthTSynError> {
        self.ctrls
            .iter()
            .find(|ctrl| ctrl.config.ethif_ctrl == ethif_ctrl)
            .ok_or(EthTSynError::InvalidCtrlIdx(ethif_ctrl.0))
    }

    fn port(&self, port: PortIdx) -> Result<&Port, EthTSynError> {
        self.ports
            .get(port.index())
            .ok_or(EthTSynError::InvalidPort(port.0))
    }

    /// Snapshot of `port` for its state machines. The time base is only
    /// read if `with_reference` is set and the link is up.
    fn port_context(&self, port: &Port, with_reference: bool) -> PortContext {
        let link = self.ctrls[port.ctrl.index()].link.get();
        let physical = port.physical.get();
        let reference = if with_reference && link.active {
            self.drivers
                .time_base_manager
                .current_time(port.time_base)
                .map_err(|error| debug!(port = %port.idx, %error, "time base unavailable"))
                .ok()
        } else {
            None
        };

        PortContext {
            port: port.idx,
            port_identity: PortIdentity {
                clock_identity: link.clock_identity,
                port_number: port.port_number,
            },
            domain_number: port.domain_number,
            link_active: link.active,
            tx_allowed: link.active
                && link.transmission == TransmissionMode::On
                && physical.debounce_timer == 0,
            as_capable: physical.as_capable,
            propagation_delay: physical.propagation_delay,
            pdelay_format: port.pdelay_format,
            reference,
            time_validation: port.time_validation,
        }
    }

    /// Run one state machine input of `port` and execute the resulting
    /// actions.
    fn run(
        &self,
        port: &Port,
        with_reference: bool,
        input: impl FnOnce(&mut PortMachines, &PortContext) -> actions::PortActionIterator,
    ) {
        let ctx = self.port_context(port, with_reference);
        let actions = port.machines.with(|machines| input(machines, &ctx));
        self.execute(port, actions);
    }

    /// Periodic processing: debounce timers and every state machine of every
    /// port.
    pub fn main_function(&self) {
        for port in &self.ports {
            port.physical.with(|physical| {
                physical.debounce_timer = physical.debounce_timer.saturating_sub(1)
            });

            let global_pdelay = port.pdelay_format == PdelayTimestampFormat::GlobalTime;
            self.run(port, global_pdelay, |machines, ctx| {
                state::process_optional(&mut machines.pdelay_responder, |sm| sm.process(ctx))
            });
            self.run(port, false, |machines, ctx| {
                state::process_optional(&mut machines.pdelay_initiator, |sm| sm.process(ctx))
            });
            self.run(port, port.is_master, |machines, ctx| {
                state::process_optional(&mut machines.sync_send, |sm| sm.process(ctx))
            });
            self.run(port, false, |machines, ctx| {
                state::process_optional(&mut machines.announce_send, |sm| sm.process(ctx))
            });
            self.run(port, false, |machines, ctx| {
                state::process_optional(&mut machines.slave_rx, |sm| sm.process(ctx))
            });
        }
    }

    /// Latch a reset of every state machine of `port`.
    pub fn request_port_reset(&self, port: PortIdx) -> Result<(), EthTSynError> {
        let result = self
            .port(port)
            .map(|port| port.machines.with(|machines| machines.request_reset()));
        self.checked(service::GET_PORT_STATE, result)
    }

    pub fn as_capable(&self, port: PortIdx) -> Result<bool, EthTSynError> {
        let result = self.port(port).map(|port| port.physical.get().as_capable);
        self.checked(service::GET_PORT_STATE, result)
    }

    pub fn propagation_delay(&self, port: PortIdx) -> Result<Duration, EthTSynError> {
        let result = self
            .port(port)
            .map(|port| port.physical.get().propagation_delay);
        self.checked(service::GET_PORT_STATE, result)
    }

    pub fn port_statistics(&self, port: PortIdx) -> Result<PortStatistics, EthTSynError> {
        let result = self.port(port).map(|port| port.stats.get());
        self.checked(service::GET_PORT_STATE, result)
    }

    pub fn reset_port_statistics(&self, port: PortIdx) -> Result<(), EthTSynError> {
        let result = self
            .port(port)
            .map(|port| port.stats.with(|stats| *stats = PortStatistics::default()));
        self.checked(service::RESET_PORT_STATISTICS, result)
    }

    /// Read one value of the state machines of `port`.
    fn machine_state<T>(
        &self,
        port: PortIdx,
        read: impl FnOnce(&PortMachines) -> T,
    ) -> Result<T, EthTSynError> {
        let result = self
            .port(port)
            .map(|port| port.machines.with(|machines| read(machines)));
        self.checked(service::GET_PORT_STATE, result)
    }

    pub fn pdelay_responder_state(
        &self,
        port: PortIdx,
    ) -> Result<Option<PdelayResponderState>, EthTSynError> {
        self.machine_state(port, |m| m.pdelay_responder.as_ref().map(|sm| sm.state()))
    }

    pub fn pdelay_initiator_state(
        &self,
        port: PortIdx,
    ) -> Result<Option<PdelayInitiatorState>, EthTSynError> {
        self.machine_state(port, |m| m.pdelay_initiator.as_ref().map(|sm| sm.state()))
    }

    pub fn sync_send_state(&self, port: PortIdx) -> Result<Option<SyncSendState>, EthTSynError> {
        self.machine_state(port, |m| m.sync_send.as_ref().map(|sm| sm.state()))
    }

    pub fn announce_send_state(
        &self,
        port: PortIdx,
    ) -> Result<Option<AnnounceSendState>, EthTSynError> {
        self.machine_state(port, |m| m.announce_send.as_ref().map(|sm| sm.state()))
    }

    pub fn slave_rx_state(&self, port: PortIdx) -> Result<Option<SlaveRxState>, EthTSynError> {
        self.machine_state(port, |m| m.slave_rx.as_ref().map(|sm| sm.state()))
    }

    /// Grandmaster last announced to a slave port.
    pub fn grandmaster(&self, port: PortIdx) -> Result<Option<ClockIdentity>, EthTSynError> {
        self.machine_state(port, |m| m.slave_rx.as_ref().and_then(|sm| sm.grandmaster()))
    }
}
