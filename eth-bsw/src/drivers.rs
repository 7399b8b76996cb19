//! Capability traits for the external collaborators.
//!
//! Hardware drivers (Ethernet controller, transceiver, switch), the MACsec
//! key agreement, the synchronized time-base manager and the upper layers
//! that subscribe to link changes are not part of this crate. Each is a
//! trait with one implementation per concrete driver; optional capabilities
//! are `Option<Box<dyn ..>>` in the owning module.
//!
//! All methods take `&self`: drivers are shared between task and interrupt
//! context and keep their own interior state.

use crate::{
    datastructures::common::{PortIdentity, WireTimestamp},
    ethif::{EthIfCtrlIdx, PortGroupIdx},
    ethtsyn::{TimeBaseId, TxContext},
    time::{Duration, GlobalTime, ReferencePair, VirtualLocalTime},
};

/// Failure of a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("request rejected by driver")]
    NotOk,
    #[error("operation not supported by driver")]
    Unsupported,
}

/// Physical link state as reported by a transceiver or switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrcvLinkState {
    #[default]
    Down,
    Active,
}

/// Mode of a controller, transceiver or switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EthMode {
    #[default]
    Down,
    Active,
}

pub trait ControllerDriver {
    fn set_mode(&self, eth_ctrl: u8, mode: EthMode) -> Result<(), DriverError>;
}

pub trait TransceiverDriver {
    fn link_state(&self, trcv: u8) -> Result<TrcvLinkState, DriverError>;
    fn set_mode(&self, trcv: u8, mode: EthMode) -> Result<(), DriverError>;
}

pub trait SwitchDriver {
    fn port_link_state(&self, switch: u8, port: u8) -> Result<TrcvLinkState, DriverError>;
    fn set_port_mode(&self, switch: u8, port: u8, mode: EthMode) -> Result<(), DriverError>;
}

/// Direction of a MACsec secure association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaDirection {
    Rx,
    Tx,
}

/// Parameters of a secure association, as handed out by key agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureAssociation {
    pub association_number: u8,
    pub next_packet_number: u64,
    pub secure_channel_identifier: u64,
    pub key: Vec<u8>,
}

/// Secure entity configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecYUpdate {
    pub replay_protect: bool,
    pub replay_window: u32,
    pub protect_frames: bool,
}

/// MACsec operations offered by a controller or PHY.
pub trait MacsecOps {
    fn update_secy(&self, eth_ctrl: u8, update: &SecYUpdate) -> Result<(), DriverError>;
    fn add_sa(
        &self,
        eth_ctrl: u8,
        direction: SaDirection,
        sa: &SecureAssociation,
    ) -> Result<(), DriverError>;
    fn delete_sa(
        &self,
        eth_ctrl: u8,
        direction: SaDirection,
        association_number: u8,
    ) -> Result<(), DriverError>;
}

/// The MACsec key agreement, informed about physical link changes of
/// secured elements.
pub trait KeyAgreement {
    fn link_state_changed(&self, pae: u8, state: TrcvLinkState);
}

/// Upper layer subscribed to link state changes.
pub trait EthIfUser {
    fn ctrl_link_state_changed(&self, ctrl: EthIfCtrlIdx, state: TrcvLinkState);

    fn port_group_link_state_changed(&self, _port_group: PortGroupIdx, _state: TrcvLinkState) {}

    fn ctrl_mode_changed(&self, _ctrl: EthIfCtrlIdx, _mode: EthMode) {}
}

impl<T: EthIfUser + ?Sized> EthIfUser for std::rc::Rc<T> {
    fn ctrl_link_state_changed(&self, ctrl: EthIfCtrlIdx, state: TrcvLinkState) {
        (**self).ctrl_link_state_changed(ctrl, state)
    }

    fn port_group_link_state_changed(&self, port_group: PortGroupIdx, state: TrcvLinkState) {
        (**self).port_group_link_state_changed(port_group, state)
    }

    fn ctrl_mode_changed(&self, ctrl: EthIfCtrlIdx, mode: EthMode) {
        (**self).ctrl_mode_changed(ctrl, mode)
    }
}

/// Whether a multicast filter entry is added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Add,
    Remove,
}

/// Frame transmission and address management, as offered by the Ethernet
/// interface to the time synchronization module.
pub trait FrameTransmitter {
    fn phys_addr(&self, ctrl: EthIfCtrlIdx) -> Result<[u8; 6], DriverError>;

    fn update_phys_addr_filter(
        &self,
        ctrl: EthIfCtrlIdx,
        addr: [u8; 6],
        action: FilterAction,
    ) -> Result<(), DriverError>;

    /// Send one PTP frame. The confirmation (and, for event messages, the
    /// egress timestamp) is returned later through
    /// [`EthTSyn::tx_confirmation`](crate::EthTSyn::tx_confirmation) with
    /// the same `context`.
    fn transmit(
        &self,
        ctrl: EthIfCtrlIdx,
        frame: &[u8],
        priority: u8,
        context: TxContext,
        egress_timestamp: bool,
    ) -> Result<(), DriverError>;
}

/// Measurement data handed to time validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationData {
    PdelayResponder {
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        responding_port_identity: PortIdentity,
        request_receipt: WireTimestamp,
        response_origin: WireTimestamp,
        reference: Option<ReferencePair>,
    },
    PdelayInitiator {
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        responding_port_identity: PortIdentity,
        request_origin: VirtualLocalTime,
        request_receipt: WireTimestamp,
        response_origin: WireTimestamp,
        response_receipt: VirtualLocalTime,
        pdelay: Duration,
    },
    SyncMaster {
        sequence_id: u16,
        source_port_identity: PortIdentity,
        sync_egress: VirtualLocalTime,
        precise_origin: WireTimestamp,
    },
    SyncSlave {
        sequence_id: u16,
        source_port_identity: PortIdentity,
        sync_ingress: VirtualLocalTime,
        precise_origin: WireTimestamp,
        correction: Duration,
        pdelay: Duration,
    },
}

/// The synchronized time-base manager.
pub trait TimeBaseManager {
    fn virtual_local_time(&self, time_base: TimeBaseId) -> Result<VirtualLocalTime, DriverError>;

    /// A simultaneous reading of the time base and the virtual local time.
    fn current_time(&self, time_base: TimeBaseId) -> Result<ReferencePair, DriverError>;

    /// Hand over a synchronization result: the time base had value `global`
    /// at local time `local`.
    fn bus_set_global_time(
        &self,
        time_base: TimeBaseId,
        global: &GlobalTime,
        local: VirtualLocalTime,
        path_delay: Duration,
    ) -> Result<(), DriverError>;

    fn report_time_validation(&self, _time_base: TimeBaseId, _data: &ValidationData) {}
}
