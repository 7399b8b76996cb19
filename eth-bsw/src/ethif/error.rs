use crate::{config::ConfigError, drivers::DriverError, error::Report};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EthIfError {
    #[error("invalid controller index {0}")]
    InvalidCtrlIdx(u8),
    #[error("invalid transceiver index {0}")]
    InvalidTrcvIdx(u8),
    #[error("invalid switch port index {0}")]
    InvalidSwitchPortIdx(u8),
    #[error("invalid port group index {0}")]
    InvalidPortGroupIdx(u8),
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),
    #[error("no {0} driver available")]
    NoDriver(&'static str),
    #[error("driver failure: {0}")]
    Driver(#[from] DriverError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl EthIfError {
    pub fn error_id(&self) -> Option<u8> {
        match self.report() {
            Report::Development(id) | Report::Runtime(id) => Some(id),
            Report::Silent => None,
        }
    }

    pub(crate) fn report(&self) -> Report {
        match self {
            EthIfError::InvalidCtrlIdx(_) => Report::Development(0x01),
            EthIfError::InvalidTrcvIdx(_) => Report::Development(0x02),
            EthIfError::InvalidSwitchPortIdx(_) => Report::Development(0x03),
            EthIfError::InvalidPortGroupIdx(_) => Report::Development(0x04),
            EthIfError::InvalidParam(_) => Report::Development(0x32),
            EthIfError::NoDriver(_) => Report::Runtime(0x40),
            EthIfError::Driver(_) => Report::Silent,
            EthIfError::Config(_) => Report::Development(0x30),
        }
    }
}

/// Service identifiers of the Ethernet interface API.
pub(crate) mod service {
    pub const INIT: u8 = 0x01;
    pub const SET_CONTROLLER_MODE: u8 = 0x03;
    pub const GET_CONTROLLER_MODE: u8 = 0x04;
    pub const SET_SWITCH_PORT_GROUP_MODE: u8 = 0x06;
    pub const GET_PORT_GROUP_LINK_STATE: u8 = 0x07;
    pub const GET_CTRL_LINK_STATE: u8 = 0x08;
    pub const GET_TRCV_LINK_STATE: u8 = 0x09;
    pub const GET_SWITCH_PORT_LINK_STATE: u8 = 0x0a;
    pub const CTRL_MODE_INDICATION: u8 = 0x0e;
    pub const MACSEC_OPERATIONAL: u8 = 0x10;
    pub const MACSEC_UPDATE_SECY: u8 = 0x11;
    pub const MACSEC_ADD_RX_SA: u8 = 0x12;
    pub const MACSEC_ADD_TX_SA: u8 = 0x13;
    pub const MACSEC_DELETE_SA: u8 = 0x14;
}
