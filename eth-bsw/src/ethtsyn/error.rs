use crate::{config::ConfigError, drivers::DriverError, error::Report};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EthTSynError {
    #[error("invalid controller index {0}")]
    InvalidCtrlIdx(u8),
    #[error("invalid port index {0}")]
    InvalidPort(u16),
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),
    #[error("invalid message length: received {received} bytes, header declares {declared:?}")]
    MessageLength {
        received: usize,
        declared: Option<u16>,
    },
    #[error("switch management buffer exhausted")]
    SwtMgmtBufferOverflow,
    #[error("no parked frame with id {0}")]
    UnknownFrame(u32),
    #[error("time synchronization received on a master port")]
    TimeSyncConflict,
    #[error("driver failure: {0}")]
    Driver(#[from] DriverError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl EthTSynError {
    pub fn error_id(&self) -> Option<u8> {
        match self.report() {
            Report::Development(id) | Report::Runtime(id) => Some(id),
            Report::Silent => None,
        }
    }

    pub(crate) fn report(&self) -> Report {
        match self {
            EthTSynError::InvalidCtrlIdx(_) => Report::Development(0x01),
            EthTSynError::Config(_) => Report::Development(0x21),
            EthTSynError::InvalidPort(_)
            | EthTSynError::InvalidParam(_)
            | EthTSynError::UnknownFrame(_) => Report::Development(0x22),
            EthTSynError::MessageLength { .. } => Report::Development(0x40),
            EthTSynError::SwtMgmtBufferOverflow => Report::Development(0x41),
            EthTSynError::TimeSyncConflict => Report::Runtime(0x01),
            EthTSynError::Driver(_) => Report::Silent,
        }
    }
}

/// Error identifiers reported by the time synchronization module.
pub mod error_id {
    pub const E_INV_CTRL_IDX: u8 = 0x01;
    pub const E_INIT_FAILED: u8 = 0x21;
    pub const E_PARAM: u8 = 0x22;
    pub const E_MSG_LENGTH: u8 = 0x40;
    pub const E_SWT_MGMT_BUF_OVERFLOW: u8 = 0x41;
    /// Runtime error.
    pub const E_TSCONFLICT: u8 = 0x01;
}

/// Service identifiers of the time synchronization API.
pub(crate) mod service {
    pub const INIT: u8 = 0x01;
    pub const SET_TRANSMISSION_MODE: u8 = 0x05;
    pub const TRCV_LINK_STATE_CHG: u8 = 0x06;
    pub const GET_PORT_STATE: u8 = 0x10;
    pub const RESET_PORT_STATISTICS: u8 = 0x11;
    pub const TX_CONFIRMATION: u8 = 0x40;
    pub const RX_INDICATION: u8 = 0x42;
    pub const SWT_MGMT_RX_INDICATION: u8 = 0x43;
    pub const SWT_MGMT_INFO_INDICATION: u8 = 0x44;
    pub const SWT_INGRESS_TS_INDICATION: u8 = 0x45;
}
