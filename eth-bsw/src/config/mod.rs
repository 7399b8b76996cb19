//! Configuration of the Ethernet interface and time synchronization
//! modules.
//!
//! Both configurations are plain data, deserializable from any serde
//! format. Hosts typically keep them in TOML. A configuration must pass
//! `validate()` before a module is built from it; the module constructors
//! do so themselves.

mod ethif;
mod ethtsyn;

pub use ethif::{
    ControllerConfig, EthIfConfig, PortGroupConfig, PortGroupSemantic, PortGroupThresholds,
    SwitchPortConfig, SwitchPortRole, TransceiverConfig,
};
pub use ethtsyn::{
    ComCtrlConfig, EthTSynConfig, MasterConfig, PdelayInitiatorConfig, PdelayTimestampFormat,
    PortConfig, PortRole, SlaveConfig, TimeDomainConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no {0} configured")]
    Empty(&'static str),
    #[error("{kind} {index} references unknown {target} {reference}")]
    DanglingReference {
        kind: &'static str,
        index: usize,
        target: &'static str,
        reference: usize,
    },
    #[error("{kind} {index}: threshold {threshold} does not fit its {members} members")]
    Threshold {
        kind: &'static str,
        index: usize,
        threshold: u8,
        members: usize,
    },
    #[error("{kind} {index} is MACsec secured but has no PAE index")]
    MissingPae { kind: &'static str, index: usize },
    #[error("switch port {index}: upstream port {upstream} is neither host nor up-link port")]
    InvalidUpstream { index: usize, upstream: usize },
    #[error("controller {0} is configured more than once")]
    DuplicateController(u8),
    #[error("time domain {0} is configured more than once")]
    DuplicateDomain(u8),
    #[error("controller {controller} has more than one port in time domain {domain}")]
    DuplicatePort { controller: usize, domain: u8 },
    #[error("time domain {0} has more than one slave port")]
    MultipleSlavePorts(u8),
    #[error("controller {0}: switch management requires hardware timestamping")]
    SwitchManagementWithoutHardwareTimestamps(usize),
    #[error("{0} must be at least one")]
    Zero(&'static str),
    #[error("{count} {kind}s configured, at most {max} are addressable")]
    TooMany {
        kind: &'static str,
        count: usize,
        max: usize,
    },
}

/// Number of entries a table indexed by `u8` can hold.
pub(crate) const MAX_U8_INDEXED: usize = u8::MAX as usize + 1;

pub(crate) fn check_count(kind: &'static str, count: usize, max: usize) -> Result<(), ConfigError> {
    if count <= max {
        Ok(())
    } else {
        Err(ConfigError::TooMany { kind, count, max })
    }
}

pub(crate) fn check_reference(
    kind: &'static str,
    index: usize,
    target: &'static str,
    reference: usize,
    len: usize,
) -> Result<(), ConfigError> {
    if reference < len {
        Ok(())
    } else {
        Err(ConfigError::DanglingReference {
            kind,
            index,
            target,
            reference,
        })
    }
}
