use serde::Deserialize;

use super::{check_count, check_reference, ConfigError, MAX_U8_INDEXED};
use crate::{
    ethif::EthIfCtrlIdx,
    ethtsyn::{ComCtrlIdx, PortIdx, TimeBaseId},
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EthTSynConfig {
    /// Period of the main function. Every interval below counts in these
    /// ticks.
    #[serde(default = "default_main_function_period_ms")]
    pub main_function_period_ms: u32,
    #[serde(rename = "controller")]
    pub controllers: Vec<ComCtrlConfig>,
    #[serde(rename = "time-domain")]
    pub time_domains: Vec<TimeDomainConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ComCtrlConfig {
    pub ethif_ctrl: EthIfCtrlIdx,
    /// Ingress and egress timestamps are provided by the hardware.
    #[serde(default)]
    pub hardware_timestamping: bool,
    /// The controller is the host port of a switch; received frames carry
    /// switch management information.
    #[serde(default)]
    pub switch_management: bool,
    #[serde(default = "default_frame_priority")]
    pub frame_priority: u8,
    /// Ticks between link-up (or a Sync transmission) and the next time
    /// transmission.
    #[serde(default)]
    pub debounce_ticks: u32,
}

/// Representation of the timestamps in Pdelay responses.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PdelayTimestampFormat {
    /// The virtual local time, as measured.
    #[default]
    VirtualLocalTime,
    /// Converted to the synchronized time of the domain's time base.
    GlobalTime,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TimeDomainConfig {
    pub domain_number: u8,
    pub time_base: TimeBaseId,
    #[serde(default)]
    pub pdelay_timestamp_format: PdelayTimestampFormat,
    #[serde(rename = "port")]
    pub ports: Vec<PortConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PortConfig {
    pub controller: ComCtrlIdx,
    #[serde(default = "default_port_number")]
    pub port_number: u16,
    pub role: PortRole,
    #[serde(default)]
    pub pdelay_initiator: Option<PdelayInitiatorConfig>,
    #[serde(default = "default_true")]
    pub pdelay_responder: bool,
    #[serde(default)]
    pub time_validation: bool,
    /// Propagation delay assumed while no measurement is available.
    #[serde(default)]
    pub static_propagation_delay_ns: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PortRole {
    Master(MasterConfig),
    Slave(SlaveConfig),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MasterConfig {
    pub sync_interval_ticks: u32,
    #[serde(default = "default_log_sync_interval")]
    pub log_sync_interval: i8,
    #[serde(default)]
    pub announce_interval_ticks: Option<u32>,
    #[serde(default)]
    pub log_announce_interval: i8,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SlaveConfig {
    pub follow_up_timeout_ticks: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PdelayInitiatorConfig {
    pub interval_ticks: u32,
    #[serde(default)]
    pub log_interval: i8,
    #[serde(default = "default_neighbor_prop_delay_threshold_ns")]
    pub neighbor_prop_delay_threshold_ns: u32,
    #[serde(default = "default_allowed_lost_responses")]
    pub allowed_lost_responses: u16,
    /// Use the measured delay. Otherwise the static propagation delay is
    /// reported and the measurement only decides `asCapable`.
    #[serde(default = "default_true")]
    pub use_computed_delay: bool,
    /// Weight of the exponential average over measurements, 1 disables
    /// averaging.
    #[serde(default = "default_average_weight")]
    pub average_weight: u8,
}

fn default_main_function_period_ms() -> u32 {
    10
}

fn default_frame_priority() -> u8 {
    3
}

fn default_port_number() -> u16 {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_sync_interval() -> i8 {
    -3
}

fn default_neighbor_prop_delay_threshold_ns() -> u32 {
    800
}

fn default_allowed_lost_responses() -> u16 {
    3
}

fn default_average_weight() -> u8 {
    1
}

impl EthTSynConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controllers.is_empty() {
            return Err(ConfigError::Empty("controller"));
        }
        if self.main_function_period_ms == 0 {
            return Err(ConfigError::Zero("main-function-period-ms"));
        }
        check_count("controller", self.controllers.len(), MAX_U8_INDEXED)?;
        check_count(
            "port",
            self.time_domains.iter().map(|domain| domain.ports.len()).sum(),
            usize::from(u16::MAX) + 1,
        )?;

        for (index, ctrl) in self.controllers.iter().enumerate() {
            if self.controllers[..index]
                .iter()
                .any(|other| other.ethif_ctrl == ctrl.ethif_ctrl)
            {
                return Err(ConfigError::DuplicateController(ctrl.ethif_ctrl.0));
            }
            if ctrl.switch_management && !ctrl.hardware_timestamping {
                return Err(ConfigError::SwitchManagementWithoutHardwareTimestamps(index));
            }
        }

        for (index, domain) in self.time_domains.iter().enumerate() {
            if self.time_domains[..index]
                .iter()
                .any(|other| other.domain_number == domain.domain_number)
            {
                return Err(ConfigError::DuplicateDomain(domain.domain_number));
            }

            let mut slaves = 0;
            for (port_index, port) in domain.ports.iter().enumerate() {
                check_reference(
                    "port",
                    port_index,
                    "controller",
                    port.controller.index(),
                    self.controllers.len(),
                )?;
                if domain.ports[..port_index]
                    .iter()
                    .any(|other| other.controller == port.controller)
                {
                    return Err(ConfigError::DuplicatePort {
                        controller: port.controller.index(),
                        domain: domain.domain_number,
                    });
                }
                match &port.role {
                    PortRole::Master(master) => {
                        if master.sync_interval_ticks == 0
                            || master.announce_interval_ticks == Some(0)
                        {
                            return Err(ConfigError::Zero("master interval"));
                        }
                    }
                    PortRole::Slave(slave) => {
                        slaves += 1;
                        if slave.follow_up_timeout_ticks == 0 {
                            return Err(ConfigError::Zero("follow-up-timeout-ticks"));
                        }
                    }
                }
                if let Some(initiator) = &port.pdelay_initiator {
                    if initiator.interval_ticks == 0 {
                        return Err(ConfigError::Zero("pdelay interval-ticks"));
                    }
                    if initiator.average_weight == 0 {
                        return Err(ConfigError::Zero("average-weight"));
                    }
                }
            }
            if slaves > 1 {
                return Err(ConfigError::MultipleSlavePorts(domain.domain_number));
            }
        }

        Ok(())
    }

    /// All ports of all time domains, in the order that defines their
    /// [`PortIdx`].
    pub fn ports(&self) -> impl Iterator<Item = (PortIdx, &TimeDomainConfig, &PortConfig)> {
        self.time_domains
            .iter()
            .flat_map(|domain| domain.ports.iter().map(move |port| (domain, port)))
            .enumerate()
            .map(|(index, (domain, port))| (PortIdx(index as u16), domain, port))
    }
}
