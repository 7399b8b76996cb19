use serde::Deserialize;

use super::{check_count, check_reference, ConfigError, MAX_U8_INDEXED};
use crate::ethif::{EthIfCtrlIdx, PortGroupIdx, SwitchPortIdx};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EthIfConfig {
    #[serde(rename = "controller")]
    pub controllers: Vec<ControllerConfig>,
    #[serde(default, rename = "transceiver")]
    pub transceivers: Vec<TransceiverConfig>,
    #[serde(default, rename = "switch-port")]
    pub switch_ports: Vec<SwitchPortConfig>,
    #[serde(default, rename = "port-group")]
    pub port_groups: Vec<PortGroupConfig>,
}

/// A logical controller of the Ethernet interface.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ControllerConfig {
    /// Index of the Ethernet controller driver instance.
    pub eth_ctrl: u8,
    /// Number of physical links that must be usable for the controller to
    /// have link.
    #[serde(default = "default_link_aggr_threshold")]
    pub link_aggr_threshold: u8,
    /// Only secured links count toward the threshold.
    #[serde(default)]
    pub macsec: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransceiverConfig {
    pub trcv: u8,
    pub controllers: Vec<EthIfCtrlIdx>,
    #[serde(default)]
    pub macsec: bool,
    #[serde(default)]
    pub pae: Option<u8>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchPortRole {
    HostPort,
    UpLinkPort,
    #[default]
    Standard,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SwitchPortConfig {
    pub switch: u8,
    pub port: u8,
    #[serde(default)]
    pub role: SwitchPortRole,
    /// The host or up-link port through which this port reaches the host.
    #[serde(default)]
    pub upstream: Option<SwitchPortIdx>,
    #[serde(default)]
    pub controllers: Vec<EthIfCtrlIdx>,
    #[serde(default)]
    pub port_groups: Vec<PortGroupIdx>,
    #[serde(default)]
    pub macsec: bool,
    #[serde(default)]
    pub pae: Option<u8>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PortGroupSemantic {
    /// Mode requests for the group are applied to every member port.
    Control,
    /// The group only reports an aggregated link state.
    LinkInfo,
    /// Members are managed individually.
    Independent,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PortGroupConfig {
    pub semantic: PortGroupSemantic,
    #[serde(default)]
    pub lax_link_aggregation: bool,
    #[serde(default)]
    pub lax_threshold: Option<u8>,
    #[serde(default)]
    pub host_uplink_threshold: Option<u8>,
    #[serde(default)]
    pub no_role_threshold: Option<u8>,
}

/// Thresholds of a port group after defaults have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortGroupThresholds {
    pub lax: u8,
    pub host_uplink: u8,
    pub no_role: u8,
}

fn default_link_aggr_threshold() -> u8 {
    1
}

impl EthIfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controllers.is_empty() {
            return Err(ConfigError::Empty("controller"));
        }
        let ctrls = self.controllers.len();
        let groups = self.port_groups.len();
        let ports = self.switch_ports.len();
        check_count("controller", ctrls, MAX_U8_INDEXED)?;
        check_count("transceiver", self.transceivers.len(), MAX_U8_INDEXED)?;
        check_count("switch port", ports, MAX_U8_INDEXED)?;
        check_count("port group", groups, MAX_U8_INDEXED)?;

        for (index, trcv) in self.transceivers.iter().enumerate() {
            for ctrl in &trcv.controllers {
                check_reference("transceiver", index, "controller", ctrl.index(), ctrls)?;
            }
            if trcv.macsec && trcv.pae.is_none() {
                return Err(ConfigError::MissingPae {
                    kind: "transceiver",
                    index,
                });
            }
        }

        for (index, port) in self.switch_ports.iter().enumerate() {
            for ctrl in &port.controllers {
                check_reference("switch port", index, "controller", ctrl.index(), ctrls)?;
            }
            for group in &port.port_groups {
                check_reference("switch port", index, "port group", group.index(), groups)?;
            }
            if let Some(upstream) = port.upstream {
                check_reference("switch port", index, "switch port", upstream.index(), ports)?;
                let upstream_role = self.switch_ports[upstream.index()].role;
                if upstream.index() == index || upstream_role == SwitchPortRole::Standard {
                    return Err(ConfigError::InvalidUpstream {
                        index,
                        upstream: upstream.index(),
                    });
                }
            }
            if port.macsec && port.pae.is_none() {
                return Err(ConfigError::MissingPae {
                    kind: "switch port",
                    index,
                });
            }
        }

        for (index, ctrl) in self.controllers.iter().enumerate() {
            let members = self.controller_members(EthIfCtrlIdx(index as u8));
            if ctrl.link_aggr_threshold == 0 || usize::from(ctrl.link_aggr_threshold) > members {
                return Err(ConfigError::Threshold {
                    kind: "controller",
                    index,
                    threshold: ctrl.link_aggr_threshold,
                    members,
                });
            }
        }

        for index in 0..groups {
            let group = PortGroupIdx(index as u8);
            let thresholds = self.port_group_thresholds(group);
            let (host_uplink, no_role) = self.port_group_role_members(group);
            let checks = [
                (thresholds.lax, host_uplink + no_role),
                (thresholds.host_uplink, host_uplink),
                (thresholds.no_role, no_role),
            ];
            for (threshold, members) in checks {
                if usize::from(threshold) > members {
                    return Err(ConfigError::Threshold {
                        kind: "port group",
                        index,
                        threshold,
                        members,
                    });
                }
            }
        }

        Ok(())
    }

    /// Number of physical elements mapped to a controller.
    pub fn controller_members(&self, ctrl: EthIfCtrlIdx) -> usize {
        let trcvs = self
            .transceivers
            .iter()
            .filter(|t| t.controllers.contains(&ctrl))
            .count();
        let ports = self
            .switch_ports
            .iter()
            .filter(|p| p.controllers.contains(&ctrl))
            .count();
        trcvs + ports
    }

    fn port_group_role_members(&self, group: PortGroupIdx) -> (usize, usize) {
        let members = self
            .switch_ports
            .iter()
            .filter(|p| p.port_groups.contains(&group));
        members.fold((0, 0), |(host_uplink, no_role), port| match port.role {
            SwitchPortRole::HostPort | SwitchPortRole::UpLinkPort => (host_uplink + 1, no_role),
            SwitchPortRole::Standard => (host_uplink, no_role + 1),
        })
    }

    /// Thresholds of a port group. Unset thresholds default to: one usable
    /// port for lax aggregation, every host and up-link member, and one
    /// standard member if the group has any.
    pub fn port_group_thresholds(&self, group: PortGroupIdx) -> PortGroupThresholds {
        let (host_uplink, no_role) = self.port_group_role_members(group);
        let Some(config) = self.port_groups.get(group.index()) else {
            return PortGroupThresholds::default();
        };
        PortGroupThresholds {
            lax: config.lax_threshold.unwrap_or(1),
            host_uplink: config
                .host_uplink_threshold
                .unwrap_or(host_uplink.min(u8::MAX as usize) as u8),
            no_role: config.no_role_threshold.unwrap_or(no_role.min(1) as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [[controller]]
        eth-ctrl = 0

        [[transceiver]]
        trcv = 0
        controllers = [0]

        [[switch-port]]
        switch = 0
        port = 0
        role = "host-port"
        port-groups = [0]

        [[switch-port]]
        switch = 0
        port = 1
        upstream = 0
        port-groups = [0]

        [[port-group]]
        semantic = "control"
    "#;

    #[test]
    fn parse_and_validate() {
        let config: EthIfConfig = toml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.controllers[0].link_aggr_threshold, 1);
        assert_eq!(config.switch_ports[0].role, SwitchPortRole::HostPort);
        assert_eq!(config.switch_ports[1].upstream, Some(SwitchPortIdx(0)));
        assert_eq!(
            config.port_group_thresholds(PortGroupIdx(0)),
            PortGroupThresholds {
                lax: 1,
                host_uplink: 1,
                no_role: 1
            }
        );
    }

    #[test]
    fn group_without_standard_ports_needs_none() {
        let mut config: EthIfConfig = toml::from_str(CONFIG).unwrap();
        config.switch_ports[1].port_groups.clear();
        assert_eq!(config.port_group_thresholds(PortGroupIdx(0)).no_role, 0);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let broken = CONFIG.replace("eth-ctrl = 0", "eth-ctrl = 0\nspeed = 100");
        assert!(toml::from_str::<EthIfConfig>(&broken).is_err());
    }

    #[test]
    fn dangling_controller() {
        let broken = CONFIG.replace("controllers = [0]", "controllers = [3]");
        let config: EthIfConfig = toml::from_str(&broken).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DanglingReference {
                kind: "transceiver",
                reference: 3,
                ..
            })
        ));
    }

    #[test]
    fn threshold_beyond_members() {
        let broken = CONFIG.replace("eth-ctrl = 0", "eth-ctrl = 0\nlink-aggr-threshold = 2");
        let config: EthIfConfig = toml::from_str(&broken).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Threshold {
                kind: "controller",
                threshold: 2,
                members: 1,
                ..
            })
        ));
    }

    #[test]
    fn upstream_must_be_host_or_uplink() {
        let broken = CONFIG.replace("upstream = 0", "upstream = 1");
        let config: EthIfConfig = toml::from_str(&broken).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidUpstream {
                index: 1,
                upstream: 1
            })
        );
    }

    #[test]
    fn element_counts_must_fit_their_index() {
        let mut config: EthIfConfig = toml::from_str(CONFIG).unwrap();
        let mut group = config.port_groups[0].clone();
        group.lax_threshold = Some(0);
        config.port_groups = vec![group; MAX_U8_INDEXED];
        config.validate().unwrap();

        config.port_groups.push(config.port_groups[0].clone());
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooMany {
                kind: "port group",
                count: 257,
                max: 256
            })
        );
    }
}
