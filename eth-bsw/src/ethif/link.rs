//! Link aggregation as a two-step pipeline.
//!
//! Detection collects an immutable snapshot of the physical element states,
//! counts usable links per controller and port group, and moves the logical
//! link state machines into a pending `LinkChange*` state when the outcome
//! differs from the committed state. Processing later commits the pending
//! transitions and yields the notifications to fire.

use crate::{
    config::{EthIfConfig, PortGroupThresholds, SwitchPortRole},
    drivers::TrcvLinkState,
    ethif::{EthIfCtrlIdx, PortGroupIdx},
};

/// Stored link state of a transceiver or switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhysLinkState {
    #[default]
    Down,
    /// The physical link is up, the MACsec secure channel is not.
    PhyActive,
    Active,
}

impl PhysLinkState {
    pub fn is_up(self) -> bool {
        self != PhysLinkState::Down
    }
}

/// Logical link state of a controller or port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkFsmState {
    #[default]
    NoLink,
    LinkChangeUp,
    Link,
    LinkChangeDown,
}

impl LinkFsmState {
    /// Detection step. Only a net change of the link outcome produces a
    /// pending transition; a change that reverts a pending one cancels it
    /// without anyone having been told.
    pub fn detect(self, link_up: bool) -> Self {
        use LinkFsmState::*;
        match (self, link_up) {
            (NoLink, true) => LinkChangeUp,
            (LinkChangeUp, false) => NoLink,
            (Link, false) => LinkChangeDown,
            (LinkChangeDown, true) => Link,
            (state, _) => state,
        }
    }

    /// Processing step. Returns the committed state and the notification
    /// to fire, if a transition was pending.
    pub fn commit(self) -> (Self, Option<TrcvLinkState>) {
        match self {
            LinkFsmState::LinkChangeUp => (LinkFsmState::Link, Some(TrcvLinkState::Active)),
            LinkFsmState::LinkChangeDown => (LinkFsmState::NoLink, Some(TrcvLinkState::Down)),
            state => (state, None),
        }
    }

    /// The state users have last been told about.
    pub fn reported(self) -> TrcvLinkState {
        match self {
            LinkFsmState::Link | LinkFsmState::LinkChangeDown => TrcvLinkState::Active,
            LinkFsmState::NoLink | LinkFsmState::LinkChangeUp => TrcvLinkState::Down,
        }
    }
}

/// New stored state of an element after a successful poll.
pub(crate) fn element_state(polled: TrcvLinkState, macsec: bool, secure: bool) -> PhysLinkState {
    match polled {
        TrcvLinkState::Down => PhysLinkState::Down,
        TrcvLinkState::Active if macsec && !secure => PhysLinkState::PhyActive,
        TrcvLinkState::Active => PhysLinkState::Active,
    }
}

/// Whether an element in `state` counts toward the link threshold of a
/// controller.
pub(crate) fn counts_toward_ctrl(state: PhysLinkState, ctrl_macsec: bool) -> bool {
    state.is_up() && (state == PhysLinkState::Active || !ctrl_macsec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortGroupCounters {
    pub lax: u8,
    pub host_uplink: u8,
    pub no_role: u8,
}

pub fn port_group_link_active(
    lax_link_aggregation: bool,
    counters: PortGroupCounters,
    thresholds: PortGroupThresholds,
) -> bool {
    if lax_link_aggregation {
        counters.lax >= thresholds.lax
    } else {
        counters.host_uplink >= thresholds.host_uplink && counters.no_role >= thresholds.no_role
    }
}

/// Usable link counts, computed from scratch every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct LinkSnapshot {
    pub ctrl_links: Vec<u8>,
    pub group_counters: Vec<PortGroupCounters>,
}

pub(crate) fn collect_snapshot(
    config: &EthIfConfig,
    trcvs: &[PhysLinkState],
    ports: &[PhysLinkState],
) -> LinkSnapshot {
    let mut snapshot = LinkSnapshot {
        ctrl_links: vec![0; config.controllers.len()],
        group_counters: vec![PortGroupCounters::default(); config.port_groups.len()],
    };

    let mut count_ctrls = |state: PhysLinkState, ctrls: &[EthIfCtrlIdx]| {
        for ctrl in ctrls {
            let Some(ctrl_config) = config.controllers.get(ctrl.index()) else {
                continue;
            };
            if counts_toward_ctrl(state, ctrl_config.macsec) {
                let links = &mut snapshot.ctrl_links[ctrl.index()];
                *links = links.saturating_add(1);
            }
        }
    };

    for (trcv, state) in config.transceivers.iter().zip(trcvs) {
        count_ctrls(*state, &trcv.controllers);
    }
    for (port, state) in config.switch_ports.iter().zip(ports) {
        count_ctrls(*state, &port.controllers);
    }

    for (port, state) in config.switch_ports.iter().zip(ports) {
        if *state != PhysLinkState::Active {
            continue;
        }
        let upstream_active = port
            .upstream
            .and_then(|upstream| ports.get(upstream.index()))
            .map_or(true, |upstream| *upstream == PhysLinkState::Active);

        for group in &port.port_groups {
            let Some(counters) = snapshot.group_counters.get_mut(group.index()) else {
                continue;
            };
            counters.lax = counters.lax.saturating_add(1);
            match port.role {
                SwitchPortRole::HostPort => {
                    counters.host_uplink = counters.host_uplink.saturating_add(1)
                }
                SwitchPortRole::UpLinkPort if upstream_active => {
                    counters.host_uplink = counters.host_uplink.saturating_add(1)
                }
                SwitchPortRole::UpLinkPort => {}
                SwitchPortRole::Standard => counters.no_role = counters.no_role.saturating_add(1),
            }
        }
    }

    snapshot
}

/// Link outcome of every port group in the snapshot.
pub(crate) fn port_groups_link_up<'a>(
    config: &'a EthIfConfig,
    snapshot: &LinkSnapshot,
) -> impl Iterator<Item = bool> + 'a {
    let groups = snapshot.group_counters.clone();
    groups.into_iter().enumerate().map(move |(index, counters)| {
        let group = PortGroupIdx(index as u8);
        let lax = config
            .port_groups
            .get(index)
            .is_some_and(|group| group.lax_link_aggregation);
        port_group_link_active(lax, counters, config.port_group_thresholds(group))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ControllerConfig, PortGroupConfig, PortGroupSemantic, SwitchPortConfig,
        TransceiverConfig,
    };

    fn thresholds(lax: u8, host_uplink: u8, no_role: u8) -> PortGroupThresholds {
        PortGroupThresholds {
            lax,
            host_uplink,
            no_role,
        }
    }

    fn counters(lax: u8, host_uplink: u8, no_role: u8) -> PortGroupCounters {
        PortGroupCounters {
            lax,
            host_uplink,
            no_role,
        }
    }

    #[test]
    fn strict_port_group_rule() {
        let t = thresholds(1, 1, 1);
        assert!(port_group_link_active(false, counters(2, 1, 1), t));
        assert!(!port_group_link_active(false, counters(2, 0, 2), t));
        assert!(!port_group_link_active(false, counters(2, 2, 0), t));
    }

    #[test]
    fn zero_no_role_threshold_is_vacuous() {
        let t = thresholds(1, 2, 0);
        assert!(port_group_link_active(false, counters(2, 2, 0), t));
        assert!(!port_group_link_active(false, counters(1, 1, 0), t));
    }

    #[test]
    fn lax_rule_only_looks_at_lax_counter() {
        let t = thresholds(2, 5, 5);
        assert!(port_group_link_active(true, counters(2, 0, 0), t));
        assert!(!port_group_link_active(true, counters(1, 5, 5), t));
    }

    #[test]
    fn fsm_reports_only_net_changes() {
        let mut state = LinkFsmState::NoLink;
        state = state.detect(true);
        assert_eq!(state, LinkFsmState::LinkChangeUp);
        state = state.detect(true);
        assert_eq!(state, LinkFsmState::LinkChangeUp);

        let (committed, notification) = state.commit();
        assert_eq!(committed, LinkFsmState::Link);
        assert_eq!(notification, Some(TrcvLinkState::Active));

        assert_eq!(committed.detect(true), LinkFsmState::Link);
        assert_eq!(committed.commit(), (LinkFsmState::Link, None));

        // link flaps between detection and processing
        assert_eq!(
            committed.detect(false).detect(true),
            LinkFsmState::Link
        );
    }

    #[test]
    fn macsec_elements_need_a_secure_channel() {
        assert_eq!(
            element_state(TrcvLinkState::Active, true, false),
            PhysLinkState::PhyActive
        );
        assert_eq!(
            element_state(TrcvLinkState::Active, true, true),
            PhysLinkState::Active
        );
        assert!(!counts_toward_ctrl(PhysLinkState::PhyActive, true));
        assert!(counts_toward_ctrl(PhysLinkState::PhyActive, false));
        assert!(!counts_toward_ctrl(PhysLinkState::Down, false));
    }

    fn bridge_config() -> EthIfConfig {
        EthIfConfig {
            controllers: vec![ControllerConfig {
                eth_ctrl: 0,
                link_aggr_threshold: 2,
                macsec: false,
            }],
            transceivers: vec![TransceiverConfig {
                trcv: 0,
                controllers: vec![EthIfCtrlIdx(0)],
                macsec: false,
                pae: None,
            }],
            switch_ports: vec![
                SwitchPortConfig {
                    switch: 0,
                    port: 0,
                    role: SwitchPortRole::HostPort,
                    upstream: None,
                    controllers: vec![EthIfCtrlIdx(0)],
                    port_groups: vec![PortGroupIdx(0)],
                    macsec: false,
                    pae: None,
                },
                SwitchPortConfig {
                    switch: 0,
                    port: 1,
                    role: SwitchPortRole::UpLinkPort,
                    upstream: Some(crate::ethif::SwitchPortIdx(0)),
                    controllers: vec![],
                    port_groups: vec![PortGroupIdx(0)],
                    macsec: false,
                    pae: None,
                },
                SwitchPortConfig {
                    switch: 0,
                    port: 2,
                    role: SwitchPortRole::Standard,
                    upstream: Some(crate::ethif::SwitchPortIdx(1)),
                    controllers: vec![],
                    port_groups: vec![PortGroupIdx(0)],
                    macsec: false,
                    pae: None,
                },
            ],
            port_groups: vec![PortGroupConfig {
                semantic: PortGroupSemantic::LinkInfo,
                lax_link_aggregation: false,
                lax_threshold: None,
                host_uplink_threshold: None,
                no_role_threshold: None,
            }],
        }
    }

    #[test]
    fn snapshot_counts() {
        use PhysLinkState::*;
        let config = bridge_config();
        config.validate().unwrap();

        let snapshot = collect_snapshot(&config, &[Active], &[Active, Active, Active]);
        assert_eq!(snapshot.ctrl_links, vec![2]);
        assert_eq!(snapshot.group_counters, vec![counters(3, 2, 1)]);
        assert_eq!(port_groups_link_up(&config, &snapshot).collect::<Vec<_>>(), vec![true]);

        // up-link whose host port is down does not count
        let snapshot = collect_snapshot(&config, &[Down], &[Down, Active, Active]);
        assert_eq!(snapshot.ctrl_links, vec![0]);
        assert_eq!(snapshot.group_counters, vec![counters(2, 0, 1)]);
        assert_eq!(port_groups_link_up(&config, &snapshot).collect::<Vec<_>>(), vec![false]);
    }
}
