use super::{
    state::PortMachines, stats::PortStatistics, ComCtrlIdx, PortIdx, TimeBaseId,
};
use crate::{
    config::{PdelayTimestampFormat, PortConfig, PortRole, TimeDomainConfig},
    critical::{ExclusiveArea, Region},
    time::Duration,
};

/// Link-related data of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhysicalPort {
    pub as_capable: bool,
    pub propagation_delay: Duration,
    /// Ticks until time transmission is allowed again.
    pub debounce_timer: u32,
}

#[derive(Debug)]
pub(crate) struct Port {
    pub idx: PortIdx,
    pub ctrl: ComCtrlIdx,
    pub domain_number: u8,
    pub time_base: TimeBaseId,
    pub port_number: u16,
    pub is_master: bool,
    pub pdelay_format: PdelayTimestampFormat,
    pub time_validation: bool,
    static_delay: Duration,
    has_initiator: bool,
    pub physical: ExclusiveArea<PhysicalPort>,
    pub machines: ExclusiveArea<PortMachines>,
    pub stats: ExclusiveArea<PortStatistics>,
}

impl Port {
    pub(crate) fn new(idx: PortIdx, domain: &TimeDomainConfig, config: &PortConfig) -> Self {
        let static_delay = Duration::from_nanos(config.static_propagation_delay_ns.into());
        let has_initiator = config.pdelay_initiator.is_some();
        Self {
            idx,
            ctrl: config.controller,
            domain_number: domain.domain_number,
            time_base: domain.time_base,
            port_number: config.port_number,
            is_master: matches!(config.role, PortRole::Master(_)),
            pdelay_format: domain.pdelay_timestamp_format,
            time_validation: config.time_validation,
            static_delay,
            has_initiator,
            physical: ExclusiveArea::new(
                Region::ExclusiveArea0,
                Self::initial_physical(has_initiator, static_delay, 0),
            ),
            machines: ExclusiveArea::new(Region::Rx, PortMachines::new(config)),
            stats: ExclusiveArea::new(Region::ExclusiveArea0, PortStatistics::default()),
        }
    }

    /// Without a delay measurement the port is trusted with its static
    /// delay. With one, it is not capable until the first measurement.
    fn initial_physical(has_initiator: bool, static_delay: Duration, debounce: u32) -> PhysicalPort {
        PhysicalPort {
            as_capable: !has_initiator,
            propagation_delay: static_delay,
            debounce_timer: debounce,
        }
    }

    pub(crate) fn reset_physical(&self, debounce: u32) {
        let initial = Self::initial_physical(self.has_initiator, self.static_delay, debounce);
        self.physical.with(|physical| *physical = initial);
    }
}
