//! Two nodes connected by one simulated cable.
//!
//! Simulation time advances in main function periods. In every tick both
//! nodes run their main functions, then every frame they transmitted is
//! confirmed at its send time and delivered to the other node after the
//! wire delay. Egress and ingress timestamps are taken in software from
//! the node's local clock, which may be offset and drift against
//! simulation time.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use eth_bsw::{
    datastructures::messages::PTP_ETHERTYPE,
    drivers::{
        ControllerDriver, DriverError, EthMode, FilterAction, FrameTransmitter, TimeBaseManager,
        TransceiverDriver, TrcvLinkState,
    },
    ethif::{EthIfCtrlIdx, EthIfError},
    ethtsyn::{PortIdx, TimeBaseId, TxContext},
    time::TimeError,
    Duration, EthIf, EthIfDrivers, EthTSyn, EthTSynDrivers, EthTSynError, GlobalTime,
    ReferencePair, TimeBaseStatus, TracingErrorTracer, VirtualLocalTime, WireTimestamp,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::{CablePull, ConfigError, NodeConfig, SimConfig};

/// Simulation time at the first tick. Leaves room for negative clock
/// offsets.
const START_NS: u64 = 1_000_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("node {node}: {source}")]
    EthIf { node: String, source: EthIfError },
    #[error("node {node}: {source}")]
    EthTSyn {
        node: String,
        source: EthTSynError,
    },
}

/// A free running local clock.
#[derive(Debug, Clone, Copy)]
struct LocalClock {
    offset_ns: i64,
    drift_ppb: i64,
}

impl LocalClock {
    fn read(&self, now: u64) -> VirtualLocalTime {
        let now = i128::from(now);
        let local = now + now * i128::from(self.drift_ppb) / 1_000_000_000
            + i128::from(self.offset_ns);
        VirtualLocalTime::from_nanos(u64::try_from(local).unwrap_or(0))
    }
}

/// The state both nodes share: simulation time and the cable.
#[derive(Debug)]
struct Wire {
    now: Cell<u64>,
    connected: Cell<bool>,
}

struct Outgoing {
    ctrl: EthIfCtrlIdx,
    frame: Vec<u8>,
    context: TxContext,
    sent_at: u64,
}

struct InFlight {
    receiver: usize,
    frame: Vec<u8>,
    arrival: u64,
}

/// Driver side of one node.
struct NodeState {
    name: String,
    mac: [u8; 6],
    clock: LocalClock,
    wire: Rc<Wire>,
    outbox: RefCell<Vec<Outgoing>>,
    /// Set once the node was synchronized to a grandmaster.
    reference: Cell<Option<ReferencePair>>,
    synchronizations: Cell<u64>,
}

impl NodeState {
    fn local_now(&self) -> VirtualLocalTime {
        self.clock.read(self.wire.now.get())
    }

    /// The time base of the node. Without synchronization it runs on the
    /// local clock.
    fn global_now(&self) -> Result<GlobalTime, TimeError> {
        let local = self.local_now();
        match self.reference.get() {
            Some(reference) => reference.global_at(local),
            None => Ok(GlobalTime::new(
                TimeBaseStatus::GLOBAL_TIME_BASE,
                WireTimestamp::from(local),
            )),
        }
    }
}

struct NodeHandle(Rc<NodeState>);

impl ControllerDriver for NodeHandle {
    fn set_mode(&self, eth_ctrl: u8, mode: EthMode) -> Result<(), DriverError> {
        debug!(node = %self.0.name, eth_ctrl, ?mode, "controller mode");
        Ok(())
    }
}

impl TransceiverDriver for NodeHandle {
    fn link_state(&self, _trcv: u8) -> Result<TrcvLinkState, DriverError> {
        Ok(if self.0.wire.connected.get() {
            TrcvLinkState::Active
        } else {
            TrcvLinkState::Down
        })
    }

    fn set_mode(&self, trcv: u8, mode: EthMode) -> Result<(), DriverError> {
        debug!(node = %self.0.name, trcv, ?mode, "transceiver mode");
        Ok(())
    }
}

impl FrameTransmitter for NodeHandle {
    fn phys_addr(&self, _ctrl: EthIfCtrlIdx) -> Result<[u8; 6], DriverError> {
        Ok(self.0.mac)
    }

    fn update_phys_addr_filter(
        &self,
        ctrl: EthIfCtrlIdx,
        addr: [u8; 6],
        action: FilterAction,
    ) -> Result<(), DriverError> {
        debug!(node = %self.0.name, %ctrl, ?addr, ?action, "address filter");
        Ok(())
    }

    fn transmit(
        &self,
        ctrl: EthIfCtrlIdx,
        frame: &[u8],
        _priority: u8,
        context: TxContext,
        _egress_timestamp: bool,
    ) -> Result<(), DriverError> {
        if !self.0.wire.connected.get() {
            return Err(DriverError::NotOk);
        }
        self.0.outbox.borrow_mut().push(Outgoing {
            ctrl,
            frame: frame.to_vec(),
            context,
            sent_at: self.0.wire.now.get(),
        });
        Ok(())
    }
}

impl TimeBaseManager for NodeHandle {
    fn virtual_local_time(&self, _time_base: TimeBaseId) -> Result<VirtualLocalTime, DriverError> {
        Ok(self.0.local_now())
    }

    fn current_time(&self, _time_base: TimeBaseId) -> Result<ReferencePair, DriverError> {
        let global = self.0.global_now().map_err(|_| DriverError::NotOk)?;
        Ok(ReferencePair::new(global, self.0.local_now()))
    }

    fn bus_set_global_time(
        &self,
        time_base: TimeBaseId,
        global: &GlobalTime,
        local: VirtualLocalTime,
        path_delay: Duration,
    ) -> Result<(), DriverError> {
        debug!(
            node = %self.0.name,
            %time_base,
            %global,
            %local,
            %path_delay,
            "global time set"
        );
        self.0.reference.set(Some(ReferencePair::new(*global, local)));
        self.0
            .synchronizations
            .set(self.0.synchronizations.get() + 1);
        Ok(())
    }
}

pub struct Node {
    state: Rc<NodeState>,
    ethif: EthIf,
    ethtsyn: Rc<EthTSyn>,
    /// Controller on which frames from the wire are received.
    rx_ctrl: EthIfCtrlIdx,
}

impl Node {
    fn new(config: NodeConfig, wire: Rc<Wire>) -> Result<Self, SimError> {
        let state = Rc::new(NodeState {
            name: config.name,
            mac: config.mac,
            clock: LocalClock {
                offset_ns: config.clock_offset_ns,
                drift_ppb: config.clock_drift_ppb,
            },
            wire,
            outbox: RefCell::new(vec![]),
            reference: Cell::new(None),
            synchronizations: Cell::new(0),
        });
        let name = state.name.clone();
        let rx_ctrl = config
            .ethtsyn
            .controllers
            .first()
            .map(|ctrl| ctrl.ethif_ctrl)
            .unwrap_or(EthIfCtrlIdx(0));

        let ethtsyn = EthTSyn::new(
            config.ethtsyn,
            EthTSynDrivers {
                transmitter: Box::new(NodeHandle(state.clone())),
                time_base_manager: Box::new(NodeHandle(state.clone())),
            },
            Box::new(TracingErrorTracer),
        )
        .map_err(|source| SimError::EthTSyn {
            node: name.clone(),
            source,
        })?;
        let ethtsyn = Rc::new(ethtsyn);

        let ethif = EthIf::new(
            config.ethif,
            EthIfDrivers {
                controller: Box::new(NodeHandle(state.clone())),
                transceiver: Some(Box::new(NodeHandle(state.clone()))),
                switch: None,
                macsec: None,
                key_agreement: None,
            },
            vec![Box::new(ethtsyn.clone())],
            Box::new(TracingErrorTracer),
        )
        .map_err(|source| SimError::EthIf {
            node: name.clone(),
            source,
        })?;

        for index in 0..ethif.config().controllers.len() {
            ethif
                .set_controller_mode(EthIfCtrlIdx(index as u8), EthMode::Active)
                .map_err(|source| SimError::EthIf {
                    node: name.clone(),
                    source,
                })?;
        }

        Ok(Self {
            state,
            ethif,
            ethtsyn,
            rx_ctrl,
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn ethtsyn(&self) -> &EthTSyn {
        &self.ethtsyn
    }

    pub fn synchronizations(&self) -> u64 {
        self.state.synchronizations.get()
    }

    pub fn is_synchronized(&self) -> bool {
        self.state.reference.get().is_some()
    }

    fn global_nanos(&self) -> Option<i128> {
        let global = self.state.global_now().ok()?;
        VirtualLocalTime::try_from(global.timestamp)
            .ok()
            .map(|time| i128::from(time.nanos()))
    }
}

pub struct Simulation {
    wire: Rc<Wire>,
    nodes: Vec<Node>,
    rng: StdRng,
    period_ns: u64,
    delay_ns: u64,
    jitter_ns: u64,
    cable_pulls: Vec<CablePull>,
    tick: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.check()?;
        let wire = Rc::new(Wire {
            now: Cell::new(START_NS),
            connected: Cell::new(true),
        });
        let period_ns = u64::from(config.period_ms()) * 1_000_000;
        let nodes = config
            .nodes
            .into_iter()
            .map(|node| Node::new(node, wire.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            wire,
            nodes,
            rng: StdRng::seed_from_u64(config.seed),
            period_ns,
            delay_ns: config.wire.delay_ns,
            jitter_ns: config.wire.jitter_ns,
            cable_pulls: config.wire.cable_pulls,
            tick: 0,
        })
    }

    #[cfg(test)]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Difference of the time base of node `index` to the time base of the
    /// other node, in nanoseconds.
    pub fn offset_ns(&self, index: usize) -> Option<i128> {
        let node = self.nodes.get(index)?;
        let peer = self.nodes.get(1 - index)?;
        Some(node.global_nanos()? - peer.global_nanos()?)
    }

    /// Simulate one main function period.
    pub fn tick(&mut self) {
        let start = START_NS + self.tick * self.period_ns;
        self.wire.now.set(start);

        let connected = !self.cable_pulls.iter().any(|pull| pull.covers(self.tick));
        if connected != self.wire.connected.get() {
            info!(tick = self.tick, connected, "cable state changed");
            self.wire.connected.set(connected);
        }

        let before: Vec<u64> = self.nodes.iter().map(Node::synchronizations).collect();

        for node in &self.nodes {
            node.ethif.main_function_state();
            node.ethtsyn.main_function();
        }

        let mut in_flight = vec![];
        for (sender, node) in self.nodes.iter().enumerate() {
            for outgoing in node.state.outbox.take() {
                if let Err(error) = node.ethtsyn.tx_confirmation(outgoing.ctrl, outgoing.context, None)
                {
                    warn!(node = node.name(), %error, "transmit confirmation rejected");
                }
                let jitter = if self.jitter_ns > 0 {
                    self.rng.gen_range(0..=self.jitter_ns)
                } else {
                    0
                };
                in_flight.push(InFlight {
                    receiver: 1 - sender,
                    frame: outgoing.frame,
                    arrival: outgoing.sent_at + self.delay_ns + jitter,
                });
            }
        }

        in_flight.sort_by_key(|frame| frame.arrival);
        for frame in in_flight {
            self.wire.now.set(frame.arrival);
            let Some(receiver) = self.nodes.get(frame.receiver) else {
                continue;
            };
            if let Err(error) =
                receiver
                    .ethtsyn
                    .rx_indication(receiver.rx_ctrl, PTP_ETHERTYPE, &frame.frame, None)
            {
                debug!(node = receiver.name(), %error, "frame not accepted");
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.synchronizations() > before[index] {
                info!(
                    tick = self.tick,
                    node = node.name(),
                    offset_ns = ?self.offset_ns(index),
                    pdelay = ?node.ethtsyn.propagation_delay(PortIdx(0)).ok(),
                    "synchronized"
                );
            }
        }

        self.tick += 1;
    }

    /// Tick `ticks` times on a timer running `speedup` times faster than
    /// the main function period.
    pub async fn run(&mut self, ticks: u64, speedup: u32) {
        let period = std::time::Duration::from_nanos(self.period_ns / u64::from(speedup.max(1)));
        let mut interval = tokio::time::interval(period.max(std::time::Duration::from_micros(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        for _ in 0..ticks {
            interval.tick().await;
            self.tick();
        }

        for (index, node) in self.nodes.iter().enumerate() {
            info!(
                node = node.name(),
                ticks = self.ticks(),
                synchronizations = node.synchronizations(),
                pdelay = ?node.ethtsyn().propagation_delay(PortIdx(0)).ok(),
                offset_ns = ?self.offset_ns(index).filter(|_| node.is_synchronized()),
                "simulation finished"
            );
        }
    }
}
