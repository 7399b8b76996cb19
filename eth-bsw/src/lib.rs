//! Ethernet interface link management and IEEE 802.1AS time synchronization.
//!
//! The crate is split along the two basic software modules it implements:
//!
//! - [`ethif`]: the Ethernet interface. It polls transceivers and switch
//!   ports, aggregates their link states into logical controller and switch
//!   port group link states and notifies registered users about changes.
//! - [`ethtsyn`]: the Ethernet time synchronization module. It runs the gPTP
//!   per-port state machines (Pdelay responder and initiator, Sync and
//!   Announce transmission, Sync reception) for every configured time domain.
//!
//! Hardware drivers, the synchronized time-base manager and the error tracer
//! are external collaborators, modelled as traits in [`drivers`] and
//! [`error`]. Both modules are driven by a periodic main function and by
//! indications that may arrive from interrupt context, so every public
//! operation takes `&self` and guards its state with short exclusive areas.
#![forbid(unsafe_code)]

/// A typed index into a configuration table.
macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl $name {
            pub fn index(self) -> usize {
                usize::from(self.0)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

pub mod config;
mod critical;
pub mod datastructures;
pub mod drivers;
pub mod error;
pub mod ethif;
pub mod ethtsyn;
pub mod time;

pub use config::{ConfigError, EthIfConfig, EthTSynConfig};
pub use datastructures::common::{ClockIdentity, PortIdentity, TimeInterval, WireTimestamp};
pub use error::{ErrorTracer, ModuleId, TracingErrorTracer};
pub use ethif::{EthIf, EthIfDrivers};
pub use ethtsyn::{EthTSyn, EthTSynDrivers, EthTSynError};
pub use time::{Duration, GlobalTime, ReferencePair, TimeBaseStatus, VirtualLocalTime};
