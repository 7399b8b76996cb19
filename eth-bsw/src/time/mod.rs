//! Time types used by the state machines.
//!
//! Three notions of time meet in this crate:
//!
//! - [`VirtualLocalTime`]: the monotonic local clock of the time-base
//!   manager, used for ingress and egress timestamps.
//! - [`GlobalTime`]: the synchronized time of a time base.
//! - [`WireTimestamp`](crate::WireTimestamp): the on-the-wire PTP
//!   representation of either.
//!
//! [`ReferencePair`] relates the first two and converts between them.

mod conversion;
mod duration;
mod global_time;
mod virtual_local_time;

pub(crate) use conversion::timestamp_difference;
pub use conversion::{ReferencePair, TimeError};
pub use duration::Duration;
pub use global_time::{GlobalTime, TimeBaseStatus};
pub use virtual_local_time::VirtualLocalTime;
