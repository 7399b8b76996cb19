//! Common data structures that are used throughout the protocol

mod clock_identity;
mod clock_quality;
mod port_identity;
mod time_interval;
mod timestamp;
mod tlv;

pub use clock_identity::ClockIdentity;
pub use clock_quality::ClockQuality;
pub use port_identity::PortIdentity;
pub use time_interval::TimeInterval;
pub use timestamp::WireTimestamp;
pub use tlv::{FollowUpInformationTlv, PathTraceTlv, TlvType};
