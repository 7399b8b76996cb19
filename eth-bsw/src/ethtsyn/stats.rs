//! Per-port protocol statistics.

/// Counters of one port. All counters saturate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortStatistics {
    pub rx_sync_count: u32,
    pub rx_follow_up_count: u32,
    pub rx_pdelay_request_count: u32,
    pub rx_pdelay_response_count: u32,
    pub rx_pdelay_response_follow_up_count: u32,
    pub rx_announce_count: u32,
    pub rx_ptp_packet_discard_count: u32,
    pub sync_receipt_timeout_count: u32,
    pub pdelay_allowed_lost_responses_exceeded_count: u32,
    pub tx_sync_count: u32,
    pub tx_follow_up_count: u32,
    pub tx_pdelay_request_count: u32,
    pub tx_pdelay_response_count: u32,
    pub tx_pdelay_response_follow_up_count: u32,
    pub tx_announce_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatCounter {
    RxSync,
    RxFollowUp,
    RxPdelayRequest,
    RxPdelayResponse,
    RxPdelayResponseFollowUp,
    RxAnnounce,
    RxPtpPacketDiscard,
    SyncReceiptTimeout,
    PdelayAllowedLostResponsesExceeded,
    TxSync,
    TxFollowUp,
    TxPdelayRequest,
    TxPdelayResponse,
    TxPdelayResponseFollowUp,
    TxAnnounce,
}

impl PortStatistics {
    pub fn increment(&mut self, counter: StatCounter) {
        let value = match counter {
            StatCounter::RxSync => &mut self.rx_sync_count,
            StatCounter::RxFollowUp => &mut self.rx_follow_up_count,
            StatCounter::RxPdelayRequest => &mut self.rx_pdelay_request_count,
            StatCounter::RxPdelayResponse => &mut self.rx_pdelay_response_count,
            StatCounter::RxPdelayResponseFollowUp => &mut self.rx_pdelay_response_follow_up_count,
            StatCounter::RxAnnounce => &mut self.rx_announce_count,
            StatCounter::RxPtpPacketDiscard => &mut self.rx_ptp_packet_discard_count,
            StatCounter::SyncReceiptTimeout => &mut self.sync_receipt_timeout_count,
            StatCounter::PdelayAllowedLostResponsesExceeded => {
                &mut self.pdelay_allowed_lost_responses_exceeded_count
            }
            StatCounter::TxSync => &mut self.tx_sync_count,
            StatCounter::TxFollowUp => &mut self.tx_follow_up_count,
            StatCounter::TxPdelayRequest => &mut self.tx_pdelay_request_count,
            StatCounter::TxPdelayResponse => &mut self.tx_pdelay_response_count,
            StatCounter::TxPdelayResponseFollowUp => &mut self.tx_pdelay_response_follow_up_count,
            StatCounter::TxAnnounce => &mut self.tx_announce_count,
        };
        *value = value.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_saturate() {
        let mut stats = PortStatistics {
            tx_sync_count: u32::MAX - 1,
            ..Default::default()
        };
        stats.increment(StatCounter::TxSync);
        stats.increment(StatCounter::TxSync);
        assert_eq!(stats.tx_sync_count, u32::MAX);
    }

    #[test]
    fn increment_touches_one_counter() {
        let mut stats = PortStatistics::default();
        stats.increment(StatCounter::RxPdelayRequest);
        assert_eq!(
            stats,
            PortStatistics {
                rx_pdelay_request_count: 1,
                ..Default::default()
            }
        );
    }
}
