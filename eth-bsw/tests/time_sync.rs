mod common;

use std::rc::Rc;

use common::{ethtsyn, Network, Tracer};
use eth_bsw::{
    config::EthTSynConfig,
    datastructures::messages::{Message, PTP_ETHERTYPE},
    drivers::TrcvLinkState,
    ethif::EthIfCtrlIdx,
    ethtsyn::{
        error_id, PdelayInitiatorState, PdelayResponderState, PortIdx, SlaveRxState, TxKind,
    },
    ClockIdentity, Duration, EthTSyn, GlobalTime, ModuleId, PortIdentity, TimeBaseStatus,
    VirtualLocalTime, WireTimestamp,
};

const CTRL: EthIfCtrlIdx = EthIfCtrlIdx(0);
const PORT: PortIdx = PortIdx(0);
const RX_INDICATION: u8 = 0x42;

const MAC_A: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x0a];
const MAC_B: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x0b];

/// A slave port that answers pdelay requests.
const RESPONDER: &str = r#"
    [[controller]]
    ethif-ctrl = 0

    [[time-domain]]
    domain-number = 0
    time-base = 1

    [[time-domain.port]]
    controller = 0
    role = { type = "slave", follow-up-timeout-ticks = 10 }
"#;

const MASTER: &str = r#"
    [[controller]]
    ethif-ctrl = 0

    [[time-domain]]
    domain-number = 0
    time-base = 1

    [[time-domain.port]]
    controller = 0
    role = { type = "master", sync-interval-ticks = 4 }
"#;

const SLAVE: &str = r#"
    [[controller]]
    ethif-ctrl = 0

    [[time-domain]]
    domain-number = 0
    time-base = 1

    [[time-domain.port]]
    controller = 0
    role = { type = "slave", follow-up-timeout-ticks = 10 }
    pdelay-initiator = { interval-ticks = 8 }
    pdelay-responder = false
"#;

fn node(config: &str, mac: [u8; 6]) -> (Rc<EthTSyn>, Rc<Network>, Rc<Tracer>) {
    let config: EthTSynConfig = toml::from_str(config).unwrap();
    let net = Network::new(mac);
    let (ethtsyn, tracer) = ethtsyn(config, &net);
    ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
    ethtsyn.main_function();
    (ethtsyn, net, tracer)
}

fn requester() -> PortIdentity {
    PortIdentity {
        clock_identity: ClockIdentity::from_mac_address(MAC_B),
        port_number: 1,
    }
}

fn pdelay_request(sequence_id: u16) -> Vec<u8> {
    let frame = Message::builder()
        .source_port_identity(requester())
        .sequence_id(sequence_id)
        .pdelay_req_message()
        .serialize_frame()
        .unwrap();
    frame.to_vec()
}

#[test]
fn responder_completes_one_exchange() {
    let (ethtsyn, net, tracer) = node(RESPONDER, MAC_A);
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitRxPdReq))
    );

    net.local_nanos.set(1_000);
    ethtsyn
        .rx_indication(CTRL, PTP_ETHERTYPE, &pdelay_request(3), None)
        .unwrap();
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::TxPdResp))
    );

    ethtsyn.main_function();
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitPdRespEgrTs))
    );
    let (response, context) = net.sent.borrow()[0].clone();
    assert_eq!(context.kind, TxKind::PdelayResp);
    let Ok(Message::PDelayResp(response)) = Message::deserialize(&response) else {
        panic!("expected a pdelay response");
    };
    assert_eq!(response.header().sequence_id(), 3);
    assert_eq!(response.requesting_port_identity(), requester());
    assert_eq!(
        response.request_receipt_timestamp(),
        WireTimestamp {
            seconds: 0,
            nanos: 1_000
        }
    );

    net.local_nanos.set(4_000);
    ethtsyn.tx_confirmation(CTRL, context, None).unwrap();
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::TxPdRespFup))
    );

    ethtsyn.main_function();
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitRxPdReq))
    );
    let (follow_up, context) = net.sent.borrow()[1].clone();
    assert_eq!(context.kind, TxKind::PdelayRespFollowUp);
    let Ok(Message::PDelayRespFollowUp(follow_up)) = Message::deserialize(&follow_up) else {
        panic!("expected a pdelay response follow up");
    };
    assert_eq!(
        follow_up.response_origin_timestamp(),
        WireTimestamp {
            seconds: 0,
            nanos: 4_000
        }
    );
    ethtsyn.tx_confirmation(CTRL, context, None).unwrap();

    let stats = ethtsyn.port_statistics(PORT).unwrap();
    assert_eq!(stats.rx_pdelay_request_count, 1);
    assert_eq!(stats.tx_pdelay_response_count, 1);
    assert_eq!(stats.tx_pdelay_response_follow_up_count, 1);
    assert_eq!(stats.rx_ptp_packet_discard_count, 0);
    assert!(tracer.errors.borrow().is_empty());
}

#[test]
fn responder_request_acceptance() {
    let (ethtsyn, net, _) = node(RESPONDER, MAC_A);
    let request = |sequence_id| {
        ethtsyn
            .rx_indication(CTRL, PTP_ETHERTYPE, &pdelay_request(sequence_id), None)
            .unwrap()
    };

    request(7);
    ethtsyn.main_function();
    let stale = net.sent.borrow()[0].1;
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitPdRespEgrTs))
    );

    // the same request again is a duplicate
    request(7);
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitPdRespEgrTs))
    );

    // a new one replaces the exchange in progress
    request(8);
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::TxPdResp))
    );

    // a late confirmation of the replaced response changes nothing
    ethtsyn.tx_confirmation(CTRL, stale, None).unwrap();
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::TxPdResp))
    );

    ethtsyn.main_function();
    let (response, _) = net.sent.borrow()[1].clone();
    let message = Message::deserialize(&response).unwrap();
    assert_eq!(message.header().sequence_id(), 8);
}

#[test]
fn short_frame_with_larger_declared_length() {
    let (ethtsyn, _, tracer) = node(RESPONDER, MAC_A);
    let mut frame = pdelay_request(1);
    frame.truncate(33);
    frame[2..4].copy_from_slice(&44u16.to_be_bytes());

    assert!(ethtsyn
        .rx_indication(CTRL, PTP_ETHERTYPE, &frame, None)
        .is_err());
    assert_eq!(
        *tracer.errors.borrow(),
        vec![(ModuleId::EthTSyn, RX_INDICATION, error_id::E_MSG_LENGTH)]
    );
    assert_eq!(
        ethtsyn.pdelay_responder_state(PORT),
        Ok(Some(PdelayResponderState::WaitRxPdReq))
    );
    assert_eq!(ethtsyn.port_statistics(PORT).unwrap(), Default::default());
}

#[test]
fn link_down_resets_every_machine() {
    let (ethtsyn, _, _) = node(SLAVE, MAC_B);
    ethtsyn.main_function();
    assert_eq!(
        ethtsyn.pdelay_initiator_state(PORT),
        Ok(Some(PdelayInitiatorState::WaitPdResp))
    );

    ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Down).unwrap();
    assert_eq!(
        ethtsyn.pdelay_initiator_state(PORT),
        Ok(Some(PdelayInitiatorState::Initializing))
    );
    assert_eq!(
        ethtsyn.slave_rx_state(PORT),
        Ok(Some(SlaveRxState::Initializing))
    );
    assert_eq!(ethtsyn.as_capable(PORT), Ok(false));

    // stays initial while the link is down
    for _ in 0..3 {
        ethtsyn.main_function();
    }
    assert_eq!(
        ethtsyn.pdelay_initiator_state(PORT),
        Ok(Some(PdelayInitiatorState::Initializing))
    );

    ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
    ethtsyn.main_function();
    assert_eq!(
        ethtsyn.slave_rx_state(PORT),
        Ok(Some(SlaveRxState::WaitSync))
    );
}

#[test]
fn master_synchronizes_slave() {
    let (master, master_net, _) = node(MASTER, MAC_A);
    let (slave, slave_net, slave_tracer) = node(SLAVE, MAC_B);

    // request leaves the slave at t1
    slave_net.local_nanos.set(10_000);
    slave.main_function();
    // and reaches the master at t2
    master_net.local_nanos.set(100_500);
    slave_net.deliver(&slave, &master);

    // response and the first sync, sent at t3, received at t4
    master_net.local_nanos.set(100_600);
    master.main_function();
    master_net.local_nanos.set(100_700);
    slave_net.local_nanos.set(11_200);
    master_net.deliver(&master, &slave);
    master.main_function();
    master_net.deliver(&master, &slave);

    assert_eq!(slave.as_capable(PORT), Ok(false));
    slave.main_function();
    assert_eq!(slave.as_capable(PORT), Ok(true));
    assert_eq!(slave.propagation_delay(PORT), Ok(Duration::from_nanos(500)));
    assert!(slave_net.global_times.borrow().is_empty());

    for _ in 0..5 {
        master.main_function();
        if master_net
            .sent
            .borrow()
            .iter()
            .any(|(_, context)| context.kind == TxKind::Sync)
        {
            break;
        }
    }
    master_net.local_nanos.set(200_000);
    slave_net.local_nanos.set(50_000);
    master_net.deliver(&master, &slave);
    assert_eq!(
        slave.slave_rx_state(PORT),
        Ok(Some(SlaveRxState::WaitFollowUp))
    );

    master.main_function();
    master_net.deliver(&master, &slave);
    assert_eq!(slave.slave_rx_state(PORT), Ok(Some(SlaveRxState::WaitSync)));
    assert_eq!(
        slave_net.global_times.borrow().last(),
        Some(&(
            eth_bsw::ethtsyn::TimeBaseId(1),
            GlobalTime::new(
                TimeBaseStatus::GLOBAL_TIME_BASE,
                WireTimestamp {
                    seconds: 0,
                    nanos: 200_500
                }
            ),
            VirtualLocalTime::from_nanos(50_000),
        ))
    );
    assert!(slave_tracer.errors.borrow().is_empty());
    assert!(slave_tracer.runtime_errors.borrow().is_empty());

    let stats = slave.port_statistics(PORT).unwrap();
    assert_eq!(stats.tx_pdelay_request_count, 1);
    assert_eq!(stats.rx_pdelay_response_count, 1);
    assert_eq!(stats.rx_pdelay_response_follow_up_count, 1);
    assert_eq!(stats.rx_sync_count, 2);
    assert_eq!(stats.rx_follow_up_count, 2);
}
