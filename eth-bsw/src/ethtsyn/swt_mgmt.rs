//! Reception through the host port of a switch.
//!
//! A frame received by a switch-managed controller is only complete once the
//! switch has told which of its ports received it and when. Until then it is
//! parked in a small per-controller pool.

use arrayvec::ArrayVec;
use tracing::{debug, trace};

use super::{error::service, EthTSyn, EthTSynError};
use crate::{
    datastructures::{
        common::WireTimestamp,
        messages::{Frame, PTP_ETHERTYPE},
    },
    ethif::EthIfCtrlIdx,
    time::VirtualLocalTime,
};

/// Number of frames a controller can park at the same time.
pub const SWT_MGMT_POOL_SIZE: usize = 4;

/// Switch port a frame was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwtMgmtInfo {
    pub switch: u8,
    pub port: u8,
}

#[derive(Debug)]
struct ParkedFrame {
    frame_id: u32,
    data: Frame,
    info: Option<SwtMgmtInfo>,
    ingress: Option<WireTimestamp>,
}

impl ParkedFrame {
    fn is_complete(&self) -> bool {
        self.info.is_some() && self.ingress.is_some()
    }
}

#[derive(Debug, Default)]
pub(crate) struct SwtMgmtPool {
    frames: ArrayVec<ParkedFrame, SWT_MGMT_POOL_SIZE>,
}

impl SwtMgmtPool {
    fn park(&mut self, frame_id: u32, data: Frame) -> Result<(), EthTSynError> {
        if self.frames.iter().any(|frame| frame.frame_id == frame_id) {
            return Err(EthTSynError::InvalidParam("frame id already parked"));
        }
        self.frames
            .try_push(ParkedFrame {
                frame_id,
                data,
                info: None,
                ingress: None,
            })
            .map_err(|_| EthTSynError::SwtMgmtBufferOverflow)
    }

    /// Apply `update` to the parked frame `frame_id`. A frame that is
    /// complete afterwards leaves the pool and is returned.
    fn complete(
        &mut self,
        frame_id: u32,
        update: impl FnOnce(&mut ParkedFrame),
    ) -> Result<Option<ParkedFrame>, EthTSynError> {
        let position = self
            .frames
            .iter()
            .position(|frame| frame.frame_id == frame_id)
            .ok_or(EthTSynError::UnknownFrame(frame_id))?;
        update(&mut self.frames[position]);
        if self.frames[position].is_complete() {
            Ok(Some(self.frames.swap_remove(position)))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn release_all(&mut self) -> usize {
        let released = self.frames.len();
        self.frames.clear();
        released
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.frames.len()
    }
}

impl EthTSyn {
    /// Reception of a frame whose switch management information follows
    /// separately, identified by `frame_id`.
    pub fn swt_mgmt_rx_indication(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_type: u16,
        frame_id: u32,
        data: &[u8],
    ) -> Result<(), EthTSynError> {
        let result = self.swt_mgmt_rx(ethif_ctrl, frame_type, frame_id, data);
        self.checked(service::SWT_MGMT_RX_INDICATION, result)
    }

    fn swt_mgmt_rx(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_type: u16,
        frame_id: u32,
        data: &[u8],
    ) -> Result<(), EthTSynError> {
        let ctrl = self.ctrl(ethif_ctrl)?;
        if !ctrl.config.switch_management {
            return Err(EthTSynError::InvalidParam("controller without switch management"));
        }
        if frame_type != PTP_ETHERTYPE {
            return Err(EthTSynError::InvalidParam("frame type"));
        }
        let data = Frame::try_from(data).map_err(|_| EthTSynError::MessageLength {
            received: data.len(),
            declared: None,
        })?;
        if !ctrl.link.get().active {
            trace!(ctrl = %ethif_ctrl, frame_id, "link down, frame dropped");
            return Ok(());
        }

        ctrl.swt_mgmt.with(|pool| pool.park(frame_id, data))?;
        trace!(ctrl = %ethif_ctrl, frame_id, "frame parked");
        Ok(())
    }

    /// The switch port that received `frame_id`.
    pub fn swt_mgmt_info_indication(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_id: u32,
        info: SwtMgmtInfo,
    ) -> Result<(), EthTSynError> {
        let result = self.swt_mgmt_update(ethif_ctrl, frame_id, |frame| frame.info = Some(info));
        self.checked(service::SWT_MGMT_INFO_INDICATION, result)
    }

    /// The time at which the switch received `frame_id`.
    pub fn swt_ingress_timestamp_indication(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_id: u32,
        timestamp: WireTimestamp,
    ) -> Result<(), EthTSynError> {
        let result = self.swt_mgmt_update(ethif_ctrl, frame_id, |frame| {
            frame.ingress = Some(timestamp)
        });
        self.checked(service::SWT_INGRESS_TS_INDICATION, result)
    }

    fn swt_mgmt_update(
        &self,
        ethif_ctrl: EthIfCtrlIdx,
        frame_id: u32,
        update: impl FnOnce(&mut ParkedFrame),
    ) -> Result<(), EthTSynError> {
        let ctrl = self.ctrl(ethif_ctrl)?;
        let Some(frame) = ctrl.swt_mgmt.with(|pool| pool.complete(frame_id, update))? else {
            return Ok(());
        };

        let ingress = frame.ingress.and_then(|timestamp| {
            VirtualLocalTime::try_from(timestamp)
                .map_err(|error| debug!(%timestamp, %error, "invalid switch ingress timestamp"))
                .ok()
        });
        trace!(ctrl = %ethif_ctrl, frame_id, info = ?frame.info, "switch management complete");
        self.receive(ctrl, &frame.data, ingress)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::{
        datastructures::{
            common::{ClockIdentity, PortIdentity},
            messages::Message,
        },
        drivers::TrcvLinkState,
        error::ModuleId,
        ethtsyn::{
            error_id,
            test::{ethtsyn, master_config, FakeNetwork},
            PdelayResponderState, PortIdx,
        },
    };

    const CTRL: EthIfCtrlIdx = EthIfCtrlIdx(2);

    fn bridge() -> (EthTSyn, Rc<FakeNetwork>, Rc<crate::error::test::RecordingTracer>) {
        let mut config = master_config();
        config.controllers[0].switch_management = true;
        config.controllers[0].hardware_timestamping = true;
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, tracer) = ethtsyn(config, &net);
        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Active).unwrap();
        ethtsyn.main_function();
        (ethtsyn, net, tracer)
    }

    fn pdelay_request() -> Frame {
        Message::builder()
            .source_port_identity(PortIdentity {
                clock_identity: ClockIdentity([9, 9, 9, 9, 9, 9, 9, 9]),
                port_number: 1,
            })
            .sequence_id(12)
            .pdelay_req_message()
            .serialize_frame()
            .unwrap()
    }

    #[test]
    fn frame_is_dispatched_once_complete() {
        let (ethtsyn, _, _) = bridge();
        ethtsyn
            .swt_mgmt_rx_indication(CTRL, PTP_ETHERTYPE, 1, &pdelay_request())
            .unwrap();
        ethtsyn
            .swt_mgmt_info_indication(CTRL, 1, SwtMgmtInfo { switch: 0, port: 3 })
            .unwrap();
        assert_eq!(
            ethtsyn.pdelay_responder_state(PortIdx(0)),
            Ok(Some(PdelayResponderState::WaitRxPdReq))
        );

        ethtsyn
            .swt_ingress_timestamp_indication(
                CTRL,
                1,
                WireTimestamp {
                    seconds: 2,
                    nanos: 500,
                },
            )
            .unwrap();
        assert_eq!(
            ethtsyn.pdelay_responder_state(PortIdx(0)),
            Ok(Some(PdelayResponderState::TxPdResp))
        );
        let stats = ethtsyn.port_statistics(PortIdx(0)).unwrap();
        assert_eq!(stats.rx_pdelay_request_count, 1);
        assert_eq!(ethtsyn.ctrls[0].swt_mgmt.with(|pool| pool.len()), 0);
    }

    #[test]
    fn pool_overflow_is_reported() {
        let (ethtsyn, _, tracer) = bridge();
        let frame = pdelay_request();
        for frame_id in 0..SWT_MGMT_POOL_SIZE as u32 {
            ethtsyn
                .swt_mgmt_rx_indication(CTRL, PTP_ETHERTYPE, frame_id, &frame)
                .unwrap();
        }
        assert_eq!(
            ethtsyn.swt_mgmt_rx_indication(CTRL, PTP_ETHERTYPE, 99, &frame),
            Err(EthTSynError::SwtMgmtBufferOverflow)
        );
        assert_eq!(
            *tracer.errors.borrow(),
            vec![(
                ModuleId::EthTSyn,
                service::SWT_MGMT_RX_INDICATION,
                error_id::E_SWT_MGMT_BUF_OVERFLOW
            )]
        );

        ethtsyn.trcv_link_state_chg(CTRL, TrcvLinkState::Down).unwrap();
        assert_eq!(ethtsyn.ctrls[0].swt_mgmt.with(|pool| pool.len()), 0);
    }

    #[test]
    fn unknown_frame_id() {
        let (ethtsyn, _, _) = bridge();
        assert_eq!(
            ethtsyn.swt_mgmt_info_indication(CTRL, 5, SwtMgmtInfo { switch: 0, port: 1 }),
            Err(EthTSynError::UnknownFrame(5))
        );
    }

    #[test]
    fn end_station_rejects_switch_management() {
        let net = Rc::new(FakeNetwork::default());
        let (ethtsyn, _) = ethtsyn(master_config(), &net);
        assert!(matches!(
            ethtsyn.swt_mgmt_rx_indication(CTRL, PTP_ETHERTYPE, 1, &pdelay_request()),
            Err(EthTSynError::InvalidParam(_))
        ));
    }
}
