//! Gate request aggregate
//!
//! `GateRequest` collects the sub-objects of one Gate-Set / Gate-Info /
//! Gate-Delete request or response. Encode emits present sub-objects in
//! the PacketCable field order; decode dispatches on each sub-object's
//! S-Num and tolerates any order, skipping unknown tags with a warning
//! instead of failing.

use bytes::{Bytes, BytesMut};

use crate::classifier::Classifier;
use crate::error::{GateError, GateResult};
use crate::profile::TrafficProfile;
use crate::subobj::{SNum, SubObjHeader, SUBOBJ_HEADER_LEN};
use crate::types::{
    Amid, GateId, GateSpec, GateState, GateTimeInfo, GateUsageInfo, PcmmError, SubscriberId,
    TransactionId,
};

/// Composite gate request/response carried in a COPS ClientSI payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateRequest {
    pub transaction_id: Option<TransactionId>,
    pub gate_id: Option<GateId>,
    pub amid: Option<Amid>,
    pub subscriber_id: Option<SubscriberId>,
    pub gate_spec: Option<GateSpec>,
    pub traffic_profile: Option<TrafficProfile>,
    pub classifier: Option<Classifier>,
    pub error: Option<PcmmError>,
    pub gate_state: Option<GateState>,
    pub gate_time_info: Option<GateTimeInfo>,
    pub gate_usage_info: Option<GateUsageInfo>,
}

impl GateRequest {
    /// Serialize every present sub-object. Request objects go first in
    /// the PacketCable order (TransactionID, GateID, AMID, SubscriberID,
    /// GateSpec, TrafficProfile, Classifier); response-side objects
    /// (error, state, time, usage) follow. Absent objects emit nothing.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        if let Some(transaction_id) = &self.transaction_id {
            transaction_id.encode(&mut buf);
        }
        if let Some(gate_id) = &self.gate_id {
            gate_id.encode(&mut buf);
        }
        if let Some(amid) = &self.amid {
            amid.encode(&mut buf);
        }
        if let Some(subscriber_id) = &self.subscriber_id {
            subscriber_id.encode(&mut buf);
        }
        if let Some(gate_spec) = &self.gate_spec {
            gate_spec.encode(&mut buf);
        }
        if let Some(traffic_profile) = &self.traffic_profile {
            traffic_profile.encode(&mut buf);
        }
        if let Some(classifier) = &self.classifier {
            classifier.encode(&mut buf);
        }
        if let Some(error) = &self.error {
            error.encode(&mut buf);
        }
        if let Some(gate_state) = &self.gate_state {
            gate_state.encode(&mut buf);
        }
        if let Some(gate_time_info) = &self.gate_time_info {
            gate_time_info.encode(&mut buf);
        }
        if let Some(gate_usage_info) = &self.gate_usage_info {
            gate_usage_info.encode(&mut buf);
        }
        buf.freeze()
    }

    /// Parse a gate TLV stream. Sub-objects may arrive in any order;
    /// unknown S-Num or S-Type values are logged and skipped.
    pub fn parse(data: &[u8]) -> GateResult<Self> {
        let mut gate = GateRequest::default();
        let mut offset = 0usize;

        while offset + 5 < data.len() {
            let header = SubObjHeader::read(&data[offset..])?;
            let length = header.length as usize;
            if offset + length > data.len() {
                return Err(GateError::BufferTooShort {
                    needed: length,
                    available: data.len() - offset,
                });
            }
            let payload = &data[offset + SUBOBJ_HEADER_LEN..offset + length];

            match SNum::from_value(header.s_num) {
                Some(SNum::TransactionId) => {
                    gate.transaction_id = Some(TransactionId::parse(payload)?);
                }
                Some(SNum::GateId) => gate.gate_id = Some(GateId::parse(payload)?),
                Some(SNum::Amid) => gate.amid = Some(Amid::parse(payload)?),
                Some(SNum::SubscriberId) => {
                    gate.subscriber_id = Some(SubscriberId::parse(header.s_type, payload)?);
                }
                Some(SNum::GateSpec) => gate.gate_spec = Some(GateSpec::parse(payload)?),
                Some(SNum::TrafficProfile) => {
                    match TrafficProfile::parse(header.s_type, payload) {
                        Ok(profile) => gate.traffic_profile = Some(profile),
                        Err(GateError::UnknownSType { s_num, s_type }) => {
                            log::warn!(
                                "Skipping traffic profile with unknown S-Type: s_num={s_num} s_type={s_type}"
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(SNum::Classifiers) => match Classifier::parse(header.s_type, payload) {
                    Ok(classifier) => gate.classifier = Some(classifier),
                    Err(GateError::UnknownSType { s_num, s_type }) => {
                        log::warn!(
                            "Skipping classifier with unknown S-Type: s_num={s_num} s_type={s_type}"
                        );
                    }
                    Err(e) => return Err(e),
                },
                Some(SNum::PcmmError) => gate.error = Some(PcmmError::parse(payload)?),
                Some(SNum::GateState) => gate.gate_state = Some(GateState::parse(payload)?),
                Some(SNum::GateTimeInfo) => {
                    gate.gate_time_info = Some(GateTimeInfo::parse(payload)?);
                }
                Some(SNum::GateUsageInfo) => {
                    gate.gate_usage_info = Some(GateUsageInfo::parse(payload)?);
                }
                _ => {
                    log::warn!(
                        "Skipping unhandled gate sub-object: s_num={} s_type={} len={}",
                        header.s_num,
                        header.s_type,
                        header.length
                    );
                }
            }

            offset += length;
        }

        Ok(gate)
    }
}
