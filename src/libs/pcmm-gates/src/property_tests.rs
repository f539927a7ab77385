//! Property-Based Tests for Gate Sub-Objects
//!
//! These tests verify that gate sub-objects round-trip through their wire
//! encodings for arbitrary field values, including boundary values.

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    use crate::classifier::{ActivationState, Classifier, ExtendedClassifier, Protocol};
    use crate::gate::GateRequest;
    use crate::profile::{
        BestEffortEnvelope, BestEffortProfile, FlowSpecEnvelope, FlowSpecProfile, TrafficProfile,
    };
    use crate::types::{
        Amid, GateCommand, GateId, GateSpec, GateUsageInfo, PcmmError, PcmmErrorCode,
        SubscriberId, TransactionId,
    };

    fn gate_command_strategy() -> impl Strategy<Value = GateCommand> {
        prop::sample::select(vec![
            GateCommand::GateSet,
            GateCommand::GateSetAck,
            GateCommand::GateSetErr,
            GateCommand::GateInfo,
            GateCommand::GateInfoAck,
            GateCommand::GateDelete,
            GateCommand::GateDeleteAck,
            GateCommand::SyncRequest,
            GateCommand::SyncComplete,
        ])
    }

    fn error_code_strategy() -> impl Strategy<Value = PcmmErrorCode> {
        prop::sample::select(vec![
            PcmmErrorCode::InsufficientResources,
            PcmmErrorCode::UnknownGateId,
            PcmmErrorCode::MissingRequiredObject,
            PcmmErrorCode::InvalidObject,
            PcmmErrorCode::UndefinedServiceClassName,
            PcmmErrorCode::OtherUnspecified,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_transaction_id_round_trip(
            id in any::<u16>(),
            command in gate_command_strategy(),
        ) {
            let trid = TransactionId::new(id, command);
            let mut buf = BytesMut::new();
            trid.encode(&mut buf);
            prop_assert_eq!(TransactionId::parse(&buf[4..]).unwrap(), trid);
        }

        #[test]
        fn prop_amid_round_trip(app_type in any::<u16>(), tag in any::<u16>()) {
            let amid = Amid::new(app_type, tag);
            let mut buf = BytesMut::new();
            amid.encode(&mut buf);
            prop_assert_eq!(Amid::parse(&buf[4..]).unwrap(), amid);
        }

        #[test]
        fn prop_gate_id_round_trip(id in any::<u32>()) {
            let gid = GateId(id);
            let mut buf = BytesMut::new();
            gid.encode(&mut buf);
            prop_assert_eq!(GateId::parse(&buf[4..]).unwrap(), gid);
        }

        #[test]
        fn prop_gate_usage_round_trip(usage in any::<u64>()) {
            let info = GateUsageInfo(usage);
            let mut buf = BytesMut::new();
            info.encode(&mut buf);
            prop_assert_eq!(GateUsageInfo::parse(&buf[4..]).unwrap(), info);
        }

        #[test]
        fn prop_gate_spec_round_trip(
            overwrite in any::<u8>(),
            mask in any::<u8>(),
            session in any::<u8>(),
            t1 in any::<u16>(),
            t2 in any::<u16>(),
            t3 in any::<u16>(),
            t4 in any::<u16>(),
        ) {
            let mut spec = GateSpec::new();
            spec.set_dscp_overwrite(overwrite, mask);
            spec.session_class_id = session;
            spec.timer_t1 = t1;
            spec.timer_t2 = t2;
            spec.timer_t3 = t3;
            spec.timer_t4 = t4;

            let mut buf = BytesMut::new();
            spec.encode(&mut buf);
            prop_assert_eq!(GateSpec::parse(&buf[4..]).unwrap(), spec);
        }

        #[test]
        fn prop_pcmm_error_round_trip(
            code in error_code_strategy(),
            subcode in any::<u16>(),
        ) {
            let err = PcmmError { code, subcode };
            let mut buf = BytesMut::new();
            err.encode(&mut buf);
            prop_assert_eq!(PcmmError::parse(&buf[4..]).unwrap(), err);
        }

        #[test]
        fn prop_subscriber_round_trip(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            let sub = SubscriberId::from(Ipv4Addr::new(a, b, c, d));
            let mut buf = BytesMut::new();
            sub.encode(&mut buf);
            prop_assert_eq!(SubscriberId::parse(1, &buf[4..]).unwrap(), sub);
        }

        #[test]
        fn prop_extended_classifier_round_trip(
            src_port in any::<u16>(),
            dst_port in any::<u16>(),
            classifier_id in any::<u16>(),
            priority in any::<u8>(),
            action in any::<u8>(),
        ) {
            let cls = Classifier::Extended(ExtendedClassifier {
                protocol: Protocol::Udp,
                dscp_tos: 0,
                dscp_tos_mask: 0,
                src_addr: Ipv4Addr::new(10, 0, 0, 1),
                src_mask: Ipv4Addr::new(255, 255, 255, 0),
                dst_addr: Ipv4Addr::new(10, 0, 0, 2),
                dst_mask: Ipv4Addr::new(255, 255, 255, 0),
                src_port_start: src_port,
                src_port_end: src_port,
                dst_port_start: dst_port,
                dst_port_end: dst_port,
                classifier_id,
                priority,
                activation_state: ActivationState::Active,
                action,
            });
            let mut buf = BytesMut::new();
            cls.encode(&mut buf);
            prop_assert_eq!(Classifier::parse(2, &buf[4..]).unwrap(), cls);
        }

        // Flow-spec rate fields survive the f32 wire representation for
        // every magnitude a CMTS will actually see (f32 is exact below
        // 2^24).
        #[test]
        fn prop_flow_spec_f32_round_trip(
            rate in 0u32..16_000_000,
            size in 0u32..16_000_000,
            slack in any::<u32>(),
        ) {
            let env = FlowSpecEnvelope {
                token_bucket_rate: rate,
                token_bucket_size: size,
                peak_data_rate: rate,
                min_policed_unit: 64,
                max_packet_size: 1522,
                rate,
                slack_term: slack,
            };
            let profile = TrafficProfile::FlowSpec(
                FlowSpecProfile::new(env, None, None).unwrap(),
            );
            let mut buf = BytesMut::new();
            profile.encode(&mut buf);
            prop_assert_eq!(TrafficProfile::parse(1, &buf[4..]).unwrap(), profile);
        }

        #[test]
        fn prop_gate_request_round_trip(
            trans_id in any::<u16>(),
            gate_id in any::<u32>(),
            app_type in any::<u16>(),
            priority in any::<u8>(),
        ) {
            let mut gate = GateRequest::default();
            gate.transaction_id = Some(TransactionId::new(trans_id, GateCommand::GateSet));
            gate.gate_id = Some(GateId(gate_id));
            gate.amid = Some(Amid::new(app_type, 1));
            gate.traffic_profile = Some(TrafficProfile::BestEffort(
                BestEffortProfile::new(
                    BestEffortEnvelope { traffic_priority: priority, ..Default::default() },
                    None,
                    None,
                ).unwrap(),
            ));
            let encoded = gate.encode();
            prop_assert_eq!(encoded.len() % 4, 0);
            prop_assert_eq!(GateRequest::parse(&encoded).unwrap(), gate);
        }
    }
}
