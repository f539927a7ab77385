//! Property-Based Tests for COPS Messages
//!
//! These tests verify that COPS messages can be encoded and decoded
//! correctly, producing equivalent message structures, and that every
//! encoding honors the 4-byte alignment invariant.

#[cfg(test)]
mod tests {
    use bytes::{Buf, Bytes, BytesMut};
    use proptest::prelude::*;

    use crate::header::{CopsHeader, OpCode};
    use crate::message::{
        ClientAcceptMsg, ClientOpenMsg, CopsMessage, DecisionMsg, ReportMsg, RequestMsg,
    };
    use crate::object::{
        ClientSi, Context, CopsObject, Decision, DecisionCommand, DecisionFlag, Handle, PepId,
        RType, ReportKind,
    };
    use crate::COPS_CLIENT_PCMM;

    fn handle_strategy() -> impl Strategy<Value = Handle> {
        prop::collection::vec(any::<u8>(), 1..32)
            .prop_map(|v| Handle::new(Bytes::from(v)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_header_round_trip(
            solicited in any::<bool>(),
            op in 1u8..=10,
            client_type in any::<u16>(),
            body_words in 0u32..1024,
        ) {
            let mut header = CopsHeader::new(OpCode::try_from(op).unwrap(), client_type);
            header.solicited = solicited;
            header.message_length = body_words * 4;

            let mut buf = BytesMut::new();
            header.encode(&mut buf);
            prop_assert_eq!(buf.len(), 8);

            let decoded = CopsHeader::decode(&mut buf.freeze()).unwrap();
            prop_assert_eq!(decoded, header);
        }

        #[test]
        fn prop_handle_object_round_trip(handle in handle_strategy()) {
            let obj = CopsObject::Handle(handle);
            let mut buf = BytesMut::new();
            obj.encode(&mut buf);
            prop_assert_eq!(buf.len() % 4, 0);

            // Stored length never counts the trailing padding
            let stored = u16::from_be_bytes([buf[0], buf[1]]) as usize;
            prop_assert!(stored <= buf.len());
            prop_assert!(buf.len() - stored < 4);

            let mut bytes = buf.freeze();
            let decoded = CopsObject::decode(&mut bytes).unwrap();
            prop_assert!(!bytes.has_remaining());
            prop_assert_eq!(decoded, obj);
        }

        #[test]
        fn prop_request_round_trip(
            handle in handle_strategy(),
            m_type in any::<u16>(),
        ) {
            let msg = CopsMessage::Request(RequestMsg::new(
                COPS_CLIENT_PCMM,
                handle,
                Context::new(RType::Config, m_type),
            ));
            let mut bytes = msg.encode().freeze();
            let decoded = CopsMessage::decode(&mut bytes).unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn prop_client_open_round_trip(
            pep in "[a-z][a-z0-9-]{0,14}",
            si in prop::collection::vec(any::<u8>(), 4..32),
        ) {
            let mut open = ClientOpenMsg::new(COPS_CLIENT_PCMM, PepId::new(pep));
            open.client_si = Some(ClientSi::signaled(Bytes::from(si)));
            let msg = CopsMessage::ClientOpen(open);
            let mut bytes = msg.encode().freeze();
            prop_assert_eq!(CopsMessage::decode(&mut bytes).unwrap(), msg);
        }

        #[test]
        fn prop_client_accept_round_trip(ka in any::<u16>(), acct in any::<Option<u16>>()) {
            let msg = CopsMessage::ClientAccept(
                ClientAcceptMsg::new(COPS_CLIENT_PCMM, ka, acct),
            );
            let mut bytes = msg.encode().freeze();
            prop_assert_eq!(CopsMessage::decode(&mut bytes).unwrap(), msg);
        }

        #[test]
        fn prop_decision_round_trip(
            handle in handle_strategy(),
            payload in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut dec = DecisionMsg::new(
                COPS_CLIENT_PCMM,
                handle,
                vec![(
                    Context::new(RType::Config, 0),
                    vec![Decision::new(DecisionCommand::Install, DecisionFlag::ReqError)],
                )],
            ).unwrap();
            if !payload.is_empty() {
                dec.client_data = Some(Bytes::from(payload));
            }
            let msg = CopsMessage::Decision(dec);
            let mut bytes = msg.encode().freeze();
            prop_assert_eq!(CopsMessage::decode(&mut bytes).unwrap(), msg);
        }

        #[test]
        fn prop_report_round_trip(
            handle in handle_strategy(),
            kind in 1u16..=3,
            si in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut rpt = ReportMsg::new(
                COPS_CLIENT_PCMM,
                handle,
                ReportKind::try_from(kind).unwrap(),
            );
            if !si.is_empty() {
                rpt.client_si = Some(ClientSi::named(Bytes::from(si)));
            }
            let msg = CopsMessage::Report(rpt);
            let mut bytes = msg.encode().freeze();
            prop_assert_eq!(CopsMessage::decode(&mut bytes).unwrap(), msg);
        }

        #[test]
        fn prop_encoded_message_always_aligned(
            handle in handle_strategy(),
            si in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut rpt = ReportMsg::new(COPS_CLIENT_PCMM, handle, ReportKind::Success);
            if !si.is_empty() {
                rpt.client_si = Some(ClientSi::named(Bytes::from(si)));
            }
            let buf = CopsMessage::Report(rpt).encode();
            prop_assert_eq!(buf.len() % 4, 0);

            // Header length field matches the encoded body
            let body_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
            prop_assert_eq!(body_len + 8, buf.len());
        }
    }
}
