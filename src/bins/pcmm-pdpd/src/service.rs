//! Policy service facade
//!
//! The surface the provisioning layer drives: connect to a PEP, install
//! and remove gates synchronously, query gate state, synchronize, and
//! disconnect. Gate failures come back as values, not panics, so the
//! caller decides policy.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;

use cops_stack::error::{CopsError, CopsResult};
use cops_stack::message::{ClientCloseMsg, CopsMessage};
use cops_stack::object::{ErrorCode, ErrorObject, Handle};
use pcmm_gates::types::GateId;
use pcmm_gates::GateRequest;

use crate::agent::{PdpAgent, PepSession};
use crate::config::PdpConfig;
use crate::connection::PdpConnection;
use crate::policy::PolicyHandler;
use crate::sender::{GateSender, GateTransactionError};

/// Errors surfaced by the service facade
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not connected to a PEP")]
    NotConnected,

    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error(transparent)]
    Gate(#[from] GateTransactionError),

    #[error(transparent)]
    Cops(#[from] CopsError),
}

struct ActiveSession {
    connection: Arc<PdpConnection>,
    sender: GateSender,
    handle: Handle,
    task: tokio::task::JoinHandle<CopsResult<()>>,
}

/// One PDP-side session towards one PEP
pub struct PdpService {
    agent: PdpAgent,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl PdpService {
    pub fn new(config: PdpConfig, handler: Arc<dyn PolicyHandler>) -> Self {
        Self {
            agent: PdpAgent::new(config, handler),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Dial the PEP, run the COPS handshake and start the receive loop
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), ServiceError> {
        let target = format!("{host}:{port}");
        let addr: SocketAddr = target
            .to_socket_addrs()
            .map_err(|_| ServiceError::Resolve(target.clone()))?
            .next()
            .ok_or(ServiceError::Resolve(target))?;

        let session = self.agent.connect(addr).await?;
        self.attach(session).await;
        Ok(())
    }

    /// Adopt an already-established session (accept-side callers)
    pub async fn attach(&self, session: PepSession) {
        let (connection, sender, handle, task) = session.spawn();
        *self.session.lock().await = Some(ActiveSession {
            connection,
            sender,
            handle,
            task,
        });
    }

    /// The client handle of the active session
    pub async fn handle(&self) -> Option<Handle> {
        self.session.lock().await.as_ref().map(|s| s.handle.clone())
    }

    /// Install a gate; returns the CMTS-assigned gate id
    pub async fn send_gate_set(&self, gate: GateRequest) -> Result<GateId, ServiceError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ServiceError::NotConnected)?;
        Ok(session.sender.send_gate_set(gate).await?)
    }

    /// Remove a previously installed gate
    pub async fn send_gate_delete(&self, gate_id: GateId) -> Result<(), ServiceError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ServiceError::NotConnected)?;
        let mut gate = GateRequest::default();
        gate.gate_id = Some(gate_id);
        Ok(session.sender.send_gate_delete(gate).await?)
    }

    /// Query gate state, time and usage for an installed gate
    pub async fn send_gate_info(&self, gate_id: GateId) -> Result<GateRequest, ServiceError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ServiceError::NotConnected)?;
        Ok(session.sender.send_gate_info(gate_id).await?)
    }

    /// Ask the PEP to synchronize every open request state
    pub async fn sync(&self) -> Result<(), ServiceError> {
        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ServiceError::NotConnected)?;
        Ok(session.connection.sync_all_request_state().await?)
    }

    /// Send Client-Close and stop the receive loop
    pub async fn disconnect(&self) -> Result<(), ServiceError> {
        let mut guard = self.session.lock().await;
        let session = guard.take().ok_or(ServiceError::NotConnected)?;

        let close = CopsMessage::ClientClose(ClientCloseMsg::new(
            session.connection.client_type(),
            ErrorObject::new(ErrorCode::ShuttingDown),
        ));
        {
            let writer = session.connection.writer();
            let mut writer = writer.lock().await;
            if let Err(e) = writer.send(&close).await {
                log::warn!("Failed to send client-close on disconnect: {e}");
            }
            let _ = writer.shutdown().await;
        }
        session.task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyHandler;
    use crate::state::RequestState;

    use bytes::Bytes;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    use cops_stack::message::{
        ClientOpenMsg, CopsMessage, ReportMsg, RequestMsg,
    };
    use cops_stack::object::{ClientSi, Context, PepId, RType, ReportKind};
    use cops_stack::transport::{CopsListener, CopsTransport};
    use cops_stack::COPS_CLIENT_PCMM;
    use pcmm_gates::classifier::{Classifier, LegacyClassifier, Protocol};
    use pcmm_gates::types::{
        Amid, GateCommand, MmVersionInfo, PcmmError, PcmmErrorCode, SubscriberId, TransactionId,
    };

    #[derive(Default)]
    struct CountingHandler {
        success: AtomicUsize,
        fail: AtomicUsize,
    }

    impl PolicyHandler for CountingHandler {
        fn success_report(&self, _handle: &Handle, _gate: &GateRequest) {
            self.success.fetch_add(1, Ordering::SeqCst);
        }
        fn fail_report(&self, _handle: &Handle, _gate: &GateRequest) {
            self.fail.fetch_add(1, Ordering::SeqCst);
        }
        fn acct_report(&self, _handle: &Handle, _gate: &GateRequest) {}
    }

    /// PEP side of the handshake: client-open, expect accept, first
    /// request
    async fn pep_open(transport: &mut CopsTransport, pep: &str, handle: &str) -> u16 {
        let mut open = ClientOpenMsg::new(COPS_CLIENT_PCMM, PepId::new(pep));
        open.client_si = Some(ClientSi::signaled(
            MmVersionInfo::default().to_bytes().freeze(),
        ));
        transport
            .send(&CopsMessage::ClientOpen(open))
            .await
            .unwrap();

        let ka_timer = match transport.recv().await.unwrap() {
            CopsMessage::ClientAccept(accept) => accept.ka_timer,
            other => panic!("expected client-accept, got {other:?}"),
        };

        let request = RequestMsg::new(
            COPS_CLIENT_PCMM,
            Handle::from(handle),
            Context::new(RType::Config, 0),
        );
        transport
            .send(&CopsMessage::Request(request))
            .await
            .unwrap();
        ka_timer
    }

    fn test_gate() -> GateRequest {
        let mut gate = GateRequest::default();
        gate.amid = Some(Amid::new(1, 1));
        gate.subscriber_id = Some(SubscriberId::from(Ipv4Addr::new(10, 0, 0, 5)));
        gate.classifier = Some(Classifier::Legacy(LegacyClassifier {
            protocol: Protocol::Tcp,
            dscp_tos: 0,
            dscp_tos_mask: 0,
            src_addr: Ipv4Addr::new(10, 0, 0, 2),
            dst_addr: Ipv4Addr::new(10, 0, 0, 9),
            src_port: 8081,
            dst_port: 0,
            priority: 64,
        }));
        gate
    }

    /// Scenario A: handshake creates one request state manager in Init
    #[tokio::test]
    async fn test_handshake_creates_init_state() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler);

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            let ka = pep_open(&mut transport, "pep-1", "h1").await;
            assert_eq!(ka, 30);
            transport
        });

        let session = agent.accept(&listener).await.unwrap();
        assert_eq!(session.handle, Handle::from("h1"));
        assert_eq!(session.connection.pep_id().as_str(), "pep-1");
        {
            let managers = session.connection.managers();
            let managers = managers.lock().unwrap();
            let manager = managers.get(&Handle::from("h1")).unwrap();
            assert_eq!(manager.status(), RequestState::Init);
        }

        pep.await.unwrap();
    }

    /// Scenario B: a gate-set decision parses back on the PEP side and
    /// the simulated Gate-Set-Ack resolves the caller with gate id 42
    #[tokio::test]
    async fn test_gate_set_resolves_with_gate_id() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler.clone());

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            pep_open(&mut transport, "pep-1", "h1").await;

            // Receive the gate-set decision and reconstruct the gate
            let decision = match transport.recv().await.unwrap() {
                CopsMessage::Decision(decision) => decision,
                other => panic!("expected decision, got {other:?}"),
            };
            let payload = decision.client_data.expect("decision without gate payload");
            let gate = GateRequest::parse(&payload).unwrap();
            assert_eq!(gate.amid, Some(Amid::new(1, 1)));
            assert_eq!(
                gate.subscriber_id,
                Some(SubscriberId::from(Ipv4Addr::new(10, 0, 0, 5)))
            );
            let trid = gate.transaction_id.unwrap();
            assert_eq!(trid.command, GateCommand::GateSet);
            match gate.classifier {
                Some(Classifier::Legacy(cls)) => {
                    assert_eq!(cls.protocol, Protocol::Tcp);
                    assert_eq!(cls.src_port, 8081);
                }
                other => panic!("expected legacy classifier, got {other:?}"),
            }

            // Answer with a success report carrying GateSetAck + id 42
            let mut response = GateRequest::default();
            response.transaction_id =
                Some(TransactionId::new(trid.id, GateCommand::GateSetAck));
            response.gate_id = Some(GateId(42));
            let mut report =
                ReportMsg::new(COPS_CLIENT_PCMM, Handle::from("h1"), ReportKind::Success);
            report.client_si = Some(ClientSi::named(response.encode()));
            transport
                .send(&CopsMessage::Report(report))
                .await
                .unwrap();
            transport
        });

        let service = Arc::new(PdpService::new(PdpConfig::default(), handler.clone()));
        let session = agent.accept(&listener).await.unwrap();
        service.attach(session).await;

        let gate_id = service.send_gate_set(test_gate()).await.unwrap();
        assert_eq!(gate_id, GateId(42));
        assert_eq!(handler.success.load(Ordering::SeqCst), 1);

        pep.await.unwrap();
        service.disconnect().await.unwrap();
    }

    /// Scenario C: a failure report resolves the caller with the PCMM
    /// error and invokes the fail callback
    #[tokio::test]
    async fn test_gate_set_failure_delivers_error() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler.clone());

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            pep_open(&mut transport, "pep-1", "h1").await;

            let decision = match transport.recv().await.unwrap() {
                CopsMessage::Decision(decision) => decision,
                other => panic!("expected decision, got {other:?}"),
            };
            let gate = GateRequest::parse(&decision.client_data.unwrap()).unwrap();
            let trid = gate.transaction_id.unwrap();

            let mut response = GateRequest::default();
            response.transaction_id =
                Some(TransactionId::new(trid.id, GateCommand::GateSetErr));
            response.error = Some(PcmmError::new(PcmmErrorCode::MissingRequiredObject));
            let mut report =
                ReportMsg::new(COPS_CLIENT_PCMM, Handle::from("h1"), ReportKind::Failure);
            report.client_si = Some(ClientSi::named(response.encode()));
            transport
                .send(&CopsMessage::Report(report))
                .await
                .unwrap();
            transport
        });

        let service = PdpService::new(PdpConfig::default(), handler.clone());
        let session = agent.accept(&listener).await.unwrap();
        service.attach(session).await;

        let result = service.send_gate_set(test_gate()).await;
        match result {
            Err(ServiceError::Gate(GateTransactionError::Gate(error))) => {
                assert_eq!(error.code, PcmmErrorCode::MissingRequiredObject);
            }
            other => panic!("expected gate error, got {other:?}"),
        }
        assert_eq!(handler.fail.load(Ordering::SeqCst), 1);
        assert_eq!(handler.success.load(Ordering::SeqCst), 0);

        pep.await.unwrap();
    }

    /// A caller whose report never arrives times out with a distinct
    /// no-response failure
    #[tokio::test]
    async fn test_gate_set_timeout() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let mut config = PdpConfig::default();
        config.gate_timeout = Duration::from_millis(50);
        let agent = PdpAgent::new(config.clone(), handler.clone());

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            pep_open(&mut transport, "pep-1", "h1").await;
            // Swallow the decision, never report
            let _ = transport.recv().await.unwrap();
            transport
        });

        let service = PdpService::new(config, handler);
        let session = agent.accept(&listener).await.unwrap();
        service.attach(session).await;

        let result = service.send_gate_set(test_gate()).await;
        assert!(matches!(
            result,
            Err(ServiceError::Gate(GateTransactionError::Timeout(_)))
        ));

        pep.await.unwrap();
    }

    /// Keep-alive messages are echoed back to the PEP
    #[tokio::test]
    async fn test_keep_alive_echo() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler.clone());

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            pep_open(&mut transport, "pep-1", "h1").await;

            let ka = CopsMessage::KeepAlive(cops_stack::message::KeepAliveMsg::new(
                COPS_CLIENT_PCMM,
            ));
            transport.send(&ka).await.unwrap();
            let echo = transport.recv().await.unwrap();
            assert_eq!(echo, ka);
        });

        let session = agent.accept(&listener).await.unwrap();
        let (_connection, _sender, _handle, task) = session.spawn();

        pep.await.unwrap();
        task.abort();
    }

    /// A malformed message during the handshake triggers a client-close
    /// with the matching error code
    #[tokio::test]
    async fn test_malformed_open_gets_specific_close() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler);

        let pep = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            // Client-open carrying an In-Interface object (class number 3),
            // which the PCMM profile does not know
            let raw: [u8; 16] = [
                0x10, 6, 0x80, 0x0A, 0, 0, 0, 8, // header, body length 8
                0, 8, 3, 1, 0, 0, 0, 0, // unknown object
            ];
            stream.write_all(&raw).await.unwrap();

            let mut transport = CopsTransport::new(stream).unwrap();
            match transport.recv().await.unwrap() {
                CopsMessage::ClientClose(close) => {
                    assert_eq!(close.error.code, ErrorCode::UnknownObject);
                }
                other => panic!("expected client-close, got {other:?}"),
            }
        });

        let result = agent.accept(&listener).await;
        assert!(result.is_err());
        pep.await.unwrap();
    }

    /// An unaligned message length is rejected as a bad message format
    #[tokio::test]
    async fn test_unaligned_length_rejected() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler);

        let pep = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let raw: [u8; 8] = [0x10, 6, 0x80, 0x0A, 0, 0, 0, 7];
            stream.write_all(&raw).await.unwrap();

            let mut transport = CopsTransport::new(stream).unwrap();
            match transport.recv().await.unwrap() {
                CopsMessage::ClientClose(close) => {
                    assert_eq!(close.error.code, ErrorCode::BadMessageFormat);
                }
                other => panic!("expected client-close, got {other:?}"),
            }
        });

        let result = agent.accept(&listener).await;
        assert!(result.is_err());
        pep.await.unwrap();
    }

    /// A client-open for a foreign client type is refused
    #[tokio::test]
    async fn test_unsupported_client_type_refused() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler);

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            let mut open = ClientOpenMsg::new(0x0001, PepId::new("pep-1"));
            open.client_si = Some(ClientSi::signaled(Bytes::from_static(&[0, 8, 16, 1])));
            transport
                .send(&CopsMessage::ClientOpen(open))
                .await
                .unwrap();
            match transport.recv().await.unwrap() {
                CopsMessage::ClientClose(close) => {
                    assert_eq!(close.error.code, ErrorCode::UnsupportedClientType);
                }
                other => panic!("expected client-close, got {other:?}"),
            }
        });

        let result = agent.accept(&listener).await;
        assert!(result.is_err());
        pep.await.unwrap();
    }

    /// Delete-Request removes the state manager for the handle
    #[tokio::test]
    async fn test_delete_request_removes_manager() {
        let listener = CopsListener::bind(([127, 0, 0, 1], 0).into()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(CountingHandler::default());
        let agent = PdpAgent::new(PdpConfig::default(), handler);

        let pep = tokio::spawn(async move {
            let mut transport = CopsTransport::connect(addr).await.unwrap();
            pep_open(&mut transport, "pep-1", "h1").await;
            let del = cops_stack::message::DeleteRequestMsg::new(
                COPS_CLIENT_PCMM,
                Handle::from("h1"),
            );
            transport
                .send(&CopsMessage::DeleteRequest(del))
                .await
                .unwrap();
            transport
        });

        let session = agent.accept(&listener).await.unwrap();
        let (connection, _sender, _handle, task) = session.spawn();

        let _transport = pep.await.unwrap();
        // Give the receive loop a moment to process the delete
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(connection
            .managers()
            .lock()
            .unwrap()
            .get(&Handle::from("h1"))
            .is_none());
        task.abort();
    }
}
