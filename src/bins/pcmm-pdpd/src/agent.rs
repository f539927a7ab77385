//! PDP agent
//!
//! Accepts or dials PEP connections and runs the server side of the COPS
//! handshake: validate the Client-Open, answer with Client-Accept carrying
//! the configured timers, then block for the first Request to learn the
//! initial client handle before handing the socket to a connection
//! receive loop.
//!
//! Both directions exist because PacketCable deployments differ: a policy
//! server can listen on the well-known port or dial the CMTS, which then
//! opens the COPS session as the PEP either way.

use std::net::SocketAddr;
use std::sync::Arc;

use cops_stack::error::{CopsError, CopsResult};
use cops_stack::message::{ClientAcceptMsg, ClientCloseMsg, CopsMessage};
use cops_stack::object::{ErrorCode, ErrorObject, Handle};
use cops_stack::transport::{CopsListener, CopsTransport};
use pcmm_gates::types::MmVersionInfo;

use crate::config::PdpConfig;
use crate::connection::PdpConnection;
use crate::policy::PolicyHandler;
use crate::sender::GateSender;
use crate::state::RequestStateManager;

/// A PEP session after a successful handshake. `spawn` starts the
/// connection receive loop as its own task.
pub struct PepSession {
    pub connection: Arc<PdpConnection>,
    pub handle: Handle,
    pub sender: GateSender,
    reader: cops_stack::transport::CopsReader,
}

impl PepSession {
    /// Start the receive loop; returns the pieces a caller keeps using
    /// plus the loop's join handle.
    pub fn spawn(
        self,
    ) -> (
        Arc<PdpConnection>,
        GateSender,
        Handle,
        tokio::task::JoinHandle<CopsResult<()>>,
    ) {
        let connection = self.connection.clone();
        let reader = self.reader;
        let task = tokio::spawn(async move { connection.run(reader).await });
        (self.connection, self.sender, self.handle, task)
    }
}

/// Accepts PEP connections and performs the COPS handshake
pub struct PdpAgent {
    config: PdpConfig,
    handler: Arc<dyn PolicyHandler>,
}

impl PdpAgent {
    pub fn new(config: PdpConfig, handler: Arc<dyn PolicyHandler>) -> Self {
        Self { config, handler }
    }

    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Block for one incoming PEP connection and run the handshake
    pub async fn accept(&self, listener: &CopsListener) -> CopsResult<PepSession> {
        let transport = listener.accept().await?;
        log::info!("PEP connected from {}", transport.peer_addr());
        self.open(transport).await
    }

    /// Dial the PEP and run the handshake (the PEP still opens)
    pub async fn connect(&self, addr: SocketAddr) -> CopsResult<PepSession> {
        let transport = CopsTransport::connect(addr).await?;
        log::info!("Connected to PEP at {addr}, waiting for client-open");
        self.open(transport).await
    }

    async fn send_close(
        &self,
        transport: &mut CopsTransport,
        code: ErrorCode,
        reason: &str,
    ) {
        log::info!("Sending client-close: {reason}");
        let close = CopsMessage::ClientClose(ClientCloseMsg::new(
            self.config.client_type,
            ErrorObject::new(code),
        ));
        if let Err(e) = transport.send(&close).await {
            log::error!("Failed to send client-close: {e}");
        }
    }

    /// Server side of the Client-Open/Client-Accept handshake
    async fn open(&self, mut transport: CopsTransport) -> CopsResult<PepSession> {
        let msg = match transport.recv().await {
            Ok(msg) => msg,
            Err(e) => {
                // A malformed open still deserves a specific close code
                let code = match &e {
                    CopsError::MandatoryObjectMissing(_) => ErrorCode::MandatoryObjectMissing,
                    CopsError::UnknownClassNum(_) => ErrorCode::UnknownObject,
                    CopsError::Io(_) => return Err(e),
                    _ => ErrorCode::BadMessageFormat,
                };
                self.send_close(&mut transport, code, &e.to_string()).await;
                return Err(e);
            }
        };

        let open = match msg {
            CopsMessage::ClientOpen(open) => open,
            other => {
                self.send_close(
                    &mut transport,
                    ErrorCode::BadMessageFormat,
                    "expected client-open",
                )
                .await;
                return Err(CopsError::BadMessageFormat(format!(
                    "expected client-open, got {}",
                    other.op_code().name()
                )));
            }
        };

        if open.client_type != self.config.client_type {
            self.send_close(
                &mut transport,
                ErrorCode::UnsupportedClientType,
                "unsupported client type",
            )
            .await;
            return Err(CopsError::BadMessageFormat(format!(
                "unsupported client type {:#06x}",
                open.client_type
            )));
        }

        let version_si = match &open.client_si {
            Some(si) => si,
            None => {
                self.send_close(
                    &mut transport,
                    ErrorCode::UnknownObject,
                    "client-open without MM version info",
                )
                .await;
                return Err(CopsError::MandatoryObjectMissing("MM version ClientSI"));
            }
        };
        match MmVersionInfo::parse_subobj(&version_si.data) {
            Ok(info) => {
                log::info!(
                    "PEP {} opened with MM version {}.{}",
                    open.pep_id,
                    info.major,
                    info.minor
                );
            }
            Err(e) => {
                log::warn!("PEP {} sent unparsable MM version info: {e}", open.pep_id);
            }
        }

        let acct_timer = if self.config.acct_timer_secs != 0 {
            Some(self.config.acct_timer_secs)
        } else {
            None
        };
        let accept = CopsMessage::ClientAccept(ClientAcceptMsg::new(
            self.config.client_type,
            self.config.ka_timer_secs,
            acct_timer,
        ));
        transport.send(&accept).await?;

        // The PEP follows with its first request, carrying the client
        // handle that keys all further exchanges
        let request = match transport.recv().await? {
            CopsMessage::Request(request) => request,
            CopsMessage::ClientClose(close) => {
                log::info!(
                    "PEP {} closed during handshake: {}",
                    open.pep_id,
                    close.error.code.description()
                );
                return Err(CopsError::BadMessageFormat(
                    "client-close during handshake".into(),
                ));
            }
            other => {
                self.send_close(
                    &mut transport,
                    ErrorCode::UnknownObject,
                    "expected request after client-accept",
                )
                .await;
                return Err(CopsError::BadMessageFormat(format!(
                    "expected request after client-accept, got {}",
                    other.op_code().name()
                )));
            }
        };

        let handle = request.handle.clone();
        log::info!(
            "PEP {} established with initial handle {}",
            open.pep_id,
            handle
        );

        let (reader, writer) = transport.into_split();
        let writer = Arc::new(tokio::sync::Mutex::new(writer));

        let connection = Arc::new(PdpConnection::new(
            open.pep_id,
            self.config.client_type,
            writer.clone(),
            self.handler.clone(),
        ));

        let mut manager = RequestStateManager::new(self.config.client_type, handle.clone());
        manager.init_request_state();
        manager.process_request(&request.client_si, &*self.handler);
        connection.insert_manager(manager);

        let sender = GateSender::new(
            self.config.client_type,
            handle.clone(),
            writer,
            connection.managers(),
            connection.pending(),
            self.config.gate_timeout,
        );

        Ok(PepSession {
            connection,
            handle,
            sender,
            reader,
        })
    }
}
