//! Per-PEP connection
//!
//! One connection per accepted PEP. The receive loop exclusively owns the
//! socket read half and decodes one COPS message per iteration,
//! dispatching by op code to the state manager matching the handle.
//! Framing errors terminate the connection with a Client-Close carrying
//! the specific error code; transport errors terminate it silently. Both
//! notify every request state manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::oneshot;

use cops_stack::error::{CopsError, CopsResult};
use cops_stack::message::{ClientCloseMsg, CopsMessage, ReportMsg, SyncStateMsg};
use cops_stack::object::{CsiType, ErrorCode, ErrorObject, Handle, PepId};
use cops_stack::transport::{CopsReader, CopsWriter};
use pcmm_gates::GateRequest;

use crate::policy::PolicyHandler;
use crate::state::RequestStateManager;

/// Socket write half shared between the receive loop and gate senders
pub type SharedWriter = Arc<tokio::sync::Mutex<CopsWriter>>;

/// Handle-keyed state manager table
pub type Managers = Arc<Mutex<HashMap<Handle, RequestStateManager>>>;

/// Transaction-id-keyed table of callers waiting for a report
pub type PendingGates = Arc<Mutex<HashMap<u16, oneshot::Sender<GateRequest>>>>;

/// Map a framing error to the Client-Close error code it warrants.
/// Transport errors map to `None`: there is no point writing a close to a
/// dead socket.
fn close_code_for(error: &CopsError) -> Option<ErrorCode> {
    match error {
        CopsError::UnknownClassNum(_) => Some(ErrorCode::UnknownObject),
        CopsError::MandatoryObjectMissing(_) => Some(ErrorCode::MandatoryObjectMissing),
        CopsError::VersionNotSupported(_)
        | CopsError::InvalidOpCode(_)
        | CopsError::InvalidClassType { .. }
        | CopsError::UnalignedLength(_)
        | CopsError::MessageTooLarge(_)
        | CopsError::BufferTooShort { .. }
        | CopsError::BadMessageFormat(_) => Some(ErrorCode::BadMessageFormat),
        CopsError::Io(_) => None,
    }
}

/// State shared by the receive loop, the gate senders and the service
/// facade for one PEP connection
pub struct PdpConnection {
    pep_id: PepId,
    client_type: u16,
    writer: SharedWriter,
    managers: Managers,
    pending: PendingGates,
    handler: Arc<dyn PolicyHandler>,
    last_ka: Mutex<Instant>,
}

impl PdpConnection {
    pub fn new(
        pep_id: PepId,
        client_type: u16,
        writer: SharedWriter,
        handler: Arc<dyn PolicyHandler>,
    ) -> Self {
        Self {
            pep_id,
            client_type,
            writer,
            managers: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            handler,
            last_ka: Mutex::new(Instant::now()),
        }
    }

    pub fn pep_id(&self) -> &PepId {
        &self.pep_id
    }

    pub fn client_type(&self) -> u16 {
        self.client_type
    }

    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    pub fn managers(&self) -> Managers {
        self.managers.clone()
    }

    pub fn pending(&self) -> PendingGates {
        self.pending.clone()
    }

    /// Seconds since the last keep-alive from this PEP; input for an
    /// external keep-alive scheduler
    pub fn seconds_since_last_ka(&self) -> u64 {
        self.last_ka.lock().unwrap().elapsed().as_secs()
    }

    pub fn insert_manager(&self, manager: RequestStateManager) {
        self.managers
            .lock()
            .unwrap()
            .insert(manager.handle().clone(), manager);
    }

    /// External keep-alive scheduler hook: the keep-alive interval
    /// elapsed without a keep-alive message
    pub fn notify_no_ka_received(&self) {
        let mut managers = self.managers.lock().unwrap();
        for manager in managers.values_mut() {
            manager.process_no_ka_connection(&*self.handler);
        }
    }

    /// External accounting scheduler hook
    pub fn notify_no_acct_report(&self) {
        let mut managers = self.managers.lock().unwrap();
        for manager in managers.values_mut() {
            manager.process_no_acct_report(&*self.handler);
        }
    }

    /// Send a Sync-State-Request for every open request state
    pub async fn sync_all_request_state(&self) -> CopsResult<()> {
        let handles: Vec<Handle> = {
            let mut managers = self.managers.lock().unwrap();
            managers
                .values_mut()
                .map(|manager| {
                    manager.sync_request_state();
                    manager.handle().clone()
                })
                .collect()
        };
        let mut writer = self.writer.lock().await;
        for handle in handles {
            let msg = CopsMessage::SyncStateRequest(SyncStateMsg::new(
                self.client_type,
                Some(handle),
            ));
            writer.send(&msg).await?;
        }
        Ok(())
    }

    /// Receive loop: one COPS message per iteration until the socket
    /// closes, the PEP sends Client-Close, or a framing error kills the
    /// connection.
    pub async fn run(self: Arc<Self>, mut reader: CopsReader) -> CopsResult<()> {
        let result = loop {
            match reader.recv().await {
                Ok(msg) => match self.dispatch(msg).await {
                    Ok(true) => continue,
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Err(e) => break Err(e),
            }
        };

        match &result {
            Ok(()) => {
                self.teardown(ErrorObject::new(ErrorCode::ShuttingDown)).await;
            }
            Err(error) => {
                log::error!(
                    "Connection to PEP {} failed: {error}",
                    self.pep_id
                );
                if let Some(code) = close_code_for(error) {
                    let close = CopsMessage::ClientClose(ClientCloseMsg::new(
                        self.client_type,
                        ErrorObject::new(code),
                    ));
                    if let Err(e) = self.writer.lock().await.send(&close).await {
                        log::warn!("Failed to send client-close: {e}");
                    }
                }
                self.teardown(ErrorObject::new(
                    close_code_for(error).unwrap_or(ErrorCode::CommunicationFailure),
                ))
                .await;
            }
        }
        result
    }

    /// Returns Ok(false) when the connection should wind down cleanly
    async fn dispatch(&self, msg: CopsMessage) -> CopsResult<bool> {
        match msg {
            CopsMessage::KeepAlive(ka) => {
                *self.last_ka.lock().unwrap() = Instant::now();
                let echo = CopsMessage::KeepAlive(ka);
                self.writer.lock().await.send(&echo).await?;
                Ok(true)
            }
            CopsMessage::Request(req) => {
                let mut managers = self.managers.lock().unwrap();
                let manager = managers.entry(req.handle.clone()).or_insert_with(|| {
                    log::info!(
                        "New request state for handle {} on PEP {}",
                        req.handle,
                        self.pep_id
                    );
                    let mut man = RequestStateManager::new(self.client_type, req.handle.clone());
                    man.init_request_state();
                    man
                });
                manager.process_request(&req.client_si, &*self.handler);
                Ok(true)
            }
            CopsMessage::Report(report) => {
                self.handle_report(report);
                Ok(true)
            }
            CopsMessage::DeleteRequest(del) => {
                self.handler.notify_delete_request_state(&del.handle);
                let removed = self.managers.lock().unwrap().remove(&del.handle);
                match removed {
                    Some(mut manager) => {
                        manager.process_delete_request_state(&*self.handler);
                    }
                    None => {
                        log::warn!("Delete request for unknown handle {}", del.handle);
                    }
                }
                Ok(true)
            }
            CopsMessage::SyncStateComplete(sync) => {
                let mut managers = self.managers.lock().unwrap();
                match sync.handle.and_then(|h| managers.get_mut(&h)) {
                    Some(manager) => manager.process_sync_complete(),
                    None => log::warn!("Sync complete for unknown handle"),
                }
                Ok(true)
            }
            CopsMessage::ClientClose(close) => {
                log::info!(
                    "PEP {} sent client-close: {}",
                    self.pep_id,
                    close.error.code.description()
                );
                Ok(false)
            }
            other => Err(CopsError::BadMessageFormat(format!(
                "message not expected on a PDP connection: {}",
                other.op_code().name()
            ))),
        }
    }

    fn handle_report(&self, report: ReportMsg) {
        let gate = match &report.client_si {
            Some(si) => {
                if si.csi_type != CsiType::Named {
                    log::warn!("Report ClientSI with unexpected CSI type {:?}", si.csi_type);
                }
                match GateRequest::parse(&si.data) {
                    Ok(gate) => gate,
                    Err(e) => {
                        log::error!("Failed to parse gate from report: {e}");
                        return;
                    }
                }
            }
            None => {
                log::warn!("Report without client-specific information");
                return;
            }
        };

        {
            let mut managers = self.managers.lock().unwrap();
            match managers.get_mut(&report.handle) {
                Some(manager) => {
                    manager.process_report(report.report_type, &gate, &*self.handler);
                }
                None => {
                    log::warn!("No state manager found for handle {}", report.handle);
                }
            }
        }

        // Resolve the caller blocked on this transaction
        if let Some(transaction_id) = gate.transaction_id {
            let waiter = self.pending.lock().unwrap().remove(&transaction_id.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(gate);
                }
                None => {
                    log::debug!(
                        "Report for transaction {} had no waiting caller",
                        transaction_id.id
                    );
                }
            }
        }
    }

    /// Notify every state manager and drop every pending gate waiter
    async fn teardown(&self, error: ErrorObject) {
        {
            let mut managers = self.managers.lock().unwrap();
            for manager in managers.values_mut() {
                manager.process_closed_connection(&error, &*self.handler);
            }
            managers.clear();
        }
        // Dropping the senders resolves the callers with a closed-channel
        // error
        self.pending.lock().unwrap().clear();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            log::debug!("Socket shutdown after teardown: {e}");
        }
    }
}
