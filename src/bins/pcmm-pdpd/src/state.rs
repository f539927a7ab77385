//! Per-handle request state
//!
//! One `RequestStateManager` per COPS client handle tracks the lifecycle
//! of a single PEP request and routes reports to the policy callbacks.
//! Transitions are driven exclusively by inbound COPS message dispatch in
//! the owning connection; there is no timer-driven auto-transition. The
//! keep-alive/accounting timeout hooks exist for an external scheduler to
//! invoke.

use cops_stack::object::{ClientSi, ErrorObject, Handle, ReportKind};
use pcmm_gates::types::{GateCommand, GateId};
use pcmm_gates::GateRequest;

use crate::policy::PolicyHandler;

/// Request state lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Request state created
    Create,
    /// Request received
    Init,
    /// Decisions sent
    Decs,
    /// Report received
    Report,
    /// Request state finalized
    Final,
    /// New request state solicited
    New,
    /// Delete request state solicited
    Del,
    /// Sync request sent
    Sync,
    /// Sync completed
    SyncAll,
    /// Connection closed
    ClosedConn,
    /// Keep-alive timeout
    NoKeepAlive,
    /// Accounting report received or timed out
    Acct,
}

impl RequestState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Init => "Init",
            Self::Decs => "Decisions",
            Self::Report => "Report",
            Self::Final => "Final",
            Self::New => "New",
            Self::Del => "Delete",
            Self::Sync => "Sync",
            Self::SyncAll => "SyncComplete",
            Self::ClosedConn => "ClosedConnection",
            Self::NoKeepAlive => "NoKeepAlive",
            Self::Acct => "Accounting",
        }
    }
}

/// State manager for one client handle
#[derive(Debug)]
pub struct RequestStateManager {
    client_type: u16,
    handle: Handle,
    status: RequestState,
    gate_id: Option<GateId>,
}

impl RequestStateManager {
    pub fn new(client_type: u16, handle: Handle) -> Self {
        Self {
            client_type,
            handle,
            status: RequestState::Create,
            gate_id: None,
        }
    }

    pub fn client_type(&self) -> u16 {
        self.client_type
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn status(&self) -> RequestState {
        self.status
    }

    /// The gate id the CMTS assigned on the last successful Gate-Set
    pub fn gate_id(&self) -> Option<GateId> {
        self.gate_id
    }

    /// The request state is bound to its connection
    pub fn init_request_state(&mut self) {
        self.status = RequestState::Init;
    }

    /// A request arrived for this handle
    pub fn process_request(&mut self, client_si: &[ClientSi], handler: &dyn PolicyHandler) {
        if !client_si.is_empty() {
            handler.set_client_data(&self.handle, client_si);
        }
    }

    /// A decision went out for this handle
    pub fn mark_decision_sent(&mut self) {
        self.status = RequestState::Decs;
    }

    /// Route a report to the policy callbacks. On success the embedded
    /// transaction command decides gate id bookkeeping: GateSetAck stores
    /// the CMTS-assigned id, GateDeleteAck clears it.
    pub fn process_report(
        &mut self,
        kind: ReportKind,
        gate: &GateRequest,
        handler: &dyn PolicyHandler,
    ) {
        match kind {
            ReportKind::Success => {
                self.status = RequestState::Report;
                match gate.transaction_id.map(|t| t.command) {
                    Some(GateCommand::GateSetAck) => {
                        self.gate_id = gate.gate_id;
                        log::info!(
                            "GateSetAck for handle {}: gate id {:?}",
                            self.handle,
                            gate.gate_id
                        );
                    }
                    Some(GateCommand::GateDeleteAck) => {
                        log::info!(
                            "GateDeleteAck for handle {}: clearing gate id {:?}",
                            self.handle,
                            self.gate_id
                        );
                        self.gate_id = None;
                    }
                    _ => {}
                }
                handler.success_report(&self.handle, gate);
            }
            ReportKind::Failure => {
                self.status = RequestState::Report;
                handler.fail_report(&self.handle, gate);
            }
            ReportKind::Accounting => {
                self.status = RequestState::Acct;
                handler.acct_report(&self.handle, gate);
            }
        }
    }

    /// The owning connection closed
    pub fn process_closed_connection(&mut self, error: &ErrorObject, handler: &dyn PolicyHandler) {
        handler.notify_closed_connection(&self.handle, error);
        self.status = RequestState::ClosedConn;
    }

    /// Hook for an external keep-alive scheduler
    pub fn process_no_ka_connection(&mut self, handler: &dyn PolicyHandler) {
        handler.notify_no_kalive_received(&self.handle);
        self.status = RequestState::NoKeepAlive;
    }

    /// Hook for an external accounting scheduler
    pub fn process_no_acct_report(&mut self, handler: &dyn PolicyHandler) {
        handler.notify_no_acct_report(&self.handle);
        self.status = RequestState::Acct;
    }

    /// The PEP deleted this request state
    pub fn process_delete_request_state(&mut self, handler: &dyn PolicyHandler) {
        handler.close_request_state(&self.handle);
        self.status = RequestState::Del;
    }

    /// A sync request went out for this handle
    pub fn sync_request_state(&mut self) {
        self.status = RequestState::Sync;
    }

    /// The PEP finished synchronizing
    pub fn process_sync_complete(&mut self) {
        self.status = RequestState::SyncAll;
    }

    /// A new request state was solicited for this handle
    pub fn open_new_request_state(&mut self) {
        self.status = RequestState::New;
    }

    /// This request state is done
    pub fn finalize_request_state(&mut self) {
        self.status = RequestState::Final;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cops_stack::object::{ErrorCode, Handle};
    use cops_stack::COPS_CLIENT_PCMM;
    use pcmm_gates::types::{PcmmError, PcmmErrorCode, TransactionId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        success: AtomicUsize,
        fail: AtomicUsize,
        acct: AtomicUsize,
        closed: AtomicUsize,
    }

    impl PolicyHandler for CountingHandler {
        fn success_report(&self, _handle: &Handle, _gate: &GateRequest) {
            self.success.fetch_add(1, Ordering::SeqCst);
        }
        fn fail_report(&self, _handle: &Handle, _gate: &GateRequest) {
            self.fail.fetch_add(1, Ordering::SeqCst);
        }
        fn acct_report(&self, _handle: &Handle, _gate: &GateRequest) {
            self.acct.fetch_add(1, Ordering::SeqCst);
        }
        fn notify_closed_connection(&self, _handle: &Handle, _error: &ErrorObject) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager() -> RequestStateManager {
        RequestStateManager::new(COPS_CLIENT_PCMM, Handle::from("h1"))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let handler = CountingHandler::default();
        let mut man = manager();
        assert_eq!(man.status(), RequestState::Create);

        man.init_request_state();
        assert_eq!(man.status(), RequestState::Init);

        man.mark_decision_sent();
        assert_eq!(man.status(), RequestState::Decs);

        let mut gate = GateRequest::default();
        gate.transaction_id = Some(TransactionId::new(1, GateCommand::GateSetAck));
        gate.gate_id = Some(GateId(42));
        man.process_report(ReportKind::Success, &gate, &handler);
        assert_eq!(man.status(), RequestState::Report);
        assert_eq!(man.gate_id(), Some(GateId(42)));
        assert_eq!(handler.success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delete_ack_clears_gate_id() {
        let handler = CountingHandler::default();
        let mut man = manager();
        man.init_request_state();

        let mut set_ack = GateRequest::default();
        set_ack.transaction_id = Some(TransactionId::new(1, GateCommand::GateSetAck));
        set_ack.gate_id = Some(GateId(7));
        man.process_report(ReportKind::Success, &set_ack, &handler);
        assert_eq!(man.gate_id(), Some(GateId(7)));

        let mut del_ack = GateRequest::default();
        del_ack.transaction_id = Some(TransactionId::new(2, GateCommand::GateDeleteAck));
        man.process_report(ReportKind::Success, &del_ack, &handler);
        assert_eq!(man.gate_id(), None);
    }

    #[test]
    fn test_failure_report_delivers_error() {
        let handler = CountingHandler::default();
        let mut man = manager();
        man.init_request_state();

        let mut gate = GateRequest::default();
        gate.transaction_id = Some(TransactionId::new(1, GateCommand::GateSetErr));
        gate.error = Some(PcmmError::new(PcmmErrorCode::MissingRequiredObject));
        man.process_report(ReportKind::Failure, &gate, &handler);

        assert_eq!(man.status(), RequestState::Report);
        assert_eq!(handler.fail.load(Ordering::SeqCst), 1);
        assert_eq!(man.gate_id(), None);
    }

    #[test]
    fn test_accounting_report() {
        let handler = CountingHandler::default();
        let mut man = manager();
        man.init_request_state();
        man.process_report(ReportKind::Accounting, &GateRequest::default(), &handler);
        assert_eq!(man.status(), RequestState::Acct);
        assert_eq!(handler.acct.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_and_no_ka_from_any_state() {
        let handler = CountingHandler::default();

        let mut man = manager();
        man.process_closed_connection(
            &ErrorObject::new(ErrorCode::CommunicationFailure),
            &handler,
        );
        assert_eq!(man.status(), RequestState::ClosedConn);
        assert_eq!(handler.closed.load(Ordering::SeqCst), 1);

        let mut man = manager();
        man.mark_decision_sent();
        man.process_no_ka_connection(&handler);
        assert_eq!(man.status(), RequestState::NoKeepAlive);
    }

    #[test]
    fn test_sync_cycle() {
        let mut man = manager();
        man.init_request_state();
        man.sync_request_state();
        assert_eq!(man.status(), RequestState::Sync);
        man.process_sync_complete();
        assert_eq!(man.status(), RequestState::SyncAll);
    }
}
