//! Gate decision sender
//!
//! Builds Decision messages embedding a serialized gate request and writes
//! them to the connection. Each outstanding transaction registers a
//! one-shot channel keyed by transaction id; the connection's receive loop
//! resolves it when the matching report arrives, and the entry is removed
//! on resolution or timeout so the table cannot leak.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::oneshot;

use cops_stack::error::CopsError;
use cops_stack::message::{CopsMessage, DecisionMsg, SyncStateMsg};
use cops_stack::object::{Context, Decision, DecisionCommand, DecisionFlag, Handle, RType};
use pcmm_gates::types::{GateCommand, GateId, TransactionId};
use pcmm_gates::GateRequest;

use crate::connection::{Managers, PendingGates, SharedWriter};

/// Failure modes of a synchronous gate transaction
#[derive(Debug, Error)]
pub enum GateTransactionError {
    /// The PEP did not answer within the configured bound. The underlying
    /// COPS exchange is neither cancelled nor retried.
    #[error("no response from the PEP within {0:?}")]
    Timeout(Duration),

    /// The connection closed before the report arrived
    #[error("connection closed before the report arrived")]
    ConnectionClosed,

    /// The PEP reported a gate-level failure
    #[error("gate request failed: {0}")]
    Gate(pcmm_gates::types::PcmmError),

    /// The report acknowledged a different command than expected
    #[error("unexpected gate command in report: {0:?}")]
    UnexpectedCommand(Option<GateCommand>),

    /// A Gate-Set-Ack arrived without a gate id
    #[error("report carried no gate id")]
    MissingGateId,

    /// The decision could not be written
    #[error(transparent)]
    Transport(#[from] CopsError),
}

/// Sends gate decisions on one (connection, handle) pair
pub struct GateSender {
    client_type: u16,
    handle: Handle,
    writer: SharedWriter,
    managers: Managers,
    pending: PendingGates,
    timeout: Duration,
    next_transaction_id: AtomicU16,
}

/// Seed the transaction counter from the subsecond clock so reconnects do
/// not replay the same ids
fn seed_transaction_id() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos.wrapping_mul(2654435761) >> 16) as u16
}

impl GateSender {
    pub fn new(
        client_type: u16,
        handle: Handle,
        writer: SharedWriter,
        managers: Managers,
        pending: PendingGates,
        timeout: Duration,
    ) -> Self {
        Self {
            client_type,
            handle,
            writer,
            managers,
            pending,
            timeout,
            next_transaction_id: AtomicU16::new(seed_transaction_id()),
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    fn fresh_transaction_id(&self) -> u16 {
        loop {
            let id = self.next_transaction_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Install a gate on the PEP and wait for the correlated report.
    /// Returns the CMTS-assigned gate id from the Gate-Set-Ack.
    pub async fn send_gate_set(
        &self,
        mut gate: GateRequest,
    ) -> Result<GateId, GateTransactionError> {
        let id = match gate.transaction_id {
            Some(trid) if trid.id != 0 => trid.id,
            _ => self.fresh_transaction_id(),
        };
        gate.transaction_id = Some(TransactionId::new(id, GateCommand::GateSet));

        let response = self.transact(gate, id).await?;
        match response.transaction_id.map(|t| t.command) {
            Some(GateCommand::GateSetAck) => {
                response.gate_id.ok_or(GateTransactionError::MissingGateId)
            }
            other => Err(GateTransactionError::UnexpectedCommand(other)),
        }
    }

    /// Remove a gate from the PEP. The delete carries only the
    /// transaction, gate id and identity objects.
    pub async fn send_gate_delete(
        &self,
        mut gate: GateRequest,
    ) -> Result<(), GateTransactionError> {
        let id = match gate.transaction_id {
            Some(trid) if trid.id != 0 => trid.id,
            _ => self.fresh_transaction_id(),
        };
        gate.transaction_id = Some(TransactionId::new(id, GateCommand::GateDelete));
        gate.gate_spec = None;
        gate.traffic_profile = None;
        gate.classifier = None;
        gate.error = None;

        let response = self.transact(gate, id).await?;
        match response.transaction_id.map(|t| t.command) {
            Some(GateCommand::GateDeleteAck) => Ok(()),
            other => Err(GateTransactionError::UnexpectedCommand(other)),
        }
    }

    /// Query gate state on the PEP; the report carries gate state, time
    /// and usage objects.
    pub async fn send_gate_info(
        &self,
        gate_id: GateId,
    ) -> Result<GateRequest, GateTransactionError> {
        let id = self.fresh_transaction_id();
        let mut gate = GateRequest::default();
        gate.transaction_id = Some(TransactionId::new(id, GateCommand::GateInfo));
        gate.gate_id = Some(gate_id);

        let response = self.transact(gate, id).await?;
        match response.transaction_id.map(|t| t.command) {
            Some(GateCommand::GateInfoAck) => Ok(response),
            other => Err(GateTransactionError::UnexpectedCommand(other)),
        }
    }

    /// Solicit a new request state from the PEP
    pub async fn send_open_new_request_state(&self) -> Result<(), CopsError> {
        let msg = CopsMessage::Decision(DecisionMsg::new(
            self.client_type,
            self.handle.clone(),
            vec![(
                Context::new(RType::Config, 0),
                vec![Decision::new(DecisionCommand::Install, DecisionFlag::ReqState)],
            )],
        )?);
        self.writer.lock().await.send(&msg).await?;
        if let Some(manager) = self.managers.lock().unwrap().get_mut(&self.handle) {
            manager.open_new_request_state();
        }
        Ok(())
    }

    /// Ask the PEP to synchronize this handle's state
    pub async fn send_sync_request(&self) -> Result<(), CopsError> {
        let msg = CopsMessage::SyncStateRequest(SyncStateMsg::new(
            self.client_type,
            Some(self.handle.clone()),
        ));
        self.writer.lock().await.send(&msg).await?;
        if let Some(manager) = self.managers.lock().unwrap().get_mut(&self.handle) {
            manager.sync_request_state();
        }
        Ok(())
    }

    /// Send one gate decision and await its report with the configured
    /// bound.
    async fn transact(
        &self,
        gate: GateRequest,
        transaction_id: u16,
    ) -> Result<GateRequest, GateTransactionError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(transaction_id, tx);

        let result = self.send_decision(gate).await;
        if let Err(e) = result {
            self.pending.lock().unwrap().remove(&transaction_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    return Err(GateTransactionError::Gate(error));
                }
                Ok(response)
            }
            Ok(Err(_closed)) => Err(GateTransactionError::ConnectionClosed),
            Err(_elapsed) => {
                self.pending.lock().unwrap().remove(&transaction_id);
                Err(GateTransactionError::Timeout(self.timeout))
            }
        }
    }

    async fn send_decision(&self, gate: GateRequest) -> Result<(), CopsError> {
        let mut msg = DecisionMsg::new(
            self.client_type,
            self.handle.clone(),
            vec![(
                Context::new(RType::Config, 0),
                vec![Decision::new(DecisionCommand::Install, DecisionFlag::ReqError)],
            )],
        )?;
        msg.client_data = Some(gate.encode());
        let msg = CopsMessage::Decision(msg);

        self.writer.lock().await.send(&msg).await?;

        if let Some(manager) = self.managers.lock().unwrap().get_mut(&self.handle) {
            manager.mark_decision_sent();
        }
        Ok(())
    }
}
