//! Policy callback interface
//!
//! Implemented by the provisioning layer, consumed by the core. Reports
//! and lifecycle notifications are delivered as data so the implementor
//! decides policy (retry, abandon, alert).

use cops_stack::object::{ClientSi, ErrorObject, Handle};
use pcmm_gates::GateRequest;

/// Callbacks a policy decision layer receives from the COPS core.
///
/// The lifecycle notifications default to no-ops; the three report
/// deliveries must be handled.
pub trait PolicyHandler: Send + Sync {
    /// The PEP reported a successful gate operation
    fn success_report(&self, handle: &Handle, gate: &GateRequest);

    /// The PEP reported a failed gate operation; the embedded PCMM error
    /// is in `gate.error`
    fn fail_report(&self, handle: &Handle, gate: &GateRequest);

    /// The PEP sent an accounting report
    fn acct_report(&self, handle: &Handle, gate: &GateRequest);

    /// Client-specific data arrived with a request for this handle
    fn set_client_data(&self, _handle: &Handle, _client_si: &[ClientSi]) {}

    /// Policy to install when a new request state opens
    fn get_install_policy(&self, _handle: &Handle) -> Option<GateRequest> {
        None
    }

    /// Policy to remove when a request state closes
    fn get_remove_policy(&self, _handle: &Handle) -> Option<GateRequest> {
        None
    }

    /// An external scheduler decided the accounting interval elapsed with
    /// no accounting report
    fn notify_no_acct_report(&self, _handle: &Handle) {}

    /// An external scheduler decided the keep-alive interval elapsed with
    /// no keep-alive
    fn notify_no_kalive_received(&self, _handle: &Handle) {}

    /// The connection owning this handle closed
    fn notify_closed_connection(&self, _handle: &Handle, _error: &ErrorObject) {}

    /// The PEP deleted this request state
    fn notify_delete_request_state(&self, _handle: &Handle) {}

    /// The request state is being discarded
    fn close_request_state(&self, _handle: &Handle) {}
}

/// A handler that only logs, for tools and tests that need no policy
#[derive(Debug, Default)]
pub struct LoggingPolicyHandler;

impl PolicyHandler for LoggingPolicyHandler {
    fn success_report(&self, handle: &Handle, gate: &GateRequest) {
        log::info!("Success report for handle {handle}: gate id {:?}", gate.gate_id);
    }

    fn fail_report(&self, handle: &Handle, gate: &GateRequest) {
        match &gate.error {
            Some(error) => log::warn!("Failure report for handle {handle}: {error}"),
            None => log::warn!("Failure report for handle {handle} without an error object"),
        }
    }

    fn acct_report(&self, handle: &Handle, _gate: &GateRequest) {
        log::info!("Accounting report for handle {handle}");
    }
}
