//! PacketCable Multimedia Gate Object Model
//!
//! This crate provides the nested TLV format carried inside a COPS ClientSI
//! payload for PCMM gate control: sub-objects discriminated by S-Num and
//! S-Type describing QoS gates (traffic profiles, classifiers, subscriber
//! and application identifiers) plus the `GateRequest` aggregate used in
//! Gate-Set / Gate-Info / Gate-Delete exchanges.
//!
//! # Example
//!
//! ```rust
//! use pcmm_gates::gate::GateRequest;
//! use pcmm_gates::types::{Amid, GateCommand, TransactionId};
//!
//! let mut gate = GateRequest::default();
//! gate.transaction_id = Some(TransactionId::new(1, GateCommand::GateSet));
//! gate.amid = Some(Amid::new(1, 1));
//! let bytes = gate.encode();
//! let parsed = GateRequest::parse(&bytes).unwrap();
//! assert_eq!(parsed.amid, gate.amid);
//! ```

pub mod classifier;
pub mod error;
pub mod gate;
pub mod profile;
pub mod subobj;
pub mod types;

#[cfg(test)]
mod property_tests;

pub use error::{GateError, GateResult};
pub use gate::GateRequest;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classifier::{
        ActivationState, Classifier, ExtendedClassifier, FlowLabelFlag, Ipv6Classifier,
        LegacyClassifier, Protocol,
    };
    pub use crate::error::{GateError, GateResult};
    pub use crate::gate::GateRequest;
    pub use crate::profile::{
        BestEffortEnvelope, BestEffortProfile, FlowSpecEnvelope, FlowSpecProfile, RtpEnvelope,
        RtpProfile, ServiceClassNameProfile, TrafficProfile, UgsEnvelope, UgsProfile,
    };
    pub use crate::subobj::{SNum, SubObjHeader};
    pub use crate::types::{
        Amid, Direction, GateCommand, GateId, GateSpec, GateState, GateStateType, GateTimeInfo,
        GateUsageInfo, MmVersionInfo, PcmmError, PcmmErrorCode, SubscriberId, TransactionId,
    };
}
