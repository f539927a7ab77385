//! COPS Protocol Library
//!
//! This crate provides COPS (Common Open Policy Service) message building
//! and parsing as specified in RFC 2748, profiled for PacketCable
//! Multimedia gate control between a PDP (policy server) and a PEP (CMTS).
//!
//! # Features
//!
//! - COPS header encoding/decoding
//! - Typed COPS objects (Handle, Context, Decision, Error, timers, ...)
//! - The ten COPS message types with mandatory-object enforcement
//! - Length-framed TCP transport on top of tokio
//!
//! # Example
//!
//! ```rust
//! use cops_stack::message::{CopsMessage, KeepAliveMsg};
//! use cops_stack::COPS_CLIENT_PCMM;
//!
//! let msg = CopsMessage::KeepAlive(KeepAliveMsg::new(COPS_CLIENT_PCMM));
//! let buf = msg.encode();
//! ```

pub mod error;
pub mod header;
pub mod message;
pub mod object;
pub mod transport;

#[cfg(test)]
mod property_tests;

pub use error::{CopsError, CopsResult};
pub use header::{CopsHeader, OpCode, COPS_HEADER_LEN, COPS_VERSION};

/// COPS client-type for PacketCable Multimedia.
pub const COPS_CLIENT_PCMM: u16 = 0x800A;

/// Well-known TCP port a PCMM policy server listens on.
pub const COPS_PDP_PORT: u16 = 3918;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CopsError, CopsResult};
    pub use crate::header::{CopsHeader, OpCode};
    pub use crate::message::{
        ClientAcceptMsg, ClientCloseMsg, ClientOpenMsg, CopsMessage, DecisionMsg,
        DeleteRequestMsg, KeepAliveMsg, ReportMsg, RequestMsg, SyncStateMsg,
    };
    pub use crate::object::{
        ClientSi, Context, CopsObject, CsiType, Decision, DecisionCommand, DecisionFlag,
        ErrorCode, ErrorObject, Handle, Integrity, PdpAddress, PepId, RType, ReportKind,
    };
    pub use crate::transport::{CopsListener, CopsTransport};
    pub use crate::{COPS_CLIENT_PCMM, COPS_PDP_PORT};
}
