//! PCMM Gate Error Types

use thiserror::Error;

/// Errors produced while encoding or decoding gate sub-objects
#[derive(Debug, Error)]
pub enum GateError {
    /// Buffer too short for operation
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Sub-object length field smaller than its own header
    #[error("Invalid sub-object length: {0}")]
    InvalidLength(u16),

    /// S-Type not valid for the sub-object being parsed
    #[error("Unknown S-Type {s_type} for S-Num {s_num}")]
    UnknownSType { s_num: u8, s_type: u8 },

    /// Gate command value outside the PacketCable table
    #[error("Unknown gate command: {0}")]
    UnknownGateCommand(u16),

    /// PCMM error code outside the PacketCable table
    #[error("Unknown PCMM error code: {0}")]
    UnknownErrorCode(u16),

    /// Gate state value outside the PacketCable table
    #[error("Unknown gate state: {0}")]
    UnknownGateState(u16),

    /// Direction byte other than 0 or 1
    #[error("Unknown gate direction: {0}")]
    UnknownDirection(u8),

    /// Classifier protocol outside the supported set
    #[error("Unknown classifier protocol: {0}")]
    UnknownProtocol(u16),

    /// Activation state byte other than 0 or 1
    #[error("Unknown activation state: {0}")]
    UnknownActivationState(u8),

    /// Flow label flag byte other than 0 or 1
    #[error("Unknown flow label flag: {0}")]
    UnknownFlowLabelFlag(u8),

    /// Service class name outside 2..=16 characters
    #[error("Service class name must be between 2 and 16 characters, got {0}")]
    InvalidServiceClassName(usize),

    /// A committed envelope requires a reserved envelope
    #[error("Cannot have a committed envelope without a reserved envelope")]
    CommittedWithoutReserved,

    /// Subscriber address length other than 4 or 16 bytes
    #[error("Invalid subscriber address of {0} bytes")]
    InvalidSubscriberAddress(usize),
}

/// PCMM gate result type
pub type GateResult<T> = Result<T, GateError>;
