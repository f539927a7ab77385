//! COPS Error Types

use thiserror::Error;

/// COPS protocol error
#[derive(Debug, Error)]
pub enum CopsError {
    /// Buffer too short for operation
    #[error("Buffer too short: needed {needed} bytes, available {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// COPS version other than 1
    #[error("COPS version not supported: {0}")]
    VersionNotSupported(u8),

    /// Invalid operation code
    #[error("Invalid COPS op code: {0}")]
    InvalidOpCode(u8),

    /// Unknown object class number inside a message body. Fatal for the
    /// message per RFC 2748, unlike the PCMM TLV layer which skips.
    #[error("Unknown COPS object class number: {0}")]
    UnknownClassNum(u8),

    /// Class type not valid for the given class number
    #[error("Invalid class type {c_type} for class number {c_num}")]
    InvalidClassType { c_num: u8, c_type: u8 },

    /// Message length field not a multiple of 4
    #[error("COPS message length {0} is not 4-byte aligned")]
    UnalignedLength(u32),

    /// Message larger than the transport bound
    #[error("COPS message of {0} bytes exceeds the maximum size")]
    MessageTooLarge(usize),

    /// A mandatory object is absent from a message
    #[error("Mandatory COPS object missing: {0}")]
    MandatoryObjectMissing(&'static str),

    /// Structurally invalid message
    #[error("Bad COPS message format: {0}")]
    BadMessageFormat(String),

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// COPS result type
pub type CopsResult<T> = Result<T, CopsError>;
