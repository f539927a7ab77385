//! COPS Header
//!
//! Common 8-byte header carried by every COPS message (RFC 2748 Section 2.1).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CopsError, CopsResult};

/// COPS header length (8 bytes)
pub const COPS_HEADER_LEN: usize = 8;

/// COPS protocol version
pub const COPS_VERSION: u8 = 1;

/// COPS operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Request = 1,
    Decision = 2,
    Report = 3,
    DeleteRequest = 4,
    SyncStateRequest = 5,
    ClientOpen = 6,
    ClientAccept = 7,
    ClientClose = 8,
    KeepAlive = 9,
    SyncStateComplete = 10,
}

impl TryFrom<u8> for OpCode {
    type Error = CopsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Request),
            2 => Ok(Self::Decision),
            3 => Ok(Self::Report),
            4 => Ok(Self::DeleteRequest),
            5 => Ok(Self::SyncStateRequest),
            6 => Ok(Self::ClientOpen),
            7 => Ok(Self::ClientAccept),
            8 => Ok(Self::ClientClose),
            9 => Ok(Self::KeepAlive),
            10 => Ok(Self::SyncStateComplete),
            _ => Err(CopsError::InvalidOpCode(value)),
        }
    }
}

impl OpCode {
    /// Get the name of the operation
    pub fn name(&self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Decision => "Decision",
            Self::Report => "Report State",
            Self::DeleteRequest => "Delete Request State",
            Self::SyncStateRequest => "Synchronize State Request",
            Self::ClientOpen => "Client-Open",
            Self::ClientAccept => "Client-Accept",
            Self::ClientClose => "Client-Close",
            Self::KeepAlive => "Keep-Alive",
            Self::SyncStateComplete => "Synchronize Complete",
        }
    }
}

/// COPS header structure
///
/// Format:
/// ```text
///  0              1              2              3
/// +--------------+--------------+--------------+--------------+
/// |Version| Flags|    Op Code   |         Client-type         |
/// +--------------+--------------+--------------+--------------+
/// |                       Message Length                      |
/// +--------------+--------------+--------------+--------------+
/// ```
///
/// The stored message length excludes the 8-byte header and is always a
/// multiple of 4. Flag bit 0 marks a solicited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopsHeader {
    /// Protocol version (always 1)
    pub version: u8,
    /// Solicited message flag bit
    pub solicited: bool,
    /// Operation code
    pub op_code: OpCode,
    /// Client type (0x800A for PCMM)
    pub client_type: u16,
    /// Body length in octets, header excluded
    pub message_length: u32,
}

impl CopsHeader {
    /// Create a new header with a zero body length
    pub fn new(op_code: OpCode, client_type: u16) -> Self {
        Self {
            version: COPS_VERSION,
            solicited: false,
            op_code,
            client_type,
            message_length: 0,
        }
    }

    /// Encode the header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        let flags = if self.solicited { 0x1 } else { 0x0 };
        buf.put_u8((self.version << 4) | flags);
        buf.put_u8(self.op_code as u8);
        buf.put_u16(self.client_type);
        buf.put_u32(self.message_length);
    }

    /// Decode a header from bytes
    pub fn decode(buf: &mut Bytes) -> CopsResult<Self> {
        if buf.remaining() < COPS_HEADER_LEN {
            return Err(CopsError::BufferTooShort {
                needed: COPS_HEADER_LEN,
                available: buf.remaining(),
            });
        }

        let first = buf.get_u8();
        let version = first >> 4;
        let solicited = first & 0x1 != 0;

        if version != COPS_VERSION {
            return Err(CopsError::VersionNotSupported(version));
        }

        let op_code = OpCode::try_from(buf.get_u8())?;
        let client_type = buf.get_u16();
        let message_length = buf.get_u32();

        if message_length % 4 != 0 {
            return Err(CopsError::UnalignedLength(message_length));
        }

        Ok(Self {
            version,
            solicited,
            op_code,
            client_type,
            message_length,
        })
    }
}
