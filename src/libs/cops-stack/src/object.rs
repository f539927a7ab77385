//! COPS Objects
//!
//! Typed COPS objects (RFC 2748 Section 2.2). Every object carries a 4-byte
//! header followed by a class-specific payload:
//!
//! ```text
//!  0              1              2              3
//! +--------------+--------------+--------------+--------------+
//! |          Length              |   C-Num     |   C-Type     |
//! +--------------+--------------+--------------+--------------+
//! |                        Payload ...                        |
//! +--------------+--------------+--------------+--------------+
//! ```
//!
//! The stored length covers header plus payload and does NOT count the
//! trailing zero padding that aligns the payload to a 4-byte boundary.
//! Padding bytes are transmitted; the cursor advances by the stored length
//! rounded up to 4.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use crate::error::{CopsError, CopsResult};

/// COPS object header length (4 bytes)
pub const OBJ_HEADER_LEN: usize = 4;

/// Object class numbers used by the PCMM profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CNum {
    Handle = 1,
    Context = 2,
    Decision = 6,
    Error = 8,
    ClientSi = 9,
    KaTimer = 10,
    PepId = 11,
    ReportType = 12,
    LastPdpAddr = 14,
    AcctTimer = 15,
    Integrity = 16,
}

impl TryFrom<u8> for CNum {
    type Error = CopsError;

    fn try_from(value: u8) -> Result<Self, CopsError> {
        match value {
            1 => Ok(Self::Handle),
            2 => Ok(Self::Context),
            6 => Ok(Self::Decision),
            8 => Ok(Self::Error),
            9 => Ok(Self::ClientSi),
            10 => Ok(Self::KaTimer),
            11 => Ok(Self::PepId),
            12 => Ok(Self::ReportType),
            14 => Ok(Self::LastPdpAddr),
            15 => Ok(Self::AcctTimer),
            16 => Ok(Self::Integrity),
            _ => Err(CopsError::UnknownClassNum(value)),
        }
    }
}

const CTYPE_DEF: u8 = 1;
const CTYPE_STATELESS: u8 = 2;
const CTYPE_CSI: u8 = 4;

/// Opaque client handle, the join key between COPS request state and PCMM
/// gate transactions. Created by the PEP and owned for the life of the
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(Bytes);

impl Handle {
    pub fn new(id: impl Into<Bytes>) -> Self {
        Self(id.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// Context request types (bit values per RFC 2748)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RType {
    InAdmin = 1,
    ResAlloc = 2,
    Out = 4,
    Config = 8,
}

impl TryFrom<u16> for RType {
    type Error = CopsError;

    fn try_from(value: u16) -> Result<Self, CopsError> {
        match value {
            1 => Ok(Self::InAdmin),
            2 => Ok(Self::ResAlloc),
            4 => Ok(Self::Out),
            8 => Ok(Self::Config),
            _ => Err(CopsError::BadMessageFormat(format!(
                "invalid context R-type {value}"
            ))),
        }
    }
}

/// Context object: which kind of request a decision applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub r_type: RType,
    pub m_type: u16,
}

impl Context {
    pub fn new(r_type: RType, m_type: u16) -> Self {
        Self { r_type, m_type }
    }
}

/// Decision commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DecisionCommand {
    Null = 0,
    Install = 1,
    Remove = 2,
}

impl TryFrom<u16> for DecisionCommand {
    type Error = CopsError;

    fn try_from(value: u16) -> Result<Self, CopsError> {
        match value {
            0 => Ok(Self::Null),
            1 => Ok(Self::Install),
            2 => Ok(Self::Remove),
            _ => Err(CopsError::BadMessageFormat(format!(
                "invalid decision command {value}"
            ))),
        }
    }
}

/// Decision flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DecisionFlag {
    None = 0,
    ReqError = 1,
    ReqState = 2,
}

impl TryFrom<u16> for DecisionFlag {
    type Error = CopsError;

    fn try_from(value: u16) -> Result<Self, CopsError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::ReqError),
            2 => Ok(Self::ReqState),
            _ => Err(CopsError::BadMessageFormat(format!(
                "invalid decision flags {value}"
            ))),
        }
    }
}

/// Decision object, C-Type 1: command plus flags. Client-specific decision
/// data rides in a separate C-Type 4 object (`CopsObject::DecisionData`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: DecisionCommand,
    pub flags: DecisionFlag,
}

impl Decision {
    pub fn new(command: DecisionCommand, flags: DecisionFlag) -> Self {
        Self { command, flags }
    }
}

/// COPS error codes (RFC 2748 Section 2.2.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    BadHandle = 1,
    InvalidHandleReference = 2,
    BadMessageFormat = 3,
    UnableToProcess = 4,
    MandatoryClientSiMissing = 5,
    UnsupportedClientType = 6,
    MandatoryObjectMissing = 7,
    ClientFailure = 8,
    CommunicationFailure = 9,
    Unspecified = 10,
    ShuttingDown = 11,
    RedirectToPreferredServer = 12,
    UnknownObject = 13,
    AuthenticationFailure = 14,
    AuthenticationRequired = 15,
}

impl TryFrom<u16> for ErrorCode {
    type Error = CopsError;

    fn try_from(value: u16) -> Result<Self, CopsError> {
        match value {
            1 => Ok(Self::BadHandle),
            2 => Ok(Self::InvalidHandleReference),
            3 => Ok(Self::BadMessageFormat),
            4 => Ok(Self::UnableToProcess),
            5 => Ok(Self::MandatoryClientSiMissing),
            6 => Ok(Self::UnsupportedClientType),
            7 => Ok(Self::MandatoryObjectMissing),
            8 => Ok(Self::ClientFailure),
            9 => Ok(Self::CommunicationFailure),
            10 => Ok(Self::Unspecified),
            11 => Ok(Self::ShuttingDown),
            12 => Ok(Self::RedirectToPreferredServer),
            13 => Ok(Self::UnknownObject),
            14 => Ok(Self::AuthenticationFailure),
            15 => Ok(Self::AuthenticationRequired),
            _ => Err(CopsError::BadMessageFormat(format!(
                "invalid COPS error code {value}"
            ))),
        }
    }
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::BadHandle => "Bad handle",
            Self::InvalidHandleReference => "Invalid handle reference",
            Self::BadMessageFormat => "Bad message format (malformed message)",
            Self::UnableToProcess => "Unable to process",
            Self::MandatoryClientSiMissing => "Mandatory client-specific info missing",
            Self::UnsupportedClientType => "Unsupported client-type",
            Self::MandatoryObjectMissing => "Mandatory COPS object missing",
            Self::ClientFailure => "Client failure",
            Self::CommunicationFailure => "Communication failure",
            Self::Unspecified => "Unspecified",
            Self::ShuttingDown => "Shutting down",
            Self::RedirectToPreferredServer => "Redirect to preferred server",
            Self::UnknownObject => "Unknown COPS object",
            Self::AuthenticationFailure => "Authentication failure",
            Self::AuthenticationRequired => "Authentication required",
        }
    }
}

/// Error object: code plus subcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorObject {
    pub code: ErrorCode,
    pub subcode: u16,
}

impl ErrorObject {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, subcode: 0 }
    }
}

/// Client-SI subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CsiType {
    Signaled = 1,
    Named = 2,
}

/// Client Specific Information: opaque client-type-defined payload. For
/// PCMM this carries either the MM version info (Client-Open) or a
/// serialized gate TLV stream (Report).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSi {
    pub csi_type: CsiType,
    pub data: Bytes,
}

impl ClientSi {
    pub fn signaled(data: impl Into<Bytes>) -> Self {
        Self {
            csi_type: CsiType::Signaled,
            data: data.into(),
        }
    }

    pub fn named(data: impl Into<Bytes>) -> Self {
        Self {
            csi_type: CsiType::Named,
            data: data.into(),
        }
    }
}

/// PEP identifier: symbolic, NUL-padded on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PepId(String);

impl PepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Report types carried in a Report-State message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReportKind {
    Success = 1,
    Failure = 2,
    Accounting = 3,
}

impl TryFrom<u16> for ReportKind {
    type Error = CopsError;

    fn try_from(value: u16) -> Result<Self, CopsError> {
        match value {
            1 => Ok(Self::Success),
            2 => Ok(Self::Failure),
            3 => Ok(Self::Accounting),
            _ => Err(CopsError::BadMessageFormat(format!(
                "invalid report type {value}"
            ))),
        }
    }
}

/// Last PDP address: IPv4 address plus TCP port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdpAddress {
    pub addr: Ipv4Addr,
    pub port: u16,
}

/// Message integrity object: key id, sequence number, keyed digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    pub key_id: u32,
    pub sequence: u32,
    pub digest: Bytes,
}

/// A decoded COPS object. Closed enum over the class numbers the PCMM
/// profile uses; encode/decode are matches over the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopsObject {
    Handle(Handle),
    Context(Context),
    Decision(Decision),
    /// Client-specific decision data (C-Num 6, C-Type 4): for gate
    /// operations this is the serialized gate request.
    DecisionData(Bytes),
    Error(ErrorObject),
    ClientSi(ClientSi),
    KaTimer(u16),
    PepId(PepId),
    ReportType(ReportKind),
    LastPdpAddr(PdpAddress),
    AcctTimer(u16),
    Integrity(Integrity),
}

/// Write one object: header with unpadded length, payload, zero padding.
fn put_object(buf: &mut BytesMut, c_num: CNum, c_type: u8, payload: &[u8]) {
    let length = (OBJ_HEADER_LEN + payload.len()) as u16;
    buf.put_u16(length);
    buf.put_u8(c_num as u8);
    buf.put_u8(c_type);
    buf.put_slice(payload);
    let pad = (4 - payload.len() % 4) % 4;
    buf.put_bytes(0, pad);
}

fn timer_payload(seconds: u16) -> [u8; 4] {
    let s = seconds.to_be_bytes();
    [0, 0, s[0], s[1]]
}

impl CopsObject {
    /// Encode this object, including its trailing padding
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Handle(h) => put_object(buf, CNum::Handle, CTYPE_DEF, h.as_bytes()),
            Self::Context(c) => {
                let mut payload = [0u8; 4];
                payload[..2].copy_from_slice(&(c.r_type as u16).to_be_bytes());
                payload[2..].copy_from_slice(&c.m_type.to_be_bytes());
                put_object(buf, CNum::Context, CTYPE_DEF, &payload);
            }
            Self::Decision(d) => {
                let mut payload = [0u8; 4];
                payload[..2].copy_from_slice(&(d.command as u16).to_be_bytes());
                payload[2..].copy_from_slice(&(d.flags as u16).to_be_bytes());
                put_object(buf, CNum::Decision, CTYPE_DEF, &payload);
            }
            Self::DecisionData(data) => put_object(buf, CNum::Decision, CTYPE_CSI, data),
            Self::Error(e) => {
                let mut payload = [0u8; 4];
                payload[..2].copy_from_slice(&(e.code as u16).to_be_bytes());
                payload[2..].copy_from_slice(&e.subcode.to_be_bytes());
                put_object(buf, CNum::Error, CTYPE_DEF, &payload);
            }
            Self::ClientSi(si) => put_object(buf, CNum::ClientSi, si.csi_type as u8, &si.data),
            Self::KaTimer(secs) => put_object(buf, CNum::KaTimer, CTYPE_DEF, &timer_payload(*secs)),
            Self::PepId(id) => put_object(buf, CNum::PepId, CTYPE_DEF, id.as_str().as_bytes()),
            Self::ReportType(kind) => {
                let mut payload = [0u8; 4];
                payload[..2].copy_from_slice(&(*kind as u16).to_be_bytes());
                put_object(buf, CNum::ReportType, CTYPE_DEF, &payload);
            }
            Self::LastPdpAddr(a) => {
                let mut payload = [0u8; 8];
                payload[..4].copy_from_slice(&a.addr.octets());
                payload[6..].copy_from_slice(&a.port.to_be_bytes());
                put_object(buf, CNum::LastPdpAddr, CTYPE_DEF, &payload);
            }
            Self::AcctTimer(secs) => {
                put_object(buf, CNum::AcctTimer, CTYPE_DEF, &timer_payload(*secs))
            }
            Self::Integrity(i) => {
                let mut payload = BytesMut::with_capacity(8 + i.digest.len());
                payload.put_u32(i.key_id);
                payload.put_u32(i.sequence);
                payload.put_slice(&i.digest);
                put_object(buf, CNum::Integrity, CTYPE_DEF, &payload);
            }
        }
    }

    /// Total encoded size including header and padding
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            Self::Handle(h) => h.as_bytes().len(),
            Self::Context(_) | Self::Decision(_) | Self::Error(_) | Self::ReportType(_) => 4,
            Self::DecisionData(d) => d.len(),
            Self::ClientSi(si) => si.data.len(),
            Self::KaTimer(_) | Self::AcctTimer(_) => 4,
            Self::PepId(id) => id.as_str().len(),
            Self::LastPdpAddr(_) => 8,
            Self::Integrity(i) => 8 + i.digest.len(),
        };
        OBJ_HEADER_LEN + payload + (4 - payload % 4) % 4
    }

    /// Decode one object and advance the cursor past its padding.
    ///
    /// An unrecognized class number fails hard: during COPS message decode
    /// that is a `BadMessageFormat` condition, unlike the nested PCMM gate
    /// format which skips unknown tags.
    pub fn decode(buf: &mut Bytes) -> CopsResult<Self> {
        if buf.remaining() < OBJ_HEADER_LEN {
            return Err(CopsError::BufferTooShort {
                needed: OBJ_HEADER_LEN,
                available: buf.remaining(),
            });
        }

        let length = buf.get_u16() as usize;
        let c_num_raw = buf.get_u8();
        let c_type = buf.get_u8();

        if length < OBJ_HEADER_LEN {
            return Err(CopsError::BadMessageFormat(format!(
                "object length {length} smaller than its header"
            )));
        }
        let payload_len = length - OBJ_HEADER_LEN;
        let pad = (4 - length % 4) % 4;
        if buf.remaining() < payload_len + pad {
            return Err(CopsError::BufferTooShort {
                needed: payload_len + pad,
                available: buf.remaining(),
            });
        }

        let c_num = CNum::try_from(c_num_raw)?;
        let mut payload = buf.copy_to_bytes(payload_len);
        buf.advance(pad);

        fn need(payload: &Bytes, n: usize) -> CopsResult<()> {
            if payload.len() < n {
                Err(CopsError::BufferTooShort {
                    needed: n,
                    available: payload.len(),
                })
            } else {
                Ok(())
            }
        }

        match c_num {
            CNum::Handle => Ok(Self::Handle(Handle(payload))),
            CNum::Context => {
                need(&payload, 4)?;
                let r_type = RType::try_from(payload.get_u16())?;
                let m_type = payload.get_u16();
                Ok(Self::Context(Context { r_type, m_type }))
            }
            CNum::Decision => match c_type {
                CTYPE_DEF => {
                    need(&payload, 4)?;
                    let command = DecisionCommand::try_from(payload.get_u16())?;
                    let flags = DecisionFlag::try_from(payload.get_u16())?;
                    Ok(Self::Decision(Decision { command, flags }))
                }
                CTYPE_CSI => Ok(Self::DecisionData(payload)),
                _ => Err(CopsError::InvalidClassType {
                    c_num: c_num_raw,
                    c_type,
                }),
            },
            CNum::Error => {
                need(&payload, 4)?;
                let code = ErrorCode::try_from(payload.get_u16())?;
                let subcode = payload.get_u16();
                Ok(Self::Error(ErrorObject { code, subcode }))
            }
            CNum::ClientSi => {
                let csi_type = match c_type {
                    1 => CsiType::Signaled,
                    2 => CsiType::Named,
                    _ => {
                        return Err(CopsError::InvalidClassType {
                            c_num: c_num_raw,
                            c_type,
                        })
                    }
                };
                Ok(Self::ClientSi(ClientSi {
                    csi_type,
                    data: payload,
                }))
            }
            CNum::KaTimer => {
                need(&payload, 4)?;
                payload.advance(2);
                Ok(Self::KaTimer(payload.get_u16()))
            }
            CNum::PepId => {
                let name = String::from_utf8_lossy(&payload)
                    .trim_end_matches('\0')
                    .to_string();
                Ok(Self::PepId(PepId(name)))
            }
            CNum::ReportType => {
                need(&payload, 4)?;
                let kind = ReportKind::try_from(payload.get_u16())?;
                Ok(Self::ReportType(kind))
            }
            CNum::LastPdpAddr => {
                if c_type != CTYPE_DEF && c_type != CTYPE_STATELESS {
                    return Err(CopsError::InvalidClassType {
                        c_num: c_num_raw,
                        c_type,
                    });
                }
                need(&payload, 8)?;
                let addr = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
                payload.advance(6);
                let port = payload.get_u16();
                Ok(Self::LastPdpAddr(PdpAddress { addr, port }))
            }
            CNum::AcctTimer => {
                need(&payload, 4)?;
                payload.advance(2);
                Ok(Self::AcctTimer(payload.get_u16()))
            }
            CNum::Integrity => {
                need(&payload, 8)?;
                let key_id = payload.get_u32();
                let sequence = payload.get_u32();
                Ok(Self::Integrity(Integrity {
                    key_id,
                    sequence,
                    digest: payload,
                }))
            }
        }
    }
}
