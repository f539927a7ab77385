//! COPS Messages
//!
//! The ten COPS message types as opcode-tagged aggregates of COPS objects.
//! Each message enforces its mandatory-object invariant both at
//! construction and when decoded off the wire; a violation is a fatal
//! parse error. The header length field is recomputed from the contained
//! objects on every encode.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{CopsError, CopsResult};
use crate::header::{CopsHeader, OpCode};
use crate::object::{
    ClientSi, Context, CopsObject, Decision, ErrorObject, Handle, Integrity, PdpAddress, PepId,
    ReportKind,
};

/// Client-Open (OPN), received from the PEP. The PEP identifier is
/// mandatory; for the PCMM client-type the ClientSI carrying the MM
/// version info is mandatory too, which the agent enforces because only
/// it knows the negotiated client-type semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOpenMsg {
    pub client_type: u16,
    pub pep_id: PepId,
    pub client_si: Option<ClientSi>,
    pub last_pdp_addr: Option<PdpAddress>,
    pub integrity: Option<Integrity>,
}

impl ClientOpenMsg {
    pub fn new(client_type: u16, pep_id: PepId) -> Self {
        Self {
            client_type,
            pep_id,
            client_si: None,
            last_pdp_addr: None,
            integrity: None,
        }
    }
}

/// Client-Accept (CAT), sent to the PEP. The keep-alive timer is
/// mandatory; a zero accounting timer is simply not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAcceptMsg {
    pub client_type: u16,
    pub ka_timer: u16,
    pub acct_timer: Option<u16>,
    pub integrity: Option<Integrity>,
}

impl ClientAcceptMsg {
    pub fn new(client_type: u16, ka_timer: u16, acct_timer: Option<u16>) -> Self {
        Self {
            client_type,
            ka_timer,
            acct_timer,
            integrity: None,
        }
    }
}

/// Client-Close (CC). The error object identifying the close reason is
/// mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCloseMsg {
    pub client_type: u16,
    pub error: ErrorObject,
    pub integrity: Option<Integrity>,
}

impl ClientCloseMsg {
    pub fn new(client_type: u16, error: ErrorObject) -> Self {
        Self {
            client_type,
            error,
            integrity: None,
        }
    }
}

/// Request (REQ), received from the PEP. Handle and context are mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMsg {
    pub client_type: u16,
    pub handle: Handle,
    pub context: Context,
    pub client_si: Vec<ClientSi>,
    pub integrity: Option<Integrity>,
}

impl RequestMsg {
    pub fn new(client_type: u16, handle: Handle, context: Context) -> Self {
        Self {
            client_type,
            handle,
            context,
            client_si: Vec::new(),
            integrity: None,
        }
    }
}

/// Decision (DEC), sent to the PEP: handle plus either an error or a
/// non-empty context/decision-set list, never both. Gate payloads ride in
/// `client_data` as a client-specific decision object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionMsg {
    pub client_type: u16,
    pub handle: Handle,
    pub decisions: Vec<(Context, Vec<Decision>)>,
    pub client_data: Option<Bytes>,
    pub error: Option<ErrorObject>,
    pub integrity: Option<Integrity>,
}

impl DecisionMsg {
    pub fn new(
        client_type: u16,
        handle: Handle,
        decisions: Vec<(Context, Vec<Decision>)>,
    ) -> CopsResult<Self> {
        let msg = Self {
            client_type,
            handle,
            decisions,
            client_data: None,
            error: None,
            integrity: None,
        };
        msg.check_sanity()?;
        Ok(msg)
    }

    fn check_sanity(&self) -> CopsResult<()> {
        let has_decisions =
            !self.decisions.is_empty() && self.decisions.iter().all(|(_, d)| !d.is_empty());
        match (has_decisions, self.error.is_some()) {
            (false, false) => Err(CopsError::BadMessageFormat(
                "decision message needs an error or at least one decision".into(),
            )),
            (true, true) => Err(CopsError::BadMessageFormat(
                "decision message must not carry both an error and decisions".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Report-State (RPT), received from the PEP. Handle and report type are
/// mandatory; the named ClientSI holds the serialized gate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMsg {
    pub client_type: u16,
    pub handle: Handle,
    pub report_type: ReportKind,
    pub client_si: Option<ClientSi>,
    pub integrity: Option<Integrity>,
}

impl ReportMsg {
    pub fn new(client_type: u16, handle: Handle, report_type: ReportKind) -> Self {
        Self {
            client_type,
            handle,
            report_type,
            client_si: None,
            integrity: None,
        }
    }
}

/// Delete-Request-State (DRQ): handle-keyed, no payload beyond optional
/// integrity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequestMsg {
    pub client_type: u16,
    pub handle: Handle,
    pub integrity: Option<Integrity>,
}

impl DeleteRequestMsg {
    pub fn new(client_type: u16, handle: Handle) -> Self {
        Self {
            client_type,
            handle,
            integrity: None,
        }
    }
}

/// Keep-Alive (KA): echoed verbatim by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveMsg {
    pub client_type: u16,
    pub integrity: Option<Integrity>,
}

impl KeepAliveMsg {
    pub fn new(client_type: u16) -> Self {
        Self {
            client_type,
            integrity: None,
        }
    }
}

/// Synchronize-State (SSQ and SSC): optionally handle-keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStateMsg {
    pub client_type: u16,
    pub handle: Option<Handle>,
    pub integrity: Option<Integrity>,
}

impl SyncStateMsg {
    pub fn new(client_type: u16, handle: Option<Handle>) -> Self {
        Self {
            client_type,
            handle,
            integrity: None,
        }
    }
}

/// A complete COPS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopsMessage {
    Request(RequestMsg),
    Decision(DecisionMsg),
    Report(ReportMsg),
    DeleteRequest(DeleteRequestMsg),
    SyncStateRequest(SyncStateMsg),
    ClientOpen(ClientOpenMsg),
    ClientAccept(ClientAcceptMsg),
    ClientClose(ClientCloseMsg),
    KeepAlive(KeepAliveMsg),
    SyncStateComplete(SyncStateMsg),
}

impl CopsMessage {
    pub fn op_code(&self) -> OpCode {
        match self {
            Self::Request(_) => OpCode::Request,
            Self::Decision(_) => OpCode::Decision,
            Self::Report(_) => OpCode::Report,
            Self::DeleteRequest(_) => OpCode::DeleteRequest,
            Self::SyncStateRequest(_) => OpCode::SyncStateRequest,
            Self::ClientOpen(_) => OpCode::ClientOpen,
            Self::ClientAccept(_) => OpCode::ClientAccept,
            Self::ClientClose(_) => OpCode::ClientClose,
            Self::KeepAlive(_) => OpCode::KeepAlive,
            Self::SyncStateComplete(_) => OpCode::SyncStateComplete,
        }
    }

    pub fn client_type(&self) -> u16 {
        match self {
            Self::Request(m) => m.client_type,
            Self::Decision(m) => m.client_type,
            Self::Report(m) => m.client_type,
            Self::DeleteRequest(m) => m.client_type,
            Self::SyncStateRequest(m) => m.client_type,
            Self::ClientOpen(m) => m.client_type,
            Self::ClientAccept(m) => m.client_type,
            Self::ClientClose(m) => m.client_type,
            Self::KeepAlive(m) => m.client_type,
            Self::SyncStateComplete(m) => m.client_type,
        }
    }

    fn objects(&self) -> Vec<CopsObject> {
        let mut objs = Vec::new();
        match self {
            Self::Request(m) => {
                objs.push(CopsObject::Handle(m.handle.clone()));
                objs.push(CopsObject::Context(m.context));
                objs.extend(m.client_si.iter().cloned().map(CopsObject::ClientSi));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::Decision(m) => {
                objs.push(CopsObject::Handle(m.handle.clone()));
                if let Some(error) = m.error {
                    objs.push(CopsObject::Error(error));
                }
                for (context, decisions) in &m.decisions {
                    objs.push(CopsObject::Context(*context));
                    objs.extend(decisions.iter().copied().map(CopsObject::Decision));
                }
                if let Some(data) = &m.client_data {
                    objs.push(CopsObject::DecisionData(data.clone()));
                }
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::Report(m) => {
                objs.push(CopsObject::Handle(m.handle.clone()));
                objs.push(CopsObject::ReportType(m.report_type));
                objs.extend(m.client_si.clone().map(CopsObject::ClientSi));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::DeleteRequest(m) => {
                objs.push(CopsObject::Handle(m.handle.clone()));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::SyncStateRequest(m) | Self::SyncStateComplete(m) => {
                objs.extend(m.handle.clone().map(CopsObject::Handle));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::ClientOpen(m) => {
                objs.push(CopsObject::PepId(m.pep_id.clone()));
                objs.extend(m.client_si.clone().map(CopsObject::ClientSi));
                objs.extend(m.last_pdp_addr.map(CopsObject::LastPdpAddr));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::ClientAccept(m) => {
                objs.push(CopsObject::KaTimer(m.ka_timer));
                objs.extend(m.acct_timer.map(CopsObject::AcctTimer));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::ClientClose(m) => {
                objs.push(CopsObject::Error(m.error));
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
            Self::KeepAlive(m) => {
                objs.extend(m.integrity.clone().map(CopsObject::Integrity));
            }
        }
        objs
    }

    /// Encode header and body; the header length field is computed from
    /// the contained objects.
    pub fn encode(&self) -> BytesMut {
        let objects = self.objects();
        let body_len: usize = objects.iter().map(|o| o.encoded_len()).sum();

        let mut header = CopsHeader::new(self.op_code(), self.client_type());
        header.message_length = body_len as u32;

        let mut buf = BytesMut::with_capacity(crate::COPS_HEADER_LEN + body_len);
        header.encode(&mut buf);
        for obj in &objects {
            obj.encode(&mut buf);
        }
        buf
    }

    /// Decode a full message (header plus body) from a buffer holding at
    /// least one complete frame.
    pub fn decode(buf: &mut Bytes) -> CopsResult<Self> {
        let header = CopsHeader::decode(buf)?;
        let body_len = header.message_length as usize;
        if buf.remaining() < body_len {
            return Err(CopsError::BufferTooShort {
                needed: body_len,
                available: buf.remaining(),
            });
        }
        let mut body = buf.copy_to_bytes(body_len);
        Self::decode_body(&header, &mut body)
    }

    /// Decode the message body for a previously decoded header.
    pub fn decode_body(header: &CopsHeader, body: &mut Bytes) -> CopsResult<Self> {
        let mut objects = Vec::new();
        while body.remaining() >= crate::object::OBJ_HEADER_LEN {
            objects.push(CopsObject::decode(body)?);
        }
        if body.has_remaining() {
            return Err(CopsError::BadMessageFormat(format!(
                "{} trailing bytes after the last object",
                body.remaining()
            )));
        }

        let client_type = header.client_type;
        match header.op_code {
            OpCode::Request => decode_request(client_type, objects),
            OpCode::Decision => decode_decision(client_type, objects),
            OpCode::Report => decode_report(client_type, objects),
            OpCode::DeleteRequest => decode_delete(client_type, objects),
            OpCode::SyncStateRequest => {
                decode_sync(client_type, objects).map(CopsMessage::SyncStateRequest)
            }
            OpCode::SyncStateComplete => {
                decode_sync(client_type, objects).map(CopsMessage::SyncStateComplete)
            }
            OpCode::ClientOpen => decode_client_open(client_type, objects),
            OpCode::ClientAccept => decode_client_accept(client_type, objects),
            OpCode::ClientClose => decode_client_close(client_type, objects),
            OpCode::KeepAlive => decode_keep_alive(client_type, objects),
        }
    }
}

fn unexpected(op: OpCode, obj: &CopsObject) -> CopsError {
    CopsError::BadMessageFormat(format!("unexpected object {obj:?} in {} message", op.name()))
}

fn decode_request(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut handle = None;
    let mut context = None;
    let mut client_si = Vec::new();
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Handle(h) => handle = Some(h),
            CopsObject::Context(c) => context = Some(c),
            CopsObject::ClientSi(si) => client_si.push(si),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::Request, &other)),
        }
    }
    Ok(CopsMessage::Request(RequestMsg {
        client_type,
        handle: handle.ok_or(CopsError::MandatoryObjectMissing("client handle"))?,
        context: context.ok_or(CopsError::MandatoryObjectMissing("context"))?,
        client_si,
        integrity,
    }))
}

fn decode_decision(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut handle = None;
    let mut decisions: Vec<(Context, Vec<Decision>)> = Vec::new();
    let mut client_data = None;
    let mut error = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Handle(h) => handle = Some(h),
            CopsObject::Context(c) => decisions.push((c, Vec::new())),
            CopsObject::Decision(d) => match decisions.last_mut() {
                Some((_, set)) => set.push(d),
                None => {
                    return Err(CopsError::BadMessageFormat(
                        "decision object before any context".into(),
                    ))
                }
            },
            CopsObject::DecisionData(data) => client_data = Some(data),
            CopsObject::Error(e) => error = Some(e),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::Decision, &other)),
        }
    }
    let msg = DecisionMsg {
        client_type,
        handle: handle.ok_or(CopsError::MandatoryObjectMissing("client handle"))?,
        decisions,
        client_data,
        error,
        integrity,
    };
    msg.check_sanity()?;
    Ok(CopsMessage::Decision(msg))
}

fn decode_report(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut handle = None;
    let mut report_type = None;
    let mut client_si = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Handle(h) => handle = Some(h),
            CopsObject::ReportType(r) => report_type = Some(r),
            CopsObject::ClientSi(si) => client_si = Some(si),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::Report, &other)),
        }
    }
    Ok(CopsMessage::Report(ReportMsg {
        client_type,
        handle: handle.ok_or(CopsError::MandatoryObjectMissing("client handle"))?,
        report_type: report_type.ok_or(CopsError::MandatoryObjectMissing("report type"))?,
        client_si,
        integrity,
    }))
}

fn decode_delete(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut handle = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Handle(h) => handle = Some(h),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::DeleteRequest, &other)),
        }
    }
    Ok(CopsMessage::DeleteRequest(DeleteRequestMsg {
        client_type,
        handle: handle.ok_or(CopsError::MandatoryObjectMissing("client handle"))?,
        integrity,
    }))
}

fn decode_sync(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<SyncStateMsg> {
    let mut handle = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Handle(h) => handle = Some(h),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::SyncStateRequest, &other)),
        }
    }
    Ok(SyncStateMsg {
        client_type,
        handle,
        integrity,
    })
}

fn decode_client_open(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut pep_id = None;
    let mut client_si = None;
    let mut last_pdp_addr = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::PepId(p) => pep_id = Some(p),
            CopsObject::ClientSi(si) => client_si = Some(si),
            CopsObject::LastPdpAddr(a) => last_pdp_addr = Some(a),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::ClientOpen, &other)),
        }
    }
    Ok(CopsMessage::ClientOpen(ClientOpenMsg {
        client_type,
        pep_id: pep_id.ok_or(CopsError::MandatoryObjectMissing("PEP id"))?,
        client_si,
        last_pdp_addr,
        integrity,
    }))
}

fn decode_client_accept(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut ka_timer = None;
    let mut acct_timer = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::KaTimer(t) => ka_timer = Some(t),
            CopsObject::AcctTimer(t) => acct_timer = Some(t),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::ClientAccept, &other)),
        }
    }
    Ok(CopsMessage::ClientAccept(ClientAcceptMsg {
        client_type,
        ka_timer: ka_timer.ok_or(CopsError::MandatoryObjectMissing("KA timer"))?,
        acct_timer,
        integrity,
    }))
}

fn decode_client_close(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut error = None;
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Error(e) => error = Some(e),
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::ClientClose, &other)),
        }
    }
    Ok(CopsMessage::ClientClose(ClientCloseMsg {
        client_type,
        error: error.ok_or(CopsError::MandatoryObjectMissing("error"))?,
        integrity,
    }))
}

fn decode_keep_alive(client_type: u16, objects: Vec<CopsObject>) -> CopsResult<CopsMessage> {
    let mut integrity = None;
    for obj in objects {
        match obj {
            CopsObject::Integrity(i) => integrity = Some(i),
            other => return Err(unexpected(OpCode::KeepAlive, &other)),
        }
    }
    Ok(CopsMessage::KeepAlive(KeepAliveMsg {
        client_type,
        integrity,
    }))
}
