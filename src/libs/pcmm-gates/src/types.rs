//! Fixed-layout gate sub-objects
//!
//! Transaction and identity objects plus the small response-side objects
//! (gate state, time, usage). Layouts follow PacketCable Multimedia I05
//! Section 6.4.

use bytes::BytesMut;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{GateError, GateResult};
use crate::subobj::{encode_subobj, SNum};

fn need(data: &[u8], n: usize) -> GateResult<()> {
    if data.len() < n {
        Err(GateError::BufferTooShort {
            needed: n,
            available: data.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Gate control commands carried in a TransactionID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GateCommand {
    GateSet = 4,
    GateSetAck = 5,
    GateSetErr = 6,
    GateInfo = 7,
    GateInfoAck = 8,
    GateInfoErr = 9,
    GateDelete = 10,
    GateDeleteAck = 11,
    GateDeleteErr = 12,
    GateRptState = 15,
    GateCmdErr = 16,
    PdpConfig = 17,
    PdpConfigAck = 18,
    PdpConfigErr = 19,
    SyncRequest = 20,
    SyncRpt = 21,
    SyncComplete = 22,
    MsgReceipt = 23,
}

impl TryFrom<u16> for GateCommand {
    type Error = GateError;

    fn try_from(value: u16) -> Result<Self, GateError> {
        match value {
            4 => Ok(Self::GateSet),
            5 => Ok(Self::GateSetAck),
            6 => Ok(Self::GateSetErr),
            7 => Ok(Self::GateInfo),
            8 => Ok(Self::GateInfoAck),
            9 => Ok(Self::GateInfoErr),
            10 => Ok(Self::GateDelete),
            11 => Ok(Self::GateDeleteAck),
            12 => Ok(Self::GateDeleteErr),
            15 => Ok(Self::GateRptState),
            16 => Ok(Self::GateCmdErr),
            17 => Ok(Self::PdpConfig),
            18 => Ok(Self::PdpConfigAck),
            19 => Ok(Self::PdpConfigErr),
            20 => Ok(Self::SyncRequest),
            21 => Ok(Self::SyncRpt),
            22 => Ok(Self::SyncComplete),
            23 => Ok(Self::MsgReceipt),
            _ => Err(GateError::UnknownGateCommand(value)),
        }
    }
}

/// TransactionID: 16-bit transaction identifier plus gate command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId {
    pub id: u16,
    pub command: GateCommand,
}

impl TransactionId {
    pub fn new(id: u16, command: GateCommand) -> Self {
        Self { id, command }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&self.id.to_be_bytes());
        payload[2..].copy_from_slice(&(self.command as u16).to_be_bytes());
        encode_subobj(buf, SNum::TransactionId, 1, &payload);
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self {
            id: read_u16(data, 0),
            command: GateCommand::try_from(read_u16(data, 2))?,
        })
    }
}

/// Application Manager ID: application type plus application manager tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amid {
    pub app_type: u16,
    pub app_mgr_tag: u16,
}

impl Amid {
    pub fn new(app_type: u16, app_mgr_tag: u16) -> Self {
        Self {
            app_type,
            app_mgr_tag,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&self.app_type.to_be_bytes());
        payload[2..].copy_from_slice(&self.app_mgr_tag.to_be_bytes());
        encode_subobj(buf, SNum::Amid, 1, &payload);
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self {
            app_type: read_u16(data, 0),
            app_mgr_tag: read_u16(data, 2),
        })
    }
}

/// SubscriberID: the subscriber's IPv4 (S-Type 1) or IPv6 (S-Type 2)
/// address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(pub IpAddr);

impl SubscriberId {
    pub fn s_type(&self) -> u8 {
        match self.0 {
            IpAddr::V4(_) => 1,
            IpAddr::V6(_) => 2,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self.0 {
            IpAddr::V4(v4) => encode_subobj(buf, SNum::SubscriberId, 1, &v4.octets()),
            IpAddr::V6(v6) => encode_subobj(buf, SNum::SubscriberId, 2, &v6.octets()),
        }
    }

    pub fn parse(s_type: u8, data: &[u8]) -> GateResult<Self> {
        match s_type {
            1 => {
                need(data, 4)?;
                let octets = [data[0], data[1], data[2], data[3]];
                Ok(Self(IpAddr::V4(Ipv4Addr::from(octets))))
            }
            2 => {
                need(data, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&data[..16]);
                Ok(Self(IpAddr::V6(Ipv6Addr::from(octets))))
            }
            _ => Err(GateError::UnknownSType {
                s_num: SNum::SubscriberId as u8,
                s_type,
            }),
        }
    }
}

impl From<Ipv4Addr> for SubscriberId {
    fn from(addr: Ipv4Addr) -> Self {
        Self(IpAddr::V4(addr))
    }
}

impl From<Ipv6Addr> for SubscriberId {
    fn from(addr: Ipv6Addr) -> Self {
        Self(IpAddr::V6(addr))
    }
}

/// GateID: opaque 32-bit identifier assigned by the CMTS on Gate-Set
/// success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateId(pub u32);

impl GateId {
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_subobj(buf, SNum::GateId, 1, &self.0.to_be_bytes());
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self(read_u32(data, 0)))
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Gate direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Downstream = 0,
    Upstream = 1,
}

impl TryFrom<u8> for Direction {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, GateError> {
        match value {
            0 => Ok(Self::Downstream),
            1 => Ok(Self::Upstream),
            _ => Err(GateError::UnknownDirection(value)),
        }
    }
}

const GATE_SPEC_FLAG_UPSTREAM: u8 = 0x01;
const GATE_SPEC_FLAG_DSCP_OVERWRITE: u8 = 0x02;

/// GateSpec: direction and DSCP/TOS overwrite flags, session class and the
/// four authorization/commit timers.
///
/// The flags byte is shared between the direction bit and the DSCP/TOS
/// overwrite enable bit; both setters OR into the stored byte, so the two
/// fields are independently settable in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateSpec {
    flags: u8,
    pub dscp_tos_overwrite: u8,
    pub dscp_tos_mask: u8,
    pub session_class_id: u8,
    pub timer_t1: u16,
    pub timer_t2: u16,
    pub timer_t3: u16,
    pub timer_t4: u16,
}

impl GateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// OR the direction bit into the flags byte
    pub fn set_direction(&mut self, direction: Direction) {
        self.flags |= direction as u8;
    }

    pub fn direction(&self) -> Direction {
        if self.flags & GATE_SPEC_FLAG_UPSTREAM != 0 {
            Direction::Upstream
        } else {
            Direction::Downstream
        }
    }

    /// Enable DSCP/TOS overwrite, OR-ing the enable bit into the flags
    /// byte
    pub fn set_dscp_overwrite(&mut self, overwrite: u8, mask: u8) {
        self.flags |= GATE_SPEC_FLAG_DSCP_OVERWRITE;
        self.dscp_tos_overwrite = overwrite;
        self.dscp_tos_mask = mask;
    }

    pub fn dscp_overwrite_enabled(&self) -> bool {
        self.flags & GATE_SPEC_FLAG_DSCP_OVERWRITE != 0
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 12];
        payload[0] = self.flags;
        payload[1] = self.dscp_tos_overwrite;
        payload[2] = self.dscp_tos_mask;
        payload[3] = self.session_class_id;
        payload[4..6].copy_from_slice(&self.timer_t1.to_be_bytes());
        payload[6..8].copy_from_slice(&self.timer_t2.to_be_bytes());
        payload[8..10].copy_from_slice(&self.timer_t3.to_be_bytes());
        payload[10..12].copy_from_slice(&self.timer_t4.to_be_bytes());
        encode_subobj(buf, SNum::GateSpec, 1, &payload);
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 12)?;
        Ok(Self {
            flags: data[0],
            dscp_tos_overwrite: data[1],
            dscp_tos_mask: data[2],
            session_class_id: data[3],
            timer_t1: read_u16(data, 4),
            timer_t2: read_u16(data, 6),
            timer_t3: read_u16(data, 8),
            timer_t4: read_u16(data, 10),
        })
    }
}

/// PCMM error codes (PacketCable Multimedia I05 Table 6-27)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PcmmErrorCode {
    InsufficientResources = 1,
    UnknownGateId = 2,
    MissingRequiredObject = 6,
    InvalidObject = 7,
    VolumeUsageLimit = 8,
    TimeUsageLimit = 9,
    SessionClassLimit = 10,
    UndefinedServiceClassName = 11,
    IncompatibleEnvelope = 12,
    InvalidSubscriberId = 13,
    UnauthorizedAmid = 14,
    NumberOfClassifiers = 15,
    PolicyException = 16,
    InvalidFieldValue = 17,
    TransportError = 18,
    UnknownGateCommand = 19,
    Docsis10Cm = 20,
    NumberOfCmSids = 21,
    NumberOfCmtsSids = 22,
    UnauthorizedPsid = 23,
    NoStateForPdp = 24,
    UnsupportedSyncType = 25,
    StateDataIncomplete = 26,
    UpstreamDropUnsupported = 27,
    MulticastGateError = 28,
    MulticastVolumeLimit = 29,
    UncommittedMulticast = 30,
    MulticastGateModification = 31,
    UpstreamMulticast = 32,
    MulticastGateSpecIncompatible = 33,
    MulticastQosError = 34,
    MulticastDownstreamResequencing = 35,
    OtherUnspecified = 127,
}

impl TryFrom<u16> for PcmmErrorCode {
    type Error = GateError;

    fn try_from(value: u16) -> Result<Self, GateError> {
        match value {
            1 => Ok(Self::InsufficientResources),
            2 => Ok(Self::UnknownGateId),
            6 => Ok(Self::MissingRequiredObject),
            7 => Ok(Self::InvalidObject),
            8 => Ok(Self::VolumeUsageLimit),
            9 => Ok(Self::TimeUsageLimit),
            10 => Ok(Self::SessionClassLimit),
            11 => Ok(Self::UndefinedServiceClassName),
            12 => Ok(Self::IncompatibleEnvelope),
            13 => Ok(Self::InvalidSubscriberId),
            14 => Ok(Self::UnauthorizedAmid),
            15 => Ok(Self::NumberOfClassifiers),
            16 => Ok(Self::PolicyException),
            17 => Ok(Self::InvalidFieldValue),
            18 => Ok(Self::TransportError),
            19 => Ok(Self::UnknownGateCommand),
            20 => Ok(Self::Docsis10Cm),
            21 => Ok(Self::NumberOfCmSids),
            22 => Ok(Self::NumberOfCmtsSids),
            23 => Ok(Self::UnauthorizedPsid),
            24 => Ok(Self::NoStateForPdp),
            25 => Ok(Self::UnsupportedSyncType),
            26 => Ok(Self::StateDataIncomplete),
            27 => Ok(Self::UpstreamDropUnsupported),
            28 => Ok(Self::MulticastGateError),
            29 => Ok(Self::MulticastVolumeLimit),
            30 => Ok(Self::UncommittedMulticast),
            31 => Ok(Self::MulticastGateModification),
            32 => Ok(Self::UpstreamMulticast),
            33 => Ok(Self::MulticastGateSpecIncompatible),
            34 => Ok(Self::MulticastQosError),
            35 => Ok(Self::MulticastDownstreamResequencing),
            127 => Ok(Self::OtherUnspecified),
            _ => Err(GateError::UnknownErrorCode(value)),
        }
    }
}

impl PcmmErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InsufficientResources => "Insufficient Resources",
            Self::UnknownGateId => "Unknown GateID",
            Self::MissingRequiredObject => "Missing Required Object",
            Self::InvalidObject => "Invalid Object",
            Self::VolumeUsageLimit => "Volume Based Usage Limit Exceeded",
            Self::TimeUsageLimit => "Time Based Usage Limit Exceeded",
            Self::SessionClassLimit => "Session Class Limit Exceeded",
            Self::UndefinedServiceClassName => "Undefined Service Class Name",
            Self::IncompatibleEnvelope => "Incompatible Envelope",
            Self::InvalidSubscriberId => "Invalid SubscriberID",
            Self::UnauthorizedAmid => "Unauthorized AMID",
            Self::NumberOfClassifiers => "Number of Classifiers Not Supported",
            Self::PolicyException => "Policy Exception",
            Self::InvalidFieldValue => "Invalid Field Value in Object",
            Self::TransportError => "Transport Error",
            Self::UnknownGateCommand => "Unknown Gate Command",
            Self::Docsis10Cm => "DOCSIS 1.0 CM",
            Self::NumberOfCmSids => "Number of SIDs exceeded in CM",
            Self::NumberOfCmtsSids => "Number of SIDs exceeded in CMTS",
            Self::UnauthorizedPsid => "Unauthorized PSID",
            Self::NoStateForPdp => "No State for PDP",
            Self::UnsupportedSyncType => "Unsupported Synch Type",
            Self::StateDataIncomplete => "State Data Incomplete",
            Self::UpstreamDropUnsupported => "Upstream Drop Unsupported",
            Self::MulticastGateError => "Multicast Gate Error",
            Self::MulticastVolumeLimit => "Multicast Volume Limit Unsupported",
            Self::UncommittedMulticast => "Uncommitted Multicast Not Supported",
            Self::MulticastGateModification => "Multicast Gate Modification Not Supported",
            Self::UpstreamMulticast => "Upstream Multicast Not Supported",
            Self::MulticastGateSpecIncompatible => "Multicast GateSpec incompatibility",
            Self::MulticastQosError => "Multicast QoS Error",
            Self::MulticastDownstreamResequencing => "Multicast Downstream Resequencing mismatch",
            Self::OtherUnspecified => "Other, Unspecified Error",
        }
    }
}

/// PCMM error: code plus subcode, delivered to the policy callback as
/// data rather than as a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmmError {
    pub code: PcmmErrorCode,
    pub subcode: u16,
}

impl PcmmError {
    pub fn new(code: PcmmErrorCode) -> Self {
        Self { code, subcode: 0 }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&(self.code as u16).to_be_bytes());
        payload[2..].copy_from_slice(&self.subcode.to_be_bytes());
        encode_subobj(buf, SNum::PcmmError, 1, &payload);
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self {
            code: PcmmErrorCode::try_from(read_u16(data, 0))?,
            subcode: read_u16(data, 2),
        })
    }
}

impl std::fmt::Display for PcmmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error {} subcode {:04x}: {}",
            self.code as u16,
            self.subcode,
            self.code.description()
        )
    }
}

/// Gate state values reported by the CMTS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GateStateType {
    IdleClosed = 1,
    Authorized = 2,
    Reserved = 3,
    Committed = 4,
    CommittedRecovery = 5,
}

impl TryFrom<u16> for GateStateType {
    type Error = GateError;

    fn try_from(value: u16) -> Result<Self, GateError> {
        match value {
            1 => Ok(Self::IdleClosed),
            2 => Ok(Self::Authorized),
            3 => Ok(Self::Reserved),
            4 => Ok(Self::Committed),
            5 => Ok(Self::CommittedRecovery),
            _ => Err(GateError::UnknownGateState(value)),
        }
    }
}

/// Gate state plus the reason the CMTS reports for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub state: GateStateType,
    pub reason: u16,
}

impl GateState {
    pub fn new(state: GateStateType, reason: u16) -> Self {
        Self { state, reason }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&(self.state as u16).to_be_bytes());
        payload[2..].copy_from_slice(&self.reason.to_be_bytes());
        encode_subobj(buf, SNum::GateState, 1, &payload);
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self {
            state: GateStateType::try_from(read_u16(data, 0))?,
            reason: read_u16(data, 2),
        })
    }
}

/// Seconds the gate has been in the committed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTimeInfo(pub u32);

impl GateTimeInfo {
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_subobj(buf, SNum::GateTimeInfo, 1, &self.0.to_be_bytes());
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 4)?;
        Ok(Self(read_u32(data, 0)))
    }
}

/// Octets forwarded through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateUsageInfo(pub u64);

impl GateUsageInfo {
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_subobj(buf, SNum::GateUsageInfo, 1, &self.0.to_be_bytes());
    }

    pub fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 8)?;
        Ok(Self(
            ((read_u32(data, 0) as u64) << 32) | read_u32(data, 4) as u64,
        ))
    }
}

/// Default PCMM multimedia major version
pub const MM_MAJOR_VERSION: u16 = 5;
/// Default PCMM multimedia minor version
pub const MM_MINOR_VERSION: u16 = 0;

/// Multimedia version info exchanged in the Client-Open ClientSI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmVersionInfo {
    pub major: u16,
    pub minor: u16,
}

impl Default for MmVersionInfo {
    fn default() -> Self {
        Self {
            major: MM_MAJOR_VERSION,
            minor: MM_MINOR_VERSION,
        }
    }
}

impl MmVersionInfo {
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&self.major.to_be_bytes());
        payload[2..].copy_from_slice(&self.minor.to_be_bytes());
        encode_subobj(buf, SNum::VersionInfo, 1, &payload);
    }

    /// Parse from a full sub-object byte stream (header included), as the
    /// Client-Open ClientSI delivers it.
    pub fn parse_subobj(data: &[u8]) -> GateResult<Self> {
        need(data, 8)?;
        Ok(Self {
            major: read_u16(data, 4),
            minor: read_u16(data, 6),
        })
    }

    /// Serialize as a full sub-object byte stream for a ClientSI payload.
    pub fn to_bytes(self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(8);
        self.encode(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(buf: &BytesMut) -> &[u8] {
        &buf[4..]
    }

    #[test]
    fn test_transaction_id_roundtrip() {
        let trid = TransactionId::new(0xBEEF, GateCommand::GateSetAck);
        let mut buf = BytesMut::new();
        trid.encode(&mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf[2], 1); // S-Num
        assert_eq!(TransactionId::parse(body(&buf)).unwrap(), trid);
    }

    #[test]
    fn test_transaction_id_rejects_unknown_command() {
        assert!(matches!(
            TransactionId::parse(&[0, 1, 0, 13]),
            Err(GateError::UnknownGateCommand(13))
        ));
    }

    #[test]
    fn test_amid_roundtrip() {
        let amid = Amid::new(u16::MAX, 0);
        let mut buf = BytesMut::new();
        amid.encode(&mut buf);
        assert_eq!(Amid::parse(body(&buf)).unwrap(), amid);
    }

    #[test]
    fn test_subscriber_id_v4_and_v6() {
        let v4 = SubscriberId::from(Ipv4Addr::new(10, 0, 0, 5));
        let mut buf = BytesMut::new();
        v4.encode(&mut buf);
        assert_eq!(buf[3], 1); // S-Type
        assert_eq!(SubscriberId::parse(1, body(&buf)).unwrap(), v4);

        let v6 = SubscriberId::from(Ipv6Addr::LOCALHOST);
        let mut buf = BytesMut::new();
        v6.encode(&mut buf);
        assert_eq!(buf[3], 2);
        assert_eq!(SubscriberId::parse(2, body(&buf)).unwrap(), v6);
    }

    #[test]
    fn test_gate_id_roundtrip() {
        let gid = GateId(0xFFFF_FFFF);
        let mut buf = BytesMut::new();
        gid.encode(&mut buf);
        assert_eq!(GateId::parse(body(&buf)).unwrap(), gid);
    }

    #[test]
    fn test_gate_spec_flag_or_semantics() {
        // Direction then DSCP overwrite
        let mut a = GateSpec::new();
        a.set_direction(Direction::Upstream);
        a.set_dscp_overwrite(0x2E, 0xFF);

        // DSCP overwrite then direction
        let mut b = GateSpec::new();
        b.set_dscp_overwrite(0x2E, 0xFF);
        b.set_direction(Direction::Upstream);

        assert_eq!(a.flags(), 0x03);
        assert_eq!(a.flags(), b.flags());
        assert_eq!(a.direction(), Direction::Upstream);
        assert!(a.dscp_overwrite_enabled());
    }

    #[test]
    fn test_gate_spec_roundtrip() {
        let mut spec = GateSpec::new();
        spec.set_direction(Direction::Upstream);
        spec.set_dscp_overwrite(0x10, 0xFC);
        spec.session_class_id = 1;
        spec.timer_t1 = 300;
        spec.timer_t4 = u16::MAX;

        let mut buf = BytesMut::new();
        spec.encode(&mut buf);
        assert_eq!(buf.len(), 16);
        assert_eq!(GateSpec::parse(body(&buf)).unwrap(), spec);
    }

    #[test]
    fn test_pcmm_error_roundtrip() {
        let err = PcmmError::new(PcmmErrorCode::MissingRequiredObject);
        let mut buf = BytesMut::new();
        err.encode(&mut buf);
        assert_eq!(PcmmError::parse(body(&buf)).unwrap(), err);
        assert!(err.to_string().contains("Missing Required Object"));
    }

    #[test]
    fn test_gate_state_roundtrip() {
        let state = GateState::new(GateStateType::Committed, 0);
        let mut buf = BytesMut::new();
        state.encode(&mut buf);
        assert_eq!(GateState::parse(body(&buf)).unwrap(), state);
    }

    #[test]
    fn test_gate_usage_info_boundaries() {
        for v in [0u64, 1, u64::MAX] {
            let usage = GateUsageInfo(v);
            let mut buf = BytesMut::new();
            usage.encode(&mut buf);
            assert_eq!(GateUsageInfo::parse(body(&buf)).unwrap(), usage);
        }
    }

    #[test]
    fn test_mm_version_info_subobj_roundtrip() {
        let info = MmVersionInfo::default();
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), 8);
        let parsed = MmVersionInfo::parse_subobj(&bytes).unwrap();
        assert_eq!(parsed.major, MM_MAJOR_VERSION);
        assert_eq!(parsed.minor, MM_MINOR_VERSION);
    }
}
