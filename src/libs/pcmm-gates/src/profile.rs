//! Traffic profiles
//!
//! Exactly one traffic profile is present in a gate request. All variants
//! except Service Class Name carry up to three nested envelopes of
//! identical layout (Authorized, Reserved, Committed); Reserved and
//! Committed are optional, but a Committed envelope without a Reserved one
//! is rejected at construction. The envelope discriminator byte is a
//! presence bitmask (bit 0 authorized, bit 1 reserved, bit 2 committed).
//!
//! The DOCSIS Flow Spec variant encodes its rate fields as big-endian
//! IEEE-754 f32 values carrying integral magnitudes; decode rounds back to
//! the nearest integer. This is a wire-compatibility requirement of
//! deployed CMTS firmware, not a representation choice.

use bytes::{BufMut, BytesMut};

use crate::error::{GateError, GateResult};
use crate::subobj::{encode_subobj, SNum};

/// Default maximum traffic burst for best-effort envelopes
pub const DEFAULT_MAX_TRAFFIC_BURST: u32 = 3044;

const ENV_AUTHORIZED: u8 = 0x1;
const ENV_RESERVED: u8 = 0x2;
const ENV_COMMITTED: u8 = 0x4;

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

/// Read an integral value stored as a big-endian f32
fn read_f32_int(data: &[u8], at: usize) -> u32 {
    f32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]).round() as u32
}

fn envelope_mask(reserved: bool, committed: bool) -> u8 {
    let mut mask = ENV_AUTHORIZED;
    if reserved {
        mask |= ENV_RESERVED;
    }
    if committed {
        mask |= ENV_COMMITTED;
    }
    mask
}

/// Generic three-envelope layout shared by the envelope-bearing profiles
macro_rules! envelopes {
    ($profile:ident, $envelope:ty, $env_len:expr) => {
        impl $profile {
            pub fn new(
                authorized: $envelope,
                reserved: Option<$envelope>,
                committed: Option<$envelope>,
            ) -> GateResult<Self> {
                if reserved.is_none() && committed.is_some() {
                    return Err(GateError::CommittedWithoutReserved);
                }
                Ok(Self {
                    authorized,
                    reserved,
                    committed,
                })
            }

            pub fn authorized(&self) -> &$envelope {
                &self.authorized
            }

            pub fn reserved(&self) -> Option<&$envelope> {
                self.reserved.as_ref()
            }

            pub fn committed(&self) -> Option<&$envelope> {
                self.committed.as_ref()
            }

            fn parse_envelopes(data: &[u8]) -> GateResult<Self> {
                need(data, 4 + $env_len)?;
                let authorized = <$envelope>::parse(&data[4..4 + $env_len])?;
                let reserved = if data.len() >= 4 + 2 * $env_len {
                    Some(<$envelope>::parse(&data[4 + $env_len..4 + 2 * $env_len])?)
                } else {
                    None
                };
                let committed = if data.len() >= 4 + 3 * $env_len {
                    Some(<$envelope>::parse(
                        &data[4 + 2 * $env_len..4 + 3 * $env_len],
                    )?)
                } else {
                    None
                };
                Self::new(authorized, reserved, committed)
            }
        }
    };
}

/// One DOCSIS Flow Spec envelope. The integral rate fields ride as f32 on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowSpecEnvelope {
    pub token_bucket_rate: u32,
    pub token_bucket_size: u32,
    pub peak_data_rate: u32,
    pub min_policed_unit: u32,
    pub max_packet_size: u32,
    pub rate: u32,
    pub slack_term: u32,
}

impl FlowSpecEnvelope {
    const LEN: usize = 28;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_f32(self.token_bucket_rate as f32);
        buf.put_f32(self.token_bucket_size as f32);
        buf.put_f32(self.peak_data_rate as f32);
        buf.put_u32(self.min_policed_unit);
        buf.put_u32(self.max_packet_size);
        buf.put_f32(self.rate as f32);
        buf.put_u32(self.slack_term);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, Self::LEN)?;
        Ok(Self {
            token_bucket_rate: read_f32_int(data, 0),
            token_bucket_size: read_f32_int(data, 4),
            peak_data_rate: read_f32_int(data, 8),
            min_policed_unit: read_u32(data, 12),
            max_packet_size: read_u32(data, 16),
            rate: read_f32_int(data, 20),
            slack_term: read_u32(data, 24),
        })
    }
}

/// DOCSIS Flow Spec traffic profile (S-Type 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSpecProfile {
    authorized: FlowSpecEnvelope,
    reserved: Option<FlowSpecEnvelope>,
    committed: Option<FlowSpecEnvelope>,
}

envelopes!(FlowSpecProfile, FlowSpecEnvelope, FlowSpecEnvelope::LEN);

const FLOW_SPEC_SERVICE_NUMBER: u8 = 2;

impl FlowSpecProfile {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(envelope_mask(
            self.reserved.is_some(),
            self.committed.is_some(),
        ));
        buf.put_u8(FLOW_SPEC_SERVICE_NUMBER);
        buf.put_bytes(0, 2);
        self.authorized.encode(buf);
        if let Some(reserved) = &self.reserved {
            reserved.encode(buf);
        }
        if let Some(committed) = &self.committed {
            committed.encode(buf);
        }
    }
}

/// DOCSIS Service Class Name traffic profile (S-Type 2): a 2..=16
/// character ASCII name, NUL-padded on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceClassNameProfile {
    name: String,
    envelope: u8,
}

impl ServiceClassNameProfile {
    pub fn new(name: impl Into<String>) -> GateResult<Self> {
        let name = name.into();
        if name.len() < 2 || name.len() > 16 {
            return Err(GateError::InvalidServiceClassName(name.len()));
        }
        Ok(Self {
            name,
            envelope: ENV_AUTHORIZED | ENV_RESERVED | ENV_COMMITTED,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.envelope);
        buf.put_bytes(0, 3);
        buf.put_slice(self.name.as_bytes());
        let pad = (4 - self.name.len() % 4) % 4;
        buf.put_bytes(0, pad);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 5)?;
        let end = data[4..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| p + 4)
            .unwrap_or(data.len());
        let name = String::from_utf8_lossy(&data[4..end]).to_string();
        if name.len() < 2 || name.len() > 16 {
            return Err(GateError::InvalidServiceClassName(name.len()));
        }
        Ok(Self {
            name,
            envelope: data[0],
        })
    }
}

/// One best-effort envelope (52 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestEffortEnvelope {
    pub traffic_priority: u8,
    pub transmission_policy: u32,
    pub max_sustained_rate: u32,
    pub max_traffic_burst: u32,
    pub min_reserved_rate: u32,
    pub assumed_min_concat_burst: u16,
    pub max_concat_burst: u16,
    pub up_peak_rate: u32,
    pub required_attr_mask: u32,
    pub forbidden_attr_mask: u32,
    pub attr_aggregation_mask: u32,
    pub min_buffer: u32,
    pub target_buffer: u32,
    pub max_buffer: u32,
}

impl Default for BestEffortEnvelope {
    fn default() -> Self {
        Self {
            traffic_priority: 0,
            transmission_policy: 0,
            max_sustained_rate: 0,
            max_traffic_burst: DEFAULT_MAX_TRAFFIC_BURST,
            min_reserved_rate: 0,
            assumed_min_concat_burst: 0,
            max_concat_burst: 0,
            up_peak_rate: 0,
            required_attr_mask: 0,
            forbidden_attr_mask: 0,
            attr_aggregation_mask: 0,
            min_buffer: 0,
            target_buffer: 0,
            max_buffer: 0,
        }
    }
}

impl BestEffortEnvelope {
    const LEN: usize = 52;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.traffic_priority);
        buf.put_bytes(0, 3);
        buf.put_u32(self.transmission_policy);
        buf.put_u32(self.max_sustained_rate);
        buf.put_u32(self.max_traffic_burst);
        buf.put_u32(self.min_reserved_rate);
        buf.put_u16(self.assumed_min_concat_burst);
        buf.put_u16(self.max_concat_burst);
        buf.put_u32(self.up_peak_rate);
        buf.put_u32(self.required_attr_mask);
        buf.put_u32(self.forbidden_attr_mask);
        buf.put_u32(self.attr_aggregation_mask);
        buf.put_u32(self.min_buffer);
        buf.put_u32(self.target_buffer);
        buf.put_u32(self.max_buffer);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, Self::LEN)?;
        Ok(Self {
            traffic_priority: data[0],
            transmission_policy: read_u32(data, 4),
            max_sustained_rate: read_u32(data, 8),
            max_traffic_burst: read_u32(data, 12),
            min_reserved_rate: read_u32(data, 16),
            assumed_min_concat_burst: read_u16(data, 20),
            max_concat_burst: read_u16(data, 22),
            up_peak_rate: read_u32(data, 24),
            required_attr_mask: read_u32(data, 28),
            forbidden_attr_mask: read_u32(data, 32),
            attr_aggregation_mask: read_u32(data, 36),
            min_buffer: read_u32(data, 40),
            target_buffer: read_u32(data, 44),
            max_buffer: read_u32(data, 48),
        })
    }
}

/// Best Effort traffic profile (S-Type 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestEffortProfile {
    authorized: BestEffortEnvelope,
    reserved: Option<BestEffortEnvelope>,
    committed: Option<BestEffortEnvelope>,
}

envelopes!(BestEffortProfile, BestEffortEnvelope, BestEffortEnvelope::LEN);

impl BestEffortProfile {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(envelope_mask(
            self.reserved.is_some(),
            self.committed.is_some(),
        ));
        buf.put_bytes(0, 3);
        self.authorized.encode(buf);
        if let Some(reserved) = &self.reserved {
            reserved.encode(buf);
        }
        if let Some(committed) = &self.committed {
            committed.encode(buf);
        }
    }
}

/// One DOCSIS RTP envelope (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpEnvelope {
    pub transmission_policy: u32,
    pub max_sustained_rate: u32,
    pub max_traffic_burst: u32,
    pub min_reserved_rate: u32,
    pub amrtr_packet_size: u16,
    pub max_concat_burst: u16,
    pub nominal_polling_interval: u32,
    pub tolerated_poll_jitter: u32,
    pub required_attr_mask: u32,
    pub forbidden_attr_mask: u32,
    pub attr_aggregation_mask: u32,
}

impl RtpEnvelope {
    const LEN: usize = 40;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.transmission_policy);
        buf.put_u32(self.max_sustained_rate);
        buf.put_u32(self.max_traffic_burst);
        buf.put_u32(self.min_reserved_rate);
        buf.put_u16(self.amrtr_packet_size);
        buf.put_u16(self.max_concat_burst);
        buf.put_u32(self.nominal_polling_interval);
        buf.put_u32(self.tolerated_poll_jitter);
        buf.put_u32(self.required_attr_mask);
        buf.put_u32(self.forbidden_attr_mask);
        buf.put_u32(self.attr_aggregation_mask);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, Self::LEN)?;
        Ok(Self {
            transmission_policy: read_u32(data, 0),
            max_sustained_rate: read_u32(data, 4),
            max_traffic_burst: read_u32(data, 8),
            min_reserved_rate: read_u32(data, 12),
            amrtr_packet_size: read_u16(data, 16),
            max_concat_burst: read_u16(data, 18),
            nominal_polling_interval: read_u32(data, 20),
            tolerated_poll_jitter: read_u32(data, 24),
            required_attr_mask: read_u32(data, 28),
            forbidden_attr_mask: read_u32(data, 32),
            attr_aggregation_mask: read_u32(data, 36),
        })
    }
}

/// DOCSIS RTP traffic profile (S-Type 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpProfile {
    authorized: RtpEnvelope,
    reserved: Option<RtpEnvelope>,
    committed: Option<RtpEnvelope>,
}

envelopes!(RtpProfile, RtpEnvelope, RtpEnvelope::LEN);

impl RtpProfile {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(envelope_mask(
            self.reserved.is_some(),
            self.committed.is_some(),
        ));
        buf.put_bytes(0, 3);
        self.authorized.encode(buf);
        if let Some(reserved) = &self.reserved {
            reserved.encode(buf);
        }
        if let Some(committed) = &self.committed {
            committed.encode(buf);
        }
    }
}

/// One DOCSIS Unsolicited Grant Service envelope (28 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UgsEnvelope {
    pub transmission_policy: u32,
    pub grant_size: u16,
    pub grants_per_interval: u8,
    pub nominal_grant_interval: u32,
    pub tolerated_grant_jitter: u32,
    pub required_attr_mask: u32,
    pub forbidden_attr_mask: u32,
    pub attr_aggregation_mask: u32,
}

impl UgsEnvelope {
    const LEN: usize = 28;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.transmission_policy);
        buf.put_u16(self.grant_size);
        buf.put_u8(self.grants_per_interval);
        buf.put_u8(0);
        buf.put_u32(self.nominal_grant_interval);
        buf.put_u32(self.tolerated_grant_jitter);
        buf.put_u32(self.required_attr_mask);
        buf.put_u32(self.forbidden_attr_mask);
        buf.put_u32(self.attr_aggregation_mask);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, Self::LEN)?;
        Ok(Self {
            transmission_policy: read_u32(data, 0),
            grant_size: read_u16(data, 4),
            grants_per_interval: data[6],
            nominal_grant_interval: read_u32(data, 8),
            tolerated_grant_jitter: read_u32(data, 12),
            required_attr_mask: read_u32(data, 16),
            forbidden_attr_mask: read_u32(data, 20),
            attr_aggregation_mask: read_u32(data, 24),
        })
    }
}

/// DOCSIS Unsolicited Grant Service traffic profile (S-Type 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UgsProfile {
    authorized: UgsEnvelope,
    reserved: Option<UgsEnvelope>,
    committed: Option<UgsEnvelope>,
}

envelopes!(UgsProfile, UgsEnvelope, UgsEnvelope::LEN);

impl UgsProfile {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(envelope_mask(
            self.reserved.is_some(),
            self.committed.is_some(),
        ));
        buf.put_bytes(0, 3);
        self.authorized.encode(buf);
        if let Some(reserved) = &self.reserved {
            reserved.encode(buf);
        }
        if let Some(committed) = &self.committed {
            committed.encode(buf);
        }
    }
}

/// A gate traffic profile; exactly one per gate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficProfile {
    FlowSpec(FlowSpecProfile),
    ServiceClassName(ServiceClassNameProfile),
    BestEffort(BestEffortProfile),
    Rtp(RtpProfile),
    Ugs(UgsProfile),
}

impl TrafficProfile {
    pub fn s_type(&self) -> u8 {
        match self {
            Self::FlowSpec(_) => 1,
            Self::ServiceClassName(_) => 2,
            Self::BestEffort(_) => 3,
            Self::Rtp(_) => 5,
            Self::Ugs(_) => 6,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        match self {
            Self::FlowSpec(p) => p.encode_body(&mut body),
            Self::ServiceClassName(p) => p.encode_body(&mut body),
            Self::BestEffort(p) => p.encode_body(&mut body),
            Self::Rtp(p) => p.encode_body(&mut body),
            Self::Ugs(p) => p.encode_body(&mut body),
        }
        encode_subobj(buf, SNum::TrafficProfile, self.s_type(), &body);
    }

    pub fn parse(s_type: u8, data: &[u8]) -> GateResult<Self> {
        match s_type {
            1 => FlowSpecProfile::parse_envelopes(data).map(Self::FlowSpec),
            2 => ServiceClassNameProfile::parse(data).map(Self::ServiceClassName),
            3 => BestEffortProfile::parse_envelopes(data).map(Self::BestEffort),
            5 => RtpProfile::parse_envelopes(data).map(Self::Rtp),
            6 => UgsProfile::parse_envelopes(data).map(Self::Ugs),
            _ => Err(GateError::UnknownSType {
                s_num: SNum::TrafficProfile as u8,
                s_type,
            }),
        }
    }
}
