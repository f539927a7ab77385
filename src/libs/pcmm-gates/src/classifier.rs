//! Gate classifiers
//!
//! Exactly one classifier is present in a gate request; the variant is
//! determined solely by the S-Type supplied by the caller. Layouts follow
//! PacketCable Multimedia I05 Section 6.4.3.

use bytes::{BufMut, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

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

fn read_v4(data: &[u8], at: usize) -> Ipv4Addr {
    Ipv4Addr::new(data[at], data[at + 1], data[at + 2], data[at + 3])
}

fn read_v6(data: &[u8], at: usize) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&data[at..at + 16]);
    Ipv6Addr::from(octets)
}

/// IP protocols a classifier can match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Protocol {
    None = 0,
    Icmp = 1,
    Igmp = 2,
    Tcp = 6,
    Udp = 17,
}

impl TryFrom<u16> for Protocol {
    type Error = GateError;

    fn try_from(value: u16) -> Result<Self, GateError> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Icmp),
            2 => Ok(Self::Igmp),
            6 => Ok(Self::Tcp),
            17 => Ok(Self::Udp),
            _ => Err(GateError::UnknownProtocol(value)),
        }
    }
}

/// Classifier activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivationState {
    Inactive = 0,
    Active = 1,
}

impl TryFrom<u8> for ActivationState {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, GateError> {
        match value {
            0 => Ok(Self::Inactive),
            1 => Ok(Self::Active),
            _ => Err(GateError::UnknownActivationState(value)),
        }
    }
}

/// IPv6 flow-label match flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlowLabelFlag {
    Irrelevant = 0,
    Valid = 1,
}

impl TryFrom<u8> for FlowLabelFlag {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, GateError> {
        match value {
            0 => Ok(Self::Irrelevant),
            1 => Ok(Self::Valid),
            _ => Err(GateError::UnknownFlowLabelFlag(value)),
        }
    }
}

/// Legacy classifier (S-Type 1): single ports, no masks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyClassifier {
    pub protocol: Protocol,
    pub dscp_tos: u8,
    pub dscp_tos_mask: u8,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub priority: u8,
}

impl LegacyClassifier {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.protocol as u16);
        buf.put_u8(self.dscp_tos);
        buf.put_u8(self.dscp_tos_mask);
        buf.put_slice(&self.src_addr.octets());
        buf.put_slice(&self.dst_addr.octets());
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u8(self.priority);
        buf.put_bytes(0, 3);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 17)?;
        Ok(Self {
            protocol: Protocol::try_from(read_u16(data, 0))?,
            dscp_tos: data[2],
            dscp_tos_mask: data[3],
            src_addr: read_v4(data, 4),
            dst_addr: read_v4(data, 8),
            src_port: read_u16(data, 12),
            dst_port: read_u16(data, 14),
            priority: data[16],
        })
    }
}

/// Extended classifier (S-Type 2): port ranges, address masks, classifier
/// id, activation state and action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedClassifier {
    pub protocol: Protocol,
    pub dscp_tos: u8,
    pub dscp_tos_mask: u8,
    pub src_addr: Ipv4Addr,
    pub src_mask: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub dst_mask: Ipv4Addr,
    pub src_port_start: u16,
    pub src_port_end: u16,
    pub dst_port_start: u16,
    pub dst_port_end: u16,
    pub classifier_id: u16,
    pub priority: u8,
    pub activation_state: ActivationState,
    pub action: u8,
}

impl ExtendedClassifier {
    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.protocol as u16);
        buf.put_u8(self.dscp_tos);
        buf.put_u8(self.dscp_tos_mask);
        buf.put_slice(&self.src_addr.octets());
        buf.put_slice(&self.src_mask.octets());
        buf.put_slice(&self.dst_addr.octets());
        buf.put_slice(&self.dst_mask.octets());
        buf.put_u16(self.src_port_start);
        buf.put_u16(self.src_port_end);
        buf.put_u16(self.dst_port_start);
        buf.put_u16(self.dst_port_end);
        buf.put_u16(self.classifier_id);
        buf.put_u8(self.priority);
        buf.put_u8(self.activation_state as u8);
        buf.put_u8(self.action);
        buf.put_bytes(0, 3);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 33)?;
        Ok(Self {
            protocol: Protocol::try_from(read_u16(data, 0))?,
            dscp_tos: data[2],
            dscp_tos_mask: data[3],
            src_addr: read_v4(data, 4),
            src_mask: read_v4(data, 8),
            dst_addr: read_v4(data, 12),
            dst_mask: read_v4(data, 16),
            src_port_start: read_u16(data, 20),
            src_port_end: read_u16(data, 22),
            dst_port_start: read_u16(data, 24),
            dst_port_end: read_u16(data, 26),
            classifier_id: read_u16(data, 28),
            priority: data[30],
            activation_state: ActivationState::try_from(data[31])?,
            action: data[32],
        })
    }
}

/// IPv6 classifier (S-Type 3): flow label, traffic class range, prefix
/// lengths and IPv6 addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Classifier {
    pub flow_label_flag: FlowLabelFlag,
    pub tc_low: u8,
    pub tc_high: u8,
    pub tc_mask: u8,
    flow_label: u32,
    pub next_header: u16,
    pub src_prefix_len: u8,
    pub dst_prefix_len: u8,
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub src_port_start: u16,
    pub src_port_end: u16,
    pub dst_port_start: u16,
    pub dst_port_end: u16,
    pub classifier_id: u16,
    pub priority: u8,
    pub activation_state: ActivationState,
    pub action: u8,
}

impl Ipv6Classifier {
    /// An irrelevant flow-label flag forces the stored label to zero
    pub fn new(
        flow_label_flag: FlowLabelFlag,
        flow_label: u32,
        src_addr: Ipv6Addr,
        dst_addr: Ipv6Addr,
    ) -> Self {
        Self {
            flow_label_flag,
            tc_low: 0,
            tc_high: 0,
            tc_mask: 0,
            flow_label: match flow_label_flag {
                FlowLabelFlag::Irrelevant => 0,
                FlowLabelFlag::Valid => flow_label,
            },
            next_header: 0,
            src_prefix_len: 128,
            dst_prefix_len: 128,
            src_addr,
            dst_addr,
            src_port_start: 0,
            src_port_end: 0,
            dst_port_start: 0,
            dst_port_end: 0,
            classifier_id: 0,
            priority: 0,
            activation_state: ActivationState::Active,
            action: 0,
        }
    }

    pub fn flow_label(&self) -> u32 {
        self.flow_label
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flow_label_flag as u8);
        buf.put_u8(self.tc_low);
        buf.put_u8(self.tc_high);
        buf.put_u8(self.tc_mask);
        buf.put_u32(self.flow_label);
        buf.put_u16(self.next_header);
        buf.put_u8(self.src_prefix_len);
        buf.put_u8(self.dst_prefix_len);
        buf.put_slice(&self.src_addr.octets());
        buf.put_slice(&self.dst_addr.octets());
        buf.put_u16(self.src_port_start);
        buf.put_u16(self.src_port_end);
        buf.put_u16(self.dst_port_start);
        buf.put_u16(self.dst_port_end);
        buf.put_u16(self.classifier_id);
        buf.put_u8(self.priority);
        buf.put_u8(self.activation_state as u8);
        buf.put_u8(self.action);
    }

    fn parse(data: &[u8]) -> GateResult<Self> {
        need(data, 57)?;
        let flow_label_flag = FlowLabelFlag::try_from(data[0])?;
        let flow_label = read_u32(data, 4);
        Ok(Self {
            flow_label_flag,
            tc_low: data[1],
            tc_high: data[2],
            tc_mask: data[3],
            flow_label: match flow_label_flag {
                FlowLabelFlag::Irrelevant => 0,
                FlowLabelFlag::Valid => flow_label,
            },
            next_header: read_u16(data, 8),
            src_prefix_len: data[10],
            dst_prefix_len: data[11],
            src_addr: read_v6(data, 12),
            dst_addr: read_v6(data, 28),
            src_port_start: read_u16(data, 44),
            src_port_end: read_u16(data, 46),
            dst_port_start: read_u16(data, 48),
            dst_port_end: read_u16(data, 50),
            classifier_id: read_u16(data, 52),
            priority: data[54],
            activation_state: ActivationState::try_from(data[55])?,
            action: data[56],
        })
    }
}

/// A gate classifier; exactly one variant per gate request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classifier {
    Legacy(LegacyClassifier),
    Extended(ExtendedClassifier),
    Ipv6(Ipv6Classifier),
}

impl Classifier {
    pub fn s_type(&self) -> u8 {
        match self {
            Self::Legacy(_) => 1,
            Self::Extended(_) => 2,
            Self::Ipv6(_) => 3,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        match self {
            Self::Legacy(c) => c.encode_body(&mut body),
            Self::Extended(c) => c.encode_body(&mut body),
            Self::Ipv6(c) => c.encode_body(&mut body),
        }
        encode_subobj(buf, SNum::Classifiers, self.s_type(), &body);
    }

    pub fn parse(s_type: u8, data: &[u8]) -> GateResult<Self> {
        match s_type {
            1 => LegacyClassifier::parse(data).map(Self::Legacy),
            2 => ExtendedClassifier::parse(data).map(Self::Extended),
            3 => Ipv6Classifier::parse(data).map(Self::Ipv6),
            _ => Err(GateError::UnknownSType {
                s_num: SNum::Classifiers as u8,
                s_type,
            }),
        }
    }
}
