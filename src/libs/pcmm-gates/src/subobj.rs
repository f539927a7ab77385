//! PCMM Sub-Object Header
//!
//! Every gate sub-object carries a 4-byte header:
//!
//! ```text
//!  0              1              2              3
//! +--------------+--------------+--------------+--------------+
//! |           Length             |    S-Num    |    S-Type    |
//! +--------------+--------------+--------------+--------------+
//! ```
//!
//! The stored length is self-inclusive (header plus payload) and, unlike
//! the outer COPS object layer, counts the zero padding that aligns the
//! payload to a 4-byte boundary.

use bytes::{BufMut, BytesMut};

use crate::error::{GateError, GateResult};

/// Sub-object header length (4 bytes)
pub const SUBOBJ_HEADER_LEN: usize = 4;

/// Gate sub-object type numbers (PacketCable Multimedia I05 Table 6-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SNum {
    TransactionId = 1,
    Amid = 2,
    SubscriberId = 3,
    GateId = 4,
    GateSpec = 5,
    Classifiers = 6,
    TrafficProfile = 7,
    EventGenInfo = 8,
    VolumeUsageLimit = 9,
    TimeUsageLimit = 10,
    OpaqueData = 11,
    GateTimeInfo = 12,
    GateUsageInfo = 13,
    PcmmError = 14,
    GateState = 15,
    VersionInfo = 16,
    Psid = 17,
    SyncOptions = 18,
    MsgReceiptKey = 19,
    UserId = 20,
    SharedResourceId = 21,
}

impl SNum {
    /// Map a wire value; `None` for numbers outside the table so callers
    /// can skip unknown sub-objects instead of failing.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::TransactionId),
            2 => Some(Self::Amid),
            3 => Some(Self::SubscriberId),
            4 => Some(Self::GateId),
            5 => Some(Self::GateSpec),
            6 => Some(Self::Classifiers),
            7 => Some(Self::TrafficProfile),
            8 => Some(Self::EventGenInfo),
            9 => Some(Self::VolumeUsageLimit),
            10 => Some(Self::TimeUsageLimit),
            11 => Some(Self::OpaqueData),
            12 => Some(Self::GateTimeInfo),
            13 => Some(Self::GateUsageInfo),
            14 => Some(Self::PcmmError),
            15 => Some(Self::GateState),
            16 => Some(Self::VersionInfo),
            17 => Some(Self::Psid),
            18 => Some(Self::SyncOptions),
            19 => Some(Self::MsgReceiptKey),
            20 => Some(Self::UserId),
            21 => Some(Self::SharedResourceId),
            _ => None,
        }
    }
}

/// Decoded sub-object header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubObjHeader {
    /// Self-inclusive length, padding counted
    pub length: u16,
    pub s_num: u8,
    pub s_type: u8,
}

impl SubObjHeader {
    /// Read a header from the start of `data`
    pub fn read(data: &[u8]) -> GateResult<Self> {
        if data.len() < SUBOBJ_HEADER_LEN {
            return Err(GateError::BufferTooShort {
                needed: SUBOBJ_HEADER_LEN,
                available: data.len(),
            });
        }
        let length = u16::from_be_bytes([data[0], data[1]]);
        if (length as usize) < SUBOBJ_HEADER_LEN {
            return Err(GateError::InvalidLength(length));
        }
        Ok(Self {
            length,
            s_num: data[2],
            s_type: data[3],
        })
    }
}

/// Write one sub-object: header with padded self-inclusive length, the
/// payload, then zero padding to the next 4-byte boundary.
pub(crate) fn encode_subobj(buf: &mut BytesMut, s_num: SNum, s_type: u8, payload: &[u8]) {
    let pad = (4 - payload.len() % 4) % 4;
    let length = (SUBOBJ_HEADER_LEN + payload.len() + pad) as u16;
    buf.put_u16(length);
    buf.put_u8(s_num as u8);
    buf.put_u8(s_type);
    buf.put_slice(payload);
    buf.put_bytes(0, pad);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subobj_header_read() {
        let data = [0u8, 8, 1, 1, 0, 1, 0, 4];
        let hdr = SubObjHeader::read(&data).unwrap();
        assert_eq!(hdr.length, 8);
        assert_eq!(hdr.s_num, 1);
        assert_eq!(hdr.s_type, 1);
    }

    #[test]
    fn test_subobj_header_rejects_short_length() {
        let data = [0u8, 2, 1, 1];
        assert!(matches!(
            SubObjHeader::read(&data),
            Err(GateError::InvalidLength(2))
        ));
    }

    #[test]
    fn test_encode_pads_and_counts_padding() {
        let mut buf = BytesMut::new();
        encode_subobj(&mut buf, SNum::OpaqueData, 1, &[0xAB; 5]);
        // 4 header + 5 payload + 3 pad, padding counted in the length
        assert_eq!(buf.len(), 12);
        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]), 12);
        assert_eq!(&buf[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_snum_table() {
        assert_eq!(SNum::from_value(1), Some(SNum::TransactionId));
        assert_eq!(SNum::from_value(21), Some(SNum::SharedResourceId));
        assert_eq!(SNum::from_value(22), None);
        assert_eq!(SNum::from_value(0), None);
    }
}
