use byteorder::{ByteOrder, LittleEndian};
use strum_macros::{Display, FromRepr};

use crate::error::{ensure_len, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum FrameType {
    Management = 0,
    Control = 1,
    Data = 2,
    Reserved = 3,
}

/// Subtype numbers this crate knows about, per frame type.
pub mod subtype {
    pub const ASSOCIATION_REQUEST: u8 = 0;
    pub const ASSOCIATION_RESPONSE: u8 = 1;
    pub const REASSOCIATION_REQUEST: u8 = 2;
    pub const REASSOCIATION_RESPONSE: u8 = 3;
    pub const PROBE_REQUEST: u8 = 4;
    pub const PROBE_RESPONSE: u8 = 5;
    pub const BEACON: u8 = 8;
    pub const ATIM: u8 = 9;
    pub const DISASSOCIATION: u8 = 10;
    pub const AUTHENTICATION: u8 = 11;
    pub const DEAUTHENTICATION: u8 = 12;
    pub const ACTION: u8 = 13;
}

const FLAG_TO_DS: u8 = 0x01;
const FLAG_FROM_DS: u8 = 0x02;
const FLAG_MORE_FRAG: u8 = 0x04;
const FLAG_RETRY: u8 = 0x08;
const FLAG_POWER_MANAGEMENT: u8 = 0x10;
const FLAG_MORE_DATA: u8 = 0x20;
const FLAG_PROTECTED: u8 = 0x40;
const FLAG_ORDER: u8 = 0x80;

/// The two leading bytes of every 802.11 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    protocol: u8,
    frame_type: FrameType,
    subtype: u8,
    flags: u8,
}

impl FrameControl {
    pub const LEN: usize = 2;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("frame control", data, Self::LEN)?;
        let raw = LittleEndian::read_u16(&data[..Self::LEN]);

        let frame_type =
            FrameType::from_repr(((raw & 0x000c) >> 2) as u8).unwrap_or(FrameType::Reserved);
        Ok(FrameControl {
            protocol: (raw & 0x0003) as u8,
            frame_type,
            subtype: ((raw & 0x00f0) >> 4) as u8,
            flags: ((raw & 0xff00) >> 8) as u8,
        })
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    /// Raw flag octet (bits 8..16 of the field).
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn to_ds(&self) -> bool {
        self.flags & FLAG_TO_DS != 0
    }

    pub fn from_ds(&self) -> bool {
        self.flags & FLAG_FROM_DS != 0
    }

    pub fn more_frag(&self) -> bool {
        self.flags & FLAG_MORE_FRAG != 0
    }

    pub fn retry(&self) -> bool {
        self.flags & FLAG_RETRY != 0
    }

    pub fn power_management(&self) -> bool {
        self.flags & FLAG_POWER_MANAGEMENT != 0
    }

    pub fn more_data(&self) -> bool {
        self.flags & FLAG_MORE_DATA != 0
    }

    pub fn protected(&self) -> bool {
        self.flags & FLAG_PROTECTED != 0
    }

    pub fn order(&self) -> bool {
        self.flags & FLAG_ORDER != 0
    }

    /// Human readable subtype, used for logging frames we don't decode.
    pub fn subtype_name(&self) -> Option<&'static str> {
        let name = match (self.frame_type, self.subtype) {
            (FrameType::Management, 0) => "Association Request",
            (FrameType::Management, 1) => "Association Response",
            (FrameType::Management, 2) => "Reassociation Request",
            (FrameType::Management, 3) => "Reassociation Response",
            (FrameType::Management, 4) => "Probe Request",
            (FrameType::Management, 5) => "Probe Response",
            (FrameType::Management, 8) => "Beacon",
            (FrameType::Management, 9) => "Announcement Traffic Indication Message",
            (FrameType::Management, 10) => "Disassociation",
            (FrameType::Management, 11) => "Authentication",
            (FrameType::Management, 12) => "Deauthentication",
            (FrameType::Management, 13) => "Action",
            (FrameType::Control, 8) => "Block Acknowledgment Request",
            (FrameType::Control, 9) => "Block Acknowledgment",
            (FrameType::Control, 10) => "Power Save-Poll",
            (FrameType::Control, 11) => "RTS",
            (FrameType::Control, 12) => "CTS",
            (FrameType::Control, 13) => "ACK",
            (FrameType::Control, 14) => "Contention-Free-End",
            (FrameType::Control, 15) => "CF-End+CF-ACK",
            (FrameType::Data, 0) => "Data",
            (FrameType::Data, 1) => "Data+CF-ACK",
            (FrameType::Data, 2) => "Data+CF-Poll",
            (FrameType::Data, 3) => "Data+CF-ACK+CF-Poll",
            (FrameType::Data, 4) => "Null Data",
            (FrameType::Data, 5) => "CF-ACK",
            (FrameType::Data, 6) => "CF-Poll",
            (FrameType::Data, 7) => "CF-ACK+CF-Poll",
            (FrameType::Data, 8) => "QoS Data",
            (FrameType::Data, 9) => "QoS Data + CF-ACK",
            (FrameType::Data, 10) => "QoS Data + CF-Poll",
            (FrameType::Data, 11) => "QoS Data + CF-ACK + CF-Poll",
            (FrameType::Data, 12) => "QoS Null Data",
            (FrameType::Data, 13) => "QoS CF-ACK",
            (FrameType::Data, 14) => "QoS CF-Poll",
            (FrameType::Data, 15) => "QoS CF-ACK + CF-Poll",
            _ => return None,
        };
        Some(name)
    }
}
