use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ensure_len, Error, Result};
use crate::frame_control::{subtype, FrameControl, FrameType};
use crate::ie::InformationElements;
use crate::mac::MacAddress;

/// Trailing frame check sequence present on every captured frame.
pub const FCS_LEN: usize = 4;

/// Capability information bits carried by beacons and probe responses.
pub mod capability {
    pub const ESS: u16 = 0x0001;
    pub const IBSS: u16 = 0x0002;
    pub const CF_POLLABLE: u16 = 0x0004;
    pub const CF_POLL_REQUEST: u16 = 0x0008;
    pub const PRIVACY: u16 = 0x0010;
    pub const SHORT_PREAMBLE: u16 = 0x0020;
    pub const PBCC: u16 = 0x0040;
    pub const CHANNEL_AGILITY: u16 = 0x0080;
    pub const SHORT_SLOT_TIME: u16 = 0x0400;
    pub const DSSS_OFDM: u16 = 0x2000;
}

/// Splits a sequence control field into (fragment, sequence).
pub(crate) fn sequence_control(raw: u16) -> (u8, u16) {
    ((raw & 0x000f) as u8, raw >> 4)
}

/// Element chain of a management body: `[fixed, len - FCS)`, or nothing when the
/// frame carries no bytes beyond the fixed part and its FCS.
fn element_chain(data: &[u8], fixed: usize) -> &[u8] {
    if data.len() > fixed + FCS_LEN {
        &data[fixed..data.len() - FCS_LEN]
    } else {
        &[]
    }
}

/// The 24 byte header shared by every management subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementHeader {
    pub frame_control: FrameControl,
    pub duration: u16,
    pub destination: MacAddress,
    pub source: MacAddress,
    pub bssid: MacAddress,
    pub fragment: u8,
    pub sequence: u16,
}

impl ManagementHeader {
    pub const LEN: usize = 24;

    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("management header", data, Self::LEN)?;
        let frame_control = FrameControl::parse(data)?;
        if frame_control.frame_type() != FrameType::Management {
            return Err(Error::WrongFrameType {
                expected: FrameType::Management,
                actual: frame_control.frame_type(),
            });
        }
        let (fragment, sequence) = sequence_control(LittleEndian::read_u16(&data[22..24]));

        Ok(ManagementHeader {
            frame_control,
            duration: LittleEndian::read_u16(&data[2..4]),
            destination: MacAddress::from_bytes(&data[4..10])?,
            source: MacAddress::from_bytes(&data[10..16])?,
            bssid: MacAddress::from_bytes(&data[16..22])?,
            fragment,
            sequence,
        })
    }

    fn expect_subtype(&self, expected: u8) -> Result<()> {
        let actual = self.frame_control.subtype();
        if actual != expected {
            return Err(Error::WrongSubtype { expected, actual });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub header: ManagementHeader,
    pub timestamp: u64,
    pub interval: u16,
    pub capabilities: u16,
    pub elements: InformationElements,
}

impl Beacon {
    pub const FIXED_LEN: usize = 36;

    /// Fails with `TooShort` below 36 bytes, then `WrongFrameType` or
    /// `WrongSubtype` for anything but a management beacon. Malformed security
    /// or fixed-size elements give `InvalidInformationElement`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("beacon", data, Self::FIXED_LEN)?;
        let header = ManagementHeader::parse(data)?;
        header.expect_subtype(subtype::BEACON)?;

        let elements = InformationElements::parse(element_chain(data, Self::FIXED_LEN))?;

        Ok(Beacon {
            header,
            timestamp: LittleEndian::read_u64(&data[24..32]),
            interval: LittleEndian::read_u16(&data[32..34]),
            capabilities: LittleEndian::read_u16(&data[34..36]),
            elements,
        })
    }

    pub fn bssid(&self) -> MacAddress {
        self.header.bssid
    }

    pub fn has_capability(&self, bit: u16) -> bool {
        self.capabilities & bit != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub header: ManagementHeader,
    pub elements: InformationElements,
}

impl ProbeRequest {
    pub const FIXED_LEN: usize = ManagementHeader::LEN;

    /// Fails with `TooShort` below 24 bytes, then `WrongFrameType` or
    /// `WrongSubtype` for anything but a management probe request, and
    /// `InvalidInformationElement` for malformed elements.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ManagementHeader::parse(data)?;
        header.expect_subtype(subtype::PROBE_REQUEST)?;

        let elements = InformationElements::parse(element_chain(data, Self::FIXED_LEN))?;
        Ok(ProbeRequest { header, elements })
    }

    pub fn source(&self) -> MacAddress {
        self.header.source
    }
}
