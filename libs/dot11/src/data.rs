use byteorder::{ByteOrder, LittleEndian};
use strum_macros::Display;

use crate::error::{ensure_len, Error, Result};
use crate::frame_control::{FrameControl, FrameType};
use crate::management::sequence_control;
use crate::mac::MacAddress;

/// How the address fields of a data frame are to be read, from ToDS/FromDS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AddressingMode {
    #[strum(serialize = "IBSS")]
    Ibss,
    #[strum(serialize = "Infrastructure")]
    Infrastructure,
    #[strum(serialize = "WDS")]
    Wds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub frame_control: FrameControl,
    pub duration: u16,
    pub address1: MacAddress,
    pub address2: MacAddress,
    pub address3: MacAddress,
    pub address4: Option<MacAddress>,
    pub fragment: u8,
    pub sequence: u16,
    pub mode: AddressingMode,
    pub bssid: MacAddress,
    pub source: MacAddress,
    pub destination: MacAddress,
}

impl DataFrame {
    pub const MIN_LEN: usize = 24;
    pub const WDS_LEN: usize = 30;

    /// Decodes a data frame header. Fails with `TooShort` below 24 bytes (30
    /// with both DS bits set) and `WrongFrameType` for non-data frames.
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("data frame", data, Self::MIN_LEN)?;
        let frame_control = FrameControl::parse(data)?;
        if frame_control.frame_type() != FrameType::Data {
            return Err(Error::WrongFrameType {
                expected: FrameType::Data,
                actual: frame_control.frame_type(),
            });
        }

        let address1 = MacAddress::from_bytes(&data[4..10])?;
        let address2 = MacAddress::from_bytes(&data[10..16])?;
        let address3 = MacAddress::from_bytes(&data[16..22])?;

        let flags = (frame_control.to_ds(), frame_control.from_ds());
        // sequence control follows the last address field
        let (address4, seq_offset) = if flags == (true, true) {
            ensure_len("WDS data frame", data, Self::WDS_LEN)?;
            (Some(MacAddress::from_bytes(&data[22..28])?), 28)
        } else {
            (None, 22)
        };
        let (fragment, sequence) =
            sequence_control(LittleEndian::read_u16(&data[seq_offset..seq_offset + 2]));

        let (mode, bssid, source, destination) = match (flags, address4) {
            ((true, true), Some(address4)) => (AddressingMode::Wds, address1, address4, address3),
            ((true, false), _) => (AddressingMode::Infrastructure, address1, address2, address3),
            ((false, true), _) => (AddressingMode::Infrastructure, address2, address3, address1),
            _ => (AddressingMode::Ibss, address3, address2, address1),
        };

        Ok(DataFrame {
            frame_control,
            duration: LittleEndian::read_u16(&data[2..4]),
            address1,
            address2,
            address3,
            address4,
            fragment,
            sequence,
            mode,
            bssid,
            source,
            destination,
        })
    }
}
