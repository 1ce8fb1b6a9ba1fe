//! Decoders for the parts of IEEE 802.11 traffic a passive monitor cares about:
//! frame control, beacons and probe requests with their element chains,
//! data frame addressing, and the Broadcom receive header that precedes each
//! frame on the monitor tap.
//!
//! Nothing here performs I/O. Every decoder takes a byte slice and either
//! returns a typed value or an [`Error`].

pub mod data;
pub mod error;
pub mod frame_control;
pub mod ie;
pub mod mac;
pub mod management;
pub mod phy;
pub mod security;

pub use data::{AddressingMode, DataFrame};
pub use error::{Error, Result};
pub use frame_control::{subtype, FrameControl, FrameType};
pub use ie::{IeName, IeValue, InformationElement, InformationElements};
pub use mac::{MacAddress, ParseMacError};
pub use management::{capability, Beacon, ManagementHeader, ProbeRequest, FCS_LEN};
pub use phy::PhyMetadata;
pub use security::{AuthSuite, CipherSuite, SecurityDescriptor, SecurityKind, VendorSpecific};

/// A frame decoded by whichever decoder its frame control selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    Beacon(Beacon),
    ProbeRequest(ProbeRequest),
    Data(DataFrame),
    Unrecognized(FrameControl),
}

impl DecodedFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedFrame::Beacon(_) => "beacon",
            DecodedFrame::ProbeRequest(_) => "probe request",
            DecodedFrame::Data(_) => "data",
            DecodedFrame::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Picks the decoder from the frame control. Frames no decoder handles come
/// back as `Unrecognized`; decoder errors (`TooShort`, `InvalidInformationElement`)
/// are returned as is.
pub fn decode_frame(data: &[u8]) -> Result<DecodedFrame> {
    let frame_control = FrameControl::parse(data)?;
    let frame = match (frame_control.frame_type(), frame_control.subtype()) {
        (FrameType::Management, subtype::BEACON) => DecodedFrame::Beacon(Beacon::parse(data)?),
        (FrameType::Management, subtype::PROBE_REQUEST) => {
            DecodedFrame::ProbeRequest(ProbeRequest::parse(data)?)
        }
        (FrameType::Data, _) => DecodedFrame::Data(DataFrame::parse(data)?),
        _ => DecodedFrame::Unrecognized(frame_control),
    };
    Ok(frame)
}
