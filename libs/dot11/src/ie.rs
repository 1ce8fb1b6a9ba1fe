//! Tag-length-value information element chains carried in management frame bodies.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::security::{
    parse_vendor_specific, SecurityDescriptor, SecurityKind, VendorElement, VendorSpecific,
};

pub const IE_HEADER_LEN: usize = 2;

pub mod id {
    pub const SSID: u8 = 0;
    pub const SUPPORTED_RATES: u8 = 1;
    pub const DS_PARAMETER_SET: u8 = 3;
    pub const RSN: u8 = 0x30;
    pub const EXTENDED_SUPPORTED_RATES: u8 = 0x32;
    pub const VENDOR_SPECIFIC: u8 = 0xdd;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum IeName {
    #[strum(serialize = "SSID")]
    Ssid,
    #[strum(serialize = "Supported Rates")]
    SupportedRates,
    #[strum(serialize = "DS Parameter Set")]
    DsParameterSet,
    #[strum(serialize = "RSN")]
    Rsn,
    #[strum(serialize = "WPA")]
    Wpa,
    #[strum(serialize = "Extended Supported Rates")]
    ExtendedSupportedRates,
    #[strum(serialize = "Vendor Specific")]
    VendorSpecific,
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl IeName {
    /// Name an element id decodes to before its payload is inspected.
    /// Vendor elements may still turn into `Wpa` once decoded.
    pub fn from_id(id: u8) -> Self {
        match id {
            id::SSID => IeName::Ssid,
            id::SUPPORTED_RATES => IeName::SupportedRates,
            id::DS_PARAMETER_SET => IeName::DsParameterSet,
            id::RSN => IeName::Rsn,
            id::EXTENDED_SUPPORTED_RATES => IeName::ExtendedSupportedRates,
            id::VENDOR_SPECIFIC => IeName::VendorSpecific,
            _ => IeName::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IeValue {
    Ssid(Vec<u8>),
    Rates(Vec<String>),
    Channel(u8),
    Security(SecurityDescriptor),
    Vendor(VendorSpecific),
    /// Hex string of the raw payload.
    Unknown(String),
}

impl fmt::Display for IeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IeValue::Ssid(ssid) => write!(f, "{}", ssid.escape_ascii()),
            IeValue::Rates(rates) => write!(f, "{}", rates.iter().join(", ")),
            IeValue::Channel(channel) => write!(f, "{}", channel),
            IeValue::Security(security) => write!(f, "{}", security),
            IeValue::Vendor(vendor) => write!(f, "{}", vendor),
            IeValue::Unknown(hex) => write!(f, "{}", hex),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationElement {
    pub id: u8,
    pub raw: Vec<u8>,
    pub name: IeName,
    pub value: IeValue,
}

impl InformationElement {
    pub fn decode(id: u8, raw: &[u8]) -> Result<Self> {
        let (name, value) = match id {
            id::SSID => (IeName::Ssid, IeValue::Ssid(raw.to_vec())),
            id::SUPPORTED_RATES => (IeName::SupportedRates, IeValue::Rates(rates(raw))),
            id::EXTENDED_SUPPORTED_RATES => {
                (IeName::ExtendedSupportedRates, IeValue::Rates(rates(raw)))
            }
            id::DS_PARAMETER_SET => {
                if raw.len() != 1 {
                    return Err(Error::InvalidInformationElement(
                        "DS parameter set must be one byte",
                    ));
                }
                (IeName::DsParameterSet, IeValue::Channel(raw[0]))
            }
            id::RSN => (
                IeName::Rsn,
                IeValue::Security(SecurityDescriptor::parse(raw, SecurityKind::Wpa2)?),
            ),
            id::VENDOR_SPECIFIC => match parse_vendor_specific(raw)? {
                VendorElement::Wpa(wpa) => (IeName::Wpa, IeValue::Security(wpa)),
                VendorElement::Opaque(vendor) => (IeName::VendorSpecific, IeValue::Vendor(vendor)),
            },
            _ => (IeName::Unknown, IeValue::Unknown(hex::encode(raw))),
        };

        Ok(InformationElement {
            id,
            raw: raw.to_vec(),
            name,
            value,
        })
    }
}

/// Rates are in units of 500 kb/s; the top bit marks a basic rate.
fn rates(raw: &[u8]) -> Vec<String> {
    raw.iter().map(|b| ((b & 0x7f) / 2).to_string()).collect()
}

/// Iterates `(id, payload)` pairs, stopping at the first element whose header
/// or declared length runs past the end of the buffer.
pub struct IeReader<'a> {
    buffer: &'a [u8],
}

impl<'a> IeReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        IeReader { buffer }
    }
}

impl<'a> Iterator for IeReader<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.len() < IE_HEADER_LEN {
            return None;
        }
        let id = self.buffer[0];
        let len = self.buffer[1] as usize;
        let end = IE_HEADER_LEN + len;
        if end > self.buffer.len() {
            return None;
        }
        let body = &self.buffer[IE_HEADER_LEN..end];
        self.buffer = &self.buffer[end..];
        Some((id, body))
    }
}

/// Decoded element chain, keyed both by name and by raw id.
/// Later elements replace earlier ones with the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InformationElements {
    by_name: HashMap<IeName, IeValue>,
    by_id: HashMap<u8, Vec<u8>>,
}

impl InformationElements {
    pub fn parse(chain: &[u8]) -> Result<Self> {
        let mut elements = InformationElements::default();
        for (id, body) in IeReader::new(chain) {
            let element = InformationElement::decode(id, body)?;
            elements.insert(element);
        }
        Ok(elements)
    }

    fn insert(&mut self, element: InformationElement) {
        self.by_id.insert(element.id, element.raw);
        self.by_name.insert(element.name, element.value);
    }

    pub fn get(&self, name: IeName) -> Option<&IeValue> {
        self.by_name.get(&name)
    }

    pub fn raw(&self, id: u8) -> Option<&[u8]> {
        self.by_id.get(&id).map(Vec::as_slice)
    }

    pub fn contains(&self, name: IeName) -> bool {
        self.by_name.contains_key(&name)
    }

    pub fn ssid(&self) -> Option<&[u8]> {
        match self.get(IeName::Ssid) {
            Some(IeValue::Ssid(ssid)) => Some(ssid),
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match self.get(IeName::DsParameterSet) {
            Some(IeValue::Channel(channel)) => Some(*channel),
            _ => None,
        }
    }

    pub fn security(&self, name: IeName) -> Option<&SecurityDescriptor> {
        match self.get(name) {
            Some(IeValue::Security(security)) => Some(security),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &IeName> {
        self.by_name.keys()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
