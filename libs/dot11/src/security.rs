//! RSN (WPA2) and WPA security elements, plus the vendor-specific element that carries WPA.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use itertools::Itertools;
use strum_macros::Display;

use crate::error::{Error, Result};

pub const OUI_SIZE: usize = 3;
/// IEEE 802.11 suite selector OUI.
pub const OUI_RSN: [u8; 3] = [0x00, 0x0f, 0xac];
/// Microsoft OUI, used by the pre-standard WPA element.
pub const OUI_MICROSOFT: [u8; 3] = [0x00, 0x50, 0xf2];
/// Vendor element type that marks a Microsoft vendor element as WPA.
pub const WPA_VENDOR_TYPE: u8 = 1;

const SUITE_SIZE: usize = OUI_SIZE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SecurityKind {
    #[strum(serialize = "WPA2")]
    Wpa2,
    #[strum(serialize = "WPA")]
    Wpa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    UseGroup,
    Wep40,
    Tkip,
    Ccmp,
    Wep104,
    Other(u8),
}

impl From<u8> for CipherSuite {
    fn from(id: u8) -> Self {
        match id {
            0 => CipherSuite::UseGroup,
            1 => CipherSuite::Wep40,
            2 => CipherSuite::Tkip,
            4 => CipherSuite::Ccmp,
            5 => CipherSuite::Wep104,
            other => CipherSuite::Other(other),
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherSuite::UseGroup => write!(f, "Same as Group Cipher Suite"),
            CipherSuite::Wep40 => write!(f, "WEP-40"),
            CipherSuite::Tkip => write!(f, "TKIP"),
            CipherSuite::Ccmp => write!(f, "CCMP"),
            CipherSuite::Wep104 => write!(f, "WEP-104"),
            CipherSuite::Other(id) => write!(f, "Unknown ({})", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthSuite {
    Pmk,
    Psk,
    Other(u8),
}

impl From<u8> for AuthSuite {
    fn from(id: u8) -> Self {
        match id {
            1 => AuthSuite::Pmk,
            2 => AuthSuite::Psk,
            other => AuthSuite::Other(other),
        }
    }
}

impl fmt::Display for AuthSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSuite::Pmk => write!(f, "PMK"),
            AuthSuite::Psk => write!(f, "PSK"),
            AuthSuite::Other(id) => write!(f, "Unknown ({})", id),
        }
    }
}

/// Decoded body of an RSN element, or of a WPA vendor element after its OUI and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    pub kind: SecurityKind,
    pub version: u16,
    pub multicast: CipherSuite,
    pub unicast: Vec<CipherSuite>,
    pub authentication: Vec<AuthSuite>,
}

impl SecurityDescriptor {
    /// Layout: version (2) | multicast suite (4) | unicast count (2) | unicast suites (4 * n)
    /// | auth count (2) | auth suites (4 * n). Anything after the auth suites
    /// (RSN capabilities, PMKIDs) is not read.
    pub fn parse(data: &[u8], kind: SecurityKind) -> Result<Self> {
        let mut reader = ElementReader::new(data);

        let version = reader.read_u16()?;

        let multicast = reader.take(SUITE_SIZE)?;
        if !is_suite_oui(&multicast[..OUI_SIZE]) {
            return Err(Error::InvalidInformationElement(
                "unrecognized multicast cipher suite OUI",
            ));
        }
        let multicast = CipherSuite::from(multicast[OUI_SIZE]);

        let unicast = reader.read_suites()?.into_iter().map(CipherSuite::from).collect();
        let authentication = reader.read_suites()?.into_iter().map(AuthSuite::from).collect();

        Ok(SecurityDescriptor {
            kind,
            version,
            multicast,
            unicast,
            authentication,
        })
    }
}

impl fmt::Display for SecurityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{} multicast={} unicast=[{}] auth=[{}]",
            self.kind,
            self.version,
            self.multicast,
            self.unicast.iter().join(", "),
            self.authentication.iter().join(", ")
        )
    }
}

/// A vendor-specific element that is not WPA.
///
/// `subtype` is the byte following the OUI when present; it is not repeated in `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSpecific {
    pub oui: [u8; 3],
    pub subtype: Option<u8>,
    pub data: Vec<u8>,
}

impl fmt::Display for VendorSpecific {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oui={}", hex::encode(self.oui))?;
        if let Some(subtype) = self.subtype {
            write!(f, " type={}", subtype)?;
        }
        write!(f, " data={}", hex::encode(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorElement {
    Wpa(SecurityDescriptor),
    Opaque(VendorSpecific),
}

pub fn parse_vendor_specific(data: &[u8]) -> Result<VendorElement> {
    if data.len() < OUI_SIZE {
        return Err(Error::InvalidInformationElement("vendor element shorter than OUI"));
    }
    let oui = [data[0], data[1], data[2]];
    let rest = &data[OUI_SIZE..];

    let Some((&subtype, payload)) = rest.split_first() else {
        return Ok(VendorElement::Opaque(VendorSpecific {
            oui,
            subtype: None,
            data: rest.to_vec(),
        }));
    };

    if oui == OUI_MICROSOFT && subtype == WPA_VENDOR_TYPE {
        return SecurityDescriptor::parse(payload, SecurityKind::Wpa).map(VendorElement::Wpa);
    }

    Ok(VendorElement::Opaque(VendorSpecific {
        oui,
        subtype: Some(subtype),
        data: payload.to_vec(),
    }))
}

fn is_suite_oui(oui: &[u8]) -> bool {
    oui == OUI_RSN || oui == OUI_MICROSOFT
}

struct ElementReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ElementReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ElementReader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::InvalidInformationElement("security element truncated"));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    /// Reads a suite count and that many suites, returning the ids of suites
    /// with a recognized OUI. Suites with other OUIs are consumed and dropped.
    fn read_suites(&mut self) -> Result<Vec<u8>> {
        let count = self.read_u16()? as usize;
        if count * SUITE_SIZE > self.remaining() {
            return Err(Error::InvalidInformationElement(
                "suite count exceeds element length",
            ));
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let suite = self.take(SUITE_SIZE)?;
            if is_suite_oui(&suite[..OUI_SIZE]) {
                ids.push(suite[OUI_SIZE]);
            }
        }
        Ok(ids)
    }
}
