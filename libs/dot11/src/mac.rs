use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{ensure_len, Result};

/// A 48-bit IEEE MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid MAC address: {0:?}")]
pub struct ParseMacError(pub String);

impl MacAddress {
    pub const LEN: usize = 6;
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Reads the first six bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len("MAC address", data, Self::LEN)?;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&data[..Self::LEN]);
        Ok(MacAddress(bytes))
    }

    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Group addresses (multicast and broadcast) have the low bit of the first octet set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(ParseMacError(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        Ok(MacAddress(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn formats_as_colon_hex() {
        let mac = MacAddress::from_bytes(&[0x00, 0x01, 0x02, 0x0a, 0xbc, 0xff]).unwrap();
        assert_eq!(mac.to_string(), "00:01:02:0a:bc:ff");
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(matches!(
            MacAddress::from_bytes(&[0, 1, 2, 3, 4]),
            Err(Error::TooShort { needed: 6, got: 5, .. })
        ));
    }

    #[test]
    fn parses_both_separators() {
        let a: MacAddress = "00:1A:2b:3c:4d:5e".parse().unwrap();
        let b: MacAddress = "00-1a-2b-3c-4d-5e".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.oui(), [0x00, 0x1a, 0x2b]);
        assert!("00:1a:2b".parse::<MacAddress>().is_err());
        assert!("zz:1a:2b:3c:4d:5e".parse::<MacAddress>().is_err());
    }

    #[test]
    fn group_addresses() {
        assert!(!"00:11:22:33:44:55".parse::<MacAddress>().unwrap().is_multicast());
        assert!("33:33:00:00:00:00".parse::<MacAddress>().unwrap().is_multicast());
        assert!("01:00:5e:00:00:00".parse::<MacAddress>().unwrap().is_multicast());
        assert!(MacAddress::BROADCAST.is_multicast());
        assert!(MacAddress::BROADCAST.is_broadcast());
    }
}
