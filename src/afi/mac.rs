// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ethernet MAC address as carried in EVPN MAC/IP advertisement routes

use crate::error::BgpError;
#[cfg(feature = "serialization")]
use serde::de::{self, Visitor};

/// Six-byte ethernet mac address, stored in network order.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MacAddress {
    pub mac_address: [u8; 6],
}
impl MacAddress {
    /// Construct new zero mac address.
    pub fn new() -> MacAddress {
        MacAddress {
            mac_address: [0_u8; 6],
        }
    }
    /// Construct new mac address from 6 bytes in network order.
    pub fn from_network_bytes(b: &[u8]) -> Result<MacAddress, BgpError> {
        if b.len() < 6 {
            return Err(BgpError::static_str("Invalid mac address length"));
        }
        let mut a = [0_u8; 6];
        a.copy_from_slice(&b[0..6]);
        Ok(MacAddress { mac_address: a })
    }
    /// Construct new mac address from u64, low 48 bits.
    /// ```
    /// use zettaevpn::afi::mac::MacAddress;
    ///
    /// assert_eq!(MacAddress::from_u64(0x0a0b0c0d0e0f).to_string(), "0a:0b:0c:0d:0e:0f");
    /// ```
    pub fn from_u64(s: u64) -> MacAddress {
        let b = s.to_be_bytes();
        MacAddress {
            mac_address: [b[2], b[3], b[4], b[5], b[6], b[7]],
        }
    }
    /// Pack to u64.
    pub fn to_u64(&self) -> u64 {
        self.mac_address
            .iter()
            .fold(0_u64, |acc, b| (acc << 8) | (*b as u64))
    }
}
impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let m = &self.mac_address;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}
impl std::fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
impl std::str::FromStr for MacAddress {
    type Err = BgpError;

    /// Accepts "aa:bb:cc:dd:ee:ff", "aabb.ccdd.eeff" and other separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac: u64 = 0;
        let mut cnt: usize = 0;
        for c in s.chars() {
            if let Some(d) = c.to_digit(16) {
                mac = (mac << 4) | (d as u64);
                cnt += 1;
            } else if !matches!(c, ':' | '-' | '.') {
                return Err(BgpError::static_str("Invalid mac address"));
            }
        }
        if cnt != 12 {
            return Err(BgpError::static_str("Invalid mac address"));
        }
        Ok(MacAddress::from_u64(mac))
    }
}
#[cfg(feature = "serialization")]
impl serde::Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
#[cfg(feature = "serialization")]
struct MacAddressVisitor;

#[cfg(feature = "serialization")]
impl<'de> Visitor<'de> for MacAddressVisitor {
    type Value = MacAddress;
    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a mac address string")
    }
    fn visit_str<E>(self, value: &str) -> Result<MacAddress, E>
    where
        E: de::Error,
    {
        value.parse::<MacAddress>().map_err(de::Error::custom)
    }
}
#[cfg(feature = "serialization")]
impl<'de> serde::Deserialize<'de> for MacAddress {
    fn deserialize<D>(deserializer: D) -> Result<MacAddress, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(MacAddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse() {
        let m: MacAddress = "00:11:22:aa:bb:cc".parse().unwrap();
        assert_eq!(m.mac_address, [0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]);
        assert_eq!(m.to_u64(), 0x001122aabbcc);
        let n: MacAddress = "0011.22aa.bbcc".parse().unwrap();
        assert_eq!(m, n);
        assert!("00:11:22".parse::<MacAddress>().is_err());
        assert!("zz:11:22:aa:bb:cc".parse::<MacAddress>().is_err());
    }
    #[test]
    fn test_mac_network_bytes() {
        let m = MacAddress::from_network_bytes(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(m.to_string(), "01:02:03:04:05:06");
        assert!(MacAddress::from_network_bytes(&[1, 2, 3]).is_err());
    }
}
