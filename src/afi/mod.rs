// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This module describes NLRI data structures for L2VPN/EVPN
use crate::util::*;
use crate::*;
#[cfg(feature = "serialization")]
use serde::de::{self, Visitor};

pub mod vni;
pub use vni::*;
pub mod mac;
pub use mac::*;
pub mod evpn;
pub use evpn::*;
pub mod nlri;
pub use nlri::*;

/// L2VPN address family identifier.
pub const AFI_L2VPN: u16 = 25;
/// EVPN subsequent address family identifier.
pub const SAFI_EVPN: u8 = 70;

/// BGP VPN route distinguisher
///
/// Equality is plain equality of the 8 encoded bytes, whatever the RD type.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BgpRD {
    /// high-order part
    pub rdh: u32,
    /// low-order part
    pub rdl: u32,
}
impl BgpRD {
    /// Creates a new RD from a pair of numbers
    pub fn new(h: u32, l: u32) -> BgpRD {
        BgpRD { rdh: h, rdl: l }
    }
    /// Creates type 1 RD from ipv4 address and 16-bit number
    /// ```
    /// use zettaevpn::afi::BgpRD;
    ///
    /// let rd = BgpRD::from_ipv4(std::net::Ipv4Addr::new(10, 0, 0, 1), 7);
    /// assert_eq!(rd.to_string(), "10.0.0.1:7");
    /// ```
    pub fn from_ipv4(ip: std::net::Ipv4Addr, num: u16) -> BgpRD {
        let a = u32::from(ip);
        BgpRD {
            rdh: 0x0001_0000 | (a >> 16),
            rdl: (a << 16) | (num as u32),
        }
    }
    /// Creates type 0 (2-byte AS) or type 2 (4-byte AS) RD
    pub fn from_asn(asn: u32, num: u32) -> Result<BgpRD, BgpError> {
        if asn <= 0xffff {
            Ok(BgpRD { rdh: asn, rdl: num })
        } else if num <= 0xffff {
            Ok(BgpRD {
                rdh: 0x0002_0000 | (asn >> 16),
                rdl: (asn << 16) | num,
            })
        } else {
            Err(BgpError::static_str("RD number too large for 4-byte AS"))
        }
    }
    /// RD type, first two octets
    pub fn rd_type(&self) -> u16 {
        (self.rdh >> 16) as u16
    }
    /// Checks that RD is zero
    pub fn is_zero(&self) -> bool {
        (self.rdh == 0) && (self.rdl == 0)
    }
    /// Encoded bytes
    pub fn octets(&self) -> [u8; 8] {
        let mut r = [0_u8; 8];
        setn_u32(self.rdh, &mut r[0..4]);
        setn_u32(self.rdl, &mut r[4..8]);
        r
    }
    /// decodes RD from bytes
    pub fn decode_rd_from(buf: &[u8]) -> Result<(BgpRD, usize), BgpError> {
        if buf.len() >= 8 {
            Ok((
                BgpRD {
                    rdh: getn_u32(&buf[0..4]),
                    rdl: getn_u32(&buf[4..8]),
                },
                8,
            ))
        } else {
            Err(BgpError::static_str("Invalid RD buffer len"))
        }
    }
    /// encodes RD into the buffer
    pub fn encode_rd_to(&self, buf: &mut [u8]) -> Result<usize, BgpError> {
        if buf.len() < 8 {
            return Err(BgpError::insufficient_buffer_size());
        }
        setn_u32(self.rdh, buf);
        setn_u32(self.rdl, &mut buf[4..8]);
        Ok(8)
    }
}
impl std::str::FromStr for BgpRD {
    type Err = BgpError;

    /// "ASN:NN" or "A.B.C.D:NN"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (adm, num) = s
            .rsplit_once(':')
            .ok_or_else(|| BgpError::from_string(format!("Invalid RD {:?}", s)))?;
        if let Ok(ip) = adm.parse::<std::net::Ipv4Addr>() {
            let n = num
                .parse::<u16>()
                .map_err(|_| BgpError::from_string(format!("Invalid RD {:?}", s)))?;
            return Ok(BgpRD::from_ipv4(ip, n));
        }
        match (adm.parse::<u32>(), num.parse::<u32>()) {
            (Ok(asn), Ok(n)) => BgpRD::from_asn(asn, n),
            _ => Err(BgpError::from_string(format!("Invalid RD {:?}", s))),
        }
    }
}
impl BgpAddrItem<BgpRD> for BgpRD {
    fn decode_from(buf: &[u8]) -> Result<(BgpRD, usize), BgpError> {
        BgpRD::decode_rd_from(buf)
    }
    fn encode_to(&self, buf: &mut [u8]) -> Result<usize, BgpError> {
        self.encode_rd_to(buf)
    }
}
impl std::fmt::Display for BgpRD {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.rd_type() {
            1 => write!(
                f,
                "{}.{}.{}.{}:{}",
                (self.rdh >> 8) & 0xff,
                self.rdh & 0xff,
                (self.rdl >> 24) & 0xff,
                (self.rdl >> 16) & 0xff,
                self.rdl & 0xffff
            ),
            2 => write!(
                f,
                "{}:{}",
                ((self.rdh & 0xffff) << 16) | (self.rdl >> 16),
                self.rdl & 0xffff
            ),
            _ => write!(f, "{}:{}", self.rdh, self.rdl),
        }
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for BgpRD {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
#[cfg(feature = "serialization")]
struct BgpRDVisitor;

#[cfg(feature = "serialization")]
impl<'de> Visitor<'de> for BgpRDVisitor {
    type Value = BgpRD;
    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a route distinguisher string")
    }
    fn visit_str<E>(self, value: &str) -> Result<BgpRD, E>
    where
        E: de::Error,
    {
        value.parse::<BgpRD>().map_err(de::Error::custom)
    }
}
#[cfg(feature = "serialization")]
impl<'de> serde::Deserialize<'de> for BgpRD {
    fn deserialize<D>(deserializer: D) -> Result<BgpRD, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(BgpRDVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_cmp_rd() {
        assert!(BgpRD::new(1, 1) == BgpRD::new(1, 1));
        assert!(BgpRD::new(1, 1) < BgpRD::new(1, 2));
        assert!(BgpRD::new(2, 1) > BgpRD::new(1, 2));
    }
    #[test]
    fn test_rd_parse_and_display() {
        let rd: BgpRD = "65000:100".parse().unwrap();
        assert_eq!(rd.octets(), [0, 0, 0xfd, 0xe8, 0, 0, 0, 100]);
        assert_eq!(rd.to_string(), "65000:100");
        let rd: BgpRD = "10.1.2.3:5".parse().unwrap();
        assert_eq!(rd.octets(), [0, 1, 10, 1, 2, 3, 0, 5]);
        assert_eq!(rd.to_string(), "10.1.2.3:5");
        let rd: BgpRD = "4200000000:12".parse().unwrap();
        assert_eq!(rd.rd_type(), 2);
        assert_eq!(rd.to_string(), "4200000000:12");
        assert!("4200000000:70000".parse::<BgpRD>().is_err());
        assert!("nonsense".parse::<BgpRD>().is_err());
    }
    #[test]
    fn test_rd_bytes_roundtrip() {
        let rd = BgpRD::from_ipv4(Ipv4Addr::new(192, 168, 1, 1), 300);
        let mut buf = [0_u8; 8];
        assert_eq!(rd.encode_to(&mut buf).unwrap(), 8);
        assert_eq!(BgpRD::decode_from(&buf).unwrap(), (rd, 8));
        assert!(rd.encode_to(&mut buf[0..7]).is_err());
    }
}
