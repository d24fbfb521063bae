// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! BGP "extended community list" path attribute, with the EVPN subtypes
//! <https://tools.ietf.org/html/rfc7432#section-7>

use crate::message::attributes::*;
use crate::util::*;
#[cfg(feature = "serialization")]
use serde::de::{self, Visitor};
#[cfg(feature = "serialization")]
use serde::ser::SerializeSeq;

/// Extended community type for EVPN
pub const ECOMMUNITY_ENCODE_EVPN: u8 = 0x06;
/// EVPN subtype MAC mobility
pub const ECOMMUNITY_EVPN_SUBTYPE_MAC_MOBILITY: u8 = 0x00;
/// Route target subtype for AS, IPv4 and AS4 types
pub const ECOMMUNITY_ROUTE_TARGET: u8 = 0x02;
/// Non-transitive bit of the type octet
const ECOMMUNITY_FLAG_NON_TRANSITIVE: u8 = 0x40;

/// BGP extended community - element for BgpExtCommunityList path attribute
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BgpExtCommunity {
    pub ctype: u8,
    pub subtype: u8,
    pub a: u16,
    pub b: u32,
}

/// MAC mobility sequence number and sticky flag
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct MacMobility {
    pub is_static: bool,
    pub seq: u32,
}
impl MacMobility {
    pub fn new(is_static: bool, seq: u32) -> MacMobility {
        MacMobility { is_static, seq }
    }
    /// True if an advertisement carrying `self` displaces one carrying
    /// `current`. Static wins over dynamic, then the higher sequence
    /// number. An exact tie keeps the current one.
    pub fn preferred_over(&self, current: &MacMobility) -> bool {
        match (self.is_static, current.is_static) {
            (true, false) => true,
            (false, true) => false,
            _ => self.seq > current.seq,
        }
    }
}

/// What an extended community means to EVPN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvpnExtCommunityKind {
    RouteTarget,
    MacMobility(MacMobility),
    /// EVPN type with a subtype not handled here, carried as-is
    EvpnOther(u8),
    Other,
}

impl BgpExtCommunity {
    /// creates route-target with AS + number
    pub fn rt_asn(asn: u16, val: u32) -> BgpExtCommunity {
        BgpExtCommunity {
            ctype: 0,
            subtype: ECOMMUNITY_ROUTE_TARGET,
            a: asn,
            b: val,
        }
    }
    /// creates route-target with ipv4 + number
    pub fn rt_ipv4(ip: std::net::Ipv4Addr, val: u16) -> BgpExtCommunity {
        let o = ip.octets();
        BgpExtCommunity {
            ctype: 1,
            subtype: ECOMMUNITY_ROUTE_TARGET,
            a: (o[0] as u16) << 8 | (o[1] as u16),
            b: (o[2] as u32) << 24 | (o[3] as u32) << 16 | (val as u32),
        }
    }
    /// creates route-target with 4-byte AS + number
    pub fn rt_as4(asn: u32, val: u16) -> BgpExtCommunity {
        BgpExtCommunity {
            ctype: 2,
            subtype: ECOMMUNITY_ROUTE_TARGET,
            a: (asn >> 16) as u16,
            b: (asn << 16) | (val as u32),
        }
    }
    /// creates MAC mobility community:
    /// `[0x06][0x00][flags][reserved][sequence, 4 bytes]`
    /// ```
    /// use zettaevpn::prelude::*;
    ///
    /// let c = BgpExtCommunity::mac_mobility(true, 0x01020304);
    /// assert_eq!(c.octets(), [0x06, 0x00, 0x01, 0x00, 0x01, 0x02, 0x03, 0x04]);
    /// ```
    pub fn mac_mobility(is_static: bool, seq: u32) -> BgpExtCommunity {
        BgpExtCommunity {
            ctype: ECOMMUNITY_ENCODE_EVPN,
            subtype: ECOMMUNITY_EVPN_SUBTYPE_MAC_MOBILITY,
            a: if is_static { 0x0100 } else { 0 },
            b: seq,
        }
    }
    pub fn decode_from(buf: &[u8]) -> Result<BgpExtCommunity, BgpError> {
        match buf.len() {
            8 => Ok(BgpExtCommunity {
                ctype: buf[0],
                subtype: buf[1],
                a: getn_u16(&buf[2..4]),
                b: getn_u32(&buf[4..8]),
            }),
            _ => Err(BgpError::static_str(
                "Invalid BgpExtCommunity item length",
            )),
        }
    }
    pub fn encode_to(&self, buf: &mut [u8]) -> Result<usize, BgpError> {
        if buf.len() < 8 {
            return Err(BgpError::insufficient_buffer_size());
        }
        buf[0] = self.ctype;
        buf[1] = self.subtype;
        setn_u16(self.a, &mut buf[2..4]);
        setn_u32(self.b, &mut buf[4..8]);
        Ok(8)
    }
    /// encoded bytes
    pub fn octets(&self) -> [u8; 8] {
        let mut r = [0_u8; 8];
        r[0] = self.ctype;
        r[1] = self.subtype;
        setn_u16(self.a, &mut r[2..4]);
        setn_u32(self.b, &mut r[4..8]);
        r
    }
    /// Classifies by type and subtype octets.
    pub fn kind(&self) -> EvpnExtCommunityKind {
        let ctype = self.ctype & !ECOMMUNITY_FLAG_NON_TRANSITIVE;
        if ctype == ECOMMUNITY_ENCODE_EVPN {
            return match self.subtype {
                ECOMMUNITY_EVPN_SUBTYPE_MAC_MOBILITY => EvpnExtCommunityKind::MacMobility(
                    MacMobility::new((self.a >> 8) & 0x01 != 0, self.b),
                ),
                n => EvpnExtCommunityKind::EvpnOther(n),
            };
        }
        if ctype <= 2 && self.subtype == ECOMMUNITY_ROUTE_TARGET {
            EvpnExtCommunityKind::RouteTarget
        } else {
            EvpnExtCommunityKind::Other
        }
    }
    pub fn is_route_target(&self) -> bool {
        self.kind() == EvpnExtCommunityKind::RouteTarget
    }
    /// Route target as matched against import lists: the transitivity bit
    /// of the type octet does not take part in the match.
    pub fn rt_key(&self) -> BgpExtCommunity {
        BgpExtCommunity {
            ctype: self.ctype & !ECOMMUNITY_FLAG_NON_TRANSITIVE,
            ..*self
        }
    }
    /// extracts encoded ipv4
    pub fn get_ipv4(&self) -> std::net::Ipv4Addr {
        std::net::Ipv4Addr::new(
            ((self.a >> 8) & 0xff) as u8,
            (self.a & 0xff) as u8,
            ((self.b >> 24) & 0xff) as u8,
            ((self.b >> 16) & 0xff) as u8,
        )
    }
    /// extracts encoded number
    pub fn get_num(&self) -> u16 {
        (self.b & 0xffff) as u16
    }
}
impl std::fmt::Debug for BgpExtCommunity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgpExtCommunity")
            .field("ctype", &self.ctype)
            .field("subtype", &self.subtype)
            .field("a", &self.a)
            .field("b", &self.b)
            .finish()
    }
}
impl std::fmt::Display for BgpExtCommunity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (self.kind(), self.ctype & !ECOMMUNITY_FLAG_NON_TRANSITIVE) {
            (EvpnExtCommunityKind::RouteTarget, 0) => write!(f, "{}:{}", self.a, self.b),
            (EvpnExtCommunityKind::RouteTarget, 1) => {
                write!(f, "{}:{}", self.get_ipv4(), self.get_num())
            }
            (EvpnExtCommunityKind::RouteTarget, _) => write!(
                f,
                "{}:{}",
                ((self.a as u32) << 16) | (self.b >> 16),
                self.get_num()
            ),
            (EvpnExtCommunityKind::MacMobility(mm), _) => {
                if mm.is_static {
                    write!(f, "MM:{}, sticky MAC", mm.seq)
                } else {
                    write!(f, "MM:{}", mm.seq)
                }
            }
            _ => write!(
                f,
                "ext-unknown:{}:{}:{}:{}",
                self.ctype, self.subtype, self.a, self.b
            ),
        }
    }
}
impl std::str::FromStr for BgpExtCommunity {
    type Err = BgpError;

    /// Route target "ASN:NN" or "A.B.C.D:NN"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || BgpError::from_string(format!("Invalid route target {:?}", s));
        let (adm, num) = s.rsplit_once(':').ok_or_else(bad)?;
        if let Ok(ip) = adm.parse::<std::net::Ipv4Addr>() {
            return Ok(BgpExtCommunity::rt_ipv4(ip, num.parse::<u16>().map_err(|_| bad())?));
        }
        let asn = adm.parse::<u32>().map_err(|_| bad())?;
        let val = num.parse::<u32>().map_err(|_| bad())?;
        if asn <= 0xffff {
            Ok(BgpExtCommunity::rt_asn(asn as u16, val))
        } else if val <= 0xffff {
            Ok(BgpExtCommunity::rt_as4(asn, val as u16))
        } else {
            Err(bad())
        }
    }
}

/// BGP extended community list path attribute
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BgpExtCommunityList {
    pub value: std::collections::BTreeSet<BgpExtCommunity>,
}
impl BgpExtCommunityList {
    pub fn new() -> BgpExtCommunityList {
        BgpExtCommunityList {
            value: std::collections::BTreeSet::new(),
        }
    }
    pub fn from_vec(v: Vec<BgpExtCommunity>) -> BgpExtCommunityList {
        BgpExtCommunityList {
            value: v.into_iter().collect(),
        }
    }
    pub fn decode_from(buf: &[u8]) -> Result<BgpExtCommunityList, BgpError> {
        if buf.len() % 8 != 0 {
            return Err(BgpError::static_str(
                "Invalid BgpExtCommunityList length",
            ));
        }
        let mut v = std::collections::BTreeSet::new();
        for chunk in buf.chunks_exact(8) {
            v.insert(BgpExtCommunity::decode_from(chunk)?);
        }
        Ok(BgpExtCommunityList { value: v })
    }
    /// Route targets in the list
    pub fn route_targets(&self) -> impl Iterator<Item = &BgpExtCommunity> {
        self.value.iter().filter(|c| c.is_route_target())
    }
    /// MAC mobility, the first one if several are present
    pub fn mac_mobility(&self) -> Option<MacMobility> {
        self.value.iter().find_map(|c| match c.kind() {
            EvpnExtCommunityKind::MacMobility(mm) => Some(mm),
            _ => None,
        })
    }
    /// Replaces all route targets, other communities stay.
    pub fn set_route_targets<'a, I>(&mut self, rts: I)
    where
        I: IntoIterator<Item = &'a BgpExtCommunity>,
    {
        self.value.retain(|c| !c.is_route_target());
        self.value.extend(rts.into_iter().copied());
    }
    /// Replaces MAC mobility community.
    pub fn set_mac_mobility(&mut self, mm: Option<MacMobility>) {
        self.value
            .retain(|c| !matches!(c.kind(), EvpnExtCommunityKind::MacMobility(_)));
        if let Some(mm) = mm {
            self.value
                .insert(BgpExtCommunity::mac_mobility(mm.is_static, mm.seq));
        }
    }
}
impl std::fmt::Debug for BgpExtCommunityList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgpExtCommunityList")
            .field("value", &self.value)
            .finish()
    }
}
impl std::fmt::Display for BgpExtCommunityList {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut first = true;
        for c in self.value.iter() {
            if !first {
                " ".fmt(f)?;
            }
            if c.is_route_target() {
                "RT:".fmt(f)?;
            }
            c.fmt(f)?;
            first = false;
        }
        Ok(())
    }
}
impl BgpAttr for BgpExtCommunityList {
    fn attr(&self) -> BgpAttrParams {
        BgpAttrParams {
            typecode: 16,
            flags: 192,
        }
    }
    fn encode_to(&self, _peer: &BgpSessionParams, buf: &mut [u8]) -> Result<usize, BgpError> {
        let mut pos: usize = 0;
        for c in &self.value {
            pos += c.encode_to(&mut buf[pos..])?;
        }
        Ok(pos)
    }
}
#[cfg(feature = "serialization")]
impl serde::Serialize for BgpExtCommunity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_str())
    }
}
#[cfg(feature = "serialization")]
struct BgpExtCommunityVisitor;

#[cfg(feature = "serialization")]
impl<'de> Visitor<'de> for BgpExtCommunityVisitor {
    type Value = BgpExtCommunity;
    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a route target string")
    }
    fn visit_str<E>(self, value: &str) -> Result<BgpExtCommunity, E>
    where
        E: de::Error,
    {
        value.parse::<BgpExtCommunity>().map_err(de::Error::custom)
    }
}
#[cfg(feature = "serialization")]
impl<'de> serde::Deserialize<'de> for BgpExtCommunity {
    fn deserialize<D>(deserializer: D) -> Result<BgpExtCommunity, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(BgpExtCommunityVisitor)
    }
}
#[cfg(feature = "serialization")]
impl serde::Serialize for BgpExtCommunityList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_seq(Some(self.value.len()))?;
        for l in self.value.iter() {
            state.serialize_element(&l)?;
        }
        state.end()
    }
}
