// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This module describes NLRI data structures for evpn <https://tools.ietf.org/html/rfc7432>
//!
//! An EVPN route on the wire is `type(1) length(1) body(length)`, the body
//! always starts with the route distinguisher. The prefix types below hold
//! only the key fields of each route type. RD and VNI tags travel next to
//! the prefix in [`EvpnNlri`].

use std::net::{IpAddr, Ipv4Addr};

use crate::afi::vni::decode_tag_from;
use crate::afi::*;
use crate::error::{BgpError, NlriError};
use crate::util::*;
use crate::BgpAddrItem;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Prefix length reported for MAC/IP advertisement routes.
pub const EVPN_TYPE_2_ROUTE_PREFIXLEN: usize = 192;
/// Prefix length reported for inclusive multicast routes.
pub const EVPN_TYPE_3_ROUTE_PREFIXLEN: usize = 192;

/// EVPN route type codes
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum EvpnRouteType {
    /// Ethernet Auto-Discovery (A-D) route
    AutoDiscovery = 1,
    /// MAC/IP Advertisement route
    MacIp = 2,
    /// Inclusive Multicast Ethernet Tag route
    InclusiveMulticast = 3,
    /// Ethernet Segment route
    EthernetSegment = 4,
    /// IP Prefix route
    IpPrefix = 5,
}
impl TryFrom<u8> for EvpnRouteType {
    type Error = BgpError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(EvpnRouteType::AutoDiscovery),
            2 => Ok(EvpnRouteType::MacIp),
            3 => Ok(EvpnRouteType::InclusiveMulticast),
            4 => Ok(EvpnRouteType::EthernetSegment),
            5 => Ok(EvpnRouteType::IpPrefix),
            n => Err(BgpError::UnknownRouteType(n)),
        }
    }
}
impl EvpnRouteType {
    /// Route body lengths (after type and length octets) accepted on receive.
    pub fn valid_lengths(&self) -> &'static [usize] {
        match self {
            EvpnRouteType::AutoDiscovery => &[25],
            // one or two VNI tags, no/ipv4/ipv6 address
            EvpnRouteType::MacIp => &[33, 37, 49, 36, 40, 52],
            EvpnRouteType::InclusiveMulticast => &[17, 29],
            EvpnRouteType::EthernetSegment => &[23, 35],
            EvpnRouteType::IpPrefix => &[34, 58],
        }
    }
}

///EVPN ESI field, type octet followed by 9 value octets
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(transparent))]
pub struct EvpnEsi {
    pub v: [u8; 10],
}
impl EvpnEsi {
    pub fn new(src: &[u8; 10]) -> EvpnEsi {
        EvpnEsi { v: *src }
    }
    pub fn is_zero(&self) -> bool {
        !self.v.iter().any(|x| (*x) != 0)
    }
    fn decode_from(buf: &[u8]) -> EvpnEsi {
        let mut v = [0_u8; 10];
        v.copy_from_slice(&buf[0..10]);
        EvpnEsi { v }
    }
}
impl std::fmt::Display for EvpnEsi {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_zero() {
            return "0".fmt(f);
        }
        for (i, vl) in self.v.iter().enumerate() {
            if i > 0 {
                ":".fmt(f)?;
            }
            write!(f, "{:02x}", vl)?;
        }
        Ok(())
    }
}

/// EVPN Ethernet Auto-Discovery (A-D) route key
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnAutoDiscovery {
    pub esi: EvpnEsi,
    pub ether_tag: u32,
}

/// EVPN MAC/IP Advertisement route key
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnMacIp {
    pub esi: EvpnEsi,
    pub ether_tag: u32,
    pub mac: MacAddress,
    /// None is "no IP", distinct from 0.0.0.0
    pub ip: Option<IpAddr>,
}

/// EVPN Inclusive Multicast Ethernet Tag route key
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnInclusiveMulticast {
    pub ether_tag: u32,
    pub originator: IpAddr,
}

/// EVPN Ethernet Segment route key
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnEthernetSegment {
    pub esi: EvpnEsi,
    pub originator: IpAddr,
}

/// EVPN IP Prefix route key, prefix and gateway share address family
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnIpPrefix {
    pub esi: EvpnEsi,
    pub ether_tag: u32,
    pub prefix: IpAddr,
    pub prefixlen: u8,
    pub gw_ip: IpAddr,
}

/// EVPN prefix, one variant per route type
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum EvpnPrefix {
    AutoDiscovery(EvpnAutoDiscovery),
    MacIp(EvpnMacIp),
    InclusiveMulticast(EvpnInclusiveMulticast),
    EthernetSegment(EvpnEthernetSegment),
    IpPrefix(EvpnIpPrefix),
}

/// Builds MAC/IP advertisement prefix with zero ESI and ethernet tag.
/// ```
/// use zettaevpn::prelude::*;
///
/// let p = build_type2_prefix(MacAddress::from_u64(0x0a0b0c0d0e0f), None);
/// assert_eq!(p.route_type(), EvpnRouteType::MacIp);
/// assert_eq!(p.prefixlen(), 192);
/// ```
pub fn build_type2_prefix(mac: MacAddress, ip: Option<IpAddr>) -> EvpnPrefix {
    EvpnPrefix::MacIp(EvpnMacIp {
        esi: EvpnEsi::default(),
        ether_tag: 0,
        mac,
        ip,
    })
}

/// Builds inclusive multicast prefix for an ipv4 originator.
pub fn build_type3_prefix(originator_ip: Ipv4Addr) -> EvpnPrefix {
    EvpnPrefix::InclusiveMulticast(EvpnInclusiveMulticast {
        ether_tag: 0,
        originator: IpAddr::V4(originator_ip),
    })
}

impl EvpnPrefix {
    pub fn route_type(&self) -> EvpnRouteType {
        match self {
            EvpnPrefix::AutoDiscovery(_) => EvpnRouteType::AutoDiscovery,
            EvpnPrefix::MacIp(_) => EvpnRouteType::MacIp,
            EvpnPrefix::InclusiveMulticast(_) => EvpnRouteType::InclusiveMulticast,
            EvpnPrefix::EthernetSegment(_) => EvpnRouteType::EthernetSegment,
            EvpnPrefix::IpPrefix(_) => EvpnRouteType::IpPrefix,
        }
    }
    /// Prefix length in bits. Fixed for types 2 and 3, otherwise the size of
    /// the key fields present.
    pub fn prefixlen(&self) -> usize {
        match self {
            EvpnPrefix::MacIp(_) => EVPN_TYPE_2_ROUTE_PREFIXLEN,
            EvpnPrefix::InclusiveMulticast(_) => EVPN_TYPE_3_ROUTE_PREFIXLEN,
            EvpnPrefix::AutoDiscovery(_) => (10 + 4) * 8,
            EvpnPrefix::EthernetSegment(r) => 10 * 8 + 8 + addr_bits(&r.originator) as usize,
            EvpnPrefix::IpPrefix(r) => {
                (10 + 4 + 1) * 8 + 2 * addr_bits(&r.prefix) as usize
            }
        }
    }
    /// Key the route is stored under. A MAC/IP route is keyed on MAC and IP
    /// only, its ESI and ethernet tag are zeroed. Other types are their own
    /// key.
    /// ```
    /// use zettaevpn::prelude::*;
    ///
    /// let p = EvpnPrefix::MacIp(EvpnMacIp {
    ///     esi: EvpnEsi::new(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
    ///     ether_tag: 5,
    ///     mac: MacAddress::from_u64(1),
    ///     ip: None,
    /// });
    /// assert_eq!(p.table_key(), build_type2_prefix(MacAddress::from_u64(1), None));
    /// ```
    pub fn table_key(&self) -> EvpnPrefix {
        match self {
            EvpnPrefix::MacIp(r) => build_type2_prefix(r.mac, r.ip),
            p => p.clone(),
        }
    }
    /// ESI and ethernet tag of a MAC/IP route
    pub fn segment(&self) -> Option<(EvpnEsi, u32)> {
        match self {
            EvpnPrefix::MacIp(r) => Some((r.esi, r.ether_tag)),
            _ => None,
        }
    }
    /// Same prefix with given ESI and ethernet tag, MAC/IP routes only
    pub fn with_segment(&self, esi: EvpnEsi, ether_tag: u32) -> EvpnPrefix {
        match self {
            EvpnPrefix::MacIp(r) => EvpnPrefix::MacIp(EvpnMacIp {
                esi,
                ether_tag,
                mac: r.mac,
                ip: r.ip,
            }),
            p => p.clone(),
        }
    }
    /// MAC address of a MAC/IP route
    pub fn mac(&self) -> Option<&MacAddress> {
        match self {
            EvpnPrefix::MacIp(r) => Some(&r.mac),
            _ => None,
        }
    }
    /// Number of VNI tags this route type carries in NLRI
    fn tag_count(&self, tags: Option<&VniTags>) -> usize {
        match self {
            EvpnPrefix::AutoDiscovery(_) | EvpnPrefix::IpPrefix(_) => 1,
            EvpnPrefix::MacIp(_) => match tags {
                Some(VniTags { l3: Some(_), .. }) => 2,
                _ => 1,
            },
            EvpnPrefix::InclusiveMulticast(_) | EvpnPrefix::EthernetSegment(_) => 0,
        }
    }
    /// Route body length, RD included, with given tags
    pub fn route_len(&self, tags: Option<&VniTags>) -> usize {
        let body = match self {
            EvpnPrefix::AutoDiscovery(_) => 10 + 4,
            EvpnPrefix::MacIp(r) => {
                10 + 4 + 1 + 6 + 1 + r.ip.map(|a| addr_bits(&a) as usize / 8).unwrap_or(0)
            }
            EvpnPrefix::InclusiveMulticast(r) => 4 + 1 + addr_bits(&r.originator) as usize / 8,
            EvpnPrefix::EthernetSegment(r) => 10 + 1 + addr_bits(&r.originator) as usize / 8,
            EvpnPrefix::IpPrefix(r) => 10 + 4 + 1 + 2 * (addr_bits(&r.prefix) as usize / 8),
        };
        8 + body + 3 * self.tag_count(tags)
    }
}
impl std::fmt::Display for EvpnPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EvpnPrefix::AutoDiscovery(r) => write!(f, "[1]:[{}]:[{}]", r.esi, r.ether_tag),
            EvpnPrefix::MacIp(r) => {
                write!(f, "[2]:[{}]:[48]:[{}]", r.ether_tag, r.mac)?;
                if let Some(ip) = r.ip {
                    write!(f, ":[{}]:[{}]", addr_bits(&ip), ip)?;
                }
                Ok(())
            }
            EvpnPrefix::InclusiveMulticast(r) => write!(
                f,
                "[3]:[{}]:[{}]:[{}]",
                r.ether_tag,
                addr_bits(&r.originator),
                r.originator
            ),
            EvpnPrefix::EthernetSegment(r) => write!(
                f,
                "[4]:[{}]:[{}]:[{}]",
                r.esi,
                addr_bits(&r.originator),
                r.originator
            ),
            EvpnPrefix::IpPrefix(r) => write!(
                f,
                "[5]:[{}]:[{}]:[{}/{}]:[{}]",
                r.esi, r.ether_tag, r.prefix, r.prefixlen, r.gw_ip
            ),
        }
    }
}

/// VNI tags carried with a route: the L2 VNI and, for symmetric routing,
/// the L3 VNI (type 2 only).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct VniTags {
    pub l2: Vni,
    pub l3: Option<Vni>,
}
impl VniTags {
    pub fn l2(vni: Vni) -> VniTags {
        VniTags { l2: vni, l3: None }
    }
}
impl std::fmt::Display for VniTags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.l3 {
            None => write!(f, "{}", self.l2),
            Some(l3) => write!(f, "{}/{}", self.l2, l3),
        }
    }
}

/// One EVPN route as carried in NLRI: RD, prefix and extracted tags.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct EvpnNlri {
    pub rd: BgpRD,
    pub prefix: EvpnPrefix,
    /// Present for types 1, 2 and 5, absent for types 3 and 4
    pub tags: Option<VniTags>,
}
impl EvpnNlri {
    pub fn new(rd: BgpRD, prefix: EvpnPrefix, tags: Option<VniTags>) -> EvpnNlri {
        EvpnNlri { rd, prefix, tags }
    }
    /// Bytes needed to encode, type and length octets included.
    pub fn encoded_len(&self) -> usize {
        2 + self.prefix.route_len(self.tags.as_ref())
    }
}
impl std::fmt::Display for EvpnNlri {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.rd, self.prefix)?;
        if let Some(t) = &self.tags {
            write!(f, " vni {}", t)?;
        }
        Ok(())
    }
}

fn need(buf: &[u8], offset: usize, n: usize) -> Result<(), NlriError> {
    if buf.len() < offset + n {
        Err(NlriError::Truncated {
            offset,
            need: offset + n - buf.len(),
        })
    } else {
        Ok(())
    }
}

fn ip_len_bytes(bits: u8) -> Result<usize, NlriError> {
    match bits {
        0 => Ok(0),
        32 => Ok(4),
        128 => Ok(16),
        n => Err(NlriError::InvalidIpLength(n)),
    }
}

/// Validates one route body (after type and length octets) without
/// allocating. Checks the length against the route type and the inner
/// MAC/IP length octets against the length.
pub fn check_route_body(route_type: u8, body: &[u8]) -> Result<(), NlriError> {
    let rt = EvpnRouteType::try_from(route_type)
        .map_err(|_| NlriError::UnknownRouteType(route_type))?;
    let len = body.len();
    if !rt.valid_lengths().contains(&len) {
        return Err(NlriError::InvalidLength { route_type, len });
    }
    match rt {
        EvpnRouteType::AutoDiscovery => Ok(()),
        EvpnRouteType::MacIp => {
            if body[22] != 48 {
                return Err(NlriError::InvalidMacLength(body[22]));
            }
            let iplen = ip_len_bytes(body[29])?;
            match len.checked_sub(30 + iplen) {
                Some(3) | Some(6) => Ok(()),
                _ => Err(NlriError::InvalidLength { route_type, len }),
            }
        }
        EvpnRouteType::InclusiveMulticast => {
            let iplen = ip_len_bytes(body[12])?;
            if iplen == 0 || len != 13 + iplen {
                return Err(NlriError::InvalidIpLength(body[12]));
            }
            Ok(())
        }
        EvpnRouteType::EthernetSegment => {
            let iplen = ip_len_bytes(body[18])?;
            if iplen == 0 || len != 19 + iplen {
                return Err(NlriError::InvalidIpLength(body[18]));
            }
            Ok(())
        }
        EvpnRouteType::IpPrefix => {
            let maxbits = if len == 34 { 32 } else { 128 };
            if body[22] > maxbits {
                return Err(NlriError::InvalidIpLength(body[22]));
            }
            Ok(())
        }
    }
}

fn decode_ip(buf: &[u8], n: usize) -> Result<IpAddr, BgpError> {
    decode_addr_from(&buf[0..n])
}

impl BgpAddrItem<EvpnNlri> for EvpnNlri {
    /// Decodes one route, type and length octets included.
    fn decode_from(buf: &[u8]) -> Result<(EvpnNlri, usize), BgpError> {
        need(buf, 0, 2)?;
        let route_type = buf[0];
        let routelen = buf[1] as usize;
        need(buf, 2, routelen)?;
        let body = &buf[2..2 + routelen];
        check_route_body(route_type, body)?;
        let (rd, mut pos) = BgpRD::decode_rd_from(body)?;
        let (prefix, tags) = match EvpnRouteType::try_from(route_type)? {
            EvpnRouteType::AutoDiscovery => {
                let esi = EvpnEsi::decode_from(&body[pos..]);
                let ether_tag = getn_u32(&body[pos + 10..]);
                pos += 14;
                (
                    EvpnPrefix::AutoDiscovery(EvpnAutoDiscovery { esi, ether_tag }),
                    decode_tag_from(&body[pos..]).map(VniTags::l2),
                )
            }
            EvpnRouteType::MacIp => {
                let esi = EvpnEsi::decode_from(&body[pos..]);
                let ether_tag = getn_u32(&body[pos + 10..]);
                pos += 15;
                let mac = MacAddress::from_network_bytes(&body[pos..])?;
                pos += 6;
                let iplen = ip_len_bytes(body[pos])?;
                pos += 1;
                let ip = if iplen > 0 {
                    Some(decode_ip(&body[pos..], iplen)?)
                } else {
                    None
                };
                pos += iplen;
                let l2 = decode_tag_from(&body[pos..]);
                let l3 = decode_tag_from(&body[pos + 3..]);
                (
                    EvpnPrefix::MacIp(EvpnMacIp {
                        esi,
                        ether_tag,
                        mac,
                        ip,
                    }),
                    l2.map(|l2| VniTags { l2, l3 }),
                )
            }
            EvpnRouteType::InclusiveMulticast => {
                let ether_tag = getn_u32(&body[pos..]);
                let iplen = ip_len_bytes(body[pos + 4])?;
                let originator = decode_ip(&body[pos + 5..], iplen)?;
                (
                    EvpnPrefix::InclusiveMulticast(EvpnInclusiveMulticast {
                        ether_tag,
                        originator,
                    }),
                    None,
                )
            }
            EvpnRouteType::EthernetSegment => {
                let esi = EvpnEsi::decode_from(&body[pos..]);
                let iplen = ip_len_bytes(body[pos + 10])?;
                let originator = decode_ip(&body[pos + 11..], iplen)?;
                (
                    EvpnPrefix::EthernetSegment(EvpnEthernetSegment { esi, originator }),
                    None,
                )
            }
            EvpnRouteType::IpPrefix => {
                let esi = EvpnEsi::decode_from(&body[pos..]);
                let ether_tag = getn_u32(&body[pos + 10..]);
                let prefixlen = body[pos + 14];
                pos += 15;
                let alen = if routelen == 34 { 4 } else { 16 };
                let prefix = decode_ip(&body[pos..], alen)?;
                let gw_ip = decode_ip(&body[pos + alen..], alen)?;
                pos += 2 * alen;
                (
                    EvpnPrefix::IpPrefix(EvpnIpPrefix {
                        esi,
                        ether_tag,
                        prefix,
                        prefixlen,
                        gw_ip,
                    }),
                    decode_tag_from(&body[pos..]).map(VniTags::l2),
                )
            }
        };
        Ok((EvpnNlri { rd, prefix, tags }, routelen + 2))
    }
    /// Encodes one route, type and length octets included.
    fn encode_to(&self, buf: &mut [u8]) -> Result<usize, BgpError> {
        let total = self.encoded_len();
        if total - 2 > 0xff {
            return Err(BgpError::too_many_data());
        }
        if buf.len() < total {
            return Err(BgpError::insufficient_buffer_size());
        }
        let route_type = self.prefix.route_type() as u8;
        let tags = match (self.prefix.tag_count(self.tags.as_ref()), &self.tags) {
            (0, _) => None,
            (_, Some(t)) => Some(t),
            (_, None) => return Err(NlriError::MissingTag(route_type).into()),
        };
        buf[0] = route_type;
        buf[1] = (total - 2) as u8;
        let mut pos = 2 + self.rd.encode_rd_to(&mut buf[2..])?;
        match &self.prefix {
            EvpnPrefix::AutoDiscovery(r) => {
                buf[pos..pos + 10].copy_from_slice(&r.esi.v);
                setn_u32(r.ether_tag, &mut buf[pos + 10..pos + 14]);
                pos += 14;
            }
            EvpnPrefix::MacIp(r) => {
                buf[pos..pos + 10].copy_from_slice(&r.esi.v);
                setn_u32(r.ether_tag, &mut buf[pos + 10..pos + 14]);
                pos += 14;
                buf[pos] = 48;
                buf[pos + 1..pos + 7].copy_from_slice(&r.mac.mac_address);
                pos += 7;
                match &r.ip {
                    None => {
                        buf[pos] = 0;
                        pos += 1;
                    }
                    Some(ip) => {
                        buf[pos] = addr_bits(ip);
                        pos += 1;
                        pos += encode_addr_to(ip, &mut buf[pos..])?;
                    }
                }
            }
            EvpnPrefix::InclusiveMulticast(r) => {
                setn_u32(r.ether_tag, &mut buf[pos..pos + 4]);
                buf[pos + 4] = addr_bits(&r.originator);
                pos += 5;
                pos += encode_addr_to(&r.originator, &mut buf[pos..])?;
            }
            EvpnPrefix::EthernetSegment(r) => {
                buf[pos..pos + 10].copy_from_slice(&r.esi.v);
                buf[pos + 10] = addr_bits(&r.originator);
                pos += 11;
                pos += encode_addr_to(&r.originator, &mut buf[pos..])?;
            }
            EvpnPrefix::IpPrefix(r) => {
                if r.prefix.is_ipv4() != r.gw_ip.is_ipv4() {
                    return Err(NlriError::MixedAddressFamily.into());
                }
                buf[pos..pos + 10].copy_from_slice(&r.esi.v);
                setn_u32(r.ether_tag, &mut buf[pos + 10..pos + 14]);
                buf[pos + 14] = r.prefixlen;
                pos += 15;
                pos += encode_addr_to(&r.prefix, &mut buf[pos..])?;
                pos += encode_addr_to(&r.gw_ip, &mut buf[pos..])?;
            }
        }
        if let Some(t) = tags {
            buf[pos..pos + 3].copy_from_slice(&vni_to_tag(t.l2));
            pos += 3;
            if let (EvpnPrefix::MacIp(_), Some(l3)) = (&self.prefix, t.l3) {
                buf[pos..pos + 3].copy_from_slice(&vni_to_tag(l3));
                pos += 3;
            }
        }
        debug_assert_eq!(pos, total);
        Ok(pos)
    }
}
