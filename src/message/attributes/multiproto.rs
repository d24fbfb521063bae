// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! BGP multiprotocol update and withdraw path attributes, which carries EVPN routes with mp-bgp

use crate::afi::*;
use crate::message::attributes::*;
use crate::util::*;

fn check_afi_safi(buf: &[u8]) -> Result<(), BgpError> {
    if buf.len() < 3 {
        return Err(BgpError::insufficient_buffer_size());
    }
    let afi = getn_u16(buf);
    let safi = buf[2];
    if afi != AFI_L2VPN || safi != SAFI_EVPN {
        return Err(BgpError::from_string(format!(
            "Unsupported AFI/SAFI {}/{}",
            afi, safi
        )));
    }
    Ok(())
}

fn encode_nlri_list(
    peer: &BgpSessionParams,
    nlri: &[WithPathId<EvpnNlri>],
    buf: &mut [u8],
) -> Result<usize, BgpError> {
    let addpath = peer.check_addpath_send(AFI_L2VPN, SAFI_EVPN);
    let mut curpos: usize = 0;
    for n in nlri.iter() {
        let pathid = if addpath { Some(n.pathid) } else { None };
        curpos += encode_prefix(&mut buf[curpos..], &n.nlri, pathid)?;
    }
    Ok(curpos)
}

/// BGP multiprotocol updates for L2VPN/EVPN
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BgpMPUpdates {
    /// next hop for this updates, VTEP address
    pub nexthop: std::net::IpAddr,
    /// NLRI
    pub nlri: Vec<WithPathId<EvpnNlri>>,
}
impl BgpMPUpdates {
    pub fn new(nexthop: std::net::IpAddr, nlri: Vec<WithPathId<EvpnNlri>>) -> BgpMPUpdates {
        BgpMPUpdates { nexthop, nlri }
    }
    pub fn decode_from(peer: &BgpSessionParams, buf: &[u8]) -> Result<BgpMPUpdates, BgpError> {
        check_afi_safi(buf)?;
        if buf.len() < 4 {
            return Err(BgpError::insufficient_buffer_size());
        }
        let nhlen = buf[3] as usize;
        let mut curpos: usize = 4;
        if buf.len() < curpos + nhlen + 1 {
            return Err(BgpError::static_str("Invalid MP_REACH next hop length"));
        }
        let nh = match nhlen {
            4 | 16 => decode_addr_from(&buf[curpos..curpos + nhlen])?,
            // global + link-local
            32 => decode_addr_from(&buf[curpos..curpos + 16])?,
            _ => return Err(BgpError::static_str("Invalid MP_REACH next hop length")),
        };
        curpos += nhlen;
        let snpa_count = buf[curpos];
        curpos += 1;
        for _ in 0..snpa_count {
            let snpa_len = match buf.get(curpos) {
                Some(l) => *l as usize,
                None => return Err(BgpError::static_str("Invalid SNPA length")),
            };
            curpos += 1 + snpa_len;
        }
        if curpos > buf.len() {
            return Err(BgpError::static_str("Invalid SNPA length"));
        }
        let nlri = nlri_parse(
            &buf[curpos..],
            peer.check_addpath_receive(AFI_L2VPN, SAFI_EVPN),
        )?;
        Ok(BgpMPUpdates { nexthop: nh, nlri })
    }
}

impl std::fmt::Debug for BgpMPUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgpMPUpdates")
            .field("nexthop", &self.nexthop)
            .field("nlri", &self.nlri)
            .finish()
    }
}
impl std::fmt::Display for BgpMPUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BgpMPUpdates ({} [", self.nexthop)?;
        for (i, n) in self.nlri.iter().enumerate() {
            if i > 0 {
                ", ".fmt(f)?;
            }
            n.fmt(f)?;
        }
        "])".fmt(f)
    }
}
impl BgpAttr for BgpMPUpdates {
    fn attr(&self) -> BgpAttrParams {
        BgpAttrParams {
            typecode: 14,
            flags: 144,
        }
    }
    fn encode_to(&self, peer: &BgpSessionParams, buf: &mut [u8]) -> Result<usize, BgpError> {
        if buf.len() < 5 {
            return Err(BgpError::insufficient_buffer_size());
        }
        setn_u16(AFI_L2VPN, &mut buf[..2]);
        buf[2] = SAFI_EVPN;
        let mut curpos: usize = 4;
        let nhl = encode_addr_to(&self.nexthop, &mut buf[curpos..])?;
        buf[3] = nhl as u8;
        curpos += nhl;
        if buf.len() <= curpos {
            return Err(BgpError::insufficient_buffer_size());
        }
        buf[curpos] = 0; //snpa
        curpos += 1;
        curpos += encode_nlri_list(peer, &self.nlri, &mut buf[curpos..])?;
        Ok(curpos)
    }
}

/// BGP multiprotocol withdraws for L2VPN/EVPN
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BgpMPWithdraws {
    /// NLRI
    pub nlri: Vec<WithPathId<EvpnNlri>>,
}
impl BgpMPWithdraws {
    pub fn new(nlri: Vec<WithPathId<EvpnNlri>>) -> BgpMPWithdraws {
        BgpMPWithdraws { nlri }
    }
    pub fn decode_from(peer: &BgpSessionParams, buf: &[u8]) -> Result<BgpMPWithdraws, BgpError> {
        check_afi_safi(buf)?;
        let nlri = nlri_parse(&buf[3..], peer.check_addpath_receive(AFI_L2VPN, SAFI_EVPN))?;
        Ok(BgpMPWithdraws { nlri })
    }
}
impl std::fmt::Debug for BgpMPWithdraws {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgpMPWithdraws")
            .field("nlri", &self.nlri)
            .finish()
    }
}
impl std::fmt::Display for BgpMPWithdraws {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BgpMPWithdraws ({} routes)", self.nlri.len())
    }
}
impl BgpAttr for BgpMPWithdraws {
    fn attr(&self) -> BgpAttrParams {
        BgpAttrParams {
            typecode: 15,
            flags: 144,
        }
    }
    fn encode_to(&self, peer: &BgpSessionParams, buf: &mut [u8]) -> Result<usize, BgpError> {
        if buf.len() < 3 {
            return Err(BgpError::insufficient_buffer_size());
        }
        setn_u16(AFI_L2VPN, &mut buf[..2]);
        buf[2] = SAFI_EVPN;
        let curpos: usize = 3;
        Ok(curpos + encode_nlri_list(peer, &self.nlri, &mut buf[curpos..])?)
    }
}
