// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This module contains BGP path attributes used by EVPN
pub use crate::error::BgpError;
pub use crate::BgpSessionParams;
use crate::util::*;
pub mod extcommunity;
pub mod multiproto;

use extcommunity::BgpExtCommunityList;
use multiproto::{BgpMPUpdates, BgpMPWithdraws};

/// BGP path attribute mandatory parameters - typecode and flags
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BgpAttrParams {
    pub typecode: u8,
    pub flags: u8,
}

pub trait BgpAttr: std::fmt::Display + std::fmt::Debug {
    fn encode_to(&self, peer: &BgpSessionParams, buf: &mut [u8]) -> Result<usize, BgpError>;
    fn attr(&self) -> BgpAttrParams;
}

/// BGP path attribute
#[derive(Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub enum BgpAttrItem {
    MPUpdates(BgpMPUpdates),
    MPWithdraws(BgpMPWithdraws),
    ExtCommunityList(BgpExtCommunityList),
}

impl BgpAttrItem {
    /// Decodes attribute body. Returns None for attributes EVPN does not look at.
    pub fn decode_from(
        peer: &BgpSessionParams,
        typecode: u8,
        buf: &[u8],
    ) -> Result<Option<BgpAttrItem>, BgpError> {
        match typecode {
            14 => Ok(Some(BgpAttrItem::MPUpdates(BgpMPUpdates::decode_from(
                peer, buf,
            )?))),
            15 => Ok(Some(BgpAttrItem::MPWithdraws(
                BgpMPWithdraws::decode_from(peer, buf)?,
            ))),
            16 => Ok(Some(BgpAttrItem::ExtCommunityList(
                BgpExtCommunityList::decode_from(buf)?,
            ))),
            _ => Ok(None),
        }
    }
    fn encode_bgpattr(
        attr: &impl BgpAttr,
        peer: &BgpSessionParams,
        buf: &mut [u8],
    ) -> Result<usize, BgpError> {
        let attrparams = attr.attr();
        if buf.len() < 4 {
            return Err(BgpError::insufficient_buffer_size());
        }
        buf[0] = attrparams.flags;
        buf[1] = attrparams.typecode;
        let mut curpos: usize = 2;
        if (attrparams.flags & 16) > 0 {
            curpos += 2;
        } else {
            curpos += 1;
        }
        let attrlen = attr.encode_to(peer, &mut buf[curpos..])?;
        if (attrparams.flags & 16) > 0 {
            if attrlen > 65535 {
                return Err(BgpError::static_str("Invalid path attribute length"));
            }
            setn_u16(attrlen as u16, &mut buf[2..4]);
        } else {
            if attrlen > 255 {
                return Err(BgpError::static_str("Invalid path attribute length"));
            }
            buf[2] = attrlen as u8;
        }
        Ok(curpos + attrlen)
    }
    /// Encodes attribute with its flags, typecode and length header.
    pub fn encode_to(&self, peer: &BgpSessionParams, buf: &mut [u8]) -> Result<usize, BgpError> {
        match self {
            BgpAttrItem::MPUpdates(pa) => BgpAttrItem::encode_bgpattr(pa, peer, buf),
            BgpAttrItem::MPWithdraws(pa) => BgpAttrItem::encode_bgpattr(pa, peer, buf),
            BgpAttrItem::ExtCommunityList(pa) => BgpAttrItem::encode_bgpattr(pa, peer, buf),
        }
    }
}
