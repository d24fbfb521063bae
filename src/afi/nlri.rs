// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! EVPN NLRI stream codec: sanity check, parse and encode of the
//! MP_REACH/MP_UNREACH NLRI field, with optional addpath identifiers.
//!
//! A malformed prefix anywhere in the stream rejects the whole stream.

use crate::afi::evpn::{check_route_body, EvpnNlri};
use crate::error::{BgpError, NlriError};
use crate::util::*;
use crate::BgpAddrItem;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// BGP path identifier
pub type BgpPathId = u32;

/// NLRI with addpath identifier. Path id is 0 when addpath is not in use.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct WithPathId<T> {
    pub pathid: BgpPathId,
    pub nlri: T,
}
impl<T> WithPathId<T> {
    pub fn new(pathid: BgpPathId, inner: T) -> WithPathId<T> {
        WithPathId {
            pathid,
            nlri: inner,
        }
    }
}
impl<T: std::fmt::Display> std::fmt::Display for WithPathId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.pathid == 0 {
            self.nlri.fmt(f)
        } else {
            write!(f, "<pathid:{}> {}", self.pathid, self.nlri)
        }
    }
}

/// Walks the NLRI without allocating and returns the number of prefixes.
///
/// Every prefix must have a known route type, a length valid for that type
/// and consistent inner length octets, and the prefixes must cover `buf`
/// exactly.
pub fn nlri_sanity_check(buf: &[u8], addpath: bool) -> Result<usize, BgpError> {
    let mut curpos: usize = 0;
    let mut count: usize = 0;
    while curpos < buf.len() {
        if addpath {
            if buf.len() - curpos < 4 {
                return Err(truncated(buf, curpos, 4));
            }
            curpos += 4;
        }
        if buf.len() - curpos < 2 {
            return Err(truncated(buf, curpos, 2));
        }
        let route_type = buf[curpos];
        let psize = buf[curpos + 1] as usize;
        curpos += 2;
        if buf.len() - curpos < psize {
            return Err(truncated(buf, curpos, psize));
        }
        check_route_body(route_type, &buf[curpos..curpos + psize])?;
        curpos += psize;
        count += 1;
    }
    Ok(count)
}

fn truncated(buf: &[u8], offset: usize, n: usize) -> BgpError {
    NlriError::Truncated {
        offset,
        need: offset + n - buf.len(),
    }
    .into()
}

/// Parses the NLRI into routes. Runs the sanity pass first so the result
/// is sized once and nothing is returned for a malformed stream.
pub fn nlri_parse(buf: &[u8], addpath: bool) -> Result<Vec<WithPathId<EvpnNlri>>, BgpError> {
    let count = nlri_sanity_check(buf, addpath)?;
    let mut v = Vec::with_capacity(count);
    let mut curpos: usize = 0;
    while curpos < buf.len() {
        let mut pathid: BgpPathId = 0;
        if addpath {
            pathid = getn_u32(&buf[curpos..]);
            curpos += 4;
        }
        let (nlri, sz) = EvpnNlri::decode_from(&buf[curpos..])?;
        v.push(WithPathId::new(pathid, nlri));
        curpos += sz;
    }
    Ok(v)
}

/// Encodes one prefix, prefixed by the path id when addpath is negotiated.
pub fn encode_prefix(
    buf: &mut [u8],
    nlri: &EvpnNlri,
    addpath_tx_id: Option<BgpPathId>,
) -> Result<usize, BgpError> {
    let mut curpos: usize = 0;
    if let Some(id) = addpath_tx_id {
        if buf.len() < 4 {
            return Err(BgpError::insufficient_buffer_size());
        }
        setn_u32(id, &mut buf[0..4]);
        curpos += 4;
    }
    curpos += nlri.encode_to(&mut buf[curpos..])?;
    Ok(curpos)
}

/// Encodes a list of prefixes into a freshly allocated NLRI field.
pub fn encode_nlri<'a, I>(items: I, addpath_tx_id: Option<BgpPathId>) -> Result<Vec<u8>, BgpError>
where
    I: IntoIterator<Item = &'a EvpnNlri>,
{
    let mut out = Vec::new();
    for n in items {
        let start = out.len();
        let sz = n.encoded_len() + if addpath_tx_id.is_some() { 4 } else { 0 };
        out.resize(start + sz, 0);
        encode_prefix(&mut out[start..], n, addpath_tx_id)?;
    }
    Ok(out)
}
