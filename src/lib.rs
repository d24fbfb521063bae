// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This is a BGP EVPN control plane library for Rust.
//!
//! It keeps per-VNI route tables, the route-target to VNI reverse index,
//! encodes and decodes L2VPN/EVPN NLRI and moves EVPN routes between the
//! local VTEP, the VNIs and the peers.
//!
//! ## Supported EVPN route types
//!  * 1 - Ethernet auto-discovery (codec only)
//!  * 2 - MAC/IP advertisement
//!  * 3 - Inclusive multicast ethernet tag
//!  * 4 - Ethernet segment (codec only)
//!  * 5 - IP prefix (codec only)
//!
//! ## Supported path attributes
//!  * Extended communities: route targets, MAC mobility
//!  * MP_REACH_NLRI and MP_UNREACH_NLRI for L2VPN/EVPN
//!
//! # Quick Start
//!
//! The library does not manage BGP sessions. Base RIB and advertisement
//! transport are supplied by the caller through [`evpn::EvpnRib`] and
//! [`evpn::EvpnTransport`].
//!
//! ```
//! use zettaevpn::prelude::*;
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel::<EvpnAdvertisement>();
//! let mut evpn = EvpnInstance::new(65000, "10.0.0.1".parse().unwrap(), Vec::<RibOp>::new(), tx);
//! evpn.create_update_vni(100).unwrap();
//! evpn.local_vni_add(100, "10.0.0.1".parse().unwrap()).unwrap();
//! // inclusive multicast route went out to peers
//! let adv = rx.try_recv().unwrap();
//! let nlri = nlri_parse(adv.nlri(), false).unwrap();
//! assert_eq!(nlri[0].nlri.prefix.route_type(), EvpnRouteType::InclusiveMulticast);
//! ```
//!
#[cfg(feature = "serialization")]
extern crate serde;

pub mod afi;
pub mod config;
pub mod error;
pub mod evpn;
pub mod message;
pub mod prelude;
pub mod util;

use error::*;
use util::*;

/// This trait represens NLRI which have sequental chain encoding with opaque length.
pub trait BgpAddrItem<T: std::marker::Sized> {
    /// Decode from buffer. Returns entity and consumed buffer length, or error.
    fn decode_from(buf: &[u8]) -> Result<(T, usize), BgpError>;
    /// Encode entity into the buffer. Returns consumed buffer length, or error.
    fn encode_to(&self, buf: &mut [u8]) -> Result<usize, BgpError>;
}

/// BGP capability AddPath.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BgpCapAddPath {
    pub afi: u16,
    pub safi: u8,
    pub send: bool,
    pub receive: bool,
}
impl BgpCapAddPath {
    /// AddPath for L2VPN/EVPN
    pub fn new_evpn(send: bool, receive: bool) -> BgpCapAddPath {
        BgpCapAddPath {
            afi: afi::AFI_L2VPN,
            safi: afi::SAFI_EVPN,
            send,
            receive,
        }
    }
    pub fn response(src: &BgpCapAddPath) -> BgpCapAddPath {
        BgpCapAddPath {
            afi: src.afi,
            safi: src.safi,
            send: src.receive,
            receive: src.send,
        }
    }
    pub fn encode_to(&self, buf: &mut [u8]) -> Result<(), BgpError> {
        if buf.len() < 4 {
            return Err(BgpError::insufficient_buffer_size());
        }
        setn_u16(self.afi, &mut buf[0..2]);
        buf[2] = self.safi;
        buf[3] = u8::from(self.receive) | (u8::from(self.send) << 1);
        Ok(())
    }
    pub fn decode_from(buf: &[u8]) -> Result<BgpCapAddPath, BgpError> {
        if buf.len() < 4 {
            return Err(BgpError::insufficient_buffer_size());
        }
        Ok(BgpCapAddPath {
            afi: getn_u16(&buf[0..2]),
            safi: buf[2],
            send: (buf[3] & 2) > 0,
            receive: (buf[3] & 1) > 0,
        })
    }
}

/// Negotiated parameters of the BGP session an UPDATE came from or goes to.
#[derive(Debug, Clone)]
pub struct BgpSessionParams {
    /// Peer autonomous system number.
    pub as_num: u32,
    /// Peer address, identifies the path source.
    pub peer_addr: std::net::IpAddr,
    /// Negotiated addpath capabilities.
    pub caps: Vec<BgpCapAddPath>,
}

impl BgpSessionParams {
    pub fn new(
        asnum: u32,
        peer_addr: std::net::IpAddr,
        caps: Vec<BgpCapAddPath>,
    ) -> BgpSessionParams {
        BgpSessionParams {
            as_num: asnum,
            peer_addr,
            caps,
        }
    }
    /// Search for specified addpath capability.
    pub fn find_addpath(&self, afi: u16, safi: u8) -> Option<&BgpCapAddPath> {
        self.caps.iter().find(|ap| ap.afi == afi && ap.safi == safi)
    }
    /// Search for specified addpath send capability.
    pub fn check_addpath_send(&self, afi: u16, safi: u8) -> bool {
        match self.find_addpath(afi, safi) {
            None => false,
            Some(x) => x.send,
        }
    }
    /// Search for specified addpath receive capability.
    pub fn check_addpath_receive(&self, afi: u16, safi: u8) -> bool {
        match self.find_addpath(afi, safi) {
            None => false,
            Some(x) => x.receive,
        }
    }
}
