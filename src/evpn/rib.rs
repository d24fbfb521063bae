// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Seams to the base BGP RIB and to the advertisement transport

use crate::afi::*;
use crate::evpn::route::{EvpnAttrs, EvpnPath};
use log::warn;
use std::sync::mpsc;

/// Table a RIB operation applies to
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum RibTable {
    /// L2VPN/EVPN global table
    Global,
    /// Virtual table of a VNI
    Vni(Vni),
}

/// RIB key: table, RD and prefix, within AFI L2VPN / SAFI EVPN
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RibKey {
    pub table: RibTable,
    pub rd: BgpRD,
    pub prefix: EvpnPrefix,
}
impl RibKey {
    pub fn new(table: RibTable, rd: BgpRD, prefix: EvpnPrefix) -> RibKey {
        RibKey { table, rd, prefix }
    }
}

/// Base RIB as seen from EVPN. Best path selection across sources is the
/// RIB's business.
pub trait EvpnRib {
    fn install(&mut self, key: &RibKey, path: &EvpnPath);
    fn withdraw(&mut self, key: &RibKey, path: &EvpnPath);
}

/// Recorded RIB operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RibOp {
    Install(RibKey, EvpnPath),
    Withdraw(RibKey, EvpnPath),
}

/// Records operations in order, for callers that apply them later.
impl EvpnRib for Vec<RibOp> {
    fn install(&mut self, key: &RibKey, path: &EvpnPath) {
        self.push(RibOp::Install(key.clone(), path.clone()));
    }
    fn withdraw(&mut self, key: &RibKey, path: &EvpnPath) {
        self.push(RibOp::Withdraw(key.clone(), path.clone()));
    }
}

/// Peers an advertisement goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSet {
    /// Every established EVPN peer
    All,
}

/// Encoded NLRI handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvpnAdvertisement {
    Announce {
        peers: PeerSet,
        nlri: Vec<u8>,
        attrs: EvpnAttrs,
    },
    Withdraw {
        peers: PeerSet,
        nlri: Vec<u8>,
    },
}
impl EvpnAdvertisement {
    pub fn nlri(&self) -> &[u8] {
        match self {
            EvpnAdvertisement::Announce { nlri, .. } => nlri,
            EvpnAdvertisement::Withdraw { nlri, .. } => nlri,
        }
    }
    pub fn is_withdraw(&self) -> bool {
        matches!(self, EvpnAdvertisement::Withdraw { .. })
    }
}

/// Outbound side. Calls must not block, sending to peers happens elsewhere.
pub trait EvpnTransport {
    fn advertise(&mut self, peers: PeerSet, nlri: Vec<u8>, attrs: &EvpnAttrs);
    fn withdraw(&mut self, peers: PeerSet, nlri: Vec<u8>);
}

/// Keeps advertisements in order, for callers that flush them later.
impl EvpnTransport for Vec<EvpnAdvertisement> {
    fn advertise(&mut self, peers: PeerSet, nlri: Vec<u8>, attrs: &EvpnAttrs) {
        self.push(EvpnAdvertisement::Announce {
            peers,
            nlri,
            attrs: attrs.clone(),
        });
    }
    fn withdraw(&mut self, peers: PeerSet, nlri: Vec<u8>) {
        self.push(EvpnAdvertisement::Withdraw { peers, nlri });
    }
}

impl EvpnTransport for mpsc::Sender<EvpnAdvertisement> {
    fn advertise(&mut self, peers: PeerSet, nlri: Vec<u8>, attrs: &EvpnAttrs) {
        let adv = EvpnAdvertisement::Announce {
            peers,
            nlri,
            attrs: attrs.clone(),
        };
        if let Err(e) = self.send(adv) {
            warn!("EVPN transport gone, announce dropped: {:?}", e.0);
        }
    }
    fn withdraw(&mut self, peers: PeerSet, nlri: Vec<u8>) {
        if let Err(e) = self.send(EvpnAdvertisement::Withdraw { peers, nlri }) {
            warn!("EVPN transport gone, withdraw dropped: {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evpn::route::PathSource;

    #[test]
    fn test_channel_transport() {
        let (mut tx, rx) = mpsc::channel::<EvpnAdvertisement>();
        tx.advertise(PeerSet::All, vec![3, 17], &EvpnAttrs::default());
        tx.withdraw(PeerSet::All, vec![3, 17]);
        let a = rx.try_recv().unwrap();
        assert!(!a.is_withdraw());
        assert_eq!(a.nlri(), &[3, 17]);
        assert!(rx.try_recv().unwrap().is_withdraw());
        drop(rx);
        // receiver gone is not an error for the caller
        tx.withdraw(PeerSet::All, vec![]);
    }
    #[test]
    fn test_recording_rib() {
        let mut rib: Vec<RibOp> = Vec::new();
        let key = RibKey::new(
            RibTable::Vni(100),
            BgpRD::new(65000, 1),
            build_type3_prefix(std::net::Ipv4Addr::new(10, 0, 0, 2)),
        );
        let path = EvpnPath::new(PathSource::Local, key.rd, None, EvpnAttrs::default());
        rib.install(&key, &path);
        rib.withdraw(&key, &path);
        assert_eq!(rib.len(), 2);
        assert!(matches!(&rib[1], RibOp::Withdraw(k, _) if k == &key));
    }
}
