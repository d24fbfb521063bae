// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! EVPN paths and per-prefix destinations

use crate::afi::*;
use crate::message::attributes::extcommunity::{BgpExtCommunityList, MacMobility};
#[cfg(feature = "serialization")]
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Where a path came from
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum PathSource {
    /// Originated by this VTEP
    Local,
    /// Received from a peer
    Peer { addr: IpAddr, pathid: BgpPathId },
}
impl std::fmt::Display for PathSource {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PathSource::Local => "local".fmt(f),
            PathSource::Peer { addr, pathid: 0 } => addr.fmt(f),
            PathSource::Peer { addr, pathid } => write!(f, "{} id {}", addr, pathid),
        }
    }
}

/// Path life cycle: `Received` -> `Validated` -> `Installed` | `Rejected`,
/// and `Withdrawn` once it is gone.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum RouteState {
    Received,
    Validated,
    Installed,
    Rejected,
    Withdrawn,
}

/// Path attributes EVPN cares about
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct EvpnAttrs {
    pub ext_communities: BgpExtCommunityList,
    pub nexthop: Option<IpAddr>,
}

/// One path of an EVPN prefix
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct EvpnPath {
    pub source: PathSource,
    pub rd: BgpRD,
    pub tags: Option<VniTags>,
    /// ESI of a MAC/IP route, not part of its table key
    pub esi: EvpnEsi,
    /// Ethernet tag of a MAC/IP route, not part of its table key
    pub ether_tag: u32,
    pub attrs: EvpnAttrs,
    pub state: RouteState,
}
impl EvpnPath {
    pub fn new(source: PathSource, rd: BgpRD, tags: Option<VniTags>, attrs: EvpnAttrs) -> EvpnPath {
        EvpnPath {
            source,
            rd,
            tags,
            esi: EvpnEsi::default(),
            ether_tag: 0,
            attrs,
            state: RouteState::Received,
        }
    }
    /// Takes ESI and ethernet tag from a received MAC/IP prefix.
    pub fn with_segment_of(mut self, prefix: &EvpnPrefix) -> EvpnPath {
        if let Some((esi, ether_tag)) = prefix.segment() {
            self.esi = esi;
            self.ether_tag = ether_tag;
        }
        self
    }
    /// Prefix as it goes on the wire, table key plus the path's segment
    pub fn wire_prefix(&self, key: &EvpnPrefix) -> EvpnPrefix {
        key.with_segment(self.esi, self.ether_tag)
    }
    /// Anything a peer sees changed between two versions of the path
    pub fn differs_on_wire(&self, other: &EvpnPath) -> bool {
        self.attrs != other.attrs
            || self.tags != other.tags
            || self.esi != other.esi
            || self.ether_tag != other.ether_tag
    }
    pub fn is_local(&self) -> bool {
        self.source == PathSource::Local
    }
    pub fn is_installed(&self) -> bool {
        self.state == RouteState::Installed
    }
    /// MAC mobility carried by the path, sequence 0 dynamic if none
    pub fn mac_mobility(&self) -> MacMobility {
        self.attrs.ext_communities.mac_mobility().unwrap_or_default()
    }
    /// Same origin: source and RD
    pub fn same_origin(&self, source: &PathSource, rd: &BgpRD) -> bool {
        self.source == *source && self.rd == *rd
    }
}

/// All paths known for one prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct EvpnDest {
    pub paths: Vec<EvpnPath>,
}

impl EvpnDest {
    pub fn new() -> EvpnDest {
        EvpnDest { paths: Vec::new() }
    }
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
    pub fn find(&self, source: &PathSource, rd: &BgpRD) -> Option<&EvpnPath> {
        self.paths.iter().find(|p| p.same_origin(source, rd))
    }
    pub fn local(&self) -> Option<&EvpnPath> {
        self.paths.iter().find(|p| p.is_local())
    }
    pub fn installed(&self) -> Option<&EvpnPath> {
        self.paths.iter().find(|p| p.is_installed())
    }
    /// Inserts the path or replaces the one with the same origin. The
    /// replacement inherits the state of the path it replaces, which is
    /// returned.
    pub fn upsert(&mut self, mut path: EvpnPath) -> Option<EvpnPath> {
        match self
            .paths
            .iter_mut()
            .find(|p| p.same_origin(&path.source, &path.rd))
        {
            Some(cur) => {
                path.state = cur.state;
                Some(std::mem::replace(cur, path))
            }
            None => {
                if path.state == RouteState::Received {
                    path.state = RouteState::Validated;
                }
                self.paths.push(path);
                None
            }
        }
    }
    /// Takes the path out, its state becomes `Withdrawn`. The second value
    /// tells whether it was installed.
    pub fn remove(&mut self, source: &PathSource, rd: &BgpRD) -> Option<(EvpnPath, bool)> {
        let pos = self.paths.iter().position(|p| p.same_origin(source, rd))?;
        let mut p = self.paths.remove(pos);
        let was = p.is_installed();
        p.state = RouteState::Withdrawn;
        Some((p, was))
    }
    /// Recomputes path states.
    ///
    /// MAC/IP routes install a single path chosen by MAC mobility: static
    /// over dynamic, then higher sequence; on a tie the installed path stays.
    /// Other route types install every path. Returns the paths whose
    /// installed status flipped, with their new state.
    pub fn select(&mut self, route_type: EvpnRouteType) -> Vec<EvpnPath> {
        let before: Vec<bool> = self.paths.iter().map(|p| p.is_installed()).collect();
        if route_type == EvpnRouteType::MacIp {
            let mut best = self.paths.iter().position(|p| p.is_installed());
            for (i, p) in self.paths.iter().enumerate() {
                best = match best {
                    None => Some(i),
                    Some(b) if b == i => Some(b),
                    Some(b) => {
                        if p.mac_mobility().preferred_over(&self.paths[b].mac_mobility()) {
                            Some(i)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            for (i, p) in self.paths.iter_mut().enumerate() {
                p.state = if Some(i) == best {
                    RouteState::Installed
                } else {
                    RouteState::Rejected
                };
            }
        } else {
            for p in self.paths.iter_mut() {
                p.state = RouteState::Installed;
            }
        }
        self.paths
            .iter()
            .zip(before)
            .filter(|(p, was)| p.is_installed() != *was)
            .map(|(p, _)| p.clone())
            .collect()
    }
}

/// Route table keyed by prefix, one per VNI
pub type EvpnRouteTable = BTreeMap<EvpnPrefix, EvpnDest>;

/// Global route table keyed by RD and prefix
pub type EvpnGlobalTable = BTreeMap<(BgpRD, EvpnPrefix), EvpnDest>;

/// Prints route as "[rd]:[prefix]".
pub fn route_to_string(rd: &BgpRD, prefix: &EvpnPrefix) -> String {
    format!("[{}]:{}", rd, prefix)
}
