// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Read-only queries over the EVPN state
//!
//! Results are plain values ready for serialization, rendering is left to
//! the caller.

use super::EvpnInstance;
use crate::afi::*;
use crate::error::BgpError;
use crate::evpn::rib::{EvpnRib, EvpnTransport};
use crate::evpn::route::*;
use crate::evpn::vnitable::{VniEntry, VniFlags};
use crate::message::attributes::extcommunity::BgpExtCommunity;
#[cfg(feature = "serialization")]
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};

/// One VNI as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct VniSummary {
    pub vni: Vni,
    pub flags: VniFlags,
    pub rd: BgpRD,
    pub originator_ip: Ipv4Addr,
    pub import_rts: Vec<BgpExtCommunity>,
    pub export_rts: Vec<BgpExtCommunity>,
    /// Prefixes in the VNI table
    pub route_count: usize,
    /// Prefixes with a local path
    pub local_count: usize,
}
impl VniSummary {
    fn new(e: &VniEntry) -> VniSummary {
        VniSummary {
            vni: e.vni,
            flags: e.flags,
            rd: e.rd,
            originator_ip: e.originator_ip,
            import_rts: e.import_rts.clone(),
            export_rts: e.export_rts.clone(),
            route_count: e.routes.len(),
            local_count: e.routes.values().filter(|d| d.local().is_some()).count(),
        }
    }
}

/// One prefix with its paths
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct RouteSummary {
    /// "[rd]:[prefix]" for the global table, "[prefix]" for a VNI table
    pub route: String,
    pub prefix: EvpnPrefix,
    pub paths: Vec<EvpnPath>,
}

/// Route table of one VNI
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct VniRoutes {
    pub vni: Vni,
    pub routes: Vec<RouteSummary>,
}

/// Route target and the VNIs importing it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct ImportRtSummary {
    pub rt: BgpExtCommunity,
    pub vnis: Vec<Vni>,
}

fn type_matches(prefix: &EvpnPrefix, filter: Option<EvpnRouteType>) -> bool {
    filter.map(|t| prefix.route_type() == t).unwrap_or(true)
}

fn vni_route(prefix: &EvpnPrefix, dest: &EvpnDest) -> RouteSummary {
    RouteSummary {
        route: prefix.to_string(),
        prefix: prefix.clone(),
        paths: dest.paths.clone(),
    }
}

fn global_route(rd: &BgpRD, prefix: &EvpnPrefix, dest: &EvpnDest) -> RouteSummary {
    RouteSummary {
        route: route_to_string(rd, prefix),
        prefix: prefix.clone(),
        paths: dest.paths.clone(),
    }
}

impl<R: EvpnRib, T: EvpnTransport> EvpnInstance<R, T> {
    /// All VNIs in ascending order
    pub fn show_vnis(&self) -> Vec<VniSummary> {
        self.vnis.iter_sorted().map(VniSummary::new).collect()
    }
    pub fn show_vni(&self, vni: Vni) -> Option<VniSummary> {
        self.vnis.lookup(vni).map(VniSummary::new)
    }
    /// Routes of a VNI table, optionally of one type only
    pub fn show_vni_routes(
        &self,
        vni: Vni,
        route_type: Option<EvpnRouteType>,
    ) -> Result<Vec<RouteSummary>, BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        Ok(e.routes
            .iter()
            .filter(|(p, _)| type_matches(p, route_type))
            .map(|(p, d)| vni_route(p, d))
            .collect())
    }
    /// Route tables of every VNI in ascending VNI order
    pub fn show_vni_routes_all(&self, route_type: Option<EvpnRouteType>) -> Vec<VniRoutes> {
        self.vnis
            .iter_sorted()
            .map(|e| VniRoutes {
                vni: e.vni,
                routes: e
                    .routes
                    .iter()
                    .filter(|(p, _)| type_matches(p, route_type))
                    .map(|(p, d)| vni_route(p, d))
                    .collect(),
            })
            .collect()
    }
    /// MAC/IP route of a VNI
    pub fn show_vni_route_macip(
        &self,
        vni: Vni,
        mac: MacAddress,
        ip: Option<IpAddr>,
    ) -> Result<Option<RouteSummary>, BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let prefix = build_type2_prefix(mac, ip);
        Ok(e.routes.get(&prefix).map(|d| vni_route(&prefix, d)))
    }
    /// Inclusive multicast route of a VNI by originator
    pub fn show_vni_route_multicast(
        &self,
        vni: Vni,
        originator: IpAddr,
    ) -> Result<Option<RouteSummary>, BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let prefix = EvpnPrefix::InclusiveMulticast(EvpnInclusiveMulticast {
            ether_tag: 0,
            originator,
        });
        Ok(e.routes.get(&prefix).map(|d| vni_route(&prefix, d)))
    }
    /// RT index, ordered by route target
    pub fn show_import_rts(&self) -> Vec<ImportRtSummary> {
        let mut v: Vec<ImportRtSummary> = self
            .rt_index
            .iter()
            .map(|(rt, vnis)| ImportRtSummary {
                rt: *rt,
                vnis: vnis.iter().copied().collect(),
            })
            .collect();
        v.sort_by(|a, b| a.rt.cmp(&b.rt));
        v
    }
    /// Global table routes under one RD
    pub fn show_rd_routes(&self, rd: &BgpRD, route_type: Option<EvpnRouteType>) -> Vec<RouteSummary> {
        self.global
            .iter()
            .filter(|((r, p), _)| r == rd && type_matches(p, route_type))
            .map(|((r, p), d)| global_route(r, p, d))
            .collect()
    }
    /// Global table route of any type under one RD. A MAC/IP prefix is
    /// looked up by MAC and IP whatever its ESI and ethernet tag.
    pub fn show_rd_route(&self, rd: &BgpRD, prefix: &EvpnPrefix) -> Option<RouteSummary> {
        let key = (*rd, prefix.table_key());
        self.global.get(&key).map(|d| global_route(&key.0, &key.1, d))
    }
    /// Global table MAC/IP route under one RD
    pub fn show_rd_route_macip(&self, rd: &BgpRD, mac: MacAddress, ip: Option<IpAddr>) -> Option<RouteSummary> {
        self.show_rd_route(rd, &build_type2_prefix(mac, ip))
    }
    /// Whole global table, optionally of one type only
    pub fn show_routes(&self, route_type: Option<EvpnRouteType>) -> Vec<RouteSummary> {
        self.global
            .iter()
            .filter(|((_, p), _)| type_matches(p, route_type))
            .map(|((r, p), d)| global_route(r, p, d))
            .collect()
    }
}
