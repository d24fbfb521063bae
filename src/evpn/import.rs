// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Route import into VNIs and export of local routes
//!
//! Received routes land in the global table first. MAC/IP and inclusive
//! multicast routes are then imported into every live VNI whose import RTs
//! match one of the route targets the route carries.

use super::EvpnInstance;
use crate::afi::*;
use crate::error::BgpError;
use crate::evpn::rib::*;
use crate::evpn::route::*;
use crate::evpn::vnitable::VniEntry;
use crate::message::attributes::extcommunity::{BgpExtCommunityList, MacMobility};
use crate::message::attributes::multiproto::{BgpMPUpdates, BgpMPWithdraws};
use crate::BgpSessionParams;
use log::{debug, error, info, trace, warn};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Route types imported into VNIs
fn is_importable(route_type: EvpnRouteType) -> bool {
    matches!(
        route_type,
        EvpnRouteType::MacIp | EvpnRouteType::InclusiveMulticast
    )
}

fn announce<R: EvpnRib, T: EvpnTransport>(
    rib: &mut R,
    transport: &mut T,
    addpath: Option<BgpPathId>,
    prefix: &EvpnPrefix,
    path: &EvpnPath,
) {
    rib.install(&RibKey::new(RibTable::Global, path.rd, prefix.clone()), path);
    let nlri = EvpnNlri::new(path.rd, path.wire_prefix(prefix), path.tags);
    match encode_nlri(std::iter::once(&nlri), addpath) {
        Ok(buf) => {
            debug!("announce {}", route_to_string(&path.rd, prefix));
            transport.advertise(PeerSet::All, buf, &path.attrs);
        }
        Err(e) => error!("unable to encode {}: {}", nlri, e),
    }
}

fn retract<R: EvpnRib, T: EvpnTransport>(
    rib: &mut R,
    transport: &mut T,
    addpath: Option<BgpPathId>,
    prefix: &EvpnPrefix,
    path: &EvpnPath,
) {
    rib.withdraw(&RibKey::new(RibTable::Global, path.rd, prefix.clone()), path);
    let nlri = EvpnNlri::new(path.rd, path.wire_prefix(prefix), path.tags);
    match encode_nlri(std::iter::once(&nlri), addpath) {
        Ok(buf) => {
            debug!("withdraw {}", route_to_string(&path.rd, prefix));
            transport.withdraw(PeerSet::All, buf);
        }
        Err(e) => error!("unable to encode {}: {}", nlri, e),
    }
}

/// Pushes state flips out. Local paths go to the global RIB and to peers,
/// imported paths go to the VNI table of the RIB.
fn apply_changes<R: EvpnRib, T: EvpnTransport>(
    rib: &mut R,
    transport: &mut T,
    addpath: Option<BgpPathId>,
    vni: Vni,
    prefix: &EvpnPrefix,
    changes: &[EvpnPath],
) {
    for p in changes {
        match (p.is_local(), p.is_installed()) {
            (true, true) => announce(rib, transport, addpath, prefix, p),
            (true, false) => {
                if p.state == RouteState::Rejected {
                    info!("VNI {} {} moved to a remote VTEP", vni, prefix);
                }
                retract(rib, transport, addpath, prefix, p)
            }
            (false, true) => {
                rib.install(&RibKey::new(RibTable::Vni(vni), p.rd, prefix.clone()), p)
            }
            (false, false) => {
                rib.withdraw(&RibKey::new(RibTable::Vni(vni), p.rd, prefix.clone()), p)
            }
        }
    }
}

/// Attributes of a locally originated route
fn local_attrs(e: &VniEntry, mm: Option<MacMobility>) -> EvpnAttrs {
    let mut ext = BgpExtCommunityList::new();
    ext.set_route_targets(e.export_rts.iter());
    ext.set_mac_mobility(mm);
    EvpnAttrs {
        ext_communities: ext,
        nexthop: Some(IpAddr::V4(e.originator_ip)),
    }
}

/// Sequence number for a local MAC. A MAC seen behind a remote VTEP gets
/// one above the highest remote sequence unless the local path already wins.
fn local_mac_seq(e: &VniEntry, mac: &MacAddress, cur: Option<&EvpnPath>) -> u32 {
    let remote_max = e
        .routes
        .iter()
        .filter(|(p, _)| p.mac() == Some(mac))
        .flat_map(|(_, d)| d.paths.iter())
        .filter(|p| !p.is_local())
        .map(|p| p.mac_mobility().seq)
        .max();
    let (cur_seq, cur_installed) = match cur {
        Some(p) => (p.mac_mobility().seq, p.is_installed()),
        None => (0, false),
    };
    match remote_max {
        Some(r) if !cur_installed => cur_seq.max(r.saturating_add(1)),
        _ => cur_seq,
    }
}

impl<R: EvpnRib, T: EvpnTransport> EvpnInstance<R, T> {
    /// Handles EVPN NLRI of a received MP_REACH_NLRI. Malformed NLRI is
    /// discarded as a whole before anything changes. Returns the number of
    /// routes processed.
    pub fn process_update(
        &mut self,
        peer: &BgpSessionParams,
        attrs: &EvpnAttrs,
        nlri: &[u8],
    ) -> Result<usize, BgpError> {
        let routes = nlri_parse(nlri, peer.check_addpath_receive(AFI_L2VPN, SAFI_EVPN))
            .map_err(|e| {
                warn!("peer {}: EVPN NLRI discarded: {}", peer.peer_addr, e);
                e
            })?;
        for r in routes.iter() {
            self.update_remote_route(peer, r, attrs);
        }
        Ok(routes.len())
    }
    /// Handles EVPN NLRI of a received MP_UNREACH_NLRI.
    pub fn process_withdraw(&mut self, peer: &BgpSessionParams, nlri: &[u8]) -> Result<usize, BgpError> {
        let routes = nlri_parse(nlri, peer.check_addpath_receive(AFI_L2VPN, SAFI_EVPN))
            .map_err(|e| {
                warn!("peer {}: EVPN withdraw discarded: {}", peer.peer_addr, e);
                e
            })?;
        for r in routes.iter() {
            self.remove_remote_route(peer, r);
        }
        Ok(routes.len())
    }
    /// Same as [`EvpnInstance::process_update`] for an already decoded
    /// attribute.
    pub fn process_mp_updates(
        &mut self,
        peer: &BgpSessionParams,
        upd: &BgpMPUpdates,
        ext_communities: &BgpExtCommunityList,
    ) -> usize {
        let attrs = EvpnAttrs {
            ext_communities: ext_communities.clone(),
            nexthop: Some(upd.nexthop),
        };
        for r in upd.nlri.iter() {
            self.update_remote_route(peer, r, &attrs);
        }
        upd.nlri.len()
    }
    pub fn process_mp_withdraws(&mut self, peer: &BgpSessionParams, wd: &BgpMPWithdraws) -> usize {
        for r in wd.nlri.iter() {
            self.remove_remote_route(peer, r);
        }
        wd.nlri.len()
    }

    fn update_remote_route(&mut self, peer: &BgpSessionParams, r: &WithPathId<EvpnNlri>, attrs: &EvpnAttrs) {
        let source = PathSource::Peer {
            addr: peer.peer_addr,
            pathid: r.pathid,
        };
        let key = r.nlri.prefix.table_key();
        let prefix = &key;
        let mut path = EvpnPath::new(source, r.nlri.rd, r.nlri.tags, attrs.clone())
            .with_segment_of(&r.nlri.prefix);
        path.state = RouteState::Validated;
        trace!("{} from {}", route_to_string(&path.rd, prefix), source);
        let old = self.global_put(prefix, path.clone());
        if !is_importable(prefix.route_type()) {
            return;
        }
        let new_vnis = self.import_targets(&path);
        if let Some(old) = old {
            for vni in self.import_targets(&old).difference(&new_vnis) {
                debug!("VNI {} unimport {} from {}", vni, prefix, source);
                self.remove_path_from_vni(*vni, prefix, &source, &old.rd);
            }
        }
        for vni in new_vnis {
            debug!("VNI {} import {} from {}", vni, prefix, source);
            self.add_path_to_vni(vni, prefix, path.clone());
        }
    }
    fn remove_remote_route(&mut self, peer: &BgpSessionParams, r: &WithPathId<EvpnNlri>) {
        let source = PathSource::Peer {
            addr: peer.peer_addr,
            pathid: r.pathid,
        };
        let key = r.nlri.prefix.table_key();
        let prefix = &key;
        let old = match self.global_take(prefix, &source, &r.nlri.rd) {
            Some(p) => p,
            None => {
                debug!(
                    "withdraw of unknown {} from {}",
                    route_to_string(&r.nlri.rd, prefix),
                    source
                );
                return;
            }
        };
        if !is_importable(prefix.route_type()) {
            return;
        }
        for vni in self.import_targets(&old) {
            debug!("VNI {} unimport {} from {}", vni, prefix, source);
            self.remove_path_from_vni(vni, prefix, &source, &old.rd);
        }
    }

    /// Live VNIs importing any route target of the path
    fn import_targets(&self, path: &EvpnPath) -> BTreeSet<Vni> {
        let mut s = BTreeSet::new();
        for rt in path.attrs.ext_communities.route_targets() {
            if let Some(vnis) = self.rt_index.lookup(rt) {
                s.extend(vnis.iter().copied().filter(|v| self.is_vni_live(*v)));
            }
        }
        s
    }

    /// Stores a copy in the global table keeping the given state.
    fn global_put(&mut self, prefix: &EvpnPrefix, path: EvpnPath) -> Option<EvpnPath> {
        let (source, rd, state) = (path.source, path.rd, path.state);
        let dest = self.global.entry((rd, prefix.clone())).or_default();
        let old = dest.upsert(path);
        if let Some(p) = dest.paths.iter_mut().find(|p| p.same_origin(&source, &rd)) {
            p.state = state;
        }
        old
    }
    fn global_take(&mut self, prefix: &EvpnPrefix, source: &PathSource, rd: &BgpRD) -> Option<EvpnPath> {
        let key = (*rd, prefix.clone());
        let dest = self.global.get_mut(&key)?;
        let r = dest.remove(source, rd).map(|(p, _)| p);
        if dest.is_empty() {
            self.global.remove(&key);
        }
        r
    }

    /// Adds or replaces a path in the VNI table and runs selection. An
    /// installed path whose attributes changed is pushed out again.
    pub(super) fn add_path_to_vni(&mut self, vni: Vni, prefix: &EvpnPrefix, path: EvpnPath) {
        let addpath = self.addpath_tx_id;
        let entry = match self.vnis.lookup_mut(vni) {
            Some(e) => e,
            None => {
                debug!("VNI {} gone, {} not added", vni, prefix);
                return;
            }
        };
        let (source, rd) = (path.source, path.rd);
        let dest = entry.routes.entry(prefix.clone()).or_default();
        let replaced = dest.upsert(path);
        let mut changes = dest.select(prefix.route_type());
        if let (Some(old), Some(cur)) = (replaced, dest.find(&source, &rd)) {
            if old.is_installed() && cur.is_installed() && old.differs_on_wire(cur) {
                changes.push(cur.clone());
            }
        }
        let local = dest.local().cloned();
        apply_changes(&mut self.rib, &mut self.transport, addpath, vni, prefix, &changes);
        if let Some(l) = local {
            self.global_put(prefix, l);
        }
    }
    /// Takes a path out of the VNI table and runs selection. Returns the
    /// removed path.
    pub(super) fn remove_path_from_vni(
        &mut self,
        vni: Vni,
        prefix: &EvpnPrefix,
        source: &PathSource,
        rd: &BgpRD,
    ) -> Option<EvpnPath> {
        let addpath = self.addpath_tx_id;
        let entry = self.vnis.lookup_mut(vni)?;
        let dest = entry.routes.get_mut(prefix)?;
        let (removed, was) = dest.remove(source, rd)?;
        let mut changes = Vec::new();
        if was {
            changes.push(removed.clone());
        }
        changes.extend(dest.select(prefix.route_type()));
        let local = dest.local().cloned();
        if dest.is_empty() {
            entry.routes.remove(prefix);
        }
        apply_changes(&mut self.rib, &mut self.transport, addpath, vni, prefix, &changes);
        if let Some(l) = local {
            self.global_put(prefix, l);
        }
        Some(removed)
    }

    /// Withdraws the local path of the prefix. Returns it if there was one.
    pub(super) fn remove_local_path(
        &mut self,
        vni: Vni,
        prefix: &EvpnPrefix,
        rd: &BgpRD,
    ) -> Result<Option<EvpnPath>, BgpError> {
        if !self.vnis.contains(vni) {
            return Err(BgpError::UnknownVni(vni));
        }
        let r = self.remove_path_from_vni(vni, prefix, &PathSource::Local, rd);
        self.global_take(prefix, &PathSource::Local, rd);
        Ok(r)
    }
    /// Withdraws every local route of the VNI. Returns what was withdrawn.
    pub(super) fn withdraw_local_routes(&mut self, vni: Vni) -> Result<Vec<(EvpnPrefix, EvpnPath)>, BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let locals: Vec<(EvpnPrefix, BgpRD)> = e
            .routes
            .iter()
            .filter_map(|(p, d)| d.local().map(|l| (p.clone(), l.rd)))
            .collect();
        let mut out = Vec::with_capacity(locals.len());
        for (prefix, rd) in locals {
            if let Some(p) = self.remove_local_path(vni, &prefix, &rd)? {
                out.push((prefix, p));
            }
        }
        Ok(out)
    }

    /// Originates the inclusive multicast route of a live VNI.
    pub(super) fn originate_type3(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let prefix = build_type3_prefix(e.originator_ip);
        let path = EvpnPath::new(PathSource::Local, e.rd, None, local_attrs(e, None));
        self.add_path_to_vni(vni, &prefix, path);
        Ok(())
    }
    /// Originates a MAC/IP route, MAC mobility is attached once the sequence
    /// moves past 0 or the MAC is static.
    pub(super) fn originate_type2(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        ip: Option<IpAddr>,
        is_static: bool,
    ) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let prefix = build_type2_prefix(mac, ip);
        let cur = e.routes.get(&prefix).and_then(|d| d.local());
        let seq = local_mac_seq(e, &mac, cur);
        let mm = if seq > 0 || is_static {
            Some(MacMobility::new(is_static, seq))
        } else {
            None
        };
        debug!("VNI {} local {} seq {} static {}", vni, prefix, seq, is_static);
        let path = EvpnPath::new(PathSource::Local, e.rd, Some(VniTags::l2(vni)), local_attrs(e, mm));
        self.add_path_to_vni(vni, &prefix, path);
        Ok(())
    }

    /// Imports matching routes from the global table into a live VNI.
    pub fn install_routes(&mut self, vni: Vni) -> Result<(), BgpError> {
        match self.vnis.lookup(vni) {
            None => return Err(BgpError::UnknownVni(vni)),
            Some(e) if !e.is_vni_live() => return Ok(()),
            Some(_) => {}
        }
        let mut found = Vec::new();
        for ((_, prefix), dest) in self.global.iter() {
            if !is_importable(prefix.route_type()) {
                continue;
            }
            for p in dest.paths.iter().filter(|p| !p.is_local()) {
                if p.attrs
                    .ext_communities
                    .route_targets()
                    .any(|rt| self.rt_index.imports(rt, vni))
                {
                    found.push((prefix.clone(), p.clone()));
                }
            }
        }
        debug!("VNI {} installing {} routes", vni, found.len());
        for (prefix, p) in found {
            self.add_path_to_vni(vni, &prefix, p);
        }
        Ok(())
    }
    /// Removes every imported route from the VNI table.
    pub fn uninstall_routes(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let remote: Vec<(EvpnPrefix, PathSource, BgpRD)> = e
            .routes
            .iter()
            .flat_map(|(prefix, d)| {
                d.paths
                    .iter()
                    .filter(|p| !p.is_local())
                    .map(move |p| (prefix.clone(), p.source, p.rd))
            })
            .collect();
        debug!("VNI {} uninstalling {} routes", vni, remote.len());
        for (prefix, source, rd) in remote {
            self.remove_path_from_vni(vni, &prefix, &source, &rd);
        }
        Ok(())
    }

    /// Puts the current export RTs and originator on local routes of a live
    /// VNI and advertises them again.
    pub fn handle_export_rt_change(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_vni_live() {
            return Ok(());
        }
        let rts = e.export_rts.clone();
        let nexthop = Some(IpAddr::V4(e.originator_ip));
        let locals: Vec<(EvpnPrefix, EvpnPath)> = e
            .routes
            .iter()
            .filter_map(|(p, d)| d.local().map(|l| (p.clone(), l.clone())))
            .collect();
        for (prefix, mut path) in locals {
            path.attrs.ext_communities.set_route_targets(rts.iter());
            path.attrs.nexthop = nexthop;
            self.add_path_to_vni(vni, &prefix, path);
        }
        Ok(())
    }
    /// Moves local routes of the VNI to a new RD: withdrawn under the old
    /// one first, then advertised under the new one.
    pub fn handle_rd_change(&mut self, vni: Vni, rd: BgpRD) -> Result<(), BgpError> {
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_vni_live() {
            e.rd = rd;
            return Ok(());
        }
        let old = self.withdraw_local_routes(vni)?;
        if let Some(e) = self.vnis.lookup_mut(vni) {
            e.rd = rd;
        }
        for (prefix, mut p) in old {
            p.rd = rd;
            p.state = RouteState::Received;
            self.add_path_to_vni(vni, &prefix, p);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::attributes::extcommunity::BgpExtCommunity;
    use crate::BgpCapAddPath;
    use std::net::Ipv4Addr;

    type Inst = EvpnInstance<Vec<RibOp>, Vec<EvpnAdvertisement>>;

    fn inst() -> Inst {
        let _ = env_logger::builder().is_test(true).try_init();
        EvpnInstance::new(65000, Ipv4Addr::new(10, 0, 0, 1), Vec::new(), Vec::new())
    }
    fn peer(n: u8) -> BgpSessionParams {
        BgpSessionParams::new(65000, IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)), vec![])
    }
    fn attrs(rt: u32, mm: Option<(bool, u32)>, nh: u8) -> EvpnAttrs {
        let mut ext = BgpExtCommunityList::from_vec(vec![BgpExtCommunity::rt_asn(65000, rt)]);
        ext.set_mac_mobility(mm.map(|(s, q)| MacMobility::new(s, q)));
        EvpnAttrs {
            ext_communities: ext,
            nexthop: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, nh))),
        }
    }
    fn mac(n: u64) -> MacAddress {
        MacAddress::from_u64(0x0200_0000_0000 + n)
    }
    fn type2(rd: u32, m: u64) -> Vec<u8> {
        let n = EvpnNlri::new(
            BgpRD::new(65000, rd),
            build_type2_prefix(mac(m), None),
            Some(VniTags::l2(100)),
        );
        encode_nlri(std::iter::once(&n), None).unwrap()
    }
    fn type3(rd: u32, ip: u8) -> Vec<u8> {
        let n = EvpnNlri::new(
            BgpRD::new(65000, rd),
            build_type3_prefix(Ipv4Addr::new(10, 0, 0, ip)),
            None,
        );
        encode_nlri(std::iter::once(&n), None).unwrap()
    }
    fn vni_installs(i: &Inst, vni: Vni) -> usize {
        i.rib()
            .iter()
            .filter(|op| matches!(op, RibOp::Install(k, _) if k.table == RibTable::Vni(vni)))
            .count()
    }

    #[test]
    fn test_import_by_route_target() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_vni_add(200, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(i.process_update(&peer(2), &attrs(100, None, 2), &type3(7, 2)).unwrap(), 1);
        let e = i.vni_table().lookup(100).unwrap();
        assert_eq!(e.routes.len(), 2);
        assert!(i.vni_table().lookup(200).unwrap().routes.len() == 1);
        assert_eq!(vni_installs(&i, 100), 1);
        assert_eq!(vni_installs(&i, 200), 0);
        assert_eq!(i.process_withdraw(&peer(2), &type3(7, 2)).unwrap(), 1);
        assert_eq!(i.vni_table().lookup(100).unwrap().routes.len(), 1);
        assert!(matches!(i.rib().last(), Some(RibOp::Withdraw(k, _)) if k.table == RibTable::Vni(100)));
        assert!(i.global_table().keys().all(|(rd, _)| *rd != BgpRD::new(65000, 7)));
    }
    #[test]
    fn test_route_kept_globally_until_vni_up() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.process_update(&peer(2), &attrs(100, None, 2), &type2(7, 1)).unwrap();
        assert!(i.vni_table().lookup(100).unwrap().routes.is_empty());
        assert_eq!(i.global_table().len(), 1);
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(vni_installs(&i, 100), 1);
        i.local_vni_del(100).unwrap();
        assert!(i.vni_table().lookup(100).unwrap().routes.is_empty());
        assert!(matches!(i.rib().last(), Some(RibOp::Withdraw(..))));
    }
    #[test]
    fn test_malformed_nlri_changes_nothing() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let mut buf = type3(7, 2);
        buf.extend_from_slice(&[2, 5, 0, 0]);
        let before = i.global_table().len();
        let r = i.process_update(&peer(2), &attrs(100, None, 2), &buf);
        assert!(r.unwrap_err().is_malformed_nlri());
        assert_eq!(i.global_table().len(), before);
    }
    #[test]
    fn test_addpath_paths_are_distinct() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let p = BgpSessionParams::new(
            65000,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            vec![BgpCapAddPath::new_evpn(true, true)],
        );
        let mut buf = vec![0, 0, 0, 1];
        buf.extend(type3(7, 2));
        buf.extend([0, 0, 0, 2]);
        buf.extend(type3(7, 2));
        assert_eq!(i.process_update(&p, &attrs(100, None, 2), &buf).unwrap(), 2);
        let prefix = build_type3_prefix(Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(i.vni_table().lookup(100).unwrap().routes[&prefix].paths.len(), 2);
    }
    #[test]
    fn test_attribute_change_moves_route_between_vnis() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_vni_add(200, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.process_update(&peer(2), &attrs(100, None, 2), &type2(7, 1)).unwrap();
        i.process_update(&peer(2), &attrs(200, None, 2), &type2(7, 1)).unwrap();
        let prefix = build_type2_prefix(mac(1), None);
        assert!(!i.vni_table().lookup(100).unwrap().routes.contains_key(&prefix));
        assert!(i.vni_table().lookup(200).unwrap().routes[&prefix].installed().is_some());
    }
    #[test]
    fn test_mac_move_to_remote_and_back() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_macip_add(100, mac(1), None, false).unwrap();
        let prefix = build_type2_prefix(mac(1), None);
        let local = i.vni_table().lookup(100).unwrap().routes[&prefix].local().unwrap().clone();
        assert!(local.is_installed());
        // first advertisement carries no MAC mobility
        assert_eq!(local.attrs.ext_communities.mac_mobility(), None);
        // remote VTEP claims it with a higher sequence
        i.process_update(&peer(2), &attrs(100, Some((false, 1)), 2), &type2(7, 1)).unwrap();
        let d = &i.vni_table().lookup(100).unwrap().routes[&prefix];
        assert!(!d.local().unwrap().is_installed());
        assert!(i.transport().last().unwrap().is_withdraw());
        // MAC learned locally again: sequence goes past the remote one
        i.local_macip_add(100, mac(1), None, false).unwrap();
        let d = &i.vni_table().lookup(100).unwrap().routes[&prefix];
        let l = d.local().unwrap();
        assert!(l.is_installed());
        assert_eq!(l.mac_mobility(), MacMobility::new(false, 2));
        assert!(!i.transport().last().unwrap().is_withdraw());
        assert!(matches!(i.rib().last(), Some(RibOp::Withdraw(k, _)) if k.table == RibTable::Vni(100)));
    }
    #[test]
    fn test_static_local_mac_stays() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_macip_add(100, mac(1), None, true).unwrap();
        let prefix = build_type2_prefix(mac(1), None);
        assert_eq!(
            i.vni_table().lookup(100).unwrap().routes[&prefix].local().unwrap().mac_mobility(),
            MacMobility::new(true, 0)
        );
        i.process_update(&peer(2), &attrs(100, Some((false, 50)), 2), &type2(7, 1)).unwrap();
        assert!(i.vni_table().lookup(100).unwrap().routes[&prefix].local().unwrap().is_installed());
    }
    #[test]
    fn test_mac_move_with_remote_esi() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_macip_add(100, mac(1), None, false).unwrap();
        let esi = EvpnEsi::new(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let wire = build_type2_prefix(mac(1), None).with_segment(esi, 0);
        let n = EvpnNlri::new(BgpRD::new(65000, 7), wire.clone(), Some(VniTags::l2(100)));
        let buf = encode_nlri(std::iter::once(&n), None).unwrap();
        i.process_update(&peer(2), &attrs(100, Some((false, 5)), 2), &buf).unwrap();
        let prefix = build_type2_prefix(mac(1), None);
        let e = i.vni_table().lookup(100).unwrap();
        // type 3 plus a single MAC/IP destination holding both paths
        assert_eq!(e.routes.len(), 2);
        let d = &e.routes[&prefix];
        assert_eq!(d.paths.len(), 2);
        assert!(!d.local().unwrap().is_installed());
        let best = d.installed().unwrap();
        assert!(!best.is_local());
        assert_eq!(best.wire_prefix(&prefix), wire);
        assert!(i.transport().last().unwrap().is_withdraw());
        assert!(i.global_table().contains_key(&(n.rd, prefix.clone())));
        // remote goes away, local path is back
        i.process_withdraw(&peer(2), &buf).unwrap();
        let d = &i.vni_table().lookup(100).unwrap().routes[&prefix];
        assert_eq!(d.paths.len(), 1);
        assert!(d.local().unwrap().is_installed());
        assert!(!i.transport().last().unwrap().is_withdraw());
    }
    #[test]
    fn test_other_route_types_stay_global() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let n = EvpnNlri::new(
            BgpRD::new(65000, 7),
            EvpnPrefix::EthernetSegment(EvpnEthernetSegment {
                esi: EvpnEsi::new(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
                originator: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            }),
            None,
        );
        let buf = encode_nlri(std::iter::once(&n), None).unwrap();
        i.process_update(&peer(2), &attrs(100, None, 2), &buf).unwrap();
        assert_eq!(i.vni_table().lookup(100).unwrap().routes.len(), 1);
        assert!(i.global_table().contains_key(&(n.rd, n.prefix.clone())));
        assert_eq!(vni_installs(&i, 100), 0);
    }
    #[test]
    fn test_mp_attribute_entry_points() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let n = EvpnNlri::new(
            BgpRD::new(65000, 7),
            build_type3_prefix(Ipv4Addr::new(10, 0, 0, 3)),
            None,
        );
        let upd = BgpMPUpdates::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
            vec![WithPathId::new(0, n.clone())],
        );
        let ext = BgpExtCommunityList::from_vec(vec![BgpExtCommunity::rt_asn(65000, 100)]);
        assert_eq!(i.process_mp_updates(&peer(3), &upd, &ext), 1);
        let e = i.vni_table().lookup(100).unwrap();
        let p = e.routes[&n.prefix].installed().unwrap();
        assert_eq!(p.attrs.nexthop, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3))));
        let wd = BgpMPWithdraws::new(vec![WithPathId::new(0, n.clone())]);
        assert_eq!(i.process_mp_withdraws(&peer(3), &wd), 1);
        assert!(!i.vni_table().lookup(100).unwrap().routes.contains_key(&n.prefix));
    }
}
