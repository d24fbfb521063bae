// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! EVPN control plane instance
//!
//! [`EvpnInstance`] owns the VNI table, the RT reverse index and the global
//! EVPN route table, and talks to the base RIB and the advertisement
//! transport through [`EvpnRib`] and [`EvpnTransport`]. All operations
//! expect exclusive access for their whole duration.

pub mod import;
pub mod rib;
pub mod route;
pub mod rtindex;
pub mod show;
pub mod vnitable;

pub use rib::*;
pub use route::*;
pub use rtindex::*;
pub use show::*;
pub use vnitable::*;

use crate::afi::*;
use crate::config::EvpnConfig;
use crate::error::BgpError;
use crate::message::attributes::extcommunity::BgpExtCommunity;
use log::{debug, info};
use std::net::{IpAddr, Ipv4Addr};

/// EVPN instance of one BGP daemon
pub struct EvpnInstance<R: EvpnRib, T: EvpnTransport> {
    as_num: u32,
    router_id: Ipv4Addr,
    advertise_all_vni: bool,
    addpath_tx_id: Option<BgpPathId>,
    vnis: VniTable,
    rt_index: RtIndex,
    global: EvpnGlobalTable,
    rib: R,
    transport: T,
}

impl<R: EvpnRib, T: EvpnTransport> EvpnInstance<R, T> {
    pub fn new(as_num: u32, router_id: Ipv4Addr, rib: R, transport: T) -> EvpnInstance<R, T> {
        EvpnInstance {
            as_num,
            router_id,
            advertise_all_vni: true,
            addpath_tx_id: None,
            vnis: VniTable::new(),
            rt_index: RtIndex::new(),
            global: EvpnGlobalTable::new(),
            rib,
            transport,
        }
    }
    /// Creates an instance and applies the configuration to it.
    pub fn from_config(cfg: &EvpnConfig, rib: R, transport: T) -> Result<EvpnInstance<R, T>, BgpError> {
        let mut inst = EvpnInstance::new(cfg.as_num, cfg.router_id, rib, transport);
        inst.apply_config(cfg)?;
        Ok(inst)
    }

    pub fn as_num(&self) -> u32 {
        self.as_num
    }
    pub fn router_id(&self) -> Ipv4Addr {
        self.router_id
    }
    pub fn advertise_all_vni(&self) -> bool {
        self.advertise_all_vni
    }
    pub fn vni_table(&self) -> &VniTable {
        &self.vnis
    }
    pub fn rt_index(&self) -> &RtIndex {
        &self.rt_index
    }
    pub fn global_table(&self) -> &EvpnGlobalTable {
        &self.global
    }
    pub fn rib(&self) -> &R {
        &self.rib
    }
    pub fn rib_mut(&mut self) -> &mut R {
        &mut self.rib
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_vni_configured(&self, vni: Vni) -> bool {
        self.vnis.lookup(vni).map(|e| e.is_vni_configured()).unwrap_or(false)
    }
    pub fn is_vni_live(&self, vni: Vni) -> bool {
        self.vnis.lookup(vni).map(|e| e.is_vni_live()).unwrap_or(false)
    }
    pub fn rd_matches_existing(&self, vni: Vni, rd: &BgpRD) -> bool {
        self.vnis
            .lookup(vni)
            .map(|e| e.rd_matches_existing(rd))
            .unwrap_or(false)
    }

    /// Applies a configuration batch in document order. Later settings of
    /// the same field win. VNIs the batch does not name are left alone.
    pub fn apply_config(&mut self, cfg: &EvpnConfig) -> Result<(), BgpError> {
        self.addpath_tx_id = cfg.addpath_tx_id;
        if cfg.as_num != self.as_num {
            self.handle_as_update(cfg.as_num)?;
        }
        if cfg.router_id != self.router_id {
            self.handle_router_id_update(cfg.router_id)?;
        }
        if cfg.advertise_all_vni != self.advertise_all_vni {
            if cfg.advertise_all_vni {
                self.set_advertise_all_vni()?;
            } else {
                self.unset_advertise_all_vni()?;
            }
        }
        for vc in cfg.vnis.iter() {
            self.create_update_vni(vc.vni)?;
            match vc.rd {
                Some(rd) => self.configure_rd(vc.vni, rd)?,
                None => self.unconfigure_rd(vc.vni)?,
            }
            if vc.import_rts.is_empty() {
                self.replace_import_rts(vc.vni, Vec::new(), false)?;
            } else {
                self.replace_import_rts(vc.vni, dedup_rts(&vc.import_rts), true)?;
            }
            if vc.export_rts.is_empty() {
                self.replace_export_rts(vc.vni, Vec::new(), false)?;
            } else {
                self.replace_export_rts(vc.vni, dedup_rts(&vc.export_rts), true)?;
            }
        }
        Ok(())
    }

    /// Creates the entry with auto RD and RTs. Nothing is left behind on
    /// failure.
    fn new_vni_entry(&mut self, vni: Vni) -> Result<(), BgpError> {
        let entry = self.vnis.create(vni)?;
        entry.derive_auto_rd(self.router_id);
        entry.derive_auto_rt_export(self.as_num);
        if let Err(e) = entry.derive_auto_rt_import(self.as_num, &mut self.rt_index) {
            self.vnis.delete(vni)?;
            return Err(e);
        }
        Ok(())
    }

    /// Marks the VNI configured, creating it if needed.
    pub fn create_update_vni(&mut self, vni: Vni) -> Result<(), BgpError> {
        if !self.vnis.contains(vni) {
            self.new_vni_entry(vni)?;
        }
        if let Some(e) = self.vnis.lookup_mut(vni) {
            if !e.is_vni_configured() {
                info!("VNI {} configured", vni);
            }
            e.flags.insert(VniFlags::CONFIGURED);
        }
        Ok(())
    }

    /// Drops the VNI configuration and the entry. Fails with `VniInUse`
    /// while the VNI is live.
    pub fn delete_vni(&mut self, vni: Vni) -> Result<(), BgpError> {
        match self.vnis.lookup_mut(vni) {
            None => return Err(BgpError::UnknownVni(vni)),
            Some(e) if e.is_vni_live() => return Err(BgpError::VniInUse(vni)),
            Some(e) => e.flags.remove(
                VniFlags::CONFIGURED
                    | VniFlags::RD_CONFIGURED
                    | VniFlags::IMPORT_RT_CONFIGURED
                    | VniFlags::EXPORT_RT_CONFIGURED,
            ),
        }
        self.free_vni(vni)
    }

    /// Unmaps RTs and removes an entry that is neither live nor configured.
    fn free_vni(&mut self, vni: Vni) -> Result<(), BgpError> {
        self.rt_index.unmap_vni(vni);
        let e = self.vnis.delete(vni)?;
        for (prefix, dest) in e.routes.iter() {
            for p in dest.paths.iter() {
                if p.is_installed() && !p.is_local() {
                    self.rib.withdraw(&RibKey::new(RibTable::Vni(vni), p.rd, prefix.clone()), p);
                }
            }
        }
        info!("VNI {} freed", vni);
        Ok(())
    }

    /// Maps every import RT of the VNI in the RT index.
    pub fn map_vni_to_its_rts(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let rts = e.import_rts.clone();
        for rt in rts.iter() {
            self.rt_index.map(rt, vni)?;
        }
        Ok(())
    }
    /// Unmaps every import RT of the VNI from the RT index.
    pub fn unmap_vni_from_its_rts(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        for rt in e.import_rts.iter() {
            self.rt_index.unmap(rt, vni);
        }
        Ok(())
    }

    pub fn configure_rd(&mut self, vni: Vni, rd: BgpRD) -> Result<(), BgpError> {
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        let was = e.is_rd_configured();
        e.flags.insert(VniFlags::RD_CONFIGURED);
        if was && e.rd_matches_existing(&rd) {
            return Ok(());
        }
        info!("VNI {} RD {}", vni, rd);
        self.handle_rd_change(vni, rd)
    }
    /// Reverts to the auto RD.
    pub fn unconfigure_rd(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_rd_configured() {
            return Ok(());
        }
        e.flags.remove(VniFlags::RD_CONFIGURED);
        let rd = auto_rd(self.router_id, e.rd_id);
        info!("VNI {} RD back to auto {}", vni, rd);
        self.handle_rd_change(vni, rd)
    }

    pub fn configure_import_rt(&mut self, vni: Vni, rt: BgpExtCommunity) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let mut rts = if e.is_import_rt_configured() {
            e.import_rts.clone()
        } else {
            Vec::new()
        };
        if rts.iter().any(|r| r.rt_key() == rt.rt_key()) {
            return Ok(());
        }
        rts.push(rt);
        self.replace_import_rts(vni, rts, true)
    }
    /// Removes one import RT, the auto RT comes back with the last one.
    pub fn unconfigure_import_rt(&mut self, vni: Vni, rt: &BgpExtCommunity) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_import_rt_configured() || !e.import_rts.iter().any(|r| r.rt_key() == rt.rt_key()) {
            return Err(BgpError::from_string(format!(
                "VNI {} has no configured import RT {}",
                vni, rt
            )));
        }
        let rts: Vec<BgpExtCommunity> = e
            .import_rts
            .iter()
            .filter(|r| r.rt_key() != rt.rt_key())
            .copied()
            .collect();
        let configured = !rts.is_empty();
        self.replace_import_rts(vni, rts, configured)
    }
    pub fn configure_export_rt(&mut self, vni: Vni, rt: BgpExtCommunity) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let mut rts = if e.is_export_rt_configured() {
            e.export_rts.clone()
        } else {
            Vec::new()
        };
        if rts.iter().any(|r| r.rt_key() == rt.rt_key()) {
            return Ok(());
        }
        rts.push(rt);
        self.replace_export_rts(vni, rts, true)
    }
    /// Removes one export RT, the auto RT comes back with the last one.
    pub fn unconfigure_export_rt(&mut self, vni: Vni, rt: &BgpExtCommunity) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_export_rt_configured() || !e.export_rts.iter().any(|r| r.rt_key() == rt.rt_key()) {
            return Err(BgpError::from_string(format!(
                "VNI {} has no configured export RT {}",
                vni, rt
            )));
        }
        let rts: Vec<BgpExtCommunity> = e
            .export_rts
            .iter()
            .filter(|r| r.rt_key() != rt.rt_key())
            .copied()
            .collect();
        let configured = !rts.is_empty();
        self.replace_export_rts(vni, rts, configured)
    }

    /// Sets the import list, or goes back to the auto RT when not
    /// `configured`. Imported routes of a live VNI are uninstalled first and
    /// installed again against the new list.
    fn replace_import_rts(
        &mut self,
        vni: Vni,
        rts: Vec<BgpExtCommunity>,
        configured: bool,
    ) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        if e.is_import_rt_configured() == configured && (!configured || e.import_rts == rts) {
            return Ok(());
        }
        let live = e.is_vni_live();
        if live {
            self.uninstall_routes(vni)?;
        }
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        let r = if configured {
            e.set_import_rts(rts, &mut self.rt_index).map(|_| {
                e.flags.insert(VniFlags::IMPORT_RT_CONFIGURED);
            })
        } else {
            e.flags.remove(VniFlags::IMPORT_RT_CONFIGURED);
            e.derive_auto_rt_import(self.as_num, &mut self.rt_index)
        };
        debug!("VNI {} import RTs {:?}", vni, e.import_rts);
        if live {
            self.install_routes(vni)?;
        }
        r
    }
    /// Sets the export list, or goes back to the auto RT when not
    /// `configured`, then re-advertises local routes.
    fn replace_export_rts(
        &mut self,
        vni: Vni,
        rts: Vec<BgpExtCommunity>,
        configured: bool,
    ) -> Result<(), BgpError> {
        let as_num = self.as_num;
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        if e.is_export_rt_configured() == configured && (!configured || e.export_rts == rts) {
            return Ok(());
        }
        if configured {
            e.export_rts = rts;
            e.flags.insert(VniFlags::EXPORT_RT_CONFIGURED);
        } else {
            e.flags.remove(VniFlags::EXPORT_RT_CONFIGURED);
            e.derive_auto_rt_export(as_num);
        }
        debug!("VNI {} export RTs {:?}", vni, e.export_rts);
        self.handle_export_rt_change(vni)
    }

    /// Re-derives auto RTs of every VNI for a new local AS.
    fn handle_as_update(&mut self, as_num: u32) -> Result<(), BgpError> {
        info!("EVPN AS {} -> {}", self.as_num, as_num);
        self.as_num = as_num;
        for vni in self.vnis.vnis() {
            let (imp, exp) = match self.vnis.lookup(vni) {
                Some(e) => (e.is_import_rt_configured(), e.is_export_rt_configured()),
                None => continue,
            };
            if !imp {
                let live = self.is_vni_live(vni);
                if live {
                    self.uninstall_routes(vni)?;
                }
                if let Some(e) = self.vnis.lookup_mut(vni) {
                    e.derive_auto_rt_import(as_num, &mut self.rt_index)?;
                }
                if live {
                    self.install_routes(vni)?;
                }
            }
            if !exp {
                if let Some(e) = self.vnis.lookup_mut(vni) {
                    e.derive_auto_rt_export(as_num);
                }
                self.handle_export_rt_change(vni)?;
            }
        }
        Ok(())
    }

    /// New router id: every VNI with auto RD gets its RD re-derived, local
    /// routes are withdrawn under the old RD and advertised under the new.
    pub fn handle_router_id_update(&mut self, router_id: Ipv4Addr) -> Result<(), BgpError> {
        info!("EVPN router id {} -> {}", self.router_id, router_id);
        self.router_id = router_id;
        for vni in self.vnis.vnis() {
            let rd = match self.vnis.lookup(vni) {
                Some(e) if !e.is_rd_configured() => auto_rd(router_id, e.rd_id),
                _ => continue,
            };
            if !self.rd_matches_existing(vni, &rd) {
                self.handle_rd_change(vni, rd)?;
            }
        }
        Ok(())
    }

    /// VNI came up locally with the given VTEP address.
    pub fn local_vni_add(&mut self, vni: Vni, originator_ip: Ipv4Addr) -> Result<(), BgpError> {
        if originator_ip.is_unspecified() {
            return Err(BgpError::static_str("Unspecified originator IP"));
        }
        if let Some(e) = self.vnis.lookup(vni) {
            if e.is_vni_live() {
                if e.originator_ip == originator_ip {
                    return Ok(());
                }
                let old = build_type3_prefix(e.originator_ip);
                let rd = e.rd;
                info!("VNI {} originator {} -> {}", vni, e.originator_ip, originator_ip);
                self.remove_local_path(vni, &old, &rd)?;
            }
        } else {
            self.new_vni_entry(vni)?;
        }
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        let was_live = e.is_vni_live();
        e.originator_ip = originator_ip;
        e.flags.insert(VniFlags::LIVE);
        if !was_live {
            info!("VNI {} up, originator {}", vni, originator_ip);
        }
        if self.advertise_all_vni {
            self.originate_type3(vni)?;
        }
        if was_live {
            // MAC/IP routes carry the originator as next hop
            self.handle_export_rt_change(vni)?;
        } else {
            self.install_routes(vni)?;
        }
        Ok(())
    }

    /// VNI went down locally. The entry goes away unless configured.
    pub fn local_vni_del(&mut self, vni: Vni) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        if !e.is_vni_live() {
            return Ok(());
        }
        self.withdraw_local_routes(vni)?;
        self.uninstall_routes(vni)?;
        let e = self.vnis.lookup_mut(vni).ok_or(BgpError::UnknownVni(vni))?;
        e.flags.remove(VniFlags::LIVE);
        e.originator_ip = Ipv4Addr::UNSPECIFIED;
        let configured = e.is_vni_configured();
        info!("VNI {} down", vni);
        if !configured {
            self.free_vni(vni)?;
        }
        Ok(())
    }

    /// Local MAC (and IP) learned in a live VNI.
    pub fn local_macip_add(
        &mut self,
        vni: Vni,
        mac: MacAddress,
        ip: Option<IpAddr>,
        is_static: bool,
    ) -> Result<(), BgpError> {
        match self.vnis.lookup(vni) {
            Some(e) if e.is_vni_live() => {}
            _ => return Err(BgpError::UnknownVni(vni)),
        }
        if !self.advertise_all_vni {
            debug!("VNI {} MAC {} not advertised, advertise-all-vni is off", vni, mac);
            return Ok(());
        }
        self.originate_type2(vni, mac, ip, is_static)
    }

    /// Local MAC (and IP) gone from a VNI.
    pub fn local_macip_del(&mut self, vni: Vni, mac: MacAddress, ip: Option<IpAddr>) -> Result<(), BgpError> {
        let e = self.vnis.lookup(vni).ok_or(BgpError::UnknownVni(vni))?;
        let rd = e.rd;
        let prefix = build_type2_prefix(mac, ip);
        self.remove_local_path(vni, &prefix, &rd)?;
        Ok(())
    }

    /// Turns advertisement on and originates inclusive multicast routes of
    /// live VNIs. MACs are advertised as they get learned again.
    pub fn set_advertise_all_vni(&mut self) -> Result<(), BgpError> {
        if self.advertise_all_vni {
            return Ok(());
        }
        info!("EVPN advertise-all-vni on");
        self.advertise_all_vni = true;
        for vni in self.vnis.vnis() {
            if self.is_vni_live(vni) {
                self.originate_type3(vni)?;
            }
        }
        Ok(())
    }
    pub fn unset_advertise_all_vni(&mut self) -> Result<(), BgpError> {
        if !self.advertise_all_vni {
            return Ok(());
        }
        info!("EVPN advertise-all-vni off");
        self.advertise_all_vni = false;
        self.cleanup_on_disable()
    }

    /// Withdraws local routes and imports of every VNI, clears the live
    /// state and frees VNIs that are not configured.
    pub fn cleanup_on_disable(&mut self) -> Result<(), BgpError> {
        for vni in self.vnis.vnis() {
            self.withdraw_local_routes(vni)?;
            self.uninstall_routes(vni)?;
            let configured = match self.vnis.lookup_mut(vni) {
                Some(e) => {
                    e.flags.remove(VniFlags::LIVE);
                    e.originator_ip = Ipv4Addr::UNSPECIFIED;
                    e.is_vni_configured()
                }
                None => continue,
            };
            if !configured {
                self.free_vni(vni)?;
            }
        }
        Ok(())
    }
    /// Tears the instance down: every VNI goes, received routes are dropped.
    pub fn cleanup(&mut self) -> Result<(), BgpError> {
        self.cleanup_on_disable()?;
        for vni in self.vnis.vnis() {
            self.delete_vni(vni)?;
        }
        self.global.clear();
        debug_assert!(self.rt_index.is_empty());
        Ok(())
    }
}

fn dedup_rts(rts: &[BgpExtCommunity]) -> Vec<BgpExtCommunity> {
    let mut v: Vec<BgpExtCommunity> = Vec::with_capacity(rts.len());
    for rt in rts {
        if !v.iter().any(|r| r.rt_key() == rt.rt_key()) {
            v.push(*rt);
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VniConfig;
    use crate::message::attributes::extcommunity::MacMobility;
    use std::sync::mpsc;

    type Inst = EvpnInstance<Vec<RibOp>, Vec<EvpnAdvertisement>>;

    fn inst() -> Inst {
        let _ = env_logger::builder().is_test(true).try_init();
        EvpnInstance::new(65000, Ipv4Addr::new(10, 0, 0, 1), Vec::new(), Vec::new())
    }
    fn rt(n: u32) -> BgpExtCommunity {
        BgpExtCommunity::rt_asn(65000, n)
    }
    fn type3_rts(i: &Inst, vni: Vni) -> Vec<BgpExtCommunity> {
        let e = i.vni_table().lookup(vni).unwrap();
        let d = &e.routes[&build_type3_prefix(e.originator_ip)];
        d.local()
            .unwrap()
            .attrs
            .ext_communities
            .route_targets()
            .copied()
            .collect()
    }
    fn announced(i: &Inst) -> Vec<EvpnNlri> {
        i.transport()
            .iter()
            .filter(|a| !a.is_withdraw())
            .flat_map(|a| nlri_parse(a.nlri(), false).unwrap())
            .map(|w| w.nlri)
            .collect()
    }
    fn withdrawn(i: &Inst) -> Vec<EvpnNlri> {
        i.transport()
            .iter()
            .filter(|a| a.is_withdraw())
            .flat_map(|a| nlri_parse(a.nlri(), false).unwrap())
            .map(|w| w.nlri)
            .collect()
    }

    #[test]
    fn test_vni_lifecycle() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let e = i.vni_table().lookup(100).unwrap();
        assert_eq!(e.routes.len(), 1);
        let own = BgpRD::from_ipv4(Ipv4Addr::new(10, 0, 0, 1), 1);
        assert!(i.global_table().contains_key(&(own, build_type3_prefix(Ipv4Addr::new(10, 0, 0, 1)))));
        assert_eq!(announced(&i).len(), 1);
        assert_eq!(announced(&i)[0].rd, own);

        i.configure_export_rt(100, rt(100)).unwrap();
        assert_eq!(type3_rts(&i, 100), vec![rt(100)]);
        assert!(i.rt_index().imports(&rt(100), 100));

        assert!(matches!(i.delete_vni(100), Err(BgpError::VniInUse(100))));
        i.local_vni_del(100).unwrap();
        assert_eq!(withdrawn(&i).len(), 1);
        i.delete_vni(100).unwrap();
        assert!(i.rt_index().lookup(&rt(100)).is_none());
        assert!(i.rt_index().is_empty());
        assert!(i.global_table().is_empty());
        assert!(matches!(i.delete_vni(100), Err(BgpError::UnknownVni(100))));
    }
    #[test]
    fn test_unconfigured_vni_freed_on_down() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert!(i.is_vni_live(100));
        assert!(!i.is_vni_configured(100));
        i.local_vni_del(100).unwrap();
        assert!(i.vni_table().is_empty());
        assert!(i.rt_index().is_empty());
        assert!(i.local_vni_add(100, Ipv4Addr::UNSPECIFIED).is_err());
        assert!(i.vni_table().is_empty());
    }
    #[test]
    fn test_create_update_vni_idempotent() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.create_update_vni(100).unwrap();
        assert_eq!(i.vni_table().len(), 1);
        assert_eq!(i.vni_table().lookup(100).unwrap().rd_id, 1);
        assert!(i.is_vni_configured(100));
    }
    #[test]
    fn test_configure_rd_moves_routes() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let rd = BgpRD::new(65000, 100);
        i.configure_rd(100, rd).unwrap();
        assert!(i.rd_matches_existing(100, &rd));
        assert!(i.vni_table().lookup(100).unwrap().is_rd_configured());
        // old RD withdrawn before the new one is announced
        let t = i.transport();
        assert!(t[1].is_withdraw());
        assert!(!t[2].is_withdraw());
        assert_eq!(announced(&i)[1].rd, rd);
        // same RD again is a no-op
        i.configure_rd(100, rd).unwrap();
        assert_eq!(i.transport().len(), 3);
        i.unconfigure_rd(100).unwrap();
        assert_eq!(
            i.vni_table().lookup(100).unwrap().rd,
            BgpRD::from_ipv4(Ipv4Addr::new(10, 0, 0, 1), 1)
        );
        assert_eq!(i.transport().len(), 5);
    }
    #[test]
    fn test_router_id_update() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_vni_add(200, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.configure_rd(200, BgpRD::new(65000, 200)).unwrap();
        let before = i.transport().len();
        i.handle_router_id_update(Ipv4Addr::new(10, 0, 0, 9)).unwrap();
        assert_eq!(
            i.vni_table().lookup(100).unwrap().rd,
            BgpRD::from_ipv4(Ipv4Addr::new(10, 0, 0, 9), 1)
        );
        assert_eq!(i.vni_table().lookup(200).unwrap().rd, BgpRD::new(65000, 200));
        // one withdraw and one announce for VNI 100 only
        assert_eq!(i.transport().len(), before + 2);
    }
    #[test]
    fn test_import_rt_change_reimports() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let peer = crate::BgpSessionParams::new(
            65000,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            vec![],
        );
        let attrs = EvpnAttrs {
            ext_communities: crate::message::attributes::extcommunity::BgpExtCommunityList::from_vec(
                vec![rt(555)],
            ),
            nexthop: None,
        };
        let n = EvpnNlri::new(BgpRD::new(65000, 7), build_type3_prefix(Ipv4Addr::new(10, 0, 0, 2)), None);
        i.process_update(&peer, &attrs, &encode_nlri(std::iter::once(&n), None).unwrap())
            .unwrap();
        assert_eq!(i.vni_table().lookup(100).unwrap().routes.len(), 1);
        i.configure_import_rt(100, rt(555)).unwrap();
        assert_eq!(i.vni_table().lookup(100).unwrap().routes.len(), 2);
        assert!(!i.rt_index().imports(&rt(100), 100));
        assert!(i.unconfigure_import_rt(100, &rt(1)).is_err());
        i.unconfigure_import_rt(100, &rt(555)).unwrap();
        let e = i.vni_table().lookup(100).unwrap();
        assert!(!e.is_import_rt_configured());
        assert_eq!(e.import_rts, vec![rt(100)]);
        assert_eq!(e.routes.len(), 1);
    }
    #[test]
    fn test_export_rt_change_readvertises() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_macip_add(100, MacAddress::from_u64(0x0200_0000_0001), None, false)
            .unwrap();
        let before = i.transport().len();
        i.configure_export_rt(100, rt(7)).unwrap();
        i.configure_export_rt(100, rt(8)).unwrap();
        assert_eq!(type3_rts(&i, 100), vec![rt(7), rt(8)]);
        // both routes announced again for each change
        assert_eq!(i.transport().len(), before + 4);
        i.unconfigure_export_rt(100, &rt(7)).unwrap();
        i.unconfigure_export_rt(100, &rt(8)).unwrap();
        assert!(!i.vni_table().lookup(100).unwrap().is_export_rt_configured());
        assert_eq!(type3_rts(&i, 100), vec![rt(100)]);
    }
    #[test]
    fn test_export_rt_ignores_transitive_bit() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.configure_export_rt(100, rt(7)).unwrap();
        let nt = BgpExtCommunity {
            ctype: 0x40,
            ..rt(7)
        };
        let before = i.transport().len();
        i.configure_export_rt(100, nt).unwrap();
        assert_eq!(i.transport().len(), before);
        assert_eq!(i.vni_table().lookup(100).unwrap().export_rts, vec![rt(7)]);
        i.unconfigure_export_rt(100, &nt).unwrap();
        assert!(!i.vni_table().lookup(100).unwrap().is_export_rt_configured());
        assert_eq!(type3_rts(&i, 100), vec![rt(100)]);
    }
    #[test]
    fn test_rt_index_follows_import_lists() {
        fn check(i: &Inst) {
            for e in i.vni_table().iter_sorted() {
                for r in e.import_rts.iter() {
                    assert!(i.rt_index().imports(r, e.vni), "VNI {} misses RT {}", e.vni, r);
                }
                for r in i.rt_index().rts_for_vni(e.vni) {
                    assert!(e.import_rts.iter().any(|x| x.rt_key() == r.rt_key()));
                }
            }
            for (_, vnis) in i.rt_index().iter() {
                assert!(!vnis.is_empty());
                assert!(vnis.iter().all(|v| i.vni_table().contains(*v)));
            }
        }
        fn change_as(i: &mut Inst, as_num: u32) {
            let mut cfg = EvpnConfig::default();
            cfg.as_num = as_num;
            cfg.router_id = i.router_id();
            i.apply_config(&cfg).unwrap();
        }
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.create_update_vni(200).unwrap();
        i.local_vni_add(300, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        check(&i);
        i.configure_import_rt(100, rt(1)).unwrap();
        check(&i);
        i.configure_import_rt(200, rt(1)).unwrap();
        i.configure_import_rt(100, rt(2)).unwrap();
        check(&i);
        change_as(&mut i, 65010);
        check(&i);
        assert!(i.rt_index().imports(&BgpExtCommunity::rt_asn(65010, 300), 300));
        assert!(i.rt_index().lookup(&rt(300)).is_none());
        i.unconfigure_import_rt(100, &rt(1)).unwrap();
        check(&i);
        i.unconfigure_import_rt(100, &rt(2)).unwrap();
        check(&i);
        assert_eq!(
            i.vni_table().lookup(100).unwrap().import_rts,
            vec![BgpExtCommunity::rt_asn(65010, 100)]
        );
        i.delete_vni(200).unwrap();
        check(&i);
        assert!(i.rt_index().lookup(&rt(1)).is_none());
        change_as(&mut i, 65000);
        check(&i);
        i.local_vni_del(300).unwrap();
        check(&i);
        assert_eq!(i.rt_index().len(), 1);
    }
    #[test]
    fn test_originator_change() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_macip_add(100, MacAddress::from_u64(0x0200_0000_0001), None, false)
            .unwrap();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        let w = withdrawn(&i);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].prefix, build_type3_prefix(Ipv4Addr::new(10, 0, 0, 1)));
        let e = i.vni_table().lookup(100).unwrap();
        assert!(e.routes.contains_key(&build_type3_prefix(Ipv4Addr::new(10, 0, 0, 5))));
        let m = &e.routes[&build_type2_prefix(MacAddress::from_u64(0x0200_0000_0001), None)];
        assert_eq!(
            m.local().unwrap().attrs.nexthop,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
    }
    #[test]
    fn test_local_macip() {
        let mut i = inst();
        let m = MacAddress::from_u64(0x0200_0000_0001);
        assert!(matches!(
            i.local_macip_add(100, m, None, false),
            Err(BgpError::UnknownVni(100))
        ));
        i.create_update_vni(100).unwrap();
        assert!(i.local_macip_add(100, m, None, false).is_err());
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let ip = Some(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 5)));
        i.local_macip_add(100, m, ip, false).unwrap();
        let n = announced(&i).pop().unwrap();
        assert_eq!(n.prefix, build_type2_prefix(m, ip));
        assert_eq!(n.tags, Some(VniTags::l2(100)));
        i.local_macip_del(100, m, ip).unwrap();
        assert_eq!(withdrawn(&i).pop().unwrap().prefix, build_type2_prefix(m, ip));
        assert_eq!(i.vni_table().lookup(100).unwrap().routes.len(), 1);
        // unknown MAC is fine
        i.local_macip_del(100, m, None).unwrap();
    }
    #[test]
    fn test_advertise_all_vni_toggle() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_vni_add(200, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.unset_advertise_all_vni().unwrap();
        assert!(!i.advertise_all_vni());
        assert_eq!(withdrawn(&i).len(), 2);
        // configured VNI stays, not live
        assert!(i.vni_table().lookup(100).is_some());
        assert!(!i.is_vni_live(100));
        assert!(i.vni_table().lookup(200).is_none());
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        assert_eq!(announced(&i).len(), 2);
        assert!(i
            .local_macip_add(100, MacAddress::from_u64(1), None, false)
            .is_ok());
        assert_eq!(announced(&i).len(), 2);
        i.set_advertise_all_vni().unwrap();
        assert_eq!(announced(&i).len(), 3);
    }
    #[test]
    fn test_cleanup() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.local_vni_add(200, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        i.cleanup().unwrap();
        assert!(i.vni_table().is_empty());
        assert!(i.rt_index().is_empty());
        assert!(i.global_table().is_empty());
    }
    #[test]
    fn test_apply_config() {
        let mut cfg = EvpnConfig::default();
        cfg.as_num = 65001;
        cfg.router_id = Ipv4Addr::new(10, 0, 0, 1);
        let mut v = VniConfig::new(100);
        v.rd = Some(BgpRD::new(65001, 100));
        v.import_rts = vec![rt(1), rt(1), rt(2)];
        cfg.vnis.push(v);
        let mut v = VniConfig::new(100);
        v.export_rts = vec![rt(3)];
        cfg.vnis.push(v);
        let (tx, _rx) = mpsc::channel::<EvpnAdvertisement>();
        let i = EvpnInstance::from_config(&cfg, Vec::<RibOp>::new(), tx).unwrap();
        let e = i.vni_table().lookup(100).unwrap();
        // the second entry wins
        assert!(!e.is_rd_configured());
        assert_eq!(e.rd, BgpRD::from_ipv4(Ipv4Addr::new(10, 0, 0, 1), 1));
        assert_eq!(e.import_rts, vec![BgpExtCommunity::rt_asn(65001, 100)]);
        assert_eq!(e.export_rts, vec![rt(3)]);
        assert!(e.is_vni_configured());
    }
    #[test]
    fn test_as_change_rederives_auto_rts() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let mut cfg = EvpnConfig::default();
        cfg.as_num = 65002;
        cfg.router_id = i.router_id();
        i.apply_config(&cfg).unwrap();
        assert!(i.rt_index().imports(&BgpExtCommunity::rt_asn(65002, 100), 100));
        assert_eq!(type3_rts(&i, 100), vec![BgpExtCommunity::rt_asn(65002, 100)]);
    }
    #[test]
    fn test_map_unmap_vni_rts() {
        let mut i = inst();
        i.create_update_vni(100).unwrap();
        i.unmap_vni_from_its_rts(100).unwrap();
        assert!(i.rt_index().is_empty());
        i.map_vni_to_its_rts(100).unwrap();
        assert!(i.rt_index().imports(&rt(100), 100));
        assert!(i.map_vni_to_its_rts(5).is_err());
    }
    #[test]
    fn test_local_mobility_sequence_from_remote() {
        let mut i = inst();
        i.local_vni_add(100, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let m = MacAddress::from_u64(0x0200_0000_0001);
        let peer = crate::BgpSessionParams::new(
            65000,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            vec![],
        );
        let mut ext = crate::message::attributes::extcommunity::BgpExtCommunityList::from_vec(vec![rt(100)]);
        ext.set_mac_mobility(Some(MacMobility::new(false, 4)));
        let attrs = EvpnAttrs {
            ext_communities: ext,
            nexthop: None,
        };
        let n = EvpnNlri::new(BgpRD::new(65000, 7), build_type2_prefix(m, None), Some(VniTags::l2(100)));
        i.process_update(&peer, &attrs, &encode_nlri(std::iter::once(&n), None).unwrap())
            .unwrap();
        i.local_macip_add(100, m, None, false).unwrap();
        let d = &i.vni_table().lookup(100).unwrap().routes[&n.prefix];
        assert_eq!(d.installed().unwrap().mac_mobility(), MacMobility::new(false, 5));
        assert!(d.installed().unwrap().is_local());
    }
}
