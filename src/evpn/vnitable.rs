// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! VNI table: per-VNI state, RD/RT derivation and the RD index allocator

use crate::afi::*;
use crate::error::BgpError;
use crate::evpn::route::EvpnRouteTable;
use crate::evpn::rtindex::RtIndex;
use crate::message::attributes::extcommunity::BgpExtCommunity;
use bitflags::bitflags;
use log::debug;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
    #[cfg_attr(feature = "serialization", serde(transparent))]
    pub struct VniFlags: u8 {
        const CONFIGURED = 0x01;
        const LIVE = 0x02;
        const RD_CONFIGURED = 0x04;
        const IMPORT_RT_CONFIGURED = 0x08;
        const EXPORT_RT_CONFIGURED = 0x10;
    }
}

/// Auto route target: low 16 bits of the AS and the VNI
pub fn auto_rt(as_num: u32, vni: Vni) -> BgpExtCommunity {
    BgpExtCommunity::rt_asn((as_num & 0xffff) as u16, vni)
}

/// Auto RD: router id and the per-VNI index
pub fn auto_rd(router_id: Ipv4Addr, rd_id: u16) -> BgpRD {
    BgpRD::from_ipv4(router_id, rd_id)
}

/// One VXLAN segment
#[derive(Debug)]
pub struct VniEntry {
    pub vni: Vni,
    pub flags: VniFlags,
    pub rd: BgpRD,
    /// Index used in the auto RD
    pub rd_id: u16,
    /// Inclusive multicast originator, normally the router id
    pub originator_ip: Ipv4Addr,
    pub import_rts: Vec<BgpExtCommunity>,
    pub export_rts: Vec<BgpExtCommunity>,
    pub routes: EvpnRouteTable,
}

impl VniEntry {
    fn new(vni: Vni, rd_id: u16) -> VniEntry {
        VniEntry {
            vni,
            flags: VniFlags::empty(),
            rd: BgpRD::default(),
            rd_id,
            originator_ip: Ipv4Addr::UNSPECIFIED,
            import_rts: Vec::new(),
            export_rts: Vec::new(),
            routes: EvpnRouteTable::new(),
        }
    }
    pub fn is_vni_configured(&self) -> bool {
        self.flags.contains(VniFlags::CONFIGURED)
    }
    pub fn is_vni_live(&self) -> bool {
        self.flags.contains(VniFlags::LIVE)
    }
    pub fn is_rd_configured(&self) -> bool {
        self.flags.contains(VniFlags::RD_CONFIGURED)
    }
    pub fn is_import_rt_configured(&self) -> bool {
        self.flags.contains(VniFlags::IMPORT_RT_CONFIGURED)
    }
    pub fn is_export_rt_configured(&self) -> bool {
        self.flags.contains(VniFlags::EXPORT_RT_CONFIGURED)
    }
    /// Any of RD, import RT, export RT set by configuration
    pub fn is_vni_param_configured(&self) -> bool {
        self.flags.intersects(
            VniFlags::RD_CONFIGURED
                | VniFlags::IMPORT_RT_CONFIGURED
                | VniFlags::EXPORT_RT_CONFIGURED,
        )
    }
    /// Byte equality of the 8-byte RD, whatever its type.
    pub fn rd_matches_existing(&self, rd: &BgpRD) -> bool {
        self.rd.octets() == rd.octets()
    }

    /// Replaces the import list, keeping the RT index in step. New RTs are
    /// mapped before stale ones are unmapped so a failure leaves the old
    /// list intact.
    pub(crate) fn set_import_rts(
        &mut self,
        rts: Vec<BgpExtCommunity>,
        index: &mut RtIndex,
    ) -> Result<(), BgpError> {
        let mut added = Vec::new();
        for rt in rts.iter() {
            match index.map(rt, self.vni) {
                Ok(true) => added.push(*rt),
                Ok(false) => {}
                Err(e) => {
                    for a in added.iter() {
                        index.unmap(a, self.vni);
                    }
                    return Err(e);
                }
            }
        }
        for old in self.import_rts.iter() {
            if !rts.iter().any(|r| r.rt_key() == old.rt_key()) {
                index.unmap(old, self.vni);
            }
        }
        self.import_rts = rts;
        Ok(())
    }
    /// Puts the auto import RT in place unless import RTs are configured.
    pub fn derive_auto_rt_import(
        &mut self,
        as_num: u32,
        index: &mut RtIndex,
    ) -> Result<(), BgpError> {
        if self.is_import_rt_configured() {
            return Ok(());
        }
        let rt = auto_rt(as_num, self.vni);
        debug!("VNI {} auto import RT {}", self.vni, rt);
        self.set_import_rts(vec![rt], index)
    }
    /// Puts the auto export RT in place unless export RTs are configured.
    pub fn derive_auto_rt_export(&mut self, as_num: u32) {
        if self.is_export_rt_configured() {
            return;
        }
        self.export_rts = vec![auto_rt(as_num, self.vni)];
        debug!("VNI {} auto export RT {}", self.vni, self.export_rts[0]);
    }
    /// Computes the auto RD unless the RD is configured. Returns true if
    /// the RD changed.
    pub fn derive_auto_rd(&mut self, router_id: Ipv4Addr) -> bool {
        if self.is_rd_configured() {
            return false;
        }
        let rd = auto_rd(router_id, self.rd_id);
        if self.rd_matches_existing(&rd) {
            return false;
        }
        debug!("VNI {} auto RD {}", self.vni, rd);
        self.rd = rd;
        true
    }
}

/// VNI to entry table
#[derive(Debug, Default)]
pub struct VniTable {
    entries: HashMap<Vni, VniEntry>,
    rd_ids: BTreeSet<u16>,
}

impl VniTable {
    pub fn new() -> VniTable {
        VniTable {
            entries: HashMap::new(),
            rd_ids: BTreeSet::new(),
        }
    }
    /// Lowest unused RD index, starting from 1
    fn alloc_rd_id(&mut self) -> Result<u16, BgpError> {
        let mut id: u16 = 1;
        for used in self.rd_ids.iter() {
            if *used != id {
                break;
            }
            id = id
                .checked_add(1)
                .ok_or(BgpError::ResourceExhausted("RD index"))?;
        }
        self.rd_ids.insert(id);
        Ok(id)
    }
    /// Creates an entry with no flags set.
    pub fn create(&mut self, vni: Vni) -> Result<&mut VniEntry, BgpError> {
        if self.entries.contains_key(&vni) {
            return Err(BgpError::DuplicateVni(vni));
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| BgpError::ResourceExhausted("VNI table"))?;
        let rd_id = self.alloc_rd_id()?;
        debug!("VNI {} created, RD index {}", vni, rd_id);
        Ok(self.entries.entry(vni).or_insert(VniEntry::new(vni, rd_id)))
    }
    pub fn lookup(&self, vni: Vni) -> Option<&VniEntry> {
        self.entries.get(&vni)
    }
    pub fn lookup_mut(&mut self, vni: Vni) -> Option<&mut VniEntry> {
        self.entries.get_mut(&vni)
    }
    pub fn contains(&self, vni: Vni) -> bool {
        self.entries.contains_key(&vni)
    }
    /// Removes the entry. Fails while it is live or configured.
    pub fn delete(&mut self, vni: Vni) -> Result<VniEntry, BgpError> {
        match self.entries.get(&vni) {
            None => return Err(BgpError::UnknownVni(vni)),
            Some(e) if e.is_vni_live() || e.is_vni_configured() => {
                return Err(BgpError::VniInUse(vni))
            }
            Some(_) => {}
        }
        let e = self
            .entries
            .remove(&vni)
            .ok_or(BgpError::UnknownVni(vni))?;
        self.rd_ids.remove(&e.rd_id);
        debug!("VNI {} deleted", vni);
        Ok(e)
    }
    /// VNIs in ascending order
    pub fn vnis(&self) -> Vec<Vni> {
        let mut v: Vec<Vni> = self.entries.keys().copied().collect();
        v.sort_unstable();
        v
    }
    /// Entries in ascending VNI order
    pub fn iter_sorted(&self) -> impl Iterator<Item = &VniEntry> {
        self.vnis().into_iter().filter_map(move |v| self.entries.get(&v))
    }
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VniEntry> {
        self.entries.values_mut()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
