// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Route target to importing VNIs reverse index
//!
//! Both directions are kept, RT to VNIs for the import path and VNI to RTs
//! for unmapping a VNI without walking the whole index. Only [`RtIndex::map`]
//! and [`RtIndex::unmap`] change them.

use crate::afi::Vni;
use crate::error::BgpError;
use crate::message::attributes::extcommunity::BgpExtCommunity;
use log::{debug, error};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct RtIndex {
    by_rt: HashMap<BgpExtCommunity, BTreeSet<Vni>>,
    by_vni: HashMap<Vni, BTreeSet<BgpExtCommunity>>,
}

impl RtIndex {
    pub fn new() -> RtIndex {
        RtIndex {
            by_rt: HashMap::new(),
            by_vni: HashMap::new(),
        }
    }
    /// Adds VNI to the importers of `rt`, creating the node on first use.
    /// Returns false if the VNI already imported it.
    pub fn map(&mut self, rt: &BgpExtCommunity, vni: Vni) -> Result<bool, BgpError> {
        let key = rt.rt_key();
        if !self.by_rt.contains_key(&key) {
            self.by_rt
                .try_reserve(1)
                .map_err(|_| BgpError::ResourceExhausted("route target index"))?;
        }
        if !self.by_vni.contains_key(&vni) {
            self.by_vni
                .try_reserve(1)
                .map_err(|_| BgpError::ResourceExhausted("route target index"))?;
        }
        let added = self.by_rt.entry(key).or_default().insert(vni);
        self.by_vni.entry(vni).or_default().insert(key);
        if added {
            debug!("RT {} mapped to VNI {}", key, vni);
        }
        Ok(added)
    }
    /// Removes VNI from the importers of `rt`, the node goes away with its
    /// last importer. Returns false if the VNI did not import it.
    pub fn unmap(&mut self, rt: &BgpExtCommunity, vni: Vni) -> bool {
        let key = rt.rt_key();
        let removed = match self.by_rt.get_mut(&key) {
            Some(vnis) => {
                let r = vnis.remove(&vni);
                if vnis.is_empty() {
                    self.by_rt.remove(&key);
                }
                r
            }
            None => false,
        };
        let back = match self.by_vni.get_mut(&vni) {
            Some(rts) => {
                let r = rts.remove(&key);
                if rts.is_empty() {
                    self.by_vni.remove(&vni);
                }
                r
            }
            None => false,
        };
        if removed != back {
            error!("RT index out of sync for RT {} VNI {}", key, vni);
            debug_assert!(false, "RT index out of sync");
        }
        if removed {
            debug!("RT {} unmapped from VNI {}", key, vni);
        }
        removed || back
    }
    /// Drops every mapping of the VNI. Returns the RTs it imported.
    pub fn unmap_vni(&mut self, vni: Vni) -> Vec<BgpExtCommunity> {
        let rts: Vec<BgpExtCommunity> = self.rts_for_vni(vni).copied().collect();
        for rt in rts.iter() {
            self.unmap(rt, vni);
        }
        self.prune();
        rts
    }
    /// Drops nodes left without importers in either direction. Returns the
    /// number of nodes dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.by_rt.len() + self.by_vni.len();
        self.by_rt.retain(|_, vnis| !vnis.is_empty());
        self.by_vni.retain(|_, rts| !rts.is_empty());
        let dropped = before - self.by_rt.len() - self.by_vni.len();
        if dropped > 0 {
            error!("RT index had {} empty nodes", dropped);
        }
        dropped
    }
    /// VNIs importing `rt`. An empty node reads as no importers and is
    /// dropped by the next [`RtIndex::unmap_vni`] or [`RtIndex::prune`].
    pub fn lookup(&self, rt: &BgpExtCommunity) -> Option<&BTreeSet<Vni>> {
        match self.by_rt.get(&rt.rt_key()) {
            Some(vnis) if vnis.is_empty() => {
                debug_assert!(false, "empty RT index node");
                None
            }
            r => r,
        }
    }
    /// True if the VNI imports `rt`
    pub fn imports(&self, rt: &BgpExtCommunity, vni: Vni) -> bool {
        self.lookup(rt).map(|v| v.contains(&vni)).unwrap_or(false)
    }
    /// RTs imported by the VNI
    pub fn rts_for_vni(&self, vni: Vni) -> impl Iterator<Item = &BgpExtCommunity> {
        self.by_vni.get(&vni).into_iter().flat_map(|s| s.iter())
    }
    pub fn iter(&self) -> impl Iterator<Item = (&BgpExtCommunity, &BTreeSet<Vni>)> {
        self.by_rt.iter()
    }
    /// Number of distinct RTs
    pub fn len(&self) -> usize {
        self.by_rt.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_rt.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rt(n: u32) -> BgpExtCommunity {
        BgpExtCommunity::rt_asn(65000, n)
    }

    #[test]
    fn test_map_unmap_node_lifecycle() {
        let mut idx = RtIndex::new();
        assert!(idx.map(&rt(1), 100).unwrap());
        assert!(!idx.map(&rt(1), 100).unwrap());
        assert!(idx.map(&rt(1), 200).unwrap());
        assert_eq!(idx.len(), 1);
        assert_eq!(
            idx.lookup(&rt(1)).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![100, 200]
        );
        assert!(idx.unmap(&rt(1), 100));
        assert!(!idx.unmap(&rt(1), 100));
        assert!(idx.imports(&rt(1), 200));
        assert!(idx.unmap(&rt(1), 200));
        assert!(idx.lookup(&rt(1)).is_none());
        assert!(idx.is_empty());
    }
    #[test]
    fn test_lookup_ignores_transitive_bit() {
        let mut idx = RtIndex::new();
        idx.map(&rt(5), 5).unwrap();
        let nt = BgpExtCommunity {
            ctype: 0x40,
            ..rt(5)
        };
        assert!(idx.imports(&nt, 5));
        assert!(idx.unmap(&nt, 5));
        assert!(idx.is_empty());
    }
    #[test]
    fn test_unmap_vni() {
        let mut idx = RtIndex::new();
        idx.map(&rt(1), 10).unwrap();
        idx.map(&rt(2), 10).unwrap();
        idx.map(&rt(2), 20).unwrap();
        let mut gone = idx.unmap_vni(10);
        gone.sort();
        assert_eq!(gone, vec![rt(1), rt(2)]);
        assert!(idx.lookup(&rt(1)).is_none());
        assert_eq!(idx.lookup(&rt(2)).unwrap().len(), 1);
        assert_eq!(idx.rts_for_vni(10).count(), 0);
    }
    #[test]
    fn test_empty_nodes_pruned() {
        let mut idx = RtIndex::new();
        idx.map(&rt(1), 10).unwrap();
        idx.by_rt.insert(rt(9), BTreeSet::new());
        idx.by_vni.insert(99, BTreeSet::new());
        assert_eq!(idx.len(), 2);
        assert!(idx.unmap_vni(10).contains(&rt(1)));
        assert!(idx.is_empty());
        assert!(idx.by_vni.is_empty());
        idx.by_rt.insert(rt(9), BTreeSet::new());
        assert_eq!(idx.prune(), 1);
        assert_eq!(idx.prune(), 0);
        assert!(idx.is_empty());
    }
    #[test]
    fn test_matches_model_after_random_ops() {
        let mut idx = RtIndex::new();
        let mut model: BTreeMap<Vni, BTreeSet<u32>> = BTreeMap::new();
        let mut seed: u32 = 12345;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let vni = (seed >> 8) % 7;
            let r = (seed >> 16) % 5;
            if (seed >> 24) % 3 == 0 {
                idx.unmap(&rt(r), vni);
                if let Some(s) = model.get_mut(&vni) {
                    s.remove(&r);
                }
            } else {
                idx.map(&rt(r), vni).unwrap();
                model.entry(vni).or_default().insert(r);
            }
        }
        for vni in 0..7 {
            for r in 0..5 {
                let expect = model.get(&vni).map(|s| s.contains(&r)).unwrap_or(false);
                assert_eq!(idx.imports(&rt(r), vni), expect);
            }
        }
        assert!(idx.iter().all(|(_, v)| !v.is_empty()));
    }
}
