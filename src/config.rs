// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! EVPN instance configuration
//!
//! RD and route target values are written as strings, "65000:100" or
//! "10.0.0.1:7".
//!
//! ```
//! use zettaevpn::config::EvpnConfig;
//!
//! let cfg: EvpnConfig = serde_json::from_str(r#"{
//!     "as_num": 65000,
//!     "router_id": "10.0.0.1",
//!     "vnis": [{"vni": 100, "rd": "10.0.0.1:100", "import_rts": ["65000:100"]}]
//! }"#).unwrap();
//! assert!(cfg.advertise_all_vni);
//! assert_eq!(cfg.vnis[0].export_rts.len(), 0);
//! ```

use crate::afi::{BgpRD, Vni};
use crate::message::attributes::extcommunity::BgpExtCommunity;
#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Per-VNI configuration. Unset RD or empty RT lists are auto-derived.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct VniConfig {
    pub vni: Vni,
    #[cfg_attr(feature = "serialization", serde(default))]
    pub rd: Option<BgpRD>,
    #[cfg_attr(feature = "serialization", serde(default))]
    pub import_rts: Vec<BgpExtCommunity>,
    #[cfg_attr(feature = "serialization", serde(default))]
    pub export_rts: Vec<BgpExtCommunity>,
}
impl VniConfig {
    pub fn new(vni: Vni) -> VniConfig {
        VniConfig {
            vni,
            rd: None,
            import_rts: Vec::new(),
            export_rts: Vec::new(),
        }
    }
}

/// EVPN instance configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(default))]
pub struct EvpnConfig {
    /// Local AS, used for auto-derived route targets
    pub as_num: u32,
    /// Router ID, used for auto-derived RDs
    pub router_id: Ipv4Addr,
    /// Originate routes for every live VNI
    pub advertise_all_vni: bool,
    /// Path id put in front of outbound NLRI when addpath is in use
    pub addpath_tx_id: Option<u32>,
    pub vnis: Vec<VniConfig>,
}
impl Default for EvpnConfig {
    fn default() -> Self {
        EvpnConfig {
            as_num: 0,
            router_id: Ipv4Addr::UNSPECIFIED,
            advertise_all_vni: true,
            addpath_tx_id: None,
            vnis: Vec::new(),
        }
    }
}

#[cfg(all(test, feature = "serialization"))]
mod tests {
    use super::*;

    #[test]
    fn test_config_json() {
        let cfg: EvpnConfig = serde_json::from_str(
            r#"{
                "as_num": 4200000000,
                "router_id": "192.0.2.1",
                "advertise_all_vni": false,
                "addpath_tx_id": 1,
                "vnis": [
                    {"vni": 10, "export_rts": ["192.0.2.1:10"]},
                    {"vni": 20, "rd": "65000:20", "import_rts": ["65000:20", "65000:21"]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.as_num, 4200000000);
        assert!(!cfg.advertise_all_vni);
        assert_eq!(cfg.addpath_tx_id, Some(1));
        assert_eq!(cfg.vnis[0].rd, None);
        assert_eq!(
            cfg.vnis[0].export_rts,
            vec![BgpExtCommunity::rt_ipv4(Ipv4Addr::new(192, 0, 2, 1), 10)]
        );
        assert_eq!(cfg.vnis[1].rd, Some(BgpRD::new(65000, 20)));
        assert_eq!(cfg.vnis[1].import_rts.len(), 2);
        let back: EvpnConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
    #[test]
    fn test_config_rejects_bad_rt() {
        let r: Result<VniConfig, _> =
            serde_json::from_str(r#"{"vni": 1, "import_rts": ["not-a-target"]}"#);
        assert!(r.is_err());
    }
}
