// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This module contains error types

use crate::afi::vni::Vni;

/// This is represents standard library error.
///
/// # Generic usage
///
/// All library methods that can cause errors returns Result<...,BgpError>.
///
/// Configuration errors (`DuplicateVni`, `VniInUse`, `UnknownVni`) are
/// reported before anything is mutated. `MalformedNlri` means the whole
/// EVPN NLRI of an UPDATE has to be discarded; what happens to the session
/// is up to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BgpError {
    #[error("BgpError {0}")]
    Static(&'static str),
    #[error("BgpError {0}")]
    DynStr(std::string::String),
    /// Wire format violation in received or to-be-sent EVPN NLRI.
    #[error("malformed EVPN NLRI: {0}")]
    MalformedNlri(#[from] NlriError),
    /// Route type outside 1..=5.
    #[error("unknown EVPN route type {0}")]
    UnknownRouteType(u8),
    #[error("VNI {0} already exists")]
    DuplicateVni(Vni),
    #[error("VNI {0} is live or configured")]
    VniInUse(Vni),
    #[error("unknown VNI {0}")]
    UnknownVni(Vni),
    /// Allocation failed while growing a table, nothing was changed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

impl BgpError {
    /// Wraps static string error message.
    #[inline]
    pub fn static_str(ms: &'static str) -> BgpError {
        BgpError::Static(ms)
    }
    /// Wraps std String error message.
    #[inline]
    pub fn from_string(s: std::string::String) -> BgpError {
        BgpError::DynStr(s)
    }
    /// Just says that buffer size is too small.
    pub fn insufficient_buffer_size() -> BgpError {
        BgpError::Static("Insufficient buffer size")
    }
    /// Just says that data size is too big to be encoded.
    pub fn too_many_data() -> BgpError {
        BgpError::Static("Too many data")
    }
    /// True for errors that invalidate the received NLRI as a whole.
    pub fn is_malformed_nlri(&self) -> bool {
        matches!(self, BgpError::MalformedNlri(_))
    }
}

/// Exact reason an EVPN NLRI was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NlriError {
    #[error("unknown route type {0}")]
    UnknownRouteType(u8),
    #[error("route type {route_type} with invalid length {len}")]
    InvalidLength { route_type: u8, len: usize },
    #[error("truncated at offset {offset}, need {need} more bytes")]
    Truncated { offset: usize, need: usize },
    #[error("invalid MAC address length {0} bits")]
    InvalidMacLength(u8),
    #[error("invalid IP address length {0} bits")]
    InvalidIpLength(u8),
    #[error("route type {0} requires a VNI tag")]
    MissingTag(u8),
    #[error("prefix and gateway are of different address families")]
    MixedAddressFamily,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_classification() {
        let e: BgpError = NlriError::InvalidMacLength(40).into();
        assert!(e.is_malformed_nlri());
        assert!(!BgpError::VniInUse(100).is_malformed_nlri());
        assert_eq!(
            e.to_string(),
            "malformed EVPN NLRI: invalid MAC address length 40 bits"
        );
    }
}
