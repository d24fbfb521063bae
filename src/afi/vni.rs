// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! VXLAN network identifier and its 3-byte wire tag

/// 24-bit VXLAN network identifier. Only the low 24 bits are meaningful.
pub type Vni = u32;

/// Largest VNI that survives the 3-byte wire tag unchanged.
pub const VNI_MAX: Vni = 0x00ff_ffff;

/// Stores VNI as 3-byte big-endian tag. Bits above 24 are dropped.
/// ```
/// use zettaevpn::afi::vni::*;
///
/// assert_eq!(vni_to_tag(0x0a0b0c), [0x0a, 0x0b, 0x0c]);
/// ```
pub fn vni_to_tag(vni: Vni) -> [u8; 3] {
    [
        ((vni >> 16) & 0xff) as u8,
        ((vni >> 8) & 0xff) as u8,
        (vni & 0xff) as u8,
    ]
}

/// Gets VNI from 3-byte big-endian tag.
pub fn tag_to_vni(tag: &[u8; 3]) -> Vni {
    (tag[0] as u32) << 16 | (tag[1] as u32) << 8 | (tag[2] as u32)
}

/// Reads a tag from the head of the buffer.
pub(crate) fn decode_tag_from(buf: &[u8]) -> Option<Vni> {
    match buf.get(0..3) {
        Some(&[a, b, c]) => Some(tag_to_vni(&[a, b, c])),
        _ => None,
    }
}

/// Formats a tag the way routes show it, as decimal VNI.
pub fn tag_to_string(tag: &[u8; 3]) -> String {
    tag_to_vni(tag).to_string()
}
