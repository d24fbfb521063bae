// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This module contains some internal utilities

use crate::error::BgpError;

/// Gets ipv4 address from the buffer.
pub fn decode_addrv4_from(buf: &[u8]) -> Result<std::net::Ipv4Addr, BgpError> {
    if buf.len() < 4 {
        return Err(BgpError::static_str("Invalid addrv4 length"));
    }
    Ok(std::net::Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]))
}
/// Stores ipv4 address into the buffer.
pub fn encode_addrv4_to(addr: &std::net::Ipv4Addr, buf: &mut [u8]) -> Result<usize, BgpError> {
    if buf.len() < 4 {
        return Err(BgpError::static_str("Invalid addrv4 length"));
    }
    buf[0..4].clone_from_slice(&addr.octets());
    Ok(4)
}
/// Gets ipv6 address from the buffer.
pub fn decode_addrv6_from(buf: &[u8]) -> Result<std::net::Ipv6Addr, BgpError> {
    if buf.len() < 16 {
        return Err(BgpError::static_str("Invalid addrv6 length"));
    }
    let mut octets = [0_u8; 16];
    octets.copy_from_slice(&buf[0..16]);
    Ok(std::net::Ipv6Addr::from(octets))
}
/// Stores ipv6 address into the buffer.
pub fn encode_addrv6_to(addr: &std::net::Ipv6Addr, buf: &mut [u8]) -> Result<usize, BgpError> {
    if buf.len() < 16 {
        return Err(BgpError::static_str("Invalid addrv6 length"));
    }
    buf[0..16].clone_from_slice(&addr.octets());
    Ok(16)
}
/// Gets ipv4/ipv6 address from the buffer. Address type determined by buffer length.
pub fn decode_addr_from(buf: &[u8]) -> Result<std::net::IpAddr, BgpError> {
    match buf.len() {
        16 => Ok(std::net::IpAddr::V6(decode_addrv6_from(buf)?)),
        4 => Ok(std::net::IpAddr::V4(decode_addrv4_from(buf)?)),
        _ => Err(BgpError::static_str("Invalid addr length")),
    }
}
/// Stores ipv4/ipv6 address into the buffer.
pub fn encode_addr_to(addr: &std::net::IpAddr, buf: &mut [u8]) -> Result<usize, BgpError> {
    match addr {
        std::net::IpAddr::V4(a) => encode_addrv4_to(a, buf),
        std::net::IpAddr::V6(a) => encode_addrv6_to(a, buf),
    }
}
/// Address length in bits as carried in EVPN route "IP length" octets.
pub fn addr_bits(addr: &std::net::IpAddr) -> u8 {
    match addr {
        std::net::IpAddr::V4(_) => 32,
        std::net::IpAddr::V6(_) => 128,
    }
}
pub fn setn_u16(s: u16, a: &mut [u8]) {
    a[0] = (s >> 8) as u8;
    a[1] = (s & 0xff) as u8;
}
pub fn getn_u16(a: &[u8]) -> u16 {
    (a[0] as u16) << 8 | (a[1] as u16)
}
pub fn getn_u32(a: &[u8]) -> u32 {
    (a[0] as u32) << 24 | (a[1] as u32) << 16 | (a[2] as u32) << 8 | (a[3] as u32)
}
pub fn setn_u32(s: u32, a: &mut [u8]) {
    a[0] = (s >> 24) as u8;
    a[1] = ((s >> 16) & 0xff) as u8;
    a[2] = ((s >> 8) & 0xff) as u8;
    a[3] = (s & 0xff) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_addr_codec() {
        let mut buf = [0_u8; 16];
        let a6: Ipv6Addr = "2001:db8::7".parse().unwrap();
        assert_eq!(encode_addr_to(&IpAddr::V6(a6), &mut buf).unwrap(), 16);
        assert_eq!(decode_addr_from(&buf).unwrap(), IpAddr::V6(a6));
        assert_eq!(encode_addrv4_to(&Ipv4Addr::new(10, 0, 0, 1), &mut buf).unwrap(), 4);
        assert_eq!(decode_addr_from(&buf[0..4]).unwrap(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(decode_addrv4_from(&buf[0..3]).is_err());
        assert_eq!(addr_bits(&IpAddr::V6(a6)), 128);
    }
    #[test]
    fn test_network_order() {
        let mut buf = [0_u8; 4];
        setn_u32(0x01020304, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(getn_u32(&buf), 0x01020304);
        setn_u16(0xabcd, &mut buf);
        assert_eq!(getn_u16(&buf), 0xabcd);
    }
}
