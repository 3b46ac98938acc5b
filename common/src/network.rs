// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Address-family detection and multicast address parsing.

use std::fmt;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use oxnet::Ipv4Net;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The two address families a multicast route or group may belong to.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Ord, PartialOrd,
)]
pub enum AddrFamily {
    Inet,
    Inet6,
}

impl fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddrFamily::Inet => write!(f, "IPv4"),
            AddrFamily::Inet6 => write!(f, "IPv6"),
        }
    }
}

/// Guess the family of an address from its text.  Any colon makes it IPv6,
/// which is decided before the text is known to parse at all.
pub fn family_of(addr: &str) -> AddrFamily {
    if addr.contains(':') {
        AddrFamily::Inet6
    } else {
        AddrFamily::Inet
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AddrError {
    /// The text isn't an address of the expected family
    #[error("invalid {family} address: {addr}")]
    Invalid { family: AddrFamily, addr: String },
    /// The address parsed, but isn't in the multicast range
    #[error("{0} is not a multicast address")]
    NotMulticast(String),
    /// The prefix length is unparseable or longer than the address
    #[error("invalid prefix length: {0}")]
    PrefixLen(String),
}

pub fn parse_v4(addr: &str) -> Result<Ipv4Addr, AddrError> {
    addr.parse().map_err(|_| AddrError::Invalid {
        family: AddrFamily::Inet,
        addr: addr.to_string(),
    })
}

pub fn parse_v6(addr: &str) -> Result<Ipv6Addr, AddrError> {
    addr.parse().map_err(|_| AddrError::Invalid {
        family: AddrFamily::Inet6,
        addr: addr.to_string(),
    })
}

/// Parse an IPv4 address and require it to be in 224.0.0.0/4.
pub fn parse_mcast_v4(addr: &str) -> Result<Ipv4Addr, AddrError> {
    let ip = parse_v4(addr)?;
    if !ip.is_multicast() {
        return Err(AddrError::NotMulticast(addr.to_string()));
    }
    Ok(ip)
}

/// Parse an IPv6 address and require it to be in ff00::/8.
pub fn parse_mcast_v6(addr: &str) -> Result<Ipv6Addr, AddrError> {
    let ip = parse_v6(addr)?;
    if !ip.is_multicast() {
        return Err(AddrError::NotMulticast(addr.to_string()));
    }
    Ok(ip)
}

/// Split `ADDR/LEN` into its address and (unparsed) length parts.
pub fn split_prefix(group: &str) -> (&str, Option<&str>) {
    match group.split_once('/') {
        Some((addr, len)) => (addr, Some(len)),
        None => (group, None),
    }
}

/// Parse an IPv4 prefix length, which must fall within 0-32.
pub fn parse_prefix_len_v4(len: &str) -> Result<u8, AddrError> {
    match len.parse::<u8>() {
        Ok(l) if l <= 32 => Ok(l),
        _ => Err(AddrError::PrefixLen(len.to_string())),
    }
}

/// Build the network covered by a group and prefix length.  A length of 0
/// means the route matches the single group address.
pub fn group_net_v4(group: Ipv4Addr, len: u8) -> Ipv4Net {
    let width = if len == 0 || len > 32 { 32 } else { len };
    Ipv4Net::new_unchecked(group, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family() {
        assert_eq!(family_of("239.1.1.1"), AddrFamily::Inet);
        assert_eq!(family_of("ff0e::1"), AddrFamily::Inet6);
        // The family is decided by the colon alone
        assert_eq!(family_of("bogus:"), AddrFamily::Inet6);
        assert_eq!(family_of("bogus"), AddrFamily::Inet);
    }

    #[test]
    fn test_mcast_v4() {
        assert_eq!(
            parse_mcast_v4("239.1.1.1").unwrap(),
            Ipv4Addr::new(239, 1, 1, 1)
        );
        assert_eq!(
            parse_mcast_v4("10.0.0.1"),
            Err(AddrError::NotMulticast("10.0.0.1".to_string()))
        );
        assert!(matches!(
            parse_mcast_v4("239.1.1"),
            Err(AddrError::Invalid { .. })
        ));
    }

    #[test]
    fn test_mcast_v6() {
        assert!(parse_mcast_v6("ff0e::1:2").is_ok());
        assert!(matches!(
            parse_mcast_v6("fe80::1"),
            Err(AddrError::NotMulticast(_))
        ));
        assert!(matches!(
            parse_mcast_v6("ff0e::g"),
            Err(AddrError::Invalid { .. })
        ));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(split_prefix("239.1.1.0/24"), ("239.1.1.0", Some("24")));
        assert_eq!(split_prefix("239.1.1.0"), ("239.1.1.0", None));
        assert_eq!(parse_prefix_len_v4("0"), Ok(0));
        assert_eq!(parse_prefix_len_v4("32"), Ok(32));
        assert!(parse_prefix_len_v4("33").is_err());
        assert!(parse_prefix_len_v4("-1").is_err());
        assert!(parse_prefix_len_v4("").is_err());
    }

    #[test]
    fn test_group_net() {
        let g = Ipv4Addr::new(239, 1, 1, 0);
        assert_eq!(group_net_v4(g, 24).width(), 24);
        assert_eq!(group_net_v4(g, 0).width(), 32);
        assert_eq!(group_net_v4(g, 0).addr(), g);
    }
}
