// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Validation of parsed directives, and their translation into the operations
//! carried out by the interface registry, route table, and group table.

use std::net::IpAddr;
use std::net::Ipv4Addr;

use common::network;
use common::network::AddrFamily;

use super::directive::Directive;
use super::directive::Mgroup;
use super::directive::Mroute;
use super::ConfError;
use super::ConfSettings;
use super::Interfaces;
use super::LineLog;
use crate::mcgroup::McGroup;
use crate::mroute::Mroute4;
use crate::mroute::Mroute6;
use crate::mroute::Outbound;

/// A fully validated directive, ready to be carried out.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Enable { ifname: String, threshold: u8 },
    Disable { ifname: String },
    Join(McGroup),
    Route4(Mroute4),
    Route6(Mroute6),
}

/// Validate a directive.  `Ok(None)` means the directive was accepted but
/// there is nothing to do for it, which is the case for IPv6 lines when IPv6
/// is unavailable.
pub(crate) fn resolve(
    ll: &LineLog,
    settings: &ConfSettings,
    ifaces: &dyn Interfaces,
    directive: Directive,
) -> Result<Option<Operation>, ConfError> {
    match directive {
        Directive::Phyint(p) if p.enable => Ok(Some(Operation::Enable {
            ifname: p.ifname.to_string(),
            threshold: p.threshold,
        })),
        Directive::Phyint(p) => Ok(Some(Operation::Disable {
            ifname: p.ifname.to_string(),
        })),
        Directive::Mgroup(m) => resolve_mgroup(ll, settings, m),
        Directive::Mroute(m) => match network::family_of(m.group) {
            AddrFamily::Inet => resolve_mroute4(ll, ifaces, m).map(Some),
            AddrFamily::Inet6 if !settings.ipv6 => {
                ll.warn("Ignored, IPv6 disabled.");
                Ok(None)
            }
            AddrFamily::Inet6 => resolve_mroute6(ll, ifaces, m).map(Some),
        },
    }
}

fn invalid_group(family: AddrFamily, group: &str) -> ConfError {
    ConfError::InvalidGroup {
        family,
        group: group.to_string(),
    }
}

fn invalid_source(family: AddrFamily, addr: &str) -> ConfError {
    ConfError::InvalidSource {
        family,
        addr: addr.to_string(),
    }
}

fn resolve_mgroup(
    ll: &LineLog,
    settings: &ConfSettings,
    m: Mgroup,
) -> Result<Option<Operation>, ConfError> {
    let family = network::family_of(m.group);
    let (source, group) = match family {
        AddrFamily::Inet6 => {
            if !settings.ipv6 {
                ll.warn("Ignored, IPv6 disabled.");
                return Ok(None);
            }
            if m.source.is_some() {
                ll.warn(
                    "IPv6 is not (yet) supported for Source Specific Multicast.",
                );
            }
            let group = network::parse_mcast_v6(m.group)
                .map_err(|_| invalid_group(family, m.group))?;
            (None, IpAddr::V6(group))
        }
        AddrFamily::Inet => {
            let source = m
                .source
                .map(|s| {
                    network::parse_v4(s).map_err(|_| invalid_source(family, s))
                })
                .transpose()?;
            let group = network::parse_mcast_v4(m.group)
                .map_err(|_| invalid_group(family, m.group))?;
            (source.map(IpAddr::V4), IpAddr::V4(group))
        }
    };

    Ok(Some(Operation::Join(McGroup {
        ifname: m.ifname.to_string(),
        source,
        group,
    })))
}

// Resolve each outbound interface to its forwarding index and threshold.
// Names that don't resolve are dropped with a warning; the route is only
// rejected if none of them resolve.
fn outbound_set(
    ll: &LineLog,
    ifaces: &dyn Interfaces,
    family: AddrFamily,
    inbound: (u16, &str),
    names: &[&str],
) -> Result<Vec<Outbound>, ConfError> {
    let mut set: Vec<Outbound> = Vec::with_capacity(names.len());

    for name in names {
        let Some((index, threshold)) = ifaces
            .find(name)
            .and_then(|i| i.index(family).map(|idx| (idx, i.threshold)))
        else {
            ll.warn(format!("Invalid outbound {family} interface: {name}"));
            continue;
        };

        if index == inbound.0 {
            ll.warn(format!(
                "Same outbound {family} interface ({name}) as inbound ({})?",
                inbound.1
            ));
        }

        if !set.iter().any(|o| o.index == index) {
            set.push(Outbound { index, threshold });
        }
    }

    if set.is_empty() {
        return Err(ConfError::NoOutbound(family));
    }
    Ok(set)
}

fn inbound_index(
    ifaces: &dyn Interfaces,
    family: AddrFamily,
    ifname: &str,
) -> Result<u16, ConfError> {
    ifaces
        .find(ifname)
        .and_then(|i| i.index(family))
        .ok_or_else(|| ConfError::InvalidInbound {
            family,
            ifname: ifname.to_string(),
        })
}

fn resolve_mroute4(
    ll: &LineLog,
    ifaces: &dyn Interfaces,
    m: Mroute,
) -> Result<Operation, ConfError> {
    let family = AddrFamily::Inet;
    let inbound = inbound_index(ifaces, family, m.ifname)?;

    let source = match m.source {
        None => Ipv4Addr::UNSPECIFIED,
        Some(s) => network::parse_v4(s).map_err(|_| invalid_source(family, s))?,
    };

    let (group, len) = match network::split_prefix(m.group) {
        (group, None) => (group, 0),
        (group, Some(len)) => {
            if !source.is_unspecified() {
                return Err(ConfError::PrefixWithSource);
            }
            let len = network::parse_prefix_len_v4(len)
                .map_err(|_| ConfError::InvalidPrefix(m.group.to_string()))?;
            (group, len)
        }
    };
    let group = network::parse_mcast_v4(group)
        .map_err(|_| invalid_group(family, group))?;

    let outbound =
        outbound_set(ll, ifaces, family, (inbound, m.ifname), &m.outbound)?;

    Ok(Operation::Route4(Mroute4 {
        inbound,
        source,
        group,
        len,
        outbound,
    }))
}

fn resolve_mroute6(
    ll: &LineLog,
    ifaces: &dyn Interfaces,
    m: Mroute,
) -> Result<Operation, ConfError> {
    let family = AddrFamily::Inet6;
    let inbound = inbound_index(ifaces, family, m.ifname)?;

    let source = match m.source {
        None => return Err(ConfError::MissingSource(family)),
        Some(s) => network::parse_v6(s).map_err(|_| invalid_source(family, s))?,
    };
    let group = network::parse_mcast_v6(m.group)
        .map_err(|_| invalid_group(family, m.group))?;

    let outbound =
        outbound_set(ll, ifaces, family, (inbound, m.ifname), &m.outbound)?;

    Ok(Operation::Route6(Mroute6 {
        inbound,
        source,
        group,
        outbound,
    }))
}
