// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The static multicast forwarding table.
//!
//! IPv4 routes are keyed by (source, group, prefix length), IPv6 routes by
//! (source, group).  Adding a route whose key is already present replaces
//! the existing entry.  The outbound set of a route is expressed as a list of
//! forwarding slots, each with the TTL threshold a packet must exceed to be
//! sent out of it.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use oxnet::Ipv4Net;
use slog::debug;
use slog::info;

use crate::conf::Routes;
use crate::types::McrError;
use crate::types::McrResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Outbound {
    /// VIF or MIF, depending on the route's family
    pub index: u16,
    pub threshold: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mroute4 {
    pub inbound: u16,
    /// 0.0.0.0 matches any source
    pub source: Ipv4Addr,
    pub group: Ipv4Addr,
    /// Prefix length of the group; 0 means the single group address
    pub len: u8,
    pub outbound: Vec<Outbound>,
}

impl Mroute4 {
    pub fn group_net(&self) -> Ipv4Net {
        common::network::group_net_v4(self.group, self.len)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mroute6 {
    pub inbound: u16,
    pub source: Ipv6Addr,
    pub group: Ipv6Addr,
    pub outbound: Vec<Outbound>,
}

struct OutboundList<'a>(&'a [Outbound]);

impl fmt::Display for OutboundList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let list: Vec<String> = self
            .0
            .iter()
            .map(|o| format!("{}:{}", o.index, o.threshold))
            .collect();
        write!(f, "[{}]", list.join(", "))
    }
}

impl fmt::Display for Mroute4 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}) vif {} -> {}",
            self.source,
            self.group_net(),
            self.inbound,
            OutboundList(&self.outbound)
        )
    }
}

impl fmt::Display for Mroute6 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}) mif {} -> {}",
            self.source,
            self.group,
            self.inbound,
            OutboundList(&self.outbound)
        )
    }
}

type Key4 = (Ipv4Addr, Ipv4Addr, u8);
type Key6 = (Ipv6Addr, Ipv6Addr);

pub struct MrouteTable {
    log: slog::Logger,
    v4: BTreeMap<Key4, Mroute4>,
    v6: BTreeMap<Key6, Mroute6>,
}

// Every slot named by a route must exist in the forwarding table.
fn check_slots(
    inbound: u16,
    outbound: &[Outbound],
    max: u16,
    what: &str,
) -> McrResult<()> {
    if inbound >= max {
        return Err(McrError::Invalid(format!("inbound {what} {inbound}")));
    }
    match outbound.iter().find(|o| o.index >= max) {
        Some(o) => Err(McrError::Invalid(format!("outbound {what} {}", o.index))),
        None => Ok(()),
    }
}

impl MrouteTable {
    pub fn new(log: &slog::Logger) -> Self {
        MrouteTable {
            log: log.new(slog::o!("unit" => "mroute")),
            v4: BTreeMap::new(),
            v6: BTreeMap::new(),
        }
    }

    pub fn routes4(&self) -> impl Iterator<Item = &Mroute4> {
        self.v4.values()
    }

    pub fn routes6(&self) -> impl Iterator<Item = &Mroute6> {
        self.v6.values()
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every route.
    pub fn clear(&mut self) {
        debug!(self.log, "flushing routes"; "count" => self.len());
        self.v4.clear();
        self.v6.clear();
    }
}

impl Routes for MrouteTable {
    fn add4(&mut self, route: &Mroute4) -> McrResult<()> {
        check_slots(route.inbound, &route.outbound, common::MAX_VIFS, "vif")?;

        let key = (route.source, route.group, route.len);
        match self.v4.insert(key, route.clone()) {
            Some(old) => info!(self.log, "replaced route {old} with {route}"),
            None => info!(self.log, "added route {route}"),
        }
        Ok(())
    }

    fn add6(&mut self, route: &Mroute6) -> McrResult<()> {
        check_slots(route.inbound, &route.outbound, common::MAX_MIFS, "mif")?;

        let key = (route.source, route.group);
        match self.v6.insert(key, route.clone()) {
            Some(old) => info!(self.log, "replaced route {old} with {route}"),
            None => info!(self.log, "added route {route}"),
        }
        Ok(())
    }
}
