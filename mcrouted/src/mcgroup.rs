// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Multicast group memberships requested by the static configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use slog::debug;
use slog::info;

use crate::conf::Groups;
use crate::types::McrError;
use crate::types::McrResult;
use common::network::AddrFamily;

/// A single group membership.  A source is only ever set for IPv4.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct McGroup {
    pub ifname: String,
    pub source: Option<IpAddr>,
    pub group: IpAddr,
}

impl McGroup {
    pub fn family(&self) -> AddrFamily {
        match self.group {
            IpAddr::V4(_) => AddrFamily::Inet,
            IpAddr::V6(_) => AddrFamily::Inet6,
        }
    }
}

impl fmt::Display for McGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.source {
            Some(source) => {
                write!(f, "({source}, {}) on {}", self.group, self.ifname)
            }
            None => write!(f, "{} on {}", self.group, self.ifname),
        }
    }
}

pub struct McGroupTable {
    log: slog::Logger,
    joined: BTreeSet<McGroup>,
}

impl McGroupTable {
    pub fn new(log: &slog::Logger) -> Self {
        McGroupTable {
            log: log.new(slog::o!("unit" => "mcgroup")),
            joined: BTreeSet::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &McGroup> {
        self.joined.iter()
    }

    pub fn len(&self) -> usize {
        self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    /// Leave every group.
    pub fn clear(&mut self) {
        debug!(self.log, "leaving all groups"; "count" => self.joined.len());
        self.joined.clear();
    }
}

impl Groups for McGroupTable {
    fn join(&mut self, group: &McGroup) -> McrResult<()> {
        if !self.joined.insert(group.clone()) {
            return Err(McrError::Exists(format!("{} group {group}", group.family())));
        }
        info!(self.log, "joined {} group {group}", group.family());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn new_table() -> McGroupTable {
        let log = slog::Logger::root(slog::Discard, slog::o!());
        McGroupTable::new(&log)
    }

    fn group(ifname: &str, source: Option<[u8; 4]>, group: [u8; 4]) -> McGroup {
        McGroup {
            ifname: ifname.to_string(),
            source: source.map(|s| IpAddr::V4(Ipv4Addr::from(s))),
            group: IpAddr::V4(Ipv4Addr::from(group)),
        }
    }

    #[test]
    fn test_join() -> anyhow::Result<()> {
        let mut t = new_table();
        t.join(&group("eth0", None, [239, 1, 1, 1]))?;
        t.join(&group("eth1", None, [239, 1, 1, 1]))?;
        t.join(&group("eth0", Some([10, 0, 0, 1]), [232, 1, 1, 1]))?;
        assert_eq!(t.len(), 3);
        Ok(())
    }

    #[test]
    fn test_duplicate_join() {
        let mut t = new_table();
        let g = group("eth0", None, [239, 1, 1, 1]);
        t.join(&g).unwrap();
        assert!(matches!(t.join(&g), Err(McrError::Exists(_))));
        assert_eq!(t.len(), 1);

        t.clear();
        assert!(t.is_empty());
        t.join(&g).unwrap();
    }

    #[test]
    fn test_display() {
        assert_eq!(
            group("eth0", Some([10, 0, 0, 1]), [232, 1, 1, 1]).to_string(),
            "(10.0.0.1, 232.1.1.1) on eth0"
        );
        assert_eq!(
            group("eth0", None, [239, 1, 1, 1]).to_string(),
            "239.1.1.1 on eth0"
        );
    }
}
