// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Registry of the interfaces known to the daemon.
//!
//! An interface takes part in multicast routing once it has been given a
//! forwarding slot: a VIF for IPv4 and, when IPv6 is available, a MIF for
//! IPv6.  Slots are a bounded resource, handed out lowest-first when an
//! interface is enabled and returned when it is disabled.  Each enabled
//! interface also carries the TTL threshold a packet must exceed to be
//! forwarded out of it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use slog::debug;
use slog::info;
use slog::warn;

use crate::conf::Interfaces;
use crate::types::McrError;
use crate::types::McrResult;
use common::network::AddrFamily;

/// What the configuration reader needs to know about an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfaceInfo {
    /// IPv4 forwarding slot, if the interface is enabled
    pub vif: Option<u16>,
    /// IPv6 forwarding slot, if the interface is enabled and IPv6 is available
    pub mif: Option<u16>,
    pub threshold: u8,
}

impl IfaceInfo {
    /// The forwarding slot for the given family.
    pub fn index(&self, family: AddrFamily) -> Option<u16> {
        match family {
            AddrFamily::Inet => self.vif,
            AddrFamily::Inet6 => self.mif,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Iface {
    pub name: String,
    /// The kernel's index for the interface
    pub ifindex: u32,
    pub vif: Option<u16>,
    pub mif: Option<u16>,
    pub threshold: u8,
}

impl Iface {
    fn info(&self) -> IfaceInfo {
        IfaceInfo {
            vif: self.vif,
            mif: self.mif,
            threshold: self.threshold,
        }
    }
}

// A fixed pool of forwarding slots.
struct Slots {
    name: &'static str,
    size: u16,
    used: BTreeSet<u16>,
}

impl Slots {
    fn new(name: &'static str, size: u16) -> Self {
        Slots {
            name,
            size,
            used: BTreeSet::new(),
        }
    }

    fn alloc(&mut self) -> McrResult<u16> {
        let Some(slot) = (0..self.size).find(|s| !self.used.contains(s)) else {
            return Err(McrError::TableFull(self.name.to_string()));
        };
        self.used.insert(slot);
        Ok(slot)
    }

    fn free(&mut self, slot: u16) {
        self.used.remove(&slot);
    }

    fn reset(&mut self) {
        self.used.clear();
    }
}

pub struct IfaceTable {
    log: slog::Logger,
    ipv6: bool,
    ifaces: BTreeMap<String, Iface>,
    vifs: Slots,
    mifs: Slots,
}

impl IfaceTable {
    pub fn new(log: &slog::Logger, ipv6: bool) -> Self {
        IfaceTable {
            log: log.new(slog::o!("unit" => "iface")),
            ipv6,
            ifaces: BTreeMap::new(),
            vifs: Slots::new("vif", common::MAX_VIFS),
            mifs: Slots::new("mif", common::MAX_MIFS),
        }
    }

    /// Add an interface to the registry.  It starts out disabled.  Adding an
    /// interface that is already present only refreshes its kernel index.
    pub fn insert(&mut self, name: impl ToString, ifindex: u32) {
        let name = name.to_string();
        self.ifaces
            .entry(name.clone())
            .and_modify(|i| i.ifindex = ifindex)
            .or_insert(Iface {
                name,
                ifindex,
                vif: None,
                mif: None,
                threshold: common::DEFAULT_THRESHOLD,
            });
    }

    /// Populate the registry with the interfaces present on the system,
    /// returning how many were found.
    pub fn probe(&mut self) -> McrResult<usize> {
        let found = system_interfaces()?;
        let count = found.len();
        for (name, ifindex) in found {
            debug!(self.log, "found interface {name}"; "ifindex" => ifindex);
            self.insert(name, ifindex);
        }
        Ok(count)
    }

    /// Disable every interface and return all forwarding slots.
    pub fn reset(&mut self) {
        for iface in self.ifaces.values_mut() {
            iface.vif = None;
            iface.mif = None;
            iface.threshold = common::DEFAULT_THRESHOLD;
        }
        self.vifs.reset();
        self.mifs.reset();
    }

    /// Enable every known interface with the default threshold, returning how
    /// many were enabled.  Interfaces left without a slot are logged and
    /// skipped.
    pub fn enable_all(&mut self) -> usize {
        let names: Vec<String> = self.ifaces.keys().cloned().collect();
        let mut count = 0;
        for name in names {
            match self.enable(&name, common::DEFAULT_THRESHOLD) {
                Ok(()) => count += 1,
                Err(e) => warn!(self.log, "unable to enable {name}: {e}"),
            }
        }
        count
    }

    /// Iterate over all interfaces holding at least one forwarding slot.
    pub fn enabled(&self) -> impl Iterator<Item = &Iface> {
        self.ifaces
            .values()
            .filter(|i| i.vif.is_some() || i.mif.is_some())
    }
}

impl Interfaces for IfaceTable {
    fn find(&self, name: &str) -> Option<IfaceInfo> {
        self.ifaces.get(name).map(Iface::info)
    }

    fn enable(&mut self, name: &str, threshold: u8) -> McrResult<()> {
        let iface = self
            .ifaces
            .get_mut(name)
            .ok_or_else(|| McrError::Missing(format!("interface {name}")))?;

        if iface.vif.is_none() {
            iface.vif = Some(self.vifs.alloc()?);
        }
        // Running out of MIFs doesn't stop the interface from routing IPv4.
        if self.ipv6 && iface.mif.is_none() {
            match self.mifs.alloc() {
                Ok(mif) => iface.mif = Some(mif),
                Err(e) => warn!(self.log, "no IPv6 slot for {name}: {e}"),
            }
        }
        iface.threshold = threshold;

        info!(self.log, "enabled {name}";
            "vif" => iface.vif,
            "mif" => iface.mif,
            "threshold" => threshold);
        Ok(())
    }

    fn disable(&mut self, name: &str) -> McrResult<()> {
        let iface = self
            .ifaces
            .get_mut(name)
            .ok_or_else(|| McrError::Missing(format!("interface {name}")))?;

        if let Some(vif) = iface.vif.take() {
            self.vifs.free(vif);
        }
        if let Some(mif) = iface.mif.take() {
            self.mifs.free(mif);
        }
        iface.threshold = common::DEFAULT_THRESHOLD;

        info!(self.log, "disabled {name}");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn system_interfaces() -> McrResult<Vec<(String, u32)>> {
    use std::ffi::CStr;

    // SAFETY: if_nameindex() returns an array terminated by an entry with a
    // zero index and null name, which we walk and then hand back to
    // if_freenameindex().
    let head = unsafe { libc::if_nameindex() };
    if head.is_null() {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut rval = Vec::new();
    unsafe {
        let mut cur = head;
        while (*cur).if_index != 0 && !(*cur).if_name.is_null() {
            let name = CStr::from_ptr((*cur).if_name)
                .to_string_lossy()
                .into_owned();
            rval.push((name, (*cur).if_index));
            cur = cur.add(1);
        }
        libc::if_freenameindex(head);
    }
    Ok(rval)
}

#[cfg(not(target_os = "linux"))]
fn system_interfaces() -> McrResult<Vec<(String, u32)>> {
    Err(McrError::Other(
        "interface discovery is not supported on this platform".to_string(),
    ))
}
