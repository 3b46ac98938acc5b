// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Types, constants, and helpers shared by the mcroute daemon and its tools.

pub mod logging;
pub mod network;

/// Where the daemon looks for its static configuration when none is given.
pub const DEFAULT_CONF_FILE: &str = "/etc/smcroute.conf";

/// TTL threshold given to an interface that doesn't set one explicitly.
pub const DEFAULT_THRESHOLD: u8 = 1;

/// Number of IPv4 multicast forwarding slots (VIFs) available.
pub const MAX_VIFS: u16 = 32;

/// Number of IPv6 multicast forwarding slots (MIFs) available.
pub const MAX_MIFS: u16 = 32;

/// Longest configuration line accepted, not counting the line terminator.
pub const MAX_LINE_LEN: usize = 512;

/// Largest number of outbound interfaces a single route line may name.
pub const MAX_OUTBOUND: usize = 32;
