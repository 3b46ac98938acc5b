// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Reader for the static configuration file.
//!
//! The file is line oriented.  Each line is split into tokens, classified into
//! one of three directives, validated against the interface registry, and
//! finally handed to the route table, the group membership table, or the
//! interface registry itself:
//!
//! ```text
//!    phyint IFNAME <enable|disable> [ttl-threshold N]
//!    mgroup   from IFNAME [source ADDR] group ADDR
//!    ssmgroup from IFNAME [source ADDR] group ADDR
//!    mroute   from IFNAME [source ADDR] group ADDR[/LEN] to IFNAME [IFNAME ...]
//! ```
//!
//! A line that fails validation is logged and dropped.  It never stops the
//! scan: only an I/O error while reading the file does that.

use std::fmt;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use slog::debug;
use slog::info;
use slog::warn;

use crate::iface::IfaceInfo;
use crate::mcgroup::McGroup;
use crate::mroute::Mroute4;
use crate::mroute::Mroute6;
use crate::types::McrError;
use crate::types::McrResult;
use common::network::AddrFamily;

pub mod directive;
pub mod resolve;
pub mod token;

use self::resolve::Operation;

/// Process-wide inputs to a configuration pass.  These are fixed before the
/// scan begins and never change during it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfSettings {
    /// Whether a `phyint` line without `enable` or `disable` enables the
    /// interface.
    pub default_enable: bool,
    /// TTL threshold used when a `phyint` line doesn't set one.
    pub default_threshold: u8,
    /// Whether IPv6 multicast is available.  Without it, IPv6 lines are
    /// accepted and ignored.
    pub ipv6: bool,
}

impl Default for ConfSettings {
    fn default() -> Self {
        ConfSettings {
            default_enable: true,
            default_threshold: common::DEFAULT_THRESHOLD,
            ipv6: true,
        }
    }
}

/// Reasons a single configuration line is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    #[error("Unknown command {0}, skipping.")]
    UnknownCommand(String),
    #[error("Missing {field} in {directive} directive.")]
    Missing {
        directive: &'static str,
        field: &'static str,
    },
    #[error("Too many outbound interfaces, at most {} allowed.", common::MAX_OUTBOUND)]
    TooManyOutbound,
    #[error("Line too long, at most {} characters allowed.", common::MAX_LINE_LEN)]
    LineTooLong,
    #[error("Line is not valid UTF-8.")]
    NotUtf8,
    #[error("Invalid {family} multicast group: {group}")]
    InvalidGroup { family: AddrFamily, group: String },
    #[error("Invalid {family} multicast source: {addr}")]
    InvalidSource { family: AddrFamily, addr: String },
    #[error("Invalid source {0} address: NONE")]
    MissingSource(AddrFamily),
    #[error("GROUP/LEN not yet supported for source specific multicast.")]
    PrefixWithSource,
    #[error("Invalid prefix length, {0}")]
    InvalidPrefix(String),
    #[error("Invalid inbound {family} interface: {ifname}")]
    InvalidInbound { family: AddrFamily, ifname: String },
    #[error("No valid outbound {0} interfaces, skipping multicast route.")]
    NoOutbound(AddrFamily),
    #[error("{0}")]
    Collaborator(#[from] McrError),
}

/// Diagnostics for a single line, prefixed with its line number.
pub(crate) struct LineLog<'a> {
    log: &'a slog::Logger,
    lineno: usize,
}

impl<'a> LineLog<'a> {
    pub fn new(log: &'a slog::Logger, lineno: usize) -> Self {
        LineLog { log, lineno }
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        warn!(self.log, "{:02}: {}", self.lineno, msg; "line" => self.lineno);
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        debug!(self.log, "{:02}: {}", self.lineno, msg; "line" => self.lineno);
    }
}

/// Name-based lookup and activation of multicast-capable interfaces.
#[cfg_attr(test, mockall::automock)]
pub trait Interfaces {
    /// Look up an interface.  A missing forwarding index in the result means
    /// the interface can't carry multicast for that family.
    fn find(&self, name: &str) -> Option<IfaceInfo>;
    fn enable(&mut self, name: &str, threshold: u8) -> McrResult<()>;
    fn disable(&mut self, name: &str) -> McrResult<()>;
}

/// The multicast forwarding table.
#[cfg_attr(test, mockall::automock)]
pub trait Routes {
    fn add4(&mut self, route: &Mroute4) -> McrResult<()>;
    fn add6(&mut self, route: &Mroute6) -> McrResult<()>;
}

/// Multicast group membership.
#[cfg_attr(test, mockall::automock)]
pub trait Groups {
    fn join(&mut self, group: &McGroup) -> McrResult<()>;
}

/// Runs once after every line of the file has been processed.
#[cfg_attr(test, mockall::automock)]
pub trait PostConfHook {
    fn run(&self) -> McrResult<()>;
}

/// Tallies for one pass over the configuration file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Lines read, including comments and blank lines
    pub lines: usize,
    /// Lines whose operation was carried out
    pub applied: usize,
    /// Lines dropped because they didn't parse or validate
    pub rejected: usize,
    /// Lines that validated, but whose operation failed
    pub failed: usize,
}

/// How a configuration pass ended, short of an I/O failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfOutcome {
    /// The whole file was read
    Parsed(ParseSummary),
    /// There is no configuration file
    NotFound,
    /// The file exists but couldn't be opened
    Inaccessible,
}

/// One pass over a configuration file, applying each line as it is read.
pub struct Conf<'a> {
    log: slog::Logger,
    settings: ConfSettings,
    ifaces: &'a mut dyn Interfaces,
    routes: &'a mut dyn Routes,
    groups: &'a mut dyn Groups,
    hook: &'a dyn PostConfHook,
}

impl<'a> Conf<'a> {
    pub fn new(
        log: &slog::Logger,
        settings: ConfSettings,
        ifaces: &'a mut dyn Interfaces,
        routes: &'a mut dyn Routes,
        groups: &'a mut dyn Groups,
        hook: &'a dyn PostConfHook,
    ) -> Self {
        Conf {
            log: log.new(slog::o!("unit" => "conf")),
            settings,
            ifaces,
            routes,
            groups,
            hook,
        }
    }

    /// Read and apply the file at `path`, then run the post-configuration
    /// hook.  A missing or unopenable file is not an error: the daemon can
    /// carry on without static configuration.  An error is only returned if
    /// reading fails partway through, in which case the hook is not run.
    pub fn read(&mut self, path: &Path) -> McrResult<ConfOutcome> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    self.log,
                    "configuration file {} does not exist",
                    path.display()
                );
                info!(self.log, "continuing anyway, waiting for client to connect");
                return Ok(ConfOutcome::NotFound);
            }
            Err(e) => {
                warn!(
                    self.log,
                    "unexpected error when accessing {}: {e}",
                    path.display()
                );
                info!(self.log, "continuing anyway, waiting for client to connect");
                return Ok(ConfOutcome::Inaccessible);
            }
        };

        let summary = self.parse(BufReader::new(file))?;
        info!(self.log, "parsed {}", path.display();
            "lines" => summary.lines,
            "applied" => summary.applied,
            "rejected" => summary.rejected,
            "failed" => summary.failed);

        if let Err(e) = self.hook.run() {
            warn!(self.log, "post-configuration hook failed: {e}");
        }
        Ok(ConfOutcome::Parsed(summary))
    }

    /// Apply every line from `reader`.  Per-line failures are logged and
    /// counted, and never end the scan early.
    pub fn parse<R: BufRead>(&mut self, mut reader: R) -> McrResult<ParseSummary> {
        let mut summary = ParseSummary::default();
        let mut buf = Vec::with_capacity(LINE_LIMIT);

        while let Some(overlong) = read_line(&mut reader, &mut buf)? {
            summary.lines += 1;
            let lineno = summary.lines;

            let result = if overlong {
                Err(ConfError::LineTooLong)
            } else {
                self.line(lineno, &buf)
            };
            match result {
                Ok(true) => summary.applied += 1,
                Ok(false) => {}
                Err(e) => {
                    LineLog::new(&self.log, lineno).warn(&e);
                    match e {
                        ConfError::Collaborator(_) => summary.failed += 1,
                        _ => summary.rejected += 1,
                    }
                }
            }
        }

        Ok(summary)
    }

    // Returns true if the line produced an operation that was carried out,
    // and false if there was nothing to do.
    fn line(&mut self, lineno: usize, raw: &[u8]) -> Result<bool, ConfError> {
        let raw = trim_eol(raw);
        if raw.len() > common::MAX_LINE_LEN {
            return Err(ConfError::LineTooLong);
        }
        let text = std::str::from_utf8(raw).map_err(|_| ConfError::NotUtf8)?;

        let ll = LineLog::new(&self.log, lineno);
        let Some(directive) = directive::parse(&ll, &self.settings, text)?
        else {
            return Ok(false);
        };
        let Some(op) =
            resolve::resolve(&ll, &self.settings, &*self.ifaces, directive)?
        else {
            return Ok(false);
        };

        self.apply(op)?;
        Ok(true)
    }

    fn apply(&mut self, op: Operation) -> McrResult<()> {
        match op {
            Operation::Enable { ifname, threshold } => {
                self.ifaces.enable(&ifname, threshold)
            }
            Operation::Disable { ifname } => self.ifaces.disable(&ifname),
            Operation::Join(group) => self.groups.join(&group),
            Operation::Route4(route) => self.routes.add4(&route),
            Operation::Route6(route) => self.routes.add6(&route),
        }
    }
}

// Room for the longest accepted line plus a CRLF terminator.
const LINE_LIMIT: usize = common::MAX_LINE_LEN + 2;

// Read the next line into `buf`, holding no more than LINE_LIMIT bytes of it.
// Returns None at end of input.  Otherwise returns whether the line was too
// long, in which case the rest of it has been consumed and discarded.
fn read_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<bool>> {
    buf.clear();
    let n = reader
        .by_ref()
        .take(LINE_LIMIT as u64)
        .read_until(b'\n', buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n < LINE_LIMIT || buf.last() == Some(&b'\n') {
        return Ok(Some(false));
    }

    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            break;
        }
        let (used, done) = match chunk.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (chunk.len(), false),
        };
        reader.consume(used);
        if done {
            break;
        }
    }
    Ok(Some(true))
}

fn trim_eol(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}
