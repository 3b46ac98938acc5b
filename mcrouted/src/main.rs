// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Main application entry point for `mcrouted`, the static multicast routing
//! daemon.
//!
//! At startup the daemon learns the system's interfaces, then reads its
//! configuration file to enable interfaces, join groups, and install routes.
//! A SIGHUP throws all of that state away and reads the file again.

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Context;
use libc::c_int;
use signal_hook::consts::SIGHUP;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGQUIT;
use signal_hook::consts::SIGTERM;
use signal_hook::iterator::Signals;
use slog::debug;
use slog::error;
use slog::info;
use slog::warn;
use structopt::StructOpt;

use crate::conf::Conf;
use crate::conf::ConfOutcome;
use crate::iface::IfaceTable;
use crate::mcgroup::McGroupTable;
use crate::mroute::MrouteTable;
use crate::script::Script;

mod conf;
mod config;
mod iface;
mod mcgroup;
mod mroute;
mod script;
mod types;

#[derive(Debug, Default, StructOpt)]
#[structopt(name = "mcrouted", about = "static multicast routing daemon")]
pub(crate) struct Opt {
    #[structopt(
        long,
        short = "f",
        help = "configuration file",
        parse(from_os_str)
    )]
    config_file: Option<PathBuf>,

    #[structopt(
        long,
        short = "e",
        help = "script to run after each (re)load of the configuration",
        parse(from_os_str)
    )]
    script: Option<PathBuf>,

    #[structopt(
        long,
        about = "send log data to the named file rather than stdout"
    )]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: Option<common::logging::LogFormat>,

    #[structopt(
        long,
        short = "N",
        help = "don't enable interfaces unless the configuration says to"
    )]
    no_vifs: bool,

    #[structopt(long, help = "ignore IPv6 groups and routes")]
    no_ipv6: bool,
}

/// The main context object for running `mcrouted`.
struct Global {
    log: slog::Logger,
    config: config::Config,
    ifaces: IfaceTable,
    routes: MrouteTable,
    groups: McGroupTable,
    script: Script,
}

impl Global {
    fn new(
        log: slog::Logger,
        config: config::Config,
        ifaces: IfaceTable,
    ) -> Self {
        Global {
            routes: MrouteTable::new(&log),
            groups: McGroupTable::new(&log),
            script: Script::new(&log, config.script.clone()),
            ifaces,
            config,
            log,
        }
    }

    // Unless told otherwise, every interface starts out enabled, leaving the
    // configuration file to disable the ones it doesn't want.
    fn default_vifs(&mut self) {
        if self.config.do_vifs {
            let count = self.ifaces.enable_all();
            info!(self.log, "enabled {count} interfaces by default");
        }
    }

    fn log_state(&self) {
        for i in self.ifaces.enabled() {
            debug!(self.log, "interface {}", i.name;
                "ifindex" => i.ifindex,
                "vif" => i.vif,
                "mif" => i.mif,
                "threshold" => i.threshold);
        }
        for r in self.routes.routes4() {
            debug!(self.log, "route {r}");
        }
        for r in self.routes.routes6() {
            debug!(self.log, "route {r}");
        }
        for g in self.groups.iter() {
            debug!(self.log, "group {g}");
        }
        if self.routes.is_empty() && self.groups.is_empty() {
            info!(self.log, "no routes or groups configured");
        }
    }

    // Read the configuration file and apply it to the current state.
    fn load(&mut self) {
        let settings = self.config.conf_settings();
        let path = self.config.conf_file.clone();
        let outcome = Conf::new(
            &self.log,
            settings,
            &mut self.ifaces,
            &mut self.routes,
            &mut self.groups,
            &self.script,
        )
        .read(&path);

        match outcome {
            Ok(ConfOutcome::Parsed(summary)) => {
                if summary.rejected + summary.failed > 0 {
                    warn!(
                        self.log,
                        "{} had errors: {} rejected, {} failed",
                        path.display(),
                        summary.rejected,
                        summary.failed
                    );
                }
            }
            Ok(ConfOutcome::NotFound) | Ok(ConfOutcome::Inaccessible) => {}
            Err(e) => {
                error!(self.log, "failed parsing {}: {e}", path.display())
            }
        }
        info!(self.log, "configuration loaded";
            "interfaces" => self.ifaces.enabled().count(),
            "routes" => self.routes.len(),
            "groups" => self.groups.len());
        self.log_state();
    }

    // Forget everything learned from the configuration file, and read it
    // again.
    fn reload(&mut self) {
        info!(self.log, "reloading {}", self.config.conf_file.display());
        self.routes.clear();
        self.groups.clear();
        self.ifaces.reset();
        self.default_vifs();
        self.load();
    }
}

// Each signal we receive is converted into a message we send to the main
// thread.
#[derive(Debug, PartialEq)]
enum Messages {
    Reload,
    Exit,
}

fn handle_signals(
    log: slog::Logger,
    mut signals: Signals,
    tx: mpsc::Sender<Messages>,
) {
    for signal in signals.forever() {
        let msg = match signal {
            SIGTERM | SIGQUIT | SIGINT => {
                info!(log, "received signal"; "sig" => signal);
                Messages::Exit
            }
            SIGHUP => {
                info!(log, "handling reload request");
                Messages::Reload
            }
            _ => continue,
        };
        let exit = msg == Messages::Exit;
        if tx.send(msg).is_err() || exit {
            return;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opts = Opt::from_args();
    let config = config::build_config(&opts)?;
    let log = common::logging::init(
        "mcrouted",
        &config.log_file,
        config.log_format,
    )?;

    let mut ifaces = IfaceTable::new(&log, config.ipv6);
    match ifaces.probe() {
        Ok(count) => info!(log, "found {count} interfaces"),
        Err(e) => error!(log, "failed to discover interfaces: {e}"),
    }

    let mut global = Global::new(log, config, ifaces);
    global.default_vifs();

    const SIGNALS: &[c_int] = &[SIGHUP, SIGTERM, SIGQUIT, SIGINT];
    let signals =
        Signals::new(SIGNALS).context("registering signal handlers")?;
    let signal_log = global.log.clone();
    let (tx, rx) = mpsc::channel();
    let _handler =
        std::thread::spawn(move || handle_signals(signal_log, signals, tx));

    global.load();

    loop {
        match rx.recv() {
            Ok(Messages::Reload) => global.reload(),
            Ok(Messages::Exit) => break,
            Err(_) => {
                info!(global.log, "signal handler shut down");
                break;
            }
        }
    }

    info!(global.log, "exiting");
    Ok(())
}
