// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use slog::Drain;

/// How log records are rendered.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, human-readable records
    Human,
    /// Bunyan-style JSON records
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid log format: {0} (expected 'human' or 'json')")]
pub struct LogFormatError(String);

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

fn build_drain<W>(
    name: &'static str,
    w: W,
    format: LogFormat,
) -> slog::Fuse<slog_async::Async>
where
    W: Write + Send + 'static,
{
    match format {
        LogFormat::Human => {
            let decorator = slog_term::PlainSyncDecorator::new(w);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            slog_async::Async::new(drain)
                .chan_size(0x2000)
                .build()
                .fuse()
        }
        LogFormat::Json => {
            let drain = slog_bunyan::with_name(name, w).build().fuse();
            slog_async::Async::new(drain)
                .chan_size(0x2000)
                .build()
                .fuse()
        }
    }
}

/// Build the root logger for a daemon.  If `log_file` is set, records are
/// appended to that file, otherwise they go to stdout.
pub fn init(
    name: &'static str,
    log_file: &Option<String>,
    format: LogFormat,
) -> anyhow::Result<slog::Logger> {
    let drain = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            build_drain(name, file, format)
        }
        None => build_drain(name, std::io::stdout(), format),
    };

    Ok(slog::Logger::root(drain, slog::o!("name" => name)))
}
