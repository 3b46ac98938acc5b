// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::path::PathBuf;
use std::process::Command;

use slog::debug;
use slog::info;

use crate::conf::PostConfHook;
use crate::types::McrError;
use crate::types::McrResult;

/// An optional script, run with no arguments each time the configuration
/// file has been read in full.
pub struct Script {
    log: slog::Logger,
    path: Option<PathBuf>,
}

impl Script {
    pub fn new(log: &slog::Logger, path: Option<PathBuf>) -> Self {
        Script {
            log: log.new(slog::o!("unit" => "script")),
            path,
        }
    }
}

impl PostConfHook for Script {
    fn run(&self) -> McrResult<()> {
        let Some(path) = &self.path else {
            debug!(self.log, "no post-configuration script");
            return Ok(());
        };

        info!(self.log, "running {}", path.display());
        let status = Command::new(path).status().map_err(|e| {
            McrError::Script(format!("failed to start {}: {e}", path.display()))
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(McrError::Script(format!(
                "{} exited with {status}",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(path: Option<&str>) -> Script {
        let log = slog::Logger::root(slog::Discard, slog::o!());
        Script::new(&log, path.map(PathBuf::from))
    }

    #[test]
    fn test_no_script() {
        assert!(script(None).run().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status() {
        assert!(script(Some("true")).run().is_ok());
        assert!(matches!(
            script(Some("false")).run(),
            Err(McrError::Script(_))
        ));
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(
            script(Some("/nonexistent/mcroute-script")).run(),
            Err(McrError::Script(_))
        ));
    }
}
