// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Configuration for `mcrouted`.

use std::path::PathBuf;

use crate::conf::ConfSettings;
use crate::types::McrError;
use crate::types::McrResult;
use common::logging::LogFormat;

/// The Config structure captures all of the run-time settings that can be
/// controlled by command-line options.
#[derive(Debug)]
pub struct Config {
    /// The static multicast routing configuration file.
    pub conf_file: PathBuf,

    /// Script to run each time the configuration file has been read.
    pub script: Option<PathBuf>,

    /// If set, where the log should be written.  If not set, the log goes to
    /// stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: LogFormat,

    /// Whether `phyint` lines enable interfaces unless told otherwise.
    pub do_vifs: bool,

    /// Whether IPv6 multicast routing is available.
    pub ipv6: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            conf_file: PathBuf::from(common::DEFAULT_CONF_FILE),
            script: None,
            log_file: None,
            log_format: LogFormat::Human,
            do_vifs: true,
            ipv6: true,
        }
    }
}

impl Config {
    /// The inputs to each pass over the configuration file.
    pub fn conf_settings(&self) -> ConfSettings {
        ConfSettings {
            default_enable: self.do_vifs,
            default_threshold: common::DEFAULT_THRESHOLD,
            ipv6: self.ipv6,
        }
    }
}

// Use the command-line arguments to update the run-time config.
fn update_from_cli(opts: &crate::Opt, config: &mut Config) -> McrResult<()> {
    if let Some(conf_file) = &opts.config_file {
        config.conf_file = conf_file.clone();
    }

    if let Some(script) = &opts.script {
        if script.as_os_str().is_empty() {
            return Err(McrError::Invalid("empty script path".to_string()));
        }
        config.script = Some(script.clone());
    }

    if let Some(log_file) = &opts.log_file {
        config.log_file = Some(log_file.to_string());
    }

    if let Some(log_format) = opts.log_format {
        config.log_format = log_format;
    }

    config.do_vifs = !opts.no_vifs;
    config.ipv6 = !opts.no_ipv6;

    Ok(())
}

/// This builds a Config struct containing the tunable settings used to
/// adjust the daemon's behavior.
pub(crate) fn build_config(opts: &crate::Opt) -> McrResult<Config> {
    let mut config = Config::default();
    update_from_cli(opts, &mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opt;

    #[test]
    fn test_defaults() {
        let config = build_config(&Opt::default()).unwrap();
        assert_eq!(config.conf_file, PathBuf::from(common::DEFAULT_CONF_FILE));
        assert_eq!(config.script, None);
        assert!(config.do_vifs);
        assert!(config.ipv6);
        assert_eq!(config.conf_settings(), ConfSettings::default());
    }

    #[test]
    fn test_updates() {
        let opts = Opt {
            config_file: Some(PathBuf::from("/tmp/test.conf")),
            script: Some(PathBuf::from("/tmp/hook.sh")),
            log_file: Some("test.log".to_string()),
            log_format: Some(LogFormat::Json),
            no_vifs: true,
            no_ipv6: true,
        };
        let config = build_config(&opts).unwrap();
        assert_eq!(config.conf_file, PathBuf::from("/tmp/test.conf"));
        assert_eq!(config.script, Some(PathBuf::from("/tmp/hook.sh")));
        assert_eq!(config.log_file, Some("test.log".to_string()));
        assert_eq!(config.log_format, LogFormat::Json);

        let settings = config.conf_settings();
        assert!(!settings.default_enable);
        assert!(!settings.ipv6);
    }

    #[test]
    fn test_empty_script() {
        let opts = Opt {
            script: Some(PathBuf::new()),
            ..Opt::default()
        };
        assert!(matches!(build_config(&opts), Err(McrError::Invalid(_))));
    }
}
