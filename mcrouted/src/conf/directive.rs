// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Classification of a configuration line into a directive.
//!
//! The leading token picks the directive.  Every later token is checked
//! against the keyword table regardless of which directive was picked, so
//! keywords may appear in any order.  Keywords that make no sense for the
//! directive (e.g. `to` on a `phyint` line) are collected and then ignored.

use super::token::Tokens;
use super::ConfError;
use super::ConfSettings;
use super::LineLog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phyint<'a> {
    pub ifname: &'a str,
    pub enable: bool,
    pub threshold: u8,
}

/// A group join.  `mgroup` and `ssmgroup` lines both produce one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mgroup<'a> {
    pub ifname: &'a str,
    pub source: Option<&'a str>,
    pub group: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mroute<'a> {
    pub ifname: &'a str,
    pub source: Option<&'a str>,
    /// Group address, possibly followed by `/LEN`
    pub group: &'a str,
    pub outbound: Vec<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive<'a> {
    Phyint(Phyint<'a>),
    Mgroup(Mgroup<'a>),
    Mroute(Mroute<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Phyint,
    Mgroup,
    Mroute,
}

// Everything the keywords on a line may set.
struct Fields<'a> {
    ifname: Option<&'a str>,
    source: Option<&'a str>,
    group: Option<&'a str>,
    outbound: Vec<&'a str>,
    enable: bool,
    threshold: u8,
}

fn required<'a>(
    value: Option<&'a str>,
    directive: &'static str,
    field: &'static str,
) -> Result<&'a str, ConfError> {
    value.ok_or(ConfError::Missing { directive, field })
}

/// Parse one line.  Blank and comment-only lines yield `Ok(None)`.
pub(crate) fn parse<'a>(
    ll: &LineLog,
    settings: &ConfSettings,
    line: &'a str,
) -> Result<Option<Directive<'a>>, ConfError> {
    let mut tokens = Tokens::new(line);
    let mut fields = Fields {
        ifname: None,
        source: None,
        group: None,
        outbound: Vec::new(),
        enable: settings.default_enable,
        threshold: settings.default_threshold,
    };

    let Some(first) = tokens.pop() else {
        return Ok(None);
    };
    let command = match first {
        "mgroup" | "ssmgroup" => Command::Mgroup,
        "mroute" => Command::Mroute,
        "phyint" => {
            fields.ifname = Some(tokens.pop().ok_or(ConfError::Missing {
                directive: "phyint",
                field: "interface name",
            })?);
            Command::Phyint
        }
        _ => return Err(ConfError::UnknownCommand(first.to_string())),
    };

    while let Some(token) = tokens.pop() {
        match token {
            "from" => fields.ifname = tokens.pop(),
            "source" => fields.source = tokens.pop(),
            "group" => fields.group = tokens.pop(),
            "to" => {
                for dest in tokens.by_ref() {
                    if fields.outbound.len() == common::MAX_OUTBOUND {
                        return Err(ConfError::TooManyOutbound);
                    }
                    fields.outbound.push(dest);
                }
            }
            "enable" => fields.enable = true,
            "disable" => fields.enable = false,
            "ttl-threshold" => {
                let Some(value) = tokens.pop() else {
                    continue;
                };
                match value.parse::<i64>() {
                    Ok(n) if (1..=255).contains(&n) => {
                        fields.threshold = n as u8
                    }
                    Ok(n) => ll.warn(format!(
                        "TTL threshold {n} out of range 1-255, using {}.",
                        fields.threshold
                    )),
                    Err(_) => ll.debug(format!(
                        "ignoring unparseable TTL threshold {value}"
                    )),
                }
            }
            other => ll.debug(format!("ignoring unknown keyword {other}")),
        }
    }

    let directive = match command {
        Command::Phyint => Directive::Phyint(Phyint {
            ifname: required(fields.ifname, "phyint", "interface name")?,
            enable: fields.enable,
            threshold: fields.threshold,
        }),
        Command::Mgroup => Directive::Mgroup(Mgroup {
            ifname: required(fields.ifname, "mgroup", "from")?,
            source: fields.source,
            group: required(fields.group, "mgroup", "group")?,
        }),
        Command::Mroute => {
            if fields.outbound.is_empty() {
                return Err(ConfError::Missing {
                    directive: "mroute",
                    field: "to",
                });
            }
            Directive::Mroute(Mroute {
                ifname: required(fields.ifname, "mroute", "from")?,
                source: fields.source,
                group: required(fields.group, "mroute", "group")?,
                outbound: fields.outbound,
            })
        }
    };
    Ok(Some(directive))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn test_log() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn parse_line(line: &str) -> Result<Option<Directive>, ConfError> {
        parse_with(ConfSettings::default(), line)
    }

    fn parse_with(
        settings: ConfSettings,
        line: &str,
    ) -> Result<Option<Directive>, ConfError> {
        let log = test_log();
        let ll = LineLog::new(&log, 1);
        parse(&ll, &settings, line)
    }

    #[test]
    fn test_blank_and_comment() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   \t").unwrap(), None);
        assert_eq!(parse_line("# mroute from eth0").unwrap(), None);
    }

    #[test]
    fn test_phyint() {
        assert_eq!(
            parse_line("phyint eth0 enable").unwrap(),
            Some(Directive::Phyint(Phyint {
                ifname: "eth0",
                enable: true,
                threshold: common::DEFAULT_THRESHOLD,
            }))
        );
        assert_eq!(
            parse_line("phyint eth0 disable ttl-threshold 64").unwrap(),
            Some(Directive::Phyint(Phyint {
                ifname: "eth0",
                enable: false,
                threshold: 64,
            }))
        );
    }

    #[test]
    fn test_phyint_default_enable() {
        let settings = ConfSettings {
            default_enable: false,
            ..ConfSettings::default()
        };
        match parse_with(settings, "phyint eth0").unwrap() {
            Some(Directive::Phyint(p)) => assert!(!p.enable),
            d => panic!("unexpected directive: {d:?}"),
        }
        match parse_with(settings, "phyint eth0 enable").unwrap() {
            Some(Directive::Phyint(p)) => assert!(p.enable),
            d => panic!("unexpected directive: {d:?}"),
        }
    }

    #[test]
    fn test_phyint_missing_name() {
        assert!(matches!(
            parse_line("phyint"),
            Err(ConfError::Missing {
                directive: "phyint",
                ..
            })
        ));
        assert!(matches!(
            parse_line("phyint # eth0"),
            Err(ConfError::Missing { .. })
        ));
    }

    #[test]
    fn test_threshold_range() {
        for (text, expected) in [
            ("phyint eth0 ttl-threshold 1", 1),
            ("phyint eth0 ttl-threshold 255", 255),
            ("phyint eth0 ttl-threshold 0", common::DEFAULT_THRESHOLD),
            ("phyint eth0 ttl-threshold 256", common::DEFAULT_THRESHOLD),
            ("phyint eth0 ttl-threshold -3", common::DEFAULT_THRESHOLD),
            ("phyint eth0 ttl-threshold many", common::DEFAULT_THRESHOLD),
            ("phyint eth0 ttl-threshold", common::DEFAULT_THRESHOLD),
        ] {
            match parse_line(text).unwrap() {
                Some(Directive::Phyint(p)) => {
                    assert_eq!(p.threshold, expected, "{text}")
                }
                d => panic!("unexpected directive: {d:?}"),
            }
        }
    }

    #[test]
    fn test_mgroup_synonyms() {
        let expected = Some(Directive::Mgroup(Mgroup {
            ifname: "eth0",
            source: None,
            group: "239.1.1.1",
        }));
        assert_eq!(parse_line("mgroup from eth0 group 239.1.1.1").unwrap(), expected);
        assert_eq!(
            parse_line("ssmgroup from eth0 group 239.1.1.1").unwrap(),
            expected
        );
        assert_eq!(
            parse_line("mgroup group 239.1.1.1 from eth0 # comment").unwrap(),
            expected
        );
    }

    #[test]
    fn test_mgroup_source() {
        assert_eq!(
            parse_line("ssmgroup from eth0 source 10.0.0.1 group 232.1.1.1")
                .unwrap(),
            Some(Directive::Mgroup(Mgroup {
                ifname: "eth0",
                source: Some("10.0.0.1"),
                group: "232.1.1.1",
            }))
        );
    }

    #[test]
    fn test_mgroup_missing_fields() {
        assert!(matches!(
            parse_line("mgroup from eth0"),
            Err(ConfError::Missing { field: "group", .. })
        ));
        assert!(matches!(
            parse_line("mgroup group 239.1.1.1"),
            Err(ConfError::Missing { field: "from", .. })
        ));
        assert!(matches!(
            parse_line("mgroup from eth0 group"),
            Err(ConfError::Missing { field: "group", .. })
        ));
    }

    #[test]
    fn test_mroute() {
        assert_eq!(
            parse_line("mroute from eth0 group 239.1.1.0/24 to eth1 eth2")
                .unwrap(),
            Some(Directive::Mroute(Mroute {
                ifname: "eth0",
                source: None,
                group: "239.1.1.0/24",
                outbound: vec!["eth1", "eth2"],
            }))
        );
    }

    #[test]
    fn test_mroute_outbound_stops_at_comment() {
        match parse_line("mroute from eth0 group 239.1.1.1 to eth1 # eth2")
            .unwrap()
        {
            Some(Directive::Mroute(m)) => assert_eq!(m.outbound, vec!["eth1"]),
            d => panic!("unexpected directive: {d:?}"),
        }
    }

    #[test]
    fn test_mroute_without_outbound() {
        assert!(matches!(
            parse_line("mroute from eth0 group 239.1.1.1"),
            Err(ConfError::Missing { field: "to", .. })
        ));
        assert!(matches!(
            parse_line("mroute from eth0 group 239.1.1.1 to"),
            Err(ConfError::Missing { field: "to", .. })
        ));
    }

    #[test]
    fn test_mroute_capacity() {
        let names: Vec<String> =
            (0..common::MAX_OUTBOUND).map(|i| format!("eth{i}")).collect();
        let line = format!("mroute from lo group 239.1.1.1 to {}", names.join(" "));
        match parse_line(&line).unwrap() {
            Some(Directive::Mroute(m)) => {
                assert_eq!(m.outbound.len(), common::MAX_OUTBOUND)
            }
            d => panic!("unexpected directive: {d:?}"),
        }

        let line = format!("{line} one-too-many");
        assert!(matches!(
            parse_line(&line),
            Err(ConfError::TooManyOutbound)
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            parse_line("mgroupx from eth0 group 239.1.1.1"),
            Err(ConfError::UnknownCommand(c)) if c == "mgroupx"
        ));
        assert!(matches!(
            parse_line("from eth0 mgroup group 239.1.1.1"),
            Err(ConfError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_later_keyword_wins() {
        match parse_line("mgroup from eth0 from eth1 group 239.1.1.1").unwrap()
        {
            Some(Directive::Mgroup(m)) => assert_eq!(m.ifname, "eth1"),
            d => panic!("unexpected directive: {d:?}"),
        }
    }
}
