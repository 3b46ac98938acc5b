// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! General types used throughout the daemon.

use std::convert;

pub type McrResult<T> = Result<T, McrError>;

#[derive(Debug, thiserror::Error)]
pub enum McrError {
    #[error("I/O error: {0:?}")]
    Io(std::io::Error),
    #[error("Resource already exists: {0}")]
    Exists(String),
    #[error("Resource is missing: {0}")]
    Missing(String),
    #[error("Invalid argument: {0}")]
    Invalid(String),
    #[error("Table {0} is full")]
    TableFull(String),
    #[error("Script failed: {0}")]
    Script(String),
    #[error("Error: {0}")]
    Other(String),
}

impl convert::From<std::io::Error> for McrError {
    fn from(err: std::io::Error) -> Self {
        McrError::Io(err)
    }
}

impl convert::From<String> for McrError {
    fn from(err: String) -> Self {
        McrError::Other(err)
    }
}

impl convert::From<&str> for McrError {
    fn from(err: &str) -> Self {
        McrError::Other(err.to_string())
    }
}

impl convert::From<anyhow::Error> for McrError {
    fn from(err: anyhow::Error) -> Self {
        McrError::Other(err.to_string())
    }
}
