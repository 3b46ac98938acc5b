// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

/// Any token starting with this character begins a comment, which runs to the
/// end of the line.
pub const COMMENT: char = '#';

/// A cursor over a single configuration line.  Tokens are borrowed slices of
/// the line, so they remain valid for as long as the line itself.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Self {
        Tokens { rest: line }
    }

    /// Return the next run of non-whitespace characters.  Once a comment
    /// token is seen the cursor is exhausted, wherever on the line it falls.
    pub fn pop(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        if s.is_empty() || s.starts_with(COMMENT) {
            self.rest = "";
            return None;
        }

        let end = s.find(char::is_whitespace).unwrap_or(s.len());
        let (token, rest) = s.split_at(end);
        self.rest = rest;
        Some(token)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}
