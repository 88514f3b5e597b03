// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Attribute-value pairs, the textual argument unit of authorization and
//! accounting bodies.
//!
//! An AVP is `attr SEP value` where SEP is the first `=` (mandatory) or `*`
//! (optional) in the token. Argument lists additionally understand the
//! shell command shape (`service=shell`, `cmd=…`, repeated `cmd-arg=…`)
//! including splitting a piped command line into independently authorizable
//! segments.

use core::fmt;

use thiserror::Error;

pub const SEP_MANDATORY: char = '=';
pub const SEP_OPTIONAL: char = '*';

/// Literal trailing token some network operating systems append to the last
/// `cmd-arg` of a command line.
pub const CARRIAGE_RETURN: &str = "<cr>";

/// Default ceiling on pipe separators in a single command line.
pub const DEFAULT_MAX_SPLITS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvpError {
    #[error("argument {0:?} has no `=` or `*` separator")]
    NoSeparator(String),

    #[error("argument {0:?} has an empty name")]
    EmptyName(String),

    #[error("argument is not valid UTF-8")]
    BadText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    name: String,
    value: String,
    optional: bool,
}

impl Avp {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            optional: false,
        }
    }

    pub fn new_optional(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            optional: true,
        }
    }

    /// Splits a raw token at its first separator.
    pub fn parse(raw: &[u8]) -> Result<Self, AvpError> {
        let text = std::str::from_utf8(raw).map_err(|_| AvpError::BadText)?;

        let sep_idx = text
            .find([SEP_MANDATORY, SEP_OPTIONAL])
            .ok_or_else(|| AvpError::NoSeparator(text.to_string()))?;
        if sep_idx == 0 {
            return Err(AvpError::EmptyName(text.to_string()));
        }

        let optional = text.as_bytes()[sep_idx] == SEP_OPTIONAL as u8;
        Ok(Self {
            name: text[..sep_idx].to_string(),
            value: text[sep_idx + 1..].to_string(),
            optional,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn optional(&self) -> bool {
        self.optional
    }

    fn sep(&self) -> char {
        if self.optional {
            SEP_OPTIONAL
        } else {
            SEP_MANDATORY
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// A value wrapped in a matched `"…"` or `'…'` pair.
    fn is_quoted(&self) -> bool {
        let v = self.value.as_bytes();
        v.len() >= 2
            && ((v[0] == b'"' && v[v.len() - 1] == b'"')
                || (v[0] == b'\'' && v[v.len() - 1] == b'\''))
    }

    /// A value whose first byte is a backslash escape.
    fn is_escaped(&self) -> bool {
        self.value.starts_with('\\')
    }
}

impl fmt::Display for Avp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.sep(), self.value)
    }
}

/// An ordered argument list as carried by one authorization or accounting
/// request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<Avp>);

impl Args {
    pub fn new(avps: Vec<Avp>) -> Self {
        Self(avps)
    }

    pub fn from_wire<'a, I>(raw: I) -> Result<Self, AvpError>
    where I: IntoIterator<Item = &'a [u8]> {
        raw.into_iter()
            .map(Avp::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Avp> {
        self.0.iter()
    }

    pub fn push(&mut self, avp: Avp) {
        self.0.push(avp);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn first_value_of(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|avp| avp.name == name)
            .map(|avp| avp.value.as_str())
    }

    /// Value of the `service=…` AVP, if any.
    pub fn service(&self) -> Option<&str> {
        self.first_value_of("service")
    }

    /// Value of the `cmd=…` AVP, if any.
    pub fn command(&self) -> Option<&str> {
        self.first_value_of("cmd")
    }

    /// All `cmd-arg` values joined by a single space, with the literal
    /// trailing `<cr>` stripped.
    pub fn command_args_no_le(&self) -> String {
        let mut values: Vec<&str> = self
            .0
            .iter()
            .filter(|avp| avp.name == "cmd-arg")
            .map(|avp| avp.value.as_str())
            .collect();

        if let Some(last) = values.last().copied() {
            if last == CARRIAGE_RETURN {
                values.pop();
            } else if let Some(stripped) = last.strip_suffix(CARRIAGE_RETURN) {
                let idx = values.len() - 1;
                values[idx] = stripped;
            }
        }

        values.join(" ")
    }

    fn is_separator(avp: &Avp, delim: &str) -> bool {
        avp.name == "cmd-arg"
            && avp.value == delim
            && !avp.is_quoted()
            && !avp.is_escaped()
    }

    /// Splits a piped command line into one argument list per segment.
    ///
    /// The first segment keeps the original `service=`/`cmd=` header; each
    /// following segment synthesizes `service=shell` and `cmd=<delim>`, then
    /// carries the `cmd-arg` values up to the next separator. A trailing
    /// `cmd-arg=<cr>` on the input is replicated onto every segment. Quoted
    /// and backslash-escaped values never separate.
    ///
    /// More than `max_splits` separators yields an empty result, which
    /// callers translate to a deny.
    pub fn split(&self, delim: &str, max_splits: usize) -> Vec<Args> {
        let trailing_cr = matches!(
            self.0.last(),
            Some(last) if last.name == "cmd-arg" && last.value == CARRIAGE_RETURN
        );

        let body: &[Avp] = if trailing_cr {
            &self.0[..self.0.len() - 1]
        } else {
            &self.0
        };

        let separators = body
            .iter()
            .filter(|avp| Self::is_separator(avp, delim))
            .count();
        if separators > max_splits {
            return Vec::new();
        }

        let mut segments: Vec<Vec<Avp>> = vec![Vec::new()];
        for avp in body {
            if Self::is_separator(avp, delim) {
                segments.push(vec![
                    Avp::new("service", "shell"),
                    Avp::new("cmd", delim),
                ]);
            } else {
                segments
                    .last_mut()
                    .expect("segments starts non-empty")
                    .push(avp.clone());
            }
        }

        if trailing_cr {
            for segment in &mut segments {
                segment.push(Avp::new("cmd-arg", CARRIAGE_RETURN));
            }
        }

        segments.into_iter().map(Args).collect()
    }
}

impl FromIterator<Avp> for Args {
    fn from_iter<T: IntoIterator<Item = Avp>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
