//! Assembled child environment.
//!
//! Holds the final `KEY=VALUE` entries handed to the child and renders
//! them in dotenv format for the env-file placeholder. Values are raw
//! bytes; nothing here assumes they are UTF-8.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::OsStr;

use crate::core::types::{SecretKey, SecretValue};

/// Final environment entries, written only by the orchestrating task.
///
/// Values are wiped from memory when the map is dropped.
#[derive(Default)]
pub struct Env {
    entries: BTreeMap<SecretKey, SecretValue>,
}

// Keys only; values never reach logs.
impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<SecretKey>, value: impl AsRef<[u8]>) {
        self.entries
            .insert(key.into(), SecretValue::new(value.as_ref().to_vec()));
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Entries as handed to the child process.
    pub fn vars(&self) -> impl Iterator<Item = (&str, Cow<'_, OsStr>)> {
        self.iter().map(|(k, v)| (k, os_value(v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to dotenv format.
    ///
    /// Lines are sorted so the output is reproducible; values containing
    /// whitespace, quotes or backslashes are double-quoted and escaped.
    pub fn to_dotenv(&self) -> SecretValue {
        let mut lines: Vec<SecretValue> = self
            .iter()
            .map(|(key, value)| {
                let mut line = SecretValue::new(Vec::with_capacity(key.len() + value.len() + 3));
                line.extend_from_slice(key.as_bytes());
                line.push(b'=');
                if needs_quotes(value) {
                    line.push(b'"');
                    escape_env_value(value, &mut line);
                    line.push(b'"');
                } else {
                    line.extend_from_slice(value);
                }
                line
            })
            .collect();
        lines.sort_by(|a, b| a.as_slice().cmp(b.as_slice()));

        let mut output = SecretValue::new(Vec::new());
        for line in &lines {
            output.extend_from_slice(line);
            output.push(b'\n');
        }
        output
    }
}

#[cfg(unix)]
fn os_value(value: &[u8]) -> Cow<'_, OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(OsStr::from_bytes(value))
}

#[cfg(not(unix))]
fn os_value(value: &[u8]) -> Cow<'_, OsStr> {
    Cow::Owned(String::from_utf8_lossy(value).into_owned().into())
}

fn needs_quotes(value: &[u8]) -> bool {
    value
        .iter()
        .any(|b| b.is_ascii_whitespace() || matches!(b, b'"' | b'\'' | b'\\'))
}

fn escape_env_value(value: &[u8], out: &mut Vec<u8>) {
    for &b in value {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
}
