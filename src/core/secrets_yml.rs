//! Secrets document parsing.
//!
//! A secrets document is a YAML mapping of environment variable names to
//! values. Values are literal unless tagged:
//!
//! ```yaml
//! DB_PASS: !var prod/db/password        # fetched from the provider
//! SSL_CERT: !var:file prod/web/cert     # fetched, then written to a file
//! MOTD: !file hello there               # literal content written to a file
//! REGION: !var:default='us-east-1' $env/region
//! ```
//!
//! `$name` is replaced from the caller's substitutions and `$$` is a
//! literal `$`. When an environment name is given, that top-level section
//! is merged over the `common` (or `default`) section.

use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use crate::core::constants::COMMON_SECTIONS;
use crate::core::types::{SecretKey, SecretPath, SecretValue};
use crate::error::SpecError;

/// How a declared secret is resolved and delivered.
///
/// Decided once while parsing; consumers never inspect tag text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Value is used as written.
    Literal,
    /// Value is used as written, delivered as a path to a file holding it.
    File,
    /// Value is a provider path; the provider's answer is delivered.
    Var,
    /// Value is a provider path; the answer is delivered as a file path.
    VarFile,
}

impl SecretKind {
    fn from_flags(var: bool, file: bool) -> Self {
        match (var, file) {
            (true, true) => Self::VarFile,
            (true, false) => Self::Var,
            (false, true) => Self::File,
            (false, false) => Self::Literal,
        }
    }

    /// Whether the provider must be asked for the value.
    pub fn is_var(self) -> bool {
        matches!(self, Self::Var | Self::VarFile)
    }

    /// Whether the value is spilled to a temp file.
    pub fn is_file(self) -> bool {
        matches!(self, Self::File | Self::VarFile)
    }

    #[cfg(test)]
    fn is_literal(self) -> bool {
        self == Self::Literal
    }
}

/// One declared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSpec {
    /// Provider path, or the literal value.
    pub path: SecretPath,
    pub kind: SecretKind,
    /// Used when the resolved value is empty.
    pub default_value: Option<String>,
}

impl SecretSpec {
    /// Untagged literal value.
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            path: value.into(),
            kind: SecretKind::Literal,
            default_value: None,
        }
    }

    /// Provider-backed value.
    pub fn var(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SecretKind::Var,
            default_value: None,
        }
    }

    pub fn with_kind(mut self, kind: SecretKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    pub fn is_var(&self) -> bool {
        self.kind.is_var()
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    #[cfg(test)]
    fn is_literal(&self) -> bool {
        self.kind.is_literal()
    }

    /// Apply the default when the resolved value is empty.
    pub fn value_or_default(&self, value: SecretValue) -> SecretValue {
        match &self.default_value {
            Some(default) if value.is_empty() && !default.is_empty() => {
                SecretValue::new(default.as_bytes().to_vec())
            }
            _ => value,
        }
    }
}

/// Declared secrets keyed by environment variable name.
pub type SecretsMap = BTreeMap<SecretKey, SecretSpec>;

/// Parse a secrets document held in memory.
///
/// # Errors
///
/// Returns `SpecError` for malformed YAML, unknown tags, a missing
/// environment section, or an undeclared substitution variable.
pub fn parse_str(
    content: &str,
    environment: Option<&str>,
    subs: &HashMap<String, String>,
) -> Result<SecretsMap, SpecError> {
    let doc: Value = serde_yaml::from_str(content)?;
    let mapping = match doc {
        Value::Mapping(mapping) => mapping,
        // An empty document declares no secrets.
        Value::Null => Mapping::new(),
        _ => return Err(SpecError::NotAMapping),
    };

    let section = select_section(mapping, environment)?;
    let mut secrets = SecretsMap::new();

    for (key, value) in section {
        let key = scalar_to_string(&key).ok_or(SpecError::NotAMapping)?;
        let mut spec = parse_value(&key, value)?;
        spec.path = substitute(&spec.path, subs)?;
        secrets.insert(key, spec);
    }

    debug!(secrets = secrets.len(), "parsed secrets document");
    Ok(secrets)
}

/// Parse a secrets document from disk.
///
/// # Errors
///
/// Returns `SpecError::ReadFile` if the file cannot be read, otherwise the
/// same errors as [`parse_str`].
pub fn parse_file(
    path: impl AsRef<Path>,
    environment: Option<&str>,
    subs: &HashMap<String, String>,
) -> Result<SecretsMap, SpecError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading secrets document");

    let content = std::fs::read_to_string(path).map_err(|source| SpecError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content, environment, subs)
}

fn select_section(mut doc: Mapping, environment: Option<&str>) -> Result<Mapping, SpecError> {
    let Some(env) = environment.filter(|e| !e.is_empty()) else {
        return Ok(doc);
    };

    let section = match doc.remove(env) {
        Some(Value::Mapping(section)) => section,
        Some(Value::Null) => Mapping::new(),
        _ => return Err(SpecError::NoSuchEnvironment(env.to_string())),
    };

    let mut merged = COMMON_SECTIONS
        .iter()
        .find_map(|name| match doc.remove(*name) {
            Some(Value::Mapping(common)) => Some(common),
            _ => None,
        })
        .unwrap_or_default();

    for (key, value) in section {
        merged.insert(key, value);
    }

    Ok(merged)
}

fn parse_value(key: &str, value: Value) -> Result<SecretSpec, SpecError> {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let (kind, default_value) = parse_tag(key, &tag)?;
            let path = scalar_to_string(&tagged.value)
                .ok_or_else(|| SpecError::InvalidValue(key.to_string()))?;
            Ok(SecretSpec {
                path,
                kind,
                default_value,
            })
        }
        other => scalar_to_string(&other)
            .map(SecretSpec::literal)
            .ok_or_else(|| SpecError::InvalidValue(key.to_string())),
    }
}

/// Parse a tag such as `!var:default='x':file`.
fn parse_tag(key: &str, tag: &str) -> Result<(SecretKind, Option<String>), SpecError> {
    let unknown = || SpecError::UnknownTag {
        key: key.to_string(),
        tag: tag.to_string(),
    };

    let mut rest = tag.trim_start_matches('!');
    let (mut var, mut file, mut recognised) = (false, false, false);
    let mut default_value = None;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("default=") {
            let (value, tail) = take_default(after).ok_or_else(unknown)?;
            default_value = Some(value.to_string());
            recognised = true;
            rest = tail;
            continue;
        }

        let (segment, tail) = rest.split_once(':').unwrap_or((rest, ""));
        match segment {
            "var" => var = true,
            "file" => file = true,
            "str" | "int" => {}
            "" => {}
            _ => return Err(unknown()),
        }
        recognised |= !segment.is_empty();
        rest = tail;
    }

    if !recognised {
        return Err(unknown());
    }

    Ok((SecretKind::from_flags(var, file), default_value))
}

/// Split a `default=` segment into its value and the remaining tag text.
fn take_default(after: &str) -> Option<(&str, &str)> {
    if let Some(quoted) = after.strip_prefix('\'') {
        let end = quoted.find('\'')?;
        let tail = &quoted[end + 1..];
        let tail = tail.strip_prefix(':').unwrap_or(tail);
        return Some((&quoted[..end], tail));
    }

    Some(after.split_once(':').unwrap_or((after, "")))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

/// Replace `$name` with its substitution and `$$` with `$`.
fn substitute(input: &str, subs: &HashMap<String, String>) -> Result<String, SpecError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }

        if let Some((_, '$')) = chars.peek() {
            chars.next();
            out.push('$');
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while let Some(&(j, c)) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                end = j + c.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        if end == start {
            // Lone `$` is kept as written.
            out.push('$');
            continue;
        }

        let name = &input[start..end];
        let value = subs
            .get(name)
            .ok_or_else(|| SpecError::UndeclaredVariable(name.to_string()))?;
        out.push_str(value);
    }

    Ok(out)
}
