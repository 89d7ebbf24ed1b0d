//! Disk path notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use yandisk_core::DiskError;

/// A path on the remote disk, in the notation `[protocol:]/a/b/c`:
/// for example `disk:/backups/2026-08.tar`, `trash:/old.txt` or
/// `app:/data/config.json`.
///
/// Parsing normalizes repeated and trailing separators; rendering via
/// [`Display`](fmt::Display) always produces the canonical form the API
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiskPath {
    protocol: Option<String>,
    parts: Vec<String>,
}

impl DiskPath {
    /// Builds a path from raw components without any parsing. Can be
    /// used to create paths `parse` would reject.
    pub fn of<I, S>(protocol: Option<&str>, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protocol: protocol.map(str::to_owned),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses disk path notation.
    pub fn parse(notation: &str) -> Result<Self, DiskError> {
        if notation.is_empty() {
            return Ok(Self {
                protocol: None,
                parts: Vec::new(),
            });
        }
        let (protocol, rest) = split_protocol(notation)?;
        let parts = rest
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self { protocol, parts })
    }

    /// Joins `other` onto the end of this path.
    ///
    /// Fails when `other` carries a protocol different from this path's
    /// (protocol coercion).
    pub fn join(&self, other: &DiskPath) -> Result<DiskPath, DiskError> {
        if let Some(theirs) = &other.protocol {
            if self.protocol.as_deref() != Some(theirs.as_str()) {
                return Err(DiskError::InvalidPath(format!(
                    "cannot append \"{other}\" to \"{self}\" (protocol coercion)"
                )));
            }
        }
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Ok(DiskPath {
            protocol: self.protocol.clone(),
            parts,
        })
    }

    /// The protocol segment, if any (`disk` in `disk:/a/b`).
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// The path segments (`["a", "b"]` in `disk:/a/b`).
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The final segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }
}

fn split_protocol(notation: &str) -> Result<(Option<String>, &str), DiskError> {
    if notation.starts_with('/') {
        return Ok((None, notation));
    }
    for (index, c) in notation.char_indices() {
        match c {
            ':' => {
                if index == 0 {
                    return Err(DiskError::InvalidPath(format!(
                        "protocol section of \"{notation}\" is empty"
                    )));
                }
                if index == notation.len() - 1 {
                    return Err(DiskError::InvalidPath(format!(
                        "\"{notation}\" contains only a protocol"
                    )));
                }
                if notation.as_bytes()[index + 1] != b'/' {
                    return Err(DiskError::InvalidPath(format!(
                        "protocol symbol in \"{notation}\" must be followed by a slash"
                    )));
                }
                return Ok((Some(notation[..index].to_owned()), &notation[index + 1..]));
            }
            '/' => break,
            _ => {}
        }
    }
    Ok((None, notation))
}

impl fmt::Display for DiskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(protocol) = &self.protocol {
            write!(f, "{protocol}:")?;
        }
        if self.parts.is_empty() {
            return f.write_str("/");
        }
        for part in &self.parts {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}

impl FromStr for DiskPath {
    type Err = DiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DiskPath {
    type Error = DiskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DiskPath> for String {
    fn from(path: DiskPath) -> Self {
        path.to_string()
    }
}
