//! Remote filesystem entries.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::path::DiskPath;

/// A file or directory on the disk, as returned by listing calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// A regular file.
    File(FileNode),
    /// A directory.
    Dir(DirectoryNode),
}

/// Metadata of a regular file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileNode {
    pub path: DiskPath,
    pub name: String,
    pub created: DateTime<FixedOffset>,
    pub modified: DateTime<FixedOffset>,
    /// MD5 digest of the content, as reported by the backend.
    pub md5: String,
    pub mime_type: String,
    pub size: u64,
}

/// Metadata of a directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryNode {
    pub path: DiskPath,
    pub name: String,
    pub created: DateTime<FixedOffset>,
    pub modified: DateTime<FixedOffset>,
}

impl Node {
    /// Full path of the entry.
    pub fn path(&self) -> &DiskPath {
        match self {
            Node::File(file) => &file.path,
            Node::Dir(dir) => &dir.path,
        }
    }

    /// Base name of the entry.
    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Dir(dir) => &dir.name,
        }
    }

    /// Creation timestamp.
    pub fn created(&self) -> DateTime<FixedOffset> {
        match self {
            Node::File(file) => file.created,
            Node::Dir(dir) => dir.created,
        }
    }

    /// Last-modification timestamp.
    pub fn modified(&self) -> DateTime<FixedOffset> {
        match self {
            Node::File(file) => file.modified,
            Node::Dir(dir) => dir.modified,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }
}
