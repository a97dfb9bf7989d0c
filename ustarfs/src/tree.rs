use std::fs;
use std::path::Path;

use crate::error::{Result, UstarError};

use log::debug;

/// In-memory source tree handed to the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    File { name: String, data: Vec<u8> },
    Directory { name: String, children: Vec<Node> },
}

impl Node {
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Node::File {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn dir(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Directory {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File { name, .. } | Node::Directory { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    /// Reads a host directory into a tree. The top level directory is named
    /// `root_name` regardless of its name on the host.
    ///
    /// Symlinks are followed. Children are ordered by file name so the same
    /// directory always produces the same tree.
    ///
    /// # Errors
    ///
    /// Fails on the first entry that can't be read, that isn't a regular file or
    /// directory, or whose name is not UTF-8.
    pub fn from_path<P: AsRef<Path>>(path: P, root_name: &str) -> Result<Self> {
        let path = path.as_ref();
        if !fs::metadata(path)?.is_dir() {
            return Err(UstarError::UnrecognizedNodeKind {
                path: path.to_path_buf(),
            });
        }
        Ok(Node::dir(root_name, read_children(path)?))
    }
}

fn read_children(dir: &Path) -> Result<Vec<Node>> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut children = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| UstarError::InvalidName { path: path.clone() })?;

        // Follows symlinks, a link to a directory is loaded as that directory.
        let meta = fs::metadata(&path)?;
        if meta.is_file() {
            debug!("loading file {:?} ({} bytes)", path, meta.len());
            children.push(Node::file(name, fs::read(&path)?));
        } else if meta.is_dir() {
            children.push(Node::dir(name, read_children(&path)?));
        } else {
            return Err(UstarError::UnrecognizedNodeKind { path });
        }
    }
    Ok(children)
}
