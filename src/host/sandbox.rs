use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::guest::{DirectoryReader, Listing};
use crate::host::error::HostError;

/// A host directory exposed to the guest under `guest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preopen {
    pub guest: String,
    pub host: PathBuf,
    pub readable: bool,
}

impl Preopen {
    pub fn new(guest: impl Into<String>, host: impl Into<PathBuf>) -> Self {
        Self {
            guest: guest.into(),
            host: host.into(),
            readable: true,
        }
    }

    pub fn readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    fn guest_components(&self) -> Vec<&str> {
        split_guest(&self.guest)
    }
}

/// Guest filesystem view over a set of preopened host directories.
#[derive(Debug, Clone, Default)]
pub struct SandboxFs {
    preopens: Vec<Preopen>,
}

impl SandboxFs {
    pub fn new(preopens: Vec<Preopen>) -> Self {
        Self { preopens }
    }

    /// Maps a guest path to the host directory backing it.
    pub fn resolve(&self, path: &str) -> Result<(&Preopen, PathBuf), HostError> {
        let components = normalize(path)?;

        let (preopen, depth) = self
            .preopens
            .iter()
            .filter_map(|preopen| {
                let prefix = preopen.guest_components();
                components
                    .starts_with(&prefix)
                    .then_some((preopen, prefix.len()))
            })
            .max_by_key(|(_, depth)| *depth)
            .ok_or_else(|| HostError::Unmapped(path.to_string()))?;

        let host_path = components[depth..]
            .iter()
            .fold(preopen.host.clone(), |acc, part| acc.join(part));

        Ok((preopen, host_path))
    }

    /// Entry names directly under `path`, sorted by file name.
    pub fn list(&self, path: &str) -> Result<Vec<String>, HostError> {
        let (preopen, dir) = self.resolve(path)?;
        if !preopen.readable {
            return Err(HostError::NotReadable(preopen.guest.clone()));
        }

        let metadata = fs::metadata(&dir).map_err(|source| HostError::Io {
            path: dir.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(HostError::Io {
                path: dir,
                source: io::Error::other("not a directory"),
            });
        }

        list_children(&dir)
    }
}

impl DirectoryReader for SandboxFs {
    fn read_dir(&mut self, path: &str) -> Listing {
        match self.list(path) {
            Ok(names) => {
                tracing::debug!(path, entries = names.len(), "directory listed");
                Listing::sorted(names)
            }
            Err(err) => {
                tracing::debug!(path, "directory unavailable to guest: {err}");
                Listing::Absent
            }
        }
    }
}

fn list_children(dir: &Path) -> Result<Vec<String>, HostError> {
    let mut names = Vec::new();

    for entry in WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
    {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    Ok(names)
}

fn split_guest(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Guest paths are rooted at `/`; relative paths are taken from the root too.
fn normalize(path: &str) -> Result<Vec<&str>, HostError> {
    let mut components = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if components.pop().is_none() {
                    return Err(HostError::Escapes(path.to_string()));
                }
            }
            other => components.push(other),
        }
    }

    Ok(components)
}
