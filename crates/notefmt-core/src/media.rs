//! Access to image-occlusion side files.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub trait MediaStore {
    fn read(&self, name: &str) -> Result<Vec<u8>>;
    fn write(&self, name: &str, contents: &str) -> Result<()>;
}

/// Media files must be bare names inside the store.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(Error::Media {
            name: name.to_string(),
            message: "not a bare file name".to_string(),
        });
    }
    Ok(())
}

/// A media directory on disk.
#[derive(Debug, Clone)]
pub struct MediaDir {
    root: PathBuf,
}

impl MediaDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl MediaStore for MediaDir {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name)?;
        std::fs::read(&path).map_err(|source| Error::Io { path, source })
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.path(name)?;
        std::fs::write(&path, contents).map_err(|source| Error::Io { path, source })
    }
}

/// No media directory configured; every access fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

impl MediaStore for NoMedia {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        Err(Error::Media {
            name: name.to_string(),
            message: "no media directory configured".to_string(),
        })
    }

    fn write(&self, name: &str, _contents: &str) -> Result<()> {
        self.read(name).map(|_| ())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryMedia {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    writes: RefCell<usize>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(name.to_string(), contents.into());
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }

    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl MediaStore for MemoryMedia {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        self.get(name).ok_or_else(|| Error::Media {
            name: name.to_string(),
            message: "no such file".to_string(),
        })
    }

    fn write(&self, name: &str, contents: &str) -> Result<()> {
        validate_name(name)?;
        *self.writes.borrow_mut() += 1;
        self.insert(name, contents);
        Ok(())
    }
}
