//! Classpath resource resolution
//!
//! The checker never loads classes; it only needs the bytes of class files
//! and index resources. [`Classpath`] serves those from directories and jar
//! archives, [`MemoryResolver`] from an in-memory map for tests and embedded
//! use.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

use zip::result::ZipError;
use zip::ZipArchive;

/// Looks up resources by classpath-style slash-separated path
pub trait ClassResolver {
    /// Bytes of the first matching resource, or `None` when absent everywhere
    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Bytes of every matching resource, one per classpath entry that has it
    fn find_resources(&self, path: &str) -> io::Result<Vec<Vec<u8>>>;

    /// Bytes of a class definition by internal name
    fn class_bytes(&self, internal_name: &str) -> io::Result<Option<Vec<u8>>> {
        self.find_resource(&format!("{internal_name}.class"))
    }
}

enum Entry {
    Dir(PathBuf),
    // Archives are opened once; the central directory index makes per-lookup
    // reads cheap. RefCell because zip reads need &mut and the checker is
    // single-threaded by design.
    Jar(RefCell<ZipArchive<File>>),
}

impl Entry {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        match self {
            Entry::Dir(dir) => {
                let mut full = dir.clone();
                for part in path.split('/') {
                    full.push(part);
                }
                match fs::read(&full) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e),
                }
            }
            Entry::Jar(archive) => {
                let mut archive = archive.borrow_mut();
                let result = match archive.by_name(path) {
                    Ok(mut file) => {
                        let mut buffer = Vec::with_capacity(file.size() as usize);
                        file.read_to_end(&mut buffer)?;
                        Ok(Some(buffer))
                    }
                    Err(ZipError::FileNotFound) => Ok(None),
                    Err(e) => Err(zip_to_io(e)),
                };
                result
            }
        }
    }
}

fn zip_to_io(e: ZipError) -> io::Error {
    match e {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// A resolver over an ordered list of directories and jar files
pub struct Classpath {
    entries: Vec<Entry>,
}

impl Classpath {
    /// Build a classpath; non-directory entries are opened as jar archives
    pub fn new<I>(paths: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut entries = Vec::new();
        for path in paths {
            if path.is_dir() {
                entries.push(Entry::Dir(path));
            } else {
                let file = File::open(&path)?;
                let archive = ZipArchive::new(file).map_err(zip_to_io)?;
                entries.push(Entry::Jar(RefCell::new(archive)));
            }
        }
        Ok(Self { entries })
    }

    /// Number of classpath entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the classpath is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClassResolver for Classpath {
    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        for entry in &self.entries {
            if let Some(bytes) = entry.read(path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn find_resources(&self, path: &str) -> io::Result<Vec<Vec<u8>>> {
        let mut found = Vec::new();
        for entry in &self.entries {
            if let Some(bytes) = entry.read(path)? {
                found.push(bytes);
            }
        }
        Ok(found)
    }
}

/// A resolver backed by an in-memory map
#[derive(Debug, Default)]
pub struct MemoryResolver {
    resources: HashMap<String, Vec<Vec<u8>>>,
}

impl MemoryResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource occurrence; adding the same path twice models the same
    /// resource appearing in two classpath entries
    pub fn add(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.resources.entry(path.into()).or_default().push(bytes);
        self
    }

    /// Add a class definition by internal name
    pub fn add_class(&mut self, internal_name: &str, bytes: Vec<u8>) -> &mut Self {
        self.add(format!("{internal_name}.class"), bytes)
    }
}

impl ClassResolver for MemoryResolver {
    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .resources
            .get(path)
            .and_then(|occurrences| occurrences.first())
            .cloned())
    }

    fn find_resources(&self, path: &str) -> io::Result<Vec<Vec<u8>>> {
        Ok(self.resources.get(path).cloned().unwrap_or_default())
    }
}
