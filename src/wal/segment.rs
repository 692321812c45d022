//! Segment files and directory enumeration.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::util::filename::{parse_segment_file_name, segment_file_name, segment_file_path};
use crate::{Error, Result};

/// A reference to a segment file in the log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// File name within the log directory.
    pub name: String,
    /// Segment index parsed from the name.
    pub index: u64,
    /// File extension (without the dot).
    pub extension: String,
}

impl SegmentRef {
    /// Full path of the referenced file within `dir`.
    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

/// One append-only file of the log.
///
/// Segments are created for writing exactly once; a retired segment is
/// only ever reopened for reading.
#[derive(Debug)]
pub struct Segment {
    file: File,
    dir: PathBuf,
    index: u64,
    extension: String,
}

impl Segment {
    /// Create a segment file for appending.
    pub fn create(dir: &Path, index: u64, extension: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(true)
            .open(segment_file_path(dir, index, extension))?;

        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            index,
            extension: extension.to_string(),
        })
    }

    /// Open an existing segment file for reading.
    pub fn open_read(dir: &Path, index: u64, extension: &str) -> Result<Self> {
        let file = File::open(segment_file_path(dir, index, extension))?;

        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            index,
            extension: extension.to_string(),
        })
    }

    /// The segment's index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// A reference describing this segment.
    pub fn segment_ref(&self) -> SegmentRef {
        SegmentRef {
            name: segment_file_name(self.index, &self.extension),
            index: self.index,
            extension: self.extension.clone(),
        }
    }

    /// Append bytes; returns how many the OS accepted. Short writes are
    /// the caller's problem, mirroring a raw write(2).
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    /// Flush file contents to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Current file size in bytes.
    pub fn stat(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Release the file handle. Call [`Segment::sync`] first if the
    /// contents must be durable.
    pub fn close(self) -> io::Result<()> {
        drop(self.file);
        Ok(())
    }

    /// The directory this segment lives in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Read for Segment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// List every segment file in `dir`, in directory order.
///
/// Fails with [`Error::Enumeration`] if any entry does not parse as a
/// segment file name; the log directory must contain nothing else.
pub fn segments(dir: &Path) -> Result<Vec<SegmentRef>> {
    let mut refs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        match parse_segment_file_name(&name) {
            Some((index, extension)) => refs.push(SegmentRef {
                name: name.into_owned(),
                index,
                extension,
            }),
            None => {
                return Err(Error::enumeration(format!(
                    "unexpected file in log directory: {name:?}"
                )))
            }
        }
    }

    Ok(refs)
}

/// Find the segment with the highest index, or `None` for an empty
/// directory. Duplicate indices (same index, different extensions) are
/// rejected: a log owns exactly one extension.
pub fn last_segment(dir: &Path) -> Result<Option<SegmentRef>> {
    let mut last: Option<SegmentRef> = None;

    for candidate in segments(dir)? {
        match &last {
            Some(found) if found.index == candidate.index => {
                return Err(Error::enumeration(format!(
                    "duplicate segment index {} ({} and {})",
                    candidate.index, found.name, candidate.name
                )));
            }
            Some(found) if found.index > candidate.index => {}
            _ => last = Some(candidate),
        }
    }

    Ok(last)
}
