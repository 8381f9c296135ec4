//! File-backed endpoint

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flowpack_types::{Direction, Error, Result};
use tracing::debug;

/// A path-backed sequential endpoint
///
/// The file is opened lazily when the endpoint is opened: read sessions
/// open the existing file, write sessions create (or truncate) it.
/// Push-back is handled in memory and survives close/reopen, mirroring
/// the semantics of [`MemoryEndpoint`](crate::MemoryEndpoint).
#[derive(Debug)]
pub struct FileEndpoint {
    path: PathBuf,
    file: Option<File>,
    direction: Option<Direction>,
    pending: Vec<u8>,
}

impl FileEndpoint {
    /// Create an endpoint for the given path without opening it
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            direction: None,
            pending: Vec::new(),
        }
    }

    /// The path this endpoint reads from or writes to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl super::Endpoint for FileEndpoint {
    fn open(&mut self, direction: Direction) -> Result<()> {
        if self.direction.is_some() {
            return Err(Error::endpoint(format!(
                "file endpoint '{}' is already open",
                self.path.display()
            )));
        }

        let file = match direction {
            Direction::Read => File::open(&self.path),
            Direction::Write => File::create(&self.path),
        }
        .map_err(|e| {
            Error::endpoint(format!(
                "failed to open file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("Opened file endpoint '{}' for {:?}", self.path.display(), direction);
        self.file = Some(file);
        self.direction = Some(direction);
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
        self.direction = None;
    }

    fn is_open(&self) -> bool {
        self.direction.is_some()
    }

    fn open_direction(&self) -> Option<Direction> {
        self.direction
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.direction != Some(Direction::Read) {
            return Err(Error::endpoint(format!(
                "file endpoint '{}' is not open for reading",
                self.path.display()
            )));
        }

        let mut copied = 0;
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            copied = n;
        }
        if copied == buf.len() {
            return Ok(copied);
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::endpoint("file endpoint has no open file"))?;
        let n = file.read(&mut buf[copied..]).map_err(|e| {
            Error::endpoint(format!(
                "failed to read from file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(copied + n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.direction != Some(Direction::Write) {
            return Err(Error::endpoint(format!(
                "file endpoint '{}' is not open for writing",
                self.path.display()
            )));
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::endpoint("file endpoint has no open file"))?;
        file.write(buf).map_err(|e| {
            Error::endpoint(format!(
                "failed to write to file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn push_back(&mut self, bytes: &[u8]) {
        self.pending.splice(0..0, bytes.iter().copied());
    }
}
