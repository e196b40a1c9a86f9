//! Destination files and the pool of open handles.
//!
//! The pool owns the seen-set for one routing run. A destination is written
//! its header exactly once, on first resolution. Files are always opened in
//! append mode, so a handle closed to stay under the open-file limit can be
//! reopened later without touching what is already on disk.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

/// Outcome of resolving a destination against the seen-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Destination not seen before in this run: header, then record.
    FirstWrite,
    /// Destination already holds the header: record only.
    SubsequentWrite,
}

/// Per-destination totals reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationSummary {
    /// Routing key (quote-stripped key field).
    pub key: String,
    /// Path of the destination file.
    pub path: PathBuf,
    /// Records appended during this run (header excluded).
    pub records: u64,
}

/// Buffered append-mode handle to a destination file.
struct DestinationWriter {
    writer: BufWriter<File>,
}

impl DestinationWriter {
    fn open(path: &Path) -> Result<Self, AppError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::DestinationOpen {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, path: &Path, line: &str) -> Result<(), AppError> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| write_error(path, e))
    }

    fn flush(&mut self, path: &Path) -> Result<(), AppError> {
        self.writer.flush().map_err(|e| write_error(path, e))
    }
}

fn write_error(path: &Path, err: std::io::Error) -> AppError {
    AppError::DestinationWrite {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// True when `name` is exactly one normal path component: no separators,
/// no root, no `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Seen-set plus a bounded set of open destination handles.
pub struct DestinationPool {
    output_dir: PathBuf,
    header_line: String,
    max_open: usize,
    /// Destination name -> index into `summaries`.
    seen: HashMap<String, usize>,
    /// Summaries in first-encounter order.
    summaries: Vec<DestinationSummary>,
    open: HashMap<String, DestinationWriter>,
    /// Open destination names, oldest first.
    open_order: VecDeque<String>,
}

impl DestinationPool {
    /// Creates an empty pool. `max_open` must be at least 1.
    pub fn new(output_dir: impl Into<PathBuf>, header_line: String, max_open: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            header_line,
            max_open: max_open.max(1),
            seen: HashMap::new(),
            summaries: Vec::new(),
            open: HashMap::new(),
            open_order: VecDeque::new(),
        }
    }

    /// Decides whether the next write to `name` is the first one this run.
    pub fn resolve(&self, name: &str) -> Resolution {
        if self.seen.contains_key(name) {
            Resolution::SubsequentWrite
        } else {
            Resolution::FirstWrite
        }
    }

    /// Appends a record line to the destination `name`, writing the header
    /// first if this is the destination's first write.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidKey` when `name` is not a single plain file
    /// name, so that nothing is written outside the output directory.
    pub fn append(&mut self, key: &str, name: &str, line: &str) -> Result<Resolution, AppError> {
        if !is_plain_file_name(name) {
            return Err(AppError::InvalidKey {
                key: key.to_string(),
            });
        }

        let resolution = self.resolve(name);
        let path = self.output_dir.join(name);

        if !self.open.contains_key(name) {
            self.evict_if_full()?;
            let writer = DestinationWriter::open(&path)?;
            self.open.insert(name.to_string(), writer);
            self.open_order.push_back(name.to_string());
        }

        let writer = self
            .open
            .get_mut(name)
            .ok_or_else(|| AppError::Internal(format!("Destination {} not open", name)))?;

        let index = match resolution {
            Resolution::FirstWrite => {
                writer.write_line(&path, &self.header_line)?;
                tracing::debug!(key, path = %path.display(), "Opened new destination");

                let index = self.summaries.len();
                self.summaries.push(DestinationSummary {
                    key: key.to_string(),
                    path: path.clone(),
                    records: 0,
                });
                self.seen.insert(name.to_string(), index);
                index
            }
            Resolution::SubsequentWrite => self.seen[name],
        };

        writer.write_line(&path, line)?;
        self.summaries[index].records += 1;

        Ok(resolution)
    }

    /// Number of destinations seen so far.
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Number of currently open handles.
    pub fn open_handles(&self) -> usize {
        self.open.len()
    }

    /// Flushes every open handle and returns the per-destination summaries.
    pub fn finish(mut self) -> Result<Vec<DestinationSummary>, AppError> {
        for name in self.open_order.drain(..) {
            if let Some(mut writer) = self.open.remove(&name) {
                writer.flush(&self.output_dir.join(&name))?;
            }
        }
        Ok(self.summaries)
    }

    /// Closes the oldest open handle when the pool is at capacity.
    fn evict_if_full(&mut self) -> Result<(), AppError> {
        while self.open.len() >= self.max_open {
            let Some(oldest) = self.open_order.pop_front() else {
                break;
            };
            if let Some(mut writer) = self.open.remove(&oldest) {
                let path = self.output_dir.join(&oldest);
                writer.flush(&path)?;
                tracing::debug!(path = %path.display(), "Closed destination handle");
            }
        }
        Ok(())
    }
}
