//! Single-pass row router.
//!
//! Reads the header from the first line, then routes every following line
//! to the destination named after its routing key. One line is fully routed
//! before the next one is read.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;
use crate::streaming::destination::{DestinationPool, DestinationSummary, Resolution};
use crate::streaming::record::{self, Header, QUOTE};

/// Default routing field (1-indexed).
pub const DEFAULT_KEY_FIELD: usize = 4;

/// Default destination file suffix.
pub const DEFAULT_SUFFIX: &str = ".csv";

/// Default bound on simultaneously open destination files.
pub const DEFAULT_MAX_OPEN_FILES: usize = 256;

/// Configuration for a routing run.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Field delimiter, used to split records and to rejoin the header.
    pub delimiter: char,
    /// 1-indexed position of the routing field.
    pub key_field: usize,
    /// Appended to the routing key to form the destination file name.
    pub suffix: String,
    /// Directory where destination files are created.
    pub output_dir: PathBuf,
    /// Maximum destination files held open at once.
    pub max_open_files: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            key_field: DEFAULT_KEY_FIELD,
            suffix: DEFAULT_SUFFIX.to_string(),
            output_dir: PathBuf::from("."),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

impl RouterConfig {
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn key_field(mut self, key_field: usize) -> Self {
        self.key_field = key_field;
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }

    /// Checks that the configuration can route anything at all.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidConfig` for a zero key field, a zero handle
    /// bound, or a delimiter that is a line terminator or the quote character.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.key_field == 0 {
            return Err(AppError::InvalidConfig(
                "key field is 1-indexed and must be at least 1".to_string(),
            ));
        }
        if self.max_open_files == 0 {
            return Err(AppError::InvalidConfig(
                "max open files must be at least 1".to_string(),
            ));
        }
        if matches!(self.delimiter, '\n' | '\r' | QUOTE) {
            return Err(AppError::InvalidConfig(format!(
                "{:?} cannot be used as a delimiter",
                self.delimiter
            )));
        }
        Ok(())
    }
}

/// Result of routing one input stream.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    /// Header fields (empty when the input had no lines).
    pub header: Vec<String>,
    /// Records routed, header excluded.
    pub total_records: u64,
    /// Destinations in first-encounter order.
    pub destinations: Vec<DestinationSummary>,
}

impl RouteResult {
    fn empty() -> Self {
        Self {
            header: Vec::new(),
            total_records: 0,
            destinations: Vec::new(),
        }
    }
}

/// Routes a delimited file into per-key destination files.
///
/// Creates `config.output_dir` if needed, then runs the blocking routing loop
/// on a dedicated thread.
///
/// # Errors
///
/// Returns `AppError::InputRead` if the file cannot be opened or read, and
/// any error from `route_reader`.
pub async fn route_file(input: &Path, config: RouterConfig) -> Result<RouteResult, AppError> {
    config.validate()?;
    prepare_output_dir(&config).await?;

    let input = input.to_owned();

    tokio::task::spawn_blocking(move || {
        let file = File::open(&input).map_err(|e| {
            AppError::InputRead(format!("Failed to open {}: {}", input.display(), e))
        })?;
        route_reader(BufReader::new(file), &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
}

/// Routes standard input into per-key destination files.
pub async fn route_stdin(config: RouterConfig) -> Result<RouteResult, AppError> {
    config.validate()?;
    prepare_output_dir(&config).await?;

    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        route_reader(stdin.lock(), &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
}

async fn prepare_output_dir(config: &RouterConfig) -> Result<(), AppError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| AppError::OutputDir(format!("{}: {}", config.output_dir.display(), e)))
}

/// Blocking routing loop over any buffered reader.
///
/// Empty input and header-only input create no destination files. A failure
/// part-way through leaves already written destinations as they are.
///
/// # Errors
///
/// Returns `AppError::InvalidKey` when a routing key would place a file
/// outside `config.output_dir`.
pub fn route_reader<R: BufRead>(
    mut reader: R,
    config: &RouterConfig,
) -> Result<RouteResult, AppError> {
    config.validate()?;

    let mut buf = String::new();
    let mut line_no: u64 = 0;

    if !read_line(&mut reader, &mut buf, &mut line_no)? {
        tracing::debug!("Input is empty, nothing to route");
        return Ok(RouteResult::empty());
    }

    let header = Header::parse(record::trim_line_terminator(&buf), config.delimiter);
    let mut pool = DestinationPool::new(
        &config.output_dir,
        header.to_line(config.delimiter),
        config.max_open_files,
    );

    tracing::debug!(fields = header.fields().len(), "Captured header");

    let mut total_records: u64 = 0;

    while read_line(&mut reader, &mut buf, &mut line_no)? {
        let line = record::trim_line_terminator(&buf);
        let key = record::routing_key(line, config.delimiter, config.key_field);
        let name = record::destination_name(&key, &config.suffix);

        if pool.append(&key, &name, line)? == Resolution::FirstWrite {
            tracing::debug!(line = line_no, key = %key, "First record for destination");
        }
        total_records += 1;
    }

    let destinations = pool.finish()?;

    tracing::info!(
        total_records,
        destinations = destinations.len(),
        "Routing complete"
    );

    Ok(RouteResult {
        header: header.into_fields(),
        total_records,
        destinations,
    })
}

/// Reads the next line into `buf`. Returns `false` at end of input.
fn read_line<R: BufRead>(
    reader: &mut R,
    buf: &mut String,
    line_no: &mut u64,
) -> Result<bool, AppError> {
    buf.clear();
    *line_no += 1;
    match reader.read_line(buf) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::InvalidData => Err(AppError::NotUtf8 { line: *line_no }),
        Err(e) => Err(AppError::InputRead(e.to_string())),
    }
}
