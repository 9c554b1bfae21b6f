use std::path::{Path, PathBuf};

use log::debug;

use super::filename::{validate_session_file, FileKind, SessionFileName};
use crate::error::{ReplayError, ReplayResult};

/// Position of a replay cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// No row read since construction or `reset()`.
    Fresh,
    MidStream,
    /// The last pass reached the end; the cursor is back at row zero.
    Exhausted,
}

/// One recorded CSV file of a session, held in memory and replayed row by
/// row.
#[derive(Debug, Clone)]
pub struct FileReplaySource {
    file: PathBuf,
    name: SessionFileName,
    data: Vec<Vec<f64>>,
    cursor: usize,
    state: ReplayState,
}

impl FileReplaySource {
    /// Validate `path`/`filename` against `stream_type` and load the file.
    ///
    /// Rows are comma-separated `f64` values without a header. A single row
    /// is repeated so that every source holds at least two rows.
    pub fn new(path: impl AsRef<Path>, filename: &str, stream_type: &str) -> ReplayResult<Self> {
        let (file, name) = validate_session_file(path.as_ref(), filename, stream_type, FileKind::Csv)?;
        let mut data = read_rows(&file)?;
        if data.is_empty() {
            return Err(ReplayError::EmptyData(file));
        }
        if data.len() == 1 {
            data.push(data[0].clone());
        }
        debug!(
            "Loaded {} rows x {} columns from {}",
            data.len(),
            data[0].len(),
            file.display()
        );
        Ok(Self {
            file,
            name,
            data,
            cursor: 0,
            state: ReplayState::Fresh,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn file_name(&self) -> &SessionFileName {
        &self.name
    }

    pub fn stream_type(&self) -> &str {
        &self.name.stream
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn columns(&self) -> usize {
        self.data.first().map_or(0, |row| row.len())
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewind to row zero.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.state = ReplayState::Fresh;
    }

    /// Next row, or `None` once at the end, at which point the cursor
    /// rewinds and the state becomes `Exhausted`.
    pub fn next_row(&mut self) -> Option<Vec<f64>> {
        match self.data.get(self.cursor) {
            Some(row) => {
                self.cursor += 1;
                self.state = ReplayState::MidStream;
                Some(row.clone())
            }
            None => {
                self.cursor = 0;
                self.state = ReplayState::Exhausted;
                None
            }
        }
    }

    /// Rows from the cursor to the end of the file. Iterating to exhaustion
    /// and calling `rows()` again yields the same rows from row zero.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows { source: self }
    }
}

/// Iterator returned by [`FileReplaySource::rows`].
pub struct Rows<'a> {
    source: &'a mut FileReplaySource,
}

impl Iterator for Rows<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next_row()
    }
}

fn read_rows(file: &Path) -> ReplayResult<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(file)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| field.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| ReplayError::MalformedData {
                path: file.to_path_buf(),
                message: format!("row {}: {}", line + 1, e),
            })?;
        rows.push(row);
    }
    Ok(rows)
}
