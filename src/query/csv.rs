//! Incremental decoder for Flux CSV responses
//!
//! InfluxDB answers `/api/v2/query` with CSV: one header row per table,
//! data rows under it, and a blank line between tables. Quoted cells can
//! contain commas and newlines (multi-line log messages), and a record can
//! be split across any number of body chunks.
//!
//! A query that fails after the response started arrives as a table with
//! an `error` column instead of an HTTP status.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Columns that are not tags
const SYSTEM_COLUMNS: [&str; 5] = ["", "result", "table", "_start", "_stop"];

/// One decoded data row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxRow {
    pub time: Option<DateTime<Utc>>,
    pub measurement: Option<String>,
    pub field: Option<String>,
    pub value: Option<String>,
    /// Remaining non-empty columns, in column order
    pub tags: Vec<(String, String)>,
}

impl FluxRow {
    fn from_cells(header: &[String], cells: Vec<String>) -> Result<Self> {
        if header.len() != cells.len() {
            return Err(Error::Decode(format!(
                "row has {} cells but the table header has {} columns",
                cells.len(),
                header.len()
            )));
        }

        let mut row = FluxRow::default();
        for (name, cell) in header.iter().zip(cells) {
            match name.as_str() {
                "_time" if !cell.is_empty() => {
                    let time = DateTime::parse_from_rfc3339(&cell).map_err(|e| {
                        Error::Decode(format!("invalid _time value '{}': {}", cell, e))
                    })?;
                    row.time = Some(time.with_timezone(&Utc));
                }
                "_time" => {}
                "_measurement" => row.measurement = Some(cell),
                "_field" => row.field = Some(cell),
                "_value" => row.value = Some(cell),
                name if SYSTEM_COLUMNS.contains(&name) => {}
                _ if cell.is_empty() => {}
                _ => row.tags.push((name.clone(), cell)),
            }
        }
        Ok(row)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Push bytes in, pull rows out
#[derive(Debug, Default)]
pub struct FluxCsvDecoder {
    buf: Vec<u8>,
    scan: usize,
    in_quotes: bool,
    header: Option<Vec<String>>,
    error_table: bool,
}

impl FluxCsvDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete row, or `None` when more input is needed
    pub fn next_row(&mut self) -> Result<Option<FluxRow>> {
        while let Some(line) = self.next_line() {
            if let Some(row) = self.handle_line(line)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Flush a trailing record that had no terminating newline
    pub fn finish(&mut self) -> Result<Option<FluxRow>> {
        if let Some(row) = self.next_row()? {
            return Ok(Some(row));
        }
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.in_quotes {
            return Err(Error::Decode(
                "response ended inside a quoted cell".to_string(),
            ));
        }
        let line = std::mem::take(&mut self.buf);
        self.scan = 0;
        self.handle_line(line)
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        while self.scan < self.buf.len() {
            match self.buf[self.scan] {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => {
                    let mut line: Vec<u8> = self.buf.drain(..=self.scan).collect();
                    self.scan = 0;
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Some(line);
                }
                _ => {}
            }
            self.scan += 1;
        }
        None
    }

    fn handle_line(&mut self, line: Vec<u8>) -> Result<Option<FluxRow>> {
        let text = String::from_utf8(line)
            .map_err(|e| Error::Decode(format!("response is not UTF-8: {}", e)))?;

        if text.trim().is_empty() {
            self.header = None;
            self.error_table = false;
            return Ok(None);
        }
        if text.starts_with('#') {
            return Ok(None);
        }

        let cells = split_cells(&text)?;
        let Some(header) = self.header.as_deref() else {
            self.error_table =
                cells.iter().any(|c| c == "error") && !cells.iter().any(|c| c == "_time");
            tracing::trace!(columns = cells.len(), "Decoded table header");
            self.header = Some(cells);
            return Ok(None);
        };

        if self.error_table {
            let message = header
                .iter()
                .position(|c| c == "error")
                .and_then(|i| cells.get(i))
                .cloned()
                .unwrap_or_default();
            return Err(Error::QueryFailed(message));
        }

        FluxRow::from_cells(header, cells).map(Some)
    }
}

fn split_cells(line: &str) -> Result<Vec<String>> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                cell.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) => in_quotes = true,
            (',', false) => cells.push(std::mem::take(&mut cell)),
            (c, _) => cell.push(c),
        }
    }

    if in_quotes {
        return Err(Error::Decode(format!("unterminated quoted cell in '{}'", line)));
    }
    cells.push(cell);
    Ok(cells)
}

/// Decode a response body into a stream of rows
///
/// Rows are produced as soon as their bytes arrive. A body error or a
/// decode error is yielded once and ends the stream. Dropping the stream
/// drops the body.
pub fn decode_rows<S, B, E>(body: S) -> BoxStream<'static, Result<FluxRow>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    struct State<S> {
        body: S,
        decoder: FluxCsvDecoder,
        done: bool,
    }

    let state = State {
        body,
        decoder: FluxCsvDecoder::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            match state.decoder.next_row() {
                Ok(Some(row)) => return Some((Ok(row), state)),
                Ok(None) => {}
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.done = true;
                    return match state.decoder.finish() {
                        Ok(Some(row)) => Some((Ok(row), state)),
                        Ok(None) => None,
                        Err(e) => Some((Err(e), state)),
                    };
                }
            }
        }
    })
    .boxed()
}
