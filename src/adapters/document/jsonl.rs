//! JSON-lines workbook format
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"sheet","id":0,"name":"users1","rows":2}
//! {"type":"row","sheet":0,"record":{"key":1,"fields":{"name":"ada"}}}
//! {"type":"row","sheet":0,"record":{"key":2,"fields":{"name":"bob"}}}
//! {"type":"end","sheets":1,"rows":2}
//! ```
//!
//! Sheets may appear in any id order. The `end` trailer is only written when
//! the document is finished; a reader treats its absence as truncation.

use super::{DocumentStats, SheetWriter};
use crate::domain::{Record, Result, SheetName, SheetPartition, TransferError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One line of a workbook document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkbookLine {
    /// Header opening a sheet; followed by exactly `rows` row lines
    Sheet {
        id: usize,
        name: SheetName,
        rows: usize,
    },
    /// One record belonging to sheet `sheet`
    Row { sheet: usize, record: Record },
    /// Trailer closing the document
    End { sheets: usize, rows: u64 },
}

/// Borrowing twin of [`WorkbookLine`] used on the encode path
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LineRef<'a> {
    Sheet {
        id: usize,
        name: &'a SheetName,
        rows: usize,
    },
    Row {
        sheet: usize,
        record: &'a Record,
    },
    End {
        sheets: usize,
        rows: u64,
    },
}

fn encode_line(buf: &mut Vec<u8>, line: &LineRef<'_>) -> Result<()> {
    serde_json::to_writer(&mut *buf, line)
        .map_err(|e| TransferError::Serialization(e.to_string()))?;
    buf.push(b'\n');
    Ok(())
}

/// Workbook encoder over any byte sink
pub struct JsonlWorkbookWriter<W: Write> {
    out: W,
    written: HashSet<usize>,
    rows: u64,
}

impl<W: Write> JsonlWorkbookWriter<W> {
    /// Wrap a byte sink
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: HashSet::new(),
            rows: 0,
        }
    }
}

impl JsonlWorkbookWriter<BufWriter<File>> {
    /// Create (or truncate) a workbook file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            TransferError::SinkWrite(format!("Failed to create {}: {}", path.display(), e))
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> SheetWriter for JsonlWorkbookWriter<W> {
    fn write_sheet(&mut self, sheet: &SheetPartition, rows: &[Record]) -> Result<()> {
        if self.written.contains(&sheet.id) {
            return Err(TransferError::SinkWrite(format!(
                "Sheet {} ({}) already written",
                sheet.id, sheet.name
            )));
        }

        // Encode the whole sheet before touching the sink
        let mut buf = Vec::new();
        encode_line(
            &mut buf,
            &LineRef::Sheet {
                id: sheet.id,
                name: &sheet.name,
                rows: rows.len(),
            },
        )?;
        for record in rows {
            encode_line(
                &mut buf,
                &LineRef::Row {
                    sheet: sheet.id,
                    record,
                },
            )?;
        }

        self.out.write_all(&buf).map_err(|e| {
            TransferError::SinkWrite(format!("Failed to write sheet {}: {}", sheet.name, e))
        })?;

        self.written.insert(sheet.id);
        self.rows += rows.len() as u64;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<DocumentStats> {
        let stats = DocumentStats {
            sheets: self.written.len(),
            rows: self.rows,
        };

        let mut buf = Vec::new();
        encode_line(
            &mut buf,
            &LineRef::End {
                sheets: stats.sheets,
                rows: stats.rows,
            },
        )?;
        self.out
            .write_all(&buf)
            .and_then(|_| self.out.flush())
            .map_err(|e| TransferError::SinkWrite(format!("Failed to finalize document: {e}")))?;

        Ok(stats)
    }
}

/// Open sheet while reading: id and rows still expected
struct OpenSheet {
    id: usize,
    remaining: usize,
}

/// Streaming workbook decoder
///
/// Yields every record in document order and validates the structure as it
/// goes. After the first error the iterator is exhausted.
pub struct JsonlWorkbookReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
    current: Option<OpenSheet>,
    seen: HashSet<usize>,
    rows: u64,
    ended: bool,
    done: bool,
}

impl<R: BufRead> JsonlWorkbookReader<R> {
    /// Wrap a buffered byte source
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            line_no: 0,
            current: None,
            seen: HashSet::new(),
            rows: 0,
            ended: false,
            done: false,
        }
    }

    /// Totals of everything read so far
    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            sheets: self.seen.len(),
            rows: self.rows,
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> TransferError {
        TransferError::Document(format!("line {}: {}", self.line_no, message))
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(open) = self.current.take() {
            if open.remaining > 0 {
                return Err(self.error(format!(
                    "sheet {} is missing {} declared rows",
                    open.id, open.remaining
                )));
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Record>> {
        loop {
            let Some(line) = self.lines.next() else {
                if !self.ended {
                    return Err(TransferError::Document(
                        "document is truncated: missing end trailer".to_string(),
                    ));
                }
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.map_err(|e| self.error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            if self.ended {
                return Err(self.error("unexpected content after end trailer"));
            }

            let parsed: WorkbookLine = serde_json::from_str(&line).map_err(|e| self.error(e))?;
            match parsed {
                WorkbookLine::Sheet { id, rows, .. } => {
                    self.close_current()?;
                    if !self.seen.insert(id) {
                        return Err(self.error(format!("sheet {id} appears twice")));
                    }
                    self.current = Some(OpenSheet {
                        id,
                        remaining: rows,
                    });
                }
                WorkbookLine::Row { sheet, record } => {
                    let accepted = match self.current.as_mut() {
                        Some(open) if open.id == sheet && open.remaining > 0 => {
                            open.remaining -= 1;
                            true
                        }
                        _ => false,
                    };
                    if !accepted {
                        return Err(self.error(format!("row for sheet {sheet} outside its sheet")));
                    }
                    self.rows += 1;
                    return Ok(Some(record));
                }
                WorkbookLine::End { sheets, rows } => {
                    self.close_current()?;
                    if sheets != self.seen.len() || rows != self.rows {
                        return Err(self.error(format!(
                            "trailer declares {} sheets / {} rows, body has {} / {}",
                            sheets,
                            rows,
                            self.seen.len(),
                            self.rows
                        )));
                    }
                    self.ended = true;
                }
            }
        }
    }
}

impl JsonlWorkbookReader<BufReader<File>> {
    /// Open a workbook file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            TransferError::Document(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for JsonlWorkbookReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
