/*
 * sink.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Export sinks. The pipeline hands a complete ordered row sequence to a
//! `RowSink`; failures are terminal, never retried.
//!
//! The file sink writes a fresh CSV each run: rows go to a temp sibling,
//! then an atomic rename replaces the target. A permission failure at that
//! point almost always means a spreadsheet program holds the file open.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::error::SinkError;
use crate::project::ExportRow;

const HEADER: [&str; 5] = ["Subject", "Received (IST)", "Extracted Dates", "From", "Link"];

/// Destination for the ordered export rows.
pub trait RowSink {
    fn write_rows(&mut self, rows: &[ExportRow]) -> Result<(), SinkError>;
}

/// CSV file sink with atomic replace.
pub struct CsvFileSink {
    target: PathBuf,
}

impl CsvFileSink {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl RowSink for CsvFileSink {
    fn write_rows(&mut self, rows: &[ExportRow]) -> Result<(), SinkError> {
        let mut content = String::new();
        content.push_str(&csv_line(&HEADER.map(String::from)));
        for row in rows {
            content.push_str(&csv_line(&[
                row.subject.clone(),
                row.received_local.clone(),
                row.display_dates(),
                row.from.clone(),
                row.link.clone(),
            ]));
        }

        let tmp = self.target.with_extension("csv.tmp");
        let write_result = (|| -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(content.as_bytes())?;
            f.flush()?;
            Ok(())
        })();
        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp);
            return Err(map_io(e, &self.target));
        }
        if let Err(e) = fs::rename(&tmp, &self.target) {
            let _ = fs::remove_file(&tmp);
            return Err(map_io(e, &self.target));
        }
        tracing::info!(rows = rows.len(), target = %self.target.display(), "export written");
        Ok(())
    }
}

fn map_io(e: std::io::Error, target: &PathBuf) -> SinkError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        SinkError::Busy(target.clone())
    } else {
        SinkError::Io(e)
    }
}

/// One CSV record with RFC 4180 quoting.
fn csv_line(fields: &[String; 5]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&csv_field(field));
    }
    line.push_str("\r\n");
    line
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// In-memory sink for tests and embedding.
#[derive(Default)]
pub struct VecSink {
    pub rows: Vec<ExportRow>,
}

impl RowSink for VecSink {
    fn write_rows(&mut self, rows: &[ExportRow]) -> Result<(), SinkError> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str) -> ExportRow {
        ExportRow {
            subject: subject.to_string(),
            received_local: "2025-03-05 14:00".to_string(),
            dates: vec!["2025-03-15".to_string(), "2025-03-10".to_string()],
            from: "Acme Billing".to_string(),
            link: "https://example.com/x".to_string(),
        }
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("has,comma"), "\"has,comma\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_write_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let mut sink = CsvFileSink::new(&target);

        sink.write_rows(&[row("first run")]).unwrap();
        sink.write_rows(&[row("second, run")]).unwrap();

        let content = fs::read_to_string(&target).unwrap();
        assert!(content.starts_with("Subject,Received (IST),Extracted Dates,From,Link\r\n"));
        assert!(content.contains("\"second, run\""));
        assert!(!content.contains("first run"));
        assert!(content.contains("\"2025-03-15, 2025-03-10\""));
        // No stray temp file left behind.
        assert!(!dir.path().join("out.csv.tmp").exists());
    }
}
