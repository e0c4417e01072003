//! Reader for the NWIS RDB format.
//!
//! RDB is tab-delimited text: any number of `#` comment lines, one header
//! row, one column-format row (`5s\t15s\t20d ...`), then the data rows.

use crate::error::{NwisError, Result};
use csv::{ReaderBuilder, StringRecord};

/// A parsed RDB table: the header row plus the data rows, format row removed.
#[derive(Debug, Clone, Default)]
pub struct RdbTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RdbTable {
    /// Parse an RDB response body.
    ///
    /// An empty body (or one holding only comments) is an empty table, which is
    /// what NWIS sends when a query matches nothing.
    pub fn parse(body: &str) -> Result<RdbTable> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());
        let headers = rdr.headers()?.clone();
        if headers.is_empty() || (headers.len() == 1 && headers[0].trim().is_empty()) {
            return Ok(RdbTable::default());
        }

        let mut records = rdr.records();
        match records.next() {
            Some(format_row) => {
                let format_row = format_row?;
                if !is_format_row(&format_row) {
                    return Err(NwisError::RdbParse(format!(
                        "expected a column format row after the header, got {:?}",
                        format_row.iter().collect::<Vec<_>>()
                    )));
                }
            }
            None => {
                return Ok(RdbTable {
                    headers,
                    rows: Vec::new(),
                })
            }
        }

        let rows = records.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RdbTable { headers, rows })
    }

    /// Index of a named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a named column, failing with a parse error when it is absent.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| NwisError::RdbParse(format!("missing column {name}")))
    }

    /// Index of the first column whose name satisfies the predicate.
    pub fn find_column<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&str) -> bool,
    {
        self.headers.iter().position(predicate)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Get a trimmed field, treating blank cells as missing.
pub fn field(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_format_row(record: &StringRecord) -> bool {
    record.iter().all(|cell| {
        let cell = cell.trim();
        let (width, kind) = cell.split_at(cell.len().saturating_sub(1));
        matches!(kind, "s" | "d" | "n") && width.chars().all(|c| c.is_ascii_digit())
    })
}
