//! Low-level reader for the CSV body of a measurement file.
//!
//! ```text
//! ---
//! free-form comments
//! ---
//! Time,AV,AI
//! 0.0,0.00,1e-9
//! ...
//! ```
//!
//! The comment block is optional; the header line follows it directly.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

/// Comment text reported when a file carries no comment block.
pub const NO_COMMENTS: &str = "No comments were added.";

/// Parsed tabular body of one measurement file.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub comments: String,
    pub column_names: Vec<String>,
    /// One sequence per entry of `column_names`, in the same order.
    pub columns: Vec<Vec<f64>>,
}

impl Table {
    /// Samples of the first column called `name`.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// A comment delimiter is `---`, ignoring spaces.
fn is_delimiter(line: &str) -> bool {
    line.chars().filter(|c| !c.is_whitespace()).eq("---".chars())
}

/// Parse the body of a measurement file.
pub fn load(text: &str) -> Result<Table> {
    let mut lines = text.lines().enumerate().peekable();

    let mut comments = NO_COMMENTS.to_string();
    if lines.peek().map_or(false, |(_, line)| is_delimiter(line)) {
        let (open_idx, _) = lines.next().unwrap_or((0, ""));
        let mut block = Vec::new();
        let mut closed = false;
        for (_, line) in lines.by_ref() {
            if is_delimiter(line) {
                closed = true;
                break;
            }
            block.push(line);
        }
        if !closed {
            return Err(Error::malformed_table(open_idx + 1, "comment block is never closed"));
        }
        comments = block.join("\n");
    }

    let (header_idx, header) = lines
        .next()
        .ok_or_else(|| Error::malformed_table(text.lines().count() + 1, "missing header line"))?;
    let column_names: Vec<String> = header.split(',').map(|name| name.trim().to_string()).collect();
    if column_names.iter().all(|name| name.is_empty()) {
        return Err(Error::malformed_table(header_idx + 1, "header line is empty"));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); column_names.len()];
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != column_names.len() {
            return Err(Error::malformed_table(
                idx + 1,
                format!("expected {} fields, found {}", column_names.len(), fields.len()),
            ));
        }
        for (column, field) in columns.iter_mut().zip(&fields) {
            let value = field.trim().parse::<f64>().map_err(|_| {
                Error::malformed_table(idx + 1, format!("`{}` is not a number", field.trim()))
            })?;
            column.push(value);
        }
    }

    Ok(Table {
        comments,
        column_names,
        columns,
    })
}

/// Read and parse a measurement file (supports .csv and .csv.gz).
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;

    // Detect gzip by extension
    let is_gz = path.to_str().map_or(false, |s| s.ends_with(".gz"));

    let mut text = String::new();
    if is_gz {
        let mut buf_reader = BufReader::new(GzDecoder::new(file));
        buf_reader.read_to_string(&mut text)?;
    } else {
        let mut buf_reader = BufReader::new(file);
        buf_reader.read_to_string(&mut text)?;
    }
    load(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_comments() {
        let text = "---\nfirst note\nsecond note\n---\nTime,AV,AI\n0,0,0\n0.1,0.01,1e-6\n";
        let table = load(text).unwrap();
        assert_eq!(table.comments, "first note\nsecond note");
        assert_eq!(table.column_names, vec!["Time", "AV", "AI"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("AI").unwrap(), &[0.0, 1e-6]);
    }

    #[test]
    fn test_load_without_comments() {
        let table = load("Time,AV\n0,1\n").unwrap();
        assert_eq!(table.comments, NO_COMMENTS);
        assert_eq!(table.column("AV").unwrap(), &[1.0]);
        assert!(table.column("AI").is_none());
    }

    #[test]
    fn test_delimiter_ignores_spaces() {
        let table = load(" - - - \nnote\n---  \nTime\n1\n").unwrap();
        assert_eq!(table.comments, "note");
        assert_eq!(table.column("Time").unwrap(), &[1.0]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let table = load("Time,AV\n\n0,1\n   \n1,2\n\n").unwrap();
        assert_eq!(table.column("Time").unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let table = load("---\r\nnote\r\n---\r\nTime,AV\r\n0,1\r\n").unwrap();
        assert_eq!(table.comments, "note");
        assert_eq!(table.column_names, vec!["Time", "AV"]);
        assert_eq!(table.column("AV").unwrap(), &[1.0]);
    }

    #[test]
    fn test_field_count_mismatch() {
        match load("Time,AV\n0,1\n1\n") {
            Err(Error::MalformedTable { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected MalformedTable, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_field() {
        match load("Time,AV\n0,abc\n") {
            Err(Error::MalformedTable { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("abc"));
            }
            other => panic!("expected MalformedTable, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_comment_block() {
        assert!(matches!(
            load("---\nnote\nTime,AV\n0,1\n"),
            Err(Error::MalformedTable { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(load("---\nnote\n---\n"), Err(Error::MalformedTable { .. })));
        assert!(matches!(load(""), Err(Error::MalformedTable { .. })));
    }
}
