//! Comma-separated sheet files.
//!
//! A sheet is a plain grid of text cells. Rows may have different lengths; empty lines are
//! skipped by the reader, so blank separator rows are written as a single empty quoted field.

use std::io::{BufRead, Write};

use crate::{error::Error, traits::Parser};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvSheet {
    pub rows: Vec<Vec<String>>,
}

impl Parser for CsvSheet {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        Ok(CsvSheet {
            rows: read_rows(reader, b',')?,
        })
    }

    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        write_rows(writer, b',', &self.rows)
    }
}

/// Reads every record as a row of cells.
pub(crate) fn read_rows<R: BufRead>(reader: R, delimiter: u8) -> Result<Vec<Vec<String>>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Writes `rows`; a row without cells is written as one empty field.
pub(crate) fn write_rows<W: Write>(
    writer: W,
    delimiter: u8,
    rows: &[Vec<String>],
) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_writer(writer);

    for row in rows {
        if row.is_empty() {
            wtr.write_record([""])?;
        } else {
            wtr.write_record(row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_ragged_rows() {
        let sheet = CsvSheet::from_reader(Cursor::new("Strings\n\"\"\nKey,Default,Comment\n")).unwrap();
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0], vec!["Strings"]);
        assert_eq!(sheet.rows[1], vec![""]);
        assert_eq!(sheet.rows[2], vec!["Key", "Default", "Comment"]);
    }

    #[test]
    fn test_empty_row_survives_writing() {
        let sheet = CsvSheet {
            rows: vec![
                vec!["Title".to_string()],
                vec![],
                vec!["A".to_string(), "x, y".to_string()],
            ],
        };
        let mut out = Vec::new();
        sheet.to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"x, y\""));

        let back = CsvSheet::from_str(&text).unwrap();
        assert_eq!(back.rows.len(), 3);
        assert_eq!(back.rows[1], vec![""]);
        assert_eq!(back.rows[2][1], "x, y");
    }
}
