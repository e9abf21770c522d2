//! Tab-separated sheet files. Same grid model as [`super::csv`], with a tab delimiter.

use std::io::{BufRead, Write};

use crate::{
    error::Error,
    formats::csv::{read_rows, write_rows},
    traits::Parser,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsvSheet {
    pub rows: Vec<Vec<String>>,
}

impl Parser for TsvSheet {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        Ok(TsvSheet {
            rows: read_rows(reader, b'\t')?,
        })
    }

    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        write_rows(writer, b'\t', &self.rows)
    }
}
