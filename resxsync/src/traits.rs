//! Traits for reading and writing resource documents.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Write},
    path::Path,
};

use crate::{error::Error, types::ResourceNode};

/// A trait for parsing and writing one resource document from/to a reader or file.
///
/// # Example
///
/// ```rust,no_run
/// use resxsync::traits::Parser;
/// let doc = resxsync::formats::resx::ResxDocument::read_from("Strings.resx")?;
/// doc.write_to("Strings.copy.resx")?;
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from any reader.
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let file = File::open(path).map_err(Error::Io)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Write to any writer (file, memory, etc.).
    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error>;

    /// Write to file path.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(s))
    }

    /// Parse from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::from_reader(Cursor::new(bytes))
    }
}

/// Reads and writes the nodes of resource files by path.
///
/// The engine only talks to resource files through this trait, so tests and alternative hosts
/// can substitute their own storage.
pub trait ResourceStore: Send + Sync {
    /// Reads every node of the file, in document order. An empty file has no nodes.
    fn read(&self, path: &Path) -> Result<Vec<ResourceNode>, Error>;

    /// Replaces the file content with `nodes`, creating the file when needed.
    fn write(&self, path: &Path, nodes: &[ResourceNode]) -> Result<(), Error>;
}
