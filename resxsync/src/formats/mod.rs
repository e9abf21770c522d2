//! File formats understood by resxsync.
//!
//! `.resx` is the resource format itself; CSV and TSV are the delimited sheet formats used by the
//! file backend. [`FormatType`] names them for generic handling (CLI flags, file extensions).

pub mod csv;
pub mod resx;
pub mod tsv;

use std::{
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

pub use csv::CsvSheet;
pub use resx::{ResxDocument, ResxStore};
pub use tsv::TsvSheet;

use crate::Error;

/// Represents all supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatType {
    /// .NET `.resx` resource file.
    Resx,
    /// Comma-separated sheet.
    Csv,
    /// Tab-separated sheet.
    Tsv,
}

/// Implements [`std::fmt::Display`] for [`FormatType`].
///
/// # Example
/// ```rust
/// use resxsync::formats::FormatType;
/// assert_eq!(FormatType::Resx.to_string(), "resx");
/// assert_eq!(FormatType::Tsv.to_string(), "tsv");
/// ```
impl Display for FormatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Resx => write!(f, "resx"),
            FormatType::Csv => write!(f, "csv"),
            FormatType::Tsv => write!(f, "tsv"),
        }
    }
}

/// Implements [`std::str::FromStr`] for [`FormatType`].
///
/// Accepts case-insensitive names; `"tab"` is an alias of `"tsv"`.
/// Returns [`crate::error::Error::UnknownFormat`] for unknown strings.
///
/// # Example
/// ```rust
/// use resxsync::formats::FormatType;
/// use std::str::FromStr;
/// assert_eq!(FormatType::from_str("CSV").unwrap(), FormatType::Csv);
/// assert!(FormatType::from_str("xlsx").is_err());
/// ```
impl FromStr for FormatType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "resx" => Ok(FormatType::Resx),
            "csv" => Ok(FormatType::Csv),
            "tsv" | "tab" => Ok(FormatType::Tsv),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl FormatType {
    /// Returns the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Resx => "resx",
            FormatType::Csv => "csv",
            FormatType::Tsv => "tsv",
        }
    }

    /// Field delimiter for sheet formats, `None` for `.resx`.
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            FormatType::Resx => None,
            FormatType::Csv => Some(b','),
            FormatType::Tsv => Some(b'\t'),
        }
    }

    /// Infers the format from a file extension.
    pub fn from_path(path: &Path) -> Option<FormatType> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}
