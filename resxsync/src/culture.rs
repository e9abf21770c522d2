//! Culture identification for resource files and table columns.
//!
//! A resource file name such as `Strings.fr-FR.resx` carries its culture as the last dotted
//! segment before the extension. Files without such a segment belong to the neutral culture.

use std::{cmp::Ordering, collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::error::Error;

/// Default label of the neutral culture in tables.
pub const DEFAULT_NEUTRAL_LABEL: &str = "Default";

/// Segments that look like file extensions of view templates and must never be read as cultures
/// (`Index.cshtml.resx` is the neutral file of `Index.cshtml`).
pub const NON_CULTURE_EXTENSIONS: &[&str] = &["cshtml", "vbhtml", "aspx", "ascx", "master", "razor"];

/// Either the neutral (default) culture or a specific BCP 47 culture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CultureTag {
    Neutral,
    Specific(LanguageIdentifier),
}

impl CultureTag {
    /// Parses `tag` as a known culture.
    ///
    /// Only tags whose language subtag is 2 or 3 letters are accepted; `und` and arbitrary words
    /// that happen to be valid BCP 47 (such as `designer`) are rejected.
    pub fn parse_known(tag: &str) -> Option<CultureTag> {
        let language_part = tag.split(['-', '_']).next()?;
        if !(2..=3).contains(&language_part.len())
            || !language_part.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }
        let id: LanguageIdentifier = tag.parse().ok()?;
        if id.language.to_string() == "und" {
            return None;
        }
        Some(CultureTag::Specific(id))
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, CultureTag::Neutral)
    }

    /// Canonical tag (`fr`, `pt-BR`), or `None` for the neutral culture.
    pub fn tag(&self) -> Option<String> {
        match self {
            CultureTag::Neutral => None,
            CultureTag::Specific(id) => Some(id.to_string()),
        }
    }

    /// Name used for table headers.
    pub fn display_name(&self, neutral_label: &str) -> String {
        match self {
            CultureTag::Neutral => neutral_label.to_string(),
            CultureTag::Specific(id) => id.to_string(),
        }
    }

    /// Inverse of [`CultureTag::display_name`].
    pub fn from_display_name(name: &str, neutral_label: &str) -> Result<CultureTag, Error> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(neutral_label) {
            return Ok(CultureTag::Neutral);
        }
        CultureTag::parse_known(name)
            .ok_or_else(|| Error::invalid_table(format!("unknown culture column `{name}`")))
    }
}

impl Ord for CultureTag {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CultureTag::Neutral, CultureTag::Neutral) => Ordering::Equal,
            (CultureTag::Neutral, _) => Ordering::Less,
            (_, CultureTag::Neutral) => Ordering::Greater,
            (CultureTag::Specific(a), CultureTag::Specific(b)) => {
                a.to_string().cmp(&b.to_string())
            }
        }
    }
}

impl PartialOrd for CultureTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CultureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name(DEFAULT_NEUTRAL_LABEL))
    }
}

impl FromStr for CultureTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CultureTag::from_display_name(s, DEFAULT_NEUTRAL_LABEL)
    }
}

impl Serialize for CultureTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CultureTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Splits a resource file stem (extension already removed) into `(logical stem, culture)`.
///
/// `Strings.fr` → `("Strings", fr)`, `Index.cshtml` → `("Index.cshtml", Neutral)`.
pub fn split_culture<'a>(stem: &'a str, non_culture: &[String]) -> (&'a str, CultureTag) {
    if let Some((base, last)) = stem.rsplit_once('.') {
        let excluded = non_culture.iter().any(|ext| ext.eq_ignore_ascii_case(last));
        if !excluded && !base.is_empty() {
            if let Some(culture) = CultureTag::parse_known(last) {
                return (base, culture);
            }
        }
    }
    (stem, CultureTag::Neutral)
}

/// Column order for tables: neutral first, then the other cultures by display name.
pub fn culture_order<'a, I>(cultures: I, neutral_label: &str) -> Vec<CultureTag>
where
    I: IntoIterator<Item = &'a CultureTag>,
{
    let unique: BTreeSet<&CultureTag> = cultures.into_iter().collect();
    let mut specific: Vec<CultureTag> = unique
        .iter()
        .filter(|c| !c.is_neutral())
        .map(|c| (*c).clone())
        .collect();
    specific.sort_by_key(|c| c.display_name(neutral_label));

    let mut order = Vec::with_capacity(specific.len() + 1);
    order.push(CultureTag::Neutral);
    order.extend(specific);
    order
}
