use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BiaError;
use crate::filetypes::remap_for_zip_context;

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(S-B[A-Z]+)([0-9]+)$").expect("accession pattern"));

/// A BioStudies accession such as `S-BIAD229`, split into its collection
/// prefix and numeric part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accession {
    collection: String,
    number: String,
}

impl Accession {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Digits exactly as written in the accession.
    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn numeric_id(&self) -> u64 {
        // The pattern guarantees digits; overflow only for absurdly long ids.
        self.number.parse().unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.collection, self.number)
    }
}

impl FromStr for Accession {
    type Err = BiaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = ACCESSION_RE
            .captures(value.trim())
            .ok_or_else(|| BiaError::MalformedAccession(value.to_string()))?;
        Ok(Self {
            collection: captures[1].to_string(),
            number: captures[2].to_string(),
        })
    }
}

/// One file of a study inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    path: String,
    size: u64,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Builds the inventory entry for a member living inside an archive: the
    /// member's name keeps its directory and stem, its suffix is replaced by
    /// the zip-context tag.
    pub fn nested_in_zip(member: &ZipMemberRecord) -> Self {
        let trimmed = member.filename.trim_end_matches('/');
        let (parent, name) = match trimmed.rfind('/') {
            Some(idx) => (&trimmed[..=idx], &trimmed[idx + 1..]),
            None => ("", trimmed),
        };
        let suffix = suffix_of_name(name);
        let stem = &name[..name.len() - suffix.len()];
        let path = format!("{parent}{stem}{}", remap_for_zip_context(suffix));
        Self {
            path,
            size: member.size,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.path)
    }

    pub fn is_zip(&self) -> bool {
        self.path.ends_with(".zip")
    }
}

/// A member as declared by an archive's central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipMemberRecord {
    pub filename: String,
    pub size: u64,
}

impl ZipMemberRecord {
    pub fn extension(&self) -> &str {
        extension_of(&self.filename)
    }
}

/// Final dotted suffix of the last path component, leading dot included.
///
/// A name whose only dot is the first character (`.bashrc`) or that ends with
/// a dot has no extension.
pub fn extension_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    let name = match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };
    suffix_of_name(name)
}

fn suffix_of_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx < name.len() - 1 => &name[idx..],
        _ => "",
    }
}
