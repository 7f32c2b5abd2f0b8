use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const ZIPFILE_REPRESENTATION: &str = "zipfile";
pub const ZIP_FILENAME_ATTRIBUTE: &str = "zip_filename";

/// A stored encoding of an image or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub accession_id: String,
    pub image_id: String,
    #[serde(rename = "type")]
    pub rep_type: String,
    pub uri: String,
    pub size: u64,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiaImage {
    pub id: String,
    pub original_relpath: String,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiaFile {
    pub id: String,
    pub original_relpath: String,
    #[serde(default)]
    pub original_size: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub accession_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub images: BTreeMap<String, BiaImage>,
    #[serde(default)]
    pub archive_files: BTreeMap<String, BiaFile>,
    #[serde(default)]
    pub other_files: BTreeMap<String, BiaFile>,
}

impl Study {
    pub fn new(accession_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            accession_id: accession_id.into(),
            title: title.into(),
            images: BTreeMap::new(),
            archive_files: BTreeMap::new(),
            other_files: BTreeMap::new(),
        }
    }
}
