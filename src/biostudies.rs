use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{Accession, FileEntry};
use crate::error::BiaError;
use crate::http::HttpClient;

const FILE_LIST_ATTRIBUTE: &str = "File List";
const TITLE_ATTRIBUTE: &str = "Title";

#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Sections and files may be nested one level in lists (tables).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Nested<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Nested<T> {
    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            Nested::Many(items) => Box::new(items.iter()),
            Nested::One(item) => Box::new(std::iter::once(item)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    #[serde(default, rename = "type")]
    pub section_type: Option<String>,
    #[serde(default)]
    pub accno: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub files: Vec<Nested<RawFile>>,
    #[serde(default)]
    pub subsections: Vec<Nested<Section>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub accno: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub section: Section,
}

/// File record as served by the catalogue, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: Option<Value>,
}

impl TryFrom<&RawFile> for FileEntry {
    type Error = BiaError;

    fn try_from(raw: &RawFile) -> Result<Self, Self::Error> {
        let path = raw
            .path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| BiaError::CatalogueParse("file entry without path".to_string()))?;
        let size = raw
            .size
            .as_ref()
            .and_then(|value| value.as_u64())
            .ok_or_else(|| {
                BiaError::CatalogueParse(format!("file {path} has no non-negative size"))
            })?;
        Ok(FileEntry::new(path, size))
    }
}

impl Submission {
    fn attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a str> {
        attributes
            .iter()
            .find(|attr| attr.name == name)
            .and_then(|attr| attr.value.as_deref())
            .filter(|value| !value.trim().is_empty())
    }

    /// Submission title, else the study section title, else `"Unknown"`.
    pub fn title(&self) -> String {
        Self::attribute(&self.attributes, TITLE_ATTRIBUTE)
            .or_else(|| Self::attribute(&self.section.attributes, TITLE_ATTRIBUTE))
            .unwrap_or("Unknown")
            .to_string()
    }

    /// Names of file lists referenced anywhere in the section tree.
    pub fn file_list_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_file_lists(&self.section, &mut names);
        names
    }

    /// Files attached directly to sections rather than through file lists.
    pub fn section_files(&self) -> Result<Vec<FileEntry>, BiaError> {
        let mut raw = Vec::new();
        collect_section_files(&self.section, &mut raw);
        raw.into_iter().map(FileEntry::try_from).collect()
    }
}

fn collect_file_lists(section: &Section, names: &mut Vec<String>) {
    if let Some(name) = Submission::attribute(&section.attributes, FILE_LIST_ATTRIBUTE) {
        names.push(name.to_string());
    }
    for nested in &section.subsections {
        for subsection in nested.items() {
            collect_file_lists(subsection, names);
        }
    }
}

fn collect_section_files<'a>(section: &'a Section, files: &mut Vec<&'a RawFile>) {
    for nested in &section.files {
        files.extend(nested.items());
    }
    for nested in &section.subsections {
        for subsection in nested.items() {
            collect_section_files(subsection, files);
        }
    }
}

/// The file-list document is always fetched as JSON.
pub fn file_list_json_name(name: &str) -> String {
    let stem = name
        .strip_suffix(".tsv")
        .or_else(|| name.strip_suffix(".xlsx"))
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name);
    format!("{stem}.json")
}

pub fn parse_submission(body: &str) -> Result<Submission, BiaError> {
    serde_json::from_str(body).map_err(|err| BiaError::CatalogueParse(err.to_string()))
}

pub fn parse_file_list(body: &str) -> Result<Vec<FileEntry>, BiaError> {
    let raw: Vec<RawFile> =
        serde_json::from_str(body).map_err(|err| BiaError::CatalogueParse(err.to_string()))?;
    raw.iter().map(FileEntry::try_from).collect()
}

pub trait CatalogueClient: Send + Sync {
    fn get_submission(&self, accession: &Accession) -> Result<Submission, BiaError>;
    fn find_files(&self, submission: &Submission) -> Result<Vec<FileEntry>, BiaError>;
}

#[derive(Debug, Deserialize)]
struct StudyInfo {
    #[serde(rename = "httpLink")]
    http_link: Option<String>,
}

#[derive(Clone)]
pub struct BiostudiesHttpClient {
    http: HttpClient,
    base_url: String,
    include_section_files: bool,
}

impl BiostudiesHttpClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            include_section_files: false,
        }
    }

    /// Also return files attached directly to sections, after the file-list
    /// entries. Off by default: only file lists make up the inventory.
    pub fn include_section_files(mut self, enabled: bool) -> Self {
        self.include_section_files = enabled;
        self
    }

    fn get_text(&self, url: &str) -> Result<String, BiaError> {
        let response = self
            .http
            .send_with_retries(|| self.http.get(url))
            .map_err(|err| BiaError::CatalogueFetch(format!("{url}: {err}")))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalogue request failed".to_string());
            return Err(BiaError::CatalogueStatus { status, message });
        }
        response
            .text()
            .map_err(|err| BiaError::CatalogueFetch(err.to_string()))
    }

    fn files_base_url(&self, accession: &str) -> Result<String, BiaError> {
        let url = format!("{}/studies/{accession}/info", self.base_url);
        let info: StudyInfo = serde_json::from_str(&self.get_text(&url)?)
            .map_err(|err| BiaError::CatalogueParse(err.to_string()))?;
        let link = info
            .http_link
            .ok_or_else(|| BiaError::CatalogueParse(format!("no httpLink for {accession}")))?;
        Ok(format!("{}/Files", link.trim_end_matches('/')))
    }
}

impl CatalogueClient for BiostudiesHttpClient {
    fn get_submission(&self, accession: &Accession) -> Result<Submission, BiaError> {
        let url = format!("{}/studies/{accession}", self.base_url);
        parse_submission(&self.get_text(&url)?)
    }

    fn find_files(&self, submission: &Submission) -> Result<Vec<FileEntry>, BiaError> {
        let mut files = Vec::new();
        let list_names = submission.file_list_names();
        if !list_names.is_empty() {
            let files_base = self.files_base_url(&submission.accno)?;
            for name in list_names {
                let url = format!("{files_base}/{}", file_list_json_name(&name));
                let entries = parse_file_list(&self.get_text(&url)?)?;
                debug!(
                    accession = %submission.accno,
                    file_list = %name,
                    files = entries.len(),
                    "loaded file list"
                );
                files.extend(entries);
            }
        }
        if self.include_section_files {
            files.extend(submission.section_files()?);
        }
        Ok(files)
    }
}
