use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::domain::ZipMemberRecord;
use crate::error::BiaError;
use crate::http::HttpClient;
use crate::remote_zip::{HttpRangeReader, read_central_directory};

/// Enumerates archive members without extracting them.
#[derive(Clone)]
pub struct ZipIndexer {
    http: HttpClient,
}

impl ZipIndexer {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// List members from the first candidate that can be read.
    ///
    /// Candidates are tried strictly in order; a failing candidate is logged
    /// and skipped, and the first success is returned untouched. Remote
    /// candidates need byte-range support since only the central directory
    /// is fetched.
    pub fn list_members<S: AsRef<str>>(
        &self,
        candidates: &[S],
    ) -> Result<Vec<ZipMemberRecord>, BiaError> {
        let mut failures = Vec::new();
        for uri in candidates.iter().map(AsRef::as_ref) {
            match self.list_candidate(uri) {
                Ok(members) => {
                    info!(uri, members = members.len(), "indexed zip");
                    return Ok(members);
                }
                Err(err) => {
                    info!(uri, error = %err, "zip candidate unavailable");
                    failures.push(format!("{uri}: {err}"));
                }
            }
        }
        if failures.is_empty() {
            return Err(BiaError::ZipUnavailable("no candidate locations".to_string()));
        }
        Err(BiaError::ZipUnavailable(format!(
            "could not access zipfile at any of [{}]",
            failures.join("; ")
        )))
    }

    /// List members of an archive on local disk. Any read error is fatal.
    pub fn list_members_local(path: &Path) -> Result<Vec<ZipMemberRecord>, BiaError> {
        let unavailable = |err: &dyn std::fmt::Display| {
            BiaError::ZipUnavailable(format!("{}: {err}", path.display()))
        };
        let file = fs::File::open(path).map_err(|err| unavailable(&err))?;
        let mut archive = ZipArchive::new(file).map_err(|err| unavailable(&err))?;

        let mut members = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|err| unavailable(&err))?;
            members.push(ZipMemberRecord {
                filename: entry.name().to_string(),
                size: entry.size(),
            });
        }
        debug!(path = %path.display(), members = members.len(), "indexed local zip");
        Ok(members)
    }

    fn list_candidate(&self, uri: &str) -> Result<Vec<ZipMemberRecord>, BiaError> {
        match local_path(uri) {
            Some(path) => Self::list_members_local(&path),
            None => {
                let mut reader = HttpRangeReader::open(&self.http, uri)?;
                read_central_directory(&mut reader)
            }
        }
    }
}

fn local_path(uri: &str) -> Option<PathBuf> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return None;
    }
    Some(PathBuf::from(uri))
}
