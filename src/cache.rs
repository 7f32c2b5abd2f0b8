use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use tracing::info;

use crate::error::BiaError;
use crate::http::HttpClient;

/// Local copies of remote archives, named `<md5(uri)><suffix>`.
#[derive(Clone)]
pub struct ZipCache {
    root: Utf8PathBuf,
    http: HttpClient,
}

impl ZipCache {
    pub fn new(root: Utf8PathBuf, http: HttpClient) -> Self {
        Self { root, http }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn cache_path(&self, uri: &str) -> Utf8PathBuf {
        self.root.join(cache_file_name(uri))
    }

    /// Return the cached copy of `uri`, downloading it first if needed.
    pub fn fetch(&self, uri: &str) -> Result<Utf8PathBuf, BiaError> {
        let dst = self.cache_path(uri);
        if dst.as_std_path().exists() {
            info!(uri, path = %dst, "zipfile already cached");
            return Ok(dst);
        }
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        info!(uri, path = %dst, "downloading zipfile");
        self.download_atomic(uri, &dst)?;
        Ok(dst)
    }

    fn download_atomic(&self, uri: &str, dst: &Utf8Path) -> Result<(), BiaError> {
        let response = self.http.send_with_retries(|| self.http.get(uri))?;
        let mut response = HttpClient::handle_status(response)?;
        let mut temp = tempfile::Builder::new()
            .prefix("bia-zip")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| BiaError::Http(format!("download {uri}: {err}")))?;
        temp.persist(dst.as_std_path())
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// md5 of the full URI plus the suffix of the URI's path.
pub fn cache_file_name(uri: &str) -> String {
    let digest = Md5::digest(uri.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("{hex}{}", uri_suffix(uri))
}

fn uri_suffix(uri: &str) -> String {
    let path = reqwest::Url::parse(uri)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| uri.to_string());
    crate::domain::extension_of(&path).to_string()
}
