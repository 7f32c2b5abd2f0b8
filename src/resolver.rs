use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StorageConfig;
use crate::domain::Accession;
use crate::error::BiaError;

/// Accessions in this collection up to this number live in a shared bucket
/// directory on the storage roots.
const BUCKETED_COLLECTION: &str = "S-BIAD";
const BUCKETED_MAX_ID: u64 = 99;
const BUCKET_DIR: &str = "S-BIAD0-99";

/// Finds where a study's declared file physically lives.
#[derive(Debug, Clone)]
pub struct PathResolver {
    storage: StorageConfig,
}

impl PathResolver {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Every location the file may live at, in priority order.
    pub fn candidates(&self, original_relpath: &str, accession: &Accession) -> Vec<PathBuf> {
        let collection = accession.collection();
        let number = accession.number();
        let relpath = original_relpath.trim_start_matches('/');

        let mut candidates: Vec<PathBuf> = self
            .storage
            .primary_base
            .iter()
            .chain(self.storage.secondary_bases.iter())
            .map(|base| {
                base.join(collection)
                    .join(number)
                    .join(format!("{collection}{number}"))
                    .join("Files")
                    .join(relpath)
            })
            .collect();

        if collection == BUCKETED_COLLECTION && accession.numeric_id() <= BUCKETED_MAX_ID {
            candidates.extend(self.storage.secondary_bases.iter().map(|base| {
                base.join(BUCKETED_COLLECTION)
                    .join(BUCKET_DIR)
                    .join(accession.to_string())
                    .join("Files")
                    .join(relpath)
            }));
        }

        candidates
    }

    pub fn resolve(&self, original_relpath: &str, accession: &Accession) -> Result<PathBuf, BiaError> {
        self.resolve_with(original_relpath, accession, |path| path.is_file())
    }

    /// Like [`resolve`](Self::resolve) with a caller-provided existence check.
    pub fn resolve_with<F>(
        &self,
        original_relpath: &str,
        accession: &Accession,
        exists: F,
    ) -> Result<PathBuf, BiaError>
    where
        F: Fn(&Path) -> bool,
    {
        let candidates = self.candidates(original_relpath, accession);
        match candidates.iter().find(|candidate| exists(candidate)) {
            Some(found) => {
                debug!(accession = %accession, path = %found.display(), "resolved file");
                Ok(found.clone())
            }
            None => Err(BiaError::NotFound {
                relpath: original_relpath.to_string(),
                candidates,
            }),
        }
    }
}
