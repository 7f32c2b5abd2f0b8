use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::Accession;
use crate::error::BiaError;
use crate::study::{Representation, Study};

/// Persistence for studies and their image representations.
pub trait StudyStore {
    fn load_study(&self, accession: &str) -> Result<Study, BiaError>;
    fn persist_study(&self, study: &Study) -> Result<(), BiaError>;

    fn persist_image_representation(&self, rep: &Representation) -> Result<(), BiaError> {
        let mut study = self.load_study(&rep.accession_id)?;
        let image = study
            .images
            .get_mut(&rep.image_id)
            .ok_or_else(|| BiaError::ImageNotFound {
                accession: rep.accession_id.clone(),
                image_id: rep.image_id.clone(),
            })?;
        image.representations.push(rep.clone());
        self.persist_study(&study)
    }
}

/// One JSON document per study under `<root>/studies/`.
#[derive(Debug, Clone)]
pub struct LocalStudyStore {
    root: Utf8PathBuf,
}

impl LocalStudyStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Location of a study document. Only well-formed accessions map to a
    /// path, so no document can land outside `<root>/studies`.
    pub fn study_path(&self, accession: &str) -> Result<Utf8PathBuf, BiaError> {
        let accession: Accession = accession.parse()?;
        Ok(self.root.join("studies").join(format!("{accession}.json")))
    }

    pub fn write_json_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), BiaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl StudyStore for LocalStudyStore {
    fn load_study(&self, accession: &str) -> Result<Study, BiaError> {
        let path = self.study_path(accession)?;
        if !path.as_std_path().exists() {
            return Err(BiaError::StudyNotFound(accession.to_string()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|err| BiaError::Filesystem(format!("parse {path}: {err}")))
    }

    fn persist_study(&self, study: &Study) -> Result<(), BiaError> {
        let path = self.study_path(&study.accession_id)?;
        let content = serde_json::to_vec_pretty(study)
            .map_err(|err| BiaError::Filesystem(err.to_string()))?;
        Self::write_json_atomic(&path, &content)?;
        debug!(accession = %study.accession_id, path = %path, "persisted study");
        Ok(())
    }
}
