use std::collections::BTreeMap;

use tracing::info;

use crate::domain::{Accession, ZipMemberRecord};
use crate::error::BiaError;
use crate::study::{
    BiaFile, BiaImage, Representation, Study, ZIP_FILENAME_ATTRIBUTE, ZIPFILE_REPRESENTATION,
};
use crate::zip_index::ZipIndexer;

/// Turns image members of a catalogued archive into image entities that
/// point back at the archive.
pub struct RemoteImageZipSplitter {
    indexer: ZipIndexer,
    fire_ftp_endpoint: String,
}

impl RemoteImageZipSplitter {
    pub fn new(indexer: ZipIndexer, fire_ftp_endpoint: impl Into<String>) -> Self {
        Self {
            indexer,
            fire_ftp_endpoint: fire_ftp_endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Candidate locations of the archive: the FIRE FTP mirror first (it
    /// serves byte ranges), then the archive's catalogued representation.
    pub fn candidate_uris(&self, study: &Study, zipfile: &BiaFile) -> Result<Vec<String>, BiaError> {
        let accession: Accession = study.accession_id.parse()?;
        let fire = format!(
            "{}/{}/{}/{}/Files/{}",
            self.fire_ftp_endpoint,
            accession.collection(),
            accession.number(),
            accession,
            zipfile.original_relpath.trim_start_matches('/')
        );
        Ok(vec![fire, archive_uri(study, zipfile)?.to_string()])
    }

    /// Register every image-typed member of `zipfile_id` as a new image of the
    /// study. Returns the registered images; the caller persists the study.
    pub fn split(
        &self,
        study: &mut Study,
        zipfile_id: &str,
        image_extensions: &[String],
    ) -> Result<BTreeMap<String, BiaImage>, BiaError> {
        let zipfile = find_archive(study, zipfile_id)?;
        let candidates = self.candidate_uris(study, zipfile)?;
        let members = self.indexer.list_members(&candidates)?;
        register_members(study, zipfile_id, &members, image_extensions)
    }
}

/// Register image members already listed from an archive (remote or cached).
pub fn register_members(
    study: &mut Study,
    zipfile_id: &str,
    members: &[ZipMemberRecord],
    image_extensions: &[String],
) -> Result<BTreeMap<String, BiaImage>, BiaError> {
    let zipfile = find_archive(study, zipfile_id)?;
    let uri = archive_uri(study, zipfile)?.to_string();

    let images: BTreeMap<String, BiaImage> = members
        .iter()
        .filter(|member| image_extensions.iter().any(|ext| ext == member.extension()))
        .enumerate()
        .map(|(idx, member)| {
            let image_id = format!("{zipfile_id}-IM{}", idx + 1);
            let representation = Representation {
                accession_id: study.accession_id.clone(),
                image_id: image_id.clone(),
                rep_type: ZIPFILE_REPRESENTATION.to_string(),
                uri: uri.clone(),
                size: member.size,
                dimensions: None,
                attributes: BTreeMap::from([(
                    ZIP_FILENAME_ATTRIBUTE.to_string(),
                    member.filename.clone(),
                )]),
            };
            let image = BiaImage {
                id: image_id.clone(),
                original_relpath: member.filename.clone(),
                dimensions: None,
                attributes: BTreeMap::new(),
                representations: vec![representation],
            };
            (image_id, image)
        })
        .collect();

    info!(
        accession = %study.accession_id,
        zipfile = zipfile_id,
        members = members.len(),
        images = images.len(),
        "registered zip members as images"
    );
    study.images.extend(images.clone());
    Ok(images)
}

pub fn find_archive<'a>(study: &'a Study, zipfile_id: &str) -> Result<&'a BiaFile, BiaError> {
    study
        .archive_files
        .get(zipfile_id)
        .ok_or_else(|| BiaError::ArchiveFileNotFound {
            accession: study.accession_id.clone(),
            file_id: zipfile_id.to_string(),
        })
}

// TODO: pick the representation by type once archives carry more than one.
fn archive_uri<'a>(study: &Study, zipfile: &'a BiaFile) -> Result<&'a str, BiaError> {
    zipfile
        .representations
        .first()
        .map(|rep| rep.uri.as_str())
        .ok_or_else(|| {
            BiaError::MissingRepresentation(format!(
                "archive {} of {}",
                zipfile.id, study.accession_id
            ))
        })
}
