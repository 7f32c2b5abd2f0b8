use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::biostudies::CatalogueClient;
use crate::domain::{Accession, FileEntry};
use crate::error::BiaError;
use crate::filetypes::{ExtensionSummary, FiletypeAggregator};
use crate::resolver::PathResolver;
use crate::zip_index::ZipIndexer;

/// What to do when a declared `.zip` cannot be located or read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZipFailurePolicy {
    /// The whole accession fails.
    #[default]
    DropAccession,
    /// Log and leave that archive's members out of the inventory.
    SkipArchive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySummary {
    pub accession: String,
    pub title: String,
    pub filetypes: ExtensionSummary,
}

#[derive(Serialize, Deserialize)]
struct SummaryBody {
    title: String,
    filetypes: ExtensionSummary,
}

/// Summaries keyed by accession, serialized as a JSON object in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub summaries: Vec<StudySummary>,
}

impl SummaryReport {
    pub fn from_json(content: &str) -> Result<Self, BiaError> {
        serde_json::from_str(content).map_err(|err| BiaError::ReportParse(err.to_string()))
    }
}

impl Serialize for SummaryReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.summaries.len()))?;
        for summary in &self.summaries {
            map.serialize_entry(
                &summary.accession,
                &SummaryBody {
                    title: summary.title.clone(),
                    filetypes: summary.filetypes.clone(),
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SummaryReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ReportVisitor;

        impl<'de> Visitor<'de> for ReportVisitor {
            type Value = SummaryReport;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by accession")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut summaries = Vec::new();
                while let Some((accession, body)) = access.next_entry::<String, SummaryBody>()? {
                    summaries.push(StudySummary {
                        accession,
                        title: body.title,
                        filetypes: body.filetypes,
                    });
                }
                Ok(SummaryReport { summaries })
            }
        }

        deserializer.deserialize_map(ReportVisitor)
    }
}

pub struct StudySummaryPipeline<C: CatalogueClient> {
    catalogue: C,
    resolver: PathResolver,
    zip_policy: ZipFailurePolicy,
}

impl<C: CatalogueClient> StudySummaryPipeline<C> {
    pub fn new(catalogue: C, resolver: PathResolver) -> Self {
        Self {
            catalogue,
            resolver,
            zip_policy: ZipFailurePolicy::default(),
        }
    }

    pub fn with_zip_policy(mut self, policy: ZipFailurePolicy) -> Self {
        self.zip_policy = policy;
        self
    }

    /// Summarise one accession's declared files, with zip contents expanded.
    pub fn summarise(&self, accession: &str) -> Result<StudySummary, BiaError> {
        let accession: Accession = accession.parse()?;
        let submission = self.catalogue.get_submission(&accession)?;
        let title = submission.title();
        let mut inventory = self.catalogue.find_files(&submission)?;

        let mut nested = Vec::new();
        for entry in inventory.iter().filter(|entry| entry.is_zip()) {
            match self.index_zip(entry, &accession) {
                Ok(members) => nested.extend(members),
                Err(err) if self.zip_policy == ZipFailurePolicy::SkipArchive => {
                    warn!(accession = %accession, path = entry.path(), error = %err, "skipping unreadable zip");
                }
                Err(err) => return Err(err),
            }
        }
        inventory.extend(nested);

        Ok(StudySummary {
            accession: accession.to_string(),
            title,
            filetypes: FiletypeAggregator::aggregate(&inventory),
        })
    }

    /// Summarise every accession independently. Failures are logged and the
    /// accession is left out of the report.
    pub fn summarise_batch<S: AsRef<str>>(&self, accessions: &[S]) -> SummaryReport {
        let mut summaries = Vec::new();
        for accession in accessions.iter().map(AsRef::as_ref) {
            match self.summarise(accession) {
                Ok(summary) => {
                    info!(accession, filetypes = summary.filetypes.len(), "summarised study");
                    summaries.push(summary);
                }
                Err(err) => {
                    warn!(accession, error = %err, "there was an error for accession, skipping");
                }
            }
        }
        SummaryReport { summaries }
    }

    fn index_zip(&self, entry: &FileEntry, accession: &Accession) -> Result<Vec<FileEntry>, BiaError> {
        let path = self.resolver.resolve(entry.path(), accession)?;
        let members = ZipIndexer::list_members_local(&path)?;
        Ok(members.iter().map(FileEntry::nested_in_zip).collect())
    }
}

/// Read one accession per non-empty line.
pub fn parse_accession_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
