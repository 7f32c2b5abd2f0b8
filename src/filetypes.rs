use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::domain::FileEntry;

pub const ZIP_NOSUFFIX: &str = ".zip_nosuffix";

/// Per-extension file count and byte total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStats {
    #[serde(rename = "n", alias = "count")]
    pub count: u64,
    pub total_size: u64,
}

impl ExtensionStats {
    pub fn new(count: u64, total_size: u64) -> Self {
        Self { count, total_size }
    }
}

/// Totals saturate at `u64::MAX`; sizes come from untrusted archive headers.
impl AddAssign for ExtensionStats {
    fn add_assign(&mut self, rhs: Self) {
        self.count = self.count.saturating_add(rhs.count);
        self.total_size = self.total_size.saturating_add(rhs.total_size);
    }
}

/// Extension-keyed statistics. Keys include the leading dot; files without an
/// extension live under `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionSummary(BTreeMap<String, ExtensionStats>);

impl ExtensionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, extension: &str, size: u64) {
        *self.0.entry(extension.to_string()).or_default() += ExtensionStats::new(1, size);
    }

    pub fn get(&self, extension: &str) -> Option<&ExtensionStats> {
        self.0.get(extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtensionStats)> {
        self.0.iter().map(|(ext, stats)| (ext.as_str(), stats))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_files(&self) -> u64 {
        self.0
            .values()
            .fold(0u64, |total, stats| total.saturating_add(stats.count))
    }

    pub fn total_size(&self) -> u64 {
        self.0
            .values()
            .fold(0u64, |total, stats| total.saturating_add(stats.total_size))
    }
}

impl FromIterator<(String, ExtensionStats)> for ExtensionSummary {
    fn from_iter<I: IntoIterator<Item = (String, ExtensionStats)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Tag an extension as coming from inside a zip archive: `.tif` becomes
/// `.zip_tif`, no extension becomes `.zip_nosuffix`.
pub fn remap_for_zip_context(extension: &str) -> String {
    match extension.strip_prefix('.') {
        Some(rest) if !rest.is_empty() => format!(".zip_{rest}"),
        _ => ZIP_NOSUFFIX.to_string(),
    }
}

pub struct FiletypeAggregator;

impl FiletypeAggregator {
    pub fn aggregate<'a, I>(entries: I) -> ExtensionSummary
    where
        I: IntoIterator<Item = &'a FileEntry>,
    {
        let mut summary = ExtensionSummary::new();
        for entry in entries {
            summary.record(entry.extension(), entry.size());
        }
        summary
    }

    /// Aggregate entries that live inside an archive. Extensions are remapped
    /// before grouping so nested files never share a bucket with top-level ones.
    pub fn aggregate_zip_contents<'a, I>(entries: I) -> ExtensionSummary
    where
        I: IntoIterator<Item = &'a FileEntry>,
    {
        let mut summary = ExtensionSummary::new();
        for entry in entries {
            summary.record(&remap_for_zip_context(entry.extension()), entry.size());
        }
        summary
    }
}
