use std::collections::HashMap;

use crate::summary::StudySummary;

/// Key under which studies without declared files are counted.
pub const NO_FILES_KEY: &str = "No files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupEntry {
    pub extension: String,
    pub accession_count: u64,
    pub total_file_count: u64,
    pub total_size: u64,
    pub accessions: Vec<String>,
}

/// Extension-keyed totals across studies, kept in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Rollup {
    entries: Vec<RollupEntry>,
    index: HashMap<String, usize>,
}

impl Rollup {
    pub fn get(&self, extension: &str) -> Option<&RollupEntry> {
        self.index.get(extension).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[RollupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add(&mut self, extension: &str, accession: &str, count: u64, size: u64) {
        match self.index.get(extension) {
            Some(&idx) => {
                let entry = &mut self.entries[idx];
                debug_assert!(
                    !entry.accessions.iter().any(|seen| seen == accession),
                    "{accession} reported {extension} twice"
                );
                entry.accession_count = entry.accession_count.saturating_add(1);
                entry.total_file_count = entry.total_file_count.saturating_add(count);
                entry.total_size = entry.total_size.saturating_add(size);
                entry.accessions.push(accession.to_string());
            }
            None => {
                self.index.insert(extension.to_string(), self.entries.len());
                self.entries.push(RollupEntry {
                    extension: extension.to_string(),
                    accession_count: 1,
                    total_file_count: count,
                    total_size: size,
                    accessions: vec![accession.to_string()],
                });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossStudyRollup {
    track_empty_studies: bool,
}

impl CrossStudyRollup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count studies with no files under [`NO_FILES_KEY`].
    pub fn track_empty_studies(mut self, enabled: bool) -> Self {
        self.track_empty_studies = enabled;
        self
    }

    pub fn rollup<'a, I>(&self, summaries: I) -> Rollup
    where
        I: IntoIterator<Item = &'a StudySummary>,
    {
        let mut rollup = Rollup::default();
        for summary in summaries {
            if summary.filetypes.is_empty() {
                if self.track_empty_studies {
                    rollup.add(NO_FILES_KEY, &summary.accession, 0, 0);
                }
                continue;
            }
            for (extension, stats) in summary.filetypes.iter() {
                rollup.add(extension, &summary.accession, stats.count, stats.total_size);
            }
        }
        rollup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filetypes::{ExtensionStats, ExtensionSummary};

    fn study(accession: &str, filetypes: &[(&str, u64, u64)]) -> StudySummary {
        StudySummary {
            accession: accession.to_string(),
            title: String::new(),
            filetypes: filetypes
                .iter()
                .map(|(ext, n, size)| (ext.to_string(), ExtensionStats::new(*n, *size)))
                .collect(),
        }
    }

    #[test]
    fn shared_extension_tracks_both_accessions() {
        let summaries = vec![
            study("S-BIAD2", &[(".tif", 3, 300), (".csv", 1, 5)]),
            study("S-BIAD1", &[(".tif", 2, 20)]),
        ];
        let rollup = CrossStudyRollup::new().rollup(&summaries);

        let tif = rollup.get(".tif").unwrap();
        assert_eq!(tif.accession_count, 2);
        assert_eq!(tif.total_file_count, 5);
        assert_eq!(tif.total_size, 320);
        assert_eq!(tif.accessions, vec!["S-BIAD2", "S-BIAD1"]);

        let csv = rollup.get(".csv").unwrap();
        assert_eq!(csv.accession_count, 1);
        assert_eq!(csv.accessions, vec!["S-BIAD2"]);
    }

    #[test]
    fn oversized_totals_saturate() {
        let summaries = vec![
            study("S-BIAD5", &[(".tif", 1, u64::MAX - 1)]),
            study("S-BIAD6", &[(".tif", 1, 10)]),
        ];
        let rollup = CrossStudyRollup::new().rollup(&summaries);
        let tif = rollup.get(".tif").unwrap();
        assert_eq!(tif.total_size, u64::MAX);
        assert_eq!(tif.total_file_count, 2);
    }

    #[test]
    fn empty_studies_only_counted_when_tracked() {
        let summaries = vec![
            StudySummary {
                accession: "S-BIAD3".to_string(),
                title: String::new(),
                filetypes: ExtensionSummary::new(),
            },
            study("S-BIAD4", &[(".png", 1, 1)]),
        ];

        let plain = CrossStudyRollup::new().rollup(&summaries);
        assert!(plain.get(NO_FILES_KEY).is_none());
        assert_eq!(plain.len(), 1);

        let tracked = CrossStudyRollup::new()
            .track_empty_studies(true)
            .rollup(&summaries);
        let empty = tracked.get(NO_FILES_KEY).unwrap();
        assert_eq!(empty.accessions, vec!["S-BIAD3"]);
        assert_eq!(empty.total_file_count, 0);
        assert_eq!(tracked.entries()[0].extension, NO_FILES_KEY);
    }
}
