use std::io::{self, Write};

use serde::Serialize;

use crate::rollup::CrossStudyRollup;
use crate::study::{BiaImage, Representation};
use crate::summary::SummaryReport;

pub const ACCESSION_TSV_HEADER: [&str; 6] = [
    "accno",
    "title",
    "n_filetypes",
    "total_no_of_files",
    "total_file_size",
    "filetype_breakdown",
];

pub const FILETYPE_TSV_HEADER: [&str; 5] = [
    "filetype",
    "n_accnos",
    "total_no_of_files",
    "total_file_size",
    "accnos",
];

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &SummaryReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_images<'a, I>(images: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a BiaImage>,
    {
        let images: Vec<&BiaImage> = images.into_iter().collect();
        Self::print_json(&images)
    }

    pub fn print_representation(rep: &Representation) -> io::Result<()> {
        Self::print_json(rep)
    }

    pub fn write_json<T: Serialize, W: Write>(value: &T, out: &mut W) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        out.write_all(json.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        Self::write_json(value, &mut io::stdout().lock())
    }
}

/// Tab-separated exports of a [`SummaryReport`].
pub struct TsvOutput;

impl TsvOutput {
    /// One row per accession, in report order.
    pub fn write_accessions<W: Write>(report: &SummaryReport, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", ACCESSION_TSV_HEADER.join("\t"))?;
        for summary in &report.summaries {
            if summary.filetypes.is_empty() {
                writeln!(out, "{}\t\t0\t0\t0\t", summary.accession)?;
                continue;
            }
            let breakdown = serde_json::to_string(&summary.filetypes).map_err(io::Error::other)?;
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                summary.accession,
                clean_field(&summary.title),
                summary.filetypes.len(),
                summary.filetypes.total_files(),
                summary.filetypes.total_size(),
                breakdown
            )?;
        }
        Ok(())
    }

    /// One row per extension across all accessions, first-seen order.
    pub fn write_filetypes<W: Write>(report: &SummaryReport, out: &mut W) -> io::Result<()> {
        let rollup = CrossStudyRollup::new()
            .track_empty_studies(true)
            .rollup(&report.summaries);
        writeln!(out, "{}", FILETYPE_TSV_HEADER.join("\t"))?;
        for entry in rollup.entries() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                clean_field(&entry.extension),
                entry.accession_count,
                entry.total_file_count,
                entry.total_size,
                entry.accessions.join(",")
            )?;
        }
        Ok(())
    }
}

fn clean_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
