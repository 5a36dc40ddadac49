use crate::error::TrackerError;
use crate::pre::record::Record;
use encoding_rs::Encoding;
use std::path::{Path, PathBuf};
use tracing::warn;

/// RaceFileSource provides the rows of the race file for one poll cycle.
pub trait RaceFileSource {
    fn read_records(&mut self) -> Result<Vec<Record>, TrackerError>;
}

/// RaceFile reads the tab-separated race file periodically rewritten by the timing system.
#[derive(Debug, Clone)]
pub struct RaceFile {
    path: PathBuf,
    encoding: &'static Encoding,
}

impl RaceFile {
    /// The encoding label follows the WHATWG names, e.g. utf-8 or windows-1252.
    pub fn new(path: &Path, encoding_label: &str) -> Result<RaceFile, TrackerError> {
        let encoding = Encoding::for_label(encoding_label.trim().as_bytes())
            .ok_or_else(|| TrackerError::UnknownEncoding(encoding_label.to_owned()))?;

        Ok(RaceFile {
            path: path.to_path_buf(),
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RaceFileSource for RaceFile {
    fn read_records(&mut self) -> Result<Vec<Record>, TrackerError> {
        let bytes = std::fs::read(&self.path).map_err(|source| TrackerError::Io {
            path: self.path.to_owned(),
            source,
        })?;

        let (content, _, had_errors) = self.encoding.decode(&bytes);
        if had_errors {
            warn!(
                "Race file {} contains invalid {} sequences",
                self.path.display(),
                self.encoding.name()
            );
        }

        parse_records(&content)
    }
}

/// parse_records splits tab-separated content into header-keyed rows. Rows that cannot be
/// decoded are skipped.
pub fn parse_records(content: &str) -> Result<Vec<Record>, TrackerError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = csv_reader.headers()?.clone();
    let mut records = Vec::new();

    for (i, result) in csv_reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping undecodable race file line {}: {}", i + 2, e);
                continue;
            }
        };

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.trim().to_owned(), value.to_owned()))
            .collect();
        records.push(record);
    }

    Ok(records)
}
