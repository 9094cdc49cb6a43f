use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use listing_core::ListingRecord;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const CSV_HEADER: [&str; 10] = [
    "title",
    "price",
    "currency",
    "address",
    "bedrooms",
    "bathrooms",
    "area_m2",
    "features",
    "raw_text",
    "extracted_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub formats: Vec<ExportFormat>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "properties".to_string(),
            formats: vec![ExportFormat::Csv, ExportFormat::Json],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat CSV view of a record; column order follows [`CSV_HEADER`].
#[derive(Serialize)]
struct CsvRow<'a> {
    title: Option<&'a str>,
    price: Option<u64>,
    currency: String,
    address: Option<&'a str>,
    bedrooms: Option<u32>,
    bathrooms: Option<u32>,
    area_m2: Option<u32>,
    features: String,
    raw_text: &'a str,
    extracted_at: String,
}

impl<'a> From<&'a ListingRecord> for CsvRow<'a> {
    fn from(record: &'a ListingRecord) -> Self {
        Self {
            title: record.title.as_deref(),
            price: record.price,
            currency: record.currency.to_string(),
            address: record.address.as_deref(),
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            area_m2: record.area_m2,
            features: record
                .features
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("|"),
            raw_text: &record.raw_text,
            extracted_at: record.extracted_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

/// Write `records` as `{prefix}_{YYYYmmdd_HHMMSS}.{ext}` for each configured
/// format. An empty run still yields a header-only CSV and an empty JSON array.
pub fn export_records(
    records: &[ListingRecord],
    options: &ExportOptions,
    stamp: DateTime<Local>,
) -> Result<ExportSummary, ExportError> {
    let writer = AtomicFileWriter::new(options.output_dir.clone());
    let base = format!("{}_{}", options.file_prefix, stamp.format("%Y%m%d_%H%M%S"));

    let mut files = Vec::with_capacity(options.formats.len());
    for format in &options.formats {
        let content = match format {
            ExportFormat::Csv => render_csv(records)?,
            ExportFormat::Json => serde_json::to_vec_pretty(records)?,
        };
        let filename = format!("{base}.{}", format.extension());
        files.push(writer.write(&filename, &content)?);
    }

    Ok(ExportSummary {
        record_count: records.len(),
        files,
    })
}

fn render_csv(records: &[ListingRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| {
            let kind = err.error().kind();
            ExportError::Persist(PersistError::Io(io::Error::new(kind, err.to_string())))
        })
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file in the same directory, then renames.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
