//! Per-image result log of a session and its CSV export.
//!
//! The export is meant to be opened in spreadsheet software: it starts with
//! a UTF-8 byte order mark and separates fields with `;`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use camviz_explain::{ClassProbability, Prediction};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Byte order mark written before the CSV header.
const UTF8_BOM: &[u8] = "\u{feff}".as_bytes();

/// Header row of the exported CSV.
pub const CSV_HEADER: [&str; 6] = [
    "Timestamp",
    "Filename",
    "Label",
    "Confidence",
    "Top 3 probabilities (>50%)",
    "Probabilities",
];

/// Result type for result export.
pub type Result<T> = std::result::Result<T, ResultsError>;

/// Errors raised while exporting session results.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Probabilities could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One classified image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Local time of the classification.
    pub timestamp: NaiveDateTime,
    /// Name the image was submitted under.
    pub filename: String,
    /// Predicted label.
    pub label: String,
    /// Confidence of the predicted label, percent.
    pub confidence: f32,
    /// Every class probability, sorted descending.
    pub probabilities: Vec<ClassProbability>,
}

impl SessionResult {
    /// Top three probabilities above 50%, as `label: 93.1%; ...`.
    pub fn top_summary(&self) -> String {
        self.probabilities
            .iter()
            .filter(|p| p.probability > 50.0)
            .take(3)
            .map(|p| format!("{}: {:.1}%", p.label, p.probability))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn to_row(&self) -> Result<[String; 6]> {
        Ok([
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.filename.clone(),
            self.label.clone(),
            format!("{:.1}%", self.confidence),
            self.top_summary(),
            serde_json::to_string(&self.probabilities)?,
        ])
    }
}

/// Ordered log of the images classified in one session.
///
/// Callers sharing one log across threads wrap it in a mutex.
#[derive(Debug, Clone, Default)]
pub struct SessionResults {
    results: Vec<SessionResult>,
}

impl SessionResults {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a classification made now.
    pub fn record(&mut self, filename: impl Into<String>, prediction: &Prediction) {
        self.record_at(filename, prediction, Local::now().naive_local());
    }

    /// Log a classification made at `timestamp`.
    pub fn record_at(
        &mut self,
        filename: impl Into<String>,
        prediction: &Prediction,
        timestamp: NaiveDateTime,
    ) {
        self.results.push(SessionResult {
            timestamp,
            filename: filename.into(),
            label: prediction.label.clone(),
            confidence: prediction.confidence,
            probabilities: prediction.probabilities.clone(),
        });
    }

    /// Logged results, oldest first.
    pub fn results(&self) -> &[SessionResult] {
        &self.results
    }

    /// Number of logged results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Forget every logged result.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Write the log as CSV, header included.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(UTF8_BOM)?;
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(writer);

        csv_writer.write_record(CSV_HEADER)?;
        for result in &self.results {
            csv_writer.write_record(result.to_row()?)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the log to `session_results_<YYYYmmdd_HHMMSS>.csv` inside `dir`.
    ///
    /// Returns `None` without touching the file system when the log is empty.
    pub fn export_csv(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        if self.results.is_empty() {
            return Ok(None);
        }
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "session_results_{}.csv",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        self.write_csv(File::create(&path)?)?;
        Ok(Some(path))
    }
}
