//! Seed records read from the input CSV

use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::Arc;

/// One input row as header/value pairs, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRecord {
    columns: Vec<(String, String)>,
}

impl InputRecord {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// Value of a column, if the row has it
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A row that names a website
#[derive(Debug, Clone)]
pub struct InputRow {
    pub record: Arc<InputRecord>,

    /// The raw website cell, trimmed
    pub website: String,
}

/// Reads every row with a non-empty website cell
///
/// # Arguments
///
/// * `path` - CSV file with a header row
/// * `website_column` - Header of the column holding the website
///
/// # Returns
///
/// * `Ok(Vec<InputRow>)` - Rows in file order; rows with an empty cell are skipped
/// * `Err(HarvestError)` - The file cannot be read or the column is missing
pub fn read_input(path: &Path, website_column: &str) -> Result<Vec<InputRow>, HarvestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let website_index = headers
        .iter()
        .position(|h| h == website_column)
        .ok_or_else(|| ConfigError::MissingColumn {
            column: website_column.to_string(),
            path: path.display().to_string(),
        })?;

    let mut rows = Vec::new();
    let mut empty = 0usize;
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping malformed input row {}: {}", line + 2, e);
                continue;
            }
        };

        let website = record.get(website_index).unwrap_or_default().trim().to_string();
        if website.is_empty() {
            empty += 1;
            continue;
        }

        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(InputRow {
            record: Arc::new(InputRecord::new(columns)),
            website,
        });
    }

    if empty > 0 {
        tracing::debug!("Skipped {} input row(s) without a website", empty);
    }
    tracing::info!("Read {} seed row(s) from {}", rows.len(), path.display());
    Ok(rows)
}
