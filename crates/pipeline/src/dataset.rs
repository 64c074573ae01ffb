//! In-memory tabular dataset loaded from CSV.

use std::path::Path;

use crate::computation::ComputationError;

/// A CSV file held as strings. Cells are trimmed; an empty cell is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self, ComputationError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ComputationError::new(format!("Could not read CSV: {e}")))?;
        Self::from_reader(reader)
    }

    pub fn from_csv_str(data: &str) -> Result<Self, ComputationError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, ComputationError> {
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ComputationError::new(format!("Could not parse CSV header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                ComputationError::new(format!("Could not parse CSV row {}: {e}", line + 1))
            })?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            // Short rows are padded as missing cells.
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ComputationError::new("CSV file is empty."));
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, index: usize) -> Vec<&str> {
        self.rows.iter().map(|row| row[index].as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}
