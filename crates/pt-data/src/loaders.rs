use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use pt_types::{DataError, Dataset, PtResult, Sample, FEATURE_COLUMNS, FEATURE_COUNT, LABEL_COLUMN};

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    features: [usize; FEATURE_COUNT],
    label: Option<usize>,
}

/// Loader for delimited iris tables with a header row.
///
/// Columns are located by header name, so column order in the file does not
/// matter. The label column is optional: tables without it load as
/// unlabelled samples.
#[derive(Debug, Clone)]
pub struct IrisCsvLoader {
    delimiter: u8,
}

impl IrisCsvLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Load samples from a file on disk
    pub fn load<P: AsRef<Path>>(&self, file_path: P) -> PtResult<Dataset> {
        let path = file_path.as_ref();
        tracing::info!("Loading CSV data from: {}", path.display());

        if !path.exists() {
            return Err(DataError::SourceNotFound(path.display().to_string()).into());
        }

        let file = File::open(path)?;
        let dataset = self.read(self.builder().from_reader(file))?;
        tracing::info!("Loaded {} samples from CSV file: {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// Parse samples from an in-memory table
    pub fn parse_str(&self, text: &str) -> PtResult<Dataset> {
        self.read(self.builder().from_reader(text.as_bytes()))
    }

    fn builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(true)
            .delimiter(self.delimiter)
            .quoting(true)
            .flexible(true)
            .trim(Trim::All);
        builder
    }

    fn read<R: io::Read>(&self, mut rdr: csv::Reader<R>) -> PtResult<Dataset> {
        let headers = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();
        tracing::debug!("CSV headers: {:?}", headers);

        let columns = Self::detect_columns(&headers)?;
        let mut samples = Vec::new();

        for (line_num, result) in rdr.records().enumerate() {
            // header occupies line 1
            let line = line_num + 2;
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {}", line, e),
            })?;

            match Self::parse_record(&record, &columns) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!("Skipping invalid record at line {}: {}", line, e);
                    continue;
                }
            }
        }

        if samples.is_empty() {
            return Err(DataError::InsufficientData {
                message: "no valid rows in table".to_string(),
            }
            .into());
        }

        Ok(Dataset::new(samples))
    }

    fn detect_columns(headers: &StringRecord) -> PtResult<ColumnMap> {
        let mut features = [None; FEATURE_COUNT];
        let mut label = None;

        for (i, header) in headers.iter().enumerate() {
            let header_lower = header.to_lowercase();
            if let Some(pos) = FEATURE_COLUMNS.iter().position(|c| *c == header_lower) {
                features[pos] = Some(i);
            } else if header_lower == LABEL_COLUMN.to_lowercase() {
                label = Some(i);
            }
        }

        let mut resolved = [0usize; FEATURE_COUNT];
        for (slot, (found, name)) in resolved.iter_mut().zip(features.iter().zip(FEATURE_COLUMNS)) {
            *slot = found.ok_or_else(|| DataError::MissingColumn {
                column: name.to_string(),
            })?;
        }

        if label.is_none() {
            tracing::warn!("No {} column found; samples will be unlabelled", LABEL_COLUMN);
        }

        Ok(ColumnMap {
            features: resolved,
            label,
        })
    }

    fn parse_record(record: &StringRecord, columns: &ColumnMap) -> PtResult<Sample> {
        let mut values = [0f32; FEATURE_COUNT];
        for (value, (&idx, name)) in values
            .iter_mut()
            .zip(columns.features.iter().zip(FEATURE_COLUMNS))
        {
            let raw = record.get(idx).ok_or_else(|| DataError::ParseError {
                message: format!("record has {} columns, missing {}", record.len(), name),
            })?;
            *value = raw.parse::<f32>().map_err(|e| DataError::ParseError {
                message: format!("invalid {} value '{}': {}", name, raw, e),
            })?;
        }

        let label = columns
            .label
            .and_then(|idx| record.get(idx))
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);

        let sample = Sample {
            sepal_length: values[0],
            sepal_width: values[1],
            petal_length: values[2],
            petal_width: values[3],
            label,
        };
        if !sample.is_finite() {
            return Err(DataError::ParseError {
                message: format!("non-finite feature value in {}", sample),
            }
            .into());
        }
        Ok(sample)
    }
}

impl Default for IrisCsvLoader {
    fn default() -> Self {
        Self::new()
    }
}
