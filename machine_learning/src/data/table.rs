use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dataset::InMemoryDataset;
use crate::{MlErr, Result};

/// How to read a labelled table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// The column holding the class label, every other column is a feature.
    pub label_column: usize,
    /// Shift the labels so that the smallest one becomes 0 (e.g. for 1-based classes).
    pub rebase_labels: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            label_column: 0,
            rebase_labels: true,
        }
    }
}

/// Loads a comma separated table from a file.
pub fn load_csv<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<InMemoryDataset> {
    let path = path.as_ref();
    let dataset = read_csv(File::open(path)?, options)?;
    info!(
        "loaded {} rows of {} features from {}",
        dataset.labels().len(),
        dataset.features().ncols(),
        path.display()
    );

    Ok(dataset)
}

/// Reads a comma separated table of numbers, quoted or not. A first record that doesn't parse is
/// taken as a header and skipped, blank lines are ignored.
pub fn read_csv<R: Read>(reader: R, options: CsvOptions) -> Result<InMemoryDataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut width = None;
    let mut features = Vec::new();
    let mut labels = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(i as u64 + 1, |pos| pos.line());

        let values = match parse_record(&record) {
            Ok(values) => values,
            Err(_) if i == 0 => {
                debug!("skipping header: {}", record.iter().collect::<Vec<_>>().join(","));
                continue;
            }
            Err(reason) => {
                return Err(MlErr::invalid_format("csv", format!("line {line}: {reason}")));
            }
        };

        let row_width = *width.get_or_insert(values.len());
        if options.label_column >= row_width {
            return Err(MlErr::ShapeMismatch {
                what: "label column",
                got: options.label_column,
                expected: row_width - 1,
            });
        }

        labels.push(parse_label(values[options.label_column], line)?);
        features.extend(
            values
                .iter()
                .enumerate()
                .filter(|&(col, _)| col != options.label_column)
                .map(|(_, &v)| v),
        );
    }

    let Some(width) = width else {
        return Err(MlErr::EmptyDataset { what: "csv table" });
    };

    if width < 2 {
        return Err(MlErr::invalid_format("csv", "rows need a label and at least one feature"));
    }

    if options.rebase_labels {
        let min = labels.iter().copied().min().unwrap_or_default();
        labels.iter_mut().for_each(|label| *label -= min);
    }

    InMemoryDataset::from_vec(features, width - 1, labels)
}

fn parse_record(record: &StringRecord) -> std::result::Result<Vec<f32>, String> {
    record
        .iter()
        .map(|field| {
            field
                .parse::<f32>()
                .map_err(|e| format!("can't parse '{field}': {e}"))
        })
        .collect()
}

fn csv_err(e: csv::Error) -> MlErr {
    if !e.is_io_error() {
        return MlErr::invalid_format("csv", e.to_string());
    }

    match e.into_kind() {
        csv::ErrorKind::Io(e) => MlErr::Io(e),
        kind => MlErr::invalid_format("csv", format!("{kind:?}")),
    }
}

fn parse_label(value: f32, line: u64) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(MlErr::invalid_format(
            "csv",
            format!("line {line}: label {value} is not a class index"),
        ));
    }

    Ok(value as usize)
}
