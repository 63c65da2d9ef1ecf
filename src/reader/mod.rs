//! Module for loading student tables from delimited text and Parquet files.

use std::fs::{self, File};
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, Int64Array};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::dataset::Dataset;
use crate::error::{Result, RiskError};
use crate::utils::{log_operation_complete, log_operation_start};

/// Default number of rows per Arrow batch while reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Identifier columns recognised by [`add_student_ids`]
pub const ID_COLUMNS: [&str; 3] = ["student_id", "roll_number", "id"];

/// Options for reading delimited files
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Number of records inspected to infer column types (`None` reads all)
    pub max_infer_records: Option<usize>,
    /// Rows per batch while reading
    pub batch_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            max_infer_records: Some(1000),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        RiskError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open file {}: {e}", path.display()),
        ))
    })
}

/// Read a delimited file with a header row into a dataset
///
/// # Arguments
/// * `path` - Path to the file
/// * `options` - Delimiter and type inference settings
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed
pub fn read_csv(path: &Path, options: &LoaderOptions) -> Result<Dataset> {
    let start = Instant::now();
    log_operation_start("Reading delimited file", &path.display());

    let mut file = open_file(path)?;
    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter);
    let (schema, _) = format.infer_schema(&mut file, options.max_infer_records)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .with_batch_size(options.batch_size)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;

    let dataset = Dataset::from_batches(schema, &batches)?;
    log_operation_complete("read", &path.display(), dataset.num_rows(), Some(start.elapsed()));
    Ok(dataset)
}

/// Read every record batch of a Parquet file into a dataset
///
/// # Errors
/// Returns an error if the file cannot be opened or is not valid Parquet
pub fn read_parquet(path: &Path) -> Result<Dataset> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", &path.display());

    let file = open_file(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<RecordBatch>, _>>()?;

    let dataset = Dataset::from_batches(schema, &batches)?;
    log_operation_complete("read", &path.display(), dataset.num_rows(), Some(start.elapsed()));
    Ok(dataset)
}

/// Load a table, choosing the reader from the file extension
///
/// `csv` and `tsv` use the delimited reader (`tsv` forces a tab delimiter);
/// `parquet` uses the Parquet reader.
///
/// # Errors
/// Returns [`RiskError::UnsupportedFormat`] for any other extension
pub fn load_table(path: &Path, options: &LoaderOptions) -> Result<Dataset> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv(path, options),
        "tsv" => read_csv(
            path,
            &LoaderOptions {
                delimiter: b'\t',
                ..options.clone()
            },
        ),
        "parquet" => read_parquet(path),
        other => Err(RiskError::UnsupportedFormat(format!(
            "{} (extension '{other}')",
            path.display()
        ))),
    }
}

/// Insert a `student_id` column numbered from 1 when no identifier exists
///
/// The new column becomes the first column. Datasets that already carry
/// `student_id`, `roll_number` or `id` are returned unchanged.
pub fn add_student_ids(dataset: Dataset) -> Result<Dataset> {
    if ID_COLUMNS.iter().any(|name| dataset.has_column(name)) {
        return Ok(dataset);
    }
    let rows = i64::try_from(dataset.num_rows())
        .map_err(|_| RiskError::InvalidInput("Too many rows to number".to_string()))?;
    let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(1..=rows));
    dataset.insert_column(0, "student_id", ids)
}

/// Write a record batch as CSV with a header row, creating parent directories
///
/// # Errors
/// Returns an error if the file cannot be created or a column type has no
/// CSV representation
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    log_operation_complete("wrote", &path.display(), batch.num_rows(), None);
    Ok(())
}
