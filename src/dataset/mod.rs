//! Columnar dataset shared by every pipeline stage.
//!
//! A [`Dataset`] wraps a single Arrow [`RecordBatch`]. Stages consume a
//! dataset and return a new one, appending or replacing columns while the
//! order of untouched columns stays stable.

pub mod record;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::kernels::cast;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{Result, RiskError};

pub use record::{StudentRecord, Value};

/// Whether an Arrow type is read as a numeric feature
#[must_use]
pub fn is_numeric_type(data_type: &DataType) -> bool {
    data_type.is_numeric() || matches!(data_type, DataType::Boolean)
}

/// An ordered set of student rows with a stable column schema
#[derive(Debug, Clone)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch
    #[must_use]
    pub const fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenate batches that share `schema` into one dataset
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        let batch = arrow::compute::concat_batches(&schema, batches)?;
        Ok(Self { batch })
    }

    /// A dataset with no rows and no columns
    #[must_use]
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    /// Start building a dataset column by column
    #[must_use]
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// The underlying record batch
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consume the dataset, returning the record batch
    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether a column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    /// The raw Arrow array for a column
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// The Arrow type of a column
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.column(name).map(|array| array.data_type().clone())
    }

    /// Whether a column exists and is read as numeric
    #[must_use]
    pub fn is_numeric_column(&self, name: &str) -> bool {
        self.column(name)
            .is_some_and(|array| is_numeric_type(array.data_type()))
    }

    /// Read a numeric column as `f64`, with nulls and NaN as `None`
    ///
    /// # Errors
    /// Returns [`RiskError::Schema`] if the column is absent or not numeric
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let array = self.require_column(name)?;
        if !is_numeric_type(array.data_type()) {
            return Err(RiskError::Schema(format!(
                "Column {name} is {} and cannot be read as numeric",
                array.data_type()
            )));
        }
        float_values(array)
    }

    /// Read a column as `f64` whatever type it was loaded with
    ///
    /// Text cells are parsed after trimming, and blank cells count as
    /// missing. A column of type `Null` is entirely missing.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidData`] for a text cell that is not a number
    pub fn parse_numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let array = self.require_column(name)?;
        if is_numeric_type(array.data_type()) || matches!(array.data_type(), DataType::Null) {
            return float_values(array);
        }
        string_values(array)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| match cell.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => text
                    .parse::<f64>()
                    .map(|value| Some(value).filter(|v| !v.is_nan()))
                    .map_err(|_| {
                        RiskError::InvalidData(format!(
                            "Column {name} row {row}: {text:?} is not a number"
                        ))
                    }),
            })
            .collect()
    }

    /// Read any column as text, with nulls as `None`
    ///
    /// # Errors
    /// Returns an error if the column is absent or has no string form
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let array = self.require_column(name)?;
        string_values(array)
    }

    /// Append a column, or replace it in place when the name already exists
    ///
    /// # Errors
    /// Returns an error if the array length differs from the row count
    pub fn with_column(self, name: &str, array: ArrayRef) -> Result<Self> {
        if array.len() != self.num_rows() && self.num_columns() > 0 {
            return Err(RiskError::InvalidInput(format!(
                "Column {name} has {} values but the dataset has {} rows",
                array.len(),
                self.num_rows()
            )));
        }
        let rows = array.len();
        let schema = self.batch.schema();
        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));

        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                columns[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                columns.push(array);
            }
        }

        build_dataset(fields, columns, rows)
    }

    /// Append or replace a `Float64` column
    pub fn with_numeric_column(self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.with_column(name, Arc::new(Float64Array::from(values)))
    }

    /// Insert a new column at `index`
    ///
    /// # Errors
    /// Returns an error if the column already exists, the index is out of
    /// range, or the length differs from the row count
    pub fn insert_column(self, index: usize, name: &str, array: ArrayRef) -> Result<Self> {
        if self.has_column(name) {
            return Err(RiskError::InvalidInput(format!("Column {name} already exists")));
        }
        if index > self.num_columns() {
            return Err(RiskError::InvalidInput(format!(
                "Cannot insert column {name} at {index}; dataset has {} columns",
                self.num_columns()
            )));
        }
        if array.len() != self.num_rows() && self.num_columns() > 0 {
            return Err(RiskError::InvalidInput(format!(
                "Column {name} has {} values but the dataset has {} rows",
                array.len(),
                self.num_rows()
            )));
        }
        let rows = array.len();
        let mut fields: Vec<FieldRef> = self.batch.schema().fields().iter().cloned().collect();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        fields.insert(index, Arc::new(Field::new(name, array.data_type().clone(), true)));
        columns.insert(index, array);
        build_dataset(fields, columns, rows)
    }

    /// Remove the named columns; names that do not exist are ignored
    pub fn drop_columns(self, names: &[&str]) -> Result<Self> {
        let rows = self.num_rows();
        let schema = self.batch.schema();
        let (fields, columns): (Vec<FieldRef>, Vec<ArrayRef>) = schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .filter(|(field, _)| !names.contains(&field.name().as_str()))
            .map(|(field, column)| (Arc::clone(field), Arc::clone(column)))
            .unzip();
        build_dataset(fields, columns, rows)
    }

    /// Materialise one row
    ///
    /// # Errors
    /// Returns an error if `row` is out of range
    pub fn record(&self, row: usize) -> Result<StudentRecord> {
        if row >= self.num_rows() {
            return Err(RiskError::InvalidInput(format!(
                "Row {row} is out of range for {} rows",
                self.num_rows()
            )));
        }
        let mut record = StudentRecord::new();
        let schema = self.batch.schema();
        for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
            let cell = column.slice(row, 1);
            let value = if is_numeric_type(field.data_type()) {
                float_values(&cell)?[0].map_or(Value::Missing, Value::Number)
            } else {
                string_values(&cell)?[0]
                    .clone()
                    .map_or(Value::Missing, Value::Text)
            };
            record.insert(field.name().as_str(), value);
        }
        Ok(record)
    }

    /// Materialise every row, in order
    pub fn records(&self) -> Result<Vec<StudentRecord>> {
        let columns = self
            .column_names()
            .into_iter()
            .map(|name| {
                let cells = if self.is_numeric_column(&name) {
                    self.numeric_values(&name)?
                        .into_iter()
                        .map(Value::from)
                        .collect::<Vec<_>>()
                } else {
                    self.text_values(&name)?
                        .into_iter()
                        .map(|cell| cell.map_or(Value::Missing, Value::Text))
                        .collect()
                };
                Ok((name, cells))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((0..self.num_rows())
            .map(|row| {
                StudentRecord::from_pairs(
                    columns
                        .iter()
                        .map(|(name, cells)| (name.clone(), cells[row].clone())),
                )
            })
            .collect())
    }

    fn require_column(&self, name: &str) -> Result<&ArrayRef> {
        self.column(name)
            .ok_or_else(|| RiskError::Schema(format!("Column {name} not found in dataset")))
    }
}

fn build_dataset(fields: Vec<FieldRef>, columns: Vec<ArrayRef>, rows: usize) -> Result<Dataset> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;
    Ok(Dataset { batch })
}

fn float_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let casted = cast::cast(array, &DataType::Float64)?;
    let floats = casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| RiskError::Conversion("Expected Float64Array after cast".to_string()))?;
    Ok(floats
        .iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}

fn string_values(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    let casted = cast::cast(array, &DataType::Utf8)?;
    let strings = casted
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RiskError::Conversion("Expected StringArray after cast".to_string()))?;
    Ok(strings.iter().map(|value| value.map(str::to_string)).collect())
}

/// Column-by-column constructor for datasets, mostly used by callers that
/// already hold values in memory
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
}

impl DatasetBuilder {
    /// Add a numeric column with optional missing cells
    #[must_use]
    pub fn numeric(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        self.fields
            .push(Arc::new(Field::new(name, DataType::Float64, true)));
        self.columns.push(Arc::new(Float64Array::from(values)));
        self
    }

    /// Add a fully populated numeric column
    #[must_use]
    pub fn numbers(self, name: &str, values: &[f64]) -> Self {
        self.numeric(name, values.iter().copied().map(Some).collect())
    }

    /// Add a text column with optional missing cells
    #[must_use]
    pub fn text(mut self, name: &str, values: Vec<Option<&str>>) -> Self {
        self.fields.push(Arc::new(Field::new(name, DataType::Utf8, true)));
        self.columns.push(Arc::new(StringArray::from(values)));
        self
    }

    /// Add a fully populated text column
    #[must_use]
    pub fn strings(self, name: &str, values: &[&str]) -> Self {
        self.text(name, values.iter().copied().map(Some).collect())
    }

    /// Validate column lengths and build the dataset
    ///
    /// # Errors
    /// Returns an error if columns differ in length or a name repeats
    pub fn build(self) -> Result<Dataset> {
        let rows = self.columns.first().map_or(0, |c| c.len());
        if let Some((field, column)) = self
            .fields
            .iter()
            .zip(&self.columns)
            .find(|(_, column)| column.len() != rows)
        {
            return Err(RiskError::InvalidInput(format!(
                "Column {} has {} values, expected {rows}",
                field.name(),
                column.len()
            )));
        }
        for (idx, field) in self.fields.iter().enumerate() {
            if self.fields[..idx].iter().any(|f| f.name() == field.name()) {
                return Err(RiskError::InvalidInput(format!(
                    "Column {} appears more than once",
                    field.name()
                )));
            }
        }
        build_dataset(self.fields, self.columns, rows)
    }
}
