use std::fs::File;

use anyhow::Result;
use parquet::arrow::ArrowWriter;
use risk_pipeline::{LoaderOptions, RiskError, add_student_ids, load_table, read_csv, write_csv};

use crate::utils::{CLASS_SIZE, class_csv, write_class_csv, write_file};

/// The generated class table loads with inferred numeric and text columns
#[test]
fn test_load_class_csv() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_class_csv(dir.path());

    let dataset = load_table(&path, &LoaderOptions::default())?;
    assert_eq!(dataset.num_rows(), CLASS_SIZE);
    assert_eq!(dataset.num_columns(), 11);
    assert!(dataset.is_numeric_column("math_marks"));
    assert!(!dataset.is_numeric_column("gender"));
    assert_eq!(dataset.numeric_values("science_marks")?[5], None);
    Ok(())
}

/// Tab separated files are read from their extension
#[test]
fn test_load_tsv() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "class.tsv", &class_csv().replace(',', "\t"));
    let dataset = load_table(&path, &LoaderOptions::default())?;
    assert_eq!(dataset.num_rows(), CLASS_SIZE);
    assert_eq!(dataset.column_names()[0], "name");
    Ok(())
}

/// Parquet round trip through the loader
#[test]
fn test_load_parquet() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = write_class_csv(dir.path());
    let dataset = read_csv(&csv_path, &LoaderOptions::default())?;

    let parquet_path = dir.path().join("class.parquet");
    let mut writer = ArrowWriter::try_new(
        File::create(&parquet_path)?,
        dataset.batch().schema(),
        None,
    )?;
    writer.write(dataset.batch())?;
    writer.close()?;

    let loaded = load_table(&parquet_path, &LoaderOptions::default())?;
    assert_eq!(loaded.num_rows(), dataset.num_rows());
    assert_eq!(loaded.column_names(), dataset.column_names());
    assert_eq!(
        loaded.numeric_values("math_marks")?,
        dataset.numeric_values("math_marks")?
    );
    Ok(())
}

/// Missing files report the path
#[test]
fn test_missing_file_is_io_error() {
    let err = load_table(
        std::path::Path::new("/nonexistent/class.csv"),
        &LoaderOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RiskError::Io(_)));
    assert!(err.to_string().contains("/nonexistent/class.csv"));
}

/// Identifiers are only generated when no id column exists
#[test]
fn test_student_ids() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_class_csv(dir.path());
    let dataset = add_student_ids(read_csv(&path, &LoaderOptions::default())?)?;
    assert_eq!(dataset.column_names()[0], "student_id");
    assert_eq!(dataset.numeric_values("student_id")?[0], Some(1.0));
    assert_eq!(
        dataset.numeric_values("student_id")?[CLASS_SIZE - 1],
        Some(CLASS_SIZE as f64)
    );

    let with_roll = write_file(dir.path(), "roll.csv", "roll_number,math_marks\nR1,50\nR2,60\n");
    let dataset = add_student_ids(read_csv(&with_roll, &LoaderOptions::default())?)?;
    assert_eq!(dataset.column_names(), vec!["roll_number", "math_marks"]);
    Ok(())
}

/// Results written as CSV can be read back
#[test]
fn test_write_csv_creates_directories() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_class_csv(dir.path());
    let dataset = read_csv(&source, &LoaderOptions::default())?;

    let out = dir.path().join("nested/out/results.csv");
    write_csv(&out, dataset.batch())?;
    let reread = read_csv(&out, &LoaderOptions::default())?;
    assert_eq!(reread.num_rows(), CLASS_SIZE);
    Ok(())
}
