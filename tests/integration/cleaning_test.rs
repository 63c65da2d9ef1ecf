use anyhow::Result;
use arrow::datatypes::DataType;
use risk_pipeline::cleaning::UNKNOWN_CODE;
use risk_pipeline::{
    DataCleaner, Dataset, ImputationSource, LoaderOptions, RiskError, UnseenCategoryPolicy,
    read_csv,
};

use crate::utils::{write_class_csv, write_file};

fn inference_batch() -> Result<Dataset> {
    Ok(Dataset::builder()
        .strings("name", &["New A", "New B", "New C"])
        .text("gender", vec![Some("F"), Some("X"), None])
        .numeric("math_marks", vec![None, Some(10.0), Some(20.0)])
        .build()?)
}

/// Every column is Float64 without nulls after cleaning
#[test]
fn test_fit_transform_output_is_dense_float() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = read_csv(&write_class_csv(dir.path()), &LoaderOptions::default())?;
    let mut cleaner = DataCleaner::new();
    let cleaned = cleaner.fit_transform(raw.clone())?;

    assert_eq!(cleaned.column_names(), raw.column_names());
    for name in cleaned.column_names() {
        assert_eq!(cleaned.column_type(&name), Some(DataType::Float64), "{name}");
        assert!(cleaned.numeric_values(&name)?.iter().all(Option::is_some), "{name}");
    }
    assert!(cleaner.encoding_state().contains("gender"));
    assert!(cleaner.encoding_state().contains("name"));
    Ok(())
}

/// Codes of seen values are stable and unseen values use the reserved code
#[test]
fn test_transform_keeps_codes_and_flags_unseen() -> Result<()> {
    let training = Dataset::builder()
        .strings("name", &["A", "B", "C", "D"])
        .strings("gender", &["M", "F", "F", "M"])
        .numbers("math_marks", &[40.0, 60.0, 80.0, 100.0])
        .build()?;
    let mut cleaner = DataCleaner::new();
    let fitted = cleaner.fit_transform(training)?;
    assert_eq!(
        fitted.numeric_values("gender")?,
        vec![Some(0.0), Some(1.0), Some(1.0), Some(0.0)]
    );

    let cleaned = cleaner.transform(inference_batch()?)?;
    // Missing gender is filled with the training mode (F) before encoding
    assert_eq!(
        cleaned.numeric_values("gender")?,
        vec![Some(1.0), Some(UNKNOWN_CODE as f64), Some(1.0)]
    );
    // Training median of 40, 60, 80, 100
    assert_eq!(cleaned.numeric_values("math_marks")?[0], Some(70.0));
    Ok(())
}

/// Batch statistics replace training statistics when requested
#[test]
fn test_current_batch_imputation() -> Result<()> {
    let training = Dataset::builder()
        .strings("gender", &["M", "F"])
        .numbers("math_marks", &[40.0, 100.0])
        .build()?;
    let mut cleaner = DataCleaner::new().with_imputation_source(ImputationSource::CurrentBatch);
    cleaner.fit_transform(training)?;

    let cleaned = cleaner.transform(inference_batch()?.drop_columns(&["name"])?)?;
    assert_eq!(cleaned.numeric_values("math_marks")?[0], Some(15.0));
    Ok(())
}

/// The reject policy surfaces the offending value
#[test]
fn test_reject_unseen_category() -> Result<()> {
    let training = Dataset::builder()
        .strings("gender", &["M", "F"])
        .numbers("math_marks", &[40.0, 100.0])
        .build()?;
    let mut cleaner = DataCleaner::new().with_unseen_policy(UnseenCategoryPolicy::Reject);
    cleaner.fit_transform(training)?;

    let err = cleaner
        .transform(inference_batch()?.drop_columns(&["name"])?)
        .unwrap_err();
    assert!(matches!(err, RiskError::UnseenCategory { ref value, .. } if value == "X"));
    Ok(())
}

/// Cleaner state written to disk restores identical behaviour
#[test]
fn test_state_round_trip_cleans_identically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = read_csv(&write_class_csv(dir.path()), &LoaderOptions::default())?;
    let mut cleaner = DataCleaner::new();
    cleaner.clean_pipeline(raw.clone(), true)?;

    let path = dir.path().join("state/cleaner.json");
    cleaner.save_state(&path)?;
    let mut restored = DataCleaner::new();
    restored.load_state(&path)?;

    let a = cleaner.normalize(cleaner.transform(raw.clone())?)?;
    let b = restored.normalize(restored.transform(raw)?)?;
    assert_eq!(a.batch(), b.batch());
    Ok(())
}

/// Unfitted cleaners refuse to transform or save
#[test]
fn test_unfitted_cleaner() -> Result<()> {
    let cleaner = DataCleaner::new();
    assert!(matches!(
        cleaner.transform(inference_batch()?),
        Err(RiskError::NotFitted)
    ));
    let dir = tempfile::tempdir()?;
    assert!(matches!(
        cleaner.save_state(&dir.path().join("state.json")),
        Err(RiskError::NotFitted)
    ));
    Ok(())
}

fn fitted_on_marks() -> Result<DataCleaner> {
    let training = Dataset::builder()
        .numbers("math_marks", &[40.0, 60.0, 80.0, 100.0])
        .numbers("science_marks", &[40.0, 60.0, 80.0, 100.0])
        .build()?;
    let mut cleaner = DataCleaner::new();
    cleaner.fit_transform(training)?;
    Ok(cleaner)
}

/// A one-row file with a blank mark is imputed with the training median
#[test]
fn test_blank_mark_in_single_row_file_is_imputed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cleaner = fitted_on_marks()?;
    let path = write_file(dir.path(), "one.csv", "math_marks,science_marks\n90,\n");
    let batch = read_csv(&path, &LoaderOptions::default())?;

    let cleaned = cleaner.transform(batch)?;
    assert_eq!(cleaned.column_type("science_marks"), Some(DataType::Float64));
    assert_eq!(cleaned.numeric_values("science_marks")?, vec![Some(70.0)]);
    assert_eq!(cleaned.numeric_values("math_marks")?, vec![Some(90.0)]);
    Ok(())
}

/// Text in a column that was numeric at fit time is a data error
#[test]
fn test_text_cell_in_numeric_column_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cleaner = fitted_on_marks()?;
    let path = write_file(
        dir.path(),
        "stray.csv",
        "math_marks,science_marks\n90,N/A\n55,61\n",
    );
    let batch = read_csv(&path, &LoaderOptions::default())?;

    let err = cleaner.transform(batch).unwrap_err();
    assert!(matches!(err, RiskError::InvalidData(ref msg) if msg.contains("science_marks")));
    Ok(())
}
