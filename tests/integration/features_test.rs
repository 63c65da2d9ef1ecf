use anyhow::Result;
use risk_pipeline::config::TARGET_COLUMN;
use risk_pipeline::features::{
    ASSIGNMENT_COMPLETION_RATE, ATTENDANCE_RATE, AVERAGE_MARKS, DERIVED_COLUMNS, MARKS_IMPROVEMENT,
    MARKS_STD,
};
use risk_pipeline::{
    DataCleaner, FeatureEngineer, LabelOutcome, LoaderOptions, MarkColumns, RiskLabeler, read_csv,
};

use crate::utils::{CLASS_SIZE, two_student_marks, write_class_csv};

/// Deriving twice leaves the columns and values of the first pass untouched
#[test]
fn test_derive_is_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = read_csv(&write_class_csv(dir.path()), &LoaderOptions::default())?;
    let cleaned = DataCleaner::new().fit_transform(raw)?;

    let engineer = FeatureEngineer::new();
    let once = engineer.derive(cleaned)?;
    let twice = engineer.derive(once.clone())?;

    assert_eq!(once.column_names(), twice.column_names());
    assert_eq!(once.batch(), twice.batch());
    for name in DERIVED_COLUMNS {
        assert!(once.has_column(name), "{name} should be derived");
    }
    Ok(())
}

/// The engineered columns of the class table
#[test]
fn test_class_table_features() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = read_csv(&write_class_csv(dir.path()), &LoaderOptions::default())?;
    let cleaned = DataCleaner::new().fit_transform(raw)?;

    let marks = MarkColumns::detect(&cleaned);
    assert_eq!(
        marks.names(),
        ["math_marks", "science_marks", "english_score", "previous_marks"]
    );

    let (engineered, report) = FeatureEngineer::new().derive_with_report(cleaned)?;
    assert!(report.skipped.is_empty());
    assert_eq!(report.derived.len(), DERIVED_COLUMNS.len());

    // Student 0: math 25, science 21, english 27, previous 22
    let average = engineered.numeric_values(AVERAGE_MARKS)?;
    assert_eq!(average[0], Some(23.75));
    let improvement = engineered.numeric_values(MARKS_IMPROVEMENT)?;
    assert_eq!(improvement[0], Some(1.75));

    // Student 7 has zero total classes
    let attendance = engineered.numeric_values(ATTENDANCE_RATE)?;
    assert_eq!(attendance[7], Some(0.0));
    assert_eq!(attendance[0], Some(40.0));

    let completion = engineered.numeric_values(ASSIGNMENT_COMPLETION_RATE)?;
    assert_eq!(completion[3], Some(30.0));
    assert_eq!(engineered.num_rows(), CLASS_SIZE);
    assert!(engineered.numeric_values(MARKS_STD)?.iter().all(Option::is_some));
    Ok(())
}

/// Two students, threshold 50: one passes and one is at risk
#[test]
fn test_label_two_students() -> Result<()> {
    let engineered = FeatureEngineer::new().derive(two_student_marks())?;
    assert_eq!(
        engineered.numeric_values(AVERAGE_MARKS)?,
        vec![Some(87.5), Some(37.5)]
    );
    let (labelled, outcome) = RiskLabeler::new(50.0).label(engineered)?;
    assert_eq!(outcome, LabelOutcome::Labelled { at_risk: 1, total: 2 });
    assert_eq!(
        labelled.numeric_values(TARGET_COLUMN)?,
        vec![Some(0.0), Some(1.0)]
    );
    Ok(())
}
