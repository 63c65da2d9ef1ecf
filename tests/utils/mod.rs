use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use risk_pipeline::config::ForestConfig;
use risk_pipeline::{Dataset, ModelKind, PipelineConfig};

/// Number of students in the generated class table
pub const CLASS_SIZE: usize = 24;

/// Header of the generated class table
pub const CLASS_HEADER: &str = "name,gender,math_marks,science_marks,english_score,attendance,\
total_classes,assignments_completed,total_assignments,previous_marks,StudyHoursPerWeek";

/// One CSV line for student `i`
///
/// Marks rise with `i`, so the first students fall below the default
/// threshold. A few cells are blank to exercise imputation, and student 7 has
/// zero total classes.
#[must_use]
pub fn class_row(i: usize) -> String {
    let math = 25 + 3 * i;
    let science = if i == 5 { String::new() } else { (math - 4).to_string() };
    let gender = match i {
        3 => "",
        _ if i % 2 == 0 => "M",
        _ => "F",
    };
    let total_classes = if i == 7 { 0 } else { 40 };
    format!(
        "Student {i},{gender},{math},{science},{},{},{total_classes},{},10,{},{}",
        math + 2,
        16 + i,
        i % 10,
        math - 3,
        2 + i / 2
    )
}

/// The full generated class table as CSV text
#[must_use]
pub fn class_csv() -> String {
    let mut csv = String::from(CLASS_HEADER);
    csv.push('\n');
    for i in 0..CLASS_SIZE {
        let _ = writeln!(csv, "{}", class_row(i));
    }
    csv
}

/// Write `contents` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// Write the class table as `class.csv` inside `dir`
pub fn write_class_csv(dir: &Path) -> PathBuf {
    write_file(dir, "class.csv", &class_csv())
}

/// The two-subject example with one passing and one failing student
#[must_use]
pub fn two_student_marks() -> Dataset {
    Dataset::builder()
        .numbers("math_marks", &[85.0, 40.0])
        .numbers("science_marks", &[90.0, 35.0])
        .build()
        .expect("valid dataset")
}

/// Pipeline configuration with a small forest so tests stay fast
#[must_use]
pub fn test_config(kind: ModelKind) -> PipelineConfig {
    PipelineConfig {
        model_kind: kind,
        forest: ForestConfig {
            n_estimators: 12,
            ..ForestConfig::default()
        },
        ..PipelineConfig::default()
    }
}
