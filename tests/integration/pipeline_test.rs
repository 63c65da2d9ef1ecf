use anyhow::Result;
use risk_pipeline::explain::RiskLevel;
use risk_pipeline::pipeline::{CLEANER_STATE_FILE, model_path};
use risk_pipeline::{
    ClassSummary, Dataset, LoaderOptions, ModelKind, PredictionResult, RiskError, RiskPipeline,
    UnseenCategoryPolicy, assessments_to_batch, load_table, read_csv, summarize, write_csv,
};

use crate::utils::{CLASS_SIZE, class_row, test_config, write_class_csv, write_file};

fn load_class(dir: &std::path::Path) -> Result<Dataset> {
    Ok(load_table(&write_class_csv(dir), &LoaderOptions::default())?)
}

/// Train on the class table, save, reload and get the same assessment
#[test]
fn test_train_save_load_assess() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let model_dir = dir.path().join("models");
    let config = test_config(ModelKind::RandomForest);

    let mut pipeline = RiskPipeline::new(config.clone())?;
    let metrics = pipeline.train(load_class(dir.path())?)?;
    assert!(metrics.train_accuracy >= 0.9);
    pipeline.save(&model_dir)?;
    assert!(model_path(&model_dir, &config).exists());
    assert!(model_dir.join("random_forest_model.json").exists());
    assert!(model_dir.join(CLEANER_STATE_FILE).exists());

    let restored = RiskPipeline::load(&model_dir, config)?;
    let original = pipeline.assess(load_class(dir.path())?)?;
    let reloaded = restored.assess(load_class(dir.path())?)?;
    assert_eq!(original, reloaded);

    assert_eq!(original.results.len(), CLASS_SIZE);
    let first = &original.results[0];
    assert_eq!(first.student_id, "1");
    assert!(first.is_at_risk);
    assert!(first.explanation.starts_with("Student is at risk (confidence: "));
    assert_eq!(first.risk_factors[0], "Low attendance (16%)");
    assert_eq!(first.risk_factors[1], "Insufficient study time (2 hours/week)");

    let last = &original.results[CLASS_SIZE - 1];
    assert!(!last.is_at_risk);
    assert_eq!(
        last.recommendations,
        ["Maintain current study habits", "Continue regular attendance"]
    );

    let summary = original.summary;
    assert_eq!(summary.total_students, CLASS_SIZE);
    assert_eq!(
        summary.high_risk_count + summary.medium_risk_count + summary.low_risk_count,
        CLASS_SIZE
    );
    Ok(())
}

/// Loading from an empty directory reports the missing model
#[test]
fn test_load_without_saved_model() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = RiskPipeline::load(dir.path(), test_config(ModelKind::Logistic)).unwrap_err();
    assert!(matches!(err, RiskError::ModelNotFound(ref path) if path.ends_with("logistic_model.json")));
    Ok(())
}

/// New categories and missing columns at inference do not break assessment
#[test]
fn test_assess_unseen_values_and_missing_columns() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = RiskPipeline::new(test_config(ModelKind::Logistic))?;
    pipeline.train(load_class(dir.path())?)?;

    let header = "name,gender,math_marks,science_marks,english_score,attendance";
    let rows = ["Newcomer,X,30,35,28,50", "Another,F,95,90,99,98"];
    let path = write_file(dir.path(), "new.csv", &format!("{header}\n{}\n", rows.join("\n")));
    let assessment = pipeline.assess(read_csv(&path, &LoaderOptions::default())?)?;

    assert_eq!(assessment.results.len(), 2);
    assert!(assessment.results[0].risk_probability > assessment.results[1].risk_probability);
    Ok(())
}

/// Under the reject policy new students are assessed but new categories are not
#[test]
fn test_reject_policy_assesses_new_students() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(ModelKind::Logistic);
    config.unseen_category_policy = UnseenCategoryPolicy::Reject;
    let mut pipeline = RiskPipeline::new(config)?;
    pipeline.train(load_class(dir.path())?)?;

    let header = "name,gender,math_marks,science_marks,english_score,attendance";
    let path = write_file(
        dir.path(),
        "newcomer.csv",
        &format!("{header}\nNewcomer,F,30,35,28,50\n"),
    );
    let assessment = pipeline.assess(read_csv(&path, &LoaderOptions::default())?)?;
    assert_eq!(assessment.results.len(), 1);

    let path = write_file(
        dir.path(),
        "other.csv",
        &format!("{header}\nNewcomer,Z,30,35,28,50\n"),
    );
    let err = pipeline
        .assess(read_csv(&path, &LoaderOptions::default())?)
        .unwrap_err();
    assert!(matches!(err, RiskError::UnseenCategory { ref column, .. } if column == "gender"));
    Ok(())
}

/// An untrained pipeline trains on a batch holding both classes
#[test]
fn test_assess_or_train() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = RiskPipeline::new(test_config(ModelKind::RandomForest))?;

    let strong: String = (20..CLASS_SIZE).map(|i| class_row(i) + "\n").collect();
    let path = write_file(
        dir.path(),
        "strong.csv",
        &format!("{}\n{strong}", crate::utils::CLASS_HEADER),
    );
    let err = pipeline
        .assess_or_train(read_csv(&path, &LoaderOptions::default())?)
        .unwrap_err();
    assert!(matches!(err, RiskError::NotTrained(_)));
    assert!(!pipeline.is_trained());

    let assessment = pipeline.assess_or_train(load_class(dir.path())?)?;
    assert!(pipeline.is_trained());
    assert_eq!(assessment.results.len(), CLASS_SIZE);
    Ok(())
}

/// Assessments export as one flat row per student
#[test]
fn test_export_assessments() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = RiskPipeline::new(test_config(ModelKind::RandomForest))?;
    pipeline.train(load_class(dir.path())?)?;
    let assessment = pipeline.assess(load_class(dir.path())?)?;

    let batch = assessments_to_batch(&assessment.results)?;
    let out = dir.path().join("out/results.csv");
    write_csv(&out, &batch)?;

    let exported = read_csv(&out, &LoaderOptions::default())?;
    assert_eq!(exported.num_rows(), CLASS_SIZE);
    let factors = exported.text_values("risk_factors")?;
    let first = factors[0].clone().unwrap_or_default();
    assert!(first.contains("Low attendance (16%); "));
    Ok(())
}

/// Class summary of ten fixed probabilities
#[test]
fn test_summary_bands() {
    let predictions: Vec<PredictionResult> = [0.9, 0.8, 0.75, 0.6, 0.5, 0.45, 0.3, 0.2, 0.1, 0.05]
        .iter()
        .map(|&p| PredictionResult::new(u8::from(p > 0.5), p))
        .collect();
    let summary = summarize(&predictions);
    assert_eq!(
        (summary.high_risk_count, summary.medium_risk_count, summary.low_risk_count),
        (3, 3, 4)
    );
    assert!((summary.average_risk - 0.465).abs() < 1e-12);
    assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::Medium);
    assert_eq!(summarize(&[]), ClassSummary::default());
}
