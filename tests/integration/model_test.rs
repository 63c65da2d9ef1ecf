use anyhow::Result;
use risk_pipeline::config::{PipelineConfig, TARGET_COLUMN};
use risk_pipeline::features::prepare_for_training;
use risk_pipeline::{
    DataCleaner, FeatureEngineer, FeatureSet, Label, LoaderOptions, ModelKind, RiskError,
    RiskLabeler, RiskModel, read_csv,
};

use crate::utils::{CLASS_SIZE, test_config, write_class_csv};

fn class_features() -> Result<(FeatureSet, Label)> {
    let dir = tempfile::tempdir()?;
    let raw = read_csv(&write_class_csv(dir.path()), &LoaderOptions::default())?;
    let cleaned = DataCleaner::new().fit_transform(raw)?;
    let engineered = FeatureEngineer::new().derive(cleaned)?;
    let (labelled, _) = RiskLabeler::new(50.0).label(engineered)?;
    let (features, labels) = prepare_for_training(&labelled, TARGET_COLUMN)?;
    Ok((features, labels.ok_or_else(|| anyhow::anyhow!("labels missing"))?))
}

fn trained(kind: ModelKind) -> Result<(RiskModel, FeatureSet)> {
    let (features, labels) = class_features()?;
    let mut model = RiskModel::from_config(&test_config(kind));
    model.train(&features, &labels)?;
    Ok((model, features))
}

/// Identical data and seed give bit-identical metrics and probabilities
#[test]
fn test_training_is_reproducible() -> Result<()> {
    for kind in [ModelKind::RandomForest, ModelKind::Logistic] {
        let (features, labels) = class_features()?;
        let mut a = RiskModel::from_config(&test_config(kind));
        let mut b = RiskModel::from_config(&test_config(kind));
        let metrics_a = a.train(&features, &labels)?;
        let metrics_b = b.train(&features, &labels)?;
        assert_eq!(metrics_a, metrics_b);
        assert_eq!(metrics_a.train_rows + metrics_a.test_rows, CLASS_SIZE);
        assert!((0.0..=1.0).contains(&metrics_a.test_accuracy));
        assert_eq!(a.predict(&features)?, b.predict(&features)?);
    }
    Ok(())
}

/// A different seed is allowed to change the split
#[test]
fn test_seed_controls_split() -> Result<()> {
    let (features, labels) = class_features()?;
    let config = PipelineConfig {
        random_seed: 7,
        ..test_config(ModelKind::Logistic)
    };
    let metrics = RiskModel::from_config(&config).train(&features, &labels)?;
    assert_eq!(metrics.test_rows, 5);
    assert_eq!(metrics.train_rows, 19);
    Ok(())
}

/// Extra columns are dropped and missing ones filled, keeping the row count
#[test]
fn test_predict_reconciles_columns() -> Result<()> {
    let (model, features) = trained(ModelKind::RandomForest)?;
    let columns = model.feature_columns().to_vec();

    let mut superset_columns = vec!["unexpected".to_string()];
    superset_columns.extend(columns.iter().rev().cloned());
    let superset_rows = features
        .rows()
        .iter()
        .map(|row| {
            let mut out = vec![123.0];
            out.extend(row.iter().rev());
            out
        })
        .collect();
    let superset = FeatureSet::new(superset_columns, superset_rows)?;
    assert_eq!(model.predict(&superset)?, model.predict(&features)?);

    let keep = &columns[..2];
    let subset_rows = features.rows().iter().map(|row| row[..2].to_vec()).collect();
    let subset = FeatureSet::new(keep.to_vec(), subset_rows)?;
    let prediction = model.predict(&subset)?;
    assert_eq!(prediction.len(), CLASS_SIZE);
    assert!(prediction.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    Ok(())
}

/// Restoring a persisted model predicts exactly like the original
#[test]
fn test_persist_restore_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for kind in [ModelKind::RandomForest, ModelKind::Logistic] {
        let (model, features) = trained(kind)?;
        let path = dir.path().join(format!("nested/{kind}_model.json"));
        model.persist(&path)?;

        let restored = RiskModel::load(&path)?;
        assert_eq!(restored.kind(), kind);
        assert!(restored.is_trained());
        assert_eq!(restored.feature_columns(), model.feature_columns());
        assert_eq!(restored.trained_at(), model.trained_at());
        assert_eq!(restored.predict(&features)?, model.predict(&features)?);
    }
    Ok(())
}

/// Restore replaces the kind and state of an existing model
#[test]
fn test_restore_replaces_state() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (logistic, _) = trained(ModelKind::Logistic)?;
    let path = dir.path().join("logistic_model.json");
    logistic.persist(&path)?;

    let (mut forest, _) = trained(ModelKind::RandomForest)?;
    forest.restore(&path)?;
    assert_eq!(forest.kind(), ModelKind::Logistic);
    assert!(forest.feature_importance().is_none());
    Ok(())
}

/// Lifecycle violations are typed errors
#[test]
fn test_lifecycle_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (features, _) = class_features()?;
    let untrained = RiskModel::new(ModelKind::RandomForest);

    assert!(matches!(untrained.predict(&features), Err(RiskError::NotTrained(_))));
    assert!(matches!(
        untrained.persist(&dir.path().join("model.json")),
        Err(RiskError::NotTrained(_))
    ));

    let mut model = RiskModel::new(ModelKind::RandomForest);
    assert!(matches!(
        model.restore(&dir.path().join("missing.json")),
        Err(RiskError::ModelNotFound(_))
    ));
    assert!(!model.is_trained());

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, "{ not json")?;
    assert!(matches!(
        model.restore(&corrupt),
        Err(RiskError::Serialization(_))
    ));
    Ok(())
}

/// Importance covers every training column, most important first
#[test]
fn test_feature_importance_is_ranked() -> Result<()> {
    let (model, _) = trained(ModelKind::RandomForest)?;
    let importance = model
        .feature_importance()
        .ok_or_else(|| anyhow::anyhow!("forest should report importance"))?;
    assert_eq!(importance.len(), model.feature_columns().len());
    assert!(importance.windows(2).all(|w| w[0].importance >= w[1].importance));
    let total: f64 = importance.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-9);
    Ok(())
}
