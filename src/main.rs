use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use risk_pipeline::utils::{create_spinner, finish_progress_bar, print_dataset_overview};
use risk_pipeline::{
    Assessment, LoaderOptions, ModelKind, PipelineConfig, RiskError, RiskPipeline,
    assessments_to_batch, load_table, write_csv,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser, Debug)]
#[command(name = "risk-pipeline", version, about = "Identify at-risk students from performance tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains a model on a labelled-by-threshold table and saves it.
    Train(CommonArgs),
    /// Predicts and explains every student in a table.
    Predict {
        #[command(flatten)]
        common: CommonArgs,
        /// Write per-student results to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Prints class-level risk statistics for a table.
    Summary(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// CSV, TSV or Parquet table of student records.
    #[arg(long)]
    data: PathBuf,
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,
    /// random_forest or logistic; overrides RISK_MODEL_KIND.
    #[arg(long)]
    model_kind: Option<ModelKind>,
    /// Average marks below this are at risk; overrides RISK_THRESHOLD.
    #[arg(long)]
    threshold: Option<f64>,
    /// Z-score normalize numeric features before training.
    #[arg(long)]
    normalize: bool,
}

impl CommonArgs {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(kind) = self.model_kind {
            config.model_kind = kind;
        }
        if let Some(threshold) = self.threshold {
            config.risk_threshold = threshold;
        }
        config.normalize |= self.normalize;
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => train(&args),
        Commands::Predict { common, output } => {
            let assessment = assess(&common)?;
            for result in &assessment.results {
                println!(
                    "{}\t{}\t{:.2}%\t{}",
                    result.student_id,
                    result.risk_level,
                    result.risk_probability * 100.0,
                    result.explanation
                );
            }
            if let Some(path) = output {
                let batch = assessments_to_batch(&assessment.results)?;
                write_csv(&path, &batch)?;
                info!("Wrote {} results to {}", batch.num_rows(), path.display());
            }
            println!("{}", assessment.summary.render());
            Ok(())
        }
        Commands::Summary(args) => {
            let assessment = assess(&args)?;
            println!("{}", assessment.summary.render());
            Ok(())
        }
    }
}

fn train(args: &CommonArgs) -> Result<()> {
    let start = Instant::now();
    let dataset = load_table(&args.data, &LoaderOptions::default())
        .with_context(|| format!("loading {}", args.data.display()))?;
    print_dataset_overview(&dataset);

    let mut pipeline = RiskPipeline::new(args.config())?;
    let spinner = create_spinner(Some("Training model..."));
    let metrics = pipeline.train(dataset)?;
    finish_progress_bar(&spinner, Some("Training complete"));

    pipeline.save(&args.model_dir)?;
    println!(
        "Model: {}\nTrain accuracy: {:.2}%\nTest accuracy: {:.2}%",
        pipeline.config().model_kind,
        metrics.train_accuracy * 100.0,
        metrics.test_accuracy * 100.0
    );
    if let Some(importance) = pipeline.model().feature_importance() {
        for item in importance.iter().take(5) {
            println!("  {:<30} {:.4}", item.feature, item.importance);
        }
    }
    info!("Finished training in {:?}", start.elapsed());
    Ok(())
}

/// Load the saved pipeline, or train on the table itself when none exists
fn assess(args: &CommonArgs) -> Result<Assessment> {
    let dataset = load_table(&args.data, &LoaderOptions::default())
        .with_context(|| format!("loading {}", args.data.display()))?;
    let config = args.config();
    let spinner = create_spinner(Some("Assessing students..."));

    let assessment = match RiskPipeline::load(&args.model_dir, config.clone()) {
        Ok(pipeline) => pipeline.assess(dataset)?,
        Err(RiskError::ModelNotFound(path)) => {
            warn!("No saved model at {path}; training on the input table");
            let mut pipeline = RiskPipeline::new(config)?;
            let assessment = pipeline.assess_or_train(dataset)?;
            save_quietly(&pipeline, &args.model_dir);
            assessment
        }
        Err(e) => return Err(e.into()),
    };

    finish_progress_bar(&spinner, Some("Assessment complete"));
    Ok(assessment)
}

fn save_quietly(pipeline: &RiskPipeline, dir: &Path) {
    if let Err(e) = pipeline.save(dir) {
        warn!("Could not save model to {}: {e}", dir.display());
    }
}
