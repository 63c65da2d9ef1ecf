//! Console output utilities
//!
//! This module provides utilities for formatted console output.

use crate::dataset::Dataset;

/// Print the shape and column types of a dataset
pub fn print_dataset_overview(dataset: &Dataset) {
    println!(
        "Dataset: {} rows x {} columns",
        dataset.num_rows(),
        dataset.num_columns()
    );
    for field in dataset.batch().schema().fields() {
        println!("  - {} ({})", field.name(), field.data_type());
    }
}
