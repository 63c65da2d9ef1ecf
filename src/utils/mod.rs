//! Logging, console and progress utilities shared by the pipeline stages

pub mod logging;

pub use logging::{
    create_spinner, finish_progress_bar, log_operation_complete, log_operation_start,
    log_warning, print_dataset_overview,
};
