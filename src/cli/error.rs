//! CLI error types and conversions

use crate::checkpoint::CheckpointError;
use crate::identifier::IdentifierError;
use crate::output::OutputError;
use crate::scheduler::SchedulerError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Identifier error
    #[error("identifier error: {0}")]
    IdentifierError(#[from] IdentifierError),

    /// Scheduler error
    #[error("scheduler error: {0}")]
    SchedulerError(#[from] SchedulerError),

    /// Checkpoint error
    #[error("checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Input file error
    #[error("input error: {0}")]
    InputError(String),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
