//! Validation subcommand

use super::CliError;
use crate::checkpoint::BatchProgress;
use crate::identifier::JanCode;
use clap::Parser;
use std::path::Path;

/// Validate command for checking JAN codes and checkpoint state
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// Target type for validation
#[derive(clap::Subcommand, Debug)]
pub enum ValidateTarget {
    /// Validate a JAN code's format and check digit
    Jan {
        /// JAN code to validate (8 or 13 digits)
        code: String,
    },
    /// Validate checkpoint state integrity in the checkpoint directory
    Checkpoints,
}

impl ValidateCommand {
    /// Execute the validation command.
    ///
    /// `checkpoint_dir` comes from the global `--checkpoint-dir` flag.
    pub async fn execute(&self, checkpoint_dir: &Path) -> Result<(), CliError> {
        match &self.target {
            ValidateTarget::Jan { code } => self.validate_jan(code),
            ValidateTarget::Checkpoints => self.validate_checkpoints(checkpoint_dir),
        }
    }

    fn validate_jan(&self, code: &str) -> Result<(), CliError> {
        match JanCode::parse(code) {
            Ok(jan) => {
                println!("Valid JAN code: {}", jan);
                println!(
                    "  Format: {}",
                    if jan.as_str().len() == 13 {
                        "EAN-13"
                    } else {
                        "EAN-8"
                    }
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("Invalid JAN code: {}", e);
                Err(CliError::InvalidArgument(e.to_string()))
            }
        }
    }

    fn validate_checkpoints(&self, checkpoint_dir: &Path) -> Result<(), CliError> {
        if !checkpoint_dir.exists() {
            println!("No checkpoint state found at {}", checkpoint_dir.display());
            return Ok(());
        }

        if !checkpoint_dir.is_dir() {
            return Err(CliError::InvalidArgument(format!(
                "{} is not a directory",
                checkpoint_dir.display()
            )));
        }

        let state_files: Vec<_> = std::fs::read_dir(checkpoint_dir)
            .map_err(|e| {
                CliError::InvalidArgument(format!("Failed to read checkpoint dir: {e}"))
            })?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if state_files.is_empty() {
            println!("Checkpoint directory exists but contains no state files");
            return Ok(());
        }

        println!("Found {} checkpoint state file(s)", state_files.len());

        let mut valid_count = 0;
        let mut invalid_count = 0;

        for file in state_files {
            let path = file.path();
            let filename = path.file_name().unwrap().to_string_lossy();

            match BatchProgress::load(&path) {
                Ok(progress) => {
                    println!(
                        "  - {} (batch {}, {} resolved)",
                        filename,
                        progress.batch_id(),
                        progress.len()
                    );
                    valid_count += 1;
                }
                Err(e) => {
                    println!("  - {} (invalid: {})", filename, e);
                    invalid_count += 1;
                }
            }
        }

        println!("\nSummary:");
        println!("  Valid files: {}", valid_count);
        if invalid_count > 0 {
            println!("  Invalid files: {}", invalid_count);
            return Err(CliError::InvalidArgument(format!(
                "Found {} invalid checkpoint state file(s)",
                invalid_count
            )));
        }

        Ok(())
    }
}
