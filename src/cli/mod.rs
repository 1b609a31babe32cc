//! CLI command implementations

pub mod analyze;
pub mod error;
pub mod sources;
pub mod validate;

pub use analyze::{AnalyzeCommand, Cli, Commands};
pub use error::CliError;
pub use sources::SourcesCommand;
pub use validate::ValidateCommand;
