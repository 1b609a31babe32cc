//! Report export writers

use crate::scheduler::ProductRow;

pub mod csv;

pub use self::csv::CsvReportWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing per-product report rows
pub trait ReportWriter: OutputWriter {
    /// Write a single product row to output
    fn write_row(&mut self, row: &ProductRow) -> OutputResult<()>;

    /// Write multiple rows at once
    fn write_rows(&mut self, rows: &[ProductRow]) -> OutputResult<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }
}
