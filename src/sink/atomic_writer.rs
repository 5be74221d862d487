//! Atomic CSV file writer with automatic cleanup on failure.
//!
//! Writes to a temporary file in the same directory as the destination,
//! then atomically replaces the destination on `finish()`. If dropped
//! before finishing, the temporary file is automatically cleaned up.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::Writer;
use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::sink::csv_encoder::csv_writer;

/// An atomic CSV writer using the export dialect.
///
/// A failed or abandoned write never leaves a truncated destination file.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
}

impl AtomicCsvWriter {
    /// Creates a new atomic CSV writer targeting the specified path.
    ///
    /// The temporary file is created in the same directory as `final_path`
    /// so the final rename stays on one filesystem.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the path has no file name or the temporary
    /// file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        if final_path.file_name().is_none() {
            return Err(AppError::Io(format!(
                "Not a file path: {}",
                final_path.display()
            )));
        }

        // "cases.csv" has an empty parent; that means the working directory.
        let parent_dir = match final_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| {
            AppError::Io(format!(
                "Failed to create temporary file in {}: {}",
                parent_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            writer: csv_writer(BufWriter::new(temp_file)),
            final_path,
        })
    }

    /// Returns a mutable reference to the underlying CSV writer.
    pub fn writer_mut(&mut self) -> &mut Writer<BufWriter<NamedTempFile>> {
        &mut self.writer
    }

    /// Flushes all buffers and atomically persists the file to the final path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if flushing or persisting fails. The temporary
    /// file is cleaned up either way.
    pub fn finish(self) -> Result<PathBuf, AppError> {
        let buf_writer = self.writer.into_inner().map_err(|e| {
            AppError::Io(format!("Failed to flush CSV writer: {}", e.error()))
        })?;

        let named_temp = buf_writer
            .into_inner()
            .map_err(|e| AppError::Io(format!("Failed to flush buffer: {}", e.error())))?;

        named_temp.persist(&self.final_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to persist file to {}: {}",
                self.final_path.display(),
                e.error
            ))
        })?;

        Ok(self.final_path)
    }
}
