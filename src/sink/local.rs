use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::records::ResultSet;
use crate::sink::atomic_writer::AtomicCsvWriter;
use crate::sink::csv_encoder::encode_records;

/// Writes the result set as a CSV file at `path`, replacing any existing file.
///
/// # Errors
///
/// - `AppError::EmptyResult` - Checked before any file is touched
/// - `AppError::Io` - Path or permission problems
pub fn write_local_csv(result_set: &ResultSet, path: impl AsRef<Path>) -> Result<PathBuf, AppError> {
    if result_set.is_empty() {
        return Err(AppError::EmptyResult);
    }

    let mut writer = AtomicCsvWriter::new(path)?;
    let rows = encode_records(result_set, writer.writer_mut())?;
    let written = writer.finish()?;

    info!("CSV written to {} ({} rows)", written.display(), rows);
    Ok(written)
}
