//! CSV sinks.
//!
//! One serializer (`csv_encoder`) writes to any `io::Write`. The local-file
//! sink wraps it in an atomic temp-file writer; the object-storage sink wraps
//! it in an in-memory buffer and uploads the bytes.

mod atomic_writer;
mod csv_encoder;
mod local;
mod object_storage;

pub use atomic_writer::AtomicCsvWriter;
pub use csv_encoder::{csv_writer, encode_records, encode_to_bytes, render_cell};
pub use local::write_local_csv;
pub use object_storage::{upload_csv, ObjectStorage, S3ObjectStorage};
