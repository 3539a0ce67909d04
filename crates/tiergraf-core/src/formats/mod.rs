//! # Formats
//!
//! Byte-level encodings of a [`crate::Document`]. File I/O lives in the app.

mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_PAYLOAD_SIZE, SnapshotHeader, document_from_bytes, document_to_bytes,
};
