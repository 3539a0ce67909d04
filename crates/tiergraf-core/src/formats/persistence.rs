//! # Snapshot Format
//!
//! Binary serialization for converted documents.
//!
//! Format: Header (5 bytes) + postcard-serialized payload.
//! - 4 bytes: Magic ("TGRF")
//! - 1 byte: Version
//!
//! The payload holds the graph and the traversal log. The tier hierarchy is
//! folded again from the log on load.
//!
//! Sizes and the header are checked before the payload is decoded.

use crate::document::Document;
use crate::graph::{Graph, SerializableGraph};
use crate::hierarchy::{TierPair, TraversalLog};
use crate::{GrafError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum accepted snapshot size (256 MB).
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all document data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), GrafError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GrafError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GrafError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GrafError> {
        let Some(header) = bytes.get(0..HEADER_SIZE) else {
            return Err(GrafError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotPayload {
    graph: SerializableGraph,
    tier_pairs: Vec<TierPair>,
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a document to bytes (header + payload).
pub fn document_to_bytes(document: &Document) -> Result<Vec<u8>, GrafError> {
    let payload = SnapshotPayload {
        graph: SerializableGraph::from(document.graph()),
        tier_pairs: document.log().pairs().to_vec(),
    };
    let payload = postcard::to_stdvec(&payload)
        .map_err(|e| GrafError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a document from bytes.
pub fn document_from_bytes(bytes: &[u8]) -> Result<Document, GrafError> {
    if bytes.len() < HEADER_SIZE {
        return Err(GrafError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(GrafError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let payload: SnapshotPayload = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        GrafError::DeserializationError(format!("Failed to decode snapshot: {}", e))
    })?;

    let graph = Graph::try_from(payload.graph)?;
    let log = TraversalLog::from_pairs(payload.tier_pairs);
    tracing::debug!(
        nodes = graph.node_count(),
        tier_pairs = log.pairs().len(),
        "snapshot decoded"
    );
    Ok(Document::new(graph, log))
}

// =============================================================================
// TESTS
// =============================================================================
