//! Non-fatal conditions reported by the synchronization engine.
//!
//! Fatal problems (the document being saved cannot be read, the metadata store rejects a
//! write of the primary record) propagate as [BuildonomyError](crate::BuildonomyError).
//! Everything else is logged and collected as a [SyncDiagnostic] so callers can inspect what
//! an operation skipped without the operation failing.
use serde::{Deserialize, Serialize};

use crate::properties::RelationField;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDiagnostic {
    /// Climbing from `start` revisited `at`; the branch yields no ancestor.
    CycleDetected { start: String, at: String },

    /// A patch save on a neighbouring record failed. The primary save still committed, so
    /// the two records disagree until the neighbour is next saved or a rebuild runs.
    NeighborPatchFailed {
        neighbor: String,
        field: RelationField,
        message: String,
    },

    /// A stored record could not be decoded and was treated as absent.
    MalformedRecord { key: String, message: String },

    /// A document was skipped by a sweep (rebuild, aggregate collection).
    Skipped { key: String, message: String },

    Warning(String),
}

impl SyncDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn skipped(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Skipped {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }

    pub fn is_neighbor_failure(&self) -> bool {
        matches!(self, Self::NeighborPatchFailed { .. })
    }
}

impl std::fmt::Display for SyncDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { start, at } => {
                write!(f, "Parent cycle climbing from '{start}': revisited '{at}'")
            }
            Self::NeighborPatchFailed {
                neighbor,
                field,
                message,
            } => write!(f, "Failed to patch {field} of '{neighbor}': {message}"),
            Self::MalformedRecord { key, message } => {
                write!(f, "Malformed record '{key}': {message}")
            }
            Self::Skipped { key, message } => write!(f, "Skipped '{key}': {message}"),
            Self::Warning(msg) => write!(f, "Warning: {msg}"),
        }
    }
}
