//! # noet-index
//!
//! Keeps the relationship metadata of a file-backed knowledge base consistent with its documents.
//!
//! ## Overview
//!
//! Every document (a flat file: markdown, org-mode, plain text, media) owns one metadata record.
//! Besides filesystem facts and editor-supplied fields, each record carries the document's place
//! in two graphs:
//!
//! - the **hierarchy**: declared `parents`, computed `ancestors` (the top of each parent chain),
//!   and computed `kids`
//! - the **link graph**: `used_links` extracted from the document's content, and computed
//!   `links_to_here`
//!
//! The engine keeps both directions of each graph in agreement: saving a document patches the
//! records of the neighbours whose reverse lists changed, a full rebuild repairs everything from
//! scratch, and moves carry references along with the document. Corpus-wide vocabularies (tags,
//! collections, folders, buckets) and the set of media nothing links to are derived into a
//! cache.
//!
//! ### Graph invariants
//!
//! After a full rebuild, and as the target of every incremental update:
//!
//! - `X ∈ kids(Y)` exactly when `Y ∈ parents(X)`
//! - `X ∈ links_to_here(Y)` exactly when `Y ∈ used_links(X)`
//! - `ancestors(X)` never contains `X`; parent cycles end the affected branch
//! - `used_links(X)` never contains `X`
//!
//! Incremental saves are eventually consistent: a neighbour that cannot be patched is reported
//! as a [SyncDiagnostic] and fixed by the next save touching it or by
//! [IndexContext::rebuild_all]. [IndexContext::built_in_test] lists any current violation.
//!
//! ## Architecture
//!
//! - **[`paths`]**: canonical document keys ([`paths::PathNormalizer`])
//! - **[`properties`]**: the [`properties::MetadataRecord`] and editor-supplied
//!   [`properties::EditedFields`]
//! - **[`store`]**: collaborator traits (content, metadata, cache) with in-memory and filesystem
//!   implementations, and the typed [`store::RecordStore`] with its two save modes
//! - **[`codec`]**: per-format link extractors and the normalizing [`codec::LinkPipeline`]
//! - **[`ancestors`]**, **[`sync`]**, **[`rebuild`]**, **[`aggregate`]**, **[`relocate`]**,
//!   **[`lifecycle`]**, **[`check`]**: the engine components, all driven through an
//!   [`IndexContext`]
//!
//! ## Quick Start
//!
//! ```rust
//! use noet_index::{
//!     config::IndexConfig,
//!     properties::EditedFields,
//!     store::{MemoryContent, MemoryKv},
//!     IndexContext,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), noet_index::BuildonomyError> {
//! let content = Arc::new(MemoryContent::with_documents([
//!     ("projects/plan.md", "# Plan\n\nSee [[ideas/spark]] and ![[diagram.png]]."),
//!     ("ideas/spark.md", "# Spark"),
//!     ("diagram.png", ""),
//! ]));
//! let ctx = IndexContext::new(
//!     content,
//!     Arc::new(MemoryKv::new()),
//!     Arc::new(MemoryKv::new()),
//!     IndexConfig::default(),
//! );
//!
//! let outcome = ctx.save("projects/plan.md", &EditedFields::default().with_tags(["active"]))?;
//! assert_eq!(outcome.record.title, "Plan");
//! assert_eq!(outcome.record.used_links, vec!["ideas/spark.md", "diagram.png"]);
//!
//! let spark = ctx.records().get("ideas/spark.md")?.unwrap();
//! assert_eq!(spark.links_to_here, vec!["projects/plan.md"]);
//!
//! ctx.rebuild_all()?;
//! assert!(ctx.built_in_test()?.is_empty());
//!
//! let index = ctx.collect_all()?;
//! assert!(index.tags.contains("active"));
//! assert!(index.orphaned_media.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The engine is synchronous. Mutations serialize through the context's re-entrant writer
//! gate; a full rebuild holds it for its whole run. Aggregate cache updates serialize on a
//! separate lock.

pub mod aggregate;
pub mod ancestors;
pub mod check;
pub mod codec;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod paths;
pub mod properties;
pub mod rebuild;
pub mod relocate;
pub mod store;
pub mod sync;
#[cfg(test)]
mod tests;

pub use context::IndexContext;
pub use diagnostic::SyncDiagnostic;
pub use error::*;
