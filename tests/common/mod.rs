//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Write `content` to `root/relative`, creating parent directories.
#[allow(dead_code)]
pub fn write_doc<P: AsRef<Path>>(root: P, relative: &str, content: &[u8]) {
    let path = root.as_ref().join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Create a small corpus directory:
///
/// - `index.md` links to `projects/plan.md` and embeds `assets/diagram.png`
/// - `projects/plan.md` has a frontmatter title and links back to `index.md`
/// - `assets/unused.png` is referenced by nothing
///
/// Returns the corpus root (`<temp_dir>/corpus/`).
#[allow(dead_code)]
pub fn create_test_corpus(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("corpus");
    std::fs::create_dir(&root).unwrap();

    let index = r#"# Home

Current work lives in [[projects/plan]].

![[assets/diagram.png]]
"#;
    write_doc(&root, "index.md", index.as_bytes());

    let plan = r#"---
title: The Plan
---

Back to [home](index.md).
"#;
    write_doc(&root, "projects/plan.md", plan.as_bytes());
    write_doc(&root, "assets/diagram.png", b"\x89PNG\r\n");
    write_doc(&root, "assets/unused.png", b"\x89PNG\r\n");

    root
}
