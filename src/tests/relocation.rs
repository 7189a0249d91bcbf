use super::helpers::*;
use crate::{error::BuildonomyError, properties::EditedFields, store::ContentSource};
use test_log::test;

fn linked_corpus() -> TestCorpus {
    let corpus = TestCorpus::new(&[
        ("a.md", "See [[notes/old]] and [the section](notes/old.md#sec)."),
        ("notes/old.md", "# Old\n[[target]]"),
        ("target.md", "# Target"),
    ]);
    for key in ["a.md", "notes/old.md", "target.md"] {
        corpus.ctx.save(key, &EditedFields::default()).unwrap();
    }
    corpus
}

#[test]
fn test_move_rewrites_linking_documents() {
    let corpus = linked_corpus();
    let report = corpus
        .ctx
        .move_document("notes/old.md", "archive/new.md")
        .unwrap();

    assert_eq!(report.from, "notes/old.md");
    assert_eq!(report.to, "archive/new.md");
    assert_eq!(report.rewritten, strings(&["a.md"]));
    assert!(report.diagnostics.is_empty());
    assert_eq!(
        corpus.content.read_string("a.md").unwrap(),
        "See [[archive/new]] and [the section](archive/new.md#sec)."
    );
    assert!(!corpus.content.exists("notes/old.md"));
    assert_eq!(
        corpus.content.read_string("archive/new.md").unwrap(),
        "# Old\n[[target]]"
    );

    assert!(!corpus.has_record("notes/old.md"));
    let moved = corpus.record("archive/new.md");
    assert_eq!(moved.title, "Old");
    assert_eq!(moved.collection, "archive");
    assert_eq!(moved.folders, strings(&["archive"]));
    assert_eq!(moved.links_to_here, strings(&["a.md"]));
    assert_eq!(moved.used_links, strings(&["target.md"]));
    assert_eq!(corpus.record("a.md").used_links, strings(&["archive/new.md"]));
    assert_eq!(
        corpus.record("target.md").links_to_here,
        strings(&["archive/new.md"])
    );
    corpus.assert_consistent();
}

#[test]
fn test_move_rewrites_rooted_and_uncollapsed_references() {
    let corpus = TestCorpus::new(&[
        ("linker.md", "[[/old/note]] and [n](/old/note.md) and [m](.//old/./note.md)"),
        ("old/note.md", "# Note"),
    ]);
    corpus.ctx.save("linker.md", &EditedFields::default()).unwrap();
    corpus.ctx.save("old/note.md", &EditedFields::default()).unwrap();
    assert_eq!(corpus.record("linker.md").used_links, strings(&["old/note.md"]));

    let report = corpus
        .ctx
        .move_document("old/note.md", "new/note.md")
        .unwrap();
    assert_eq!(report.rewritten, strings(&["linker.md"]));
    assert_eq!(
        corpus.content.read_string("linker.md").unwrap(),
        "[[/new/note]] and [n](/new/note.md) and [m](.//new/note.md)"
    );
    assert_eq!(corpus.record("linker.md").used_links, strings(&["new/note.md"]));
    assert_eq!(corpus.record("new/note.md").links_to_here, strings(&["linker.md"]));
    corpus.assert_consistent();
}

#[test]
fn test_move_carries_hierarchy() {
    let corpus = TestCorpus::new(&[("root.md", "# Root"), ("mid.md", "# Mid"), ("leaf.md", "# Leaf")]);
    corpus.ctx.save("root.md", &EditedFields::default()).unwrap();
    corpus
        .ctx
        .save("mid.md", &EditedFields::default().with_parents(["root.md"]))
        .unwrap();
    corpus
        .ctx
        .save("leaf.md", &EditedFields::default().with_parents(["mid.md"]))
        .unwrap();
    assert_eq!(corpus.record("leaf.md").ancestors, strings(&["root.md"]));

    corpus.ctx.move_document("root.md", "top.md").unwrap();
    assert_eq!(corpus.record("top.md").kids, strings(&["mid.md"]));
    assert_eq!(corpus.record("mid.md").parents, strings(&["top.md"]));
    assert_eq!(corpus.record("mid.md").ancestors, strings(&["top.md"]));
    assert_eq!(corpus.record("leaf.md").ancestors, strings(&["top.md"]));
    corpus.assert_consistent();

    corpus.ctx.move_document("leaf.md", "sub/leaf.md").unwrap();
    assert_eq!(corpus.record("mid.md").kids, strings(&["sub/leaf.md"]));
    assert_eq!(corpus.record("sub/leaf.md").parents, strings(&["mid.md"]));
    assert_eq!(corpus.record("sub/leaf.md").ancestors, strings(&["top.md"]));
    corpus.assert_consistent();
}

#[test]
fn test_move_after_external_rename() {
    let corpus = linked_corpus();
    corpus.content.rename("notes/old.md", "notes/renamed.md").unwrap();

    corpus
        .ctx
        .move_document("notes/old.md", "notes/renamed.md")
        .unwrap();
    assert!(corpus.has_record("notes/renamed.md"));
    assert!(!corpus.has_record("notes/old.md"));
    assert_eq!(
        corpus.content.read_string("a.md").unwrap(),
        "See [[notes/renamed]] and [the section](notes/renamed.md#sec)."
    );
    corpus.assert_consistent();
}

#[test]
fn test_move_of_unindexed_document_indexes_it() {
    let corpus = TestCorpus::new(&[("fresh.md", "[[target]]")]);
    corpus.ctx.move_document("fresh.md", "kept/fresh.md").unwrap();
    assert_eq!(corpus.record("kept/fresh.md").used_links, strings(&["target.md"]));
    assert!(!corpus.has_record("fresh.md"));
    corpus.assert_consistent();
}

#[test]
fn test_move_to_same_key_is_a_no_op() {
    let corpus = linked_corpus();
    let before = corpus.record("notes/old.md");
    let report = corpus
        .ctx
        .move_document("notes/old.md", "/notes//old.md")
        .unwrap();
    assert!(report.rewritten.is_empty());
    assert_eq!(corpus.record("notes/old.md"), before);
}

#[test]
fn test_move_refuses_to_overwrite() {
    let corpus = linked_corpus();
    let err = corpus
        .ctx
        .move_document("notes/old.md", "target.md")
        .unwrap_err();
    assert!(matches!(err, BuildonomyError::Custom(_)));
    assert!(corpus.has_record("notes/old.md"));
    assert_eq!(
        corpus.content.read_string("a.md").unwrap(),
        "See [[notes/old]] and [the section](notes/old.md#sec)."
    );
}

#[test]
fn test_move_of_missing_document_fails() {
    let corpus = linked_corpus();
    let err = corpus.ctx.move_document("nowhere.md", "elsewhere.md").unwrap_err();
    assert!(err.is_not_found());
}
