use super::helpers::*;
use crate::{
    aggregate::{
        bucket_key, AggregateCacheBuilder, COLLECTIONS_KEY, FILE_PATHS_KEY, FOLDERS_KEY,
        FOLDER_PATHS_KEY, ORPHANED_MEDIA_KEY, TAGS_KEY,
    },
    properties::EditedFields,
    store::{CacheStore, ContentSource},
};
use test_log::test;

fn vocabulary_corpus() -> TestCorpus {
    let corpus = TestCorpus::new(&[
        ("work/plan.md", "# Plan\n![[media/used.png]]"),
        ("work/deep/x.md", "# X"),
        ("home/list.md", "# List"),
        ("media/used.png", ""),
        ("loose.png", ""),
    ]);
    corpus
        .ctx
        .save("work/plan.md", &EditedFields::default().with_tags(["beta", "alpha"]))
        .unwrap();
    corpus
        .ctx
        .save("work/deep/x.md", &EditedFields::default().with_tags(["alpha"]))
        .unwrap();
    corpus
        .ctx
        .save(
            "home/list.md",
            &EditedFields::default().with_bucket("categories", ["zeta", "eta"]),
        )
        .unwrap();
    corpus
}

#[test]
fn test_collect_all_gathers_sorted_vocabularies() {
    let corpus = vocabulary_corpus();
    let index = corpus.ctx.collect_all().unwrap();

    assert_eq!(index.tags.iter().collect::<Vec<_>>(), vec!["alpha", "beta"]);
    assert_eq!(
        index.collections.iter().collect::<Vec<_>>(),
        vec!["home", "media", "work"]
    );
    assert_eq!(
        index.folders.iter().collect::<Vec<_>>(),
        vec!["deep", "home", "media", "work"]
    );
    assert_eq!(
        index.folder_paths.iter().collect::<Vec<_>>(),
        vec!["home", "media", "work", "work/deep"]
    );
    assert_eq!(index.file_paths.len(), 5);
    assert_eq!(index.orphaned_media.iter().collect::<Vec<_>>(), vec!["loose.png"]);
    assert_eq!(
        index.buckets["categories"].iter().collect::<Vec<_>>(),
        vec!["eta", "zeta"]
    );
    assert!(index.diagnostics.is_empty());
}

#[test]
fn test_collect_all_persists_every_entry() {
    let corpus = vocabulary_corpus();
    corpus.ctx.collect_all().unwrap();
    let builder = AggregateCacheBuilder::new(&corpus.ctx);

    assert_eq!(builder.cached(TAGS_KEY).unwrap(), Some(strings(&["alpha", "beta"])));
    assert_eq!(
        builder.cached(COLLECTIONS_KEY).unwrap(),
        Some(strings(&["home", "media", "work"]))
    );
    assert_eq!(
        builder.cached(FOLDERS_KEY).unwrap(),
        Some(strings(&["deep", "home", "media", "work"]))
    );
    assert_eq!(
        builder.cached(FOLDER_PATHS_KEY).unwrap(),
        Some(strings(&["home", "media", "work", "work/deep"]))
    );
    assert_eq!(
        builder.cached(FILE_PATHS_KEY).unwrap(),
        Some(strings(&[
            "home/list.md",
            "loose.png",
            "media/used.png",
            "work/deep/x.md",
            "work/plan.md",
        ]))
    );
    assert_eq!(
        builder.cached(ORPHANED_MEDIA_KEY).unwrap(),
        Some(strings(&["loose.png"]))
    );
    assert_eq!(
        builder.cached(&bucket_key("categories")).unwrap(),
        Some(strings(&["eta", "zeta"]))
    );
}

#[test]
fn test_malformed_cache_entries_read_as_absent() {
    let corpus = TestCorpus::new(&[]);
    CacheStore::set(corpus.cache.as_ref(), TAGS_KEY, b"not json").unwrap();
    let builder = AggregateCacheBuilder::new(&corpus.ctx);
    assert_eq!(builder.cached(TAGS_KEY).unwrap(), None);
    assert_eq!(builder.cached(FOLDERS_KEY).unwrap(), None);
}

#[test]
fn test_save_and_index_tracks_orphaned_media() {
    let corpus = TestCorpus::new(&[
        ("a.md", "nothing yet"),
        ("pic.png", ""),
        ("other.png", ""),
    ]);
    let builder = AggregateCacheBuilder::new(&corpus.ctx);
    corpus.ctx.collect_all().unwrap();
    assert_eq!(
        builder.cached(ORPHANED_MEDIA_KEY).unwrap(),
        Some(strings(&["other.png", "pic.png"]))
    );

    corpus.content.write("a.md", b"![[pic.png]]").unwrap();
    corpus.ctx.save_and_index("a.md", &EditedFields::default()).unwrap();
    assert_eq!(
        builder.cached(ORPHANED_MEDIA_KEY).unwrap(),
        Some(strings(&["other.png"]))
    );

    corpus.content.write("a.md", b"gone again").unwrap();
    let outcome = corpus
        .ctx
        .save_and_index("a.md", &EditedFields::default())
        .unwrap();
    assert_eq!(outcome.links_removed, strings(&["pic.png"]));
    assert_eq!(
        builder.cached(ORPHANED_MEDIA_KEY).unwrap(),
        Some(strings(&["other.png", "pic.png"]))
    );

    // The incremental result agrees with a full scan
    let full = corpus.ctx.collect_all().unwrap();
    assert_eq!(
        full.orphaned_media.into_iter().collect::<Vec<_>>(),
        strings(&["other.png", "pic.png"])
    );
}

#[test]
fn test_saving_new_media_marks_it_orphaned() {
    let corpus = TestCorpus::new(&[("a.md", "![[seen.png]]"), ("seen.png", ""), ("old.png", "")]);
    corpus.ctx.save("a.md", &EditedFields::default()).unwrap();
    corpus.ctx.collect_all().unwrap();

    corpus.content.write("new.png", b"").unwrap();
    corpus
        .ctx
        .save_and_index("new.png", &EditedFields::default())
        .unwrap();
    assert_eq!(
        AggregateCacheBuilder::new(&corpus.ctx)
            .cached(ORPHANED_MEDIA_KEY)
            .unwrap(),
        Some(strings(&["new.png", "old.png"]))
    );
}

#[test]
fn test_orphan_update_without_cache_collects_everything() {
    let corpus = TestCorpus::new(&[("a.md", "# A"), ("pic.png", ""), ("docs/b.md", "")]);
    corpus
        .ctx
        .save_and_index("a.md", &EditedFields::default().with_tags(["t"]))
        .unwrap();

    let builder = AggregateCacheBuilder::new(&corpus.ctx);
    assert_eq!(
        builder.cached(ORPHANED_MEDIA_KEY).unwrap(),
        Some(strings(&["pic.png"]))
    );
    assert_eq!(builder.cached(TAGS_KEY).unwrap(), Some(strings(&["t"])));
    assert_eq!(builder.cached(FOLDER_PATHS_KEY).unwrap(), Some(strings(&["docs"])));
}
