mod common;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use docqa_core::error::Error;
use docqa_core::types::{Query, SearchMode};
use docqa_hybrid::{Database, FileStore};

use common::{loaded_database, settings, WordEmbedder};

const QUERIES: &[(&str, SearchMode)] = &[
    ("What happened on 6-Sept?", SearchMode::Auto),
    ("mud weight", SearchMode::Semantic),
    ("shale screens", SearchMode::Keyword),
    ("gas readings on 6/9", SearchMode::Auto),
];

fn answers(db: &Database) -> Vec<Vec<(String, f32)>> {
    QUERIES
        .iter()
        .map(|(text, mode)| {
            let query = Query::new(*text, *mode, 5, 400).expect("query");
            let outcome = db.search(&query).expect("search");
            outcome.results.into_iter().map(|r| (r.chunk_id, r.score)).collect()
        })
        .collect()
}

#[test]
fn save_then_load_gives_identical_results() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("nested/index.snap");
    let original = loaded_database();
    original.save(&path).expect("save");
    assert!(path.is_file());
    assert!(!tmp.path().join("nested/index.snap.tmp").exists());

    let restored = Database::new(Arc::new(WordEmbedder { dim: 64 }), &settings()).expect("database");
    restored.load(&path).expect("load");

    assert_eq!(restored.stats(), original.stats());
    assert_eq!(restored.chunk_ids(), original.chunk_ids());
    assert_eq!(restored.documents(), original.documents());
    assert_eq!(answers(&restored), answers(&original));
}

#[test]
fn damaged_snapshot_is_rejected_and_state_kept() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("index.snap");
    loaded_database().save(&path).expect("save");

    let mut bytes = fs::read(&path).expect("read");
    bytes[10] ^= 0xFF;
    fs::write(&path, &bytes).expect("write");

    let db = loaded_database();
    let before = db.stats();
    assert!(matches!(db.load(&path), Err(Error::CorruptSnapshot(_))));
    assert_eq!(db.stats(), before);

    fs::write(&path, b"short").expect("write");
    assert!(matches!(db.load(&path), Err(Error::CorruptSnapshot(_))));
}

#[test]
fn snapshot_from_another_embedder_dimension_is_refused() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("index.snap");
    loaded_database().save(&path).expect("save");

    let other = Database::new(Arc::new(WordEmbedder { dim: 32 }), &settings()).expect("database");
    assert!(matches!(other.load(&path), Err(Error::DimensionMismatch { expected: 32, actual: 64 })));
    assert!(other.is_empty());
}

#[test]
fn missing_snapshot_is_an_io_error() {
    let tmp = TempDir::new().expect("tempdir");
    let db = loaded_database();
    assert!(matches!(db.load(tmp.path().join("absent.snap")), Err(Error::Io(_))));
    assert!(!FileStore::new(tmp.path().join("absent.snap")).exists());
}
