#![allow(dead_code)]

use std::sync::Arc;

use docqa_core::config::Settings;
use docqa_core::traits::Embedder;
use docqa_core::types::{ParsedDocument, SourceMetadata};
use docqa_hybrid::Database;

/// Bag-of-words embedder: each lowercased word bumps one bucket.
pub struct WordEmbedder {
    pub dim: usize,
}

impl Embedder for WordEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        512
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t, self.dim)).collect())
    }
}

pub fn bag_of_words(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0f32; dim];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
        v[(bucket % dim as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

pub fn settings() -> Settings {
    Settings { chunk_size: 120, overlap: 0, ..Settings::default() }
}

pub fn database() -> Database {
    Database::new(Arc::new(WordEmbedder { dim: 64 }), &settings()).expect("database")
}

pub fn doc(filename: &str, text: &str) -> ParsedDocument {
    ParsedDocument::new(text, SourceMetadata::new(filename))
}

pub const DRILLING_LOG: &str = "5-Sept-2024: Rigged up and tested BOP to 5000 psi.\n\n\
6-Sept-2024: Drilled 8.5 in. hole from 1200 m to 1450 m with stable returns.\n\n\
7-Sept-2024: Circulated bottoms up and pulled out of hole for bit change.";

pub const MUD_REPORT: &str = "Mud weight was raised to 1.25 sg after gas readings increased.\n\n\
Viscosity was kept at 55 s/qt while drilling the reservoir section.\n\n\
Shale shakers were fitted with finer screens to control solids.";

pub fn loaded_database() -> Database {
    let db = database();
    let report = db
        .ingest_batch(vec![doc("daily-log.txt", DRILLING_LOG), doc("mud-report.txt", MUD_REPORT)])
        .expect("batch");
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    db
}
