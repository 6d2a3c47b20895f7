#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docqa_answer::{FallbackChain, Orchestrator};
use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, GenerationRequest, Generator};
use docqa_core::types::{ParsedDocument, SourceMetadata};
use docqa_hybrid::Database;

pub struct WordEmbedder;

impl Embedder for WordEmbedder {
    fn dim(&self) -> usize {
        32
    }

    fn max_len(&self) -> usize {
        512
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0f32; 32];
                for word in t.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                    let h = word.to_lowercase().bytes().fold(7u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
                    v[(h % 32) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Always fails as if the server were down.
pub struct Down(pub &'static str);

impl Generator for Down {
    fn name(&self) -> &str {
        self.0
    }

    fn generate(&self, _: &GenerationRequest) -> Result<String> {
        Err(Error::ProviderUnavailable { provider: self.0.to_string(), reason: "connection refused".into() })
    }
}

/// Answers after sleeping longer than its own timeout.
pub struct Slow {
    pub sleep: Duration,
    pub timeout: Duration,
}

impl Generator for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    fn generate(&self, _: &GenerationRequest) -> Result<String> {
        std::thread::sleep(self.sleep);
        Ok("too late".into())
    }
}

/// Replies from a script and records every prompt it receives.
pub struct Scripted {
    pub name: &'static str,
    replies: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<GenerationRequest>>,
    pub calls: AtomicUsize,
}

impl Scripted {
    pub fn new(name: &'static str, replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.prompts.lock().expect("lock").clone()
    }
}

impl Generator for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("lock").push(request.clone());
        let reply = self.replies.lock().expect("lock").pop_front();
        Ok(reply.unwrap_or_else(|| "The crew drilled ahead [1].".to_string()))
    }
}

pub fn settings() -> Settings {
    Settings { chunk_size: 120, overlap: 0, ..Settings::default() }
}

/// A provider list holding just `generator`.
pub fn only(generator: Arc<Scripted>) -> Vec<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = generator;
    vec![generator]
}

pub fn orchestrator(providers: Vec<Arc<dyn Generator>>, settings: &Settings) -> Orchestrator {
    let chain = FallbackChain::new(providers, Duration::from_secs(5)).expect("chain");
    Orchestrator::new(chain, settings)
}

pub fn empty_database() -> Database {
    Database::new(Arc::new(WordEmbedder), &settings()).expect("database")
}

pub fn database() -> Database {
    let db = empty_database();
    let log = "5-Sept-2024: Rigged up and tested BOP to 5000 psi.\n\n\
               6-Sept-2024: Drilled 8.5 in. hole from 1200 m to 1450 m with stable returns.\n\n\
               7-Sept-2024: Circulated bottoms up and pulled out of hole for bit change.";
    let mud = "Mud weight was raised to 1.25 sg after gas readings increased.";
    let report = db
        .ingest_batch(vec![
            ParsedDocument::new(log, SourceMetadata::new("daily-log.txt")),
            ParsedDocument::new(mud, SourceMetadata { page: Some(2), ..SourceMetadata::new("mud-report.pdf") }),
        ])
        .expect("ingest");
    assert!(report.failed.is_empty());
    db
}
