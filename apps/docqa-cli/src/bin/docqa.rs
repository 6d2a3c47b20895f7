use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docqa_answer::orchestrator::{Answer, Orchestrator};
use docqa_answer::session::Session;
use docqa_core::config::{expand_path, Config, Settings};
use docqa_core::parser::{list_documents, PlainTextParser};
use docqa_core::types::{Query, ResponseLength, SearchMode};
use docqa_embed::get_default_embedder;
use docqa_hybrid::Database;

const USAGE: &str = "Usage: docqa <ingest [dir] | query \"<question>\" [--mode m] [--top-k n] [--length l] [--doc id] | search \"<question>\" [options] | chat | stats>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Per-query overrides of the `[rag]` settings.
struct QueryOptions {
    text: String,
    mode: SearchMode,
    top_k: usize,
    length: ResponseLength,
    doc: Option<String>,
}

impl QueryOptions {
    fn parse(args: &[String], settings: &Settings) -> anyhow::Result<Self> {
        let mut options = Self { text: String::new(), mode: settings.mode, top_k: settings.top_k, length: settings.response_length, doc: None };
        let mut words = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| iter.next().cloned().ok_or_else(|| anyhow::anyhow!("{flag} needs a value"));
            match arg.as_str() {
                "--mode" => options.mode = value("--mode")?.parse()?,
                "--top-k" => options.top_k = value("--top-k")?.parse()?,
                "--length" => options.length = value("--length")?.parse()?,
                "--doc" => options.doc = Some(value("--doc")?),
                _ => words.push(arg.as_str()),
            }
        }
        options.text = words.join(" ");
        if options.text.trim().is_empty() { anyhow::bail!("{USAGE}"); }
        Ok(options)
    }

    fn query(&self) -> anyhow::Result<Query> {
        let query = Query::new(self.text.as_str(), self.mode, self.top_k, self.length.max_tokens())?;
        Ok(match &self.doc {
            Some(doc) => query.restrict_to(doc.as_str()),
            None => query,
        })
    }
}

fn snapshot_path(config: &Config) -> PathBuf {
    let path: String = config.get("data.snapshot_path").unwrap_or_else(|_| "data/docqa.snapshot".to_string());
    expand_path(path)
}

/// Opens the database, restoring the snapshot when one exists.
fn open_database(settings: &Settings, snapshot: &Path) -> anyhow::Result<Database> {
    let db = Database::new(get_default_embedder()?, settings)?;
    if snapshot.exists() {
        db.load(snapshot)?;
    } else {
        tracing::info!(path = %snapshot.display(), "no snapshot yet, starting empty");
    }
    Ok(db)
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        for c in &answer.citations { println!("[{}] {} ({}, score {:.3})", c.marker, c.locator, c.chunk_id, c.score); }
    }
    match &answer.provider {
        Some(provider) => println!("-- {:?} via {provider}", answer.status),
        None => println!("-- {:?}", answer.status),
    }
    for failure in &answer.failures { eprintln!("provider {} failed: {}", failure.provider, failure.error); }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let snapshot = snapshot_path(&config);
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.raw_dir").unwrap_or_else(|_| "docs".to_string()); expand_path(dir)
            });
            let db = open_database(&settings, &snapshot)?;
            let parser = PlainTextParser;
            let files = list_documents(&data_dir, &parser);
            println!("Ingesting {} files from {}", files.len(), data_dir.display());

            let pb = ProgressBar::new(files.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}") {
                pb.set_style(style.progress_chars("#>-"));
            }
            let report = db.ingest_files(&data_dir, &files, &parser, |name| { pb.set_message(name.to_string()); pb.inc(1); })?;
            pb.finish_and_clear();

            for failure in &report.failed { eprintln!("skipped {}: {}", failure.source, failure.error); }
            db.save(&snapshot)?;
            let stats = db.stats();
            println!("✅ Ingest complete ({} new documents, {} failed, {} chunks total)", report.ingested.len(), report.failed.len(), stats.chunks);
        }
        "query" => {
            let options = QueryOptions::parse(&args, &settings)?;
            let db = open_database(&settings, &snapshot)?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let mut session = Session::new(settings.history_limit);
            let answer = orchestrator.answer(&db, &mut session, &options.query()?)?;
            print_answer(&answer);
        }
        "search" => {
            let options = QueryOptions::parse(&args, &settings)?;
            let db = open_database(&settings, &snapshot)?;
            let retrieval = db.search_and_retrieve(&options.query()?)?;
            println!("{:?} query, {} results", retrieval.class, retrieval.chunks.len());
            for (i, hit) in retrieval.chunks.iter().enumerate() {
                let preview: String = hit.chunk.text.chars().take(160).collect();
                println!("{}. [{:.3}] {} ({})\n   {}", i + 1, hit.result.score, hit.chunk.id, hit.source, preview.replace('\n', " "));
            }
        }
        "chat" => {
            let db = open_database(&settings, &snapshot)?;
            let orchestrator = Orchestrator::from_config(&config)?;
            let mut session = Session::new(settings.history_limit);
            println!("Ask a question (\"clear\" forgets the history, \"exit\" quits).");
            let stdin = io::stdin();
            loop {
                print!("> ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 { break; }
                match line.trim() {
                    "" => continue,
                    "exit" | "quit" => break,
                    "clear" => { session.clear(); println!("History cleared."); continue; }
                    text => {
                        let query = Query::new(text, settings.mode, settings.top_k, settings.max_response_tokens())?;
                        match orchestrator.answer(&db, &mut session, &query) {
                            Ok(answer) => print_answer(&answer),
                            Err(e) => eprintln!("Error: {e}"),
                        }
                    }
                }
            }
        }
        "stats" => {
            let db = open_database(&settings, &snapshot)?;
            let stats = db.stats();
            println!("snapshot:       {}", snapshot.display());
            println!("documents:      {}", stats.documents);
            println!("chunks:         {}", stats.chunks);
            println!("dated chunks:   {}", stats.dated_chunks);
            println!("distinct dates: {}", stats.distinct_dates);
            println!("vocabulary:     {}", stats.vocabulary);
            match stats.dimension {
                Some(dim) => println!("dimension:      {dim}"),
                None => println!("dimension:      -"),
            }
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
