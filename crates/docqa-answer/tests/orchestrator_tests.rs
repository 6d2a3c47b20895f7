mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use docqa_answer::prompt::{NOT_FOUND, NO_DOCUMENTS};
use docqa_answer::{AnswerStatus, Session};
use docqa_core::error::Error;
use docqa_core::traits::Generator;
use docqa_core::types::{Query, QueryClass, SearchMode};

use common::{database, empty_database, only, orchestrator, settings, Down, Scripted, Slow};

fn query(text: &str) -> Query {
    Query::new(text, SearchMode::Auto, 3, 400).expect("query")
}

#[test]
fn failing_first_provider_falls_back_and_records_the_second() {
    let db = database();
    let backup = Scripted::new("hosted", &["On 6 September the crew drilled from 1200 m to 1450 m [1]."]);
    let providers: Vec<Arc<dyn Generator>> = vec![Arc::new(Down("local")), backup.clone()];
    let orch = orchestrator(providers, &settings());
    let mut session = Session::new(20);

    let answer = orch.answer(&db, &mut session, &query("What happened on 6-Sept?")).expect("answer");
    assert_eq!(answer.status, AnswerStatus::Generated);
    assert_eq!(answer.provider.as_deref(), Some("hosted"));
    assert_eq!(answer.failures.len(), 1);
    assert_eq!(answer.failures[0].provider, "local");
    assert!(answer.text.contains("1450 m"));
    assert_eq!(answer.query_class, Some(QueryClass::Date));
    assert_eq!(answer.citations[0].chunk_id, "daily-log.txt:1");
    assert_eq!(answer.citations[0].marker, 1);
    assert_eq!(session.last().and_then(|e| e.provider.as_deref()), Some("hosted"));
}

#[test]
fn all_providers_failing_keeps_citations() {
    let db = database();
    let providers: Vec<Arc<dyn Generator>> = vec![Arc::new(Down("local")), Arc::new(Down("hosted"))];
    let orch = orchestrator(providers, &settings());
    let mut session = Session::new(20);

    let answer = orch.answer(&db, &mut session, &query("What happened on 6-Sept?")).expect("not an error");
    assert_eq!(answer.status, AnswerStatus::GenerationFailed);
    assert!(answer.text.is_empty());
    assert_eq!(answer.provider, None);
    assert_eq!(answer.failures.len(), 2);
    assert!(answer.failures.iter().all(|f| f.error.is_provider_failure()));
    assert!(!answer.citations.is_empty());
    let cited: Vec<&str> = answer.citations.iter().map(|c| c.chunk_id.as_str()).collect();
    let ranked: Vec<&str> = answer.results.iter().map(|r| r.chunk_id.as_str()).collect();
    assert_eq!(cited, ranked);
}

#[test]
fn slow_provider_times_out_and_the_next_one_answers() {
    let db = database();
    let slow = Slow { sleep: Duration::from_secs(3), timeout: Duration::from_millis(50) };
    let backup = Scripted::new("hosted", &[]);
    let providers: Vec<Arc<dyn Generator>> = vec![Arc::new(slow), backup.clone()];
    let orch = orchestrator(providers, &settings());
    let mut session = Session::new(20);

    let started = Instant::now();
    let answer = orch.answer(&db, &mut session, &query("mud weight")).expect("answer");
    assert!(started.elapsed() < Duration::from_secs(2), "the slow call was not abandoned");
    assert_eq!(answer.provider.as_deref(), Some("hosted"));
    assert!(matches!(answer.failures[0].error, Error::Timeout { .. }));
}

#[test]
fn empty_database_answers_without_calling_a_provider() {
    let db = empty_database();
    let generator = Scripted::new("local", &[]);
    let orch = orchestrator(only(generator.clone()), &settings());
    let mut session = Session::new(20);

    let answer = orch.answer(&db, &mut session, &query("anything")).expect("answer");
    assert_eq!(answer.status, AnswerStatus::NoDocuments);
    assert_eq!(answer.text, NO_DOCUMENTS);
    assert_eq!(generator.calls(), 0);
}

#[test]
fn nothing_retrieved_gives_the_not_found_reply() {
    let db = database();
    let generator = Scripted::new("local", &[]);
    let orch = orchestrator(only(generator.clone()), &settings());
    let mut session = Session::new(20);

    let q = Query::new("helicopter schedule", SearchMode::Keyword, 3, 400).expect("query");
    let answer = orch.answer(&db, &mut session, &q).expect("answer");
    assert_eq!(answer.status, AnswerStatus::NoContext);
    assert_eq!(answer.text, NOT_FOUND);
    assert!(answer.citations.is_empty());
    assert_eq!(generator.calls(), 0);
}

#[test]
fn invalid_top_k_is_an_error() {
    let db = database();
    let orch = orchestrator(only(Scripted::new("local", &[])), &settings());
    let mut session = Session::new(20);
    let mut q = query("anything");
    q.top_k = 11;
    assert!(matches!(orch.answer(&db, &mut session, &q), Err(Error::InvalidConfig(_))));
    assert!(session.is_empty());
}

#[test]
fn date_questions_use_the_date_prompt_and_response_budget() {
    let db = database();
    let generator = Scripted::new("local", &[]);
    let orch = orchestrator(only(generator.clone()), &settings());
    let mut session = Session::new(20);

    orch.answer(&db, &mut session, &query("What happened on 6-Sept?")).expect("answer");
    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("what happened on --09-06"));
    assert!(requests[0].prompt.contains("[1] daily-log.txt"));
    assert!(requests[0].prompt.contains(NOT_FOUND));
    assert_eq!(requests[0].max_tokens, 400);

    orch.answer(&db, &mut session, &query("mud weight")).expect("answer");
    let requests = generator.requests();
    assert!(!requests[1].prompt.contains("what happened on"));
    assert!(requests[1].prompt.contains("mud-report.pdf, p. 2"));
}

#[test]
fn truncated_answer_is_continued_once_when_enabled() {
    let db = database();
    let generator = Scripted::new("local", &["The crew drilled from 1200 m to 1450 m and", "pulled out of hole [1]."]);
    let enabled = docqa_core::config::Settings { continue_truncated: true, ..settings() };
    let orch = orchestrator(only(generator.clone()), &enabled);
    let mut session = Session::new(20);

    let answer = orch.answer(&db, &mut session, &query("What happened on 6-Sept?")).expect("answer");
    assert_eq!(answer.text, "The crew drilled from 1200 m to 1450 m and pulled out of hole [1].");
    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].max_tokens, 300);
}

#[test]
fn history_keeps_the_most_recent_entries() {
    let db = database();
    let orch = orchestrator(only(Scripted::new("local", &[])), &settings());
    let mut session = Session::new(2);
    for text in ["first question", "second question", "third question"] {
        orch.answer(&db, &mut session, &query(text)).expect("answer");
    }
    let kept: Vec<&str> = session.entries().map(|e| e.query.as_str()).collect();
    assert_eq!(kept, vec!["second question", "third question"]);
    session.clear();
    assert!(session.is_empty());
}
