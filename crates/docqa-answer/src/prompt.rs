use docqa_core::dates::NormalizedDate;

use crate::context::Context;

/// Reply used when the documents hold nothing relevant.
pub const NOT_FOUND: &str = "I cannot find this information in the provided documents.";

/// Reply used when no documents have been ingested.
pub const NO_DOCUMENTS: &str = "No documents have been ingested yet.";

/// Tokens allowed for finishing an answer that was cut off.
pub const CONTINUATION_TOKENS: usize = 300;

const CITE_RULE: &str = "Cite the passages you use with their bracketed numbers, e.g. [1].";

pub fn general_prompt(question: &str, context: &Context) -> String {
    format!(
        "Answer the question using only the passages below. Be clear and concise. {CITE_RULE}\n\
         If the passages do not contain the answer, reply exactly: \"{NOT_FOUND}\"\n\n\
         Passages:\n{}\n\n\
         Question: {question}\n\n\
         Answer:",
        context.render()
    )
}

/// Prompt for questions about a specific day: asks for the activities of
/// that day only, in order, with quantities kept.
pub fn date_prompt(question: &str, date: &NormalizedDate, context: &Context) -> String {
    format!(
        "The question asks what happened on {date}. Using only the passages below, list the activities \
         recorded for that day in the order they occurred, keeping depths, volumes, times and other figures \
         exactly as written. Ignore passages about other days. {CITE_RULE}\n\
         If no passage covers {date}, reply exactly: \"{NOT_FOUND}\"\n\n\
         Passages:\n{}\n\n\
         Question: {question}\n\n\
         Answer:",
        context.render()
    )
}

pub fn continuation_prompt(question: &str, partial: &str) -> String {
    format!(
        "The answer below was cut off. Continue it from exactly where it stops, without repeating \
         anything, and finish the last sentence.\n\n\
         Question: {question}\n\n\
         Answer so far:\n{partial}\n\n\
         Continuation:"
    )
}

const DANGLING_WORDS: &[&str] = &["and", "or", "but", "the", "a", "an", "to", "of", "with", "which", "for", "in"];

/// Heuristic for a generation that stopped mid-sentence: no closing
/// punctuation, a trailing ellipsis, or a trailing conjunction or article.
pub fn looks_truncated(text: &str) -> bool {
    let text = text.trim_end();
    let Some(last) = text.chars().last() else { return false };
    if text.ends_with("...") || last == '…' {
        return true;
    }
    let last_word = text
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if DANGLING_WORDS.contains(&last_word.as_str()) {
        return true;
    }
    !matches!(last, '.' | '!' | '?' | ')' | ']' | '"' | '\'' | '`' | '*')
}
