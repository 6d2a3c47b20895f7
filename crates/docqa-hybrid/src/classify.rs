use docqa_core::dates::Confidence;
use docqa_core::types::{Query, QueryClass, SearchMode};

/// Picks the retrieval policy for a query.
///
/// Explicit modes win. In auto mode a confidently parsed date makes a date
/// query, a date read with low confidence makes a hybrid query, and
/// anything else is semantic.
pub fn classify(query: &Query) -> QueryClass {
    match query.mode {
        SearchMode::Semantic => QueryClass::Semantic,
        SearchMode::Keyword => QueryClass::Keyword,
        SearchMode::Auto => match query.date.as_ref().map(|m| m.confidence) {
            Some(Confidence::High) => QueryClass::Date,
            Some(Confidence::Low) => QueryClass::Hybrid,
            None => QueryClass::Semantic,
        },
    }
}
