//! Date recognition and normalization.
//!
//! Dates are found with an ordered list of `(pattern, normalizer)` rules.
//! Rules run in priority order and a rule only claims text no earlier rule
//! has claimed, so on overlapping spans the first matching rule wins:
//!
//! 1. `iso`            `2024-09-06`
//! 2. `day_month_year` `6-Sept-2024`, `6th September 2024`
//! 3. `month_day_year` `September 6, 2024`
//! 4. `numeric_dmy`    `6/9/2024`, `06.09.24`
//! 5. `day_month`      `6-Sept`, `6th of September`
//! 6. `month_day`      `Sept 6`, `September 6th`
//! 7. `numeric_dm`     `6-9`, `6/9`
//!
//! Ambiguous numeric forms are read day-first and flagged
//! [`Confidence::Low`]. A bare numeric pair (`numeric_dm`) is always low
//! confidence, and is skipped when it reads as a fraction (`12 1/4"`,
//! `9-5/8`). Two-digit years are taken as 20YY. A lowercase `may` joined to
//! a day by whitespace alone (`valve 3 may leak`) is not a month.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// A calendar date with an optional year.
///
/// Rendered as `YYYY-MM-DD`, or `--MM-DD` when the year is unknown. Each
/// distinct calendar date has exactly one rendering, so index lookups are
/// exact string matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedDate {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
}

impl NormalizedDate {
    pub fn new(year: Option<i32>, month: u32, day: u32) -> Result<Self> {
        // 2000 is a leap year, so a yearless 29 Feb is accepted
        let check_year = year.unwrap_or(2000);
        if NaiveDate::from_ymd_opt(check_year, month, day).is_none() {
            let shown = year.map_or_else(|| "--".to_string(), |y| y.to_string());
            return Err(Error::Parse(format!("{shown}-{month:02}-{day:02} is not a calendar date")));
        }
        Ok(Self { year, month, day })
    }

    /// Canonical key: `2024-09-06` or `--09-06`.
    pub fn key(&self) -> String {
        match self.year {
            Some(y) => format!("{y:04}-{:02}-{:02}", self.month, self.day),
            None => self.yearless_key(),
        }
    }

    pub fn yearless_key(&self) -> String {
        format!("--{:02}-{:02}", self.month, self.day)
    }

    /// Keys a chunk carrying this date is indexed under. A dated chunk is
    /// also reachable by its month and day alone.
    pub fn index_keys(&self) -> Vec<String> {
        match self.year {
            Some(_) => vec![self.key(), self.yearless_key()],
            None => vec![self.yearless_key()],
        }
    }

    pub fn without_year(&self) -> Self {
        Self { year: None, ..*self }
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    High,
}

/// A date found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMention {
    pub date: NormalizedDate,
    pub confidence: Confidence,
    /// Byte range of the matched text.
    pub start: usize,
    pub end: usize,
    /// Name of the rule that produced the date.
    pub rule: &'static str,
}

type Normalizer = fn(&Captures<'_>) -> Result<(NormalizedDate, Confidence)>;

/// Rejects a match from the text around it: `(text, start, end)`.
type ContextCheck = fn(&str, usize, usize) -> bool;

struct DateRule {
    name: &'static str,
    pattern: Regex,
    normalize: Normalizer,
    context: Option<ContextCheck>,
}

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const ORDINAL: &str = r"(?:st|nd|rd|th)?";

static RULES: LazyLock<Vec<DateRule>> = LazyLock::new(|| {
    let specs: [(&'static str, String, Normalizer, Option<ContextCheck>); 7] = [
        ("iso", r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".to_string(), normalize_iso, None),
        (
            "day_month_year",
            format!(r"(?i)\b(\d{{1,2}}){ORDINAL}(?:[\s\-/]+of\s+|[\s\-/]+){MONTH}\.?,?[\s\-/]+(\d{{4}})\b"),
            normalize_day_month_year,
            None,
        ),
        (
            "month_day_year",
            format!(r"(?i)\b{MONTH}\.?[\s\-]+(\d{{1,2}}){ORDINAL},?[\s\-]+(\d{{4}})\b"),
            normalize_month_day_year,
            None,
        ),
        ("numeric_dmy", r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b".to_string(), normalize_numeric_dmy, None),
        (
            "day_month",
            format!(r"(?i)\b(\d{{1,2}}){ORDINAL}(?:[\s\-]+of\s+|[\s\-]+){MONTH}\b"),
            normalize_day_month,
            None,
        ),
        ("month_day", format!(r"(?i)\b{MONTH}\.?[\s\-]+(\d{{1,2}}){ORDINAL}\b"), normalize_month_day, None),
        ("numeric_dm", r"\b(\d{1,2})[/\-](\d{1,2})\b".to_string(), normalize_numeric_dm, Some(is_fraction)),
    ];
    specs
        .into_iter()
        .filter_map(|(name, pattern, normalize, context)| match Regex::new(&pattern) {
            Ok(pattern) => Some(DateRule { name, pattern, normalize, context }),
            Err(e) => {
                tracing::error!(rule = name, error = %e, "date rule failed to compile");
                None
            }
        })
        .collect()
});

/// Rule names in priority order.
pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|r| r.name).collect()
}

/// All date mentions in `text`, ordered by position. Matches whose
/// normalization fails are dropped.
pub fn extract_mentions(text: &str) -> Vec<DateMention> {
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut mentions = Vec::new();
    for rule in RULES.iter() {
        for caps in rule.pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if claimed.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            if rule.context.is_some_and(|rejects| rejects(text, start, end)) {
                tracing::debug!(rule = rule.name, text = whole.as_str(), "not a date in context");
                continue;
            }
            claimed.push((start, end));
            match (rule.normalize)(&caps) {
                Ok((date, confidence)) => mentions.push(DateMention { date, confidence, start, end, rule: rule.name }),
                Err(e) => tracing::debug!(rule = rule.name, text = whole.as_str(), error = %e, "dropping date"),
            }
        }
    }
    mentions.sort_by_key(|m| m.start);
    mentions
}

/// The set of normalized dates mentioned in `text`.
pub fn extract_dates(text: &str) -> BTreeSet<NormalizedDate> {
    extract_mentions(text).into_iter().map(|m| m.date).collect()
}

/// The date a question is about: the first high-confidence mention, else the
/// first low-confidence one.
pub fn parse_query_date(text: &str) -> Option<DateMention> {
    let mentions = extract_mentions(text);
    let first_high = mentions.iter().position(|m| m.confidence == Confidence::High);
    match first_high {
        Some(i) => mentions.into_iter().nth(i),
        None => mentions.into_iter().next(),
    }
}

/// Parses a string that is exactly one date, using the first rule that
/// matches the whole (trimmed) input.
pub fn parse_date(input: &str) -> Result<(NormalizedDate, Confidence)> {
    let trimmed = input.trim();
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(trimmed) {
            if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == trimmed.len()) {
                if rule.context.is_some_and(|rejects| rejects(trimmed, 0, trimmed.len())) {
                    continue;
                }
                return (rule.normalize)(&caps);
            }
        }
    }
    Err(Error::Parse(input.to_string()))
}

/// Month number from an English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn number(caps: &Captures<'_>, group: usize) -> Result<u32> {
    let raw = caps.get(group).map(|m| m.as_str()).unwrap_or_default();
    raw.parse::<u32>().map_err(|_| Error::Parse(raw.to_string()))
}

fn month_group(caps: &Captures<'_>, group: usize) -> Result<u32> {
    let raw = caps.get(group).map(|m| m.as_str()).unwrap_or_default();
    month_from_name(raw).ok_or_else(|| Error::Parse(raw.to_string()))
}

fn year_group(caps: &Captures<'_>, group: usize) -> Result<i32> {
    let raw = caps.get(group).map(|m| m.as_str()).unwrap_or_default();
    let value: i32 = raw.parse().map_err(|_| Error::Parse(raw.to_string()))?;
    Ok(if raw.len() == 2 { 2000 + value } else { value })
}

fn normalize_iso(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    let date = NormalizedDate::new(Some(year_group(caps, 1)?), number(caps, 2)?, number(caps, 3)?)?;
    Ok((date, Confidence::High))
}

fn normalize_day_month_year(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    let date = NormalizedDate::new(Some(year_group(caps, 3)?), month_group(caps, 2)?, number(caps, 1)?)?;
    Ok((date, Confidence::High))
}

fn normalize_month_day_year(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    let date = NormalizedDate::new(Some(year_group(caps, 3)?), month_group(caps, 1)?, number(caps, 2)?)?;
    Ok((date, Confidence::High))
}

fn normalize_day_month(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    reject_modal_may(caps, 1, 2)?;
    let date = NormalizedDate::new(None, month_group(caps, 2)?, number(caps, 1)?)?;
    Ok((date, Confidence::High))
}

fn normalize_month_day(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    reject_modal_may(caps, 2, 1)?;
    let date = NormalizedDate::new(None, month_group(caps, 1)?, number(caps, 2)?)?;
    Ok((date, Confidence::High))
}

/// A numeric pair that is part of a measurement: preceded by a whole
/// number (`12 1/4`), followed by an inch mark, or chained into another
/// fraction (`9-5/8`).
fn is_fraction(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end_matches([' ', '\t']);
    let after_whole_number = before.len() < start && before.ends_with(|c: char| c.is_ascii_digit());
    let rest = &text[end..];
    let mut next = rest.chars();
    let inch_mark = rest.starts_with(['"', '\u{201d}', '\u{2033}']);
    let chained = matches!(next.next(), Some('/' | '-')) && next.next().is_some_and(|c| c.is_ascii_digit());
    after_whole_number || inch_mark || chained
}

/// Fails when the month is a lowercase `may` separated from the day by
/// whitespace only, which is almost always the verb.
fn reject_modal_may(caps: &Captures<'_>, day_group: usize, month_group: usize) -> Result<()> {
    let (Some(whole), Some(day), Some(month)) = (caps.get(0), caps.get(day_group), caps.get(month_group)) else {
        return Ok(());
    };
    if month.as_str() != "may" {
        return Ok(());
    }
    let (from, to) = if day.start() < month.start() { (day.end(), month.start()) } else { (month.end(), day.start()) };
    let between = &whole.as_str()[from - whole.start()..to - whole.start()];
    if between.chars().all(char::is_whitespace) {
        return Err(Error::Parse(format!("'{}' reads as the verb may", whole.as_str())));
    }
    Ok(())
}

/// Orders two numeric fields as `(day, month)`.
fn day_month_order(first: u32, second: u32) -> Result<(u32, u32, Confidence)> {
    match (first > 12, second > 12) {
        (true, false) => Ok((first, second, Confidence::High)),
        (false, true) => Ok((second, first, Confidence::High)),
        (false, false) if first == second => Ok((first, second, Confidence::High)),
        (false, false) => Ok((first, second, Confidence::Low)),
        (true, true) => Err(Error::Parse(format!("{first}/{second}"))),
    }
}

fn normalize_numeric_dmy(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    let (day, month, confidence) = day_month_order(number(caps, 1)?, number(caps, 2)?)?;
    let date = NormalizedDate::new(Some(year_group(caps, 3)?), month, day)?;
    Ok((date, confidence))
}

fn normalize_numeric_dm(caps: &Captures<'_>) -> Result<(NormalizedDate, Confidence)> {
    let (day, month, _) = day_month_order(number(caps, 1)?, number(caps, 2)?)?;
    let date = NormalizedDate::new(None, month, day)?;
    Ok((date, Confidence::Low))
}
