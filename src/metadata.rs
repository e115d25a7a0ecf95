//! Title, author and publication date heuristics.
//!
//! Each extractor reads the whole document once and never mutates it.
//! Candidates found inside the article container are reported back so the
//! paragraph extraction can leave them out.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::config::CompiledHeuristics;
use crate::dom::{Document, NodeId, word_count};

const TITLE_SEPARATORS: &[&str] = &[" \u{2014} ", " \u{2013} ", " - ", " | ", " : "];

static BREAK_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br[^>]*>").expect("break markup pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub value: String,
    /// Element inside the container the value was read from.
    pub flagged: Option<NodeId>,
}

impl Found {
    fn fallback(value: &str) -> Self {
        Self {
            value: value.to_owned(),
            flagged: None,
        }
    }
}

/// Page title, cut before the first site-name separator.
pub fn article_title(doc: &Document) -> String {
    let scope = doc.head().unwrap_or(doc.root());
    let Some(title) = doc.first_matching(scope, |doc, node| doc.has_tag(node, "title")) else {
        return String::new();
    };
    truncate_title(doc.text_content(title).trim())
}

pub fn truncate_title(title: &str) -> String {
    for separator in TITLE_SEPARATORS {
        if let Some(index) = title.find(separator) {
            if index > 0 {
                return title[..index].to_owned();
            }
        }
    }
    title.to_owned()
}

#[derive(Clone, Copy)]
enum Scope {
    Container,
    Body,
    Head,
}

#[derive(Clone, Copy)]
enum Source {
    Text,
    Attr(&'static str),
}

type Matcher = fn(&Document, NodeId) -> bool;

struct DateRule {
    scope: Scope,
    matches: Matcher,
    sources: &'static [Source],
}

const DATE_RULES: &[DateRule] = &[
    DateRule {
        scope: Scope::Container,
        matches: class_starts_with_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Container,
        matches: class_has_dash_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Container,
        matches: class_has_underscore_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Body,
        matches: class_starts_with_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Body,
        matches: class_has_dash_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Body,
        matches: class_has_underscore_date,
        sources: &[Source::Text],
    },
    DateRule {
        scope: Scope::Head,
        matches: meta_name_starts_with_date,
        sources: &[Source::Attr("content")],
    },
    DateRule {
        scope: Scope::Head,
        matches: meta_name_has_dash_date,
        sources: &[Source::Attr("content")],
    },
    DateRule {
        scope: Scope::Container,
        matches: is_time,
        sources: &[Source::Attr("datetime"), Source::Text],
    },
    DateRule {
        scope: Scope::Body,
        matches: is_time,
        sources: &[Source::Attr("datetime"), Source::Text],
    },
];

fn class_starts_with_date(doc: &Document, node: NodeId) -> bool {
    doc.class_name(node).starts_with("date")
}

fn class_has_dash_date(doc: &Document, node: NodeId) -> bool {
    doc.class_name(node).contains("-date")
}

fn class_has_underscore_date(doc: &Document, node: NodeId) -> bool {
    doc.class_name(node).contains("_date")
}

fn meta_name_starts_with_date(doc: &Document, node: NodeId) -> bool {
    doc.has_tag(node, "meta") && doc.attr(node, "name").is_some_and(|n| n.starts_with("date"))
}

fn meta_name_has_dash_date(doc: &Document, node: NodeId) -> bool {
    doc.has_tag(node, "meta") && doc.attr(node, "name").is_some_and(|n| n.contains("-date"))
}

fn is_time(doc: &Document, node: NodeId) -> bool {
    doc.has_tag(node, "time")
}

fn scope_node(doc: &Document, container: NodeId, scope: Scope) -> Option<NodeId> {
    match scope {
        Scope::Container => Some(container),
        Scope::Body => Some(doc.body()),
        Scope::Head => doc.head(),
    }
}

fn read_source(doc: &Document, node: NodeId, source: Source) -> Option<String> {
    match source {
        Source::Text => Some(doc.inner_text(node)),
        Source::Attr(name) => doc.attr(node, name).map(str::to_owned),
    }
}

pub fn article_date(doc: &Document, container: NodeId, heuristics: &CompiledHeuristics) -> Found {
    for rule in DATE_RULES {
        let Some(scope) = scope_node(doc, container, rule.scope) else {
            continue;
        };
        let Some(node) = doc.first_matching(scope, rule.matches) else {
            continue;
        };
        let candidate = rule
            .sources
            .iter()
            .filter_map(|source| read_source(doc, node, *source))
            .find(|value| {
                !value.trim().is_empty() && value.split(' ').count() < heuristics.date_max_words
            });
        if let Some(value) = candidate {
            let flagged = matches!(rule.scope, Scope::Container).then_some(node);
            tracing::debug!(node = node.0, %value, "found article date");
            return Found {
                value: normalize_date(&value),
                flagged,
            };
        }
    }
    Found::fallback(&heuristics.unknown_date)
}

fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_on = strip_leading_word(trimmed, "on");
    let joined = without_on
        .replace("\r\n", "\u{a0}")
        .replace(['\r', '\n'], "\u{a0}");
    BREAK_MARKUP.replace_all(&joined, "\u{a0}").into_owned()
}

/// Removes `word` (any case) and the whitespace after it from the start of
/// `text`.
fn strip_leading_word<'a>(text: &'a str, word: &str) -> &'a str {
    let Some(head) = text.get(..word.len()) else {
        return text;
    };
    let rest = &text[word.len()..];
    if head.eq_ignore_ascii_case(word) && rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        text
    }
}

/// Best-effort timestamp for a normalised date string.
pub fn parse_publication_date(date: &str) -> Option<DateTime<Utc>> {
    let cleaned = date.replace('\u{a0}', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(cleaned) {
        return Some(parsed.with_timezone(&Utc));
    }

    let without_zone = strip_zone_abbreviation(cleaned);
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%a %e %b %Y %H.%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%B %e, %Y", "%b %e, %Y", "%e %B %Y", "%e %b %Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(without_zone, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

fn strip_zone_abbreviation(date: &str) -> &str {
    match date.rsplit_once(' ') {
        Some((rest, zone))
            if (2..=4).contains(&zone.len()) && zone.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest.trim_end()
        }
        _ => date,
    }
}

struct AuthorRule {
    scope: Scope,
    matches: Matcher,
    max_words: fn(&CompiledHeuristics) -> usize,
}

const AUTHOR_RULES: &[AuthorRule] = &[
    AuthorRule {
        scope: Scope::Container,
        matches: rel_has_author,
        max_words: strict_author_limit,
    },
    AuthorRule {
        scope: Scope::Container,
        matches: class_has_author,
        max_words: strict_author_limit,
    },
    AuthorRule {
        scope: Scope::Body,
        matches: rel_has_author,
        max_words: strict_author_limit,
    },
    AuthorRule {
        scope: Scope::Body,
        matches: class_has_author,
        max_words: fallback_author_limit,
    },
];

fn strict_author_limit(heuristics: &CompiledHeuristics) -> usize {
    heuristics.author_max_words
}

fn fallback_author_limit(heuristics: &CompiledHeuristics) -> usize {
    heuristics.author_fallback_max_words
}

fn rel_has_author(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "rel").is_some_and(|rel| rel.contains("author"))
}

fn class_has_author(doc: &Document, node: NodeId) -> bool {
    doc.class_name(node).contains("author")
}

fn meta_name_has_author(doc: &Document, node: NodeId) -> bool {
    doc.has_tag(node, "meta") && doc.attr(node, "name").is_some_and(|n| n.contains("author"))
}

pub fn article_author(
    doc: &Document,
    container: NodeId,
    heuristics: &CompiledHeuristics,
) -> Found {
    for rule in AUTHOR_RULES {
        let Some(scope) = scope_node(doc, container, rule.scope) else {
            continue;
        };
        let Some(node) = doc.first_matching(scope, rule.matches) else {
            continue;
        };
        let text = doc.inner_text(node);
        if word_count(&text) < (rule.max_words)(heuristics) && !text.trim().is_empty() {
            let flagged = matches!(rule.scope, Scope::Container).then_some(node);
            tracing::debug!(node = node.0, author = %text, "found article author");
            return Found {
                value: tidy_author(&text),
                flagged,
            };
        }
    }

    let meta = doc
        .head()
        .and_then(|head| doc.first_matching(head, meta_name_has_author))
        .and_then(|node| doc.attr(node, "content"))
        .filter(|content| !content.trim().is_empty());
    match meta {
        Some(content) => Found {
            value: tidy_author(content),
            flagged: None,
        },
        None => Found::fallback(&heuristics.unknown_author),
    }
}

fn tidy_author(raw: &str) -> String {
    let author = raw.trim();
    let author = if author == author.to_uppercase() {
        title_case_name(author)
    } else {
        author.to_owned()
    };
    strip_leading_word(&author, "by").trim().to_owned()
}

/// Re-capitalises an all-caps name. Short inner words stay lower-case
/// ("de", "da", "van" style particles).
fn title_case_name(name: &str) -> String {
    let words: Vec<&str> = name.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            if word.chars().count() < 3 && index != 0 && index != last {
                word.to_lowercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
