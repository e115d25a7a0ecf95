//! Article container detection.
//!
//! Starts from the wordiest visible paragraph and widens the selection through
//! its ancestors until the selection covers enough of the page's words.

use std::collections::HashSet;

use crate::config::CompiledHeuristics;
use crate::dom::{Document, NodeId, word_count};
use crate::formats::{ContainerLocator, LocatorStrategy};
use crate::layout::Layout;

#[derive(Debug, Clone)]
pub struct Detection {
    pub node: NodeId,
    pub locator: ContainerLocator,
    /// Candidates with no rendered height. Extraction leaves them out.
    pub flagged: HashSet<NodeId>,
}

pub fn detect_container(
    doc: &Document,
    layout: &dyn Layout,
    heuristics: &CompiledHeuristics,
) -> Detection {
    let body = doc.body();
    let page_words = word_count(&doc.inner_text(body));

    let mut candidates = doc.elements_by_tag(body, &heuristics.paragraph_tag);
    if candidates.is_empty() {
        candidates = doc.elements_by_tag(body, &heuristics.fallback_block_tag);
    }

    let mut flagged = HashSet::new();
    let mut best = body;
    let mut best_words = 0;
    for candidate in candidates {
        let rendered = layout.rendered_height(candidate) != 0.0;
        if rendered
            && !is_blacklisted(doc, candidate, heuristics)
            && !doc
                .parent(candidate)
                .is_some_and(|parent| is_blacklisted(doc, parent, heuristics))
        {
            let words = word_count(&doc.inner_text(candidate));
            if words > best_words {
                best_words = words;
                best = candidate;
            }
        }
        if !rendered {
            flagged.insert(candidate);
        }
    }

    if best == body {
        tracing::debug!("no qualifying paragraph; using document body as container");
    }

    let mut selected = best;
    let mut selected_words = best_words;
    while page_words > 0
        && (selected_words as f64) / (page_words as f64) < heuristics.coverage_threshold
        && selected != body
    {
        let Some(parent) = doc.parent(selected) else {
            break;
        };
        let text = doc.inner_text(parent);
        if text.trim().is_empty() {
            break;
        }
        selected = parent;
        selected_words = word_count(&text);
    }

    if doc.has_tag(selected, &heuristics.paragraph_tag) {
        if let Some(parent) = doc.parent(selected) {
            selected = parent;
        }
    }

    let locator = build_locator(doc, selected);
    tracing::debug!(
        node = selected.0,
        page_words,
        selected_words,
        flagged = flagged.len(),
        ?locator,
        "detected article container"
    );

    Detection {
        node: selected,
        locator,
        flagged,
    }
}

fn is_blacklisted(doc: &Document, node: NodeId, heuristics: &CompiledHeuristics) -> bool {
    heuristics.is_blacklisted(doc.id(node), doc.class_name(node))
}

pub fn build_locator(doc: &Document, node: NodeId) -> ContainerLocator {
    let mut locator = ContainerLocator::default();

    let id = doc.id(node);
    if !id.is_empty() {
        locator.id = id.to_owned();
        locator.strategy.push(LocatorStrategy::ById);
    }

    let class_name = doc.class_name(node);
    if !class_name.trim().is_empty() && doc.elements_by_class(class_name).len() == 1 {
        locator.class_name = class_name.to_owned();
        locator.strategy.push(LocatorStrategy::ByClassName);
    }

    if let Some(path) = doc.path_from_body(node) {
        locator.path = Some(path);
        locator.strategy.push(LocatorStrategy::ByPath);
    }

    locator
}

/// Finds the container a locator describes, trying its strategies in order.
/// A class lookup only counts when it is unambiguous.
pub fn resolve_locator(doc: &Document, locator: &ContainerLocator) -> Option<NodeId> {
    locator.strategy.iter().find_map(|strategy| match strategy {
        LocatorStrategy::ById => doc.element_by_id(&locator.id),
        LocatorStrategy::ByClassName => {
            match doc.elements_by_class(&locator.class_name).as_slice() {
                [only] => Some(*only),
                _ => None,
            }
        }
        LocatorStrategy::ByPath => locator
            .path
            .as_deref()
            .and_then(|path| doc.node_at_path(path)),
    })
}
