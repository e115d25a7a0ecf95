//! Paragraph extraction.
//!
//! Works on a detached copy of the container: the copy is cleaned of
//! presentational markup and page furniture, then every remaining paragraph
//! element yields one entry of the canonical paragraph sequence. Entries keep
//! document order and are never filtered, so positions line up with the live
//! page during re-identification.

use std::collections::HashSet;

use crate::config::CompiledHeuristics;
use crate::dom::{Document, NodeId, is_block_tag};

const PRESENTATIONAL_ATTRS: &[&str] = &[
    "style",
    "color",
    "width",
    "height",
    "background",
    "bgcolor",
    "border",
];

const NOISE_TAGS: &[&str] = &["style", "svg", "noindex", "hr", "aside", "figure"];

const TEX_ENCODING: &str = "application/x-tex";

pub fn extract_paragraphs(
    doc: &Document,
    container: NodeId,
    flagged: &HashSet<NodeId>,
    heuristics: &CompiledHeuristics,
) -> Vec<String> {
    let copy = sanitized_copy(doc, container, flagged, heuristics);
    let paragraphs: Vec<String> = copy
        .elements_by_tag(copy.root(), &heuristics.paragraph_tag)
        .into_iter()
        .map(|paragraph| copy.inner_text(paragraph).trim().to_owned())
        .collect();
    tracing::debug!(paragraphs = paragraphs.len(), "extracted article paragraphs");
    paragraphs
}

/// Detached, cleaned copy of `container`. Nodes in `flagged` are left out.
pub fn sanitized_copy(
    doc: &Document,
    container: NodeId,
    flagged: &HashSet<NodeId>,
    heuristics: &CompiledHeuristics,
) -> Document {
    let mut copy = doc.clone_subtree(container, |node| !flagged.contains(&node));
    let root = copy.root();
    let paragraph_tag = heuristics.paragraph_tag.as_str();

    let elements: Vec<NodeId> = std::iter::once(root)
        .chain(copy.descendants(root))
        .filter(|node| copy.is_element(*node))
        .collect();
    for element in &elements {
        split_double_breaks(&mut copy, *element, paragraph_tag);
    }

    let mut marked = Vec::new();
    let elements: Vec<NodeId> = copy
        .descendants(root)
        .filter(|node| copy.is_element(*node))
        .collect();
    for element in elements {
        for attr in PRESENTATIONAL_ATTRS {
            copy.remove_attr(element, attr);
        }

        if is_empty_content(&copy, element) || is_noise(&copy, element, heuristics) {
            marked.push(element);
            continue;
        }

        if copy.has_tag(element, "pre") && !has_code_child(&copy, element) {
            breaks_from_newlines(&mut copy, element);
            copy.replace_with_new(element, paragraph_tag);
        } else if copy.has_tag(element, "font") {
            copy.replace_with_new(element, paragraph_tag);
        }
    }

    tracing::trace!(removed = marked.len(), "removing noise from container copy");
    for element in marked {
        copy.detach(element);
    }

    copy
}

/// Turns `<br>` + `<br>` runs into paragraph boundaries.
fn split_double_breaks(doc: &mut Document, parent: NodeId, paragraph_tag: &str) {
    let children = doc.children(parent).to_vec();
    let mut segments: Vec<Vec<NodeId>> = vec![Vec::new()];
    let mut split = false;
    let mut index = 0;
    while index < children.len() {
        let child = children[index];
        if doc.has_tag(child, "br") {
            let mut next = index + 1;
            while next < children.len() && is_blank_text(doc, children[next]) {
                next += 1;
            }
            if next < children.len() && doc.has_tag(children[next], "br") {
                split = true;
                segments.push(Vec::new());
                index = next + 1;
                continue;
            }
        }
        if let Some(segment) = segments.last_mut() {
            segment.push(child);
        }
        index += 1;
    }
    if !split {
        return;
    }

    for child in &children {
        doc.detach(*child);
    }

    if doc.has_tag(parent, paragraph_tag) {
        let mut segments = segments.into_iter();
        for child in segments.next().unwrap_or_default() {
            doc.append_child(parent, child);
        }
        let mut previous = parent;
        for segment in segments {
            let paragraph = doc.create_element(paragraph_tag, &[]);
            for child in segment {
                doc.append_child(paragraph, child);
            }
            doc.insert_after(previous, paragraph);
            previous = paragraph;
        }
        return;
    }

    for segment in segments {
        let holds_blocks = segment
            .iter()
            .any(|child| doc.tag(*child).is_some_and(is_block_tag));
        let holds_content = segment.iter().any(|child| !is_blank_text(doc, *child));
        if holds_blocks || !holds_content {
            for child in segment {
                doc.append_child(parent, child);
            }
            continue;
        }
        let paragraph = doc.create_element(paragraph_tag, &[]);
        for child in segment {
            doc.append_child(paragraph, child);
        }
        doc.append_child(parent, paragraph);
    }
}

fn is_blank_text(doc: &Document, node: NodeId) -> bool {
    doc.text(node).is_some_and(|text| text.trim().is_empty())
}

/// Nothing inside, or only whitespace and non-breaking spaces. Line breaks
/// are content.
fn is_empty_content(doc: &Document, node: NodeId) -> bool {
    if doc.has_tag(node, "br") {
        return false;
    }
    doc.children(node)
        .iter()
        .all(|child| is_blank_text(doc, *child))
}

fn is_noise(doc: &Document, node: NodeId, heuristics: &CompiledHeuristics) -> bool {
    if doc.tag(node).is_some_and(|tag| NOISE_TAGS.contains(&tag)) {
        return true;
    }
    if doc
        .attr(node, "encoding")
        .is_some_and(|encoding| encoding == TEX_ENCODING)
    {
        return true;
    }
    let hidden = doc.attr(node, "aria-hidden") == Some("true");
    let noisy_class = doc
        .class_tokens(node)
        .any(|token| heuristics.is_noise_class(token));
    (hidden || noisy_class) && !doc.has_class(node, &heuristics.math_exemption_class)
}

fn has_code_child(doc: &Document, node: NodeId) -> bool {
    doc.element_children(node)
        .any(|child| doc.has_tag(child, "code"))
}

/// Replaces newlines in the text below `node` with `<br>` elements.
fn breaks_from_newlines(doc: &mut Document, node: NodeId) {
    let texts: Vec<NodeId> = doc
        .descendants(node)
        .filter(|child| doc.text(*child).is_some_and(|text| text.contains('\n')))
        .collect();
    for text_node in texts {
        let Some(text) = doc.text(text_node).map(str::to_owned) else {
            continue;
        };
        let mut previous = text_node;
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                let br = doc.create_element("br", &[]);
                doc.insert_after(previous, br);
                previous = br;
            }
            if !line.is_empty() {
                let piece = doc.create_text(line);
                doc.insert_after(previous, piece);
                previous = piece;
            }
        }
        doc.detach(text_node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<String> {
        let doc = Document::parse_html(html);
        let heuristics = CompiledHeuristics::default();
        extract_paragraphs(&doc, doc.body(), &HashSet::new(), &heuristics)
    }

    #[test]
    fn double_breaks_split_a_paragraph() {
        let paragraphs = extract("<p>first part<br> <br>second part<br>same line</p><p>next</p>");
        assert_eq!(
            paragraphs,
            vec!["first part", "second part\nsame line", "next"]
        );
    }

    #[test]
    fn double_breaks_outside_paragraphs_become_paragraphs() {
        let paragraphs = extract("<div>one<br><br>two <b>bold</b></div>");
        assert_eq!(paragraphs, vec!["one", "two bold"]);
    }

    #[test]
    fn noise_elements_are_removed() {
        let paragraphs = extract(
            r#"<p>Body text<span class="byline-meta"> by someone</span>.</p>
<aside><p>Related story</p></aside>
<figure><p>Caption</p></figure>
<p>Formula <span aria-hidden="true">hidden</span><annotation encoding="application/x-tex">x^2</annotation></p>
<div class="contributions"><p>Support us</p></div>"#,
        );
        assert_eq!(paragraphs, vec!["Body text.", "Formula"]);
    }

    #[test]
    fn math_fallbacks_survive_aria_hidden() {
        let paragraphs = extract(
            r#"<p>E = mc<span class="mwe-math-fallback-image-inline" aria-hidden="true">²</span></p>"#,
        );
        assert_eq!(paragraphs, vec!["E = mc²"]);
    }

    #[test]
    fn pre_without_code_becomes_a_paragraph() {
        let paragraphs = extract("<pre>line one\nline two</pre><pre><code>let x = 1;</code></pre>");
        assert_eq!(paragraphs, vec!["line one\nline two"]);
    }

    #[test]
    fn font_elements_become_paragraphs() {
        let paragraphs = extract(r#"<font color="red" size="3">Old <i>markup</i></font>"#);
        assert_eq!(paragraphs, vec!["Old markup"]);
    }

    #[test]
    fn empty_elements_are_dropped_but_empty_paragraphs_still_emit() {
        let paragraphs = extract("<p>&nbsp;</p><p>   </p><p><span></span></p><p>kept</p>");
        assert_eq!(paragraphs, vec!["", "kept"]);
    }

    #[test]
    fn presentational_attributes_are_stripped_from_the_copy_only() {
        let html = r#"<p style="color: red" width="3" class="lead">Text</p>"#;
        let doc = Document::parse_html(html);
        let before = doc.outer_html(doc.root());
        let copy = sanitized_copy(
            &doc,
            doc.body(),
            &HashSet::new(),
            &CompiledHeuristics::default(),
        );
        let p = copy.elements_by_tag(copy.root(), "p")[0];
        assert_eq!(copy.attr(p, "style"), None);
        assert_eq!(copy.attr(p, "width"), None);
        assert_eq!(copy.attr(p, "class"), Some("lead"));
        assert_eq!(doc.outer_html(doc.root()), before);
    }

    #[test]
    fn flagged_nodes_are_excluded() {
        let doc = Document::parse_html("<p>keep</p><p>drop</p>");
        let ps = doc.elements_by_tag(doc.body(), "p");
        let flagged = HashSet::from([ps[1]]);
        let paragraphs =
            extract_paragraphs(&doc, doc.body(), &flagged, &CompiledHeuristics::default());
        assert_eq!(paragraphs, vec!["keep"]);
    }
}
