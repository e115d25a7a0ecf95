//! Re-attaching a canonical paragraph sequence to the live page.
//!
//! This is the only stage allowed to mutate the live document: every bound
//! paragraph gets a colour-picker affordance appended to it.

use crate::dom::{Document, NodeId};

/// Value of an untouched colour input.
pub const DEFAULT_COLOR: &str = "#000000";

const DROP_PATH: &str = "M34.7,1.5c-1.1-1-2.5-1.5-3.9-1.5C29.4,0,28,0.5,27,1.5l0,0L8.9,20.9H9C-3,33.8-3,53.8,9,66.7c5.7,6.1,13.7,9.6,22,9.6l0,0c8.3,0,16.3-3.4,22-9.5C65,53.9,65,33.9,53,21L34.7,1.5z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub input: NodeId,
    pub fill: NodeId,
}

impl Affordance {
    fn attach(doc: &mut Document, paragraph: NodeId, index: usize) -> Self {
        let input_id = format!("storyLight-paragraph-id-{index}-color-input");
        let fill_id = format!("storyLight-paragraph-id-{index}-color-fill");

        let indicator = doc.create_element("div", &[("class", "storyLight-color-indicator")]);
        let label = doc.create_element("label", &[("class", "storyLight-color-label")]);
        let input = doc.create_element(
            "input",
            &[
                ("class", "storyLight-color-input"),
                ("id", &input_id),
                ("type", "color"),
                ("value", DEFAULT_COLOR),
            ],
        );
        let svg = doc.create_element("svg", &[("version", "1.1"), ("viewBox", "0 0 62 76.3")]);
        let fill = doc.create_element(
            "path",
            &[
                ("id", &fill_id),
                ("class", "storyLight-color-fill"),
                ("d", DROP_PATH),
            ],
        );

        doc.append_child(svg, fill);
        doc.append_child(label, input);
        doc.append_child(label, svg);
        doc.append_child(indicator, label);
        doc.append_child(paragraph, indicator);

        Self { input, fill }
    }

    /// Input-change listener: stores the value and repaints the fill.
    pub fn set_color(&self, doc: &mut Document, color: &str) {
        doc.set_attr(self.input, "value", color);
        doc.set_attr(self.fill, "style", &format!("fill: {color};"));
    }

    pub fn color<'a>(&self, doc: &'a Document) -> &'a str {
        doc.attr(self.input, "value").unwrap_or(DEFAULT_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphBinding {
    /// Position in the canonical sequence.
    pub index: usize,
    /// Ordinal among the container's live paragraph elements.
    pub position: usize,
    pub text: String,
    pub node: NodeId,
    pub affordance: Affordance,
}

/// Binds `canonical` to the container's live paragraphs as an in-order
/// subsequence. Live paragraphs that do not match the next canonical entry are
/// skipped; canonical entries that are never reached stay unbound.
pub fn bind_paragraphs(
    doc: &mut Document,
    container: NodeId,
    canonical: &[String],
    colors: Option<&[String]>,
    paragraph_tag: &str,
) -> Vec<ParagraphBinding> {
    let live = doc.elements_by_tag(container, paragraph_tag);
    let mut bindings = Vec::new();
    let mut next = 0;
    for (position, node) in live.into_iter().enumerate() {
        let Some(expected) = canonical.get(next) else {
            break;
        };
        let text = doc.inner_text(node);
        if text.trim() != expected.as_str() {
            continue;
        }
        let affordance = Affordance::attach(doc, node, next);
        bindings.push(ParagraphBinding {
            index: next,
            position,
            text: expected.clone(),
            node,
            affordance,
        });
        next += 1;
    }

    if let Some(colors) = colors.filter(|colors| colors.len() == canonical.len()) {
        for binding in &bindings {
            binding.affordance.set_color(doc, &colors[binding.index]);
        }
    }

    if bindings.len() < canonical.len() {
        tracing::trace!(
            bound = bindings.len(),
            canonical = canonical.len(),
            "some canonical paragraphs were not found on the page"
        );
    }
    bindings
}
