//! Owned document arena.
//!
//! Pages are parsed once with `scraper` and copied into a flat arena so the
//! extraction stages can clone, prune and rewrite subtrees without touching the
//! live tree. `NodeId`s are assigned in document order during parsing, which the
//! layout snapshots rely on.

use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "caption",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

const SKIPPED_TEXT_TAGS: &[&str] = &["script", "style", "template", "noscript", "head", "title"];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

impl Document {
    pub fn parse_html(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.import(&parsed);
        doc
    }

    /// Copies elements and text in document order, walking with an explicit
    /// stack so deeply nested markup cannot exhaust the call stack.
    fn import(&mut self, parsed: &Html) {
        let mut stack = vec![(*parsed.root_element(), None)];
        while let Some((node, parent)) = stack.pop() {
            match node.value() {
                Node::Text(text) => {
                    self.push_node(NodeKind::Text(text.to_string()), parent);
                }
                Node::Element(value) => {
                    let id = self.push_node(
                        NodeKind::Element(Element {
                            tag: value.name().to_ascii_lowercase(),
                            attrs: value
                                .attrs()
                                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                                .collect(),
                        }),
                        parent,
                    );
                    if parent.is_none() {
                        self.root = id;
                    }
                    let children: Vec<_> = node.children().collect();
                    stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
                }
                _ => {}
            }
        }
    }

    fn push_node(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// `<body>` of a parsed page; detached copies fall back to their root.
    pub fn body(&self) -> NodeId {
        self.child_element_by_tag(self.root, "body")
            .unwrap_or(self.root)
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_element_by_tag(self.root, "head")
    }

    fn child_element_by_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.tag(*child) == Some(tag))
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element(_))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element(element) => Some(element.tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node) == Some(tag)
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element(element) => element
                .attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn id(&self, node: NodeId) -> &str {
        self.attr(node, "id").unwrap_or("")
    }

    pub fn class_name(&self, node: NodeId) -> &str {
        self.attr(node, "class").unwrap_or("")
    }

    pub fn class_tokens(&self, node: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.class_name(node).split_ascii_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_tokens(node).any(|token| token == class)
    }

    /// Pre-order walk below `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(node).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |current| self.parent(*current))
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|node| self.has_tag(*node, tag))
            .collect()
    }

    pub fn first_matching<F>(&self, scope: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Self, NodeId) -> bool,
    {
        self.descendants(scope)
            .find(|node| self.is_element(*node) && predicate(self, *node))
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.first_matching(self.root, |doc, node| doc.id(node) == id)
    }

    /// Elements carrying every class token of `class_name`, like
    /// `getElementsByClassName`.
    pub fn elements_by_class(&self, class_name: &str) -> Vec<NodeId> {
        let wanted: Vec<&str> = class_name.split_ascii_whitespace().collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.descendants(self.root)
            .filter(|node| {
                self.is_element(*node) && wanted.iter().all(|class| self.has_class(*node, class))
            })
            .collect()
    }

    /// Element-child indices leading from `<body>` down to `node`.
    pub fn path_from_body(&self, node: NodeId) -> Option<Vec<usize>> {
        let body = self.body();
        let mut path = Vec::new();
        let mut current = node;
        while current != body {
            let parent = self.parent(current)?;
            let index = self.element_children(parent).position(|c| c == current)?;
            path.push(index);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        path.iter().try_fold(self.body(), |current, index| {
            self.element_children(current).nth(*index)
        })
    }

    /// Concatenation of every text node below `node`, as written.
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .filter_map(|child| self.text(child))
            .collect()
    }

    pub fn inner_text(&self, node: NodeId) -> String {
        let mut sink = TextSink::default();
        self.collect_text(node, &mut sink);
        sink.finish()
    }

    fn collect_text(&self, node: NodeId, sink: &mut TextSink) {
        let mut stack = vec![TextStep::Visit {
            node,
            preformatted: false,
        }];
        while let Some(step) = stack.pop() {
            let (node, preformatted) = match step {
                TextStep::Visit { node, preformatted } => (node, preformatted),
                TextStep::BlockEnd => {
                    sink.push_block_boundary();
                    continue;
                }
            };
            match self.kind(node) {
                NodeKind::Text(text) => sink.push_text(text, preformatted),
                NodeKind::Element(element) => {
                    let tag = element.tag.as_str();
                    if SKIPPED_TEXT_TAGS.contains(&tag) || self.attr(node, "hidden").is_some() {
                        continue;
                    }
                    if tag == "br" {
                        sink.push_line_break();
                        continue;
                    }
                    if is_block_tag(tag) {
                        sink.push_block_boundary();
                        stack.push(TextStep::BlockEnd);
                    }
                    let preformatted = preformatted || tag == "pre";
                    stack.extend(
                        self.children(node)
                            .iter()
                            .rev()
                            .map(|&node| TextStep::Visit { node, preformatted }),
                    );
                }
            }
        }
    }

    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push_node(
            NodeKind::Element(Element {
                tag: tag.to_ascii_lowercase(),
                attrs: attrs
                    .iter()
                    .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                    .collect(),
            }),
            None,
        )
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_owned()), None)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts `node` as the sibling immediately preceding `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(node);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(0);
        self.nodes[parent.0].children.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(node);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .map_or(self.nodes[parent.0].children.len(), |index| index + 1);
        self.nodes[parent.0].children.insert(position, node);
        self.nodes[node.0].parent = Some(parent);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[node.0].kind {
            match element
                .attrs
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value.to_owned(),
                None => element.attrs.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element(element) = &mut self.nodes[node.0].kind {
            element.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    /// Moves the children of `node` into a fresh `tag` element that takes its
    /// place in the tree. Returns the new element.
    pub fn replace_with_new(&mut self, node: NodeId, tag: &str) -> NodeId {
        let replacement = self.create_element(tag, &[]);
        for child in self.children(node).to_vec() {
            self.append_child(replacement, child);
        }
        self.insert_before(node, replacement);
        self.detach(node);
        replacement
    }

    /// Deep copy of `root` into a standalone document. Subtrees whose source
    /// node fails `keep` are left out.
    pub fn clone_subtree<F>(&self, root: NodeId, keep: F) -> Document
    where
        F: Fn(NodeId) -> bool,
    {
        let mut copy = Document {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let mut stack = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let id = copy.push_node(self.kind(node).clone(), parent);
            stack.extend(
                self.children(node)
                    .iter()
                    .rev()
                    .filter(|child| keep(**child))
                    .map(|&child| (child, Some(id))),
            );
        }
        copy
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let mut stack = vec![HtmlStep::Open(node)];
        while let Some(step) = stack.pop() {
            let node = match step {
                HtmlStep::Open(node) => node,
                HtmlStep::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };
            match self.kind(node) {
                NodeKind::Text(text) => out.push_str(&escape_text(text)),
                NodeKind::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for (name, value) in &element.attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                    out.push('>');
                    if VOID_TAGS.contains(&element.tag.as_str()) {
                        continue;
                    }
                    stack.push(HtmlStep::Close(&element.tag));
                    stack.extend(
                        self.children(node)
                            .iter()
                            .rev()
                            .map(|&child| HtmlStep::Open(child)),
                    );
                }
            }
        }
    }
}

enum TextStep {
    Visit { node: NodeId, preformatted: bool },
    BlockEnd,
}

enum HtmlStep<'a> {
    Open(NodeId),
    Close(&'a str),
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Number of `\S+` tokens in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Default)]
struct TextSink {
    out: String,
}

impl TextSink {
    fn push_text(&mut self, text: &str, preformatted: bool) {
        if preformatted {
            self.out.push_str(text);
            return;
        }
        for ch in text.chars() {
            if is_collapsible_space(ch) {
                if !self.out.is_empty() && !self.out.ends_with([' ', '\n']) {
                    self.out.push(' ');
                }
            } else {
                self.out.push(ch);
            }
        }
    }

    fn push_line_break(&mut self) {
        self.trim_trailing_spaces();
        self.out.push('\n');
    }

    fn push_block_boundary(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn trim_trailing_spaces(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
    }

    fn finish(self) -> String {
        self.out
            .split('\n')
            .map(|line| line.trim_matches(' '))
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_owned()
    }
}

fn is_collapsible_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', "&nbsp;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
