//! Viewport geometry.
//!
//! The engine never lays pages out itself; a renderer (or a recorded snapshot)
//! answers bounding-box queries through [`Layout`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};

/// Box of a node relative to the top of the viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

pub trait Layout {
    fn bounding_box(&self, node: NodeId) -> Rect;
    fn viewport_height(&self) -> f64;

    fn rendered_height(&self, node: NodeId) -> f64 {
        self.bounding_box(node).height
    }
}

/// Recorded layout of a page: document-space boxes plus the current scroll
/// offset. Nodes missing from the snapshot are treated as not rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub viewport_height: f64,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default)]
    pub boxes: HashMap<NodeId, Rect>,
}

impl LayoutSnapshot {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read layout snapshot: {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse layout snapshot: {}", path.display()))?;
        if snapshot.viewport_height.is_nan() || snapshot.viewport_height <= 0.0 {
            anyhow::bail!(
                "layout snapshot viewport_height must be positive: {}",
                snapshot.viewport_height
            );
        }
        Ok(snapshot)
    }

    pub fn with_box(mut self, node: NodeId, top: f64, height: f64) -> Self {
        self.boxes.insert(node, Rect::new(top, height));
        self
    }

    pub fn scrolled_to(&self, scroll_y: f64) -> Self {
        Self {
            scroll_y,
            ..self.clone()
        }
    }
}

impl Layout for LayoutSnapshot {
    fn bounding_box(&self, node: NodeId) -> Rect {
        match self.boxes.get(&node) {
            Some(rect) => Rect::new(rect.top - self.scroll_y, rect.height),
            None => Rect::default(),
        }
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }
}

/// Layout for pages parsed without a renderer. Only visibility is known: a
/// node hidden by attribute or inline style has zero height, anything else
/// is one pixel tall, one pixel below the top of the viewport.
pub struct StaticLayout<'a> {
    doc: &'a Document,
    viewport_height: f64,
}

impl<'a> StaticLayout<'a> {
    pub fn new(doc: &'a Document, viewport_height: f64) -> Self {
        Self {
            doc,
            viewport_height,
        }
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        std::iter::once(node)
            .chain(self.doc.ancestors(node))
            .any(|current| {
                self.doc.attr(current, "hidden").is_some()
                    || self
                        .doc
                        .attr(current, "style")
                        .is_some_and(hides_element)
            })
    }
}

impl Layout for StaticLayout<'_> {
    fn bounding_box(&self, node: NodeId) -> Rect {
        if self.is_hidden(node) {
            Rect::default()
        } else {
            Rect::new(1.0, 1.0)
        }
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }
}

fn hides_element(style: &str) -> bool {
    style.split(';').any(|declaration| {
        let Some((property, value)) = declaration.split_once(':') else {
            return false;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        (property == "display" && value == "none")
            || (property == "visibility" && value == "hidden")
    })
}
