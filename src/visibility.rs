//! Per-paragraph viewport geometry, recomputed on every scroll-class event.

use serde::Serialize;

use crate::dom::NodeId;
use crate::layout::{Layout, Rect};
use crate::reidentify::ParagraphBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Top edge above the viewport, bottom edge inside it.
    TopClipped,
    /// Top edge inside the viewport, bottom edge below it.
    BottomClipped,
    /// Taller than the viewport and covering all of it.
    Spanning,
    Contained,
    #[default]
    Offscreen,
}

impl Visibility {
    /// Classifies `rect` against a viewport of `viewport` pixels and returns
    /// the visible share of its height.
    pub fn classify(rect: Rect, viewport: f64) -> (Self, f64) {
        let Rect { top, height } = rect;
        if height <= 0.0 || height.is_nan() {
            return (Self::Offscreen, 0.0);
        }
        let bottom = rect.bottom();
        let case = if top < 0.0 && bottom > viewport {
            (Self::Spanning, viewport / height)
        } else if top < 0.0 && bottom > 0.0 {
            (Self::TopClipped, bottom / height)
        } else if top > 0.0 && top < viewport && bottom > viewport {
            (Self::BottomClipped, (viewport - top) / height)
        } else if top > 0.0 && top < viewport {
            (Self::Contained, 1.0)
        } else {
            (Self::Offscreen, 0.0)
        };
        (case.0, case.1.clamp(0.0, 1.0))
    }

    pub fn is_clipped(self) -> bool {
        matches!(self, Self::TopClipped | Self::BottomClipped | Self::Spanning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollSpy {
    pub paragraph_index: usize,
    #[serde(skip)]
    pub node: NodeId,
    pub top: f64,
    pub visible_fraction: f64,
    pub in_viewport: bool,
    pub partially_clipped: bool,
    pub visibility: Visibility,
}

impl ScrollSpy {
    pub fn new(binding: &ParagraphBinding) -> Self {
        Self {
            paragraph_index: binding.index,
            node: binding.node,
            top: 0.0,
            visible_fraction: 0.0,
            in_viewport: false,
            partially_clipped: false,
            visibility: Visibility::Offscreen,
        }
    }

    pub fn measure(&mut self, layout: &dyn Layout) {
        let rect = layout.bounding_box(self.node);
        let (visibility, fraction) = Visibility::classify(rect, layout.viewport_height());
        self.top = rect.top;
        self.visibility = visibility;
        self.visible_fraction = fraction;
        self.in_viewport = visibility != Visibility::Offscreen;
        self.partially_clipped = visibility.is_clipped();
    }
}

/// Recomputes `spies` in place. The spy list is rebuilt only when the bindings
/// no longer line up with it.
pub fn update_spies(
    spies: &mut Vec<ScrollSpy>,
    bindings: &[ParagraphBinding],
    layout: &dyn Layout,
) {
    let aligned = spies.len() == bindings.len()
        && spies
            .iter()
            .zip(bindings)
            .all(|(spy, binding)| spy.node == binding.node);
    if !aligned {
        *spies = bindings.iter().map(ScrollSpy::new).collect();
    }
    for spy in spies.iter_mut() {
        spy.measure(layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSnapshot;
    use crate::reidentify::Affordance;

    fn binding(index: usize, node: usize) -> ParagraphBinding {
        ParagraphBinding {
            index,
            position: index,
            text: format!("p{index}"),
            node: NodeId(node),
            affordance: Affordance {
                input: NodeId(1000 + node),
                fill: NodeId(2000 + node),
            },
        }
    }

    fn classify(top: f64, height: f64) -> (Visibility, f64) {
        Visibility::classify(Rect::new(top, height), 800.0)
    }

    #[test]
    fn top_clipped_box_reports_its_remaining_share() {
        assert_eq!(classify(-50.0, 200.0), (Visibility::TopClipped, 0.75));
    }

    #[test]
    fn geometry_cases_are_exclusive() {
        assert_eq!(classify(700.0, 200.0), (Visibility::BottomClipped, 0.5));
        assert_eq!(classify(-100.0, 1600.0), (Visibility::Spanning, 0.5));
        assert_eq!(classify(1.0, 100.0), (Visibility::Contained, 1.0));
        assert_eq!(classify(300.0, 100.0), (Visibility::Contained, 1.0));
        assert_eq!(classify(-300.0, 100.0), (Visibility::Offscreen, 0.0));
        assert_eq!(classify(800.0, 100.0), (Visibility::Offscreen, 0.0));
        assert_eq!(classify(100.0, 0.0), (Visibility::Offscreen, 0.0));
    }

    #[test]
    fn a_top_edge_exactly_at_the_viewport_top_is_offscreen() {
        assert_eq!(classify(0.0, 100.0), (Visibility::Offscreen, 0.0));
        assert_eq!(classify(0.0, 1600.0), (Visibility::Offscreen, 0.0));
    }

    #[test]
    fn update_measures_every_binding() {
        let bindings = vec![binding(0, 5), binding(1, 9)];
        let layout = LayoutSnapshot::new(800.0)
            .with_box(NodeId(5), 0.0, 200.0)
            .with_box(NodeId(9), 1000.0, 200.0)
            .scrolled_to(50.0);

        let mut spies = Vec::new();
        update_spies(&mut spies, &bindings, &layout);

        assert_eq!(spies.len(), 2);
        assert!(spies[0].in_viewport);
        assert!(spies[0].partially_clipped);
        assert_eq!(spies[0].visible_fraction, 0.75);
        assert_eq!(spies[0].top, -50.0);
        assert!(!spies[1].in_viewport);
        assert_eq!(spies[1].visible_fraction, 0.0);
        assert_eq!(spies[1].paragraph_index, 1);
    }

    #[test]
    fn spies_are_recomputed_in_place() {
        let bindings = vec![binding(0, 5)];
        let layout = LayoutSnapshot::new(800.0).with_box(NodeId(5), 900.0, 100.0);

        let mut spies = Vec::new();
        update_spies(&mut spies, &bindings, &layout);
        assert_eq!(spies[0].visibility, Visibility::Offscreen);

        update_spies(&mut spies, &bindings, &layout.scrolled_to(400.0));
        assert_eq!(spies[0].visibility, Visibility::Contained);
        assert_eq!(spies[0].top, 500.0);
    }
}
