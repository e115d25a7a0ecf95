use crate::visibility::ScrollSpy;

/// The topmost paragraph that is on screen and more than `threshold` visible.
/// Equal tops resolve to the earlier spy.
pub fn select_dominant(spies: &[ScrollSpy], threshold: f64) -> Option<&ScrollSpy> {
    spies
        .iter()
        .filter(|spy| spy.in_viewport && spy.visible_fraction > threshold)
        .min_by(|a, b| a.top.total_cmp(&b.top))
}
