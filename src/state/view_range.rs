use serde::{Deserialize, Serialize};

/// Smallest visible width, as a fraction of the display window.
pub const MIN_VIEW_WIDTH: f64 = 0.001;

/// Visible part of the display window, as `[left, right]` fractions.
///
/// Always satisfies `0 <= left`, `right <= 1` and
/// `right - left >= MIN_VIEW_WIDTH`. The only way to build one is through
/// the normalizing constructors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct ViewRange {
    left: f64,
    right: f64,
}

impl ViewRange {
    pub const FULL: ViewRange = ViewRange { left: 0.0, right: 1.0 };

    /// Clamps into `[0, 1]` and enforces the minimum width, pushing `right`
    /// outward first and pulling `left` back when `right` hits the edge.
    pub fn new(start: f64, end: f64) -> Self {
        Self::with_min_width(start, end, MIN_VIEW_WIDTH)
    }

    pub fn with_min_width(start: f64, end: f64, min_width: f64) -> Self {
        let min_width = if min_width.is_finite() {
            min_width.clamp(f64::EPSILON, 1.0)
        } else {
            MIN_VIEW_WIDTH
        };
        let start = if start.is_finite() { start } else { 0.0 };
        let end = if end.is_finite() { end } else { 1.0 };

        let mut left = start.clamp(0.0, 1.0);
        let mut right = end.clamp(0.0, 1.0);
        if right < left + min_width {
            right = (left + min_width).min(1.0);
            if right - left < min_width {
                left = right - min_width;
            }
        }
        Self { left, right }
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Zooms by `pct` of the current width while keeping the point at
    /// `anchor` (a fraction of the visible window) fixed. Positive `pct`
    /// zooms out, negative zooms in.
    pub fn zoom_about(&self, pct: f64, anchor: f64) -> Self {
        let anchor = anchor.clamp(0.0, 1.0);
        let zoom = self.width() * pct / 2.0;
        Self::new(self.left - zoom * anchor, self.right + zoom * (1.0 - anchor))
    }

    /// Shifts the window by `pct` of its width, keeping the width when the
    /// shift would run past either edge.
    pub fn pan(&self, pct: f64) -> Self {
        let width = self.width();
        let shift = (width * pct).clamp(-self.left, 1.0 - self.right);
        Self {
            left: (self.left + shift).max(0.0),
            right: (self.right + shift).min(1.0),
        }
    }

    pub fn contains(&self, fraction: f64) -> bool {
        fraction >= self.left && fraction <= self.right
    }
}

impl Default for ViewRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<(f64, f64)> for ViewRange {
    fn from((start, end): (f64, f64)) -> Self {
        ViewRange::new(start, end)
    }
}

impl From<ViewRange> for (f64, f64) {
    fn from(view: ViewRange) -> Self {
        (view.left, view.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(v: ViewRange) {
        assert!(v.left() >= 0.0, "{v:?}");
        assert!(v.right() <= 1.0, "{v:?}");
        assert!(v.left() <= v.right(), "{v:?}");
        assert!(v.width() >= MIN_VIEW_WIDTH - 1e-12, "{v:?}");
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let cases = [
            (0.8, 0.2),
            (0.5, 0.5),
            (1.0, 1.0),
            (1.5, -0.3),
            (-2.0, -1.0),
            (0.9995, 0.9999),
            (f64::NAN, 0.5),
        ];
        for (s, e) in cases {
            assert_valid(ViewRange::new(s, e));
        }
    }

    #[test]
    fn equal_bounds_push_end_outward() {
        let v = ViewRange::new(0.4, 0.4);
        assert!((v.left() - 0.4).abs() < 1e-12);
        assert!((v.right() - 0.401).abs() < 1e-12);
    }

    #[test]
    fn collapsed_at_right_edge_pulls_start_back() {
        let v = ViewRange::new(1.0, 1.0);
        assert!((v.right() - 1.0).abs() < 1e-12);
        assert!((v.left() - 0.999).abs() < 1e-12);
    }

    #[test]
    fn zoom_about_keeps_anchor_fixed() {
        let v = ViewRange::new(0.2, 0.6);
        let anchor = 0.25;
        let anchored_before = v.left() + anchor * v.width();
        let zoomed = v.zoom_about(-0.4, anchor);
        let anchored_after = zoomed.left() + anchor * zoomed.width();
        assert!((anchored_before - anchored_after).abs() < 1e-12);
        assert!((zoomed.width() - 0.32).abs() < 1e-12);
    }

    #[test]
    fn zoom_out_is_clamped() {
        let v = ViewRange::new(0.0, 0.9).zoom_about(2.0, 0.5);
        assert_eq!(v, ViewRange::FULL);
    }

    #[test]
    fn pan_keeps_width_at_edges() {
        let v = ViewRange::new(0.7, 0.9);
        let panned = v.pan(0.4);
        assert!((panned.left() - 0.78).abs() < 1e-12);
        let hit_edge = panned.pan(1.0);
        assert!((hit_edge.right() - 1.0).abs() < 1e-12);
        assert!((hit_edge.width() - 0.2).abs() < 1e-12);
        let back = ViewRange::new(0.05, 0.25).pan(-1.0);
        assert_eq!(back.left(), 0.0);
        assert!((back.width() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn serde_as_tuple() {
        let json = serde_json::to_string(&ViewRange::new(0.25, 0.5)).expect("view range serializes");
        assert_eq!(json, "[0.25,0.5]");
        let parsed: ViewRange = serde_json::from_str("[0.9, 0.1]").expect("tuple parses");
        assert_valid(parsed);
        assert!((parsed.left() - 0.9).abs() < 1e-12);
        assert!((parsed.width() - MIN_VIEW_WIDTH).abs() < 1e-12);
        assert!(serde_json::from_str::<ViewRange>("[0.1]").is_err());
    }
}
