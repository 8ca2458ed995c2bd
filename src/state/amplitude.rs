use crate::processing::statistics::SegmentStats;

/// Fraction of the current camera range applied per amplitude-drag step.
pub const AMPLITUDE_STEP_PCT: f64 = 0.05;

/// Vertical bounds of a channel's camera.
///
/// `top_max`/`bottom_max` come from the loaded segments; the manual
/// adjustment is accumulated from amplitude-scale drags and subtracted from
/// the top and added to the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeState {
    pub top_max: f64,
    pub bottom_max: f64,
    pub manual_adjustment: f64,
}

impl Default for AmplitudeState {
    fn default() -> Self {
        Self {
            top_max: 1.0,
            bottom_max: -1.0,
            manual_adjustment: 0.0,
        }
    }
}

impl AmplitudeState {
    /// Recomputes the autoscaled extrema from per-segment statistics.
    ///
    /// The center is the mean of the per-segment means, not a sample-weighted
    /// mean. The half-height is the largest distance from the center to any
    /// extreme; zero becomes 1. Without any samples the bounds are `[-1, 1]`.
    /// The manual adjustment is kept.
    pub fn recompute<'a>(&mut self, stats: impl IntoIterator<Item = &'a SegmentStats>) {
        let mut top = f64::NEG_INFINITY;
        let mut bottom = f64::INFINITY;
        let mut mean_sum = 0.0;
        let mut segments = 0usize;

        for s in stats {
            top = top.max(s.max);
            bottom = bottom.min(s.min);
            mean_sum += s.mean;
            segments += 1;
        }

        if segments == 0 {
            self.top_max = 1.0;
            self.bottom_max = -1.0;
            return;
        }

        let center = mean_sum / segments as f64;
        let offset = (top - center).abs().max((bottom - center).abs());
        let offset = if offset == 0.0 { 1.0 } else { offset };
        self.top_max = center + offset;
        self.bottom_max = center - offset;
    }

    pub fn camera_top(&self) -> f64 {
        self.top_max - self.manual_adjustment
    }

    pub fn camera_bottom(&self) -> f64 {
        self.bottom_max + self.manual_adjustment
    }

    pub fn camera_range(&self) -> f64 {
        (self.camera_top() - self.camera_bottom()).abs()
    }

    /// Applies one step of an amplitude drag. `dy_up` is the pointer movement
    /// in pixels, positive when moving up. Moving up zooms in (shrinks the
    /// range), moving down zooms out.
    pub fn drag_step(&mut self, dy_up: f32) {
        let step = self.camera_range() * AMPLITUDE_STEP_PCT;
        if dy_up > 0.0 {
            self.manual_adjustment += step;
        } else if dy_up < 0.0 {
            self.manual_adjustment -= step;
        }
    }

    pub fn reset(&mut self) {
        self.manual_adjustment = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_segments_defaults_to_unit_interval() {
        let mut amp = AmplitudeState::default();
        amp.recompute(std::iter::empty());
        assert_eq!((amp.camera_bottom(), amp.camera_top()), (-1.0, 1.0));
    }

    #[test]
    fn recenters_on_segment_mean() {
        let mut amp = AmplitudeState::default();
        let stats = SegmentStats::compute(&[-2.0, 0.0, 4.0]).into_iter().collect::<Vec<_>>();
        amp.recompute(stats.iter());
        let center = 2.0 / 3.0;
        assert!((amp.top_max - 4.0).abs() < 1e-9);
        assert!((amp.bottom_max - (center - 10.0 / 3.0)).abs() < 1e-9);
        assert!((amp.bottom_max + 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn center_is_mean_of_segment_means() {
        // Segment means 0 and 10 over very different sample counts.
        let a = SegmentStats::compute(&[0.0; 100]).into_iter();
        let b = SegmentStats::compute(&[10.0]).into_iter();
        let stats: Vec<_> = a.chain(b).collect();
        let mut amp = AmplitudeState::default();
        amp.recompute(stats.iter());
        // center 5, offset 5
        assert!((amp.top_max - 10.0).abs() < 1e-9);
        assert!(amp.bottom_max.abs() < 1e-9);
    }

    #[test]
    fn flat_signal_gets_unit_offset() {
        let stats: Vec<_> = SegmentStats::compute(&[3.0, 3.0]).into_iter().collect();
        let mut amp = AmplitudeState::default();
        amp.recompute(stats.iter());
        assert_eq!((amp.bottom_max, amp.top_max), (2.0, 4.0));
    }

    #[test]
    fn drag_accumulates_and_reset_restores() {
        let mut amp = AmplitudeState::default();
        amp.drag_step(3.0);
        // range 2 -> 5% is 0.1
        assert!((amp.camera_top() - 0.9).abs() < 1e-12);
        assert!((amp.camera_bottom() + 0.9).abs() < 1e-12);
        amp.drag_step(-1.0);
        assert!(amp.camera_range() > 1.8);
        amp.drag_step(0.0);
        amp.reset();
        assert_eq!((amp.camera_bottom(), amp.camera_top()), (-1.0, 1.0));
    }

    #[test]
    fn adjustment_survives_recompute() {
        let mut amp = AmplitudeState::default();
        amp.drag_step(1.0);
        let stats: Vec<_> = SegmentStats::compute(&[-5.0, 5.0]).into_iter().collect();
        amp.recompute(stats.iter());
        assert!((amp.camera_top() - (5.0 - 0.1)).abs() < 1e-12);
    }
}
