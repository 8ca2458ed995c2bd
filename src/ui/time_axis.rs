use egui::{Align2, FontId, Painter, Pos2, Rect, Stroke};

use crate::data::datetime::format_tick_time;
use crate::render::coordinates::TimeMapping;
use crate::state::theme::Theme;

/// Pixels reserved per tick label.
const PX_PER_TICK: f32 = 135.0;
const TICK_LENGTH: f32 = 7.0;

/// Tick steps, in seconds, used once the raw step reaches one second.
const TIME_STEPS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1_800.0, 3_600.0,
    7_200.0, 10_800.0, 21_600.0, 43_200.0, 86_400.0,
];

/// Number of labelled ticks that fit in `width` pixels.
pub fn tick_count(width: f32) -> usize {
    ((width - 200.0) / PX_PER_TICK).floor().max(1.0) as usize
}

/// A step close to `span / count`: 1-2-5 below a second, clock-friendly
/// steps above.
pub fn nice_time_step(span: f64, count: usize) -> f64 {
    let raw_step = span / count.max(1) as f64;
    if raw_step <= 0.0 || !raw_step.is_finite() {
        return 0.0;
    }

    if raw_step < 1.0 {
        let order = 10f64.powf(raw_step.log10().floor());
        let normalized = raw_step / order;
        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };
        return nice * order;
    }

    TIME_STEPS
        .iter()
        .copied()
        .find(|s| *s >= raw_step)
        .unwrap_or_else(|| (raw_step / 86_400.0).ceil() * 86_400.0)
}

/// Tick times inside `[start, end]` aligned to multiples of the step.
pub fn compute_time_ticks(start: f64, end: f64, count: usize) -> Vec<f64> {
    let step = nice_time_step(end - start, count);
    if step <= 0.0 {
        return Vec::new();
    }

    let first = (start / step).ceil() as i64;
    let last = (end / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Draws the axis into `rect`. Ticks start after `label_width` so they line
/// up with the waveform strips.
pub fn draw_time_axis(
    painter: &Painter,
    rect: Rect,
    label_width: f32,
    mapping: &TimeMapping,
    theme: Theme,
    draw_top_border: bool,
) {
    painter.rect_filled(rect, 0.0, theme.label_bg());
    if draw_top_border {
        painter.line_segment(
            [rect.left_top(), rect.right_top()],
            Stroke::new(1.0, theme.divider()),
        );
    }

    let strip_left = rect.left() + label_width;
    let width = rect.right() - strip_left;
    if width <= 0.0 {
        return;
    }

    let painter = painter.with_clip_rect(rect);
    let stroke = Stroke::new(1.0, theme.dim_text());
    let font = FontId::monospace(11.0);

    let ticks = compute_time_ticks(
        mapping.visible_start(),
        mapping.visible_end(),
        tick_count(rect.width()),
    );
    for t in ticks {
        let x = strip_left + mapping.time_to_x(t, width);
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.top() + TICK_LENGTH)],
            stroke,
        );
        painter.text(
            Pos2::new(x, rect.top() + TICK_LENGTH + 2.0),
            Align2::CENTER_TOP,
            format_tick_time(t),
            font.clone(),
            theme.text(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_count_follows_width() {
        assert_eq!(tick_count(100.0), 1);
        assert_eq!(tick_count(1_000.0), 5);
    }

    #[test]
    fn steps_are_clock_friendly() {
        assert_eq!(nice_time_step(100.0, 8), 15.0);
        assert_eq!(nice_time_step(3_600.0, 5), 900.0);
        assert!((nice_time_step(1.0, 8) - 0.2).abs() < 1e-12);
        assert_eq!(nice_time_step(0.0, 8), 0.0);
    }

    #[test]
    fn ticks_stay_inside_window() {
        let ticks = compute_time_ticks(3.0, 97.0, 8);
        assert_eq!(ticks.first().copied(), Some(15.0));
        assert_eq!(ticks.last().copied(), Some(90.0));
        assert!(ticks.windows(2).all(|w| (w[1] - w[0] - 15.0).abs() < 1e-9));
    }
}
