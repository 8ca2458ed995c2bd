//! Mappings between wall-clock time, normalized fractions, render-space
//! units and pixel offsets.
//!
//! Fractions passed to `time_to_fraction`/`fraction_to_time` are relative to
//! the whole display window. "View fractions" are relative to the visible
//! part of it, described by a [`ViewRange`].

use crate::state::view_range::ViewRange;

/// Render-space bounds a channel starts with before any display window is set.
pub const DEFAULT_GL_MIN: f64 = 0.0;
pub const DEFAULT_GL_MAX: f64 = 100.0;

/// Position of `time` within `[start, end]`, as a fraction of the span.
/// Times outside the window map outside `[0, 1]`. A zero-width window maps
/// every time to 0.
pub fn time_to_fraction(time: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if span.abs() < f64::EPSILON {
        return 0.0;
    }
    (time - start) / span
}

pub fn fraction_to_time(fraction: f64, start: f64, end: f64) -> f64 {
    start + fraction * (end - start)
}

/// Maps a fraction of the visible window back to time.
///
/// This is a single linear map from `[0, 1]` onto
/// `[start + left * span, start + right * span]`.
pub fn view_fraction_to_time(fraction: f64, view: ViewRange, start: f64, end: f64) -> f64 {
    let span = end - start;
    let visible_start = start + view.left() * span;
    let visible_end = start + view.right() * span;
    visible_start + fraction * (visible_end - visible_start)
}

pub fn time_to_view_fraction(time: f64, view: ViewRange, start: f64, end: f64) -> f64 {
    let span = end - start;
    let visible_start = start + view.left() * span;
    let visible_end = start + view.right() * span;
    time_to_fraction(time, visible_start, visible_end)
}

/// Maps time into a channel's orthographic camera space, where the display
/// window spans `[gl_min, gl_max]`.
pub fn time_to_render_units(time: f64, gl_min: f64, gl_max: f64, start: f64, end: f64) -> f64 {
    gl_min + time_to_fraction(time, start, end) * (gl_max - gl_min)
}

pub fn render_units_to_time(units: f64, gl_min: f64, gl_max: f64, start: f64, end: f64) -> f64 {
    let fraction = time_to_fraction(units, gl_min, gl_max);
    fraction_to_time(fraction, start, end)
}

/// Camera left/right for the visible part of `[gl_min, gl_max]`.
pub fn visible_render_range(gl_min: f64, gl_max: f64, view: ViewRange) -> (f64, f64) {
    let span = gl_max - gl_min;
    (gl_min + view.left() * span, gl_min + view.right() * span)
}

/// Rescales render-space bounds when the display window changes, so that a
/// render unit keeps meaning the same span of absolute time.
///
/// Returns the new `(gl_min, gl_max)`.
pub fn rescale_render_bounds(
    gl_min: f64,
    gl_max: f64,
    old_start: f64,
    old_end: f64,
    new_start: f64,
    new_end: f64,
) -> (f64, f64) {
    let old_span = old_end - old_start;
    if old_span.abs() < f64::EPSILON {
        return (gl_min, gl_max);
    }
    let scale = (gl_max - gl_min) / old_span;
    (
        gl_min - (old_start - new_start) * scale,
        gl_max + (new_end - old_end) * scale,
    )
}

/// The display window and view range of one viewport, with pixel helpers
/// for a horizontal extent of `width` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeMapping {
    pub start: f64,
    pub end: f64,
    pub view: ViewRange,
}

impl TimeMapping {
    pub fn new(start: f64, end: f64, view: ViewRange) -> Self {
        Self { start, end, view }
    }

    pub fn visible_start(&self) -> f64 {
        view_fraction_to_time(0.0, self.view, self.start, self.end)
    }

    pub fn visible_end(&self) -> f64 {
        view_fraction_to_time(1.0, self.view, self.start, self.end)
    }

    /// Pixel offset of `time` from the left edge of a `width`-pixel strip.
    pub fn time_to_x(&self, time: f64, width: f32) -> f32 {
        (time_to_view_fraction(time, self.view, self.start, self.end) * width as f64) as f32
    }

    pub fn x_to_time(&self, x: f32, width: f32) -> f64 {
        if width <= 0.0 {
            return self.visible_start();
        }
        view_fraction_to_time(x as f64 / width as f64, self.view, self.start, self.end)
    }

    /// Converts a pixel offset in the visible strip to a fraction of the
    /// whole display window.
    pub fn x_to_fraction(&self, x: f32, width: f32) -> f64 {
        time_to_fraction(self.x_to_time(x, width), self.start, self.end)
    }

    /// Time covered by one pixel.
    pub fn seconds_per_pixel(&self, width: f32) -> f64 {
        if width <= 0.0 {
            return 0.0;
        }
        (self.visible_end() - self.visible_start()) / width as f64
    }
}
