use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke};

use crate::render::coordinates::{fraction_to_time, time_to_fraction, TimeMapping};
use crate::state::entities::{LineStyle, Markers, MoveableMarker, WaveformEvent};
use crate::state::theme::rgba_to_color32;
use crate::ui::gestures::{DragAxis, DragGesture, Step};

/// Pixels either side of a marker line that still grab it.
const GRAB_RADIUS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTarget {
    Moveable(usize),
    SelectionStart(usize),
    SelectionEnd(usize),
    SelectionFill(usize),
}

/// Keeps a paired marker on its side of the partner, at least `gap` away.
/// All values are fractions of the display window.
pub fn constrain_paired(fraction: f64, is_start: bool, partner: f64, gap: f64) -> f64 {
    if is_start && fraction + gap > partner {
        partner - gap
    } else if !is_start && fraction - gap < partner {
        partner + gap
    } else {
        fraction
    }
}

/// Keeps a marker on the waveform.
pub fn clamp_to_display(fraction: f64) -> f64 {
    fraction.clamp(0.0, 1.0)
}

/// Whether a selection window moved by `delta` fractions stays on the
/// display. A move that fails this is rejected outright.
pub fn fill_move_allowed(start: f64, end: f64, delta: f64) -> bool {
    start + delta >= 0.0 && end + delta <= 1.0
}

/// Vertical, moveable and selection-window markers over the waveform area.
pub struct MarkerLayer {
    markers: Markers,
    gesture: DragGesture<MarkerTarget>,
    min_gap: f64,
}

impl MarkerLayer {
    pub fn new(min_gap: f64, drag_threshold_px: f32) -> Self {
        Self {
            markers: Markers::default(),
            gesture: DragGesture::new(drag_threshold_px, DragAxis::Horizontal),
            min_gap,
        }
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Replaces the markers unless one is being dragged, in which case the
    /// local copy wins until release.
    pub fn set_markers(&mut self, markers: Markers) {
        if !self.gesture.is_active() {
            self.markers = markers;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_active()
    }

    /// Marker edges win over fills; later windows win over earlier ones.
    pub fn hit_test(&self, x: f32, width: f32, mapping: &TimeMapping) -> Option<MarkerTarget> {
        for (i, m) in self.markers.moveable_markers.iter().enumerate() {
            if (mapping.time_to_x(m.time, width) - x).abs() <= GRAB_RADIUS {
                return Some(MarkerTarget::Moveable(i));
            }
        }
        for (i, w) in self.markers.selection_windows.iter().enumerate().rev() {
            if !w.is_moveable {
                continue;
            }
            let sx = mapping.time_to_x(w.start.time, width);
            let ex = mapping.time_to_x(w.end.time, width);
            if (sx - x).abs() <= GRAB_RADIUS {
                return Some(MarkerTarget::SelectionStart(i));
            }
            if (ex - x).abs() <= GRAB_RADIUS {
                return Some(MarkerTarget::SelectionEnd(i));
            }
        }
        for (i, w) in self.markers.selection_windows.iter().enumerate().rev() {
            if !w.is_moveable {
                continue;
            }
            let sx = mapping.time_to_x(w.start.time, width);
            let ex = mapping.time_to_x(w.end.time, width);
            if x > sx && x < ex {
                return Some(MarkerTarget::SelectionFill(i));
            }
        }
        None
    }

    pub fn press(&mut self, target: MarkerTarget, pos: Pos2) -> bool {
        self.gesture.arm(target, pos)
    }

    /// Pointer moved to `x`, measured from the left of the waveform strip.
    pub fn drag_to(&mut self, pos: Pos2, x: f32, width: f32, mapping: &TimeMapping) {
        let Some(target) = self.gesture.kind() else {
            return;
        };
        let delta = match self.gesture.update(pos) {
            Step::None => return,
            Step::Started { delta } | Step::Moved { delta } => delta,
        };

        let (start, end) = (mapping.start, mapping.end);
        let fraction = clamp_to_display(mapping.x_to_fraction(x, width));

        match target {
            MarkerTarget::Moveable(i) => {
                if let Some(m) = self.markers.moveable_markers.get_mut(i) {
                    m.time = fraction_to_time(fraction, start, end);
                }
            }
            MarkerTarget::SelectionStart(i) | MarkerTarget::SelectionEnd(i) => {
                let is_start = matches!(target, MarkerTarget::SelectionStart(_));
                let Some(w) = self.markers.selection_windows.get_mut(i) else {
                    return;
                };
                let partner = if is_start { &w.end } else { &w.start };
                let partner = time_to_fraction(partner.time, start, end);
                let limited = constrain_paired(fraction, is_start, partner, self.min_gap);
                let time = fraction_to_time(clamp_to_display(limited), start, end);
                if is_start {
                    w.start.time = time;
                } else {
                    w.end.time = time;
                }
            }
            MarkerTarget::SelectionFill(i) => {
                let Some(w) = self.markers.selection_windows.get_mut(i) else {
                    return;
                };
                let dt = mapping.seconds_per_pixel(width) * delta.x as f64;
                let dfrac = time_to_fraction(start + dt, start, end);
                let sf = time_to_fraction(w.start.time, start, end);
                let ef = time_to_fraction(w.end.time, start, end);
                if fill_move_allowed(sf, ef, dfrac) {
                    w.start.time += dt;
                    w.end.time += dt;
                } else {
                    // Next delta is measured from the last accepted position.
                    self.gesture.hold_at(pos - delta);
                }
            }
        }
    }

    /// Ends a marker drag, reporting the markers that changed.
    pub fn release(&mut self, pos: Pos2) -> Option<WaveformEvent> {
        let commit = self.gesture.release(pos)?;
        let markers: Vec<MoveableMarker> = match commit.kind {
            MarkerTarget::Moveable(i) => self.markers.moveable_markers.get(i).cloned().into_iter().collect(),
            MarkerTarget::SelectionStart(i)
            | MarkerTarget::SelectionEnd(i)
            | MarkerTarget::SelectionFill(i) => self
                .markers
                .selection_windows
                .get(i)
                .map(|w| vec![w.start.clone(), w.end.clone()])
                .unwrap_or_default(),
        };
        if markers.is_empty() {
            return None;
        }
        Some(WaveformEvent::MoveableMarkersUpdated { markers })
    }

    pub fn cancel(&mut self) {
        self.gesture.cancel();
    }

    /// Draws every marker into `rect`, the visible waveform strip.
    pub fn paint(&self, painter: &Painter, rect: Rect, mapping: &TimeMapping) {
        let width = rect.width();

        for w in &self.markers.selection_windows {
            let sx = rect.left() + mapping.time_to_x(w.start.time, width);
            let ex = rect.left() + mapping.time_to_x(w.end.time, width);
            let fill = Rect::from_x_y_ranges(sx.min(ex)..=sx.max(ex), rect.y_range());
            painter.rect_filled(fill.intersect(rect), 0.0, rgba_to_color32(w.color));
            paint_marker_line(painter, rect, sx, rgba_to_color32(w.start.color), w.start.line_style);
            paint_marker_line(painter, rect, ex, rgba_to_color32(w.end.color), w.end.line_style);
        }

        for m in &self.markers.vertical_markers {
            let x = rect.left() + mapping.time_to_x(m.time, width);
            paint_marker_line(painter, rect, x, rgba_to_color32(m.color), m.line_style);
        }

        for m in &self.markers.moveable_markers {
            let x = rect.left() + mapping.time_to_x(m.time, width);
            paint_marker_line(painter, rect, x, rgba_to_color32(m.color), m.line_style);
        }
    }
}

fn paint_marker_line(painter: &Painter, rect: Rect, x: f32, color: Color32, style: LineStyle) {
    if x < rect.left() || x > rect.right() {
        return;
    }
    let stroke = Stroke::new(1.5, color);
    let top = Pos2::new(x, rect.top());
    let bottom = Pos2::new(x, rect.bottom());
    match style {
        LineStyle::Solid => {
            painter.line_segment([top, bottom], stroke);
        }
        LineStyle::Dashed => {
            painter.extend(Shape::dashed_line(&[top, bottom], stroke, 6.0, 4.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entities::SelectionWindow;
    use crate::state::view_range::ViewRange;

    fn marker(id: &str, time: f64) -> MoveableMarker {
        MoveableMarker {
            id: id.to_string(),
            color: [255, 0, 0, 255],
            line_style: LineStyle::Solid,
            time,
        }
    }

    fn layer_with_window(start: f64, end: f64) -> MarkerLayer {
        let mut layer = MarkerLayer::new(0.005, 1.0);
        layer.set_markers(Markers {
            selection_windows: vec![SelectionWindow {
                id: "w".into(),
                start: marker("start", start),
                end: marker("end", end),
                color: [200, 0, 0, 76],
                is_moveable: true,
            }],
            ..Default::default()
        });
        layer
    }

    const MAPPING: TimeMapping = TimeMapping {
        start: 0.0,
        end: 100.0,
        view: ViewRange::FULL,
    };

    #[test]
    fn start_marker_clamps_short_of_end() {
        // Display [0, 100], window [10, 20]; dragging start past end stops 0.5 s short.
        let mut layer = layer_with_window(10.0, 20.0);
        let width = 1000.0;
        assert_eq!(layer.hit_test(100.0, width, &MAPPING), Some(MarkerTarget::SelectionStart(0)));
        layer.press(MarkerTarget::SelectionStart(0), Pos2::new(100.0, 5.0));
        layer.drag_to(Pos2::new(250.0, 5.0), 250.0, width, &MAPPING);
        let w = &layer.markers().selection_windows[0];
        assert!((w.start.time - 19.5).abs() < 1e-9, "{}", w.start.time);
        assert!(w.start.time < w.end.time);

        let event = layer.release(Pos2::new(250.0, 5.0));
        match event {
            Some(WaveformEvent::MoveableMarkersUpdated { markers }) => {
                assert_eq!(markers.len(), 2);
                assert!((markers[0].time - 19.5).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn end_marker_clamps_past_start() {
        assert!((constrain_paired(0.05, false, 0.1, 0.005) - 0.105).abs() < 1e-12);
        assert_eq!(constrain_paired(0.5, false, 0.1, 0.005), 0.5);
    }

    #[test]
    fn fill_drag_moves_both_markers() {
        let mut layer = layer_with_window(10.0, 20.0);
        let width = 1000.0;
        assert_eq!(layer.hit_test(150.0, width, &MAPPING), Some(MarkerTarget::SelectionFill(0)));
        layer.press(MarkerTarget::SelectionFill(0), Pos2::new(150.0, 5.0));
        layer.drag_to(Pos2::new(200.0, 5.0), 200.0, width, &MAPPING);
        let w = &layer.markers().selection_windows[0];
        assert!((w.start.time - 15.0).abs() < 1e-9);
        assert!((w.end.time - 25.0).abs() < 1e-9);
    }

    #[test]
    fn fill_drag_off_the_edge_snaps_back() {
        let mut layer = layer_with_window(2.0, 20.0);
        let width = 1000.0;
        layer.press(MarkerTarget::SelectionFill(0), Pos2::new(100.0, 5.0));
        // 5 s left would put start at -3.
        layer.drag_to(Pos2::new(50.0, 5.0), 50.0, width, &MAPPING);
        let w = &layer.markers().selection_windows[0];
        assert_eq!((w.start.time, w.end.time), (2.0, 20.0));
        // Moving right from the rejected spot is measured from the last
        // accepted position (x = 100), so +1 s.
        layer.drag_to(Pos2::new(110.0, 5.0), 110.0, width, &MAPPING);
        let w = &layer.markers().selection_windows[0];
        assert!((w.start.time - 3.0).abs() < 1e-9, "{}", w.start.time);
    }

    #[test]
    fn single_moveable_marker_is_clamped_to_display() {
        let mut layer = MarkerLayer::new(0.005, 1.0);
        layer.set_markers(Markers {
            moveable_markers: vec![marker("m", 50.0)],
            ..Default::default()
        });
        layer.press(MarkerTarget::Moveable(0), Pos2::new(500.0, 0.0));
        layer.drag_to(Pos2::new(1500.0, 0.0), 1500.0, 1000.0, &MAPPING);
        assert_eq!(layer.markers().moveable_markers[0].time, 100.0);
    }

    #[test]
    fn incoming_markers_wait_for_release() {
        let mut layer = layer_with_window(10.0, 20.0);
        layer.press(MarkerTarget::SelectionFill(0), Pos2::new(150.0, 0.0));
        layer.set_markers(Markers::default());
        assert_eq!(layer.markers().selection_windows.len(), 1);
        layer.release(Pos2::new(150.0, 0.0));
        layer.set_markers(Markers::default());
        assert!(layer.markers().selection_windows.is_empty());
    }
}
