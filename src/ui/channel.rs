use egui::{Align2, FontId, Modifiers, Painter, Pos2, Rect, Shape, Stroke};

use crate::processing::geometry::BufferId;
use crate::processing::geometry_pool::{GeometryRequest, GeometryResponse};
use crate::processing::segment_cache::{ApplyOutcome, RenderWindow, SegmentCache};
use crate::render::coordinates::{
    rescale_render_bounds, time_to_render_units, visible_render_range, TimeMapping, DEFAULT_GL_MAX,
    DEFAULT_GL_MIN,
};
use crate::render::gpu_types::{ChannelDrawList, DrawMode, MaskGpuData, WaveformGpuData, WaveformUniforms};
use crate::render::gpu_waveform::create_waveform_paint_callback;
use crate::render::scene::{ChannelScene, MaskQuad, OrthoCamera};
use crate::state::amplitude::AmplitudeState;
use crate::state::entities::{
    Channel, DisplayType, Mask, MeasureWindowSelection, Selections, WaveformEvent,
};
use crate::state::theme::{rgba_to_color32, rgba_to_f32, Theme};
use crate::state::viewer_config::ChannelDefaults;
use crate::ui::gestures::{DragAxis, DragGesture, Step};

/// Pixels either side of a detection line that still grab it.
const DETECTION_GRAB_RADIUS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelGesture {
    ScalingAmplitude,
    SelectingMeasure,
    MovingMeasure,
    DraggingDetection(usize),
}

/// Pointer position handed to a channel, relative to its waveform strip.
#[derive(Debug, Clone, Copy)]
pub struct PointerContext<'a> {
    pub pos: Pos2,
    /// Pixels from the left edge of the strip.
    pub x: f32,
    pub width: f32,
    pub mapping: &'a TimeMapping,
}

impl PointerContext<'_> {
    pub fn time(&self) -> f64 {
        self.mapping.x_to_time(self.x, self.width)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressResult {
    /// Not for this channel; the viewport handles it.
    Ignored,
    /// A channel gesture started.
    Started,
    /// Handled immediately.
    Events(Vec<WaveformEvent>),
}

/// Arena key of a channel row.
pub fn channel_key(station_id: &str, channel_id: &str) -> String {
    format!("{station_id}/{channel_id}")
}

/// Masks ordered for drawing, paired with their priority. Wider masks come
/// first; the narrowest mask has the highest priority and lands on top.
pub fn mask_priorities(masks: &[Mask]) -> Vec<(u32, &Mask)> {
    let mut ordered: Vec<&Mask> = masks.iter().collect();
    ordered.sort_by(|a, b| b.duration().total_cmp(&a.duration()));
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, m)| (i as u32, m))
        .collect()
}

/// Ids of the masks containing `time`, narrowest first.
pub fn mask_hits(masks: &[Mask], time: f64) -> Vec<String> {
    let mut hits: Vec<&Mask> = masks.iter().filter(|m| m.contains(time)).collect();
    hits.sort_by(|a, b| a.duration().total_cmp(&b.duration()));
    hits.into_iter().map(|m| m.id.clone()).collect()
}

/// One channel's scene, camera, segment cache and interaction state.
pub struct ChannelRenderer {
    key: String,
    station_id: String,
    channel: Channel,
    is_measure_window: bool,
    scene: ChannelScene,
    cache: SegmentCache,
    amplitude: AmplitudeState,
    gl_min: f64,
    gl_max: f64,
    display_window: Option<(f64, f64)>,
    display_types: Vec<DisplayType>,
    line_width: f32,
    point_size: f32,
    gesture: DragGesture<ChannelGesture>,
    measure_overlay: Option<(f64, f64)>,
    /// Overlay in place when the current measure gesture armed.
    overlay_before_gesture: Option<(f64, f64)>,
    detection_drag_time: Option<f64>,
    retired: Vec<BufferId>,
}

impl ChannelRenderer {
    pub fn new(
        key: impl Into<String>,
        station_id: impl Into<String>,
        channel: Channel,
        is_measure_window: bool,
        drag_threshold_px: f32,
    ) -> Self {
        let key = key.into();
        Self {
            cache: SegmentCache::new(key.clone()),
            key,
            station_id: station_id.into(),
            channel,
            is_measure_window,
            scene: ChannelScene::new(),
            amplitude: AmplitudeState::default(),
            gl_min: DEFAULT_GL_MIN,
            gl_max: DEFAULT_GL_MAX,
            display_window: None,
            display_types: vec![DisplayType::Line],
            line_width: 1.0,
            point_size: 2.0,
            gesture: DragGesture::new(drag_threshold_px, DragAxis::Both),
            measure_overlay: None,
            overlay_before_gesture: None,
            detection_drag_time: None,
            retired: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel.id
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_measure_window(&self) -> bool {
        self.is_measure_window
    }

    pub fn scene(&self) -> &ChannelScene {
        &self.scene
    }

    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    pub fn render_bounds(&self) -> (f64, f64) {
        (self.gl_min, self.gl_max)
    }

    /// Takes a new snapshot of the channel and display window and reconciles
    /// the segment cache. Returns the geometry requests to submit.
    pub fn sync(
        &mut self,
        channel: &Channel,
        display_start: f64,
        display_end: f64,
        defaults: &ChannelDefaults,
    ) -> Vec<GeometryRequest> {
        match self.display_window {
            Some((old_start, old_end)) if (old_start, old_end) != (display_start, display_end) => {
                let (min, max) = rescale_render_bounds(
                    self.gl_min,
                    self.gl_max,
                    old_start,
                    old_end,
                    display_start,
                    display_end,
                );
                self.gl_min = min;
                self.gl_max = max;
            }
            _ => {}
        }
        self.display_window = Some((display_start, display_end));

        self.channel = channel.clone();
        self.display_types = if channel.display_types.is_empty() {
            defaults.display_types.clone()
        } else {
            channel.display_types.clone()
        };
        self.line_width = defaults.line_width;
        self.point_size = channel.point_size.unwrap_or(defaults.point_size);

        let window = RenderWindow {
            display_start,
            display_end,
            gl_min: self.gl_min,
            gl_max: self.gl_max,
        };
        let outcome = self
            .cache
            .reconcile(&self.channel, &self.display_types, window, &mut self.scene);
        self.retired.extend(outcome.retired);

        self.amplitude.recompute(self.cache.stats());
        self.rebuild_masks();

        outcome.requests
    }

    pub fn apply_geometry(&mut self, response: GeometryResponse) -> ApplyOutcome {
        self.cache.apply(response, &mut self.scene)
    }

    /// Buffers that left the scene since the last call.
    pub fn take_retired(&mut self) -> Vec<BufferId> {
        std::mem::take(&mut self.retired)
    }

    /// Drops the whole scene, e.g. before the record itself is dropped.
    pub fn retire_all(&mut self) -> Vec<BufferId> {
        let mut ids = self.take_retired();
        ids.extend(self.cache.invalidate(&mut self.scene));
        ids
    }

    pub fn amplitude(&self) -> &AmplitudeState {
        &self.amplitude
    }

    /// Camera bottom and top, after any manual adjustment.
    pub fn amplitude_bounds(&self) -> (f64, f64) {
        (self.amplitude.camera_bottom(), self.amplitude.camera_top())
    }

    pub fn reset_amplitude(&mut self) {
        self.amplitude.reset();
    }

    pub fn camera(&self, mapping: &TimeMapping) -> OrthoCamera {
        let (left, right) = visible_render_range(self.gl_min, self.gl_max, mapping.view);
        OrthoCamera {
            left,
            right,
            top: self.amplitude.camera_top(),
            bottom: self.amplitude.camera_bottom(),
        }
    }

    pub fn set_measure_overlay(&mut self, overlay: Option<(f64, f64)>) {
        self.measure_overlay = overlay;
    }

    pub fn measure_overlay(&self) -> Option<(f64, f64)> {
        self.measure_overlay
    }

    pub fn is_interacting(&self) -> bool {
        self.gesture.is_active()
    }

    fn rebuild_masks(&mut self) {
        if self.channel.has_only_empty_segment() {
            self.scene.set_masks(Vec::new());
            return;
        }
        let Some((start, end)) = self.display_window else {
            return;
        };

        let half = self.amplitude.top_max - self.amplitude.bottom_max;
        let center = (self.amplitude.top_max + self.amplitude.bottom_max) / 2.0;
        let quads = mask_priorities(&self.channel.masks)
            .into_iter()
            .map(|(priority, m)| MaskQuad {
                mask_id: m.id.clone(),
                x_min: time_to_render_units(m.start_time, self.gl_min, self.gl_max, start, end) as f32,
                x_max: time_to_render_units(m.end_time, self.gl_min, self.gl_max, start, end) as f32,
                y_min: (center - half) as f32,
                y_max: (center + half) as f32,
                color: m.color,
                priority,
            })
            .collect();
        self.scene.set_masks(quads);
    }

    fn detection_at(&self, ctx: &PointerContext<'_>) -> Option<usize> {
        self.channel
            .signal_detections
            .iter()
            .enumerate()
            .filter_map(|(i, sd)| {
                let dx = (ctx.mapping.time_to_x(sd.time, ctx.width) - ctx.x).abs();
                (dx <= DETECTION_GRAB_RADIUS).then_some((i, dx))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    // -- Pointer input ---------------------------------------------------

    /// Primary button pressed over this channel.
    pub fn press(
        &mut self,
        ctx: &PointerContext<'_>,
        modifiers: Modifiers,
        amplitude_key_held: bool,
    ) -> PressResult {
        if amplitude_key_held {
            self.gesture.arm(ChannelGesture::ScalingAmplitude, ctx.pos);
            return PressResult::Started;
        }

        if modifiers.alt && !self.is_measure_window {
            self.overlay_before_gesture = self.measure_overlay;
            self.gesture.arm(ChannelGesture::SelectingMeasure, ctx.pos);
            return PressResult::Started;
        }

        if modifiers.shift {
            let mask_ids = mask_hits(&self.channel.masks, ctx.time());
            return PressResult::Events(vec![WaveformEvent::MaskClick {
                channel_id: self.channel.id.clone(),
                mask_ids,
            }]);
        }

        if modifiers.command {
            return PressResult::Ignored;
        }

        if let Some(index) = self.detection_at(ctx) {
            self.gesture.arm(ChannelGesture::DraggingDetection(index), ctx.pos);
            return PressResult::Started;
        }

        if let Some((start, end)) = self.measure_overlay {
            let time = ctx.time();
            if !self.is_measure_window && time >= start && time <= end {
                self.overlay_before_gesture = self.measure_overlay;
                self.gesture.arm(ChannelGesture::MovingMeasure, ctx.pos);
                return PressResult::Started;
            }
        }

        PressResult::Ignored
    }

    pub fn drag(&mut self, ctx: &PointerContext<'_>) {
        let Some(kind) = self.gesture.kind() else {
            return;
        };
        let delta = match self.gesture.update(ctx.pos) {
            Step::None => return,
            Step::Started { delta } | Step::Moved { delta } => delta,
        };

        match kind {
            ChannelGesture::ScalingAmplitude => {
                self.amplitude.drag_step(-delta.y);
            }
            ChannelGesture::SelectingMeasure => {
                let origin_x = ctx.x - (ctx.pos.x - self.gesture.origin().x);
                let a = ctx.mapping.x_to_time(origin_x, ctx.width);
                let b = ctx.time();
                self.measure_overlay = Some((a.min(b), a.max(b)));
            }
            ChannelGesture::MovingMeasure => {
                if let Some((start, end)) = self.measure_overlay {
                    let dt = ctx.mapping.seconds_per_pixel(ctx.width) * delta.x as f64;
                    self.measure_overlay = Some((start + dt, end + dt));
                }
            }
            ChannelGesture::DraggingDetection(_) => {
                self.detection_drag_time = Some(ctx.time());
            }
        }
    }

    /// Primary button released. Returns what the gesture produced.
    pub fn release(&mut self, ctx: &PointerContext<'_>) -> Vec<WaveformEvent> {
        self.drag(ctx);
        let Some(commit) = self.gesture.release(ctx.pos) else {
            return Vec::new();
        };

        match commit.kind {
            ChannelGesture::ScalingAmplitude => Vec::new(),
            ChannelGesture::SelectingMeasure | ChannelGesture::MovingMeasure => {
                if !commit.dragged {
                    return Vec::new();
                }
                let Some((start_time, end_time)) = self.measure_overlay else {
                    return Vec::new();
                };
                vec![WaveformEvent::MeasureWindowUpdated {
                    selection: Some(MeasureWindowSelection {
                        station_id: self.station_id.clone(),
                        channel_id: self.channel.id.clone(),
                        start_time,
                        end_time,
                    }),
                }]
            }
            ChannelGesture::DraggingDetection(index) => {
                let drag_time = self.detection_drag_time.take();
                let Some(sd) = self.channel.signal_detections.get(index) else {
                    return Vec::new();
                };
                match (commit.dragged, drag_time) {
                    (true, Some(time)) => vec![WaveformEvent::SignalDetectionDragEnd {
                        channel_id: self.channel.id.clone(),
                        signal_detection_id: sd.id.clone(),
                        time,
                    }],
                    _ => vec![WaveformEvent::SignalDetectionClick {
                        channel_id: self.channel.id.clone(),
                        signal_detection_id: sd.id.clone(),
                    }],
                }
            }
        }
    }

    pub fn cancel_gesture(&mut self) {
        if matches!(
            self.gesture.kind(),
            Some(ChannelGesture::SelectingMeasure | ChannelGesture::MovingMeasure)
        ) {
            self.measure_overlay = self.overlay_before_gesture;
        }
        self.gesture.cancel();
        self.detection_drag_time = None;
    }

    // -- Drawing ---------------------------------------------------------

    /// GPU draw list for a camera already cropped to the visible rect.
    pub fn draw_list(
        &self,
        camera: &OrthoCamera,
        resolution: [f32; 2],
        retired: Vec<BufferId>,
    ) -> ChannelDrawList {
        let color = rgba_to_f32(self.channel.color_or_default());

        let masks = self
            .scene
            .masks()
            .iter()
            .map(|m| MaskGpuData {
                corners: [[m.x_min, m.y_min], [m.x_max, m.y_max]],
                color: rgba_to_f32(m.color),
            })
            .collect();

        let waveforms = self
            .scene
            .objects()
            .iter()
            .map(|o| WaveformGpuData {
                buffer: o.buffer.clone(),
                color,
                line_width: self.line_width,
                point_radius: self.point_size,
                draw_mode: match o.display_type {
                    DisplayType::Line => DrawMode::Polyline,
                    DisplayType::Scatter => DrawMode::Points,
                },
            })
            .collect();

        ChannelDrawList {
            masks,
            waveforms,
            uniforms_base: WaveformUniforms {
                view_proj: camera.projection().to_cols_array_2d(),
                color,
                resolution,
                line_width: self.line_width,
                point_radius: self.point_size,
            },
            retired,
        }
    }

    /// Draws the channel into `row`, clipped to `visible`. `row` is the
    /// waveform strip of this channel; `visible` is the part of it inside
    /// the viewport.
    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &self,
        painter: &Painter,
        row: Rect,
        visible: Rect,
        mapping: &TimeMapping,
        theme: Theme,
        selections: &Selections,
        retired: Vec<BufferId>,
    ) {
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            return;
        }
        let painter = painter.with_clip_rect(visible);
        let width = row.width();
        let x_at = |t: f64| row.left() + mapping.time_to_x(t, width);

        painter.rect_filled(visible, 0.0, theme.waveform_bg());
        if selections.channels.iter().any(|id| *id == self.channel.id) {
            painter.rect_filled(visible, 0.0, theme.selection_tint());
        }

        let small = FontId::proportional(10.0);

        for w in &self.channel.theoretical_phase_windows {
            let (l, r) = (x_at(w.start_time), x_at(w.end_time));
            let band = Rect::from_x_y_ranges(l.min(r)..=l.max(r), row.y_range());
            let color = rgba_to_color32(w.color);
            painter.rect_filled(band, 0.0, color.gamma_multiply(0.2));
            painter.text(
                Pos2::new(band.center().x, row.top() + 2.0),
                Align2::CENTER_TOP,
                &w.label,
                small.clone(),
                color,
            );
        }

        // Scope the camera to the part of the row on screen.
        let y0 = ((visible.top() - row.top()) / row.height()) as f64;
        let y1 = ((visible.bottom() - row.top()) / row.height()) as f64;
        let x0 = ((visible.left() - row.left()) / row.width()) as f64;
        let x1 = ((visible.right() - row.left()) / row.width()) as f64;
        let camera = self.camera(mapping).cropped(x0, x1, y0, y1);
        let list = self.draw_list(&camera, [visible.width(), visible.height()], retired);
        painter.add(create_waveform_paint_callback(visible, list));

        for sd in &self.channel.signal_detections {
            let x = x_at(sd.time);
            let selected = selections.signal_detections.iter().any(|id| *id == sd.id);
            let color = rgba_to_color32(sd.color);
            let stroke = if selected {
                Stroke::new(2.5, theme.text())
            } else {
                Stroke::new(1.5, color)
            };
            painter.line_segment([Pos2::new(x, row.top()), Pos2::new(x, row.bottom())], stroke);
            painter.text(
                Pos2::new(x + 3.0, row.top() + 2.0),
                Align2::LEFT_TOP,
                &sd.label,
                small.clone(),
                if selected { theme.text() } else { color },
            );
        }

        if let Some(time) = self.detection_drag_time {
            let x = x_at(time);
            painter.extend(Shape::dashed_line(
                &[Pos2::new(x, row.top()), Pos2::new(x, row.bottom())],
                Stroke::new(1.5, theme.text()),
                4.0,
                3.0,
            ));
        }

        if let Some((start, end)) = self.measure_overlay {
            let (l, r) = (x_at(start), x_at(end));
            let band = Rect::from_x_y_ranges(l.min(r)..=l.max(r), row.y_range());
            painter.rect_filled(band, 0.0, theme.measure_overlay());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::geometry::build_vertex_buffer;
    use crate::state::entities::{DataSegment, SignalDetection};
    use crate::state::view_range::ViewRange;
    use std::sync::Arc;

    fn mask(id: &str, start: f64, end: f64) -> Mask {
        Mask {
            id: id.to_string(),
            start_time: start,
            end_time: end,
            color: [200, 0, 0, 80],
        }
    }

    fn renderer(channel: Channel) -> ChannelRenderer {
        let mut r = ChannelRenderer::new("s1/c1", "s1", channel.clone(), false, 1.0);
        let requests = r.sync(&channel, 0.0, 100.0, &ChannelDefaults::default());
        for request in requests {
            let response = GeometryResponse {
                owner: request.owner.clone(),
                generation: request.generation,
                segment_id: request.segment_id(),
                result: build_vertex_buffer(&request.input).map(Arc::new),
            };
            r.apply_geometry(response);
        }
        r
    }

    const MAPPING: TimeMapping = TimeMapping {
        start: 0.0,
        end: 100.0,
        view: ViewRange::FULL,
    };

    fn ctx(x: f32) -> PointerContext<'static> {
        PointerContext {
            pos: Pos2::new(x, 10.0),
            x,
            width: 1000.0,
            mapping: &MAPPING,
        }
    }

    #[test]
    fn narrower_mask_has_higher_priority() {
        let masks = vec![mask("A", 10.0, 50.0), mask("B", 20.0, 30.0)];
        let order = mask_priorities(&masks);
        let priority = |id: &str| order.iter().find(|(_, m)| m.id == id).map(|(p, _)| *p);
        assert!(priority("B") > priority("A"));
    }

    #[test]
    fn mask_hits_narrowest_first() {
        let masks = vec![mask("A", 10.0, 50.0), mask("B", 20.0, 30.0), mask("C", 60.0, 70.0)];
        assert_eq!(mask_hits(&masks, 25.0), vec!["B".to_string(), "A".to_string()]);
        assert!(mask_hits(&masks, 55.0).is_empty());
    }

    #[test]
    fn masks_skipped_for_single_empty_segment() {
        let mut ch = Channel::new("c1", "BHZ", 1.0).with_segments(vec![DataSegment::new(0.0, Vec::new())]);
        ch.masks.push(mask("A", 10.0, 50.0));
        let r = renderer(ch);
        assert!(r.scene().masks().is_empty());
    }

    #[test]
    fn mask_quads_follow_render_units() {
        let mut ch = Channel::new("c1", "BHZ", 1.0).with_segments(vec![DataSegment::new(0.0, vec![-1.0, 1.0])]);
        ch.masks.push(mask("A", 10.0, 50.0));
        ch.masks.push(mask("B", 20.0, 30.0));
        let r = renderer(ch);
        let masks = r.scene().masks();
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[1].mask_id, "B");
        assert_eq!((masks[1].x_min, masks[1].x_max), (20.0, 30.0));
        assert!(masks[0].y_max > 1.0 && masks[0].y_min < -1.0);
    }

    #[test]
    fn shift_click_reports_masks() {
        let mut ch = Channel::new("c1", "BHZ", 1.0);
        ch.masks = vec![mask("A", 10.0, 50.0), mask("B", 20.0, 30.0)];
        let mut r = renderer(ch);
        let result = r.press(&ctx(250.0), Modifiers::SHIFT, false);
        assert_eq!(
            result,
            PressResult::Events(vec![WaveformEvent::MaskClick {
                channel_id: "c1".into(),
                mask_ids: vec!["B".into(), "A".into()],
            }])
        );
        assert_eq!(
            r.press(&ctx(900.0), Modifiers::SHIFT, false),
            PressResult::Events(vec![WaveformEvent::MaskClick {
                channel_id: "c1".into(),
                mask_ids: Vec::new(),
            }])
        );
    }

    #[test]
    fn amplitude_drag_and_reset() {
        let ch = Channel::new("c1", "BHZ", 1.0).with_segments(vec![DataSegment::new(0.0, vec![-2.0, 0.0, 4.0])]);
        let mut r = renderer(ch);
        let (bottom, top) = r.amplitude_bounds();
        assert!((top - 4.0).abs() < 1e-9);
        assert!((bottom + 8.0 / 3.0).abs() < 1e-9);

        assert_eq!(r.press(&ctx(100.0), Modifiers::NONE, true), PressResult::Started);
        let mut up = ctx(100.0);
        up.pos.y = 0.0;
        r.drag(&up);
        let range_after = r.amplitude().camera_range();
        assert!(range_after < top - bottom);
        r.release(&up);

        r.reset_amplitude();
        assert_eq!(r.amplitude_bounds(), (bottom, top));
    }

    #[test]
    fn alt_drag_selects_measure_window() {
        let ch = Channel::new("c1", "BHZ", 1.0);
        let mut r = renderer(ch);
        assert_eq!(r.press(&ctx(400.0), Modifiers::ALT, false), PressResult::Started);
        r.drag(&ctx(300.0));
        let events = r.release(&ctx(200.0));
        match events.as_slice() {
            [WaveformEvent::MeasureWindowUpdated {
                selection: Some(selection),
            }] => {
                assert_eq!(selection.station_id, "s1");
                assert_eq!(selection.channel_id, "c1");
                assert!((selection.start_time - 20.0).abs() < 1e-9);
                assert!((selection.end_time - 40.0).abs() < 1e-9);
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(r.measure_overlay().is_some());
    }

    #[test]
    fn cancelled_measure_drag_restores_overlay() {
        let mut r = renderer(Channel::new("c1", "BHZ", 1.0));
        r.press(&ctx(400.0), Modifiers::ALT, false);
        r.drag(&ctx(200.0));
        assert_eq!(r.measure_overlay(), Some((20.0, 40.0)));
        r.cancel_gesture();
        assert_eq!(r.measure_overlay(), None);
        assert!(!r.is_interacting());

        r.set_measure_overlay(Some((50.0, 60.0)));
        assert_eq!(r.press(&ctx(550.0), Modifiers::NONE, false), PressResult::Started);
        r.drag(&ctx(700.0));
        assert_ne!(r.measure_overlay(), Some((50.0, 60.0)));
        r.cancel_gesture();
        assert_eq!(r.measure_overlay(), Some((50.0, 60.0)));
    }

    #[test]
    fn alt_click_without_drag_selects_nothing() {
        let mut r = renderer(Channel::new("c1", "BHZ", 1.0));
        r.press(&ctx(400.0), Modifiers::ALT, false);
        assert!(r.release(&ctx(400.0)).is_empty());
    }

    #[test]
    fn measure_window_ignores_alt_drag() {
        let ch = Channel::new("c1", "BHZ", 1.0);
        let mut r = ChannelRenderer::new("measure", "s1", ch, true, 1.0);
        assert_eq!(r.press(&ctx(400.0), Modifiers::ALT, false), PressResult::Ignored);
    }

    #[test]
    fn detection_click_and_drag() {
        let mut ch = Channel::new("c1", "BHZ", 1.0);
        ch.signal_detections.push(SignalDetection {
            id: "sd1".into(),
            time: 30.0,
            label: "P".into(),
            color: [255, 0, 0, 255],
        });
        let mut r = renderer(ch);

        assert_eq!(r.press(&ctx(301.0), Modifiers::NONE, false), PressResult::Started);
        assert_eq!(
            r.release(&ctx(301.0)),
            vec![WaveformEvent::SignalDetectionClick {
                channel_id: "c1".into(),
                signal_detection_id: "sd1".into(),
            }]
        );

        r.press(&ctx(300.0), Modifiers::NONE, false);
        r.drag(&ctx(350.0));
        match r.release(&ctx(400.0)).as_slice() {
            [WaveformEvent::SignalDetectionDragEnd {
                channel_id,
                signal_detection_id,
                time,
            }] => {
                assert_eq!(channel_id, "c1");
                assert_eq!(signal_detection_id, "sd1");
                assert!((time - 40.0).abs() < 1e-9);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn plain_press_on_empty_area_is_left_to_viewport() {
        let mut r = renderer(Channel::new("c1", "BHZ", 1.0));
        assert_eq!(r.press(&ctx(500.0), Modifiers::NONE, false), PressResult::Ignored);
        assert_eq!(r.press(&ctx(500.0), Modifiers::COMMAND, false), PressResult::Ignored);
    }

    #[test]
    fn window_change_rescales_render_bounds() {
        let ch = Channel::new("c1", "BHZ", 1.0).with_segments(vec![DataSegment::new(0.0, vec![1.0, 2.0])]);
        let mut r = renderer(ch.clone());
        let requests = r.sync(&ch, -100.0, 100.0, &ChannelDefaults::default());
        assert_eq!(r.render_bounds(), (-100.0, 100.0));
        assert_eq!(requests.len(), 1);
        assert_eq!(r.take_retired().len(), 1);
    }

    #[test]
    fn camera_follows_view_range() {
        let r = renderer(Channel::new("c1", "BHZ", 1.0));
        let mapping = TimeMapping::new(0.0, 100.0, ViewRange::new(0.25, 0.5));
        let cam = r.camera(&mapping);
        assert_eq!((cam.left, cam.right), (25.0, 50.0));
        assert_eq!((cam.bottom, cam.top), (-1.0, 1.0));
    }
}
