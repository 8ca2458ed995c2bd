//! The waveform display: station rows with a shared time axis, zoom and pan,
//! the zoom brush, markers and the measure window.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use egui::{
    Align2, Event, FontId, Key, Modifiers, MouseWheelUnit, PointerButton, Pos2, Rect, Sense,
    Stroke, Ui, Vec2,
};

use crate::data::datetime::format_time_range;
use crate::processing::geometry::BufferId;
use crate::processing::geometry_pool::{GeometryPool, GeometryRequest, GeometryResponse};
use crate::processing::segment_cache::ApplyOutcome;
use crate::render::coordinates::{time_to_fraction, TimeMapping};
use crate::state::entities::{
    find_channel, Markers, MeasureWindowSelection, Selections, Station, WaveformEvent,
};
use crate::state::theme::Theme;
use crate::state::view_range::ViewRange;
use crate::state::viewer_config::ViewerConfig;
use crate::ui::channel::{channel_key, ChannelRenderer, PointerContext, PressResult};
use crate::ui::gestures::{DragAxis, DragGesture};
use crate::ui::markers::MarkerLayer;
use crate::ui::measure_window::MeasureWindow;
use crate::ui::station_label::{
    show_channel_label, station_has_hidden_masks, ChannelLabelInfo, LabelAction,
};
use crate::ui::time_axis::draw_time_axis;

/// Wheel notch size in points for pixel-precise scroll devices.
const POINTS_PER_NOTCH: f32 = 50.0;
const MIN_THUMB_WIDTH: f32 = 8.0;

/// Horizontal layout of the scrollable content for the current view range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentLayout {
    pub content_width: f32,
    pub scroll_left: f32,
}

impl ContentLayout {
    pub fn new(viewport_width: f32, view: ViewRange) -> Self {
        let content_width = (viewport_width as f64 / view.width()) as f32;
        Self {
            content_width,
            scroll_left: (view.left() * content_width as f64) as f32,
        }
    }
}

/// One channel row, in content coordinates (before vertical scroll).
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    pub key: String,
    pub station_id: String,
    pub channel_id: String,
    pub top: f32,
    pub height: f32,
    pub sub_channel: bool,
}

impl RowLayout {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// Rows for every station's default channel, plus the other channels of
/// expanded stations.
pub fn layout_rows(stations: &[Station], expanded: &HashSet<String>, default_height: f32) -> Vec<RowLayout> {
    let mut rows = Vec::new();
    let mut top = 0.0;
    for station in stations {
        let height = station.height.unwrap_or(default_height);
        let mut push = |channel_id: &str, sub_channel: bool| {
            rows.push(RowLayout {
                key: channel_key(&station.id, channel_id),
                station_id: station.id.clone(),
                channel_id: channel_id.to_string(),
                top,
                height,
                sub_channel,
            });
            top += height;
        };
        push(&station.default_channel.id, false);
        if expanded.contains(&station.id) {
            for channel in &station.non_default_channels {
                push(&channel.id, true);
            }
        }
    }
    rows
}

/// A row is drawn unless it lies entirely above or below the viewport.
pub fn row_visible(top: f32, bottom: f32, view_top: f32, view_bottom: f32) -> bool {
    !(bottom < view_top || top > view_bottom)
}

/// Rows intersecting a viewport of `height` scrolled down by `scroll_y`.
pub fn visible_rows(rows: &[RowLayout], scroll_y: f32, height: f32) -> Vec<&RowLayout> {
    rows.iter()
        .filter(|r| row_visible(r.top, r.bottom(), scroll_y, scroll_y + height))
        .collect()
}

/// Sums mouse wheel events into notches; positive is away from the user.
fn wheel_notches(events: &[Event]) -> f32 {
    events
        .iter()
        .filter_map(|e| match e {
            Event::MouseWheel { unit, delta, .. } => {
                // Shift may have turned vertical scrolling horizontal.
                let d = if delta.y != 0.0 { delta.y } else { delta.x };
                Some(match unit {
                    MouseWheelUnit::Point => d / POINTS_PER_NOTCH,
                    MouseWheelUnit::Line => d,
                    MouseWheelUnit::Page => d * 3.0,
                })
            }
            _ => None,
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrushKind {
    Zoom,
    Click,
}

/// Which part of the display owns the current primary-button press.
#[derive(Debug, Clone, PartialEq)]
enum ActiveInput {
    Markers,
    Channel(String),
    Brush { channel_id: String },
    Scrollbar { last_x: f32 },
}

struct FrameInput {
    pointer: Option<Pos2>,
    hover: Option<Pos2>,
    pressed: bool,
    released: bool,
    down: bool,
    secondary_clicked: bool,
    double_clicked: bool,
    modifiers: Modifiers,
    wheel: f32,
    scroll_y: f32,
    keys: Vec<(Key, Modifiers)>,
    amplitude_key_held: bool,
}

/// Areas of one frame.
#[derive(Debug, Clone, Copy)]
struct FrameRects {
    rows: Rect,
    strips: Rect,
    scrollbar: Rect,
    axis: Rect,
    measure: Rect,
}

pub struct WaveformDisplay {
    config: ViewerConfig,
    display_start: f64,
    display_end: f64,
    stations: Vec<Station>,
    expanded: HashSet<String>,
    rows: Vec<RowLayout>,
    view_range: ViewRange,
    default_zoom_window: Option<(f64, f64)>,
    markers: MarkerLayer,
    selections: Selections,
    channels: HashMap<String, ChannelRenderer>,
    measure: MeasureWindow,
    pool: GeometryPool,
    retired: Vec<BufferId>,
    viewport_width: Option<f32>,
    layout: Option<ContentLayout>,
    scroll_y: f32,
    brush: DragGesture<BrushKind>,
    active: Option<ActiveInput>,
    repaint: Option<egui::Context>,
    last_strips_rect: Option<Rect>,
}

impl WaveformDisplay {
    /// Creates the display, spawns the geometry workers and requests
    /// geometry for every laid-out channel.
    pub fn mount(config: ViewerConfig, start: f64, end: f64, stations: Vec<Station>) -> Self {
        let pool = GeometryPool::new(config.resolved_worker_count());
        tracing::info!(
            "Mounting waveform display: {} stations, {} geometry workers",
            stations.len(),
            pool.size()
        );

        let mut display = Self {
            markers: MarkerLayer::new(config.marker_min_gap, config.drag_threshold_px),
            measure: MeasureWindow::new(&config),
            brush: DragGesture::new(config.drag_threshold_px, DragAxis::Horizontal),
            config,
            display_start: start,
            display_end: end,
            stations,
            expanded: HashSet::new(),
            rows: Vec::new(),
            view_range: ViewRange::FULL,
            default_zoom_window: None,
            selections: Selections::default(),
            channels: HashMap::new(),
            pool,
            retired: Vec::new(),
            viewport_width: None,
            layout: None,
            scroll_y: 0.0,
            active: None,
            repaint: None,
            last_strips_rect: None,
        };
        display.sync_channels();
        display
    }

    // -- Host inputs -----------------------------------------------------

    pub fn set_stations(&mut self, stations: Vec<Station>) {
        self.stations = stations;
        self.expanded
            .retain(|id| self.stations.iter().any(|s| s.id == *id));
        self.sync_channels();
        self.refresh();
    }

    pub fn set_display_window(&mut self, start: f64, end: f64) {
        if (start, end) == (self.display_start, self.display_end) {
            return;
        }
        tracing::debug!("Display window [{start:.3}, {end:.3}]");
        self.display_start = start;
        self.display_end = end;
        self.sync_channels();
        self.refresh();
    }

    pub fn set_markers(&mut self, markers: Markers) {
        self.markers.set_markers(markers);
        self.refresh();
    }

    pub fn set_selections(&mut self, selections: Selections) {
        self.selections = selections;
        self.refresh();
    }

    /// Time window restored by a double-click. `None` restores the full
    /// display window.
    pub fn set_default_zoom_window(&mut self, window: Option<(f64, f64)>) {
        self.default_zoom_window = window;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.config.theme = theme;
        self.refresh();
    }

    pub fn theme(&self) -> Theme {
        self.config.theme
    }

    /// Lets geometry workers wake the UI when a result is ready.
    pub fn set_repaint_context(&mut self, ctx: egui::Context) {
        self.pool.set_repaint_context(ctx.clone());
        self.repaint = Some(ctx);
    }

    /// Viewport width used for the content layout before the first frame.
    pub fn set_viewport_width(&mut self, width: f32) {
        if width > 0.0 {
            self.viewport_width = Some(width);
            self.layout = Some(ContentLayout::new(width, self.view_range));
        }
    }

    // -- Imperative API --------------------------------------------------

    pub fn refresh(&self) {
        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
    }

    /// Drops every built waveform and requests all geometry again.
    pub fn refresh_waveforms(&mut self) {
        for record in self.channels.values_mut() {
            self.retired.extend(record.retire_all());
        }
        self.sync_channels();
        self.refresh();
    }

    /// Sets the view range to `[start, end]` (fractions of the display
    /// window), normalized to the minimum width.
    pub fn zoom(&mut self, start: f64, end: f64) {
        self.view_range = ViewRange::with_min_width(start, end, self.config.min_view_width);
        if let Some(width) = self.viewport_width {
            self.layout = Some(ContentLayout::new(width, self.view_range));
        }
        tracing::debug!(
            "Zoom to [{:.4}, {:.4}]",
            self.view_range.left(),
            self.view_range.right()
        );
        self.refresh();
    }

    /// Zooms by `pct` of the view width keeping `anchor` (a fraction of the
    /// visible window) fixed. Negative `pct` zooms in.
    pub fn zoom_by_percentage_to_point(&mut self, pct: f64, anchor: f64) {
        let next = self.view_range.zoom_about(pct, anchor);
        self.zoom(next.left(), next.right());
    }

    pub fn pan_by_percentage(&mut self, pct: f64) {
        let next = self.view_range.pan(pct);
        self.zoom(next.left(), next.right());
    }

    pub fn zoom_to_time_window(&mut self, start: f64, end: f64) {
        let clamp = |t: f64| t.clamp(self.display_start, self.display_end);
        let a = time_to_fraction(clamp(start), self.display_start, self.display_end);
        let b = time_to_fraction(clamp(end), self.display_start, self.display_end);
        self.zoom(a.min(b), a.max(b));
    }

    pub fn toggle_measure_window_visibility(&mut self) {
        if let Some(key) = self.measure.toggle_visibility() {
            self.clear_overlay(&key);
        }
        self.refresh();
    }

    /// Opens the measure window on a selection, as an Alt-drag does.
    pub fn select_measure_window(&mut self, selection: MeasureWindowSelection) {
        let key = channel_key(&selection.station_id, &selection.channel_id);
        let overlay = (selection.start_time, selection.end_time);
        let outcome = self
            .measure
            .select(selection, &self.stations, &self.config.channel_defaults);
        if let Some(old) = outcome.clear_overlay {
            self.clear_overlay(&old);
        }
        if let Some(record) = self.channels.get_mut(&key) {
            record.set_measure_overlay(Some(overlay));
        }
        self.submit(outcome.requests);
        self.refresh();
    }

    pub fn reset_amplitude(&mut self, channel_id: &str) {
        for record in self.channels.values_mut() {
            if record.channel_id() == channel_id {
                record.reset_amplitude();
            }
        }
        self.measure.reset_amplitude(Some(channel_id));
        self.refresh();
    }

    pub fn reset_all_amplitudes(&mut self) {
        for record in self.channels.values_mut() {
            record.reset_amplitude();
        }
        self.measure.reset_amplitude(None);
        self.refresh();
    }

    /// Flips a station's expansion and reports which way it went.
    pub fn toggle_expansion(&mut self, station_id: &str) -> Option<WaveformEvent> {
        if !self.stations.iter().any(|s| s.id == station_id) {
            return None;
        }
        let station_id = station_id.to_string();
        let event = if self.expanded.remove(&station_id) {
            WaveformEvent::ChannelCollapsed { station_id }
        } else {
            self.expanded.insert(station_id.clone());
            WaveformEvent::ChannelExpanded { station_id }
        };
        self.sync_channels();
        self.refresh();
        Some(event)
    }

    // -- Queries ---------------------------------------------------------

    pub fn view_range(&self) -> ViewRange {
        self.view_range
    }

    pub fn display_window(&self) -> (f64, f64) {
        (self.display_start, self.display_end)
    }

    pub fn content_layout(&self) -> Option<ContentLayout> {
        self.layout
    }

    pub fn rows(&self) -> &[RowLayout] {
        &self.rows
    }

    pub fn is_expanded(&self, station_id: &str) -> bool {
        self.expanded.contains(station_id)
    }

    pub fn channel_renderer(&self, station_id: &str, channel_id: &str) -> Option<&ChannelRenderer> {
        self.channels.get(&channel_key(station_id, channel_id))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn measure_window(&self) -> &MeasureWindow {
        &self.measure
    }

    pub fn markers(&self) -> &Markers {
        self.markers.markers()
    }

    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Buffer ids waiting to be evicted by the next paint callback.
    pub fn pending_retired(&self) -> &[BufferId] {
        &self.retired
    }

    /// Waveform strip area of the last frame, in screen points.
    pub fn last_strips_rect(&self) -> Option<Rect> {
        self.last_strips_rect
    }

    pub fn mapping(&self) -> TimeMapping {
        TimeMapping::new(self.display_start, self.display_end, self.view_range)
    }

    /// Blocks until every outstanding geometry build is back or `timeout`
    /// passes, and applies the results. Returns how many arrived.
    pub fn wait_for_geometry(&mut self, timeout: Duration) -> usize {
        let responses = self.pool.wait_for(self.pool.in_flight(), timeout);
        let count = responses.len();
        self.apply_responses(responses);
        count
    }

    // -- Reconciliation --------------------------------------------------

    fn sync_channels(&mut self) {
        let rows = layout_rows(
            &self.stations,
            &self.expanded,
            self.config.default_station_height,
        );
        let defaults = self.config.channel_defaults.clone();

        let keep: HashSet<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        let dropped: Vec<String> = self
            .channels
            .keys()
            .filter(|k| !keep.contains(k.as_str()))
            .cloned()
            .collect();
        for key in dropped {
            if let Some(mut record) = self.channels.remove(&key) {
                tracing::debug!("Unmounting channel {key}");
                self.retired.extend(record.retire_all());
            }
        }
        if matches!(&self.active, Some(ActiveInput::Channel(key)) if !self.channels.contains_key(key)) {
            self.active = None;
        }

        let mut requests = Vec::new();
        for row in &rows {
            let Some(channel) = find_channel(&self.stations, &row.station_id, &row.channel_id) else {
                continue;
            };
            let record = self.channels.entry(row.key.clone()).or_insert_with(|| {
                ChannelRenderer::new(
                    row.key.clone(),
                    row.station_id.clone(),
                    channel.clone(),
                    false,
                    self.config.drag_threshold_px,
                )
            });
            requests.extend(record.sync(channel, self.display_start, self.display_end, &defaults));
            self.retired.extend(record.take_retired());
        }

        requests.extend(self.measure.refresh(&self.stations, &defaults));
        self.retired.extend(self.measure.take_retired());
        if let Some(selection) = self.measure.selection() {
            let key = channel_key(&selection.station_id, &selection.channel_id);
            let overlay = (selection.start_time, selection.end_time);
            if let Some(record) = self.channels.get_mut(&key) {
                if !record.is_interacting() {
                    record.set_measure_overlay(Some(overlay));
                }
            }
        }

        self.rows = rows;
        self.submit(requests);
    }

    fn submit(&mut self, requests: Vec<GeometryRequest>) {
        for request in requests {
            if let Err(e) = self.pool.submit(request) {
                tracing::warn!("Geometry request not submitted: {e}");
            }
        }
    }

    fn drain_geometry(&mut self) {
        let responses = self.pool.drain();
        if !responses.is_empty() {
            self.apply_responses(responses);
        }
    }

    fn apply_responses(&mut self, responses: Vec<GeometryResponse>) {
        for response in responses {
            let owner = response.owner.clone();
            let segment = response.segment_id.get();
            let outcome = if MeasureWindow::owns(&owner) {
                self.measure.apply(response)
            } else {
                match self.channels.get_mut(&owner) {
                    Some(record) => record.apply_geometry(response),
                    None => ApplyOutcome::Discarded,
                }
            };
            match outcome {
                ApplyOutcome::Applied => {}
                ApplyOutcome::Discarded => {
                    tracing::debug!("Discarded stale geometry for {owner} segment {segment}");
                }
                ApplyOutcome::Failed(e) => {
                    tracing::warn!("Geometry build failed for {owner} segment {segment}: {e}");
                }
            }
        }
    }

    fn clear_overlay(&mut self, key: &str) {
        if let Some(record) = self.channels.get_mut(key) {
            record.set_measure_overlay(None);
        }
    }

    /// Forwards an event to the host, acting on the ones the display itself
    /// cares about first.
    fn route(&mut self, event: WaveformEvent, events: &mut Vec<WaveformEvent>) {
        if let WaveformEvent::MeasureWindowUpdated {
            selection: Some(selection),
        } = &event
        {
            self.select_measure_window(selection.clone());
        }
        events.push(event);
    }

    // -- Frame -----------------------------------------------------------

    /// Draws the display into the remaining space of `ui` and returns the
    /// events produced this frame.
    pub fn show(&mut self, ui: &mut Ui) -> Vec<WaveformEvent> {
        let mut events = Vec::new();
        self.drain_geometry();

        let (rect, _) = ui.allocate_exact_size(ui.available_size(), Sense::hover());
        let cfg = &self.config;
        if rect.width() <= cfg.label_width || rect.height() <= cfg.time_axis_height + cfg.scrollbar_height {
            return events;
        }

        let rects = self.frame_rects(rect);
        self.last_strips_rect = Some(rects.strips);
        self.viewport_width = Some(rects.strips.width());
        self.layout = Some(ContentLayout::new(rects.strips.width(), self.view_range));

        let total_height = self.rows.last().map(|r| r.bottom()).unwrap_or(0.0);
        let max_scroll = (total_height - rects.rows.height()).max(0.0);
        self.scroll_y = self.scroll_y.clamp(0.0, max_scroll);

        let input = self.frame_input(ui);
        let _ = ui.interact(
            rects.strips.union(rects.scrollbar),
            ui.id().with("waveform-strips"),
            Sense::click_and_drag(),
        );

        self.handle_pointer(&input, &rects, &mut events);
        self.handle_wheel(&input, &rects);
        self.handle_keys(&input, &rects, &mut events);

        for record in self.channels.values_mut() {
            self.retired.extend(record.take_retired());
        }
        self.retired.extend(self.measure.take_retired());

        self.paint(ui, &input, &rects, &mut events);

        if self.pool.in_flight() > 0 {
            ui.ctx().request_repaint();
        }
        tracing::trace!(
            "Frame: {} rows, {} in flight, {} retired pending",
            self.rows.len(),
            self.pool.in_flight(),
            self.retired.len()
        );
        events
    }

    fn frame_rects(&self, rect: Rect) -> FrameRects {
        let cfg = &self.config;
        let measure_height = self
            .measure
            .total_height()
            .min(rect.height() - cfg.time_axis_height - cfg.scrollbar_height)
            .max(0.0);
        let measure = Rect::from_min_size(rect.min, Vec2::new(rect.width(), measure_height));
        let axis = Rect::from_min_max(
            Pos2::new(rect.left(), rect.bottom() - cfg.time_axis_height),
            rect.max,
        );
        let scrollbar = Rect::from_min_max(
            Pos2::new(rect.left() + cfg.label_width, axis.top() - cfg.scrollbar_height),
            Pos2::new(rect.right(), axis.top()),
        );
        let rows = Rect::from_min_max(
            Pos2::new(rect.left(), measure.bottom()),
            Pos2::new(rect.right(), scrollbar.top()),
        );
        let strips = Rect::from_min_max(Pos2::new(rows.left() + cfg.label_width, rows.top()), rows.max);
        FrameRects {
            rows,
            strips,
            scrollbar,
            axis,
            measure,
        }
    }

    fn frame_input(&self, ui: &Ui) -> FrameInput {
        let hotkeys = &self.config.hotkeys;
        ui.input(|i| FrameInput {
            pointer: i.pointer.interact_pos(),
            hover: i.pointer.hover_pos(),
            pressed: i.pointer.primary_pressed(),
            released: i.pointer.primary_released(),
            down: i.pointer.primary_down(),
            secondary_clicked: i.pointer.button_clicked(PointerButton::Secondary),
            double_clicked: i.pointer.button_double_clicked(PointerButton::Primary),
            modifiers: i.modifiers,
            wheel: wheel_notches(&i.events),
            scroll_y: i.smooth_scroll_delta.y,
            keys: i
                .events
                .iter()
                .filter_map(|e| match e {
                    Event::Key {
                        key,
                        pressed: true,
                        repeat: false,
                        modifiers,
                        ..
                    } => Some((*key, *modifiers)),
                    _ => None,
                })
                .collect(),
            amplitude_key_held: hotkeys.amplitude_scale.is_held(i),
        })
    }

    fn row_at(&self, rows: Rect, pos: Pos2) -> Option<&RowLayout> {
        if !rows.contains(pos) {
            return None;
        }
        let y = pos.y - rows.top() + self.scroll_y;
        self.rows.iter().find(|r| y >= r.top && y < r.bottom())
    }

    fn row_rect(&self, row: &RowLayout, rects: &FrameRects) -> Rect {
        let top = rects.rows.top() + row.top - self.scroll_y;
        Rect::from_x_y_ranges(rects.rows.x_range(), top..=top + row.height)
    }

    fn handle_pointer(&mut self, input: &FrameInput, rects: &FrameRects, events: &mut Vec<WaveformEvent>) {
        let mapping = self.mapping();
        let strips = rects.strips;
        let width = strips.width();

        if self.active.is_some() && !input.down && !input.released && !input.pressed {
            // The release happened outside the window.
            self.cancel_active();
        }

        if input.pressed && self.active.is_none() {
            if let Some(pos) = input.pointer {
                if rects.scrollbar.contains(pos) {
                    self.active = Some(ActiveInput::Scrollbar { last_x: pos.x });
                } else if strips.contains(pos) {
                    self.press(pos, input, rects, &mapping, events);
                }
            }
        }

        let Some(pos) = input.pointer else {
            return;
        };
        let ctx = PointerContext {
            pos,
            x: pos.x - strips.left(),
            width,
            mapping: &mapping,
        };

        match self.active.clone() {
            None => {}
            Some(ActiveInput::Markers) => {
                if input.released {
                    self.active = None;
                    self.markers.drag_to(pos, ctx.x, width, &mapping);
                    events.extend(self.markers.release(pos));
                } else {
                    self.markers.drag_to(pos, ctx.x, width, &mapping);
                }
            }
            Some(ActiveInput::Channel(key)) => {
                let Some(record) = self.channels.get_mut(&key) else {
                    self.active = None;
                    return;
                };
                if input.released {
                    self.active = None;
                    let produced = record.release(&ctx);
                    for event in produced {
                        self.route(event, events);
                    }
                } else {
                    record.drag(&ctx);
                }
            }
            Some(ActiveInput::Brush { channel_id }) => {
                if !input.released {
                    self.brush.update(pos);
                    return;
                }
                self.active = None;
                let Some(commit) = self.brush.release(pos) else {
                    return;
                };
                match (commit.kind, commit.dragged) {
                    (BrushKind::Zoom, true) => {
                        let a = mapping.x_to_fraction(commit.origin.x - strips.left(), width);
                        let b = mapping.x_to_fraction(commit.end.x - strips.left(), width);
                        self.zoom(a.min(b), a.max(b));
                    }
                    (_, false) => events.push(WaveformEvent::ChannelClick {
                        channel_id,
                        time: mapping.x_to_time(commit.origin.x - strips.left(), width),
                    }),
                    (BrushKind::Click, true) => {}
                }
            }
            Some(ActiveInput::Scrollbar { last_x }) => {
                let track = rects.scrollbar.width() as f64;
                let dx = (pos.x - last_x) as f64;
                if dx != 0.0 && track > 0.0 {
                    self.pan_by_percentage(dx / track / self.view_range.width());
                }
                self.active = if input.released {
                    None
                } else {
                    Some(ActiveInput::Scrollbar { last_x: pos.x })
                };
            }
        }
    }

    fn cancel_active(&mut self) {
        match self.active.take() {
            Some(ActiveInput::Markers) => self.markers.cancel(),
            Some(ActiveInput::Channel(key)) => {
                if let Some(record) = self.channels.get_mut(&key) {
                    record.cancel_gesture();
                }
            }
            Some(ActiveInput::Brush { .. }) => self.brush.cancel(),
            Some(ActiveInput::Scrollbar { .. }) | None => {}
        }
    }

    fn press(
        &mut self,
        pos: Pos2,
        input: &FrameInput,
        rects: &FrameRects,
        mapping: &TimeMapping,
        events: &mut Vec<WaveformEvent>,
    ) {
        let strips = rects.strips;
        let x = pos.x - strips.left();
        if let Some(target) = self.markers.hit_test(x, strips.width(), mapping) {
            if self.markers.press(target, pos) {
                self.active = Some(ActiveInput::Markers);
                return;
            }
        }

        let Some((key, channel_id)) = self
            .row_at(rects.rows, pos)
            .map(|r| (r.key.clone(), r.channel_id.clone()))
        else {
            return;
        };
        let ctx = PointerContext {
            pos,
            x,
            width: strips.width(),
            mapping,
        };
        let Some(record) = self.channels.get_mut(&key) else {
            return;
        };
        match record.press(&ctx, input.modifiers, input.amplitude_key_held) {
            PressResult::Started => self.active = Some(ActiveInput::Channel(key)),
            PressResult::Events(produced) => {
                for event in produced {
                    self.route(event, events);
                }
            }
            PressResult::Ignored => {
                let armed = if input.modifiers.command {
                    let threshold = (self.config.zoom_brush_threshold * strips.width() as f64) as f32;
                    self.brush.arm_with_threshold(BrushKind::Zoom, pos, threshold)
                } else {
                    self.brush
                        .arm_with_threshold(BrushKind::Click, pos, self.config.drag_threshold_px)
                };
                if armed {
                    self.active = Some(ActiveInput::Brush { channel_id });
                }
            }
        }
    }

    fn handle_wheel(&mut self, input: &FrameInput, rects: &FrameRects) {
        let Some(hover) = input.hover else {
            return;
        };
        if !rects.rows.contains(hover) {
            return;
        }

        let pct = self.config.wheel_zoom_pct;
        let notches = input.wheel.clamp(-1.0, 1.0) as f64;
        if input.modifiers.command && input.modifiers.shift {
            if notches != 0.0 {
                self.pan_by_percentage(-notches * pct);
            }
        } else if input.modifiers.command {
            if notches != 0.0 {
                let anchor = ((hover.x - rects.strips.left()) / rects.strips.width()).clamp(0.0, 1.0);
                self.zoom_by_percentage_to_point(-notches * pct, anchor as f64);
            }
        } else if input.scroll_y != 0.0 {
            self.scroll_y -= input.scroll_y;
        }
    }

    fn handle_keys(&mut self, input: &FrameInput, rects: &FrameRects, events: &mut Vec<WaveformEvent>) {
        if input.keys.is_empty() {
            return;
        }
        let Some(hover) = input.hover.filter(|p| rects.rows.union(rects.measure).contains(*p)) else {
            return;
        };
        let mapping = self.mapping();
        let under_pointer = self
            .row_at(rects.rows, hover)
            .map(|r| r.channel_id.clone());
        let time = rects
            .strips
            .contains(hover)
            .then(|| mapping.x_to_time(hover.x - rects.strips.left(), rects.strips.width()));

        for &(key, modifiers) in &input.keys {
            let hotkeys = &self.config.hotkeys;
            if hotkeys.amplitude_scale_reset.matches(key, modifiers) {
                self.reset_all_amplitudes();
            } else if hotkeys.amplitude_scale_single_reset.matches(key, modifiers) {
                if let Some(channel_id) = &under_pointer {
                    self.reset_amplitude(channel_id);
                }
            }
            events.push(WaveformEvent::KeyPress {
                key,
                modifiers,
                channel_id: under_pointer.clone(),
                time: under_pointer.as_ref().and(time),
            });
        }
    }

    fn paint(&mut self, ui: &mut Ui, input: &FrameInput, rects: &FrameRects, events: &mut Vec<WaveformEvent>) {
        let theme = self.config.theme;
        let label_width = self.config.label_width;
        let mapping = self.mapping();
        let painter = ui.painter().with_clip_rect(rects.rows);
        painter.rect_filled(rects.rows, 0.0, theme.waveform_bg());

        let mut retired = std::mem::take(&mut self.retired);
        let mut label_actions = Vec::new();

        let visible: Vec<RowLayout> = visible_rows(&self.rows, self.scroll_y, rects.rows.height())
            .into_iter()
            .cloned()
            .collect();
        for row in &visible {
            let row_rect = self.row_rect(row, rects);
            let strip = Rect::from_x_y_ranges(rects.strips.x_range(), row_rect.y_range());
            let strip_visible = strip.intersect(rects.strips);
            let label = Rect::from_min_max(row_rect.min, Pos2::new(strip.left(), row_rect.bottom()));
            let label_clip = label.intersect(rects.rows);

            let Some(station) = self.stations.iter().find(|s| s.id == row.station_id) else {
                continue;
            };
            let Some(record) = self.channels.get(&row.key) else {
                continue;
            };

            if strip_visible.width() > 0.0 && strip_visible.height() > 0.0 {
                record.paint(
                    &painter,
                    strip,
                    strip_visible,
                    &mapping,
                    theme,
                    &self.selections,
                    std::mem::take(&mut retired),
                );
            }

            let info = ChannelLabelInfo {
                station_id: &station.id,
                channel: record.channel(),
                sub_channel: row.sub_channel,
                selected: self.selections.channels.iter().any(|id| *id == row.channel_id),
                show_mask_indicator: !row.sub_channel && station_has_hidden_masks(station),
                distance_km: if row.sub_channel { None } else { station.distance_km },
                amplitude_bounds: record.amplitude_bounds(),
                expansion: (!row.sub_channel && !station.non_default_channels.is_empty())
                    .then(|| self.expanded.contains(&station.id)),
            };
            if label_clip.height() > 0.0 {
                if let Some(action) = show_channel_label(ui, label, label_clip, &info, theme) {
                    label_actions.push(action);
                }
            }
            painter.line_segment(
                [strip.left_bottom(), strip.right_bottom()],
                Stroke::new(1.0, theme.divider()),
            );
        }

        if input.secondary_clicked {
            if let Some(pos) = input.pointer.filter(|p| rects.strips.contains(*p)) {
                if let Some(row) = self.row_at(rects.rows, pos) {
                    events.push(WaveformEvent::ContextMenu {
                        channel_id: row.channel_id.clone(),
                        time: mapping.x_to_time(pos.x - rects.strips.left(), rects.strips.width()),
                    });
                }
            }
        }

        let strip_painter = ui.painter().with_clip_rect(rects.strips);
        self.markers.paint(&strip_painter, rects.strips, &mapping);

        if self.brush.is_dragging() && self.brush.kind() == Some(BrushKind::Zoom) {
            let (a, b) = (self.brush.origin().x, self.brush.current().x);
            let band = Rect::from_x_y_ranges(a.min(b)..=a.max(b), rects.strips.y_range());
            strip_painter.rect_filled(band, 0.0, theme.zoom_brush());
        }

        if let Some(hover) = input.hover.filter(|p| rects.strips.contains(*p)) {
            strip_painter.line_segment(
                [
                    Pos2::new(hover.x, rects.strips.top()),
                    Pos2::new(hover.x, rects.strips.bottom()),
                ],
                Stroke::new(1.0, theme.crosshair()),
            );
        }

        self.paint_scrollbar(ui, rects);

        let axis_painter = ui.painter().with_clip_rect(rects.axis);
        draw_time_axis(&axis_painter, rects.axis, label_width, &mapping, theme, true);
        let readout = format_time_range(mapping.visible_start(), mapping.visible_end())
            .replacen(" + ", "\n+ ", 1);
        axis_painter.text(
            Pos2::new(rects.axis.left() + 6.0, rects.axis.center().y),
            Align2::LEFT_CENTER,
            readout,
            FontId::proportional(10.0),
            theme.text(),
        );

        if input.double_clicked && self.active.is_none() {
            if input.pointer.is_some_and(|p| rects.strips.contains(p)) && !input.modifiers.any() {
                match self.default_zoom_window {
                    Some((start, end)) => self.zoom_to_time_window(start, end),
                    None => self.zoom(0.0, 1.0),
                }
            }
        }

        if rects.measure.height() > 0.0 {
            let (measure_events, leftover) = self.measure.show(
                ui,
                rects.measure,
                label_width,
                self.config.time_axis_height,
                theme,
                &self.selections,
                input.amplitude_key_held,
                retired,
            );
            events.extend(measure_events);
            retired = leftover;
        }
        self.retired.extend(retired);

        for action in label_actions {
            match action {
                LabelAction::ToggleExpansion(station_id) => {
                    events.extend(self.toggle_expansion(&station_id));
                }
                LabelAction::ChannelLabelClick(channel_id) => {
                    events.push(WaveformEvent::ChannelLabelClick { channel_id });
                }
            }
        }
    }

    fn paint_scrollbar(&self, ui: &Ui, rects: &FrameRects) {
        let theme = self.config.theme;
        let track = rects.scrollbar;
        let painter = ui.painter().with_clip_rect(track);
        painter.rect_filled(track, 0.0, theme.label_bg());

        let left = track.left() + (self.view_range.left() as f32) * track.width();
        let width = (self.view_range.width() as f32 * track.width()).max(MIN_THUMB_WIDTH);
        let thumb = Rect::from_min_size(
            Pos2::new(left.min(track.right() - width), track.top() + 1.0),
            Vec2::new(width, track.height() - 2.0),
        );
        let color = if matches!(self.active, Some(ActiveInput::Scrollbar { .. })) {
            theme.text()
        } else {
            theme.dim_text()
        };
        painter.rect_filled(thumb, 3.0, color.gamma_multiply(0.6));
    }
}

impl Drop for WaveformDisplay {
    fn drop(&mut self) {
        tracing::info!(
            "Unmounting waveform display ({} channels, {} builds in flight)",
            self.channels.len(),
            self.pool.in_flight()
        );
    }
}
