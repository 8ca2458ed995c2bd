//! Secondary viewport showing one channel over the measure selection.

use egui::{Align2, CursorIcon, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};

use crate::processing::geometry::BufferId;
use crate::processing::geometry_pool::{GeometryRequest, GeometryResponse};
use crate::processing::segment_cache::ApplyOutcome;
use crate::render::coordinates::TimeMapping;
use crate::state::entities::{find_channel, MeasureWindowSelection, Selections, Station, WaveformEvent};
use crate::state::theme::Theme;
use crate::state::view_range::ViewRange;
use crate::state::viewer_config::{ChannelDefaults, ViewerConfig};
use crate::ui::channel::{channel_key, ChannelRenderer, PointerContext, PressResult};
use crate::ui::gestures::{DragAxis, DragGesture, Step};
use crate::ui::station_label::{show_channel_label, ChannelLabelInfo};
use crate::ui::time_axis::draw_time_axis;

/// Owner keys of measure window renderers start with this prefix.
pub const MEASURE_KEY_PREFIX: &str = "measure-window";

const DIVIDER_HEIGHT: f32 = 6.0;

/// What the viewport must do after a new selection.
#[derive(Debug, Default)]
pub struct SelectOutcome {
    /// Arena key of the channel whose overlay should be cleared.
    pub clear_overlay: Option<String>,
    pub requests: Vec<GeometryRequest>,
}

pub struct MeasureWindow {
    visible: bool,
    selection: Option<MeasureWindowSelection>,
    renderer: Option<ChannelRenderer>,
    next_key: u64,
    height: f32,
    min_height: f32,
    max_height: f32,
    drag_threshold_px: f32,
    divider: DragGesture<()>,
    retired: Vec<BufferId>,
}

impl MeasureWindow {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            visible: true,
            selection: None,
            renderer: None,
            next_key: 0,
            height: config.measure_window_height,
            min_height: config.measure_window_min_height,
            max_height: config.measure_window_max_height,
            drag_threshold_px: config.drag_threshold_px,
            divider: DragGesture::new(0.0, DragAxis::Vertical),
            retired: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn selection(&self) -> Option<&MeasureWindowSelection> {
        self.selection.as_ref()
    }

    pub fn renderer(&self) -> Option<&ChannelRenderer> {
        self.renderer.as_ref()
    }

    /// Height including the divider, or 0 when hidden.
    pub fn total_height(&self) -> f32 {
        if self.visible {
            self.height + DIVIDER_HEIGHT
        } else {
            0.0
        }
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn resize_by(&mut self, dy: f32) {
        self.height = (self.height + dy).clamp(self.min_height, self.max_height);
    }

    /// True if `owner` names the current or any earlier measure renderer.
    pub fn owns(owner: &str) -> bool {
        owner.starts_with(MEASURE_KEY_PREFIX)
    }

    /// Shows a new selection. A different channel clears the old overlay;
    /// the same channel rebuilds from scratch.
    pub fn select(
        &mut self,
        selection: MeasureWindowSelection,
        stations: &[Station],
        defaults: &ChannelDefaults,
    ) -> SelectOutcome {
        let mut outcome = SelectOutcome::default();
        if let Some(previous) = &self.selection {
            if previous.station_id != selection.station_id
                || previous.channel_id != selection.channel_id
            {
                outcome.clear_overlay = Some(channel_key(&previous.station_id, &previous.channel_id));
            }
        }
        self.retire_renderer();

        let Some(channel) = find_channel(stations, &selection.station_id, &selection.channel_id) else {
            tracing::debug!(
                "Measure selection names unknown channel {}/{}",
                selection.station_id,
                selection.channel_id
            );
            self.selection = None;
            return outcome;
        };

        self.next_key += 1;
        let key = format!("{MEASURE_KEY_PREFIX}#{}", self.next_key);
        let mut renderer = ChannelRenderer::new(
            key,
            selection.station_id.clone(),
            channel.clone(),
            true,
            self.drag_threshold_px,
        );
        outcome.requests =
            renderer.sync(channel, selection.start_time, selection.end_time, defaults);
        tracing::debug!(
            "Measure window on {} [{:.3}, {:.3}]",
            selection.channel_id,
            selection.start_time,
            selection.end_time
        );
        self.renderer = Some(renderer);
        self.selection = Some(selection);
        self.visible = true;
        outcome
    }

    /// Re-reads the selected channel from the station list.
    pub fn refresh(&mut self, stations: &[Station], defaults: &ChannelDefaults) -> Vec<GeometryRequest> {
        let Some(selection) = &self.selection else {
            return Vec::new();
        };
        let Some(channel) = find_channel(stations, &selection.station_id, &selection.channel_id) else {
            self.clear();
            return Vec::new();
        };
        let (start, end) = (selection.start_time, selection.end_time);
        match self.renderer.as_mut() {
            Some(renderer) => {
                let requests = renderer.sync(channel, start, end, defaults);
                self.retired.extend(renderer.take_retired());
                requests
            }
            None => Vec::new(),
        }
    }

    /// Drops the selection. Returns the arena key whose overlay to clear.
    pub fn clear(&mut self) -> Option<String> {
        self.retire_renderer();
        self.selection
            .take()
            .map(|s| channel_key(&s.station_id, &s.channel_id))
    }

    /// Hides or shows the window. Hiding drops the selection.
    pub fn toggle_visibility(&mut self) -> Option<String> {
        self.visible = !self.visible;
        if self.visible {
            None
        } else {
            self.clear()
        }
    }

    /// Applies a response addressed to a measure renderer. Responses for an
    /// earlier renderer are dropped.
    pub fn apply(&mut self, response: GeometryResponse) -> ApplyOutcome {
        match self.renderer.as_mut() {
            Some(renderer) if renderer.key() == response.owner => renderer.apply_geometry(response),
            _ => ApplyOutcome::Discarded,
        }
    }

    pub fn take_retired(&mut self) -> Vec<BufferId> {
        if let Some(renderer) = self.renderer.as_mut() {
            self.retired.extend(renderer.take_retired());
        }
        std::mem::take(&mut self.retired)
    }

    pub fn reset_amplitude(&mut self, channel_id: Option<&str>) {
        if let Some(renderer) = self.renderer.as_mut() {
            if channel_id.map_or(true, |id| id == renderer.channel_id()) {
                renderer.reset_amplitude();
            }
        }
    }

    fn retire_renderer(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            self.retired.extend(renderer.retire_all());
        }
    }

    /// Draws the window and its divider into `rect` and handles input over
    /// it.
    #[allow(clippy::too_many_arguments)]
    pub fn show(
        &mut self,
        ui: &mut Ui,
        rect: Rect,
        label_width: f32,
        axis_height: f32,
        theme: Theme,
        selections: &Selections,
        amplitude_key_held: bool,
        retired: Vec<BufferId>,
    ) -> (Vec<WaveformEvent>, Vec<BufferId>) {
        let mut events = Vec::new();
        let painter = ui.painter().with_clip_rect(rect);

        let divider = Rect::from_min_max(Pos2::new(rect.left(), rect.bottom() - DIVIDER_HEIGHT), rect.max);
        self.handle_divider(ui, divider);
        painter.rect_filled(divider, 0.0, theme.divider());

        let body = Rect::from_min_max(rect.min, Pos2::new(rect.right(), divider.top()));
        let axis = Rect::from_min_max(Pos2::new(body.left(), body.bottom() - axis_height), body.max);
        let row = Rect::from_min_max(body.min, Pos2::new(body.right(), axis.top()));
        let label = Rect::from_min_size(row.min, Vec2::new(label_width, row.height()));
        let strip = Rect::from_min_max(Pos2::new(label.right(), row.top()), row.max);

        let (Some(selection), Some(renderer)) = (self.selection.as_ref(), self.renderer.as_mut()) else {
            painter.rect_filled(body, 0.0, theme.waveform_bg());
            painter.text(
                body.center(),
                Align2::CENTER_CENTER,
                "Alt + drag on a channel to open the measure window",
                FontId::proportional(13.0),
                theme.dim_text(),
            );
            return (events, retired);
        };

        let mapping = TimeMapping::new(selection.start_time, selection.end_time, ViewRange::FULL);

        // Input over the strip.
        let response = ui.interact(strip, ui.id().with(renderer.key()), Sense::click_and_drag());
        let (pressed, released, pointer, modifiers) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
                i.modifiers,
            )
        });
        if let Some(pos) = pointer {
            let ctx = PointerContext {
                pos,
                x: pos.x - strip.left(),
                width: strip.width(),
                mapping: &mapping,
            };
            if pressed && strip.contains(pos) {
                if let PressResult::Events(evts) = renderer.press(&ctx, modifiers, amplitude_key_held) {
                    events.extend(evts);
                }
            } else if released {
                events.extend(renderer.release(&ctx));
            } else if renderer.is_interacting() {
                renderer.drag(&ctx);
            }
        }
        if response.secondary_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                events.push(WaveformEvent::ContextMenu {
                    channel_id: renderer.channel_id().to_string(),
                    time: mapping.x_to_time(pos.x - strip.left(), strip.width()),
                });
            }
        }

        renderer.paint(&painter, strip, strip, &mapping, theme, selections, retired);

        let info = ChannelLabelInfo {
            station_id: renderer.station_id(),
            channel: renderer.channel(),
            sub_channel: false,
            selected: selections.channels.iter().any(|id| id == renderer.channel_id()),
            show_mask_indicator: false,
            distance_km: None,
            amplitude_bounds: renderer.amplitude_bounds(),
            expansion: None,
        };
        let label_id = renderer.channel_id().to_string();
        if show_channel_label(ui, label, rect, &info, theme).is_some() {
            events.push(WaveformEvent::ChannelLabelClick { channel_id: label_id });
        }

        draw_time_axis(&painter, axis, label_width, &mapping, theme, true);
        painter.line_segment(
            [strip.left_top(), strip.left_bottom()],
            Stroke::new(1.0, theme.divider()),
        );

        (events, Vec::new())
    }

    fn handle_divider(&mut self, ui: &mut Ui, divider: Rect) {
        let response = ui.interact(divider, ui.id().with("measure-divider"), Sense::drag());
        if response.hovered() || self.divider.is_active() {
            ui.ctx().set_cursor_icon(CursorIcon::ResizeVertical);
        }
        let pointer = ui.input(|i| i.pointer.interact_pos());
        if response.drag_started() {
            if let Some(pos) = pointer {
                self.divider.arm((), pos);
            }
        }
        if let Some(pos) = pointer {
            if let Step::Started { delta } | Step::Moved { delta } = self.divider.update(pos) {
                self.resize_by(delta.y);
            }
        }
        if response.drag_stopped() {
            self.divider.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entities::{Channel, DataSegment};

    fn stations() -> Vec<Station> {
        let mut s = Station::new(
            "s1",
            "ASAR",
            Channel::new("c0", "BHZ", 1.0).with_segments(vec![DataSegment::new(0.0, vec![1.0; 10])]),
        );
        s.non_default_channels
            .push(Channel::new("c1", "BHN", 1.0).with_segments(vec![DataSegment::new(0.0, vec![2.0; 10])]));
        vec![s]
    }

    fn selection(channel: &str, start: f64, end: f64) -> MeasureWindowSelection {
        MeasureWindowSelection {
            station_id: "s1".into(),
            channel_id: channel.into(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn new_channel_clears_previous_overlay() {
        let config = ViewerConfig::default();
        let mut w = MeasureWindow::new(&config);
        let stations = stations();
        let first = w.select(selection("c0", 1.0, 5.0), &stations, &config.channel_defaults);
        assert!(first.clear_overlay.is_none());
        assert_eq!(first.requests.len(), 1);

        let second = w.select(selection("c1", 2.0, 6.0), &stations, &config.channel_defaults);
        assert_eq!(second.clear_overlay.as_deref(), Some("s1/c0"));
        assert_eq!(w.renderer().map(|r| r.channel_id()), Some("c1"));
    }

    #[test]
    fn same_channel_rebuilds() {
        let config = ViewerConfig::default();
        let mut w = MeasureWindow::new(&config);
        let stations = stations();
        let first = w.select(selection("c0", 1.0, 5.0), &stations, &config.channel_defaults);
        let old_key = first.requests[0].owner.clone();

        let second = w.select(selection("c0", 2.0, 4.0), &stations, &config.channel_defaults);
        assert!(second.clear_overlay.is_none());
        assert_eq!(second.requests.len(), 1);
        assert_ne!(second.requests[0].owner, old_key);

        // A late result for the old renderer is dropped.
        let stale = GeometryResponse {
            owner: old_key,
            generation: 0,
            segment_id: first.requests[0].segment_id(),
            result: Err(crate::error::GeometryError::PoolClosed),
        };
        assert_eq!(w.apply(stale), ApplyOutcome::Discarded);
    }

    #[test]
    fn unknown_channel_leaves_window_empty() {
        let config = ViewerConfig::default();
        let mut w = MeasureWindow::new(&config);
        let out = w.select(selection("nope", 0.0, 1.0), &stations(), &config.channel_defaults);
        assert!(out.requests.is_empty());
        assert!(w.selection().is_none());
    }

    #[test]
    fn hiding_clears_selection() {
        let config = ViewerConfig::default();
        let mut w = MeasureWindow::new(&config);
        w.select(selection("c1", 1.0, 5.0), &stations(), &config.channel_defaults);
        assert_eq!(w.toggle_visibility().as_deref(), Some("s1/c1"));
        assert!(!w.is_visible());
        assert_eq!(w.total_height(), 0.0);
        assert!(w.selection().is_none());
        assert!(w.toggle_visibility().is_none());
        assert!(w.is_visible());
    }

    #[test]
    fn resize_is_clamped() {
        let config = ViewerConfig::default();
        let mut w = MeasureWindow::new(&config);
        w.resize_by(10_000.0);
        assert_eq!(w.height(), 500.0);
        w.resize_by(-10_000.0);
        assert_eq!(w.height(), 75.0);
    }
}
