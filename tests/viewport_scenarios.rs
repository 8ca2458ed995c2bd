use std::time::Duration;

use egui::{Event, Modifiers, PointerButton, Pos2, RawInput, Rect, Vec2};
use seisview::{
    Channel, DataSegment, Mask, MeasureWindowSelection, Station, ViewerConfig, WaveformDisplay,
    WaveformEvent,
};

const WAIT: Duration = Duration::from_secs(5);

fn config() -> ViewerConfig {
    ViewerConfig {
        worker_count: Some(2),
        ..ViewerConfig::default()
    }
}

fn ramp(start: f64, n: usize) -> std::sync::Arc<DataSegment> {
    DataSegment::new(start, (0..n).map(|i| (i as f32 * 0.1).sin()).collect())
}

fn channel(id: &str, name: &str) -> Channel {
    Channel::new(id, name, 10.0).with_segments(vec![ramp(0.0, 500)])
}

fn station(id: &str, subs: usize) -> Station {
    let mut station = Station::new(id, id.to_uppercase(), channel(&format!("{id}-z"), "BHZ"));
    for i in 0..subs {
        station
            .non_default_channels
            .push(channel(&format!("{id}-h{i}"), "BHN"));
    }
    station
}

fn mask(id: &str, start: f64, end: f64) -> Mask {
    Mask {
        id: id.to_string(),
        start_time: start,
        end_time: end,
        color: [200, 0, 0, 120],
    }
}

#[test]
fn zoom_to_time_window_maps_to_fractions() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    display.zoom_to_time_window(20.0, 40.0);
    let view = display.view_range();
    assert!((view.left() - 0.2).abs() < 1e-12);
    assert!((view.right() - 0.4).abs() < 1e-12);

    // Reversed and out-of-window bounds are ordered and clamped.
    display.zoom_to_time_window(150.0, 90.0);
    let view = display.view_range();
    assert!((view.left() - 0.9).abs() < 1e-12);
    assert_eq!(view.right(), 1.0);
}

#[test]
fn content_layout_follows_view() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    assert!(display.content_layout().is_none());

    display.set_viewport_width(1000.0);
    display.zoom(0.25, 0.5);
    let layout = display.content_layout().expect("layout after width is known");
    assert!((layout.content_width - 4000.0).abs() < 1e-2);
    assert!((layout.scroll_left - 1000.0).abs() < 1e-2);
}

#[test]
fn pan_stops_at_display_edges() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    display.zoom(0.6, 0.8);
    display.pan_by_percentage(10.0);
    let view = display.view_range();
    assert_eq!(view.right(), 1.0);
    assert!((view.width() - 0.2).abs() < 1e-9);

    display.pan_by_percentage(-10.0);
    assert_eq!(display.view_range().left(), 0.0);
}

#[test]
fn wheel_style_zoom_keeps_anchor() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    display.zoom(0.2, 0.6);
    display.zoom_by_percentage_to_point(-0.4, 0.5);
    let view = display.view_range();
    assert!((view.left() + view.right() - 0.8).abs() < 1e-9);
    assert!(view.width() < 0.4);
}

#[test]
fn expansion_mounts_and_unmounts_sub_channels() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 50.0, vec![station("a", 2), station("b", 0)]);
    assert_eq!(display.rows().len(), 2);
    assert_eq!(display.channel_count(), 2);

    let event = display.toggle_expansion("a");
    assert_eq!(
        event,
        Some(WaveformEvent::ChannelExpanded {
            station_id: "a".to_string()
        })
    );
    assert_eq!(display.rows().len(), 4);
    assert_eq!(display.channel_count(), 4);
    assert!(display.rows()[1].sub_channel);
    assert_eq!(display.rows()[3].channel_id, "b-z");

    display.wait_for_geometry(WAIT);
    assert!(display.channel_renderer("a", "a-h0").is_some());

    let event = display.toggle_expansion("a");
    assert!(matches!(event, Some(WaveformEvent::ChannelCollapsed { .. })));
    assert_eq!(display.channel_count(), 2);
    assert!(display.channel_renderer("a", "a-h0").is_none());
    // Both sub-channel buffers wait for the next paint callback.
    assert_eq!(display.pending_retired().len(), 2);

    assert_eq!(display.toggle_expansion("missing"), None);
}

#[test]
fn removed_segment_leaves_the_scene() {
    let keep = ramp(0.0, 200);
    let drop = ramp(30.0, 200);
    let ch = Channel::new("z", "BHZ", 10.0).with_segments(vec![keep.clone(), drop.clone()]);
    let mut display = WaveformDisplay::mount(config(), 0.0, 60.0, vec![Station::new("s", "S", ch)]);

    assert_eq!(display.wait_for_geometry(WAIT), 2);
    let record = display.channel_renderer("s", "z").expect("mounted");
    assert_eq!(record.scene().objects().len(), 2);

    let ch = Channel::new("z", "BHZ", 10.0).with_segments(vec![keep.clone()]);
    display.set_stations(vec![Station::new("s", "S", ch)]);
    display.wait_for_geometry(WAIT);

    let record = display.channel_renderer("s", "z").expect("still mounted");
    assert!(!record.cache().contains(drop.id()));
    assert!(record.cache().contains(keep.id()));
    assert_eq!(record.scene().objects().len(), 1);
    assert!(!display.pending_retired().is_empty());
}

#[test]
fn measure_window_follows_latest_selection() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 50.0, vec![station("a", 0), station("b", 0)]);
    assert!(!display.measure_window().is_visible());

    display.select_measure_window(MeasureWindowSelection {
        station_id: "a".into(),
        channel_id: "a-z".into(),
        start_time: 5.0,
        end_time: 10.0,
    });
    assert!(display.measure_window().is_visible());
    assert_eq!(
        display.channel_renderer("a", "a-z").and_then(|r| r.measure_overlay()),
        Some((5.0, 10.0))
    );

    display.select_measure_window(MeasureWindowSelection {
        station_id: "b".into(),
        channel_id: "b-z".into(),
        start_time: 20.0,
        end_time: 25.0,
    });
    assert_eq!(display.channel_renderer("a", "a-z").and_then(|r| r.measure_overlay()), None);
    assert_eq!(
        display.channel_renderer("b", "b-z").and_then(|r| r.measure_overlay()),
        Some((20.0, 25.0))
    );
    assert_eq!(
        display.measure_window().selection().map(|s| s.channel_id.as_str()),
        Some("b-z")
    );

    display.wait_for_geometry(WAIT);
    let measured = display.measure_window().renderer().expect("measure renderer");
    assert_eq!(measured.channel_id(), "b-z");
    assert_eq!(measured.scene().objects().len(), 1);

    display.toggle_measure_window_visibility();
    assert!(!display.measure_window().is_visible());
    assert_eq!(display.channel_renderer("b", "b-z").and_then(|r| r.measure_overlay()), None);
}

#[test]
fn narrower_masks_draw_on_top() {
    let mut ch = channel("z", "BHZ");
    ch.masks = vec![mask("narrow", 10.0, 12.0), mask("wide", 0.0, 40.0), mask("mid", 5.0, 20.0)];
    let display = WaveformDisplay::mount(config(), 0.0, 50.0, vec![Station::new("s", "S", ch)]);

    let record = display.channel_renderer("s", "z").expect("mounted");
    let masks = record.scene().masks();
    assert_eq!(masks.len(), 3);
    let priority = |id: &str| masks.iter().find(|m| m.mask_id == id).map(|m| m.priority);
    assert!(priority("narrow") > priority("mid"));
    assert!(priority("mid") > priority("wide"));
}

#[test]
fn amplitude_reset_is_scoped_to_channel() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 50.0, vec![station("a", 0)]);
    display.wait_for_geometry(WAIT);
    let before = display.channel_renderer("a", "a-z").map(|r| r.amplitude_bounds());
    display.reset_amplitude("a-z");
    display.reset_all_amplitudes();
    let after = display.channel_renderer("a", "a-z").map(|r| r.amplitude_bounds());
    assert_eq!(before, after);
}

// -- Pointer scenarios driven through a headless egui context ------------

struct Harness {
    ctx: egui::Context,
    time: f64,
}

impl Harness {
    fn new() -> Self {
        Self {
            ctx: egui::Context::default(),
            time: 0.0,
        }
    }

    fn frame(&mut self, display: &mut WaveformDisplay, events: Vec<Event>, modifiers: Modifiers) -> Vec<WaveformEvent> {
        self.time += 0.5;
        let raw = RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, Vec2::new(1200.0, 800.0))),
            time: Some(self.time),
            modifiers,
            events,
            ..RawInput::default()
        };
        let mut produced = Vec::new();
        let _ = self.ctx.run(raw, |ctx| {
            egui::CentralPanel::default()
                .frame(egui::Frame::NONE)
                .show(ctx, |ui| produced = display.show(ui));
        });
        produced
    }
}

fn button(pos: Pos2, pressed: bool, modifiers: Modifiers) -> Event {
    Event::PointerButton {
        pos,
        button: PointerButton::Primary,
        pressed,
        modifiers,
    }
}

fn ctrl() -> Modifiers {
    Modifiers {
        ctrl: true,
        command: true,
        ..Modifiers::NONE
    }
}

#[test]
fn zoom_brush_drag_zooms_to_brushed_span() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    let mut h = Harness::new();
    h.frame(&mut display, Vec::new(), Modifiers::NONE);
    let strips = display.last_strips_rect().expect("laid out");

    let y = strips.top() + 20.0;
    let from = Pos2::new(strips.left() + strips.width() * 0.25, y);
    let to = Pos2::new(strips.left() + strips.width() * 0.5, y);

    h.frame(
        &mut display,
        vec![Event::PointerMoved(from), button(from, true, ctrl())],
        ctrl(),
    );
    h.frame(&mut display, vec![Event::PointerMoved(to)], ctrl());
    let events = h.frame(&mut display, vec![button(to, false, ctrl())], ctrl());

    assert!(events.is_empty(), "{events:?}");
    let view = display.view_range();
    assert!((view.left() - 0.25).abs() < 1e-3, "{view:?}");
    assert!((view.right() - 0.5).abs() < 1e-3, "{view:?}");
}

#[test]
fn click_without_drag_reports_channel_click() {
    let mut display = WaveformDisplay::mount(config(), 0.0, 100.0, vec![station("a", 0)]);
    let mut h = Harness::new();
    h.frame(&mut display, Vec::new(), Modifiers::NONE);
    let strips = display.last_strips_rect().expect("laid out");

    let at = Pos2::new(strips.left() + strips.width() * 0.75, strips.top() + 20.0);
    h.frame(
        &mut display,
        vec![Event::PointerMoved(at), button(at, true, Modifiers::NONE)],
        Modifiers::NONE,
    );
    let events = h.frame(&mut display, vec![button(at, false, Modifiers::NONE)], Modifiers::NONE);

    let click = events.iter().find_map(|e| match e {
        WaveformEvent::ChannelClick { channel_id, time } => Some((channel_id.clone(), *time)),
        _ => None,
    });
    let (channel_id, time) = click.expect("channel click");
    assert_eq!(channel_id, "a-z");
    assert!((time - 75.0).abs() < 0.5, "{time}");
    assert_eq!(display.view_range().width(), 1.0);
}
