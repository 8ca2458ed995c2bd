use std::collections::VecDeque;

use eframe::egui;
use seisview::data::synthetic::{default_start_time, dummy_stations, SAMPLE_RATE};
use seisview::render::gpu_waveform;
use seisview::{
    LineStyle, Markers, MoveableMarker, SelectionWindow, Selections, Station, ViewerConfig,
    WaveformDisplay, WaveformEvent,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const EVENT_LOG_LEN: usize = 200;
const STATION_COUNT: usize = 12;
/// Thirty minutes at the synthetic sample rate.
const SAMPLES_PER_CHANNEL: usize = (30.0 * 60.0 * SAMPLE_RATE) as usize;

/// Demo host: owns the station list and reacts to viewport events the way an
/// analysis application would.
pub struct SeisViewApp {
    display: WaveformDisplay,
    stations: Vec<Station>,
    markers: Markers,
    selections: Selections,
    start_time: f64,
    event_log: VecDeque<String>,
    show_log: bool,
}

impl SeisViewApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ViewerConfig) -> Self {
        let ctx = &cc.egui_ctx;
        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(14.0));
        style.text_styles.insert(egui::TextStyle::Button, egui::FontId::proportional(13.5));
        style.spacing.button_padding = egui::vec2(8.0, 4.0);
        style.visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = egui::CornerRadius::same(4);
        ctx.set_style(style);
        ctx.set_visuals(config.theme.visuals());

        if let Some(render_state) = cc.wgpu_render_state.as_ref() {
            gpu_waveform::init_gpu_resources(render_state);
        } else {
            tracing::warn!("No wgpu render state; waveforms will not be drawn");
        }

        let start_time = default_start_time();
        let end_time = start_time + SAMPLES_PER_CHANNEL as f64 / SAMPLE_RATE;
        let stations = generate_stations(start_time);
        let markers = initial_markers(start_time);

        let mut display = WaveformDisplay::mount(config, start_time, end_time, stations.clone());
        display.set_repaint_context(ctx.clone());
        display.set_markers(markers.clone());
        display.set_default_zoom_window(Some((start_time, start_time + 300.0)));
        display.zoom_to_time_window(start_time, start_time + 300.0);

        Self {
            display,
            stations,
            markers,
            selections: Selections::default(),
            start_time,
            event_log: VecDeque::new(),
            show_log: true,
        }
    }

    fn log(&mut self, line: String) {
        tracing::debug!("{line}");
        self.event_log.push_front(line);
        self.event_log.truncate(EVENT_LOG_LEN);
    }

    fn regenerate(&mut self) {
        self.stations = generate_stations(self.start_time);
        self.selections = Selections::default();
        self.display.set_stations(self.stations.clone());
        self.display.set_selections(self.selections.clone());
        self.log(format!("Regenerated {} stations", self.stations.len()));
    }

    fn handle_event(&mut self, event: WaveformEvent) {
        match &event {
            WaveformEvent::SignalDetectionDragEnd {
                channel_id,
                signal_detection_id,
                time,
            } => {
                if move_detection(&mut self.stations, channel_id, signal_detection_id, *time) {
                    self.display.set_stations(self.stations.clone());
                }
            }
            WaveformEvent::ChannelClick { channel_id, .. }
            | WaveformEvent::ChannelLabelClick { channel_id } => {
                toggle(&mut self.selections.channels, channel_id);
                self.display.set_selections(self.selections.clone());
            }
            WaveformEvent::SignalDetectionClick {
                signal_detection_id,
                ..
            } => {
                toggle(&mut self.selections.signal_detections, signal_detection_id);
                self.display.set_selections(self.selections.clone());
            }
            WaveformEvent::MoveableMarkersUpdated { markers } => {
                self.markers.apply_moveable_updates(markers);
                self.display.set_markers(self.markers.clone());
            }
            _ => {}
        }
        self.log(format!("{event:?}"));
    }
}

impl eframe::App for SeisViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(self.display.theme().visuals());

        let mut regenerate = false;
        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(12, 6)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("seisview");
                    ui.separator();

                    if ui.button("Measure Window").clicked() {
                        self.display.toggle_measure_window_visibility();
                    }
                    if ui.button("Reset Amplitudes").clicked() {
                        self.display.reset_all_amplitudes();
                    }
                    if ui.button("Zoom Reset").clicked() {
                        self.display.zoom(0.0, 1.0);
                    }
                    if ui.button("Regenerate").clicked() {
                        regenerate = true;
                    }
                    ui.toggle_value(&mut self.show_log, "Event Log");

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let next = self.display.theme().toggle();
                        if ui.button(format!("{} Mode", next.label())).clicked() {
                            self.display.set_theme(next);
                        }
                        ui.separator();
                        ui.small(format!("v{VERSION}"));
                    });
                });
            });
        if regenerate {
            self.regenerate();
        }

        egui::TopBottomPanel::bottom("footer")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(12, 4)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let view = self.display.view_range();
                    ui.label(
                        egui::RichText::new(format!(
                            "{} stations   view [{:.3}, {:.3}]   {} channels mounted   {} builds in flight",
                            self.stations.len(),
                            view.left(),
                            view.right(),
                            self.display.channel_count(),
                            self.display.in_flight(),
                        ))
                        .weak(),
                    );
                    ui.separator();
                    ui.label(
                        egui::RichText::new(
                            "Ctrl+wheel zoom, Ctrl+Shift+wheel pan, Ctrl+drag zoom brush, Alt+drag measure, A+drag amplitude",
                        )
                        .weak(),
                    );
                });
            });

        if self.show_log {
            egui::SidePanel::right("event_log")
                .default_width(320.0)
                .show(ctx, |ui| {
                    ui.heading("Events");
                    ui.separator();
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for line in &self.event_log {
                            ui.label(egui::RichText::new(line).monospace().small());
                        }
                    });
                });
        }

        let events = egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.display.show(ui))
            .inner;
        for event in events {
            self.handle_event(event);
        }
    }
}

fn generate_stations(start_time: f64) -> Vec<Station> {
    let mut rng = rand::thread_rng();
    dummy_stations(&mut rng, STATION_COUNT, start_time, SAMPLES_PER_CHANNEL)
}

fn initial_markers(start_time: f64) -> Markers {
    let marker = |id: &str, time: f64, style: LineStyle| MoveableMarker {
        id: id.to_string(),
        color: [255, 165, 0, 255],
        line_style: style,
        time,
    };
    Markers {
        vertical_markers: Vec::new(),
        moveable_markers: vec![marker("pick", start_time + 60.0, LineStyle::Solid)],
        selection_windows: vec![SelectionWindow {
            id: "selection".to_string(),
            start: marker("selection-start", start_time + 120.0, LineStyle::Dashed),
            end: marker("selection-end", start_time + 180.0, LineStyle::Dashed),
            color: [255, 165, 0, 40],
            is_moveable: true,
        }],
    }
}

/// Moves a detection to `time`. Returns false if it wasn't found.
fn move_detection(stations: &mut [Station], channel_id: &str, detection_id: &str, time: f64) -> bool {
    let detection = stations
        .iter_mut()
        .flat_map(|s| std::iter::once(&mut s.default_channel).chain(s.non_default_channels.iter_mut()))
        .filter(|c| c.id == channel_id)
        .flat_map(|c| c.signal_detections.iter_mut())
        .find(|sd| sd.id == detection_id);
    match detection {
        Some(sd) => {
            sd.time = time;
            true
        }
        None => false,
    }
}

fn toggle(ids: &mut Vec<String>, id: &str) {
    if let Some(pos) = ids.iter().position(|x| x == id) {
        ids.remove(pos);
    } else {
        ids.push(id.to_string());
    }
}
