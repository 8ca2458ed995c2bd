//! The label column to the left of each channel strip: expansion toggle,
//! channel name, distance, mask indicator and the amplitude axis.

use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};

use crate::state::entities::{Channel, Station};
use crate::state::theme::Theme;

const EXPANDER_WIDTH: f32 = 24.0;
const Y_AXIS_WIDTH: f32 = 50.0;
/// Vertical padding of the amplitude axis.
const Y_AXIS_PADDING: f32 = 8.0;
const SUB_CHANNEL_MARKER: Color32 = Color32::from_rgb(0x1E, 0x90, 0xFF);

/// Clicks in the label column.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelAction {
    ToggleExpansion(String),
    ChannelLabelClick(String),
}

/// What one label row shows.
#[derive(Debug, Clone)]
pub struct ChannelLabelInfo<'a> {
    pub station_id: &'a str,
    pub channel: &'a Channel,
    pub sub_channel: bool,
    pub selected: bool,
    pub show_mask_indicator: bool,
    pub distance_km: Option<f64>,
    /// Camera bottom and top of the channel.
    pub amplitude_bounds: (f64, f64),
    /// `Some(expanded)` on a default channel whose station has more channels.
    pub expansion: Option<bool>,
}

/// True when a hidden channel of the station carries masks, flagged on
/// the default channel's label.
pub fn station_has_hidden_masks(station: &Station) -> bool {
    station
        .non_default_channels
        .iter()
        .any(|c| !c.masks.is_empty())
}

/// Tick values of the amplitude axis: bottom, zero and top, pulled in by the
/// axis padding.
pub fn y_axis_ticks(bottom: f64, top: f64, height_px: f32) -> [f64; 3] {
    if height_px <= 0.0 {
        return [bottom, 0.0, top];
    }
    let scale = ((height_px - Y_AXIS_PADDING) / height_px).max(0.0) as f64;
    [bottom * scale, 0.0, top * scale]
}

/// Short amplitude label: plain decimals trimmed of trailing zeros,
/// scientific notation for very large or small magnitudes.
pub fn format_amplitude(val: f64) -> String {
    if val == 0.0 {
        "0".to_string()
    } else if val.abs() >= 1e5 || val.abs() < 1e-2 {
        format!("{val:.1e}")
    } else {
        let s = format!("{val:.2}");
        let s = s.trim_end_matches('0');
        s.trim_end_matches('.').to_string()
    }
}

/// Draws one label row into `rect`.
pub fn show_channel_label(
    ui: &mut Ui,
    rect: Rect,
    clip: Rect,
    info: &ChannelLabelInfo<'_>,
    theme: Theme,
) -> Option<LabelAction> {
    let painter = ui.painter().with_clip_rect(clip);
    painter.rect_filled(rect, 0.0, theme.label_bg());
    painter.line_segment(
        [rect.left_bottom(), rect.right_bottom()],
        Stroke::new(1.0, theme.divider()),
    );

    let mut action = None;

    let expander = Rect::from_min_size(rect.min, Vec2::new(EXPANDER_WIDTH, rect.height()));
    let y_axis = Rect::from_min_max(
        Pos2::new(rect.right() - Y_AXIS_WIDTH, rect.top()),
        rect.max,
    );
    let name_area = Rect::from_min_max(
        Pos2::new(expander.right(), rect.top()),
        Pos2::new(y_axis.left(), rect.bottom()),
    );

    if info.sub_channel {
        painter.rect_filled(expander, 0.0, SUB_CHANNEL_MARKER);
    } else if let Some(expanded) = info.expansion {
        let id = ui.id().with(("expand", info.station_id));
        let response = ui.interact(expander.intersect(clip), id, Sense::click());
        let color = if response.hovered() {
            theme.text()
        } else {
            theme.dim_text()
        };
        painter.text(
            Pos2::new(expander.center().x, rect.top() + 10.0),
            Align2::CENTER_CENTER,
            if expanded { "-" } else { "+" },
            FontId::monospace(14.0),
            color,
        );
        if response.clicked() {
            action = Some(LabelAction::ToggleExpansion(info.station_id.to_string()));
        }
    }

    let id = ui.id().with(("label", info.station_id, info.channel.id.as_str()));
    let response = ui.interact(name_area.intersect(clip), id, Sense::click());
    if response.clicked() {
        action = Some(LabelAction::ChannelLabelClick(info.channel.id.clone()));
    }

    let mut text_color = theme.text();
    if info.sub_channel {
        text_color = text_color.gamma_multiply(0.7);
    }
    let name_font = if info.selected {
        FontId::proportional(14.0)
    } else {
        FontId::proportional(12.5)
    };
    let center = name_area.center();
    painter.text(
        Pos2::new(center.x, center.y - 7.0),
        Align2::CENTER_CENTER,
        &info.channel.name,
        name_font,
        text_color,
    );
    if info.selected {
        painter.rect_stroke(
            name_area.shrink(2.0),
            2.0,
            Stroke::new(1.0, theme.text()),
            egui::StrokeKind::Inside,
        );
    }

    let distance = info
        .distance_km
        .filter(|d| *d != 0.0)
        .map(|d| format!("{d:.1} km"))
        .unwrap_or_default();
    let detail_pos = Pos2::new(center.x, center.y + 8.0);
    painter.text(
        detail_pos,
        Align2::CENTER_CENTER,
        &distance,
        FontId::proportional(11.0),
        theme.dim_text(),
    );
    if info.show_mask_indicator {
        let x = if distance.is_empty() {
            detail_pos.x
        } else {
            detail_pos.x + 32.0
        };
        painter.text(
            Pos2::new(x, detail_pos.y),
            Align2::CENTER_CENTER,
            "M",
            FontId::proportional(11.0),
            theme.mask_indicator(),
        );
    }

    draw_y_axis(&painter, y_axis, info.amplitude_bounds, theme);

    action
}

fn draw_y_axis(painter: &egui::Painter, rect: Rect, bounds: (f64, f64), theme: Theme) {
    let (bottom, top) = bounds;
    let axis_x = rect.right() - 1.0;
    let stroke = Stroke::new(1.0, theme.dim_text());
    painter.line_segment(
        [
            Pos2::new(axis_x, rect.top() + Y_AXIS_PADDING),
            Pos2::new(axis_x, rect.bottom() - Y_AXIS_PADDING),
        ],
        stroke,
    );

    let ticks = y_axis_ticks(bottom, top, rect.height());
    let span = top - bottom;
    if span <= 0.0 {
        return;
    }
    for value in ticks {
        let t = ((value - bottom) / span) as f32;
        let y = rect.bottom() - t * rect.height();
        painter.line_segment([Pos2::new(axis_x - 4.0, y), Pos2::new(axis_x, y)], stroke);
        painter.text(
            Pos2::new(axis_x - 6.0, y),
            Align2::RIGHT_CENTER,
            format_amplitude(value),
            FontId::monospace(9.0),
            theme.dim_text(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::entities::Mask;

    #[test]
    fn amplitude_labels() {
        assert_eq!(format_amplitude(0.0), "0");
        assert_eq!(format_amplitude(1.5), "1.5");
        assert_eq!(format_amplitude(-2.0), "-2");
        assert_eq!(format_amplitude(250_000.0), "2.5e5");
    }

    #[test]
    fn y_ticks_are_padded() {
        let [lo, zero, hi] = y_axis_ticks(-1.0, 1.0, 80.0);
        assert!((lo + 0.9).abs() < 1e-6);
        assert_eq!(zero, 0.0);
        assert!((hi - 0.9).abs() < 1e-6);
    }

    #[test]
    fn hidden_masks_flag() {
        let mut station = Station::new("s1", "ASAR", Channel::new("c0", "BHZ", 40.0));
        assert!(!station_has_hidden_masks(&station));
        let mut sub = Channel::new("c1", "BHN", 40.0);
        sub.masks.push(Mask {
            id: "m".into(),
            start_time: 0.0,
            end_time: 1.0,
            color: [255, 0, 0, 255],
        });
        station.non_default_channels.push(sub);
        assert!(station_has_hidden_masks(&station));
    }
}
