use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::entities::{DisplayType, DEFAULT_CHANNEL_COLOR, DEFAULT_POINT_SIZE, DEFAULT_STATION_HEIGHT};
use crate::state::hotkeys::HotKeys;
use crate::state::theme::Theme;
use crate::state::view_range::MIN_VIEW_WIDTH;

/// Drawing defaults for channels that don't set their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    pub color: [u8; 4],
    pub point_size: f32,
    pub display_types: Vec<DisplayType>,
    pub line_width: f32,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            color: DEFAULT_CHANNEL_COLOR,
            point_size: DEFAULT_POINT_SIZE,
            display_types: vec![DisplayType::Line],
            line_width: 1.0,
        }
    }
}

/// Viewport configuration. Every field has a default, so a partial JSON
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub hotkeys: HotKeys,
    /// Geometry worker threads. `None` uses the available parallelism.
    pub worker_count: Option<usize>,
    pub default_station_height: f32,
    pub label_width: f32,
    pub time_axis_height: f32,
    pub scrollbar_height: f32,
    pub measure_window_height: f32,
    pub measure_window_min_height: f32,
    pub measure_window_max_height: f32,
    /// Fraction of the view width per wheel notch, for zoom and pan.
    pub wheel_zoom_pct: f64,
    /// Fraction of the view width the pointer must travel before a zoom
    /// brush becomes a zoom.
    pub zoom_brush_threshold: f64,
    /// Pixels the pointer must travel before a press becomes a drag.
    pub drag_threshold_px: f32,
    pub min_view_width: f64,
    /// Minimum separation of paired markers, as a fraction of the display
    /// window.
    pub marker_min_gap: f64,
    pub channel_defaults: ChannelDefaults,
    pub theme: Theme,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            hotkeys: HotKeys::default(),
            worker_count: None,
            default_station_height: DEFAULT_STATION_HEIGHT,
            label_width: 184.0,
            time_axis_height: 35.0,
            scrollbar_height: 10.0,
            measure_window_height: 200.0,
            measure_window_min_height: 75.0,
            measure_window_max_height: 500.0,
            wheel_zoom_pct: 0.4,
            zoom_brush_threshold: 0.01,
            drag_threshold_px: 1.0,
            min_view_width: MIN_VIEW_WIDTH,
            marker_min_gap: 0.005,
            channel_defaults: ChannelDefaults::default(),
            theme: Theme::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        tracing::info!("Loaded viewer config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of geometry workers to start.
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
    }

    /// Pulls out-of-range values back into something usable.
    fn sanitized(mut self) -> Self {
        self.measure_window_min_height = self.measure_window_min_height.max(1.0);
        self.measure_window_max_height =
            self.measure_window_max_height.max(self.measure_window_min_height);
        self.measure_window_height = self
            .measure_window_height
            .clamp(self.measure_window_min_height, self.measure_window_max_height);
        self.wheel_zoom_pct = self.wheel_zoom_pct.clamp(0.01, 1.0);
        self.min_view_width = self.min_view_width.clamp(1e-9, 1.0);
        self.marker_min_gap = self.marker_min_gap.clamp(0.0, 0.5);
        self.default_station_height = self.default_station_height.max(1.0);
        if self.channel_defaults.display_types.is_empty() {
            self.channel_defaults.display_types = vec![DisplayType::Line];
        }
        self
    }
}
