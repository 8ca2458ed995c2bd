use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default waveform color (`#4580E6`).
pub const DEFAULT_CHANNEL_COLOR: [u8; 4] = [0x45, 0x80, 0xE6, 255];
pub const DEFAULT_POINT_SIZE: f32 = 2.0;
pub const DEFAULT_STATION_HEIGHT: f32 = 75.0;

static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_segment_id() -> SegmentId {
    SegmentId(NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Identity token of a [`DataSegment`].
///
/// Segment caches are keyed by this token, never by sample contents: two
/// segments holding identical samples are still two different segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(u64);

impl SegmentId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A contiguous run of samples starting at `start_time` (epoch seconds).
///
/// Segments are shared as `Arc<DataSegment>` and never cloned by value, so a
/// new identity is minted only through [`DataSegment::new`]. To change the
/// samples of a channel, build a new segment and replace it in the channel.
#[derive(Debug)]
pub struct DataSegment {
    id: SegmentId,
    pub start_time: f64,
    pub samples: Vec<f32>,
}

impl DataSegment {
    pub fn new(start_time: f64, samples: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            id: next_segment_id(),
            start_time,
            samples,
        })
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample, given the channel sample rate.
    pub fn end_time(&self, sample_rate: f64) -> f64 {
        if self.samples.is_empty() || sample_rate <= 0.0 {
            return self.start_time;
        }
        self.start_time + (self.samples.len() - 1) as f64 / sample_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayType {
    Line,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDetection {
    pub id: String,
    pub time: f64,
    pub label: String,
    pub color: [u8; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalPhaseWindow {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub label: String,
    pub color: [u8; 4],
}

/// A QC mask over `[start_time, end_time]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub color: [u8; 4],
}

impl Mask {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub sample_rate: f64,
    pub color: Option<[u8; 4]>,
    pub segments: Vec<Arc<DataSegment>>,
    pub signal_detections: Vec<SignalDetection>,
    pub theoretical_phase_windows: Vec<TheoreticalPhaseWindow>,
    pub masks: Vec<Mask>,
    pub description: Option<String>,
    /// Empty means the configured default.
    pub display_types: Vec<DisplayType>,
    pub point_size: Option<f32>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sample_rate: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sample_rate,
            color: None,
            segments: Vec::new(),
            signal_detections: Vec::new(),
            theoretical_phase_windows: Vec::new(),
            masks: Vec::new(),
            description: None,
            display_types: Vec::new(),
            point_size: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<Arc<DataSegment>>) -> Self {
        self.segments = segments;
        self
    }

    pub fn color_or_default(&self) -> [u8; 4] {
        self.color.unwrap_or(DEFAULT_CHANNEL_COLOR)
    }

    /// True when the channel holds exactly one segment and it has no samples.
    pub fn has_only_empty_segment(&self) -> bool {
        self.segments.len() == 1 && self.segments[0].is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub height: Option<f32>,
    pub default_channel: Channel,
    pub non_default_channels: Vec<Channel>,
    pub distance_km: Option<f64>,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, default_channel: Channel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            height: None,
            default_channel,
            non_default_channels: Vec::new(),
            distance_km: None,
        }
    }

    pub fn height_or_default(&self) -> f32 {
        self.height.unwrap_or(DEFAULT_STATION_HEIGHT)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        std::iter::once(&self.default_channel)
            .chain(self.non_default_channels.iter())
            .find(|c| c.id == channel_id)
    }
}

/// Looks up a channel by station and channel id.
pub fn find_channel<'a>(stations: &'a [Station], station_id: &str, channel_id: &str) -> Option<&'a Channel> {
    stations
        .iter()
        .find(|s| s.id == station_id)
        .and_then(|s| s.channel(channel_id))
}

/// A single draggable marker. Part of a pair when used in a selection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveableMarker {
    pub id: String,
    pub color: [u8; 4],
    pub line_style: LineStyle,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalMarker {
    pub id: String,
    pub color: [u8; 4],
    pub line_style: LineStyle,
    pub time: f64,
}

/// Filled region between a `start` and `end` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionWindow {
    pub id: String,
    pub start: MoveableMarker,
    pub end: MoveableMarker,
    pub color: [u8; 4],
    pub is_moveable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Markers {
    pub vertical_markers: Vec<VerticalMarker>,
    pub moveable_markers: Vec<MoveableMarker>,
    pub selection_windows: Vec<SelectionWindow>,
}

impl Markers {
    /// Writes back markers reported by a drag, matched by id. Returns how
    /// many were found.
    pub fn apply_moveable_updates(&mut self, updated: &[MoveableMarker]) -> usize {
        let mut found = 0;
        for marker in updated {
            let slot = self
                .moveable_markers
                .iter_mut()
                .chain(
                    self.selection_windows
                        .iter_mut()
                        .flat_map(|w| [&mut w.start, &mut w.end]),
                )
                .find(|m| m.id == marker.id);
            if let Some(slot) = slot {
                *slot = marker.clone();
                found += 1;
            }
        }
        found
    }
}

/// Channels and detections highlighted by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selections {
    pub channels: Vec<String>,
    pub signal_detections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasureWindowSelection {
    pub station_id: String,
    pub channel_id: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Everything the viewport reports back to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformEvent {
    ChannelExpanded {
        station_id: String,
    },
    ChannelCollapsed {
        station_id: String,
    },
    ContextMenu {
        channel_id: String,
        time: f64,
    },
    ChannelLabelClick {
        channel_id: String,
    },
    ChannelClick {
        channel_id: String,
        time: f64,
    },
    SignalDetectionClick {
        channel_id: String,
        signal_detection_id: String,
    },
    SignalDetectionDragEnd {
        channel_id: String,
        signal_detection_id: String,
        time: f64,
    },
    MaskClick {
        channel_id: String,
        mask_ids: Vec<String>,
    },
    KeyPress {
        key: egui::Key,
        modifiers: egui::Modifiers,
        channel_id: Option<String>,
        time: Option<f64>,
    },
    MoveableMarkersUpdated {
        markers: Vec<MoveableMarker>,
    },
    MeasureWindowUpdated {
        selection: Option<MeasureWindowSelection>,
    },
}
