//! Interactive seismic waveform viewport for egui.
//!
//! [`WaveformDisplay`] lays out stations as rows of channels over a shared
//! time axis. Sample data is turned into vertex buffers on a pool of worker
//! threads and drawn with wgpu through egui paint callbacks; the host calls
//! [`render::gpu_waveform::init_gpu_resources`] once at startup.

pub mod data;
pub mod error;
pub mod processing;
pub mod render;
pub mod state;
pub mod ui;

pub use error::{ConfigError, GeometryError, HotKeyError};
pub use state::entities::{
    Channel, DataSegment, DisplayType, LineStyle, Markers, Mask, MeasureWindowSelection,
    MoveableMarker, SegmentId, Selections, SelectionWindow, SignalDetection, Station,
    TheoreticalPhaseWindow, VerticalMarker, WaveformEvent,
};
pub use state::theme::Theme;
pub use state::view_range::ViewRange;
pub use state::viewer_config::ViewerConfig;
pub use ui::viewport::WaveformDisplay;
