pub mod channel;
pub mod gestures;
pub mod markers;
pub mod measure_window;
pub mod station_label;
pub mod time_axis;
pub mod viewport;
