pub mod amplitude;
pub mod entities;
pub mod hotkeys;
pub mod theme;
pub mod view_range;
pub mod viewer_config;
