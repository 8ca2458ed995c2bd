pub mod coordinates;
pub mod gpu_types;
pub mod gpu_waveform;
pub mod scene;
