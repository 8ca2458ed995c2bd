use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::processing::geometry::{BufferId, VertexBuffer};

/// GPU uniform buffer for one waveform draw.
/// Layout matches the WGSL struct exactly (96 bytes, aligned to 16).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WaveformUniforms {
    /// Orthographic camera projection (column-major).
    pub view_proj: [[f32; 4]; 4],
    /// RGBA color for the current draw call.
    pub color: [f32; 4],
    /// Pixel size of the channel's viewport.
    pub resolution: [f32; 2],
    /// Line width in pixels.
    pub line_width: f32,
    /// Point radius in pixels.
    pub point_radius: f32,
}

/// How a scene object is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Polyline through consecutive vertices.
    Polyline,
    /// One disc per vertex.
    Points,
}

/// One waveform object ready for the GPU. The vertex data is uploaded once
/// per buffer id and reused across frames.
#[derive(Debug, Clone)]
pub struct WaveformGpuData {
    pub buffer: Arc<VertexBuffer>,
    pub color: [f32; 4],
    pub line_width: f32,
    pub point_radius: f32,
    pub draw_mode: DrawMode,
}

/// A mask band in render units, drawn with additive blending.
#[derive(Debug, Clone, Copy)]
pub struct MaskGpuData {
    /// `[min corner, max corner]`.
    pub corners: [[f32; 2]; 2],
    pub color: [f32; 4],
}

/// Everything one channel submits for a frame.
#[derive(Debug, Clone)]
pub struct ChannelDrawList {
    pub masks: Vec<MaskGpuData>,
    pub waveforms: Vec<WaveformGpuData>,
    pub uniforms_base: WaveformUniforms,
    /// Buffers to evict from the GPU cache before drawing.
    pub retired: Vec<BufferId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<WaveformUniforms>(), 96);
        assert_eq!(std::mem::size_of::<WaveformUniforms>() % 16, 0);
    }
}
