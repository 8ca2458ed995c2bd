use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::GeometryError;
use crate::render::coordinates::time_to_render_units;
use crate::state::entities::DataSegment;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

fn next_buffer_id() -> BufferId {
    BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Key of an uploaded vertex buffer in the GPU cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

/// Interleaved `[x0, y0, x1, y1, ...]` positions in render units.
#[derive(Debug)]
pub struct VertexBuffer {
    id: BufferId,
    data: Vec<f32>,
}

impl VertexBuffer {
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            id: next_buffer_id(),
            data,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The same data viewed as `[x, y]` pairs, ready for upload.
    pub fn points(&self) -> &[[f32; 2]] {
        bytemuck::cast_slice(&self.data[..self.data.len() - self.data.len() % 2])
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() < 2
    }
}

/// Everything a worker needs to build one segment's geometry.
#[derive(Debug, Clone)]
pub struct GeometryInput {
    pub segment: Arc<DataSegment>,
    pub sample_rate: f64,
    pub display_start: f64,
    pub display_end: f64,
    pub gl_min: f64,
    pub gl_max: f64,
}

/// Builds the vertex buffer for one segment. Sample `i` lands at
/// `start_time + i / sample_rate`; non-finite samples are skipped.
pub fn build_vertex_buffer(input: &GeometryInput) -> Result<VertexBuffer, GeometryError> {
    if !input.sample_rate.is_finite() || input.sample_rate <= 0.0 {
        return Err(GeometryError::InvalidSampleRate(input.sample_rate));
    }
    if !(input.display_end - input.display_start).is_normal() {
        return Err(GeometryError::DegenerateWindow {
            start: input.display_start,
            end: input.display_end,
        });
    }
    if !(input.gl_max - input.gl_min).is_normal() {
        return Err(GeometryError::DegenerateBounds {
            min: input.gl_min,
            max: input.gl_max,
        });
    }

    let samples = &input.segment.samples;
    let mut data = Vec::with_capacity(samples.len() * 2);
    let step = 1.0 / input.sample_rate;

    for (i, &sample) in samples.iter().enumerate() {
        if !sample.is_finite() {
            continue;
        }
        let time = input.segment.start_time + i as f64 * step;
        let x = time_to_render_units(
            time,
            input.gl_min,
            input.gl_max,
            input.display_start,
            input.display_end,
        );
        data.push(x as f32);
        data.push(sample);
    }

    Ok(VertexBuffer::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(samples: Vec<f32>, start: f64, rate: f64) -> GeometryInput {
        GeometryInput {
            segment: DataSegment::new(start, samples),
            sample_rate: rate,
            display_start: 0.0,
            display_end: 10.0,
            gl_min: 0.0,
            gl_max: 100.0,
        }
    }

    #[test]
    fn interleaves_time_and_amplitude() {
        let vb = build_vertex_buffer(&input(vec![1.0, -1.0, 0.5], 2.0, 2.0))
            .expect("vertex buffer builds");
        assert_eq!(vb.data(), &[20.0, 1.0, 25.0, -1.0, 30.0, 0.5]);
        assert_eq!(vb.vertex_count(), 3);
        assert_eq!(vb.points()[1], [25.0, -1.0]);
    }

    #[test]
    fn skips_non_finite_samples() {
        let vb = build_vertex_buffer(&input(vec![1.0, f32::NAN, 2.0], 0.0, 1.0))
            .expect("vertex buffer builds");
        assert_eq!(vb.data(), &[0.0, 1.0, 20.0, 2.0]);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            build_vertex_buffer(&input(vec![1.0], 0.0, 0.0)).map(|_| ()),
            Err(GeometryError::InvalidSampleRate(0.0))
        );
        let mut degenerate = input(vec![1.0], 0.0, 1.0);
        degenerate.display_end = degenerate.display_start;
        assert!(matches!(
            build_vertex_buffer(&degenerate),
            Err(GeometryError::DegenerateWindow { .. })
        ));
    }

    #[test]
    fn every_buffer_has_its_own_id() {
        let a = build_vertex_buffer(&input(vec![1.0], 0.0, 1.0)).expect("vertex buffer builds");
        let b = build_vertex_buffer(&input(vec![1.0], 0.0, 1.0)).expect("vertex buffer builds");
        assert_ne!(a.id(), b.id());
    }
}
